use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use std::sync::OnceLock;

use crate::models::RawMetadata;

/// Header keywords that survive anonymization.
pub const RETAINED_KEYWORDS: &[&str] = &[
    "Modality",
    "ViewName",
    "StageName",
    "NumberOfFrames",
    "CineRate",
    "RecommendedDisplayFrameRate",
    "EffectiveDuration",
    "HeartRate",
    "Manufacturer",
    "ManufacturerModelName",
    "Rows",
    "Columns",
    "PhotometricInterpretation",
    "PlanarConfiguration",
    "SamplesPerPixel",
    "BitsAllocated",
];

/// Key fragments that mark an attribute as identifying, compared against the
/// lowercased key with `_` removed.
pub const IDENTIFYING_KEY_FRAGMENTS: &[&str] = &[
    "patient",
    "physician",
    "doctor",
    "operator",
    "performing",
    "referring",
    "requesting",
    "institution",
    "hospital",
    "accession",
    "birth",
    "address",
    "telephone",
    "station",
    "serialnumber",
    "uid",
    "sopinstance",
    "studyid",
    "seriesid",
    "studydate",
    "seriesdate",
    "acquisitiondate",
    "contentdate",
    "studytime",
    "seriestime",
    "acquisitiontime",
    "contenttime",
];

pub fn is_identifying_key(key: &str) -> bool {
    let normalized = key.to_lowercase().replace('_', "");
    IDENTIFYING_KEY_FRAGMENTS
        .iter()
        .any(|fragment| normalized.contains(fragment))
}

fn date_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|\D)(\d{8})(?:\D|$)").expect("static regex"))
}

fn time_value() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{6})(?:\.\d{1,6})?$").expect("static regex"))
}

fn formatted_date_or_time() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b\d{4}-\d{2}-\d{2}\b|\b\d{1,2}:\d{2}(?::\d{2})?\b").expect("static regex")
    })
}

/// Whether a value carries an absolute date or time: an 8-digit `YYYYMMDD`
/// token that is a real calendar date, a bare 6-digit `HHMMSS` value that is a
/// real clock time, or an ISO-style date / clock time.
pub fn looks_like_date_or_time(value: &str) -> bool {
    let value = value.trim();
    let has_date = date_token().captures_iter(value).any(|caps| {
        caps.get(1)
            .is_some_and(|m| NaiveDate::parse_from_str(m.as_str(), "%Y%m%d").is_ok())
    });
    if has_date {
        return true;
    }
    let is_time = time_value()
        .captures(value)
        .and_then(|caps| caps.get(1))
        .is_some_and(|m| NaiveTime::parse_from_str(m.as_str(), "%H%M%S").is_ok());
    is_time || formatted_date_or_time().is_match(value)
}

/// Keeps only retained, non-identifying attributes. Applying it twice gives
/// the same result as applying it once.
pub fn scrub(raw: &RawMetadata) -> RawMetadata {
    raw.iter()
        .filter(|(key, value)| {
            RETAINED_KEYWORDS.contains(&key.as_str())
                && !is_identifying_key(key)
                && !looks_like_date_or_time(value)
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
