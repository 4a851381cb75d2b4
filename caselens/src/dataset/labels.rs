use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;
use crate::models::LabelInfo;

/// Curated renderings for known label folders. Anything else falls back to
/// [`LabelInfo::unmapped`].
#[derive(Debug, Clone)]
pub struct LabelMap {
    entries: HashMap<String, LabelInfo>,
}

impl Default for LabelMap {
    fn default() -> Self {
        let known = [
            ("Normal", "normal", "Normal", "normal"),
            (
                "Normal_with_septal_hypertrophy",
                "normal_sep_hyp",
                "Normal with septal hypertrophy",
                "pathology",
            ),
            (
                "dilated_cardiomyopathy_with_global_dysfunction",
                "dcm_global_dysf",
                "Dilated cardiomyopathy with global dysfunction",
                "pathology",
            ),
            (
                "inferoapical_septal_akinesia",
                "inferoapical_sep_ak",
                "Inferoapical septal akinesia",
                "pathology",
            ),
        ];
        let entries = known
            .into_iter()
            .map(|(raw, short, pretty, group)| {
                (
                    raw.to_string(),
                    LabelInfo {
                        raw: raw.to_string(),
                        short: short.to_string(),
                        pretty: pretty.to_string(),
                        group: group.to_string(),
                    },
                )
            })
            .collect();
        Self { entries }
    }
}

impl LabelMap {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, label: LabelInfo) {
        self.entries.insert(label.raw.clone(), label);
    }

    pub fn resolve(&self, folder: &str) -> LabelInfo {
        self.entries
            .get(folder)
            .cloned()
            .unwrap_or_else(|| LabelInfo::unmapped(folder))
    }
}

/// One row of the `labels.csv` side table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRow {
    pub case_id: String,
    pub label_raw: String,
    pub label_short: String,
    pub label_pretty: String,
    pub group: String,
    /// `<label folder>/<file name>` of the source study.
    pub file: String,
}

impl LabelRow {
    pub fn new(case_id: &str, label: &LabelInfo, file: String) -> Self {
        Self {
            case_id: case_id.to_string(),
            label_raw: label.raw.clone(),
            label_short: label.short.clone(),
            label_pretty: label.pretty.clone(),
            group: label.group.clone(),
            file,
        }
    }
}

pub fn write_labels(path: &Path, rows: &[LabelRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_labels(path: &Path) -> Result<Vec<LabelRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}
