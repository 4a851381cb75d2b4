use dicom::core::Tag;
use dicom::dictionary_std::tags;
use dicom::object::{open_file, DefaultDicomObject};
use dicom::pixeldata::PixelDecoder;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

use super::{Photometric, RawFrame, Samples, Study};
use crate::error::{CaseLensError, Result};
use crate::models::RawMetadata;

/// Header attributes read from every study. Identifying keywords are read so
/// that identity can be derived and the anonymizer has something to strip.
const HEADER_TAGS: &[(&str, Tag)] = &[
    ("SOPInstanceUID", tags::SOP_INSTANCE_UID),
    ("StudyInstanceUID", tags::STUDY_INSTANCE_UID),
    ("SeriesInstanceUID", tags::SERIES_INSTANCE_UID),
    ("StudyID", tags::STUDY_ID),
    ("AccessionNumber", tags::ACCESSION_NUMBER),
    ("PatientName", tags::PATIENT_NAME),
    ("PatientID", tags::PATIENT_ID),
    ("PatientBirthDate", tags::PATIENT_BIRTH_DATE),
    ("PatientSex", tags::PATIENT_SEX),
    ("PatientAge", tags::PATIENT_AGE),
    ("StudyDate", tags::STUDY_DATE),
    ("SeriesDate", tags::SERIES_DATE),
    ("AcquisitionDate", tags::ACQUISITION_DATE),
    ("ContentDate", tags::CONTENT_DATE),
    ("StudyTime", tags::STUDY_TIME),
    ("SeriesTime", tags::SERIES_TIME),
    ("AcquisitionTime", tags::ACQUISITION_TIME),
    ("ContentTime", tags::CONTENT_TIME),
    ("InstitutionName", tags::INSTITUTION_NAME),
    ("InstitutionAddress", tags::INSTITUTION_ADDRESS),
    ("ReferringPhysicianName", tags::REFERRING_PHYSICIAN_NAME),
    ("PerformingPhysicianName", tags::PERFORMING_PHYSICIAN_NAME),
    ("OperatorsName", tags::OPERATORS_NAME),
    ("StationName", tags::STATION_NAME),
    ("DeviceSerialNumber", tags::DEVICE_SERIAL_NUMBER),
    ("Modality", tags::MODALITY),
    ("ViewName", tags::VIEW_NAME),
    ("StageName", tags::STAGE_NAME),
    ("NumberOfFrames", tags::NUMBER_OF_FRAMES),
    ("CineRate", tags::CINE_RATE),
    ("RecommendedDisplayFrameRate", tags::RECOMMENDED_DISPLAY_FRAME_RATE),
    ("EffectiveDuration", tags::EFFECTIVE_DURATION),
    ("HeartRate", tags::HEART_RATE),
    ("Manufacturer", tags::MANUFACTURER),
    ("ManufacturerModelName", tags::MANUFACTURER_MODEL_NAME),
    ("Rows", tags::ROWS),
    ("Columns", tags::COLUMNS),
    ("PhotometricInterpretation", tags::PHOTOMETRIC_INTERPRETATION),
    ("PlanarConfiguration", tags::PLANAR_CONFIGURATION),
    ("SamplesPerPixel", tags::SAMPLES_PER_PIXEL),
    ("BitsAllocated", tags::BITS_ALLOCATED),
    ("PixelRepresentation", tags::PIXEL_REPRESENTATION),
];

struct DecodedPixels {
    frame_len: usize,
    width: u32,
    height: u32,
    samples_per_pixel: u16,
    bits_allocated: u16,
    photometric: Photometric,
    data: Vec<u8>,
}

/// A DICOM file. Pixel data is decoded once, on first frame access.
pub struct DicomStudy {
    source_name: String,
    object: DefaultDicomObject,
    metadata: RawMetadata,
    decoded: OnceLock<std::result::Result<DecodedPixels, String>>,
}

impl DicomStudy {
    pub fn open(path: &Path) -> Result<Self> {
        let object = open_file(path).map_err(|e| {
            CaseLensError::DecodeFailure(format!("cannot read {}: {e}", path.display()))
        })?;
        let metadata = read_header(&object);
        let source_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        debug!(source = %source_name, attributes = metadata.len(), "Opened DICOM study");

        Ok(Self {
            source_name,
            object,
            metadata,
            decoded: OnceLock::new(),
        })
    }

    fn pixels(&self) -> Result<&DecodedPixels> {
        self.decoded
            .get_or_init(|| decode_pixels(&self.object))
            .as_ref()
            .map_err(|e| CaseLensError::DecodeFailure(e.clone()))
    }

    /// `PixelRepresentation` 1 marks two's complement samples.
    fn signed(&self) -> bool {
        self.metadata
            .get("PixelRepresentation")
            .is_some_and(|v| v.trim() == "1")
    }

    fn planar(&self) -> bool {
        self.metadata
            .get("PlanarConfiguration")
            .is_some_and(|v| v.trim() == "1")
    }
}

impl Study for DicomStudy {
    fn source_name(&self) -> &str {
        &self.source_name
    }

    fn metadata(&self) -> &RawMetadata {
        &self.metadata
    }

    fn num_frames(&self) -> usize {
        self.metadata
            .get("NumberOfFrames")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(1)
            .max(1)
    }

    fn photometric(&self) -> Photometric {
        match self.pixels() {
            Ok(pixels) => pixels.photometric.clone(),
            Err(_) => self
                .metadata
                .get("PhotometricInterpretation")
                .map(|v| Photometric::parse(v))
                .unwrap_or(Photometric::Monochrome2),
        }
    }

    fn frame(&self, index: usize) -> Result<RawFrame> {
        let pixels = self.pixels()?;
        let start = index * pixels.frame_len;
        let bytes = pixels
            .data
            .get(start..start + pixels.frame_len)
            .ok_or_else(|| {
                CaseLensError::DecodeFailure(format!(
                    "frame {index} out of range in {}",
                    self.source_name
                ))
            })?;

        let samples = Samples::from_le_bytes(bytes, pixels.bits_allocated, self.signed());

        Ok(RawFrame {
            width: pixels.width,
            height: pixels.height,
            samples_per_pixel: pixels.samples_per_pixel,
            planar: self.planar(),
            samples,
        })
    }
}

fn decode_pixels(object: &DefaultDicomObject) -> std::result::Result<DecodedPixels, String> {
    let decoded = object.decode_pixel_data().map_err(|e| e.to_string())?;
    let frames = (decoded.number_of_frames() as usize).max(1);
    let data = decoded.data().to_vec();
    if data.is_empty() {
        return Err("pixel data is empty".to_string());
    }
    Ok(DecodedPixels {
        frame_len: data.len() / frames,
        width: decoded.columns(),
        height: decoded.rows(),
        samples_per_pixel: decoded.samples_per_pixel(),
        bits_allocated: decoded.bits_allocated(),
        photometric: Photometric::parse(decoded.photometric_interpretation().as_str()),
        data,
    })
}

fn read_header(object: &DefaultDicomObject) -> RawMetadata {
    let mut metadata = RawMetadata::new();
    for (keyword, tag) in HEADER_TAGS {
        let Ok(element) = object.element(*tag) else {
            continue;
        };
        if let Ok(value) = element.to_str() {
            let value = value.trim().trim_end_matches('\0').trim().to_string();
            if !value.is_empty() {
                metadata.insert((*keyword).to_string(), value);
            }
        }
    }
    metadata
}
