//! Frame sampling: pick representative frames from a multi-frame study,
//! normalize their color and write them as numbered PNG files.

mod color;
mod dicom;
mod sampling;

pub use color::{normalize_frame, Photometric, RawFrame, Samples};
pub use dicom::DicomStudy;
pub use sampling::{uniform_indices, uniform_sample};

use image::DynamicImage;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::RawMetadata;

/// A decoded (or decodable) imaging study.
pub trait Study: Send + Sync {
    /// File name (or other label) the study was loaded from.
    fn source_name(&self) -> &str;

    /// Header attributes keyed by standard keyword.
    fn metadata(&self) -> &RawMetadata;

    /// Frame count; single-frame studies report 1.
    fn num_frames(&self) -> usize;

    fn photometric(&self) -> Photometric;

    fn frame(&self, index: usize) -> Result<RawFrame>;
}

/// Study held entirely in memory. Used for synthetic data and tests.
#[derive(Debug, Clone)]
pub struct InMemoryStudy {
    pub source_name: String,
    pub metadata: RawMetadata,
    pub photometric: Photometric,
    pub frames: Vec<RawFrame>,
}

impl Study for InMemoryStudy {
    fn source_name(&self) -> &str {
        &self.source_name
    }

    fn metadata(&self) -> &RawMetadata {
        &self.metadata
    }

    fn num_frames(&self) -> usize {
        self.frames.len().max(1)
    }

    fn photometric(&self) -> Photometric {
        self.photometric.clone()
    }

    fn frame(&self, index: usize) -> Result<RawFrame> {
        self.frames.get(index).cloned().ok_or_else(|| {
            crate::error::CaseLensError::DecodeFailure(format!(
                "frame {index} out of range for {}",
                self.source_name
            ))
        })
    }
}

#[derive(Debug, Clone)]
pub struct SampledFrame {
    /// Zero-based index into the source study.
    pub index: usize,
    pub image: DynamicImage,
}

#[derive(Debug, Clone)]
pub struct FrameSampler {
    frames: usize,
}

impl FrameSampler {
    pub fn new(frames: usize) -> Self {
        Self { frames }
    }

    /// Decodes and normalizes evenly spaced frames.
    ///
    /// A study whose pixel data cannot be decoded yields no frames; the
    /// failure is logged and never propagated.
    pub fn sample(&self, study: &dyn Study) -> Vec<SampledFrame> {
        let indices = if study.num_frames() <= 1 {
            vec![0]
        } else {
            uniform_indices(study.num_frames(), self.frames)
        };
        let photometric = study.photometric();

        let mut sampled = Vec::with_capacity(indices.len());
        for index in indices {
            let decoded = study
                .frame(index)
                .and_then(|raw| normalize_frame(&raw, &photometric));
            match decoded {
                Ok(image) => sampled.push(SampledFrame { index, image }),
                Err(e) => {
                    tracing::warn!(
                        source = study.source_name(),
                        frame = index,
                        error = %e,
                        "Pixel data decode failed, skipping study frames"
                    );
                    return Vec::new();
                }
            }
        }
        sampled
    }

    /// Samples frames and writes them to `dir` as `frame_01.png`, `frame_02.png`, ...
    ///
    /// Stale `frame_*.png` files from earlier runs are removed first so the
    /// directory always mirrors the latest extraction.
    pub fn extract_to_dir(&self, study: &dyn Study, dir: &Path) -> Result<Vec<(usize, PathBuf)>> {
        let sampled = self.sample(study);
        std::fs::create_dir_all(dir)?;
        clear_frame_files(dir)?;

        let mut written = Vec::with_capacity(sampled.len());
        for (position, frame) in sampled.iter().enumerate() {
            let path = dir.join(frame_file_name(position + 1));
            frame.image.save_with_format(&path, image::ImageFormat::Png)?;
            written.push((frame.index, path));
        }
        tracing::debug!(source = study.source_name(), frames = written.len(), dir = %dir.display(), "Frames written");
        Ok(written)
    }
}

pub fn frame_file_name(ordinal: usize) -> String {
    format!("frame_{ordinal:02}.png")
}

/// Frame number of a `frame_<n>.png` file name.
fn frame_ordinal(path: &Path) -> Option<usize> {
    path.file_stem()?
        .to_str()?
        .strip_prefix("frame_")?
        .parse()
        .ok()
}

/// PNG frames in `dir`. Numbered `frame_<n>.png` files come first in
/// numeric order, any other PNGs follow by name. Missing directory yields
/// nothing.
pub fn list_frame_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
        })
        .collect();
    files.sort_by(|a, b| {
        let key = |p: &Path| frame_ordinal(p).unwrap_or(usize::MAX);
        key(a).cmp(&key(b)).then_with(|| a.cmp(b))
    });
    files
}

fn clear_frame_files(dir: &Path) -> Result<()> {
    for path in list_frame_files(dir) {
        let is_frame = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("frame_"));
        if is_frame {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn gray_study(num_frames: usize) -> InMemoryStudy {
        let frames = (0..num_frames)
            .map(|i| RawFrame {
                width: 4,
                height: 4,
                samples_per_pixel: 1,
                planar: false,
                samples: Samples::U8(vec![(i % 256) as u8; 16]),
            })
            .collect();
        InMemoryStudy {
            source_name: "synthetic.dcm".into(),
            metadata: RawMetadata::new(),
            photometric: Photometric::Monochrome2,
            frames,
        }
    }

    #[test]
    fn test_sample_picks_uniform_frames() {
        let study = gray_study(100);
        let frames = FrameSampler::new(12).sample(&study);
        let indices: Vec<usize> = frames.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 9, 18, 27, 36, 45, 55, 64, 73, 82, 91, 99]);
        assert_eq!(frames[3].image.as_luma8().unwrap().get_pixel(0, 0).0, [27]);
    }

    #[test]
    fn test_single_frame_study_returns_that_frame() {
        let frames = FrameSampler::new(12).sample(&gray_study(1));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].index, 0);
    }

    #[test]
    fn test_decode_failure_yields_no_frames() {
        let mut study = gray_study(10);
        assert_eq!(uniform_indices(10, 4), vec![0, 3, 7, 9]);
        study.frames[3].samples = Samples::U8(vec![0; 3]);
        assert!(FrameSampler::new(4).sample(&study).is_empty());
    }

    #[test]
    fn test_list_frame_files_orders_past_99() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["frame_100.png", "frame_11.png", "frame_02.png", "extra.png", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let names: Vec<String> = list_frame_files(dir.path())
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["frame_02.png", "frame_11.png", "frame_100.png", "extra.png"]);
    }

    #[test]
    fn test_extract_writes_numbered_files_and_clears_stale() {
        let dir = tempfile::tempdir().unwrap();
        let sampler = FrameSampler::new(3);

        let first = sampler.extract_to_dir(&gray_study(10), dir.path()).unwrap();
        assert_eq!(first.len(), 3);

        let second = FrameSampler::new(2).extract_to_dir(&gray_study(10), dir.path()).unwrap();
        let names: Vec<String> = list_frame_files(dir.path())
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(second.len(), 2);
        assert_eq!(names, vec!["frame_01.png", "frame_02.png"]);
    }
}
