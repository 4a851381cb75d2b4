use image::{DynamicImage, GrayImage, RgbImage};

use crate::error::{CaseLensError, Result};

/// Photometric interpretation of decoded pixel samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Photometric {
    Monochrome1,
    Monochrome2,
    Rgb,
    YbrFull,
    YbrFull422,
    Other(String),
}

impl Photometric {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_uppercase().as_str() {
            "MONOCHROME1" => Self::Monochrome1,
            "MONOCHROME2" => Self::Monochrome2,
            "RGB" => Self::Rgb,
            "YBR_FULL" => Self::YbrFull,
            "YBR_FULL_422" => Self::YbrFull422,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_ybr(&self) -> bool {
        matches!(self, Self::YbrFull | Self::YbrFull422)
    }
}

/// Decoded samples in their stored numeric type.
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    U8(Vec<u8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    U32(Vec<u32>),
    I32(Vec<i32>),
    F32(Vec<f32>),
}

impl Samples {
    fn len(&self) -> usize {
        match self {
            Samples::U8(v) => v.len(),
            Samples::U16(v) => v.len(),
            Samples::I16(v) => v.len(),
            Samples::U32(v) => v.len(),
            Samples::I32(v) => v.len(),
            Samples::F32(v) => v.len(),
        }
    }

    /// Samples clipped into the 8-bit range.
    fn clipped(&self) -> Vec<u8> {
        match self {
            Samples::U8(v) => v.clone(),
            Samples::U16(v) => v.iter().map(|&s| s.min(255) as u8).collect(),
            Samples::I16(v) => v.iter().map(|&s| s.clamp(0, 255) as u8).collect(),
            Samples::U32(v) => v.iter().map(|&s| s.min(255) as u8).collect(),
            Samples::I32(v) => v.iter().map(|&s| s.clamp(0, 255) as u8).collect(),
            // NaN casts to 0.
            Samples::F32(v) => v.iter().map(|&s| s.round().clamp(0.0, 255.0) as u8).collect(),
        }
    }

    /// Splits little-endian sample bytes by allocation width and signedness.
    pub fn from_le_bytes(bytes: &[u8], bits_allocated: u16, signed: bool) -> Self {
        match (bits_allocated, signed) {
            (0..=8, _) => Samples::U8(bytes.to_vec()),
            (9..=16, false) => Samples::U16(
                bytes.chunks_exact(2).map(|b| u16::from_le_bytes([b[0], b[1]])).collect(),
            ),
            (9..=16, true) => Samples::I16(
                bytes.chunks_exact(2).map(|b| i16::from_le_bytes([b[0], b[1]])).collect(),
            ),
            (_, false) => Samples::U32(
                bytes
                    .chunks_exact(4)
                    .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect(),
            ),
            (_, true) => Samples::I32(
                bytes
                    .chunks_exact(4)
                    .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect(),
            ),
        }
    }
}

/// One decoded frame before color normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub samples_per_pixel: u16,
    /// Color planes stored one after another instead of interleaved.
    pub planar: bool,
    pub samples: Samples,
}

/// Converts a decoded frame to an 8-bit image.
///
/// Single-channel data stays grayscale. Three-channel data encoded as
/// `YBR_FULL` / `YBR_FULL_422` is converted to RGB; any other three-channel
/// data is taken as RGB. Values outside `[0, 255]` are clipped.
pub fn normalize_frame(frame: &RawFrame, photometric: &Photometric) -> Result<DynamicImage> {
    let pixels = frame.width as usize * frame.height as usize;
    match frame.samples_per_pixel {
        1 => {
            if frame.samples.len() != pixels {
                return Err(size_mismatch(frame, pixels));
            }
            GrayImage::from_raw(frame.width, frame.height, frame.samples.clipped())
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| size_mismatch(frame, pixels))
        }
        3 => {
            let mut data = frame.samples.clipped();
            if *photometric == Photometric::YbrFull422 && data.len() == pixels * 2 {
                data = upsample_422(&data);
            }
            if data.len() != pixels * 3 {
                return Err(size_mismatch(frame, pixels * 3));
            }
            if frame.planar {
                data = interleave_planes(&data, pixels);
            }
            if photometric.is_ybr() {
                for px in data.chunks_exact_mut(3) {
                    let [r, g, b] = ybr_to_rgb(px[0], px[1], px[2]);
                    px[0] = r;
                    px[1] = g;
                    px[2] = b;
                }
            }
            RgbImage::from_raw(frame.width, frame.height, data)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| size_mismatch(frame, pixels * 3))
        }
        other => Err(CaseLensError::DecodeFailure(format!(
            "unsupported samples per pixel: {other}"
        ))),
    }
}

fn size_mismatch(frame: &RawFrame, expected: usize) -> CaseLensError {
    CaseLensError::DecodeFailure(format!(
        "frame {}x{} holds {} samples, expected {expected}",
        frame.width,
        frame.height,
        frame.samples.len()
    ))
}

/// Full-range YCbCr to RGB.
fn ybr_to_rgb(y: u8, cb: u8, cr: u8) -> [u8; 3] {
    let y = y as f32;
    let cb = cb as f32 - 128.0;
    let cr = cr as f32 - 128.0;
    let clip = |v: f32| v.round().clamp(0.0, 255.0) as u8;
    [
        clip(y + 1.402 * cr),
        clip(y - 0.344_136 * cb - 0.714_136 * cr),
        clip(y + 1.772 * cb),
    ]
}

/// `Y1 Y2 Cb Cr` groups to two full `Y Cb Cr` pixels.
fn upsample_422(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() / 2 * 3);
    for group in data.chunks_exact(4) {
        let (y1, y2, cb, cr) = (group[0], group[1], group[2], group[3]);
        out.extend_from_slice(&[y1, cb, cr, y2, cb, cr]);
    }
    out
}

fn interleave_planes(data: &[u8], pixels: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for i in 0..pixels {
        out.push(data[i]);
        out.push(data[pixels + i]);
        out.push(data[2 * pixels + i]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(spp: u16, samples: Samples) -> RawFrame {
        RawFrame {
            width: 2,
            height: 1,
            samples_per_pixel: spp,
            planar: false,
            samples,
        }
    }

    #[test]
    fn test_grayscale_stays_single_channel() {
        let img = normalize_frame(&frame(1, Samples::U8(vec![10, 200])), &Photometric::Monochrome2).unwrap();
        let gray = img.as_luma8().unwrap();
        assert_eq!(gray.as_raw(), &vec![10, 200]);
    }

    #[test]
    fn test_wide_samples_are_clipped() {
        let img = normalize_frame(&frame(1, Samples::U16(vec![300, 42])), &Photometric::Monochrome2).unwrap();
        assert_eq!(img.as_luma8().unwrap().as_raw(), &vec![255, 42]);
    }

    #[test]
    fn test_signed_samples_clip_at_zero() {
        let img = normalize_frame(&frame(1, Samples::I16(vec![-5, 400])), &Photometric::Monochrome2).unwrap();
        assert_eq!(img.as_luma8().unwrap().as_raw(), &vec![0, 255]);

        let img = normalize_frame(&frame(1, Samples::I32(vec![-70_000, 17])), &Photometric::Monochrome2).unwrap();
        assert_eq!(img.as_luma8().unwrap().as_raw(), &vec![0, 17]);
    }

    #[test]
    fn test_float_samples_are_rounded_and_clipped() {
        let samples = Samples::F32(vec![-1.5, 254.6]);
        let img = normalize_frame(&frame(1, samples), &Photometric::Monochrome2).unwrap();
        assert_eq!(img.as_luma8().unwrap().as_raw(), &vec![0, 255]);
    }

    #[test]
    fn test_from_le_bytes_follows_width_and_sign() {
        let minus_five = (-5i16).to_le_bytes();
        assert_eq!(
            Samples::from_le_bytes(&[minus_five[0], minus_five[1], 42, 0], 16, true),
            Samples::I16(vec![-5, 42])
        );
        assert_eq!(
            Samples::from_le_bytes(&[0xFB, 0xFF], 16, false),
            Samples::U16(vec![0xFFFB])
        );

        let mut wide = 300u32.to_le_bytes().to_vec();
        wide.extend_from_slice(&7u32.to_le_bytes());
        let samples = Samples::from_le_bytes(&wide, 32, false);
        assert_eq!(samples, Samples::U32(vec![300, 7]));
        let img = normalize_frame(&frame(1, samples), &Photometric::Monochrome2).unwrap();
        assert_eq!(img.as_luma8().unwrap().as_raw(), &vec![255, 7]);

        let signed_wide: Vec<u8> = [-1i32, 9].iter().flat_map(|v| v.to_le_bytes()).collect();
        assert_eq!(Samples::from_le_bytes(&signed_wide, 32, true), Samples::I32(vec![-1, 9]));
    }

    #[test]
    fn test_ybr_full_converts_to_rgb() {
        // Neutral chroma keeps the luma value on every channel.
        let samples = Samples::U8(vec![100, 128, 128, 0, 128, 255]);
        let img = normalize_frame(&frame(3, samples), &Photometric::YbrFull).unwrap();
        let rgb = img.as_rgb8().unwrap().as_raw().clone();
        assert_eq!(&rgb[0..3], &[100, 100, 100]);
        // Strong red chroma on black.
        assert!(rgb[3] > 170);
        assert_eq!(rgb[5], 0);
    }

    #[test]
    fn test_ybr_422_is_upsampled() {
        let samples = Samples::U8(vec![50, 60, 128, 128]);
        let img = normalize_frame(&frame(3, samples), &Photometric::YbrFull422).unwrap();
        assert_eq!(img.as_rgb8().unwrap().as_raw(), &vec![50, 50, 50, 60, 60, 60]);
    }

    #[test]
    fn test_rgb_passes_through() {
        let samples = Samples::U8(vec![1, 2, 3, 4, 5, 6]);
        let img = normalize_frame(&frame(3, samples), &Photometric::Rgb).unwrap();
        assert_eq!(img.as_rgb8().unwrap().as_raw(), &vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_planar_rgb_is_interleaved() {
        let mut f = frame(3, Samples::U8(vec![1, 4, 2, 5, 3, 6]));
        f.planar = true;
        let img = normalize_frame(&f, &Photometric::Rgb).unwrap();
        assert_eq!(img.as_rgb8().unwrap().as_raw(), &vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_truncated_frame_is_decode_failure() {
        let err = normalize_frame(&frame(1, Samples::U8(vec![1])), &Photometric::Monochrome2).unwrap_err();
        assert!(matches!(err, CaseLensError::DecodeFailure(_)));
    }

    #[test]
    fn test_photometric_parse() {
        assert_eq!(Photometric::parse(" ybr_full_422 "), Photometric::YbrFull422);
        assert_eq!(Photometric::parse("PALETTE COLOR"), Photometric::Other("PALETTE COLOR".into()));
    }
}
