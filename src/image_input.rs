//! Image decoding from files, in-memory bytes and raw pixel frames.
//!
//! Missing files and undecodable bytes both surface as
//! [`Error::ImageDecode`](crate::Error::ImageDecode).

use image::{DynamicImage, RgbImage};
use std::path::Path;

use crate::error::{Error, Result};

/// Byte order of the three channels in a raw frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
    #[default]
    Rgb,
    /// Blue-green-red, as produced by OpenCV-style capture and decode APIs.
    Bgr,
}

/// Read and decode an image file.
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    let bytes = std::fs::read(path).map_err(|e| Error::ImageDecode {
        origin: path.display().to_string(),
        source: image::ImageError::IoError(e),
    })?;

    decode_image(&bytes, &path.display().to_string())
}

/// Decode an encoded image (JPEG, PNG, ...) held in memory.
///
/// `origin` is only used to label errors.
pub fn decode_image(bytes: &[u8], origin: &str) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|source| Error::ImageDecode {
        origin: origin.to_string(),
        source,
    })
}

/// Build an image from a tightly packed 8-bit, 3-channel pixel buffer.
///
/// BGR frames are swapped to RGB so every image leaving this module is RGB.
pub fn image_from_frame(
    data: &[u8],
    width: u32,
    height: u32,
    order: ChannelOrder,
) -> Result<DynamicImage> {
    let expected = width as usize * height as usize * 3;
    if data.len() != expected || expected == 0 {
        return Err(Error::InvalidFrame {
            width,
            height,
            expected,
            actual: data.len(),
        });
    }

    let pixels = match order {
        ChannelOrder::Rgb => data.to_vec(),
        ChannelOrder::Bgr => data
            .chunks_exact(3)
            .flat_map(|px| [px[2], px[1], px[0]])
            .collect(),
    };

    let rgb = RgbImage::from_raw(width, height, pixels).ok_or(Error::InvalidFrame {
        width,
        height,
        expected,
        actual: data.len(),
    })?;

    Ok(DynamicImage::ImageRgb8(rgb))
}
