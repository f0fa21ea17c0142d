//! Image to tensor conversion for the LVFace input layer.

use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;
use serde::{Deserialize, Serialize};

/// Side length of the square face crop the model expects.
pub const INPUT_SIZE: u32 = 112;

/// Number of color channels in the input tensor.
pub const CHANNELS: usize = 3;

/// NCHW tensor fed to the model, shape `[1, 3, 112, 112]`.
pub type FaceTensor = Array4<f32>;

/// Interpolation used when resizing to [`INPUT_SIZE`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResizeFilter {
    Nearest,
    #[default]
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Convert an image into the normalized model input.
///
/// 1. Resize to 112x112
/// 2. Convert to RGB
/// 3. Lay out channel-major (CHW)
/// 4. Normalize each value with `(v / 255 - 0.5) / 0.5`, giving [-1, 1]
/// 5. Add the batch dimension
pub fn preprocess(img: &DynamicImage, filter: ResizeFilter) -> FaceTensor {
    let size = INPUT_SIZE as usize;

    let resized = img.resize_exact(INPUT_SIZE, INPUT_SIZE, filter.into());
    let rgb = resized.to_rgb8();

    let mut tensor = Array4::<f32>::zeros((1, CHANNELS, size, size));

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..CHANNELS {
            tensor[[0, c, y, x]] = normalize(pixel[c]);
        }
    }

    tensor
}

#[inline]
fn normalize(value: u8) -> f32 {
    ((f32::from(value) / 255.0) - 0.5) / 0.5
}
