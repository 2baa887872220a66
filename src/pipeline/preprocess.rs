//! Screenshot preprocessing: grayscale + adaptive Gaussian threshold.
//!
//! Each pixel is compared with the Gaussian-weighted mean of its own
//! neighbourhood, using the usual computer-vision definition:
//!
//! ```text
//! gray  = round(0.299 R + 0.587 G + 0.114 B)
//! sigma = 0.3 * ((block - 1) / 2 - 1) + 0.8
//! mean  = round(gaussian_blur(gray, block, sigma))      (replicated borders)
//! out   = 255 if gray > mean - offset else 0
//! ```

use crate::config::ThresholdParams;
use crate::error::CaptureError;
use image::{GrayImage, Luma, RgbImage};
use std::path::Path;
use tracing::debug;

/// Read the image at `path` and binarise it for OCR.
///
/// CPU-bound; the orchestrator calls it from `spawn_blocking`.
pub fn preprocess(path: &Path, params: ThresholdParams) -> Result<GrayImage, CaptureError> {
    let img = image::open(path).map_err(|e| CaptureError::ImageDecode {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    debug!(
        "Preprocessing {} ({}x{})",
        path.display(),
        img.width(),
        img.height()
    );
    let gray = to_grayscale(&img.to_rgb8());
    Ok(adaptive_threshold_gaussian(&gray, params))
}

/// Single-channel luma with BT.601 weights.
pub fn to_grayscale(rgb: &RgbImage) -> GrayImage {
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        Luma([luma.round().clamp(0.0, 255.0) as u8])
    })
}

/// Binarise `gray` against its local Gaussian-weighted mean.
pub fn adaptive_threshold_gaussian(gray: &GrayImage, params: ThresholdParams) -> GrayImage {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return GrayImage::new(w, h);
    }
    let kernel = gaussian_kernel(params.block_size);
    let mean = gaussian_blur(gray, &kernel);

    GrayImage::from_fn(w, h, |x, y| {
        let src = gray.get_pixel(x, y).0[0] as i32;
        let m = mean[(y * w + x) as usize].round() as i32;
        if src > m - params.offset {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Normalised 1-D Gaussian kernel of odd length `size`.
pub fn gaussian_kernel(size: u32) -> Vec<f32> {
    let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let half = (size / 2) as i32;
    let scale = -0.5 / (sigma * sigma);
    let mut k: Vec<f32> = (-half..=half)
        .map(|i| ((i * i) as f32 * scale).exp())
        .collect();
    let sum: f32 = k.iter().sum();
    k.iter_mut().for_each(|v| *v /= sum);
    k
}

/// Separable blur with replicated borders; returns row-major `f32` means.
fn gaussian_blur(gray: &GrayImage, kernel: &[f32]) -> Vec<f32> {
    let (w, h) = (gray.width() as i64, gray.height() as i64);
    let half = (kernel.len() / 2) as i64;
    let src = gray.as_raw();

    let mut horizontal = vec![0f32; (w * h) as usize];
    for y in 0..h {
        let row = (y * w) as usize;
        for x in 0..w {
            let mut acc = 0f32;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = (x + k as i64 - half).clamp(0, w - 1) as usize;
                acc += weight * src[row + sx] as f32;
            }
            horizontal[row + x as usize] = acc;
        }
    }

    let mut out = vec![0f32; (w * h) as usize];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0f32;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = (y + k as i64 - half).clamp(0, h - 1);
                acc += weight * horizontal[(sy * w + x) as usize];
            }
            out[(y * w + x) as usize] = acc;
        }
    }
    out
}
