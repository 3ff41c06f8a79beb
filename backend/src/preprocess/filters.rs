//! Single-channel pixel transforms used by the preprocessing pipeline.
//!
//! All filters take the plane by reference and return a new owned plane of the
//! same shape. Neighbourhood filters work on `ndarray` views.

use image::{DynamicImage, GrayImage, ImageBuffer, Luma, RgbImage};
use ndarray::{Array2, s};

use super::pipeline::PreprocessError;

pub const BRIGHTNESS_LOW: f64 = 0.4;
pub const BRIGHTNESS_HIGH: f64 = 0.6;
pub const SHARPNESS_FACTOR: f32 = 2.0;
pub const MEDIAN_KERNEL: usize = 3;

/// 3x3 smoothing kernel (all ones, centre 5), normalised by its sum.
const SMOOTH_KERNEL: [[f32; 3]; 3] = [[1.0, 1.0, 1.0], [1.0, 5.0, 1.0], [1.0, 1.0, 1.0]];
const SMOOTH_SCALE: f32 = 13.0;

/// ITU-R 601-2 luma transform in 16-bit fixed point.
pub fn to_grayscale(image: &DynamicImage) -> GrayImage {
    let rgb = image.to_rgb8();
    ImageBuffer::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let luma = (r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16;
        Luma([luma.min(255) as u8])
    })
}

pub fn gray_to_array(gray: GrayImage) -> Result<Array2<u8>, PreprocessError> {
    let (width, height) = gray.dimensions();
    Array2::from_shape_vec((height as usize, width as usize), gray.into_raw())
        .map_err(|e| PreprocessError::Shape(e.to_string()))
}

pub fn array_to_rgb(plane: &Array2<u8>) -> Result<RgbImage, PreprocessError> {
    let (height, width) = plane.dim();
    let raw: Vec<u8> = plane.iter().flat_map(|&v| [v, v, v]).collect();
    RgbImage::from_raw(width as u32, height as u32, raw).ok_or_else(|| {
        PreprocessError::Shape(format!("buffer does not fit {}x{} RGB image", width, height))
    })
}

/// Stretch the observed [min, max] range onto [0, 255].
pub fn autocontrast(plane: &Array2<u8>) -> Array2<u8> {
    let lo = plane.iter().copied().min().unwrap_or(0);
    let hi = plane.iter().copied().max().unwrap_or(0);
    if hi <= lo {
        return plane.clone();
    }

    let span = (hi - lo) as u32;
    let mut lut = [0u8; 256];
    for (value, slot) in lut.iter_mut().enumerate() {
        let shifted = (value as u32).saturating_sub(lo as u32);
        *slot = (shifted * 255 / span).min(255) as u8;
    }
    plane.mapv(|v| lut[v as usize])
}

/// Mean intensity normalised to [0, 1]. `None` for an empty plane.
pub fn mean_brightness(plane: &Array2<u8>) -> Option<f64> {
    if plane.is_empty() {
        return None;
    }
    let sum: u64 = plane.iter().map(|&v| v as u64).sum();
    Some(sum as f64 / (plane.len() as f64 * 255.0))
}

pub fn brightness_factor(brightness: f64) -> f64 {
    if brightness < BRIGHTNESS_LOW {
        1.8 - brightness
    } else if brightness > BRIGHTNESS_HIGH {
        BRIGHTNESS_HIGH / brightness
    } else {
        1.0
    }
}

pub fn adjust_brightness(plane: &Array2<u8>, factor: f64) -> Array2<u8> {
    if factor == 1.0 {
        return plane.clone();
    }
    plane.mapv(|v| ((v as f64 * factor) as i32).clamp(0, 255) as u8)
}

/// Smoothing pass used as the "blurred" reference for sharpening.
/// Border rows and columns are copied through unchanged.
pub fn smooth(plane: &Array2<u8>) -> Array2<f32> {
    let (height, width) = plane.dim();
    Array2::from_shape_fn((height, width), |(y, x)| {
        if y == 0 || x == 0 || y + 1 >= height || x + 1 >= width {
            return plane[[y, x]] as f32;
        }
        let window = plane.slice(s![y - 1..y + 2, x - 1..x + 2]);
        let mut acc = 0.0;
        for ((ky, kx), &v) in window.indexed_iter() {
            acc += SMOOTH_KERNEL[ky][kx] * v as f32;
        }
        (acc / SMOOTH_SCALE).round()
    })
}

/// Blend between the smoothed plane and the original: factor 1.0 is the
/// identity, larger values push pixels away from their neighbourhood mean.
pub fn sharpen(plane: &Array2<u8>, factor: f32) -> Array2<u8> {
    let blurred = smooth(plane);
    let mut out = plane.clone();
    ndarray::Zip::from(&mut out)
        .and(plane)
        .and(&blurred)
        .for_each(|o, &orig, &blur| {
            let value = blur + factor * (orig as f32 - blur);
            *o = (value as i32).clamp(0, 255) as u8;
        });
    out
}

/// Replicates the outermost rows and columns `pad` times.
pub fn pad_edge(plane: &Array2<u8>, pad: usize) -> Array2<u8> {
    let (height, width) = plane.dim();
    Array2::from_shape_fn((height + 2 * pad, width + 2 * pad), |(y, x)| {
        let sy = y.saturating_sub(pad).min(height - 1);
        let sx = x.saturating_sub(pad).min(width - 1);
        plane[[sy, sx]]
    })
}

/// Median of each `kernel`x`kernel` neighbourhood, edge-padded so the output
/// keeps the input shape. Expects an odd kernel and a non-empty plane.
pub fn median_filter(plane: &Array2<u8>, kernel: usize) -> Array2<u8> {
    let (height, width) = plane.dim();
    let padded = pad_edge(plane, kernel / 2);
    let mut window = Vec::with_capacity(kernel * kernel);
    let mut out = Array2::zeros((height, width));
    for ((y, x), slot) in out.indexed_iter_mut() {
        window.clear();
        window.extend(padded.slice(s![y..y + kernel, x..x + kernel]).iter().copied());
        window.sort_unstable();
        *slot = window[window.len() / 2];
    }
    out
}
