use image::{DynamicImage, GenericImageView, RgbImage};

use super::filters::{
    MEDIAN_KERNEL, SHARPNESS_FACTOR, adjust_brightness, array_to_rgb, autocontrast,
    brightness_factor, gray_to_array, mean_brightness, median_filter, sharpen, to_grayscale,
};

#[derive(Debug, Clone, thiserror::Error)]
pub enum PreprocessError {
    #[error("Image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
    #[error("Pixel buffer shape mismatch: {0}")]
    Shape(String),
}

/// Outcome of a preprocessing run. `Degraded` carries the untouched input.
#[derive(Debug)]
pub enum Preprocessed {
    Enhanced(RgbImage),
    Degraded {
        image: DynamicImage,
        reason: PreprocessError,
    },
}

impl Preprocessed {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Preprocessed::Degraded { .. })
    }

    pub fn into_image(self) -> DynamicImage {
        match self {
            Preprocessed::Enhanced(rgb) => DynamicImage::ImageRgb8(rgb),
            Preprocessed::Degraded { image, .. } => image,
        }
    }
}

/// Grayscale, auto-contrast, brightness correction, sharpening and median
/// denoise, in that order. Never fails outward.
#[derive(Debug, Clone, Default)]
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    pub fn new() -> Self {
        Self
    }

    pub fn preprocess(&self, image: DynamicImage) -> DynamicImage {
        self.run(image).into_image()
    }

    pub fn run(&self, image: DynamicImage) -> Preprocessed {
        match self.enhance(&image) {
            Ok(rgb) => Preprocessed::Enhanced(rgb),
            Err(reason) => {
                log::warn!("Preprocessing failed, sending original image: {}", reason);
                Preprocessed::Degraded { image, reason }
            }
        }
    }

    fn enhance(&self, image: &DynamicImage) -> Result<RgbImage, PreprocessError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(PreprocessError::EmptyImage { width, height });
        }

        let plane = gray_to_array(to_grayscale(image))?;
        let plane = autocontrast(&plane);

        let brightness =
            mean_brightness(&plane).ok_or(PreprocessError::EmptyImage { width, height })?;
        let factor = brightness_factor(brightness);
        log::debug!(
            "Brightness {:.3} -> factor {:.3} for {}x{} image",
            brightness,
            factor,
            width,
            height
        );
        let plane = adjust_brightness(&plane, factor);

        let plane = sharpen(&plane, SHARPNESS_FACTOR);
        let plane = median_filter(&plane, MEDIAN_KERNEL);

        array_to_rgb(&plane)
    }
}
