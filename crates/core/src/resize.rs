use image::imageops::FilterType;
use image::DynamicImage;

use crate::derivative::Size;

/// The image transform used to build derivatives.
pub trait Resizer: Send + Sync {
    /// Scale to `width`, preserving the aspect ratio.
    fn scale_to_width(&self, image: &DynamicImage, width: u32) -> DynamicImage;

    /// Scale to cover `width`×`height` and crop the overflow, centred.
    fn crop_to_fill(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage;

    fn apply(&self, image: &DynamicImage, size: Size) -> DynamicImage {
        match size {
            Size::Width(width) => self.scale_to_width(image, width),
            Size::Crop { width, height } => self.crop_to_fill(image, width, height),
        }
    }
}

/// [`Resizer`] backed by the `image` crate.
#[derive(Debug, Clone, Copy)]
pub struct ImageResizer {
    filter: FilterType,
}

impl ImageResizer {
    pub fn new(filter: FilterType) -> Self {
        Self { filter }
    }
}

impl Default for ImageResizer {
    fn default() -> Self {
        Self::new(FilterType::Lanczos3)
    }
}

impl Resizer for ImageResizer {
    fn scale_to_width(&self, image: &DynamicImage, width: u32) -> DynamicImage {
        let height = scaled_height(image.width(), image.height(), width);
        image.resize_exact(width, height, self.filter)
    }

    fn crop_to_fill(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        image.resize_to_fill(width, height, self.filter)
    }
}

/// Height that keeps the aspect ratio at `width`, rounded to nearest, never 0.
pub fn scaled_height(orig_width: u32, orig_height: u32, width: u32) -> u32 {
    if orig_width == 0 {
        return orig_height.max(1);
    }
    let h = (orig_height as f64 * width as f64 / orig_width as f64).round();
    (h as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_height_rounds_to_nearest() {
        assert_eq!(scaled_height(400, 300, 200), 150);
        assert_eq!(scaled_height(3, 2, 200), 133);
        assert_eq!(scaled_height(1000, 1, 10), 1);
    }

    #[test]
    fn crop_fills_exact_box() {
        let image = DynamicImage::new_rgb8(400, 300);
        let out = ImageResizer::default().apply(
            &image,
            Size::Crop {
                width: 120,
                height: 120,
            },
        );
        assert_eq!((out.width(), out.height()), (120, 120));
    }
}
