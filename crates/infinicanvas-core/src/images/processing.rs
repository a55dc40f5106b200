//! Raster helpers: aspect-ratio fitting, header probing and colour filters.

use image::{ImageReader, ImageResult, RgbaImage};
use kurbo::Size;
use std::io::Cursor;

/// Fit `original` into a `target` box without changing its aspect ratio.
///
/// The width is tried first; if the resulting height overflows the box the
/// height is pinned instead.
pub fn resize_with_aspect_ratio(original: Size, target: Size) -> Size {
    if original.width <= 0.0 || original.height <= 0.0 {
        return target;
    }
    let aspect = original.width / original.height;
    let height = target.width / aspect;
    if height > target.height {
        Size::new(target.height * aspect, target.height)
    } else {
        Size::new(target.width, height)
    }
}

/// Pixel dimensions of an encoded image, read from its header.
pub fn image_dimensions(bytes: &[u8]) -> ImageResult<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_dimensions()
}

/// Filter strengths, each in `-100..=100` with 0 meaning unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ImageFilters {
    pub brightness: f64,
    pub contrast: f64,
    pub saturation: f64,
}

impl ImageFilters {
    pub fn is_identity(&self) -> bool {
        self.brightness == 0.0 && self.contrast == 0.0 && self.saturation == 0.0
    }
}

/// Apply brightness, then contrast, then saturation to every pixel.
///
/// Channels are clamped to `0..=255` once at the end; alpha is untouched.
pub fn apply_image_filters(source: &RgbaImage, filters: ImageFilters) -> RgbaImage {
    let mut result = source.clone();
    if filters.is_identity() {
        return result;
    }

    let brightness = 1.0 + filters.brightness.clamp(-100.0, 100.0) / 100.0;
    let contrast = 1.0 + filters.contrast.clamp(-100.0, 100.0) / 100.0;
    let saturation = 1.0 + filters.saturation.clamp(-100.0, 100.0) / 100.0;

    for pixel in result.pixels_mut() {
        let [r, g, b, _] = pixel.0;
        let mut rgb = [f64::from(r), f64::from(g), f64::from(b)];

        if filters.brightness != 0.0 {
            for c in &mut rgb {
                *c *= brightness;
            }
        }
        if filters.contrast != 0.0 {
            for c in &mut rgb {
                *c = (*c - 128.0) * contrast + 128.0;
            }
        }
        if filters.saturation != 0.0 {
            let gray = 0.2989 * rgb[0] + 0.5870 * rgb[1] + 0.1140 * rgb[2];
            for c in &mut rgb {
                *c = gray + saturation * (*c - gray);
            }
        }

        for (channel, value) in pixel.0.iter_mut().zip(rgb) {
            *channel = value.round().clamp(0.0, 255.0) as u8;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};

    #[test]
    fn test_resize_landscape() {
        let size = resize_with_aspect_ratio(Size::new(400.0, 200.0), Size::new(200.0, 200.0));
        assert!((size.width - 200.0).abs() < f64::EPSILON);
        assert!((size.height - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_resize_portrait() {
        let size = resize_with_aspect_ratio(Size::new(100.0, 400.0), Size::new(200.0, 200.0));
        assert!((size.width - 50.0).abs() < f64::EPSILON);
        assert!((size.height - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_resize_degenerate() {
        let target = Size::new(200.0, 200.0);
        assert_eq!(resize_with_aspect_ratio(Size::new(0.0, 10.0), target), target);
    }

    #[test]
    fn test_image_dimensions_png() {
        let img = RgbaImage::from_pixel(7, 3, Rgba([1, 2, 3, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        assert_eq!(image_dimensions(&bytes).unwrap(), (7, 3));
    }

    #[test]
    fn test_image_dimensions_garbage() {
        assert!(image_dimensions(b"definitely not an image").is_err());
    }

    #[test]
    fn test_identity_filters() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 40]));
        assert_eq!(apply_image_filters(&img, ImageFilters::default()), img);
    }

    #[test]
    fn test_brightness_clamps_and_keeps_alpha() {
        let img = RgbaImage::from_pixel(1, 1, Rgba([200, 100, 0, 77]));
        let filters = ImageFilters {
            brightness: 50.0,
            ..ImageFilters::default()
        };
        let out = apply_image_filters(&img, filters);
        assert_eq!(out.get_pixel(0, 0).0, [255, 150, 0, 77]);
    }

    #[test]
    fn test_full_desaturation() {
        let img = RgbaImage::from_pixel(1, 1, Rgba([255, 0, 0, 255]));
        let filters = ImageFilters {
            saturation: -100.0,
            ..ImageFilters::default()
        };
        let [r, g, b, a] = apply_image_filters(&img, filters).get_pixel(0, 0).0;
        assert_eq!(r, g);
        assert_eq!(g, b);
        assert_eq!(a, 255);
    }

    #[test]
    fn test_contrast_pivots_on_midpoint() {
        let img = RgbaImage::from_pixel(1, 1, Rgba([128, 64, 192, 255]));
        let filters = ImageFilters {
            contrast: 100.0,
            ..ImageFilters::default()
        };
        assert_eq!(apply_image_filters(&img, filters).get_pixel(0, 0).0, [128, 0, 255, 255]);
    }
}
