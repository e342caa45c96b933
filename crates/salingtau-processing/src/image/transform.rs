//! Pixel work for image renditions: type sniffing, square crop, resize and
//! AVIF encoding. Everything here is synchronous and CPU bound; callers run it
//! on the blocking pool.

use ::image::imageops::FilterType;
use ::image::{DynamicImage, GenericImageView, ImageFormat, RgbaImage};
use rgb::FromSlice;
use salingtau_core::constants::{
    ALLOWED_IMAGE_CONTENT_TYPES, AVIF_QUALITY_RANGE, AVIF_SPEED_RANGE,
};

use crate::error::{PipelineError, PipelineResult};

/// Content type and canonical extension derived from the bytes themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedImage {
    pub format: ImageFormat,
    pub mime: &'static str,
    pub extension: &'static str,
}

/// Identify the image type from its magic bytes, ignoring whatever the
/// uploader claimed. Only JPEG, PNG, WebP and GIF are accepted.
pub fn detect_image_type(data: &[u8]) -> PipelineResult<DetectedImage> {
    let format = ::image::guess_format(data)
        .map_err(|_| PipelineError::Validation("unrecognised image content".to_string()))?;

    let mime = format.to_mime_type();
    if !ALLOWED_IMAGE_CONTENT_TYPES.contains(&mime) {
        return Err(PipelineError::Validation(format!(
            "image type {:?} is not allowed",
            format
        )));
    }
    let extension = format.extensions_str().first().copied().ok_or_else(|| {
        PipelineError::Validation(format!("image type {:?} has no extension", format))
    })?;

    Ok(DetectedImage {
        format,
        mime,
        extension,
    })
}

/// Decode with the detected format; a body that sniffs as an image but does
/// not decode is treated the same as an unsupported type.
pub fn decode(data: &[u8], detected: &DetectedImage) -> PipelineResult<DynamicImage> {
    ::image::load_from_memory_with_format(data, detected.format)
        .map_err(|e| PipelineError::Validation(format!("image could not be decoded: {}", e)))
}

/// Largest centred square inside a `width` x `height` image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub left: u32,
    pub top: u32,
    pub size: u32,
}

pub fn square_crop_region(width: u32, height: u32) -> CropRegion {
    let size = width.min(height);
    CropRegion {
        left: (width - size) / 2,
        top: (height - size) / 2,
        size,
    }
}

/// Centre-crop to a square and resize it to exactly `resolution` pixels a side.
/// Smaller sources are scaled up.
pub fn render_square(image: &DynamicImage, resolution: u32) -> RgbaImage {
    let (width, height) = image.dimensions();
    let region = square_crop_region(width, height);

    image
        .crop_imm(region.left, region.top, region.size, region.size)
        .resize_exact(resolution, resolution, FilterType::Lanczos3)
        .to_rgba8()
}

/// Encode RGBA pixels as AVIF. ravif keeps chroma at full resolution.
pub fn encode_avif(image: &RgbaImage, quality: u8, speed: u8) -> PipelineResult<Vec<u8>> {
    // ravif asserts on these instead of returning an error
    if !AVIF_QUALITY_RANGE.contains(&quality) || !AVIF_SPEED_RANGE.contains(&speed) {
        return Err(PipelineError::Encode(format!(
            "quality {} / speed {} outside the encoder range",
            quality, speed
        )));
    }

    let (width, height) = image.dimensions();
    let pixels = image.as_raw().as_rgba();
    let frame = ravif::Img::new(pixels, width as usize, height as usize);

    let encoded = ravif::Encoder::new()
        .with_quality(f32::from(quality))
        .with_speed(speed)
        .encode_rgba(frame)
        .map_err(|e| PipelineError::Encode(e.to_string()))?;

    Ok(encoded.avif_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::image::{Rgba, RgbaImage};
    use std::io::Cursor;

    fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([30, 120, 200, 255]));
        let mut buffer = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);
        DynamicImage::ImageRgba8(img)
            .to_rgb8()
            .write_to(&mut cursor, format)
            .unwrap();
        buffer
    }

    #[test]
    fn crop_region_is_centred() {
        assert_eq!(
            square_crop_region(300, 200),
            CropRegion {
                left: 50,
                top: 0,
                size: 200
            }
        );
        assert_eq!(
            square_crop_region(201, 400),
            CropRegion {
                left: 0,
                top: 99,
                size: 201
            }
        );
        assert_eq!(
            square_crop_region(64, 64),
            CropRegion {
                left: 0,
                top: 0,
                size: 64
            }
        );
    }

    #[test]
    fn odd_remainder_rounds_down() {
        let region = square_crop_region(105, 100);
        assert_eq!(region.left, 2);
        assert_eq!(region.size, 100);
    }

    #[test]
    fn detects_from_content_not_name() {
        let png = detect_image_type(&encoded(4, 4, ImageFormat::Png)).unwrap();
        assert_eq!(png.mime, "image/png");
        assert_eq!(png.extension, "png");

        let jpeg = detect_image_type(&encoded(4, 4, ImageFormat::Jpeg)).unwrap();
        assert_eq!(jpeg.mime, "image/jpeg");
        assert_eq!(jpeg.extension, "jpg");
    }

    #[test]
    fn rejects_disallowed_and_unknown_content() {
        let mut bmp = b"BM".to_vec();
        bmp.extend_from_slice(&[0u8; 64]);
        assert!(matches!(
            detect_image_type(&bmp),
            Err(PipelineError::Validation(_))
        ));
        assert!(matches!(
            detect_image_type(b"definitely not pixels"),
            Err(PipelineError::Validation(_))
        ));
    }

    #[test]
    fn truncated_body_fails_to_decode() {
        let png = encoded(16, 16, ImageFormat::Png);
        let detected = detect_image_type(&png).unwrap();
        let result = decode(&png[..png.len() / 2], &detected);
        assert!(matches!(result, Err(PipelineError::Validation(_))));
    }

    #[test]
    fn render_square_scales_up_and_down() {
        let source = DynamicImage::ImageRgba8(RgbaImage::from_pixel(300, 200, Rgba([0, 0, 0, 255])));
        assert_eq!(render_square(&source, 128).dimensions(), (128, 128));
        assert_eq!(render_square(&source, 512).dimensions(), (512, 512));
    }

    #[test]
    fn encodes_avif() {
        let square = RgbaImage::from_pixel(16, 16, Rgba([200, 10, 10, 255]));
        let avif = encode_avif(&square, 80, 10).unwrap();
        assert!(!avif.is_empty());
        assert_eq!(&avif[4..8], b"ftyp");
    }

    #[test]
    fn out_of_range_encoder_settings_are_errors() {
        let square = RgbaImage::from_pixel(8, 8, Rgba([200, 10, 10, 255]));
        for (quality, speed) in [(0, 8), (150, 8), (80, 0), (80, 11)] {
            assert!(matches!(
                encode_avif(&square, quality, speed),
                Err(PipelineError::Encode(_))
            ));
        }
    }
}
