//! Image byte helpers shared by the codecs.

use std::io::Cursor;
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::GenericImageView as _;
use ndarray::Array2;

use crate::format::error::FormatError;

/// Read the raw bytes of an image file.
pub(crate) fn load_image_bytes(path: &Path) -> Result<Vec<u8>, FormatError> {
    Ok(std::fs::read(path)?)
}

/// Measure the pixel dimensions of encoded image bytes.
pub(crate) fn image_dimensions(bytes: &[u8]) -> Result<(u32, u32), FormatError> {
    let img = image::load_from_memory(bytes)?;
    Ok(img.dimensions())
}

/// Decode a base64 bitmap into a boolean mask (rows = height, cols = width).
///
/// Any pixel with luma above half intensity counts as set.
pub(crate) fn decode_mask(encoded: &str) -> Result<Array2<bool>, FormatError> {
    let bytes = BASE64.decode(encoded)?;
    let img = image::load_from_memory(&bytes)?.to_luma8();
    let (width, height) = (img.width() as usize, img.height() as usize);
    Ok(Array2::from_shape_fn((height, width), |(y, x)| {
        img.get_pixel(x as u32, y as u32).0[0] > 127
    }))
}

/// Encode a boolean mask as a base64 PNG bitmap.
pub(crate) fn encode_mask(mask: &Array2<bool>) -> Result<String, FormatError> {
    let (height, width) = mask.dim();
    let img = image::GrayImage::from_fn(width as u32, height as u32, |x, y| {
        image::Luma([if mask[[y as usize, x as usize]] { 255u8 } else { 0 }])
    });
    let mut bytes = Vec::new();
    image::DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;
    Ok(BASE64.encode(bytes))
}

/// Encode a tiny solid PNG, used by tests that need valid image bytes.
#[cfg(test)]
pub(crate) fn test_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::GrayImage::from_pixel(width, height, image::Luma([128u8]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions_of_generated_png() {
        let bytes = test_png(12, 7);
        assert_eq!(image_dimensions(&bytes).unwrap(), (12, 7));
    }

    #[test]
    fn test_mask_roundtrip() {
        let mask = Array2::from_shape_fn((4, 6), |(y, x)| (x + y) % 2 == 0);
        let encoded = encode_mask(&mask).unwrap();
        let decoded = decode_mask(&encoded).unwrap();
        assert_eq!(decoded, mask);
    }

    #[test]
    fn test_bad_base64_is_error() {
        assert!(matches!(
            decode_mask("not base64!!!"),
            Err(FormatError::Base64(_))
        ));
    }

    #[test]
    fn test_bad_image_bytes_is_error() {
        let encoded = BASE64.encode(b"definitely not a png");
        assert!(matches!(decode_mask(&encoded), Err(FormatError::Image(_))));
    }
}
