//! Decoding of encoded image bytes into an [`IntensityGrid`].
//!
//! Callers fetch the bytes (file, URL, upload); this module only decodes.

use image::ImageFormat;

use crate::error::{Error, Result};
use crate::grid::IntensityGrid;

/// Formats accepted for analysis input.
pub const SUPPORTED_FORMATS: [ImageFormat; 3] =
    [ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::WebP];

/// Sniff the container format from magic bytes.
pub fn sniff_format(bytes: &[u8]) -> Result<ImageFormat> {
    let format = image::guess_format(bytes)
        .map_err(|e| Error::InvalidInput(format!("unrecognised image data: {e}")))?;
    if !SUPPORTED_FORMATS.contains(&format) {
        return Err(Error::InvalidInput(format!("unsupported image format {format:?}")));
    }
    Ok(format)
}

/// Decode PNG/JPEG/WebP bytes to a single-channel grid (luma conversion
/// for colour input).
pub fn decode_grayscale(bytes: &[u8]) -> Result<IntensityGrid> {
    let format = sniff_format(bytes)?;
    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| Error::InvalidInput(format!("failed to decode image: {e}")))?;
    let grid = IntensityGrid::from_gray_image(img.to_luma8());
    grid.ensure_non_degenerate()?;
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, RgbImage};
    use std::io::Cursor;

    fn encode(img: image::DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    #[test]
    fn decodes_grayscale_png() {
        let mut img = GrayImage::new(2, 2);
        img.put_pixel(0, 0, Luma([0]));
        img.put_pixel(1, 0, Luma([255]));
        img.put_pixel(0, 1, Luma([128]));
        img.put_pixel(1, 1, Luma([64]));
        let bytes = encode(image::DynamicImage::ImageLuma8(img), ImageFormat::Png);

        let g = decode_grayscale(&bytes).unwrap();
        assert_eq!(g.shape(), (2, 2));
        assert_eq!(g.data, vec![0, 255, 128, 64]);
    }

    #[test]
    fn colour_input_is_converted_to_luma() {
        let img = RgbImage::from_pixel(3, 2, image::Rgb([200, 200, 200]));
        let bytes = encode(image::DynamicImage::ImageRgb8(img), ImageFormat::Png);
        let g = decode_grayscale(&bytes).unwrap();
        assert_eq!(g.shape(), (2, 3));
        assert!(g.data.iter().all(|&v| v == 200));
    }

    #[test]
    fn garbage_is_invalid_input() {
        assert!(matches!(decode_grayscale(b"not-an-image"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn unsupported_container_is_rejected() {
        let img = GrayImage::new(2, 2);
        let bytes = encode(image::DynamicImage::ImageLuma8(img), ImageFormat::Bmp);
        assert!(matches!(sniff_format(&bytes), Err(Error::InvalidInput(_))));
    }
}
