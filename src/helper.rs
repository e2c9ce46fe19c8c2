use crate::qrcode::QrCode;

use image::codecs::png::PngEncoder;
use image::{GrayImage, ImageBuffer, Luma};
use std::io::Write;

/// Modules of light margin a reader needs around the symbol.
pub const QUIET_ZONE: u32 = 4;

/// Renders a QR Code into a greyscale raster.
///
/// # Arguments
///
/// * `qr` - The symbol to draw.
/// * `scale` - Pixels per module, at least 1.
/// * `border` - Light modules of margin on every side.
///
/// # Example
///
/// ```rust
/// use qrport::helper::rasterize;
/// use qrport::qrcode::{QrCode, QrCodeEcc};
///
/// let qr = QrCode::encode_text("Hello, world!", QrCodeEcc::Low).unwrap();
/// let img = rasterize(&qr, 1, 4);
/// assert_eq!(img.dimensions(), (29, 29));
/// ```
pub fn rasterize(qr: &QrCode, scale: u32, border: u32) -> GrayImage {
    let scale = scale.max(1);
    let side = (qr.size() as u32 + 2 * border) * scale;
    let mut img = ImageBuffer::new(side, side);

    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let qr_x = (x / scale) as i32 - border as i32;
        let qr_y = (y / scale) as i32 - border as i32;
        *pixel = if qr.get_module(qr_x, qr_y) {
            Luma([0u8]) // Black
        } else {
            Luma([255u8]) // White
        };
    }

    img
}

/// Encodes the raster as an 8-bit greyscale PNG into `writer`.
///
/// The writer is not flushed; callers owning a buffered handle flush it themselves.
pub fn write_png<W: Write>(img: &GrayImage, writer: W) -> Result<(), image::ImageError> {
    img.write_with_encoder(PngEncoder::new(writer))
}

// Tests
#[cfg(test)]
mod tests {
    use super::*;
    use crate::qrcode::QrCodeEcc;

    #[test]
    fn test_rasterize_dimensions() {
        let qr = QrCode::encode_text("Hello, world!", QrCodeEcc::Low).unwrap();

        // Version 1 is 21 modules; a border of 4 on each side gives 29.
        assert_eq!(rasterize(&qr, 1, QUIET_ZONE).dimensions(), (29, 29));
        assert_eq!(rasterize(&qr, 10, QUIET_ZONE).dimensions(), (290, 290));
    }

    #[test]
    fn test_rasterize_scales_modules() {
        let qr = QrCode::encode_text("HELLO", QrCodeEcc::Medium).unwrap();
        let img = rasterize(&qr, 3, QUIET_ZONE);

        // Quiet zone is white, the finder's top-left corner is black.
        assert_eq!(img.get_pixel(0, 0), &Luma([255u8]));
        let origin = QUIET_ZONE * 3;
        for dy in 0..3 {
            for dx in 0..3 {
                assert_eq!(img.get_pixel(origin + dx, origin + dy), &Luma([0u8]));
            }
        }
    }

    #[test]
    fn test_write_png_signature() {
        let qr = QrCode::encode_text("1234", QrCodeEcc::Low).unwrap();
        let img = rasterize(&qr, 2, QUIET_ZONE);
        let mut bytes = Vec::new();
        write_png(&img, &mut bytes).unwrap();

        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        let decoded = image::load_from_memory(&bytes).unwrap().to_luma8();
        assert_eq!(decoded, img);
    }
}
