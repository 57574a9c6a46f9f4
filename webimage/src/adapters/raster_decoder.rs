//! Decoder backed by the `image` crate.

use crate::decoded::DecodedImage;
use crate::format::ImageFormat;
use crate::ports::ImageDecoder;
use bytes::Bytes;
use tracing::debug;

/// Decodes JPEG and PNG payloads into [`DecodedImage`]s.
///
/// The decoded image keeps the original bytes and the sniffed format so
/// later edits always start from the source payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterDecoder;

impl RasterDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl ImageDecoder for RasterDecoder {
    fn decode(&self, bytes: &Bytes) -> Option<DecodedImage> {
        let format = ImageFormat::sniff(bytes);

        match image::load_from_memory(bytes) {
            Ok(pixels) => Some(
                DecodedImage::new(pixels)
                    .with_original_bytes(bytes.clone())
                    .with_format(format),
            ),
            Err(e) => {
                debug!(len = bytes.len(), format = %format, error = %e, "Failed to decode image");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat as RasterFormat};
    use std::io::Cursor;

    fn encode(image: &DynamicImage, format: RasterFormat) -> Bytes {
        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, format).unwrap();
        Bytes::from(buf.into_inner())
    }

    #[test]
    fn test_decode_png() {
        let bytes = encode(&DynamicImage::new_rgba8(7, 3), RasterFormat::Png);

        let decoded = RasterDecoder::new().decode(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (7, 3));
        assert_eq!(decoded.format(), ImageFormat::Png);
        assert_eq!(decoded.original_bytes(), Some(&bytes));
        assert!(decoded.edit_key().is_none());
    }

    #[test]
    fn test_decode_jpeg() {
        let bytes = encode(&DynamicImage::new_rgb8(16, 8), RasterFormat::Jpeg);

        let decoded = RasterDecoder::new().decode(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
        assert_eq!(decoded.format(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_garbage_is_rejected() {
        let decoder = RasterDecoder::new();
        assert!(decoder.decode(&Bytes::from_static(b"not an image")).is_none());
        assert!(decoder.decode(&Bytes::new()).is_none());
    }

    #[test]
    fn test_truncated_png_is_rejected() {
        let bytes = encode(&DynamicImage::new_rgba8(32, 32), RasterFormat::Png);
        let truncated = bytes.slice(..bytes.len() / 2);
        assert!(RasterDecoder::new().decode(&truncated).is_none());
    }
}
