//! Decoded image value with provenance metadata.

use crate::format::ImageFormat;
use bytes::Bytes;
use image::{DynamicImage, GenericImageView};
use std::fmt;
use std::sync::Arc;

/// A decoded image plus the metadata the loader threads through each stage.
///
/// Pixel data is shared behind an `Arc`, so clones are cheap and caches can
/// hand out the same image to many requests.
///
/// Three pieces of provenance travel with the pixels:
/// - the edit key the image currently reflects (`None` = original, unedited)
/// - the original encoded bytes it was decoded from
/// - the detected [`ImageFormat`] of those bytes
#[derive(Clone)]
pub struct DecodedImage {
    pixels: Arc<DynamicImage>,
    edit_key: Option<String>,
    original_bytes: Option<Bytes>,
    format: ImageFormat,
}

impl DecodedImage {
    /// Wraps decoded pixels with empty provenance.
    pub fn new(pixels: DynamicImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
            edit_key: None,
            original_bytes: None,
            format: ImageFormat::Unknown,
        }
    }

    /// Sets the encoded bytes this image was decoded from.
    pub fn with_original_bytes(mut self, bytes: Bytes) -> Self {
        self.original_bytes = Some(bytes);
        self
    }

    /// Sets the detected encoding format.
    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }

    /// Marks the image as the output of the editor named `key`.
    pub fn with_edit_key(mut self, key: impl Into<String>) -> Self {
        self.edit_key = Some(key.into());
        self
    }

    /// Stamps editor output: records the edit key and carries the original
    /// bytes and format forward from `source`, the pre-edit image.
    pub(crate) fn stamped(mut self, key: &str, source: &DecodedImage) -> Self {
        self.edit_key = Some(key.to_owned());
        self.original_bytes = source.original_bytes.clone();
        self.format = source.format;
        self
    }

    pub fn pixels(&self) -> &DynamicImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Returns true if the image has no area.
    pub fn is_empty(&self) -> bool {
        let (width, height) = self.pixels.dimensions();
        width == 0 || height == 0
    }

    /// Key of the edit this image reflects, `None` for the original.
    pub fn edit_key(&self) -> Option<&str> {
        self.edit_key.as_deref()
    }

    /// Encoded bytes the original image was decoded from.
    pub fn original_bytes(&self) -> Option<&Bytes> {
        self.original_bytes.as_ref()
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Approximate in-memory footprint of the pixel buffer, in bytes.
    pub fn byte_cost(&self) -> usize {
        self.pixels.as_bytes().len()
    }

    /// Returns true if both values share the same pixel allocation.
    pub fn shares_pixels_with(&self, other: &DecodedImage) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }
}

impl fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("edit_key", &self.edit_key)
            .field(
                "original_bytes",
                &self.original_bytes.as_ref().map(|b| b.len()),
            )
            .field("format", &self.format)
            .finish()
    }
}
