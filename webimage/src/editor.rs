//! Named, pure image transforms applied per request.

use crate::decoded::DecodedImage;
use bytes::Bytes;
use image::imageops::FilterType;
use std::fmt;
use std::sync::Arc;

/// Signature of an editor transform.
///
/// Receives the decoded image and the original encoded bytes it came from.
/// Returning `None` signals the edit is inapplicable to this input.
pub type EditFn = dyn Fn(&DecodedImage, Option<&Bytes>) -> Option<DecodedImage> + Send + Sync;

/// A named transform applied to a decoded image.
///
/// The key identifies the output variant. A cached image whose edit key equals
/// the editor's key already reflects the transform and is returned as-is.
///
/// # Example
///
/// ```
/// use webimage::Editor;
///
/// let flip = Editor::new("flip-h", |image, _original| {
///     Some(webimage::DecodedImage::new(image.pixels().fliph()))
/// });
/// assert_eq!(flip.key(), "flip-h");
/// ```
#[derive(Clone)]
pub struct Editor {
    key: Arc<str>,
    transform: Arc<EditFn>,
}

impl Editor {
    /// Creates an editor from a key and a pure transform.
    pub fn new<F>(key: impl Into<String>, transform: F) -> Self
    where
        F: Fn(&DecodedImage, Option<&Bytes>) -> Option<DecodedImage> + Send + Sync + 'static,
    {
        Self {
            key: Arc::from(key.into()),
            transform: Arc::new(transform),
        }
    }

    /// Converts the image to 8-bit luma, keeping any alpha channel.
    pub fn grayscale() -> Self {
        Self::new("grayscale", |image, _| {
            Some(DecodedImage::new(image.pixels().grayscale()))
        })
    }

    /// Scales the image down so its longest edge is at most `max_edge` pixels,
    /// keeping the aspect ratio. Images already within bounds and a zero
    /// bound are rejected as inapplicable.
    pub fn thumbnail(max_edge: u32) -> Self {
        Self::new(format!("thumbnail:{max_edge}"), move |image, _| {
            if max_edge == 0 || image.width().max(image.height()) <= max_edge {
                return None;
            }
            let scaled = image
                .pixels()
                .resize(max_edge, max_edge, FilterType::Triangle);
            Some(DecodedImage::new(scaled))
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns true if `image` already reflects this editor's output.
    pub fn is_reflected_by(&self, image: &DecodedImage) -> bool {
        image.edit_key() == Some(self.key())
    }

    /// Runs the transform and stamps the result's provenance.
    ///
    /// The transform always receives the image's *original* bytes, never the
    /// bytes of a previous edit, so edits do not compound.
    pub fn apply(&self, image: &DecodedImage) -> Option<DecodedImage> {
        let edited = (self.transform)(image, image.original_bytes())?;
        Some(edited.stamped(&self.key, image))
    }
}

impl fmt::Debug for Editor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Editor").field("key", &self.key).finish()
    }
}
