//! Decode port definition.

use crate::decoded::DecodedImage;
use bytes::Bytes;

/// Turns encoded bytes into a decoded image.
///
/// Called on the blocking executor, so implementations may do heavy work
/// synchronously. The returned image should carry the original bytes and the
/// detected format so later edits can start from the source payload.
pub trait ImageDecoder: Send + Sync + 'static {
    /// Decodes `bytes`, returning `None` for malformed input.
    fn decode(&self, bytes: &Bytes) -> Option<DecodedImage>;
}
