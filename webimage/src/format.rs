//! Image format detection from raw bytes.
//!
//! Detection only inspects the leading byte, which is enough to tell the two
//! formats the loader cares about apart. Anything else is reported as
//! [`ImageFormat::Unknown`] and left to the decoder.

use std::fmt;

/// First byte of every JPEG stream (SOI marker `FF D8`).
const JPEG_LEAD_BYTE: u8 = 0xFF;

/// First byte of the PNG signature (`89 50 4E 47`).
const PNG_LEAD_BYTE: u8 = 0x89;

/// Encoded format of an image payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageFormat {
    /// Format could not be determined from the payload.
    #[default]
    Unknown,
    /// JPEG / JFIF.
    Jpeg,
    /// Portable Network Graphics.
    Png,
}

impl ImageFormat {
    /// Detects the format of `data` from its leading byte.
    ///
    /// # Example
    ///
    /// ```
    /// use webimage::ImageFormat;
    ///
    /// assert_eq!(ImageFormat::sniff(&[0x89, b'P', b'N', b'G']), ImageFormat::Png);
    /// assert_eq!(ImageFormat::sniff(&[0xFF, 0xD8]), ImageFormat::Jpeg);
    /// assert_eq!(ImageFormat::sniff(&[]), ImageFormat::Unknown);
    /// ```
    pub fn sniff(data: &[u8]) -> Self {
        match data.first() {
            Some(&JPEG_LEAD_BYTE) => Self::Jpeg,
            Some(&PNG_LEAD_BYTE) => Self::Png,
            _ => Self::Unknown,
        }
    }

    /// MIME type used when re-encoding an image of this format.
    ///
    /// Unknown payloads are re-encoded losslessly, so they map to PNG.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png | Self::Unknown => "image/png",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Jpeg => write!(f, "JPEG"),
            Self::Png => write!(f, "PNG"),
        }
    }
}
