//! Upload validation: size limit and image signature.
//!
//! ## Why check magic bytes ourselves?
//!
//! The decoder would reject most garbage on its own, but only after
//! allocating for it, and its error text is not something a client can act
//! on. Checking the signature up front turns "this is a GIF" into an input
//! error before any pixel work or network call happens. Only JPEG and PNG
//! are accepted because those are what phones and scanners produce for
//! roster screenshots.

use crate::error::RosterError;
use std::fmt;
use tracing::debug;

const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Image container detected from the leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    /// Detect the container from the file signature.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(PNG_MAGIC) {
            Some(ImageKind::Png)
        } else if bytes.starts_with(JPEG_MAGIC) {
            Some(ImageKind::Jpeg)
        } else {
            None
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageKind::Jpeg => f.write_str("JPEG"),
            ImageKind::Png => f.write_str("PNG"),
        }
    }
}

/// Validate raw upload bytes before any processing.
///
/// Checks, in order: non-empty, at most `max_bytes`, JPEG or PNG signature.
pub fn validate_upload(bytes: &[u8], max_bytes: usize) -> Result<ImageKind, RosterError> {
    if bytes.is_empty() {
        return Err(RosterError::EmptyImage);
    }
    if bytes.len() > max_bytes {
        return Err(RosterError::ImageTooLarge {
            size: bytes.len(),
            max: max_bytes,
        });
    }

    let kind = ImageKind::sniff(bytes).ok_or_else(|| RosterError::UnsupportedImageType {
        magic: bytes.iter().take(PNG_MAGIC.len()).copied().collect(),
    })?;

    debug!("Validated upload: {} bytes, {}", bytes.len(), kind);
    Ok(kind)
}
