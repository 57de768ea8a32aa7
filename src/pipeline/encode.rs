//! Image encoding: canonical PNG bytes → base64 data URL.
//!
//! The Responses API takes images inline as `data:` URLs inside the JSON
//! request body. The bytes are already PNG after preprocessing, so this
//! stage only wraps them; it never re-encodes pixels.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

/// An image attachment ready for the request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// `data:image/png;base64,…`
    pub data_url: String,
    /// Size of the raw PNG.
    pub raw_bytes: usize,
    /// Length of the base64 payload alone.
    pub base64_chars: usize,
}

/// Wrap canonical PNG bytes as a base64 data URL.
pub fn encode_png_data_url(png: &[u8]) -> EncodedImage {
    let b64 = STANDARD.encode(png);
    debug!("Encoded image → {} bytes base64", b64.len());

    EncodedImage {
        data_url: format!("data:image/png;base64,{b64}"),
        raw_bytes: png.len(),
        base64_chars: b64.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_prefix_and_payload() {
        let encoded = encode_png_data_url(b"\x89PNG\r\n\x1a\n");
        assert!(encoded.data_url.starts_with("data:image/png;base64,"));
        let payload = encoded
            .data_url
            .strip_prefix("data:image/png;base64,")
            .unwrap();
        assert_eq!(STANDARD.decode(payload).unwrap(), b"\x89PNG\r\n\x1a\n");
        assert_eq!(encoded.raw_bytes, 8);
        assert_eq!(encoded.base64_chars, payload.len());
    }

    #[test]
    fn empty_input_still_yields_prefix() {
        let encoded = encode_png_data_url(&[]);
        assert_eq!(encoded.data_url, "data:image/png;base64,");
        assert_eq!(encoded.base64_chars, 0);
    }
}
