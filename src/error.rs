//! Error types for the ros2cal library.
//!
//! A single fatal error type, [`RosterError`], covers the whole pipeline: a
//! conversion either fully succeeds (both inference stages complete and the
//! roster validates) or fails with one of these variants. There is no
//! partial-result channel.
//!
//! Variants fall into four classes (see [`ErrorClass`]) so an embedding
//! service can map them onto its own status codes without matching every
//! variant:
//!
//! * **Input** — the caller sent something we cannot use (bad image, unknown
//!   output format, oversized upload).
//! * **Configuration** — the operator must fix something (missing API key,
//!   invalid time zone).
//! * **Upstream** — the inference backend failed or returned unusable output.
//!   Retryable by the caller; never retried internally.
//! * **Internal** — local encode/write failures.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage, used to label where a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Image canonicalisation.
    Preprocess,
    /// Stage 1: image → transcribed text.
    Transcribe,
    /// Stage 2: text → roster JSON.
    Parse,
    /// Roster → ICS rendering.
    Export,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Preprocess => "preprocess",
            Stage::Transcribe => "transcribe",
            Stage::Parse => "parse",
            Stage::Export => "export",
        };
        f.write_str(name)
    }
}

/// Coarse error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Client fault: the request itself is unusable.
    Input,
    /// Server fault that needs operator intervention.
    Configuration,
    /// Server fault caused by the inference backend; caller may retry.
    Upstream,
    /// Local failure that is neither input nor upstream related.
    Internal,
}

/// All errors returned by the ros2cal library.
#[derive(Debug, Error)]
pub enum RosterError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The upload contained no bytes.
    #[error("image is required")]
    EmptyImage,

    /// The upload exceeds the configured size limit.
    #[error("image exceeds max size ({size} bytes > {max} bytes)")]
    ImageTooLarge { size: usize, max: usize },

    /// The upload is neither a JPEG nor a PNG according to its magic bytes.
    #[error("image must be JPG or PNG (first bytes: {magic:02X?})")]
    UnsupportedImageType { magic: Vec<u8> },

    /// The bytes claim to be an image but cannot be decoded.
    #[error("invalid image content: {detail}")]
    InvalidImage { detail: String },

    /// The requested output format is not `json` or `ics`.
    #[error("format must be JSON or ICS, got '{format}'")]
    UnsupportedFormat { format: String },

    /// Caller-supplied roster JSON does not match the roster schema.
    #[error("roster JSON is invalid: {detail}")]
    InvalidRoster { detail: String },

    /// An input file (image or stored roster JSON) could not be read.
    #[error("Failed to read input file '{path}': {source}")]
    InputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Configuration errors ──────────────────────────────────────────────
    /// No inference credential is configured.
    #[error("OPENAI_API_KEY is not configured.\nSet it in the environment or pass --api-key.")]
    MissingApiKey,

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Upstream errors ───────────────────────────────────────────────────
    /// The request never produced an HTTP response (DNS, TLS, connection
    /// reset) or the response body could not be read.
    #[error("OpenAI {stage} request failed: {detail}")]
    UpstreamRequestFailed { stage: Stage, detail: String },

    /// The backend answered with a non-success status.
    #[error("OpenAI {stage} request returned HTTP {status}: {message}")]
    UpstreamStatus {
        stage: Stage,
        status: u16,
        message: String,
    },

    /// The request deadline expired.
    #[error("OpenAI {stage} request timed out after {secs}s")]
    UpstreamTimeout { stage: Stage, secs: u64 },

    /// The backend answered but produced no text.
    #[error("OpenAI {stage} response missing output text")]
    EmptyOutput { stage: Stage },

    /// Stage-2 output is not a JSON object matching the roster schema.
    #[error("OpenAI response was not valid JSON: {detail}")]
    InvalidJson { detail: String },

    // ── Internal errors ───────────────────────────────────────────────────
    /// Re-encoding the canonical PNG failed.
    #[error("Failed to encode PNG: {detail}")]
    EncodeError { detail: String },

    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RosterError {
    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            RosterError::EmptyImage
            | RosterError::ImageTooLarge { .. }
            | RosterError::UnsupportedImageType { .. }
            | RosterError::InvalidImage { .. }
            | RosterError::UnsupportedFormat { .. }
            | RosterError::InvalidRoster { .. }
            | RosterError::InputReadFailed { .. } => ErrorClass::Input,
            RosterError::MissingApiKey | RosterError::InvalidConfig(_) => {
                ErrorClass::Configuration
            }
            RosterError::UpstreamRequestFailed { .. }
            | RosterError::UpstreamStatus { .. }
            | RosterError::UpstreamTimeout { .. }
            | RosterError::EmptyOutput { .. }
            | RosterError::InvalidJson { .. } => ErrorClass::Upstream,
            RosterError::EncodeError { .. }
            | RosterError::OutputWriteFailed { .. }
            | RosterError::Internal(_) => ErrorClass::Internal,
        }
    }

    /// Whether a caller could reasonably retry the same request.
    ///
    /// Only upstream failures qualify. A 4xx from the backend other than
    /// 408/429 means the request itself was rejected and will be rejected
    /// again.
    pub fn is_retryable(&self) -> bool {
        match self {
            RosterError::UpstreamStatus { status, .. } => {
                *status == 408 || *status == 429 || *status >= 500
            }
            other => other.class() == ErrorClass::Upstream,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes() {
        assert_eq!(RosterError::EmptyImage.class(), ErrorClass::Input);
        assert_eq!(
            RosterError::UnsupportedFormat {
                format: "xml".into()
            }
            .class(),
            ErrorClass::Input
        );
        assert_eq!(RosterError::MissingApiKey.class(), ErrorClass::Configuration);
        assert_eq!(
            RosterError::InvalidJson {
                detail: "eof".into()
            }
            .class(),
            ErrorClass::Upstream
        );
        assert_eq!(
            RosterError::EncodeError {
                detail: "x".into()
            }
            .class(),
            ErrorClass::Internal
        );
    }

    #[test]
    fn retryable_only_upstream() {
        assert!(RosterError::UpstreamTimeout {
            stage: Stage::Transcribe,
            secs: 90
        }
        .is_retryable());
        assert!(RosterError::EmptyOutput {
            stage: Stage::Parse
        }
        .is_retryable());
        assert!(!RosterError::MissingApiKey.is_retryable());
        assert!(!RosterError::EmptyImage.is_retryable());
    }

    #[test]
    fn upstream_status_retryability() {
        let status = |status| RosterError::UpstreamStatus {
            stage: Stage::Parse,
            status,
            message: "x".into(),
        };
        assert!(status(429).is_retryable());
        assert!(status(503).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(!status(401).is_retryable());
    }

    #[test]
    fn upstream_display_names_stage() {
        let e = RosterError::UpstreamStatus {
            stage: Stage::Transcribe,
            status: 502,
            message: "bad gateway".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("transcribe"), "got: {msg}");
        assert!(msg.contains("502"), "got: {msg}");
    }

    #[test]
    fn too_large_display() {
        let e = RosterError::ImageTooLarge { size: 10, max: 5 };
        assert!(e.to_string().contains("10 bytes > 5 bytes"));
    }

    #[test]
    fn unsupported_type_shows_magic() {
        let e = RosterError::UnsupportedImageType {
            magic: vec![0x47, 0x49, 0x46],
        };
        assert!(e.to_string().contains("47"), "got: {e}");
    }
}
