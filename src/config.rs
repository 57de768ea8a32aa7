//! Configuration types for roster conversion.
//!
//! Every knob lives in [`RosterConfig`], built via [`RosterConfigBuilder`].
//! The IANA time-zone id is parsed once, in [`RosterConfigBuilder::build`],
//! so the exporter never has to deal with an invalid zone.

use crate::error::RosterError;
use crate::progress::ProgressCallback;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default OpenAI Responses API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// Default model for the vision transcription stage.
pub const DEFAULT_OCR_MODEL: &str = "gpt-4.1";
/// Default model for the text → JSON stage.
pub const DEFAULT_PARSE_MODEL: &str = "gpt-5.1";
/// Default zone for local times shown in event descriptions.
pub const DEFAULT_LOCAL_TZ: &str = "Europe/Berlin";
pub const DEFAULT_CALENDAR_NAME: &str = "Roster";
/// Default upload limit: 5 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Configuration for a roster conversion.
///
/// # Example
/// ```rust
/// use ros2cal::RosterConfig;
///
/// let config = RosterConfig::builder()
///     .api_key("sk-test")
///     .local_tz("Europe/Dublin")
///     .calendar_name("FR crew")
///     .build()
///     .unwrap();
/// assert_eq!(config.local_tz.name(), "Europe/Dublin");
/// ```
#[derive(Clone)]
pub struct RosterConfig {
    /// Inference API credential. Checked before every external call.
    pub api_key: Option<String>,

    /// Base URL of the Responses API. Default: `https://api.openai.com/v1`.
    pub base_url: String,

    /// Vision model used for stage 1 (transcription). Default: `gpt-4.1`.
    pub ocr_model: String,

    /// Text model used for stage 2 (JSON parse). Default: `gpt-5.1`.
    pub parse_model: String,

    /// Per-request deadline in seconds, enforced by the HTTP client. Default: 90.
    pub request_timeout_secs: u64,

    /// Reuse the provider's prompt cache. Default: true.
    ///
    /// When disabled every call carries a fresh random cache key so the
    /// provider cannot serve a cached prefix. Output content is unaffected
    /// either way.
    pub enable_cache: bool,

    /// Zone used for the `LT` times in event descriptions. Default: Europe/Berlin.
    pub local_tz: Tz,

    /// Calendar display name embedded in the ICS `PRODID`. Default: `Roster`.
    pub calendar_name: String,

    /// Largest accepted upload in bytes. Default: 5 MiB.
    pub max_upload_bytes: usize,

    /// Optional stage-event sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            ocr_model: DEFAULT_OCR_MODEL.to_string(),
            parse_model: DEFAULT_PARSE_MODEL.to_string(),
            request_timeout_secs: 90,
            enable_cache: true,
            local_tz: chrono_tz::Europe::Berlin,
            calendar_name: DEFAULT_CALENDAR_NAME.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for RosterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RosterConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("ocr_model", &self.ocr_model)
            .field("parse_model", &self.parse_model)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("enable_cache", &self.enable_cache)
            .field("local_tz", &self.local_tz.name())
            .field("calendar_name", &self.calendar_name)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl RosterConfig {
    /// Create a new builder for `RosterConfig`.
    pub fn builder() -> RosterConfigBuilder {
        RosterConfigBuilder {
            config: Self::default(),
            local_tz: None,
        }
    }

    /// Fail with [`RosterError::MissingApiKey`] unless a key is configured.
    pub fn ensure_api_key(&self) -> Result<&str, RosterError> {
        usable_api_key(self.api_key.as_deref())
    }
}

/// A present, non-blank key; anything else is [`RosterError::MissingApiKey`].
pub(crate) fn usable_api_key(key: Option<&str>) -> Result<&str, RosterError> {
    match key {
        Some(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(RosterError::MissingApiKey),
    }
}

/// Builder for [`RosterConfig`].
#[derive(Debug)]
pub struct RosterConfigBuilder {
    config: RosterConfig,
    local_tz: Option<String>,
}

impl RosterConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn ocr_model(mut self, model: impl Into<String>) -> Self {
        self.config.ocr_model = model.into();
        self
    }

    pub fn parse_model(mut self, model: impl Into<String>) -> Self {
        self.config.parse_model = model.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn enable_cache(mut self, v: bool) -> Self {
        self.config.enable_cache = v;
        self
    }

    /// IANA zone id, e.g. `Europe/Dublin`. Validated in [`Self::build`].
    pub fn local_tz(mut self, tz: impl Into<String>) -> Self {
        self.local_tz = Some(tz.into());
        self
    }

    pub fn calendar_name(mut self, name: impl Into<String>) -> Self {
        self.config.calendar_name = name.into();
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<RosterConfig, RosterError> {
        if let Some(ref tz) = self.local_tz {
            self.config.local_tz = tz.trim().parse::<Tz>().map_err(|e| {
                RosterError::InvalidConfig(format!("unknown time zone '{tz}': {e}"))
            })?;
        }

        let c = &self.config;
        if c.base_url.trim().is_empty() {
            return Err(RosterError::InvalidConfig("base URL must not be blank".into()));
        }
        if c.ocr_model.trim().is_empty() || c.parse_model.trim().is_empty() {
            return Err(RosterError::InvalidConfig(
                "model identifiers must not be blank".into(),
            ));
        }
        if c.request_timeout_secs == 0 {
            return Err(RosterError::InvalidConfig(
                "request timeout must be ≥ 1 second".into(),
            ));
        }
        if c.calendar_name.trim().is_empty() {
            return Err(RosterError::InvalidConfig(
                "calendar name must not be blank".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(RosterError::InvalidConfig(
                "max upload size must be ≥ 1 byte".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Response body format requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Parse result as JSON (default).
    #[default]
    Json,
    /// RFC 5545-flavoured calendar text.
    Ics,
}

impl OutputFormat {
    /// Parse an optional selector: missing or blank means `json`.
    pub fn parse_selector(selector: Option<&str>) -> Result<Self, RosterError> {
        match selector {
            None => Ok(OutputFormat::Json),
            Some(s) => s.parse(),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = RosterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "json" => Ok(OutputFormat::Json),
            "ics" => Ok(OutputFormat::Ics),
            other => Err(RosterError::UnsupportedFormat {
                format: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Ics => f.write_str("ics"),
        }
    }
}
