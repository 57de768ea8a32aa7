//! Conversion entry points: roster image → roster JSON (→ ICS).
//!
//! [`RosterConverter`] owns the configuration and an inference backend and
//! runs the pipeline for one image at a time:
//!
//! ```text
//! preprocess ──▶ transcribe ──▶ parse ──▶ (export)
//! ```
//!
//! ## Why strictly sequential?
//!
//! Stage 2's input is stage 1's output, so the two model calls cannot
//! overlap. Nothing is retried and nothing is partially returned: either
//! both calls succeed and the roster decodes, or the whole conversion fails
//! with the first error.
//!
//! The free functions at the bottom mirror the converter for callers that
//! just want one call: [`convert`], [`convert_file`], [`convert_to_file`] and
//! the blocking [`convert_sync`].

use crate::config::{OutputFormat, RosterConfig};
use crate::error::{RosterError, Stage};
use crate::ics;
use crate::output::{CallUsage, ConversionOutput, RosterParseResult};
use crate::pipeline::llm::{OpenAiRosterClient, RosterInference};
use crate::pipeline::{input, postprocess, preprocess};
use crate::roster::Roster;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Runs the roster pipeline against one inference backend.
///
/// Cheap to share behind an `Arc`; it holds no per-request state.
pub struct RosterConverter {
    config: RosterConfig,
    inference: Arc<dyn RosterInference>,
}

impl std::fmt::Debug for RosterConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RosterConverter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RosterConverter {
    /// Use a caller-supplied backend, e.g. a test fake or a proxy client.
    pub fn new(config: RosterConfig, inference: Arc<dyn RosterInference>) -> Self {
        Self { config, inference }
    }

    /// Use the OpenAI Responses API client built from `config`.
    pub fn from_config(config: RosterConfig) -> Result<Self, RosterError> {
        let client = OpenAiRosterClient::new(&config)?;
        Ok(Self::new(config, Arc::new(client)))
    }

    pub fn config(&self) -> &RosterConfig {
        &self.config
    }

    /// Image bytes → roster plus per-stage usage.
    ///
    /// # Errors
    /// - `InvalidImage` / `EncodeError` if preprocessing fails
    /// - `MissingApiKey` before either call if no credential is configured
    /// - any upstream error from either call, or `EmptyOutput` for a blank
    ///   transcription
    /// - `InvalidJson` if the parse reply is not a roster object
    pub async fn parse_roster(&self, image_bytes: &[u8]) -> Result<RosterParseResult, RosterError> {
        let total_start = Instant::now();
        info!("Roster parse start image_bytes={}", image_bytes.len());

        // ── Step 1: Canonicalise image ───────────────────────────────────
        self.stage_start(Stage::Preprocess);
        let png = preprocess::prepare_png_async(image_bytes.to_vec())
            .await
            .map_err(|e| self.stage_failed(Stage::Preprocess, e))?;
        self.stage_complete(Stage::Preprocess, None);

        // ── Step 2: Transcribe ───────────────────────────────────────────
        self.stage_start(Stage::Transcribe);
        self.config
            .ensure_api_key()
            .map_err(|e| self.stage_failed(Stage::Transcribe, e))?;
        info!("Roster OCR call start png_bytes={}", png.len());
        let ocr = self
            .inference
            .transcribe(&png)
            .await
            .map_err(|e| self.stage_failed(Stage::Transcribe, e))?;
        let roster_text = postprocess::clean_transcription(&ocr.output_text);
        if roster_text.is_empty() {
            return Err(self.stage_failed(
                Stage::Transcribe,
                RosterError::EmptyOutput {
                    stage: Stage::Transcribe,
                },
            ));
        }
        info!(
            "Roster OCR call done output_chars={}",
            roster_text.chars().count()
        );
        self.stage_complete(Stage::Transcribe, Some(&ocr.usage));

        // ── Step 3: Parse to JSON ────────────────────────────────────────
        self.stage_start(Stage::Parse);
        self.config
            .ensure_api_key()
            .map_err(|e| self.stage_failed(Stage::Parse, e))?;
        info!("Roster parse call start");
        let parsed = self
            .inference
            .parse_to_json(&roster_text)
            .await
            .map_err(|e| self.stage_failed(Stage::Parse, e))?;
        info!(
            "Roster parse call done output_chars={}",
            parsed.output_text.chars().count()
        );

        let payload = postprocess::extract_json_payload(&parsed.output_text);
        let data: Roster = serde_json::from_str(&payload).map_err(|e| {
            error!("Roster parse JSON decode failed: {}", e);
            self.stage_failed(
                Stage::Parse,
                RosterError::InvalidJson {
                    detail: e.to_string(),
                },
            )
        })?;
        self.stage_complete(Stage::Parse, Some(&parsed.usage));

        info!(
            "Roster parse end events_count={} in {}ms",
            data.len(),
            total_start.elapsed().as_millis()
        );

        Ok(RosterParseResult {
            data,
            ocr_usage: ocr.usage,
            parse_usage: parsed.usage,
        })
    }

    /// Validate the upload, parse it, and render ICS if asked for.
    pub async fn convert(
        &self,
        image_bytes: &[u8],
        format: OutputFormat,
    ) -> Result<ConversionOutput, RosterError> {
        let kind = input::validate_upload(image_bytes, self.config.max_upload_bytes)?;
        debug!("Converting {} upload to {}", kind, format);

        let result = self.parse_roster(image_bytes).await?;

        let ics = match format {
            OutputFormat::Json => None,
            OutputFormat::Ics => {
                self.stage_start(Stage::Export);
                let text = self.export_ics(&result.data);
                self.stage_complete(Stage::Export, None);
                Some(text)
            }
        };

        Ok(ConversionOutput {
            format,
            result,
            ics,
        })
    }

    /// Render a roster with the configured calendar name and time zone.
    pub fn export_ics(&self, roster: &Roster) -> String {
        ics::json_to_ics(roster, &self.config.calendar_name, self.config.local_tz)
    }

    // ── Progress plumbing ────────────────────────────────────────────────

    fn stage_start(&self, stage: Stage) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_start(stage);
        }
    }

    fn stage_complete(&self, stage: Stage, usage: Option<&CallUsage>) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_complete(stage, usage);
        }
    }

    /// Report `err` to the callback and hand it back for propagation.
    fn stage_failed(&self, stage: Stage, err: RosterError) -> RosterError {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_error(stage, &err.to_string());
        }
        err
    }
}

// ── Convenience entry points ─────────────────────────────────────────────

/// Convert image bytes using the OpenAI backend described by `config`.
///
/// # Example
/// ```rust,no_run
/// use ros2cal::{convert, OutputFormat, RosterConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("roster.png")?;
/// let config = RosterConfig::builder()
///     .api_key(std::env::var("OPENAI_API_KEY")?)
///     .build()?;
/// let output = convert(&bytes, OutputFormat::Ics, &config).await?;
/// println!("{}", output.render()?);
/// # Ok(())
/// # }
/// ```
pub async fn convert(
    image_bytes: &[u8],
    format: OutputFormat,
    config: &RosterConfig,
) -> Result<ConversionOutput, RosterError> {
    RosterConverter::from_config(config.clone())?
        .convert(image_bytes, format)
        .await
}

/// Read an image file and convert it.
pub async fn convert_file(
    image_path: impl AsRef<Path>,
    format: OutputFormat,
    config: &RosterConfig,
) -> Result<ConversionOutput, RosterError> {
    let path = image_path.as_ref();
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| RosterError::InputReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    convert(&bytes, format, config).await
}

/// Convert an image file and write the rendered body to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    image_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    format: OutputFormat,
    config: &RosterConfig,
) -> Result<ConversionOutput, RosterError> {
    let output = convert_file(image_path, format, config).await?;
    write_atomic(output_path.as_ref(), &output.render()?).await?;
    Ok(output)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    image_bytes: &[u8],
    format: OutputFormat,
    config: &RosterConfig,
) -> Result<ConversionOutput, RosterError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| RosterError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(image_bytes, format, config))
}

/// Write `contents` next to `path` under a temporary name, then rename.
pub async fn write_atomic(path: &Path, contents: &str) -> Result<(), RosterError> {
    let write_err = |e| RosterError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    debug!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}
