//! Inference backend: the two model calls behind one capability trait.
//!
//! The orchestrator only knows [`RosterInference`]. Production code plugs in
//! [`OpenAiRosterClient`], which talks to the OpenAI Responses API over
//! `reqwest`; tests plug in a deterministic fake so the pipeline can be
//! exercised without a network.
//!
//! All prompt text lives in [`crate::prompts`]; this module only shapes
//! requests, classifies failures, and extracts text and usage.
//!
//! ## No retries
//!
//! A failed call is surfaced immediately as an upstream error. Whether to try
//! again is the caller's decision ([`RosterError::is_retryable`]); retrying
//! here would hide latency behind an opaque deadline and double-bill tokens
//! for a request that may already have been processed.
//!
//! ## Prompt cache key
//!
//! Both calls carry a `prompt_cache_key`. With caching enabled it is the
//! constant [`DEFAULT_CACHE_KEY`], so repeated requests share the long
//! system-prompt prefix. With caching disabled each call gets a fresh UUID,
//! which forces a miss. Output content does not depend on the key.

use crate::config::{usable_api_key, RosterConfig};
use crate::error::{RosterError, Stage};
use crate::output::{CallUsage, InferenceReply};
use crate::pipeline::encode::{encode_png_data_url, EncodedImage};
use crate::prompts::{
    OCR_USER_INSTRUCTION, PROMPT_VERSION, SYSTEM_PROMPT_OCR, SYSTEM_PROMPT_PARSE,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Cache key shared by every call while prompt caching is enabled.
pub const DEFAULT_CACHE_KEY: &str = "ros2cal-roster";

/// Longest text logged verbatim; longer values are cut and suffixed.
pub const LOG_TEXT_LIMIT: usize = 2000;

/// The two external operations the conversion pipeline depends on.
#[async_trait]
pub trait RosterInference: Send + Sync {
    /// Stage 1: transcribe a canonical PNG into plain text.
    async fn transcribe(&self, png: &[u8]) -> Result<InferenceReply, RosterError>;

    /// Stage 2: turn transcribed roster text into roster JSON text.
    async fn parse_to_json(&self, roster_text: &str) -> Result<InferenceReply, RosterError>;
}

// ── OpenAI Responses API client ──────────────────────────────────────────────

/// [`RosterInference`] over `POST {base_url}/responses`.
pub struct OpenAiRosterClient {
    http: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
    ocr_model: String,
    parse_model: String,
    enable_cache: bool,
    timeout_secs: u64,
}

impl std::fmt::Debug for OpenAiRosterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiRosterClient")
            .field("endpoint", &self.endpoint)
            .field("ocr_model", &self.ocr_model)
            .field("parse_model", &self.parse_model)
            .field("enable_cache", &self.enable_cache)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

impl OpenAiRosterClient {
    /// Build a client from the conversion config.
    ///
    /// A missing API key is not an error here; it is reported by the first
    /// call instead, so a converter can be constructed before credentials
    /// are known.
    pub fn new(config: &RosterConfig) -> Result<Self, RosterError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| RosterError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            endpoint: format!("{}/responses", config.base_url.trim_end_matches('/')),
            ocr_model: config.ocr_model.clone(),
            parse_model: config.parse_model.clone(),
            enable_cache: config.enable_cache,
            timeout_secs: config.request_timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn ensure_api_key(&self) -> Result<&str, RosterError> {
        usable_api_key(self.api_key.as_deref())
    }

    fn cache_key(&self) -> String {
        if self.enable_cache {
            DEFAULT_CACHE_KEY.to_string()
        } else {
            let key = uuid::Uuid::new_v4().to_string();
            info!("OpenAI cache bypass enabled via prompt_cache_key={}", key);
            key
        }
    }

    /// Send one request and decode the success body.
    async fn execute(
        &self,
        stage: Stage,
        api_key: &str,
        request: &ResponsesRequest<'_>,
    ) -> Result<ResponsesResponse, RosterError> {
        let start = Instant::now();
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(stage, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(stage, e))?;
        debug!(
            "OpenAI {} HTTP {} in {:?} ({} bytes)",
            stage,
            status.as_u16(),
            start.elapsed(),
            body.len()
        );

        if !status.is_success() {
            let message = error_message(&body);
            error!(
                "OpenAI service error stage={} status={} message={}",
                stage,
                status.as_u16(),
                message
            );
            return Err(RosterError::UpstreamStatus {
                stage,
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            error!("OpenAI {} response body undecodable: {}", stage, e);
            RosterError::UpstreamRequestFailed {
                stage,
                detail: format!("undecodable response body: {e}"),
            }
        })
    }

    fn transport_error(&self, stage: Stage, e: reqwest::Error) -> RosterError {
        if e.is_timeout() {
            error!("OpenAI {} request timed out after {}s", stage, self.timeout_secs);
            RosterError::UpstreamTimeout {
                stage,
                secs: self.timeout_secs,
            }
        } else {
            error!("OpenAI {} request failed: {}", stage, e);
            RosterError::UpstreamRequestFailed {
                stage,
                detail: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl RosterInference for OpenAiRosterClient {
    async fn transcribe(&self, png: &[u8]) -> Result<InferenceReply, RosterError> {
        let api_key = self.ensure_api_key()?;
        let image = encode_png_data_url(png);
        let cache_key = self.cache_key();
        let request = ocr_request(&self.ocr_model, &image, cache_key);

        info!(
            "OpenAI OCR request model={} prompt_version={} cache_key={} system_prompt={} user_prompt={} image_bytes={} image_base64_chars={}",
            self.ocr_model,
            PROMPT_VERSION,
            request.prompt_cache_key,
            truncate_for_log(SYSTEM_PROMPT_OCR),
            truncate_for_log(OCR_USER_INSTRUCTION),
            image.raw_bytes,
            image.base64_chars
        );

        let response = self.execute(Stage::Transcribe, api_key, &request).await?;
        let reply = into_reply(Stage::Transcribe, response)?;
        info!(
            "OpenAI OCR response output_chars={} output_text={}",
            reply.output_text.chars().count(),
            truncate_for_log(&reply.output_text)
        );
        log_usage("OpenAI OCR usage", &reply.usage);
        Ok(reply)
    }

    async fn parse_to_json(&self, roster_text: &str) -> Result<InferenceReply, RosterError> {
        let api_key = self.ensure_api_key()?;
        let cache_key = self.cache_key();
        let request = parse_request(&self.parse_model, roster_text, cache_key);

        info!(
            "OpenAI parse request model={} prompt_version={} cache_key={} system_prompt={} input_text={}",
            self.parse_model,
            PROMPT_VERSION,
            request.prompt_cache_key,
            truncate_for_log(SYSTEM_PROMPT_PARSE),
            truncate_for_log(roster_text)
        );

        let response = self.execute(Stage::Parse, api_key, &request).await?;
        let reply = into_reply(Stage::Parse, response)?;
        info!(
            "OpenAI parse response output_chars={} output_text={}",
            reply.output_text.chars().count(),
            truncate_for_log(&reply.output_text)
        );
        log_usage("OpenAI parse usage", &reply.usage);
        Ok(reply)
    }
}

// ── Request shaping ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    temperature: f32,
    top_p: f32,
    input: Vec<InputMessage<'a>>,
    prompt_cache_key: String,
}

#[derive(Debug, Serialize)]
struct InputMessage<'a> {
    role: &'static str,
    content: Vec<InputContent<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InputContent<'a> {
    InputText {
        text: &'a str,
    },
    InputImage {
        image_url: &'a str,
        detail: &'static str,
    },
}

/// Stage-1 request: system prompt, then instruction plus image.
///
/// `detail: "high"` keeps the image at full tile resolution; the low-detail
/// mode downsamples to a single tile and small roster glyphs are lost.
fn ocr_request<'a>(
    model: &'a str,
    image: &'a EncodedImage,
    cache_key: String,
) -> ResponsesRequest<'a> {
    ResponsesRequest {
        model,
        temperature: 0.0,
        top_p: 1.0,
        input: vec![
            InputMessage {
                role: "system",
                content: vec![InputContent::InputText {
                    text: SYSTEM_PROMPT_OCR,
                }],
            },
            InputMessage {
                role: "user",
                content: vec![
                    InputContent::InputText {
                        text: OCR_USER_INSTRUCTION,
                    },
                    InputContent::InputImage {
                        image_url: &image.data_url,
                        detail: "high",
                    },
                ],
            },
        ],
        prompt_cache_key: cache_key,
    }
}

/// Stage-2 request: system prompt, then the transcription as user text.
fn parse_request<'a>(
    model: &'a str,
    roster_text: &'a str,
    cache_key: String,
) -> ResponsesRequest<'a> {
    ResponsesRequest {
        model,
        temperature: 0.0,
        top_p: 1.0,
        input: vec![
            InputMessage {
                role: "system",
                content: vec![InputContent::InputText {
                    text: SYSTEM_PROMPT_PARSE,
                }],
            },
            InputMessage {
                role: "user",
                content: vec![InputContent::InputText { text: roster_text }],
            },
        ],
        prompt_cache_key: cache_key,
    }
}

// ── Response decoding ────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct ResponsesResponse {
    #[serde(default)]
    output: Vec<OutputItem>,
    #[serde(default)]
    usage: Option<ResponsesUsage>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Option<Vec<OutputContent>>,
}

#[derive(Debug, Deserialize)]
struct OutputContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponsesUsage {
    #[serde(default)]
    input_tokens: Option<i64>,
    #[serde(default)]
    output_tokens: Option<i64>,
    #[serde(default)]
    total_tokens: Option<i64>,
    #[serde(default)]
    input_tokens_details: Option<InputTokensDetails>,
}

#[derive(Debug, Default, Deserialize)]
struct InputTokensDetails {
    #[serde(default)]
    cached_tokens: Option<i64>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Concatenate every `output_text` part of every `message` item.
fn extract_output_text(response: &ResponsesResponse) -> String {
    response
        .output
        .iter()
        .filter(|item| item.kind == "message")
        .flat_map(|item| item.content.iter().flatten())
        .filter(|part| part.kind == "output_text")
        .filter_map(|part| part.text.as_deref())
        .collect()
}

/// Usage counters; absent fields become zero and an absent total stays `None`.
fn extract_usage(response: &ResponsesResponse) -> CallUsage {
    let Some(usage) = &response.usage else {
        return CallUsage::default();
    };
    CallUsage {
        input_tokens: usage.input_tokens.unwrap_or(0),
        output_tokens: usage.output_tokens.unwrap_or(0),
        cached_input_tokens: usage
            .input_tokens_details
            .as_ref()
            .and_then(|d| d.cached_tokens)
            .unwrap_or(0),
        cached_output_tokens: 0,
        total_tokens: usage.total_tokens,
    }
}

fn into_reply(stage: Stage, response: ResponsesResponse) -> Result<InferenceReply, RosterError> {
    let text = extract_output_text(&response);
    if text.is_empty() {
        error!("OpenAI {} response missing output text", stage);
        return Err(RosterError::EmptyOutput { stage });
    }
    Ok(InferenceReply::new(text, extract_usage(&response)))
}

/// Human-readable message from an error body: `error.message` when the
/// provider sent one, otherwise the (truncated) raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|env| env.error)
        .and_then(|err| err.message)
        .filter(|msg| !msg.trim().is_empty())
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                "empty response body".to_string()
            } else {
                truncate_for_log(body.trim())
            }
        })
}

fn log_usage(label: &str, usage: &CallUsage) {
    info!(
        "{} input_tokens={} output_tokens={} cached_input_tokens={} total_tokens={}",
        label,
        usage.input_tokens,
        usage.output_tokens,
        usage.cached_input_tokens,
        usage.effective_total()
    );
}

/// Cut `value` to [`LOG_TEXT_LIMIT`] characters, marking the cut.
pub fn truncate_for_log(value: &str) -> String {
    match value.char_indices().nth(LOG_TEXT_LIMIT) {
        Some((idx, _)) => format!("{}...(truncated)", &value[..idx]),
        None => value.to_string(),
    }
}
