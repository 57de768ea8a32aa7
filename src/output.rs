//! Result types returned by the conversion pipeline.

use crate::config::OutputFormat;
use crate::error::RosterError;
use crate::roster::Roster;
use serde::{Deserialize, Serialize};

/// Token accounting for one external inference call.
///
/// Counts are signed because they are copied verbatim from provider
/// metadata; [`CallUsage::effective_total`] clamps negatives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallUsage {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cached_input_tokens: i64,
    pub cached_output_tokens: i64,
    /// Provider-reported total, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<i64>,
}

impl CallUsage {
    /// `total_tokens` if reported, otherwise the clamped sum of input and
    /// output tokens.
    pub fn effective_total(&self) -> i64 {
        match self.total_tokens {
            Some(total) => total,
            None => self.input_tokens.max(0) + self.output_tokens.max(0),
        }
    }
}

/// Text and usage returned by one inference call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InferenceReply {
    pub output_text: String,
    pub usage: CallUsage,
}

impl InferenceReply {
    pub fn new(output_text: impl Into<String>, usage: CallUsage) -> Self {
        Self {
            output_text: output_text.into(),
            usage,
        }
    }
}

/// Output of [`crate::convert::RosterConverter::parse_roster`].
///
/// Stage-1 and stage-2 usage are kept apart; callers that want a grand total
/// add the two [`CallUsage::effective_total`] values themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterParseResult {
    pub data: Roster,
    pub ocr_usage: CallUsage,
    pub parse_usage: CallUsage,
}

/// Output of the full conversion entry points.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    /// Format the caller asked for.
    pub format: OutputFormat,
    pub result: RosterParseResult,
    /// Rendered calendar, present only for [`OutputFormat::Ics`].
    pub ics: Option<String>,
}

impl ConversionOutput {
    /// Render the response body for the requested format: pretty JSON of the
    /// parse result, or the ICS text.
    pub fn render(&self) -> Result<String, RosterError> {
        match (&self.format, &self.ics) {
            (OutputFormat::Ics, Some(ics)) => Ok(ics.clone()),
            (OutputFormat::Ics, None) => Err(RosterError::Internal(
                "ICS output requested but no calendar was rendered".into(),
            )),
            (OutputFormat::Json, _) => serde_json::to_string_pretty(&self.result)
                .map_err(|e| RosterError::Internal(format!("serialise roster: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_total_sums_when_absent() {
        let usage = CallUsage {
            input_tokens: 100,
            output_tokens: 50,
            ..Default::default()
        };
        assert_eq!(usage.effective_total(), 150);
    }

    #[test]
    fn effective_total_prefers_reported() {
        let usage = CallUsage {
            input_tokens: 100,
            output_tokens: 50,
            total_tokens: Some(200),
            ..Default::default()
        };
        assert_eq!(usage.effective_total(), 200);
    }

    #[test]
    fn effective_total_clamps_negatives() {
        let usage = CallUsage {
            input_tokens: -5,
            output_tokens: 7,
            ..Default::default()
        };
        assert_eq!(usage.effective_total(), 7);
    }

    #[test]
    fn json_render_has_both_usages() {
        let output = ConversionOutput {
            format: OutputFormat::Json,
            result: RosterParseResult {
                data: Roster::default(),
                ocr_usage: CallUsage {
                    input_tokens: 1,
                    ..Default::default()
                },
                parse_usage: CallUsage {
                    output_tokens: 2,
                    ..Default::default()
                },
            },
            ics: None,
        };
        let body = output.render().unwrap();
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["ocr_usage"]["input_tokens"], 1);
        assert_eq!(value["parse_usage"]["output_tokens"], 2);
        assert!(value["data"]["events"].as_array().unwrap().is_empty());
    }
}
