//! # ros2cal
//!
//! Convert a photographed or scanned airline duty roster into structured
//! JSON and, optionally, an ICS calendar.
//!
//! ## Why two model calls?
//!
//! Asking a vision model to read a dense roster table *and* emit a strict
//! JSON schema in one go mixes two failure modes: misread glyphs and
//! misplaced fields. Splitting the work lets each call do one thing. The
//! first call only transcribes, copying every character verbatim. The second
//! only restructures text it can see in full. Both run at temperature 0.
//!
//! ## Pipeline Overview
//!
//! ```text
//! JPEG / PNG
//!  │
//!  ├─ 1. Input       size limit + magic-byte check
//!  ├─ 2. Preprocess  flatten to RGB, 2× bicubic upscale below 1500 px (spawn_blocking)
//!  ├─ 3. Transcribe  vision model → plain roster text
//!  ├─ 4. Parse       text model → {"events": [...]}
//!  └─ 5. Export      optional ICS with per-duty descriptions and colours
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ros2cal::{convert_file, OutputFormat, RosterConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RosterConfig::builder()
//!         .api_key(std::env::var("OPENAI_API_KEY")?)
//!         .local_tz("Europe/Dublin")
//!         .build()?;
//!     let output = convert_file("roster.jpg", OutputFormat::Ics, &config).await?;
//!     println!("{}", output.render()?);
//!     eprintln!("tokens: {} OCR / {} parse",
//!         output.result.ocr_usage.effective_total(),
//!         output.result.parse_usage.effective_total());
//!     Ok(())
//! }
//! ```
//!
//! ## Testing without a network
//!
//! The orchestrator only depends on the [`RosterInference`] trait. Implement
//! it with canned replies and pass it to [`RosterConverter::new`].
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ros2cal` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! ros2cal = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod ics;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod roster;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{OutputFormat, RosterConfig, RosterConfigBuilder};
pub use convert::{convert, convert_file, convert_sync, convert_to_file, RosterConverter};
pub use error::{ErrorClass, RosterError, Stage};
pub use ics::{json_to_ics, json_to_ics_at};
pub use output::{CallUsage, ConversionOutput, InferenceReply, RosterParseResult};
pub use pipeline::input::{validate_upload, ImageKind};
pub use pipeline::llm::{OpenAiRosterClient, RosterInference};
pub use pipeline::preprocess::prepare_png;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use roster::{Activity, Event, EventDetail, Flight, Roster};
