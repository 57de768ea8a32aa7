//! Progress-callback trait for per-stage conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::RosterConfigBuilder::progress_callback`] to receive events
//! as the pipeline moves through preprocessing, transcription, parsing, and
//! export. The CLI uses it to drive its spinner; a web service could forward
//! the same events to a log or a WebSocket.
//!
//! # Example
//!
//! ```rust
//! use ros2cal::{CallUsage, ConversionProgressCallback, RosterConfig, Stage};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ConversionProgressCallback for Printer {
//!     fn on_stage_complete(&self, stage: Stage, usage: Option<&CallUsage>) {
//!         let tokens = usage.map(|u| u.effective_total()).unwrap_or(0);
//!         eprintln!("{stage} done ({tokens} tokens)");
//!     }
//! }
//!
//! let config = RosterConfig::builder()
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::Stage;
use crate::output::CallUsage;
use std::sync::Arc;

/// Called by the conversion pipeline at stage boundaries.
///
/// All methods default to no-ops so callers only override what they need.
/// A single conversion calls these sequentially, but one callback may be
/// shared by conversions running on different tasks, hence `Send + Sync`.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called just before a stage starts.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage finishes. `usage` is present for the two
    /// inference stages.
    fn on_stage_complete(&self, stage: Stage, usage: Option<&CallUsage>) {
        let _ = (stage, usage);
    }

    /// Called when a stage fails. The conversion aborts right after.
    fn on_stage_error(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RosterConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl ConversionProgressCallback for Recorder {
        fn on_stage_start(&self, stage: Stage) {
            self.events.lock().unwrap().push(format!("start:{stage}"));
        }

        fn on_stage_complete(&self, stage: Stage, usage: Option<&CallUsage>) {
            let tokens = usage.map(|u| u.effective_total()).unwrap_or(0);
            self.events
                .lock()
                .unwrap()
                .push(format!("done:{stage}:{tokens}"));
        }

        fn on_stage_error(&self, stage: Stage, error: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("error:{stage}:{error}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage_start(Stage::Preprocess);
        cb.on_stage_complete(Stage::Transcribe, Some(&CallUsage::default()));
        cb.on_stage_error(Stage::Parse, "invalid JSON");
    }

    #[test]
    fn recorder_receives_events_in_order() {
        let rec = Recorder::default();
        let usage = CallUsage {
            input_tokens: 10,
            output_tokens: 5,
            ..Default::default()
        };
        rec.on_stage_start(Stage::Transcribe);
        rec.on_stage_complete(Stage::Transcribe, Some(&usage));
        rec.on_stage_start(Stage::Parse);
        rec.on_stage_error(Stage::Parse, "timeout");

        let events = rec.events.lock().unwrap();
        assert_eq!(
            *events,
            [
                "start:transcribe",
                "done:transcribe:15",
                "start:parse",
                "error:parse:timeout"
            ]
        );
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_stage_start(Stage::Export);
        cb.on_stage_complete(Stage::Export, None);
    }
}
