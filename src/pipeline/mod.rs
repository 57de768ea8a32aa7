//! Pipeline stages for roster-image conversion.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and the inference backend can be swapped without
//! touching the image or text handling.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ preprocess ──▶ encode ──▶ llm (OCR) ──▶ postprocess ──▶ llm (parse) ──▶ postprocess
//! (checks)  (RGB PNG)      (base64)   (text)        (cleanup)       (JSON text)     (unfence)
//! ```
//!
//! 1. [`input`]      — size limit and JPEG/PNG signature check
//! 2. [`preprocess`] — decode, flatten to RGB, upscale narrow images; runs in
//!    `spawn_blocking` because it is CPU-bound
//! 3. [`encode`]     — wrap the PNG as a base64 data URL for the request body
//! 4. [`llm`]        — the two model calls; the only stage with network I/O
//! 5. [`postprocess`] — deterministic cleanup of model replies (line endings,
//!    invisible characters, stray code fences)

pub mod encode;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod preprocess;
