//! CLI binary for ros2cal.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `RosterConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use ros2cal::config::{
    DEFAULT_BASE_URL, DEFAULT_CALENDAR_NAME, DEFAULT_LOCAL_TZ, DEFAULT_MAX_UPLOAD_BYTES,
    DEFAULT_OCR_MODEL, DEFAULT_PARSE_MODEL,
};
use ros2cal::convert::write_atomic;
use ros2cal::{
    json_to_ics, CallUsage, ConversionProgressCallback, OutputFormat, ProgressCallback, Roster,
    RosterConfig, RosterConverter, Stage,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one spinner for the running stage and a log
/// line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
    stage_started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style =
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            stage_started: Mutex::new(None),
        })
    }

    fn elapsed_secs(&self) -> f64 {
        self.stage_started
            .lock()
            .ok()
            .and_then(|mut started| started.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Preprocess => "Preparing image",
        Stage::Transcribe => "Transcribing roster",
        Stage::Parse => "Parsing duties",
        Stage::Export => "Building calendar",
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        if let Ok(mut started) = self.stage_started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.set_prefix(stage_label(stage));
        self.bar.set_message(match stage {
            Stage::Transcribe | Stage::Parse => "waiting for model…",
            _ => "",
        });
    }

    fn on_stage_complete(&self, stage: Stage, usage: Option<&CallUsage>) {
        let secs = self.elapsed_secs();
        let tokens = usage
            .map(|u| format!("{:>6} tokens", u.effective_total()))
            .unwrap_or_default();
        self.bar.println(format!(
            "  {} {:<20} {:<13} {}",
            green("✓"),
            stage_label(stage),
            dim(&tokens),
            dim(&format!("{secs:.1}s")),
        ));
    }

    fn on_stage_error(&self, stage: Stage, error: &str) {
        let secs = self.elapsed_secs();
        // Keep the log line on one row; the full error is printed on exit.
        let first_line = error.lines().next().unwrap_or(error);
        let msg: String = if first_line.chars().count() > 80 {
            format!("{}\u{2026}", first_line.chars().take(79).collect::<String>())
        } else {
            first_line.to_string()
        };
        self.bar.println(format!(
            "  {} {:<20} {}  {}",
            red("✗"),
            stage_label(stage),
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Roster JSON on stdout
  ros2cal roster.jpg

  # ICS calendar to a file
  ros2cal roster.png --format ics -o roster.ics

  # Local times in another zone, custom calendar name
  ros2cal roster.png --format ics --timezone Europe/Dublin --calendar-name "FR crew"

  # Re-export a saved JSON result without calling the API
  ros2cal --from-json roster.json -o roster.ics

  # Force fresh model calls (no prompt-cache reuse)
  ros2cal --no-cache roster.jpg

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY            OpenAI API key (required unless --from-json)
  OPENAI_BASE_URL           Responses API base URL
  ROS2CAL_OCR_MODEL         Vision model for transcription
  ROS2CAL_PARSE_MODEL       Text model for JSON parsing
  ROS2CAL_TIMEZONE          IANA zone for local times in descriptions
  ROS2CAL_CALENDAR_NAME     Calendar name in the ICS PRODID
  RUST_LOG                  Override log filter (e.g. ros2cal=debug)

INPUT:
  JPEG or PNG, up to --max-upload-bytes (5 MiB by default). Images narrower
  than 1500 px are upscaled 2× before transcription.
"#;

/// Convert duty-roster images to JSON or ICS calendars.
#[derive(Parser, Debug)]
#[command(
    name = "ros2cal",
    version,
    about = "Convert duty-roster images to JSON or ICS calendars",
    long_about = "Convert a photographed or scanned airline duty roster (JPEG/PNG) into structured \
JSON and optionally an ICS calendar. The image is transcribed by a vision model, then parsed into \
a strict duty schema by a second model call.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Roster image (JPEG or PNG).
    #[arg(required_unless_present = "from_json")]
    image: Option<PathBuf>,

    /// Write output to this file instead of stdout.
    #[arg(short, long, env = "ROS2CAL_OUTPUT")]
    output: Option<PathBuf>,

    /// Output format: json or ics.
    #[arg(long, env = "ROS2CAL_FORMAT", default_value = "json", value_parser = parse_format)]
    format: OutputFormat,

    /// OpenAI API key.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Responses API base URL.
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Vision model for stage 1 (transcription).
    #[arg(long, env = "ROS2CAL_OCR_MODEL", default_value = DEFAULT_OCR_MODEL)]
    ocr_model: String,

    /// Text model for stage 2 (JSON parse).
    #[arg(long, env = "ROS2CAL_PARSE_MODEL", default_value = DEFAULT_PARSE_MODEL)]
    parse_model: String,

    /// Per-request timeout in seconds.
    #[arg(long, env = "ROS2CAL_TIMEOUT", default_value_t = 90,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Send a fresh prompt-cache key with every call.
    #[arg(long, env = "ROS2CAL_NO_CACHE")]
    no_cache: bool,

    /// IANA time zone for local times in event descriptions.
    #[arg(long, env = "ROS2CAL_TIMEZONE", default_value = DEFAULT_LOCAL_TZ)]
    timezone: String,

    /// Calendar display name (ICS PRODID).
    #[arg(long, env = "ROS2CAL_CALENDAR_NAME", default_value = DEFAULT_CALENDAR_NAME)]
    calendar_name: String,

    /// Largest accepted image in bytes.
    #[arg(long, env = "ROS2CAL_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,

    /// Export a stored roster JSON to ICS instead of converting an image.
    #[arg(long, conflicts_with = "image")]
    from_json: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ROS2CAL_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "ROS2CAL_QUIET")]
    quiet: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "ROS2CAL_NO_PROGRESS")]
    no_progress: bool,
}

fn parse_format(s: &str) -> std::result::Result<OutputFormat, String> {
    s.parse::<OutputFormat>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner replaces INFO-level library logs; verbose wins over both.
    let show_progress = !cli.quiet && !cli.no_progress && cli.from_json.is_none();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Re-export mode ───────────────────────────────────────────────────
    if let Some(ref json_path) = cli.from_json {
        let config = build_config(&cli, None)?;
        let text = tokio::fs::read_to_string(json_path)
            .await
            .with_context(|| format!("Failed to read roster JSON from {:?}", json_path))?;
        let roster = Roster::from_stored_json(&text).context("Invalid roster JSON")?;
        let ics = json_to_ics(&roster, &config.calendar_name, config.local_tz);
        emit(&ics, cli.output.as_deref()).await?;
        if !cli.quiet {
            eprintln!(
                "{} {} events exported",
                green("✔"),
                bold(&roster.len().to_string())
            );
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(
        &cli,
        progress
            .clone()
            .map(|cb| cb as Arc<dyn ConversionProgressCallback>),
    )?;

    let image_path = cli
        .image
        .as_ref()
        .context("An image path is required unless --from-json is given")?;
    let bytes = tokio::fs::read(image_path)
        .await
        .with_context(|| format!("Failed to read image from {:?}", image_path))?;

    // ── Run conversion ───────────────────────────────────────────────────
    let started = Instant::now();
    let converter = RosterConverter::from_config(config).context("Invalid configuration")?;
    let result = converter.convert(&bytes, cli.format).await;
    if let Some(ref cb) = progress {
        cb.finish();
    }
    let output = result.map_err(|e| {
        let hint = if e.is_retryable() {
            " (upstream failure, retrying may help)"
        } else {
            ""
        };
        anyhow::Error::new(e).context(format!("Conversion failed{hint}"))
    })?;

    let body = output.render().context("Failed to render output")?;
    emit(&body, cli.output.as_deref()).await?;

    // ── Summary ──────────────────────────────────────────────────────────
    if !cli.quiet {
        let r = &output.result;
        eprintln!(
            "{}  {} events  {}ms{}",
            green("✔"),
            bold(&r.data.len().to_string()),
            started.elapsed().as_millis(),
            cli.output
                .as_ref()
                .map(|p| format!("  →  {}", bold(&p.display().to_string())))
                .unwrap_or_default(),
        );
        eprintln!(
            "   OCR {} in / {} out ({} cached)  ·  parse {} in / {} out ({} cached)",
            dim(&r.ocr_usage.input_tokens.to_string()),
            dim(&r.ocr_usage.output_tokens.to_string()),
            dim(&r.ocr_usage.cached_input_tokens.to_string()),
            dim(&r.parse_usage.input_tokens.to_string()),
            dim(&r.parse_usage.output_tokens.to_string()),
            dim(&r.parse_usage.cached_input_tokens.to_string()),
        );
        eprintln!(
            "   {} tokens total",
            dim(&(r.ocr_usage.effective_total() + r.parse_usage.effective_total()).to_string()),
        );
    }

    Ok(())
}

/// Map CLI args to `RosterConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<RosterConfig> {
    let mut builder = RosterConfig::builder()
        .base_url(&cli.base_url)
        .ocr_model(&cli.ocr_model)
        .parse_model(&cli.parse_model)
        .request_timeout_secs(cli.timeout)
        .enable_cache(!cli.no_cache)
        .local_tz(&cli.timezone)
        .calendar_name(&cli.calendar_name)
        .max_upload_bytes(cli.max_upload_bytes);

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Write `body` to `path` atomically, or to stdout with a trailing newline.
async fn emit(body: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => write_atomic(path, body)
            .await
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(body.as_bytes())
                .context("Failed to write to stdout")?;
            if !body.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
            Ok(())
        }
    }
}
