//! CLI binary for drawing-ocr.
//!
//! `serve` runs the upload form and JSON API; `extract` runs one PDF through
//! the same pipeline and prints the export artifact.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use drawing_ocr::engine::tesseract::TesseractConfig;
use drawing_ocr::engine::vision::VisionConfig;
use drawing_ocr::engine::{build_engine, EngineKind};
use drawing_ocr::pipeline::render::PdfiumRasterizer;
use drawing_ocr::web::{self, AppState, ServerConfig};
use drawing_ocr::{PagePipeline, PipelineConfig, PipelineProgress, ProgressCallback, TracingProgress};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::net::SocketAddr;
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
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress for `extract`: a bar anchored at the bottom of the
/// terminal plus one log line per page.
struct CliProgress {
    bar: ProgressBar,
    page_started: Mutex<Option<Instant>>,
}

impl CliProgress {
    /// Starts as a spinner; the bar length is set once the page count is known.
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            page_started: Mutex::new(None),
        })
    }

    fn elapsed_secs(&self) -> f64 {
        self.page_started
            .lock()
            .ok()
            .and_then(|mut started| started.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl PipelineProgress for CliProgress {
    fn on_document_start(&self, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_pages as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("OCR");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Reading {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total_pages: usize) {
        if let Ok(mut started) = self.page_started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total_pages: usize, text_len: usize) {
        let secs = self.elapsed_secs();
        let (mark, detail) = if text_len == 0 {
            (yellow("○"), dim("  no text"))
        } else {
            (green("✓"), dim(&format!("{text_len:>5} chars")))
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            mark,
            page_num,
            total_pages,
            detail,
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let secs = self.elapsed_secs();
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total_pages,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.abandon();
    }

    fn on_document_complete(&self, total_pages: usize, blank_pages: usize) {
        self.bar.finish_and_clear();
        if blank_pages == 0 {
            eprintln!(
                "{} {} pages read",
                green("✔"),
                bold(&total_pages.to_string())
            );
        } else {
            eprintln!(
                "{} {} pages read  ({} without text)",
                cyan("⚠"),
                bold(&total_pages.to_string()),
                yellow(&blank_pages.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Web form on http://127.0.0.1:8501
  drawing-ocr serve

  # Listen on all interfaces, allow 100 MiB uploads
  drawing-ocr serve --bind 0.0.0.0:8501 --max-upload-mb 100

  # One-shot extraction to stdout
  drawing-ocr extract site-plan.pdf

  # Write the export file, use a vision model instead of tesseract
  drawing-ocr extract --engine vision --provider openai site-plan.pdf \
      -o technocrafts_solar_panel_ocr.txt

HTTP API:
  POST /                multipart form (field "file", optional "page") → HTML
  POST /api/ocr         multipart → JSON { page_count, pages, stats }
  POST /api/ocr/export  multipart → text/plain attachment
  GET  /health          JSON { status, version, engine }

ENVIRONMENT VARIABLES:
  DRAWING_OCR_*           Every flag has an env fallback (see --help)
  OPENAI_API_KEY          OpenAI API key (vision engine)
  ANTHROPIC_API_KEY       Anthropic API key (vision engine)
  GEMINI_API_KEY          Google Gemini API key (vision engine)
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to an existing libpdfium (skips auto-download)
  PDFIUM_AUTO_CACHE_DIR   Override the default pdfium cache directory
  RUST_LOG                tracing filter, e.g. drawing_ocr=debug,tower_http=debug

SETUP:
  1. Install tesseract:  apt install tesseract-ocr  /  brew install tesseract
  2. Run:                drawing-ocr serve

  PDFium (~30 MB) is downloaded automatically on first run and cached in
  ~/.cache/drawing-ocr/pdfium-7690/.
"#;

/// OCR engineering-drawing PDFs page by page.
#[derive(Parser, Debug)]
#[command(
    name = "drawing-ocr",
    version,
    about = "Extract per-page text from engineering-drawing PDFs with OCR",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DRAWING_OCR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DRAWING_OCR_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the upload form and JSON API.
    Serve(ServeArgs),
    /// OCR one PDF and print the export artifact.
    Extract(ExtractArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "DRAWING_OCR_BIND", default_value = "127.0.0.1:8501")]
    bind: SocketAddr,

    /// Largest accepted upload in MiB.
    #[arg(long, env = "DRAWING_OCR_MAX_UPLOAD_MB", default_value_t = 50)]
    max_upload_mb: usize,

    /// Documents processed at the same time; further uploads wait.
    #[arg(long, env = "DRAWING_OCR_CONCURRENCY", default_value_t = 1,
          value_parser = clap::value_parser!(u16).range(1..))]
    concurrency: u16,

    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// PDF file to read.
    input: PathBuf,

    /// Write the export artifact to this file instead of stdout.
    #[arg(short, long, env = "DRAWING_OCR_OUTPUT")]
    output: Option<PathBuf>,

    /// Print `{ page_count, pages, stats }` as JSON instead.
    #[arg(long)]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "DRAWING_OCR_NO_PROGRESS")]
    no_progress: bool,

    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Args, Debug)]
struct EngineArgs {
    /// OCR backend: tesseract or vision.
    #[arg(long, env = "DRAWING_OCR_ENGINE", default_value = "tesseract")]
    engine: EngineKind,

    /// Rendering DPI (72–600).
    #[arg(long, env = "DRAWING_OCR_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Longest rendered edge in pixels.
    #[arg(long, env = "DRAWING_OCR_MAX_PIXELS", default_value_t = 16_000)]
    max_rendered_pixels: u32,

    /// Reject documents with more pages than this.
    #[arg(long, env = "DRAWING_OCR_MAX_PAGES", default_value_t = 200)]
    max_pages: usize,

    /// Directory for transient upload files.
    #[arg(long, env = "DRAWING_OCR_TEMP_DIR")]
    temp_dir: Option<PathBuf>,

    /// Use this libpdfium instead of the cached download.
    #[arg(long, env = "DRAWING_OCR_PDFIUM_LIB")]
    pdfium_lib: Option<PathBuf>,

    /// tesseract binary.
    #[arg(long, env = "DRAWING_OCR_TESSERACT_BIN", default_value = "tesseract")]
    tesseract_bin: PathBuf,

    /// tesseract language pack(s), `+`-separated.
    #[arg(long, env = "DRAWING_OCR_LANG", default_value = "eng")]
    lang: String,

    /// Skip orientation detection for rotated labels.
    #[arg(long, env = "DRAWING_OCR_NO_AUTO_ROTATE")]
    no_auto_rotate: bool,

    /// tesseract page segmentation mode (overrides auto-rotate).
    #[arg(long, env = "DRAWING_OCR_PSM", value_parser = clap::value_parser!(u8).range(0..=13))]
    psm: Option<u8>,

    /// LLM provider for the vision engine: openai, anthropic, gemini, ollama.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID for the vision engine.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Text file with a custom transcription prompt.
    #[arg(long, env = "DRAWING_OCR_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Retries per page on LLM failure.
    #[arg(long, env = "DRAWING_OCR_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO logs would tear the extract progress bar.
    let bar_active = match &cli.command {
        Command::Extract(args) => !cli.quiet && !args.no_progress && !args.json,
        Command::Serve(_) => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || bar_active {
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

    match cli.command {
        Command::Serve(args) => serve(args, cli.quiet).await,
        Command::Extract(args) => extract(args, cli.quiet, bar_active).await,
    }
}

async fn serve(args: ServeArgs, quiet: bool) -> Result<()> {
    let config = build_pipeline_config(&args.engine, Arc::new(TracingProgress))?;
    let pipeline = build_pipeline(&args.engine, config, quiet).await?;

    let server_config = ServerConfig {
        max_upload_bytes: args.max_upload_mb.saturating_mul(1024 * 1024),
        max_concurrent_documents: args.concurrency as usize,
    };
    let state = AppState::new(Arc::new(pipeline), &server_config);
    let app = web::router(state, &server_config);

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    tracing::info!(
        "drawing-ocr v{} listening on http://{}",
        env!("CARGO_PKG_VERSION"),
        args.bind
    );

    web::serve(listener, app).await.context("Server error")
}

async fn extract(args: ExtractArgs, quiet: bool, bar_active: bool) -> Result<()> {
    let progress: ProgressCallback = if bar_active {
        CliProgress::new()
    } else {
        Arc::new(TracingProgress)
    };
    let config = build_pipeline_config(&args.engine, progress)?;
    let pipeline = Arc::new(build_pipeline(&args.engine, config, quiet).await?);

    let bytes = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let document = pipeline
        .process_async(bytes)
        .await
        .with_context(|| format!("OCR failed for {}", args.input.display()))?;

    let rendered = if args.json {
        let mut json = serde_json::to_value(&document).context("Failed to serialise output")?;
        json["page_count"] = document.page_count().into();
        serde_json::to_string_pretty(&json).context("Failed to serialise output")?
    } else {
        document.export()
    };

    match args.output {
        Some(ref path) => {
            write_atomically(path, &rendered).await?;
            if !quiet {
                eprintln!(
                    "{}  {} pages  {}ms  →  {}",
                    green("✔"),
                    document.page_count(),
                    document.stats.total_duration_ms,
                    bold(&path.display().to_string()),
                );
            }
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(rendered.as_bytes())
                .context("Failed to write to stdout")?;
            if !rendered.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
    }

    Ok(())
}

/// Write via a sibling temp file and rename, so readers never see a partial file.
async fn write_atomically(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, contents)
        .await
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to move output into {}", path.display()))
}

fn build_pipeline_config(args: &EngineArgs, progress: ProgressCallback) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .dpi(args.dpi)
        .max_rendered_pixels(args.max_rendered_pixels)
        .max_pages(args.max_pages)
        .progress_callback(progress);
    if let Some(ref dir) = args.temp_dir {
        builder = builder.temp_dir(dir);
    }
    builder.build().context("Invalid configuration")
}

/// Resolve pdfium and the OCR engine, then assemble the pipeline.
async fn build_pipeline(
    args: &EngineArgs,
    config: PipelineConfig,
    quiet: bool,
) -> Result<PagePipeline> {
    let pdfium_path = match args.pdfium_lib {
        Some(ref path) => path.clone(),
        None => ensure_pdfium(quiet)?,
    };
    let rasterizer = PdfiumRasterizer::from_library(&pdfium_path, config.max_rendered_pixels)
        .with_context(|| format!("Failed to load PDFium from {}", pdfium_path.display()))?;

    let system_prompt = match args.system_prompt {
        Some(ref path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        ),
        None => None,
    };

    let tesseract = TesseractConfig {
        binary: args.tesseract_bin.clone(),
        language: args.lang.clone(),
        auto_rotate: !args.no_auto_rotate,
        page_segmentation_mode: args.psm,
        dpi: config.dpi,
    };
    let vision = VisionConfig {
        provider_name: args.provider.clone(),
        model: args.model.clone(),
        max_retries: args.max_retries,
        system_prompt,
        ..Default::default()
    };
    let engine = build_engine(args.engine, tesseract, vision)
        .with_context(|| format!("Failed to initialise the {} OCR engine", args.engine))?;
    tracing::info!("OCR engine: {}", engine.name());

    Ok(PagePipeline::new(config, Arc::new(rasterizer), engine))
}

/// Make sure a pdfium library is on disk, downloading it on first run.
fn ensure_pdfium(quiet: bool) -> Result<PathBuf> {
    if pdfium_auto::is_pdfium_cached() || quiet {
        return tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
            .context("Failed to download PDFium engine");
    }

    let dl_bar = ProgressBar::new(0);
    dl_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS),
    );
    dl_bar.set_prefix("PDF engine");
    dl_bar.set_message("Connecting…");
    dl_bar.enable_steady_tick(Duration::from_millis(80));

    let bar = dl_bar.clone();
    let path = tokio::task::block_in_place(|| {
        pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
            if let Some(t) = total {
                if bar.length().unwrap_or(0) != t {
                    bar.set_length(t);
                }
            }
            bar.set_position(downloaded);
        }))
    })
    .context("Failed to download PDFium engine")?;

    dl_bar.finish_with_message("ready ✓");
    Ok(path)
}
