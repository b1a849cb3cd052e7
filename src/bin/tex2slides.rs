//! CLI binary for tex2slides.
//!
//! `tex2slides serve` runs the HTTP service; `tex2slides render` pushes one
//! `.tex` file through the same pipeline and writes the result locally.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Mutex;
use tex2slides::logfile::{RotatingFile, DEFAULT_MAX_BYTES};
use tex2slides::pdfium::shared_pdfium;
use tex2slides::{
    latex_to_pdf, latex_to_slides, serve, ExitStatusPolicy, RenderConfig, ServerConfig,
};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve on the default address (0.0.0.0:8000)
  tex2slides serve

  # Use xelatex, fail on any nonzero exit, 30 s limit per compile
  tex2slides serve --latex-program xelatex --exit-status strict --compile-timeout 30

  # Render one file to slide JSON
  tex2slides render talk.tex -o talk.json

  # Compile one file to PDF
  tex2slides render talk.tex --pdf -o talk.pdf

ENDPOINTS:
  POST /                       {"latex": "..."} -> {"slides": ["<base64 jpeg>", ...]}
  POST /download?source=true   returns the source as output.tex
  POST /download               returns the compiled PDF as output.pdf
  GET  /health

ENVIRONMENT VARIABLES:
  TEX2SLIDES_*        Every flag has an env fallback, e.g. TEX2SLIDES_BIND
  PDFIUM_LIB_PATH     Path to an existing libpdfium (file or directory)
  RUST_LOG            Console log filter (overrides --verbose / --quiet)
"#;

/// Compile LaTeX into slide images.
#[derive(Parser, Debug)]
#[command(
    name = "tex2slides",
    version,
    about = "Compile LaTeX into slide images over HTTP",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    log: LogArgs,

    #[command(flatten)]
    render: RenderArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve {
        /// Address to listen on.
        #[arg(long, env = "TEX2SLIDES_BIND", default_value = "0.0.0.0:8000")]
        bind: SocketAddr,

        /// Maximum request body size in bytes.
        #[arg(long, env = "TEX2SLIDES_MAX_BODY_BYTES", default_value_t = 2 * 1024 * 1024)]
        max_body_bytes: usize,
    },

    /// Compile a single .tex file and write slides JSON or the PDF.
    Render {
        /// LaTeX source file.
        input: PathBuf,

        /// Write the compiled PDF instead of slide JSON.
        #[arg(long)]
        pdf: bool,

        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct LogArgs {
    /// Rotating log file (DEBUG level).
    #[arg(long, global = true, env = "TEX2SLIDES_LOG_FILE", default_value = "app.log")]
    log_file: PathBuf,

    /// Size cap of the log file before it rotates.
    #[arg(long, global = true, env = "TEX2SLIDES_LOG_MAX_BYTES", default_value_t = DEFAULT_MAX_BYTES)]
    log_max_bytes: u64,

    /// Number of rotated log files to keep.
    #[arg(long, global = true, env = "TEX2SLIDES_LOG_BACKUPS", default_value_t = 1)]
    log_backups: usize,

    /// Disable the log file.
    #[arg(long, global = true, env = "TEX2SLIDES_NO_LOG_FILE")]
    no_log_file: bool,

    /// Enable DEBUG-level console logs.
    #[arg(short, long, global = true, env = "TEX2SLIDES_VERBOSE")]
    verbose: bool,

    /// Only log errors to the console.
    #[arg(short, long, global = true, env = "TEX2SLIDES_QUIET")]
    quiet: bool,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// LaTeX engine executable.
    #[arg(long, global = true, env = "TEX2SLIDES_LATEX_PROGRAM", default_value = "pdflatex")]
    latex_program: String,

    /// Wall-clock limit for one compile, in seconds.
    #[arg(long, global = true, env = "TEX2SLIDES_COMPILE_TIMEOUT", default_value_t = 60)]
    compile_timeout: u64,

    /// How a nonzero compiler exit status is treated.
    #[arg(long, global = true, env = "TEX2SLIDES_EXIT_STATUS", value_enum, default_value = "lenient")]
    exit_status: ExitStatusArg,

    /// Rendering DPI (72–400).
    #[arg(long, global = true, env = "TEX2SLIDES_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// JPEG quality (1–100).
    #[arg(long, global = true, env = "TEX2SLIDES_JPEG_QUALITY", default_value_t = 75,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Parent directory for per-request scratch directories.
    #[arg(long, global = true, env = "TEX2SLIDES_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// Path to the pdfium library (file or directory).
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ExitStatusArg {
    Lenient,
    Strict,
}

impl From<ExitStatusArg> for ExitStatusPolicy {
    fn from(v: ExitStatusArg) -> Self {
        match v {
            ExitStatusArg::Lenient => ExitStatusPolicy::Lenient,
            ExitStatusArg::Strict => ExitStatusPolicy::Strict,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log)?;
    let render = build_render_config(&cli.render)?;

    // A missing pdfium should not keep the service from starting; requests
    // will fail with PdfiumBindingFailed until it is installed.
    let pdfium_probe = {
        let lib = render.pdfium_lib_path.clone();
        tokio::task::spawn_blocking(move || shared_pdfium(lib.as_deref()).map(|_| ()))
            .await
            .context("pdfium probe task failed")?
    };
    if let Err(e) = pdfium_probe {
        warn!("pdfium is not available yet: {}", e);
    }

    match cli.command {
        Command::Serve {
            bind,
            max_body_bytes,
        } => {
            let config = ServerConfig {
                bind,
                max_body_bytes,
                render,
            };
            info!(
                "Starting tex2slides v{} ({} via {}, {}s timeout, {:?})",
                env!("CARGO_PKG_VERSION"),
                config.render.job_name,
                config.render.latex_program,
                config.render.compile_timeout_secs,
                config.render.exit_status_policy,
            );
            serve(config, shutdown_signal())
                .await
                .context("HTTP server failed")?;
            info!("Server shutdown complete");
        }
        Command::Render { input, pdf, output } => {
            let latex = tokio::fs::read_to_string(&input)
                .await
                .with_context(|| format!("Failed to read {:?}", input))?;

            let bytes = if pdf {
                latex_to_pdf(&latex, &render)
                    .await
                    .context("PDF compilation failed")?
                    .bytes
            } else {
                let slides = latex_to_slides(&latex, &render)
                    .await
                    .context("Slide generation failed")?;
                let mut json =
                    serde_json::to_vec_pretty(&slides).context("Failed to serialise output")?;
                json.push(b'\n');
                json
            };

            match output {
                Some(path) => tokio::fs::write(&path, &bytes)
                    .await
                    .with_context(|| format!("Failed to write {:?}", path))?,
                None => io::stdout()
                    .lock()
                    .write_all(&bytes)
                    .context("Failed to write to stdout")?,
            }
        }
    }

    Ok(())
}

/// Console to stdout (INFO unless overridden), file at DEBUG.
fn init_logging(args: &LogArgs) -> Result<()> {
    let level = if args.verbose {
        "debug"
    } else if args.quiet {
        "error"
    } else {
        "info"
    };
    let console = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)));

    let file = if args.no_log_file {
        None
    } else {
        let sink = RotatingFile::open(&args.log_file, args.log_max_bytes, args.log_backups)
            .with_context(|| format!("Failed to open log file {:?}", args.log_file))?;
        Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(sink))
                .with_filter(LevelFilter::DEBUG),
        )
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .context("Failed to install tracing subscriber")?;
    Ok(())
}

fn build_render_config(args: &RenderArgs) -> Result<RenderConfig> {
    let mut builder = RenderConfig::builder()
        .latex_program(args.latex_program.clone())
        .compile_timeout_secs(args.compile_timeout)
        .exit_status_policy(args.exit_status.into())
        .dpi(args.dpi)
        .jpeg_quality(args.jpeg_quality);

    if let Some(ref dir) = args.scratch_dir {
        builder = builder.scratch_root(dir.clone());
    }
    if let Some(ref lib) = args.pdfium_lib {
        builder = builder.pdfium_lib_path(lib.clone());
    }

    builder.build().context("Invalid configuration")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting graceful shutdown..."),
    }
}
