use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use futures::executor::block_on;
use pdf_engine::{default_engine, OpenSource, PdfEngine, RenderRequest};
use pdf_viewer_core::{
    ConfigUpdate, DocumentSession, HostCommand, RecordingHost, ViewerSettings, ViewportState,
};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "pdf-viewer-cli")]
#[command(about = "Headless driver for the PDF viewer core")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Render one page to a PNG.
    Render {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 1.0)]
        scale: f64,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Load a PDF into a viewer session and print what it sends to the host.
    Simulate(SimulateArgs),
    /// Print CLI version.
    Version,
}

#[derive(Debug, Args)]
struct SimulateArgs {
    #[arg(value_name = "FILE")]
    file: PathBuf,
    /// Viewport width in layout pixels
    #[arg(long, default_value_t = 800.0)]
    width: f64,
    /// Viewport height in layout pixels
    #[arg(long, default_value_t = 600.0)]
    height: f64,
    /// Extra configuration as the host's JSON property map
    #[arg(long, value_name = "JSON")]
    config: Option<String>,
    /// Scroll offsets along the page strip to visit after loading
    #[arg(long = "scroll", value_name = "OFFSET")]
    scroll: Vec<f64>,
    /// Print pipe-delimited event messages instead of JSON
    #[arg(long)]
    messages: bool,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    first_page_size_pt: Option<PageSizeOutput>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f64,
    height: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateOutput {
    page_count: usize,
    current_page: usize,
    scale: f64,
    commands: Vec<HostCommand>,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Render { file, page, scale, output } => {
            run_render(&file, page, scale, output.as_deref())
        }
        Commands::Simulate(args) => run_simulate(args),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_info(file: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;

    let engine = default_engine();
    let document = engine.open(&OpenSource::from(file), None).context("failed to open PDF")?;

    let page_count = document.page_count();
    let first_page_size_pt = if page_count > 0 {
        let size = document.page_size(0)?;
        Some(PageSizeOutput { width: size.width_pt, height: size.height_pt })
    } else {
        None
    };

    let payload = InfoOutput { path: file.display().to_string(), page_count, first_page_size_pt };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    Ok(())
}

fn run_render(file: &Path, page: u32, scale: f64, output: Option<&Path>) -> Result<()> {
    ensure_pdf_exists(file)?;

    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }
    if !scale.is_finite() || scale <= 0.0 {
        anyhow::bail!("--scale must be a positive number");
    }

    let engine = default_engine();
    let document = engine.open(&OpenSource::from(file), None).context("failed to open PDF")?;

    let request = RenderRequest { page_index: page - 1, scale, annotations: false };
    let image = block_on(document.render_page(request)).context("failed to render page")?;

    let output =
        output.map(ToOwned::to_owned).unwrap_or_else(|| default_render_output(file, page));

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    image
        .save(&output)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());

    Ok(())
}

fn run_simulate(args: SimulateArgs) -> Result<()> {
    ensure_pdf_exists(&args.file)?;

    let settings = ViewerSettings::from_env().context("invalid viewer settings")?;
    let mut update = match &args.config {
        Some(json) => ConfigUpdate::from_json(json).context("invalid --config")?,
        None => ConfigUpdate::default(),
    };
    update.source = Some(args.file.display().to_string());

    let host = Arc::new(RecordingHost::new());
    let session =
        DocumentSession::new(Arc::new(default_engine()), host.clone()).with_settings(settings);

    block_on(async {
        session.on_viewport_changed(ViewportState::sized(args.width, args.height), false).await;
        session.apply_config(update).await.context("failed to load PDF")?;
        session.on_layout_settled();

        for &offset in &args.scroll {
            let viewport = if session.config().orientation.is_horizontal() {
                ViewportState::new(offset, 0.0, args.width, args.height)
            } else {
                ViewportState::new(0.0, offset, args.width, args.height)
            };
            session.on_viewport_changed(viewport, false).await;
        }

        anyhow::Ok(())
    })?;

    if args.messages {
        for event in host.events() {
            println!("{}", event.to_message());
        }
        return Ok(());
    }

    let payload = SimulateOutput {
        page_count: session.page_count(),
        current_page: session.current_page() + 1,
        scale: session.scale(),
        commands: host.take(),
    };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    Ok(())
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_render_output(file: &Path, page: u32) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("page");

    file.with_file_name(format!("{stem}-page-{page}.png"))
}
