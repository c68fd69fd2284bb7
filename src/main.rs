use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::eyre;
use leakprobe::config::{self, load_config, load_config_from_path};
use leakprobe::event::EventHandler;
use leakprobe::harness::{Harness, HarnessSettings};
use leakprobe::logging;
use leakprobe::summary::RunSummary;
use ratatui::Terminal;
use ratatui::backend::TestBackend;

#[cfg(not(feature = "dhat-heap"))]
#[global_allocator]
static ALLOC: leakprobe::system::heap::CountingAlloc = leakprobe::system::heap::CountingAlloc;

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

#[derive(Parser)]
#[command(
    name = "leakprobe",
    about = "Decode and draw a PNG in a loop while sampling process memory"
)]
struct Cli {
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of decode/render iterations
    #[arg(long)]
    iterations: Option<u64>,

    /// Milliseconds between usage reports
    #[arg(long)]
    report_interval: Option<u64>,

    /// Surface source: stream, stored
    #[arg(long)]
    decode_mode: Option<String>,

    /// When surfaces and textures are released: iteration, deferred
    #[arg(long)]
    release: Option<String>,

    /// Usage probe: ps, sysinfo
    #[arg(long)]
    source: Option<String>,

    /// Decode this PNG instead of the generated test image
    #[arg(long)]
    image: Option<PathBuf>,

    /// Do not ask the allocator to return memory after each frame
    #[arg(long, default_value_t = false)]
    no_trim: bool,

    /// Render off-screen and print report lines to stdout.
    #[arg(long, default_value_t = false)]
    headless: bool,

    /// Off-screen terminal width for headless mode.
    #[arg(long, default_value_t = 100)]
    headless_width: u16,

    /// Off-screen terminal height for headless mode.
    #[arg(long, default_value_t = 40)]
    headless_height: u16,

    /// Tracing output file (JSON lines).
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Write the run summary as JSON to this file.
    #[arg(long)]
    summary: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    #[cfg(feature = "dhat-heap")]
    let _profile = leakprobe::system::heap::HeapProfile::start();

    let cli = Cli::parse();
    if let Some(path) = &cli.log_file {
        logging::init_tracing_json(path)?;
    }

    let config = load_config_for_cli(&cli);
    let settings = HarnessSettings::from_config(&config);
    let shutdown = Arc::new(AtomicBool::new(false));

    let summary = if cli.headless {
        run_headless(settings, &cli, shutdown).await?
    } else {
        run_interactive(settings, shutdown).await?
    };

    println!("{summary}");
    if let Some(path) = &cli.summary {
        summary.write_json(path)?;
    }
    Ok(())
}

async fn run_interactive(settings: HarnessSettings, shutdown: Arc<AtomicBool>) -> Result<RunSummary> {
    let mut terminal = ratatui::init();
    let _events = EventHandler::spawn(Arc::clone(&shutdown));

    let result = tokio::task::spawn_blocking(move || {
        let mut harness = Harness::new(settings)?;
        harness.run(&mut terminal, &shutdown, false)
    })
    .await;

    ratatui::restore();

    result.map_err(|e| eyre!("render loop panicked: {e}"))?
}

async fn run_headless(
    settings: HarnessSettings,
    cli: &Cli,
    shutdown: Arc<AtomicBool>,
) -> Result<RunSummary> {
    if cli.headless_width == 0 || cli.headless_height == 0 {
        return Err(eyre!(
            "--headless-width and --headless-height must be greater than 0"
        ));
    }

    let backend = TestBackend::new(cli.headless_width, cli.headless_height);
    let mut terminal = Terminal::new(backend)?;
    let _events = EventHandler::spawn_signal(Arc::clone(&shutdown));

    tokio::task::spawn_blocking(move || {
        let mut harness = Harness::new(settings)?;
        harness.run(&mut terminal, &shutdown, true)
    })
    .await
    .map_err(|e| eyre!("render loop panicked: {e}"))?
}

fn load_config_for_cli(cli: &Cli) -> config::Config {
    let mut config = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };

    if let Some(iterations) = cli.iterations {
        config.general.iterations = iterations;
    }
    if let Some(interval) = cli.report_interval {
        config.general.report_interval_ms = interval;
    }
    if let Some(ref mode) = cli.decode_mode {
        config.general.decode_mode = mode.clone();
    }
    if let Some(ref release) = cli.release {
        config.general.release = release.clone();
    }
    if let Some(ref source) = cli.source {
        config.sampler.source = source.clone();
    }
    if let Some(ref image) = cli.image {
        config.image.path = Some(image.clone());
    }
    if cli.no_trim {
        config.general.trim_heap = false;
    }

    config
}
