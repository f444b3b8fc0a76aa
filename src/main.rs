use anyhow::Context;
use clap::Parser;
use std::{path::PathBuf, process::ExitCode};
use tracing::{error, info, instrument, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use webpify::{pipeline, Config};

#[derive(Parser, Debug)]
#[command(
    name = "webpify",
    about = "Convert travel avatars & images to WebP and point the manifest at them",
    version
)]
struct Cli {
    /// the project root; source, output and manifest paths are resolved against it
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// a JSON config file. defaults to `.webpify.json` in the root, if present
    #[arg(long)]
    config: Option<PathBuf>,

    /// the longest side an image may have before it is scaled down
    #[arg(long)]
    max_dimension: Option<u32>,

    /// the webp compression quality of the images, between 0 and 100
    #[arg(long, short)]
    quality: Option<u8>,

    /// the number of threads to use for converting.
    /// defaults to the number of logical CPUs, 1 converts strictly in order
    #[arg(long, short)]
    threads: Option<usize>,

    /// log every step
    #[arg(long, short, conflicts_with = "quiet")]
    verbose: bool,

    /// only log warnings and errors
    #[arg(long, short = 'Q')]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Conversion failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[instrument(skip(cli), fields(root = %cli.root.display()))]
fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = build_config(cli)?;
    let summary = pipeline::run(&config)?;

    if summary.failed() > 0 {
        warn!("{} files could not be converted", summary.failed());
    }
    if !summary.dangling.is_empty() {
        warn!(
            "{} manifest references point at missing webp files",
            summary.dangling.len()
        );
    }

    info!(
        "Done: converted {} files, updated {} records",
        summary.converted(),
        summary.records
    );

    Ok(())
}

fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    // an explicit --config must exist, the implicit one in the root may not
    let mut config = match &cli.config {
        Some(path) => Config::load(path),
        None => Config::load_or_default(&cli.root.join(Config::FILE_NAME)),
    }
    .context("Failed to load config")?;
    config.layout.root = cli.root.clone();

    if let Some(max_dimension) = cli.max_dimension {
        config.convert.max_dimension = max_dimension;
    }
    if let Some(quality) = cli.quality {
        config.convert.quality = quality;
    }
    if let Some(threads) = cli.threads {
        config.convert.threads = Some(threads);
    }

    config.validate()?;
    Ok(config)
}

fn log_level(verbose: bool, quiet: bool) -> &'static str {
    if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    }
}

fn setup_logging(verbose: bool, quiet: bool) {
    let level = log_level(verbose, quiet);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // also installs the `log` bridge for the library's log macros
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(filter)
        .with(tracing_error::ErrorLayer::default())
        .init();
}
