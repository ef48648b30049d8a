use std::{fs::OpenOptions, path::Path, sync::Arc, sync::Mutex};

use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod ai;
mod bookmarks;
mod cli;
mod config;
mod errors;
mod extract;
mod pipeline;
mod report;
mod scrape;
#[cfg(test)]
mod tests;
mod text;

use ai::AiProcessor;
use config::Config;
use extract::ContentExtractor;
use pipeline::{EnrichmentPipeline, PipelineOptions};
use scrape::HttpClient;

const LOG_FILE: &str = "logs/bookmark_processor.log";
const NOISY_CRATES: [&str; 4] = ["reqwest", "hyper", "html5ever", "selectors"];

fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let mut env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    for krate in NOISY_CRATES {
        env_filter = env_filter.add_directive(format!("{krate}=warn").parse()?);
    }

    let log_path = Path::new(LOG_FILE);
    let file_layer = log_path
        .parent()
        .map_or(Ok(()), |dir| std::fs::create_dir_all(dir))
        .and_then(|_| OpenOptions::new().create(true).append(true).open(log_path))
        .map_err(|err| eprintln!("could not open {LOG_FILE}: {err}"))
        .ok()
        .map(|file| fmt::layer().with_ansi(false).with_writer(Mutex::new(file)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();

    init_logging(args.verbose)?;

    if !args.input.exists() {
        eprintln!("Error: Input file not found: {}", args.input.display());
        std::process::exit(1);
    }

    let mut config = Config::load_with(&args.config)?;
    if let Some(format) = args.format {
        config.output.format = format.into();
    }
    if args.resume {
        config.output.resume_processing = true;
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| cli::default_output_path(&args.input, config.output.format));

    let fetcher = Arc::new(HttpClient::new(&config.scraping)?);
    let extractor = ContentExtractor::with_fetcher(&config.scraping, fetcher);
    let processor = AiProcessor::new(&config.processing, ai::backends::from_config(&config.ai)?);

    let mut options = PipelineOptions::from_config(&config);
    options.show_progress = !args.no_progress;

    let pipeline = EnrichmentPipeline::new(Box::new(extractor), processor, options);
    let summary = pipeline.process_file(&args.input, &output)?;

    log::info!("Summary written to {}", summary.summary_path.display());
    println!(
        "Processing complete. Enriched bookmarks saved to: {}",
        summary.output_path.display()
    );

    Ok(())
}
