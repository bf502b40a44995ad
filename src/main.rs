//! # Marketplace Scout
//!
//! Answers "which marketplace partner solves X in region Y?" against a
//! dynamically rendered partner catalog. Each query crawls the live catalog
//! index, keeps the listings whose names match the keywords, fetches their
//! detail pages concurrently, and keeps the ones approved for the region.
//!
//! ## Usage
//!
//! ```sh
//! marketplace_scout serve
//! marketplace_scout search -k "ap automation" -r UK
//! marketplace_scout ask "What MPP is good for AP Automation in the UK?"
//! ```
//!
//! ## Architecture
//!
//! 1. **Loading**: grow the index page until it stops changing
//! 2. **Extracting**: collect unique listing links in discovery order
//! 3. **Filtering**: match keywords against listing names
//! 4. **Enriching**: scrape provider and approved countries (5 at a time by default)
//! 5. **Region filter**: keep listings approved for the requested region

use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod config;
mod enrich;
mod error;
mod filter;
mod loader;
mod models;
mod outputs;
mod pipeline;
mod query;
mod region;
mod render;
mod scrapers;
mod server;
mod utils;

use cli::{Cli, Command, Renderer};
use config::ScoutConfig;
use models::{AskResponse, SearchScope};
use pipeline::Pipeline;
use render::{HttpProvider, RenderProvider};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let start_time = std::time::Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "marketplace_scout starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let mut config = ScoutConfig::load(args.config.as_deref())?;
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Command::Serve { bind: Some(bind) } = &args.command {
        config.bind = bind.clone();
    }
    let config = config.validated()?;
    info!(
        catalog = %config.catalog_url,
        concurrency = config.concurrency,
        renderer = ?args.renderer,
        "Configuration ready"
    );

    let outcome = match args.renderer {
        Renderer::Http => run(HttpProvider::new(&config)?, &config, args.command).await,
        #[cfg(feature = "browser")]
        Renderer::Browser => {
            let provider = render::browser::BrowserProvider::launch(&config)?;
            run(provider, &config, args.command).await
        }
        #[cfg(not(feature = "browser"))]
        Renderer::Browser => Err(error::ScoutError::Config(
            "the browser renderer needs a build with `--features browser`".to_string(),
        )
        .into()),
    };

    let elapsed = start_time.elapsed();
    match &outcome {
        Ok(()) => info!(elapsed_ms = elapsed.as_millis(), "marketplace_scout finished"),
        Err(e) => error!(elapsed_ms = elapsed.as_millis(), error = %e, "marketplace_scout failed"),
    }
    outcome
}

/// Run one subcommand against an already-built provider.
async fn run<P: RenderProvider>(
    provider: P,
    config: &ScoutConfig,
    command: Command,
) -> Result<(), Box<dyn Error>> {
    let pipeline = Arc::new(Pipeline::from_config(provider, config)?);
    let scope_for = |full_text: bool| {
        if full_text {
            SearchScope::FullText
        } else {
            pipeline.default_scope()
        }
    };

    match command {
        Command::Serve { .. } => {
            server::serve(Arc::clone(&pipeline), &config.bind).await?;
        }
        Command::Search {
            keywords,
            region,
            policy,
            full_text,
            output_dir,
        } => {
            let query = query::from_params(
                &keywords,
                region.as_deref(),
                policy.as_deref(),
                scope_for(full_text),
            )?;
            let result = pipeline.run(&query).await?;
            if let Some(dir) = output_dir.as_deref() {
                outputs::json::write_results(&query, &result, dir).await?;
            }
            println!("{}", serde_json::to_string_pretty(&result.records())?);
        }
        Command::Ask { question, full_text } => {
            let query = query::from_question(&question, scope_for(full_text))?;
            let result = pipeline.run(&query).await?;
            let results = result.records();
            let answer = AskResponse {
                query: question,
                keywords_used: query.keywords,
                region_used: query.region,
                count: results.len(),
                results,
            };
            println!("{}", serde_json::to_string_pretty(&answer)?);
        }
    }

    pipeline.pool().close();
    Ok(())
}
