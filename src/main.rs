use std::sync::Arc;

mod ai;
mod api;
mod config;
mod db;
mod error;
mod models;
mod pipeline;
mod source;

use ai::{Enricher, ProviderRegistry};
use api::{run_server, QueryEngine, TrendingParams};
use config::Config;
use db::Repository;
use models::ProviderId;
use error::Result;
use pipeline::Pipeline;
use source::JsonDirSource;

const USAGE: &str =
    "Usage: trending-digest [--serve | --collect [dir] | --latest <since> <lang> | --summaries <owner/name>]";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let config = Config::load()?;
    let repository = Arc::new(Repository::new(&config.db_path).await?);

    match args.get(1).map(String::as_str) {
        None | Some("--serve") => {
            let engine = Arc::new(QueryEngine::new(repository));
            run_server(&config.server.bind, engine).await?;
        }
        Some("--collect") => {
            let dir = args
                .get(2)
                .cloned()
                .unwrap_or_else(|| config.collect.source_dir.clone());

            let enricher = if config.ai.enabled {
                let registry = ProviderRegistry::with_defaults()?;
                tracing::info!(
                    "AI enrichment enabled ({} adapters, {:?} mode)",
                    registry.len(),
                    config.ai.mode
                );
                Some(Enricher::new(repository.clone(), registry, config.ai.clone()))
            } else {
                None
            };

            let pipeline = Pipeline::new(
                repository,
                Box::new(JsonDirSource::new(&dir)),
                enricher,
                config.collect.clone(),
            );
            let report = pipeline.run().await;
            println!(
                "Captured {} of {} combinations ({} rows, {} empty, {} failed), {} summaries stored from {} provider calls",
                report.captured,
                report.combinations,
                report.rows,
                report.empty,
                report.failed,
                report.summaries_stored,
                report.provider_calls
            );
        }
        Some("--latest") => {
            let params = TrendingParams {
                since: args.get(2).cloned(),
                lang: args.get(3).cloned(),
                ..TrendingParams::default()
            };
            let response = QueryEngine::new(repository).query(&params).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Some("--summaries") => {
            let Some(full_name) = args.get(2) else {
                eprintln!("{}", USAGE);
                std::process::exit(2);
            };
            let mut providers: Vec<ProviderId> =
                repository.completed_providers(full_name).await?.into_iter().collect();
            providers.sort();

            let mut summaries = Vec::new();
            for provider in providers {
                if let Some(summary) = repository.get_summary(full_name, provider).await? {
                    summaries.push(summary);
                }
            }
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        Some(other) => {
            eprintln!("Unknown argument: {}\n{}", other, USAGE);
            std::process::exit(2);
        }
    }

    Ok(())
}
