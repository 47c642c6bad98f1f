use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;

use crate::ai::Enricher;
use crate::config::CollectConfig;
use crate::db::Repository;
use crate::error::Result;
use crate::models::{format_capture_time, language_scope, Period};
use crate::source::RepoSource;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub combinations: usize,
    /// Generations written.
    pub captured: usize,
    pub rows: usize,
    /// Combinations whose source returned nothing.
    pub empty: usize,
    pub failed: usize,
    pub summaries_stored: usize,
    pub provider_calls: usize,
}

/// One sequential pass over every configured (period, language) combination.
pub struct Pipeline {
    repository: Arc<Repository>,
    source: Box<dyn RepoSource>,
    enricher: Option<Enricher>,
    config: CollectConfig,
}

impl Pipeline {
    pub fn new(
        repository: Arc<Repository>,
        source: Box<dyn RepoSource>,
        enricher: Option<Enricher>,
        config: CollectConfig,
    ) -> Self {
        Self {
            repository,
            source,
            enricher,
            config,
        }
    }

    /// Runs every combination in turn. A failing combination is logged and
    /// the loop moves on.
    pub async fn run(&self) -> PipelineReport {
        let combinations: Vec<(Period, &str)> = self
            .config
            .periods
            .iter()
            .flat_map(|&period| self.config.languages.iter().map(move |l| (period, l.as_str())))
            .collect();

        let mut report = PipelineReport {
            combinations: combinations.len(),
            ..Default::default()
        };

        for (i, &(period, language)) in combinations.iter().enumerate() {
            let scope = language_scope(language);
            tracing::info!("Processing {} ({})", scope, period);

            match self.collect(period, language, &mut report).await {
                Ok(0) => {
                    tracing::warn!("0 repos fetched for {} ({})", scope, period);
                    report.empty += 1;
                }
                Ok(rows) => {
                    report.captured += 1;
                    report.rows += rows;
                }
                Err(e) => {
                    tracing::error!("Failed processing {} ({}): {}", scope, period, e);
                    report.failed += 1;
                }
            }

            if i + 1 < combinations.len() {
                let delay = self.jitter();
                tracing::debug!("Waiting {:?}", delay);
                tokio::time::sleep(delay).await;
            }
        }

        report
    }

    async fn collect(&self, period: Period, language: &str, report: &mut PipelineReport) -> Result<usize> {
        let repos = self.source.fetch(language, period).await?;
        if repos.is_empty() {
            return Ok(0);
        }

        let captured_at = format_capture_time(Utc::now());
        self.repository.upsert_repos(&repos).await?;

        if let Some(enricher) = self.enricher.as_ref().filter(|e| e.applies_to(language, period)) {
            let summaries = enricher.enrich(&repos).await?;
            report.summaries_stored += summaries.stored;
            report.provider_calls += summaries.calls;
        }

        let scope = language_scope(language);
        let rows = self
            .repository
            .append_generation(period, scope, &captured_at, &repos)
            .await?;

        if let Some(latest) = self.repository.latest_capture(period.as_str(), scope).await? {
            tracing::info!("Captured {} repos for {} ({}) at {}", rows, scope, period, latest);
        }

        Ok(rows)
    }

    fn jitter(&self) -> Duration {
        let (min, max) = (self.config.min_delay_ms, self.config.max_delay_ms);
        let ms = if max > min {
            rand::thread_rng().gen_range(min..=max)
        } else {
            min
        };
        Duration::from_millis(ms)
    }
}
