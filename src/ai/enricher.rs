//! Fills in missing (repository, provider) summaries.
//!
//! The set of completed pairs is read from the store once per run and kept in
//! memory; a provider that already has a stored summary for a repository is
//! never called again. Provider failures are logged and skipped. A failed
//! store write abandons the rest of that repository only.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::config::{AiConfig, DispatchMode};
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{Period, ProviderId, RepoRecord};

use super::prompt::{parse_summary, render_prompt};
use super::registry::ProviderRegistry;

/// Counters for one `enrich` run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EnrichReport {
    pub repos: usize,
    /// Repositories with nothing missing; no call was made for them.
    pub cached: usize,
    /// Provider calls issued, retries included.
    pub calls: usize,
    pub stored: usize,
    /// Providers given up on for a repository in this run.
    pub failed: usize,
    /// Repositories cut short by a store write failure.
    pub aborted: usize,
}

struct Attempt {
    provider: ProviderId,
    calls: usize,
    result: Result<String>,
}

pub struct Enricher {
    repository: Arc<Repository>,
    registry: ProviderRegistry,
    config: AiConfig,
    providers: Vec<ProviderId>,
}

impl Enricher {
    pub fn new(repository: Arc<Repository>, registry: ProviderRegistry, config: AiConfig) -> Self {
        let mut seen = HashSet::new();
        let providers = config
            .providers
            .iter()
            .copied()
            .filter(|p| seen.insert(*p))
            .collect();

        Self {
            repository,
            registry,
            config,
            providers,
        }
    }

    pub fn applies_to(&self, language: &str, period: Period) -> bool {
        self.config.applies_to(language, period)
    }

    /// Summarizes every repository that is missing a configured provider.
    ///
    /// Only a failure to read the completed index is returned as an error.
    pub async fn enrich(&self, repos: &[RepoRecord]) -> Result<EnrichReport> {
        let mut index = self.repository.completed_index().await?;
        let mut report = EnrichReport {
            repos: repos.len(),
            ..Default::default()
        };

        tracing::info!(
            "Summarizing {} repositories with {:?} ({:?} mode)",
            repos.len(),
            self.providers,
            self.config.mode
        );

        for (i, repo) in repos.iter().enumerate() {
            let full_name = repo.full_name();
            let missing = self.missing_providers(index.get(&full_name));

            if missing.is_empty() {
                report.cached += 1;
                continue;
            }

            let prompt = render_prompt(&self.config.prompt_template, repo);
            let attempts = match self.config.mode {
                DispatchMode::Parallel => self.dispatch_parallel(&missing, &prompt).await,
                DispatchMode::Fallback => self.dispatch_fallback(&full_name, &missing, &prompt).await,
            };

            let calls: usize = attempts.iter().map(|a| a.calls).sum();
            report.calls += calls;

            if let Err(e) = self.persist(&full_name, attempts, &mut index, &mut report).await {
                tracing::error!("{}", e);
                report.aborted += 1;
            }

            if calls > 0 && i + 1 < repos.len() && self.config.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.delay_ms)).await;
            }
        }

        tracing::info!(
            "Summaries done for {} repos: {} stored, {} failed, {} cached, {} aborted, {} calls",
            report.repos,
            report.stored,
            report.failed,
            report.cached,
            report.aborted,
            report.calls
        );

        Ok(report)
    }

    /// Configured providers without a stored summary, in priority order.
    fn missing_providers(&self, done: Option<&HashSet<ProviderId>>) -> Vec<ProviderId> {
        self.providers
            .iter()
            .copied()
            .filter(|p| !done.is_some_and(|d| d.contains(p)))
            .collect()
    }

    async fn dispatch_parallel(&self, providers: &[ProviderId], prompt: &str) -> Vec<Attempt> {
        join_all(providers.iter().map(|&p| self.attempt(p, prompt))).await
    }

    async fn dispatch_fallback(
        &self,
        full_name: &str,
        providers: &[ProviderId],
        prompt: &str,
    ) -> Vec<Attempt> {
        let mut attempts = Vec::new();
        for &provider in providers {
            let attempt = self.attempt(provider, prompt).await;
            let succeeded = attempt.result.is_ok();
            attempts.push(attempt);
            if succeeded {
                break;
            }
            tracing::debug!("{}: falling back after {} failed", full_name, provider);
        }
        attempts
    }

    /// Calls one provider until it succeeds, fails for good, or runs out of retries.
    async fn attempt(&self, provider: ProviderId, prompt: &str) -> Attempt {
        let Some(adapter) = self.registry.get(provider) else {
            return Attempt {
                provider,
                calls: 0,
                result: Err(AppError::ProviderUnavailable {
                    provider: provider.to_string(),
                    reason: "no adapter registered".to_string(),
                }),
            };
        };

        let provider_config = self.config.provider_config(provider);
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let mut calls = 0;

        loop {
            calls += 1;
            let result = match tokio::time::timeout(timeout, adapter.summarize(prompt, provider_config)).await {
                Ok(result) => result,
                Err(_) => Err(AppError::Timeout(timeout)),
            };

            match result {
                Ok(raw) => {
                    return Attempt {
                        provider,
                        calls,
                        result: parse_summary(&raw, self.config.summary_format),
                    };
                }
                Err(e) if e.is_retryable() && calls <= self.config.max_retries as usize => {
                    tracing::debug!("{} attempt {} failed, retrying: {}", provider, calls, e);
                    let backoff = self.backoff(calls);
                    if !backoff.is_zero() {
                        tokio::time::sleep(backoff).await;
                    }
                }
                Err(e) => {
                    return Attempt {
                        provider,
                        calls,
                        result: Err(e),
                    };
                }
            }
        }
    }

    fn backoff(&self, failed_calls: usize) -> Duration {
        let exponent = (failed_calls.saturating_sub(1)).min(16) as u32;
        Duration::from_millis(self.config.retry_backoff_ms.saturating_mul(1 << exponent))
    }

    /// Stores successful attempts in order. The first write failure stops the
    /// remaining providers of this repository.
    async fn persist(
        &self,
        full_name: &str,
        attempts: Vec<Attempt>,
        index: &mut HashMap<String, HashSet<ProviderId>>,
        report: &mut EnrichReport,
    ) -> Result<()> {
        for attempt in attempts {
            match attempt.result {
                Ok(content) => {
                    self.repository
                        .upsert_summary(full_name, attempt.provider, content)
                        .await
                        .map_err(|e| AppError::StoreWrite {
                            full_name: full_name.to_string(),
                            provider: attempt.provider.to_string(),
                            reason: e.to_string(),
                        })?;
                    index
                        .entry(full_name.to_string())
                        .or_default()
                        .insert(attempt.provider);
                    report.stored += 1;
                    tracing::info!("Stored {} summary for {}", attempt.provider, full_name);
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!("{} summary for {} failed: {}", attempt.provider, full_name, e);
                }
            }
        }
        Ok(())
    }
}
