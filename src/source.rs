use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{language_scope, Period, RepoRecord};

/// Produces the ranked list for one (language, period) combination.
///
/// `language` is the collector key; the empty string is the all-languages list.
#[async_trait]
pub trait RepoSource: Send + Sync {
    async fn fetch(&self, language: &str, period: Period) -> Result<Vec<RepoRecord>>;
}

/// Reads pre-collected listings laid out as `<root>/<period>/<scope>.json`,
/// each file a JSON array of records.
pub struct JsonDirSource {
    root: PathBuf,
}

impl JsonDirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, language: &str, period: Period) -> PathBuf {
        self.root
            .join(period.as_str())
            .join(format!("{}.json", language_scope(language).to_lowercase()))
    }
}

#[async_trait]
impl RepoSource for JsonDirSource {
    async fn fetch(&self, language: &str, period: Period) -> Result<Vec<RepoRecord>> {
        let path = self.path_for(language, period);
        if !tokio::fs::try_exists(&path).await? {
            tracing::debug!("No listing at {}", path.display());
            return Ok(Vec::new());
        }

        let content = tokio::fs::read_to_string(&path).await?;
        let mut repos: Vec<RepoRecord> = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Malformed listing {}: {}", path.display(), e))?;
        repos.sort_by_key(|r| r.rank);
        Ok(repos)
    }
}
