use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Scope key stored for the "all languages" listing.
pub const ALL_LANGUAGES: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Daily,
    Weekly,
    Monthly,
}

impl Period {
    pub const ALL: [Period; 3] = [Period::Daily, Period::Weekly, Period::Monthly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Daily => "daily",
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Period::Daily),
            "weekly" => Ok(Period::Weekly),
            "monthly" => Ok(Period::Monthly),
            other => Err(AppError::Config(format!("unknown period: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    pub username: String,
    pub avatar: String,
}

/// One ranked entry as produced by a collector for a (language, period) fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoRecord {
    pub rank: u32,
    pub author: String,
    #[serde(rename = "repoName")]
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub language_color: Option<String>,
    #[serde(default)]
    pub stars: i64,
    #[serde(default)]
    pub forks: i64,
    #[serde(default)]
    pub current_period_stars: i64,
    #[serde(default)]
    pub built_by: Vec<Contributor>,
}

impl RepoRecord {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.author, self.name)
    }
}

/// Maps a collector language ("" for all languages) to its stored scope key.
pub fn language_scope(language: &str) -> &str {
    if language.is_empty() {
        ALL_LANGUAGES
    } else {
        language
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_parses_case_insensitively() {
        assert_eq!("Weekly".parse::<Period>().unwrap(), Period::Weekly);
        assert!("yearly".parse::<Period>().is_err());
    }

    #[test]
    fn empty_language_maps_to_all_scope() {
        assert_eq!(language_scope(""), "all");
        assert_eq!(language_scope("rust"), "rust");
    }

    #[test]
    fn record_deserializes_collector_json() {
        let record: RepoRecord = serde_json::from_str(
            r##"{
                "rank": 1,
                "author": "tokio-rs",
                "repoName": "axum",
                "url": "https://github.com/tokio-rs/axum",
                "description": "Ergonomic web framework",
                "language": "Rust",
                "languageColor": "#dea584",
                "stars": 20000,
                "forks": 1000,
                "currentPeriodStars": 120,
                "builtBy": [{"username": "davidpdrsn", "avatar": "https://a/1.png"}]
            }"##,
        )
        .unwrap();

        assert_eq!(record.full_name(), "tokio-rs/axum");
        assert_eq!(record.language_color.as_deref(), Some("#dea584"));
        assert_eq!(record.built_by.len(), 1);
    }
}
