use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::Repository;
use crate::error::Result;
use crate::models::{AnchorFilter, Batch, GenerationRow};

pub const DEFAULT_LIMIT: u32 = 25;
pub const MAX_LIMIT: u32 = 100;

const DEFAULT_SINCE: &str = "daily";
const DEFAULT_LANG: &str = "all";
const DEFAULT_SUMMARY_LANG: &str = "en";
const ALL_PROVIDERS: &str = "all";

/// Raw query-string parameters. Everything is optional text so that bad input
/// degrades to defaults instead of rejecting the request.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct TrendingParams {
    pub lang: Option<String>,
    pub since: Option<String>,
    pub limit: Option<String>,
    pub provider: Option<String>,
    pub summary_lang: Option<String>,
    pub date: Option<String>,
    pub batch: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TrendingResponse {
    pub success: bool,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    pub data: Vec<TrendingItem>,
}

#[derive(Debug, Serialize)]
pub struct Metadata {
    pub since: String,
    pub lang: String,
    pub summary_lang: String,
    pub providers: Vec<String>,
    pub date: String,
    pub batch: Option<String>,
    pub captured_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingItem {
    pub rank: u32,
    pub author: String,
    pub repo_name: String,
    pub url: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub language_color: Option<String>,
    pub stars: i64,
    pub forks: i64,
    pub current_period_stars: i64,
    pub built_by: Value,
    pub ai_summaries: Option<Vec<SummaryEntry>>,
}

#[derive(Debug, Serialize)]
pub struct SummaryEntry {
    pub provider: String,
    pub content: Option<String>,
}

impl TrendingResponse {
    fn empty() -> Self {
        Self {
            success: true,
            count: 0,
            message: Some("No trending data found for the specified criteria".to_string()),
            metadata: None,
            data: Vec::new(),
        }
    }
}

/// Parses `limit`: non-numeric or non-positive input falls back to the
/// default, large values are capped.
pub fn effective_limit(raw: Option<&str>) -> u32 {
    match raw.map(str::trim).and_then(|s| s.parse::<i64>().ok()) {
        Some(n) if n > 0 => n.min(i64::from(MAX_LIMIT)) as u32,
        _ => DEFAULT_LIMIT,
    }
}

/// Splits the comma-separated `provider` allow-list. Empty means all.
pub fn provider_filter(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

/// Text of one stored summary in the requested language.
///
/// Translation maps yield `None` when the language is absent. Plain-text
/// summaries carry a single language and are returned whatever was asked.
pub fn content_for_language(content: &str, summary_lang: &str) -> Option<String> {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(map)) => map.get(summary_lang).and_then(Value::as_str).map(str::to_string),
        _ => Some(content.to_string()),
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Answers point-in-time trending queries. Stateless and read-only.
pub struct QueryEngine {
    repository: Arc<Repository>,
}

impl QueryEngine {
    pub fn new(repository: Arc<Repository>) -> Self {
        Self { repository }
    }

    pub async fn query(&self, params: &TrendingParams) -> Result<TrendingResponse> {
        let since = non_empty(&params.since).unwrap_or(DEFAULT_SINCE).to_string();
        let lang = non_empty(&params.lang).unwrap_or(DEFAULT_LANG).to_string();
        let summary_lang = non_empty(&params.summary_lang)
            .unwrap_or(DEFAULT_SUMMARY_LANG)
            .to_string();
        let limit = effective_limit(params.limit.as_deref());
        let providers = provider_filter(params.provider.as_deref());
        let date = non_empty(&params.date).map(str::to_string);
        let batch = non_empty(&params.batch).and_then(|b| b.parse::<Batch>().ok());

        let filter = AnchorFilter {
            since: since.clone(),
            language_scope: lang.clone(),
            date: date.clone(),
            batch,
        };

        let Some(captured_at) = self.repository.resolve_anchor(&filter).await? else {
            return Ok(TrendingResponse::empty());
        };

        let rows = self
            .repository
            .load_generation(&since, &lang, &captured_at, &providers, limit)
            .await?;

        let data: Vec<TrendingItem> = rows
            .into_iter()
            .map(|row| to_item(row, &summary_lang))
            .collect();

        let metadata = Metadata {
            since,
            lang,
            summary_lang,
            providers: if providers.is_empty() {
                vec![ALL_PROVIDERS.to_string()]
            } else {
                providers
            },
            date: date.unwrap_or_else(|| {
                captured_at
                    .split(' ')
                    .next()
                    .unwrap_or_default()
                    .to_string()
            }),
            batch: batch
                .or_else(|| Batch::of_capture(&captured_at))
                .map(|b| b.as_str().to_string()),
            captured_at,
        };

        Ok(TrendingResponse {
            success: true,
            count: data.len(),
            message: None,
            metadata: Some(metadata),
            data,
        })
    }
}

fn to_item(row: GenerationRow, summary_lang: &str) -> TrendingItem {
    let summaries: Vec<SummaryEntry> = row
        .summaries
        .iter()
        .map(|summary| SummaryEntry {
            provider: summary.provider.clone(),
            content: content_for_language(&summary.content, summary_lang),
        })
        .collect();

    let built_by = row
        .built_by
        .as_deref()
        .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
        .filter(Value::is_array)
        .unwrap_or_else(|| Value::Array(Vec::new()));

    TrendingItem {
        rank: row.rank,
        author: row.author,
        repo_name: row.name,
        url: row.url,
        description: row.description,
        language: row.language,
        language_color: row.language_color,
        stars: row.stars,
        forks: row.forks,
        current_period_stars: row.current_period_stars,
        built_by,
        ai_summaries: if summaries.is_empty() {
            None
        } else {
            Some(summaries)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{record, temp_repository};
    use crate::models::{Period, ProviderId};

    fn params(pairs: &[(&str, &str)]) -> TrendingParams {
        let mut p = TrendingParams::default();
        for (key, value) in pairs {
            let value = Some(value.to_string());
            match *key {
                "lang" => p.lang = value,
                "since" => p.since = value,
                "limit" => p.limit = value,
                "provider" => p.provider = value,
                "summary_lang" => p.summary_lang = value,
                "date" => p.date = value,
                "batch" => p.batch = value,
                other => panic!("unknown param {other}"),
            }
        }
        p
    }

    async fn seeded_engine() -> (tempfile::TempDir, QueryEngine) {
        let (dir, repository) = temp_repository().await;
        let repos: Vec<_> = (1..=30).map(|rank| record(rank, "org", &format!("repo{rank}"))).collect();
        repository.upsert_repos(&repos).await.unwrap();
        repository
            .append_generation(Period::Daily, "all", "2026-02-17 10:00:00", &repos)
            .await
            .unwrap();
        repository
            .append_generation(Period::Daily, "all", "2026-02-16 15:00:00", &repos[..3])
            .await
            .unwrap();

        repository
            .upsert_summary("org/repo1", ProviderId::DeepSeek, r#"{"en":"This is English","zh":"这是中文"}"#.into())
            .await
            .unwrap();
        repository
            .upsert_summary("org/repo1", ProviderId::ChatGpt, r#"{"en":"ChatGPT English"}"#.into())
            .await
            .unwrap();
        repository
            .upsert_summary("org/repo1", ProviderId::Gemini, r#"{"en":"Gemini English"}"#.into())
            .await
            .unwrap();

        (dir, QueryEngine::new(Arc::new(repository)))
    }

    #[test]
    fn limit_is_clamped_and_defaulted() {
        assert_eq!(effective_limit(None), 25);
        assert_eq!(effective_limit(Some("abc")), 25);
        assert_eq!(effective_limit(Some("0")), 25);
        assert_eq!(effective_limit(Some("-4")), 25);
        assert_eq!(effective_limit(Some("500")), 100);
        assert_eq!(effective_limit(Some("1")), 1);
        assert_eq!(effective_limit(Some(" 40 ")), 40);
    }

    #[test]
    fn provider_list_is_split_and_trimmed() {
        assert_eq!(provider_filter(Some("chatgpt, deepseek,")), vec!["chatgpt", "deepseek"]);
        assert!(provider_filter(Some("")).is_empty());
        assert!(provider_filter(None).is_empty());
    }

    #[test]
    fn language_extraction_from_translations() {
        let stored = r#"{"zh":"这是中文","en":"This is English"}"#;
        assert_eq!(content_for_language(stored, "zh").as_deref(), Some("这是中文"));
        assert_eq!(content_for_language(stored, "fr"), None);
        assert_eq!(
            content_for_language("A plain summary.", "fr").as_deref(),
            Some("A plain summary.")
        );
    }

    #[test]
    fn plain_summaries_that_parse_as_json_are_returned_verbatim() {
        assert_eq!(content_for_language("2024", "en").as_deref(), Some("2024"));
        assert_eq!(content_for_language("true", "zh").as_deref(), Some("true"));
        assert_eq!(content_for_language("[1, 2]", "en").as_deref(), Some("[1, 2]"));
        assert_eq!(
            content_for_language(r#""quoted text""#, "en").as_deref(),
            Some(r#""quoted text""#)
        );
    }

    #[tokio::test]
    async fn defaults_answer_from_latest_generation() {
        let (_dir, engine) = seeded_engine().await;
        let response = engine.query(&TrendingParams::default()).await.unwrap();

        assert!(response.success);
        assert_eq!(response.count, 25);
        let metadata = response.metadata.unwrap();
        assert_eq!(metadata.since, "daily");
        assert_eq!(metadata.lang, "all");
        assert_eq!(metadata.summary_lang, "en");
        assert_eq!(metadata.providers, vec!["all"]);
        assert_eq!(metadata.date, "2026-02-17");
        assert_eq!(metadata.batch.as_deref(), Some("am"));
        assert_eq!(metadata.captured_at, "2026-02-17 10:00:00");

        let first = &response.data[0];
        assert_eq!(first.rank, 1);
        assert_eq!(first.repo_name, "repo1");
        assert_eq!(first.ai_summaries.as_ref().unwrap().len(), 3);
        assert!(response.data[1].ai_summaries.is_none());
        assert_eq!(first.built_by[0]["username"], "org");
    }

    #[tokio::test]
    async fn limit_parameter_bounds_the_rows() {
        let (_dir, engine) = seeded_engine().await;
        let response = engine.query(&params(&[("limit", "abc")])).await.unwrap();
        assert_eq!(response.count, 25);
        let response = engine.query(&params(&[("limit", "500")])).await.unwrap();
        assert_eq!(response.count, 30);
        let response = engine.query(&params(&[("limit", "3")])).await.unwrap();
        assert_eq!(response.count, 3);
    }

    #[tokio::test]
    async fn summary_language_selects_translation() {
        let (_dir, engine) = seeded_engine().await;

        let zh = engine
            .query(&params(&[("summary_lang", "zh"), ("provider", "deepseek")]))
            .await
            .unwrap();
        let entries = zh.data[0].ai_summaries.as_ref().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content.as_deref(), Some("这是中文"));

        let fr = engine.query(&params(&[("summary_lang", "fr")])).await.unwrap();
        let entries = fr.data[0].ai_summaries.as_ref().unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.content.is_none()));
    }

    #[tokio::test]
    async fn provider_filter_restricts_the_join() {
        let (_dir, engine) = seeded_engine().await;
        let response = engine
            .query(&params(&[("provider", "chatgpt,deepseek")]))
            .await
            .unwrap();

        let providers: Vec<_> = response.data[0]
            .ai_summaries
            .as_ref()
            .unwrap()
            .iter()
            .map(|e| e.provider.as_str())
            .collect();
        assert_eq!(providers, vec!["chatgpt", "deepseek"]);
        assert_eq!(response.metadata.unwrap().providers, vec!["chatgpt", "deepseek"]);

        let none = engine.query(&params(&[("provider", "claude")])).await.unwrap();
        assert!(none.data[0].ai_summaries.is_none());
    }

    #[tokio::test]
    async fn batch_and_date_pick_older_generations() {
        let (_dir, engine) = seeded_engine().await;

        let pm = engine.query(&params(&[("batch", "pm")])).await.unwrap();
        assert_eq!(pm.count, 3);
        let metadata = pm.metadata.unwrap();
        assert_eq!(metadata.captured_at, "2026-02-16 15:00:00");
        assert_eq!(metadata.date, "2026-02-16");
        assert_eq!(metadata.batch.as_deref(), Some("pm"));

        let dated = engine.query(&params(&[("date", "2026-02-16")])).await.unwrap();
        assert_eq!(dated.metadata.unwrap().batch.as_deref(), Some("pm"));
    }

    #[tokio::test]
    async fn unmatched_filters_give_empty_success() {
        let (_dir, engine) = seeded_engine().await;

        for query in [
            params(&[("lang", "rust")]),
            params(&[("since", "weekly")]),
            params(&[("date", "2026-02-17"), ("batch", "pm")]),
        ] {
            let response = engine.query(&query).await.unwrap();
            assert!(response.success);
            assert_eq!(response.count, 0);
            assert!(response.data.is_empty());
            assert!(response.metadata.is_none());
        }
    }
}
