use std::collections::{HashMap, HashSet};

use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{AnchorFilter, Batch, GenerationRow, Period, ProviderId, RepoRecord, Summary};

use super::schema::SCHEMA;

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Repository operations

    /// Inserts or refreshes every observed repository. Identity columns are
    /// never rewritten.
    pub async fn upsert_repos(&self, repos: &[RepoRecord]) -> Result<usize> {
        let repos = repos.to_vec();
        let count = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        r#"INSERT INTO repositories (full_name, author, name, url, description, language, language_color)
                           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                           ON CONFLICT(full_name) DO UPDATE SET
                               description = excluded.description,
                               language = excluded.language,
                               language_color = excluded.language_color"#,
                    )?;
                    for repo in &repos {
                        stmt.execute(params![
                            repo.full_name(),
                            repo.author,
                            repo.name,
                            repo.url,
                            repo.description,
                            repo.language,
                            repo.language_color,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(repos.len())
            })
            .await?;
        Ok(count)
    }

    // Snapshot operations

    /// Writes one generation atomically: either every ranked row lands under
    /// `captured_at` or none does.
    pub async fn append_generation(
        &self,
        period: Period,
        language_scope: &str,
        captured_at: &str,
        rows: &[RepoRecord],
    ) -> Result<usize> {
        let rows = rows
            .iter()
            .map(|repo| -> Result<(RepoRecord, String)> {
                Ok((repo.clone(), serde_json::to_string(&repo.built_by)?))
            })
            .collect::<Result<Vec<_>>>()?;
        let since = period.as_str();
        let scope = language_scope.to_string();
        let captured_at = captured_at.to_string();

        let count = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        r#"INSERT INTO snapshots (full_name, since, language_scope, rank, stars, forks, current_period_stars, built_by, captured_at)
                           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
                    )?;
                    for (repo, built_by) in &rows {
                        stmt.execute(params![
                            repo.full_name(),
                            since,
                            scope,
                            repo.rank,
                            repo.stars,
                            repo.forks,
                            repo.current_period_stars,
                            built_by,
                            captured_at,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(rows.len())
            })
            .await?;
        Ok(count)
    }

    /// Most recent capture time among the snapshots matching `filter`.
    pub async fn resolve_anchor(&self, filter: &AnchorFilter) -> Result<Option<String>> {
        let mut sql =
            String::from("SELECT captured_at FROM snapshots WHERE since = ? AND language_scope = ?");
        let mut values = vec![filter.since.clone(), filter.language_scope.clone()];

        if let Some(date) = &filter.date {
            sql.push_str(" AND date(captured_at) = ?");
            values.push(date.clone());
        }

        match filter.batch {
            Some(Batch::Am) => sql.push_str(" AND CAST(strftime('%H', captured_at) AS INTEGER) < 12"),
            Some(Batch::Pm) => sql.push_str(" AND CAST(strftime('%H', captured_at) AS INTEGER) >= 12"),
            None => {}
        }

        sql.push_str(" ORDER BY captured_at DESC LIMIT 1");

        let anchor = self
            .conn
            .call(move |conn| {
                let anchor = conn
                    .query_row(&sql, params_from_iter(values), |row| row.get::<_, String>(0))
                    .optional()?;
                Ok(anchor)
            })
            .await?;
        Ok(anchor)
    }

    pub async fn latest_capture(&self, since: &str, language_scope: &str) -> Result<Option<String>> {
        self.resolve_anchor(&AnchorFilter {
            since: since.to_string(),
            language_scope: language_scope.to_string(),
            date: None,
            batch: None,
        })
        .await
    }

    /// Loads one generation in rank order, each row carrying the stored
    /// summaries of the requested providers (all providers when empty).
    pub async fn load_generation(
        &self,
        since: &str,
        language_scope: &str,
        captured_at: &str,
        providers: &[String],
        limit: u32,
    ) -> Result<Vec<GenerationRow>> {
        let since = since.to_string();
        let scope = language_scope.to_string();
        let captured_at = captured_at.to_string();
        let providers = providers.to_vec();

        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT s.full_name, s.rank, r.author, r.name, r.url, r.description,
                              r.language, r.language_color, s.stars, s.forks,
                              s.current_period_stars, s.built_by
                       FROM snapshots s
                       JOIN repositories r ON s.full_name = r.full_name
                       WHERE s.since = ?1 AND s.language_scope = ?2 AND s.captured_at = ?3
                       ORDER BY s.rank ASC
                       LIMIT ?4"#,
                )?;
                let mut rows = stmt
                    .query_map(params![since, scope, captured_at, limit], generation_row_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;

                if rows.is_empty() {
                    return Ok(rows);
                }

                let mut sql = format!(
                    "SELECT full_name, provider, content, generated_at FROM ai_summaries WHERE full_name IN ({})",
                    placeholders(rows.len())
                );
                if !providers.is_empty() {
                    sql.push_str(&format!(" AND provider IN ({})", placeholders(providers.len())));
                }
                sql.push_str(" ORDER BY full_name, provider");

                let values = rows
                    .iter()
                    .map(|row| row.full_name.clone())
                    .chain(providers.iter().cloned())
                    .collect::<Vec<_>>();

                let mut stmt = conn.prepare(&sql)?;
                let summaries = stmt
                    .query_map(params_from_iter(values), summary_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;

                let mut by_repo: HashMap<String, Vec<Summary>> = HashMap::new();
                for summary in summaries {
                    by_repo.entry(summary.full_name.clone()).or_default().push(summary);
                }
                for row in &mut rows {
                    row.summaries = by_repo.remove(&row.full_name).unwrap_or_default();
                }

                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    // Summary operations

    /// Insert-or-replace on (full_name, provider). Never merges contents.
    pub async fn upsert_summary(
        &self,
        full_name: &str,
        provider: ProviderId,
        content: String,
    ) -> Result<()> {
        let full_name = full_name.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO ai_summaries (full_name, provider, content)
                       VALUES (?1, ?2, ?3)
                       ON CONFLICT(full_name, provider) DO UPDATE SET
                           content = excluded.content,
                           generated_at = datetime('now')"#,
                    params![full_name, provider.as_str(), content],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn get_summary(&self, full_name: &str, provider: ProviderId) -> Result<Option<Summary>> {
        let full_name = full_name.to_string();
        let summary = self
            .conn
            .call(move |conn| {
                let summary = conn
                    .query_row(
                        "SELECT full_name, provider, content, generated_at FROM ai_summaries WHERE full_name = ?1 AND provider = ?2",
                        params![full_name, provider.as_str()],
                        summary_from_row,
                    )
                    .optional()?;
                Ok(summary)
            })
            .await?;
        Ok(summary)
    }

    pub async fn completed_providers(&self, full_name: &str) -> Result<HashSet<ProviderId>> {
        let full_name = full_name.to_string();
        let names = self
            .conn
            .call(move |conn| {
                let mut stmt =
                    conn.prepare("SELECT provider FROM ai_summaries WHERE full_name = ?1")?;
                let names = stmt
                    .query_map(params![full_name], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await?;

        Ok(names.iter().filter_map(|name| name.parse().ok()).collect())
    }

    /// Every stored (full_name, provider) pair, grouped by repository.
    /// Rows naming a provider outside the known set are ignored.
    pub async fn completed_index(&self) -> Result<HashMap<String, HashSet<ProviderId>>> {
        let pairs = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT full_name, provider FROM ai_summaries")?;
                let pairs = stmt
                    .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(pairs)
            })
            .await?;

        let mut index: HashMap<String, HashSet<ProviderId>> = HashMap::new();
        for (full_name, provider) in pairs {
            if let Ok(provider) = provider.parse() {
                index.entry(full_name).or_default().insert(provider);
            }
        }
        Ok(index)
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

fn generation_row_from_row(row: &Row) -> rusqlite::Result<GenerationRow> {
    Ok(GenerationRow {
        full_name: row.get(0)?,
        rank: row.get(1)?,
        author: row.get(2)?,
        name: row.get(3)?,
        url: row.get(4)?,
        description: row.get(5)?,
        language: row.get(6)?,
        language_color: row.get(7)?,
        stars: row.get(8)?,
        forks: row.get(9)?,
        current_period_stars: row.get(10)?,
        built_by: row.get(11)?,
        summaries: Vec::new(),
    })
}

fn summary_from_row(row: &Row) -> rusqlite::Result<Summary> {
    Ok(Summary {
        full_name: row.get(0)?,
        provider: row.get(1)?,
        content: row.get(2)?,
        generated_at: row.get(3)?,
    })
}
