pub const SCHEMA: &str = r#"
-- repositories table
CREATE TABLE IF NOT EXISTS repositories (
    full_name TEXT PRIMARY KEY,
    author TEXT NOT NULL,
    name TEXT NOT NULL,
    url TEXT NOT NULL,
    description TEXT,
    language TEXT,
    language_color TEXT
);

-- snapshots table (one row per ranked entry per capture)
CREATE TABLE IF NOT EXISTS snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    full_name TEXT NOT NULL,
    since TEXT NOT NULL,
    language_scope TEXT NOT NULL,
    rank INTEGER NOT NULL,
    stars INTEGER NOT NULL DEFAULT 0,
    forks INTEGER NOT NULL DEFAULT 0,
    current_period_stars INTEGER NOT NULL DEFAULT 0,
    built_by TEXT,
    captured_at TEXT NOT NULL,
    UNIQUE(since, language_scope, captured_at, rank)
);

CREATE INDEX IF NOT EXISTS idx_snapshots_captured_at ON snapshots(captured_at);
CREATE INDEX IF NOT EXISTS idx_snapshots_lookup ON snapshots(since, language_scope, captured_at);

-- ai_summaries table
CREATE TABLE IF NOT EXISTS ai_summaries (
    full_name TEXT NOT NULL,
    provider TEXT NOT NULL,
    content TEXT NOT NULL,
    generated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (full_name, provider)
);
"#;
