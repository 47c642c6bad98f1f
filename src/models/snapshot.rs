use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};

use super::Summary;

/// Storage format of `snapshots.captured_at` (UTC). Sorts chronologically as text.
pub const CAPTURE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_capture_time(at: DateTime<Utc>) -> String {
    at.format(CAPTURE_FORMAT).to_string()
}

pub fn parse_capture_time(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, CAPTURE_FORMAT).ok()
}

/// Half-day bucket of a capture time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Batch {
    Am,
    Pm,
}

impl Batch {
    pub fn from_hour(hour: u32) -> Self {
        if hour < 12 {
            Batch::Am
        } else {
            Batch::Pm
        }
    }

    pub fn of_capture(captured_at: &str) -> Option<Self> {
        parse_capture_time(captured_at).map(|at| Batch::from_hour(at.hour()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Batch::Am => "am",
            Batch::Pm => "pm",
        }
    }
}

impl FromStr for Batch {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "am" => Ok(Batch::Am),
            "pm" => Ok(Batch::Pm),
            _ => Err(()),
        }
    }
}

/// Filters used to pick one capture time out of a combination's history.
#[derive(Debug, Clone)]
pub struct AnchorFilter {
    pub since: String,
    pub language_scope: String,
    /// Calendar day (`YYYY-MM-DD`, UTC) the capture must fall on.
    pub date: Option<String>,
    pub batch: Option<Batch>,
}

/// A snapshot row joined with its repository and the summaries that matched
/// the provider filter.
#[derive(Debug, Clone)]
pub struct GenerationRow {
    pub full_name: String,
    pub rank: u32,
    pub author: String,
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub language_color: Option<String>,
    pub stars: i64,
    pub forks: i64,
    pub current_period_stars: i64,
    /// Contributor list as stored (JSON text).
    pub built_by: Option<String>,
    pub summaries: Vec<Summary>,
}
