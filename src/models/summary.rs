use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// The statically known set of summarization backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    ChatGpt,
    DeepSeek,
    Gemini,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [ProviderId::ChatGpt, ProviderId::DeepSeek, ProviderId::Gemini];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::ChatGpt => "chatgpt",
            ProviderId::DeepSeek => "deepseek",
            ProviderId::Gemini => "gemini",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        ProviderId::ALL
            .into_iter()
            .find(|id| id.as_str() == name)
            .ok_or_else(|| AppError::Config(format!("unknown provider: {name}")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub full_name: String,
    pub provider: String,
    pub content: String,
    /// Store time of the latest write, `YYYY-MM-DD HH:MM:SS` UTC.
    pub generated_at: String,
}
