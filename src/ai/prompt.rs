use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::config::SummaryFormat;
use crate::error::{AppError, Result};
use crate::models::RepoRecord;

static FENCE_OPEN: OnceLock<Regex> = OnceLock::new();
static FENCE_CLOSE: OnceLock<Regex> = OnceLock::new();

/// Fills `{{name}}`, `{{lang}}`, `{{desc}}` and `{{url}}` in the template.
pub fn render_prompt(template: &str, repo: &RepoRecord) -> String {
    let language = repo
        .language
        .as_deref()
        .filter(|l| !l.is_empty())
        .unwrap_or("Unknown");
    let description = repo
        .description
        .as_deref()
        .filter(|d| !d.is_empty())
        .unwrap_or("No description");

    template
        .replace("{{name}}", &repo.full_name())
        .replace("{{lang}}", language)
        .replace("{{desc}}", description)
        .replace("{{url}}", &repo.url)
}

/// Removes a surrounding Markdown code fence (```` ```json ... ``` ````), if any.
pub fn strip_code_fences(raw: &str) -> &str {
    let open = FENCE_OPEN.get_or_init(|| Regex::new(r"^\s*```[A-Za-z0-9_-]*[ \t]*\r?\n?").expect("valid regex"));
    let close = FENCE_CLOSE.get_or_init(|| Regex::new(r"\r?\n?```\s*$").expect("valid regex"));

    let mut text = raw.trim();
    if let Some(m) = open.find(text) {
        text = &text[m.end()..];
        if let Some(m) = close.find(text) {
            text = &text[..m.start()];
        }
    }
    text.trim()
}

/// Validates a raw provider answer and returns the content to store.
///
/// Translations must be a non-empty JSON object of language code to text; the
/// stored form is re-serialized with sorted keys. Plain answers only need to be
/// non-empty.
pub fn parse_summary(raw: &str, format: SummaryFormat) -> Result<String> {
    let text = strip_code_fences(raw);
    if text.is_empty() {
        return Err(AppError::Parse("empty response".to_string()));
    }

    match format {
        SummaryFormat::Plain => Ok(text.to_string()),
        SummaryFormat::Translations => {
            let translations: BTreeMap<String, String> = serde_json::from_str(text)
                .map_err(|e| AppError::Parse(format!("expected a JSON object of translations: {e}")))?;

            let translations: BTreeMap<String, String> = translations
                .into_iter()
                .map(|(lang, summary)| (lang, summary.trim().to_string()))
                .filter(|(_, summary)| !summary.is_empty())
                .collect();

            if translations.is_empty() {
                return Err(AppError::Parse("no translations in response".to_string()));
            }

            Ok(serde_json::to_string(&translations)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::record;

    #[test]
    fn render_substitutes_every_placeholder() {
        let mut repo = record(1, "tokio-rs", "axum");
        repo.description = None;

        let prompt = render_prompt("{{name}} | {{lang}} | {{desc}} | {{url}} | {{name}}", &repo);
        assert_eq!(
            prompt,
            "tokio-rs/axum | Rust | No description | https://github.com/tokio-rs/axum | tokio-rs/axum"
        );
    }

    #[test]
    fn render_defaults_unknown_language() {
        let mut repo = record(1, "a", "b");
        repo.language = Some(String::new());
        assert_eq!(render_prompt("{{lang}}", &repo), "Unknown");
    }

    #[test]
    fn strips_fenced_json() {
        assert_eq!(strip_code_fences("```json\n{\"en\":\"x\"}\n```"), "{\"en\":\"x\"}");
        assert_eq!(strip_code_fences("  ```\n{}\n```  "), "{}");
        assert_eq!(strip_code_fences("{\"en\":\"x\"}"), "{\"en\":\"x\"}");
    }

    #[test]
    fn translations_are_normalized() {
        let content = parse_summary(
            "```json\n{\"zh\": \" 中文 \", \"en\": \"English\", \"fr\": \"\"}\n```",
            SummaryFormat::Translations,
        )
        .unwrap();
        assert_eq!(content, r#"{"en":"English","zh":"中文"}"#);
    }

    #[test]
    fn malformed_translations_are_parse_errors() {
        for raw in ["Sure! Here is the summary.", "[]", "{}", "{\"en\": 3}", "```json\n```"] {
            let err = parse_summary(raw, SummaryFormat::Translations).unwrap_err();
            assert!(matches!(err, AppError::Parse(_)), "{raw:?} gave {err}");
        }
    }

    #[test]
    fn plain_summaries_only_need_text() {
        assert_eq!(
            parse_summary("  A web framework.  ", SummaryFormat::Plain).unwrap(),
            "A web framework."
        );
        assert!(parse_summary("   ", SummaryFormat::Plain).is_err());
    }
}
