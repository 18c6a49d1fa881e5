//! Rule-based classifier
//!
//! One keyword rule per operation family, evaluated in a fixed order; the
//! first rule that fires decides the operation. Paths are taken from the
//! text in order of appearance and slotted by the operation's descriptor.

use super::Classifier;
use crate::catalog::OperationCatalog;
use crate::error::TaskError;
use crate::types::{IntentSource, OperationId, ParsedIntent};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::sync::Arc;

static WEEKDAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday)s?\b")
        .expect("weekday regex must compile")
});

static FORMAT_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bformat\b").expect("format regex must compile"));

static LOG_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\blogs?\b|\.log\b").expect("log regex must compile"));

static QUOTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""([^"]+)"|“([^”]+)”"#).expect("quoted regex must compile")
});

static NAMED_TICKETS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Z][\w-]*)\s+tickets?\b").expect("ticket regex must compile")
});

static AFTER_CATEGORY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bcategory\s+['"]?([\w-]+)"#).expect("category regex must compile")
});

const PATH_EXTENSIONS: &[&str] = &[
    "txt", "json", "md", "log", "db", "png", "jpg", "jpeg", "csv", "py",
];

/// Lowercased view used by rule triggers
struct Text<'a> {
    raw: &'a str,
    lower: String,
}

impl<'a> Text<'a> {
    fn new(raw: &'a str) -> Self {
        Self {
            raw,
            lower: raw.to_lowercase(),
        }
    }

    fn has(&self, needle: &str) -> bool {
        self.lower.contains(needle)
    }

    fn has_any(&self, needles: &[&str]) -> bool {
        needles.iter().any(|n| self.has(n))
    }
}

/// Rule triggers in priority order
static RULES: &[(OperationId, fn(&Text<'_>) -> bool)] = &[
    (OperationId::InstallAndRun, |t| {
        t.has("datagen") || (t.has("install") && t.has_any(&["run", "script"]))
    }),
    (OperationId::FormatMarkdown, |t| {
        t.has("prettier") || (FORMAT_WORD.is_match(&t.lower) && t.has_any(&[".md", "markdown"]))
    }),
    (OperationId::CountWeekday, |t| {
        WEEKDAY.is_match(t.raw) && t.has_any(&["count", "how many", "number of"])
    }),
    (OperationId::SortContacts, |t| t.has("sort") && t.has("contact")),
    (OperationId::RecentLogs, |t| {
        LOG_WORD.is_match(&t.lower) && t.has_any(&["recent", "latest", "newest"])
    }),
    (OperationId::MarkdownIndex, |t| {
        t.has_any(&["markdown", ".md"]) && t.has_any(&["index", "h1", "heading", "title"])
    }),
    (OperationId::ExtractEmail, |t| {
        t.has("email") && t.has_any(&["sender", "extract"])
    }),
    (OperationId::ExtractCard, |t| t.has_any(&["credit card", "card number"])),
    (OperationId::SimilarComments, |t| t.has("similar") && t.has("comment")),
    (OperationId::SumByCategory, |t| {
        t.has_any(&["total", "sum"]) && t.has_any(&["ticket", "categor", "sales"])
    }),
];

/// Whitespace token with surrounding quotes, brackets and trailing punctuation removed
fn clean_token(token: &str) -> &str {
    token
        .trim_start_matches(['"', '\'', '`', '(', '[', '{', '<', '“'])
        .trim_end_matches([
            '"', '\'', '`', ')', ']', '}', '>', '”', '.', ',', ';', ':', '!', '?',
        ])
}

fn looks_like_path(token: &str) -> bool {
    if token.contains("://") || token.contains('@') {
        return false;
    }
    if token.starts_with('/') || token.starts_with("./") || token.starts_with("../") {
        return true;
    }
    Path::new(token)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| PATH_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Path-like tokens in order of appearance
pub(crate) fn path_tokens(text: &str) -> Vec<&str> {
    text.split_whitespace()
        .map(clean_token)
        .filter(|t| !t.is_empty() && looks_like_path(t))
        .collect()
}

fn first_url(text: &str) -> Option<&str> {
    text.split_whitespace()
        .map(clean_token)
        .find(|t| t.starts_with("https://") || t.starts_with("http://"))
}

fn trailing_email(text: &str) -> Option<&str> {
    text.split_whitespace()
        .rev()
        .map(clean_token)
        .find(|t| t.contains('@') && !t.contains("://"))
}

fn weekday_name(text: &str) -> Option<String> {
    let day = WEEKDAY.captures(text)?.get(1)?.as_str().to_ascii_lowercase();
    let mut chars = day.chars();
    let first = chars.next()?;
    Some(first.to_ascii_uppercase().to_string() + chars.as_str())
}

fn category_name(text: &str) -> Option<&str> {
    if let Some(caps) = QUOTED.captures(text) {
        return caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str().trim());
    }
    NAMED_TICKETS
        .captures(text)
        .or_else(|| AFTER_CATEGORY.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Keyword-rule classifier
#[derive(Debug, Clone)]
pub struct DeterministicClassifier {
    catalog: Arc<OperationCatalog>,
}

impl DeterministicClassifier {
    /// Create classifier slotting paths per `catalog`
    #[inline]
    #[must_use]
    pub fn new(catalog: Arc<OperationCatalog>) -> Self {
        Self { catalog }
    }

    /// First matching operation for the text
    #[must_use]
    pub fn match_operation(&self, text: &str) -> Option<OperationId> {
        let text = Text::new(text);
        RULES
            .iter()
            .find(|(_, fires)| fires(&text))
            .map(|(op, _)| *op)
    }

    /// Pure classification; `None` when no rule fires
    #[must_use]
    pub fn classify_text(&self, text: &str) -> Option<ParsedIntent> {
        let operation = self.match_operation(text)?;
        let mut intent = ParsedIntent::new(operation, IntentSource::Rules);

        match operation {
            OperationId::InstallAndRun => {
                if let Some(url) = first_url(text) {
                    intent.parameters.insert("script_url".into(), url.to_string());
                }
                if let Some(email) = trailing_email(text) {
                    intent.parameters.insert("email".into(), email.to_string());
                }
            }
            OperationId::CountWeekday => {
                if let Some(day) = weekday_name(text) {
                    intent.parameters.insert("weekday".into(), day);
                }
            }
            OperationId::SumByCategory => {
                if let Some(category) = category_name(text) {
                    intent.parameters.insert("category".into(), category.to_string());
                }
            }
            _ => {}
        }

        if let Some(descriptor) = self.catalog.get(operation) {
            let mut paths = path_tokens(text).into_iter();
            if descriptor.input.is_required() {
                intent.input = paths.next().map(str::to_string);
            }
            if descriptor.output.is_required() {
                intent.output = paths.next().map(str::to_string);
            }
        }

        tracing::debug!(%operation, ?intent.input, ?intent.output, "rule matched");
        Some(intent)
    }
}

#[async_trait::async_trait]
impl Classifier for DeterministicClassifier {
    async fn classify(&self, text: &str) -> Result<Option<ParsedIntent>, TaskError> {
        Ok(self.classify_text(text))
    }
}
