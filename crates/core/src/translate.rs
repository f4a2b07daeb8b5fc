//! Pure side of the translation lifecycle.
//!
//! The shell sends text to a model off the mutation thread. What it sends is
//! decided by [`Document::begin_translation`] and what it gets back is
//! accepted or refused by [`Document::apply_translation`]. A generation
//! counter on each element lets a late result for a cleared element be
//! refused instead of overwriting the clear.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chain::ChainIndex;
use crate::element::ElementKey;
use crate::store::Document;

/// Built-in prompt used when no prompt directory is configured.
pub const DEFAULT_TRANSLATION_PROMPT: &str = "\
You are a professional translator. Translate the following text extracted \
from a PDF document into {language}. Keep the meaning, tone and formatting. \
Reply with the translation only, without notes or explanations.

{text}
";

/// Work handed to a translator: the chain head to write back to and the
/// text to translate, stamped with the head's generation at hand-out time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationTicket {
    pub key: ElementKey,
    pub generation: u64,
    pub text: String,
}

impl Document {
    /// Prepare a translation request for `key`, resolved to its chain head.
    ///
    /// Returns `None` when the element is missing, not textual, not exposed
    /// or already translated.
    pub fn begin_translation(&self, key: ElementKey) -> Option<TranslationTicket> {
        let chains = ChainIndex::build(self);
        let chained = chains.chained_text(self, key)?;

        if !chained.element.is_exposed() || !chains.can_be_translated(self, chained.key) {
            return None;
        }

        Some(TranslationTicket {
            key: chained.key,
            generation: chained.element.generation,
            text: chained.text.to_string(),
        })
    }

    /// Store a translation result. Refused when the target is gone or its
    /// generation moved since the ticket was issued.
    pub fn apply_translation(&mut self, ticket: &TranslationTicket, text: impl Into<String>) -> bool {
        let Some(element) = self.get_mut(ticket.key) else {
            log::debug!("dropping translation for missing element {}", ticket.key);
            return false;
        };

        if element.generation != ticket.generation {
            log::debug!(
                "dropping stale translation for {} (generation {} != {})",
                ticket.key,
                ticket.generation,
                element.generation
            );
            return false;
        }

        element.translated = Some(text.into());
        element.generation += 1;
        true
    }

    /// Forget the translation of `key` and invalidate in-flight requests.
    pub fn clear_translation(&mut self, key: ElementKey) -> bool {
        match self.get_mut(key) {
            Some(element) => {
                element.translated = None;
                element.generation += 1;
                log::debug!("cleared translation of {}", key);
                true
            }
            None => false,
        }
    }

    /// Keys that would produce a ticket: exposed body units that are not
    /// chain continuations and have no translation yet, in document order.
    pub fn pending_translations(&self, chains: &ChainIndex) -> Vec<ElementKey> {
        self.iter_all()
            .filter(|(key, element)| {
                element.is_eligible() && !chains.is_continuation(*key) && element.can_be_translated()
            })
            .map(|(key, _)| key)
            .collect()
    }
}

/// Outcome of a completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Ok,
    TooLong,
    InvalidRequest,
    RateLimited,
    ModerationFlagged,
    ModerationBlocked,
    OtherError,
}

impl CompletionStatus {
    pub fn is_ok(self) -> bool {
        self == CompletionStatus::Ok
    }

    /// Whether sending the same request again later may succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, CompletionStatus::RateLimited | CompletionStatus::OtherError)
    }
}

impl std::fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CompletionStatus::Ok => "ok",
            CompletionStatus::TooLong => "too long",
            CompletionStatus::InvalidRequest => "invalid request",
            CompletionStatus::RateLimited => "rate limited",
            CompletionStatus::ModerationFlagged => "moderation flagged",
            CompletionStatus::ModerationBlocked => "moderation blocked",
            CompletionStatus::OtherError => "error",
        };
        write!(f, "{}", name)
    }
}

/// Result of one completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionData {
    pub status: CompletionStatus,
    pub reply_text: Option<String>,
    pub status_text: Option<String>,
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
}

impl CompletionData {
    pub fn ok(reply: impl Into<String>) -> Self {
        CompletionData {
            status: CompletionStatus::Ok,
            reply_text: Some(reply.into()),
            status_text: None,
            prompt_tokens: None,
            completion_tokens: None,
        }
    }

    /// A failed request, classified from the provider's error message.
    pub fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        CompletionData {
            status: classify_completion_error(&message),
            reply_text: None,
            status_text: Some(message),
            prompt_tokens: None,
            completion_tokens: None,
        }
    }

    pub fn total_tokens(&self) -> Option<u64> {
        Some(self.prompt_tokens? + self.completion_tokens?)
    }
}

/// Map a provider error message onto a [`CompletionStatus`].
pub fn classify_completion_error(message: &str) -> CompletionStatus {
    let lower = message.to_lowercase();

    if lower.contains("maximum context length")
        || lower.contains("context window")
        || lower.contains("too many tokens")
    {
        CompletionStatus::TooLong
    } else if lower.contains("rate limit") || lower.contains("429") || lower.contains("too many requests") {
        CompletionStatus::RateLimited
    } else if lower.contains("blocked") && lower.contains("moderation") {
        CompletionStatus::ModerationBlocked
    } else if lower.contains("flagged") {
        CompletionStatus::ModerationFlagged
    } else if lower.contains("invalid request") || lower.contains("400") || lower.contains("bad request") {
        CompletionStatus::InvalidRequest
    } else {
        CompletionStatus::OtherError
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PromptError {
    #[error("missing replacement for placeholder {{{0}}}")]
    MissingReplacement(String),
    #[error("unterminated placeholder at byte {0}")]
    Unterminated(usize),
    #[error("unmatched '}}' at byte {0}")]
    UnmatchedBrace(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A prompt with `{name}` placeholders. `{{` and `}}` are literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
}

impl PromptTemplate {
    pub fn parse(source: &str) -> Result<Self, PromptError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((index, c)) = chars.next() {
            match c {
                '{' if chars.peek().is_some_and(|(_, n)| *n == '{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek().is_some_and(|(_, n)| *n == '}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((_, ch)) => name.push(ch),
                            None => return Err(PromptError::Unterminated(index)),
                        }
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name.trim().to_string()));
                }
                '}' => return Err(PromptError::UnmatchedBrace(index)),
                _ => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(PromptTemplate { segments })
    }

    /// Placeholder names in order of appearance, repeats included.
    pub fn placeholders(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Placeholder(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    pub fn render(&self, replacements: &HashMap<&str, &str>) -> Result<String, PromptError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = replacements
                        .get(name.as_str())
                        .ok_or_else(|| PromptError::MissingReplacement(name.clone()))?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

/// Clean a model reply down to the translated text.
///
/// Strips a wrapping markdown fence and surrounding whitespace.
pub fn extract_translation(response: &str) -> String {
    let trimmed = response.trim();

    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };

    // Drop the info string after the opening fence, if any.
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    let body = body.strip_suffix("```").unwrap_or(body);

    body.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::MergeMode;
    use crate::geometry::Rect;
    use crate::primitive::{Primitive, RawPage};
    use crate::safe_area::SafeMargin;

    fn k(v: u64) -> ElementKey {
        ElementKey::new(v)
    }

    fn doc(texts: &[&str]) -> Document {
        let primitives = texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let y = 90.0 - 10.0 * i as f64;
                Primitive::text_line(Rect::new(10.0, y, 90.0, y + 8.0), *t)
            })
            .collect();
        Document::from_pages(
            &[RawPage {
                width: 100.0,
                height: 100.0,
                primitives,
            }],
            SafeMargin::new(0.0, 0.0, 1.0, 1.0),
        )
    }

    #[test]
    fn test_begin_translation_resolves_chain_head() {
        let mut doc = doc(&["Hello-", "world", "alone"]);
        doc.toggle_continuation(k(0));

        let ticket = doc.begin_translation(k(1)).unwrap();
        assert_eq!(ticket.key, k(0));
        assert_eq!(ticket.text, "Helloworld");
        assert_eq!(ticket.generation, 0);

        let own = doc.begin_translation(k(2)).unwrap();
        assert_eq!(own.key, k(2));
        assert_eq!(own.text, "alone");
    }

    #[test]
    fn test_apply_translation_then_refuse_second_ticket() {
        let mut doc = doc(&["a"]);
        let first = doc.begin_translation(k(0)).unwrap();
        let second = first.clone();

        assert!(doc.apply_translation(&first, "A"));
        assert_eq!(doc.get(k(0)).unwrap().translated(), Some("A"));
        assert!(!doc.apply_translation(&second, "B"));
        assert_eq!(doc.get(k(0)).unwrap().translated(), Some("A"));
        assert!(doc.begin_translation(k(0)).is_none());
    }

    #[test]
    fn test_clear_rejects_in_flight_result() {
        let mut doc = doc(&["a"]);
        let ticket = doc.begin_translation(k(0)).unwrap();

        assert!(doc.clear_translation(k(0)));
        assert!(!doc.apply_translation(&ticket, "late"));
        assert_eq!(doc.get(k(0)).unwrap().translated(), None);

        let fresh = doc.begin_translation(k(0)).unwrap();
        assert!(doc.apply_translation(&fresh, "A"));
    }

    #[test]
    fn test_apply_to_merged_away_element_is_refused() {
        let mut doc = doc(&["a", "b"]);
        let ticket = doc.begin_translation(k(0)).unwrap();
        doc.merge(0, &[k(0), k(1)], MergeMode::Concat).unwrap();
        assert!(!doc.apply_translation(&ticket, "A"));
    }

    #[test]
    fn test_begin_translation_rejects_hidden_and_missing() {
        let mut doc = doc(&["a"]);
        doc.toggle_visibility(k(0));
        assert!(doc.begin_translation(k(0)).is_none());
        assert!(doc.begin_translation(k(3)).is_none());
    }

    #[test]
    fn test_pending_translations_skips_continuations() {
        let mut doc = doc(&["a", "b", "c", "d"]);
        doc.toggle_continuation(k(0));
        doc.toggle_body(k(3));
        let chains = ChainIndex::build(&doc);

        assert_eq!(doc.pending_translations(&chains), vec![k(0), k(2)]);
    }

    #[test]
    fn test_classify_completion_error() {
        assert_eq!(
            classify_completion_error("This model's maximum context length is 4097 tokens"),
            CompletionStatus::TooLong
        );
        assert_eq!(
            classify_completion_error("HTTP 429 Too Many Requests"),
            CompletionStatus::RateLimited
        );
        assert_eq!(
            classify_completion_error("Request blocked by moderation"),
            CompletionStatus::ModerationBlocked
        );
        assert_eq!(
            classify_completion_error("content flagged"),
            CompletionStatus::ModerationFlagged
        );
        assert_eq!(
            classify_completion_error("400 Bad Request: missing field"),
            CompletionStatus::InvalidRequest
        );
        assert_eq!(
            classify_completion_error("connection refused"),
            CompletionStatus::OtherError
        );
    }

    #[test]
    fn test_completion_data_tokens() {
        let mut data = CompletionData::ok("hi");
        assert!(data.status.is_ok());
        assert_eq!(data.total_tokens(), None);
        data.prompt_tokens = Some(10);
        data.completion_tokens = Some(5);
        assert_eq!(data.total_tokens(), Some(15));

        let failed = CompletionData::failed("rate limit reached");
        assert_eq!(failed.status, CompletionStatus::RateLimited);
        assert!(failed.status.is_retryable());
        assert_eq!(failed.reply_text, None);
    }

    #[test]
    fn test_prompt_template_render() {
        let template = PromptTemplate::parse("Translate to {language}:\n{text}\n{{raw}}").unwrap();
        assert_eq!(template.placeholders(), vec!["language", "text"]);

        let replacements = HashMap::from([("language", "German"), ("text", "Hello")]);
        assert_eq!(
            template.render(&replacements).unwrap(),
            "Translate to German:\nHello\n{raw}"
        );
    }

    #[test]
    fn test_prompt_template_errors() {
        assert_eq!(
            PromptTemplate::parse("oops {name").unwrap_err(),
            PromptError::Unterminated(5)
        );
        assert_eq!(
            PromptTemplate::parse("a } b").unwrap_err(),
            PromptError::UnmatchedBrace(2)
        );

        let template = PromptTemplate::parse("{text}").unwrap();
        assert_eq!(
            template.render(&HashMap::new()).unwrap_err(),
            PromptError::MissingReplacement("text".to_string())
        );
    }

    #[test]
    fn test_default_prompt_parses() {
        let template = PromptTemplate::parse(DEFAULT_TRANSLATION_PROMPT).unwrap();
        assert_eq!(template.placeholders(), vec!["language", "text"]);
    }

    #[test]
    fn test_extract_translation() {
        assert_eq!(extract_translation("  Hallo Welt \n"), "Hallo Welt");
        assert_eq!(extract_translation("```\nHallo\nWelt\n```"), "Hallo\nWelt");
        assert_eq!(extract_translation("```text\nHallo\n```"), "Hallo");
        assert_eq!(extract_translation(""), "");
    }
}
