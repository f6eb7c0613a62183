//! Entity recognition and summarization backends.
//!
//! The pipeline only sees [`NlpEngine`]; which engine backs it is chosen by
//! [`NlpBackend`] in the configuration, or injected directly through
//! [`Pipeline::with_backends`](crate::Pipeline::with_backends).

use crate::error::Result;
use crate::inference::{InferenceConfig, InferenceEngine};
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::Arc;

const SUMMARY_TARGET_CHARS: usize = 200;
const SUMMARY_MAX_SENTENCES: usize = 3;
const ORG_LABEL: &str = "ORG";
const MISC_LABEL: &str = "MISC";

/// A labelled span of text found by entity recognition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    /// Surface text of the span
    pub text: String,
    /// Entity class, e.g. `ORG`, `PER`, `LOC`
    pub label: String,
}

impl Entity {
    /// Creates a new entity.
    #[must_use]
    pub fn new(text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
        }
    }
}

/// Language model capabilities used to derive tags and subtitles.
///
/// Implementations should be thread-safe; a single instance is shared by
/// every document in a run.
pub trait NlpEngine: Send + Sync {
    /// Finds named entities in the text.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be queried.
    fn entities(&self, text: &str) -> Result<Vec<Entity>>;

    /// Produces a short summary of the text.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be queried.
    fn summarize(&self, text: &str) -> Result<String>;
}

/// Which [`NlpEngine`] the pipeline creates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NlpBackend {
    /// Offline capitalisation-based entities and lead-sentence summaries
    #[default]
    Heuristic,
    /// Remote models behind an inference HTTP API
    Inference(InferenceConfig),
}

impl NlpBackend {
    /// Creates a new engine of this kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn create(&self) -> Result<Arc<dyn NlpEngine>> {
        Ok(match self {
            Self::Heuristic => Arc::new(HeuristicEngine),
            Self::Inference(config) => Arc::new(InferenceEngine::new(config.clone())?),
        })
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            Self::Heuristic => Ok(()),
            Self::Inference(config) => config.validate(),
        }
    }
}

static LEADING_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "A", "An", "And", "As", "At", "But", "By", "For", "From", "Here", "How", "I", "If", "In",
        "It", "Its", "Note", "Of", "On", "Or", "Our", "See", "So", "That", "The", "Then", "There",
        "These", "This", "Those", "To", "Use", "We", "What", "When", "Where", "Which", "While",
        "Why", "With", "You", "Your",
    ]
    .into_iter()
    .collect()
});

static ORG_SUFFIXES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "Agency", "Association", "Bank", "Co", "Company", "Corp", "Corporation", "Council",
        "Foundation", "GmbH", "Group", "Inc", "Institute", "LLC", "Labs", "Ltd", "Society",
        "Systems", "Technologies", "University",
    ]
    .into_iter()
    .collect()
});

static NOT_ORGS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "API", "CLI", "CSS", "FAQ", "HTML", "HTTP", "HTTPS", "JSON", "OK", "README", "SQL",
        "TODO", "TOML", "URL", "UTF", "YAML",
    ]
    .into_iter()
    .collect()
});

/// Offline engine for machines without model access.
///
/// Entities are runs of capitalised words. A run ending in an organisation
/// suffix (`Acme Corp`) or a lone acronym (`NASA`) is labelled `ORG`,
/// everything else `MISC`. Summaries are the leading sentences of the text.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEngine;

impl NlpEngine for HeuristicEngine {
    fn entities(&self, text: &str) -> Result<Vec<Entity>> {
        let mut entities = Vec::new();
        let mut run: Vec<&str> = Vec::new();

        for raw in text.split_whitespace() {
            let word = raw.trim_matches(|c: char| !c.is_alphanumeric());
            let tail = &raw[raw.trim_end_matches(|c: char| !c.is_alphanumeric()).len()..];
            let ends_clause = tail
                .chars()
                .any(|c| matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | ')'));

            if is_capitalized(word) && !(run.is_empty() && LEADING_WORDS.contains(word)) {
                run.push(word);
            } else {
                flush_run(&mut run, &mut entities);
            }

            if ends_clause {
                flush_run(&mut run, &mut entities);
            }
        }
        flush_run(&mut run, &mut entities);

        Ok(entities)
    }

    fn summarize(&self, text: &str) -> Result<String> {
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let mut summary = String::new();

        for sentence in sentences(&normalized).take(SUMMARY_MAX_SENTENCES) {
            if !summary.is_empty() {
                summary.push(' ');
            }
            summary.push_str(sentence);
            if summary.chars().count() >= SUMMARY_TARGET_CHARS {
                break;
            }
        }

        Ok(summary)
    }
}

fn flush_run(run: &mut Vec<&str>, entities: &mut Vec<Entity>) {
    if run.is_empty() {
        return;
    }

    let label = if classify_org(run) { ORG_LABEL } else { MISC_LABEL };
    entities.push(Entity::new(run.join(" "), label));
    run.clear();
}

fn classify_org(run: &[&str]) -> bool {
    match run {
        [single] => is_acronym(single) && !NOT_ORGS.contains(single),
        [.., last] => ORG_SUFFIXES.contains(last),
        [] => false,
    }
}

fn is_capitalized(word: &str) -> bool {
    word.chars().next().is_some_and(char::is_uppercase)
}

fn is_acronym(word: &str) -> bool {
    let upper = word.chars().filter(char::is_ascii_uppercase).count();
    (2..=8).contains(&word.len())
        && upper >= 2
        && word
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

/// Splits text after `.`, `!` or `?` followed by whitespace or the end.
fn sentences(text: &str) -> impl Iterator<Item = &str> {
    let mut start = 0;
    let mut bounds = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        let at_boundary = chars.peek().is_none_or(|(_, next)| next.is_whitespace());
        if matches!(c, '.' | '!' | '?') && at_boundary {
            let end = idx + c.len_utf8();
            bounds.push(&text[start..end]);
            start = end;
        }
    }
    if start < text.len() {
        bounds.push(&text[start..]);
    }

    bounds
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labelled(entities: &[Entity], label: &str) -> Vec<String> {
        entities
            .iter()
            .filter(|e| e.label == label)
            .map(|e| e.text.clone())
            .collect()
    }

    #[test]
    fn test_org_suffix_runs() {
        let entities = HeuristicEngine
            .entities("We partnered with Acme Corp and the Linux Foundation last year.")
            .unwrap();

        assert_eq!(
            labelled(&entities, "ORG"),
            vec!["Acme Corp".to_string(), "Linux Foundation".to_string()]
        );
    }

    #[test]
    fn test_acronyms_are_orgs() {
        let entities = HeuristicEngine
            .entities("Data from NASA and the ESA, stored as JSON.")
            .unwrap();

        assert_eq!(
            labelled(&entities, "ORG"),
            vec!["NASA".to_string(), "ESA".to_string()]
        );
    }

    #[test]
    fn test_plain_names_are_misc() {
        let entities = HeuristicEngine
            .entities("The talk by Grace Hopper was great.")
            .unwrap();

        assert!(labelled(&entities, "ORG").is_empty());
        assert_eq!(labelled(&entities, "MISC"), vec!["Grace Hopper".to_string()]);
    }

    #[test]
    fn test_leading_words_skipped() {
        let entities = HeuristicEngine.entities("The install is quick.").unwrap();
        assert!(entities.is_empty());
    }

    #[test]
    fn test_punctuation_splits_runs() {
        let entities = HeuristicEngine.entities("Acme Corp, Globex Inc.").unwrap();
        assert_eq!(
            labelled(&entities, "ORG"),
            vec!["Acme Corp".to_string(), "Globex Inc".to_string()]
        );
    }

    #[test]
    fn test_summary_takes_leading_sentences() {
        let text = "First sentence here. Second one follows! Third? Fourth is dropped.";
        let summary = HeuristicEngine.summarize(text).unwrap();
        assert_eq!(summary, "First sentence here. Second one follows! Third?");
    }

    #[test]
    fn test_summary_stops_at_target_length() {
        let long = "word ".repeat(60);
        let text = format!("{}. Next sentence.", long.trim());
        let summary = HeuristicEngine.summarize(&text).unwrap();
        assert!(!summary.contains("Next"));
    }

    #[test]
    fn test_summary_of_empty_text() {
        assert_eq!(HeuristicEngine.summarize("  \n ").unwrap(), "");
    }

    #[test]
    fn test_sentences_keep_decimal_numbers() {
        let parts: Vec<_> = sentences("Version 2.5 shipped. Done").collect();
        assert_eq!(parts, vec!["Version 2.5 shipped.", "Done"]);
    }

    #[test]
    fn test_backend_creates_engine() {
        let engine = NlpBackend::Heuristic.create().unwrap();
        assert!(engine.entities("").unwrap().is_empty());
    }
}
