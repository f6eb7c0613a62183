//! Per-document metadata derivation.
//!
//! Everything here is a pure function of a path, a root or extracted text.
//! The language model is passed in explicitly so callers control which
//! [`NlpEngine`] produces entities and summaries.

use crate::error::{Error, Result};
use crate::nlp::{Entity, NlpEngine};
use crate::resolver::canonical_location;
use chrono::{DateTime, FixedOffset};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

/// Characters that mark an entity as a misread path or file name.
const PATH_LIKE_CHARS: [char; 5] = ['/', '.', '-', '\\', '_'];

/// Metadata derived for one markdown document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMetadata {
    /// Human readable title from the file name
    pub title: String,
    /// Abstractive summary of the document text
    pub subtitle: String,
    /// Organisation entities found in the text
    pub tags: Vec<String>,
    /// Directory chain relative to the root
    pub categories: Vec<String>,
    /// First commit adding the file
    pub created: DateTime<FixedOffset>,
    /// Commit used for the `date` field
    pub updated: DateTime<FixedOffset>,
}

/// Derives a title from a file name.
///
/// The name up to its first `.` has underscores replaced by spaces and is
/// title-cased. Names containing "readme" become `"<parent> readme"`.
///
/// ```
/// use md_annotate::metadata::title;
/// use std::path::Path;
///
/// assert_eq!(title(Path::new("notes/install_guide.md")), "Install Guide");
/// assert_eq!(title(Path::new("projects/app/README.md")), "app readme");
/// ```
#[must_use]
pub fn title(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.split('.').next().unwrap_or_default();
    let filename = title_case(&stem.replace('_', " "));

    let lowered = filename.to_lowercase();
    if !lowered.contains("readme") {
        return filename;
    }

    match path.parent().and_then(Path::file_name) {
        Some(parent) => format!("{} {lowered}", parent.to_string_lossy()),
        None => lowered,
    }
}

/// Uppercases the first cased character of every word and lowercases the rest.
///
/// A word starts after any character without case, so `it's` becomes `It'S`
/// and `2nd` becomes `2Nd`.
#[must_use]
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_cased = false;

    for c in text.chars() {
        if prev_cased {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        prev_cased = c.is_lowercase() || c.is_uppercase();
    }

    out
}

/// Derives categories from the directories between `root` and `path`.
///
/// - nested paths keep every segment without a `.` (directory names)
/// - a bare file name with an extension has no categories
/// - a bare name without an extension is its own category
///
/// # Errors
///
/// Returns an error if `path` is not inside `root`.
pub fn categories(path: &Path, root: &Path) -> Result<Vec<String>> {
    let relative = relative_to(path, root)?;
    let segments: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    Ok(categories_from_segments(&segments))
}

fn categories_from_segments(segments: &[String]) -> Vec<String> {
    match segments {
        [] => Vec::new(),
        [single] if is_file_like(single) => Vec::new(),
        [single] => vec![single.clone()],
        nested => nested
            .iter()
            .filter(|segment| !is_file_like(segment))
            .cloned()
            .collect(),
    }
}

fn is_file_like(segment: &str) -> bool {
    segment.contains('.')
}

fn relative_to(path: &Path, root: &Path) -> Result<PathBuf> {
    let absolute = canonical_location(path).unwrap_or_else(|_| path.to_path_buf());
    let base = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());

    let relative = pathdiff::diff_paths(&absolute, &base)
        .ok_or_else(|| Error::outside_root(path, root))?;

    if relative.components().any(|c| c == Component::ParentDir) {
        return Err(Error::outside_root(path, root));
    }

    Ok(relative)
}

/// Returns true if the entity text looks like a path or file name.
#[must_use]
pub fn looks_like_path(text: &str) -> bool {
    text.contains(PATH_LIKE_CHARS)
}

/// Normalizes entity text into a tag.
#[must_use]
pub fn clean_tag(text: &str) -> String {
    text.replace('\n', " ").trim().replace('_', " ")
}

/// Returns true if a cleaned tag can be emitted.
#[must_use]
pub fn is_clean_tag(tag: &str) -> bool {
    !tag.is_empty() && !tag.contains('#') && !tag.contains('_')
}

/// Selects tags from recognized entities.
///
/// Only entities labelled `label` are kept; path-like texts are dropped,
/// duplicates removed and at most `max` candidates cleaned into tags.
#[must_use]
pub fn select_tags(entities: &[Entity], label: &str, max: usize) -> Vec<String> {
    let mut seen = HashSet::new();

    entities
        .iter()
        .filter(|e| e.label == label)
        .map(|e| e.text.as_str())
        .filter(|text| !looks_like_path(text))
        .filter(|text| seen.insert(*text))
        .take(max)
        .map(clean_tag)
        .filter(|tag| is_clean_tag(tag))
        .collect()
}

/// Runs entity recognition over `text` and selects tags.
///
/// # Errors
///
/// Returns an error if the engine fails.
pub fn tags(engine: &dyn NlpEngine, text: &str, label: &str, max: usize) -> Result<Vec<String>> {
    let entities = engine.entities(text)?;
    Ok(select_tags(&entities, label, max))
}

/// Prepares text for summarization: newlines removed, at most `limit` characters.
#[must_use]
pub fn summary_input(text: &str, limit: usize) -> String {
    text.chars().filter(|&c| c != '\n').take(limit).collect()
}

/// Makes a summary safe for a double-quoted front matter value.
#[must_use]
pub fn clean_subtitle(summary: &str) -> String {
    summary.replace('"', "").replace(['\r', '\n'], " ").trim().to_string()
}

/// Summarizes the first `limit` characters of `text`.
///
/// # Errors
///
/// Returns an error if the engine fails or the summary is empty.
pub fn subtitle(engine: &dyn NlpEngine, text: &str, limit: usize) -> Result<String> {
    let input = summary_input(text, limit);
    let summary = clean_subtitle(&engine.summarize(&input)?);

    if summary.is_empty() {
        return Err(Error::nlp("summarizer returned an empty summary"));
    }

    Ok(summary)
}
