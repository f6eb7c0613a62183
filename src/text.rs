//! Markdown to plain text conversion.

use crate::error::{Error, Result};
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use std::path::Path;

/// Reads a markdown file and returns its plain text rendering.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid UTF-8.
pub fn extract_file(path: &Path) -> Result<String> {
    let source = std::fs::read_to_string(path).map_err(|e| Error::read(path, e))?;
    Ok(plain_text(&source))
}

/// Strips markdown syntax and returns text content in document order.
///
/// Block ends and line breaks become `\n`; no other structure survives.
/// Raw HTML and YAML metadata blocks are dropped.
#[must_use]
pub fn plain_text(markdown: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_YAML_STYLE_METADATA_BLOCKS;

    let mut out = String::with_capacity(markdown.len());
    let mut in_metadata = false;

    for event in Parser::new_ext(markdown, options) {
        match event {
            Event::Start(Tag::MetadataBlock(_)) => in_metadata = true,
            Event::End(TagEnd::MetadataBlock(_)) => in_metadata = false,
            _ if in_metadata => {}
            Event::Text(text) | Event::Code(text) => out.push_str(&text),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::End(TagEnd::TableCell) => out.push(' '),
            Event::End(
                TagEnd::Paragraph
                | TagEnd::Heading(_)
                | TagEnd::Item
                | TagEnd::CodeBlock
                | TagEnd::TableHead
                | TagEnd::TableRow,
            ) => {
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }

    out
}
