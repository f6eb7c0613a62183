//! # md-annotate
//!
//! Prepares plain markdown notes for a static site generator by prepending
//! a generated front matter block to a copy of each document.
//!
//! ## Features
//!
//! - Titles from file names, categories from the directory layout
//! - Subtitles and tags from a pluggable language model backend
//! - Creation and update dates from git history
//! - Tera templates for the front matter block
//! - Atomic writes, optional backups and a JSON run report
//!
//! ## Quick Start
//!
//! ```no_run
//! use md_annotate::{Config, Pipeline};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::builder()
//!     .root_dir("./notes")
//!     .output_dir("./content")
//!     .max_tags(5)
//!     .build()?;
//!
//! Pipeline::new(config)?.run()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! Documents flow through a sequential pipeline:
//! 1. **Resolver**: expands the input into markdown files
//! 2. **Text**: strips markdown syntax for the language model
//! 3. **Metadata**: derives title, subtitle, tags, categories and dates
//! 4. **Template**: renders the front matter block
//! 5. **Writer**: copies the source and prepends the block
//!
//! A document that fails at any step is skipped and reported; the run
//! continues with the next one.

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod error;
mod filter;
mod history;
mod inference;
mod nlp;
mod pipeline;
mod resolver;
mod template;
mod writer;

pub mod metadata;
pub mod text;

pub use config::{Config, ConfigBuilder};
pub use error::{Error, Result};
pub use filter::FileFilterConfig;
pub use history::{GitHistory, UpdatedSource, VersionHistory};
pub use inference::{InferenceConfig, InferenceEngine};
pub use metadata::DocumentMetadata;
pub use nlp::{Entity, HeuristicEngine, NlpBackend, NlpEngine};
pub use pipeline::{
    DocumentFailure, DocumentOutcome, DocumentStatus, Pipeline, PipelineStats, Stage,
};

/// Runs the complete annotation pipeline with the given configuration.
///
/// This is the main entry point for the library.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid
/// - The language model backend cannot be created
/// - The front matter template fails to parse
/// - The run report cannot be written
///
/// Failures of individual documents are not errors; they are listed in the
/// returned statistics.
///
/// # Examples
///
/// ```no_run
/// use md_annotate::{Config, run};
///
/// # fn main() -> anyhow::Result<()> {
/// let config = Config::builder()
///     .root_dir(".")
///     .build()?;
///
/// let stats = run(config)?;
/// println!("{} skipped", stats.documents_skipped);
/// # Ok(())
/// # }
/// ```
pub fn run(config: Config) -> Result<PipelineStats> {
    Pipeline::new(config)?.run()
}
