use crate::error::{Error, Result};
use crate::filter::{FileFilter, FileFilterConfig};
use crate::history::UpdatedSource;
use crate::nlp::NlpBackend;
use std::path::{Path, PathBuf};

const DEFAULT_AUTHOR: &str = "sirch";
const DEFAULT_EXTENSION: &str = "md";
const DEFAULT_OUTPUT_DIR: &str = "content";
const DEFAULT_SUMMARY_CHAR_LIMIT: usize = 2_500;
const DEFAULT_MAX_TAGS: usize = 5;
const DEFAULT_TAG_LABEL: &str = "ORG";
const DEFAULT_WEIGHT: u32 = 10;

/// Configuration for the annotation pipeline.
///
/// Use [`Config::builder()`] to construct a new configuration.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// Markdown file or directory to annotate; `None` means the whole root
    pub input: Option<PathBuf>,

    /// Root used for categories and as the git working directory
    pub root_dir: PathBuf,

    /// Flat output directory for annotated files
    pub output_dir: PathBuf,

    /// Author written into every front matter block
    pub author: String,

    /// Markdown file extension, without the leading dot
    pub extension: String,

    /// Glob exclusions applied during path resolution
    pub file_filter_config: FileFilterConfig,

    /// Entity recognition and summarization backend
    pub nlp: NlpBackend,

    /// Number of characters of extracted text handed to the summarizer
    pub summary_char_limit: usize,

    /// Maximum number of tags per document
    pub max_tags: usize,

    /// Entity label kept as tags
    pub tag_label: String,

    /// Which commit provides the `date` field
    pub updated_source: UpdatedSource,

    /// Value of the `draft` field
    pub draft: bool,

    /// Value of the `weight` field
    pub weight: u32,

    /// Dry run mode (render and log, no file writes)
    pub dry_run: bool,

    /// Back up an output file before overwriting it
    pub backup_existing: bool,

    /// Path to a custom tera front matter template
    pub template_path: Option<PathBuf>,

    /// Where to write the JSON run report
    pub report_path: Option<PathBuf>,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use md_annotate::Config;
    ///
    /// let config = Config::builder()
    ///     .root_dir(".")
    ///     .dry_run(true)
    ///     .build()
    ///     .expect("valid configuration");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Root directory doesn't exist
    /// - Explicit input doesn't exist
    /// - Output directory doesn't exist (unless dry run)
    /// - Limits, extension or glob patterns are invalid
    /// - Template file doesn't exist
    pub fn validate(&self) -> Result<()> {
        if !self.root_dir.exists() {
            return Err(Error::config(format!(
                "Root directory does not exist: {}",
                self.root_dir.display()
            )));
        }

        if !self.root_dir.is_dir() {
            return Err(Error::config(format!(
                "Root path is not a directory: {}",
                self.root_dir.display()
            )));
        }

        if let Some(ref input) = self.input {
            if !input.exists() {
                return Err(Error::config(format!(
                    "Input path does not exist: {}",
                    input.display()
                )));
            }
        }

        if !self.dry_run {
            require_dir(&self.output_dir, "Output directory")?;
        }

        if self.max_tags == 0 {
            return Err(Error::config("max_tags must be greater than 0"));
        }

        if self.summary_char_limit == 0 {
            return Err(Error::config("summary_char_limit must be greater than 0"));
        }

        if self.extension.is_empty() || self.extension.contains('.') {
            return Err(Error::config(format!(
                "extension must be non-empty and given without a dot, got '{}'",
                self.extension
            )));
        }

        if self.tag_label.trim().is_empty() {
            return Err(Error::config("tag_label must not be empty"));
        }

        if let Some(ref template_path) = self.template_path {
            if !template_path.is_file() {
                return Err(Error::config(format!(
                    "Template file does not exist: {}",
                    template_path.display()
                )));
            }
        }

        self.nlp.validate()?;
        FileFilter::new(&self.file_filter_config)?;

        Ok(())
    }

    /// Returns the directory the resolver walks.
    #[must_use]
    pub fn scan_root(&self) -> &Path {
        self.input.as_deref().unwrap_or(&self.root_dir)
    }
}

fn require_dir(path: &Path, what: &str) -> Result<()> {
    if !path.exists() {
        return Err(Error::config(format!(
            "{what} does not exist: {}",
            path.display()
        )));
    }

    if !path.is_dir() {
        return Err(Error::config(format!(
            "{what} is not a directory: {}",
            path.display()
        )));
    }

    Ok(())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: None,
            root_dir: PathBuf::from("."),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            author: DEFAULT_AUTHOR.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
            file_filter_config: FileFilterConfig::default(),
            nlp: NlpBackend::default(),
            summary_char_limit: DEFAULT_SUMMARY_CHAR_LIMIT,
            max_tags: DEFAULT_MAX_TAGS,
            tag_label: DEFAULT_TAG_LABEL.to_string(),
            updated_source: UpdatedSource::default(),
            draft: false,
            weight: DEFAULT_WEIGHT,
            dry_run: false,
            backup_existing: false,
            template_path: None,
            report_path: None,
        }
    }
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    input: Option<PathBuf>,
    root_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    author: Option<String>,
    extension: Option<String>,
    file_filter_config: Option<FileFilterConfig>,
    nlp: Option<NlpBackend>,
    summary_char_limit: Option<usize>,
    max_tags: Option<usize>,
    tag_label: Option<String>,
    updated_source: Option<UpdatedSource>,
    draft: bool,
    weight: Option<u32>,
    dry_run: bool,
    backup_existing: bool,
    template_path: Option<PathBuf>,
    report_path: Option<PathBuf>,
}

impl ConfigBuilder {
    /// Sets the file or directory to annotate.
    #[must_use]
    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.input = Some(path.into());
        self
    }

    /// Sets the root directory.
    #[must_use]
    pub fn root_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(path.into());
        self
    }

    /// Sets the output directory for annotated files.
    #[must_use]
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Sets the author literal.
    #[must_use]
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Sets the markdown extension (without the leading dot).
    #[must_use]
    pub fn extension(mut self, ext: impl Into<String>) -> Self {
        self.extension = Some(ext.into());
        self
    }

    /// Sets the file filtering configuration.
    #[must_use]
    pub fn file_filter_config(mut self, config: FileFilterConfig) -> Self {
        self.file_filter_config = Some(config);
        self
    }

    /// Sets the language model backend.
    #[must_use]
    pub fn nlp(mut self, backend: NlpBackend) -> Self {
        self.nlp = Some(backend);
        self
    }

    /// Sets how many characters of text the summarizer sees.
    #[must_use]
    pub fn summary_char_limit(mut self, limit: usize) -> Self {
        self.summary_char_limit = Some(limit);
        self
    }

    /// Sets the maximum number of tags.
    #[must_use]
    pub fn max_tags(mut self, max: usize) -> Self {
        self.max_tags = Some(max);
        self
    }

    /// Sets the entity label kept as tags.
    #[must_use]
    pub fn tag_label(mut self, label: impl Into<String>) -> Self {
        self.tag_label = Some(label.into());
        self
    }

    /// Sets which commit provides the `date` field.
    #[must_use]
    pub fn updated_source(mut self, source: UpdatedSource) -> Self {
        self.updated_source = Some(source);
        self
    }

    /// Sets the `draft` field.
    #[must_use]
    pub fn draft(mut self, draft: bool) -> Self {
        self.draft = draft;
        self
    }

    /// Sets the `weight` field.
    #[must_use]
    pub fn weight(mut self, weight: u32) -> Self {
        self.weight = Some(weight);
        self
    }

    /// Enables dry run mode (no file writes).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Enables or disables backups of overwritten output files.
    #[must_use]
    pub fn backup_existing(mut self, enabled: bool) -> Self {
        self.backup_existing = enabled;
        self
    }

    /// Sets the path to a custom front matter template.
    ///
    /// The template receives `author`, `title`, `subtitle`, `created`, `date`,
    /// `draft`, `weight`, `tags` and `categories`.
    #[must_use]
    pub fn template_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_path = Some(path.into());
        self
    }

    /// Sets where the JSON run report is written.
    #[must_use]
    pub fn report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_path = Some(path.into());
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<Config> {
        let defaults = Config::default();
        let config = Config {
            input: self.input,
            root_dir: self.root_dir.unwrap_or(defaults.root_dir),
            output_dir: self.output_dir.unwrap_or(defaults.output_dir),
            author: self.author.unwrap_or(defaults.author),
            extension: self.extension.unwrap_or(defaults.extension),
            file_filter_config: self
                .file_filter_config
                .unwrap_or(defaults.file_filter_config),
            nlp: self.nlp.unwrap_or(defaults.nlp),
            summary_char_limit: self
                .summary_char_limit
                .unwrap_or(defaults.summary_char_limit),
            max_tags: self.max_tags.unwrap_or(defaults.max_tags),
            tag_label: self.tag_label.unwrap_or(defaults.tag_label),
            updated_source: self.updated_source.unwrap_or(defaults.updated_source),
            draft: self.draft,
            weight: self.weight.unwrap_or(defaults.weight),
            dry_run: self.dry_run,
            backup_existing: self.backup_existing,
            template_path: self.template_path,
            report_path: self.report_path,
        };

        config.validate()?;
        Ok(config)
    }
}
