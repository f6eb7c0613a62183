use crate::{
    config::Config,
    error::{Error, Result},
    history::{GitHistory, UpdatedSource, VersionHistory},
    metadata::{self, DocumentMetadata},
    nlp::NlpEngine,
    resolver::Resolver,
    template::TemplateEngine,
    text,
    writer::Writer,
};
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Step of document processing at which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Reading and converting the markdown
    Text,
    /// Summarizing the text
    Subtitle,
    /// Recognizing entities
    Tags,
    /// Relating the path to the root
    Categories,
    /// Querying the first commit
    Created,
    /// Querying the latest commit
    Updated,
    /// Rendering the front matter
    Render,
    /// Copying the source into the output directory
    Copy,
    /// Prepending the front matter to the copy
    Prepend,
}

impl Stage {
    /// Returns the stage name used in logs and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Subtitle => "subtitle",
            Self::Tags => "tags",
            Self::Categories => "categories",
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Render => "render",
            Self::Copy => "copy",
            Self::Prepend => "prepend",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a document was skipped.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentFailure {
    /// Step that failed
    pub stage: Stage,
    /// Underlying error
    #[serde(serialize_with = "serialize_display")]
    pub error: Error,
}

impl fmt::Display for DocumentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.error)
    }
}

fn serialize_display<S: Serializer>(value: &Error, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

trait StageExt<T> {
    fn at(self, stage: Stage) -> std::result::Result<T, DocumentFailure>;
}

impl<T> StageExt<T> for Result<T> {
    fn at(self, stage: Stage) -> std::result::Result<T, DocumentFailure> {
        self.map_err(|error| DocumentFailure { stage, error })
    }
}

/// What happened to one document.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Annotated copy written
    Written {
        /// Output file
        target: PathBuf,
    },
    /// Front matter rendered without writing (dry run)
    Rendered,
    /// Document abandoned
    Skipped(DocumentFailure),
}

/// Result of processing one document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentOutcome {
    /// Input file
    pub source: PathBuf,
    /// Derived title
    pub title: String,
    /// Outcome
    #[serde(flatten)]
    pub status: DocumentStatus,
}

impl DocumentOutcome {
    /// Returns the failure, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&DocumentFailure> {
        match self.status {
            DocumentStatus::Skipped(ref failure) => Some(failure),
            _ => None,
        }
    }
}

/// Statistics collected during a run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    /// Number of documents resolved
    pub documents_found: usize,

    /// Number of annotated files written
    pub documents_written: usize,

    /// Number of documents rendered in dry run mode
    pub documents_rendered: usize,

    /// Number of documents skipped after a failure
    pub documents_skipped: usize,

    /// Total execution time
    pub duration: Duration,

    /// Time spent resolving paths
    pub resolve_duration: Duration,

    /// Time spent annotating documents
    pub process_duration: Duration,

    /// Output directory path
    pub output_directory: String,

    /// Per-document outcomes in processing order
    pub outcomes: Vec<DocumentOutcome>,
}

impl PipelineStats {
    /// Creates statistics from the outcomes of a run.
    #[must_use]
    pub fn new(
        outcomes: Vec<DocumentOutcome>,
        duration: Duration,
        resolve_duration: Duration,
        process_duration: Duration,
        output_directory: String,
    ) -> Self {
        let count = |f: fn(&DocumentStatus) -> bool| outcomes.iter().filter(|o| f(&o.status)).count();

        Self {
            documents_found: outcomes.len(),
            documents_written: count(|s| matches!(s, DocumentStatus::Written { .. })),
            documents_rendered: count(|s| matches!(s, DocumentStatus::Rendered)),
            documents_skipped: count(|s| matches!(s, DocumentStatus::Skipped(_))),
            duration,
            resolve_duration,
            process_duration,
            output_directory,
            outcomes,
        }
    }

    /// Returns the skipped documents with their failures.
    pub fn failures(&self) -> impl Iterator<Item = (&Path, &DocumentFailure)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.failure().map(|f| (o.source.as_path(), f)))
    }

    /// Writes the statistics as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path).map_err(|e| Error::io(path, e))?;
        serde_json::to_writer_pretty(file, self)?;
        info!("Wrote report to {}", path.display());
        Ok(())
    }

    /// Prints a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║              Annotation Summary                       ║");
        println!("╠═══════════════════════════════════════════════════════╣");
        println!(
            "║ Documents Found:      {:>8}                        ║",
            self.documents_found
        );
        println!(
            "║   - Written:          {:>8}                        ║",
            self.documents_written
        );
        if self.documents_rendered > 0 {
            println!(
                "║   - Rendered (dry):   {:>8}                        ║",
                self.documents_rendered
            );
        }
        println!(
            "║   - Skipped:          {:>8}                        ║",
            self.documents_skipped
        );
        println!("║                                                       ║");
        println!("║ Output Directory:                                     ║");
        println!("║   {}", self.output_directory);
        println!("║                                                       ║");
        println!("║ Timing Breakdown:                                     ║");
        println!(
            "║   - Resolving:        {:>8.2}s                     ║",
            self.resolve_duration.as_secs_f64()
        );
        println!(
            "║   - Annotating:       {:>8.2}s                     ║",
            self.process_duration.as_secs_f64()
        );
        println!(
            "║   - Total:            {:>8.2}s                     ║",
            self.duration.as_secs_f64()
        );
        println!("╚═══════════════════════════════════════════════════════╝");

        for (source, failure) in self.failures() {
            println!("  skipped {}: {}", source.display(), failure);
        }
        println!();
    }
}

/// Annotates markdown documents with front matter.
pub struct Pipeline {
    config: Config,
    nlp: Arc<dyn NlpEngine>,
    history: Arc<dyn VersionHistory>,
    resolver: Resolver,
    templates: TemplateEngine,
    writer: Writer,
}

impl Pipeline {
    /// Creates a pipeline using the configured language model backend and
    /// git history of the root directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - The language model backend cannot be created
    /// - The front matter template fails to parse
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let nlp = config.nlp.create()?;
        let history = Arc::new(GitHistory::new(&config.root_dir));

        Self::with_backends(config, nlp, history)
    }

    /// Creates a pipeline with explicitly provided collaborators.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation or template parsing fails.
    pub fn with_backends(
        config: Config,
        nlp: Arc<dyn NlpEngine>,
        history: Arc<dyn VersionHistory>,
    ) -> Result<Self> {
        config.validate()?;

        let resolver = Resolver::new(&config)?;
        let templates = TemplateEngine::new(&config)?;
        let writer = Writer::new(&config);

        Ok(Self {
            config,
            nlp,
            history,
            resolver,
            templates,
            writer,
        })
    }

    /// Annotates every resolved document and returns statistics.
    ///
    /// # Process
    ///
    /// 1. **Resolve**: collects markdown files from the input or root
    /// 2. **Annotate**: derives metadata, copies and prepends per document
    ///
    /// A failing document is logged, recorded and skipped; it never stops
    /// the run.
    ///
    /// # Errors
    ///
    /// Returns an error only if the report file cannot be written.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use md_annotate::{Config, Pipeline};
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let config = Config::builder()
    ///     .root_dir("./notes")
    ///     .output_dir("./content")
    ///     .build()?;
    ///
    /// let stats = Pipeline::new(config)?.run()?;
    /// stats.print_summary();
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self), fields(root_dir = %self.config.root_dir.display()))]
    pub fn run(self) -> Result<PipelineStats> {
        let start_time = Instant::now();

        info!("Resolving documents...");
        let resolve_start = Instant::now();
        let paths = self.resolver.resolve();
        let resolve_duration = resolve_start.elapsed();
        info!(
            "✓ Found {} documents in {:.2}s",
            paths.len(),
            resolve_duration.as_secs_f64()
        );

        if self.config.dry_run {
            warn!("Dry run mode enabled - skipping file writes");
        }

        let process_start = Instant::now();
        let outcomes: Vec<DocumentOutcome> =
            paths.iter().map(|path| self.annotate(path)).collect();
        let process_duration = process_start.elapsed();

        let stats = PipelineStats::new(
            outcomes,
            start_time.elapsed(),
            resolve_duration,
            process_duration,
            self.config.output_dir.display().to_string(),
        );

        if stats.documents_skipped > 0 {
            warn!(
                "Skipped {} of {} documents",
                stats.documents_skipped, stats.documents_found
            );
        }

        if let Some(ref report) = self.config.report_path {
            stats.write_json(report)?;
        }

        info!(
            "✓ Annotation finished in {:.2}s",
            stats.duration.as_secs_f64()
        );

        Ok(stats)
    }

    /// Annotates a single document.
    ///
    /// Never fails: errors are captured in the returned outcome.
    pub fn annotate(&self, path: &Path) -> DocumentOutcome {
        info!("processing: {}", path.display());

        let title = metadata::title(path);
        let status = match self.process(path, title.clone()) {
            Ok(status) => status,
            Err(failure) => {
                warn!("skipping: {} ({})", path.display(), failure);
                DocumentStatus::Skipped(failure)
            }
        };

        DocumentOutcome {
            source: path.to_path_buf(),
            title,
            status,
        }
    }

    fn process(
        &self,
        path: &Path,
        title: String,
    ) -> std::result::Result<DocumentStatus, DocumentFailure> {
        let metadata = self.derive(path, title)?;
        let front_matter = self.templates.render(&metadata).at(Stage::Render)?;

        if self.config.dry_run {
            info!("{}\n{}", path.display(), front_matter);
            return Ok(DocumentStatus::Rendered);
        }
        debug!("{}", front_matter);

        let target = self.writer.copy_source(path).at(Stage::Copy)?;
        self.writer
            .prepend(&target, &front_matter)
            .at(Stage::Prepend)?;

        Ok(DocumentStatus::Written { target })
    }

    fn derive(
        &self,
        path: &Path,
        title: String,
    ) -> std::result::Result<DocumentMetadata, DocumentFailure> {
        let text = text::extract_file(path).at(Stage::Text)?;

        let subtitle = metadata::subtitle(self.nlp.as_ref(), &text, self.config.summary_char_limit)
            .at(Stage::Subtitle)?;
        let tags = metadata::tags(
            self.nlp.as_ref(),
            &text,
            &self.config.tag_label,
            self.config.max_tags,
        )
        .at(Stage::Tags)?;
        let categories = metadata::categories(path, &self.config.root_dir).at(Stage::Categories)?;

        let created = self.history.created(path).at(Stage::Created)?;
        let updated = match self.config.updated_source {
            UpdatedSource::LatestCommit => self.history.updated(path).at(Stage::Updated)?,
            UpdatedSource::FirstCommit => created,
        };

        Ok(DocumentMetadata {
            title,
            subtitle,
            tags,
            categories,
            created,
            updated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlp::Entity;
    use assert_fs::prelude::*;
    use chrono::{DateTime, FixedOffset};
    use std::collections::HashMap;
    use std::fs;

    const CREATED: &str = "2021-03-04T10:11:12+01:00";
    const UPDATED: &str = "2022-05-06T07:08:09+00:00";

    struct ScriptedNlp {
        entities: Vec<Entity>,
        summary: String,
    }

    impl ScriptedNlp {
        fn new() -> Self {
            Self {
                entities: vec![Entity::new("Acme Corp", "ORG"), Entity::new("Paris", "LOC")],
                summary: "A \"short\" summary".to_string(),
            }
        }
    }

    impl NlpEngine for ScriptedNlp {
        fn entities(&self, _text: &str) -> Result<Vec<Entity>> {
            Ok(self.entities.clone())
        }

        fn summarize(&self, _text: &str) -> Result<String> {
            Ok(self.summary.clone())
        }
    }

    struct FailingNlp;

    impl NlpEngine for FailingNlp {
        fn entities(&self, _text: &str) -> Result<Vec<Entity>> {
            Err(Error::nlp("model offline"))
        }

        fn summarize(&self, _text: &str) -> Result<String> {
            Err(Error::nlp("model offline"))
        }
    }

    /// History keyed by file name; unknown files have no history.
    struct FixedHistory {
        created: HashMap<String, DateTime<FixedOffset>>,
        updated: DateTime<FixedOffset>,
    }

    impl FixedHistory {
        fn tracking(names: &[&str]) -> Self {
            let created = DateTime::parse_from_rfc3339(CREATED).unwrap();
            Self {
                created: names.iter().map(|n| ((*n).to_string(), created)).collect(),
                updated: DateTime::parse_from_rfc3339(UPDATED).unwrap(),
            }
        }

        fn lookup(&self, path: &Path) -> Result<DateTime<FixedOffset>> {
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            self.created
                .get(&name)
                .copied()
                .ok_or_else(|| Error::git(path, "exit status: 128"))
        }
    }

    impl VersionHistory for FixedHistory {
        fn created(&self, path: &Path) -> Result<DateTime<FixedOffset>> {
            self.lookup(path)
        }

        fn updated(&self, path: &Path) -> Result<DateTime<FixedOffset>> {
            self.lookup(path).map(|_| self.updated)
        }
    }

    fn pipeline(config: Config, history: FixedHistory) -> Pipeline {
        Pipeline::with_backends(config, Arc::new(ScriptedNlp::new()), Arc::new(history)).unwrap()
    }

    #[test]
    fn test_annotates_nested_readme() {
        let temp = assert_fs::TempDir::new().unwrap();
        let body = "# App\n\nThe app is built by Acme Corp.\n";
        temp.child("projects/app/README.md").write_str(body).unwrap();
        let out = temp.child("out");
        out.create_dir_all().unwrap();

        let config = Config::builder()
            .root_dir(temp.path().join("projects"))
            .output_dir(out.path())
            .build()
            .unwrap();
        let stats = pipeline(config, FixedHistory::tracking(&["README.md"]))
            .run()
            .unwrap();

        assert_eq!(stats.documents_found, 1);
        assert_eq!(stats.documents_written, 1);
        assert_eq!(stats.outcomes[0].title, "app readme");

        out.child("README.md").assert(format!(
            "---\n\
             author: \"sirch\"\n\
             title: \"app readme\"\n\
             subtitle: \"A short summary\"\n\
             created: {CREATED}\n\
             date: {UPDATED}\n\
             draft: false\n\
             weight: 10\n\
             tags: [\"Acme Corp\"]\n\
             categories: [\"app\"]\n\
             ---\n{body}"
        ));
    }

    #[test]
    fn test_body_is_byte_identical() {
        let temp = assert_fs::TempDir::new().unwrap();
        let body = "---\nnot: front matter of ours\n---\n\nText\r\nwith CRLF  \n\n\n";
        temp.child("notes/install_guide.md").write_str(body).unwrap();
        let out = temp.child("out");
        out.create_dir_all().unwrap();

        let config = Config::builder()
            .root_dir(temp.path().join("notes"))
            .output_dir(out.path())
            .build()
            .unwrap();
        pipeline(config, FixedHistory::tracking(&["install_guide.md"]))
            .run()
            .unwrap();

        let written = fs::read_to_string(out.child("install_guide.md").path()).unwrap();
        let marker = "categories: []\n---\n";
        let end = written.find(marker).unwrap() + marker.len();
        assert!(written[..end].contains("title: \"Install Guide\"\n"));
        assert_eq!(&written[end..], body);
    }

    #[test]
    fn test_untracked_document_is_skipped() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("notes/tracked.md").write_str("# Tracked\n").unwrap();
        temp.child("notes/untracked.md").write_str("# Untracked\n").unwrap();
        temp.child("notes/zeta.md").write_str("# Zeta\n").unwrap();
        let out = temp.child("out");
        out.create_dir_all().unwrap();

        let config = Config::builder()
            .root_dir(temp.path().join("notes"))
            .output_dir(out.path())
            .build()
            .unwrap();
        let stats = pipeline(config, FixedHistory::tracking(&["tracked.md", "zeta.md"]))
            .run()
            .unwrap();

        assert_eq!(stats.documents_found, 3);
        assert_eq!(stats.documents_written, 2);
        assert_eq!(stats.documents_skipped, 1);

        let (source, failure) = stats.failures().next().unwrap();
        assert!(source.ends_with("untracked.md"));
        assert_eq!(failure.stage, Stage::Created);
        assert!(failure.error.is_history());

        assert!(out.child("tracked.md").exists());
        assert!(!out.child("untracked.md").exists());
        assert!(out.child("zeta.md").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_annotates_symlinked_note() {
        let temp = assert_fs::TempDir::new().unwrap();
        let body = "# Shared\n\nKept in another tree.\n";
        temp.child("elsewhere/shared_notes.md").write_str(body).unwrap();
        temp.child("notes/guides").create_dir_all().unwrap();
        std::os::unix::fs::symlink(
            temp.path().join("elsewhere/shared_notes.md"),
            temp.path().join("notes/guides/shared_notes.md"),
        )
        .unwrap();
        let out = temp.child("out");
        out.create_dir_all().unwrap();

        let config = Config::builder()
            .root_dir(temp.path().join("notes"))
            .output_dir(out.path())
            .build()
            .unwrap();
        let stats = pipeline(config, FixedHistory::tracking(&["shared_notes.md"]))
            .run()
            .unwrap();

        assert_eq!(stats.documents_written, 1);
        let written = fs::read_to_string(out.child("shared_notes.md").path()).unwrap();
        assert!(written.contains("title: \"Shared Notes\"\n"));
        assert!(written.contains("categories: [\"guides\"]\n"));
        assert!(written.ends_with(body));
        temp.child("elsewhere/shared_notes.md").assert(body);
    }

    #[test]
    fn test_nlp_failure_is_isolated() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.md").write_str("# A\n").unwrap();
        let out = temp.child("out");
        out.create_dir_all().unwrap();

        let config = Config::builder()
            .root_dir(temp.path())
            .input(temp.path().join("a.md"))
            .output_dir(out.path())
            .build()
            .unwrap();
        let stats = Pipeline::with_backends(
            config,
            Arc::new(FailingNlp),
            Arc::new(FixedHistory::tracking(&["a.md"])),
        )
        .unwrap()
        .run()
        .unwrap();

        assert_eq!(stats.documents_skipped, 1);
        assert_eq!(stats.outcomes[0].failure().unwrap().stage, Stage::Subtitle);
        assert!(!out.child("a.md").exists());
    }

    #[test]
    fn test_first_commit_mirrors_created() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.md").write_str("# A\n").unwrap();
        let out = temp.child("out");
        out.create_dir_all().unwrap();

        let config = Config::builder()
            .root_dir(temp.path())
            .input(temp.path().join("a.md"))
            .output_dir(out.path())
            .updated_source(UpdatedSource::FirstCommit)
            .build()
            .unwrap();
        pipeline(config, FixedHistory::tracking(&["a.md"]))
            .run()
            .unwrap();

        let written = fs::read_to_string(out.child("a.md").path()).unwrap();
        assert!(written.contains(&format!("created: {CREATED}\n")));
        assert!(written.contains(&format!("date: {CREATED}\n")));
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.md").write_str("# A\n").unwrap();

        let config = Config::builder()
            .root_dir(temp.path())
            .output_dir(temp.path().join("out"))
            .dry_run(true)
            .build()
            .unwrap();
        let stats = pipeline(config, FixedHistory::tracking(&["a.md"]))
            .run()
            .unwrap();

        assert_eq!(stats.documents_rendered, 1);
        assert_eq!(stats.documents_written, 0);
        assert!(!temp.child("out").exists());
    }

    #[test]
    fn test_empty_run() {
        let temp = assert_fs::TempDir::new().unwrap();
        let out = temp.child("out");
        out.create_dir_all().unwrap();

        let config = Config::builder()
            .root_dir(temp.path())
            .output_dir(out.path())
            .build()
            .unwrap();
        let stats = pipeline(config, FixedHistory::tracking(&[])).run().unwrap();

        assert_eq!(stats.documents_found, 0);
        assert_eq!(stats.failures().count(), 0);
    }

    #[test]
    fn test_writes_json_report() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("notes/ok.md").write_str("# Ok\n").unwrap();
        temp.child("notes/bad.md").write_str("# Bad\n").unwrap();
        let out = temp.child("out");
        out.create_dir_all().unwrap();
        let report = temp.child("report.json");

        let config = Config::builder()
            .root_dir(temp.path().join("notes"))
            .output_dir(out.path())
            .report_path(report.path())
            .build()
            .unwrap();
        pipeline(config, FixedHistory::tracking(&["ok.md"]))
            .run()
            .unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(report.path()).unwrap()).unwrap();
        assert_eq!(json["documents_found"], 2);
        assert_eq!(json["documents_skipped"], 1);

        let outcomes = json["outcomes"].as_array().unwrap();
        let bad = outcomes
            .iter()
            .find(|o| o["source"].as_str().unwrap().ends_with("bad.md"))
            .unwrap();
        assert_eq!(bad["status"], "skipped");
        assert_eq!(bad["stage"], "created");
        assert!(bad["error"].as_str().unwrap().contains("bad.md"));

        let ok = outcomes
            .iter()
            .find(|o| o["source"].as_str().unwrap().ends_with("ok.md"))
            .unwrap();
        assert_eq!(ok["status"], "written");
    }

    #[test]
    fn test_stage_display() {
        let failure = DocumentFailure {
            stage: Stage::Prepend,
            error: Error::config("disk full"),
        };
        assert!(failure.to_string().starts_with("prepend failed:"));
    }
}
