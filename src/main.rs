use anyhow::Context;
use clap::Parser;
use md_annotate::{
    Config, FileFilterConfig, InferenceConfig, NlpBackend, Pipeline, UpdatedSource,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "md-annotate",
    version,
    author,
    about = "Prepend generated front matter to markdown notes",
    long_about = "Prepend generated front matter to markdown notes.\n\n\
    Each document is copied into the output directory with a block holding \
    its title, a generated subtitle, organisation tags, categories from the \
    directory layout and dates from git history. Documents that fail are \
    skipped and listed in the summary.\n\n\
    USAGE EXAMPLES:\n  \
      # Annotate every note under ./notes\n  \
      md-annotate \"\" ./notes ./content\n\n  \
      # Annotate a single file\n  \
      md-annotate ./notes/app/README.md ./notes ./content\n\n  \
      # Use a remote inference server and preview the result\n  \
      md-annotate \"\" ./notes ./content --backend inference --dry-run"
)]
struct Cli {
    /// File or directory to annotate; empty means the whole root
    #[arg(value_name = "INPUT")]
    input: String,

    /// Root directory for categories and git history
    #[arg(value_name = "ROOT", default_value = ".")]
    root: PathBuf,

    /// Directory receiving annotated copies
    #[arg(value_name = "OUTPUT", default_value = "content")]
    output: PathBuf,

    /// Author written into every block
    #[arg(long, default_value = "sirch")]
    author: String,

    /// Markdown file extension, without the dot
    #[arg(long, default_value = "md", value_name = "EXT")]
    ext: String,

    /// Glob of files to skip (repeatable)
    #[arg(long, value_name = "GLOB")]
    exclude: Vec<String>,

    /// Glob of directories to skip (repeatable)
    #[arg(long = "exclude-dir", value_name = "GLOB")]
    exclude_dir: Vec<String>,

    /// Entity recognition and summarization backend
    ///
    /// `heuristic` works offline but its subtitle is only the leading
    /// sentences of the document. Use `inference` for generated summaries.
    #[arg(long, value_enum, default_value = "heuristic")]
    backend: CliBackend,

    /// Base URL of the inference API
    #[arg(long, env = "MD_ANNOTATE_ENDPOINT", value_name = "URL")]
    endpoint: Option<String>,

    /// Bearer token for the inference API
    #[arg(long, env = "HF_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Summarization model id
    #[arg(long, value_name = "MODEL")]
    summarization_model: Option<String>,

    /// Token classification model id
    #[arg(long, value_name = "MODEL")]
    ner_model: Option<String>,

    /// Inference request timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Characters of text passed to the summarizer
    #[arg(long, default_value_t = 2500)]
    summary_chars: usize,

    /// Maximum number of tags
    #[arg(long, default_value_t = 5)]
    max_tags: usize,

    /// Entity class kept as tags
    #[arg(long, default_value = "ORG")]
    tag_label: String,

    /// Take `date` from the first commit instead of the latest one
    #[arg(long)]
    updated_from_first_commit: bool,

    /// Mark documents as drafts
    #[arg(long)]
    draft: bool,

    /// Weight written into every block
    #[arg(long, default_value_t = 10)]
    weight: u32,

    /// Path to a custom Tera front matter template
    #[arg(long, value_name = "FILE")]
    template: Option<PathBuf>,

    /// Write a JSON run report to this file
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Back up existing output files before overwriting them
    #[arg(long)]
    backup: bool,

    /// Dry run (log blocks, don't write files)
    #[arg(long)]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliBackend {
    /// Offline; subtitle is the leading sentences, not a generated summary
    Heuristic,
    /// Remote inference API with abstractive summaries
    Inference,
}

impl Cli {
    fn backend(&self) -> NlpBackend {
        match self.backend {
            CliBackend::Heuristic => NlpBackend::Heuristic,
            CliBackend::Inference => {
                let mut config = InferenceConfig::default();
                if let Some(ref endpoint) = self.endpoint {
                    config.endpoint.clone_from(endpoint);
                }
                if let Some(ref model) = self.summarization_model {
                    config.summarization_model.clone_from(model);
                }
                if let Some(ref model) = self.ner_model {
                    config.ner_model.clone_from(model);
                }
                config.token.clone_from(&self.token);
                config.timeout = self.timeout.map(Duration::from_secs);
                NlpBackend::Inference(config)
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose)?;

    let mut builder = Config::builder()
        .root_dir(&cli.root)
        .output_dir(&cli.output)
        .author(&cli.author)
        .extension(&cli.ext)
        .file_filter_config(
            FileFilterConfig::new()
                .exclude_files(cli.exclude.clone())
                .exclude_directories(cli.exclude_dir.clone()),
        )
        .nlp(cli.backend())
        .summary_char_limit(cli.summary_chars)
        .max_tags(cli.max_tags)
        .tag_label(&cli.tag_label)
        .draft(cli.draft)
        .weight(cli.weight)
        .backup_existing(cli.backup)
        .dry_run(cli.dry_run);

    if !cli.input.is_empty() {
        builder = builder.input(&cli.input);
    }

    if cli.updated_from_first_commit {
        builder = builder.updated_source(UpdatedSource::FirstCommit);
    }

    if let Some(template_path) = cli.template {
        builder = builder.template_path(template_path);
    }

    if let Some(report_path) = cli.report {
        builder = builder.report_path(report_path);
    }

    let config = builder.build().context("Failed to build configuration")?;

    let stats = Pipeline::new(config)
        .context("Failed to create pipeline")?
        .run()
        .context("Pipeline execution failed")?;

    stats.print_summary();

    Ok(())
}

fn setup_tracing(verbosity: u8) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbosity {
        0 => EnvFilter::new("md_annotate=info"),
        1 => EnvFilter::new("md_annotate=debug"),
        _ => EnvFilter::new("md_annotate=trace"),
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_thread_ids(false))
        .try_init()
        .context("Failed to initialise logging")?;

    Ok(())
}
