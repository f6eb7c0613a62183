use crate::{
    config::Config,
    error::Result,
    filter::FileFilter,
};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

/// Expands the configured input into the markdown files to annotate.
pub(crate) struct Resolver {
    scan_root: PathBuf,
    extension: String,
    file_filter: FileFilter,
}

impl Resolver {
    /// Creates a new resolver from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the exclusion patterns are invalid.
    pub(crate) fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            scan_root: config.scan_root().to_path_buf(),
            extension: config.extension.clone(),
            file_filter: FileFilter::new(&config.file_filter_config)?,
        })
    }

    /// Returns the documents to process.
    ///
    /// An explicit file is returned as is. Directories are walked
    /// recursively for files with the markdown extension, sorted by name.
    /// An empty list is a valid result.
    pub(crate) fn resolve(&self) -> Vec<PathBuf> {
        if self.scan_root.is_file() {
            debug!("Resolved single file {}", self.scan_root.display());
            return vec![self.scan_root.clone()];
        }

        let mut paths = Vec::new();

        for entry in WalkDir::new(&self.scan_root)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Walk error: {}", e);
                    continue;
                }
            };

            // links are not followed, but a link to a file is still a document
            let is_file = entry.file_type().is_file()
                || (entry.path_is_symlink() && entry.path().is_file());
            if !is_file || !self.has_extension(entry.path()) {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&self.scan_root)
                .unwrap_or_else(|_| entry.path());
            if !self.file_filter.should_process(relative) {
                trace!("Excluded {}", entry.path().display());
                continue;
            }

            trace!("Found {}", entry.path().display());
            paths.push(entry.into_path());
        }

        debug!(
            "Resolved {} documents under {}",
            paths.len(),
            self.scan_root.display()
        );
        paths
    }

    fn has_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == self.extension)
    }
}

/// Canonicalizes the directory of `path` but keeps its last component.
///
/// A symlinked document stays where it was found instead of resolving to
/// its target, which may lie outside the root.
pub(crate) fn canonical_location(path: &Path) -> std::io::Result<PathBuf> {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            Ok(parent.canonicalize()?.join(name))
        }
        _ => path.canonicalize(),
    }
}
