use crate::{
    config::Config,
    error::{Error, Result},
};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    time::SystemTime,
};
use tracing::debug;

/// Copies documents into the output directory and prepends front matter.
///
/// Output is flat: `notes/a/guide.md` and `notes/b/guide.md` both land on
/// `<output>/guide.md` and the last one wins.
pub(crate) struct Writer {
    output_dir: PathBuf,
    backup_existing: bool,
}

impl Writer {
    /// Creates a new writer from configuration.
    pub(crate) fn new(config: &Config) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            backup_existing: config.backup_existing,
        }
    }

    /// Returns where `source` is written.
    ///
    /// # Errors
    ///
    /// Returns an error if `source` has no file name.
    pub(crate) fn target_path(&self, source: &Path) -> Result<PathBuf> {
        let name = source
            .file_name()
            .ok_or_else(|| Error::config(format!("No file name in {}", source.display())))?;
        Ok(self.output_dir.join(name))
    }

    /// Copies `source` unmodified into the output directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy would overwrite the source itself or fails.
    pub(crate) fn copy_source(&self, source: &Path) -> Result<PathBuf> {
        let target = self.target_path(source)?;

        if target.exists() {
            if same_file(source, &target) {
                return Err(Error::config(format!(
                    "Output {} would overwrite its own source",
                    target.display()
                )));
            }
            if self.backup_existing {
                self.backup_file(&target)?;
            }
        }

        fs::copy(source, &target).map_err(|e| Error::io(&target, e))?;
        debug!("Copied {} to {}", source.display(), target.display());

        Ok(target)
    }

    /// Rewrites `target` with `front_matter` in front of its current bytes.
    ///
    /// Trailing line breaks of the block collapse to a single `\n`, so the
    /// original content starts right after the closing delimiter line.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or replaced.
    pub(crate) fn prepend(&self, target: &Path, front_matter: &str) -> Result<()> {
        let content = fs::read(target).map_err(|e| Error::io(target, e))?;

        let header = front_matter.trim_end_matches(['\r', '\n']);
        let mut data = Vec::with_capacity(header.len() + 1 + content.len());
        data.extend_from_slice(header.as_bytes());
        data.push(b'\n');
        data.extend_from_slice(&content);

        write_file_atomic(target, &data)
    }

    /// Creates a timestamped backup of an existing file.
    fn backup_file(&self, path: &Path) -> Result<()> {
        let timestamp = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)?
            .as_nanos();

        let filename = path
            .file_name()
            .ok_or_else(|| Error::config("Invalid file path"))?
            .to_string_lossy();

        let backup_path = self
            .output_dir
            .join(format!("{filename}.backup.{timestamp}"));

        fs::copy(path, &backup_path).map_err(|e| Error::io(&backup_path, e))?;

        debug!("Created backup: {}", backup_path.display());
        Ok(())
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Writes a file through a sibling temp file and a rename.
///
/// Readers never observe a half-written document.
fn write_file_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let name = path
        .file_name()
        .ok_or_else(|| Error::config("Invalid file path"))?
        .to_string_lossy();
    let temp_path = path.with_file_name(format!(".{name}.tmp"));

    let mut temp_file = fs::File::create(&temp_path).map_err(|e| Error::io(&temp_path, e))?;
    temp_file
        .write_all(data)
        .map_err(|e| Error::io(&temp_path, e))?;
    temp_file
        .sync_all()
        .map_err(|e| Error::io(&temp_path, e))?;
    drop(temp_file);

    fs::rename(&temp_path, path).map_err(|e| Error::io(path, e))?;

    Ok(())
}
