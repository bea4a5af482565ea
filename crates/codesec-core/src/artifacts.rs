//! Artifact hand-off between the analysis and display CI jobs.
//!
//! The two phases run as separate job executions whose only shared
//! resource is the runner's artifact store. `ArtifactStore` is the seam
//! that store plugs into; `FileSystemStore` is the shipped implementation,
//! rooted at a directory the hosting runner shares between jobs.

use crate::error::Result;
use crate::workflow;
use std::fs;
use std::path::{Path, PathBuf};

pub trait ArtifactStore {
    /// Upload the given files as a named bundle, replacing any previous
    /// bundle of that name.
    fn upload(&self, name: &str, files: &[PathBuf]) -> Result<()>;

    /// Download a named bundle into `dest`. A bundle that was never
    /// uploaded is not an error: the destination plainly stays empty and
    /// downstream file-existence checks skip the affected tools.
    fn download(&self, name: &str, dest: &Path) -> Result<()>;
}

/// Bundle layout: `<root>/<bundle-name>/<file>`.
#[derive(Debug, Clone)]
pub struct FileSystemStore {
    root: PathBuf,
}

impl FileSystemStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ArtifactStore for FileSystemStore {
    fn upload(&self, name: &str, files: &[PathBuf]) -> Result<()> {
        let bundle = self.root.join(name);
        if bundle.exists() {
            fs::remove_dir_all(&bundle)?;
        }
        fs::create_dir_all(&bundle)?;
        for file in files {
            let target = bundle.join(
                file.file_name()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| file.clone()),
            );
            fs::copy(file, target)?;
        }
        workflow::info(&format!("Uploaded {} file(s) as artifact {}", files.len(), name));
        Ok(())
    }

    fn download(&self, name: &str, dest: &Path) -> Result<()> {
        let bundle = self.root.join(name);
        fs::create_dir_all(dest)?;
        if !bundle.is_dir() {
            workflow::debug(&format!("artifact bundle {} not found, skipping", name));
            return Ok(());
        }
        let mut count = 0usize;
        for entry in fs::read_dir(&bundle)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                fs::copy(entry.path(), dest.join(entry.file_name()))?;
                count += 1;
            }
        }
        workflow::info(&format!("Downloaded artifact {} ({} file(s))", name, count));
        Ok(())
    }
}
