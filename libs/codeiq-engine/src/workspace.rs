/// Workspace Manager
///
/// Stages submission source text in a scratch directory under a random
/// 128-bit token, and removes everything it staged when the returned guard
/// goes out of scope. The scratch root is injected, never global, so
/// concurrent submissions only share a directory, never a file name.

use codeiq_common::ExecutionFailure;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// A relative `root` is resolved against the current directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root)
            .map(|abs| abs.components().collect())
            .unwrap_or(root);
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `source` verbatim to `<root>/<token>.<extension>`
    ///
    /// The scratch root is created if absent. The content is not validated.
    pub async fn stage(&self, source: &str, extension: &str) -> io::Result<StagedSource> {
        tokio::fs::create_dir_all(&self.root).await?;

        let token = Uuid::new_v4().simple().to_string();
        let path = self.root.join(format!("{}.{}", token, extension));

        // Guard first, so a half-written file is still removed
        let staged = StagedSource {
            root: self.root.clone(),
            token,
            path,
            artifacts: Vec::new(),
            dirs: Vec::new(),
        };
        tokio::fs::write(&staged.path, source).await?;

        debug!(path = %staged.path.display(), bytes = source.len(), "Staged source");
        Ok(staged)
    }

    /// Strip `<root>/` from a diagnostic
    ///
    /// Only the root followed by a separator is removed, so text that merely
    /// contains the directory name survives.
    pub fn redact(&self, message: &str) -> String {
        strip_root(&self.root, message)
    }
}

fn strip_root(root: &Path, message: &str) -> String {
    let root = root.to_string_lossy();
    if root.is_empty() {
        return message.to_string();
    }
    let prefix = if root.ends_with(std::path::MAIN_SEPARATOR) {
        root.into_owned()
    } else {
        format!("{}{}", root, std::path::MAIN_SEPARATOR)
    };
    message.replace(&prefix, "")
}

/// Cleanup guard for one staged submission
///
/// Owns the staged file plus every artifact path and private directory
/// registered on it; all of them are removed on drop, on every exit path.
#[derive(Debug)]
pub struct StagedSource {
    root: PathBuf,
    token: String,
    path: PathBuf,
    artifacts: Vec<PathBuf>,
    dirs: Vec<PathBuf>,
}

impl StagedSource {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Reserve `<root>/<token>.<extension>` for a build product
    pub fn artifact(&mut self, extension: &str) -> PathBuf {
        let path = self.root.join(format!("{}.{}", self.token, extension));
        self.artifacts.push(path.clone());
        path
    }

    /// Create `<root>/<token>/` for toolchains that dictate file names
    pub async fn private_dir(&mut self) -> io::Result<PathBuf> {
        let dir = self.root.join(&self.token);
        self.dirs.push(dir.clone());
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Strip the host scratch location from a diagnostic
    pub fn redact(&self, message: &str) -> String {
        strip_root(&self.root, message)
    }

    pub fn redact_failure(&self, mut failure: ExecutionFailure) -> ExecutionFailure {
        failure.message = self.redact(&failure.message);
        failure
    }
}

impl Drop for StagedSource {
    fn drop(&mut self) {
        for file in std::iter::once(&self.path).chain(self.artifacts.iter()) {
            match std::fs::remove_file(file) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %file.display(), error = %e, "Failed to remove scratch file"),
            }
        }
        for dir in &self.dirs {
            match std::fs::remove_dir_all(dir) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %dir.display(), error = %e, "Failed to remove scratch dir"),
            }
        }
    }
}
