//! Path validation — filesystem sandboxing to the working directory.
//!
//! Resolution is two-phase: a lexical pass that normalizes `.`/`..` and
//! refuses to climb above the root, then a filesystem pass that
//! canonicalizes the deepest existing ancestor so a symlink inside the
//! tree cannot redirect a read or write outside it.

use std::path::{Component, Path, PathBuf};
use tracing::warn;

/// Error returned when path validation fails.
#[derive(Debug, thiserror::Error)]
pub enum PathValidationError {
    #[error("Path '{path}' is absolute; tool paths must be relative to the working directory")]
    AbsolutePath { path: String },

    #[error("Path traversal detected in '{path}'")]
    PathTraversal { path: String },

    #[error("Path '{path}' resolves outside the working directory")]
    OutsideRoot { path: String },

    #[error("Failed to canonicalize path '{path}': {reason}")]
    CanonicalizeFailed { path: String, reason: String },
}

/// A canonicalized working directory that tool paths are resolved against.
#[derive(Debug, Clone)]
pub struct SandboxRoot {
    root: PathBuf,
}

impl SandboxRoot {
    /// Canonicalize `root`. The directory must already exist.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, PathValidationError> {
        let root = root.as_ref();
        let canonical = root
            .canonicalize()
            .map_err(|e| PathValidationError::CanonicalizeFailed {
                path: root.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { root: canonical })
    }

    /// The canonical root directory.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve a caller-supplied relative path to an absolute path that is
    /// guaranteed to stay inside the root. An empty path resolves to the
    /// root itself.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, PathValidationError> {
        let normalized = normalize_relative(relative).inspect_err(|e| {
            warn!(path = relative, error = %e, "Rejected tool path");
        })?;

        let candidate = self.root.join(&normalized);
        self.check_existing_ancestor(&candidate, relative)?;
        Ok(candidate)
    }

    /// Render an absolute path under the root as a forward-slash relative path.
    pub fn relative(&self, absolute: &Path) -> String {
        absolute
            .strip_prefix(&self.root)
            .unwrap_or(absolute)
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Canonicalize the deepest ancestor of `candidate` that exists and make
    /// sure it is still under the root.
    fn check_existing_ancestor(
        &self,
        candidate: &Path,
        original: &str,
    ) -> Result<(), PathValidationError> {
        let mut probe = Some(candidate);
        while let Some(current) = probe {
            if current.symlink_metadata().is_ok() {
                let canonical =
                    current
                        .canonicalize()
                        .map_err(|e| PathValidationError::CanonicalizeFailed {
                            path: original.into(),
                            reason: e.to_string(),
                        })?;
                if !canonical.starts_with(&self.root) {
                    warn!(path = original, "Tool path escapes the working directory via symlink");
                    return Err(PathValidationError::OutsideRoot {
                        path: original.into(),
                    });
                }
                return Ok(());
            }
            probe = current.parent();
        }
        Ok(())
    }
}

/// Lexically normalize a relative path, refusing absolute paths and any
/// `..` that would climb above the starting directory.
fn normalize_relative(path: &str) -> Result<PathBuf, PathValidationError> {
    let unified = path.trim().replace('\\', "/");
    let input = Path::new(&unified);

    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in input.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                return Err(PathValidationError::AbsolutePath { path: path.into() });
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(PathValidationError::PathTraversal { path: path.into() });
                }
            }
            Component::Normal(part) => parts.push(part),
        }
    }

    Ok(parts.iter().collect())
}
