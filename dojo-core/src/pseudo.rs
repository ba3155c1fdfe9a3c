//! Pseudopotential artifacts and filename resolution.
//!
//! A `Pseudopotential` is the unit the dojo trains. It carries only identity
//! (name + optional file path); its report lives in a `ReportStore` so that
//! readiness is always recomputed from persisted state.
//!
//! `name` is for display. Reports and working directories are keyed by
//! `key()`, which tells apart files that share a name in different directories.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A pseudopotential under validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pseudopotential {
    /// Display name; for file-backed artifacts this is the file name.
    pub name: String,
    /// Location of the pseudopotential file, if it came from disk.
    pub path: Option<PathBuf>,
}

impl Pseudopotential {
    /// Artifact handed in directly, without a backing file.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
        }
    }

    /// Build from a path that is known to exist.
    ///
    /// Fails with `ResolveError::InvalidName` if the path has no UTF-8 file name.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ResolveError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ResolveError::InvalidName {
                path: path.to_path_buf(),
            })?;

        Ok(Self {
            name: name.to_string(),
            path: Some(path.to_path_buf()),
        })
    }

    /// Identity used for persistence.
    ///
    /// File-backed artifacts append a short blake3 of their path to the name,
    /// so `pbe/Si.psp8` and `lda/Si.psp8` never share a report.
    pub fn key(&self) -> String {
        match &self.path {
            Some(path) => {
                let hash = blake3::hash(path.to_string_lossy().as_bytes());
                format!("{}-{}", self.name, &hash.to_hex()[..12])
            }
            None => self.name.clone(),
        }
    }

    /// Name of the working directory used while training this artifact.
    pub fn workdir_name(&self) -> String {
        format!("DOJO_{}", self.key())
    }
}

impl fmt::Display for Pseudopotential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Errors raised while turning a submission into a `Pseudopotential`.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("pseudopotential file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("not a regular file: {}", path.display())]
    NotAFile { path: PathBuf },

    #[error("cannot derive a pseudopotential name from {}", path.display())]
    InvalidName { path: PathBuf },
}

/// Something that can be submitted to the dojo: an artifact or a filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PseudoRef {
    Pseudo(Pseudopotential),
    Path(PathBuf),
}

impl From<Pseudopotential> for PseudoRef {
    fn from(pseudo: Pseudopotential) -> Self {
        PseudoRef::Pseudo(pseudo)
    }
}

impl From<PathBuf> for PseudoRef {
    fn from(path: PathBuf) -> Self {
        PseudoRef::Path(path)
    }
}

impl From<&Path> for PseudoRef {
    fn from(path: &Path) -> Self {
        PseudoRef::Path(path.to_path_buf())
    }
}

impl From<&str> for PseudoRef {
    fn from(path: &str) -> Self {
        PseudoRef::Path(PathBuf::from(path))
    }
}

impl From<String> for PseudoRef {
    fn from(path: String) -> Self {
        PseudoRef::Path(PathBuf::from(path))
    }
}

/// Resolves submissions into constructed pseudopotentials.
pub trait PseudoResolver: Send + Sync {
    fn resolve(&self, item: &PseudoRef) -> Result<Pseudopotential, ResolveError>;
}

/// Resolver backed by the local filesystem.
///
/// Relative paths are joined onto `base_dir` when one is set.
#[derive(Debug, Clone, Default)]
pub struct FileResolver {
    base_dir: Option<PathBuf>,
}

impl FileResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative filenames against `base_dir`.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn full_path(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl PseudoResolver for FileResolver {
    fn resolve(&self, item: &PseudoRef) -> Result<Pseudopotential, ResolveError> {
        match item {
            PseudoRef::Pseudo(pseudo) => Ok(pseudo.clone()),
            PseudoRef::Path(path) => {
                let path = self.full_path(path);
                if !path.exists() {
                    return Err(ResolveError::NotFound { path });
                }
                if !path.is_file() {
                    return Err(ResolveError::NotAFile { path });
                }
                // Canonical form so one file reached by two spellings keeps one key.
                let path = path.canonicalize().unwrap_or(path);
                Pseudopotential::from_path(path)
            }
        }
    }
}
