//! Private attachment storage for place images.
//!
//! # Responsibility
//! - Copy user-selected images into the application-private root under
//!   generated names.
//! - Delete previously adopted files, but never anything outside the root.
//!
//! # Invariants
//! - File names are generated (`happy_place_<uuid v4>.jpg`), never caller supplied.
//! - An adopted path only becomes visible after the copy is complete.
//! - `release` never returns an error; failures are logged and tolerated.

use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::time::Instant;
use uuid::Uuid;

const FILE_PREFIX: &str = "happy_place_";
const FILE_EXTENSION: &str = "jpg";
const PARTIAL_SUFFIX: &str = ".part";
const FILE_URI_SCHEME: &str = "file://";

pub type AttachmentResult<T> = Result<T, AttachmentError>;

#[derive(Debug)]
pub enum AttachmentError {
    /// The private root could not be created or resolved.
    Root { path: PathBuf, source: io::Error },
    /// The caller-supplied source could not be opened.
    Source { path: PathBuf, source: io::Error },
    /// Copying into private storage failed.
    Copy(io::Error),
}

impl Display for AttachmentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Root { path, source } => write!(
                f,
                "attachment root `{}` is unusable: {source}",
                path.display()
            ),
            Self::Source { path, source } => write!(
                f,
                "image source `{}` cannot be opened: {source}",
                path.display()
            ),
            Self::Copy(err) => write!(f, "image copy failed: {err}"),
        }
    }
}

impl Error for AttachmentError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Root { source, .. } | Self::Source { source, .. } => Some(source),
            Self::Copy(err) => Some(err),
        }
    }
}

/// Owner of the private image directory.
#[derive(Debug, Clone)]
pub struct AttachmentStore {
    root: PathBuf,
}

impl AttachmentStore {
    /// Opens the private root, creating it when missing.
    ///
    /// The root is canonicalized so ownership checks compare resolved paths.
    pub fn open(root: impl AsRef<Path>) -> AttachmentResult<Self> {
        let requested = root.as_ref();
        fs::create_dir_all(requested).map_err(|source| AttachmentError::Root {
            path: requested.to_path_buf(),
            source,
        })?;
        let root = requested
            .canonicalize()
            .map_err(|source| AttachmentError::Root {
                path: requested.to_path_buf(),
                source,
            })?;
        info!(
            "event=attachments_open module=storage status=ok root={}",
            root.display()
        );
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copies `source` byte-for-byte into private storage.
    ///
    /// Returns the path of the new file. On failure no file is left behind.
    pub fn adopt(&self, mut source: impl Read) -> AttachmentResult<PathBuf> {
        let started_at = Instant::now();
        let file_name = format!("{FILE_PREFIX}{}.{FILE_EXTENSION}", Uuid::new_v4());
        let target = self.root.join(&file_name);
        let partial = self.root.join(format!("{file_name}{PARTIAL_SUFFIX}"));

        let copied = write_partial(&partial, &mut source)
            .and_then(|bytes| fs::rename(&partial, &target).map(|()| bytes));

        match copied {
            Ok(bytes) => {
                info!(
                    "event=attachment_adopt module=storage status=ok bytes={} duration_ms={}",
                    bytes,
                    started_at.elapsed().as_millis()
                );
                Ok(target)
            }
            Err(err) => {
                if let Err(cleanup_err) = fs::remove_file(&partial) {
                    if cleanup_err.kind() != io::ErrorKind::NotFound {
                        warn!(
                            "event=attachment_adopt module=storage status=error error_code=partial_cleanup_failed error={}",
                            cleanup_err
                        );
                    }
                }
                error!(
                    "event=attachment_adopt module=storage status=error duration_ms={} error_code=copy_failed error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(AttachmentError::Copy(err))
            }
        }
    }

    /// Opens a file on disk and adopts its content.
    pub fn adopt_file(&self, source_path: impl AsRef<Path>) -> AttachmentResult<PathBuf> {
        let source_path = source_path.as_ref();
        let file = File::open(source_path).map_err(|source| AttachmentError::Source {
            path: source_path.to_path_buf(),
            source,
        })?;
        self.adopt(file)
    }

    /// Returns whether `reference` points into the private root.
    ///
    /// Accepts plain paths and `file://` URIs. Relative paths, other URI
    /// schemes and paths escaping through `..` are never owned.
    pub fn owns(&self, reference: &str) -> bool {
        self.resolve_owned(reference).is_some()
    }

    /// Deletes an owned file.
    ///
    /// Returns `true` when a file was removed. Foreign references and I/O
    /// failures only produce log entries.
    pub fn release(&self, reference: &str) -> bool {
        let Some(path) = self.resolve_owned(reference) else {
            debug!("event=attachment_release module=storage status=skipped reason=not_owned");
            return false;
        };

        match fs::remove_file(&path) {
            Ok(()) => {
                info!("event=attachment_release module=storage status=ok");
                true
            }
            Err(err) => {
                warn!(
                    "event=attachment_release module=storage status=error error_code=remove_failed error={}",
                    err
                );
                false
            }
        }
    }

    fn resolve_owned(&self, reference: &str) -> Option<PathBuf> {
        let trimmed = reference.trim();
        let raw = trimmed.strip_prefix(FILE_URI_SCHEME).unwrap_or(trimmed);
        if raw.is_empty() || raw.contains("://") {
            return None;
        }

        let path = Path::new(raw);
        if !path.is_absolute()
            || path
                .components()
                .any(|component| matches!(component, Component::ParentDir))
        {
            return None;
        }

        let resolved = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if resolved != self.root && resolved.starts_with(&self.root) {
            Some(resolved)
        } else {
            None
        }
    }
}

fn write_partial(partial: &Path, source: &mut impl Read) -> io::Result<u64> {
    let mut file = File::create(partial)?;
    let bytes = io::copy(source, &mut file)?;
    file.flush()?;
    file.sync_all()?;
    Ok(bytes)
}
