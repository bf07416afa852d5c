//! Destination-agnostic artifact writing.
//!
//! Two destinations exist: a permanent collection entry (stable path,
//! generated name, suitable for a media index) and an ephemeral entry (a
//! capability-scoped temp file meant for a single hand-off, gone when the
//! handle drops). Failed operations call [`SinkEntry::discard`] so callers
//! never observe a half-written artifact.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tempfile::{NamedTempFile, TempPath};

use crate::error::write_failed;
use crate::Error;

/// What the caller asks a sink to create.
#[derive(Debug, Clone)]
pub struct SinkRequest<'a> {
    /// Extension for the artifact, without the dot.
    pub extension: &'a str,
    /// MIME type of the artifact (recorded by collection sinks that keep an
    /// index; unused by ephemeral sinks).
    pub mime: &'a str,
    /// Logical directory below the sink root, e.g. `"Pictures/Scrubbed"`.
    pub logical_dir: &'a str,
}

/// Where a finished artifact lives.
#[derive(Debug)]
pub enum ArtifactLocation {
    /// Stable path in the permanent collection.
    Collection { path: PathBuf },
    /// Single-hand-off handle; the backing file is deleted when the handle
    /// is dropped.
    Ephemeral { handle: EphemeralHandle },
}

impl ArtifactLocation {
    pub fn path(&self) -> &Path {
        match self {
            ArtifactLocation::Collection { path } => path,
            ArtifactLocation::Ephemeral { handle } => &handle.path,
        }
    }
}

/// Capability-scoped reference to an ephemeral artifact. Valid for exactly
/// as long as the handle lives; not guaranteed after hand-off completes.
#[derive(Debug)]
pub struct EphemeralHandle {
    path: PathBuf,
    _guard: TempPath,
}

impl EphemeralHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// An in-progress artifact. Write, then either `finalize` or `discard`.
#[derive(Debug)]
pub struct SinkEntry {
    inner: EntryInner,
}

#[derive(Debug)]
enum EntryInner {
    Collection { path: PathBuf, file: File },
    Ephemeral { file: NamedTempFile },
}

impl SinkEntry {
    pub fn path(&self) -> &Path {
        match &self.inner {
            EntryInner::Collection { path, .. } => path,
            EntryInner::Ephemeral { file } => file.path(),
        }
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> crate::Result<()> {
        let res = match &mut self.inner {
            EntryInner::Collection { file, .. } => file.write_all(bytes),
            EntryInner::Ephemeral { file } => file.write_all(bytes),
        };
        res.map_err(write_failed)
    }

    /// Flush to durable storage and return the artifact location. When the
    /// flush fails the partial artifact is removed before the error is
    /// returned, so callers never see a half-written entry.
    pub fn finalize(self) -> crate::Result<ArtifactLocation> {
        match self.inner {
            EntryInner::Collection { path, file } => {
                if let Err(e) = file.sync_all() {
                    drop(file);
                    if let Err(rm) = fs::remove_file(&path) {
                        tracing::warn!(path = %path.display(), "failed to remove unsynced artifact: {rm}");
                    }
                    return Err(write_failed(e));
                }
                Ok(ArtifactLocation::Collection { path })
            }
            EntryInner::Ephemeral { file } => {
                file.as_file().sync_all().map_err(write_failed)?;
                let path_buf = file.path().to_owned();
                Ok(ArtifactLocation::Ephemeral {
                    handle: EphemeralHandle {
                        path: path_buf,
                        _guard: file.into_temp_path(),
                    },
                })
            }
        }
    }

    /// Best-effort removal of the partially-written artifact.
    pub fn discard(self) {
        match self.inner {
            EntryInner::Collection { path, file } => {
                drop(file);
                if let Err(e) = fs::remove_file(&path) {
                    tracing::warn!(path = %path.display(), "failed to remove partial artifact: {e}");
                }
            }
            EntryInner::Ephemeral { file } => {
                // NamedTempFile removes itself on drop.
                drop(file);
            }
        }
    }
}

/// A destination for processed artifacts.
pub trait OutputSink {
    fn create(&self, request: &SinkRequest) -> crate::Result<SinkEntry>;
}

/// Permanent destination: a directory tree meant to be indexed by the
/// platform's media collection.
#[derive(Debug, Clone)]
pub struct CollectionSink {
    root: PathBuf,
}

impl CollectionSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn generated_name(extension: &str, attempt: u32) -> String {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        if attempt == 0 {
            format!("scrubbed_{stamp}.{extension}")
        } else {
            format!("scrubbed_{stamp}_{attempt}.{extension}")
        }
    }
}

impl OutputSink for CollectionSink {
    fn create(&self, request: &SinkRequest) -> crate::Result<SinkEntry> {
        let dir = self.root.join(request.logical_dir);
        fs::create_dir_all(&dir).map_err(|e| Error::SinkCreationFailed(e.into()))?;

        // Names embed a second-resolution timestamp; suffix on collision.
        for attempt in 0..100 {
            let path = dir.join(Self::generated_name(request.extension, attempt));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    tracing::debug!(path = %path.display(), mime = request.mime, "created collection entry");
                    return Ok(SinkEntry {
                        inner: EntryInner::Collection { path, file },
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(Error::SinkCreationFailed(e.into())),
            }
        }
        Err(Error::SinkCreationFailed(
            "could not find a free artifact name".into(),
        ))
    }
}

/// Ephemeral destination for one hand-off to another process.
#[derive(Debug, Clone, Default)]
pub struct EphemeralSink {
    /// Directory for the temp entries; the system temp dir when `None`.
    dir: Option<PathBuf>,
}

impl EphemeralSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }
}

impl OutputSink for EphemeralSink {
    fn create(&self, request: &SinkRequest) -> crate::Result<SinkEntry> {
        let dir = match &self.dir {
            Some(d) => d.clone(),
            None => std::env::temp_dir(),
        };
        let file = tempfile::Builder::new()
            .prefix("scrub-")
            .suffix(&format!(".{}", request.extension))
            .tempfile_in(dir)
            .map_err(|e| Error::SinkCreationFailed(e.into()))?;
        Ok(SinkEntry {
            inner: EntryInner::Ephemeral { file },
        })
    }
}
