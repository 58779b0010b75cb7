//! Atomic File Writer - 原子写入
//!
//! create temp (same directory) → write → fsync → close → rename → chmod
//!
//! The temp file is removed on every failure before the rename, so the target
//! is either untouched or fully replaced. A chmod failure happens after the
//! rename: the content is in place and only the mode may be wrong.

use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use super::ToolError;

/// Mode for files that did not exist before
pub const DEFAULT_FILE_MODE: u32 = 0o644;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStage {
    CreateTemp,
    Write,
    Sync,
    Close,
    Rename,
    Chmod,
}

impl fmt::Display for WriteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CreateTemp => "create temp",
            Self::Write => "write",
            Self::Sync => "sync",
            Self::Close => "close",
            Self::Rename => "rename",
            Self::Chmod => "chmod",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
#[error("atomic write of {} failed at {stage}: {source}", path.display())]
pub struct AtomicWriteError {
    pub path: PathBuf,
    pub stage: WriteStage,
    #[source]
    pub source: io::Error,
}

impl From<AtomicWriteError> for ToolError {
    fn from(e: AtomicWriteError) -> Self {
        ToolError::Io(io::Error::new(e.source.kind(), e.to_string()))
    }
}

/// Filesystem primitives used by the writer
pub trait WriteOps: Send + Sync {
    fn create_temp(&self, dir: &Path) -> io::Result<(File, PathBuf)>;
    fn write_all(&self, file: &mut File, content: &[u8]) -> io::Result<()>;
    fn sync(&self, file: &File) -> io::Result<()>;
    fn close(&self, file: File) -> io::Result<()>;
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn set_permissions(&self, path: &Path, mode: u32) -> io::Result<()>;
    fn remove(&self, path: &Path) -> io::Result<()>;
}

/// Real filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct OsWriteOps;

impl WriteOps for OsWriteOps {
    fn create_temp(&self, dir: &Path) -> io::Result<(File, PathBuf)> {
        tempfile::Builder::new()
            .prefix(".helm-")
            .suffix(".tmp")
            .tempfile_in(dir)?
            .keep()
            .map_err(|e| e.error)
    }

    fn write_all(&self, file: &mut File, content: &[u8]) -> io::Result<()> {
        file.write_all(content)
    }

    fn sync(&self, file: &File) -> io::Result<()> {
        file.sync_all()
    }

    fn close(&self, file: File) -> io::Result<()> {
        drop(file);
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    #[cfg(unix)]
    fn set_permissions(&self, path: &Path, mode: u32) -> io::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
    }

    #[cfg(not(unix))]
    fn set_permissions(&self, path: &Path, mode: u32) -> io::Result<()> {
        let mut permissions = std::fs::metadata(path)?.permissions();
        permissions.set_readonly(mode & 0o222 == 0);
        std::fs::set_permissions(path, permissions)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }
}

/// Existing file mode, or [`DEFAULT_FILE_MODE`]
pub fn existing_mode(path: &Path) -> u32 {
    match std::fs::metadata(path) {
        #[cfg(unix)]
        Ok(meta) => {
            use std::os::unix::fs::PermissionsExt;
            meta.permissions().mode() & 0o7777
        }
        #[cfg(not(unix))]
        Ok(meta) if meta.permissions().readonly() => 0o444,
        _ => DEFAULT_FILE_MODE,
    }
}

/// 原子写入器
#[derive(Clone)]
pub struct AtomicWriter {
    ops: Arc<dyn WriteOps>,
}

impl fmt::Debug for AtomicWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomicWriter").finish_non_exhaustive()
    }
}

impl Default for AtomicWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl AtomicWriter {
    pub fn new() -> Self {
        Self::with_ops(Arc::new(OsWriteOps))
    }

    pub fn with_ops(ops: Arc<dyn WriteOps>) -> Self {
        Self { ops }
    }

    /// Blocking write. No retries; the caller decides.
    pub fn write(&self, path: &Path, content: &[u8], mode: u32) -> Result<(), AtomicWriteError> {
        let fail = |stage, source| AtomicWriteError {
            path: path.to_path_buf(),
            stage,
            source,
        };
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let (mut file, tmp) = self
            .ops
            .create_temp(dir)
            .map_err(|e| fail(WriteStage::CreateTemp, e))?;

        if let Err(e) = self.ops.write_all(&mut file, content) {
            drop(file);
            self.discard(&tmp);
            return Err(fail(WriteStage::Write, e));
        }
        if let Err(e) = self.ops.sync(&file) {
            drop(file);
            self.discard(&tmp);
            return Err(fail(WriteStage::Sync, e));
        }
        if let Err(e) = self.ops.close(file) {
            self.discard(&tmp);
            return Err(fail(WriteStage::Close, e));
        }
        if let Err(e) = self.ops.rename(&tmp, path) {
            self.discard(&tmp);
            return Err(fail(WriteStage::Rename, e));
        }

        self.ops
            .set_permissions(path, mode)
            .map_err(|e| fail(WriteStage::Chmod, e))?;

        debug!(path = %path.display(), bytes = content.len(), mode = %format!("{:o}", mode), "atomic write complete");
        Ok(())
    }

    /// [`write`](Self::write) on the blocking pool
    pub async fn write_file(&self, path: PathBuf, content: Vec<u8>, mode: u32) -> Result<(), ToolError> {
        let writer = self.clone();
        tokio::task::spawn_blocking(move || writer.write(&path, &content, mode))
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("write task failed: {}", e)))?
            .map_err(ToolError::from)
    }

    fn discard(&self, tmp: &Path) {
        if let Err(e) = self.ops.remove(tmp) {
            warn!(path = %tmp.display(), error = %e, "failed to remove temp file");
        }
    }
}
