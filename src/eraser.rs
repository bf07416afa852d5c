//! Secure removal of intermediate files: overwrite with random data, flush,
//! delete. Erasure problems never fail an operation; deletion is always
//! attempted even when overwriting cannot complete.

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use rand::RngCore;

/// How an erase attempt ended. Informational only; no variant is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseOutcome {
    /// Overwritten for the configured number of passes, then deleted.
    Shredded,
    /// Overwrite failed; the file was deleted without shredding.
    PlainDelete,
    /// Even deletion failed (already gone, or permissions).
    Failed,
}

#[derive(Debug, Clone)]
pub struct SecureFileEraser {
    passes: u32,
    buffer_bytes: usize,
}

impl SecureFileEraser {
    pub fn new(passes: u32, buffer_bytes: usize) -> Self {
        Self {
            passes: passes.max(1),
            buffer_bytes: buffer_bytes.max(512),
        }
    }

    /// Overwrite and delete `path`. Degradations are logged, not raised.
    pub fn erase(&self, path: &Path) -> EraseOutcome {
        let shredded = match self.overwrite(path) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(path = %path.display(), "secure overwrite failed, falling back to plain delete: {e}");
                false
            }
        };

        match std::fs::remove_file(path) {
            Ok(()) if shredded => EraseOutcome::Shredded,
            Ok(()) => EraseOutcome::PlainDelete,
            Err(e) => {
                tracing::warn!(path = %path.display(), "could not delete file: {e}");
                EraseOutcome::Failed
            }
        }
    }

    fn overwrite(&self, path: &Path) -> std::io::Result<()> {
        let mut file = OpenOptions::new().write(true).open(path)?;
        let len = file.metadata()?.len();
        let mut rng = rand::thread_rng();
        let mut buf = vec![0u8; self.buffer_bytes];

        for pass in 0..self.passes {
            file.seek(SeekFrom::Start(0))?;
            let mut remaining = len;
            while remaining > 0 {
                let n = remaining.min(buf.len() as u64) as usize;
                rng.fill_bytes(&mut buf[..n]);
                file.write_all(&buf[..n])?;
                remaining -= n as u64;
            }
            // Each pass must hit the platter, not the page cache.
            file.sync_all()?;
            tracing::trace!(path = %path.display(), pass, len, "overwrite pass done");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn eraser() -> SecureFileEraser {
        SecureFileEraser::new(3, 4096)
    }

    #[test]
    fn erase_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intermediate.bin");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(&vec![0xAB; 10_000]).unwrap();
        drop(f);

        assert_eq!(eraser().erase(&path), EraseOutcome::Shredded);
        assert!(!path.exists());
    }

    #[test]
    fn erase_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty");
        std::fs::File::create(&path).unwrap();

        assert_eq!(eraser().erase(&path), EraseOutcome::Shredded);
        assert!(!path.exists());
    }

    #[test]
    fn missing_file_reports_failed_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never-existed");
        assert_eq!(eraser().erase(&path), EraseOutcome::Failed);
    }

    #[test]
    fn buffer_smaller_than_file_still_covers_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        std::fs::write(&path, vec![0u8; 9_000]).unwrap();

        let eraser = SecureFileEraser::new(1, 512);
        assert_eq!(eraser.erase(&path), EraseOutcome::Shredded);
        assert!(!path.exists());
    }
}
