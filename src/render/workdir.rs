use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{Error, Result};

/// Working directory of a single render run.
///
/// A temporary directory is removed when this is dropped. A fixed directory
/// given by the user is left alone.
#[derive(Debug)]
pub struct WorkDir {
    path: PathBuf,
    temp: Option<TempDir>,
}

impl WorkDir {
    pub fn acquire(fixed: Option<&Path>) -> Result<Self> {
        if let Some(dir) = fixed {
            std::fs::create_dir_all(dir).map_err(Error::io("unable to create work dir", dir))?;
            tracing::info!(dir = %dir.display(), "using work dir");
            return Ok(Self { path: dir.to_path_buf(), temp: None });
        }

        let temp = tempfile::Builder::new()
            .prefix("mapshot")
            .tempdir()
            .map_err(Error::io("unable to create temp dir in", std::env::temp_dir()))?;
        let path = temp.path().to_path_buf();
        tracing::info!(dir = %path.display(), "temp dir created");
        Ok(Self { path, temp: Some(temp) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        let Some(temp) = self.temp.take() else {
            return;
        };
        match temp.close() {
            Ok(()) => tracing::info!(dir = %self.path.display(), "temp dir removed"),
            Err(e) => tracing::error!(dir = %self.path.display(), error = %e, "unable to remove temp dir"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_removed_on_drop() {
        let work = WorkDir::acquire(None).unwrap();
        let path = work.path().to_path_buf();
        std::fs::write(path.join("file"), "x").unwrap();
        assert!(path.is_dir());
        drop(work);
        assert!(!path.exists());
    }

    #[test]
    fn test_fixed_kept_on_drop() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("work");
        let work = WorkDir::acquire(Some(&dir)).unwrap();
        assert_eq!(work.path(), dir);
        drop(work);
        assert!(dir.is_dir());
    }
}
