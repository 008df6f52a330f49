use std::{fs, mem, path::{Path, PathBuf}};

use anyhow::{Context, Result, bail};

use crate::error::HarmonizeError;

/// Create the directory if it doesn't exist; error if a non-directory exists there.
pub(crate) fn ensure_dir_exists(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            bail!("Path exists but is not a directory: {}", path.display());
        }
    } else {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory {}", path.display()))?;
    }
    Ok(())
}

/// Create the parent directory of a file path, if it has one.
pub(crate) fn ensure_parent_exists(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir_exists(parent),
        _ => Ok(()),
    }
}

/// Error with `HarmonizeError::FileNotFound` unless the file already exists.
pub(crate) fn require_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(HarmonizeError::FileNotFound(path.to_path_buf()).into());
    }
    if path.is_dir() {
        bail!("Path exists but is a directory, expected a file: {}", path.display());
    }
    Ok(())
}

/// Output files written under temporary names and moved into place together.
///
/// Staged files that were never committed are removed on drop. If a rename fails during
/// [`StagedFiles::commit`], files already moved into place are removed as well.
#[derive(Debug, Default)]
pub(crate) struct StagedFiles {
    pending: Vec<(PathBuf, PathBuf)>,
}

impl StagedFiles {
    pub(crate) fn new() -> Self { Self::default() }

    /// Temporary path beside `path` to write to instead of `path`.
    pub(crate) fn stage(&mut self, path: &Path) -> PathBuf {
        let name = path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
        let temp = path.with_file_name(format!(".{name}.partial"));
        self.pending.push((temp.clone(), path.to_path_buf()));
        temp
    }

    /// Move every staged file to its final path.
    pub(crate) fn commit(mut self) -> Result<()> {
        let pending = mem::take(&mut self.pending);
        for (i, (temp, path)) in pending.iter().enumerate() {
            if let Err(e) = fs::rename(temp, path) {
                for (_, moved) in &pending[..i] { let _ = fs::remove_file(moved); }
                for (temp, _) in &pending[i..] { let _ = fs::remove_file(temp); }
                return Err(e).with_context(|| format!("Failed to move {} into place", path.display()));
            }
        }
        Ok(())
    }
}

impl Drop for StagedFiles {
    fn drop(&mut self) {
        for (temp, _) in &self.pending { let _ = fs::remove_file(temp); }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_dir_creates_nested_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a/b/c");
        ensure_dir_exists(&nested).unwrap();
        assert!(nested.is_dir());

        // Idempotent on an existing directory
        ensure_dir_exists(&nested).unwrap();
    }

    #[test]
    fn ensure_dir_rejects_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        assert!(ensure_dir_exists(&file).is_err());
    }

    #[test]
    fn require_file_reports_missing_path_as_domain_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = require_file_exists(&tmp.path().join("nope.shp")).unwrap_err();
        assert!(matches!(err.downcast_ref::<HarmonizeError>(), Some(HarmonizeError::FileNotFound(_))));
    }

    #[test]
    fn staged_files_appear_only_on_commit() {
        let tmp = tempfile::tempdir().unwrap();
        let (a, b) = (tmp.path().join("a.csv"), tmp.path().join("b.csv"));

        let mut staged = StagedFiles::new();
        fs::write(staged.stage(&a), "a").unwrap();
        fs::write(staged.stage(&b), "b").unwrap();
        assert!(!a.exists() && !b.exists());

        staged.commit().unwrap();
        assert_eq!(fs::read_to_string(&a).unwrap(), "a");
        assert_eq!(fs::read_to_string(&b).unwrap(), "b");
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 2);
    }

    #[test]
    fn dropped_stage_leaves_nothing_behind() {
        let tmp = tempfile::tempdir().unwrap();
        let mut staged = StagedFiles::new();
        fs::write(staged.stage(&tmp.path().join("a.csv")), "a").unwrap();
        drop(staged);
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn failed_commit_rolls_back_moved_files() {
        let tmp = tempfile::tempdir().unwrap();
        let (a, blocked) = (tmp.path().join("a.csv"), tmp.path().join("b.geojson"));
        fs::create_dir(&blocked).unwrap();

        let mut staged = StagedFiles::new();
        fs::write(staged.stage(&a), "a").unwrap();
        fs::write(staged.stage(&blocked), "b").unwrap();

        assert!(staged.commit().is_err());
        assert!(!a.exists());
        assert!(blocked.is_dir());
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
    }
}
