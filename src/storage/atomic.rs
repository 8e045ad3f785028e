//! Whole-file replacement: write a sibling temp file, sync, rename over the target.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use tempfile::NamedTempFile;

use super::error::StorageResult;
use crate::format::KvWriter;

/// Replaces `path` with whatever `fill` writes.
///
/// The target is only touched by the final rename, so on any error the previous
/// content stays in place and the temp file is removed on drop.
pub fn replace_file<F>(path: &Path, fill: F) -> StorageResult<()>
where
    F: FnOnce(&mut KvWriter<BufWriter<&mut File>>) -> std::io::Result<()>,
{
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = KvWriter::new(BufWriter::new(temp.as_file_mut()));
        fill(&mut writer)?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Removes `path` if it exists.
pub fn remove_if_exists(path: &Path) -> std::io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_replace_file_creates_and_overwrites() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("nested").join("prefs");

        replace_file(&path, |w| w.write("a", "1")).expect("first write");
        assert_eq!(fs::read_to_string(&path).unwrap(), "a=1\n");

        replace_file(&path, |w| w.write("a", "2")).expect("second write");
        assert_eq!(fs::read_to_string(&path).unwrap(), "a=2\n");
    }

    #[test]
    fn test_failed_fill_keeps_original() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("prefs");
        replace_file(&path, |w| w.write("a", "1")).unwrap();

        let result = replace_file(&path, |w| {
            w.write("a", "partial")?;
            Err(std::io::Error::other("disk full"))
        });

        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "a=1\n");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_remove_if_exists() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("gone");

        assert!(!remove_if_exists(&path).unwrap());
        fs::write(&path, "x").unwrap();
        assert!(remove_if_exists(&path).unwrap());
        assert!(!path.exists());
    }
}
