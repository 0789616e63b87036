use crate::config::types::{GraderError, Result};
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

fn symlink_metadata(path: &Path) -> Result<fs::Metadata> {
    fs::symlink_metadata(path).map_err(|e| {
        GraderError::Filesystem(format!("lstat failed for {}: {}", path.display(), e))
    })
}

fn remove_entry(path: &Path) -> Result<()> {
    fs::remove_file(path).map_err(|e| {
        GraderError::Filesystem(format!("unlink failed for {}: {}", path.display(), e))
    })
}

fn remove_dir_contents(dir: &Path, root_dev: u64) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| {
        GraderError::Filesystem(format!("read_dir failed for {}: {}", dir.display(), e))
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| {
            GraderError::Filesystem(format!("readdir failed in {}: {}", dir.display(), e))
        })?;
        let path = entry.path();
        let meta = symlink_metadata(&path)?;

        if meta.file_type().is_dir() {
            if meta.dev() != root_dev {
                return Err(GraderError::Filesystem(format!(
                    "Refusing to cross filesystem boundary at directory {}",
                    path.display()
                )));
            }
            remove_dir_contents(&path, root_dev)?;
            fs::remove_dir(&path).map_err(|e| {
                GraderError::Filesystem(format!("rmdir failed for {}: {}", path.display(), e))
            })?;
        } else {
            // Symlinks are unlinked, never followed
            remove_entry(&path)?;
        }
    }

    Ok(())
}

/// Remove a tree without following symlinks and without leaving the
/// filesystem the tree starts on. A missing path is not an error.
pub fn remove_tree_secure(path: &Path) -> Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(GraderError::Filesystem(format!(
                "lstat failed for {}: {}",
                path.display(),
                e
            )))
        }
    };

    if !meta.file_type().is_dir() {
        return remove_entry(path);
    }

    remove_dir_contents(path, meta.dev())?;
    fs::remove_dir(path).map_err(|e| {
        GraderError::Filesystem(format!("rmdir failed for {}: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removes_nested_tree() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        fs::write(root.join("a/file.txt"), b"x").unwrap();
        fs::write(root.join("a/b/c/deep.txt"), b"y").unwrap();

        remove_tree_secure(&root).unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn test_missing_path_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        remove_tree_secure(&dir.path().join("never-created")).unwrap();
    }

    #[test]
    fn test_does_not_follow_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("outside");
        fs::create_dir(&outside).unwrap();
        fs::write(outside.join("keep.txt"), b"keep").unwrap();

        let root = dir.path().join("root");
        fs::create_dir(&root).unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();

        remove_tree_secure(&root).unwrap();
        assert!(!root.exists());
        assert!(outside.join("keep.txt").exists());
    }
}
