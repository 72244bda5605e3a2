use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Marker left in a directory once all its files were handled
pub const CHECKPOINT_FILENAME: &str = ".processed_marker";

pub fn is_completed(dir: &Path) -> bool {
    dir.join(CHECKPOINT_FILENAME).is_file()
}

pub fn mark_completed(dir: &Path) -> Result<()> {
    let marker = dir.join(CHECKPOINT_FILENAME);
    fs::write(&marker, "processed\n")
        .with_context(|| format!("Failed to write checkpoint {}", marker.display()))
}

/// Remove every marker under `root`; returns how many were deleted
pub fn cleanup(root: &Path) -> usize {
    let mut removed = 0;

    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if entry.file_type().is_file() && entry.file_name() == CHECKPOINT_FILENAME {
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Failed to remove {}: {}", entry.path().display(), e),
            }
        }
    }

    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_and_cleanup() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("2013 Trip").join("Day 1");
        fs::create_dir_all(&nested).unwrap();

        assert!(!is_completed(&nested));
        mark_completed(&nested).unwrap();
        mark_completed(&root.path().join("2013 Trip")).unwrap();
        assert!(is_completed(&nested));

        assert_eq!(cleanup(root.path()), 2);
        assert!(!is_completed(&nested));
        assert_eq!(cleanup(root.path()), 0);
    }
}
