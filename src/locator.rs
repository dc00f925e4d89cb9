//! Index locator — spec.md §4.1's "Index locator" row and §4.6 build steps
//! 1-2: walk upward from a target path to find a governing index, refuse to
//! build under one, and discover/merge subordinate indexes beneath a target.
//!
//! Grounded on the teacher's `resolve_index_dir`/project-root-by-marker walk
//! (`lib.rs`, `cli.rs::find_project_root`), generalized from "find one marker
//! going up" to the full parent-refusal + subordinate-discovery pair spec.md
//! names.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LocatorError {
    #[error("a governing index already exists at {at}", at = .at.display())]
    ParentIndexExists { at: PathBuf },
}

/// Returns the first ancestor of `start` (including `start` itself) whose
/// `<crate::INDEX_DIR>` directory exists, or `None` if the tree has no index.
pub fn find_governing_index(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        if has_own_index(dir) {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}

pub fn has_own_index(dir: &Path) -> bool {
    dir.join(crate::INDEX_DIR).is_dir()
}

/// Refuses a fresh `build` at `target` if any *strict* ancestor already owns
/// an index (spec.md §4.6 build step 1). `target` itself owning an index is
/// not a parent conflict — that's an ordinary rebuild.
pub fn ensure_no_parent_index(target: &Path) -> Result<(), LocatorError> {
    let mut current = target.parent();
    while let Some(dir) = current {
        if has_own_index(dir) {
            return Err(LocatorError::ParentIndexExists { at: dir.to_path_buf() });
        }
        current = dir.parent();
    }
    Ok(())
}

/// Finds every directory strictly beneath `root` that owns its own index,
/// without descending further once one is found — a subordinate index's own
/// contents are none of the parent's concern (spec.md §4.6 build step 2).
pub fn find_subordinate_indexes(root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut builder = WalkBuilder::new(root);
    builder
        .git_ignore(true)
        .hidden(false)
        .follow_links(false)
        .filter_entry(|entry| entry.file_name() != crate::INDEX_DIR);

    for entry in builder.build().filter_map(Result::ok) {
        let path = entry.path();
        if path == root {
            continue;
        }
        if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) && has_own_index(path) {
            found.push(path.to_path_buf());
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_governing_index_in_ancestor() {
        let dir = tempfile::TempDir::new().unwrap();
        let child = dir.path().join("src/nested");
        fs::create_dir_all(&child).unwrap();
        fs::create_dir(dir.path().join(crate::INDEX_DIR)).unwrap();

        let found = find_governing_index(&child).unwrap();
        assert_eq!(found, dir.path());
    }

    #[test]
    fn no_index_anywhere_returns_none() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(find_governing_index(dir.path()).is_none());
    }

    #[test]
    fn refuses_build_under_existing_parent() {
        let dir = tempfile::TempDir::new().unwrap();
        let child = dir.path().join("src");
        fs::create_dir_all(&child).unwrap();
        fs::create_dir(dir.path().join(crate::INDEX_DIR)).unwrap();

        let err = ensure_no_parent_index(&child).unwrap_err();
        match err {
            LocatorError::ParentIndexExists { at } => assert_eq!(at, dir.path()),
        }
    }

    #[test]
    fn owning_own_index_is_not_a_parent_conflict() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::create_dir(dir.path().join(crate::INDEX_DIR)).unwrap();
        assert!(ensure_no_parent_index(dir.path()).is_ok());
    }

    #[test]
    fn discovers_subordinate_indexes_and_stops_descending() {
        let dir = tempfile::TempDir::new().unwrap();
        let sub = dir.path().join("vendor/lib");
        fs::create_dir_all(&sub).unwrap();
        fs::create_dir(sub.join(crate::INDEX_DIR)).unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();

        let found = find_subordinate_indexes(dir.path());
        assert_eq!(found, vec![sub]);
    }
}
