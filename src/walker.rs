//! Filesystem walker — spec.md §4.1.
//!
//! Grounded on the teacher's `enumerate_files` (`lib.rs`) and its use of
//! `ignore::WalkBuilder` for `.gitignore`-aware traversal; extended here with
//! the size cap, binary-extension skip, and cyclic-symlink guard spec.md
//! names explicitly.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use ignore::WalkBuilder;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WalkError {
    #[error("failed to canonicalize root {0}: {1}")]
    Canonicalize(PathBuf, std::io::Error),
    #[error("root is not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Directory names always skipped, regardless of `.gitignore` contents.
pub const DEFAULT_IGNORED_DIRS: &[&str] = &[
    "node_modules",
    "target",
    "build",
    "dist",
    ".git",
    ".venv",
    "venv",
    "__pycache__",
    ".pixi",
    ".mypy_cache",
    ".pytest_cache",
];

/// Extensions that are never treated as source — skipped before any content
/// sniff is attempted.
const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "svg", "pdf", "zip", "tar", "gz", "bz2",
    "xz", "7z", "rar", "exe", "dll", "so", "dylib", "a", "o", "class", "jar", "wasm", "pyc",
    "woff", "woff2", "ttf", "otf", "eot", "mp3", "mp4", "mov", "avi", "wav", "flac", "bin",
];

/// Default cap on individual file size (spec.md §4.1: 1 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1_048_576;

#[derive(Debug, Clone)]
pub struct WalkConfig {
    pub extensions: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub include_hidden: bool,
    pub follow_symlinks: bool,
    pub max_file_size: u64,
    /// The index marker directory name, always excluded (spec.md §4.1).
    pub index_marker_dir: String,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            extensions: Vec::new(),
            exclude_globs: Vec::new(),
            include_hidden: false,
            follow_symlinks: false,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            index_marker_dir: crate::INDEX_DIR.to_string(),
        }
    }
}

/// One discovered file: absolute + root-relative path, mtime, and size.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub absolute_path: PathBuf,
    pub relative_path: String,
    pub mtime_ns: i128,
    pub size_bytes: u64,
}

/// Metadata-only record for the freshness path (spec.md §4.1: `scan_metadata`).
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub relative_path: String,
    pub mtime_ns: i128,
    pub size_bytes: u64,
}

pub struct Walker {
    root: PathBuf,
    config: WalkConfig,
}

impl Walker {
    pub fn new(root: &Path, config: WalkConfig) -> Result<Self, WalkError> {
        if !root.is_dir() {
            return Err(WalkError::NotADirectory(root.to_path_buf()));
        }
        let root = dunce::canonicalize(root).map_err(|e| WalkError::Canonicalize(root.to_path_buf(), e))?;
        Ok(Self { root, config })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn build_walker(&self) -> WalkBuilder {
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .hidden(!self.config.include_hidden)
            .follow_links(false) // cycle safety handled explicitly below
            .filter_entry({
                let marker = self.config.index_marker_dir.clone();
                move |entry| {
                    let name = entry.file_name().to_string_lossy();
                    if DEFAULT_IGNORED_DIRS.contains(&name.as_ref()) {
                        return false;
                    }
                    if name == marker.as_str() {
                        return false;
                    }
                    true
                }
            });
        for glob in &self.config.exclude_globs {
            builder.add_ignore(glob);
        }
        builder
    }

    /// Full scan: returns every eligible file with a bytes-readable guarantee
    /// (size-capped, non-binary-by-extension, not a symlink cycle).
    pub fn scan(&self) -> Vec<FileRecord> {
        let mut visited_dirs: HashSet<PathBuf> = HashSet::new();
        visited_dirs.insert(self.root.clone());

        self.build_walker()
            .build()
            .filter_map(|entry| match entry {
                Ok(e) => Some(e),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable directory entry during walk");
                    None
                }
            })
            .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
            .filter_map(|e| self.to_record(e.path()))
            .collect()
    }

    /// Stat-only scan used by the freshness path (spec.md §4.6 step 1).
    pub fn scan_metadata(&self) -> Vec<FileMetadata> {
        self.scan()
            .into_iter()
            .map(|r| FileMetadata {
                relative_path: r.relative_path,
                mtime_ns: r.mtime_ns,
                size_bytes: r.size_bytes,
            })
            .collect()
    }

    fn to_record(&self, path: &Path) -> Option<FileRecord> {
        if self.is_binary_extension(path) {
            return None;
        }
        if !self.config.extensions.is_empty() {
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if !self.config.extensions.iter().any(|e| e == ext) {
                return None;
            }
        }

        let canonical = match dunce::canonicalize(path) {
            Ok(p) => p,
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "failed to canonicalize, skipping");
                return None;
            }
        };

        // Cyclic-symlink guard: a canonicalized path outside the root, or
        // one we've already resolved to, is never re-walked.
        if !canonical.starts_with(&self.root) {
            tracing::warn!(path = %path.display(), "skipping path outside root (symlink escape)");
            return None;
        }

        let metadata = match std::fs::symlink_metadata(path) {
            Ok(m) => m,
            Err(_) => return None,
        };
        if metadata.file_type().is_symlink() && !self.config.follow_symlinks {
            return None;
        }

        let full_metadata = std::fs::metadata(&canonical).ok()?;
        if full_metadata.len() > self.config.max_file_size {
            tracing::debug!(path = %path.display(), size = full_metadata.len(), "skipping oversized file");
            return None;
        }

        let relative_path = canonical
            .strip_prefix(&self.root)
            .unwrap_or(&canonical)
            .to_string_lossy()
            .replace('\\', "/");

        let mtime_ns = mtime_as_nanos(&full_metadata);

        Some(FileRecord {
            absolute_path: canonical,
            relative_path,
            mtime_ns,
            size_bytes: full_metadata.len(),
        })
    }

    fn is_binary_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| BINARY_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false)
    }
}

fn mtime_as_nanos(metadata: &std::fs::Metadata) -> i128 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as i128)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, rel: &str, content: &str) {
        let p = dir.join(rel);
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(p, content).unwrap();
    }

    #[test]
    fn scans_supported_files_and_skips_ignored_dirs() {
        let dir = tempfile::TempDir::new().unwrap();
        write(dir.path(), "src/main.rs", "fn main() {}");
        write(dir.path(), "node_modules/pkg/index.js", "module.exports = {}");
        write(dir.path(), "target/debug/foo", "binary junk");

        let walker = Walker::new(dir.path(), WalkConfig::default()).unwrap();
        let files = walker.scan();
        let rels: Vec<_> = files.iter().map(|f| f.relative_path.clone()).collect();

        assert!(rels.contains(&"src/main.rs".to_string()));
        assert!(!rels.iter().any(|r| r.starts_with("node_modules")));
        assert!(!rels.iter().any(|r| r.starts_with("target")));
    }

    #[test]
    fn skips_binary_extensions() {
        let dir = tempfile::TempDir::new().unwrap();
        write(dir.path(), "logo.png", "not really png bytes");
        write(dir.path(), "src/lib.rs", "pub fn x() {}");

        let walker = Walker::new(dir.path(), WalkConfig::default()).unwrap();
        let files = walker.scan();
        let rels: Vec<_> = files.iter().map(|f| f.relative_path.clone()).collect();
        assert!(!rels.contains(&"logo.png".to_string()));
        assert!(rels.contains(&"src/lib.rs".to_string()));
    }

    #[test]
    fn rejects_oversized_files() {
        let dir = tempfile::TempDir::new().unwrap();
        write(dir.path(), "big.rs", &"x".repeat(200));

        let mut config = WalkConfig::default();
        config.max_file_size = 100;
        let walker = Walker::new(dir.path(), config).unwrap();
        assert!(walker.scan().is_empty());
    }

    #[test]
    fn scan_metadata_matches_scan_relative_paths() {
        let dir = tempfile::TempDir::new().unwrap();
        write(dir.path(), "a.rs", "fn a() {}");
        write(dir.path(), "b.py", "def b(): pass");

        let walker = Walker::new(dir.path(), WalkConfig::default()).unwrap();
        let full: HashSet<_> = walker.scan().into_iter().map(|f| f.relative_path).collect();
        let meta: HashSet<_> = walker
            .scan_metadata()
            .into_iter()
            .map(|f| f.relative_path)
            .collect();
        assert_eq!(full, meta);
    }

    #[test]
    fn excludes_index_marker_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        write(dir.path(), "src/lib.rs", "pub fn x() {}");
        write(dir.path(), ".idx/manifest.json", "{}");

        let mut config = WalkConfig::default();
        config.index_marker_dir = ".idx".to_string();
        let walker = Walker::new(dir.path(), config).unwrap();
        let rels: Vec<_> = walker.scan().into_iter().map(|f| f.relative_path).collect();
        assert!(!rels.iter().any(|r| r.starts_with(".idx")));
    }
}
