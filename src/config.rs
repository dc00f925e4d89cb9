//! Configuration file support.
//!
//! Loaded in order (later overrides earlier), mirroring the teacher's
//! `config.rs`:
//! 1. `~/.config/bks/config.toml` (user defaults)
//! 2. `.bks.toml` in the index root (project overrides)
//!
//! CLI flags override both layers; this module only produces the merged
//! defaults a CLI binds its flags against.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Options loaded from config files. Every field is optional so a partial
/// file only overrides what it names.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default result count (overridden by `-n`).
    pub limit: Option<usize>,
    /// Extensions to restrict indexing/search to (overridden by `-t`).
    pub extensions: Option<Vec<String>>,
    /// Glob patterns always excluded (overridden/extended by `--exclude`).
    pub exclude: Option<Vec<String>>,
    /// Skip `markdown`/`text` blocks by default (overridden by `--code-only`).
    pub code_only: Option<bool>,
    /// Directory containing `model.onnx` + `tokenizer.json`, if not the
    /// platform default cache location.
    pub model_dir: Option<PathBuf>,
    /// Suppress progress output by default.
    pub quiet: Option<bool>,
    /// Enable verbose (debug-level) logging by default.
    pub verbose: Option<bool>,
}

impl Config {
    pub const DEFAULT_LIMIT: usize = 10;

    /// Load and merge the user and project config files for `index_root`.
    pub fn load(index_root: &Path) -> Self {
        let user_config = dirs::config_dir()
            .map(|d| d.join("bks/config.toml"))
            .and_then(|p| Self::load_file(&p))
            .unwrap_or_default();

        let project_config = Self::load_file(&index_root.join(".bks.toml")).unwrap_or_default();

        let merged = user_config.override_with(project_config);
        tracing::debug!(
            limit = ?merged.limit,
            extensions = ?merged.extensions,
            exclude = ?merged.exclude,
            code_only = ?merged.code_only,
            "effective config after merge"
        );
        merged
    }

    fn load_file(path: &Path) -> Option<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read config");
                return None;
            }
        };
        match toml::from_str::<Self>(&content) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "loaded config");
                Some(config)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to parse config");
                None
            }
        }
    }

    /// Layer `other` on top of `self` — `other`'s values win where present.
    fn override_with(self, other: Self) -> Self {
        let mut exclude = self.exclude.unwrap_or_default();
        if let Some(other_exclude) = other.exclude {
            exclude.extend(other_exclude);
        }
        Config {
            limit: other.limit.or(self.limit),
            extensions: other.extensions.or(self.extensions),
            exclude: if exclude.is_empty() { None } else { Some(exclude) },
            code_only: other.code_only.or(self.code_only),
            model_dir: other.model_dir.or(self.model_dir),
            quiet: other.quiet.or(self.quiet),
            verbose: other.verbose.or(self.verbose),
        }
    }

    pub fn limit_or_default(&self) -> usize {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT)
    }

    pub fn code_only_or_default(&self) -> bool {
        self.code_only.unwrap_or(false)
    }

    pub fn quiet_or_default(&self) -> bool {
        self.quiet.unwrap_or(false)
    }

    pub fn verbose_or_default(&self) -> bool {
        self.verbose.unwrap_or(false)
    }

    pub fn exclude_globs(&self) -> Vec<String> {
        self.exclude.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_files_produce_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config::load(dir.path());
        assert_eq!(config.limit_or_default(), Config::DEFAULT_LIMIT);
        assert!(!config.code_only_or_default());
    }

    #[test]
    fn project_config_overrides_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join(".bks.toml"), "limit = 25\ncode_only = true\n").unwrap();
        let config = Config::load(dir.path());
        assert_eq!(config.limit_or_default(), 25);
        assert!(config.code_only_or_default());
    }

    #[test]
    fn exclude_lists_accumulate_rather_than_replace() {
        let a = Config {
            exclude: Some(vec!["vendor/**".to_string()]),
            ..Default::default()
        };
        let b = Config {
            exclude: Some(vec!["*.gen.rs".to_string()]),
            ..Default::default()
        };
        let merged = a.override_with(b);
        assert_eq!(merged.exclude_globs().len(), 2);
    }

    #[test]
    fn malformed_config_file_is_ignored_not_fatal() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join(".bks.toml"), "limit = [this is not valid toml").unwrap();
        let config = Config::load(dir.path());
        assert_eq!(config.limit_or_default(), Config::DEFAULT_LIMIT);
    }
}
