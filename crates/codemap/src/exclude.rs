//! Exclusion rules: built-in defaults plus the project ignore file

use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::pattern::Pattern;

/// Patterns that always apply, regardless of project configuration.
///
/// codemap's own index and ignore files are added by [`ExclusionPatterns::compute`]
/// under their configured names.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    // VCS
    ".git/",
    ".hg/",
    ".svn/",
    // Dependencies and build output
    "node_modules/",
    "target/",
    "dist/",
    "__pycache__/",
    ".venv/",
    "venv/",
    ".next/",
    ".cache/",
    "coverage/",
    // Backup and editor files
    "*.bak",
    "*.orig",
    "*.swp",
    "*~",
];

/// Ordered, immutable set of exclusion patterns.
///
/// Order never changes the outcome: a path is excluded if any pattern matches.
#[derive(Debug, Clone)]
pub struct ExclusionPatterns {
    raw: Vec<String>,
    compiled: Vec<Pattern>,
    fingerprint: String,
}

impl ExclusionPatterns {
    /// Build a set from raw pattern lines
    pub fn new(raw: Vec<String>) -> Self {
        let compiled = raw.iter().map(|p| Pattern::parse(p)).collect();

        let mut hasher = Sha256::new();
        for pattern in &raw {
            hasher.update(pattern.as_bytes());
            hasher.update(b"\n");
        }
        let fingerprint = hex::encode(&hasher.finalize()[..8]);

        Self {
            raw,
            compiled,
            fingerprint,
        }
    }

    /// codemap's own files, defaults, then `extra`, then the project ignore
    /// file if one exists.
    ///
    /// A missing or unreadable ignore file leaves the defaults in place.
    pub fn compute(
        project_root: &Path,
        index_filename: &str,
        ignore_filename: &str,
        extra: &[String],
    ) -> Self {
        let mut raw = vec![index_filename.to_string()];
        if ignore_filename != index_filename {
            raw.push(ignore_filename.to_string());
        }
        raw.extend(DEFAULT_EXCLUDES.iter().map(|s| s.to_string()));
        raw.extend(extra.iter().cloned());

        let ignore_file = project_root.join(ignore_filename);
        if ignore_file.is_file() {
            match std::fs::read_to_string(&ignore_file) {
                Ok(content) => {
                    let before = raw.len();
                    raw.extend(parse_ignore_file(&content));
                    debug!(
                        file = %ignore_file.display(),
                        patterns = raw.len() - before,
                        "loaded project excludes"
                    );
                }
                Err(err) => {
                    warn!(file = %ignore_file.display(), error = %err, "could not read ignore file");
                }
            }
        }

        Self::new(raw)
    }

    /// True if any pattern matches `path`
    pub fn is_excluded(&self, path: &str) -> bool {
        self.compiled.iter().any(|p| p.matches(path))
    }

    pub fn patterns(&self) -> &[String] {
        &self.raw
    }

    /// Content hash of the pattern list, stable across instances
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

/// Non-comment, non-blank lines, trimmed
fn parse_ignore_file(content: &str) -> impl Iterator<Item = String> + '_ {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
}
