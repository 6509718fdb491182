//! Glob-like exclusion patterns
//!
//! Supports the subset of gitignore syntax that index exclusion needs:
//! - `/name` anchors the pattern to the project root
//! - `name/` matches a directory anywhere in the tree
//! - `**` matches across path separators, `*` stays within one segment
//! - plain names match the full path, a path suffix, or the base name

use glob::MatchOptions;
use regex::Regex;

const SEGMENT_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A single exclusion pattern, compiled once
#[derive(Debug, Clone)]
pub enum Pattern {
    /// `build/`, `/target/`
    Directory { name: String, anchored: bool },
    /// `src/**/gen/*.rs`
    DoubleStar(Regex),
    /// `*.bak`, `docs/*.md`
    SingleStar { glob: glob::Pattern, anchored: bool },
    /// `Cargo.lock`, `src/main.rs`
    Literal { text: String, anchored: bool },
    /// Empty or uncompilable input, never matches
    Never,
}

impl Pattern {
    /// Compile a raw pattern line
    pub fn parse(raw: &str) -> Self {
        let (body, anchored) = match raw.strip_prefix('/') {
            Some(rest) => (rest, true),
            None => (raw, false),
        };

        if body.is_empty() {
            return Self::Never;
        }

        if let Some(dir) = body.strip_suffix('/') {
            if dir.is_empty() {
                return Self::Never;
            }
            return Self::Directory {
                name: dir.to_string(),
                anchored,
            };
        }

        if body.contains("**") {
            return Regex::new(&double_star_regex(body))
                .map(Self::DoubleStar)
                .unwrap_or(Self::Never);
        }

        if body.contains('*') {
            return glob::Pattern::new(body)
                .map(|glob| Self::SingleStar { glob, anchored })
                .unwrap_or(Self::Never);
        }

        Self::Literal {
            text: body.to_string(),
            anchored,
        }
    }

    /// Test a project-relative path against this pattern
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Directory { name, anchored } => {
                path == name
                    || path.starts_with(&format!("{name}/"))
                    || (!anchored && path.contains(&format!("/{name}/")))
            }
            Self::DoubleStar(re) => re.is_match(path),
            Self::SingleStar { glob, anchored } => {
                glob.matches_with(path, SEGMENT_OPTIONS)
                    || (!anchored && glob.matches_with(basename(path), SEGMENT_OPTIONS))
            }
            Self::Literal { text, anchored } => {
                path == text
                    || (!anchored
                        && (path.ends_with(&format!("/{text}")) || basename(path) == text))
            }
            Self::Never => false,
        }
    }
}

/// Match `path` against a single raw pattern
pub fn matches(path: &str, pattern: &str) -> bool {
    Pattern::parse(pattern).matches(path)
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Translate a `**` pattern into an anchored regex.
///
/// `**/` may match zero directories so `**/x` also hits a top-level `x`.
fn double_star_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    out.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
            }
            '*' => {
                out.push_str("[^/]*");
                i += 1;
            }
            c => {
                out.push_str(&regex::escape(&c.to_string()));
                i += 1;
            }
        }
    }

    out.push('$');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_directory_pattern() {
        assert!(matches("build", "build/"));
        assert!(matches("build/out.js", "build/"));
        assert!(matches("packages/web/build/out.js", "build/"));
        assert!(!matches("rebuild/out.js", "build/"));
        assert!(!matches("src/builder.rs", "build/"));
    }

    #[test]
    fn test_anchored_patterns() {
        assert!(matches("target/debug/app", "/target/"));
        assert!(!matches("crates/x/target/debug/app", "/target/"));
        assert!(matches("TODO.md", "/TODO.md"));
        assert!(!matches("docs/TODO.md", "/TODO.md"));
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        assert!(matches("docs/a.md", "docs/*.md"));
        assert!(!matches("docs/deep/a.md", "docs/*.md"));
    }

    #[test]
    fn test_single_star_falls_back_to_basename() {
        assert!(matches("notes.bak", "*.bak"));
        assert!(matches("src/deep/file.rs.bak", "*.bak"));
        assert!(!matches("src/file.rs", "*.bak"));
    }

    #[test]
    fn test_double_star() {
        assert!(matches("src/a/b/gen/x.rs", "src/**/gen/*.rs"));
        assert!(matches("src/gen/x.rs", "src/**/gen/*.rs"));
        assert!(!matches("src/gen/sub/x.rs", "src/**/gen/*.rs"));
        assert!(matches("deep/path/file.min.js", "**/*.min.js"));
        assert!(matches("file.min.js", "**/*.min.js"));
        assert!(matches("vendor/anything/at/all", "vendor/**"));
    }

    #[test]
    fn test_literal_pattern() {
        assert!(matches("Cargo.lock", "Cargo.lock"));
        assert!(matches("crates/a/Cargo.lock", "Cargo.lock"));
        assert!(matches("src/gen/schema.rs", "gen/schema.rs"));
        assert!(!matches("src/regen/schema.rs", "gen/schema.rs"));
        assert!(!matches("Cargo.lock.old", "Cargo.lock"));
    }

    #[test]
    fn test_degenerate_patterns_never_match() {
        assert!(!matches("a", ""));
        assert!(!matches("a", "/"));
        assert!(!matches("a/b", "//"));
        assert!(!matches("[abc", "[*"));
    }

    proptest! {
        #[test]
        fn prop_exact_path_matches_itself(path in "[a-z]{1,8}(/[a-z]{1,8}){0,3}\\.[a-z]{1,3}") {
            prop_assert!(matches(&path, &path));
        }

        #[test]
        fn prop_basename_matches_anywhere(dirs in "([a-z]{1,6}/){0,4}", name in "[a-z]{1,8}\\.[a-z]{2}") {
            let path = format!("{dirs}{name}");
            prop_assert!(matches(&path, &name));
        }

        #[test]
        fn prop_directory_matches_every_descendant(
            prefix in "([a-z]{1,6}/){0,3}",
            dir in "[a-z]{1,8}",
            rest in "[a-z]{1,6}(/[a-z]{1,6}){0,2}",
        ) {
            let path = format!("{prefix}{dir}/{rest}");
            let pattern = format!("{dir}/");
            prop_assert!(matches(&path, &pattern));
        }

        #[test]
        fn prop_single_star_extension(dirs in "([a-z]{1,6}/){0,4}", stem in "[a-z]{1,8}", ext in "[a-z]{2,3}") {
            let path = format!("{dirs}{stem}.{ext}");
            let pattern = format!("*.{ext}");
            let longer = format!("*.{ext}x");
            prop_assert!(matches(&path, &pattern));
            prop_assert!(!matches(&path, &longer));
        }

        #[test]
        fn prop_double_star_under_root(root in "[a-z]{1,6}", rest in "[a-z]{1,6}(/[a-z]{1,6}){0,4}") {
            let path = format!("{root}/{rest}");
            let pattern = format!("{root}/**");
            prop_assert!(matches(&path, &pattern));
            let other = format!("x{root}/**");
            prop_assert!(!matches(&path, &other));
        }
    }
}
