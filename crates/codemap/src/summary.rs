//! File and directory summaries

use std::collections::BTreeMap;
use std::io::{self, Write};

use serde::Serialize;

use crate::exclude::ExclusionPatterns;
use crate::graph::DerivedGraph;
use crate::index::IndexDocument;

/// Documentation lines included in a file summary
const DOC_PREVIEW_LINES: usize = 10;
/// Files listed per category in a directory summary
const CATEGORY_SAMPLE: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct SymbolSummary {
    pub name: String,
    pub line: u32,
    pub signature: String,
    pub return_type: String,
    pub callers: usize,
    pub callees: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileSummary {
    pub path: String,
    pub language: String,
    pub symbols: Vec<SymbolSummary>,
    pub imports: Vec<String>,
    pub docs: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CategorySample {
    pub count: usize,
    pub sample: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectorySummary {
    pub prefix: String,
    /// Files anywhere below the prefix
    pub total_files: usize,
    /// Files directly inside the prefix, bucketed by name
    pub categories: BTreeMap<&'static str, CategorySample>,
    /// Immediate subdirectories with their file counts
    pub subdirectories: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Summary {
    File(FileSummary),
    Directory(DirectorySummary),
    Empty { path: String },
}

/// Summarize an indexed file, or `None` if `path` isn't one or is excluded.
///
/// Imports come from the derived graph, so they follow the same exclusion
/// rules as `imports` and `importers`.
pub fn summarize_file(
    doc: &IndexDocument,
    graph: &DerivedGraph,
    patterns: &ExclusionPatterns,
    path: &str,
) -> Option<FileSummary> {
    if patterns.is_excluded(path) {
        return None;
    }
    let entry = doc.files.get(path)?;

    let symbols = entry
        .symbols
        .iter()
        .map(|sym| SymbolSummary {
            name: sym.name.clone(),
            line: sym.line,
            signature: sym.signature.clone(),
            return_type: sym.return_type.clone(),
            callers: graph.callers(&sym.name).len(),
            callees: graph.callees(&sym.name).len(),
        })
        .collect();

    Some(FileSummary {
        path: path.to_string(),
        language: entry.language.clone(),
        symbols,
        imports: graph.file_imports.get(path).cloned().unwrap_or_default(),
        docs: doc
            .docs
            .get(path)
            .map(|lines| lines.iter().take(DOC_PREVIEW_LINES).cloned().collect())
            .unwrap_or_default(),
    })
}

/// Bucket the files directly under `prefix`.
///
/// Deeper files only count toward `total_files` and their subdirectory.
/// Returns `None` when nothing lives under the prefix.
pub fn summarize_directory<'a, I>(files: I, prefix: &str) -> Option<DirectorySummary>
where
    I: IntoIterator<Item = &'a str>,
{
    let prefix = normalize_prefix(prefix);
    let mut summary = DirectorySummary {
        prefix: prefix.clone(),
        total_files: 0,
        categories: BTreeMap::new(),
        subdirectories: BTreeMap::new(),
    };

    for path in files {
        let rest = if prefix.is_empty() {
            path
        } else {
            match path.strip_prefix(&prefix).and_then(|r| r.strip_prefix('/')) {
                Some(rest) => rest,
                None => continue,
            }
        };

        summary.total_files += 1;
        match rest.split_once('/') {
            Some((dir, _)) => *summary.subdirectories.entry(dir.to_string()).or_default() += 1,
            None => {
                let bucket = summary.categories.entry(categorize(rest)).or_default();
                bucket.count += 1;
                if bucket.sample.len() < CATEGORY_SAMPLE {
                    bucket.sample.push(rest.to_string());
                }
            }
        }
    }

    (summary.total_files > 0).then_some(summary)
}

/// File summary when `path` is indexed, else directory summary, else empty
pub fn summarize<'a, I>(
    doc: &IndexDocument,
    graph: &DerivedGraph,
    patterns: &ExclusionPatterns,
    files: I,
    path: &str,
) -> Summary
where
    I: IntoIterator<Item = &'a str>,
{
    let normalized = normalize_prefix(path);
    if let Some(file) = summarize_file(doc, graph, patterns, &normalized) {
        return Summary::File(file);
    }
    match summarize_directory(files, &normalized) {
        Some(dir) => Summary::Directory(dir),
        None => Summary::Empty { path: normalized },
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim();
    let trimmed = trimmed.strip_prefix("./").unwrap_or(trimmed);
    let trimmed = trimmed.trim_end_matches('/');
    if trimmed == "." {
        String::new()
    } else {
        trimmed.to_string()
    }
}

/// Name-based bucket for a file
pub fn categorize(filename: &str) -> &'static str {
    let name = filename.to_lowercase();
    let ext = name.rsplit_once('.').map(|(_, e)| e).unwrap_or("");

    if is_test_file(&name) {
        "test"
    } else if matches!(ext, "md" | "mdx" | "rst" | "txt" | "adoc") {
        "doc"
    } else if name.starts_with("page.") || name.contains(".page.") {
        "page"
    } else if name.starts_with("layout.") || name.contains(".layout.") {
        "layout"
    } else if name.starts_with("route") || name.starts_with("router") || name.contains(".route.") {
        "route"
    } else if matches!(ext, "tsx" | "jsx" | "vue" | "svelte") {
        "component"
    } else {
        "other"
    }
}

/// Heuristic test-file detection on a path or filename
pub fn is_test_file(path: &str) -> bool {
    let lower = path.to_lowercase();
    let name = lower.rsplit('/').next().unwrap_or(&lower);
    let stem = name.split('.').next().unwrap_or(name);

    name.contains(".test.")
        || name.contains(".spec.")
        || stem.starts_with("test_")
        || stem.ends_with("_test")
        || stem.ends_with("_spec")
        || lower.split('/').any(|seg| matches!(seg, "test" | "tests" | "__tests__" | "spec"))
}

impl FileSummary {
    pub fn write_text(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "{} ({})", self.path, self.language)?;

        writeln!(out, "Symbols ({}):", self.symbols.len())?;
        if self.symbols.is_empty() {
            writeln!(out, "  (none)")?;
        }
        for sym in &self.symbols {
            let ret = if sym.return_type.is_empty() {
                String::new()
            } else {
                format!(" -> {}", sym.return_type)
            };
            writeln!(
                out,
                "  {}:{} {}{}  [{} callers, {} callees]",
                sym.name, sym.line, sym.signature, ret, sym.callers, sym.callees
            )?;
        }

        if !self.imports.is_empty() {
            writeln!(out, "Imports ({}):", self.imports.len())?;
            for module in &self.imports {
                writeln!(out, "  -> {}", module)?;
            }
        }

        if !self.docs.is_empty() {
            writeln!(out, "Docs:")?;
            for line in &self.docs {
                writeln!(out, "  {}", line)?;
            }
        }
        Ok(())
    }
}

impl DirectorySummary {
    pub fn write_text(&self, out: &mut dyn Write) -> io::Result<()> {
        let label = if self.prefix.is_empty() { "." } else { &self.prefix };
        writeln!(out, "{}/ ({} files)", label, self.total_files)?;

        for (category, bucket) in &self.categories {
            writeln!(out, "  {} ({}):", category, bucket.count)?;
            for name in &bucket.sample {
                writeln!(out, "    {}", name)?;
            }
            if bucket.count > bucket.sample.len() {
                writeln!(out, "    ... and {} more", bucket.count - bucket.sample.len())?;
            }
        }

        if !self.subdirectories.is_empty() {
            writeln!(out, "  subdirectories:")?;
            for (dir, count) in &self.subdirectories {
                writeln!(out, "    {}/ ({})", dir, count)?;
            }
        }
        Ok(())
    }
}

impl Summary {
    pub fn write_text(&self, out: &mut dyn Write) -> io::Result<()> {
        match self {
            Self::File(file) => file.write_text(out),
            Self::Directory(dir) => dir.write_text(out),
            Self::Empty { path } => writeln!(out, "No indexed file or directory matches '{}'", path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> (IndexDocument, DerivedGraph) {
        let doc = IndexDocument::from_json(
            &json!({
                "files": {
                    "src/api.ts": ["ts", ["handle:3:(req: Req):Res:parse", "parse:9:(s)::"]],
                    "src/util.ts": ["ts", ["helper:1::"]]
                },
                "deps": {"src/api.ts": ["./util", "express"]},
                "docs": {"src/api.ts": ["HTTP handlers", "Second line"]},
                "edges": [["handle", "parse"], ["main", "handle"], ["handle", "helper"]]
            })
            .to_string(),
        )
        .unwrap();
        let graph = DerivedGraph::derive(&doc, &ExclusionPatterns::new(Vec::new()));
        (doc, graph)
    }

    #[test]
    fn test_file_summary_counts_edges() {
        let (doc, graph) = fixture();
        let summary = summarize_file(&doc, &graph, &ExclusionPatterns::new(Vec::new()), "src/api.ts").unwrap();

        assert_eq!(summary.language, "ts");
        assert_eq!(summary.symbols[0].name, "handle");
        assert_eq!(summary.symbols[0].callers, 1);
        assert_eq!(summary.symbols[0].callees, 2);
        assert_eq!(summary.symbols[1].callers, 1);
        assert_eq!(summary.imports, vec!["./util", "express"]);
        assert_eq!(summary.docs, vec!["HTTP handlers", "Second line"]);
    }

    #[test]
    fn test_file_summary_text() {
        let (doc, graph) = fixture();
        let summary = summarize_file(&doc, &graph, &ExclusionPatterns::new(Vec::new()), "src/api.ts").unwrap();
        let mut out = Vec::new();
        summary.write_text(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("src/api.ts (ts)\n"));
        assert!(text.contains("  handle:3 (req: Req) -> Res  [1 callers, 2 callees]\n"));
        assert!(text.contains("  -> express\n"));
        assert!(text.contains("Docs:\n  HTTP handlers\n"));
    }

    #[test]
    fn test_directory_buckets_only_immediate_files() {
        let files = [
            "app/page.tsx",
            "app/layout.tsx",
            "app/Button.tsx",
            "app/README.md",
            "app/api.test.ts",
            "app/routes.ts",
            "app/config.json",
            "app/admin/page.tsx",
            "app/admin/users/page.tsx",
            "lib/other.ts",
        ];
        let summary = summarize_directory(files, "app").unwrap();

        assert_eq!(summary.total_files, 9);
        assert_eq!(summary.categories["page"].count, 1);
        assert_eq!(summary.categories["layout"].count, 1);
        assert_eq!(summary.categories["component"].sample, vec!["Button.tsx"]);
        assert_eq!(summary.categories["doc"].count, 1);
        assert_eq!(summary.categories["test"].count, 1);
        assert_eq!(summary.categories["route"].count, 1);
        assert_eq!(summary.categories["other"].count, 1);
        assert_eq!(summary.subdirectories["admin"], 2);
    }

    #[test]
    fn test_category_sample_is_capped() {
        let files: Vec<String> = (0..8).map(|i| format!("src/mod{i}.rs")).collect();
        let summary = summarize_directory(files.iter().map(String::as_str), "src/").unwrap();
        let other = &summary.categories["other"];

        assert_eq!(other.count, 8);
        assert_eq!(other.sample.len(), CATEGORY_SAMPLE);
    }

    #[test]
    fn test_root_prefix() {
        let summary = summarize_directory(["main.rs", "src/lib.rs"], ".").unwrap();
        assert_eq!(summary.total_files, 2);
        assert_eq!(summary.subdirectories["src"], 1);
    }

    #[test]
    fn test_unknown_path_is_empty() {
        let (doc, graph) = fixture();
        let files: Vec<&str> = doc.files.keys().map(String::as_str).collect();
        let summary = summarize(&doc, &graph, &ExclusionPatterns::new(Vec::new()), files, "nowhere/");

        assert!(matches!(summary, Summary::Empty { ref path } if path == "nowhere"));
    }

    #[test]
    fn test_excluded_file_has_no_summary() {
        let (doc, _) = fixture();
        let patterns = ExclusionPatterns::new(vec!["src/".to_string()]);
        let graph = DerivedGraph::derive(&doc, &patterns);

        assert!(summarize_file(&doc, &graph, &patterns, "src/api.ts").is_none());
        let files: Vec<&str> = Vec::new();
        let summary = summarize(&doc, &graph, &patterns, files, "src/api.ts");
        assert!(matches!(summary, Summary::Empty { ref path } if path == "src/api.ts"));
    }

    #[test]
    fn test_imports_follow_graph_exclusions() {
        let (doc, _) = fixture();
        let patterns = ExclusionPatterns::new(vec!["src/util.ts".to_string()]);
        let graph = DerivedGraph::derive(&doc, &patterns);
        let summary = summarize_file(&doc, &graph, &patterns, "src/api.ts").unwrap();

        assert_eq!(summary.imports, graph.file_imports["src/api.ts"]);
    }

    #[test]
    fn test_prefix_must_match_whole_segment() {
        assert!(summarize_directory(["srcgen/a.rs"], "src").is_none());
    }

    #[test]
    fn test_test_file_heuristics() {
        assert!(is_test_file("src/api.test.ts"));
        assert!(is_test_file("tests/e2e.rs"));
        assert!(is_test_file("pkg/handler_test.go"));
        assert!(is_test_file("test_models.py"));
        assert!(!is_test_file("src/testing_utils.rs"));
        assert!(!is_test_file("src/contest.rs"));
    }
}
