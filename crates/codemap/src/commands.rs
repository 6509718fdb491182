//! Command handlers
//!
//! Each handler writes its result to `out`, either as text or as pretty JSON.
//! A missing positional argument prints a usage line to `err` and is not an
//! error.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};

use crate::cli::Commands;
use crate::format::{relative_time, truncate};
use crate::graph::DerivedGraph;
use crate::index::IndexDocument;
use crate::store::Project;
use crate::summary::{self, is_test_file};
use crate::tree::DirTreeNode;

/// Entries in each ranking shown by `metrics`
const TOP_N: usize = 10;
/// Entries in each ranking shown by `report`
const REPORT_TOP_N: usize = 5;
/// Signatures longer than this are cut in list output
const SIGNATURE_WIDTH: usize = 80;
/// File stems that are entry points, never "unreferenced"
const ENTRY_STEMS: &[&str] = &["main", "index", "lib", "mod", "__init__", "__main__", "app"];

/// Run `command` against `project`
pub fn run(
    command: &Commands,
    project: &Project,
    json: bool,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<()> {
    let query = Query { project, json };

    match command {
        Commands::Stats => query.stats(out),
        Commands::Tree { max_depth, files } => query.tree(*max_depth, *files, out),
        Commands::Search { term, regex, limit } => match term.as_deref() {
            Some(term) => query.search(term, *regex, *limit, out, err),
            None => usage(err, "search <term> [--regex] [-l N]"),
        },
        Commands::Callers { function, limit } => match function.as_deref() {
            Some(name) => query.neighbours(name, Direction::Callers, *limit, out),
            None => usage(err, "callers <function> [-l N]"),
        },
        Commands::Callees { function, limit } => match function.as_deref() {
            Some(name) => query.neighbours(name, Direction::Callees, *limit, out),
            None => usage(err, "callees <function> [-l N]"),
        },
        Commands::Trace { from, to } => match (from.as_deref(), to.as_deref()) {
            (Some(from), Some(to)) => query.trace(from, to, out),
            _ => usage(err, "trace <from> <to>"),
        },
        Commands::Dead { limit } => query.dead(*limit, out),
        Commands::Imports { file } => match file.as_deref() {
            Some(file) => query.imports(file, out),
            None => usage(err, "imports <file>"),
        },
        Commands::Importers { module, limit } => match module.as_deref() {
            Some(module) => query.importers(module, *limit, out),
            None => usage(err, "importers <module> [-l N]"),
        },
        Commands::Metrics => query.metrics(out),
        Commands::Summarize { path } => match path.as_deref() {
            Some(path) => query.summarize(path, out),
            None => usage(err, "summarize <path>"),
        },
        Commands::Investigate { terms, limit } => {
            if terms.is_empty() {
                usage(err, "investigate <term>... [-l N]")
            } else {
                query.investigate(terms, *limit, out)
            }
        }
        Commands::Debug { target } => match target.as_deref() {
            Some(target) => query.debug(target, out),
            None => usage(err, "debug <function|file>"),
        },
        Commands::Sanitize { limit, tests } => query.sanitize(*limit, *tests, out),
        Commands::Docs { target, limit } => match target.as_deref() {
            Some(target) => query.docs(target, *limit, out),
            None => usage(err, "docs <term|file> [-l N]"),
        },
        Commands::Report { focus } => query.report(focus.as_deref(), out),
    }
}

fn usage(err: &mut dyn Write, args: &str) -> Result<()> {
    writeln!(err, "Usage: codemap {}", args)?;
    Ok(())
}

fn write_json(out: &mut dyn Write, value: &impl Serialize) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Keep the first `limit` items; returns them with the count dropped
fn limited<T>(mut items: Vec<T>, limit: usize) -> (Vec<T>, usize) {
    let rest = items.len().saturating_sub(limit);
    items.truncate(limit);
    (items, rest)
}

fn write_more(out: &mut dyn Write, rest: usize) -> Result<()> {
    if rest > 0 {
        writeln!(out, "  ... and {} more (use -l to show more)", rest)?;
    }
    Ok(())
}

/// Highest count first, ties by name
fn ranked<'a, I>(items: I, n: usize) -> Vec<(&'a str, usize)>
where
    I: IntoIterator<Item = (&'a str, usize)>,
{
    let mut items: Vec<_> = items.into_iter().collect();
    items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    items.truncate(n);
    items
}

fn write_ranked(out: &mut dyn Write, title: &str, items: &[(&str, usize)]) -> Result<()> {
    writeln!(out, "{}:", title)?;
    if items.is_empty() {
        writeln!(out, "  (none)")?;
    }
    for (name, count) in items {
        writeln!(out, "  {:>5}  {}", count, name)?;
    }
    Ok(())
}

fn clean_path(path: &str) -> &str {
    let path = path.trim();
    let path = path.strip_prefix("./").unwrap_or(path);
    path.trim_end_matches('/')
}

/// Filename without its last extension
fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

/// Whether an import specifier plausibly names a file with this stem
fn references(specifier: &str, stem: &str) -> bool {
    if stem.is_empty() {
        return false;
    }
    let last = specifier.rsplit('/').next().unwrap_or(specifier);
    last == stem || file_stem(last) == stem || specifier.ends_with(&format!(".{}", stem))
}

fn index_age(path: &Path) -> Option<String> {
    let modified = std::fs::metadata(path).and_then(|meta| meta.modified()).ok()?;
    Some(relative_time(DateTime::<Utc>::from(modified)))
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Callers,
    Callees,
}

enum NameMatcher {
    Substring(String),
    Pattern(Regex),
}

impl NameMatcher {
    fn is_match(&self, text: &str) -> bool {
        match self {
            Self::Substring(needle) => text.to_lowercase().contains(needle),
            Self::Pattern(re) => re.is_match(text),
        }
    }
}

#[derive(Serialize)]
struct SymbolHit<'a> {
    name: &'a str,
    file: &'a str,
    line: u32,
    signature: &'a str,
}

#[derive(Serialize)]
struct SymbolMatch<'a> {
    name: &'a str,
    files: Vec<&'a str>,
    callers: usize,
    callees: usize,
}

#[derive(Serialize)]
struct DocMatch<'a> {
    file: &'a str,
    line: &'a str,
}

#[derive(Serialize)]
struct Finding<'a> {
    term: &'a str,
    symbols: Vec<SymbolMatch<'a>>,
    total_symbols: usize,
    files: Vec<&'a str>,
    total_files: usize,
    docs: Vec<DocMatch<'a>>,
    total_docs: usize,
}

#[derive(Serialize)]
struct Definition<'a> {
    file: &'a str,
    line: u32,
    signature: &'a str,
    return_type: &'a str,
}

struct Query<'a> {
    project: &'a Project,
    json: bool,
}

impl<'a> Query<'a> {
    fn doc(&self) -> &'a IndexDocument {
        &self.project.document
    }

    fn graph(&self) -> &'a DerivedGraph {
        &self.project.graph
    }

    fn is_visible(&self, path: &str) -> bool {
        !self.project.patterns.is_excluded(path)
    }

    fn language_counts<I>(&self, files: I) -> BTreeMap<&'a str, usize>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut counts = BTreeMap::new();
        for path in files {
            if let Some(entry) = self.doc().files.get(path) {
                *counts.entry(entry.language.as_str()).or_default() += 1;
            }
        }
        counts
    }

    fn stats(&self, out: &mut dyn Write) -> Result<()> {
        let doc = self.doc();
        let graph = self.graph();
        let files: Vec<&str> = self.project.visible_files().collect();
        let languages = self.language_counts(files.iter().copied());
        let import_edges: usize = graph.file_imports.values().map(Vec::len).sum();
        let age = index_age(&self.project.index_path);
        let index = self.project.index_path.display().to_string();

        if self.json {
            return write_json(
                out,
                &json!({
                    "index": index,
                    "updated": age,
                    "stats": doc.stats,
                    "derived": {
                        "files": files.len(),
                        "symbols": graph.symbol_to_files.len(),
                        "symbol_records": doc.symbol_count(),
                        "call_edges": doc.edges.len(),
                        "import_edges": import_edges,
                        "languages": languages,
                        "skipped_records": doc.skipped_records,
                    },
                }),
            );
        }

        writeln!(out, "Index: {}", index)?;
        if let Some(age) = &age {
            writeln!(out, "Updated: {}", age)?;
        }
        writeln!(out, "{}", "=".repeat(40))?;
        writeln!(out, "Files: {}", files.len())?;
        writeln!(out, "Symbols: {}", graph.symbol_to_files.len())?;
        writeln!(out, "Symbol records: {}", doc.symbol_count())?;
        writeln!(out, "Call edges: {}", doc.edges.len())?;
        writeln!(out, "Import edges: {}", import_edges)?;
        if doc.skipped_records > 0 {
            writeln!(out, "Skipped records: {}", doc.skipped_records)?;
        }

        if !languages.is_empty() {
            writeln!(out)?;
            write_ranked(out, "Languages", &ranked(languages, usize::MAX))?;
        }

        if let Value::Object(map) = &doc.stats {
            if !map.is_empty() {
                writeln!(out)?;
                writeln!(out, "Index stats:")?;
                for (key, value) in map {
                    writeln!(out, "  {}: {}", key, display_value(value))?;
                }
            }
        }
        Ok(())
    }

    fn tree(&self, max_depth: usize, include_files: bool, out: &mut dyn Write) -> Result<()> {
        let tree = DirTreeNode::build(self.project.visible_files());
        if self.json {
            return write_json(out, &tree.to_json(Some(max_depth), include_files));
        }
        out.write_all(tree.render("", Some(max_depth), include_files).as_bytes())?;
        Ok(())
    }

    fn search(
        &self,
        term: &str,
        regex: bool,
        limit: usize,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> Result<()> {
        let matcher = if regex {
            match Regex::new(term) {
                Ok(re) => NameMatcher::Pattern(re),
                Err(e) => {
                    let message = e.to_string();
                    let reason = message
                        .lines()
                        .filter(|line| !line.trim().is_empty())
                        .last()
                        .unwrap_or("invalid pattern");
                    writeln!(err, "Invalid regex '{}': {}", term, reason.trim_start_matches("error: "))?;
                    return Ok(());
                }
            }
        } else {
            NameMatcher::Substring(term.to_lowercase())
        };

        let doc = self.doc();
        let mut symbols = Vec::new();
        for path in self.project.visible_files() {
            let Some(entry) = doc.files.get(path) else {
                continue;
            };
            for sym in entry.symbols.iter().filter(|sym| matcher.is_match(&sym.name)) {
                symbols.push(SymbolHit {
                    name: &sym.name,
                    file: path,
                    line: sym.line,
                    signature: &sym.signature,
                });
            }
        }
        symbols.sort_by(|a, b| (a.name, a.file, a.line).cmp(&(b.name, b.file, b.line)));

        let files: Vec<&str> = self
            .project
            .visible_files()
            .filter(|path| matcher.is_match(path))
            .collect();

        let (total_symbols, total_files) = (symbols.len(), files.len());
        let (symbols, more_symbols) = limited(symbols, limit);
        let (files, more_files) = limited(files, limit);

        if self.json {
            return write_json(
                out,
                &json!({
                    "term": term,
                    "regex": regex,
                    "symbols": symbols,
                    "total_symbols": total_symbols,
                    "files": files,
                    "total_files": total_files,
                }),
            );
        }

        if total_symbols == 0 && total_files == 0 {
            writeln!(out, "No matches for '{}'", term)?;
            return Ok(());
        }

        if total_symbols > 0 {
            writeln!(out, "Symbols matching '{}' ({}):", term, total_symbols)?;
            for hit in &symbols {
                let mut line = format!("  {}  {}:{}", hit.name, hit.file, hit.line);
                if !hit.signature.is_empty() {
                    line.push_str("  ");
                    line.push_str(&truncate(hit.signature, SIGNATURE_WIDTH));
                }
                writeln!(out, "{}", line)?;
            }
            write_more(out, more_symbols)?;
        }

        if total_files > 0 {
            writeln!(out, "Files matching '{}' ({}):", term, total_files)?;
            for path in &files {
                writeln!(out, "  {}", path)?;
            }
            write_more(out, more_files)?;
        }
        Ok(())
    }

    fn neighbours(&self, name: &str, direction: Direction, limit: usize, out: &mut dyn Write) -> Result<()> {
        let graph = self.graph();
        let (names, label) = match direction {
            Direction::Callers => (graph.callers(name), "callers"),
            Direction::Callees => (graph.callees(name), "callees"),
        };
        let total = names.len();
        let (names, more) = limited(names, limit);

        if self.json {
            let entries: Vec<Value> = names
                .iter()
                .map(|n| json!({"name": n, "files": graph.files_for(n)}))
                .collect();
            let mut value = json!({"function": name, "total": total});
            value[label] = Value::Array(entries);
            return write_json(out, &value);
        }

        if total == 0 {
            writeln!(out, "No {} found for '{}'", label, name)?;
            return Ok(());
        }

        match direction {
            Direction::Callers => writeln!(out, "Callers of {} ({}):", name, total)?,
            Direction::Callees => writeln!(out, "Called by {} ({}):", name, total)?,
        }
        for n in &names {
            let files = graph.files_for(n);
            if files.is_empty() {
                writeln!(out, "  {}", n)?;
            } else {
                writeln!(out, "  {}  ({})", n, files.join(", "))?;
            }
        }
        write_more(out, more)
    }

    fn trace(&self, from: &str, to: &str, out: &mut dyn Write) -> Result<()> {
        let path = self.graph().shortest_path(from, to);

        if self.json {
            return write_json(out, &json!({"from": from, "to": to, "path": path}));
        }

        match path {
            Some(path) => writeln!(out, "{}", path.join(" -> "))?,
            None => writeln!(out, "No call path from {} to {}", from, to)?,
        }
        Ok(())
    }

    fn dead(&self, limit: usize, out: &mut dyn Write) -> Result<()> {
        let graph = self.graph();
        let dead = graph.dead_symbols();
        let total = dead.len();
        let (dead, more) = limited(dead, limit);

        if self.json {
            let symbols: Vec<Value> = dead
                .iter()
                .map(|n| json!({"name": n, "files": graph.files_for(n)}))
                .collect();
            return write_json(out, &json!({"total": total, "symbols": symbols}));
        }

        if total == 0 {
            writeln!(out, "No dead symbols found")?;
            return Ok(());
        }

        writeln!(out, "Dead symbols ({}):", total)?;
        for name in &dead {
            writeln!(out, "  {}  ({})", name, graph.files_for(name).join(", "))?;
        }
        write_more(out, more)
    }

    fn imports(&self, file: &str, out: &mut dyn Write) -> Result<()> {
        let file = clean_path(file);
        let imports = self.graph().file_imports.get(file);

        if self.json {
            let imports = imports.cloned().unwrap_or_default();
            return write_json(out, &json!({"file": file, "imports": imports}));
        }

        let known = imports.is_some() || (self.doc().files.contains_key(file) && self.is_visible(file));
        if !known {
            writeln!(out, "No import data for '{}'", file)?;
            return Ok(());
        }

        writeln!(out, "Imports of {}:", file)?;
        match imports {
            Some(modules) if !modules.is_empty() => {
                for module in modules {
                    writeln!(out, "  -> {}", module)?;
                }
            }
            _ => writeln!(out, "  (none)")?,
        }
        Ok(())
    }

    fn importers(&self, module: &str, limit: usize, out: &mut dyn Write) -> Result<()> {
        let graph = self.graph();
        let (importers, exact): (BTreeSet<&str>, bool) = match graph.module_importers.get(module) {
            Some(files) => (files.iter().map(String::as_str).collect(), true),
            None => (
                graph
                    .module_importers
                    .iter()
                    .filter(|(specifier, _)| specifier.contains(module))
                    .flat_map(|(_, files)| files.iter().map(String::as_str))
                    .collect(),
                false,
            ),
        };
        let total = importers.len();
        let (importers, more) = limited(importers.into_iter().collect(), limit);

        if self.json {
            return write_json(
                out,
                &json!({"module": module, "exact": exact, "importers": importers, "total": total}),
            );
        }

        if total == 0 {
            writeln!(out, "No files import '{}'", module)?;
            return Ok(());
        }

        if exact {
            writeln!(out, "Files importing {} ({}):", module, total)?;
        } else {
            writeln!(out, "Files importing modules matching '{}' ({}):", module, total)?;
        }
        for file in &importers {
            writeln!(out, "  <- {}", file)?;
        }
        write_more(out, more)
    }

    fn metrics(&self, out: &mut dyn Write) -> Result<()> {
        let doc = self.doc();
        let graph = self.graph();
        let files: Vec<&str> = self.project.visible_files().collect();
        let languages = self.language_counts(files.iter().copied());

        let per_file: Vec<(&str, usize)> = files
            .iter()
            .filter_map(|path| doc.files.get(*path).map(|entry| (*path, entry.symbols.len())))
            .collect();
        let total_symbols: usize = per_file.iter().map(|(_, n)| n).sum();
        let average = if files.is_empty() {
            0.0
        } else {
            total_symbols as f64 / files.len() as f64
        };

        let top_files = ranked(per_file, TOP_N);
        let most_called = ranked(
            graph.reverse_call_graph.iter().map(|(n, callers)| (n.as_str(), callers.len())),
            TOP_N,
        );
        let most_callees = ranked(
            graph.call_graph.iter().map(|(n, callees)| (n.as_str(), callees.len())),
            TOP_N,
        );
        let dead = graph.dead_symbols().len();

        if self.json {
            let pairs = |items: &[(&str, usize)], key: &str, count: &str| -> Vec<Value> {
                items
                    .iter()
                    .map(|(name, n)| {
                        let mut entry = json!({});
                        entry[key] = json!(name);
                        entry[count] = json!(n);
                        entry
                    })
                    .collect()
            };
            return write_json(
                out,
                &json!({
                    "files": files.len(),
                    "languages": languages,
                    "symbols": total_symbols,
                    "average_symbols_per_file": average,
                    "top_files": pairs(top_files.as_slice(), "file", "symbols"),
                    "most_called": pairs(most_called.as_slice(), "name", "callers"),
                    "most_callees": pairs(most_callees.as_slice(), "name", "callees"),
                    "dead_symbols": dead,
                }),
            );
        }

        writeln!(out, "Files: {}", files.len())?;
        writeln!(out, "Symbols: {} (avg {:.1} per file)", total_symbols, average)?;
        writeln!(out, "Dead symbols: {}", dead)?;
        writeln!(out)?;
        write_ranked(out, "Languages", &ranked(languages, usize::MAX))?;
        writeln!(out)?;
        write_ranked(out, "Largest files (symbols)", &top_files)?;
        writeln!(out)?;
        write_ranked(out, "Most called (callers)", &most_called)?;
        writeln!(out)?;
        write_ranked(out, "Most outgoing calls (callees)", &most_callees)
    }

    fn summarize(&self, path: &str, out: &mut dyn Write) -> Result<()> {
        let summary = summary::summarize(
            self.doc(),
            self.graph(),
            &self.project.patterns,
            self.project.visible_files(),
            path,
        );
        if self.json {
            return write_json(out, &summary);
        }
        summary.write_text(out)?;
        Ok(())
    }

    fn find(&self, term: &'a str, limit: usize) -> Finding<'a> {
        let doc = self.doc();
        let graph = self.graph();
        let lowered = term.to_lowercase();
        let needle = lowered.as_str();

        let symbols: Vec<SymbolMatch> = graph
            .symbol_to_files
            .keys()
            .filter(|name| name.to_lowercase().contains(needle))
            .map(|name| SymbolMatch {
                name,
                files: graph.files_for(name),
                callers: graph.callers(name).len(),
                callees: graph.callees(name).len(),
            })
            .collect();

        let files: Vec<&str> = self
            .project
            .visible_files()
            .filter(|path| path.to_lowercase().contains(needle))
            .collect();

        let docs: Vec<DocMatch> = doc
            .docs
            .iter()
            .filter(|(file, _)| self.is_visible(file))
            .flat_map(|(file, lines)| {
                lines
                    .iter()
                    .filter(move |line| line.to_lowercase().contains(needle))
                    .map(move |line| DocMatch { file, line })
            })
            .collect();

        let (total_symbols, total_files, total_docs) = (symbols.len(), files.len(), docs.len());
        Finding {
            term,
            symbols: limited(symbols, limit).0,
            total_symbols,
            files: limited(files, limit).0,
            total_files,
            docs: limited(docs, limit).0,
            total_docs,
        }
    }

    fn investigate(&self, terms: &'a [String], limit: usize, out: &mut dyn Write) -> Result<()> {
        let findings: Vec<Finding> = terms.iter().map(|term| self.find(term, limit)).collect();

        if self.json {
            return write_json(out, &findings);
        }

        for (i, finding) in findings.iter().enumerate() {
            if i > 0 {
                writeln!(out)?;
            }
            writeln!(out, "== {} ==", finding.term)?;

            writeln!(out, "Symbols ({}):", finding.total_symbols)?;
            if finding.symbols.is_empty() {
                writeln!(out, "  (none)")?;
            }
            for sym in &finding.symbols {
                writeln!(
                    out,
                    "  {}  ({})  [{} callers, {} callees]",
                    sym.name,
                    sym.files.join(", "),
                    sym.callers,
                    sym.callees
                )?;
            }
            write_more(out, finding.total_symbols - finding.symbols.len())?;

            writeln!(out, "Files ({}):", finding.total_files)?;
            if finding.files.is_empty() {
                writeln!(out, "  (none)")?;
            }
            for file in &finding.files {
                writeln!(out, "  {}", file)?;
            }
            write_more(out, finding.total_files - finding.files.len())?;

            writeln!(out, "Docs ({}):", finding.total_docs)?;
            if finding.docs.is_empty() {
                writeln!(out, "  (none)")?;
            }
            for hit in &finding.docs {
                writeln!(out, "  {}: {}", hit.file, hit.line)?;
            }
            write_more(out, finding.total_docs - finding.docs.len())?;
        }
        Ok(())
    }

    fn debug(&self, target: &str, out: &mut dyn Write) -> Result<()> {
        let path = clean_path(target);
        let patterns = &self.project.patterns;
        if let Some(file) = summary::summarize_file(self.doc(), self.graph(), patterns, path) {
            return self.debug_file(file, out);
        }
        self.debug_symbol(target.trim(), out)
    }

    fn debug_file(&self, file: summary::FileSummary, out: &mut dyn Write) -> Result<()> {
        let stem = file_stem(&file.path);
        let imported_by: BTreeSet<&str> = self
            .graph()
            .module_importers
            .iter()
            .filter(|(specifier, _)| references(specifier, stem))
            .flat_map(|(_, files)| files.iter().map(String::as_str))
            .filter(|importer| *importer != file.path)
            .collect();

        if self.json {
            return write_json(
                out,
                &json!({"kind": "file", "file": file, "imported_by": imported_by}),
            );
        }

        file.write_text(out)?;
        writeln!(out, "Imported by ({}):", imported_by.len())?;
        if imported_by.is_empty() {
            writeln!(out, "  (none)")?;
        }
        for importer in &imported_by {
            writeln!(out, "  <- {}", importer)?;
        }
        Ok(())
    }

    fn debug_symbol(&self, name: &str, out: &mut dyn Write) -> Result<()> {
        let doc = self.doc();
        let graph = self.graph();

        let mut definitions = Vec::new();
        for file in graph.files_for(name) {
            let Some(entry) = doc.files.get(file) else {
                continue;
            };
            for sym in entry.symbols.iter().filter(|sym| sym.name == name) {
                definitions.push(Definition {
                    file,
                    line: sym.line,
                    signature: &sym.signature,
                    return_type: &sym.return_type,
                });
            }
        }
        let callers = graph.callers(name);
        let callees = graph.callees(name);
        let indirect: BTreeSet<&str> = callers
            .iter()
            .flat_map(|caller| graph.callers(caller))
            .filter(|n| *n != name)
            .collect();

        let unknown = definitions.is_empty() && callers.is_empty() && callees.is_empty();

        if self.json {
            if unknown {
                return write_json(out, &json!({"kind": "unknown", "target": name}));
            }
            return write_json(
                out,
                &json!({
                    "kind": "symbol",
                    "name": name,
                    "definitions": definitions,
                    "callers": callers,
                    "callees": callees,
                    "indirect_callers": indirect,
                }),
            );
        }

        if unknown {
            writeln!(out, "No file or symbol named '{}'", name)?;
            return Ok(());
        }

        writeln!(out, "Symbol: {}", name)?;
        writeln!(out, "Defined in ({}):", definitions.len())?;
        if definitions.is_empty() {
            writeln!(out, "  (not defined in an indexed file)")?;
        }
        for def in &definitions {
            let ret = if def.return_type.is_empty() {
                String::new()
            } else {
                format!(" -> {}", def.return_type)
            };
            writeln!(out, "  {}:{}  {}{}", def.file, def.line, def.signature, ret)?;
        }

        let sections: [(&str, &str, Vec<&str>); 3] = [
            ("Called by", "<-", callers),
            ("Calls", "->", callees),
            ("Indirect callers", "<<", indirect.into_iter().collect()),
        ];
        for (title, arrow, names) in &sections {
            writeln!(out, "{} ({}):", title, names.len())?;
            if names.is_empty() {
                writeln!(out, "  (none)")?;
            }
            for n in names {
                writeln!(out, "  {} {}", arrow, n)?;
            }
        }
        Ok(())
    }

    fn sanitize(&self, limit: usize, include_tests: bool, out: &mut dyn Write) -> Result<()> {
        let graph = self.graph();
        let keep = |path: &str| include_tests || !is_test_file(path);

        let mut dead_by_file: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for name in graph.dead_symbols() {
            for file in graph.files_for(name) {
                if keep(file) {
                    dead_by_file.entry(file).or_default().push(name);
                }
            }
        }

        let unreferenced: Vec<&str> = self
            .project
            .visible_files()
            .filter(|path| keep(*path))
            .filter(|path| {
                let stem = file_stem(path);
                !ENTRY_STEMS.contains(&stem)
                    && !graph.module_importers.keys().any(|specifier| references(specifier, stem))
            })
            .collect();

        let dead_symbols: usize = dead_by_file.values().map(Vec::len).sum();
        let dead_files = dead_by_file.len();
        let total_unreferenced = unreferenced.len();
        let (groups, more_groups) = limited(dead_by_file.into_iter().collect(), limit);
        let (unreferenced, more_files) = limited(unreferenced, limit);

        if self.json {
            let groups: BTreeMap<&str, Vec<&str>> = groups.into_iter().collect();
            return write_json(
                out,
                &json!({
                    "dead_by_file": groups,
                    "dead_symbols": dead_symbols,
                    "dead_files": dead_files,
                    "unreferenced_files": unreferenced,
                    "total_unreferenced": total_unreferenced,
                }),
            );
        }

        if dead_symbols == 0 && total_unreferenced == 0 {
            writeln!(out, "Nothing to clean up")?;
            return Ok(());
        }

        writeln!(out, "Dead symbols ({} in {} files):", dead_symbols, dead_files)?;
        for (file, names) in &groups {
            writeln!(out, "  {}", file)?;
            for name in names {
                writeln!(out, "    - {}", name)?;
            }
        }
        write_more(out, more_groups)?;

        writeln!(out, "Unreferenced files ({}):", total_unreferenced)?;
        if unreferenced.is_empty() {
            writeln!(out, "  (none)")?;
        }
        for file in &unreferenced {
            writeln!(out, "  {}", file)?;
        }
        write_more(out, more_files)
    }

    fn docs(&self, target: &str, limit: usize, out: &mut dyn Write) -> Result<()> {
        let doc = self.doc();
        let path = clean_path(target);

        if let Some(lines) = doc.docs.get(path).filter(|_| self.is_visible(path)) {
            let total = lines.len();
            let (lines, more) = limited(lines.iter().map(String::as_str).collect(), limit);
            if self.json {
                return write_json(out, &json!({"file": path, "lines": lines, "total": total}));
            }
            writeln!(out, "Docs for {} ({} lines):", path, total)?;
            for line in &lines {
                writeln!(out, "  {}", line)?;
            }
            return write_more(out, more);
        }

        let lowered = target.to_lowercase();
        let needle = lowered.as_str();
        let matches: Vec<DocMatch> = doc
            .docs
            .iter()
            .filter(|(file, _)| self.is_visible(file))
            .flat_map(|(file, lines)| {
                lines
                    .iter()
                    .filter(move |line| line.to_lowercase().contains(needle))
                    .map(move |line| DocMatch { file, line })
            })
            .collect();
        let total = matches.len();
        let (matches, more) = limited(matches, limit);

        if self.json {
            return write_json(out, &json!({"term": target, "matches": matches, "total": total}));
        }

        if total == 0 {
            writeln!(out, "No documentation mentions '{}'", target)?;
            return Ok(());
        }

        writeln!(out, "Docs mentioning '{}' ({}):", target, total)?;
        for hit in &matches {
            writeln!(out, "  {}: {}", hit.file, hit.line)?;
        }
        write_more(out, more)
    }

    fn report(&self, focus: Option<&str>, out: &mut dyn Write) -> Result<()> {
        let doc = self.doc();
        let graph = self.graph();
        let focus = focus.map(clean_path).filter(|f| !f.is_empty() && *f != ".");
        let in_focus = |path: &str| match focus {
            None => true,
            Some(prefix) => {
                path == prefix || path.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/'))
            }
        };

        let files: Vec<&str> = self.project.visible_files().filter(|path| in_focus(*path)).collect();
        let languages = self.language_counts(files.iter().copied());
        let symbols: BTreeSet<&str> = files
            .iter()
            .filter_map(|path| doc.files.get(*path))
            .flat_map(|entry| entry.symbols.iter().map(|sym| sym.name.as_str()))
            .collect();
        let most_called = ranked(
            symbols
                .iter()
                .map(|name| (*name, graph.callers(name).len()))
                .filter(|(_, count)| *count > 0),
            REPORT_TOP_N,
        );
        let dead = symbols.iter().filter(|name| graph.is_dead(name)).count();
        let tree = DirTreeNode::build(files.iter().copied());

        if self.json {
            let most_called: Vec<Value> = most_called
                .iter()
                .map(|(name, count)| json!({"name": name, "callers": count}))
                .collect();
            return write_json(
                out,
                &json!({
                    "focus": focus,
                    "files": files.len(),
                    "symbols": symbols.len(),
                    "call_edges": doc.edges.len(),
                    "dead_symbols": dead,
                    "languages": languages,
                    "structure": tree.to_json(Some(1), false),
                    "most_called": most_called,
                }),
            );
        }

        match focus {
            Some(prefix) => writeln!(out, "Project report for {}/", prefix)?,
            None => writeln!(out, "Project report")?,
        }
        writeln!(out, "{}", "=".repeat(40))?;

        if files.is_empty() {
            writeln!(out, "No indexed files under '{}'", focus.unwrap_or("."))?;
            return Ok(());
        }

        writeln!(out, "Files: {}", files.len())?;
        writeln!(out, "Symbols: {}", symbols.len())?;
        writeln!(out, "Dead symbols: {}", dead)?;
        writeln!(out, "Call edges (whole index): {}", doc.edges.len())?;
        writeln!(out)?;
        write_ranked(out, "Languages", &ranked(languages, usize::MAX))?;
        writeln!(out)?;
        writeln!(out, "Structure:")?;
        out.write_all(tree.render("  ", Some(1), false).as_bytes())?;
        writeln!(out)?;
        write_ranked(out, "Most called", &most_called)
    }
}
