//! Typed model of the project index document
//!
//! The index is produced by an external pipeline and stores symbols as
//! loosely-shaped JSON. Everything is converted to typed records here, once;
//! records that don't fit are dropped and counted instead of failing the load.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A function or definition recorded in one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Symbol {
    pub name: String,
    pub line: u32,
    pub signature: String,
    pub return_type: String,
    pub callees: Vec<String>,
}

/// One indexed file: language tag and symbol table in document order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub language: String,
    pub symbols: Vec<Symbol>,
}

/// Raw call-graph edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallEdge {
    pub caller: String,
    pub callee: String,
}

/// The parsed index document
#[derive(Debug, Clone, Default)]
pub struct IndexDocument {
    pub files: BTreeMap<String, FileEntry>,
    pub docs: BTreeMap<String, Vec<String>>,
    pub deps: BTreeMap<String, Vec<String>>,
    pub edges: Vec<CallEdge>,
    /// Passed through verbatim
    pub stats: Value,
    /// Malformed records dropped during parsing
    pub skipped_records: usize,
}

#[derive(Deserialize)]
struct RawIndex {
    #[serde(default)]
    files: Map<String, Value>,
    #[serde(default)]
    docs: Map<String, Value>,
    #[serde(default)]
    deps: Map<String, Value>,
    #[serde(default)]
    edges: Vec<Value>,
    #[serde(default = "empty_object")]
    stats: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl IndexDocument {
    /// Parse the document text.
    ///
    /// Fails only when the top-level shape is wrong; individual records that
    /// can't be read are skipped.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        let raw: RawIndex = serde_json::from_str(text)?;
        let mut skipped = 0;

        let mut files = BTreeMap::new();
        for (path, value) in raw.files {
            match parse_file_entry(&value, &mut skipped) {
                Some(entry) => {
                    files.insert(path, entry);
                }
                None => skipped += 1,
            }
        }

        let docs = parse_string_lists(raw.docs, &mut skipped);
        let deps = parse_string_lists(raw.deps, &mut skipped);

        let mut edges = Vec::with_capacity(raw.edges.len());
        for value in &raw.edges {
            match parse_edge(value) {
                Some(edge) => edges.push(edge),
                None => skipped += 1,
            }
        }

        Ok(Self {
            files,
            docs,
            deps,
            edges,
            stats: raw.stats,
            skipped_records: skipped,
        })
    }

    /// Total symbol records across all files
    pub fn symbol_count(&self) -> usize {
        self.files.values().map(|f| f.symbols.len()).sum()
    }
}

/// `[language, [record, ...]]`
fn parse_file_entry(value: &Value, skipped: &mut usize) -> Option<FileEntry> {
    let parts = value.as_array()?;
    if parts.len() != 2 {
        return None;
    }
    let language = parts[0].as_str()?.to_string();
    let records = parts[1].as_array()?;

    let mut symbols = Vec::with_capacity(records.len());
    for record in records {
        let symbol = match record {
            Value::String(s) => parse_symbol_str(s),
            Value::Array(fields) => parse_symbol_array(fields),
            _ => None,
        };
        match symbol {
            Some(symbol) => symbols.push(symbol),
            None => *skipped += 1,
        }
    }

    Some(FileEntry { language, symbols })
}

/// `name:line:signature:return:callee1,callee2`
///
/// The signature may itself contain `:`, so everything after the line number
/// is split from the right.
fn parse_symbol_str(record: &str) -> Option<Symbol> {
    let mut head = record.splitn(3, ':');
    let name = head.next()?.trim();
    if name.is_empty() {
        return None;
    }
    let line = head.next()?.trim().parse().ok()?;
    let rest = head.next().unwrap_or("");

    let mut tail: Vec<&str> = rest.rsplitn(3, ':').collect();
    tail.reverse();

    let (signature, return_type, callees) = match tail.as_slice() {
        [sig] => (*sig, "", ""),
        [sig, ret] => (*sig, *ret, ""),
        [sig, ret, callees] => (*sig, *ret, *callees),
        _ => ("", "", ""),
    };

    Some(Symbol {
        name: name.to_string(),
        line,
        signature: signature.trim().to_string(),
        return_type: return_type.trim().to_string(),
        callees: split_callees(callees),
    })
}

/// `[name, line, signature?, return?, callees?]`
fn parse_symbol_array(fields: &[Value]) -> Option<Symbol> {
    let name = fields.first()?.as_str()?.trim();
    if name.is_empty() {
        return None;
    }
    let line = match fields.get(1)? {
        Value::Number(n) => u32::try_from(n.as_u64()?).ok()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    let text = |i: usize| {
        fields
            .get(i)
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_string()
    };
    let callees = match fields.get(4) {
        Some(Value::String(s)) => split_callees(s),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };

    Some(Symbol {
        name: name.to_string(),
        line,
        signature: text(2),
        return_type: text(3),
        callees,
    })
}

fn split_callees(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `[caller, callee]`
fn parse_edge(value: &Value) -> Option<CallEdge> {
    match value.as_array()?.as_slice() {
        [Value::String(caller), Value::String(callee)] => Some(CallEdge {
            caller: caller.clone(),
            callee: callee.clone(),
        }),
        _ => None,
    }
}

fn parse_string_lists(
    raw: Map<String, Value>,
    skipped: &mut usize,
) -> BTreeMap<String, Vec<String>> {
    let mut out = BTreeMap::new();
    for (path, value) in raw {
        let Some(items) = value.as_array() else {
            *skipped += 1;
            continue;
        };
        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            match item.as_str() {
                Some(s) => lines.push(s.to_string()),
                None => *skipped += 1,
            }
        }
        out.insert(path, lines);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> IndexDocument {
        IndexDocument::from_json(&value.to_string()).unwrap()
    }

    #[test]
    fn test_minimal_document() {
        let doc = parse(json!({
            "files": {"a.ts": ["ts", ["foo:1::", "bar:2::"]]},
            "edges": [["foo", "bar"]]
        }));

        let entry = &doc.files["a.ts"];
        assert_eq!(entry.language, "ts");
        assert_eq!(entry.symbols.len(), 2);
        assert_eq!(entry.symbols[0].name, "foo");
        assert_eq!(entry.symbols[1].line, 2);
        assert_eq!(doc.edges, vec![CallEdge { caller: "foo".into(), callee: "bar".into() }]);
        assert_eq!(doc.stats, json!({}));
        assert_eq!(doc.skipped_records, 0);
    }

    #[test]
    fn test_symbol_record_fields() {
        let sym = parse_symbol_str("handle:42:(req: Request, ctx: Ctx):Response:parse,validate, send").unwrap();
        assert_eq!(sym.name, "handle");
        assert_eq!(sym.line, 42);
        assert_eq!(sym.signature, "(req: Request, ctx: Ctx)");
        assert_eq!(sym.return_type, "Response");
        assert_eq!(sym.callees, vec!["parse", "validate", "send"]);
    }

    #[test]
    fn test_short_symbol_records() {
        let sym = parse_symbol_str("main:3").unwrap();
        assert_eq!(sym.signature, "");
        assert!(sym.callees.is_empty());

        let sym = parse_symbol_str("run:7:()").unwrap();
        assert_eq!(sym.signature, "()");
        assert_eq!(sym.return_type, "");
    }

    #[test]
    fn test_array_symbol_records() {
        let sym = parse_symbol_array(&[json!("init"), json!(12), json!("()"), json!("void"), json!(["setup", "load"])]).unwrap();
        assert_eq!(sym.line, 12);
        assert_eq!(sym.return_type, "void");
        assert_eq!(sym.callees, vec!["setup", "load"]);
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let doc = parse(json!({
            "files": {
                "ok.py": ["py", ["good:1::", ":2::", "noline:x::", 17, ["arr", 3]]],
                "broken.py": "not a tuple",
                "short.py": ["py"]
            },
            "edges": [["a", "b"], ["lonely"], "x", [1, 2]],
            "docs": {"ok.py": ["Module docs", 5], "bad.py": {"x": 1}},
            "deps": {"ok.py": ["os", "sys"]}
        }));

        let symbols: Vec<_> = doc.files["ok.py"].symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(symbols, vec!["good", "arr"]);
        assert!(!doc.files.contains_key("broken.py"));
        assert!(!doc.files.contains_key("short.py"));
        assert_eq!(doc.edges.len(), 1);
        assert_eq!(doc.docs["ok.py"], vec!["Module docs"]);
        assert!(!doc.docs.contains_key("bad.py"));
        assert_eq!(doc.deps["ok.py"], vec!["os", "sys"]);
        // 3 symbols + 2 files + 3 edges + 1 doc line + 1 doc entry
        assert_eq!(doc.skipped_records, 10);
    }

    #[test]
    fn test_wrong_top_level_shape_fails() {
        assert!(IndexDocument::from_json("[1, 2, 3]").is_err());
        assert!(IndexDocument::from_json(r#"{"files": []}"#).is_err());
        assert!(IndexDocument::from_json("not json").is_err());
    }

    #[test]
    fn test_stats_passed_through() {
        let doc = parse(json!({"stats": {"total_files": 3, "languages": {"rust": 3}}}));
        assert_eq!(doc.stats["languages"]["rust"], 3);
    }
}
