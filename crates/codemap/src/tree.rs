//! Directory tree over indexed file paths

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::format::plural;

/// One directory or file in the tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirTreeNode {
    pub name: String,
    pub children: BTreeMap<String, DirTreeNode>,
    /// Indexed paths at or below this node
    pub file_count: usize,
    /// True when an indexed path ends exactly here
    pub is_file: bool,
}

impl DirTreeNode {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Build a tree from `/`-separated paths; the root is named `.`
    pub fn build<'a, I>(paths: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut root = Self::named(".");

        for path in paths {
            let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
            if parts.is_empty() {
                continue;
            }

            root.file_count += 1;
            let mut node = &mut root;
            for part in &parts {
                node = node
                    .children
                    .entry(part.to_string())
                    .or_insert_with(|| Self::named(part));
                node.file_count += 1;
            }
            node.is_file = true;
        }

        root
    }

    pub fn is_dir(&self) -> bool {
        !self.children.is_empty() || !self.is_file
    }

    /// Render below `self` with `|--` connectors.
    ///
    /// Directories at depth `max_depth` (root is depth 0) are listed with
    /// their counts but not expanded. Files appear only with `include_files`.
    pub fn render(&self, prefix: &str, max_depth: Option<usize>, include_files: bool) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{}{}/ ({})\n",
            prefix,
            self.name,
            plural(self.file_count, "file")
        ));
        self.render_children(&mut out, prefix, 0, max_depth, include_files);
        out
    }

    fn render_children(
        &self,
        out: &mut String,
        prefix: &str,
        depth: usize,
        max_depth: Option<usize>,
        include_files: bool,
    ) {
        if max_depth.is_some_and(|max| depth >= max) {
            return;
        }

        let visible: Vec<&DirTreeNode> = self
            .children
            .values()
            .filter(|child| include_files || child.is_dir())
            .collect();

        for (i, child) in visible.iter().enumerate() {
            let is_last = i == visible.len() - 1;
            let connector = if is_last { "\\-- " } else { "|-- " };

            if child.is_dir() {
                out.push_str(&format!(
                    "{}{}{}/ ({})\n",
                    prefix, connector, child.name, child.file_count
                ));
                let next_prefix = format!("{}{}", prefix, if is_last { "    " } else { "|   " });
                child.render_children(out, &next_prefix, depth + 1, max_depth, include_files);
            } else {
                out.push_str(&format!("{}{}{}\n", prefix, connector, child.name));
            }
        }
    }

    /// Nested JSON with the same depth and file filtering as `render`
    pub fn to_json(&self, max_depth: Option<usize>, include_files: bool) -> Value {
        self.json_at(0, max_depth, include_files)
    }

    fn json_at(&self, depth: usize, max_depth: Option<usize>, include_files: bool) -> Value {
        let expand = !max_depth.is_some_and(|max| depth >= max);
        let children: Vec<Value> = if expand {
            self.children
                .values()
                .filter(|child| include_files || child.is_dir())
                .map(|child| child.json_at(depth + 1, max_depth, include_files))
                .collect()
        } else {
            Vec::new()
        };

        json!({
            "name": self.name,
            "type": if self.is_dir() { "dir" } else { "file" },
            "file_count": self.file_count,
            "children": children,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DirTreeNode {
        DirTreeNode::build([
            "README.md",
            "src/main.rs",
            "src/lib.rs",
            "src/api/routes.rs",
            "src/api/auth/token.rs",
            "tests/e2e.rs",
        ])
    }

    #[test]
    fn test_root_count_equals_path_count() {
        let tree = sample();
        assert_eq!(tree.file_count, 6);
        assert_eq!(tree.children["src"].file_count, 4);
        assert_eq!(tree.children["src"].children["api"].file_count, 2);
        assert_eq!(tree.children["README.md"].file_count, 1);
    }

    #[test]
    fn test_empty_input() {
        let tree = DirTreeNode::build(Vec::<&str>::new());
        assert_eq!(tree.file_count, 0);
        assert_eq!(tree.render("", None, true), "./ (0 files)\n");
    }

    #[test]
    fn test_render_directories_only() {
        let rendered = sample().render("", None, false);
        assert_eq!(
            rendered,
            "./ (6 files)\n\
             |-- src/ (4)\n\
             |   \\-- api/ (2)\n\
             |       \\-- auth/ (1)\n\
             \\-- tests/ (1)\n"
        );
    }

    #[test]
    fn test_render_with_files() {
        let rendered = sample().render("", None, true);
        assert!(rendered.contains("|-- README.md\n"));
        assert!(rendered.contains("|   |-- lib.rs\n"));
        assert!(rendered.contains("|   \\-- main.rs\n"));
        assert!(rendered.contains("    \\-- e2e.rs\n"));
    }

    #[test]
    fn test_render_respects_max_depth() {
        let rendered = sample().render("", Some(1), false);
        assert_eq!(rendered, "./ (6 files)\n|-- src/ (4)\n\\-- tests/ (1)\n");

        let rendered = sample().render("", Some(2), false);
        assert!(rendered.contains("api/ (2)"));
        assert!(!rendered.contains("auth/"));
    }

    #[test]
    fn test_render_prefix() {
        let rendered = DirTreeNode::build(["a/b.rs"]).render("  ", None, false);
        assert_eq!(rendered, "  ./ (1 file)\n  \\-- a/ (1)\n");
    }

    #[test]
    fn test_json_tree() {
        let value = sample().to_json(Some(1), true);
        let names: Vec<_> = value["children"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["README.md", "src", "tests"]);
        assert_eq!(value["children"][1]["children"], json!([]));
        assert_eq!(value["children"][0]["type"], "file");
    }
}
