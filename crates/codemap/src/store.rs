//! Index location, loading and in-process caching

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::Config;
use crate::error::IndexError;
use crate::exclude::ExclusionPatterns;
use crate::graph::DerivedGraph;
use crate::index::IndexDocument;

/// Files that mark a directory as a project root
pub const PROJECT_MARKERS: &[&str] = &[
    ".git",
    "Cargo.toml",
    "package.json",
    "pyproject.toml",
    "go.mod",
    "setup.py",
    "pom.xml",
    "build.gradle",
    "Gemfile",
    "composer.json",
];

/// Walk upward from `start` to the first directory containing the index.
///
/// Falls back to `start` itself when no ancestor has one; loading then fails
/// with a `NotFound` that names the expected location.
pub fn locate_project_root(start: &Path, index_filename: &str) -> PathBuf {
    let mut first_marker: Option<&Path> = None;

    for dir in start.ancestors() {
        if dir.join(index_filename).is_file() {
            debug!(root = %dir.display(), "found index");
            return dir.to_path_buf();
        }
        if first_marker.is_none() && PROJECT_MARKERS.iter().any(|m| dir.join(m).exists()) {
            first_marker = Some(dir);
        }
    }

    if let Some(marker_dir) = first_marker {
        debug!(
            project = %marker_dir.display(),
            "project marker found but no {} above it", index_filename
        );
    }
    start.to_path_buf()
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Loads index documents, keeping the most recent one in memory
#[derive(Default)]
pub struct IndexStore {
    cached: Option<(PathBuf, Arc<IndexDocument>)>,
}

impl IndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the document at `path`.
    ///
    /// Repeated calls for the same absolute path return the cached document
    /// without touching the filesystem; a different path replaces the cache.
    pub fn load(&mut self, path: &Path) -> Result<Arc<IndexDocument>, IndexError> {
        let path = absolute(path);

        if let Some((cached_path, doc)) = &self.cached {
            if *cached_path == path {
                debug!(path = %path.display(), "index cache hit");
                return Ok(Arc::clone(doc));
            }
        }
        self.cached = None;

        if !path.is_file() {
            return Err(IndexError::NotFound { path });
        }

        let content = std::fs::read_to_string(&path).map_err(|err| IndexError::InvalidFormat {
            path: path.clone(),
            reason: err.to_string(),
        })?;
        let doc = IndexDocument::from_json(&content).map_err(|err| IndexError::InvalidFormat {
            path: path.clone(),
            reason: err.to_string(),
        })?;

        info!(
            path = %path.display(),
            files = doc.files.len(),
            edges = doc.edges.len(),
            "loaded index"
        );
        if doc.skipped_records > 0 {
            debug!(skipped = doc.skipped_records, "skipped malformed index records");
        }

        let doc = Arc::new(doc);
        self.cached = Some((path, Arc::clone(&doc)));
        Ok(doc)
    }

    /// Path of the cached document, if any
    pub fn cached_path(&self) -> Option<&Path> {
        self.cached.as_ref().map(|(path, _)| path.as_path())
    }
}

/// Everything a command needs about the project being queried
#[derive(Clone)]
pub struct Project {
    pub root: PathBuf,
    pub index_path: PathBuf,
    pub document: Arc<IndexDocument>,
    pub patterns: Arc<ExclusionPatterns>,
    pub graph: Arc<DerivedGraph>,
}

impl Project {
    /// Indexed files that survive exclusion, in path order
    pub fn visible_files(&self) -> impl Iterator<Item = &str> {
        self.document
            .files
            .keys()
            .map(String::as_str)
            .filter(|path| !self.patterns.is_excluded(path))
    }
}

/// Long-lived state shared by every command in one process
pub struct QueryContext {
    config: Config,
    store: IndexStore,
    patterns: Option<(PathBuf, Arc<ExclusionPatterns>)>,
    graph: Option<(String, Arc<DerivedGraph>)>,
    derivations: usize,
}

impl QueryContext {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            store: IndexStore::new(),
            patterns: None,
            graph: None,
            derivations: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Index path and project root for an optional `--index` override.
    ///
    /// With an override the project root is the index file's directory;
    /// otherwise the root is located by walking up from `cwd`.
    pub fn resolve(&self, index_override: Option<&Path>, cwd: &Path) -> (PathBuf, PathBuf) {
        match index_override {
            Some(path) => {
                let index_path = if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    cwd.join(path)
                };
                let root = index_path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| cwd.to_path_buf());
                (index_path, root)
            }
            None => {
                let root = locate_project_root(cwd, &self.config.index_filename);
                (root.join(&self.config.index_filename), root)
            }
        }
    }

    /// Load (or reuse) the document, exclusions and derived graph
    pub fn open(&mut self, index_path: &Path, root: &Path) -> Result<Project, IndexError> {
        let previous = self.store.cached_path().map(Path::to_path_buf);
        let document = self.store.load(index_path)?;
        let index_path = absolute(index_path);

        if previous.as_deref() != Some(index_path.as_path()) {
            self.graph = None;
        }

        let patterns = self.exclusions(root);
        let graph = self.derive(&index_path, &document, &patterns);

        Ok(Project {
            root: root.to_path_buf(),
            index_path,
            document,
            patterns,
            graph,
        })
    }

    /// Exclusion patterns for `root`, computed once per root
    pub fn exclusions(&mut self, root: &Path) -> Arc<ExclusionPatterns> {
        if let Some((cached_root, patterns)) = &self.patterns {
            if cached_root == root {
                return Arc::clone(patterns);
            }
        }
        let patterns = Arc::new(ExclusionPatterns::compute(
            root,
            &self.config.index_filename,
            &self.config.ignore_filename,
            &self.config.extra_excludes,
        ));
        self.patterns = Some((root.to_path_buf(), Arc::clone(&patterns)));
        patterns
    }

    /// Derived graph, cached by document path and pattern content
    pub fn derive(
        &mut self,
        index_path: &Path,
        document: &IndexDocument,
        patterns: &ExclusionPatterns,
    ) -> Arc<DerivedGraph> {
        let key = format!("{}#{}", index_path.display(), patterns.fingerprint());

        if let Some((cached_key, graph)) = &self.graph {
            if *cached_key == key {
                debug!("derived graph cache hit");
                return Arc::clone(graph);
            }
        }

        let graph = Arc::new(DerivedGraph::derive(document, patterns));
        self.derivations += 1;
        self.graph = Some((key, Arc::clone(&graph)));
        graph
    }

    /// Number of times the graph has actually been rebuilt
    pub fn derivations(&self) -> usize {
        self.derivations
    }
}
