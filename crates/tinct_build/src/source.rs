//! Source graph loading
//!
//! [`SourceLoader`] turns an entry file into a tree of [`Source`]s, one per
//! absolute path. Imports always resolve against the loader's root, never
//! against the importing file. A file may be imported from many places and is
//! still loaded once; importing a file that is already being loaded further up
//! the chain is a [`LoadError::CircularImport`].

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::document::{split_document, BuildDirectives, SchemaError};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Where a document lives and how it was referenced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceLocation {
    pub root: PathBuf,
    /// The reference as written (`./base.yaml`).
    pub file: String,
    /// Absolute, normalized path.
    pub path: PathBuf,
}

/// Collaborator that locates, reads and parses documents.
pub trait SourceIo {
    /// Turn a written reference into an absolute path.
    fn resolve_path(&self, file: &str, root: &Path) -> Result<PathBuf, BoxError>;

    fn read(&self, path: &Path) -> Result<Vec<u8>, BoxError>;

    fn parse_file_data(&self, bytes: &[u8], location: &SourceLocation) -> Result<Value, BoxError>;
}

impl<T: SourceIo + ?Sized> SourceIo for &T {
    fn resolve_path(&self, file: &str, root: &Path) -> Result<PathBuf, BoxError> {
        (**self).resolve_path(file, root)
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>, BoxError> {
        (**self).read(path)
    }

    fn parse_file_data(&self, bytes: &[u8], location: &SourceLocation) -> Result<Value, BoxError> {
        (**self).parse_file_data(bytes, location)
    }
}

/// A loaded document.
#[derive(Debug)]
pub struct Source {
    pub location: SourceLocation,
    /// Token data, without the build section.
    pub data: Value,
    pub directives: Option<BuildDirectives>,
    pub imports: IndexMap<String, Import>,
}

impl Source {
    pub fn path(&self) -> &Path {
        &self.location.path
    }

    /// Whether the document declares anything to export.
    pub fn has_exports(&self) -> bool {
        self.directives
            .as_ref()
            .and_then(|d| d.exports.as_ref())
            .is_some_and(|e| e.has_include())
    }
}

#[derive(Clone, Debug)]
pub struct Import {
    pub source: Arc<Source>,
    /// Splice built exports (`true`) or raw data (`false`).
    pub build: bool,
}

/// The chain of files that led to a failing load, outermost first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportTrace(pub Vec<PathBuf>);

impl fmt::Display for ImportTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return Ok(());
        }
        f.write_str(" (imported from ")?;
        for (i, path) in self.0.iter().rev().enumerate() {
            if i > 0 {
                f.write_str(" <- ")?;
            }
            write!(f, "{}", path.display())?;
        }
        f.write_str(")")
    }
}

fn display_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to resolve `{file}`{trace}")]
    Resolve {
        file: String,
        trace: ImportTrace,
        #[source]
        source: BoxError,
    },

    #[error("failed to read {}{trace}", .path.display())]
    Read {
        path: PathBuf,
        trace: ImportTrace,
        #[source]
        source: BoxError,
    },

    #[error("failed to parse {}{trace}", .path.display())]
    Parse {
        path: PathBuf,
        trace: ImportTrace,
        #[source]
        source: BoxError,
    },

    #[error("invalid document {}{trace}", .path.display())]
    Schema {
        path: PathBuf,
        trace: ImportTrace,
        #[source]
        source: SchemaError,
    },

    #[error("{} is outside the source root {}{trace}", .path.display(), .root.display())]
    OutsideRoot {
        path: PathBuf,
        root: PathBuf,
        trace: ImportTrace,
    },

    #[error("circular import: {}", display_chain(.chain))]
    CircularImport {
        /// Every file in the cycle, ending with the repeated one.
        chain: Vec<PathBuf>,
    },
}

/// Lexically normalize `path`, folding `.` and `..` without touching the file system.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Anchor a relative root at the working directory before normalizing.
///
/// `"."` would otherwise normalize to the empty path, which every path starts with.
fn absolute_root(root: &Path) -> PathBuf {
    if root.is_absolute() {
        return normalize_path(root);
    }
    match std::env::current_dir() {
        Ok(cwd) => normalize_path(&cwd.join(root)),
        Err(err) => {
            warn!(root = %root.display(), error = %err, "no working directory, keeping relative root");
            normalize_path(root)
        }
    }
}

/// Whether a normalized `path` lies inside the normalized `root`.
fn within_root(path: &Path, root: &Path) -> bool {
    !matches!(path.components().next(), Some(Component::ParentDir)) && path.starts_with(root)
}

/// Loads and caches source documents under one root.
///
/// The cache lock is held for an entire top-level [`load`](Self::load), so
/// concurrent callers are serialized and every path is loaded at most once.
pub struct SourceLoader<I> {
    io: I,
    root: PathBuf,
    cache: Mutex<IndexMap<PathBuf, Arc<Source>>>,
}

impl<I: SourceIo> SourceLoader<I> {
    pub fn new(io: I, root: impl AsRef<Path>) -> Self {
        Self {
            io,
            root: absolute_root(root.as_ref()),
            cache: Mutex::new(IndexMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn io(&self) -> &I {
        &self.io
    }

    /// A previously loaded source, by absolute path.
    pub fn cached(&self, path: &Path) -> Option<Arc<Source>> {
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.get(&normalize_path(path)).cloned()
    }

    /// Number of distinct documents loaded so far.
    pub fn len(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load `file` and everything it imports.
    pub fn load(&self, file: &str) -> Result<Arc<Source>, LoadError> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let mut chain = Vec::new();
        self.load_in(&mut cache, file, &mut chain)
    }

    fn load_in(
        &self,
        cache: &mut IndexMap<PathBuf, Arc<Source>>,
        file: &str,
        chain: &mut Vec<PathBuf>,
    ) -> Result<Arc<Source>, LoadError> {
        let trace = || ImportTrace(chain.clone());

        let path = self
            .io
            .resolve_path(file, &self.root)
            .map(|p| normalize_path(&p))
            .map_err(|source| LoadError::Resolve {
                file: file.to_string(),
                trace: trace(),
                source,
            })?;

        if !within_root(&path, &self.root) {
            return Err(LoadError::OutsideRoot {
                path,
                root: self.root.clone(),
                trace: trace(),
            });
        }
        if chain.contains(&path) {
            let mut cycle = chain.clone();
            cycle.push(path);
            return Err(LoadError::CircularImport { chain: cycle });
        }
        if let Some(source) = cache.get(&path) {
            trace!(path = %path.display(), "source cache hit");
            return Ok(Arc::clone(source));
        }

        let location = SourceLocation {
            root: self.root.clone(),
            file: file.to_string(),
            path: path.clone(),
        };
        let bytes = self.io.read(&path).map_err(|source| LoadError::Read {
            path: path.clone(),
            trace: trace(),
            source,
        })?;
        let raw = self
            .io
            .parse_file_data(&bytes, &location)
            .map_err(|source| LoadError::Parse {
                path: path.clone(),
                trace: trace(),
                source,
            })?;
        let (data, directives) = split_document(raw).map_err(|source| LoadError::Schema {
            path: path.clone(),
            trace: trace(),
            source,
        })?;

        let mut imports = IndexMap::new();
        if let Some(directives) = &directives {
            chain.push(path.clone());
            for (key, import) in &directives.imports {
                let loaded = self.load_in(cache, import.from(), chain);
                match loaded {
                    Ok(source) => {
                        imports.insert(
                            key.clone(),
                            Import {
                                source,
                                build: import.build(),
                            },
                        );
                    }
                    Err(err) => {
                        chain.pop();
                        return Err(err);
                    }
                }
            }
            chain.pop();
        }

        debug!(
            path = %path.display(),
            imports = imports.len(),
            "loaded source"
        );
        let source = Arc::new(Source {
            location,
            data,
            directives,
            imports,
        });
        cache.insert(path, Arc::clone(&source));
        Ok(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemorySourceIo;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn loader(io: MemorySourceIo) -> SourceLoader<MemorySourceIo> {
        SourceLoader::new(io, "/tokens")
    }

    #[test]
    fn normalizes_lexically() {
        assert_eq!(normalize_path(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize_path(Path::new("a/../../b")), PathBuf::from("../b"));
    }

    #[test]
    fn shared_imports_load_once() {
        let io = MemorySourceIo::new()
            .with_json("/tokens/base.json", json!({"a": 1}))
            .with_json(
                "/tokens/left.json",
                json!({"$build": {"imports": {"base": "./base.json"}}}),
            )
            .with_json(
                "/tokens/entry.json",
                json!({"$build": {"imports": {"left": "left.json", "base": "./sub/../base.json"}}}),
            );
        let loader = loader(io);
        let entry = loader.load("entry.json").unwrap();

        let via_left = &entry.imports["left"].source.imports["base"].source;
        let direct = &entry.imports["base"].source;
        assert!(Arc::ptr_eq(via_left, direct));
        assert_eq!(loader.len(), 3);
        assert_eq!(direct.data, json!({"a": 1}));

        let again = loader.load("./entry.json").unwrap();
        assert!(Arc::ptr_eq(&entry, &again));
    }

    #[test]
    fn cycles_name_the_whole_chain() {
        let io = MemorySourceIo::new()
            .with_json("/tokens/a.json", json!({"$build": {"imports": {"b": "b.json"}}}))
            .with_json("/tokens/b.json", json!({"$build": {"imports": {"c": "c.json"}}}))
            .with_json("/tokens/c.json", json!({"$build": {"imports": {"a": "a.json"}}}));
        let loader = loader(io);

        match loader.load("a.json").unwrap_err() {
            LoadError::CircularImport { chain } => assert_eq!(
                chain,
                ["a", "b", "c", "a"]
                    .iter()
                    .map(|n| PathBuf::from(format!("/tokens/{n}.json")))
                    .collect::<Vec<_>>()
            ),
            other => panic!("unexpected {other}"),
        }
        assert!(loader.is_empty());
    }

    #[test]
    fn imports_cannot_escape_the_root() {
        let io = MemorySourceIo::new()
            .with_json("/tokens/entry.json", json!({"$build": {"imports": {"x": "../secret.json"}}}))
            .with_json("/secret.json", json!({}));
        let err = loader(io).load("entry.json").unwrap_err();
        assert!(matches!(&err, LoadError::OutsideRoot { path, trace, .. }
            if path == Path::new("/secret.json") && trace.0 == [PathBuf::from("/tokens/entry.json")]));
        assert!(err.to_string().contains("imported from /tokens/entry.json"));
    }

    #[test]
    fn relative_root_still_guards_parents() {
        let cwd = std::env::current_dir().unwrap();
        let outside = cwd.parent().unwrap().join("secret.json");
        let io = MemorySourceIo::new()
            .with_json(cwd.join("entry.json"), json!({"$build": {"imports": {"x": "../secret.json"}}}))
            .with_json(&outside, json!({"leak": true}));
        let loader = SourceLoader::new(io, ".");
        assert_eq!(loader.root(), cwd.as_path());

        let err = loader.load("entry.json").unwrap_err();
        assert!(matches!(&err, LoadError::OutsideRoot { path, .. } if *path == outside));
    }

    #[test]
    fn parent_components_are_never_within_root() {
        assert!(!within_root(Path::new("../secret.json"), Path::new("")));
        assert!(!within_root(Path::new("../tokens/a.json"), Path::new("../tokens")));
        assert!(within_root(Path::new("tokens/a.json"), Path::new("tokens")));
        assert!(!within_root(Path::new("/tokens2/a.json"), Path::new("/tokens")));
    }

    /// Counts reads per path on top of an in-memory file set.
    struct CountingIo {
        inner: MemorySourceIo,
        reads: Mutex<IndexMap<PathBuf, usize>>,
    }

    impl SourceIo for CountingIo {
        fn resolve_path(&self, file: &str, root: &Path) -> Result<PathBuf, BoxError> {
            self.inner.resolve_path(file, root)
        }

        fn read(&self, path: &Path) -> Result<Vec<u8>, BoxError> {
            *self
                .reads
                .lock()
                .unwrap()
                .entry(path.to_path_buf())
                .or_default() += 1;
            self.inner.read(path)
        }

        fn parse_file_data(&self, bytes: &[u8], location: &SourceLocation) -> Result<Value, BoxError> {
            self.inner.parse_file_data(bytes, location)
        }
    }

    #[test]
    fn concurrent_loads_share_the_cache() {
        let inner = MemorySourceIo::new()
            .with_json("/tokens/base.json", json!({"a": 1}))
            .with_json("/tokens/light.json", json!({"$build": {"imports": {"base": "base.json"}}}))
            .with_json("/tokens/dark.json", json!({"$build": {"imports": {"base": "base.json"}}}));
        let io = CountingIo {
            inner,
            reads: Mutex::new(IndexMap::new()),
        };
        let loader = SourceLoader::new(io, "/tokens");

        let (light, dark) = std::thread::scope(|s| {
            let light = s.spawn(|| loader.load("light.json"));
            let dark = s.spawn(|| loader.load("dark.json"));
            (light.join().unwrap().unwrap(), dark.join().unwrap().unwrap())
        });

        assert!(Arc::ptr_eq(
            &light.imports["base"].source,
            &dark.imports["base"].source
        ));
        assert_eq!(loader.len(), 3);
        let reads = loader.io().reads.lock().unwrap();
        assert_eq!(reads.len(), 3);
        assert!(reads.values().all(|&n| n == 1), "{reads:?}");
    }

    #[test]
    fn missing_and_malformed_files() {
        let io = MemorySourceIo::new()
            .with_text("/tokens/bad.json", "{not json")
            .with_json("/tokens/schema.json", json!({"$build": {"unknown": 1}}))
            .with_json("/tokens/list.json", json!([1, 2]));
        let loader = loader(io);

        assert!(matches!(loader.load("nope.json"), Err(LoadError::Read { .. })));
        assert!(matches!(loader.load("bad.json"), Err(LoadError::Parse { .. })));
        assert!(matches!(loader.load("schema.json"), Err(LoadError::Schema { .. })));
        assert!(matches!(
            loader.load("list.json"),
            Err(LoadError::Schema {
                source: SchemaError::NotAnObject { found: "array" },
                ..
            })
        ));
    }
}
