//! Build orchestration
//!
//! Building a [`Source`] splices its imports into a working copy of its data,
//! runs its patches in order, drops the import keys again and filters what is
//! left through the declared exports. Results are memoized per path, so a
//! document imported from several places is built once.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::export::{ExportError, ExportFilter};
use crate::matrix::{apply_patch, MatrixError};
use crate::operator::ApplyOptions;
use crate::source::Source;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to build import `{key}` of {}", .path.display())]
    Import {
        path: PathBuf,
        key: String,
        #[source]
        source: Box<BuildError>,
    },

    #[error("patch {index}{} failed in {}", patch_name(.name), .path.display())]
    Patch {
        path: PathBuf,
        /// 1-based position among the document's patches.
        index: usize,
        name: Option<String>,
        #[source]
        source: MatrixError,
    },

    #[error("invalid exports in {}", .path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: ExportError,
    },
}

fn patch_name(name: &Option<String>) -> String {
    name.as_deref()
        .map(|n| format!(" (`{n}`)"))
        .unwrap_or_default()
}

impl BuildError {
    /// The document the innermost failure happened in.
    pub fn path(&self) -> &Path {
        match self {
            BuildError::Import { source, .. } => source.path(),
            BuildError::Patch { path, .. } | BuildError::Export { path, .. } => path,
        }
    }
}

/// Builds sources and remembers their exports.
#[derive(Debug, Default)]
pub struct Builder {
    options: ApplyOptions,
    exports: IndexMap<PathBuf, Option<Value>>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default strictness for patches that do not set their own.
    pub fn with_options(options: ApplyOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Exports of an already built document.
    pub fn built(&self, path: &Path) -> Option<&Option<Value>> {
        self.exports.get(path)
    }

    /// Build `source` (and, transitively, its imports).
    ///
    /// Returns `None` when the document exports nothing.
    pub fn build(&mut self, source: &Source) -> Result<Option<Value>, BuildError> {
        if let Some(exports) = self.exports.get(source.path()) {
            return Ok(exports.clone());
        }
        let exports = self.build_uncached(source)?;
        self.exports
            .insert(source.path().to_path_buf(), exports.clone());
        Ok(exports)
    }

    fn build_uncached(&mut self, source: &Source) -> Result<Option<Value>, BuildError> {
        let path = source.path();
        let Some(directives) = &source.directives else {
            return Ok(None);
        };
        let Some(patterns) = directives.exports.as_ref().filter(|e| e.has_include()) else {
            debug!(path = %path.display(), "no exports declared, skipping build");
            return Ok(None);
        };
        let filter = ExportFilter::new(patterns).map_err(|source| BuildError::Export {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = %path.display(), "building source");
        let mut doc = source.data.clone();
        for (key, import) in &source.imports {
            let spliced = if import.build {
                self.build(&import.source)
                    .map_err(|err| BuildError::Import {
                        path: path.to_path_buf(),
                        key: key.clone(),
                        source: Box::new(err),
                    })?
            } else {
                Some(import.source.data.clone())
            };
            match (spliced, &mut doc) {
                (Some(value), Value::Object(map)) => {
                    map.insert(key.clone(), value);
                }
                (None, _) => warn!(
                    path = %path.display(),
                    import = %key,
                    "import exports nothing"
                ),
                _ => {}
            }
        }

        for (i, patch) in directives.patches.iter().enumerate() {
            debug!(
                path = %path.display(),
                index = i + 1,
                name = patch.name.as_deref().unwrap_or_default(),
                operations = patch.operations.len(),
                "applying patch"
            );
            doc = apply_patch(doc, patch, self.options).map_err(|source| BuildError::Patch {
                path: path.to_path_buf(),
                index: i + 1,
                name: patch.name.clone(),
                source,
            })?;
        }

        if let Value::Object(map) = &mut doc {
            for key in source.imports.keys() {
                map.shift_remove(key);
            }
        }
        Ok(Some(filter.filter(&doc)))
    }
}
