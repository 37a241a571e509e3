//! Document collaborators
//!
//! [`FsSourceIo`] reads documents from disk; [`MemorySourceIo`] serves them
//! from a table. Both pick a format from the file extension: `.json`,
//! `.yaml`/`.yml` or `.toml`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use crate::source::{normalize_path, BoxError, SourceIo, SourceLocation};

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("unsupported document format `{extension}`")]
    Unsupported { extension: String },

    #[error("document is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

/// Parse `bytes` according to the extension of `path`.
pub fn parse_document(bytes: &[u8], path: &Path) -> Result<Value, FormatError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    match extension.as_str() {
        "json" => Ok(serde_json::from_slice(bytes)?),
        "yaml" | "yml" => Ok(serde_yaml::from_slice(bytes)?),
        "toml" => Ok(toml::from_str(std::str::from_utf8(bytes)?)?),
        _ => Err(FormatError::Unsupported { extension }),
    }
}

fn resolve_in(file: &str, root: &Path) -> PathBuf {
    let file = Path::new(file);
    if file.is_absolute() {
        normalize_path(file)
    } else {
        normalize_path(&root.join(file))
    }
}

/// Reads documents from the local file system.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsSourceIo;

impl SourceIo for FsSourceIo {
    fn resolve_path(&self, file: &str, root: &Path) -> Result<PathBuf, BoxError> {
        Ok(resolve_in(file, root))
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>, BoxError> {
        Ok(std::fs::read(path)?)
    }

    fn parse_file_data(&self, bytes: &[u8], location: &SourceLocation) -> Result<Value, BoxError> {
        Ok(parse_document(bytes, &location.path)?)
    }
}

#[derive(Debug, Error)]
#[error("no document at {}", .0.display())]
pub struct NotFound(pub PathBuf);

/// Serves documents from memory, keyed by absolute path.
#[derive(Clone, Debug, Default)]
pub struct MemorySourceIo {
    files: HashMap<PathBuf, Vec<u8>>,
}

impl MemorySourceIo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) {
        self.files
            .insert(normalize_path(path.as_ref()), contents.into());
    }

    pub fn with_text(mut self, path: impl AsRef<Path>, contents: &str) -> Self {
        self.insert(path, contents);
        self
    }

    /// Store `value` serialized as JSON; the path should end in `.json`.
    pub fn with_json(mut self, path: impl AsRef<Path>, value: Value) -> Self {
        self.insert(path, value.to_string());
        self
    }
}

impl SourceIo for MemorySourceIo {
    fn resolve_path(&self, file: &str, root: &Path) -> Result<PathBuf, BoxError> {
        Ok(resolve_in(file, root))
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>, BoxError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| NotFound(path.to_path_buf()).into())
    }

    fn parse_file_data(&self, bytes: &[u8], location: &SourceLocation) -> Result<Value, BoxError> {
        Ok(parse_document(bytes, &location.path)?)
    }
}
