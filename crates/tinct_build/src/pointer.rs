//! Pointer paths into document trees
//!
//! Paths use the JSON-Pointer spelling: `/`-delimited segments where `~` is
//! written `~0` and `/` is written `~1`. The empty string addresses the root.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Escape a single segment for use inside a pointer string.
pub fn escape_segment(segment: &str) -> String {
    if !segment.contains(['~', '/']) {
        return segment.to_string();
    }
    segment.replace('~', "~0").replace('/', "~1")
}

/// Undo [`escape_segment`].
pub fn unescape_segment(segment: &str) -> String {
    if !segment.contains('~') {
        return segment.to_string();
    }
    segment.replace("~1", "/").replace("~0", "~")
}

/// Join segments into an escaped pointer string.
///
/// The empty segment list maps to the root pointer `""`.
pub fn to_patch_path<S: AsRef<str>>(segments: &[S]) -> String {
    let mut out = String::new();
    for segment in segments {
        out.push('/');
        out.push_str(&escape_segment(segment.as_ref()));
    }
    out
}

/// Split a pointer string into unescaped segments.
///
/// A single leading `/` is optional, so `a/b` and `/a/b` address the same
/// node. `""` is the root; `"/"` is the single empty-named key.
pub fn to_pointer(path: &str) -> Vec<String> {
    if path.is_empty() {
        return Vec::new();
    }
    let body = path.strip_prefix('/').unwrap_or(path);
    body.split('/').map(unescape_segment).collect()
}

/// A path as written in a document: either a pointer string or an explicit
/// segment list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPath {
    Pointer(String),
    Segments(Vec<String>),
}

impl RawPath {
    /// The escaped pointer spelling, templating left untouched.
    pub fn to_patch_path(&self) -> String {
        match self {
            RawPath::Pointer(p) => {
                if p.is_empty() || p.starts_with('/') {
                    p.clone()
                } else {
                    format!("/{p}")
                }
            }
            RawPath::Segments(segments) => to_patch_path(segments),
        }
    }

    pub(crate) fn map_strings<F, E>(&self, mut f: F) -> Result<Self, E>
    where
        F: FnMut(&str) -> Result<String, E>,
    {
        Ok(match self {
            RawPath::Pointer(p) => RawPath::Pointer(f(p)?),
            RawPath::Segments(segments) => RawPath::Segments(
                segments
                    .iter()
                    .map(|s| f(s))
                    .collect::<Result<Vec<_>, E>>()?,
            ),
        })
    }
}

impl From<&str> for RawPath {
    fn from(p: &str) -> Self {
        RawPath::Pointer(p.to_string())
    }
}

impl From<String> for RawPath {
    fn from(p: String) -> Self {
        RawPath::Pointer(p)
    }
}

impl From<Vec<String>> for RawPath {
    fn from(segments: Vec<String>) -> Self {
        RawPath::Segments(segments)
    }
}

/// A fully resolved path: unescaped segments with no templating left.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Pointer(Vec<String>);

impl Pointer {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn parse(path: &str) -> Self {
        Self(to_pointer(path))
    }

    pub fn from_segments(segments: Vec<String>) -> Self {
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pointer to the first `len` segments.
    pub fn prefix(&self, len: usize) -> Pointer {
        Pointer(self.0[..len.min(self.0.len())].to_vec())
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_patch_path(&self.0))
    }
}
