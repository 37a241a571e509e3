//! Export filtering
//!
//! Every scalar leaf of a built tree is addressed by its `/`-joined key path
//! (`color/red/500`, no leading slash). A leaf survives when it matches at
//! least one `include` glob and no `exclude` glob. Containers emptied by the
//! filter are dropped.

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("invalid export pattern `{pattern}`")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("failed to compile export patterns")]
    Build(#[source] globset::Error),
}

/// Declared export surface of a document.
///
/// Accepts either `{include, exclude}` or a bare list of include patterns.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "PatternsRepr")]
pub struct ExportPatterns {
    pub include: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PatternsRepr {
    Include(Vec<String>),
    Full {
        include: Vec<String>,
        #[serde(default)]
        exclude: Vec<String>,
    },
}

impl From<PatternsRepr> for ExportPatterns {
    fn from(repr: PatternsRepr) -> Self {
        match repr {
            PatternsRepr::Include(include) => Self {
                include,
                exclude: Vec::new(),
            },
            PatternsRepr::Full { include, exclude } => Self { include, exclude },
        }
    }
}

impl ExportPatterns {
    pub fn include<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            include: patterns.into_iter().map(Into::into).collect(),
            exclude: Vec::new(),
        }
    }

    pub fn exclude<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Whether anything can be exported at all.
    pub fn has_include(&self) -> bool {
        self.include.iter().any(|p| !p.trim().is_empty())
    }
}

fn compile(pattern: &str) -> Result<Glob, ExportError> {
    let normalized = pattern.trim().trim_start_matches('/');
    GlobBuilder::new(normalized)
        .literal_separator(true)
        .build()
        .map_err(|source| ExportError::Pattern {
            pattern: pattern.to_string(),
            source,
        })
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, ExportError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns.iter().filter(|p| !p.trim().is_empty()) {
        builder.add(compile(pattern)?);
    }
    builder.build().map_err(ExportError::Build)
}

/// Compiled include/exclude matcher.
#[derive(Clone, Debug)]
pub struct ExportFilter {
    include: GlobSet,
    exclude: GlobSet,
}

impl ExportFilter {
    pub fn new(patterns: &ExportPatterns) -> Result<Self, ExportError> {
        Ok(Self {
            include: build_globset(&patterns.include)?,
            exclude: build_globset(&patterns.exclude)?,
        })
    }

    /// Whether the leaf at `path` (`a/b/c`) is exported.
    ///
    /// Keys are joined verbatim, so a `/` inside a key matches like a
    /// separator: `{"a/b": 1}` and `{"a": {"b": 1}}` share the path `a/b`.
    pub fn is_exported(&self, path: &str) -> bool {
        self.include.is_match(path) && !self.exclude.is_match(path)
    }

    /// Keep only exported leaves of `tree`.
    ///
    /// The result is always an object; a fully filtered tree is `{}`.
    pub fn filter(&self, tree: &Value) -> Value {
        let mut path = String::new();
        match self.filter_node(tree, &mut path) {
            Some(Value::Object(map)) => Value::Object(map),
            _ => Value::Object(Map::new()),
        }
    }

    fn filter_child(&self, key: &str, child: &Value, path: &mut String) -> Option<Value> {
        let len = path.len();
        if !path.is_empty() {
            path.push('/');
        }
        path.push_str(key);
        let kept = self.filter_node(child, path);
        path.truncate(len);
        kept
    }

    fn filter_node(&self, node: &Value, path: &mut String) -> Option<Value> {
        match node {
            Value::Object(map) => {
                let mut out = Map::new();
                for (k, v) in map {
                    if let Some(kept) = self.filter_child(k, v, path) {
                        out.insert(k.clone(), kept);
                    }
                }
                (!out.is_empty()).then_some(Value::Object(out))
            }
            Value::Array(items) => {
                let out: Vec<Value> = items
                    .iter()
                    .enumerate()
                    .filter_map(|(i, v)| self.filter_child(&i.to_string(), v, path))
                    .collect();
                (!out.is_empty()).then_some(Value::Array(out))
            }
            leaf => self.is_exported(path).then(|| leaf.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn tree() -> Value {
        json!({
            "color": {"red": "#f00", "blue": "#00f"},
            "secret": {"token": "abc", "nested": {"key": 1}},
            "space": [4, 8],
            ".hidden": {"x": true}
        })
    }

    #[test]
    fn include_everything() {
        let filter = ExportFilter::new(&ExportPatterns::include(["**"])).unwrap();
        assert_eq!(filter.filter(&tree()), tree());
    }

    #[test]
    fn exclude_subtree() {
        let patterns = ExportPatterns::include(["**"]).exclude(["secret/**"]);
        let filter = ExportFilter::new(&patterns).unwrap();
        assert_eq!(
            filter.filter(&tree()),
            json!({
                "color": {"red": "#f00", "blue": "#00f"},
                "space": [4, 8],
                ".hidden": {"x": true}
            })
        );
    }

    #[test]
    fn single_star_stays_within_a_segment() {
        let filter = ExportFilter::new(&ExportPatterns::include(["color/*", "/space/1"])).unwrap();
        assert_eq!(
            filter.filter(&tree()),
            json!({"color": {"red": "#f00", "blue": "#00f"}, "space": [8]})
        );
        assert!(!filter.is_exported("secret/nested/key"));
    }

    #[test]
    fn slashes_in_keys_match_as_separators() {
        let tree = json!({"a/b": 1, "a": {"b": 2, "c": 3}, "a/b/c": 4});
        let filter = ExportFilter::new(&ExportPatterns::include(["a/b"])).unwrap();
        assert_eq!(filter.filter(&tree), json!({"a/b": 1, "a": {"b": 2}}));
    }

    #[test]
    fn fully_filtered_tree_is_empty_object() {
        let filter = ExportFilter::new(&ExportPatterns::include(["nothing/**"])).unwrap();
        assert_eq!(filter.filter(&tree()), json!({}));
    }

    #[test]
    fn bad_pattern_is_reported() {
        let err = ExportFilter::new(&ExportPatterns::include(["color/[z-a"])).unwrap_err();
        assert!(err.to_string().contains("color/[z-a"));
    }

    #[test]
    fn deserializes_both_shapes() {
        let list: ExportPatterns = serde_json::from_value(json!(["a/**"])).unwrap();
        assert_eq!(list, ExportPatterns::include(["a/**"]));
        let full: ExportPatterns =
            serde_json::from_value(json!({"include": ["**"], "exclude": ["b"]})).unwrap();
        assert_eq!(full, ExportPatterns::include(["**"]).exclude(["b"]));
    }
}
