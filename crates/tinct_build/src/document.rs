//! In-memory document shape
//!
//! A source document is a JSON-compatible object. Everything except the
//! [`BUILD_KEY`] entry is token data; the build key holds [`BuildDirectives`].

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::export::ExportPatterns;
use crate::pointer::RawPath;

/// Key holding build directives inside a document.
pub const BUILD_KEY: &str = "$build";

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("document must be an object, found {found}")]
    NotAnObject { found: &'static str },

    #[error("invalid `$build` section: {0}")]
    Directives(#[source] serde_json::Error),
}

/// The `$build` section of a document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildDirectives {
    #[serde(default)]
    pub imports: IndexMap<String, ImportSpec>,
    #[serde(default)]
    pub patches: Vec<Patch>,
    #[serde(default)]
    pub exports: Option<ExportPatterns>,
}

/// One entry of the `imports` map.
///
/// The string shorthand imports a file and builds it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImportSpec {
    File(String),
    Detailed {
        from: String,
        #[serde(default = "default_true")]
        build: bool,
    },
}

fn default_true() -> bool {
    true
}

impl ImportSpec {
    pub fn from(&self) -> &str {
        match self {
            ImportSpec::File(file) => file,
            ImportSpec::Detailed { from, .. } => from,
        }
    }

    pub fn build(&self) -> bool {
        match self {
            ImportSpec::File(_) => true,
            ImportSpec::Detailed { build, .. } => *build,
        }
    }
}

/// A matrix entry value; strings may use range syntax.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatrixValue {
    Number(Number),
    String(String),
}

impl From<&str> for MatrixValue {
    fn from(s: &str) -> Self {
        MatrixValue::String(s.to_string())
    }
}

impl From<i64> for MatrixValue {
    fn from(n: i64) -> Self {
        MatrixValue::Number(n.into())
    }
}

/// An ordered group of operations, optionally repeated over a matrix.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Patch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub strict: Option<bool>,
    #[serde(default)]
    pub matrix: Option<IndexMap<String, Vec<MatrixValue>>>,
    pub operations: Vec<PatchOperation>,
}

impl Patch {
    pub fn new(operations: Vec<PatchOperation>) -> Self {
        Self {
            operations,
            ..Self::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }

    pub fn with_matrix(mut self, key: impl Into<String>, values: Vec<MatrixValue>) -> Self {
        self.matrix
            .get_or_insert_with(IndexMap::new)
            .insert(key.into(), values);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationMode {
    Add,
    Merge,
    Replace,
    Copy,
    Move,
    Remove,
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperationMode::Add => "add",
            OperationMode::Merge => "merge",
            OperationMode::Replace => "replace",
            OperationMode::Copy => "copy",
            OperationMode::Move => "move",
            OperationMode::Remove => "remove",
        })
    }
}

/// A single declarative mutation as written in a document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    Add {
        path: RawPath,
        value: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        strict: Option<bool>,
    },
    Merge {
        path: RawPath,
        value: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        strict: Option<bool>,
    },
    Replace {
        path: RawPath,
        value: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        strict: Option<bool>,
    },
    Copy {
        from: RawPath,
        path: RawPath,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        strict: Option<bool>,
    },
    Move {
        from: RawPath,
        path: RawPath,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        strict: Option<bool>,
    },
    Remove {
        path: RawPath,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        strict: Option<bool>,
    },
}

impl PatchOperation {
    pub fn add(path: impl Into<RawPath>, value: impl Into<Value>) -> Self {
        PatchOperation::Add {
            path: path.into(),
            value: value.into(),
            strict: None,
        }
    }

    pub fn merge(path: impl Into<RawPath>, value: impl Into<Value>) -> Self {
        PatchOperation::Merge {
            path: path.into(),
            value: value.into(),
            strict: None,
        }
    }

    pub fn replace(path: impl Into<RawPath>, value: impl Into<Value>) -> Self {
        PatchOperation::Replace {
            path: path.into(),
            value: value.into(),
            strict: None,
        }
    }

    pub fn copy(from: impl Into<RawPath>, path: impl Into<RawPath>) -> Self {
        PatchOperation::Copy {
            from: from.into(),
            path: path.into(),
            strict: None,
        }
    }

    pub fn move_to(from: impl Into<RawPath>, path: impl Into<RawPath>) -> Self {
        PatchOperation::Move {
            from: from.into(),
            path: path.into(),
            strict: None,
        }
    }

    pub fn remove(path: impl Into<RawPath>) -> Self {
        PatchOperation::Remove {
            path: path.into(),
            strict: None,
        }
    }

    /// Set the per-operation strict override.
    pub fn strict(mut self, value: bool) -> Self {
        match &mut self {
            PatchOperation::Add { strict, .. }
            | PatchOperation::Merge { strict, .. }
            | PatchOperation::Replace { strict, .. }
            | PatchOperation::Copy { strict, .. }
            | PatchOperation::Move { strict, .. }
            | PatchOperation::Remove { strict, .. } => *strict = Some(value),
        }
        self
    }

    pub fn mode(&self) -> OperationMode {
        match self {
            PatchOperation::Add { .. } => OperationMode::Add,
            PatchOperation::Merge { .. } => OperationMode::Merge,
            PatchOperation::Replace { .. } => OperationMode::Replace,
            PatchOperation::Copy { .. } => OperationMode::Copy,
            PatchOperation::Move { .. } => OperationMode::Move,
            PatchOperation::Remove { .. } => OperationMode::Remove,
        }
    }

    /// Rewrite every string in the operation: paths, `from` and value leaves.
    pub fn try_map_strings<E>(
        &self,
        f: &mut dyn FnMut(&str) -> Result<String, E>,
    ) -> Result<Self, E> {
        Ok(match self {
            PatchOperation::Add {
                path,
                value,
                strict,
            } => PatchOperation::Add {
                path: path.map_strings(&mut *f)?,
                value: map_value_strings(value, f)?,
                strict: *strict,
            },
            PatchOperation::Merge {
                path,
                value,
                strict,
            } => PatchOperation::Merge {
                path: path.map_strings(&mut *f)?,
                value: map_value_strings(value, f)?,
                strict: *strict,
            },
            PatchOperation::Replace {
                path,
                value,
                strict,
            } => PatchOperation::Replace {
                path: path.map_strings(&mut *f)?,
                value: map_value_strings(value, f)?,
                strict: *strict,
            },
            PatchOperation::Copy { from, path, strict } => PatchOperation::Copy {
                from: from.map_strings(&mut *f)?,
                path: path.map_strings(&mut *f)?,
                strict: *strict,
            },
            PatchOperation::Move { from, path, strict } => PatchOperation::Move {
                from: from.map_strings(&mut *f)?,
                path: path.map_strings(&mut *f)?,
                strict: *strict,
            },
            PatchOperation::Remove { path, strict } => PatchOperation::Remove {
                path: path.map_strings(&mut *f)?,
                strict: *strict,
            },
        })
    }
}

fn map_value_strings<E>(
    value: &Value,
    f: &mut dyn FnMut(&str) -> Result<String, E>,
) -> Result<Value, E> {
    Ok(match value {
        Value::String(s) => Value::String(f(s)?),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| map_value_strings(v, &mut *f))
                .collect::<Result<_, _>>()?,
        ),
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), map_value_strings(v, &mut *f)?);
            }
            Value::Object(out)
        }
        other => other.clone(),
    })
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Split a parsed document into token data and its build directives.
pub fn split_document(raw: Value) -> Result<(Value, Option<BuildDirectives>), SchemaError> {
    let Value::Object(mut map) = raw else {
        return Err(SchemaError::NotAnObject {
            found: value_kind(&raw),
        });
    };
    let directives = match map.shift_remove(BUILD_KEY) {
        Some(section) => Some(serde_json::from_value(section).map_err(SchemaError::Directives)?),
        None => None,
    };
    Ok((Value::Object(map), directives))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn splits_build_section_from_data() {
        let raw = json!({
            "color": {"red": "#f00"},
            "$build": {
                "imports": {
                    "base": "./base.yaml",
                    "palette": {"from": "./palette.yaml", "build": false}
                },
                "patches": [{
                    "name": "alias",
                    "operations": [
                        {"op": "copy", "from": "/color/red", "path": "/color/danger"},
                        {"op": "remove", "path": ["color", "red"], "strict": true}
                    ]
                }],
                "exports": ["color/**"]
            }
        });

        let (data, directives) = split_document(raw).unwrap();
        assert_eq!(data, json!({"color": {"red": "#f00"}}));

        let directives = directives.unwrap();
        assert_eq!(directives.imports["base"].from(), "./base.yaml");
        assert!(directives.imports["base"].build());
        assert!(!directives.imports["palette"].build());

        let patch = &directives.patches[0];
        assert_eq!(patch.name.as_deref(), Some("alias"));
        assert_eq!(
            patch.operations,
            vec![
                PatchOperation::copy("/color/red", "/color/danger"),
                PatchOperation::remove(RawPath::Segments(vec!["color".into(), "red".into()]))
                    .strict(true),
            ]
        );
        assert_eq!(
            directives.exports.unwrap().include,
            vec!["color/**".to_string()]
        );
    }

    #[test]
    fn documents_without_build_section() {
        let (data, directives) = split_document(json!({"a": 1})).unwrap();
        assert_eq!(data, json!({"a": 1}));
        assert!(directives.is_none());
    }

    #[test]
    fn rejects_non_objects_and_bad_sections() {
        assert!(matches!(
            split_document(json!([1, 2])),
            Err(SchemaError::NotAnObject { found: "array" })
        ));

        let err = split_document(json!({"$build": {"patches": [{"operations": [{"op": "frob"}]}]}}))
            .unwrap_err();
        assert!(matches!(err, SchemaError::Directives(_)));

        let err = split_document(json!({"$build": {"improts": {}}})).unwrap_err();
        assert!(err.to_string().contains("improts"));
    }

    #[test]
    fn maps_every_string_of_an_operation() {
        let op = PatchOperation::add("/a/${{x}}", json!({"v": ["${{x}}", 1]}));
        let mapped = op
            .try_map_strings(&mut |s| Ok::<_, ()>(s.replace("${{x}}", "X")))
            .unwrap();
        assert_eq!(mapped, PatchOperation::add("/a/X", json!({"v": ["X", 1]})));
    }
}
