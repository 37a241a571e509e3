//! Patch operator
//!
//! Applies one [`CompiledOperation`] to a document tree. The tree is taken by
//! value and the updated tree returned; use [`apply_to_copy`] to keep the
//! input untouched.
//!
//! Strict mode checks existence:
//!
//! | mode      | strict requires                                   |
//! |-----------|---------------------------------------------------|
//! | `add`     | target absent, every parent present               |
//! | `replace` | target present                                    |
//! | `merge`   | target present                                    |
//! | `copy`    | like `add`, plus `from` present (always required) |
//! | `move`    | like `copy`                                       |
//! | `remove`  | target present                                    |
//!
//! Array segments must be canonical indices (`0`, `12`) or `-` for the end of
//! the array. An index may point one past the end (append) but never further,
//! in any mode.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::trace;

use crate::compile::CompiledOperation;
use crate::document::value_kind;
use crate::pointer::Pointer;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PatchError {
    #[error("path `{path}` already exists, use `replace` or non-strict mode")]
    PathExists { path: String },

    #[error("path `{path}` does not exist, use `add` or non-strict mode")]
    PathMissing { path: String },

    #[error("writing `{path}` would create `{created}`, use non-strict mode")]
    CreatedIntermediate { path: String, created: String },

    #[error("source path `{from}` does not exist")]
    FromMissing { from: String },

    #[error("`{segment}` is not a valid array index at `{path}`")]
    InvalidIndex { path: String, segment: String },

    #[error("array index {index} at `{path}` is out of range (length {len})")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },

    #[error("cannot address `{path}`: parent is {found}")]
    NotContainer { path: String, found: &'static str },

    #[error("the document root can only be replaced with an object, found {found}")]
    RootNotObject { found: &'static str },
}

/// Defaults applied when an operation carries no `strict` override.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    pub strict: bool,
}

impl ApplyOptions {
    pub fn strict() -> Self {
        Self { strict: true }
    }

    pub fn lenient() -> Self {
        Self { strict: false }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Write {
    Add,
    Replace,
    Merge,
}

fn parse_index(segment: &str, len: usize, at: &Pointer) -> Result<usize, PatchError> {
    if segment == "-" {
        return Ok(len);
    }
    let canonical = match segment.as_bytes() {
        [b'0'] => true,
        [first, rest @ ..] => first.is_ascii_digit() && *first != b'0' && rest.iter().all(u8::is_ascii_digit),
        [] => false,
    };
    let index = canonical
        .then(|| segment.parse::<usize>().ok())
        .flatten()
        .ok_or_else(|| PatchError::InvalidIndex {
            path: at.to_string(),
            segment: segment.to_string(),
        })?;
    if index > len {
        return Err(PatchError::IndexOutOfRange {
            path: at.to_string(),
            index,
            len,
        });
    }
    Ok(index)
}

fn new_container() -> Value {
    Value::Object(Map::new())
}

/// Step into `segment`, creating an empty object when it is missing.
fn child_or_create<'v>(
    node: &'v mut Value,
    segment: &str,
    at: &Pointer,
    created: &mut Option<Pointer>,
) -> Result<&'v mut Value, PatchError> {
    match node {
        Value::Object(map) => {
            if !map.contains_key(segment) && created.is_none() {
                *created = Some(at.clone());
            }
            Ok(map.entry(segment).or_insert_with(new_container))
        }
        Value::Array(items) => {
            let index = parse_index(segment, items.len(), at)?;
            if index == items.len() {
                if created.is_none() {
                    *created = Some(at.clone());
                }
                items.push(new_container());
            }
            Ok(&mut items[index])
        }
        other => Err(PatchError::NotContainer {
            path: at.to_string(),
            found: value_kind(other),
        }),
    }
}

fn get<'v>(doc: &'v Value, path: &Pointer) -> Result<Option<&'v Value>, PatchError> {
    let mut node = doc;
    for (depth, segment) in path.segments().iter().enumerate() {
        node = match node {
            Value::Object(map) => match map.get(segment) {
                Some(child) => child,
                None => return Ok(None),
            },
            Value::Array(items) => {
                let index = parse_index(segment, items.len(), &path.prefix(depth + 1))?;
                match items.get(index) {
                    Some(child) => child,
                    None => return Ok(None),
                }
            }
            _ => return Ok(None),
        };
    }
    Ok(Some(node))
}

fn parent_mut<'v>(doc: &'v mut Value, path: &Pointer) -> Result<Option<&'v mut Value>, PatchError> {
    let parents = &path.segments()[..path.len().saturating_sub(1)];
    let mut node = doc;
    for (depth, segment) in parents.iter().enumerate() {
        node = match node {
            Value::Object(map) => match map.get_mut(segment) {
                Some(child) => child,
                None => return Ok(None),
            },
            Value::Array(items) => {
                let index = parse_index(segment, items.len(), &path.prefix(depth + 1))?;
                match items.get_mut(index) {
                    Some(child) => child,
                    None => return Ok(None),
                }
            }
            _ => return Ok(None),
        };
    }
    Ok(Some(node))
}

/// Detach the node at `path`, if any.
fn take(doc: &mut Value, path: &Pointer) -> Result<Option<Value>, PatchError> {
    let Some(last) = path.segments().last() else {
        return Ok(Some(std::mem::replace(doc, new_container())));
    };
    let Some(parent) = parent_mut(doc, path)? else {
        return Ok(None);
    };
    match parent {
        Value::Object(map) => Ok(map.shift_remove(last.as_str())),
        Value::Array(items) => {
            let index = parse_index(last, items.len(), path)?;
            Ok((index < items.len()).then(|| items.remove(index)))
        }
        _ => Ok(None),
    }
}

fn deep_merge(target: &mut Value, value: Value) {
    match (target, value) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, v) in incoming {
                match existing.get_mut(&key) {
                    Some(slot) => deep_merge(slot, v),
                    None => {
                        existing.insert(key, v);
                    }
                }
            }
        }
        (target, value) => *target = value,
    }
}

fn overwrite(existing: &mut Value, value: Value, write: Write) {
    if write == Write::Merge {
        deep_merge(existing, value);
    } else {
        *existing = value;
    }
}

fn write_root(doc: &mut Value, value: Value, write: Write) -> Result<(), PatchError> {
    if !value.is_object() {
        return Err(PatchError::RootNotObject {
            found: value_kind(&value),
        });
    }
    if write == Write::Merge && doc.is_object() {
        deep_merge(doc, value);
    } else {
        *doc = value;
    }
    Ok(())
}

fn write(doc: &mut Value, path: &Pointer, value: Value, write: Write, strict: bool) -> Result<(), PatchError> {
    let Some((last, parents)) = path.segments().split_last() else {
        return write_root(doc, value, write);
    };

    let mut created = None;
    let mut node = doc;
    for (depth, segment) in parents.iter().enumerate() {
        node = child_or_create(node, segment, &path.prefix(depth + 1), &mut created)?;
    }

    let exists = match &*node {
        Value::Object(map) => map.contains_key(last.as_str()),
        Value::Array(items) => parse_index(last, items.len(), path)? < items.len(),
        other => {
            return Err(PatchError::NotContainer {
                path: path.to_string(),
                found: value_kind(other),
            })
        }
    };

    if strict {
        match write {
            Write::Add => {
                if let Some(created) = created {
                    return Err(PatchError::CreatedIntermediate {
                        path: path.to_string(),
                        created: created.to_string(),
                    });
                }
                if exists {
                    return Err(PatchError::PathExists {
                        path: path.to_string(),
                    });
                }
            }
            Write::Replace | Write::Merge => {
                if !exists {
                    return Err(PatchError::PathMissing {
                        path: path.to_string(),
                    });
                }
            }
        }
    }

    match node {
        Value::Object(map) => match map.get_mut(last.as_str()) {
            Some(existing) => overwrite(existing, value, write),
            None => {
                map.insert(last.clone(), value);
            }
        },
        Value::Array(items) => {
            let index = parse_index(last, items.len(), path)?;
            match items.get_mut(index) {
                Some(existing) => overwrite(existing, value, write),
                None => items.push(value),
            }
        }
        _ => {} // scalars rejected above
    }
    Ok(())
}

/// Apply `op` to an owned tree and return the updated tree.
pub fn apply_operation(
    mut doc: Value,
    op: &CompiledOperation,
    options: ApplyOptions,
) -> Result<Value, PatchError> {
    let strict = op.strict().unwrap_or(options.strict);
    trace!(mode = %op.mode(), path = %op.path(), strict, "applying operation");

    match op {
        CompiledOperation::Add { path, value, .. } => {
            write(&mut doc, path, value.clone(), Write::Add, strict)?;
        }
        CompiledOperation::Replace { path, value, .. } => {
            write(&mut doc, path, value.clone(), Write::Replace, strict)?;
        }
        CompiledOperation::Merge { path, value, .. } => {
            write(&mut doc, path, value.clone(), Write::Merge, strict)?;
        }
        CompiledOperation::Copy { from, path, .. } => {
            let value = get(&doc, from)?
                .cloned()
                .ok_or_else(|| PatchError::FromMissing {
                    from: from.to_string(),
                })?;
            write(&mut doc, path, value, Write::Add, strict)?;
        }
        CompiledOperation::Move { from, path, .. } => {
            let value = take(&mut doc, from)?.ok_or_else(|| PatchError::FromMissing {
                from: from.to_string(),
            })?;
            write(&mut doc, path, value, Write::Add, strict)?;
        }
        CompiledOperation::Remove { path, .. } => {
            if path.is_root() {
                return Ok(new_container());
            }
            if take(&mut doc, path)?.is_none() && strict {
                return Err(PatchError::PathMissing {
                    path: path.to_string(),
                });
            }
        }
    }
    Ok(doc)
}

/// Apply `op` to a copy of `doc`.
pub fn apply_to_copy(
    doc: &Value,
    op: &CompiledOperation,
    options: ApplyOptions,
) -> Result<Value, PatchError> {
    apply_operation(doc.clone(), op, options)
}

/// Apply a sequence of operations in order, stopping at the first failure.
pub fn apply_operations<'a>(
    doc: Value,
    ops: impl IntoIterator<Item = &'a CompiledOperation>,
    options: ApplyOptions,
) -> Result<Value, PatchError> {
    ops.into_iter()
        .try_fold(doc, |acc, op| apply_operation(acc, op, options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn add(path: &str, value: Value) -> CompiledOperation {
        CompiledOperation::Add {
            path: Pointer::parse(path),
            value,
            strict: None,
        }
    }

    fn replace(path: &str, value: Value) -> CompiledOperation {
        CompiledOperation::Replace {
            path: Pointer::parse(path),
            value,
            strict: None,
        }
    }

    fn merge(path: &str, value: Value) -> CompiledOperation {
        CompiledOperation::Merge {
            path: Pointer::parse(path),
            value,
            strict: None,
        }
    }

    fn remove(path: &str) -> CompiledOperation {
        CompiledOperation::Remove {
            path: Pointer::parse(path),
            strict: None,
        }
    }

    fn copy(from: &str, path: &str) -> CompiledOperation {
        CompiledOperation::Copy {
            from: Pointer::parse(from),
            path: Pointer::parse(path),
            strict: None,
        }
    }

    fn move_to(from: &str, path: &str) -> CompiledOperation {
        CompiledOperation::Move {
            from: Pointer::parse(from),
            path: Pointer::parse(path),
            strict: None,
        }
    }

    const LENIENT: ApplyOptions = ApplyOptions { strict: false };
    const STRICT: ApplyOptions = ApplyOptions { strict: true };

    #[test]
    fn add_creates_intermediates_when_lenient() {
        let doc = json!({"a": 1});
        let out = apply_to_copy(&doc, &add("/b/c", json!(2)), LENIENT).unwrap();
        assert_eq!(out, json!({"a": 1, "b": {"c": 2}}));
        assert_eq!(doc, json!({"a": 1}));
    }

    #[test]
    fn strict_add_rejects_created_intermediates() {
        let err = apply_to_copy(&json!({"a": 1}), &add("/b/c", json!(2)), STRICT).unwrap_err();
        assert_eq!(
            err,
            PatchError::CreatedIntermediate {
                path: "/b/c".into(),
                created: "/b".into()
            }
        );
    }

    #[test]
    fn strict_add_rejects_existing_target() {
        let doc = json!({"a": 1});
        let err = apply_to_copy(&doc, &add("/a", json!(2)), STRICT).unwrap_err();
        assert!(matches!(err, PatchError::PathExists { .. }));
        assert_eq!(
            apply_to_copy(&doc, &add("/a", json!(2)), LENIENT).unwrap(),
            json!({"a": 2})
        );
    }

    #[test]
    fn operation_strictness_overrides_options() {
        let op = CompiledOperation::Add {
            path: Pointer::parse("/b/c"),
            value: json!(1),
            strict: Some(false),
        };
        assert!(apply_to_copy(&json!({}), &op, STRICT).is_ok());
    }

    #[test]
    fn replace_inverts_strictness() {
        let doc = json!({"a": 1});
        assert!(matches!(
            apply_to_copy(&doc, &replace("/b", json!(2)), STRICT),
            Err(PatchError::PathMissing { .. })
        ));
        assert_eq!(
            apply_to_copy(&doc, &replace("/a", json!(2)), STRICT).unwrap(),
            json!({"a": 2})
        );
        assert_eq!(
            apply_to_copy(&doc, &replace("/b", json!(2)), LENIENT).unwrap(),
            json!({"a": 1, "b": 2})
        );
    }

    #[test]
    fn root_writes_need_objects() {
        let doc = json!({"a": 1});
        assert_eq!(
            apply_to_copy(&doc, &add("", json!({"z": 0})), LENIENT).unwrap(),
            json!({"z": 0})
        );
        assert_eq!(
            apply_to_copy(&doc, &add("", json!([1])), LENIENT).unwrap_err(),
            PatchError::RootNotObject { found: "array" }
        );
        assert_eq!(
            apply_to_copy(&doc, &merge("", json!({"b": 2})), LENIENT).unwrap(),
            json!({"a": 1, "b": 2})
        );
        assert!(apply_to_copy(&doc, &merge("", json!("x")), LENIENT).is_err());
    }

    #[test]
    fn merge_is_deep() {
        let doc = json!({"color": {"red": {"500": "#f00", "600": "#c00"}, "blue": "#00f"}});
        let out = apply_to_copy(
            &doc,
            &merge("/color", json!({"red": {"500": "#e00", "700": "#a00"}, "blue": {"500": "#00f"}})),
            LENIENT,
        )
        .unwrap();
        assert_eq!(
            out,
            json!({"color": {
                "red": {"500": "#e00", "600": "#c00", "700": "#a00"},
                "blue": {"500": "#00f"}
            }})
        );
        assert!(matches!(
            apply_to_copy(&doc, &merge("/font", json!({})), STRICT),
            Err(PatchError::PathMissing { .. })
        ));
    }

    #[test]
    fn remove_semantics() {
        let doc = json!({"a": 1, "b": {"c": 2}});
        assert_eq!(
            apply_to_copy(&doc, &remove("/b/c"), LENIENT).unwrap(),
            json!({"a": 1, "b": {}})
        );

        let missing = json!({"a": 1});
        assert!(matches!(
            apply_to_copy(&missing, &remove("/b/c"), STRICT),
            Err(PatchError::PathMissing { .. })
        ));
        assert_eq!(apply_to_copy(&missing, &remove("/b/c"), LENIENT).unwrap(), missing);
        assert_eq!(apply_to_copy(&doc, &remove(""), STRICT).unwrap(), json!({}));
    }

    #[test]
    fn copy_and_move() {
        let doc = json!({"base": {"red": "#f00"}, "list": [1, 2, 3]});
        assert_eq!(
            apply_to_copy(&doc, &copy("/base/red", "/alias/danger"), LENIENT).unwrap(),
            json!({"base": {"red": "#f00"}, "list": [1, 2, 3], "alias": {"danger": "#f00"}})
        );
        assert_eq!(
            apply_to_copy(&doc, &move_to("/list/0", "/first"), LENIENT).unwrap(),
            json!({"base": {"red": "#f00"}, "list": [2, 3], "first": 1})
        );
        assert_eq!(
            apply_to_copy(&doc, &copy("/nope", "/x"), LENIENT).unwrap_err(),
            PatchError::FromMissing { from: "/nope".into() }
        );

        let strict_copy = CompiledOperation::Copy {
            from: Pointer::parse("/base/red"),
            path: Pointer::parse("/base/red"),
            strict: Some(true),
        };
        assert!(matches!(
            apply_to_copy(&doc, &strict_copy, LENIENT),
            Err(PatchError::PathExists { .. })
        ));
        assert_eq!(
            apply_to_copy(&doc, &copy("/list/5", "/x"), LENIENT).unwrap_err(),
            PatchError::IndexOutOfRange {
                path: "/list/5".into(),
                index: 5,
                len: 3
            }
        );
    }

    #[test]
    fn move_into_root_requires_object() {
        let doc = json!({"theme": {"a": 1}, "n": 3});
        assert_eq!(
            apply_to_copy(&doc, &move_to("/theme", ""), LENIENT).unwrap(),
            json!({"a": 1})
        );
        assert!(matches!(
            apply_to_copy(&doc, &move_to("/n", ""), LENIENT),
            Err(PatchError::RootNotObject { found: "number" })
        ));
    }

    #[test]
    fn array_boundaries() {
        let doc = json!({"list": [1, 2]});
        assert_eq!(
            apply_to_copy(&doc, &add("/list/2", json!(3)), STRICT).unwrap(),
            json!({"list": [1, 2, 3]})
        );
        assert_eq!(
            apply_to_copy(&doc, &add("/list/-", json!(3)), LENIENT).unwrap(),
            json!({"list": [1, 2, 3]})
        );
        assert_eq!(
            apply_to_copy(&doc, &add("/list/0", json!(9)), LENIENT).unwrap(),
            json!({"list": [9, 2]})
        );
        assert_eq!(
            apply_to_copy(&doc, &add("/list/3", json!(3)), LENIENT).unwrap_err(),
            PatchError::IndexOutOfRange {
                path: "/list/3".into(),
                index: 3,
                len: 2
            }
        );
        for bad in ["01", "+1", "1.0", "x"] {
            assert!(matches!(
                apply_to_copy(&doc, &add(&format!("/list/{bad}"), json!(0)), LENIENT),
                Err(PatchError::InvalidIndex { .. })
            ));
        }
        assert_eq!(
            apply_to_copy(&doc, &add("/list/2/name", json!("x")), LENIENT).unwrap(),
            json!({"list": [1, 2, {"name": "x"}]})
        );
    }

    #[test]
    fn scalars_cannot_be_descended() {
        let err = apply_to_copy(&json!({"a": "str"}), &add("/a/b", json!(1)), LENIENT).unwrap_err();
        assert_eq!(
            err,
            PatchError::NotContainer {
                path: "/a/b".into(),
                found: "string"
            }
        );
    }

    #[test]
    fn operations_apply_in_sequence() {
        let ops = vec![add("/a", json!(1)), copy("/a", "/b"), remove("/a")];
        assert_eq!(
            apply_operations(json!({}), &ops, LENIENT).unwrap(),
            json!({"b": 1})
        );
    }
}
