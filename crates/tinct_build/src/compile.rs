//! Compilation of written operations into concrete ones
//!
//! Paths go through range expansion and then variable resolution; each
//! resulting string becomes one [`Pointer`]. Values only get variable
//! resolution.

use serde_json::Value;
use thiserror::Error;

use crate::document::{OperationMode, PatchOperation};
use crate::pointer::{Pointer, RawPath};
use crate::range::{expand_ranges, RangeError};
use crate::variables::{resolve_value, resolve_variables, VariableError, Variables};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    #[error(transparent)]
    Range(#[from] RangeError),

    #[error(transparent)]
    Variable(#[from] VariableError),

    #[error(
        "`{mode}` expands to {} target paths but {} source paths (path: [{}], from: [{}])",
        .paths.len(),
        .froms.len(),
        .paths.join(", "),
        .froms.join(", ")
    )]
    Arity {
        mode: OperationMode,
        paths: Vec<String>,
        froms: Vec<String>,
    },
}

/// An operation with concrete paths and resolved values.
#[derive(Clone, Debug, PartialEq)]
pub enum CompiledOperation {
    Add {
        path: Pointer,
        value: Value,
        strict: Option<bool>,
    },
    Merge {
        path: Pointer,
        value: Value,
        strict: Option<bool>,
    },
    Replace {
        path: Pointer,
        value: Value,
        strict: Option<bool>,
    },
    Copy {
        from: Pointer,
        path: Pointer,
        strict: Option<bool>,
    },
    Move {
        from: Pointer,
        path: Pointer,
        strict: Option<bool>,
    },
    Remove {
        path: Pointer,
        strict: Option<bool>,
    },
}

impl CompiledOperation {
    pub fn mode(&self) -> OperationMode {
        match self {
            CompiledOperation::Add { .. } => OperationMode::Add,
            CompiledOperation::Merge { .. } => OperationMode::Merge,
            CompiledOperation::Replace { .. } => OperationMode::Replace,
            CompiledOperation::Copy { .. } => OperationMode::Copy,
            CompiledOperation::Move { .. } => OperationMode::Move,
            CompiledOperation::Remove { .. } => OperationMode::Remove,
        }
    }

    pub fn path(&self) -> &Pointer {
        match self {
            CompiledOperation::Add { path, .. }
            | CompiledOperation::Merge { path, .. }
            | CompiledOperation::Replace { path, .. }
            | CompiledOperation::Copy { path, .. }
            | CompiledOperation::Move { path, .. }
            | CompiledOperation::Remove { path, .. } => path,
        }
    }

    pub fn strict(&self) -> Option<bool> {
        match self {
            CompiledOperation::Add { strict, .. }
            | CompiledOperation::Merge { strict, .. }
            | CompiledOperation::Replace { strict, .. }
            | CompiledOperation::Copy { strict, .. }
            | CompiledOperation::Move { strict, .. }
            | CompiledOperation::Remove { strict, .. } => *strict,
        }
    }
}

/// Expand a written path into every concrete pointer it denotes.
pub fn expand_path(path: &RawPath, vars: &dyn Variables) -> Result<Vec<Pointer>, CompileError> {
    expand_ranges(&path.to_patch_path())?
        .iter()
        .map(|p| Ok(Pointer::parse(&resolve_variables(p, vars)?)))
        .collect()
}

fn pair_sources(
    mode: OperationMode,
    froms: Vec<Pointer>,
    paths: Vec<Pointer>,
) -> Result<Vec<(Pointer, Pointer)>, CompileError> {
    if froms.len() == 1 {
        let from = &froms[0];
        return Ok(paths.into_iter().map(|p| (from.clone(), p)).collect());
    }
    if froms.len() == paths.len() {
        return Ok(froms.into_iter().zip(paths).collect());
    }
    Err(CompileError::Arity {
        mode,
        paths: paths.iter().map(ToString::to_string).collect(),
        froms: froms.iter().map(ToString::to_string).collect(),
    })
}

/// Compile `op` against `vars`.
///
/// An operation whose path expands to nothing compiles to an empty list.
pub fn compile_operation(
    op: &PatchOperation,
    vars: &dyn Variables,
) -> Result<Vec<CompiledOperation>, CompileError> {
    Ok(match op {
        PatchOperation::Add {
            path,
            value,
            strict,
        } => {
            let value = resolve_value(value, vars)?;
            expand_path(path, vars)?
                .into_iter()
                .map(|path| CompiledOperation::Add {
                    path,
                    value: value.clone(),
                    strict: *strict,
                })
                .collect()
        }
        PatchOperation::Merge {
            path,
            value,
            strict,
        } => {
            let value = resolve_value(value, vars)?;
            expand_path(path, vars)?
                .into_iter()
                .map(|path| CompiledOperation::Merge {
                    path,
                    value: value.clone(),
                    strict: *strict,
                })
                .collect()
        }
        PatchOperation::Replace {
            path,
            value,
            strict,
        } => {
            let value = resolve_value(value, vars)?;
            expand_path(path, vars)?
                .into_iter()
                .map(|path| CompiledOperation::Replace {
                    path,
                    value: value.clone(),
                    strict: *strict,
                })
                .collect()
        }
        PatchOperation::Copy { from, path, strict } => {
            let paths = expand_path(path, vars)?;
            if paths.is_empty() {
                return Ok(Vec::new());
            }
            pair_sources(OperationMode::Copy, expand_path(from, vars)?, paths)?
                .into_iter()
                .map(|(from, path)| CompiledOperation::Copy {
                    from,
                    path,
                    strict: *strict,
                })
                .collect()
        }
        PatchOperation::Move { from, path, strict } => {
            let paths = expand_path(path, vars)?;
            if paths.is_empty() {
                return Ok(Vec::new());
            }
            pair_sources(OperationMode::Move, expand_path(from, vars)?, paths)?
                .into_iter()
                .map(|(from, path)| CompiledOperation::Move {
                    from,
                    path,
                    strict: *strict,
                })
                .collect()
        }
        PatchOperation::Remove { path, strict } => expand_path(path, vars)?
            .into_iter()
            .map(|path| CompiledOperation::Remove {
                path,
                strict: *strict,
            })
            .collect(),
    })
}
