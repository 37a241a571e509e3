//! Matrix expansion of patches
//!
//! A patch with a `matrix` runs its operations once per combination of the
//! matrix values. Keys are visited in lexicographic order and the first key
//! varies slowest, so `{x: [1, 2], y: [a, b]}` yields `(1,a) (1,b) (2,a) (2,b)`.
//!
//! Each combination first substitutes `${{ matrix.<key> }}` spans in every
//! string of the operation. Other names are left for the document pass that
//! follows in [`compile_operation`].

use std::fmt;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::compile::{compile_operation, CompileError};
use crate::document::{MatrixValue, Patch, PatchOperation};
use crate::operator::{apply_operation, ApplyOptions, PatchError};
use crate::range::{expand_ranges, RangeError, MAX_EXPANSION};
use crate::variables::{resolve_variables, DocumentVariables, Lookup, VariableError, Variables};

const NAMESPACE: &str = "matrix.";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MatrixError {
    #[error("invalid values for matrix key `{key}`")]
    Values {
        key: String,
        #[source]
        source: RangeError,
    },

    #[error("matrix expands to more than {} combinations", MAX_EXPANSION)]
    TooLarge,

    #[error("operation {index} failed{}", combination_hint(.combination))]
    Operation {
        /// 1-based position within the patch.
        index: usize,
        combination: Option<Combination>,
        #[source]
        source: OperationError,
    },
}

fn combination_hint(combination: &Option<Combination>) -> String {
    match combination {
        Some(c) => format!(" for matrix combination ({c})"),
        None => String::new(),
    }
}

/// Failure of a single operation within a patch.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OperationError {
    #[error(transparent)]
    Matrix(#[from] VariableError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Apply(#[from] PatchError),
}

/// One assignment of a value to every matrix key.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Combination(Vec<(String, Value)>);

impl Combination {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match value {
                Value::String(s) => write!(f, "{key}={s}")?,
                other => write!(f, "{key}={other}")?,
            }
        }
        Ok(())
    }
}

/// Exposes one combination as `matrix.<key>`.
///
/// Names outside the `matrix.` namespace are ignored so they survive for a
/// later pass; unknown `matrix.` names are missing.
pub struct MatrixVariables<'a> {
    combination: &'a Combination,
}

impl<'a> MatrixVariables<'a> {
    pub fn new(combination: &'a Combination) -> Self {
        Self { combination }
    }
}

impl Variables for MatrixVariables<'_> {
    fn lookup(&self, name: &str) -> Lookup {
        let Some(key) = name.strip_prefix(NAMESPACE) else {
            return Lookup::Ignore;
        };
        match self.combination.get(key) {
            Some(value) => Lookup::Value(value.clone()),
            None => Lookup::Missing,
        }
    }

    fn names(&self, emit: &mut dyn FnMut(&str)) {
        for (key, _) in self.combination.iter() {
            emit(&format!("{NAMESPACE}{key}"));
        }
    }
}

fn expand_values(key: &str, values: &[MatrixValue]) -> Result<Vec<Value>, MatrixError> {
    let mut out = Vec::new();
    for value in values {
        match value {
            MatrixValue::Number(n) => out.push(Value::Number(n.clone())),
            MatrixValue::String(s) => {
                let expanded = expand_ranges(s).map_err(|source| MatrixError::Values {
                    key: key.to_string(),
                    source,
                })?;
                out.extend(expanded.into_iter().map(Value::String));
            }
        }
    }
    Ok(out)
}

/// Every combination of `patch`'s matrix, or `None` when it runs unconditioned.
///
/// Keys whose value list is empty do not take part.
pub fn combinations(patch: &Patch) -> Result<Option<Vec<Combination>>, MatrixError> {
    let Some(matrix) = &patch.matrix else {
        return Ok(None);
    };

    let mut keys: Vec<(&String, Vec<Value>)> = Vec::new();
    for (key, values) in matrix {
        let values = expand_values(key, values)?;
        if !values.is_empty() {
            keys.push((key, values));
        }
    }
    if keys.is_empty() {
        return Ok(None);
    }
    keys.sort_by(|a, b| a.0.cmp(b.0));

    let mut product = vec![Combination::default()];
    for (key, values) in &keys {
        if product.len().saturating_mul(values.len()) > MAX_EXPANSION {
            return Err(MatrixError::TooLarge);
        }
        product = product
            .iter()
            .flat_map(|base| {
                values.iter().map(move |value| {
                    let mut next = base.clone();
                    next.0.push(((*key).clone(), value.clone()));
                    next
                })
            })
            .collect();
    }
    Ok(Some(product))
}

fn run_operation(
    doc: Value,
    op: &PatchOperation,
    combination: Option<&Combination>,
    options: ApplyOptions,
) -> Result<Value, OperationError> {
    let substituted;
    let op = match combination {
        Some(c) => {
            let vars = MatrixVariables::new(c);
            substituted = op.try_map_strings(&mut |s| resolve_variables(s, &vars))?;
            &substituted
        }
        None => op,
    };

    let compiled = compile_operation(op, &DocumentVariables::new(&doc))?;
    if compiled.is_empty() {
        warn!(mode = %op.mode(), "operation expands to no paths, skipping");
    }
    let doc = compiled
        .iter()
        .try_fold(doc, |acc, c| apply_operation(acc, c, options))?;
    Ok(doc)
}

fn run_operations(
    mut doc: Value,
    patch: &Patch,
    combination: Option<&Combination>,
    options: ApplyOptions,
) -> Result<Value, MatrixError> {
    for (i, op) in patch.operations.iter().enumerate() {
        doc = run_operation(doc, op, combination, options).map_err(|source| {
            MatrixError::Operation {
                index: i + 1,
                combination: combination.cloned(),
                source,
            }
        })?;
    }
    Ok(doc)
}

/// Run every operation of `patch` against `doc`, once per matrix combination.
///
/// Variables not bound by the matrix resolve against the working document as
/// it stands when each operation compiles. The patch's `strict` flag
/// overrides `options`; each operation's own flag overrides both.
pub fn apply_patch(doc: Value, patch: &Patch, options: ApplyOptions) -> Result<Value, MatrixError> {
    let options = ApplyOptions {
        strict: patch.strict.unwrap_or(options.strict),
    };

    match combinations(patch)? {
        None => run_operations(doc, patch, None, options),
        Some(combinations) => {
            debug!(
                patch = patch.name.as_deref().unwrap_or("<unnamed>"),
                count = combinations.len(),
                "expanding matrix"
            );
            combinations
                .iter()
                .try_fold(doc, |acc, c| run_operations(acc, patch, Some(c), options))
        }
    }
}
