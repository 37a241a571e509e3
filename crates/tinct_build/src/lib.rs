//! Tinct token compiler
//!
//! Turns a graph of design-token documents into filtered token trees:
//! - `source`: load an entry document and everything it imports (cycle and
//!   root-escape checked, one load per file)
//! - `builder`: splice imports, run patches, drop imports, filter exports
//! - `matrix` / `compile` / `operator`: patch execution, from written
//!   operations with `$[[ … ]]` ranges and `${{ … }}` variables down to
//!   single pointer updates
//! - `export`: include/exclude globs over leaf paths
//! - `emit`: CSS custom properties and type declarations for a built tree
//!
//! ```ignore
//! use tinct_build::{build_entry, io::FsSourceIo};
//!
//! let exports = build_entry(FsSourceIo, "tokens", "theme.yaml")?;
//! ```

pub mod builder;
pub mod compile;
pub mod document;
pub mod emit;
pub mod export;
pub mod io;
pub mod matrix;
pub mod operator;
pub mod pointer;
pub mod range;
pub mod similarity;
pub mod source;
pub mod variables;

use std::path::Path;

use serde_json::Value;
use thiserror::Error;

pub use builder::{BuildError, Builder};
pub use compile::{compile_operation, CompileError, CompiledOperation};
pub use document::{
    split_document, BuildDirectives, ImportSpec, MatrixValue, OperationMode, Patch,
    PatchOperation, SchemaError, BUILD_KEY,
};
pub use emit::{TokenEntry, TokenTable};
pub use export::{ExportError, ExportFilter, ExportPatterns};
pub use matrix::{apply_patch, Combination, MatrixError, MatrixVariables};
pub use operator::{apply_operation, apply_to_copy, ApplyOptions, PatchError};
pub use pointer::{Pointer, RawPath};
pub use range::{expand_ranges, RangeError};
pub use source::{Import, LoadError, Source, SourceIo, SourceLoader, SourceLocation};
pub use variables::{
    resolve_value, resolve_variables, DocumentVariables, Lookup, MapVariables, VariableError,
    Variables,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Build(#[from] BuildError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Load `file` under `root` and build it with default options.
pub fn build_entry<I: SourceIo>(io: I, root: impl AsRef<Path>, file: &str) -> Result<Option<Value>> {
    let loader = SourceLoader::new(io, root);
    let source = loader.load(file)?;
    Ok(Builder::new().build(&source)?)
}
