//! Core of the golden Go → Odin translator.
//!
//! The pipeline is roughly:
//!
//!   source .go (one file, or every `main` file of a directory)
//!     -> lexer     (tokens)
//!     -> parser    (surface AST)
//!     -> census    (signatures, structs, globals; `context`)
//!     -> translate (escape analysis per function, scoped resolution,
//!                   syntax-directed Odin text)
//!     -> compiler  (header + declaration blocks)
//!
//! Every heap-shaped allocation is given one of two disciplines: a frame
//! allocation released with its function, or a reference-counted
//! allocation for values that escape. The `runtime` module locates the
//! `golden` Odin package the output is compiled against.
//!
//! Higher-level tools (the CLI) should depend on this crate rather than
//! reimplementing the pipeline.

// ---------------------------------------------------------------------
// Error handling and configuration
// ---------------------------------------------------------------------

pub mod config;
pub mod error;

// ---------------------------------------------------------------------
// Front-end: lexing, parsing and loading sources
// ---------------------------------------------------------------------

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod source;

// ---------------------------------------------------------------------
// Analysis: types, escapes, scopes and the per-run census
// ---------------------------------------------------------------------

pub mod context;
pub mod escape;
pub mod resolver;
pub mod types;

// ---------------------------------------------------------------------
// Translation and emission
// ---------------------------------------------------------------------

pub mod builtins;
pub mod compiler;
pub mod runtime;
pub mod translate;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use compiler::{CompilationArtifact, compile_path, compile_source, transpile};
pub use config::TranspileOptions;
pub use error::CoreError;
pub use runtime::{install_runtime, runtime_files};
