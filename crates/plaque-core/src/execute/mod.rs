//! Execution of plaque notebooks.
//!
//! Cell code is run by a tree-walking interpreter behind the
//! [`ExecutionBackend`] seam; the [`IncrementalEngine`] decides which cells
//! have to run on each revision.
//!
//! # Module Structure
//!
//! - `value` - Runtime values, scopes and exceptions
//! - `interpreter` - Statement execution and expression evaluation
//! - `ops` - Operators, comparisons and subscripts
//! - `builtins`, `methods`, `modules` - The builtin library
//! - `format` - `repr`/`str` rendering and format specs
//! - `backend` - The backend trait and its interpreter implementation
//! - `context` - Execution callbacks
//! - `engine` - Staleness planning and incremental runs

mod backend;
mod builtins;
mod context;
mod engine;
pub mod format;
mod interpreter;
mod methods;
mod modules;
mod ops;
mod value;

pub use backend::ExecutionBackend;
pub use builtins::names as builtin_names;
pub use context::ExecutionCallback;
pub use engine::{ExecutionPlan, IncrementalEngine, RunReport, StaleReason, UPSTREAM_ERROR};
pub use interpreter::{Interpreter, InterpreterConfig};
pub use value::{Exception, ExceptionKind, Namespace, Value, new_namespace};
