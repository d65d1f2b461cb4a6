// src/exec/mod.rs

//! Run execution layer.
//!
//! - [`backend`] provides the [`RunBackend`] trait and the production
//!   [`EvaluatorBackend`], which evaluates predicates off the async threads
//!   and reports back to the workspace runtime with `RunFinished`.

pub mod backend;

pub use backend::{EvaluatorBackend, RunBackend};
