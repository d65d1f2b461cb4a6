// src/eval/sandbox.rs

//! Sandbox executor abstraction.
//!
//! Submitted code never runs against ambient state. A [`Sandbox`] offers two
//! capability variants:
//! - [`Sandbox::run_pure`]: no globals besides a capturing `console`.
//! - [`Sandbox::run_with_document`]: additionally binds `document` to a
//!   freshly parsed, non-live [`Document`].
//!
//! Production code uses [`super::RhaiSandbox`]; tests may provide their own.

use std::time::Duration;

use thiserror::Error;

use crate::dom::Document;

/// Resource budgets applied to every script execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxLimits {
    /// Maximum number of engine operations per execution.
    pub max_operations: u64,
    /// Wall-clock budget per execution.
    pub timeout: Duration,
    /// Maximum function call nesting.
    pub max_call_depth: usize,
    pub max_string_size: usize,
    pub max_array_size: usize,
    pub max_map_size: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            max_operations: 500_000,
            timeout: Duration::from_millis(2_000),
            max_call_depth: 64,
            max_string_size: 64 * 1024,
            max_array_size: 10_000,
            max_map_size: 10_000,
        }
    }
}

/// Why a script did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    /// The code does not parse.
    #[error("syntax error: {0}")]
    Compile(String),

    /// The script threw a value; the message is the thrown value itself.
    #[error("{0}")]
    Thrown(String),

    /// Any other runtime failure (unknown function, type mismatch...).
    #[error("{0}")]
    Runtime(String),

    #[error("{0}")]
    BudgetExceeded(String),

    #[error("execution timed out after {0:?}")]
    Timeout(Duration),
}

/// Final value of a script, reduced to what checks care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptValue {
    Unit,
    Bool(bool),
    /// Any other value, rendered as text.
    Text(String),
}

impl ScriptValue {
    pub fn is_true(&self) -> bool {
        matches!(self, ScriptValue::Bool(true))
    }
}

/// Everything observable about one sandboxed execution.
#[derive(Debug, Clone)]
pub struct ScriptOutcome {
    pub result: Result<ScriptValue, ScriptError>,
    /// Lines written through `console.*` and `print`, in order.
    ///
    /// Lines emitted before a failure are kept.
    pub logs: Vec<String>,
    /// The document after execution (DOM mode only).
    pub document: Option<Document>,
}

/// Isolated execution context for untrusted submissions.
pub trait Sandbox: Send + Sync {
    /// Run `code`, then `follow_up` (if any) in the same scope, with no
    /// ambient document.
    fn run_pure(&self, code: &str, follow_up: Option<&str>) -> ScriptOutcome;

    /// Run `code`, then `follow_up` (if any), with `document` bound to the
    /// given tree.
    fn run_with_document(
        &self,
        code: &str,
        follow_up: Option<&str>,
        document: Document,
    ) -> ScriptOutcome;

    /// Names of the functions `code` declares, without running it.
    fn declared_functions(&self, code: &str) -> Result<Vec<String>, ScriptError>;
}
