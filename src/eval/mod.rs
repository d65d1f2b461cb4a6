// src/eval/mod.rs

//! Test predicate evaluation.
//!
//! - [`predicate`] holds the declarative checks and result types.
//! - [`sandbox`] defines the executor interface used for script checks.
//! - [`rhai_sandbox`] is the embedded-engine implementation.
//! - [`text`] has the word counting and normalization helpers.
//!
//! Failures never escape an [`Evaluator`]: errors, script exceptions and
//! panics all become a failing [`PredicateResult`] carrying the message.

pub mod predicate;
pub mod rhai_sandbox;
pub mod sandbox;
pub mod text;

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::debug;

use crate::dom::Document;

pub use predicate::{Check, CustomCheck, ElementExpectation, PredicateResult, TestPredicate};
pub use rhai_sandbox::RhaiSandbox;
pub use sandbox::{Sandbox, SandboxLimits, ScriptError, ScriptOutcome, ScriptValue};

/// Runs predicates against submitted code inside a [`Sandbox`].
#[derive(Clone)]
pub struct Evaluator {
    sandbox: Arc<dyn Sandbox>,
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator").finish_non_exhaustive()
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::with_limits(SandboxLimits::default())
    }
}

impl Evaluator {
    pub fn new(sandbox: Arc<dyn Sandbox>) -> Self {
        Self { sandbox }
    }

    pub fn with_limits(limits: SandboxLimits) -> Self {
        Self::new(Arc::new(RhaiSandbox::new(limits)))
    }

    pub fn sandbox(&self) -> &dyn Sandbox {
        self.sandbox.as_ref()
    }

    /// Evaluate a single predicate. Never fails and never panics.
    pub fn evaluate(&self, predicate: &TestPredicate, code: &str) -> PredicateResult {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.run_check(&predicate.check, code)
        }));

        let (pass, error) = match outcome {
            Ok(Ok(pass)) => (pass, None),
            Ok(Err(message)) => (false, Some(message)),
            Err(payload) => (false, Some(panic_message(payload.as_ref()))),
        };
        debug!(predicate = %predicate.id, pass, ?error, "predicate evaluated");

        PredicateResult {
            predicate_id: predicate.id.clone(),
            description: predicate.description.clone(),
            hint: predicate.hint.clone(),
            pass,
            error,
        }
    }

    /// Evaluate every predicate independently, keeping declared order.
    pub fn evaluate_all(&self, predicates: &[TestPredicate], code: &str) -> Vec<PredicateResult> {
        predicates.iter().map(|p| self.evaluate(p, code)).collect()
    }

    fn run_check(&self, check: &Check, code: &str) -> Result<bool, String> {
        match check {
            Check::Contains { pattern } => Ok(predicate::compile_pattern(pattern)?.is_match(code)),
            Check::Absent { pattern } => Ok(!predicate::compile_pattern(pattern)?.is_match(code)),
            Check::WordCount { min } => Ok(text::count_words(code) >= *min),
            Check::FencedCode => Ok(text::has_fenced_code(code)),
            Check::Markup { expect } => all_satisfied(&Document::parse(code), expect),
            Check::Defines { function } => {
                let names = self
                    .sandbox
                    .declared_functions(code)
                    .map_err(|e| e.to_string())?;
                Ok(names.iter().any(|n| n == function))
            }
            Check::Script { assert, template } => {
                let outcome = match template {
                    Some(t) => self
                        .sandbox
                        .run_with_document(code, Some(assert), Document::parse(t)),
                    None => self.sandbox.run_pure(code, Some(assert)),
                };
                outcome
                    .result
                    .map(|value| value.is_true())
                    .map_err(|e| e.to_string())
            }
            Check::Dom { template, expect } => {
                let outcome = self
                    .sandbox
                    .run_with_document(code, None, Document::parse(template));
                outcome.result.map_err(|e| e.to_string())?;
                let doc = outcome
                    .document
                    .ok_or_else(|| "sandbox returned no document".to_string())?;
                all_satisfied(&doc, expect)
            }
            Check::Logs { pattern, call } => {
                let re = predicate::compile_pattern(pattern)?;
                let outcome = self.sandbox.run_pure(code, call.as_deref());
                outcome.result.map_err(|e| e.to_string())?;
                Ok(outcome.logs.iter().any(|line| re.is_match(line)))
            }
            Check::Custom(custom) => custom
                .call(code, self.sandbox.as_ref())
                .map_err(|e| format!("{e:#}")),
        }
    }
}

fn all_satisfied(doc: &Document, expect: &[ElementExpectation]) -> Result<bool, String> {
    for expectation in expect {
        if !expectation.check(doc)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "predicate panicked".to_string()
    }
}
