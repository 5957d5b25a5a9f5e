use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::Serialize;

/// Why an invocation produced no usable text.
///
/// This is kept apart from falsification: a fault says the call itself went
/// wrong, which may just as well be a harness problem as a target defect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionFault {
    #[error("{exception}: {message}")]
    Raised {
        exception: String,
        message: String,
        traceback: Option<String>,
    },
    #[error("function returned {type_name}, expected str")]
    NonTextResult { type_name: String },
    #[error("target panicked: {message}")]
    Panicked { message: String },
}

/// A named function taking one text argument and returning text.
pub trait Target {
    fn name(&self) -> &str;
    fn invoke(&self, arg: &str) -> Result<String, ExecutionFault>;
}

/// Target backed by a Rust closure.
pub struct FnTarget<F> {
    name: String,
    f: F,
}

impl<F> FnTarget<F>
where
    F: Fn(&str) -> Result<String, ExecutionFault>,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        FnTarget {
            name: name.into(),
            f,
        }
    }
}

impl<F> Target for FnTarget<F>
where
    F: Fn(&str) -> Result<String, ExecutionFault>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, arg: &str) -> Result<String, ExecutionFault> {
        // A panic is a fault of this one call, not a reason to abort the run.
        match catch_unwind(AssertUnwindSafe(|| (self.f)(arg))) {
            Ok(r) => r,
            Err(payload) => Err(ExecutionFault::Panicked {
                message: panic_message(payload.as_ref()),
            }),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
