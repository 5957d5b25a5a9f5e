pub mod checker;
pub mod oracle;
pub mod regressions;
pub mod report;
pub mod target;
pub mod value_gen;

#[cfg(feature = "python")]
pub mod py_target;
#[cfg(feature = "python")]
mod pyjson;

pub use checker::{run_trial, FailurePolicy, Property, PropertyConfig, TrialOutcome};
pub use report::{CaseSource, FailureKind, PropertyReport, TrialFailure, Verdict};
pub use target::{ExecutionFault, FnTarget, Target};
pub use value_gen::{GeneratorConfig, ValueStream};

#[cfg(feature = "python")]
pub use py_target::{PyScript, ReturnMode, ScriptFunction};
