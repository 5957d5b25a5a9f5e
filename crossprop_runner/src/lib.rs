pub mod run;
pub mod suite;

pub use run::{exit_code, plan, run_properties, PlannedProperty, RunOptions};
pub use suite::{load_suite, parse_suite, SuiteEntry};
