/*
Shared helpers for the runner integration tests; an 'old style' mod.rs so the
test runner does not treat it as a test crate of its own.
 */

use std::path::PathBuf;

use crossprop::{GeneratorConfig, PropertyConfig, PyScript};
use crossprop_runner::RunOptions;
use lazy_static::lazy_static;

lazy_static! {
    #[allow(dead_code)]
    pub static ref DEMO_SCRIPT: PyScript =
        PyScript::load(demo_script()).expect("demo script loads");
}

pub fn demo_script() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../demos/json_roundtrip.py")
}

#[allow(dead_code)]
pub fn options(functions: &[&str], trials: usize, seed: u64, max_depth: usize) -> RunOptions {
    RunOptions {
        functions: functions.iter().map(|f| f.to_string()).collect(),
        base: PropertyConfig {
            trials,
            seed,
            generator: GeneratorConfig {
                max_depth,
                ..GeneratorConfig::default()
            },
            ..PropertyConfig::default()
        },
        ..RunOptions::new(demo_script())
    }
}
