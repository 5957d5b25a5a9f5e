use std::path::PathBuf;

use anyhow::{ensure, Result};
use crossprop::{regressions, Property, PropertyConfig, PropertyReport, PyScript, ReturnMode};
use tracing::info;

use crate::suite::load_suite;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub script: PathBuf,
    /// Empty means every public function of the script.
    pub functions: Vec<String>,
    pub suite: Option<PathBuf>,
    pub base: PropertyConfig,
    pub return_mode: ReturnMode,
    /// Replay [`regressions::BUILTIN`] before each property's trials.
    pub builtin_regressions: bool,
    pub regressions: Option<PathBuf>,
    pub record_failures: bool,
}

impl RunOptions {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        RunOptions {
            script: script.into(),
            functions: vec![],
            suite: None,
            base: PropertyConfig::default(),
            return_mode: ReturnMode::default(),
            builtin_regressions: true,
            regressions: None,
            record_failures: false,
        }
    }
}

/// A property resolved against the options, before its target is looked up.
#[derive(Debug, Clone)]
pub struct PlannedProperty {
    pub name: String,
    pub function: String,
    pub config: PropertyConfig,
    pub regressions: Vec<String>,
}

pub fn plan(options: &RunOptions, script: &PyScript) -> Result<Vec<PlannedProperty>> {
    if let Some(suite) = &options.suite {
        return Ok(load_suite(suite)?
            .into_iter()
            .map(|entry| PlannedProperty {
                name: entry.name().to_string(),
                config: entry.config(&options.base),
                function: entry.function,
                regressions: entry.regressions,
            })
            .collect());
    }
    let functions = if options.functions.is_empty() {
        script.function_names()?
    } else {
        options.functions.clone()
    };
    ensure!(
        !functions.is_empty(),
        "{} defines no public functions to check",
        script.file_name()
    );
    Ok(functions
        .into_iter()
        .map(|function| PlannedProperty {
            name: function.clone(),
            function,
            config: options.base.clone(),
            regressions: vec![],
        })
        .collect())
}

/// Loads the script and checks every planned property in order.
///
/// Setup problems (unreadable script, unknown function, malformed regression
/// or suite file) are errors; falsifications and faults are in the reports.
pub fn run_properties(options: &RunOptions) -> Result<Vec<PropertyReport>> {
    let script = PyScript::load(&options.script)?;
    let stored = match &options.regressions {
        Some(path) => regressions::load(path)?,
        None => vec![],
    };
    let planned = plan(options, &script)?;

    // resolve every target first, so a typo fails before any trial runs
    let targets = planned
        .iter()
        .map(|p| script.function_with_mode(&p.function, options.return_mode))
        .collect::<Result<Vec<_>>>()?;

    let mut reports = vec![];
    for (p, target) in planned.into_iter().zip(targets) {
        let mut property = Property::new(p.name, p.config);
        if options.builtin_regressions {
            property = property.with_builtin_regressions()?;
        }
        let property = property
            .with_regressions(&stored)?
            .with_regressions(&p.regressions)?;
        let report = property.check(&target);
        if options.record_failures && !report.passed() {
            if let Some(path) = &options.regressions {
                let added = regressions::append(path, &report.failing_inputs())?;
                info!(added, file = %path.display(), "recorded failing inputs");
            }
        }
        reports.push(report);
    }
    Ok(reports)
}

/// 0 when everything passed, 1 when something was falsified, 2 when any
/// target faulted.
pub fn exit_code(reports: &[PropertyReport]) -> u8 {
    if reports.iter().any(|r| r.faulted()) {
        2
    } else if reports.iter().any(|r| r.falsified()) {
        1
    } else {
        0
    }
}
