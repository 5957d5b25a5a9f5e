use anyhow::{Context, Result};
use proptest::strategy::ValueTree;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    oracle::{canonical_text, first_difference, reference_parse},
    regressions,
    report::{CaseSource, FailureKind, PropertyReport, ShrunkCase, TrialFailure, Verdict},
    target::Target,
    value_gen::{GeneratorConfig, ValueStream},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the first failing trial.
    #[default]
    HaltOnFirst,
    /// Run every trial and keep all failures; the verdict follows the first.
    Continue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyConfig {
    pub trials: usize,
    pub seed: u64,
    pub generator: GeneratorConfig,
    pub failure_policy: FailurePolicy,
    pub shrink: bool,
    pub max_shrink_iters: u32,
}

impl Default for PropertyConfig {
    fn default() -> Self {
        PropertyConfig {
            trials: 10,
            seed: 0,
            generator: GeneratorConfig::default(),
            failure_policy: FailurePolicy::default(),
            shrink: false,
            max_shrink_iters: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrialOutcome {
    Passed,
    Failed(FailureKind),
}

/// One round trip: call the target with `input` and compare what it returns,
/// parsed by the reference parser, against `expected`.
pub fn run_trial(target: &dyn Target, input: &str, expected: &Value) -> TrialOutcome {
    let returned = match target.invoke(input) {
        Ok(returned) => returned,
        Err(fault) => return TrialOutcome::Failed(FailureKind::Faulted { fault }),
    };
    let detail = match reference_parse(&returned) {
        Err(e) => format!("returned text is not valid JSON: {e}"),
        Ok(actual) => match first_difference(expected, &actual) {
            None => return TrialOutcome::Passed,
            Some(d) => d.to_string(),
        },
    };
    TrialOutcome::Failed(FailureKind::Falsified { returned, detail })
}

struct RegressionCase {
    text: String,
    value: Value,
}

/// A round-trip property over one target.
///
/// Checking consumes the property: it goes from not run, through running,
/// to exactly one terminal [`Verdict`], and cannot be re-entered.
pub struct Property {
    name: String,
    config: PropertyConfig,
    regressions: Vec<RegressionCase>,
}

#[derive(PartialEq)]
enum Flow {
    Continue,
    Halt,
}

impl Property {
    pub fn new(name: impl Into<String>, config: PropertyConfig) -> Self {
        Property {
            name: name.into(),
            config,
            regressions: vec![],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &PropertyConfig {
        &self.config
    }

    /// Adds an exact input text replayed before the random trials.
    pub fn with_regression(mut self, text: &str) -> Result<Self> {
        let value = reference_parse(text)
            .with_context(|| format!("regression input is not valid JSON: {text}"))?;
        if !self.regressions.iter().any(|r| r.text == text) {
            self.regressions.push(RegressionCase {
                text: text.to_string(),
                value,
            });
        }
        Ok(self)
    }

    pub fn with_regressions<I, S>(self, texts: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        texts
            .into_iter()
            .try_fold(self, |p, t| p.with_regression(t.as_ref()))
    }

    /// Adds the permanent regression cases from [`regressions::BUILTIN`].
    pub fn with_builtin_regressions(self) -> Result<Self> {
        self.with_regressions(regressions::BUILTIN)
    }

    pub fn check(self, target: &dyn Target) -> PropertyReport {
        info!(
            property = %self.name,
            target = target.name(),
            trials = self.config.trials,
            seed = self.config.seed,
            "running property"
        );
        let mut run = Run {
            report: PropertyReport {
                name: self.name.clone(),
                target: target.name().to_string(),
                seed: self.config.seed,
                trials_requested: self.config.trials,
                trials_run: 0,
                regressions_run: 0,
                verdict: Verdict::Passed { trials: 0 },
                failures: vec![],
            },
            policy: self.config.failure_policy,
        };

        for (index, case) in self.regressions.iter().enumerate() {
            debug!(index, input = %case.text, "regression case");
            let outcome = run_trial(target, &case.text, &case.value);
            run.report.regressions_run += 1;
            if run.record(CaseSource::Regression { index }, &case.text, outcome, None)
                == Flow::Halt
            {
                return run.finish();
            }
        }

        let stream = ValueStream::new(&self.config.generator, self.config.seed);
        for (trial, mut tree) in stream.trees().take(self.config.trials).enumerate() {
            let value = tree.current();
            let text = canonical_text(&value);
            debug!(trial, input = %text, "trial");
            let outcome = run_trial(target, &text, &value);
            run.report.trials_run += 1;
            let shrunk = match &outcome {
                TrialOutcome::Failed(kind) if self.config.shrink => {
                    self.shrink(target, &mut tree, kind)
                }
                _ => None,
            };
            if run.record(CaseSource::Generated { trial }, &text, outcome, shrunk) == Flow::Halt
            {
                break;
            }
        }
        run.finish()
    }

    /// Simplify a failing value as long as it keeps failing the same way.
    fn shrink<T: ValueTree<Value = Value>>(
        &self,
        target: &dyn Target,
        tree: &mut T,
        original: &FailureKind,
    ) -> Option<ShrunkCase> {
        let mut best = None;
        let mut iters = 0;
        if !tree.simplify() {
            return None;
        }
        loop {
            iters += 1;
            if iters > self.config.max_shrink_iters {
                break;
            }
            let value = tree.current();
            let text = canonical_text(&value);
            match run_trial(target, &text, &value) {
                TrialOutcome::Failed(kind) if kind.same_kind(original) => {
                    best = Some(ShrunkCase { input: text, kind });
                    if !tree.simplify() {
                        break;
                    }
                }
                _ => {
                    if !tree.complicate() {
                        break;
                    }
                }
            }
        }
        debug!(iters, shrunk = best.is_some(), "shrinking done");
        best
    }
}

struct Run {
    report: PropertyReport,
    policy: FailurePolicy,
}

impl Run {
    fn record(
        &mut self,
        source: CaseSource,
        input: &str,
        outcome: TrialOutcome,
        shrunk: Option<ShrunkCase>,
    ) -> Flow {
        let kind = match outcome {
            TrialOutcome::Passed => return Flow::Continue,
            TrialOutcome::Failed(kind) => kind,
        };
        match &kind {
            FailureKind::Falsified { detail, .. } => {
                warn!(property = %self.report.name, input, detail = %detail, "falsified")
            }
            FailureKind::Faulted { fault } => {
                warn!(property = %self.report.name, input, fault = %fault, "execution fault")
            }
        }
        self.report.failures.push(TrialFailure {
            source,
            input: input.to_string(),
            kind,
            shrunk,
        });
        match self.policy {
            FailurePolicy::HaltOnFirst => Flow::Halt,
            FailurePolicy::Continue => Flow::Continue,
        }
    }

    fn finish(mut self) -> PropertyReport {
        self.report.verdict = match self.report.failures.first() {
            None => Verdict::Passed {
                trials: self.report.trials_run,
            },
            Some(TrialFailure {
                input,
                kind: FailureKind::Falsified { .. },
                ..
            }) => Verdict::Falsified {
                counterexample: input.clone(),
            },
            Some(TrialFailure {
                input,
                kind: FailureKind::Faulted { fault },
                ..
            }) => Verdict::Faulted {
                input: input.clone(),
                fault: fault.clone(),
            },
        };
        info!(property = %self.report.name, verdict = ?self.report.verdict, "property done");
        self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{ExecutionFault, FnTarget};

    fn echo() -> FnTarget<impl Fn(&str) -> Result<String, ExecutionFault>> {
        FnTarget::new("echo", |s: &str| Ok(s.to_string()))
    }

    #[test]
    fn zero_trials_is_vacuously_passed() {
        let config = PropertyConfig {
            trials: 0,
            ..PropertyConfig::default()
        };
        let r = Property::new("p", config).check(&echo());
        assert_eq!(r.verdict, Verdict::Passed { trials: 0 });
        assert_eq!(r.trials_run, 0);
        assert_eq!(r.regressions_run, 0);
    }

    #[test]
    fn identity_passes_all_trials() {
        let config = PropertyConfig {
            trials: 200,
            seed: 5,
            ..PropertyConfig::default()
        };
        let r = Property::new("p", config).check(&echo());
        assert_eq!(r.verdict, Verdict::Passed { trials: 200 });
    }

    #[test]
    fn run_trial_distinguishes_outcomes() {
        let expected = serde_json::json!([1]);
        assert_eq!(run_trial(&echo(), "[1]", &expected), TrialOutcome::Passed);

        let garbage = FnTarget::new("garbage", |_: &str| Ok("[1".to_string()));
        match run_trial(&garbage, "[1]", &expected) {
            TrialOutcome::Failed(FailureKind::Falsified { returned, detail }) => {
                assert_eq!(returned, "[1");
                assert!(detail.starts_with("returned text is not valid JSON"), "{detail}");
            }
            other => panic!("unexpected {other:?}"),
        }

        let raising = FnTarget::new("raising", |_: &str| {
            Err(ExecutionFault::NonTextResult {
                type_name: "int".to_string(),
            })
        });
        assert!(matches!(
            run_trial(&raising, "[1]", &expected),
            TrialOutcome::Failed(FailureKind::Faulted { .. })
        ));
    }

    #[test]
    fn invalid_regression_is_a_setup_error() {
        assert!(Property::new("p", PropertyConfig::default())
            .with_regression("{nope")
            .is_err());
    }

    #[test]
    fn duplicate_regressions_run_once() {
        let p = Property::new(
            "p",
            PropertyConfig {
                trials: 0,
                ..PropertyConfig::default()
            },
        )
        .with_regressions(["{}", "{}", "[]"])
        .unwrap();
        assert_eq!(p.check(&echo()).regressions_run, 2);
    }
}
