use std::fmt::{self, Display};

use serde::Serialize;

use crate::target::ExecutionFault;

/// Terminal state of a property run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Passed {
        trials: usize,
    },
    Falsified {
        counterexample: String,
    },
    Faulted {
        input: String,
        fault: ExecutionFault,
    },
}

/// Where a failing input came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum CaseSource {
    Regression { index: usize },
    Generated { trial: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "failure", rename_all = "snake_case")]
pub enum FailureKind {
    /// The target answered, but its answer did not parse back to the input.
    Falsified { returned: String, detail: String },
    Faulted { fault: ExecutionFault },
}

impl FailureKind {
    pub fn same_kind(&self, other: &FailureKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShrunkCase {
    pub input: String,
    pub kind: FailureKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrialFailure {
    pub source: CaseSource,
    /// Exact argument the target was called with.
    pub input: String,
    pub kind: FailureKind,
    pub shrunk: Option<ShrunkCase>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertyReport {
    pub name: String,
    pub target: String,
    pub seed: u64,
    pub trials_requested: usize,
    pub trials_run: usize,
    pub regressions_run: usize,
    pub verdict: Verdict,
    pub failures: Vec<TrialFailure>,
}

impl PropertyReport {
    pub fn passed(&self) -> bool {
        matches!(self.verdict, Verdict::Passed { .. })
    }

    pub fn falsified(&self) -> bool {
        matches!(self.verdict, Verdict::Falsified { .. })
    }

    pub fn faulted(&self) -> bool {
        matches!(self.verdict, Verdict::Faulted { .. })
    }

    /// Every failing input, in the order found; useful for recording regressions.
    pub fn failing_inputs(&self) -> Vec<String> {
        self.failures.iter().map(|f| f.input.clone()).collect()
    }
}

fn write_kind(f: &mut fmt::Formatter<'_>, kind: &FailureKind, indent: &str) -> fmt::Result {
    match kind {
        FailureKind::Falsified { returned, detail } => {
            writeln!(f, "{indent}returned: {returned}")?;
            writeln!(f, "{indent}detail: {detail}")
        }
        FailureKind::Faulted { fault } => {
            writeln!(f, "{indent}fault: {fault}")?;
            if let ExecutionFault::Raised {
                traceback: Some(tb),
                ..
            } = fault
            {
                for line in tb.lines() {
                    writeln!(f, "{indent}  {line}")?;
                }
            }
            Ok(())
        }
    }
}

impl Display for PropertyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [target {}]: ", self.name, self.target)?;
        if self.regressions_run > 0 {
            write!(f, "{} regression cases, ", self.regressions_run)?;
        }
        writeln!(
            f,
            "{}/{} trials, seed {}",
            self.trials_run, self.trials_requested, self.seed
        )?;
        match &self.verdict {
            Verdict::Passed { trials } => writeln!(f, "  verdict: PASSED ({trials} trials)")?,
            Verdict::Falsified { counterexample } => {
                writeln!(f, "  verdict: FALSIFIED")?;
                writeln!(f, "  counterexample: {counterexample}")?;
            }
            Verdict::Faulted { input, .. } => {
                writeln!(f, "  verdict: FAULTED")?;
                writeln!(f, "  input: {input}")?;
            }
        }
        if let Some((first, rest)) = self.failures.split_first() {
            write_kind(f, &first.kind, "  ")?;
            if let Some(shrunk) = &first.shrunk {
                writeln!(f, "  shrunk to: {}", shrunk.input)?;
                write_kind(f, &shrunk.kind, "    ")?;
            }
            for other in rest {
                writeln!(f, "  also failing: {}", other.input)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(verdict: Verdict, failures: Vec<TrialFailure>) -> PropertyReport {
        PropertyReport {
            name: "roundtrip".to_string(),
            target: "rt".to_string(),
            seed: 42,
            trials_requested: 10,
            trials_run: 3,
            regressions_run: 0,
            verdict,
            failures,
        }
    }

    #[test]
    fn passed_summary() {
        let r = report(Verdict::Passed { trials: 3 }, vec![]);
        assert!(r.passed());
        assert_eq!(
            r.to_string(),
            "roundtrip [target rt]: 3/10 trials, seed 42\n  verdict: PASSED (3 trials)\n"
        );
    }

    #[test]
    fn falsified_summary_keeps_input_verbatim() {
        let input = r#"{"5":1,"1":"rfIdufb0"}"#.to_string();
        let r = report(
            Verdict::Falsified {
                counterexample: input.clone(),
            },
            vec![TrialFailure {
                source: CaseSource::Generated { trial: 2 },
                input: input.clone(),
                kind: FailureKind::Falsified {
                    returned: r#"{"1":"rfIdufb0"}"#.to_string(),
                    detail: r#"$: missing key "5""#.to_string(),
                },
                shrunk: None,
            }],
        );
        assert!(r.falsified());
        let text = r.to_string();
        assert!(text.contains(&format!("  counterexample: {input}\n")), "{text}");
        assert!(text.contains("  returned: {\"1\":\"rfIdufb0\"}\n"), "{text}");
        assert_eq!(r.failing_inputs(), vec![input]);
    }

    #[test]
    fn faulted_summary_shows_traceback() {
        let fault = ExecutionFault::Raised {
            exception: "KeyError".to_string(),
            message: "'x'".to_string(),
            traceback: Some("File \"t.py\", line 3, in f\n".to_string()),
        };
        let r = report(
            Verdict::Faulted {
                input: "null".to_string(),
                fault: fault.clone(),
            },
            vec![TrialFailure {
                source: CaseSource::Regression { index: 0 },
                input: "null".to_string(),
                kind: FailureKind::Faulted { fault },
                shrunk: None,
            }],
        );
        assert!(r.faulted());
        let text = r.to_string();
        assert!(text.contains("  verdict: FAULTED\n  input: null\n  fault: KeyError: 'x'\n"));
        assert!(text.contains("    File \"t.py\", line 3, in f\n"));
    }

    #[test]
    fn serializes_with_tags() {
        let r = report(Verdict::Passed { trials: 3 }, vec![]);
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["verdict"]["verdict"], "passed");
        assert_eq!(v["verdict"]["trials"], 3);
    }
}
