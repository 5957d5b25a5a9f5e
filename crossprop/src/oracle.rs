//! Reference side of the round trip: serde_json serializes the generated
//! value and parses whatever the target returned. None of this code is
//! shared with the target, so agreement between the two is meaningful.

use std::fmt::{self, Display};

use serde::Serialize;
use serde_json::Value;

/// Canonical JSON text for a generated value (compact, no whitespace).
pub fn canonical_text(value: &Value) -> String {
    value.to_string()
}

pub fn reference_parse(text: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(text)
}

/// First place where `actual` departs from `expected`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Difference {
    /// `$`-rooted path, e.g. `$.items[2]`.
    pub path: String,
    pub kind: DifferenceKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DifferenceKind {
    MissingKey { key: String },
    UnexpectedKey { key: String },
    LengthMismatch { expected: usize, actual: usize },
    ValueMismatch { expected: Value, actual: Value },
}

impl Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DifferenceKind::MissingKey { key } => {
                write!(f, "{}: missing key {}", self.path, Value::from(key.as_str()))
            }
            DifferenceKind::UnexpectedKey { key } => {
                write!(f, "{}: unexpected key {}", self.path, Value::from(key.as_str()))
            }
            DifferenceKind::LengthMismatch { expected, actual } => write!(
                f,
                "{}: expected {expected} elements, got {actual}",
                self.path
            ),
            DifferenceKind::ValueMismatch { expected, actual } => {
                write!(f, "{}: expected {expected}, got {actual}", self.path)
            }
        }
    }
}

/// Structural comparison; object key order is irrelevant, numbers compare
/// exactly (`1` and `1.0` differ). Returns `None` iff the values are equal.
pub fn first_difference(expected: &Value, actual: &Value) -> Option<Difference> {
    if expected == actual {
        return None;
    }
    let mut path = "$".to_string();
    Some(diff_at(&mut path, expected, actual).unwrap_or_else(|| Difference {
        path: "$".to_string(),
        kind: DifferenceKind::ValueMismatch {
            expected: expected.clone(),
            actual: actual.clone(),
        },
    }))
}

fn diff_at(path: &mut String, expected: &Value, actual: &Value) -> Option<Difference> {
    match (expected, actual) {
        (Value::Object(e), Value::Object(a)) => {
            for key in e.keys() {
                if !a.contains_key(key) {
                    return Some(Difference {
                        path: path.clone(),
                        kind: DifferenceKind::MissingKey { key: key.clone() },
                    });
                }
            }
            for key in a.keys() {
                if !e.contains_key(key) {
                    return Some(Difference {
                        path: path.clone(),
                        kind: DifferenceKind::UnexpectedKey { key: key.clone() },
                    });
                }
            }
            for (key, ev) in e {
                let len = path.len();
                push_key(path, key);
                let d = diff_at(path, ev, &a[key]);
                path.truncate(len);
                if d.is_some() {
                    return d;
                }
            }
            None
        }
        (Value::Array(e), Value::Array(a)) => {
            if e.len() != a.len() {
                return Some(Difference {
                    path: path.clone(),
                    kind: DifferenceKind::LengthMismatch {
                        expected: e.len(),
                        actual: a.len(),
                    },
                });
            }
            for (idx, (ev, av)) in e.iter().zip(a).enumerate() {
                let len = path.len();
                path.push_str(&format!("[{idx}]"));
                let d = diff_at(path, ev, av);
                path.truncate(len);
                if d.is_some() {
                    return d;
                }
            }
            None
        }
        _ if expected == actual => None,
        _ => Some(Difference {
            path: path.clone(),
            kind: DifferenceKind::ValueMismatch {
                expected: expected.clone(),
                actual: actual.clone(),
            },
        }),
    }
}

fn push_key(path: &mut String, key: &str) {
    let plain = !key.is_empty()
        && !key.starts_with(|c: char| c.is_ascii_digit())
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        path.push('.');
        path.push_str(key);
    } else {
        path.push('[');
        path.push_str(&Value::from(key).to_string());
        path.push(']');
    }
}
