/*
Shared helpers for the integration tests; kept as common/mod.rs so the test
runner does not treat this file as a test crate of its own.
 */

use crossprop::{ExecutionFault, FnTarget, Property, PropertyConfig, PropertyReport, Target};
use serde_json::{Map, Value};

pub type TextFn = fn(&str) -> Result<String, ExecutionFault>;

pub fn target(name: &str, f: TextFn) -> FnTarget<TextFn> {
    FnTarget::new(name, f)
}

pub fn reencode(text: &str) -> Result<String, ExecutionFault> {
    let v: Value = serde_json::from_str(text).map_err(|e| ExecutionFault::Raised {
        exception: "ParseError".to_string(),
        message: e.to_string(),
        traceback: None,
    })?;
    Ok(v.to_string())
}

fn drop_out_of_range_keys(v: Value) -> Value {
    match v {
        Value::Object(entries) => {
            let len = entries.len();
            let kept: Map<String, Value> = entries
                .into_iter()
                .filter(|(k, _)| match k.parse::<usize>() {
                    Ok(idx) if k.chars().all(|c| c.is_ascii_digit()) => idx < len,
                    _ => true,
                })
                .map(|(k, v)| (k, drop_out_of_range_keys(v)))
                .collect();
            Value::Object(kept)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(drop_out_of_range_keys).collect()),
        other => other,
    }
}

/// Mimics an object table indexed by integer-like keys: keys past the number
/// of entries are silently lost.
pub fn numeric_keys_bug(text: &str) -> Result<String, ExecutionFault> {
    let v: Value = serde_json::from_str(text).map_err(|e| ExecutionFault::Raised {
        exception: "ParseError".to_string(),
        message: e.to_string(),
        traceback: None,
    })?;
    Ok(drop_out_of_range_keys(v).to_string())
}

pub fn check(config: PropertyConfig, target: &dyn Target) -> PropertyReport {
    Property::new("roundtrip", config).check(target)
}
