use std::{fs, path::Path};

use anyhow::{ensure, Context, Result};
use crossprop::PropertyConfig;
use serde::Deserialize;

/// One property in a suite file.
///
/// ```json
/// [
///   { "function": "roundtrip", "trials": 200, "max_depth": 2 },
///   { "name": "keys", "function": "roundtrip_numeric_keys_bug",
///     "regressions": ["{\"10\":null}"] }
/// ]
/// ```
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct SuiteEntry {
    pub name: Option<String>,
    pub function: String,
    pub trials: Option<usize>,
    pub seed: Option<u64>,
    pub max_depth: Option<usize>,
    pub shrink: Option<bool>,
    #[serde(default)]
    pub regressions: Vec<String>,
}

impl SuiteEntry {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.function)
    }

    /// `base` with this entry's overrides applied.
    pub fn config(&self, base: &PropertyConfig) -> PropertyConfig {
        let mut config = base.clone();
        if let Some(v) = self.trials {
            config.trials = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.max_depth {
            config.generator.max_depth = v;
        }
        if let Some(v) = self.shrink {
            config.shrink = v;
        }
        config
    }
}

pub fn parse_suite(json: &str) -> Result<Vec<SuiteEntry>> {
    let entries: Vec<SuiteEntry> = serde_json::from_str(json)?;
    ensure!(!entries.is_empty(), "suite defines no properties");
    Ok(entries)
}

pub fn load_suite(path: &Path) -> Result<Vec<SuiteEntry>> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("reading suite file {}", path.display()))?;
    parse_suite(&json).with_context(|| format!("in suite file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_apply_on_top_of_base() {
        let entries = parse_suite(
            r#"[{"function": "f", "trials": 5, "max_depth": 3},
                {"name": "g2", "function": "g", "regressions": ["{}"]}]"#,
        )
        .unwrap();
        let base = PropertyConfig {
            seed: 9,
            ..PropertyConfig::default()
        };

        let c = entries[0].config(&base);
        assert_eq!(entries[0].name(), "f");
        assert_eq!((c.trials, c.seed, c.generator.max_depth), (5, 9, 3));

        let c = entries[1].config(&base);
        assert_eq!(entries[1].name(), "g2");
        assert_eq!(c, base);
        assert_eq!(entries[1].regressions, vec!["{}"]);
    }

    #[test]
    fn rejects_unknown_fields_and_empty_suites() {
        assert!(parse_suite(r#"[{"function": "f", "trails": 5}]"#).is_err());
        assert!(parse_suite("[]").is_err());
    }
}
