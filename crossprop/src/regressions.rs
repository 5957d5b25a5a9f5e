//! Regression inputs: exact JSON texts replayed before random trials.
//!
//! On disk a regression file holds one JSON text per line. Blank lines and
//! lines starting with `#` are ignored.

use std::{fs, io::Write as _, path::Path};

use anyhow::{Context, Result};

use crate::oracle::reference_parse;

/// Inputs every runner replays, whatever the regression file says.
pub const BUILTIN: &[&str] = &[
    // numeric-looking keys; a positional object table drops "5"
    r#"{"5":1,"1":"rfIdufb0"}"#,
    "{}",
    r#""\u0000\u0007\u001f\t\n'\"\\ mixed""#,
];

const HEADER: &str = "# crossprop regression inputs, one JSON text per line\n";

pub fn parse(contents: &str) -> Result<Vec<String>> {
    let mut inputs = vec![];
    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        reference_parse(line).with_context(|| format!("line {}: not valid JSON", idx + 1))?;
        inputs.push(line.to_string());
    }
    Ok(inputs)
}

/// Loads a regression file; a missing file holds no inputs yet.
pub fn load(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(vec![]);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading regression file {}", path.display()))?;
    parse(&contents).with_context(|| format!("in regression file {}", path.display()))
}

/// Appends inputs not already present; returns how many were added.
pub fn append(path: &Path, inputs: &[String]) -> Result<usize> {
    let mut known = load(path)?;
    let fresh: Vec<&String> = inputs
        .iter()
        .filter(|input| {
            if known.contains(*input) {
                false
            } else {
                known.push((*input).clone());
                true
            }
        })
        .collect();
    if fresh.is_empty() {
        return Ok(0);
    }
    // canonical texts are single-line, anything else would not load back
    if let Some(input) = fresh.iter().find(|input| input.contains('\n')) {
        anyhow::bail!("regression input spans lines: {input}");
    }
    let is_new = !path.exists();
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening regression file {}", path.display()))?;
    if is_new {
        file.write_all(HEADER.as_bytes())?;
    }
    for input in &fresh {
        writeln!(file, "{input}")?;
    }
    Ok(fresh.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_valid_json() {
        for text in BUILTIN {
            assert!(reference_parse(text).is_ok(), "{text}");
        }
        let s = reference_parse(BUILTIN[2]).unwrap();
        assert_eq!(s.as_str(), Some("\u{0}\u{7}\u{1f}\t\n'\"\\ mixed"));
    }

    #[test]
    fn parse_skips_comments_and_blanks() {
        let inputs = parse("# header\n\n{\"a\":1}\n  [1,2]  \n").unwrap();
        assert_eq!(inputs, vec!["{\"a\":1}", "[1,2]"]);
    }

    #[test]
    fn parse_reports_line() {
        let err = parse("{}\n{oops\n").unwrap_err();
        assert!(format!("{err:#}").contains("line 2"), "{err:#}");
    }

    #[test]
    fn append_creates_and_deduplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regressions.txt");
        assert!(load(&path).unwrap().is_empty());

        let added = append(&path, &["{}".to_string(), "[1]".to_string(), "{}".to_string()]).unwrap();
        assert_eq!(added, 2);
        let added = append(&path, &["[1]".to_string(), "null".to_string()]).unwrap();
        assert_eq!(added, 1);

        assert_eq!(load(&path).unwrap(), vec!["{}", "[1]", "null"]);
        assert!(fs::read_to_string(&path).unwrap().starts_with(HEADER));
    }

    #[test]
    fn multi_line_input_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regressions.txt");
        let inputs = ["[2]".to_string(), "{\n}".to_string()];
        assert!(append(&path, &inputs).is_err());
        assert!(!path.exists());

        append(&path, &["{}".to_string()]).unwrap();
        let before = fs::read_to_string(&path).unwrap();
        assert!(append(&path, &inputs).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }
}
