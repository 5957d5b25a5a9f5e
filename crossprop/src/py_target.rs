use std::{
    ffi::CString,
    fs,
    path::Path,
    sync::atomic::{AtomicUsize, Ordering},
};

use anyhow::{anyhow, ensure, Context, Result};
use pyo3::{
    prelude::*,
    types::{PyModule, PyString},
};
use serde::{Deserialize, Serialize};

use crate::{
    pyjson::to_json_string,
    target::{ExecutionFault, Target},
};

/// What to do when a target returns something other than `str`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnMode {
    /// Only `str` results count; anything else is a fault.
    #[default]
    Strict,
    /// Every result, `str` included, is a value converted to JSON text on
    /// the Rust side.
    Stringify,
}

static SCRIPT_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// A Python script compiled into its own module of the embedded interpreter.
pub struct PyScript {
    module: Py<PyModule>,
    module_name: String,
    file_name: String,
}

impl PyScript {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)
            .with_context(|| format!("reading target script {}", path.display()))?;
        Self::from_source(&source, &path.display().to_string())
    }

    pub fn from_source(source: &str, file_name: &str) -> Result<Self> {
        // module names must be unique, or a second script would replace the
        // first one in sys.modules
        let module_name = format!(
            "crossprop_target_{}",
            SCRIPT_COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        let code = CString::new(source).context("target script contains a NUL byte")?;
        let c_file_name = CString::new(file_name).context("file name contains a NUL byte")?;
        let c_module_name = CString::new(module_name.as_str())?;

        Python::with_gil(|py| {
            let module = PyModule::from_code(py, &code, &c_file_name, &c_module_name)
                .map_err(|e| anyhow!("failed to load {file_name}: {}", raised(py, &e)))?;
            tracing::debug!(file_name, module = %module_name, "loaded target script");
            Ok(PyScript {
                module: module.unbind(),
                module_name,
                file_name: file_name.to_string(),
            })
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Public functions defined by the script itself, sorted by name.
    /// Imported functions and classes are left out.
    pub fn function_names(&self) -> Result<Vec<String>> {
        Python::with_gil(|py| {
            let module = self.module.bind(py);
            let mut names = vec![];
            for (key, value) in module.dict().iter() {
                let name: String = key.extract()?;
                if name.starts_with('_') || !value.hasattr("__code__")? {
                    continue;
                }
                let owner: String = value.getattr("__module__")?.extract()?;
                if owner == self.module_name {
                    names.push(name);
                }
            }
            names.sort();
            Ok(names)
        })
    }

    pub fn function(&self, name: &str) -> Result<ScriptFunction> {
        self.function_with_mode(name, ReturnMode::default())
    }

    pub fn function_with_mode(&self, name: &str, mode: ReturnMode) -> Result<ScriptFunction> {
        Python::with_gil(|py| {
            let module = self.module.bind(py);
            let func = module
                .getattr(name)
                .map_err(|_| anyhow!("{} does not define {name:?}", self.file_name))?;
            ensure!(
                func.is_callable(),
                "{name:?} in {} is not callable",
                self.file_name
            );
            Ok(ScriptFunction {
                name: name.to_string(),
                func: func.unbind(),
                mode,
            })
        })
    }
}

/// A named function of a [`PyScript`], usable as a [`Target`].
pub struct ScriptFunction {
    name: String,
    func: Py<PyAny>,
    mode: ReturnMode,
}

impl Target for ScriptFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, arg: &str) -> Result<String, ExecutionFault> {
        Python::with_gil(|py| {
            let result = self
                .func
                .call1(py, (arg,))
                .map_err(|e| raised(py, &e))?
                .into_bound(py);
            match self.mode {
                ReturnMode::Strict if result.is_instance_of::<PyString>() => {
                    result.extract::<String>().map_err(|e| raised(py, &e))
                }
                ReturnMode::Strict => Err(ExecutionFault::NonTextResult {
                    type_name: type_name(&result),
                }),
                // a str here is a JSON string value, not JSON text
                ReturnMode::Stringify => to_json_string(result).map_err(|e| raised(py, &e)),
            }
        })
    }
}

fn type_name(v: &Bound<'_, PyAny>) -> String {
    v.get_type()
        .name()
        .map(|n| n.to_string())
        .unwrap_or_else(|_| "object".to_string())
}

fn raised(py: Python<'_>, err: &PyErr) -> ExecutionFault {
    let exception = err
        .get_type(py)
        .name()
        .map(|n| n.to_string())
        .unwrap_or_else(|_| "Exception".to_string());
    let message = err
        .value(py)
        .str()
        .map(|s| s.to_string())
        .unwrap_or_default();
    let traceback = err.traceback(py).and_then(|tb| tb.format().ok());
    ExecutionFault::Raised {
        exception,
        message,
        traceback,
    }
}
