// based on https://github.com/mre/hyperjson/blob/master/src/lib.rs

use pyo3::{
    exceptions::PyTypeError,
    prelude::*,
    types::{PyDict, PyFloat, PyList, PyString, PyTuple},
};
use serde::{
    ser::{SerializeMap as _, SerializeSeq as _},
    Serialize, Serializer,
};

/// Serializes a Python object graph the way `json.dumps` would see it,
/// without going through Python's own encoder.
pub struct SerializePyObject<'a> {
    v: Bound<'a, PyAny>,
}

impl<'a> SerializePyObject<'a> {
    pub fn new(v: Bound<'a, PyAny>) -> Self {
        SerializePyObject { v }
    }
}

/// Encode a return value as JSON text; used when targets hand back
/// structured data instead of JSON text. A `str` becomes a JSON string.
pub fn to_json_string(v: Bound<'_, PyAny>) -> PyResult<String> {
    let obj = SerializePyObject::new(v);
    serde_json::to_string(&obj).map_err(|e| PyTypeError::new_err(format!("{e}")))
}

impl Serialize for SerializePyObject<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        macro_rules! extract {
            ($t:ty) => {
                if let Ok(val) = self.v.extract::<$t>() {
                    return val.serialize(serializer);
                }
            };
        }

        fn debug_py_err<E: serde::ser::Error>(err: PyErr) -> E {
            E::custom(format_args!("{err:?}"))
        }

        if self.v.is_none() {
            return serializer.serialize_unit();
        }

        extract!(String);
        // bool before the integers: True is an int in Python
        extract!(bool);

        if let Ok(x) = self.v.downcast::<PyFloat>() {
            let x = x.value();
            if !x.is_finite() {
                return Err(serde::ser::Error::custom(format_args!(
                    "Out of range float is not JSON serializable: {x}"
                )));
            }
            return x.serialize(serializer);
        }

        extract!(i64);
        extract!(u64);

        if let Ok(x) = self.v.downcast::<PyDict>() {
            let mut map = serializer.serialize_map(Some(x.len()))?;
            for (key, value) in x {
                if let Ok(key) = key.downcast::<PyString>() {
                    let key = key.to_string();
                    map.serialize_key(&key)?;
                } else {
                    return Err(serde::ser::Error::custom(format_args!(
                        "Dictionary key is not a string: {key:?}"
                    )));
                }
                map.serialize_value(&SerializePyObject { v: value })?;
            }
            return map.end();
        }

        if let Ok(x) = self.v.downcast::<PyList>() {
            let mut seq = serializer.serialize_seq(Some(x.len()))?;
            for element in x {
                seq.serialize_element(&SerializePyObject { v: element })?
            }
            return seq.end();
        }

        if let Ok(x) = self.v.downcast::<PyTuple>() {
            let mut seq = serializer.serialize_seq(Some(x.len()))?;
            for element in x {
                seq.serialize_element(&SerializePyObject { v: element })?
            }
            return seq.end();
        }

        match self.v.repr() {
            Ok(repr) => Err(serde::ser::Error::custom(format_args!(
                "Value is not JSON serializable: {repr}",
            ))),
            Err(_) => Err(serde::ser::Error::custom(format_args!(
                "Type is not JSON serializable: {}",
                self.v.get_type().name().map_err(debug_py_err)?
            ))),
        }
    }
}
