//! The `JSON` namespace: parse and stringify
//!
//! Type mapping:
//! - dict ↔ JSON object (insertion order preserved both ways)
//! - list ↔ JSON array
//! - int / float ↔ JSON number
//! - string ↔ JSON string
//! - bool ↔ JSON boolean
//! - None ↔ JSON null

use crate::builtins::{check_arity, expect_string};
use crate::context::{Kwargs, NamespaceCall};
use crate::error::RuntimeErrorKind;
use crate::value::Value;
use indexmap::IndexMap;

pub struct JsonNamespace;

impl NamespaceCall for JsonNamespace {
    fn name(&self) -> &str {
        "JSON"
    }

    fn invoke(
        &self,
        method: &str,
        args: &[Value],
        _kwargs: &Kwargs,
    ) -> Result<Value, RuntimeErrorKind> {
        let callee = format!("JSON.{}", method);
        match method {
            "parse" => {
                check_arity(&callee, args, 1)?;
                let text = expect_string(&callee, args, 0)?;
                let json: serde_json::Value = serde_json::from_str(text).map_err(|e| {
                    RuntimeErrorKind::bad_argument(&callee, format!("invalid JSON: {}", e))
                })?;
                Ok(json_to_value(&json))
            }
            "stringify" => {
                check_arity(&callee, args, 1)?;
                let json = value_to_json(&callee, &args[0])?;
                serde_json::to_string(&json)
                    .map(Value::string)
                    .map_err(|e| RuntimeErrorKind::bad_argument(&callee, e.to_string()))
            }
            _ => Err(RuntimeErrorKind::UnknownMethod {
                namespace: "JSON".to_string(),
                method: method.to_string(),
            }),
        }
    }
}

/// Convert a Flowby value to serde_json::Value.
pub fn value_to_json(callee: &str, value: &Value) -> Result<serde_json::Value, RuntimeErrorKind> {
    match value {
        Value::None => Ok(serde_json::Value::Null),
        Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
        Value::Int(n) => Ok(serde_json::Value::Number((*n).into())),
        Value::Float(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .ok_or_else(|| {
                RuntimeErrorKind::bad_argument(
                    callee,
                    format!("cannot represent {} in JSON", n),
                )
            }),
        Value::String(s) => Ok(serde_json::Value::String(s.clone())),
        Value::List(items) => {
            let json_items: Result<Vec<_>, _> = items
                .borrow()
                .iter()
                .map(|v| value_to_json(callee, v))
                .collect();
            Ok(serde_json::Value::Array(json_items?))
        }
        Value::Dict(entries) => {
            let mut json_map = serde_json::Map::new();
            for (key, val) in entries.borrow().iter() {
                json_map.insert(key.clone(), value_to_json(callee, val)?);
            }
            Ok(serde_json::Value::Object(json_map))
        }
        other => Err(RuntimeErrorKind::bad_argument(
            callee,
            format!("cannot convert {} to JSON", other.type_name()),
        )),
    }
}

/// Convert serde_json::Value to a Flowby value. Whole numbers decode as
/// ints, everything else as floats.
pub fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::None,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::string(s.clone()),
        serde_json::Value::Array(arr) => Value::list(arr.iter().map(json_to_value).collect()),
        serde_json::Value::Object(obj) => {
            let mut map = IndexMap::new();
            for (key, val) in obj {
                map.insert(key.clone(), json_to_value(val));
            }
            Value::dict(map)
        }
    }
}
