//! The `util` namespace: dict and string helpers

use crate::builtins::{check_arity, expect_dict, expect_list, expect_string};
use crate::context::{Kwargs, NamespaceCall};
use crate::error::RuntimeErrorKind;
use crate::value::Value;

pub struct UtilNamespace;

impl NamespaceCall for UtilNamespace {
    fn name(&self) -> &str {
        "util"
    }

    fn invoke(
        &self,
        method: &str,
        args: &[Value],
        _kwargs: &Kwargs,
    ) -> Result<Value, RuntimeErrorKind> {
        let callee = format!("util.{}", method);
        match method {
            "keys" => {
                check_arity(&callee, args, 1)?;
                let entries = expect_dict(&callee, args, 0)?;
                Ok(Value::list(
                    entries.keys().map(|k| Value::string(k.clone())).collect(),
                ))
            }
            "values" => {
                check_arity(&callee, args, 1)?;
                let entries = expect_dict(&callee, args, 0)?;
                Ok(Value::list(entries.values().cloned().collect()))
            }
            "has" => {
                check_arity(&callee, args, 2)?;
                let entries = expect_dict(&callee, args, 0)?;
                let key = expect_string(&callee, args, 1)?;
                Ok(Value::Bool(entries.contains_key(key)))
            }
            "join" => {
                check_arity(&callee, args, 2)?;
                let items = expect_list(&callee, args, 0)?;
                let sep = expect_string(&callee, args, 1)?;
                let parts: Vec<String> =
                    items.iter().map(|v| v.to_display_string()).collect();
                Ok(Value::string(parts.join(sep)))
            }
            "split" => {
                check_arity(&callee, args, 2)?;
                let s = expect_string(&callee, args, 0)?;
                let sep = expect_string(&callee, args, 1)?;
                Ok(Value::list(
                    s.split(sep).map(Value::string).collect(),
                ))
            }
            "trim" => {
                check_arity(&callee, args, 1)?;
                Ok(Value::string(expect_string(&callee, args, 0)?.trim()))
            }
            "upper" => {
                check_arity(&callee, args, 1)?;
                Ok(Value::string(
                    expect_string(&callee, args, 0)?.to_uppercase(),
                ))
            }
            "lower" => {
                check_arity(&callee, args, 1)?;
                Ok(Value::string(
                    expect_string(&callee, args, 0)?.to_lowercase(),
                ))
            }
            "contains" => {
                check_arity(&callee, args, 2)?;
                match &args[0] {
                    Value::String(s) => {
                        let needle = expect_string(&callee, args, 1)?;
                        Ok(Value::Bool(s.contains(needle)))
                    }
                    Value::List(items) => Ok(Value::Bool(
                        items.borrow().iter().any(|v| v.value_eq(&args[1])),
                    )),
                    other => Err(RuntimeErrorKind::bad_argument(
                        &callee,
                        format!("expected a string or list, got {}", other.type_name()),
                    )),
                }
            }
            "replace" => {
                check_arity(&callee, args, 3)?;
                let s = expect_string(&callee, args, 0)?;
                let from = expect_string(&callee, args, 1)?;
                let to = expect_string(&callee, args, 2)?;
                Ok(Value::string(s.replace(from, to)))
            }
            _ => Err(RuntimeErrorKind::UnknownMethod {
                namespace: "util".to_string(),
                method: method.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn call(method: &str, args: &[Value]) -> Result<Value, RuntimeErrorKind> {
        UtilNamespace.invoke(method, args, &Kwargs::new())
    }

    fn sample_dict() -> Value {
        let mut m = IndexMap::new();
        m.insert("a".to_string(), Value::Int(1));
        m.insert("b".to_string(), Value::Int(2));
        Value::dict(m)
    }

    #[test]
    fn test_keys_preserve_insertion_order() {
        let r = call("keys", &[sample_dict()]).unwrap();
        assert_eq!(r.to_display_string(), "[\"a\", \"b\"]");
    }

    #[test]
    fn test_values() {
        let r = call("values", &[sample_dict()]).unwrap();
        assert_eq!(r.to_display_string(), "[1, 2]");
    }

    #[test]
    fn test_has() {
        assert!(matches!(
            call("has", &[sample_dict(), Value::string("a")]).unwrap(),
            Value::Bool(true)
        ));
        assert!(matches!(
            call("has", &[sample_dict(), Value::string("z")]).unwrap(),
            Value::Bool(false)
        ));
    }

    #[test]
    fn test_join_split_roundtrip() {
        let items = Value::list(vec![Value::string("a"), Value::string("b")]);
        let joined = call("join", &[items, Value::string("-")]).unwrap();
        assert_eq!(joined.to_display_string(), "a-b");

        let split = call("split", &[joined, Value::string("-")]).unwrap();
        assert_eq!(split.to_display_string(), "[\"a\", \"b\"]");
    }

    #[test]
    fn test_string_helpers() {
        assert_eq!(
            call("trim", &[Value::string("  x ")])
                .unwrap()
                .to_display_string(),
            "x"
        );
        assert_eq!(
            call("upper", &[Value::string("ab")])
                .unwrap()
                .to_display_string(),
            "AB"
        );
        assert_eq!(
            call("replace", &[Value::string("a-b"), Value::string("-"), Value::string("+")])
                .unwrap()
                .to_display_string(),
            "a+b"
        );
    }

    #[test]
    fn test_contains_on_list_uses_value_equality() {
        let xs = Value::list(vec![Value::Int(1), Value::Int(2)]);
        assert!(matches!(
            call("contains", &[xs, Value::Float(2.0)]).unwrap(),
            Value::Bool(true)
        ));
    }
}
