//! The `random` namespace: int, float, choice, string, id

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::builtins::{check_arity, expect_int, expect_list};
use crate::context::{Kwargs, NamespaceCall};
use crate::error::RuntimeErrorKind;
use crate::value::Value;

pub struct RandomNamespace;

impl NamespaceCall for RandomNamespace {
    fn name(&self) -> &str {
        "random"
    }

    fn invoke(
        &self,
        method: &str,
        args: &[Value],
        _kwargs: &Kwargs,
    ) -> Result<Value, RuntimeErrorKind> {
        let callee = format!("random.{}", method);
        let mut rng = rand::thread_rng();
        match method {
            "int" => {
                check_arity(&callee, args, 2)?;
                let lo = expect_int(&callee, args, 0)?;
                let hi = expect_int(&callee, args, 1)?;
                if lo > hi {
                    return Err(RuntimeErrorKind::bad_argument(
                        &callee,
                        format!("empty range {}..{}", lo, hi),
                    ));
                }
                Ok(Value::Int(rng.gen_range(lo..=hi)))
            }
            "float" => {
                check_arity(&callee, args, 0)?;
                Ok(Value::Float(rng.gen::<f64>()))
            }
            "choice" => {
                check_arity(&callee, args, 1)?;
                let items = expect_list(&callee, args, 0)?;
                if items.is_empty() {
                    return Err(RuntimeErrorKind::bad_argument(
                        &callee,
                        "cannot choose from an empty list",
                    ));
                }
                let idx = rng.gen_range(0..items.len());
                Ok(items[idx].clone())
            }
            "string" => {
                check_arity(&callee, args, 1)?;
                let len = expect_int(&callee, args, 0)?;
                if len < 0 {
                    return Err(RuntimeErrorKind::bad_argument(
                        &callee,
                        "length must not be negative",
                    ));
                }
                let s: String = (0..len)
                    .map(|_| rng.sample(Alphanumeric) as char)
                    .collect();
                Ok(Value::string(s))
            }
            "id" => {
                check_arity(&callee, args, 0)?;
                let s: String = (0..16).map(|_| rng.sample(Alphanumeric) as char).collect();
                Ok(Value::string(s.to_lowercase()))
            }
            _ => Err(RuntimeErrorKind::UnknownMethod {
                namespace: "random".to_string(),
                method: method.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(method: &str, args: &[Value]) -> Result<Value, RuntimeErrorKind> {
        RandomNamespace.invoke(method, args, &Kwargs::new())
    }

    #[test]
    fn test_int_within_bounds() {
        for _ in 0..50 {
            match call("int", &[Value::Int(1), Value::Int(6)]).unwrap() {
                Value::Int(n) => assert!((1..=6).contains(&n)),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_int_empty_range_rejected() {
        assert!(call("int", &[Value::Int(6), Value::Int(1)]).is_err());
    }

    #[test]
    fn test_float_unit_interval() {
        match call("float", &[]).unwrap() {
            Value::Float(n) => assert!((0.0..1.0).contains(&n)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_choice_from_list() {
        let items = Value::list(vec![Value::Int(1), Value::Int(2)]);
        match call("choice", &[items]).unwrap() {
            Value::Int(n) => assert!(n == 1 || n == 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_choice_empty_rejected() {
        assert!(call("choice", &[Value::list(vec![])]).is_err());
    }

    #[test]
    fn test_string_length() {
        match call("string", &[Value::Int(8)]).unwrap() {
            Value::String(s) => assert_eq!(s.len(), 8),
            other => panic!("unexpected {:?}", other),
        }
    }
}
