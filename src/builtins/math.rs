//! The `Math` namespace: abs, min, max, floor, ceil, round, pow, sqrt

use crate::builtins::{check_arity, expect_number};
use crate::context::{Kwargs, NamespaceCall};
use crate::error::RuntimeErrorKind;
use crate::value::Value;

pub struct MathNamespace;

impl NamespaceCall for MathNamespace {
    fn name(&self) -> &str {
        "Math"
    }

    fn invoke(
        &self,
        method: &str,
        args: &[Value],
        _kwargs: &Kwargs,
    ) -> Result<Value, RuntimeErrorKind> {
        let callee = format!("Math.{}", method);
        match method {
            "abs" => {
                check_arity(&callee, args, 1)?;
                match &args[0] {
                    Value::Int(n) => Ok(Value::Int(n.abs())),
                    Value::Float(n) => Ok(Value::Float(n.abs())),
                    other => Err(RuntimeErrorKind::bad_argument(
                        &callee,
                        format!("expected a number, got {}", other.type_name()),
                    )),
                }
            }
            "min" | "max" => {
                if args.is_empty() {
                    return Err(RuntimeErrorKind::wrong_arity(&callee, 1, 0));
                }
                let mut best = expect_number(&callee, args, 0)?;
                let mut best_idx = 0;
                for idx in 1..args.len() {
                    let n = expect_number(&callee, args, idx)?;
                    let better = if method == "min" { n < best } else { n > best };
                    if better {
                        best = n;
                        best_idx = idx;
                    }
                }
                Ok(args[best_idx].clone())
            }
            "floor" => {
                check_arity(&callee, args, 1)?;
                Ok(Value::Int(expect_number(&callee, args, 0)?.floor() as i64))
            }
            "ceil" => {
                check_arity(&callee, args, 1)?;
                Ok(Value::Int(expect_number(&callee, args, 0)?.ceil() as i64))
            }
            "round" => {
                check_arity(&callee, args, 1)?;
                Ok(Value::Int(expect_number(&callee, args, 0)?.round() as i64))
            }
            "pow" => {
                check_arity(&callee, args, 2)?;
                let base = expect_number(&callee, args, 0)?;
                let exp = expect_number(&callee, args, 1)?;
                let result = base.powf(exp);
                match (&args[0], &args[1]) {
                    (Value::Int(_), Value::Int(e)) if *e >= 0 => Ok(Value::Int(result as i64)),
                    _ => Ok(Value::Float(result)),
                }
            }
            "sqrt" => {
                check_arity(&callee, args, 1)?;
                let n = expect_number(&callee, args, 0)?;
                if n < 0.0 {
                    return Err(RuntimeErrorKind::bad_argument(
                        &callee,
                        "cannot take the square root of a negative number",
                    ));
                }
                Ok(Value::Float(n.sqrt()))
            }
            _ => Err(RuntimeErrorKind::UnknownMethod {
                namespace: "Math".to_string(),
                method: method.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(method: &str, args: &[Value]) -> Result<Value, RuntimeErrorKind> {
        MathNamespace.invoke(method, args, &Kwargs::new())
    }

    #[test]
    fn test_abs_preserves_kind() {
        assert!(matches!(call("abs", &[Value::Int(-3)]).unwrap(), Value::Int(3)));
        assert!(matches!(
            call("abs", &[Value::Float(-2.5)]).unwrap(),
            Value::Float(n) if n == 2.5
        ));
    }

    #[test]
    fn test_min_max() {
        let r = call("min", &[Value::Int(3), Value::Float(1.5), Value::Int(2)]).unwrap();
        assert!(matches!(r, Value::Float(n) if n == 1.5));
        let r = call("max", &[Value::Int(3), Value::Float(1.5)]).unwrap();
        assert!(matches!(r, Value::Int(3)));
    }

    #[test]
    fn test_rounding() {
        assert!(matches!(call("floor", &[Value::Float(2.9)]).unwrap(), Value::Int(2)));
        assert!(matches!(call("ceil", &[Value::Float(2.1)]).unwrap(), Value::Int(3)));
        assert!(matches!(call("round", &[Value::Float(2.5)]).unwrap(), Value::Int(3)));
    }

    #[test]
    fn test_pow_int_fast_path() {
        assert!(matches!(
            call("pow", &[Value::Int(2), Value::Int(10)]).unwrap(),
            Value::Int(1024)
        ));
        assert!(matches!(
            call("pow", &[Value::Int(2), Value::Float(0.5)]).unwrap(),
            Value::Float(_)
        ));
    }

    #[test]
    fn test_sqrt_negative_rejected() {
        assert!(call("sqrt", &[Value::Int(-1)]).is_err());
    }

    #[test]
    fn test_unknown_method() {
        let err = call("cbrt", &[]).unwrap_err();
        assert!(matches!(err, RuntimeErrorKind::UnknownMethod { .. }));
    }
}
