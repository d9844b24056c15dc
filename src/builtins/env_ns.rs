//! The `env` namespace: environment variable access

use crate::builtins::expect_string;
use crate::context::{Kwargs, NamespaceCall};
use crate::error::RuntimeErrorKind;
use crate::value::Value;

pub struct EnvNamespace;

impl NamespaceCall for EnvNamespace {
    fn name(&self) -> &str {
        "env"
    }

    fn invoke(
        &self,
        method: &str,
        args: &[Value],
        _kwargs: &Kwargs,
    ) -> Result<Value, RuntimeErrorKind> {
        let callee = format!("env.{}", method);
        match method {
            "get" => {
                if args.is_empty() || args.len() > 2 {
                    return Err(RuntimeErrorKind::wrong_arity(&callee, 1, args.len()));
                }
                let name = expect_string(&callee, args, 0)?;
                match std::env::var(name) {
                    Ok(v) => Ok(Value::string(v)),
                    Err(_) => Ok(args.get(1).cloned().unwrap_or(Value::None)),
                }
            }
            "has" => {
                let name = expect_string(&callee, args, 0)?;
                Ok(Value::Bool(std::env::var_os(name).is_some()))
            }
            _ => Err(RuntimeErrorKind::UnknownMethod {
                namespace: "env".to_string(),
                method: method.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(method: &str, args: &[Value]) -> Result<Value, RuntimeErrorKind> {
        EnvNamespace.invoke(method, args, &Kwargs::new())
    }

    #[test]
    fn test_get_with_default() {
        let r = call(
            "get",
            &[
                Value::string("FLOWBY_SURELY_UNSET_VAR"),
                Value::string("fallback"),
            ],
        )
        .unwrap();
        assert_eq!(r.to_display_string(), "fallback");
    }

    #[test]
    fn test_get_missing_is_none() {
        let r = call("get", &[Value::string("FLOWBY_SURELY_UNSET_VAR")]).unwrap();
        assert!(matches!(r, Value::None));
    }

    #[test]
    fn test_has() {
        let r = call("has", &[Value::string("FLOWBY_SURELY_UNSET_VAR")]).unwrap();
        assert!(matches!(r, Value::Bool(false)));
    }
}
