//! The `Date` namespace: now, today, timestamp, format, year, month, day

use chrono::{Datelike, Local, TimeZone};

use crate::builtins::{check_arity, expect_number, expect_string};
use crate::context::{Kwargs, NamespaceCall};
use crate::error::RuntimeErrorKind;
use crate::value::Value;

pub struct DateNamespace;

impl NamespaceCall for DateNamespace {
    fn name(&self) -> &str {
        "Date"
    }

    fn invoke(
        &self,
        method: &str,
        args: &[Value],
        _kwargs: &Kwargs,
    ) -> Result<Value, RuntimeErrorKind> {
        let callee = format!("Date.{}", method);
        match method {
            "now" => {
                check_arity(&callee, args, 0)?;
                Ok(Value::string(
                    Local::now().format("%Y-%m-%dT%H:%M:%S%z").to_string(),
                ))
            }
            "today" => {
                check_arity(&callee, args, 0)?;
                Ok(Value::string(Local::now().format("%Y-%m-%d").to_string()))
            }
            "timestamp" => {
                check_arity(&callee, args, 0)?;
                Ok(Value::Int(Local::now().timestamp()))
            }
            "format" => {
                check_arity(&callee, args, 2)?;
                let ts = expect_number(&callee, args, 0)? as i64;
                let fmt = expect_string(&callee, args, 1)?;
                let moment = Local.timestamp_opt(ts, 0).single().ok_or_else(|| {
                    RuntimeErrorKind::bad_argument(&callee, format!("invalid timestamp {}", ts))
                })?;
                Ok(Value::string(moment.format(fmt).to_string()))
            }
            "year" => {
                check_arity(&callee, args, 0)?;
                Ok(Value::Int(i64::from(Local::now().year())))
            }
            "month" => {
                check_arity(&callee, args, 0)?;
                Ok(Value::Int(i64::from(Local::now().month())))
            }
            "day" => {
                check_arity(&callee, args, 0)?;
                Ok(Value::Int(i64::from(Local::now().day())))
            }
            _ => Err(RuntimeErrorKind::UnknownMethod {
                namespace: "Date".to_string(),
                method: method.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(method: &str, args: &[Value]) -> Result<Value, RuntimeErrorKind> {
        DateNamespace.invoke(method, args, &Kwargs::new())
    }

    #[test]
    fn test_today_shape() {
        match call("today", &[]).unwrap() {
            Value::String(s) => {
                assert_eq!(s.len(), 10);
                assert_eq!(s.as_bytes()[4], b'-');
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_timestamp_is_positive() {
        match call("timestamp", &[]).unwrap() {
            Value::Int(n) => assert!(n > 1_500_000_000),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_format_epoch() {
        let r = call(
            "format",
            &[Value::Int(0), Value::string("%Y")],
        )
        .unwrap();
        match r {
            Value::String(s) => assert!(s == "1970" || s == "1969"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_method() {
        assert!(matches!(
            call("century", &[]).unwrap_err(),
            RuntimeErrorKind::UnknownMethod { .. }
        ));
    }
}
