//! Built-in free functions: len, str, int, float, bool, range, enumerate, zip
//!
//! All sequences are eager: `range`, `enumerate`, and `zip` return lists.

use flowby_macros::builtin;

use crate::builtins::{check_arity, expect_int, BuiltinRegistry};
use crate::error::RuntimeErrorKind;
use crate::value::Value;

/// Register all free functions in the registry.
pub fn register(registry: &mut BuiltinRegistry) {
    register_builtin_len(registry);
    register_builtin_str(registry);
    register_builtin_int(registry);
    register_builtin_float(registry);
    register_builtin_bool(registry);
    register_builtin_range(registry);
    register_builtin_enumerate(registry);
    register_builtin_zip(registry);
}

#[builtin(name = "len", category = "Core")]
/// Returns the number of elements in a list or dict, or characters in a
/// string.
pub fn builtin_len(args: &[Value]) -> Result<Value, RuntimeErrorKind> {
    check_arity("len", args, 1)?;
    let n = match &args[0] {
        Value::String(s) => s.chars().count(),
        Value::List(items) => items.borrow().len(),
        Value::Dict(entries) => entries.borrow().len(),
        other => {
            return Err(RuntimeErrorKind::bad_argument(
                "len",
                format!("expected a string, list, or dict, got {}", other.type_name()),
            ))
        }
    };
    Ok(Value::Int(n as i64))
}

#[builtin(name = "str", category = "Core")]
/// Converts any value to its string rendering.
pub fn builtin_str(args: &[Value]) -> Result<Value, RuntimeErrorKind> {
    check_arity("str", args, 1)?;
    Ok(Value::string(args[0].to_display_string()))
}

#[builtin(name = "int", category = "Core")]
/// Converts a number, numeric string, or bool to an integer. Floats
/// truncate toward zero.
pub fn builtin_int(args: &[Value]) -> Result<Value, RuntimeErrorKind> {
    check_arity("int", args, 1)?;
    let n = match &args[0] {
        Value::Int(n) => *n,
        Value::Float(n) => *n as i64,
        Value::Bool(b) => i64::from(*b),
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| {
            RuntimeErrorKind::bad_argument("int", format!("cannot parse \"{}\" as an integer", s))
        })?,
        other => {
            return Err(RuntimeErrorKind::bad_argument(
                "int",
                format!("cannot convert {} to an integer", other.type_name()),
            ))
        }
    };
    Ok(Value::Int(n))
}

#[builtin(name = "float", category = "Core")]
/// Converts a number, numeric string, or bool to a float.
pub fn builtin_float(args: &[Value]) -> Result<Value, RuntimeErrorKind> {
    check_arity("float", args, 1)?;
    let n = match &args[0] {
        Value::Int(n) => *n as f64,
        Value::Float(n) => *n,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| {
            RuntimeErrorKind::bad_argument("float", format!("cannot parse \"{}\" as a number", s))
        })?,
        other => {
            return Err(RuntimeErrorKind::bad_argument(
                "float",
                format!("cannot convert {} to a number", other.type_name()),
            ))
        }
    };
    Ok(Value::Float(n))
}

#[builtin(name = "bool", category = "Core")]
/// Converts any value to its truthiness.
pub fn builtin_bool(args: &[Value]) -> Result<Value, RuntimeErrorKind> {
    check_arity("bool", args, 1)?;
    Ok(Value::Bool(args[0].is_truthy()))
}

#[builtin(name = "range", category = "Sequences")]
/// Returns a list of integers: `range(stop)`, `range(start, stop)`, or
/// `range(start, stop, step)`.
pub fn builtin_range(args: &[Value]) -> Result<Value, RuntimeErrorKind> {
    let (start, stop, step) = match args.len() {
        1 => (0, expect_int("range", args, 0)?, 1),
        2 => (
            expect_int("range", args, 0)?,
            expect_int("range", args, 1)?,
            1,
        ),
        3 => (
            expect_int("range", args, 0)?,
            expect_int("range", args, 1)?,
            expect_int("range", args, 2)?,
        ),
        n => return Err(RuntimeErrorKind::wrong_arity("range", 1, n)),
    };
    if step == 0 {
        return Err(RuntimeErrorKind::bad_argument("range", "step must not be 0"));
    }

    let mut items = Vec::new();
    let mut current = start;
    if step > 0 {
        while current < stop {
            items.push(Value::Int(current));
            current += step;
        }
    } else {
        while current > stop {
            items.push(Value::Int(current));
            current += step;
        }
    }
    Ok(Value::list(items))
}

#[builtin(name = "enumerate", category = "Sequences")]
/// Returns a list of `[index, value]` pairs for the given sequence.
pub fn builtin_enumerate(args: &[Value]) -> Result<Value, RuntimeErrorKind> {
    check_arity("enumerate", args, 1)?;
    let items = iterable_items("enumerate", &args[0])?;
    let pairs = items
        .into_iter()
        .enumerate()
        .map(|(i, v)| Value::list(vec![Value::Int(i as i64), v]))
        .collect();
    Ok(Value::list(pairs))
}

#[builtin(name = "zip", category = "Sequences")]
/// Pairs up elements of two or more sequences, stopping at the shortest.
pub fn builtin_zip(args: &[Value]) -> Result<Value, RuntimeErrorKind> {
    if args.len() < 2 {
        return Err(RuntimeErrorKind::wrong_arity("zip", 2, args.len()));
    }
    let sequences: Vec<Vec<Value>> = args
        .iter()
        .map(|a| iterable_items("zip", a))
        .collect::<Result<_, _>>()?;
    let shortest = sequences.iter().map(|s| s.len()).min().unwrap_or(0);

    let mut rows = Vec::with_capacity(shortest);
    for i in 0..shortest {
        rows.push(Value::list(
            sequences.iter().map(|s| s[i].clone()).collect(),
        ));
    }
    Ok(Value::list(rows))
}

/// The elements a value yields when iterated: list elements, dict keys,
/// or one-character strings.
pub fn iterable_items(callee: &str, value: &Value) -> Result<Vec<Value>, RuntimeErrorKind> {
    match value {
        Value::List(items) => Ok(items.borrow().clone()),
        Value::Dict(entries) => Ok(entries
            .borrow()
            .keys()
            .map(|k| Value::string(k.clone()))
            .collect()),
        Value::String(s) => Ok(s.chars().map(|c| Value::string(c.to_string())).collect()),
        other => Err(RuntimeErrorKind::bad_argument(
            callee,
            format!("{} is not iterable", other.type_name()),
        )),
    }
}
