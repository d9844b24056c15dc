// ABOUTME: Expression evaluator: arithmetic and comparison coercions,
// short-circuit logic, member/index access, calls, lambdas, f-strings

use indexmap::IndexMap;
use std::rc::Rc;

use crate::ast::{BinaryOp, Expr, FStringPart, Literal, UnaryOp};
use crate::context::Kwargs;
use crate::env::Environment;
use crate::error::RuntimeErrorKind;
use crate::interp::{resolve_index, Interpreter, Interrupt};
use crate::value::{FunctionBody, FunctionValue, Value};

impl Interpreter {
    pub(crate) fn eval_expr(
        &mut self,
        expr: &Expr,
        env: &Rc<Environment>,
    ) -> Result<Value, Interrupt> {
        match expr {
            Expr::Literal { value, .. } => Ok(match value {
                Literal::Int(n) => Value::Int(*n),
                Literal::Float(n) => Value::Float(*n),
                Literal::Str(s) => Value::string(s.clone()),
                Literal::Bool(b) => Value::Bool(*b),
                Literal::None => Value::None,
            }),

            Expr::Identifier { name, line } => self.resolve_name(name, env, *line),

            Expr::Binary { op, lhs, rhs, line } => match op {
                // `and`/`or` return the deciding operand unchanged.
                BinaryOp::And => {
                    let left = self.eval_expr(lhs, env)?;
                    if !left.is_truthy() {
                        Ok(left)
                    } else {
                        self.eval_expr(rhs, env)
                    }
                }
                BinaryOp::Or => {
                    let left = self.eval_expr(lhs, env)?;
                    if left.is_truthy() {
                        Ok(left)
                    } else {
                        self.eval_expr(rhs, env)
                    }
                }
                _ => {
                    let left = self.eval_expr(lhs, env)?;
                    let right = self.eval_expr(rhs, env)?;
                    binary_op(*op, &left, &right).map_err(|e| e.at(*line).into())
                }
            },

            Expr::Unary { op, operand, line } => {
                let value = self.eval_expr(operand, env)?;
                unary_op(*op, &value).map_err(|e| e.at(*line).into())
            }

            Expr::Member {
                object,
                member,
                line,
            } => {
                let object = self.eval_expr(object, env)?;
                self.member_access(&object, member, *line)
            }

            Expr::Index {
                object,
                index,
                line,
            } => {
                let object = self.eval_expr(object, env)?;
                let index = self.eval_expr(index, env)?;
                index_access(&object, &index).map_err(|e| e.at(*line).into())
            }

            Expr::Call {
                callee,
                args,
                kwargs,
                line,
            } => self.eval_call(callee, args, kwargs, env, *line),

            Expr::MethodCall {
                object,
                method,
                args,
                kwargs,
                line,
            } => {
                let object = self.eval_expr(object, env)?;
                let args = self.eval_args(args, env)?;
                let kwargs = self.eval_kwargs(kwargs, env)?;
                self.method_call(&object, method, args, kwargs, *line)
            }

            Expr::Lambda { params, body, .. } => {
                // The closure environment is captured now, at evaluation
                // time, not when the lambda was parsed.
                Ok(Value::Function(Rc::new(FunctionValue {
                    name: None,
                    params: params.clone(),
                    body: FunctionBody::Expr(Rc::new((**body).clone())),
                    env: env.capture(),
                })))
            }

            Expr::FString { parts, .. } => {
                let mut rendered = String::new();
                for part in parts {
                    match part {
                        FStringPart::Literal(text) => rendered.push_str(text),
                        FStringPart::Expr(inner) => {
                            let value = self.eval_expr(inner, env)?;
                            rendered.push_str(&value.to_display_string());
                        }
                    }
                }
                Ok(Value::string(rendered))
            }

            Expr::Array { items, .. } => {
                let values = self.eval_args(items, env)?;
                Ok(Value::list(values))
            }

            Expr::Object { entries, .. } => {
                let mut map = IndexMap::new();
                for (key, value_expr) in entries {
                    let value = self.eval_expr(value_expr, env)?;
                    map.insert(key.clone(), value);
                }
                Ok(Value::dict(map))
            }

            Expr::Input { args, kwargs, line } => {
                let args = self.eval_args(args, env)?;
                let kwargs = self.eval_kwargs(kwargs, env)?;
                let prompt = match args.first() {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_display_string(),
                    None => String::new(),
                };
                let default = kwargs.get("default").cloned();
                let ty = match kwargs.get("type") {
                    Some(Value::String(s)) => Some(s.clone()),
                    _ => None,
                };
                let input = self.ctx.input.clone();
                let result = input
                    .borrow_mut()
                    .read(&prompt, default, ty.as_deref())
                    .map_err(|e| e.at(*line))?;
                Ok(result)
            }
        }
    }

    fn resolve_name(
        &mut self,
        name: &str,
        env: &Rc<Environment>,
        line: usize,
    ) -> Result<Value, Interrupt> {
        if let Some(value) = env.get(name) {
            return Ok(value);
        }
        if let Some(ns) = self.ctx.namespaces.get(name) {
            return Ok(Value::Namespace(ns));
        }
        Err(RuntimeErrorKind::UndefinedVariable {
            name: name.to_string(),
        }
        .at(line)
        .into())
    }

    fn eval_args(&mut self, exprs: &[Expr], env: &Rc<Environment>) -> Result<Vec<Value>, Interrupt> {
        exprs.iter().map(|e| self.eval_expr(e, env)).collect()
    }

    fn eval_kwargs(
        &mut self,
        entries: &[(String, Expr)],
        env: &Rc<Environment>,
    ) -> Result<Kwargs, Interrupt> {
        let mut kwargs = Kwargs::new();
        for (name, expr) in entries {
            let value = self.eval_expr(expr, env)?;
            kwargs.insert(name.clone(), value);
        }
        Ok(kwargs)
    }

    fn eval_call(
        &mut self,
        callee: &Expr,
        arg_exprs: &[Expr],
        kwarg_exprs: &[(String, Expr)],
        env: &Rc<Environment>,
        line: usize,
    ) -> Result<Value, Interrupt> {
        let args = self.eval_args(arg_exprs, env)?;
        let kwargs = self.eval_kwargs(kwarg_exprs, env)?;

        if let Expr::Identifier { name, .. } = callee {
            // User bindings shadow nothing built-in (the parser enforces
            // it), so lookup order is just: environment, Resource, the
            // free-function table.
            if let Some(value) = env.get(name) {
                return self.call_value(&value, args, kwargs, line);
            }
            if name == "Resource" {
                if !kwargs.is_empty() {
                    return Err(RuntimeErrorKind::bad_argument(
                        "Resource",
                        "named arguments are not supported",
                    )
                    .at(line)
                    .into());
                }
                let path = match args.first() {
                    Some(Value::String(s)) if args.len() == 1 => s.clone(),
                    _ => {
                        return Err(RuntimeErrorKind::bad_argument(
                            "Resource",
                            "expected a single path string",
                        )
                        .at(line)
                        .into())
                    }
                };
                let handle = self.ctx.resources.load(&path).map_err(|e| e.at(line))?;
                return Ok(Value::Resource(handle));
            }
            if let Some(builtin) = self.ctx.builtins.get(name) {
                if !kwargs.is_empty() {
                    return Err(RuntimeErrorKind::bad_argument(
                        name,
                        "named arguments are not supported",
                    )
                    .at(line)
                    .into());
                }
                return (builtin.func)(&args).map_err(|e| e.at(line).into());
            }
        }

        let callee_value = self.eval_expr(callee, env)?;
        self.call_value(&callee_value, args, kwargs, line)
    }

    fn call_value(
        &mut self,
        value: &Value,
        args: Vec<Value>,
        kwargs: Kwargs,
        line: usize,
    ) -> Result<Value, Interrupt> {
        match value {
            Value::Function(function) => {
                if !kwargs.is_empty() {
                    let name = function.name.as_deref().unwrap_or("<lambda>");
                    return Err(RuntimeErrorKind::bad_argument(
                        name,
                        "named arguments are not supported for user functions",
                    )
                    .at(line)
                    .into());
                }
                self.call_function(function, args, line)
            }
            other => Err(RuntimeErrorKind::NotCallable {
                type_name: other.type_name().to_string(),
            }
            .at(line)
            .into()),
        }
    }

    fn member_access(
        &mut self,
        object: &Value,
        member: &str,
        line: usize,
    ) -> Result<Value, Interrupt> {
        match object {
            Value::Dict(entries) => entries
                .borrow()
                .get(member)
                .cloned()
                .ok_or_else(|| {
                    RuntimeErrorKind::KeyMissing {
                        key: member.to_string(),
                    }
                    .at(line)
                    .into()
                }),
            Value::Namespace(ns) | Value::Resource(ns) => {
                ns.get(member).ok_or_else(|| {
                    RuntimeErrorKind::MemberNotExported {
                        member: member.to_string(),
                        library: ns.name().to_string(),
                    }
                    .at(line)
                    .into()
                })
            }
            other => Err(RuntimeErrorKind::MemberNotFound {
                member: member.to_string(),
                type_name: other.type_name().to_string(),
            }
            .at(line)
            .into()),
        }
    }

    fn method_call(
        &mut self,
        object: &Value,
        method: &str,
        args: Vec<Value>,
        kwargs: Kwargs,
        line: usize,
    ) -> Result<Value, Interrupt> {
        match object {
            Value::Namespace(ns) | Value::Resource(ns) => {
                // Data members that happen to be callable (module exports)
                // take precedence over the invoke protocol.
                if let Some(member) = ns.get(method) {
                    return self.call_value(&member, args, kwargs, line);
                }
                ns.invoke(method, &args, &kwargs)
                    .map_err(|e| e.at(line).into())
            }
            Value::Dict(entries) => {
                let member = entries.borrow().get(method).cloned();
                match member {
                    Some(value) => self.call_value(&value, args, kwargs, line),
                    None => Err(RuntimeErrorKind::KeyMissing {
                        key: method.to_string(),
                    }
                    .at(line)
                    .into()),
                }
            }
            other => Err(RuntimeErrorKind::MemberNotFound {
                member: method.to_string(),
                type_name: other.type_name().to_string(),
            }
            .at(line)
            .into()),
        }
    }
}

// ============================================================================
// Operators
// ============================================================================

fn bad_operands(op: BinaryOp, lhs: &Value, rhs: &Value) -> RuntimeErrorKind {
    RuntimeErrorKind::BadOperands {
        op: op.symbol().to_string(),
        lhs: lhs.type_name().to_string(),
        rhs: rhs.type_name().to_string(),
    }
}

/// Non-short-circuit binary operators. Int op Int stays Int; mixed numeric
/// coerces to Float; `+` also concatenates strings and lists.
pub(crate) fn binary_op(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeErrorKind> {
    match op {
        BinaryOp::Eq => return Ok(Value::Bool(lhs.value_eq(rhs))),
        BinaryOp::NotEq => return Ok(Value::Bool(!lhs.value_eq(rhs))),
        _ => {}
    }

    if let (Value::String(a), Value::String(b)) = (lhs, rhs) {
        return match op {
            BinaryOp::Add => Ok(Value::string(format!("{}{}", a, b))),
            BinaryOp::Lt => Ok(Value::Bool(a < b)),
            BinaryOp::LtEq => Ok(Value::Bool(a <= b)),
            BinaryOp::Gt => Ok(Value::Bool(a > b)),
            BinaryOp::GtEq => Ok(Value::Bool(a >= b)),
            _ => Err(bad_operands(op, lhs, rhs)),
        };
    }

    if let (Value::List(a), Value::List(b)) = (lhs, rhs) {
        if op == BinaryOp::Add {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            return Ok(Value::list(items));
        }
        return Err(bad_operands(op, lhs, rhs));
    }

    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => int_op(op, *a, *b).ok_or_else(|| match op {
            BinaryOp::Div | BinaryOp::Mod if *b == 0 => RuntimeErrorKind::DivisionByZero,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                RuntimeErrorKind::IntegerOverflow {
                    op: op.symbol().to_string(),
                }
            }
            _ => bad_operands(op, lhs, rhs),
        }),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let a = as_f64(lhs);
            let b = as_f64(rhs);
            float_op(op, a, b).ok_or_else(|| match op {
                BinaryOp::Div | BinaryOp::Mod if b == 0.0 => RuntimeErrorKind::DivisionByZero,
                _ => bad_operands(op, lhs, rhs),
            })
        }
        _ => Err(bad_operands(op, lhs, rhs)),
    }
}

fn as_f64(v: &Value) -> f64 {
    match v {
        Value::Int(n) => *n as f64,
        Value::Float(n) => *n,
        _ => unreachable!("caller checked numeric"),
    }
}

fn int_op(op: BinaryOp, a: i64, b: i64) -> Option<Value> {
    match op {
        BinaryOp::Add => a.checked_add(b).map(Value::Int),
        BinaryOp::Sub => a.checked_sub(b).map(Value::Int),
        BinaryOp::Mul => a.checked_mul(b).map(Value::Int),
        BinaryOp::Div => a.checked_div(b).map(Value::Int),
        BinaryOp::Mod => a.checked_rem(b).map(Value::Int),
        BinaryOp::Lt => Some(Value::Bool(a < b)),
        BinaryOp::LtEq => Some(Value::Bool(a <= b)),
        BinaryOp::Gt => Some(Value::Bool(a > b)),
        BinaryOp::GtEq => Some(Value::Bool(a >= b)),
        _ => None,
    }
}

fn float_op(op: BinaryOp, a: f64, b: f64) -> Option<Value> {
    match op {
        BinaryOp::Add => Some(Value::Float(a + b)),
        BinaryOp::Sub => Some(Value::Float(a - b)),
        BinaryOp::Mul => Some(Value::Float(a * b)),
        BinaryOp::Div => {
            if b == 0.0 {
                None
            } else {
                Some(Value::Float(a / b))
            }
        }
        BinaryOp::Mod => {
            if b == 0.0 {
                None
            } else {
                Some(Value::Float(a % b))
            }
        }
        BinaryOp::Lt => Some(Value::Bool(a < b)),
        BinaryOp::LtEq => Some(Value::Bool(a <= b)),
        BinaryOp::Gt => Some(Value::Bool(a > b)),
        BinaryOp::GtEq => Some(Value::Bool(a >= b)),
        _ => None,
    }
}

pub(crate) fn unary_op(op: UnaryOp, value: &Value) -> Result<Value, RuntimeErrorKind> {
    match (op, value) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
        (UnaryOp::Neg, Value::Int(n)) => {
            n.checked_neg()
                .map(Value::Int)
                .ok_or(RuntimeErrorKind::IntegerOverflow {
                    op: "-".to_string(),
                })
        }
        (UnaryOp::Neg, Value::Float(n)) => Ok(Value::Float(-n)),
        (UnaryOp::Pos, Value::Int(n)) => Ok(Value::Int(*n)),
        (UnaryOp::Pos, Value::Float(n)) => Ok(Value::Float(*n)),
        (op, other) => Err(RuntimeErrorKind::BadUnaryOperand {
            op: op.symbol().to_string(),
            operand: other.type_name().to_string(),
        }),
    }
}

/// Index access: 0-based with negative wrap on lists and strings, key
/// lookup on dicts.
pub(crate) fn index_access(object: &Value, index: &Value) -> Result<Value, RuntimeErrorKind> {
    match (object, index) {
        (Value::List(items), Value::Int(i)) => {
            let items = items.borrow();
            let idx = resolve_index(*i, items.len()).ok_or(RuntimeErrorKind::IndexOutOfRange {
                index: *i,
                len: items.len(),
            })?;
            Ok(items[idx].clone())
        }
        (Value::Dict(entries), Value::String(key)) => entries
            .borrow()
            .get(key)
            .cloned()
            .ok_or_else(|| RuntimeErrorKind::KeyMissing { key: key.clone() }),
        (Value::String(s), Value::Int(i)) => {
            let chars: Vec<char> = s.chars().collect();
            let idx = resolve_index(*i, chars.len()).ok_or(RuntimeErrorKind::IndexOutOfRange {
                index: *i,
                len: chars.len(),
            })?;
            Ok(Value::string(chars[idx].to_string()))
        }
        (container, idx) => Err(RuntimeErrorKind::BadOperands {
            op: "[]".to_string(),
            lhs: container.type_name().to_string(),
            rhs: idx.type_name().to_string(),
        }),
    }
}
