// ABOUTME: Runtime value union: the dynamic types a Flowby script can hold

use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::ast::{Expr, Stmt};
use crate::context::NamespaceCall;
use crate::env::Environment;

/// A user-defined function or lambda together with its captured closure
/// environment.
pub struct FunctionValue {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: FunctionBody,
    /// Scope chain snapshot taken when the function value was created.
    pub env: Rc<Environment>,
}

pub enum FunctionBody {
    Block(Rc<Vec<Stmt>>),
    Expr(Rc<Expr>),
}

/// The dynamic value union. Lists and dicts are shared-mutable so that
/// `xs[0] = 1` through any alias is observable everywhere; dicts preserve
/// insertion order.
#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Rc<RefCell<Vec<Value>>>),
    Dict(Rc<RefCell<IndexMap<String, Value>>>),
    Function(Rc<FunctionValue>),
    Namespace(Rc<dyn NamespaceCall>),
    Resource(Rc<dyn NamespaceCall>),
}

impl Value {
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn dict(entries: IndexMap<String, Value>) -> Self {
        Value::Dict(Rc::new(RefCell::new(entries)))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "None",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Function(_) => "function",
            Value::Namespace(_) => "namespace",
            Value::Resource(_) => "resource",
        }
    }

    /// None, False, 0, 0.0, "", empty list, empty dict are falsy;
    /// everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Dict(entries) => !entries.borrow().is_empty(),
            Value::Function(_) | Value::Namespace(_) | Value::Resource(_) => true,
        }
    }

    /// Structural equality. Numbers compare across Int/Float; collections
    /// compare element-wise; functions and opaque handles compare identity.
    pub fn value_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.value_eq(y))
            }
            (Value::Dict(a), Value::Dict(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|w| v.value_eq(w)))
            }
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Namespace(a), Value::Namespace(b)) => Rc::ptr_eq(a, b),
            (Value::Resource(a), Value::Resource(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// The conversion used by `str(x)`, f-string rendering, and `log`.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            other => other.repr(),
        }
    }

    /// Quoted rendering used inside collections.
    pub fn repr(&self) -> String {
        match self {
            Value::None => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    format!("{:.1}", n)
                } else {
                    n.to_string()
                }
            }
            Value::String(s) => format!("\"{}\"", s),
            Value::List(items) => {
                let inner: Vec<String> = items.borrow().iter().map(|v| v.repr()).collect();
                format!("[{}]", inner.join(", "))
            }
            Value::Dict(entries) => {
                let inner: Vec<String> = entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| format!("\"{}\": {}", k, v.repr()))
                    .collect();
                format!("{{{}}}", inner.join(", "))
            }
            Value::Function(f) => match &f.name {
                Some(name) => format!("<function {}>", name),
                None => "<lambda>".to_string(),
            },
            Value::Namespace(ns) => format!("<namespace {}>", ns.name()),
            Value::Resource(r) => format!("<resource {}>", r.name()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Namespace(ns) => write!(f, "Namespace({})", ns.name()),
            Value::Resource(r) => write!(f, "Resource({})", r.name()),
            Value::Function(func) => match &func.name {
                Some(name) => write!(f, "Function({})", name),
                None => write!(f, "Function(<lambda>)"),
            },
            other => write!(f, "{}", other.repr()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::None.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
        assert!(!Value::string("").is_truthy());
        assert!(!Value::list(vec![]).is_truthy());
        assert!(!Value::dict(IndexMap::new()).is_truthy());

        assert!(Value::Int(-1).is_truthy());
        assert!(Value::string("0").is_truthy());
        assert!(Value::list(vec![Value::None]).is_truthy());
    }

    #[test]
    fn test_numeric_equality_across_kinds() {
        assert!(Value::Int(2).value_eq(&Value::Float(2.0)));
        assert!(Value::Float(2.0).value_eq(&Value::Int(2)));
        assert!(!Value::Int(2).value_eq(&Value::Float(2.5)));
    }

    #[test]
    fn test_list_equality_elementwise() {
        let a = Value::list(vec![Value::Int(1), Value::string("x")]);
        let b = Value::list(vec![Value::Int(1), Value::string("x")]);
        let c = Value::list(vec![Value::Int(1)]);
        assert!(a.value_eq(&b));
        assert!(!a.value_eq(&c));
    }

    #[test]
    fn test_dict_equality() {
        let mut m1 = IndexMap::new();
        m1.insert("a".to_string(), Value::Int(1));
        let mut m2 = IndexMap::new();
        m2.insert("a".to_string(), Value::Int(1));
        assert!(Value::dict(m1).value_eq(&Value::dict(m2)));
    }

    #[test]
    fn test_shared_list_mutation_visible_through_alias() {
        let a = Value::list(vec![Value::Int(1)]);
        let b = a.clone();
        if let Value::List(items) = &a {
            items.borrow_mut().push(Value::Int(2));
        }
        if let Value::List(items) = &b {
            assert_eq!(items.borrow().len(), 2);
        }
    }

    #[test]
    fn test_display_string_rule() {
        assert_eq!(Value::string("hi").to_display_string(), "hi");
        assert_eq!(Value::Int(3).to_display_string(), "3");
        assert_eq!(Value::Float(2.0).to_display_string(), "2.0");
        assert_eq!(Value::Bool(true).to_display_string(), "True");
        assert_eq!(Value::None.to_display_string(), "None");
        assert_eq!(
            Value::list(vec![Value::Int(1), Value::string("a")]).to_display_string(),
            "[1, \"a\"]"
        );
    }
}
