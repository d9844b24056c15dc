//! # Built-in namespaces and free functions
//!
//! The dispatch shell the interpreter resolves names into, organized one
//! namespace per sub-module:
//!
//! - **[math]**: `Math.abs`, `Math.min`, `Math.max`, `Math.floor`, `Math.ceil`,
//!   `Math.round`, `Math.pow`, `Math.sqrt`
//! - **[json]**: `JSON.parse`, `JSON.stringify`
//! - **[date]**: `Date.now`, `Date.today`, `Date.timestamp`, `Date.format`,
//!   `Date.year`, `Date.month`, `Date.day`
//! - **[random]**: `random.int`, `random.float`, `random.choice`,
//!   `random.string`, `random.id`
//! - **[http]**: `http.get`, `http.post`, `http.put`, `http.delete` (gated by
//!   [`NetConfig`])
//! - **[util]**: dict/string helpers (`util.keys`, `util.join`, ...)
//! - **[env_ns]**: environment variables (`env.get`, `env.has`)
//! - **[free]**: the free functions `len`, `str`, `int`, `float`, `bool`,
//!   `range`, `enumerate`, `zip`
//!
//! Each namespace implements [`NamespaceCall`]; hosts may override or extend
//! the registry before constructing the interpreter.

use indexmap::IndexMap;
use std::collections::HashSet;
use std::rc::Rc;

use crate::config::NetConfig;
use crate::context::NamespaceCall;
use crate::error::RuntimeErrorKind;
use crate::value::Value;

pub mod date;
pub mod env_ns;
pub mod free;
pub mod http;
pub mod json;
pub mod math;
pub mod random;
pub mod util;

// ============================================================================
// Namespace registry
// ============================================================================

/// Resolves namespace root identifiers (`Math`, `http`, `page`, ...) to
/// host-provided dispatch objects.
#[derive(Clone, Default)]
pub struct NamespaceRegistry {
    entries: IndexMap<String, Rc<dyn NamespaceCall>>,
}

impl NamespaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, ns: Rc<dyn NamespaceCall>) {
        self.entries.insert(ns.name().to_string(), ns);
    }

    pub fn get(&self, name: &str) -> Option<Rc<dyn NamespaceCall>> {
        self.entries.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_str())
    }
}

/// The namespaces every context starts with. `http` honors the given
/// network settings; `page` and `response` are stubs until a driver host
/// replaces them.
pub fn default_namespaces(net: &NetConfig) -> NamespaceRegistry {
    let mut registry = NamespaceRegistry::new();
    registry.register(Rc::new(math::MathNamespace));
    registry.register(Rc::new(json::JsonNamespace));
    registry.register(Rc::new(date::DateNamespace));
    registry.register(Rc::new(random::RandomNamespace));
    registry.register(Rc::new(http::HttpNamespace::new(net.clone())));
    registry.register(Rc::new(util::UtilNamespace));
    registry.register(Rc::new(env_ns::EnvNamespace));
    registry.register(Rc::new(HostStub { name: "page" }));
    registry.register(Rc::new(HostStub { name: "response" }));
    registry
}

/// Placeholder for namespaces only a real driver host can provide.
struct HostStub {
    name: &'static str,
}

impl NamespaceCall for HostStub {
    fn name(&self) -> &str {
        self.name
    }

    fn invoke(
        &self,
        method: &str,
        _args: &[Value],
        _kwargs: &crate::context::Kwargs,
    ) -> Result<Value, RuntimeErrorKind> {
        Err(RuntimeErrorKind::Host {
            message: format!(
                "'{}.{}' requires a driver host; none is attached",
                self.name, method
            ),
        })
    }
}

// ============================================================================
// Free-function registry
// ============================================================================

/// A registered built-in free function.
#[derive(Clone, Copy)]
pub struct BuiltinFn {
    pub name: &'static str,
    pub category: &'static str,
    pub summary: &'static str,
    pub func: fn(&[Value]) -> Result<Value, RuntimeErrorKind>,
}

/// Table of built-in free functions plus host-injected global names.
#[derive(Default)]
pub struct BuiltinRegistry {
    entries: IndexMap<&'static str, BuiltinFn>,
    injected: Vec<String>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, f: BuiltinFn) {
        self.entries.insert(f.name, f);
    }

    pub fn get(&self, name: &str) -> Option<&BuiltinFn> {
        self.entries.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    pub fn entries(&self) -> impl Iterator<Item = &BuiltinFn> {
        self.entries.values()
    }

    /// Names the host injects as always-defined globals (resolved by the
    /// host's own namespaces or bindings, not by this table).
    pub fn note_injected(&mut self, name: &str) {
        self.injected.push(name.to_string());
    }

    pub fn injected_names(&self) -> impl Iterator<Item = &str> {
        self.injected.iter().map(|s| s.as_str())
    }
}

/// The names the parser treats as permanently defined: namespace roots,
/// built-in free functions, `input`, `Resource`, and the driver globals.
pub fn default_system_names() -> HashSet<String> {
    let mut names: HashSet<String> = ["page", "env", "response", "Resource", "input"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    for root in ["Math", "JSON", "Date", "random", "http", "util"] {
        names.insert(root.to_string());
    }
    let mut registry = BuiltinRegistry::new();
    free::register(&mut registry);
    for n in registry.names() {
        names.insert(n.to_string());
    }
    names
}

/// System names for a specific context, including host-injected globals.
pub fn system_names_for(context: &crate::context::ExecutionContext) -> HashSet<String> {
    let mut names: HashSet<String> = ["page", "env", "response", "Resource", "input"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    for root in context.namespaces.names() {
        names.insert(root.to_string());
    }
    for n in context.builtins.names() {
        names.insert(n.to_string());
    }
    for n in context.builtins.injected_names() {
        names.insert(n.to_string());
    }
    names
}

// ============================================================================
// Argument helpers shared by the namespace implementations
// ============================================================================

pub(crate) fn check_arity(
    callee: &str,
    args: &[Value],
    expected: usize,
) -> Result<(), RuntimeErrorKind> {
    if args.len() != expected {
        return Err(RuntimeErrorKind::wrong_arity(callee, expected, args.len()));
    }
    Ok(())
}

pub(crate) fn expect_string<'a>(
    callee: &str,
    args: &'a [Value],
    idx: usize,
) -> Result<&'a str, RuntimeErrorKind> {
    match args.get(idx) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(RuntimeErrorKind::bad_argument(
            callee,
            format!("argument {} must be a string, got {}", idx + 1, other.type_name()),
        )),
        None => Err(RuntimeErrorKind::bad_argument(
            callee,
            format!("argument {} is required", idx + 1),
        )),
    }
}

pub(crate) fn expect_number(
    callee: &str,
    args: &[Value],
    idx: usize,
) -> Result<f64, RuntimeErrorKind> {
    match args.get(idx) {
        Some(Value::Int(n)) => Ok(*n as f64),
        Some(Value::Float(n)) => Ok(*n),
        Some(other) => Err(RuntimeErrorKind::bad_argument(
            callee,
            format!("argument {} must be a number, got {}", idx + 1, other.type_name()),
        )),
        None => Err(RuntimeErrorKind::bad_argument(
            callee,
            format!("argument {} is required", idx + 1),
        )),
    }
}

pub(crate) fn expect_int(
    callee: &str,
    args: &[Value],
    idx: usize,
) -> Result<i64, RuntimeErrorKind> {
    match args.get(idx) {
        Some(Value::Int(n)) => Ok(*n),
        Some(other) => Err(RuntimeErrorKind::bad_argument(
            callee,
            format!("argument {} must be an integer, got {}", idx + 1, other.type_name()),
        )),
        None => Err(RuntimeErrorKind::bad_argument(
            callee,
            format!("argument {} is required", idx + 1),
        )),
    }
}

pub(crate) fn expect_list(
    callee: &str,
    args: &[Value],
    idx: usize,
) -> Result<Vec<Value>, RuntimeErrorKind> {
    match args.get(idx) {
        Some(Value::List(items)) => Ok(items.borrow().clone()),
        Some(other) => Err(RuntimeErrorKind::bad_argument(
            callee,
            format!("argument {} must be a list, got {}", idx + 1, other.type_name()),
        )),
        None => Err(RuntimeErrorKind::bad_argument(
            callee,
            format!("argument {} is required", idx + 1),
        )),
    }
}

pub(crate) fn expect_dict(
    callee: &str,
    args: &[Value],
    idx: usize,
) -> Result<IndexMap<String, Value>, RuntimeErrorKind> {
    match args.get(idx) {
        Some(Value::Dict(entries)) => Ok(entries.borrow().clone()),
        Some(other) => Err(RuntimeErrorKind::bad_argument(
            callee,
            format!("argument {} must be a dict, got {}", idx + 1, other.type_name()),
        )),
        None => Err(RuntimeErrorKind::bad_argument(
            callee,
            format!("argument {} is required", idx + 1),
        )),
    }
}
