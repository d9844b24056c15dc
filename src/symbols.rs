// ABOUTME: Parse-time symbol table: a stack of scope frames used for
// use-before-declaration, const, and duplicate checks

use indexmap::IndexMap;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Const,
    Variable,
    Function,
    Library,
    Import,
    Parameter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub defined_at_line: usize,
}

/// Why a `define` was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefineError {
    Duplicate,
    ShadowsBuiltin,
}

/// Why an `assign` was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignError {
    NotFound,
    IsConst,
}

/// A stack of scope frames, innermost last. Frames are insertion-ordered
/// maps so diagnostics list names in declaration order.
///
/// A fixed set of system names (namespace roots, built-in functions,
/// `page`/`env`/`response`) is always resolvable and never shadowable.
#[derive(Debug)]
pub struct SymbolTable {
    frames: Vec<IndexMap<String, Symbol>>,
    system_names: HashSet<String>,
}

impl SymbolTable {
    pub fn new(system_names: HashSet<String>) -> Self {
        SymbolTable {
            frames: vec![IndexMap::new()],
            system_names,
        }
    }

    pub fn push(&mut self) {
        self.frames.push(IndexMap::new());
    }

    pub fn pop(&mut self) {
        debug_assert!(self.frames.len() > 1, "cannot pop the global scope");
        self.frames.pop();
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_system(&self, name: &str) -> bool {
        self.system_names.contains(name)
    }

    /// Bind a name in the top frame. Duplicates within the frame and
    /// collisions with system names are refused.
    pub fn define(&mut self, symbol: Symbol) -> Result<(), DefineError> {
        if self.system_names.contains(&symbol.name) {
            return Err(DefineError::ShadowsBuiltin);
        }
        let top = self.frames.last_mut().expect("at least the global frame");
        if top.contains_key(&symbol.name) {
            return Err(DefineError::Duplicate);
        }
        top.insert(symbol.name.clone(), symbol);
        Ok(())
    }

    /// Walk the frames innermost-out for a binding.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.frames.iter().rev().find_map(|f| f.get(name))
    }

    /// Whether `name` resolves at all, counting system names.
    pub fn exists(&self, name: &str) -> bool {
        self.system_names.contains(name) || self.lookup(name).is_some()
    }

    /// Validate an assignment target: the first matching binding walking
    /// down the stack must exist and must not be const.
    pub fn assign(&self, name: &str) -> Result<(), AssignError> {
        match self.lookup(name) {
            Some(sym) if sym.kind == SymbolKind::Const => Err(AssignError::IsConst),
            Some(_) => Ok(()),
            None => Err(AssignError::NotFound),
        }
    }
}
