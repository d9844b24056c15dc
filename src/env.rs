// ABOUTME: Runtime scopes: chained frames of binding slots. Each slot
// remembers whether it came from `const`, so frozen names refuse assignment
// even for bindings the parser never saw (REPL snippets, host seeds).

use crate::error::RuntimeErrorKind;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A bound value plus its mutability. `let`, parameters, loop variables,
/// and imports are mutable; `const` freezes the slot.
#[derive(Debug)]
struct Slot {
    value: Value,
    frozen: bool,
}

/// One scope frame. Frames chain outward to the global scope; function
/// calls and loop iterations open a frame, dropping it closes the scope.
#[derive(Debug)]
pub struct Environment {
    slots: RefCell<HashMap<String, Slot>>,
    parent: Option<Rc<Environment>>,
}

impl Environment {
    /// The program-wide scope at the bottom of every chain.
    pub fn global() -> Rc<Self> {
        Rc::new(Environment {
            slots: RefCell::new(HashMap::new()),
            parent: None,
        })
    }

    /// Open a scope on top of this one (a function call or a single loop
    /// iteration).
    pub fn child(self: &Rc<Self>) -> Rc<Self> {
        Rc::new(Environment {
            slots: RefCell::new(HashMap::new()),
            parent: Some(Rc::clone(self)),
        })
    }

    /// The scope-chain snapshot a function value carries as its closure
    /// environment. Frames are shared rather than copied, so mutation
    /// after capture stays visible through the capture.
    pub fn capture(self: &Rc<Self>) -> Rc<Self> {
        Rc::clone(self)
    }

    /// Bind a mutable name in this frame, replacing any binding this frame
    /// already holds for it. Outer frames are never touched.
    pub fn declare(&self, name: impl Into<String>, value: Value) {
        self.slots.borrow_mut().insert(
            name.into(),
            Slot {
                value,
                frozen: false,
            },
        );
    }

    /// Bind a `const` name in this frame; `assign` refuses it from then on.
    pub fn declare_const(&self, name: impl Into<String>, value: Value) {
        self.slots.borrow_mut().insert(
            name.into(),
            Slot {
                value,
                frozen: true,
            },
        );
    }

    /// Read a name, innermost frame first.
    pub fn get(&self, name: &str) -> Option<Value> {
        let mut scope = self;
        loop {
            if let Some(slot) = scope.slots.borrow().get(name) {
                return Some(slot.value.clone());
            }
            scope = scope.parent.as_deref()?;
        }
    }

    /// Overwrite the innermost binding of `name`, walking outward until a
    /// frame holds it. Frozen slots refuse; a name bound nowhere fails.
    pub fn assign(&self, name: &str, value: Value) -> Result<(), RuntimeErrorKind> {
        let mut scope = self;
        loop {
            {
                let mut slots = scope.slots.borrow_mut();
                if let Some(slot) = slots.get_mut(name) {
                    if slot.frozen {
                        return Err(RuntimeErrorKind::ConstReassigned {
                            name: name.to_string(),
                        });
                    }
                    slot.value = value;
                    return Ok(());
                }
            }
            match &scope.parent {
                Some(parent) => scope = parent.as_ref(),
                None => {
                    return Err(RuntimeErrorKind::UndefinedVariable {
                        name: name.to_string(),
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_and_get() {
        let env = Environment::global();
        env.declare("x", Value::Int(42));
        match env.get("x") {
            Some(Value::Int(n)) => assert_eq!(n, 42),
            other => panic!("unexpected {:?}", other),
        }
        assert!(env.get("missing").is_none());
    }

    #[test]
    fn test_inner_frame_shadows_outer() {
        let outer = Environment::global();
        outer.declare("x", Value::Int(1));
        let inner = outer.child();
        inner.declare("x", Value::Int(2));

        assert!(matches!(inner.get("x"), Some(Value::Int(2))));
        assert!(matches!(outer.get("x"), Some(Value::Int(1))));
    }

    #[test]
    fn test_get_walks_to_global() {
        let global = Environment::global();
        global.declare("x", Value::Int(7));
        let deep = global.child().child().child();
        assert!(matches!(deep.get("x"), Some(Value::Int(7))));
    }

    #[test]
    fn test_assign_mutates_first_matching_frame() {
        let outer = Environment::global();
        outer.declare("count", Value::Int(0));
        let inner = outer.child();

        inner.assign("count", Value::Int(1)).unwrap();
        assert!(matches!(outer.get("count"), Some(Value::Int(1))));
    }

    #[test]
    fn test_assign_missing_fails() {
        let env = Environment::global();
        let err = env.assign("ghost", Value::None).unwrap_err();
        assert!(matches!(
            err,
            RuntimeErrorKind::UndefinedVariable { ref name } if name == "ghost"
        ));
    }

    #[test]
    fn test_const_slot_refuses_assignment() {
        let env = Environment::global();
        env.declare_const("limit", Value::Int(10));
        let err = env.child().assign("limit", Value::Int(99)).unwrap_err();
        assert!(matches!(
            err,
            RuntimeErrorKind::ConstReassigned { ref name } if name == "limit"
        ));
        assert!(matches!(env.get("limit"), Some(Value::Int(10))));
    }

    #[test]
    fn test_redeclare_replaces_within_frame() {
        // A fresh loop iteration reuses a frame-local name freely.
        let env = Environment::global();
        env.declare("i", Value::Int(1));
        env.declare("i", Value::Int(2));
        assert!(matches!(env.get("i"), Some(Value::Int(2))));
    }

    #[test]
    fn test_capture_shares_frames() {
        let global = Environment::global();
        global.declare("x", Value::Int(1));
        let captured = global.capture();

        global.assign("x", Value::Int(5)).unwrap();
        assert!(matches!(captured.get("x"), Some(Value::Int(5))));
    }
}
