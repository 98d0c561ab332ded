// ABOUTME: Linked scope chain; closures capture frames by reference, not by copy

use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug)]
pub struct Environment {
    bindings: RefCell<HashMap<String, Value>>,
    parent: Option<Rc<Environment>>,
}

impl Environment {
    /// A fresh global environment with no parent.
    pub fn new() -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: None,
        })
    }

    /// A fresh child frame pointing at `self`. This is what a closure call pushes
    /// atop the environment captured at its definition.
    pub fn pushed(self: &Rc<Self>) -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(Rc::clone(self)),
        })
    }

    /// Binds `name` in THIS frame only. Re-binding an existing identifier in the same
    /// frame overwrites it; this is the only mutation primitive the environment exposes,
    /// matching the normative rule that `let` mutates the innermost frame rather than
    /// walking up to rebind an existing outer binding.
    pub fn define(&self, name: &str, value: Value) {
        self.bindings.borrow_mut().insert(name.to_string(), value);
    }

    /// Walks the chain from this frame outward.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.bindings.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_and_lookup() {
        let env = Environment::new();
        env.define("x", Value::Number(42.0));
        match env.lookup("x") {
            Some(Value::Number(n)) => assert_eq!(n, 42.0),
            other => panic!("expected Number(42.0), got {:?}", other),
        }
    }

    #[test]
    fn undefined_symbol_is_none() {
        let env = Environment::new();
        assert!(env.lookup("missing").is_none());
    }

    #[test]
    fn pushed_frame_shadows_without_mutating_parent() {
        let parent = Environment::new();
        parent.define("x", Value::Number(1.0));

        let child = parent.pushed();
        child.define("x", Value::Number(2.0));

        match child.lookup("x") {
            Some(Value::Number(n)) => assert_eq!(n, 2.0),
            other => panic!("expected shadowed 2.0, got {:?}", other),
        }
        match parent.lookup("x") {
            Some(Value::Number(n)) => assert_eq!(n, 1.0),
            other => panic!("expected untouched 1.0, got {:?}", other),
        }
    }

    #[test]
    fn lookup_walks_multiple_levels() {
        let grandparent = Environment::new();
        grandparent.define("a", Value::Number(1.0));
        let parent = grandparent.pushed();
        parent.define("b", Value::Number(2.0));
        let child = parent.pushed();
        child.define("c", Value::Number(3.0));

        assert!(matches!(child.lookup("a"), Some(Value::Number(n)) if n == 1.0));
        assert!(matches!(child.lookup("b"), Some(Value::Number(n)) if n == 2.0));
        assert!(matches!(child.lookup("c"), Some(Value::Number(n)) if n == 3.0));
    }
}
