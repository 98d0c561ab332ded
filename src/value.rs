// ABOUTME: Runtime values: reference-shared aggregates, closures, and booleans-as-closures

use crate::ast::Expr;
use crate::env::Environment;
use crate::error::RumError;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// How a builtin wants its arguments. Almost every builtin is `Eager`; the handful that
/// must inspect unevaluated argument forms (boolean selection, `and`/`or`, `.`, `$`) are
/// `Lazy` and receive the raw expressions plus the calling environment.
#[derive(Clone)]
pub enum Behavior {
    Eager(fn(&[Value]) -> Result<Value, RumError>),
    Lazy(fn(&[Expr], &Rc<Environment>) -> Result<Value, RumError>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Range(usize, usize),
}

impl Arity {
    pub fn accepts(&self, n: usize) -> bool {
        match self {
            Arity::Exact(k) => n == *k,
            Arity::AtLeast(k) => n >= *k,
            Arity::Range(lo, hi) => n >= *lo && n <= *hi,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(k) => write!(f, "{}", k),
            Arity::AtLeast(k) => write!(f, "at least {}", k),
            Arity::Range(lo, hi) => write!(f, "{}-{}", lo, hi),
        }
    }
}

pub struct BuiltinData {
    pub name: String,
    pub arity: Arity,
    pub behavior: Behavior,
}

pub struct ClosureData {
    pub params: Vec<String>,
    pub body: Expr,
    pub env: Rc<Environment>,
    /// Set when bound via `let` (LetFunc); lambdas stay anonymous for stack traces.
    pub name: RefCell<Option<String>>,
}

#[derive(Clone)]
pub enum Value {
    Unit,
    Number(f64),
    String(String),
    List(Rc<RefCell<Vec<Value>>>),
    Dict(Rc<RefCell<Vec<(Value, Value)>>>),
    Closure(Rc<ClosureData>),
    BuiltinClosure(Rc<BuiltinData>),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repr())
    }
}

impl Value {
    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn dict(entries: Vec<(Value, Value)>) -> Value {
        Value::Dict(Rc::new(RefCell::new(entries)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Closure(_) => "closure",
            Value::BuiltinClosure(_) => "builtin",
        }
    }

    /// Value equality for scalars, identity equality for aggregates/closures/booleans.
    /// No cross-type key equality (spec's open question resolved: strict type match).
    pub fn key_eq(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Unit, Value::Unit) => true,
            (Value::Number(x), Value::Number(y)) => x == y,
            (Value::String(x), Value::String(y)) => x == y,
            (Value::List(x), Value::List(y)) => Rc::ptr_eq(x, y),
            (Value::Dict(x), Value::Dict(y)) => Rc::ptr_eq(x, y),
            (Value::Closure(x), Value::Closure(y)) => Rc::ptr_eq(x, y),
            (Value::BuiltinClosure(x), Value::BuiltinClosure(y)) => Rc::ptr_eq(x, y),
            _ => false,
        }
    }

    /// Human-facing form: strings unquoted. Used by `show`, `print`, `println`.
    pub fn show(&self) -> String {
        match self {
            Value::Unit => "()".to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::List(items) => {
                let items = items.borrow();
                let body: Vec<String> = items.iter().map(Value::repr).collect();
                format!("[{}]", body.join(" "))
            }
            Value::Dict(entries) => {
                let entries = entries.borrow();
                let body: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("({} {})", k.repr(), v.repr()))
                    .collect();
                format!("{{{}}}", body.join(" "))
            }
            Value::Closure(c) => match &*c.name.borrow() {
                Some(name) => format!("#<closure {}>", name),
                None => "#<closure>".to_string(),
            },
            Value::BuiltinClosure(b) => format!("#<builtin {}>", b.name),
        }
    }

    /// Re-readable form: strings quoted. Used by `repr` and the REPL's top-level printer.
    pub fn repr(&self) -> String {
        match self {
            Value::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            other => other.show(),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.show())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_display() {
        let whole = Value::Number(42.0);
        assert_eq!(format!("{}", whole), "42");

        let decimal = Value::Number(-2.5);
        assert_eq!(format!("{}", decimal), "-2.5");

        let zero = Value::Number(0.0);
        assert_eq!(format!("{}", zero), "0");
    }

    #[test]
    fn unit_is_distinct_from_empty_list() {
        assert_eq!(Value::Unit.show(), "()");
        assert_eq!(Value::list(vec![]).show(), "[]");
        assert!(!Value::key_eq(&Value::Unit, &Value::list(vec![])));
    }

    #[test]
    fn list_display_nests_with_quoted_string_elements() {
        let nested = Value::list(vec![
            Value::Number(1.0),
            Value::list(vec![Value::String("a".to_string()), Value::Number(2.0)]),
        ]);
        assert_eq!(nested.show(), "[1 [\"a\" 2]]");
    }

    #[test]
    fn string_is_unquoted_in_show_and_quoted_in_repr() {
        let s = Value::String("hello".to_string());
        assert_eq!(s.show(), "hello");
        assert_eq!(s.repr(), "\"hello\"");
    }

    #[test]
    fn key_eq_is_by_value_for_scalars_and_identity_for_aggregates() {
        let a = Value::list(vec![Value::Number(1.0)]);
        let b = Value::list(vec![Value::Number(1.0)]);
        assert!(!Value::key_eq(&a, &b));
        assert!(Value::key_eq(&a, &a.clone()));
        assert!(Value::key_eq(&Value::Number(1.0), &Value::Number(1.0)));
        assert!(!Value::key_eq(&Value::Number(1.0), &Value::String("1".to_string())));
    }
}
