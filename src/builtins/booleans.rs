//! Booleans as distinguished BuiltinClosure singletons: `#t` selects its first argument,
//! `#f` selects its second. Calling one of them *is* the conditional primitive.

use crate::env::Environment;
use crate::eval;
use crate::value::{Arity, Behavior, BuiltinData, Value};
use std::rc::Rc;

thread_local! {
    static TRUE: Rc<BuiltinData> = Rc::new(BuiltinData {
        name: "#t".to_string(),
        arity: Arity::Exact(2),
        behavior: Behavior::Lazy(|args, env| eval::eval(&args[0], env)),
    });
    static FALSE: Rc<BuiltinData> = Rc::new(BuiltinData {
        name: "#f".to_string(),
        arity: Arity::Exact(2),
        behavior: Behavior::Lazy(|args, env| eval::eval(&args[1], env)),
    });
}

/// The unique `#t` singleton for this interpreter.
pub fn true_value() -> Value {
    Value::BuiltinClosure(TRUE.with(Rc::clone))
}

/// The unique `#f` singleton for this interpreter.
pub fn false_value() -> Value {
    Value::BuiltinClosure(FALSE.with(Rc::clone))
}

pub fn bool_value(b: bool) -> Value {
    if b { true_value() } else { false_value() }
}

/// True for anything other than the `#f` singleton; RumLisp has no other falsy value.
pub fn is_truthy(v: &Value) -> bool {
    !matches!(v, Value::BuiltinClosure(b) if FALSE.with(|f| Rc::ptr_eq(b, f)))
}

pub fn register(env: &Rc<Environment>) {
    env.define("#t", true_value());
    env.define("#f", false_value());

    crate::help::help_entry!(
        "#t",
        "Booleans",
        "(#t then else)",
        "The true singleton. Calling it evaluates and returns only `then`.",
        ["(#t 1 (error \"unreachable\")) => 1"],
        ["#f", "not"]
    );
    crate::help::help_entry!(
        "#f",
        "Booleans",
        "(#f then else)",
        "The false singleton. Calling it evaluates and returns only `else`.",
        ["(#f (error \"unreachable\") 2) => 2"],
        ["#t", "not"]
    );
}
