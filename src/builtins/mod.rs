//! # Built-in operation table
//!
//! Primitive operations installed at the bottom of every fresh environment, organized into
//! the categories from the builtin table design: arithmetic, comparison, conversion,
//! sequence, control/introspection, booleans, and the host boundary.
//!
//! Each category module owns a `register(env)` function that both binds its `Value::BuiltinClosure`s
//! and records a [`crate::help::HelpEntry`] for each one.

use crate::env::Environment;
use crate::error::RumError;
use crate::value::Value;
use std::rc::Rc;

pub mod arithmetic;
pub mod booleans;
pub mod comparison;
pub mod control;
pub mod conversion;
pub mod host_ops;
pub mod sequence;

/// The standardized message for builtin type mismatches: `unaccepted arguments types (T1 T2) for 'name'`.
/// The call location is appended by the evaluator when the error surfaces, not here.
pub fn type_error(name: &str, values: &[Value]) -> RumError {
    let types: Vec<&str> = values.iter().map(Value::type_name).collect();
    RumError::evaluation(format!("unaccepted arguments types ({}) for '{}'", types.join(" "), name), None)
}

pub fn register_builtins(env: &Rc<Environment>) {
    arithmetic::register(env);
    comparison::register(env);
    conversion::register(env);
    sequence::register(env);
    control::register(env);
    booleans::register(env);
    host_ops::register(env);
}
