//! Numeric rounding, value/text conversion, and string decomposition.

use super::type_error;
use crate::env::Environment;
use crate::error::RumError;
use crate::help::help_entry;
use crate::value::{Arity, Behavior, BuiltinData, Value};
use std::path::Path;
use std::rc::Rc;

fn numeric_unary(name: &str, args: &[Value], f: fn(f64) -> f64) -> Result<Value, RumError> {
    match &args[0] {
        Value::Number(n) => Ok(Value::Number(f(*n))),
        _ => Err(type_error(name, args)),
    }
}

fn trunc(args: &[Value]) -> Result<Value, RumError> {
    numeric_unary("trunc", args, f64::trunc)
}

fn floor(args: &[Value]) -> Result<Value, RumError> {
    numeric_unary("floor", args, f64::floor)
}

fn ceil(args: &[Value]) -> Result<Value, RumError> {
    numeric_unary("ceil", args, f64::ceil)
}

fn round(args: &[Value]) -> Result<Value, RumError> {
    numeric_unary("round", args, f64::round)
}

/// Polymorphic: absolute value on a number, canonicalized absolute path on a string.
/// Canonicalization here is lexical (no filesystem access), matching the core's
/// no-host-I/O scope; `.`/`..` segments are resolved against a leading `/`.
fn abs(args: &[Value]) -> Result<Value, RumError> {
    match &args[0] {
        Value::Number(n) => Ok(Value::Number(n.abs())),
        Value::String(s) => {
            let mut parts: Vec<&str> = Vec::new();
            for segment in Path::new(s).components() {
                use std::path::Component;
                match segment {
                    Component::CurDir => {}
                    Component::ParentDir => {
                        parts.pop();
                    }
                    Component::Normal(p) => parts.push(p.to_str().unwrap_or("")),
                    Component::RootDir | Component::Prefix(_) => {}
                }
            }
            Ok(Value::String(format!("/{}", parts.join("/"))))
        }
        _ => Err(type_error("abs", args)),
    }
}

fn show(args: &[Value]) -> Result<Value, RumError> {
    Ok(Value::String(args[0].show()))
}

fn repr(args: &[Value]) -> Result<Value, RumError> {
    Ok(Value::String(args[0].repr()))
}

/// Parses a decimal string into a number, per the lexer's own number grammar (`-?\d+(\.\d+)?`).
fn parse(args: &[Value]) -> Result<Value, RumError> {
    match &args[0] {
        Value::String(s) => s
            .parse::<f64>()
            .map(Value::Number)
            .map_err(|_| RumError::evaluation(format!("cannot parse '{}' as a number", s), None)),
        _ => Err(type_error("parse", args)),
    }
}

fn chars(args: &[Value]) -> Result<Value, RumError> {
    match &args[0] {
        Value::String(s) => Ok(Value::list(s.chars().map(|c| Value::String(c.to_string())).collect())),
        _ => Err(type_error("chars", args)),
    }
}

fn def(env: &Rc<Environment>, name: &str, f: fn(&[Value]) -> Result<Value, RumError>) {
    env.define(
        name,
        Value::BuiltinClosure(Rc::new(BuiltinData { name: name.to_string(), arity: Arity::Exact(1), behavior: Behavior::Eager(f) })),
    );
}

pub fn register(env: &Rc<Environment>) {
    def(env, "trunc", trunc);
    def(env, "floor", floor);
    def(env, "ceil", ceil);
    def(env, "round", round);
    def(env, "abs", abs);
    def(env, "show", show);
    def(env, "repr", repr);
    def(env, "parse", parse);
    def(env, "chars", chars);

    help_entry!("trunc", "Conversion", "(trunc n)", "Truncates toward zero.", ["(trunc 1.9) => 1"], ["floor", "ceil", "round"]);
    help_entry!("floor", "Conversion", "(floor n)", "Rounds down.", ["(floor 1.9) => 1"], ["ceil", "round"]);
    help_entry!("ceil", "Conversion", "(ceil n)", "Rounds up.", ["(ceil 1.1) => 2"], ["floor", "round"]);
    help_entry!("round", "Conversion", "(round n)", "Rounds to nearest.", ["(round 1.5) => 2"], ["trunc", "floor"]);
    help_entry!("abs", "Conversion", "(abs n)", "Absolute value on a number, canonicalized absolute path on a string.",
        ["(abs -3) => 3", "(abs \"a/../b\") => \"/b\""], ["show"]);
    help_entry!("show", "Conversion", "(show v)", "Human-facing rendering: strings unquoted.", ["(show \"hi\") => \"hi\""], ["repr"]);
    help_entry!("repr", "Conversion", "(repr v)", "Re-readable rendering: strings quoted.", ["(repr \"hi\") => \"\\\"hi\\\"\""], ["show"]);
    help_entry!("parse", "Conversion", "(parse s)", "Parses a decimal string into a number.", ["(parse \"3.5\") => 3.5"], ["show"]);
    help_entry!("chars", "Conversion", "(chars s)", "Splits a string into a list of one-character strings.", ["(chars \"ab\") => [\"a\" \"b\"]"], []);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abs_is_polymorphic() {
        assert!(matches!(abs(&[Value::Number(-3.0)]), Ok(Value::Number(n)) if n == 3.0));
        let p = abs(&[Value::String("a/./b/../c".to_string())]).unwrap();
        assert_eq!(p.show(), "/a/c");
    }

    #[test]
    fn parse_rejects_non_numeric_text() {
        assert!(parse(&[Value::String("abc".to_string())]).is_err());
    }

    #[test]
    fn show_and_repr_differ_on_strings() {
        let v = Value::String("hi".to_string());
        assert_eq!(show(&[v.clone()]).unwrap().show(), "hi");
        assert_eq!(repr(&[v]).unwrap().show(), "\"hi\"");
    }

    #[test]
    fn chars_splits_into_single_character_strings() {
        let result = chars(&[Value::String("ab".to_string())]).unwrap();
        assert_eq!(result.show(), "[\"a\" \"b\"]");
    }
}
