//! Equality is identity on aggregates/closures/booleans and value equality on numbers/strings.
//! Ordering works on numbers, strings, and lists (explicit lexicographic order, per the
//! open question in the builtin contract: reference-identity comparison on lists is a bug).

use super::type_error;
use crate::env::Environment;
use crate::error::RumError;
use crate::help::help_entry;
use crate::value::{Arity, Behavior, BuiltinData, Value};
use std::cmp::Ordering;
use std::rc::Rc;

fn compare(name: &str, a: &Value, b: &Value) -> Result<Ordering, RumError> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y).ok_or_else(|| type_error(name, &[a.clone(), b.clone()])),
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        (Value::List(x), Value::List(y)) => {
            let x = x.borrow();
            let y = y.borrow();
            for (xi, yi) in x.iter().zip(y.iter()) {
                match compare(name, xi, yi)? {
                    Ordering::Equal => continue,
                    other => return Ok(other),
                }
            }
            Ok(x.len().cmp(&y.len()))
        }
        _ => Err(type_error(name, &[a.clone(), b.clone()])),
    }
}

fn eq(args: &[Value]) -> Result<Value, RumError> {
    Ok(crate::builtins::booleans::bool_value(Value::key_eq(&args[0], &args[1])))
}

fn neq(args: &[Value]) -> Result<Value, RumError> {
    Ok(crate::builtins::booleans::bool_value(!Value::key_eq(&args[0], &args[1])))
}

fn lt(args: &[Value]) -> Result<Value, RumError> {
    Ok(crate::builtins::booleans::bool_value(compare("lt", &args[0], &args[1])? == Ordering::Less))
}

fn gt(args: &[Value]) -> Result<Value, RumError> {
    Ok(crate::builtins::booleans::bool_value(compare("gt", &args[0], &args[1])? == Ordering::Greater))
}

fn le(args: &[Value]) -> Result<Value, RumError> {
    Ok(crate::builtins::booleans::bool_value(compare("le", &args[0], &args[1])? != Ordering::Greater))
}

fn ge(args: &[Value]) -> Result<Value, RumError> {
    Ok(crate::builtins::booleans::bool_value(compare("ge", &args[0], &args[1])? != Ordering::Less))
}

fn def(env: &Rc<Environment>, name: &str, f: fn(&[Value]) -> Result<Value, RumError>) {
    env.define(
        name,
        Value::BuiltinClosure(Rc::new(BuiltinData { name: name.to_string(), arity: Arity::Exact(2), behavior: Behavior::Eager(f) })),
    );
}

pub fn register(env: &Rc<Environment>) {
    def(env, "=", eq);
    def(env, "!=", neq);
    def(env, "lt", lt);
    def(env, "gt", gt);
    def(env, "le", le);
    def(env, "ge", ge);

    help_entry!("=", "Comparison", "(= a b)", "Value equality on numbers/strings, identity equality otherwise.",
        ["(= 1 1) => #t", "(= [1] [1]) => #f"], ["!=", "lt", "gt"]);
    help_entry!("!=", "Comparison", "(!= a b)", "Negation of =.", ["(!= 1 2) => #t"], ["="]);
    help_entry!("lt", "Comparison", "(lt a b)", "True if a orders strictly before b. Works on numbers, strings, lists.",
        ["(lt 1 2) => #t", "(lt \"a\" \"b\") => #t"], ["gt", "le", "ge"]);
    help_entry!("gt", "Comparison", "(gt a b)", "True if a orders strictly after b.", ["(gt 2 1) => #t"], ["lt", "ge"]);
    help_entry!("le", "Comparison", "(le a b)", "True if a does not order after b.", ["(le 1 1) => #t"], ["lt", "ge"]);
    help_entry!("ge", "Comparison", "(ge a b)", "True if a does not order before b.", ["(ge 1 1) => #t"], ["gt", "le"]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::booleans::is_truthy;

    #[test]
    fn numbers_and_strings_compare_by_value() {
        assert!(is_truthy(&eq(&[Value::Number(1.0), Value::Number(1.0)]).unwrap()));
        assert!(is_truthy(&eq(&[Value::String("a".into()), Value::String("a".into())]).unwrap()));
    }

    #[test]
    fn lists_compare_by_identity_for_equality_and_lexicographically_for_order() {
        let a = Value::list(vec![Value::Number(1.0)]);
        let b = Value::list(vec![Value::Number(1.0)]);
        assert!(!is_truthy(&eq(&[a.clone(), b.clone()]).unwrap()));
        assert!(is_truthy(&lt(&[Value::list(vec![Value::Number(1.0)]), Value::list(vec![Value::Number(2.0)])]).unwrap()));
        assert!(is_truthy(&lt(&[Value::list(vec![Value::Number(1.0)]), Value::list(vec![Value::Number(1.0), Value::Number(0.0)])]).unwrap()));
    }

    #[test]
    fn mismatched_types_are_a_type_error_for_ordering() {
        assert!(lt(&[Value::Number(1.0), Value::String("a".into())]).is_err());
    }
}
