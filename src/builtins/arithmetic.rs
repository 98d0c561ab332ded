//! Arithmetic and bitwise operators. `add` and `div` are polymorphic; the rest are numeric-only.

use super::type_error;
use crate::env::Environment;
use crate::error::RumError;
use crate::help::help_entry;
use crate::value::{Arity, Behavior, BuiltinData, Value};
use std::rc::Rc;

fn numbers(name: &str, args: &[Value]) -> Result<(f64, f64), RumError> {
    match (&args[0], &args[1]) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(type_error(name, args)),
    }
}

fn ints(name: &str, args: &[Value]) -> Result<(i64, i64), RumError> {
    let (a, b) = numbers(name, args)?;
    Ok((a as i64, b as i64))
}

fn add(args: &[Value]) -> Result<Value, RumError> {
    match (&args[0], &args[1]) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
        (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
        (Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        _ => Err(type_error("add", args)),
    }
}

fn sub(args: &[Value]) -> Result<Value, RumError> {
    let (a, b) = numbers("sub", args)?;
    Ok(Value::Number(a - b))
}

fn mul(args: &[Value]) -> Result<Value, RumError> {
    let (a, b) = numbers("mul", args)?;
    Ok(Value::Number(a * b))
}

/// Normalizes a join of two path segments onto a single forward slash, regardless of
/// whether either side already carries one.
fn join_paths(a: &str, b: &str) -> String {
    format!("{}/{}", a.trim_end_matches('/'), b.trim_start_matches('/'))
}

fn div(args: &[Value]) -> Result<Value, RumError> {
    match (&args[0], &args[1]) {
        (Value::Number(a), Value::Number(b)) => {
            if *b == 0.0 {
                Err(RumError::evaluation("division by zero", None))
            } else {
                Ok(Value::Number(a / b))
            }
        }
        (Value::String(a), Value::String(b)) => Ok(Value::String(join_paths(a, b))),
        _ => Err(type_error("div", args)),
    }
}

fn modulo(args: &[Value]) -> Result<Value, RumError> {
    let (a, b) = numbers("mod", args)?;
    if b == 0.0 {
        return Err(RumError::evaluation("modulus by zero", None));
    }
    Ok(Value::Number(a % b))
}

fn band(args: &[Value]) -> Result<Value, RumError> {
    let (a, b) = ints("band", args)?;
    Ok(Value::Number((a & b) as f64))
}

fn bor(args: &[Value]) -> Result<Value, RumError> {
    let (a, b) = ints("bor", args)?;
    Ok(Value::Number((a | b) as f64))
}

fn bxor(args: &[Value]) -> Result<Value, RumError> {
    let (a, b) = ints("bxor", args)?;
    Ok(Value::Number((a ^ b) as f64))
}

fn bcom(args: &[Value]) -> Result<Value, RumError> {
    match &args[0] {
        Value::Number(a) => Ok(Value::Number(!(*a as i64) as f64)),
        _ => Err(type_error("bcom", args)),
    }
}

fn shl(args: &[Value]) -> Result<Value, RumError> {
    let (a, b) = ints("<<", args)?;
    Ok(Value::Number((a << b) as f64))
}

fn shr(args: &[Value]) -> Result<Value, RumError> {
    let (a, b) = ints(">>", args)?;
    Ok(Value::Number((a >> b) as f64))
}

fn def(env: &Rc<Environment>, name: &str, arity: Arity, f: fn(&[Value]) -> Result<Value, RumError>) {
    env.define(name, Value::BuiltinClosure(Rc::new(BuiltinData { name: name.to_string(), arity, behavior: Behavior::Eager(f) })));
}

pub fn register(env: &Rc<Environment>) {
    def(env, "add", Arity::Exact(2), add);
    def(env, "sub", Arity::Exact(2), sub);
    def(env, "mul", Arity::Exact(2), mul);
    def(env, "div", Arity::Exact(2), div);
    def(env, "mod", Arity::Exact(2), modulo);
    def(env, "band", Arity::Exact(2), band);
    def(env, "bor", Arity::Exact(2), bor);
    def(env, "bxor", Arity::Exact(2), bxor);
    def(env, "bcom", Arity::Exact(1), bcom);
    def(env, "<<", Arity::Exact(2), shl);
    def(env, ">>", Arity::Exact(2), shr);

    help_entry!("add", "Arithmetic", "(add a b)", "Adds numbers, concatenates strings, or concatenates lists.",
        ["(add 1 2) => 3", "(add \"a\" \"b\") => \"ab\"", "(add [1] [2]) => [1 2]"], ["sub", "mul", "div"]);
    help_entry!("sub", "Arithmetic", "(sub a b)", "Subtracts b from a.", ["(sub 5 2) => 3"], ["add", "mul"]);
    help_entry!("mul", "Arithmetic", "(mul a b)", "Multiplies two numbers.", ["(mul 3 4) => 12"], ["add", "div"]);
    help_entry!("div", "Arithmetic", "(div a b)", "Divides numbers, or joins two path strings on a single slash.",
        ["(div 10 4) => 2.5", "(div \"a\" \"b\") => \"a/b\""], ["mul", "mod"]);
    help_entry!("mod", "Arithmetic", "(mod a b)", "Remainder of a divided by b.", ["(mod 17 5) => 2"], ["div"]);
    help_entry!("band", "Arithmetic", "(band a b)", "Bitwise AND of two numbers truncated to integers.", ["(band 6 3) => 2"], ["bor", "bxor"]);
    help_entry!("bor", "Arithmetic", "(bor a b)", "Bitwise OR.", ["(bor 4 1) => 5"], ["band", "bxor"]);
    help_entry!("bxor", "Arithmetic", "(bxor a b)", "Bitwise XOR.", ["(bxor 5 3) => 6"], ["band", "bor"]);
    help_entry!("bcom", "Arithmetic", "(bcom a)", "Bitwise complement.", ["(bcom 0) => -1"], ["band"]);
    help_entry!("<<", "Arithmetic", "(<< a b)", "Left shift a by b bits.", ["(<< 1 4) => 16"], [">>"]);
    help_entry!(">>", "Arithmetic", "(>> a b)", "Right shift a by b bits.", ["(>> 16 4) => 1"], ["<<"]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_polymorphic() {
        assert!(matches!(add(&[Value::Number(1.0), Value::Number(2.0)]), Ok(Value::Number(n)) if n == 3.0));
        assert!(matches!(add(&[Value::String("a".into()), Value::String("b".into())]), Ok(Value::String(s)) if s == "ab"));
        let joined = add(&[Value::list(vec![Value::Number(1.0)]), Value::list(vec![Value::Number(2.0)])]).unwrap();
        assert_eq!(joined.show(), "[1 2]");
    }

    #[test]
    fn div_joins_paths_with_a_single_slash() {
        let a = div(&[Value::String("a/".into()), Value::String("/b".into())]).unwrap();
        assert_eq!(a.show(), "a/b");
    }

    #[test]
    fn div_by_zero_is_an_error_not_infinity() {
        assert!(div(&[Value::Number(1.0), Value::Number(0.0)]).is_err());
    }

    #[test]
    fn sub_rejects_non_numeric_arguments() {
        assert!(sub(&[Value::Number(1.0), Value::String("x".into())]).is_err());
    }
}
