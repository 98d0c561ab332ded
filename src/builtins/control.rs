//! Output, introspection, and the three lazy/short-circuiting control primitives.

use crate::ast::Expr;
use crate::builtins::booleans::{bool_value, is_truthy};
use crate::env::Environment;
use crate::error::RumError;
use crate::eval;
use crate::help::help_entry;
use crate::host;
use crate::value::{Arity, Behavior, BuiltinData, Value};
use std::rc::Rc;

fn joined(args: &[Value]) -> String {
    args.iter().map(Value::show).collect::<Vec<_>>().join(" ")
}

fn print(args: &[Value]) -> Result<Value, RumError> {
    host::with_host(|h| h.write_stdout(&joined(args)));
    Ok(Value::Unit)
}

fn println(args: &[Value]) -> Result<Value, RumError> {
    host::with_host(|h| h.write_stdout(&format!("{}\n", joined(args))));
    Ok(Value::Unit)
}

fn type_of(args: &[Value]) -> Result<Value, RumError> {
    Ok(Value::String(args[0].type_name().to_string()))
}

fn type_is(args: &[Value]) -> Result<Value, RumError> {
    match &args[1] {
        Value::String(name) => Ok(bool_value(args[0].type_name() == name)),
        other => Err(super::type_error("type-is", &[args[0].clone(), other.clone()])),
    }
}

/// Short-circuits: evaluates the second argument only if the first is truthy.
fn and(args: &[Expr], env: &Rc<Environment>) -> Result<Value, RumError> {
    let first = eval::eval(&args[0], env)?;
    if !is_truthy(&first) {
        Ok(first)
    } else {
        eval::eval(&args[1], env)
    }
}

/// Short-circuits: evaluates the second argument only if the first is falsy.
fn or(args: &[Expr], env: &Rc<Environment>) -> Result<Value, RumError> {
    let first = eval::eval(&args[0], env)?;
    if is_truthy(&first) {
        Ok(first)
    } else {
        eval::eval(&args[1], env)
    }
}

fn not(args: &[Value]) -> Result<Value, RumError> {
    Ok(bool_value(!is_truthy(&args[0])))
}

/// Raises an evaluation error carrying the given value's displayed form as its message.
fn error(args: &[Value]) -> Result<Value, RumError> {
    Err(RumError::evaluation(args[0].show(), None))
}

/// Restarts the reader/evaluator pipeline on a string, in the calling environment.
fn eval_builtin(args: &[Expr], env: &Rc<Environment>) -> Result<Value, RumError> {
    let source = match eval::eval(&args[0], env)? {
        Value::String(s) => s,
        other => return Err(super::type_error("eval", &[other])),
    };
    let exprs = crate::reader::read_program(&source).map_err(|e| RumError::evaluation(e.render(), None))?;
    let mut result = Value::Unit;
    for expr in &exprs {
        result = eval::eval(expr, env)?;
    }
    Ok(result)
}

fn stack(_args: &[Expr], _env: &Rc<Environment>) -> Result<Value, RumError> {
    let frames: Vec<Value> = eval::call_stack()
        .into_iter()
        .map(|f| Value::String(format!("{} ({})", f.name, f.pos)))
        .collect();
    Ok(Value::list(frames))
}

fn help_builtin(args: &[Value]) -> Result<Value, RumError> {
    match args.first() {
        None => Ok(Value::String(crate::help::format_quick_reference())),
        Some(Value::String(name)) => match crate::help::get_help(name) {
            Some(entry) => Ok(Value::String(crate::help::format_help_entry(&entry))),
            None => Err(RumError::evaluation(format!("no help found for '{}'", name), None)),
        },
        Some(other) => Err(super::type_error("help", &[other.clone()])),
    }
}

fn eager(env: &Rc<Environment>, name: &str, arity: Arity, f: fn(&[Value]) -> Result<Value, RumError>) {
    env.define(name, Value::BuiltinClosure(Rc::new(BuiltinData { name: name.to_string(), arity, behavior: Behavior::Eager(f) })));
}

fn lazy(env: &Rc<Environment>, name: &str, arity: Arity, f: fn(&[Expr], &Rc<Environment>) -> Result<Value, RumError>) {
    env.define(name, Value::BuiltinClosure(Rc::new(BuiltinData { name: name.to_string(), arity, behavior: Behavior::Lazy(f) })));
}

pub fn register(env: &Rc<Environment>) {
    eager(env, "print", Arity::AtLeast(0), print);
    eager(env, "println", Arity::AtLeast(0), println);
    eager(env, "type", Arity::Exact(1), type_of);
    eager(env, "type-is", Arity::Exact(2), type_is);
    lazy(env, "and", Arity::Exact(2), and);
    lazy(env, "or", Arity::Exact(2), or);
    eager(env, "not", Arity::Exact(1), not);
    eager(env, "error", Arity::Exact(1), error);
    lazy(env, "eval", Arity::Exact(1), eval_builtin);
    lazy(env, "__stack__", Arity::Exact(0), stack);
    eager(env, "help", Arity::Range(0, 1), help_builtin);

    help_entry!("print", "Control", "(print v...)", "Writes values to stdout, space-separated, no trailing newline.", ["(print \"hi\")"], ["println"]);
    help_entry!("println", "Control", "(println v...)", "Like print, with a trailing newline.", ["(println \"hi\")"], ["print"]);
    help_entry!("type", "Control", "(type v)", "Returns the value's type name as a string.", ["(type 1) => \"number\""], ["type-is"]);
    help_entry!("type-is", "Control", "(type-is v name)", "True if v's type name equals name.", ["(type-is 1 \"number\") => #t"], ["type"]);
    help_entry!("and", "Control", "(and a b)", "Evaluates a; if falsy returns it without evaluating b, else evaluates and returns b.",
        ["(and #f (error \"x\")) => #f"], ["or", "not"]);
    help_entry!("or", "Control", "(or a b)", "Evaluates a; if truthy returns it without evaluating b, else evaluates and returns b.",
        ["(or #t (error \"x\")) => #t"], ["and", "not"]);
    help_entry!("not", "Control", "(not v)", "Logical negation; #f and only #f is falsy.", ["(not #f) => #t"], ["and", "or"]);
    help_entry!("error", "Control", "(error v)", "Raises an evaluation error whose message is v's displayed form.", ["(error \"boom\")"], []);
    help_entry!("eval", "Control", "(eval src)", "Reads and evaluates src in the current environment.", ["(eval \"(add 1 2)\") => 3"], ["import"]);
    help_entry!("__stack__", "Control", "(__stack__)", "Returns the current call stack as a list of \"name (line L, column C)\" strings, outermost first.", ["(__stack__)"], []);
    help_entry!("help", "Control", "(help) or (help name)", "Quick reference, or detailed help for one builtin.", ["(help \"add\")"], []);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader;

    fn eval_src(src: &str, env: &Rc<Environment>) -> Result<Value, RumError> {
        let exprs = reader::read_program(src).unwrap();
        let mut result = Value::Unit;
        for expr in &exprs {
            result = eval::eval(expr, env)?;
        }
        Ok(result)
    }

    fn full_env() -> Rc<Environment> {
        let env = Environment::new();
        crate::builtins::booleans::register(&env);
        register(&env);
        env
    }

    #[test]
    fn and_short_circuits_without_evaluating_the_second_argument() {
        let env = full_env();
        env.define("boom", Value::String("unused".to_string()));
        let result = eval_src("(and #f (not boom))", &env);
        assert!(result.is_ok());
    }

    #[test]
    fn not_flips_truthiness() {
        let env = full_env();
        assert!(eval_src("(not #f)", &env).unwrap().show() == "#<builtin #t>");
    }

    #[test]
    fn eval_reruns_the_pipeline_in_the_calling_environment() {
        let env = full_env();
        crate::builtins::arithmetic::register(&env);
        env.define("x", Value::Number(1.0));
        let result = eval_src("(eval \"(add x 1)\")", &env).unwrap();
        assert!(matches!(result, Value::Number(n) if n == 2.0));
    }

    #[test]
    fn stack_reflects_calls_in_progress() {
        let env = full_env();
        crate::builtins::arithmetic::register(&env);
        eval_src("(let (probe n) (__stack__))", &env).unwrap();
        let result = eval_src("(probe 1)", &env).unwrap();
        assert!(result.show().contains("probe"));
    }
}
