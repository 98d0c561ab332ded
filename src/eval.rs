// ABOUTME: Tree-walking evaluator: eager argument evaluation except for three lazy builtins

use crate::ast::Expr;
use crate::env::Environment;
use crate::error::{Frame, RumError};
use crate::lexer::Position;
use crate::value::{Behavior, ClosureData, Value};
use std::cell::RefCell;
use std::rc::Rc;

thread_local! {
    /// Live call stack, independent of error unwinding; backs the `__stack__` builtin.
    static CALL_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// A snapshot of the live call stack, innermost call last.
pub fn call_stack() -> Vec<Frame> {
    CALL_STACK.with(|s| s.borrow().clone())
}

fn with_frame<T>(frame: Frame, f: impl FnOnce() -> T) -> T {
    CALL_STACK.with(|s| s.borrow_mut().push(frame));
    let result = f();
    CALL_STACK.with(|s| {
        s.borrow_mut().pop();
    });
    result
}

pub fn eval(expr: &Expr, env: &Rc<Environment>) -> Result<Value, RumError> {
    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::String(s) => Ok(Value::String(s.clone())),
        Expr::Var(name, pos) => env
            .lookup(name)
            .ok_or_else(|| RumError::evaluation(format!("undefined variable: {}", name), Some(*pos))),
        Expr::SExpr { head, args, pos } => eval_sexpr(head.as_deref(), args, *pos, env),
        Expr::ListExpr(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval(item, env)?);
            }
            Ok(Value::list(values))
        }
        Expr::DictExpr(pairs) => {
            let mut entries = Vec::with_capacity(pairs.len());
            for (k, v) in pairs {
                entries.push((eval(k, env)?, eval(v, env)?));
            }
            Ok(Value::dict(entries))
        }
        Expr::LetVar { name, value } => {
            let v = eval(value, env)?;
            env.define(name, v.clone());
            Ok(v)
        }
        Expr::LetFunc { name, params, body, .. } => {
            let closure = make_closure(params.clone(), (**body).clone(), env, Some(name.clone()));
            env.define(name, closure.clone());
            Ok(closure)
        }
        Expr::Lambda { params, body, .. } => Ok(make_closure(params.clone(), (**body).clone(), env, None)),
        Expr::Do(items) => {
            if items.is_empty() {
                return Err(RumError::evaluation("'do' requires at least one expression", Some(expr.position())));
            }
            let mut result = Value::Unit;
            for item in items {
                result = eval(item, env)?;
            }
            Ok(result)
        }
        Expr::MacroDef { .. } => Ok(Value::Unit),
    }
}

fn make_closure(params: Vec<String>, body: Expr, env: &Rc<Environment>, name: Option<String>) -> Value {
    Value::Closure(Rc::new(ClosureData {
        params,
        body,
        env: Rc::clone(env),
        name: RefCell::new(name),
    }))
}

fn eval_sexpr(head: Option<&Expr>, args: &[Expr], pos: Position, env: &Rc<Environment>) -> Result<Value, RumError> {
    let head = match head {
        None => return Ok(Value::Unit),
        Some(h) => h,
    };
    let head_val = eval(head, env)?;
    match head_val {
        Value::Closure(c) => call_closure(&c, args, env, pos),
        Value::BuiltinClosure(b) => call_builtin(&b, args, env, pos),
        other => Err(RumError::evaluation(
            format!("value of type '{}' is not callable", other.type_name()),
            Some(pos),
        )),
    }
}

fn call_closure(
    c: &Rc<crate::value::ClosureData>,
    args: &[Expr],
    caller_env: &Rc<Environment>,
    call_pos: Position,
) -> Result<Value, RumError> {
    if args.len() != c.params.len() {
        return Err(RumError::evaluation(
            format!("expected {} argument(s), got {}", c.params.len(), args.len()),
            Some(call_pos),
        ));
    }
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(eval(arg, caller_env)?);
    }
    let frame = c.env.pushed();
    for (param, value) in c.params.iter().zip(values) {
        frame.define(param, value);
    }
    let name = c.name.borrow().clone().unwrap_or_else(|| "<lambda>".to_string());
    with_frame(Frame { name: name.clone(), pos: call_pos }, || {
        eval(&c.body, &frame).map_err(|e| e.push_frame(Frame { name, pos: call_pos }))
    })
}

fn call_builtin(
    b: &Rc<crate::value::BuiltinData>,
    args: &[Expr],
    env: &Rc<Environment>,
    call_pos: Position,
) -> Result<Value, RumError> {
    if !b.arity.accepts(args.len()) {
        return Err(RumError::evaluation(
            format!("'{}' expects {} argument(s), got {}", b.name, b.arity, args.len()),
            Some(call_pos),
        ));
    }
    let wrap = |e: RumError| {
        e.with_location_if_missing(call_pos)
            .push_frame(Frame { name: b.name.clone(), pos: call_pos })
    };
    with_frame(Frame { name: b.name.clone(), pos: call_pos }, || match &b.behavior {
        Behavior::Lazy(f) => f(args, env).map_err(wrap),
        Behavior::Eager(f) => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval(arg, env)?);
            }
            f(&values).map_err(wrap)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader;
    use crate::value::{Arity, BuiltinData};

    fn eval_src(src: &str, env: &Rc<Environment>) -> Result<Value, RumError> {
        let exprs = reader::read_program(src).unwrap();
        let mut result = Value::Unit;
        for expr in &exprs {
            result = eval(expr, env)?;
        }
        Ok(result)
    }

    fn env_with_add() -> Rc<Environment> {
        let env = Environment::new();
        env.define(
            "add",
            Value::BuiltinClosure(Rc::new(BuiltinData {
                name: "add".to_string(),
                arity: Arity::Exact(2),
                behavior: Behavior::Eager(|args| match (&args[0], &args[1]) {
                    (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                    _ => Err(RumError::evaluation("unaccepted argument types for 'add'", None)),
                }),
            })),
        );
        env
    }

    #[test]
    fn numbers_and_strings_self_evaluate() {
        let env = Environment::new();
        assert!(matches!(eval_src("42", &env), Ok(Value::Number(n)) if n == 42.0));
        assert!(matches!(eval_src("\"hi\"", &env), Ok(Value::String(ref s)) if s == "hi"));
    }

    #[test]
    fn undefined_variable_carries_location() {
        let env = Environment::new();
        let err = eval_src("missing", &env).unwrap_err();
        assert!(err.render().contains("undefined variable: missing"));
    }

    #[test]
    fn let_var_binds_in_current_frame() {
        let env = Environment::new();
        let result = eval_src("(let x 41)", &env).unwrap();
        assert!(matches!(result, Value::Number(n) if n == 41.0));
        assert!(matches!(env.lookup("x"), Some(Value::Number(n)) if n == 41.0));
    }

    #[test]
    fn let_func_binds_and_calls_recursively_free() {
        let env = env_with_add();
        let result = eval_src("(let x 41) (let (inc n) (add n 1)) (inc x)", &env).unwrap();
        assert!(matches!(result, Value::Number(n) if n == 42.0));
    }

    #[test]
    fn empty_do_is_an_error() {
        let env = Environment::new();
        assert!(eval_src("(do)", &env).is_err());
    }

    #[test]
    fn non_callable_head_is_an_error() {
        let env = Environment::new();
        assert!(eval_src("(1 2 3)", &env).is_err());
    }

    #[test]
    fn arity_mismatch_is_raised_before_evaluating_arguments() {
        let env = env_with_add();
        // "missing" would itself raise undefined-variable if evaluated; the arity
        // mismatch (add takes 2, this passes 3) must short-circuit before that happens.
        let err = eval_src("(add 1 2 missing)", &env).unwrap_err();
        assert!(err.render().contains("expects 2 argument"));
    }

    #[test]
    fn stack_trace_records_innermost_closure_first() {
        let env = env_with_add();
        let err = eval_src("(let (boom n) (add n missing)) (boom 1)", &env).unwrap_err();
        let rendered = err.render();
        assert!(rendered.contains("Trace"));
        assert!(rendered.contains("boom"));
    }

    #[test]
    fn lambda_closure_shares_captured_environment_mutations() {
        // A lambda captures its defining environment by reference: mutating the
        // outer binding after definition is visible on the next call.
        let env = Environment::new();
        env.define("x", Value::Number(1.0));
        let reader = eval_src("(\\ () x)", &env).unwrap();
        match reader {
            Value::Closure(c) => {
                let frame = c.env.pushed();
                assert!(matches!(eval(&c.body, &frame), Ok(Value::Number(n)) if n == 1.0));
                env.define("x", Value::Number(2.0));
                let frame = c.env.pushed();
                assert!(matches!(eval(&c.body, &frame), Ok(Value::Number(n)) if n == 2.0));
            }
            other => panic!("expected Closure, got {:?}", other),
        }
    }
}
