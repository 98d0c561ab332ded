//! The host boundary: `$`, `read`, `import`, dot-access `.`, and raw-exec `@`. All of these
//! are always parseable; when no host is installed they surface a clear "unsupported in
//! this build" error rather than failing to parse (see [`crate::host::NullHost`]).

use crate::ast::Expr;
use crate::builtins::type_error;
use crate::env::Environment;
use crate::error::RumError;
use crate::eval;
use crate::help::help_entry;
use crate::host;
use crate::value::{Arity, Behavior, BuiltinData, Value};
use std::rc::Rc;

/// `($ raw)` — a bare identifier argument is taken as path text rather than being
/// looked up as a variable; anything else is evaluated and must produce a string.
fn dollar(args: &[Expr], env: &Rc<Environment>) -> Result<Value, RumError> {
    let text = match &args[0] {
        Expr::Var(name, _) => name.clone(),
        other => match eval::eval(other, env)? {
            Value::String(s) => s,
            v => return Err(type_error("$", &[v])),
        },
    };
    host::with_host(|h| h.path_handle(&text))
}

fn read(args: &[Value]) -> Result<Value, RumError> {
    host::with_host(|h| h.read_path(&args[0])).map(Value::String)
}

/// `(import handle)` re-runs the reader/evaluator pipeline on the imported source,
/// in the calling environment, the same way the `eval` builtin does on a literal string.
fn import(args: &[Expr], env: &Rc<Environment>) -> Result<Value, RumError> {
    let handle = eval::eval(&args[0], env)?;
    let source = host::with_host(|h| h.import(&handle))?;
    let exprs = crate::reader::read_program(&source).map_err(|e| RumError::host(e.render()))?;
    let mut result = Value::Unit;
    for expr in &exprs {
        result = eval::eval(expr, env)?;
    }
    Ok(result)
}

/// `(. dict field)` — `field` is a bare identifier used as a literal string key rather
/// than looked up as a variable.
fn dot(args: &[Expr], env: &Rc<Environment>) -> Result<Value, RumError> {
    let target = eval::eval(&args[0], env)?;
    let key = match &args[1] {
        Expr::Var(name, _) => Value::String(name.clone()),
        other => eval::eval(other, env)?,
    };
    match &target {
        Value::Dict(entries) => entries
            .borrow()
            .iter()
            .find(|(k, _)| Value::key_eq(k, &key))
            .map(|(_, v)| v.clone())
            .ok_or_else(|| RumError::evaluation("missing dict key for '.'", None)),
        _ => Err(type_error(".", &[target])),
    }
}

fn at_exec(args: &[Expr], env: &Rc<Environment>) -> Result<Value, RumError> {
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(eval::eval(arg, env)?);
    }
    host::with_host(|h| h.exec(&values))
}

pub fn register(env: &Rc<Environment>) {
    env.define("$", Value::BuiltinClosure(Rc::new(BuiltinData { name: "$".to_string(), arity: Arity::Exact(1), behavior: Behavior::Lazy(dollar) })));
    env.define("read", Value::BuiltinClosure(Rc::new(BuiltinData { name: "read".to_string(), arity: Arity::Exact(1), behavior: Behavior::Eager(read) })));
    env.define("import", Value::BuiltinClosure(Rc::new(BuiltinData { name: "import".to_string(), arity: Arity::Exact(1), behavior: Behavior::Lazy(import) })));
    env.define(".", Value::BuiltinClosure(Rc::new(BuiltinData { name: ".".to_string(), arity: Arity::Exact(2), behavior: Behavior::Lazy(dot) })));
    env.define("@", Value::BuiltinClosure(Rc::new(BuiltinData { name: "@".to_string(), arity: Arity::AtLeast(1), behavior: Behavior::Lazy(at_exec) })));

    help_entry!("$", "Host", "($ path)", "Builds a path handle; a bare identifier argument is taken as literal path text.",
        ["($ data/input.txt) => path handle"], ["read", "import"]);
    help_entry!("read", "Host", "(read handle)", "Reads the file behind a path handle as a string.", ["(read ($ data.txt))"], ["$", "import"]);
    help_entry!("import", "Host", "(import handle)", "Reads and evaluates a source file in the current environment.", ["(import ($ lib.risp))"], ["$", "eval"]);
    help_entry!(".", "Host", "(. dict field)", "Dict field access; field is a literal key, not a variable lookup.", ["(. d key) => (get d \"key\")"], ["get"]);
    help_entry!("@", "Host", "(@ cmd arg...)", "Runs a subprocess and returns its result.", ["(@ \"ls\" \"-l\")"], []);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader;

    #[test]
    fn host_ops_are_parseable_and_fail_clearly_without_a_host() {
        let env = Environment::new();
        register(&env);
        let exprs = reader::read_program("(read ($ x))").unwrap();
        let mut result = Ok(Value::Unit);
        for expr in &exprs {
            result = eval::eval(expr, &env);
        }
        assert!(result.is_err());
        assert!(result.unwrap_err().render().contains("unsupported in this build"));
    }
}
