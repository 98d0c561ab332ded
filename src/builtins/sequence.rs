//! List and dict operations. Lists and dicts are reference-shared; `push`/`pop`/`set`/`del-ins`
//! mutate the underlying `Rc<RefCell<_>>` in place and are visible through every other reference.

use super::type_error;
use crate::builtins::booleans::bool_value;
use crate::env::Environment;
use crate::error::RumError;
use crate::help::help_entry;
use crate::value::{Arity, Behavior, BuiltinData, Value};
use std::rc::Rc;

fn empty_q(args: &[Value]) -> Result<Value, RumError> {
    match &args[0] {
        Value::List(items) => Ok(bool_value(items.borrow().is_empty())),
        Value::Dict(entries) => Ok(bool_value(entries.borrow().is_empty())),
        _ => Err(type_error("empty?", args)),
    }
}

fn len(args: &[Value]) -> Result<Value, RumError> {
    match &args[0] {
        Value::List(items) => Ok(Value::Number(items.borrow().len() as f64)),
        Value::Dict(entries) => Ok(Value::Number(entries.borrow().len() as f64)),
        Value::String(s) => Ok(Value::Number(s.chars().count() as f64)),
        _ => Err(type_error("len", args)),
    }
}

fn slice(args: &[Value]) -> Result<Value, RumError> {
    let (start, end) = match (&args[1], &args[2]) {
        (Value::Number(s), Value::Number(e)) => (*s as usize, *e as usize),
        _ => return Err(type_error("slice", args)),
    };
    match &args[0] {
        Value::List(items) => {
            let items = items.borrow();
            if start > end || end > items.len() {
                return Err(RumError::evaluation("index out of range for 'slice'", None));
            }
            Ok(Value::list(items[start..end].to_vec()))
        }
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            if start > end || end > chars.len() {
                return Err(RumError::evaluation("index out of range for 'slice'", None));
            }
            Ok(Value::String(chars[start..end].iter().collect()))
        }
        _ => Err(type_error("slice", args)),
    }
}

/// Removes `del_count` elements starting at `start` and inserts `ins`'s elements in their
/// place, mutating the list. Returns the removed elements as a fresh list.
fn del_ins(args: &[Value]) -> Result<Value, RumError> {
    let list = match &args[0] {
        Value::List(items) => items,
        _ => return Err(type_error("del-ins", args)),
    };
    let (start, count) = match (&args[1], &args[2]) {
        (Value::Number(s), Value::Number(c)) => (*s as usize, *c as usize),
        _ => return Err(type_error("del-ins", args)),
    };
    let ins: Vec<Value> = match &args[3] {
        Value::List(items) => items.borrow().clone(),
        _ => return Err(type_error("del-ins", args)),
    };
    let mut items = list.borrow_mut();
    if start > items.len() || start + count > items.len() {
        return Err(RumError::evaluation("index out of range for 'del-ins'", None));
    }
    let removed: Vec<Value> = items.splice(start..start + count, ins).collect();
    Ok(Value::list(removed))
}

fn get_impl(args: &[Value]) -> Option<Value> {
    match &args[0] {
        Value::List(items) => {
            let items = items.borrow();
            match &args[1] {
                Value::Number(i) if *i >= 0.0 && i.fract() == 0.0 && (*i as usize) < items.len() => Some(items[*i as usize].clone()),
                _ => None,
            }
        }
        Value::Dict(entries) => entries.borrow().iter().find(|(k, _)| Value::key_eq(k, &args[1])).map(|(_, v)| v.clone()),
        _ => None,
    }
}

fn get(args: &[Value]) -> Result<Value, RumError> {
    get_impl(args).ok_or_else(|| RumError::evaluation("index out of range or missing key for 'get'", None))
}

fn tryget(args: &[Value]) -> Result<Value, RumError> {
    Ok(get_impl(args).unwrap_or(Value::Unit))
}

fn set_impl(args: &[Value]) -> Result<(), ()> {
    match &args[0] {
        Value::List(items) => {
            let mut items = items.borrow_mut();
            match &args[1] {
                Value::Number(i) if *i >= 0.0 && i.fract() == 0.0 && (*i as usize) < items.len() => {
                    items[*i as usize] = args[2].clone();
                    Ok(())
                }
                _ => Err(()),
            }
        }
        Value::Dict(entries) => {
            let mut entries = entries.borrow_mut();
            match entries.iter_mut().find(|(k, _)| Value::key_eq(k, &args[1])) {
                Some((_, v)) => {
                    *v = args[2].clone();
                    Ok(())
                }
                None => Err(()),
            }
        }
        _ => Err(()),
    }
}

fn set(args: &[Value]) -> Result<Value, RumError> {
    match set_impl(args) {
        Ok(()) => Ok(args[2].clone()),
        Err(()) => Err(RumError::evaluation("index out of range or missing key for 'set'", None)),
    }
}

fn tryset(args: &[Value]) -> Result<Value, RumError> {
    match set_impl(args) {
        Ok(()) => Ok(args[2].clone()),
        Err(()) => Ok(Value::Unit),
    }
}

fn push(args: &[Value]) -> Result<Value, RumError> {
    match &args[0] {
        Value::List(items) => {
            items.borrow_mut().push(args[1].clone());
            Ok(args[0].clone())
        }
        _ => Err(type_error("push", args)),
    }
}

fn push_front(args: &[Value]) -> Result<Value, RumError> {
    match &args[0] {
        Value::List(items) => {
            items.borrow_mut().insert(0, args[1].clone());
            Ok(args[0].clone())
        }
        _ => Err(type_error("push-front", args)),
    }
}

fn pop(args: &[Value]) -> Result<Value, RumError> {
    match &args[0] {
        Value::List(items) => items
            .borrow_mut()
            .pop()
            .ok_or_else(|| RumError::evaluation("pop of empty list", None)),
        _ => Err(type_error("pop", args)),
    }
}

/// Removes and returns the FIRST element. The source this is grounded on mutates the
/// tail end instead; treated as a bug per the builtin contract and fixed here.
fn pop_front(args: &[Value]) -> Result<Value, RumError> {
    match &args[0] {
        Value::List(items) => {
            let mut items = items.borrow_mut();
            if items.is_empty() {
                Err(RumError::evaluation("pop-front of empty list", None))
            } else {
                Ok(items.remove(0))
            }
        }
        _ => Err(type_error("pop-front", args)),
    }
}

fn keys(args: &[Value]) -> Result<Value, RumError> {
    match &args[0] {
        Value::Dict(entries) => Ok(Value::list(entries.borrow().iter().map(|(k, _)| k.clone()).collect())),
        _ => Err(type_error("keys", args)),
    }
}

fn entries(args: &[Value]) -> Result<Value, RumError> {
    match &args[0] {
        Value::Dict(entries) => {
            let pairs = entries.borrow().iter().map(|(k, v)| Value::list(vec![k.clone(), v.clone()])).collect();
            Ok(Value::list(pairs))
        }
        _ => Err(type_error("entries", args)),
    }
}

fn def(env: &Rc<Environment>, name: &str, arity: Arity, f: fn(&[Value]) -> Result<Value, RumError>) {
    env.define(name, Value::BuiltinClosure(Rc::new(BuiltinData { name: name.to_string(), arity, behavior: Behavior::Eager(f) })));
}

pub fn register(env: &Rc<Environment>) {
    def(env, "empty?", Arity::Exact(1), empty_q);
    def(env, "len", Arity::Exact(1), len);
    def(env, "slice", Arity::Exact(3), slice);
    def(env, "del-ins", Arity::Exact(4), del_ins);
    def(env, "get", Arity::Exact(2), get);
    def(env, "tryget", Arity::Exact(2), tryget);
    def(env, "set", Arity::Exact(3), set);
    def(env, "tryset", Arity::Exact(3), tryset);
    def(env, "push", Arity::Exact(2), push);
    def(env, "pop", Arity::Exact(1), pop);
    def(env, "push-front", Arity::Exact(2), push_front);
    def(env, "pop-front", Arity::Exact(1), pop_front);
    def(env, "keys", Arity::Exact(1), keys);
    def(env, "entries", Arity::Exact(1), entries);

    help_entry!("empty?", "Sequence", "(empty? seq)", "True if a list or dict has no elements.", ["(empty? []) => #t"], ["len"]);
    help_entry!("len", "Sequence", "(len seq)", "Number of elements in a list, dict, or string.", ["(len [1 2 3]) => 3"], ["empty?"]);
    help_entry!("slice", "Sequence", "(slice seq start end)", "Sub-list or sub-string from start (inclusive) to end (exclusive).",
        ["(slice [1 2 3 4] 1 3) => [2 3]"], ["get"]);
    help_entry!("del-ins", "Sequence", "(del-ins list start del-count ins-list)",
        "Removes del-count elements starting at start and inserts ins-list's elements there. Mutates list, returns the removed elements.",
        ["(let xs [1 2 3 4]) (del-ins xs 1 2 [9]) => [2 3]"], ["push", "pop"]);
    help_entry!("get", "Sequence", "(get seq key)", "List index or dict key lookup; errors if absent.", ["(get [1 2] 0) => 1"], ["tryget", "set"]);
    help_entry!("tryget", "Sequence", "(tryget seq key)", "Like get, but returns unit instead of erroring if absent.", ["(tryget {} 1) => ()"], ["get"]);
    help_entry!("set", "Sequence", "(set seq key value)", "List index or existing dict key assignment; errors if absent.",
        ["(let xs [1 2]) (set xs 0 9) => 9"], ["tryset", "get"]);
    help_entry!("tryset", "Sequence", "(tryset seq key value)", "Like set, but returns unit instead of erroring if absent.", [], ["set"]);
    help_entry!("push", "Sequence", "(push list value)", "Appends value at the end, mutates list, returns the mutated list.",
        ["(let xs [1]) (push xs 2) => [1 2]"], ["pop", "push-front"]);
    help_entry!("pop", "Sequence", "(pop list)", "Removes and returns the last element.", ["(let xs [1 2]) (pop xs) => 2"], ["push"]);
    help_entry!("push-front", "Sequence", "(push-front list value)", "Prepends value, mutates list, returns the mutated list.",
        ["(let xs [2]) (push-front xs 1) => [1 2]"], ["push", "pop-front"]);
    help_entry!("pop-front", "Sequence", "(pop-front list)", "Removes and returns the first element.", ["(let xs [1 2]) (pop-front xs) => 1"], ["pop"]);
    help_entry!("keys", "Sequence", "(keys dict)", "List of a dict's keys in insertion order.", ["(keys { (1 \"a\") }) => [1]"], ["entries"]);
    help_entry!("entries", "Sequence", "(entries dict)", "List of [key value] pairs in insertion order.", ["(entries { (1 \"a\") }) => [[1 \"a\"]]"], ["keys"]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_mutates_in_place_and_returns_the_same_list() {
        let list = Value::list(vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]);
        let result = push(&[list.clone(), Value::Number(4.0)]).unwrap();
        assert_eq!(result.show(), "[1 2 3 4]");
        assert_eq!(list.show(), "[1 2 3 4]");
    }

    #[test]
    fn pop_front_removes_the_first_element_not_the_last() {
        let list = Value::list(vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]);
        let removed = pop_front(&[list.clone()]).unwrap();
        assert!(matches!(removed, Value::Number(n) if n == 1.0));
        assert_eq!(list.show(), "[2 3]");
    }

    #[test]
    fn get_errors_on_missing_dict_key_and_tryget_returns_unit() {
        let dict = Value::dict(vec![(Value::Number(1.0), Value::String("a".to_string()))]);
        assert!(get(&[dict.clone(), Value::Number(2.0)]).is_err());
        assert!(matches!(tryget(&[dict, Value::Number(2.0)]), Ok(Value::Unit)));
    }

    #[test]
    fn set_requires_an_existing_dict_key() {
        let dict = Value::dict(vec![(Value::Number(1.0), Value::String("a".to_string()))]);
        assert!(set(&[dict.clone(), Value::Number(2.0), Value::String("z".to_string())]).is_err());
        assert!(set(&[dict, Value::Number(1.0), Value::String("z".to_string())]).is_ok());
    }

    #[test]
    fn del_ins_splices_and_returns_removed_elements() {
        let list = Value::list(vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0), Value::Number(4.0)]);
        let removed = del_ins(&[list.clone(), Value::Number(1.0), Value::Number(2.0), Value::list(vec![Value::Number(9.0)])]).unwrap();
        assert_eq!(removed.show(), "[2 3]");
        assert_eq!(list.show(), "[1 9 4]");
    }
}
