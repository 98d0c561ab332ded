// ABOUTME: Recursive-descent S-expression reader built on the lexer; dispatches macro expansion

use crate::ast::Expr;
use crate::error::RumError;
use crate::lexer::{BracketKind, Lexer, Position, Token, TokenKind};
use crate::macros;

const RESERVED: &[&str] = &["let", "\\", "do", "macro"];

fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name)
}

fn checked(tok: Token) -> Result<Token, RumError> {
    match &tok.kind {
        TokenKind::Eof => Err(RumError::syntactic("unexpected end of input", Some(tok.pos))),
        TokenKind::Error(msg) => Err(RumError::lexical(msg.clone(), tok.pos)),
        _ => Ok(tok),
    }
}

fn expect_symbol(lexer: &mut Lexer, byte: u8) -> Result<Position, RumError> {
    let tok = checked(lexer.next())?;
    if tok.is_symbol(byte) {
        Ok(tok.pos)
    } else {
        Err(RumError::syntactic(
            format!("expected '{}', found '{}'", byte as char, tok.text),
            Some(tok.pos),
        ))
    }
}

fn reject_if_reserved(name: &str, pos: Position) -> Result<(), RumError> {
    if is_reserved(name) {
        Err(RumError::syntactic(
            format!("'{}' is a reserved identifier and cannot be used as a binding name", name),
            Some(pos),
        ))
    } else {
        Ok(())
    }
}

/// Reads one top-level expression from the token stream.
pub fn read_expr(lexer: &mut Lexer) -> Result<Expr, RumError> {
    let tok = checked(lexer.next())?;
    match tok.kind {
        TokenKind::Number(n) => Ok(Expr::Number(n)),
        TokenKind::String(s) => Ok(Expr::String(s)),
        TokenKind::Ident(name) => {
            if is_reserved(&name) {
                Err(RumError::syntactic(
                    format!("'{}' cannot be used as a standalone value", name),
                    Some(tok.pos),
                ))
            } else {
                Ok(Expr::Var(name, tok.pos))
            }
        }
        TokenKind::Symbol(b'(') => read_sexpr(lexer, tok.pos),
        TokenKind::Symbol(b'[') => read_list(lexer),
        TokenKind::Symbol(b'{') => read_dict(lexer),
        TokenKind::Symbol(b) => Err(RumError::syntactic(format!("unexpected '{}'", b as char), Some(tok.pos))),
        _ => unreachable!("checked() already rejected Eof and Error tokens"),
    }
}

fn read_sexpr(lexer: &mut Lexer, open_pos: Position) -> Result<Expr, RumError> {
    let peek = checked(lexer.look_next())?;
    if let TokenKind::Ident(name) = &peek.kind {
        if is_reserved(name) {
            let name = name.clone();
            lexer.next();
            return match name.as_str() {
                "let" => read_let(lexer, open_pos),
                "\\" => read_lambda(lexer, open_pos),
                "do" => read_do(lexer),
                "macro" => macros::read_macro_def(lexer, open_pos),
                _ => unreachable!(),
            };
        }
    }

    let mut items = Vec::new();
    loop {
        let peek = checked(lexer.look_next())?;
        if peek.is_symbol(b')') {
            lexer.next();
            break;
        }
        items.push(read_expr(lexer)?);
    }

    if items.is_empty() {
        return Ok(Expr::SExpr { head: None, args: vec![], pos: open_pos });
    }
    let head = items.remove(0);
    if let Expr::Var(name, _) = &head {
        if let Some(entry) = macros::lookup_macro(name) {
            return macros::expand(&entry, &items, open_pos);
        }
    }
    Ok(Expr::SExpr {
        head: Some(Box::new(head)),
        args: items,
        pos: open_pos,
    })
}

fn read_list(lexer: &mut Lexer) -> Result<Expr, RumError> {
    let mut items = Vec::new();
    loop {
        let peek = checked(lexer.look_next())?;
        if peek.is_symbol(b']') {
            lexer.next();
            break;
        }
        items.push(read_expr(lexer)?);
    }
    Ok(Expr::ListExpr(items))
}

fn read_dict(lexer: &mut Lexer) -> Result<Expr, RumError> {
    let mut pairs = Vec::new();
    loop {
        let peek = checked(lexer.look_next())?;
        if peek.is_symbol(b'}') {
            lexer.next();
            break;
        }
        expect_symbol(lexer, b'(')?;
        let key = read_expr(lexer)?;
        let value = read_expr(lexer)?;
        expect_symbol(lexer, b')')?;
        pairs.push((key, value));
    }
    Ok(Expr::DictExpr(pairs))
}

/// Reads identifiers from an already-opened `(` until the live round-bracket count falls
/// back to the level it was at before that `(`, consuming the closing `)` as part of the loop.
fn read_param_list(lexer: &mut Lexer) -> Result<Vec<String>, RumError> {
    let target = lexer.brackets().get(BracketKind::Round) - 1;
    let mut params = Vec::new();
    loop {
        let tok = checked(lexer.next())?;
        match tok.kind {
            TokenKind::Symbol(b')') => {
                if lexer.brackets().get(BracketKind::Round) == target {
                    break;
                }
                return Err(RumError::syntactic("unexpected ')' in parameter list", Some(tok.pos)));
            }
            TokenKind::Ident(name) => {
                reject_if_reserved(&name, tok.pos)?;
                params.push(name);
            }
            _ => return Err(RumError::syntactic("expected a parameter identifier", Some(tok.pos))),
        }
    }
    Ok(params)
}

fn read_let(lexer: &mut Lexer, pos: Position) -> Result<Expr, RumError> {
    let peek = checked(lexer.look_next())?;
    match peek.kind {
        TokenKind::Ident(_) => {
            let name_tok = checked(lexer.next())?;
            let name = match name_tok.kind {
                TokenKind::Ident(n) => n,
                _ => unreachable!(),
            };
            reject_if_reserved(&name, name_tok.pos)?;
            let value = read_expr(lexer)?;
            expect_symbol(lexer, b')')?;
            Ok(Expr::LetVar { name, value: Box::new(value) })
        }
        TokenKind::Symbol(b'(') => {
            lexer.next();
            let name_tok = checked(lexer.next())?;
            let name = match name_tok.kind {
                TokenKind::Ident(n) => n,
                _ => return Err(RumError::syntactic("expected a function name after 'let ('", Some(name_tok.pos))),
            };
            reject_if_reserved(&name, name_tok.pos)?;
            let params = read_param_list(lexer)?;
            let body = read_expr(lexer)?;
            expect_symbol(lexer, b')')?;
            Ok(Expr::LetFunc { name, params, body: Box::new(body), pos })
        }
        _ => Err(RumError::syntactic("expected an identifier or '(' after 'let'", Some(peek.pos))),
    }
}

fn read_lambda(lexer: &mut Lexer, pos: Position) -> Result<Expr, RumError> {
    expect_symbol(lexer, b'(')?;
    let params = read_param_list(lexer)?;
    let body = read_expr(lexer)?;
    expect_symbol(lexer, b')')?;
    Ok(Expr::Lambda { params, body: Box::new(body), pos })
}

fn read_do(lexer: &mut Lexer) -> Result<Expr, RumError> {
    let mut items = Vec::new();
    loop {
        let peek = checked(lexer.look_next())?;
        if peek.is_symbol(b')') {
            lexer.next();
            break;
        }
        items.push(read_expr(lexer)?);
    }
    Ok(Expr::Do(items))
}

/// Reads every top-level form in `src`. Used for whole-file evaluation, the REPL, and
/// the `eval` builtin, which restarts this pipeline on a string with the current environment.
pub fn read_program(src: &str) -> Result<Vec<Expr>, RumError> {
    let mut lexer = Lexer::new(src);
    let mut exprs = Vec::new();
    loop {
        let peek = lexer.look_next();
        if matches!(peek.kind, TokenKind::Eof) {
            break;
        }
        exprs.push(read_expr(&mut lexer)?);
    }
    Ok(exprs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn reads_let_var() {
        let exprs = read_program("(let x 41)").unwrap();
        assert_eq!(exprs.len(), 1);
        match &exprs[0] {
            Expr::LetVar { name, value } => {
                assert_eq!(name, "x");
                assert!(matches!(**value, Expr::Number(n) if n == 41.0));
            }
            other => panic!("expected LetVar, got {:?}", other),
        }
    }

    #[test]
    fn reads_let_func_with_variadic_header() {
        let exprs = read_program("(let (inc n) (add n 1))").unwrap();
        match &exprs[0] {
            Expr::LetFunc { name, params, .. } => {
                assert_eq!(name, "inc");
                assert_eq!(params, &vec!["n".to_string()]);
            }
            other => panic!("expected LetFunc, got {:?}", other),
        }
    }

    #[test]
    fn reads_lambda() {
        let exprs = read_program("(\\ (a b) (add a b))").unwrap();
        match &exprs[0] {
            Expr::Lambda { params, .. } => assert_eq!(params, &vec!["a".to_string(), "b".to_string()]),
            other => panic!("expected Lambda, got {:?}", other),
        }
    }

    #[test]
    fn reads_dict_literal() {
        let exprs = read_program("{ (1 \"a\") (2 \"b\") }").unwrap();
        match &exprs[0] {
            Expr::DictExpr(pairs) => assert_eq!(pairs.len(), 2),
            other => panic!("expected DictExpr, got {:?}", other),
        }
    }

    #[test]
    fn empty_sexpr_is_unit() {
        let exprs = read_program("()").unwrap();
        assert!(matches!(&exprs[0], Expr::SExpr { head: None, args, .. } if args.is_empty()));
    }

    #[test]
    fn reserved_identifier_as_standalone_atom_is_an_error() {
        assert!(read_program("let").is_err());
    }

    #[test]
    fn unmatched_bracket_surfaces_as_lexical_error() {
        assert!(matches!(read_program(")"), Err(RumError::Lexical { .. })));
    }

    #[test]
    #[serial]
    fn dispatches_macro_definition_and_expands_call_site() {
        macros::clear_registry_for_tests();
        let exprs = read_program(
            "(macro (unless %c{expr} %b{expr}) (%c () %b)) (unless (= 1 2) \"ran\")",
        )
        .unwrap();
        assert!(matches!(&exprs[0], Expr::MacroDef { name, .. } if name == "unless"));
        match &exprs[1] {
            Expr::SExpr { head: Some(h), args, .. } => {
                assert!(matches!(**h, Expr::SExpr { .. }));
                assert_eq!(args.len(), 2);
            }
            other => panic!("expected expanded SExpr, got {:?}", other),
        }
    }
}
