// ABOUTME: REPL line helper — multi-line continuation while brackets are unbalanced

use crate::lexer::{Lexer, TokenKind};
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline_derive::{Completer, Helper, Highlighter, Hinter};

#[derive(Completer, Helper, Highlighter, Hinter, Default)]
pub struct RumLispHelper;

impl Validator for RumLispHelper {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        let mut lexer = Lexer::new(ctx.input());
        loop {
            match lexer.next().kind {
                TokenKind::Eof => break,
                TokenKind::Error(_) => return Ok(ValidationResult::Valid(None)),
                _ => {}
            }
        }
        let b = lexer.brackets();
        if b.round > 0 || b.square > 0 || b.curly > 0 {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}
