// ABOUTME: AST node types produced by the reader, with macros already expanded

use crate::lexer::Position;
use crate::macros::{Pattern, Template};

#[derive(Debug, Clone)]
pub enum Expr {
    Number(f64),
    String(String),
    Var(String, Position),
    /// `head == None` is the empty S-expression, the unit value.
    SExpr {
        head: Option<Box<Expr>>,
        args: Vec<Expr>,
        pos: Position,
    },
    ListExpr(Vec<Expr>),
    DictExpr(Vec<(Expr, Expr)>),
    LetVar {
        name: String,
        value: Box<Expr>,
    },
    LetFunc {
        name: String,
        params: Vec<String>,
        body: Box<Expr>,
        pos: Position,
    },
    Lambda {
        params: Vec<String>,
        body: Box<Expr>,
        pos: Position,
    },
    Do(Vec<Expr>),
    /// A sentinel: evaluates to unit. The macro is already registered by the
    /// time this node exists; the pattern/template are retained for display only.
    MacroDef {
        name: String,
        pattern: Pattern,
        template: Template,
        pos: Position,
    },
}

impl Expr {
    pub fn position(&self) -> Position {
        match self {
            Expr::Number(_) | Expr::String(_) => Position::start(),
            Expr::Var(_, pos) => *pos,
            Expr::SExpr { pos, .. } => *pos,
            Expr::ListExpr(items) => items.first().map(Expr::position).unwrap_or_default(),
            Expr::DictExpr(pairs) => pairs.first().map(|(k, _)| k.position()).unwrap_or_default(),
            Expr::LetVar { value, .. } => value.position(),
            Expr::LetFunc { pos, .. } => *pos,
            Expr::Lambda { pos, .. } => *pos,
            Expr::Do(items) => items.first().map(Expr::position).unwrap_or_default(),
            Expr::MacroDef { pos, .. } => *pos,
        }
    }
}
