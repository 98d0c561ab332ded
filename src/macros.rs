// ABOUTME: Pattern-based macro engine: compiles `macro` definitions, matches call sites, expands templates

use crate::ast::Expr;
use crate::error::RumError;
use crate::lexer::{Lexer, Position, Token, TokenKind};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

// ===========================================================================
// Pattern / template data model
// ===========================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
    Ident(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CaptureKind {
    Expr,
    Token,
    Number,
    String,
    Ident,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RepeatKind {
    Optional,
    ZeroOrMore,
    OneOrMore,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GroupBracket {
    Round,
    Square,
    Curly,
}

#[derive(Debug, Clone)]
pub enum PatternTerm {
    Literal(Literal),
    Capture { name: String, kind: CaptureKind },
    Section { name: String, terms: Vec<PatternTerm> },
    Selector { name: String, choices: Vec<PatternTerm> },
    Group { bracket: GroupBracket, terms: Vec<PatternTerm> },
    Repeat { inner: Box<PatternTerm>, kind: RepeatKind },
}

pub type Pattern = Vec<PatternTerm>;

#[derive(Debug, Clone)]
pub enum TemplateNode {
    Number(f64),
    String(String),
    Ident(String),
    Group(GroupBracket, Vec<TemplateNode>),
    Subst(String),
    Splice(String),
    If {
        cond: String,
        then: Box<TemplateNode>,
        els: Box<TemplateNode>,
    },
    Let {
        name: String,
        value: Box<TemplateNode>,
        body: Box<TemplateNode>,
    },
    Cat(String, String),
    Head(String),
    Tail(String),
    Str(String),
    IdentOf(String),
}

pub type Template = TemplateNode;

/// Per-call-site struct map: pattern-bound names to captured AST fragments.
#[derive(Debug, Clone)]
pub enum Binding {
    One(Expr),
    Many(Vec<Binding>),
}

pub type StructMap = HashMap<String, Binding>;

#[derive(Debug, Clone)]
pub struct MacroEntry {
    pub name: String,
    pub pattern: Pattern,
    pub template: Template,
    pub pos: Position,
}

thread_local! {
    /// Process-wide, initialized empty, mutated by every `macro` form read, never cleared.
    static REGISTRY: RefCell<HashMap<String, MacroEntry>> = RefCell::new(HashMap::new());
}

pub fn registered_macro_names() -> Vec<String> {
    REGISTRY.with(|r| r.borrow().keys().cloned().collect())
}

pub fn lookup_macro(name: &str) -> Option<MacroEntry> {
    REGISTRY.with(|r| r.borrow().get(name).cloned())
}

fn register_macro(entry: MacroEntry) -> Result<(), RumError> {
    REGISTRY.with(|r| {
        let mut map = r.borrow_mut();
        if map.contains_key(&entry.name) {
            return Err(RumError::syntactic(
                format!("macro '{}' is already defined", entry.name),
                Some(entry.pos),
            ));
        }
        map.insert(entry.name.clone(), entry);
        Ok(())
    })
}

/// Test-only: clears the process-wide registry so each macro test starts from empty.
#[cfg(test)]
pub fn clear_registry_for_tests() {
    REGISTRY.with(|r| r.borrow_mut().clear());
}

// ===========================================================================
// Token stream with one-token pushback, for reading `% ? * +` repeat suffixes
// ===========================================================================

pub struct TokenStream<'a, 'b> {
    lexer: &'b mut Lexer<'a>,
    pushback: Vec<Token>,
}

impl<'a, 'b> TokenStream<'a, 'b> {
    pub fn new(lexer: &'b mut Lexer<'a>) -> Self {
        TokenStream {
            lexer,
            pushback: Vec::new(),
        }
    }

    pub fn next(&mut self) -> Token {
        self.pushback.pop().unwrap_or_else(|| self.lexer.next())
    }

    pub fn look_next(&mut self) -> Token {
        match self.pushback.last() {
            Some(t) => t.clone(),
            None => self.lexer.look_next(),
        }
    }

    pub fn push_back(&mut self, t: Token) {
        self.pushback.push(t);
    }
}

fn checked(tok: Token) -> Result<Token, RumError> {
    match &tok.kind {
        TokenKind::Eof => Err(RumError::syntactic("unexpected end of input", Some(tok.pos))),
        TokenKind::Error(msg) => Err(RumError::lexical(msg.clone(), tok.pos)),
        _ => Ok(tok),
    }
}

fn expect_symbol(stream: &mut TokenStream, byte: u8) -> Result<Position, RumError> {
    let tok = checked(stream.next())?;
    if tok.is_symbol(byte) {
        Ok(tok.pos)
    } else {
        Err(RumError::syntactic(
            format!("expected '{}', found '{}'", byte as char, tok.text),
            Some(tok.pos),
        ))
    }
}

fn expect_ident(stream: &mut TokenStream) -> Result<String, RumError> {
    let tok = checked(stream.next())?;
    match tok.kind {
        TokenKind::Ident(s) => Ok(s),
        _ => Err(RumError::syntactic(
            format!("expected an identifier, found '{}'", tok.text),
            Some(tok.pos),
        )),
    }
}

// ===========================================================================
// Pattern parsing
// ===========================================================================

fn parse_capture_kind(word: &str, pos: Position) -> Result<CaptureKind, RumError> {
    match word {
        "expr" => Ok(CaptureKind::Expr),
        "token" => Ok(CaptureKind::Token),
        "number" => Ok(CaptureKind::Number),
        "string" => Ok(CaptureKind::String),
        "ident" => Ok(CaptureKind::Ident),
        other => Err(RumError::syntactic(
            format!("unknown capture kind '{}'", other),
            Some(pos),
        )),
    }
}

fn parse_pattern_terms_until(stream: &mut TokenStream, close: u8) -> Result<Vec<PatternTerm>, RumError> {
    let mut terms = Vec::new();
    loop {
        let peek = checked(stream.look_next())?;
        if peek.is_symbol(close) {
            stream.next();
            break;
        }
        let term = parse_pattern_term(stream)?;
        terms.push(apply_repeat_suffix(stream, term)?);
    }
    Ok(terms)
}

fn apply_repeat_suffix(stream: &mut TokenStream, term: PatternTerm) -> Result<PatternTerm, RumError> {
    let percent = stream.next();
    if !percent.is_symbol(b'%') {
        stream.push_back(percent);
        return Ok(term);
    }
    let marker = checked(stream.next())?;
    let kind = match &marker.kind {
        TokenKind::Ident(w) if w == "?" => Some(RepeatKind::Optional),
        TokenKind::Ident(w) if w == "*" => Some(RepeatKind::ZeroOrMore),
        TokenKind::Ident(w) if w == "+" => Some(RepeatKind::OneOrMore),
        _ => None,
    };
    match kind {
        Some(kind) => {
            if matches!(term, PatternTerm::Repeat { .. }) {
                return Err(RumError::macro_error(
                    "repeating a repeat is not allowed",
                    Some(marker.pos),
                ));
            }
            Ok(PatternTerm::Repeat {
                inner: Box::new(term),
                kind,
            })
        }
        None => {
            // The '%' did not introduce a repeat marker; push both tokens back in order.
            stream.push_back(marker);
            stream.push_back(percent);
            Ok(term)
        }
    }
}

fn parse_pattern_term(stream: &mut TokenStream) -> Result<PatternTerm, RumError> {
    let tok = checked(stream.next())?;
    match tok.kind {
        TokenKind::Number(n) => Ok(PatternTerm::Literal(Literal::Number(n))),
        TokenKind::String(s) => Ok(PatternTerm::Literal(Literal::String(s))),
        TokenKind::Ident(s) => Ok(PatternTerm::Literal(Literal::Ident(s))),
        TokenKind::Symbol(b'%') => {
            let name = expect_ident(stream)?;
            let next = checked(stream.next())?;
            match next.kind {
                TokenKind::Symbol(b'{') => {
                    let kind_word = expect_ident(stream)?;
                    let kind = parse_capture_kind(&kind_word, next.pos)?;
                    expect_symbol(stream, b'}')?;
                    Ok(PatternTerm::Capture { name, kind })
                }
                TokenKind::Symbol(b'(') => {
                    let terms = parse_pattern_terms_until(stream, b')')?;
                    Ok(PatternTerm::Section { name, terms })
                }
                TokenKind::Symbol(b'[') => {
                    let choices = parse_pattern_terms_until(stream, b']')?;
                    Ok(PatternTerm::Selector { name, choices })
                }
                _ => Err(RumError::syntactic(
                    "expected '{', '(' or '[' after '%name' in a pattern",
                    Some(next.pos),
                )),
            }
        }
        TokenKind::Symbol(b'(') => Ok(PatternTerm::Group {
            bracket: GroupBracket::Round,
            terms: parse_pattern_terms_until(stream, b')')?,
        }),
        TokenKind::Symbol(b'[') => Ok(PatternTerm::Group {
            bracket: GroupBracket::Square,
            terms: parse_pattern_terms_until(stream, b']')?,
        }),
        TokenKind::Symbol(b'{') => Ok(PatternTerm::Group {
            bracket: GroupBracket::Curly,
            terms: parse_pattern_terms_until(stream, b'}')?,
        }),
        _ => Err(RumError::syntactic(
            format!("unexpected token '{}' in macro pattern", tok.text),
            Some(tok.pos),
        )),
    }
}

// ===========================================================================
// Template parsing
// ===========================================================================

const TEMPLATE_DIRECTIVES: &[&str] = &["if", "exists", "let", "cat", "head", "tail", "str", "ident"];

fn parse_paren_node(stream: &mut TokenStream) -> Result<TemplateNode, RumError> {
    expect_symbol(stream, b'(')?;
    let node = parse_template_node(stream)?;
    expect_symbol(stream, b')')?;
    Ok(node)
}

fn parse_brace_name(stream: &mut TokenStream) -> Result<String, RumError> {
    expect_symbol(stream, b'{')?;
    let name = expect_ident(stream)?;
    expect_symbol(stream, b'}')?;
    Ok(name)
}

fn parse_template_node(stream: &mut TokenStream) -> Result<TemplateNode, RumError> {
    let tok = checked(stream.next())?;
    match tok.kind {
        TokenKind::Number(n) => Ok(TemplateNode::Number(n)),
        TokenKind::String(s) => Ok(TemplateNode::String(s)),
        TokenKind::Ident(s) => Ok(TemplateNode::Ident(s)),
        TokenKind::Symbol(b'(') => Ok(TemplateNode::Group(
            GroupBracket::Round,
            parse_template_nodes_until(stream, b')')?,
        )),
        TokenKind::Symbol(b'[') => Ok(TemplateNode::Group(
            GroupBracket::Square,
            parse_template_nodes_until(stream, b']')?,
        )),
        TokenKind::Symbol(b'{') => Ok(TemplateNode::Group(
            GroupBracket::Curly,
            parse_template_nodes_until(stream, b'}')?,
        )),
        TokenKind::Symbol(b'%') => {
            let second = stream.next();
            if second.is_symbol(b'%') {
                let name = expect_ident(stream)?;
                return Ok(TemplateNode::Splice(name));
            }
            stream.push_back(second);
            let word = expect_ident(stream)?;
            if !TEMPLATE_DIRECTIVES.contains(&word.as_str()) {
                return Ok(TemplateNode::Subst(word));
            }
            match word.as_str() {
                "if" => {
                    let cond = parse_brace_name(stream)?;
                    let then = parse_paren_node(stream)?;
                    let els = parse_paren_node(stream)?;
                    Ok(TemplateNode::If {
                        cond,
                        then: Box::new(then),
                        els: Box::new(els),
                    })
                }
                "exists" => {
                    let cond = parse_brace_name(stream)?;
                    Ok(TemplateNode::If {
                        cond,
                        then: Box::new(TemplateNode::Ident("#t".to_string())),
                        els: Box::new(TemplateNode::Ident("#f".to_string())),
                    })
                }
                "let" => {
                    let name = parse_brace_name(stream)?;
                    let value = parse_paren_node(stream)?;
                    let body = parse_paren_node(stream)?;
                    Ok(TemplateNode::Let {
                        name,
                        value: Box::new(value),
                        body: Box::new(body),
                    })
                }
                "cat" => {
                    let a = parse_brace_name(stream)?;
                    let b = parse_brace_name(stream)?;
                    Ok(TemplateNode::Cat(a, b))
                }
                "head" => Ok(TemplateNode::Head(parse_brace_name(stream)?)),
                "tail" => Ok(TemplateNode::Tail(parse_brace_name(stream)?)),
                "str" => Ok(TemplateNode::Str(parse_brace_name(stream)?)),
                "ident" => Ok(TemplateNode::IdentOf(parse_brace_name(stream)?)),
                _ => unreachable!(),
            }
        }
        _ => Err(RumError::syntactic(
            format!("unexpected token '{}' in macro template", tok.text),
            Some(tok.pos),
        )),
    }
}

fn parse_template_nodes_until(stream: &mut TokenStream, close: u8) -> Result<Vec<TemplateNode>, RumError> {
    let mut nodes = Vec::new();
    loop {
        let peek = checked(stream.look_next())?;
        if peek.is_symbol(close) {
            stream.next();
            break;
        }
        nodes.push(parse_template_node(stream)?);
    }
    Ok(nodes)
}

// ===========================================================================
// `macro` definition parsing: `(macro (<name> <pattern-term>...) <template>)`
// The caller has already consumed `macro` (and the enclosing `(`); this reads
// through the final closing `)`.
// ===========================================================================

pub fn read_macro_def(lexer: &mut Lexer, pos: Position) -> Result<Expr, RumError> {
    let mut stream = TokenStream::new(lexer);
    expect_symbol(&mut stream, b'(')?;
    let name = expect_ident(&mut stream)?;
    let pattern = parse_pattern_terms_until(&mut stream, b')')?;
    let template = parse_template_node(&mut stream)?;
    expect_symbol(&mut stream, b')')?;

    let entry = MacroEntry {
        name: name.clone(),
        pattern: pattern.clone(),
        template: template.clone(),
        pos,
    };
    register_macro(entry)?;

    Ok(Expr::MacroDef {
        name,
        pattern,
        template,
        pos,
    })
}

// ===========================================================================
// Matching: deterministic backtracking over the argument expression sequence
// ===========================================================================

/// Matches `term` against a single `Expr`, for terms that consume exactly one element.
fn match_single(term: &PatternTerm, expr: &Expr) -> Option<StructMap> {
    let mut map = StructMap::new();
    match term {
        PatternTerm::Literal(lit) => literal_matches(lit, expr).then_some(map),
        PatternTerm::Capture { name, kind } => {
            if capture_kind_matches(*kind, expr) {
                map.insert(name.clone(), Binding::One(expr.clone()));
                Some(map)
            } else {
                None
            }
        }
        PatternTerm::Selector { name, choices } => {
            for choice in choices {
                if let Some(mut sub) = match_single(choice, expr) {
                    sub.insert(name.clone(), Binding::One(expr.clone()));
                    return Some(sub);
                }
            }
            None
        }
        PatternTerm::Group { bracket, terms } => {
            let items = exploded_items(*bracket, expr)?;
            match_seq(terms, &items)
        }
        PatternTerm::Section { .. } | PatternTerm::Repeat { .. } => None,
    }
}

fn literal_matches(lit: &Literal, expr: &Expr) -> bool {
    match (lit, expr) {
        (Literal::Number(a), Expr::Number(b)) => a == b,
        (Literal::String(a), Expr::String(b)) => a == b,
        (Literal::Ident(a), Expr::Var(b, _)) => a == b,
        _ => false,
    }
}

fn capture_kind_matches(kind: CaptureKind, expr: &Expr) -> bool {
    match kind {
        CaptureKind::Expr => true,
        CaptureKind::Token => matches!(expr, Expr::Number(_) | Expr::String(_) | Expr::Var(..)),
        CaptureKind::Number => matches!(expr, Expr::Number(_)),
        CaptureKind::String => matches!(expr, Expr::String(_)),
        CaptureKind::Ident => matches!(expr, Expr::Var(..)),
    }
}

fn exploded_items(bracket: GroupBracket, expr: &Expr) -> Option<Vec<Expr>> {
    match (bracket, expr) {
        (GroupBracket::Round, Expr::SExpr { head, args, .. }) => {
            let mut items = Vec::new();
            if let Some(head) = head {
                items.push((**head).clone());
            }
            items.extend(args.iter().cloned());
            Some(items)
        }
        (GroupBracket::Square, Expr::ListExpr(items)) => Some(items.clone()),
        (GroupBracket::Curly, Expr::DictExpr(pairs)) => {
            let mut items = Vec::new();
            for (k, v) in pairs {
                items.push(k.clone());
                items.push(v.clone());
            }
            Some(items)
        }
        _ => None,
    }
}

/// Attempts to match `term` starting at `args`, returning the number of
/// elements consumed and the bindings produced. `Section` is the only variable-length
/// single-term match; everything else consumes exactly one element.
fn try_match_one(term: &PatternTerm, args: &[Expr]) -> Option<(usize, StructMap)> {
    match term {
        PatternTerm::Section { name, terms } => {
            // Try the longest possible prefix first (greedy), matching `terms` exactly.
            for len in (0..=args.len()).rev() {
                if let Some(mut map) = match_seq(terms, &args[..len]) {
                    let consumed: Vec<Expr> = args[..len].to_vec();
                    map.insert(name.clone(), Binding::Many(consumed.into_iter().map(Binding::One).collect()));
                    return Some((len, map));
                }
            }
            None
        }
        other => {
            let first = args.first()?;
            match_single(other, first).map(|map| (1, map))
        }
    }
}

fn merge_struct_maps(a: &mut StructMap, b: StructMap) {
    for (k, v) in b {
        a.insert(k, v);
    }
}

fn match_repeat(inner: &PatternTerm, kind: RepeatKind, rest: &[PatternTerm], args: &[Expr]) -> Option<(usize, StructMap)> {
    // Greedily collect every possible iteration, then backtrack from the longest run.
    let mut iterations: Vec<(usize, StructMap)> = Vec::new();
    let mut offset = 0;
    loop {
        if kind == RepeatKind::Optional && iterations.len() == 1 {
            break;
        }
        match try_match_one(inner, &args[offset..]) {
            Some((len, map)) if len > 0 => {
                iterations.push((len, map));
                offset += len;
            }
            _ => break,
        }
    }
    let min_count = if kind == RepeatKind::OneOrMore { 1 } else { 0 };
    for count in (min_count..=iterations.len()).rev() {
        let consumed: usize = iterations[..count].iter().map(|(len, _)| len).sum();
        if let Some(rest_map) = match_seq(rest, &args[consumed..]) {
            let mut merged = StructMap::new();
            let mut keys: HashSet<String> = HashSet::new();
            for (_, m) in &iterations[..count] {
                keys.extend(m.keys().cloned());
            }
            for key in keys {
                let values: Vec<Binding> = iterations[..count]
                    .iter()
                    .filter_map(|(_, m)| m.get(&key).cloned())
                    .collect();
                merged.insert(key, Binding::Many(values));
            }
            merge_struct_maps(&mut merged, rest_map);
            return Some((consumed, merged));
        }
    }
    None
}

fn match_seq(terms: &[PatternTerm], args: &[Expr]) -> Option<StructMap> {
    if terms.is_empty() {
        return if args.is_empty() { Some(StructMap::new()) } else { None };
    }
    let (first, rest) = (&terms[0], &terms[1..]);
    if let PatternTerm::Repeat { inner, kind } = first {
        let (_, map) = match_repeat(inner, *kind, rest, args)?;
        return Some(map);
    }
    let (consumed, mut map) = try_match_one(first, args)?;
    let rest_map = match_seq(rest, &args[consumed..])?;
    merge_struct_maps(&mut map, rest_map);
    Some(map)
}

/// Matches a macro call's collected argument expressions against its compiled pattern.
pub fn match_call(pattern: &Pattern, args: &[Expr], macro_name: &str, pos: Position) -> Result<StructMap, RumError> {
    match_seq(pattern, args).ok_or_else(|| {
        RumError::macro_error(
            format!("argument list does not match the pattern for macro '{}'", macro_name),
            Some(pos),
        )
    })
}

// ===========================================================================
// Expansion: template + struct map -> synthetic Expr
// ===========================================================================

fn atom_text(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Var(s, _) => Some(s.clone()),
        Expr::String(s) => Some(s.clone()),
        Expr::Number(n) => Some(crate::value::Value::Number(*n).show()),
        _ => None,
    }
}

fn render_source(expr: &Expr) -> String {
    match expr {
        Expr::Number(n) => crate::value::Value::Number(*n).show(),
        Expr::String(s) => format!("\"{}\"", s),
        Expr::Var(s, _) => s.clone(),
        Expr::SExpr { head, args, .. } => {
            let mut parts = Vec::new();
            if let Some(h) = head {
                parts.push(render_source(h));
            }
            parts.extend(args.iter().map(render_source));
            format!("({})", parts.join(" "))
        }
        Expr::ListExpr(items) => format!("[{}]", items.iter().map(render_source).collect::<Vec<_>>().join(" ")),
        Expr::DictExpr(pairs) => format!(
            "{{{}}}",
            pairs
                .iter()
                .map(|(k, v)| format!("({} {})", render_source(k), render_source(v)))
                .collect::<Vec<_>>()
                .join(" ")
        ),
        _ => String::new(),
    }
}

fn lookup_one(map: &StructMap, name: &str, pos: Position) -> Result<Expr, RumError> {
    match map.get(name) {
        Some(Binding::One(e)) => Ok(e.clone()),
        Some(Binding::Many(_)) => Err(RumError::macro_error(
            format!("'{}' is a repeated binding and needs a splice to substitute", name),
            Some(pos),
        )),
        None => Err(RumError::macro_error(format!("unbound name '{}' in macro template", name), Some(pos))),
    }
}

fn lookup_many(map: &StructMap, name: &str, pos: Position) -> Result<Vec<Expr>, RumError> {
    match map.get(name) {
        Some(Binding::Many(items)) => items
            .iter()
            .map(|b| match b {
                Binding::One(e) => Ok(e.clone()),
                Binding::Many(_) => Err(RumError::macro_error(
                    format!("'{}' is a nested repeat and cannot be flattened directly", name),
                    Some(pos),
                )),
            })
            .collect(),
        Some(Binding::One(e)) => Ok(vec![e.clone()]),
        None => Err(RumError::macro_error(format!("unbound name '{}' in macro template", name), Some(pos))),
    }
}

fn binding_nonempty(map: &StructMap, name: &str) -> bool {
    match map.get(name) {
        Some(Binding::One(_)) => true,
        Some(Binding::Many(items)) => !items.is_empty(),
        None => false,
    }
}

/// Expands one template node into zero or more expressions (zero/many only for splice-like nodes).
fn expand_multi(node: &TemplateNode, map: &StructMap, pos: Position) -> Result<Vec<Expr>, RumError> {
    match node {
        TemplateNode::Splice(name) => lookup_many(map, name, pos),
        TemplateNode::Tail(name) => {
            let items = lookup_many(map, name, pos)?;
            Ok(items.into_iter().skip(1).collect())
        }
        other => Ok(vec![expand_one(other, map, pos)?]),
    }
}

fn expand_group_items(nodes: &[TemplateNode], map: &StructMap, pos: Position) -> Result<Vec<Expr>, RumError> {
    let mut items = Vec::new();
    for node in nodes {
        items.extend(expand_multi(node, map, pos)?);
    }
    Ok(items)
}

fn expand_one(node: &TemplateNode, map: &StructMap, pos: Position) -> Result<Expr, RumError> {
    match node {
        TemplateNode::Number(n) => Ok(Expr::Number(*n)),
        TemplateNode::String(s) => Ok(Expr::String(s.clone())),
        TemplateNode::Ident(s) => Ok(Expr::Var(s.clone(), pos)),
        TemplateNode::Subst(name) => lookup_one(map, name, pos),
        TemplateNode::Splice(name) => lookup_many(map, name, pos)?
            .into_iter()
            .next()
            .ok_or_else(|| RumError::macro_error(format!("'{}' has no elements to splice", name), Some(pos))),
        TemplateNode::Group(GroupBracket::Round, nodes) => {
            let mut items = expand_group_items(nodes, map, pos)?;
            if items.is_empty() {
                Ok(Expr::SExpr { head: None, args: vec![], pos })
            } else {
                let head = Box::new(items.remove(0));
                Ok(Expr::SExpr { head: Some(head), args: items, pos })
            }
        }
        TemplateNode::Group(GroupBracket::Square, nodes) => Ok(Expr::ListExpr(expand_group_items(nodes, map, pos)?)),
        TemplateNode::Group(GroupBracket::Curly, nodes) => {
            let items = expand_group_items(nodes, map, pos)?;
            if items.len() % 2 != 0 {
                return Err(RumError::macro_error("dict template group has an odd number of elements", Some(pos)));
            }
            let pairs = items.chunks(2).map(|pair| (pair[0].clone(), pair[1].clone())).collect();
            Ok(Expr::DictExpr(pairs))
        }
        TemplateNode::If { cond, then, els } => {
            if binding_nonempty(map, cond) {
                expand_one(then, map, pos)
            } else {
                expand_one(els, map, pos)
            }
        }
        TemplateNode::Let { name, value, body } => {
            let expanded_value = expand_one(value, map, pos)?;
            let mut extended = map.clone();
            extended.insert(name.clone(), Binding::One(expanded_value));
            expand_one(body, &extended, pos)
        }
        TemplateNode::Cat(a, b) => {
            let ea = lookup_one(map, a, pos)?;
            let eb = lookup_one(map, b, pos)?;
            let ta = atom_text(&ea).ok_or_else(|| RumError::macro_error(format!("'{}' is not an atom", a), Some(pos)))?;
            let tb = atom_text(&eb).ok_or_else(|| RumError::macro_error(format!("'{}' is not an atom", b), Some(pos)))?;
            Ok(Expr::Var(format!("{}{}", ta, tb), pos))
        }
        TemplateNode::Head(name) => lookup_many(map, name, pos)?
            .into_iter()
            .next()
            .ok_or_else(|| RumError::macro_error(format!("'{}' has no elements", name), Some(pos))),
        TemplateNode::Tail(name) => Err(RumError::macro_error(
            format!("'%tail{{{}}}' is a sequence splice and cannot appear where a single value is expected", name),
            Some(pos),
        )),
        TemplateNode::Str(name) => {
            let e = lookup_one(map, name, pos)?;
            Ok(Expr::String(render_source(&e)))
        }
        TemplateNode::IdentOf(name) => {
            let e = lookup_one(map, name, pos)?;
            match e {
                Expr::Var(s, _) => Ok(Expr::Var(s, pos)),
                Expr::String(s) => Ok(Expr::Var(s, pos)),
                _ => Err(RumError::macro_error(format!("'{}' cannot be coerced to an identifier", name), Some(pos))),
            }
        }
    }
}

/// Expands a macro call: matches `args` against `pattern`, then substitutes into `template`.
pub fn expand(entry: &MacroEntry, args: &[Expr], call_pos: Position) -> Result<Expr, RumError> {
    let map = match_call(&entry.pattern, args, &entry.name, call_pos)?;
    expand_one(&entry.template, &map, call_pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn var(name: &str) -> Expr {
        Expr::Var(name.to_string(), Position::start())
    }

    fn parse_def(src: &str) -> MacroEntry {
        let mut lexer = Lexer::new(src);
        let mut stream = TokenStream::new(&mut lexer);
        expect_symbol(&mut stream, b'(').unwrap();
        let name = expect_ident(&mut stream).unwrap();
        let pattern = parse_pattern_terms_until(&mut stream, b')').unwrap();
        let template = parse_template_node(&mut stream).unwrap();
        MacroEntry { name, pattern, template, pos: Position::start() }
    }

    #[test]
    #[serial]
    fn expands_unless_macro() {
        clear_registry_for_tests();
        let entry = parse_def("(unless %c{expr} %b{expr}) (%c () %b)");
        let call_args = vec![var("cond"), Expr::String("ran".to_string())];
        let expanded = expand(&entry, &call_args, Position::start()).unwrap();
        match expanded {
            Expr::SExpr { head: Some(h), args, .. } => {
                assert!(matches!(*h, Expr::Var(ref s, _) if s == "cond"));
                assert_eq!(args.len(), 2);
            }
            other => panic!("expected SExpr, got {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn rejects_mismatched_arity() {
        clear_registry_for_tests();
        let entry = parse_def("(pair %a{expr} %b{expr}) [%a %b]");
        let call_args = vec![var("only-one")];
        assert!(expand(&entry, &call_args, Position::start()).is_err());
    }

    #[test]
    #[serial]
    fn repeat_collects_bindings_into_a_list() {
        clear_registry_for_tests();
        let entry = parse_def("(listify %items{expr}%*) [%%items]");
        let call_args = vec![Expr::Number(1.0), Expr::Number(2.0), Expr::Number(3.0)];
        let expanded = expand(&entry, &call_args, Position::start()).unwrap();
        match expanded {
            Expr::ListExpr(items) => assert_eq!(items.len(), 3),
            other => panic!("expected ListExpr, got {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn repeating_a_repeat_is_rejected() {
        let mut lexer = Lexer::new("(bad %items{expr}%*%*) %items");
        let mut stream = TokenStream::new(&mut lexer);
        expect_symbol(&mut stream, b'(').unwrap();
        expect_ident(&mut stream).unwrap();
        let result = parse_pattern_terms_until(&mut stream, b')');
        assert!(result.is_err());
    }

    fn parse_template(src: &str) -> TemplateNode {
        let mut lexer = Lexer::new(src);
        let mut stream = TokenStream::new(&mut lexer);
        parse_template_node(&mut stream).unwrap()
    }

    fn one(expr: Expr) -> Binding {
        Binding::One(expr)
    }

    fn many(exprs: Vec<Expr>) -> Binding {
        Binding::Many(exprs.into_iter().map(Binding::One).collect())
    }

    #[test]
    fn if_directive_picks_then_when_the_binding_is_present() {
        let node = parse_template("%if{flag}(10)(20)");
        let map: StructMap = [("flag".to_string(), one(Expr::Number(1.0)))].into_iter().collect();
        let result = expand_one(&node, &map, Position::start()).unwrap();
        assert!(matches!(result, Expr::Number(n) if n == 10.0));
    }

    #[test]
    fn if_directive_picks_else_when_the_binding_is_absent() {
        let node = parse_template("%if{flag}(10)(20)");
        let map = StructMap::new();
        let result = expand_one(&node, &map, Position::start()).unwrap();
        assert!(matches!(result, Expr::Number(n) if n == 20.0));
    }

    #[test]
    fn exists_directive_desugars_to_hash_t_or_hash_f() {
        let node = parse_template("%exists{flag}");
        let present: StructMap = [("flag".to_string(), one(Expr::Number(1.0)))].into_iter().collect();
        let absent = StructMap::new();
        assert!(matches!(expand_one(&node, &present, Position::start()).unwrap(), Expr::Var(ref s, _) if s == "#t"));
        assert!(matches!(expand_one(&node, &absent, Position::start()).unwrap(), Expr::Var(ref s, _) if s == "#f"));
    }

    #[test]
    fn let_directive_binds_a_template_local_name() {
        let node = parse_template("%let{x}(5)(%x)");
        let map = StructMap::new();
        let result = expand_one(&node, &map, Position::start()).unwrap();
        assert!(matches!(result, Expr::Number(n) if n == 5.0));
    }

    #[test]
    fn cat_directive_concatenates_two_captured_atoms_into_an_identifier() {
        let node = parse_template("%cat{a}{b}");
        let map: StructMap = [
            ("a".to_string(), one(var("foo"))),
            ("b".to_string(), one(var("bar"))),
        ]
        .into_iter()
        .collect();
        let result = expand_one(&node, &map, Position::start()).unwrap();
        assert!(matches!(result, Expr::Var(ref s, _) if s == "foobar"));
    }

    #[test]
    fn head_directive_returns_the_first_captured_element() {
        let node = parse_template("%head{items}");
        let map: StructMap = [("items".to_string(), many(vec![Expr::Number(1.0), Expr::Number(2.0), Expr::Number(3.0)]))]
            .into_iter()
            .collect();
        let result = expand_one(&node, &map, Position::start()).unwrap();
        assert!(matches!(result, Expr::Number(n) if n == 1.0));
    }

    #[test]
    fn tail_directive_splices_every_element_but_the_first() {
        let node = parse_template("%tail{items}");
        let map: StructMap = [("items".to_string(), many(vec![Expr::Number(1.0), Expr::Number(2.0), Expr::Number(3.0)]))]
            .into_iter()
            .collect();
        let spliced = expand_multi(&node, &map, Position::start()).unwrap();
        assert_eq!(spliced.len(), 2);
        assert!(matches!(spliced[0], Expr::Number(n) if n == 2.0));
        assert!(matches!(spliced[1], Expr::Number(n) if n == 3.0));
    }

    #[test]
    fn tail_directive_in_a_single_value_position_is_a_macro_error() {
        let node = parse_template("%tail{items}");
        let map: StructMap = [("items".to_string(), many(vec![Expr::Number(1.0), Expr::Number(2.0)]))]
            .into_iter()
            .collect();
        assert!(expand_one(&node, &map, Position::start()).is_err());
    }

    #[test]
    fn str_directive_renders_a_captured_expression_back_to_source_text() {
        let node = parse_template("%str{e}");
        let map: StructMap = [(
            "e".to_string(),
            one(Expr::SExpr {
                head: Some(Box::new(var("add"))),
                args: vec![Expr::Number(1.0), Expr::Number(2.0)],
                pos: Position::start(),
            }),
        )]
        .into_iter()
        .collect();
        let result = expand_one(&node, &map, Position::start()).unwrap();
        assert!(matches!(result, Expr::String(ref s) if s == "(add 1 2)"));
    }

    #[test]
    fn ident_directive_coerces_a_captured_string_into_a_variable_node() {
        let node = parse_template("%ident{name}");
        let map: StructMap = [("name".to_string(), one(Expr::String("x".to_string())))].into_iter().collect();
        let result = expand_one(&node, &map, Position::start()).unwrap();
        assert!(matches!(result, Expr::Var(ref s, _) if s == "x"));
    }
}
