// ABOUTME: Lexer producing a token stream with line/column tracking and a leaking bracket counter

use std::fmt;

/// A one-based line/column coordinate into the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn start() -> Self {
        Position { line: 1, column: 1 }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BracketKind {
    Round,
    Square,
    Curly,
}

/// Round/square/curly counts. The reader inspects this directly to terminate
/// variadic headers on balance rather than peeking for a close token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BracketCounter {
    pub round: i64,
    pub square: i64,
    pub curly: i64,
}

impl BracketCounter {
    pub fn get(&self, kind: BracketKind) -> i64 {
        match kind {
            BracketKind::Round => self.round,
            BracketKind::Square => self.square,
            BracketKind::Curly => self.curly,
        }
    }

    /// Returns `false` (signalling an unmatched bracket) if the count would go negative.
    fn open(&mut self, kind: BracketKind) {
        match kind {
            BracketKind::Round => self.round += 1,
            BracketKind::Square => self.square += 1,
            BracketKind::Curly => self.curly += 1,
        }
    }

    fn close(&mut self, kind: BracketKind) -> bool {
        let count = match kind {
            BracketKind::Round => &mut self.round,
            BracketKind::Square => &mut self.square,
            BracketKind::Curly => &mut self.curly,
        };
        if *count <= 0 {
            false
        } else {
            *count -= 1;
            true
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    String(String),
    Ident(String),
    /// A single-character symbol: one of `( ) [ ] { } \` % " ;`
    Symbol(u8),
    Eof,
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub pos: Position,
}

impl Token {
    pub fn is_symbol(&self, byte: u8) -> bool {
        matches!(self.kind, TokenKind::Symbol(b) if b == byte)
    }
}

const STOP_BYTES: &[u8] = b" \t\r\n()[]{};`%\"";

fn is_stop(byte: u8) -> bool {
    STOP_BYTES.contains(&byte)
}

fn bracket_kind_for(byte: u8) -> Option<(BracketKind, bool)> {
    // bool: true = opening
    match byte {
        b'(' => Some((BracketKind::Round, true)),
        b')' => Some((BracketKind::Round, false)),
        b'[' => Some((BracketKind::Square, true)),
        b']' => Some((BracketKind::Square, false)),
        b'{' => Some((BracketKind::Curly, true)),
        b'}' => Some((BracketKind::Curly, false)),
        _ => None,
    }
}

fn looks_like_number(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;
    if i < bytes.len() && bytes[i] == b'-' {
        i += 1;
    }
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == digits_start {
        return false;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == frac_start {
            return false;
        }
    }
    i == bytes.len()
}

/// Lexes 8-bit clean source text (no Unicode escape processing) into tokens.
pub struct Lexer<'a> {
    src: &'a [u8],
    idx: usize,
    pos: Position,
    brackets: BracketCounter,
    peeked: Option<(Token, usize, Position)>,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer {
            src: src.as_bytes(),
            idx: 0,
            pos: Position::start(),
            brackets: BracketCounter::default(),
            peeked: None,
        }
    }

    pub fn brackets(&self) -> BracketCounter {
        self.brackets
    }

    /// Returns the token `next` would return, without advancing or touching the bracket counter.
    pub fn look_next(&mut self) -> Token {
        if self.peeked.is_none() {
            self.peeked = Some(self.scan_from(self.idx, self.pos));
        }
        self.peeked.as_ref().unwrap().0.clone()
    }

    /// Consumes and returns the next token, advancing position and updating the bracket counter.
    pub fn next(&mut self) -> Token {
        let (token, new_idx, new_pos) = match self.peeked.take() {
            Some(cached) => cached,
            None => self.scan_from(self.idx, self.pos),
        };
        self.idx = new_idx;
        self.pos = new_pos;
        if let TokenKind::Symbol(b) = token.kind {
            if let Some((kind, opening)) = bracket_kind_for(b) {
                if opening {
                    self.brackets.open(kind);
                } else if !self.brackets.close(kind) {
                    return Token {
                        kind: TokenKind::Error("unmatched bracket".to_string()),
                        text: token.text,
                        pos: token.pos,
                    };
                }
            }
        }
        token
    }

    fn advance(idx: &mut usize, pos: &mut Position, src: &[u8]) {
        if src[*idx] == b'\n' {
            pos.line += 1;
            pos.column = 1;
        } else {
            pos.column += 1;
        }
        *idx += 1;
    }

    fn skip_trivia(mut idx: usize, mut pos: Position, src: &[u8]) -> (usize, Position) {
        loop {
            if idx < src.len() && (src[idx] as char).is_whitespace() {
                Self::advance(&mut idx, &mut pos, src);
                continue;
            }
            if idx < src.len() && src[idx] == b';' {
                while idx < src.len() && src[idx] != b'\n' {
                    Self::advance(&mut idx, &mut pos, src);
                }
                continue;
            }
            break;
        }
        (idx, pos)
    }

    fn scan_from(&self, idx: usize, pos: Position) -> (Token, usize, Position) {
        let src = self.src;
        let (mut idx, mut pos) = Self::skip_trivia(idx, pos, src);
        let start_pos = pos;

        if idx >= src.len() {
            return (
                Token {
                    kind: TokenKind::Eof,
                    text: String::new(),
                    pos: start_pos,
                },
                idx,
                pos,
            );
        }

        let byte = src[idx];

        // Rule 2: quoted string, non-greedy, may span newlines.
        if byte == b'"' {
            Self::advance(&mut idx, &mut pos, src);
            let body_start = idx;
            while idx < src.len() && src[idx] != b'"' {
                Self::advance(&mut idx, &mut pos, src);
            }
            if idx >= src.len() {
                return (
                    Token {
                        kind: TokenKind::Error("unterminated string".to_string()),
                        text: String::from_utf8_lossy(&src[body_start..idx]).into_owned(),
                        pos: start_pos,
                    },
                    idx,
                    pos,
                );
            }
            let body = String::from_utf8_lossy(&src[body_start..idx]).into_owned();
            Self::advance(&mut idx, &mut pos, src); // closing quote
            return (
                Token {
                    kind: TokenKind::String(body.clone()),
                    text: body,
                    pos: start_pos,
                },
                idx,
                pos,
            );
        }

        // Rule 1: identifier-or-number, longest run of non-stop bytes.
        if !is_stop(byte) {
            let run_start = idx;
            while idx < src.len() && !is_stop(src[idx]) {
                Self::advance(&mut idx, &mut pos, src);
            }
            let text = String::from_utf8_lossy(&src[run_start..idx]).into_owned();
            let kind = if looks_like_number(&text) {
                TokenKind::Number(text.parse().unwrap())
            } else {
                TokenKind::Ident(text.clone())
            };
            return (
                Token {
                    kind,
                    text,
                    pos: start_pos,
                },
                idx,
                pos,
            );
        }

        // Rule 3: single-character symbols.
        if b"()[]{}`%\"".contains(&byte) {
            Self::advance(&mut idx, &mut pos, src);
            return (
                Token {
                    kind: TokenKind::Symbol(byte),
                    text: (byte as char).to_string(),
                    pos: start_pos,
                },
                idx,
                pos,
            );
        }

        // No rule matched and we are not at EOF.
        Self::advance(&mut idx, &mut pos, src);
        (
            Token {
                kind: TokenKind::Error("unexpected character series".to_string()),
                text: (byte as char).to_string(),
                pos: start_pos,
            },
            idx,
            pos,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next();
            let done = matches!(tok.kind, TokenKind::Eof);
            out.push(tok.kind);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn lexes_numbers_and_identifiers() {
        let got = kinds("42 -3.5 foo foo-bar?");
        assert_eq!(
            got,
            vec![
                TokenKind::Number(42.0),
                TokenKind::Number(-3.5),
                TokenKind::Ident("foo".to_string()),
                TokenKind::Ident("foo-bar?".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_strings_spanning_newlines() {
        let got = kinds("\"a\nb\"");
        assert_eq!(got, vec![TokenKind::String("a\nb".to_string()), TokenKind::Eof]);
    }

    #[test]
    fn comments_run_to_end_of_line() {
        let got = kinds("1 ; a comment\n2");
        assert_eq!(
            got,
            vec![TokenKind::Number(1.0), TokenKind::Number(2.0), TokenKind::Eof]
        );
    }

    #[test]
    fn bracket_counter_tracks_balance() {
        let mut lexer = Lexer::new("(a (b) c)");
        loop {
            let tok = lexer.next();
            if matches!(tok.kind, TokenKind::Eof) {
                break;
            }
        }
        assert_eq!(lexer.brackets(), BracketCounter::default());
    }

    #[test]
    fn unmatched_close_bracket_is_an_error() {
        let mut lexer = Lexer::new(")");
        let tok = lexer.next();
        assert!(matches!(tok.kind, TokenKind::Error(_)));
    }

    #[test]
    fn look_next_is_idempotent() {
        let mut lexer = Lexer::new("foo bar");
        let a = lexer.look_next();
        let b = lexer.look_next();
        assert_eq!(a, b);
        let consumed = lexer.next();
        assert_eq!(consumed, a);
    }
}
