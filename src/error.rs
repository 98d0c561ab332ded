// ABOUTME: Single error taxonomy surfaced to the host as one human-readable string plus trace

use crate::lexer::Position;
use thiserror::Error;

/// One call-stack entry: a closure's name (or `<lambda>`) and its entry location.
#[derive(Debug, Clone)]
pub struct Frame {
    pub name: String,
    pub pos: Position,
}

#[derive(Debug, Clone, Error)]
pub enum RumError {
    #[error("{message}")]
    Lexical { message: String, pos: Position },

    #[error("{message}")]
    Syntactic { message: String, pos: Option<Position> },

    #[error("{message}")]
    Macro { message: String, pos: Option<Position> },

    #[error("{message}")]
    Evaluation {
        message: String,
        pos: Option<Position>,
        trace: Vec<Frame>,
    },

    #[error("{message}")]
    Host { message: String },
}

impl RumError {
    pub fn lexical(message: impl Into<String>, pos: Position) -> Self {
        RumError::Lexical {
            message: message.into(),
            pos,
        }
    }

    pub fn syntactic(message: impl Into<String>, pos: Option<Position>) -> Self {
        RumError::Syntactic {
            message: message.into(),
            pos,
        }
    }

    pub fn macro_error(message: impl Into<String>, pos: Option<Position>) -> Self {
        RumError::Macro {
            message: message.into(),
            pos,
        }
    }

    pub fn evaluation(message: impl Into<String>, pos: Option<Position>) -> Self {
        RumError::Evaluation {
            message: message.into(),
            pos,
            trace: Vec::new(),
        }
    }

    pub fn host(message: impl Into<String>) -> Self {
        RumError::Host {
            message: message.into(),
        }
    }

    /// Appends one call frame, innermost first, as the error unwinds through closure calls.
    pub fn push_frame(mut self, frame: Frame) -> Self {
        if let RumError::Evaluation { trace, .. } = &mut self {
            trace.push(frame);
        }
        self
    }

    /// Builtins raise evaluation errors without knowing the call site; the evaluator
    /// fills in the location on the way out if the builtin didn't set one itself.
    pub fn with_location_if_missing(mut self, pos: Position) -> Self {
        if let RumError::Evaluation { pos: p, .. } = &mut self {
            if p.is_none() {
                *p = Some(pos);
            }
        }
        self
    }

    fn position(&self) -> Option<Position> {
        match self {
            RumError::Lexical { pos, .. } => Some(*pos),
            RumError::Syntactic { pos, .. } => *pos,
            RumError::Macro { pos, .. } => *pos,
            RumError::Evaluation { pos, .. } => *pos,
            RumError::Host { .. } => None,
        }
    }

    /// Renders the single human-readable string the host-facing contract promises:
    /// message, an optional ` at line L, column C` suffix, then an optional trace block.
    pub fn render(&self) -> String {
        let mut out = self.to_string();
        if let Some(pos) = self.position() {
            out.push_str(&format!(" at line {}, column {}", pos.line, pos.column));
        }
        if let RumError::Evaluation { trace, .. } = self {
            if !trace.is_empty() {
                out.push_str("\nTrace");
                for frame in trace {
                    out.push_str(&format!("\n  {} {}", frame.name, frame.pos));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_position_suffix() {
        let err = RumError::evaluation("undefined variable: x", Some(Position { line: 2, column: 5 }));
        assert_eq!(err.render(), "undefined variable: x at line 2, column 5");
    }

    #[test]
    fn renders_trace_block() {
        let err = RumError::evaluation("boom", Some(Position { line: 1, column: 1 }))
            .push_frame(Frame {
                name: "inc".to_string(),
                pos: Position { line: 1, column: 10 },
            });
        let rendered = err.render();
        assert!(rendered.contains("Trace"));
        assert!(rendered.contains("inc"));
    }
}
