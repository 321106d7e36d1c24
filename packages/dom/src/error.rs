use thiserror::Error;

pub type SelectorResult<T> = Result<T, SelectorError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectorError {
    #[error("Empty selector")]
    Empty,

    #[error("Lexer error at {pos}")]
    LexerError { pos: usize },

    #[error("Unexpected token at {pos}: expected {expected}, found {found}")]
    UnexpectedToken {
        pos: usize,
        expected: String,
        found: String,
    },

    #[error("Unexpected end of selector at {pos}")]
    UnexpectedEnd { pos: usize },

    #[error("Unsupported pseudo-class ':{name}' at {pos}")]
    UnsupportedPseudo { pos: usize, name: String },

    #[error("Invalid nth expression '{expr}' at {pos}")]
    InvalidNth { pos: usize, expr: String },
}

impl SelectorError {
    pub fn unexpected_token(pos: usize, expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::UnexpectedToken {
            pos,
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn lexer_error(pos: usize) -> Self {
        Self::LexerError { pos }
    }

    pub fn unexpected_end(pos: usize) -> Self {
        Self::UnexpectedEnd { pos }
    }
}
