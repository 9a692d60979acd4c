//! Positioned errors shared by every compiler stage.
//!
//! The pipeline keeps a strict "first error wins" policy: each stage
//! returns at the first detected problem, so exactly one [`CompileError`]
//! surfaces per failed stage. The driver is responsible for printing the
//! offending source line with a caret; the error itself only carries the
//! message and the position.

use thiserror::Error;

use crate::token::TokenPos;

/// An error detected while transforming one compilation artifact into the
/// next. `Syntax` covers everything user-visible (lexical, grammatical and
/// semantic violations); `Corrupt` covers malformed persisted input and
/// impossible tree shapes that indicate a broken artifact rather than a
/// broken program.
#[derive(Debug, Clone, PartialEq, Error)]
#[must_use = "errors must not be silently ignored"]
pub enum CompileError {
    #[error("{message} at {pos}")]
    Syntax { message: String, pos: TokenPos },

    #[error("{message} at {pos}")]
    Corrupt { message: String, pos: TokenPos },
}

impl CompileError {
    pub fn syntax(pos: TokenPos, message: impl Into<String>) -> Self {
        CompileError::Syntax {
            message: message.into(),
            pos,
        }
    }

    pub fn corrupt(pos: TokenPos, message: impl Into<String>) -> Self {
        CompileError::Corrupt {
            message: message.into(),
            pos,
        }
    }

    /// Source position the error points at, for caret rendering.
    #[must_use = "this is a pure accessor with no side effects"]
    pub fn pos(&self) -> TokenPos {
        match self {
            CompileError::Syntax { pos, .. } | CompileError::Corrupt { pos, .. } => *pos,
        }
    }
}
