//! Token model: kinds, positions and literal payloads.

use core::fmt;
use std::fmt::{Display, Formatter};

use crate::nametable::NameId;

/// A position inside the source buffer. Lines and columns are 1-based,
/// the offset is a 0-based byte index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenPos {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl TokenPos {
    #[must_use]
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }
}

impl Display for TokenPos {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}:{} (offset: {})", self.line, self.column, self.offset)
    }
}

/// Tagged value of a numeric literal. A literal without a decimal point is
/// a signed 64-bit integer, one with a decimal point is a double.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
}

impl Literal {
    #[must_use = "this is a pure check with no side effects"]
    pub fn is_float(&self) -> bool {
        matches!(self, Literal::Float(_))
    }

    /// The value widened to a double, regardless of tag.
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        match self {
            Literal::Int(v) => *v as f64,
            Literal::Float(v) => *v,
        }
    }

    /// The value truncated to an integer, regardless of tag.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        match self {
            Literal::Int(v) => *v,
            Literal::Float(v) => *v as i64,
        }
    }
}

macro_rules! token_kinds {
    (
        $( $variant:ident => $text:literal ),+ $(,)?
    ) => {
        /// The closed token set of the language.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum TokenKind {
            $( $variant, )+
        }

        impl TokenKind {
            /// Canonical spelling of the token. Operator and keyword kinds
            /// return their source text; synthetic kinds return an
            /// uppercase tag. This spelling is what the `.east` `op=`
            /// payload carries.
            #[must_use]
            pub fn text(self) -> &'static str {
                match self {
                    $( TokenKind::$variant => $text, )+
                }
            }

            /// Inverse of [`TokenKind::text`], used by the `.east` reader.
            #[must_use = "this is a pure lookup with no side effects"]
            pub fn from_text(text: &str) -> Option<TokenKind> {
                match text {
                    $( $text => Some(TokenKind::$variant), )+
                    _ => None,
                }
            }
        }
    };
}

token_kinds! {
    Eof => "EOF",
    Identifier => "IDENTIFIER",
    NumericLiteral => "NUMERIC_LITERAL",
    StringLiteral => "STRING_LITERAL",

    LParen => "(",
    RParen => ")",
    Comma => ",",
    Semicolon => ";",

    Or => "||",
    And => "&&",
    Eq => "==",
    Neq => "!=",
    Gt => ">",
    Lt => "<",
    Gte => ">=",
    Lte => "<=",
    Plus => "+",
    Minus => "-",
    Mul => "*",
    Div => "/",
    Pow => "^",
    Not => "!",

    KwNpc => "npc",
    KwHomie => "homie",
    KwSus => "sus",
    KwSimp => "simp",

    KwYap => "yap",
    KwYapity => "yapity",
    KwLowkey => "lowkey",
    KwHighkey => "highkey",
    KwAlpha => "alpha",
    KwOmega => "omega",
    KwSigma => "sigma",
    KwGg => "gg",
    KwMicdrop => "micdrop",
    KwBruh => "bruh",

    KwGaslight => "gaslight",

    KwBased => "based",
    KwMid => "mid",
    KwPeak => "peak",

    KwStan => "stan",
    KwAura => "aura",
    KwDelulu => "delulu",
    KwGoober => "goober",
    KwBozo => "bozo",
}

impl TokenKind {
    /// Keyword lookup for a completed identifier run. Case-sensitive and
    /// exact; anything not in the keyword set stays an identifier.
    #[must_use = "this is a pure lookup with no side effects"]
    pub fn keyword(text: &str) -> Option<TokenKind> {
        match TokenKind::from_text(text) {
            Some(kind) if kind.is_keyword() => Some(kind),
            _ => None,
        }
    }

    #[must_use = "this is a pure check with no side effects"]
    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            TokenKind::KwNpc
                | TokenKind::KwHomie
                | TokenKind::KwSus
                | TokenKind::KwSimp
                | TokenKind::KwYap
                | TokenKind::KwYapity
                | TokenKind::KwLowkey
                | TokenKind::KwHighkey
                | TokenKind::KwAlpha
                | TokenKind::KwOmega
                | TokenKind::KwSigma
                | TokenKind::KwGg
                | TokenKind::KwMicdrop
                | TokenKind::KwBruh
                | TokenKind::KwGaslight
                | TokenKind::KwBased
                | TokenKind::KwMid
                | TokenKind::KwPeak
                | TokenKind::KwStan
                | TokenKind::KwAura
                | TokenKind::KwDelulu
                | TokenKind::KwGoober
                | TokenKind::KwBozo
        )
    }
}

/// A scanned token. The lexeme borrows from the source buffer; numeric
/// literals additionally carry their parsed value, identifiers their
/// interned name id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub pos: TokenPos,
    pub lexeme: &'src str,
    pub literal: Option<Literal>,
    pub name: Option<NameId>,
}

impl<'src> Token<'src> {
    #[must_use]
    pub fn new(kind: TokenKind, pos: TokenPos, lexeme: &'src str) -> Self {
        Self {
            kind,
            pos,
            lexeme,
            literal: None,
            name: None,
        }
    }

    #[must_use = "this is a pure check with no side effects"]
    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}
