//! Node model: arena handles, kinds and their payloads.

use rotlang_lexer::{Literal, NameId, TokenKind, TokenPos};

use crate::types::SemType;

/// Index of a node inside its owning [`crate::tree::AstTree`] arena.
/// Handles are only meaningful against the tree that allocated them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The closed set of builtin unary operators exposed as keywords.
/// Serialized in `.east` as the numeric ids 0..=4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Floor,
    Ceil,
    Round,
    Itof,
    Ftoi,
}

impl Builtin {
    #[must_use]
    pub fn id(self) -> u8 {
        match self {
            Builtin::Floor => 0,
            Builtin::Ceil => 1,
            Builtin::Round => 2,
            Builtin::Itof => 3,
            Builtin::Ftoi => 4,
        }
    }

    #[must_use = "this is a pure lookup with no side effects"]
    pub fn from_id(id: u8) -> Option<Builtin> {
        match id {
            0 => Some(Builtin::Floor),
            1 => Some(Builtin::Ceil),
            2 => Some(Builtin::Round),
            3 => Some(Builtin::Itof),
            4 => Some(Builtin::Ftoi),
            _ => None,
        }
    }

    /// Source keyword for the unparser.
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Builtin::Floor => "stan",
            Builtin::Ceil => "aura",
            Builtin::Round => "delulu",
            Builtin::Itof => "goober",
            Builtin::Ftoi => "bozo",
        }
    }

    /// Maps the keyword tokens `stan`/`aura`/`delulu`/`goober`/`bozo`.
    #[must_use = "this is a pure lookup with no side effects"]
    pub fn from_token(kind: TokenKind) -> Option<Builtin> {
        match kind {
            TokenKind::KwStan => Some(Builtin::Floor),
            TokenKind::KwAura => Some(Builtin::Ceil),
            TokenKind::KwDelulu => Some(Builtin::Round),
            TokenKind::KwGoober => Some(Builtin::Itof),
            TokenKind::KwBozo => Some(Builtin::Ftoi),
            _ => None,
        }
    }
}

/// Node kind with its kind-specific payload.
///
/// Structural children (condition/body/operands) are not part of the
/// payload; they hang off the node's first-child/next-sibling links in the
/// order the grammar produces them.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Program,
    /// Children: `[PARAM_LIST, BLOCK]`.
    Func {
        name: NameId,
        ret: SemType,
    },
    ParamList,
    Param {
        name: NameId,
        ty: SemType,
    },
    Block,
    /// Child 0, when present, is the initializer expression.
    VarDecl {
        name: NameId,
        ty: SemType,
    },
    /// Child 0 is the assigned expression.
    Assign {
        name: NameId,
    },
    Ident {
        name: NameId,
    },
    /// Child 0 is the ARG_LIST.
    Call {
        name: NameId,
    },
    ArgList,
    NumLit(Literal),
    /// `len` is the source byte length; the text is lost across the
    /// `.east` boundary (the wire payload records only `str_len`).
    StrLit {
        text: String,
        len: usize,
    },
    Unary(TokenKind),
    Binary(TokenKind),
    BuiltinUnary(Builtin),
    /// Children: `[cond, body]`.
    While,
    /// Children: `[cond, then, tail?]` where the tail chains BRANCH/ELSE.
    If,
    /// Children: `[cond, stmt, tail?]`.
    Branch,
    Else,
    Return,
    Break,
    CallStmt,
    ExprStmt,
    /// `based(expr)` — prints as int.
    Cout,
    /// `mid(expr)` — prints as int.
    Icout,
    /// `peak(expr)` — prints as float.
    Fcout,
}

impl NodeKind {
    /// Kind tag used by the `.east` format.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            NodeKind::Program => "PROGRAM",
            NodeKind::Func { .. } => "FUNC",
            NodeKind::ParamList => "PARAM_LIST",
            NodeKind::Param { .. } => "PARAM",
            NodeKind::Block => "BLOCK",
            NodeKind::VarDecl { .. } => "VAR_DECL",
            NodeKind::Assign { .. } => "ASSIGN",
            NodeKind::Ident { .. } => "IDENT",
            NodeKind::Call { .. } => "CALL",
            NodeKind::ArgList => "ARG_LIST",
            NodeKind::NumLit(_) => "NUM_LIT",
            NodeKind::StrLit { .. } => "STR_LIT",
            NodeKind::Unary(_) => "UNARY",
            NodeKind::Binary(_) => "BINARY",
            NodeKind::BuiltinUnary(_) => "BUILTIN_UNARY",
            NodeKind::While => "WHILE",
            NodeKind::If => "IF",
            NodeKind::Branch => "BRANCH",
            NodeKind::Else => "ELSE",
            NodeKind::Return => "RETURN",
            NodeKind::Break => "BREAK",
            NodeKind::CallStmt => "CALL_STMT",
            NodeKind::ExprStmt => "EXPR_STMT",
            NodeKind::Cout => "COUT",
            NodeKind::Icout => "ICOUT",
            NodeKind::Fcout => "FCOUT",
        }
    }

    /// Numeric-literal payload, if this is a `NUM_LIT` node.
    #[must_use = "this is a pure accessor with no side effects"]
    pub fn as_num_lit(&self) -> Option<Literal> {
        match self {
            NodeKind::NumLit(lit) => Some(*lit),
            _ => None,
        }
    }
}

/// An arena-resident node. Children form a singly linked sibling chain:
/// `first_child` points at child 0, each child's `next_sibling` at the
/// next one.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub pos: TokenPos,
    pub ty: SemType,
    pub parent: Option<NodeId>,
    pub first_child: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
}

impl Node {
    #[must_use]
    pub fn new(kind: NodeKind, pos: TokenPos) -> Self {
        Self {
            kind,
            pos,
            ty: SemType::Unknown,
            parent: None,
            first_child: None,
            next_sibling: None,
        }
    }
}
