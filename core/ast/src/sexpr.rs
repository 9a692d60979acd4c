//! `.east` S-expression interchange.
//!
//! A serialized node is `( KIND payload* <first-child> <next-sibling> )`
//! where each payload is a `key=value` atom and either sub-slot may be the
//! literal `nil`. Because the tree stores children as a first-child /
//! next-sibling chain, exactly two sub-slots are enough for any arity.
//!
//! The reader re-interns `name=` payloads into the destination tree's
//! name table and regenerates node positions from the reader offset;
//! everything else round-trips structurally. String literal content is
//! not carried (only `str_len`), matching the wire format.

use std::fmt::Write as _;

use rotlang_lexer::{CompileError, Literal, TokenKind, TokenPos};

use crate::nodes::{Builtin, NodeId, NodeKind};
use crate::tree::AstTree;
use crate::types::SemType;

// ---------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------

/// Serializes the whole tree. An empty tree serializes as `nil`.
#[must_use]
pub fn write_sexpr(tree: &AstTree) -> String {
    let mut out = String::new();
    write_slot(tree, tree.root, &mut out);
    out.push('\n');
    out
}

fn write_slot(tree: &AstTree, slot: Option<NodeId>, out: &mut String) {
    match slot {
        None => out.push_str("nil"),
        Some(id) => write_node(tree, id, out),
    }
}

fn write_node(tree: &AstTree, id: NodeId, out: &mut String) {
    let node = tree.node(id);

    let _ = write!(out, "( {}", node.kind.tag());
    write_payload(tree, &node.kind, out);
    out.push(' ');

    write_slot(tree, node.first_child, out);
    out.push(' ');
    write_slot(tree, node.next_sibling, out);

    out.push_str(" )");
}

fn write_payload(tree: &AstTree, kind: &NodeKind, out: &mut String) {
    match kind {
        NodeKind::Func { name, ret } => {
            let _ = write!(out, " name={} ret={}", tree.name(*name), ret);
        }
        NodeKind::Param { name, ty } | NodeKind::VarDecl { name, ty } => {
            let _ = write!(out, " name={} type={}", tree.name(*name), ty);
        }
        NodeKind::Assign { name } | NodeKind::Ident { name } | NodeKind::Call { name } => {
            let _ = write!(out, " name={}", tree.name(*name));
        }
        NodeKind::NumLit(Literal::Int(v)) => {
            let _ = write!(out, " int={v}");
        }
        NodeKind::NumLit(Literal::Float(v)) => {
            let _ = write!(out, " float={v}");
        }
        NodeKind::StrLit { len, .. } => {
            let _ = write!(out, " str_len={len}");
        }
        NodeKind::Unary(op) | NodeKind::Binary(op) => {
            let _ = write!(out, " op={}", op.text());
        }
        NodeKind::BuiltinUnary(builtin) => {
            let _ = write!(out, " builtin={}", builtin.id());
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------

/// Parses a serialized tree back into an [`AstTree`] with a fresh name
/// table. Trailing non-whitespace after the root form is rejected.
///
/// # Errors
///
/// Returns a positioned error for any malformed input: a missing paren,
/// an unknown kind tag, a bad payload atom or trailing garbage.
pub fn read_sexpr(text: &str) -> Result<AstTree, CompileError> {
    let mut tree = AstTree::default();
    let mut reader = Reader::new(text);

    let root = reader.parse_slot(&mut tree, None)?;
    reader.skip_ws();
    if reader.offset < reader.bytes.len() {
        return Err(reader.fail("Trailing garbage after AST"));
    }

    tree.root = root;
    Ok(tree)
}

struct Reader<'a> {
    text: &'a str,
    bytes: &'a [u8],
    offset: usize,
}

fn is_delim(c: u8) -> bool {
    c.is_ascii_whitespace() || c == b'(' || c == b')' || c == 0
}

impl<'a> Reader<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            offset: 0,
        }
    }

    fn here(&self) -> TokenPos {
        let mut line = 1;
        let mut column = 1;
        for &c in &self.bytes[..self.offset.min(self.bytes.len())] {
            if c == b'\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        TokenPos::new(line, column, self.offset)
    }

    fn fail(&self, message: &str) -> CompileError {
        CompileError::syntax(self.here(), message)
    }

    fn peek(&self) -> u8 {
        self.bytes.get(self.offset).copied().unwrap_or(0)
    }

    fn skip_ws(&mut self) {
        while self
            .bytes
            .get(self.offset)
            .is_some_and(u8::is_ascii_whitespace)
        {
            self.offset += 1;
        }
    }

    fn consume(&mut self, c: u8) -> bool {
        self.skip_ws();
        if self.peek() == c {
            self.offset += 1;
            return true;
        }
        false
    }

    /// Reads one whitespace/paren-delimited atom, or `None` at a paren or
    /// end of input.
    fn atom(&mut self) -> Option<&'a str> {
        self.skip_ws();
        let c = self.peek();
        if c == 0 || c == b'(' || c == b')' {
            return None;
        }
        let start = self.offset;
        while !is_delim(self.peek()) {
            self.offset += 1;
        }
        Some(&self.text[start..self.offset])
    }

    /// True when the next atom contains a `=`, i.e. is a payload rather
    /// than the `nil` marker.
    fn next_is_payload(&mut self) -> bool {
        self.skip_ws();
        let mut i = self.offset;
        loop {
            let c = self.bytes.get(i).copied().unwrap_or(0);
            if is_delim(c) {
                return false;
            }
            if c == b'=' {
                return true;
            }
            i += 1;
        }
    }

    /// Parses a sub-slot: either `nil` or a parenthesized node.
    fn parse_slot(
        &mut self,
        tree: &mut AstTree,
        parent: Option<NodeId>,
    ) -> Result<Option<NodeId>, CompileError> {
        self.skip_ws();
        let save = self.offset;
        if let Some(atom) = self.atom() {
            if atom == "nil" {
                return Ok(None);
            }
            self.offset = save;
        }
        self.parse_node(tree, parent).map(Some)
    }

    fn parse_node(
        &mut self,
        tree: &mut AstTree,
        parent: Option<NodeId>,
    ) -> Result<NodeId, CompileError> {
        if !self.consume(b'(') {
            return Err(self.fail("Expected '('"));
        }

        let Some(tag) = self.atom() else {
            return Err(self.fail("Expected AST kind"));
        };
        let tag = tag.to_string();

        let pos = self.here();

        let mut payloads = Payloads::default();
        while self.next_is_payload() {
            let Some(atom) = self.atom() else { break };
            payloads.apply(atom).map_err(|()| {
                CompileError::syntax(pos, format!("Bad payload atom \"{atom}\""))
            })?;
        }

        let (kind, ty) = build_kind(&tag, payloads, tree)
            .map_err(|msg| CompileError::syntax(pos, format!("{msg} \"{tag}\"")))?;

        let id = tree.alloc(kind, pos);
        tree.node_mut(id).ty = ty;
        tree.node_mut(id).parent = parent;

        let first_child = self.parse_slot(tree, Some(id))?;
        tree.node_mut(id).first_child = first_child;

        let next_sibling = self.parse_slot(tree, parent)?;
        tree.node_mut(id).next_sibling = next_sibling;

        if !self.consume(b')') {
            return Err(self.fail("Expected ')'"));
        }

        Ok(id)
    }
}

#[derive(Default)]
struct Payloads {
    name: Option<String>,
    ret: Option<SemType>,
    ty: Option<SemType>,
    int: Option<i64>,
    float: Option<f64>,
    op: Option<TokenKind>,
    builtin: Option<Builtin>,
    str_len: Option<usize>,
}

impl Payloads {
    fn apply(&mut self, atom: &str) -> Result<(), ()> {
        let Some((key, value)) = atom.split_once('=') else {
            return Ok(());
        };

        match key {
            "name" => self.name = Some(value.to_string()),
            "ret" => self.ret = Some(SemType::from_text(value)),
            "type" => self.ty = Some(SemType::from_text(value)),
            "int" => self.int = Some(value.parse().map_err(|_| ())?),
            "float" => self.float = Some(value.parse().map_err(|_| ())?),
            "op" => self.op = Some(TokenKind::from_text(value).ok_or(())?),
            "builtin" => {
                let id: u8 = value.parse().map_err(|_| ())?;
                self.builtin = Some(Builtin::from_id(id).ok_or(())?);
            }
            "str_len" => self.str_len = Some(value.parse().map_err(|_| ())?),
            // unknown keys are tolerated, like the rest of the format
            _ => {}
        }
        Ok(())
    }
}

/// Builds the typed node kind from a tag plus its payload atoms, interning
/// any name payload. Returns the kind together with the semantic type the
/// node starts with (only numeric literals carry one on the wire).
fn build_kind(
    tag: &str,
    p: Payloads,
    tree: &mut AstTree,
) -> Result<(NodeKind, SemType), &'static str> {
    let name = |tree: &mut AstTree, p: &Payloads| {
        let text = p.name.clone().unwrap_or_default();
        tree.intern(&text)
    };

    let kind = match tag {
        "PROGRAM" => NodeKind::Program,
        "FUNC" => NodeKind::Func {
            name: name(tree, &p),
            ret: p.ret.unwrap_or(SemType::Unknown),
        },
        "PARAM_LIST" => NodeKind::ParamList,
        "PARAM" => NodeKind::Param {
            name: name(tree, &p),
            ty: p.ty.unwrap_or(SemType::Unknown),
        },
        "BLOCK" => NodeKind::Block,
        "VAR_DECL" => NodeKind::VarDecl {
            name: name(tree, &p),
            ty: p.ty.unwrap_or(SemType::Unknown),
        },
        "ASSIGN" => NodeKind::Assign {
            name: name(tree, &p),
        },
        "IDENT" => NodeKind::Ident {
            name: name(tree, &p),
        },
        "CALL" => NodeKind::Call {
            name: name(tree, &p),
        },
        "ARG_LIST" => NodeKind::ArgList,
        "NUM_LIT" => match (p.int, p.float) {
            (_, Some(v)) => NodeKind::NumLit(Literal::Float(v)),
            (Some(v), None) => NodeKind::NumLit(Literal::Int(v)),
            (None, None) => NodeKind::NumLit(Literal::Int(0)),
        },
        "STR_LIT" => NodeKind::StrLit {
            text: String::new(),
            len: p.str_len.unwrap_or(0),
        },
        "UNARY" => NodeKind::Unary(p.op.ok_or("Missing op payload on")?),
        "BINARY" => NodeKind::Binary(p.op.ok_or("Missing op payload on")?),
        "BUILTIN_UNARY" => NodeKind::BuiltinUnary(p.builtin.ok_or("Missing builtin payload on")?),
        "WHILE" => NodeKind::While,
        "IF" => NodeKind::If,
        "BRANCH" => NodeKind::Branch,
        "ELSE" => NodeKind::Else,
        "RETURN" => NodeKind::Return,
        "BREAK" => NodeKind::Break,
        "CALL_STMT" => NodeKind::CallStmt,
        "EXPR_STMT" => NodeKind::ExprStmt,
        "COUT" => NodeKind::Cout,
        "ICOUT" => NodeKind::Icout,
        "FCOUT" => NodeKind::Fcout,
        _ => return Err("Unknown AST kind"),
    };

    let ty = match &kind {
        NodeKind::NumLit(Literal::Int(_)) => SemType::Int,
        NodeKind::NumLit(Literal::Float(_)) => SemType::Float,
        _ => SemType::Unknown,
    };

    Ok((kind, ty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rotlang_lexer::NameTable;

    fn pos() -> TokenPos {
        TokenPos::default()
    }

    /// `PROGRAM -> FUNC f/int -> (PARAM_LIST, BLOCK[RETURN 42])`
    fn sample_tree() -> AstTree {
        let mut tree = AstTree::new(NameTable::new());
        let f = tree.intern("f");

        let program = tree.alloc(NodeKind::Program, pos());
        let func = tree.alloc(
            NodeKind::Func {
                name: f,
                ret: SemType::Int,
            },
            pos(),
        );
        let params = tree.alloc(NodeKind::ParamList, pos());
        let block = tree.alloc(NodeKind::Block, pos());
        let ret = tree.alloc(NodeKind::Return, pos());
        let lit = tree.alloc(NodeKind::NumLit(Literal::Int(42)), pos());

        tree.add_child(program, func);
        tree.add_child(func, params);
        tree.add_child(func, block);
        tree.add_child(block, ret);
        tree.add_child(ret, lit);
        tree.root = Some(program);
        tree
    }

    mod writer {
        use super::*;

        #[test]
        fn empty_tree_is_nil() {
            let tree = AstTree::default();
            assert_eq!(write_sexpr(&tree), "nil\n");
        }

        #[test]
        fn serialized_form_nests_siblings() {
            let text = write_sexpr(&sample_tree());
            assert_eq!(
                text,
                "( PROGRAM ( FUNC name=f ret=int ( PARAM_LIST nil \
                 ( BLOCK ( RETURN ( NUM_LIT int=42 nil nil ) nil ) nil ) ) nil ) nil )\n"
            );
        }

        #[test]
        fn float_payload_uses_plain_notation() {
            let mut tree = AstTree::new(NameTable::new());
            let lit = tree.alloc(NodeKind::NumLit(Literal::Float(2.5)), pos());
            tree.root = Some(lit);
            assert_eq!(write_sexpr(&tree), "( NUM_LIT float=2.5 nil nil )\n");
        }

        #[test]
        fn operator_payload_uses_source_spelling() {
            let mut tree = AstTree::new(NameTable::new());
            let a = tree.alloc(NodeKind::NumLit(Literal::Int(1)), pos());
            let b = tree.alloc(NodeKind::NumLit(Literal::Int(2)), pos());
            let bin = tree.alloc(NodeKind::Binary(TokenKind::Lte), pos());
            tree.add_child(bin, a);
            tree.add_child(bin, b);
            tree.root = Some(bin);
            let text = write_sexpr(&tree);
            assert!(text.starts_with("( BINARY op=<= "));
        }
    }

    mod reader {
        use super::*;

        #[test]
        fn round_trip_is_structurally_identity() {
            let tree = sample_tree();
            let text = write_sexpr(&tree);
            let back = read_sexpr(&text).expect("read failed");
            assert!(tree.structural_eq(&back));
        }

        #[test]
        fn reader_reinterns_names() {
            let text = "( IDENT name=counter nil nil )\n";
            let tree = read_sexpr(text).unwrap();
            let root = tree.root.unwrap();
            let NodeKind::Ident { name } = tree.kind(root) else {
                panic!("expected IDENT root");
            };
            assert_eq!(tree.name(*name), "counter");
        }

        #[test]
        fn nil_root_reads_back_empty() {
            let tree = read_sexpr("nil\n").unwrap();
            assert!(tree.root.is_none());
        }

        #[test]
        fn trailing_garbage_is_rejected() {
            let err = read_sexpr("nil nil\n").unwrap_err();
            assert!(err.to_string().contains("Trailing garbage"));
        }

        #[test]
        fn unknown_kind_is_rejected() {
            let err = read_sexpr("( WAT nil nil )\n").unwrap_err();
            assert!(err.to_string().contains("Unknown AST kind"));
        }

        #[test]
        fn missing_close_paren_is_rejected() {
            let err = read_sexpr("( PROGRAM nil nil").unwrap_err();
            assert!(err.to_string().contains("Expected ')'"));
        }

        #[test]
        fn bad_payload_value_is_rejected() {
            let err = read_sexpr("( NUM_LIT int=notanumber nil nil )\n").unwrap_err();
            assert!(err.to_string().contains("Bad payload atom"));
        }

        #[test]
        fn builtin_ids_round_trip() {
            for builtin in [
                Builtin::Floor,
                Builtin::Ceil,
                Builtin::Round,
                Builtin::Itof,
                Builtin::Ftoi,
            ] {
                let text = format!(
                    "( BUILTIN_UNARY builtin={} ( NUM_LIT int=1 nil nil ) nil )\n",
                    builtin.id()
                );
                let tree = read_sexpr(&text).unwrap();
                let root = tree.root.unwrap();
                assert_eq!(*tree.kind(root), NodeKind::BuiltinUnary(builtin));
            }
        }

        #[test]
        fn str_len_survives_round_trip_without_text() {
            let mut tree = AstTree::new(NameTable::new());
            let lit = tree.alloc(
                NodeKind::StrLit {
                    text: "hello".to_string(),
                    len: 5,
                },
                pos(),
            );
            tree.root = Some(lit);

            let back = read_sexpr(&write_sexpr(&tree)).unwrap();
            let root = back.root.unwrap();
            let NodeKind::StrLit { text, len } = back.kind(root) else {
                panic!("expected STR_LIT root");
            };
            assert_eq!(*len, 5);
            assert!(text.is_empty(), "content is not carried across .east");
            assert!(tree.structural_eq(&back));
        }

        #[test]
        fn reader_positions_are_regenerated() {
            let text = "(\n  IDENT name=x nil nil )\n";
            let tree = read_sexpr(text).unwrap();
            let root = tree.root.unwrap();
            assert_eq!(tree.node(root).pos.line, 2);
        }
    }
}
