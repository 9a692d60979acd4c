//! The arena-owning tree.

use rotlang_lexer::{Literal, NameId, NameTable, TokenPos};

use crate::nodes::{Node, NodeId, NodeKind};

/// Owns the node arena and the name table. All [`NodeId`]s handed out by
/// [`AstTree::alloc`] stay valid until the tree is dropped; nodes are
/// never freed individually.
#[derive(Debug, Default)]
pub struct AstTree {
    nodes: Vec<Node>,
    pub root: Option<NodeId>,
    names: NameTable,
}

impl AstTree {
    /// Creates an empty tree taking ownership of an existing name table
    /// (typically the one the lexer produced).
    #[must_use]
    pub fn new(names: NameTable) -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            names,
        }
    }

    /// Allocates a fresh node with no links and `Unknown` semantic type.
    pub fn alloc(&mut self, kind: NodeKind, pos: TokenPos) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).expect("AST arena overflow"));
        self.nodes.push(Node::new(kind, pos));
        id
    }

    #[must_use = "this is a pure accessor with no side effects"]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    #[must_use = "this is a pure accessor with no side effects"]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Appends `child` at the end of `parent`'s sibling chain.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        self.node_mut(child).parent = Some(parent);
        self.node_mut(child).next_sibling = None;

        match self.node(parent).first_child {
            None => self.node_mut(parent).first_child = Some(child),
            Some(first) => {
                let mut cur = first;
                while let Some(next) = self.node(cur).next_sibling {
                    cur = next;
                }
                self.node_mut(cur).next_sibling = Some(child);
            }
        }
    }

    /// The `idx`-th child of `id`, walking the sibling chain.
    #[must_use = "this is a pure lookup with no side effects"]
    pub fn child(&self, id: NodeId, idx: usize) -> Option<NodeId> {
        let mut cur = self.node(id).first_child;
        let mut remaining = idx;
        while let Some(c) = cur {
            if remaining == 0 {
                return Some(c);
            }
            remaining -= 1;
            cur = self.node(c).next_sibling;
        }
        None
    }

    /// Iterator over the children of `id`, in order.
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            tree: self,
            cur: self.node(id).first_child,
        }
    }

    #[must_use]
    pub fn children_count(&self, id: NodeId) -> usize {
        self.children(id).count()
    }

    #[must_use = "this is a pure accessor with no side effects"]
    pub fn names(&self) -> &NameTable {
        &self.names
    }

    pub fn names_mut(&mut self) -> &mut NameTable {
        &mut self.names
    }

    /// Resolves a name id against this tree's table.
    #[must_use = "this is a pure lookup with no side effects"]
    pub fn name(&self, id: NameId) -> &str {
        self.names.get(id)
    }

    pub fn intern(&mut self, text: &str) -> NameId {
        self.names.insert(text)
    }

    /// Structural equivalence against another tree: same kinds, payloads
    /// (identifier payloads compared by text, not by id), and child
    /// ordering. Source positions and node addresses are ignored, as is
    /// the inferred `ty` field (the wire format does not carry it).
    #[must_use = "this is a pure check with no side effects"]
    pub fn structural_eq(&self, other: &AstTree) -> bool {
        match (self.root, other.root) {
            (None, None) => true,
            (Some(a), Some(b)) => self.node_eq(a, other, b),
            _ => false,
        }
    }

    fn node_eq(&self, a: NodeId, other: &AstTree, b: NodeId) -> bool {
        if !self.kind_eq(&self.node(a).kind, other, &other.node(b).kind) {
            return false;
        }

        let mut ca = self.node(a).first_child;
        let mut cb = other.node(b).first_child;
        loop {
            match (ca, cb) {
                (None, None) => return true,
                (Some(na), Some(nb)) => {
                    if !self.node_eq(na, other, nb) {
                        return false;
                    }
                    ca = self.node(na).next_sibling;
                    cb = other.node(nb).next_sibling;
                }
                _ => return false,
            }
        }
    }

    fn kind_eq(&self, a: &NodeKind, other: &AstTree, b: &NodeKind) -> bool {
        use NodeKind as K;
        match (a, b) {
            (K::Func { name: na, ret: ra }, K::Func { name: nb, ret: rb }) => {
                ra == rb && self.name(*na) == other.name(*nb)
            }
            (K::Param { name: na, ty: ta }, K::Param { name: nb, ty: tb })
            | (K::VarDecl { name: na, ty: ta }, K::VarDecl { name: nb, ty: tb }) => {
                ta == tb && self.name(*na) == other.name(*nb)
            }
            (K::Assign { name: na }, K::Assign { name: nb })
            | (K::Ident { name: na }, K::Ident { name: nb })
            | (K::Call { name: na }, K::Call { name: nb }) => self.name(*na) == other.name(*nb),
            (K::NumLit(la), K::NumLit(lb)) => literal_eq(*la, *lb),
            // Text is not carried across the .east boundary; length is.
            (K::StrLit { len: la, .. }, K::StrLit { len: lb, .. }) => la == lb,
            _ => a == b,
        }
    }
}

fn literal_eq(a: Literal, b: Literal) -> bool {
    match (a, b) {
        (Literal::Int(x), Literal::Int(y)) => x == y,
        (Literal::Float(x), Literal::Float(y)) => x.to_bits() == y.to_bits() || x == y,
        _ => false,
    }
}

/// Iterator over a node's sibling chain.
pub struct Children<'t> {
    tree: &'t AstTree,
    cur: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.cur?;
        self.cur = self.tree.node(id).next_sibling;
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rotlang_lexer::TokenPos;

    fn pos() -> TokenPos {
        TokenPos::default()
    }

    #[test]
    fn children_keep_insertion_order() {
        let mut tree = AstTree::new(NameTable::new());
        let parent = tree.alloc(NodeKind::Block, pos());
        let a = tree.alloc(NodeKind::Break, pos());
        let b = tree.alloc(NodeKind::Break, pos());
        let c = tree.alloc(NodeKind::Break, pos());
        tree.add_child(parent, a);
        tree.add_child(parent, b);
        tree.add_child(parent, c);

        let kids: Vec<NodeId> = tree.children(parent).collect();
        assert_eq!(kids, vec![a, b, c]);
        assert_eq!(tree.child(parent, 1), Some(b));
        assert_eq!(tree.child(parent, 3), None);
        assert_eq!(tree.children_count(parent), 3);
    }

    #[test]
    fn add_child_sets_parent_link() {
        let mut tree = AstTree::new(NameTable::new());
        let parent = tree.alloc(NodeKind::Block, pos());
        let child = tree.alloc(NodeKind::Break, pos());
        tree.add_child(parent, child);
        assert_eq!(tree.node(child).parent, Some(parent));
    }

    #[test]
    fn structural_eq_compares_names_by_text() {
        // Two trees interning the same identifier in different orders must
        // still compare equal.
        let mut t1 = AstTree::new(NameTable::new());
        let _pad = t1.names_mut().insert("padding");
        let n1 = t1.names_mut().insert("x");
        let id1 = t1.alloc(NodeKind::Ident { name: n1 }, pos());
        t1.root = Some(id1);

        let mut t2 = AstTree::new(NameTable::new());
        let n2 = t2.names_mut().insert("x");
        let id2 = t2.alloc(NodeKind::Ident { name: n2 }, pos());
        t2.root = Some(id2);

        assert!(t1.structural_eq(&t2));
    }

    #[test]
    fn structural_eq_detects_child_order() {
        let mut t1 = AstTree::new(NameTable::new());
        let p1 = t1.alloc(NodeKind::ArgList, pos());
        let a1 = t1.alloc(NodeKind::NumLit(Literal::Int(1)), pos());
        let b1 = t1.alloc(NodeKind::NumLit(Literal::Int(2)), pos());
        t1.add_child(p1, a1);
        t1.add_child(p1, b1);
        t1.root = Some(p1);

        let mut t2 = AstTree::new(NameTable::new());
        let p2 = t2.alloc(NodeKind::ArgList, pos());
        let a2 = t2.alloc(NodeKind::NumLit(Literal::Int(2)), pos());
        let b2 = t2.alloc(NodeKind::NumLit(Literal::Int(1)), pos());
        t2.add_child(p2, a2);
        t2.add_child(p2, b2);
        t2.root = Some(p2);

        assert!(!t1.structural_eq(&t2));
    }

    #[test]
    fn structural_eq_distinguishes_literal_tags() {
        let mut t1 = AstTree::new(NameTable::new());
        let a = t1.alloc(NodeKind::NumLit(Literal::Int(1)), pos());
        t1.root = Some(a);

        let mut t2 = AstTree::new(NameTable::new());
        let b = t2.alloc(NodeKind::NumLit(Literal::Float(1.0)), pos());
        t2.root = Some(b);

        assert!(!t1.structural_eq(&t2));
    }
}
