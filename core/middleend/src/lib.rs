#![warn(clippy::pedantic)]
//! Algebraic simplification and constant folding.
//!
//! One bottom-up pass over the whole tree. Children are rewritten before
//! their parent looks at them, so a chain like `(1 + 1) * x` sees the
//! already-folded `2 * x`. Rewrites either overwrite a node in place
//! (turning it into a `NUM_LIT`) or splice a surviving operand into the
//! parent's sibling chain in the rewritten node's position.
//!
//! The pass preserves observable behavior with one documented household
//! rule: division by a literal zero is never folded, so the runtime keeps
//! its own division-by-zero behavior.

use rotlang_ast::{AstTree, Literal, NodeId, NodeKind, SemType, TokenKind};

/// Runs the simplification pass to a single fixpoint step. Returns `true`
/// when anything changed; callers wanting full closure can loop, though a
/// single pass already folds bottom-up chains.
pub fn optimize(tree: &mut AstTree) -> bool {
    let mut changed = false;
    tree.root = optimize_chain(tree, tree.root, None, &mut changed);
    if let Some(root) = tree.root {
        tree.node_mut(root).parent = None;
    }
    changed
}

fn optimize_chain(
    tree: &mut AstTree,
    head: Option<NodeId>,
    parent: Option<NodeId>,
    changed: &mut bool,
) -> Option<NodeId> {
    let head = head?;
    let cur = optimize_one(tree, head, parent, changed);

    let next = tree.node(cur).next_sibling;
    let new_next = optimize_chain(tree, next, parent, changed);
    tree.node_mut(cur).next_sibling = new_next;

    Some(cur)
}

fn optimize_one(
    tree: &mut AstTree,
    n: NodeId,
    parent: Option<NodeId>,
    changed: &mut bool,
) -> NodeId {
    tree.node_mut(n).parent = parent;

    let first = tree.node(n).first_child;
    let new_first = optimize_chain(tree, first, Some(n), changed);
    tree.node_mut(n).first_child = new_first;

    match tree.kind(n) {
        NodeKind::Unary(_) => fold_unary(tree, n, changed),
        NodeKind::BuiltinUnary(_) => fold_builtin(tree, n, changed),
        NodeKind::Binary(_) => fold_binary(tree, n, changed),
        _ => n,
    }
}

// -- literal helpers --------------------------------------------------

fn num_lit(tree: &AstTree, id: Option<NodeId>) -> Option<Literal> {
    tree.kind(id?).as_num_lit()
}

fn is_zero(lit: Option<Literal>) -> bool {
    match lit {
        Some(Literal::Int(v)) => v == 0,
        Some(Literal::Float(v)) => v == 0.0,
        None => false,
    }
}

fn is_one(lit: Option<Literal>) -> bool {
    match lit {
        Some(Literal::Int(v)) => v == 1,
        Some(Literal::Float(v)) => v == 1.0,
        None => false,
    }
}

fn truthy(lit: Literal) -> bool {
    match lit {
        Literal::Int(v) => v != 0,
        Literal::Float(v) => v != 0.0,
    }
}

fn is_float_lit(lit: Option<Literal>) -> bool {
    matches!(lit, Some(Literal::Float(_)))
}

/// Rewrites `n` into an integer literal, dropping its children.
fn make_int(tree: &mut AstTree, n: NodeId, value: i64) {
    let node = tree.node_mut(n);
    node.kind = NodeKind::NumLit(Literal::Int(value));
    node.ty = SemType::Int;
    node.first_child = None;
}

/// Rewrites `n` into a float literal, dropping its children.
fn make_float(tree: &mut AstTree, n: NodeId, value: f64) {
    let node = tree.node_mut(n);
    node.kind = NodeKind::NumLit(Literal::Float(value));
    node.ty = SemType::Float;
    node.first_child = None;
}

fn make_num(tree: &mut AstTree, n: NodeId, any_float: bool, fv: f64, iv: i64) {
    if any_float {
        make_float(tree, n, fv);
    } else {
        make_int(tree, n, iv);
    }
}

/// Replaces `n` by `repl` in the parent's sibling chain: `repl` inherits
/// the next-sibling link, the caller re-links the predecessor.
fn replace_with(tree: &mut AstTree, n: NodeId, repl: NodeId) -> NodeId {
    let sibling = tree.node(n).next_sibling;
    let parent = tree.node(n).parent;
    let node = tree.node_mut(repl);
    node.next_sibling = sibling;
    node.parent = parent;
    repl
}

/// Integer exponentiation by squaring, wrapping on overflow. `None` for
/// negative exponents (those fold through the float path).
fn ipow(base: i64, exp: i64) -> Option<i64> {
    if exp < 0 {
        return None;
    }
    let mut result: i64 = 1;
    let mut b = base;
    let mut e = exp;
    while e > 0 {
        if e & 1 == 1 {
            result = result.wrapping_mul(b);
        }
        e >>= 1;
        if e > 0 {
            b = b.wrapping_mul(b);
        }
    }
    Some(result)
}

// -- rewrites ---------------------------------------------------------

fn fold_unary(tree: &mut AstTree, n: NodeId, changed: &mut bool) -> NodeId {
    let NodeKind::Unary(op) = *tree.kind(n) else {
        return n;
    };
    let Some(lit) = num_lit(tree, tree.node(n).first_child) else {
        return n;
    };

    match op {
        TokenKind::Plus => match lit {
            Literal::Int(v) => make_int(tree, n, v),
            Literal::Float(v) => make_float(tree, n, v),
        },
        TokenKind::Minus => match lit {
            Literal::Int(v) => make_int(tree, n, v.wrapping_neg()),
            Literal::Float(v) => make_float(tree, n, -v),
        },
        TokenKind::Not => make_int(tree, n, i64::from(!truthy(lit))),
        _ => return n,
    }

    *changed = true;
    n
}

fn fold_builtin(tree: &mut AstTree, n: NodeId, changed: &mut bool) -> NodeId {
    let NodeKind::BuiltinUnary(builtin) = *tree.kind(n) else {
        return n;
    };
    let Some(lit) = num_lit(tree, tree.node(n).first_child) else {
        return n;
    };

    use rotlang_ast::Builtin;
    let x = lit.as_f64();
    match builtin {
        Builtin::Floor => make_float(tree, n, x.floor()),
        Builtin::Ceil => make_float(tree, n, x.ceil()),
        Builtin::Round => make_float(tree, n, x.round()),
        // itof goes through the integer value, so itof(2.5) folds to 2.0
        Builtin::Itof => make_float(tree, n, lit.as_i64() as f64),
        Builtin::Ftoi => make_int(tree, n, x as i64),
    }

    *changed = true;
    n
}

fn fold_binary(tree: &mut AstTree, n: NodeId, changed: &mut bool) -> NodeId {
    let NodeKind::Binary(op) = *tree.kind(n) else {
        return n;
    };

    let Some(l) = tree.child(n, 0) else { return n };
    let Some(r) = tree.child(n, 1) else { return n };

    let ll = num_lit(tree, Some(l));
    let rl = num_lit(tree, Some(r));

    // algebraic identities, left-to-right match
    match op {
        TokenKind::Plus => {
            if is_zero(rl) {
                *changed = true;
                return replace_with(tree, n, l);
            }
            if is_zero(ll) {
                *changed = true;
                return replace_with(tree, n, r);
            }
        }
        TokenKind::Mul => {
            if is_zero(ll) || is_zero(rl) {
                let any_float = is_float_lit(ll) || is_float_lit(rl);
                make_num(tree, n, any_float, 0.0, 0);
                *changed = true;
                return n;
            }
            if is_one(rl) {
                *changed = true;
                return replace_with(tree, n, l);
            }
            if is_one(ll) {
                *changed = true;
                return replace_with(tree, n, r);
            }
        }
        TokenKind::Pow => {
            if is_zero(rl) {
                let any_float = is_float_lit(ll) || is_float_lit(rl);
                make_num(tree, n, any_float, 1.0, 1);
                *changed = true;
                return n;
            }
            if is_one(rl) {
                *changed = true;
                return replace_with(tree, n, l);
            }
            if is_one(ll) {
                let any_float = is_float_lit(ll) || is_float_lit(rl);
                make_num(tree, n, any_float, 1.0, 1);
                *changed = true;
                return n;
            }
        }
        _ => {}
    }

    // constant folding needs both operands literal
    let (Some(a), Some(b)) = (ll, rl) else {
        return n;
    };
    let any_float = a.is_float() || b.is_float();
    let (af, bf) = (a.as_f64(), b.as_f64());
    let (ai, bi) = (a.as_i64(), b.as_i64());

    match op {
        TokenKind::Or => make_int(tree, n, i64::from(truthy(a) || truthy(b))),
        TokenKind::And => make_int(tree, n, i64::from(truthy(a) && truthy(b))),

        TokenKind::Eq => make_int(tree, n, i64::from(af == bf)),
        TokenKind::Neq => make_int(tree, n, i64::from(af != bf)),
        TokenKind::Gt => make_int(tree, n, i64::from(af > bf)),
        TokenKind::Lt => make_int(tree, n, i64::from(af < bf)),
        TokenKind::Gte => make_int(tree, n, i64::from(af >= bf)),
        TokenKind::Lte => make_int(tree, n, i64::from(af <= bf)),

        TokenKind::Plus => make_num(tree, n, any_float, af + bf, ai.wrapping_add(bi)),
        TokenKind::Minus => make_num(tree, n, any_float, af - bf, ai.wrapping_sub(bi)),
        TokenKind::Mul => make_num(tree, n, any_float, af * bf, ai.wrapping_mul(bi)),

        TokenKind::Div => {
            // division by a literal zero stays in the tree
            if any_float {
                if bf == 0.0 {
                    return n;
                }
                make_float(tree, n, af / bf);
            } else {
                if bi == 0 {
                    return n;
                }
                make_int(tree, n, ai.wrapping_div(bi));
            }
        }

        TokenKind::Pow => {
            if !any_float {
                if let Some(v) = ipow(ai, bi) {
                    make_int(tree, n, v);
                    *changed = true;
                    return n;
                }
            }
            make_float(tree, n, af.powf(bf));
        }

        _ => return n,
    }

    *changed = true;
    n
}
