#![warn(clippy::pedantic)]
//! AST back to source text.
//!
//! Pre-order emission with one tab per block level. Expressions print
//! with minimum parentheses: a child is parenthesized when its precedence
//! is lower than its parent's, or equal and on the side that would
//! re-associate wrong (the right operand of a left-associative operator,
//! the left operand of the right-associative `^`). Feeding the output
//! back through the lexer and parser yields a structurally equivalent
//! tree.

use std::fmt::Write as _;

use rotlang_ast::{AstTree, CompileError, Literal, NodeId, NodeKind, TokenKind, TokenPos};

/// Renders the tree as source text.
///
/// # Errors
///
/// Fails on tree shapes the statement/expression grammar cannot produce
/// (a corrupt artifact rather than a user error).
pub fn unparse(tree: &AstTree) -> Result<String, CompileError> {
    let Some(root) = tree.root else {
        return Err(CompileError::corrupt(TokenPos::default(), "AST root is NULL"));
    };
    if !matches!(tree.kind(root), NodeKind::Program) {
        return Err(CompileError::corrupt(
            tree.node(root).pos,
            "AST root must be PROGRAM",
        ));
    }

    let mut out = String::new();
    let mut any = false;
    for func in tree.children(root) {
        if !matches!(tree.kind(func), NodeKind::Func { .. }) {
            return Err(CompileError::corrupt(
                tree.node(func).pos,
                "PROGRAM contains non-FUNC",
            ));
        }
        emit_func(tree, func, &mut out)?;
        any = true;
    }

    if !any {
        return Err(CompileError::corrupt(
            tree.node(root).pos,
            "PROGRAM has no functions",
        ));
    }

    Ok(out)
}

fn corrupt(tree: &AstTree, at: NodeId, message: &str) -> CompileError {
    CompileError::corrupt(tree.node(at).pos, message)
}

fn indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push('\t');
    }
}

/// Precedence for parenthesization; larger binds tighter.
fn expr_prec(tree: &AstTree, id: NodeId) -> i32 {
    match tree.kind(id) {
        NodeKind::Binary(op) => match op {
            TokenKind::Or => 10,
            TokenKind::And => 20,
            TokenKind::Eq | TokenKind::Neq => 30,
            TokenKind::Gt | TokenKind::Lt | TokenKind::Gte | TokenKind::Lte => 40,
            TokenKind::Plus | TokenKind::Minus => 50,
            TokenKind::Mul | TokenKind::Div => 60,
            TokenKind::Pow => 70,
            _ => 55,
        },
        NodeKind::Unary(_) | NodeKind::BuiltinUnary(_) => 80,
        // a folded negative literal prints as unary minus over its
        // magnitude, so it ranks with the unary operators
        NodeKind::NumLit(lit) if is_negative(*lit) => 80,
        _ => 90,
    }
}

fn is_negative(lit: Literal) -> bool {
    match lit {
        Literal::Int(v) => v < 0,
        Literal::Float(v) => v.is_sign_negative(),
    }
}

fn emit_func(tree: &AstTree, func: NodeId, out: &mut String) -> Result<(), CompileError> {
    let NodeKind::Func { name, ret } = *tree.kind(func) else {
        return Err(corrupt(tree, func, "Expected FUNC"));
    };

    let (Some(params), Some(body)) = (tree.child(func, 0), tree.child(func, 1)) else {
        return Err(corrupt(tree, func, "FUNC must have (PARAM_LIST, BLOCK)"));
    };

    let _ = write!(out, "{} {}(", ret.keyword(), tree.name(name));

    if !matches!(tree.kind(params), NodeKind::ParamList) {
        return Err(corrupt(tree, params, "Expected PARAM_LIST"));
    }
    let mut first = true;
    for param in tree.children(params) {
        let NodeKind::Param { name, ty } = *tree.kind(param) else {
            return Err(corrupt(tree, param, "PARAM_LIST contains non-PARAM"));
        };
        if !first {
            out.push_str(", ");
        }
        first = false;
        let _ = write!(out, "{} {}", ty.keyword(), tree.name(name));
    }
    out.push_str(")\n");

    emit_stmt(tree, body, 0, out)?;
    out.push('\n');
    Ok(())
}

fn emit_stmt(
    tree: &AstTree,
    stmt: NodeId,
    level: usize,
    out: &mut String,
) -> Result<(), CompileError> {
    match tree.kind(stmt) {
        NodeKind::Block => {
            indent(out, level);
            out.push_str("yap\n");
            for child in tree.children(stmt) {
                emit_stmt(tree, child, level + 1, out)?;
            }
            indent(out, level);
            out.push_str("yapity\n");
            Ok(())
        }

        NodeKind::While => {
            let (Some(cond), Some(body)) = (tree.child(stmt, 0), tree.child(stmt, 1)) else {
                return Err(corrupt(tree, stmt, "WHILE must have (cond, body)"));
            };

            indent(out, level);
            out.push_str("lowkey (");
            emit_expr(tree, cond, 0, Side::Only, out)?;
            out.push_str(")\n");

            emit_stmt(tree, body, level + 1, out)
        }

        NodeKind::If => emit_if_chain(tree, stmt, level, out),

        NodeKind::VarDecl { name, ty } => {
            indent(out, level);
            let _ = write!(out, "{} {}", ty.keyword(), tree.name(*name));

            if let Some(init) = tree.child(stmt, 0) {
                out.push_str(" gaslight ");
                emit_expr(tree, init, 0, Side::Only, out)?;
            }

            out.push_str(";\n");
            Ok(())
        }

        NodeKind::Assign { name } => {
            let Some(rhs) = tree.child(stmt, 0) else {
                return Err(corrupt(tree, stmt, "ASSIGN must have rhs"));
            };

            indent(out, level);
            let _ = write!(out, "{} gaslight ", tree.name(*name));
            emit_expr(tree, rhs, 0, Side::Only, out)?;
            out.push_str(";\n");
            Ok(())
        }

        NodeKind::Break => {
            indent(out, level);
            out.push_str("gg;\n");
            Ok(())
        }

        NodeKind::Return => {
            indent(out, level);
            out.push_str("micdrop");

            if let Some(expr) = tree.child(stmt, 0) {
                out.push(' ');
                emit_expr(tree, expr, 0, Side::Only, out)?;
            }

            out.push_str(";\n");
            Ok(())
        }

        NodeKind::CallStmt => {
            let Some(call) = tree
                .child(stmt, 0)
                .filter(|&c| matches!(tree.kind(c), NodeKind::Call { .. }))
            else {
                return Err(corrupt(tree, stmt, "CALL_STMT must contain CALL"));
            };

            indent(out, level);
            out.push_str("bruh ");
            emit_call(tree, call, out)?;
            out.push_str(";\n");
            Ok(())
        }

        NodeKind::Cout | NodeKind::Icout | NodeKind::Fcout => {
            let Some(expr) = tree.child(stmt, 0) else {
                return Err(corrupt(tree, stmt, "print statement must have expr"));
            };

            let kw = match tree.kind(stmt) {
                NodeKind::Cout => "based",
                NodeKind::Icout => "mid",
                _ => "peak",
            };

            indent(out, level);
            let _ = write!(out, "{kw}(");
            emit_expr(tree, expr, 0, Side::Only, out)?;
            out.push_str(");\n");
            Ok(())
        }

        NodeKind::ExprStmt => {
            let Some(expr) = tree.child(stmt, 0) else {
                return Err(corrupt(tree, stmt, "EXPR_STMT must have expr"));
            };

            indent(out, level);
            emit_expr(tree, expr, 0, Side::Only, out)?;
            out.push_str(";\n");
            Ok(())
        }

        _ => Err(corrupt(tree, stmt, "Unknown/unsupported statement node")),
    }
}

fn emit_if_chain(
    tree: &AstTree,
    if_node: NodeId,
    level: usize,
    out: &mut String,
) -> Result<(), CompileError> {
    let (Some(cond), Some(then_stmt)) = (tree.child(if_node, 0), tree.child(if_node, 1)) else {
        return Err(corrupt(tree, if_node, "IF must have (cond, then)"));
    };

    indent(out, level);
    out.push_str("alpha (");
    emit_expr(tree, cond, 0, Side::Only, out)?;
    out.push_str(")\n");

    emit_stmt(tree, then_stmt, level + 1, out)?;

    let mut cur = tree.node(then_stmt).next_sibling;
    while let Some(tail) = cur {
        match tree.kind(tail) {
            NodeKind::Branch => {
                let (Some(bc), Some(bs)) = (tree.child(tail, 0), tree.child(tail, 1)) else {
                    return Err(corrupt(tree, tail, "BRANCH must have (cond, stmt)"));
                };

                indent(out, level);
                out.push_str("omega (");
                emit_expr(tree, bc, 0, Side::Only, out)?;
                out.push_str(")\n");

                emit_stmt(tree, bs, level + 1, out)?;
                cur = tree.node(bs).next_sibling;
            }

            NodeKind::Else => {
                let Some(body) = tree.child(tail, 0) else {
                    return Err(corrupt(tree, tail, "ELSE must have body"));
                };

                indent(out, level);
                out.push_str("sigma\n");
                emit_stmt(tree, body, level + 1, out)?;
                cur = None;
            }

            _ => return Err(corrupt(tree, tail, "IF tail is neither BRANCH nor ELSE")),
        }
    }

    Ok(())
}

/// Which operand slot an expression occupies in its parent, for the
/// equal-precedence parenthesization decision.
#[derive(Clone, Copy, PartialEq)]
enum Side {
    Only,
    Left,
    Right,
}

fn emit_expr(
    tree: &AstTree,
    expr: NodeId,
    parent_prec: i32,
    side: Side,
    out: &mut String,
) -> Result<(), CompileError> {
    let prec = expr_prec(tree, expr);

    // `^` is the one right-associative operator: there the *left* child
    // of equal precedence needs parentheses instead of the right one.
    let parent_is_pow = parent_prec == 70;
    let need_parens = prec < parent_prec
        || (prec == parent_prec
            && ((side == Side::Right && !parent_is_pow)
                || (side == Side::Left && parent_is_pow)));

    if need_parens {
        out.push('(');
    }

    match tree.kind(expr) {
        NodeKind::Ident { name } => {
            out.push_str(tree.name(*name));
        }

        NodeKind::NumLit(lit) => emit_num_lit(*lit, out),

        NodeKind::StrLit { text, .. } => {
            emit_str_lit(text, out);
        }

        NodeKind::Call { .. } => emit_call(tree, expr, out)?,

        NodeKind::BuiltinUnary(builtin) => {
            let Some(operand) = tree.child(expr, 0) else {
                return Err(corrupt(tree, expr, "BUILTIN_UNARY has no argument"));
            };
            let _ = write!(out, "{}(", builtin.keyword());
            emit_expr(tree, operand, 0, Side::Only, out)?;
            out.push(')');
        }

        NodeKind::Unary(op) => {
            let Some(operand) = tree.child(expr, 0) else {
                return Err(corrupt(tree, expr, "UNARY has no operand"));
            };
            out.push_str(op.text());

            let operand_parens = matches!(tree.kind(operand), NodeKind::Binary(_))
                || expr_prec(tree, operand) < 80;
            if operand_parens {
                out.push('(');
            }
            emit_expr(tree, operand, 80, Side::Only, out)?;
            if operand_parens {
                out.push(')');
            }
        }

        NodeKind::Binary(op) => {
            let (Some(lhs), Some(rhs)) = (tree.child(expr, 0), tree.child(expr, 1)) else {
                return Err(corrupt(tree, expr, "BINARY must have two operands"));
            };

            emit_expr(tree, lhs, prec, Side::Left, out)?;
            let _ = write!(out, " {} ", op.text());
            emit_expr(tree, rhs, prec, Side::Right, out)?;
        }

        _ => return Err(corrupt(tree, expr, "Unexpected node kind in expression")),
    }

    if need_parens {
        out.push(')');
    }
    Ok(())
}

/// Prints a numeric literal. The grammar has no negative-literal token —
/// a negative value only exists pre-fold as unary minus over a positive
/// literal — so a folded negative prints as `-` followed by its
/// magnitude, and re-lexes back to that unary form.
fn emit_num_lit(lit: Literal, out: &mut String) {
    match lit {
        Literal::Int(v) => {
            if v < 0 {
                let _ = write!(out, "-{}", v.unsigned_abs());
            } else {
                let _ = write!(out, "{v}");
            }
        }
        Literal::Float(v) => {
            if v.is_sign_negative() {
                out.push('-');
            }
            let magnitude = v.abs();
            // keep a decimal point so the literal re-lexes as a float
            if magnitude.fract() == 0.0 && magnitude.is_finite() {
                let _ = write!(out, "{magnitude:.1}");
            } else {
                let _ = write!(out, "{magnitude}");
            }
        }
    }
}

fn emit_call(tree: &AstTree, call: NodeId, out: &mut String) -> Result<(), CompileError> {
    let NodeKind::Call { name } = *tree.kind(call) else {
        return Err(corrupt(tree, call, "Expected CALL"));
    };

    let _ = write!(out, "{}(", tree.name(name));

    if let Some(args) = tree.child(call, 0) {
        let mut first = true;
        for arg in tree.children(args) {
            if !first {
                out.push_str(", ");
            }
            first = false;
            emit_expr(tree, arg, 0, Side::Only, out)?;
        }
    }

    out.push(')');
    Ok(())
}

/// Re-escapes a string literal body. The stored text is the raw lexeme,
/// so backslash sequences in it are already valid escapes and pass
/// through verbatim; only raw control bytes need re-encoding.
fn emit_str_lit(text: &str, out: &mut String) {
    out.push('"');
    for c in text.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            _ => out.push(c),
        }
    }
    out.push('"');
}
