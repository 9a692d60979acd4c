//! Assembly emission.

use std::fmt::Write as _;

use rotlang_ast::{AstTree, Builtin, CompileError, Literal, NameId, NodeId, NodeKind, SemType,
    TokenKind, TokenPos};
use rustc_hash::FxHashMap;

const REG_RET_I: u8 = 0; // x0
const REG_TMPA: u8 = 13; // x13, address scratch for PUSHM/POPM
const REG_SP: u8 = 14; // x14
const REG_BP: u8 = 15; // x15
const REG_RET_F: u8 = 0; // fx0
const REG_TMP_F: u8 = 1; // fx1, float scratch for pair promotion

const SCREEN_WIDTH: i64 = 128;

/// Lowers a parsed (and optionally optimized) tree to assembly text.
///
/// # Errors
///
/// Fails on a missing `main`, duplicate function names, calls to unknown
/// non-builtin functions, identifiers without a frame slot, and any tree
/// shape the statement/expression grammar cannot produce.
pub fn emit_asm(tree: &AstTree) -> Result<String, CompileError> {
    let Some(root) = tree.root else {
        return Err(CompileError::corrupt(TokenPos::default(), "AST root is missing"));
    };
    if !matches!(tree.kind(root), NodeKind::Program) {
        return Err(CompileError::corrupt(tree.node(root).pos, "Root is not PROGRAM"));
    }

    let mut emitter = Emitter::new(tree);
    emitter.collect_funcs(root)?;

    let has_main = tree
        .names()
        .lookup("main")
        .is_some_and(|id| emitter.func_index.contains_key(&id));
    if !has_main {
        return Err(CompileError::syntax(
            TokenPos::new(1, 1, 0),
            "No function 'main' found",
        ));
    }

    emitter.emit_program(root)?;
    Ok(emitter.out)
}

/// Per-function metadata gathered before any code is emitted, so calls can
/// coerce arguments and type call results no matter the definition order.
/// Keyed by name id through `Emitter::func_index`.
struct FuncMeta {
    label: String,
    ret: SemType,
    param_types: Vec<SemType>,
    local_count: usize,
}

/// A frame slot binding, tagged with the scope depth that introduced it
/// so block exit can drop exactly its own bindings.
struct Binding {
    name: NameId,
    ty: SemType,
    offset: usize,
    depth: usize,
}

struct Emitter<'t> {
    tree: &'t AstTree,
    out: String,

    funcs: Vec<FuncMeta>,
    func_index: FxHashMap<NameId, usize>,

    binds: Vec<Binding>,
    loops: Vec<String>,

    scope_depth: usize,
    label_counter: usize,

    cur_fn: Option<usize>,
    next_local_offset: usize,
    fn_end_label: String,
}

type EmitResult<T = ()> = Result<T, CompileError>;

impl<'t> Emitter<'t> {
    fn new(tree: &'t AstTree) -> Self {
        Self {
            tree,
            out: String::new(),
            funcs: Vec::new(),
            func_index: FxHashMap::default(),
            binds: Vec::new(),
            loops: Vec::new(),
            scope_depth: 0,
            label_counter: 0,
            cur_fn: None,
            next_local_offset: 0,
            fn_end_label: String::new(),
        }
    }

    fn line(&mut self, text: &str) {
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn linef(&mut self, args: std::fmt::Arguments<'_>) {
        let _ = self.out.write_fmt(args);
        self.out.push('\n');
    }

    fn new_label(&mut self, prefix: &str) -> String {
        let n = self.label_counter;
        self.label_counter += 1;
        format!(":L_{prefix}_{n}")
    }

    fn fail(&self, at: NodeId, message: impl Into<String>) -> CompileError {
        CompileError::syntax(self.tree.node(at).pos, message)
    }

    fn name(&self, id: NameId) -> &str {
        self.tree.name(id)
    }

    // -- bindings -----------------------------------------------------

    fn bind_lookup(&self, name: NameId) -> Option<&Binding> {
        self.binds.iter().rev().find(|b| b.name == name)
    }

    fn bind_push(&mut self, name: NameId, ty: SemType, offset: usize) {
        let depth = self.scope_depth;
        self.binds.push(Binding {
            name,
            ty,
            offset,
            depth,
        });
    }

    fn bind_pop_depth(&mut self, depth: usize) {
        while self.binds.last().is_some_and(|b| b.depth == depth) {
            self.binds.pop();
        }
    }

    // -- addressing ---------------------------------------------------

    /// `x13 = BP + offset`
    fn emit_addr_bp_off(&mut self, offset: usize) {
        self.linef(format_args!("PUSHR x{REG_BP}"));
        self.linef(format_args!("POPR x{REG_TMPA}"));
        self.linef(format_args!("PUSHR x{REG_TMPA}"));
        self.linef(format_args!("PUSH {offset}"));
        self.line("ADD");
        self.linef(format_args!("POPR x{REG_TMPA}"));
    }

    fn emit_load_bp_off(&mut self, offset: usize) {
        self.emit_addr_bp_off(offset);
        self.linef(format_args!("PUSHM x{REG_TMPA}"));
    }

    fn emit_store_bp_off(&mut self, offset: usize) {
        self.emit_addr_bp_off(offset);
        self.linef(format_args!("POPM x{REG_TMPA}"));
    }

    /// `x13 = SP + imm`
    fn emit_addr_sp_plus(&mut self, imm: usize) {
        self.linef(format_args!("PUSHR x{REG_SP}"));
        self.linef(format_args!("POPR x{REG_TMPA}"));
        if imm != 0 {
            self.linef(format_args!("PUSHR x{REG_TMPA}"));
            self.linef(format_args!("PUSH {imm}"));
            self.line("ADD");
            self.linef(format_args!("POPR x{REG_TMPA}"));
        }
    }

    // -- function metadata --------------------------------------------

    fn count_locals(&self, id: NodeId) -> usize {
        let mut count = usize::from(matches!(self.tree.kind(id), NodeKind::VarDecl { .. }));
        for child in self.tree.children(id) {
            count += self.count_locals(child);
        }
        count
    }

    fn find_func(&self, name: NameId) -> Option<&FuncMeta> {
        self.func_index.get(&name).map(|&i| &self.funcs[i])
    }

    fn collect_funcs(&mut self, program: NodeId) -> EmitResult {
        for func in self.tree.children(program) {
            let NodeKind::Func { name, ret } = *self.tree.kind(func) else {
                return Err(self.fail(func, "PROGRAM child is not FUNC"));
            };

            if self.func_index.contains_key(&name) {
                return Err(self.fail(
                    func,
                    format!("Duplicate function '{}'", self.name(name)),
                ));
            }

            let Some(params) = self
                .tree
                .child(func, 0)
                .filter(|&p| matches!(self.tree.kind(p), NodeKind::ParamList))
            else {
                return Err(self.fail(func, "FUNC missing PARAM_LIST"));
            };

            let mut param_types = Vec::new();
            for param in self.tree.children(params) {
                let NodeKind::Param { ty, .. } = *self.tree.kind(param) else {
                    return Err(self.fail(param, "PARAM_LIST child is not PARAM"));
                };
                param_types.push(ty);
            }

            let local_count = self
                .tree
                .child(func, 1)
                .map_or(0, |body| self.count_locals(body));

            let label = format!(":fn_{}", self.name(name));
            self.func_index.insert(name, self.funcs.len());
            self.funcs.push(FuncMeta {
                label,
                ret,
                param_types,
                local_count,
            });
        }
        Ok(())
    }

    // -- program / function -------------------------------------------

    fn emit_program(&mut self, program: NodeId) -> EmitResult {
        self.line("; --- program entry ---");
        self.line("PUSH 0");
        self.linef(format_args!("POPR x{REG_SP}"));
        self.line("PUSH 0");
        self.linef(format_args!("POPR x{REG_BP}"));

        let main_id = self
            .tree
            .names()
            .lookup("main")
            .expect("main checked before emission");
        let main_label = self
            .find_func(main_id)
            .expect("main checked before emission")
            .label
            .clone();
        self.linef(format_args!("CALL {main_label}"));
        self.line("HLT");
        self.line("");

        for func in self.tree.children(program) {
            self.emit_func(func)?;
            self.line("");
        }

        Ok(())
    }

    fn emit_func(&mut self, func: NodeId) -> EmitResult {
        let NodeKind::Func { name, ret } = *self.tree.kind(func) else {
            return Err(self.fail(func, "Expected FUNC"));
        };
        let meta_index = *self
            .func_index
            .get(&name)
            .ok_or_else(|| self.fail(func, "No metadata for function"))?;

        self.cur_fn = Some(meta_index);
        self.fn_end_label = self.new_label("fn_end");

        self.binds.clear();
        self.scope_depth = 1;

        let params = self.tree.child(func, 0);
        let body = self.tree.child(func, 1);

        let param_count = self.funcs[meta_index].param_types.len();
        self.next_local_offset = 1 + param_count;

        if let Some(params) = params {
            let param_info: Vec<(NameId, SemType)> = self
                .tree
                .children(params)
                .filter_map(|p| match *self.tree.kind(p) {
                    NodeKind::Param { name, ty } => Some((name, ty)),
                    _ => None,
                })
                .collect();
            for (i, (pname, pty)) in param_info.into_iter().enumerate() {
                self.bind_push(pname, pty, 1 + i);
            }
        }

        let fn_name = self.name(name).to_string();
        let label = self.funcs[meta_index].label.clone();
        self.linef(format_args!("; --- function {fn_name} ---"));
        self.line(&label);

        // prologue: RAM[SP] = old BP; BP = SP; SP += frame
        self.linef(format_args!("PUSHR x{REG_BP}"));
        self.linef(format_args!("PUSHR x{REG_SP}"));
        self.linef(format_args!("POPR x{REG_TMPA}"));
        self.linef(format_args!("POPM x{REG_TMPA}"));

        self.linef(format_args!("PUSHR x{REG_SP}"));
        self.linef(format_args!("POPR x{REG_BP}"));

        let frame = 1 + param_count + self.funcs[meta_index].local_count;
        self.linef(format_args!("PUSHR x{REG_SP}"));
        self.linef(format_args!("PUSH {frame}"));
        self.line("ADD");
        self.linef(format_args!("POPR x{REG_SP}"));

        let Some(body) = body else {
            return Err(self.fail(func, "Function has no body"));
        };
        self.emit_stmt(body)?;

        if ret != SemType::Void {
            self.line("; implicit return 0");
            self.line("PUSH 0");
            self.linef(format_args!("POPR x{REG_RET_I}"));
        }

        let end_label = self.fn_end_label.clone();
        self.line(&end_label);

        // epilogue: SP = BP; BP = RAM[BP]; RET
        self.linef(format_args!("PUSHR x{REG_BP}"));
        self.linef(format_args!("POPR x{REG_SP}"));

        self.linef(format_args!("PUSHR x{REG_BP}"));
        self.linef(format_args!("POPR x{REG_TMPA}"));
        self.linef(format_args!("PUSHM x{REG_TMPA}"));
        self.linef(format_args!("POPR x{REG_BP}"));

        self.line("RET");

        Ok(())
    }

    // -- statements ---------------------------------------------------

    fn emit_stmt(&mut self, stmt: NodeId) -> EmitResult {
        match self.tree.kind(stmt) {
            NodeKind::Block => self.emit_block(stmt),
            NodeKind::While => self.emit_while(stmt),
            NodeKind::If => self.emit_if_chain(stmt),
            NodeKind::VarDecl { .. } => self.emit_vdecl(stmt),
            NodeKind::Assign { .. } => self.emit_assign(stmt),
            NodeKind::Return => self.emit_return(stmt),
            NodeKind::Break => self.emit_break(stmt),
            NodeKind::ExprStmt => self.emit_expr_stmt(stmt),
            NodeKind::CallStmt => self.emit_call_stmt(stmt),
            NodeKind::Cout | NodeKind::Icout | NodeKind::Fcout => self.emit_print(stmt),
            other => Err(self.fail(
                stmt,
                format!("Backend: unsupported statement kind {}", other.tag()),
            )),
        }
    }

    fn emit_block(&mut self, block: NodeId) -> EmitResult {
        self.scope_depth += 1;
        let depth = self.scope_depth;

        let children: Vec<NodeId> = self.tree.children(block).collect();
        for child in children {
            self.emit_stmt(child)?;
        }

        self.bind_pop_depth(depth);
        self.scope_depth -= 1;
        Ok(())
    }

    fn emit_while(&mut self, node: NodeId) -> EmitResult {
        let (Some(cond), Some(body)) = (self.tree.child(node, 0), self.tree.child(node, 1)) else {
            return Err(self.fail(node, "WHILE must have (cond, body)"));
        };

        let l_begin = self.new_label("while_begin");
        let l_end = self.new_label("while_end");

        self.loops.push(l_end.clone());

        self.line(&l_begin);
        let result = self
            .emit_cond_jfalse(cond, &l_end)
            .and_then(|()| self.emit_stmt(body));

        if result.is_ok() {
            self.linef(format_args!("JMP {l_begin}"));
            self.line(&l_end);
        }

        self.loops.pop();
        result
    }

    fn emit_break(&mut self, node: NodeId) -> EmitResult {
        let Some(end) = self.loops.last().cloned() else {
            return Err(self.fail(node, "gg used outside of a loop"));
        };
        self.linef(format_args!("JMP {end}"));
        Ok(())
    }

    fn emit_if_chain(&mut self, node: NodeId) -> EmitResult {
        let (Some(cond), Some(then_stmt)) =
            (self.tree.child(node, 0), self.tree.child(node, 1))
        else {
            return Err(self.fail(node, "IF missing children"));
        };

        let l_end = self.new_label("if_end");

        let mut cur_cond = cond;
        let mut cur_then = then_stmt;
        let mut cur_tail = self.tree.node(then_stmt).next_sibling;

        loop {
            let l_next = self.new_label("if_next");

            self.emit_cond_jfalse(cur_cond, &l_next)?;
            self.emit_stmt(cur_then)?;

            self.linef(format_args!("JMP {l_end}"));
            self.line(&l_next);

            let Some(tail) = cur_tail else { break };

            match self.tree.kind(tail) {
                NodeKind::Else => {
                    let Some(else_body) = self.tree.child(tail, 0) else {
                        return Err(self.fail(tail, "ELSE missing body"));
                    };
                    self.emit_stmt(else_body)?;
                    break;
                }
                NodeKind::Branch => {
                    let (Some(bc), Some(bs)) =
                        (self.tree.child(tail, 0), self.tree.child(tail, 1))
                    else {
                        return Err(self.fail(tail, "BRANCH missing (cond, stmt)"));
                    };
                    cur_cond = bc;
                    cur_then = bs;
                    cur_tail = self.tree.node(bs).next_sibling;
                }
                _ => return Err(self.fail(tail, "IF tail is not BRANCH/ELSE")),
            }
        }

        self.line(&l_end);
        Ok(())
    }

    fn emit_return(&mut self, node: NodeId) -> EmitResult {
        let ret = self.cur_fn.map_or(SemType::Unknown, |i| self.funcs[i].ret);
        let end_label = self.fn_end_label.clone();

        if ret == SemType::Void {
            // optional expression is ignored
            self.linef(format_args!("JMP {end_label}"));
            return Ok(());
        }

        if let Some(expr) = self.tree.child(node, 0) {
            let et = self.emit_expr(expr, Some(ret))?;

            if ret == SemType::Float {
                if et != SemType::Float {
                    self.line("ITOF");
                }
                self.linef(format_args!("FPOPR fx{REG_RET_F}"));
            } else {
                if et == SemType::Float {
                    self.line("FTOI");
                }
                self.linef(format_args!("POPR x{REG_RET_I}"));
            }
        } else {
            self.line("PUSH 0");
            self.linef(format_args!("POPR x{REG_RET_I}"));
        }

        self.linef(format_args!("JMP {end_label}"));
        Ok(())
    }

    fn emit_vdecl(&mut self, node: NodeId) -> EmitResult {
        let NodeKind::VarDecl { name, ty } = *self.tree.kind(node) else {
            return Err(self.fail(node, "Expected VAR_DECL"));
        };

        let offset = self.next_local_offset;
        self.next_local_offset += 1;
        self.bind_push(name, ty, offset);

        if let Some(init) = self.tree.child(node, 0) {
            let it = self.emit_expr(init, Some(ty))?;

            if ty == SemType::Float && it != SemType::Float {
                self.line("ITOF");
            }
            if ty != SemType::Float && it == SemType::Float {
                self.line("FTOI");
            }
        } else {
            self.line("PUSH 0");
        }

        self.emit_store_bp_off(offset);
        Ok(())
    }

    fn emit_assign(&mut self, node: NodeId) -> EmitResult {
        let NodeKind::Assign { name } = *self.tree.kind(node) else {
            return Err(self.fail(node, "Expected ASSIGN"));
        };
        let Some(rhs) = self.tree.child(node, 0) else {
            return Err(self.fail(node, "Assignment missing RHS"));
        };

        let Some(bind) = self.bind_lookup(name) else {
            return Err(self.fail(
                node,
                format!("Assignment to unknown '{}'", self.name(name)),
            ));
        };
        let (ty, offset) = (bind.ty, bind.offset);

        let rt = self.emit_expr(rhs, Some(ty))?;

        if ty == SemType::Float && rt != SemType::Float {
            self.line("ITOF");
        }
        if ty != SemType::Float && rt == SemType::Float {
            self.line("FTOI");
        }

        self.emit_store_bp_off(offset);
        Ok(())
    }

    fn emit_call_stmt(&mut self, node: NodeId) -> EmitResult {
        let Some(call) = self
            .tree
            .child(node, 0)
            .filter(|&c| matches!(self.tree.kind(c), NodeKind::Call { .. }))
        else {
            return Err(self.fail(node, "call-stmt missing call node"));
        };

        let ty = self.emit_expr(call, None)?;
        if ty != SemType::Void {
            self.line("POP");
        }
        Ok(())
    }

    fn emit_expr_stmt(&mut self, node: NodeId) -> EmitResult {
        let Some(expr) = self.tree.child(node, 0) else {
            return Err(self.fail(node, "expr-stmt missing expression"));
        };

        let ty = self.emit_expr(expr, None)?;
        if ty != SemType::Void {
            self.line("POP");
        }
        Ok(())
    }

    fn emit_print(&mut self, node: NodeId) -> EmitResult {
        let Some(expr) = self.tree.child(node, 0) else {
            return Err(self.fail(node, "print missing expression"));
        };

        let float = matches!(self.tree.kind(node), NodeKind::Fcout);
        let want = if float { Some(SemType::Float) } else { None };
        let ty = self.emit_expr(expr, want)?;

        if float {
            if ty != SemType::Float {
                self.line("ITOF");
            }
            self.line("FTOPOUT");
        } else {
            if ty == SemType::Float {
                self.line("FTOI");
            }
            self.line("TOPOUT");
        }
        self.line("POP");
        Ok(())
    }

    // -- conditions ---------------------------------------------------

    fn is_bool_op(op: TokenKind) -> bool {
        matches!(
            op,
            TokenKind::Eq
                | TokenKind::Neq
                | TokenKind::Lt
                | TokenKind::Gt
                | TokenKind::Lte
                | TokenKind::Gte
        )
    }

    /// Promotes an already-emitted operand pair to float. The right
    /// operand sits on top and converts directly; the left one spills
    /// through `fx1`.
    fn promote_pair_to_float(&mut self, at: &mut SemType, bt: &mut SemType) {
        if *bt != SemType::Float {
            self.line("ITOF");
            *bt = SemType::Float;
        }
        if *at != SemType::Float {
            self.linef(format_args!("FPOPR fx{REG_TMP_F}"));
            self.line("ITOF");
            self.linef(format_args!("FPUSHR fx{REG_TMP_F}"));
            *at = SemType::Float;
        }
    }

    /// Compiles a condition as jump-if-false to `l_false`. Comparison
    /// operators jump directly off the flags instead of materializing a
    /// 0/1 value; anything else is compared against zero.
    fn emit_cond_jfalse(&mut self, cond: NodeId, l_false: &str) -> EmitResult {
        if let NodeKind::Binary(op) = *self.tree.kind(cond) {
            if Self::is_bool_op(op) {
                let (Some(a), Some(b)) =
                    (self.tree.child(cond, 0), self.tree.child(cond, 1))
                else {
                    return Err(self.fail(cond, "Bad condition: missing operands"));
                };

                let mut at = self.emit_expr(a, None)?;
                let mut bt = self.emit_expr(b, None)?;

                if at == SemType::Float || bt == SemType::Float {
                    self.promote_pair_to_float(&mut at, &mut bt);
                    self.line("FCMP");

                    // FCMP leaves -1/0/1; test it against the sentinel
                    // that would make the comparison false
                    match op {
                        TokenKind::Eq => {
                            self.line("PUSH 0");
                            self.linef(format_args!("JNE {l_false}"));
                        }
                        TokenKind::Neq => {
                            self.line("PUSH 0");
                            self.linef(format_args!("JE {l_false}"));
                        }
                        TokenKind::Lt => {
                            self.line("PUSH -1");
                            self.linef(format_args!("JNE {l_false}"));
                        }
                        TokenKind::Lte => {
                            self.line("PUSH 1");
                            self.linef(format_args!("JE {l_false}"));
                        }
                        TokenKind::Gt => {
                            self.line("PUSH 1");
                            self.linef(format_args!("JNE {l_false}"));
                        }
                        TokenKind::Gte => {
                            self.line("PUSH -1");
                            self.linef(format_args!("JE {l_false}"));
                        }
                        _ => return Err(self.fail(cond, "Unsupported float compare op")),
                    }
                    return Ok(());
                }

                let jfalse = match op {
                    TokenKind::Eq => "JNE",
                    TokenKind::Neq => "JE",
                    TokenKind::Lt => "JAE",
                    TokenKind::Lte => "JA",
                    TokenKind::Gt => "JBE",
                    TokenKind::Gte => "JB",
                    _ => return Err(self.fail(cond, "Unsupported int compare op")),
                };
                self.linef(format_args!("{jfalse} {l_false}"));
                return Ok(());
            }
        }

        let ct = self.emit_expr(cond, None)?;

        if ct == SemType::Float {
            self.line("PUSH 0");
            self.line("ITOF");
            self.line("FCMP");
            self.line("PUSH 0");
            self.linef(format_args!("JE {l_false}"));
        } else {
            self.line("PUSH 0");
            self.linef(format_args!("JE {l_false}"));
        }

        Ok(())
    }

    /// Materializes an integer comparison result as 0/1 via a jump
    /// trampoline; both operands are already on the stack.
    fn emit_cmp_to_bool(&mut self, node: NodeId, op: TokenKind) -> EmitResult {
        let jmp = match op {
            TokenKind::Eq => "JE",
            TokenKind::Neq => "JNE",
            TokenKind::Lt => "JB",
            TokenKind::Lte => "JBE",
            TokenKind::Gt => "JA",
            TokenKind::Gte => "JAE",
            _ => return Err(self.fail(node, "Unsupported compare operator")),
        };

        let l_true = self.new_label("cmp_true");
        let l_end = self.new_label("cmp_end");

        self.linef(format_args!("{jmp} {l_true}"));
        self.line("PUSH 0");
        self.linef(format_args!("JMP {l_end}"));
        self.line(&l_true);
        self.line("PUSH 1");
        self.line(&l_end);
        Ok(())
    }

    /// Same as [`Self::emit_cmp_to_bool`] but for the -1/0/1 result
    /// `FCMP` leaves on the stack.
    fn emit_fcmp_to_bool(&mut self, node: NodeId, op: TokenKind) -> EmitResult {
        let (jmp, k) = match op {
            TokenKind::Eq => ("JE", 0),
            TokenKind::Neq => ("JNE", 0),
            TokenKind::Lt => ("JE", -1),
            TokenKind::Lte => ("JNE", 1),
            TokenKind::Gt => ("JE", 1),
            TokenKind::Gte => ("JNE", -1),
            _ => return Err(self.fail(node, "Unsupported float-compare operator")),
        };

        let l_true = self.new_label("fcmp_true");
        let l_end = self.new_label("fcmp_end");

        self.linef(format_args!("PUSH {k}"));
        self.linef(format_args!("{jmp} {l_true}"));
        self.line("PUSH 0");
        self.linef(format_args!("JMP {l_end}"));
        self.line(&l_true);
        self.line("PUSH 1");
        self.line(&l_end);
        Ok(())
    }

    // -- type inference -----------------------------------------------

    fn infer_expr_type(&self, expr: NodeId) -> SemType {
        let node = self.tree.node(expr);
        if node.ty != SemType::Unknown {
            return node.ty;
        }

        match &node.kind {
            NodeKind::NumLit(lit) => {
                if lit.is_float() {
                    SemType::Float
                } else {
                    SemType::Int
                }
            }

            NodeKind::Ident { name } => self
                .bind_lookup(*name)
                .map_or(SemType::Unknown, |b| b.ty),

            NodeKind::Call { name } => match self.name(*name) {
                "in" | "cap" | "cin" | "stinky" => SemType::Int,
                "fin" | "nocap" => SemType::Float,
                _ => self.find_func(*name).map_or(SemType::Unknown, |f| f.ret),
            },

            NodeKind::BuiltinUnary(_) => SemType::Float,

            NodeKind::Unary(op) => {
                if *op == TokenKind::Not {
                    SemType::Int
                } else {
                    self.tree
                        .child(expr, 0)
                        .map_or(SemType::Unknown, |c| self.infer_expr_type(c))
                }
            }

            NodeKind::Binary(op) => {
                if Self::is_bool_op(*op) || matches!(op, TokenKind::And | TokenKind::Or) {
                    return SemType::Int;
                }

                let lt = self
                    .tree
                    .child(expr, 0)
                    .map_or(SemType::Unknown, |c| self.infer_expr_type(c));
                let rt = self
                    .tree
                    .child(expr, 1)
                    .map_or(SemType::Unknown, |c| self.infer_expr_type(c));

                if *op == TokenKind::Pow {
                    return if lt == SemType::Int && rt == SemType::Int {
                        SemType::Int
                    } else {
                        SemType::Float
                    };
                }

                if lt == SemType::Float || rt == SemType::Float {
                    SemType::Float
                } else if lt == SemType::Unknown || rt == SemType::Unknown {
                    SemType::Unknown
                } else {
                    SemType::Int
                }
            }

            _ => SemType::Unknown,
        }
    }

    // -- intrinsics ---------------------------------------------------

    fn arg_at(&self, args: NodeId, idx: usize) -> Option<NodeId> {
        self.tree.child(args, idx)
    }

    /// Emits an intrinsic call if `call` names one; `Ok(None)` means the
    /// name is not an intrinsic and the caller should treat it as a user
    /// function.
    fn emit_builtin_call(&mut self, call: NodeId) -> EmitResult<Option<SemType>> {
        let NodeKind::Call { name } = *self.tree.kind(call) else {
            return Ok(None);
        };
        let name_text = self.name(name).to_string();
        let args = self.tree.child(call, 0);
        let argc = args.map_or(0, |a| self.tree.children_count(a));

        // zero-argument reads and framebuffer controls
        let zero_arg: Option<(&str, SemType)> = match name_text.as_str() {
            "in" | "cap" => Some(("IN", SemType::Int)),
            "fin" | "nocap" => Some(("FIN", SemType::Float)),
            "cin" | "stinky" => Some(("CIN", SemType::Int)),
            "draw" | "gyat" => Some(("DRAW", SemType::Void)),
            "clean_vm" | "skibidi" => Some(("CLEANVM", SemType::Void)),
            _ => None,
        };
        if let Some((instr, ret)) = zero_arg {
            if argc != 0 {
                return Err(self.fail(call, format!("{name_text}() takes 0 args")));
            }
            self.line(instr);
            return Ok(Some(ret));
        }

        // one-argument prints
        if matches!(
            name_text.as_str(),
            "out" | "fout" | "cout" | "pookie" | "rizz" | "menace"
        ) {
            if argc != 1 {
                return Err(self.fail(call, format!("{name_text}() takes 1 arg")));
            }
            let arg = self.arg_at(args.expect("argc checked"), 0).expect("argc checked");

            let is_fout = matches!(name_text.as_str(), "fout" | "rizz");
            let is_cout = matches!(name_text.as_str(), "cout" | "menace");

            let want = if is_fout { Some(SemType::Float) } else { None };
            let at = self.emit_expr(arg, want)?;

            if is_fout {
                if at != SemType::Float {
                    self.line("ITOF");
                }
                self.line("FTOPOUT");
                return Ok(Some(SemType::Float));
            }

            if at == SemType::Float {
                self.line("FTOI");
            }
            self.line(if is_cout { "CTOPOUT" } else { "TOPOUT" });
            return Ok(Some(SemType::Int));
        }

        if name_text == "set_pixel" {
            if argc != 3 {
                return Err(self.fail(call, "set_pixel(x,y,ch) takes 3 args"));
            }
            let args = args.expect("argc checked");
            let (x, y, ch) = (
                self.arg_at(args, 0).expect("argc checked"),
                self.arg_at(args, 1).expect("argc checked"),
                self.arg_at(args, 2).expect("argc checked"),
            );

            // addr = y * W + x into x13
            let ty = self.emit_expr(y, None)?;
            if ty == SemType::Float {
                self.line("FTOI");
            }
            self.linef(format_args!("PUSH {SCREEN_WIDTH}"));
            self.line("MUL");

            let tx = self.emit_expr(x, None)?;
            if tx == SemType::Float {
                self.line("FTOI");
            }
            self.line("ADD");
            self.linef(format_args!("POPR x{REG_TMPA}"));

            let tc = self.emit_expr(ch, None)?;
            if tc == SemType::Float {
                self.line("FTOI");
            }
            self.linef(format_args!("POPVM x{REG_TMPA}"));

            return Ok(Some(SemType::Void));
        }

        Ok(None)
    }

    // -- expressions --------------------------------------------------

    /// Emits `expr`, leaving its value on the stack, and returns the
    /// value's type. `want` is the coercion context: a `Float` context
    /// upgrades integer arithmetic to float lowering so the conversion
    /// happens per operand rather than on the final result.
    fn emit_expr(&mut self, expr: NodeId, want: Option<SemType>) -> EmitResult<SemType> {
        match self.tree.kind(expr).clone() {
            NodeKind::NumLit(Literal::Int(v)) => {
                self.linef(format_args!("PUSH {v}"));
                Ok(SemType::Int)
            }
            NodeKind::NumLit(Literal::Float(v)) => {
                self.linef(format_args!("PUSH {v:.6}"));
                Ok(SemType::Float)
            }

            NodeKind::Ident { name } => {
                let Some(bind) = self.bind_lookup(name) else {
                    return Err(self.fail(
                        expr,
                        format!("Unknown identifier '{}'", self.name(name)),
                    ));
                };
                let (ty, offset) = (bind.ty, bind.offset);
                self.emit_load_bp_off(offset);
                Ok(ty)
            }

            NodeKind::Call { name } => {
                if let Some(ret) = self.emit_builtin_call(expr)? {
                    return Ok(ret);
                }
                self.emit_user_call(expr, name)
            }

            NodeKind::Unary(op) => self.emit_unary(expr, op),

            NodeKind::BuiltinUnary(builtin) => self.emit_builtin_unary(expr, builtin),

            NodeKind::Binary(op) => self.emit_binary(expr, op, want),

            other => Err(self.fail(
                expr,
                format!("Backend: unsupported expr kind {}", other.tag()),
            )),
        }
    }

    fn emit_user_call(&mut self, call: NodeId, name: NameId) -> EmitResult<SemType> {
        let Some(meta_index) = self.func_index.get(&name).copied() else {
            return Err(self.fail(
                call,
                format!("Call to unknown function '{}'", self.name(name)),
            ));
        };

        let Some(args) = self
            .tree
            .child(call, 0)
            .filter(|&a| matches!(self.tree.kind(a), NodeKind::ArgList))
        else {
            return Err(self.fail(call, "CALL missing ARG_LIST"));
        };

        // arguments land in the callee frame at RAM[SP + i]
        let arg_nodes: Vec<NodeId> = self.tree.children(args).collect();
        for (i, arg) in arg_nodes.into_iter().enumerate() {
            let slot = i + 1;
            let param_ty = self.funcs[meta_index].param_types.get(i).copied();

            let at = self.emit_expr(arg, param_ty)?;

            if let Some(pt) = param_ty {
                if pt == SemType::Float && at != SemType::Float {
                    self.line("ITOF");
                }
                if pt != SemType::Float && at == SemType::Float {
                    self.line("FTOI");
                }
            }

            self.emit_addr_sp_plus(slot);
            self.linef(format_args!("POPM x{REG_TMPA}"));
        }

        let meta = &self.funcs[meta_index];
        let (label, ret) = (meta.label.clone(), meta.ret);
        self.linef(format_args!("CALL {label}"));

        match ret {
            SemType::Float => self.linef(format_args!("FPUSHR fx{REG_RET_F}")),
            SemType::Int => self.linef(format_args!("PUSHR x{REG_RET_I}")),
            _ => {}
        }

        Ok(ret)
    }

    fn emit_unary(&mut self, expr: NodeId, op: TokenKind) -> EmitResult<SemType> {
        let Some(operand) = self.tree.child(expr, 0) else {
            return Err(self.fail(expr, "Unary missing operand"));
        };

        let st = self.emit_expr(operand, None)?;

        match op {
            TokenKind::Plus => Ok(st),

            TokenKind::Minus => {
                // -x  =>  0 - x
                self.linef(format_args!("POPR x{REG_TMPA}"));
                self.line("PUSH 0");
                if st == SemType::Float {
                    self.line("ITOF");
                }
                self.linef(format_args!("PUSHR x{REG_TMPA}"));
                self.line(if st == SemType::Float { "FSUB" } else { "SUB" });
                Ok(st)
            }

            TokenKind::Not => {
                // (x == 0) ? 1 : 0
                if st == SemType::Float {
                    self.line("FTOI");
                }
                self.line("PUSH 0");

                let l_true = self.new_label("not_true");
                let l_end = self.new_label("not_end");

                self.linef(format_args!("JE {l_true}"));
                self.line("PUSH 0");
                self.linef(format_args!("JMP {l_end}"));
                self.line(&l_true);
                self.line("PUSH 1");
                self.line(&l_end);

                Ok(SemType::Int)
            }

            _ => Err(self.fail(expr, "Unsupported unary operator")),
        }
    }

    fn emit_builtin_unary(&mut self, expr: NodeId, builtin: Builtin) -> EmitResult<SemType> {
        let Some(operand) = self.tree.child(expr, 0) else {
            return Err(self.fail(expr, "builtin-unary missing operand"));
        };

        let st = self.emit_expr(operand, None)?;

        match builtin {
            Builtin::Floor | Builtin::Ceil | Builtin::Round => {
                if st != SemType::Float {
                    self.line("ITOF");
                }
                self.line(match builtin {
                    Builtin::Floor => "FLOOR",
                    Builtin::Ceil => "CEIL",
                    _ => "ROUND",
                });
                Ok(SemType::Float)
            }
            Builtin::Itof => {
                if st != SemType::Float {
                    self.line("ITOF");
                }
                Ok(SemType::Float)
            }
            Builtin::Ftoi => {
                if st == SemType::Float {
                    self.line("FTOI");
                }
                Ok(SemType::Int)
            }
        }
    }

    fn emit_binary(
        &mut self,
        expr: NodeId,
        op: TokenKind,
        want: Option<SemType>,
    ) -> EmitResult<SemType> {
        let (Some(a), Some(b)) = (self.tree.child(expr, 0), self.tree.child(expr, 1)) else {
            return Err(self.fail(expr, "Binary missing operands"));
        };

        // both sides always evaluate; && and || combine bitwise
        if matches!(op, TokenKind::And | TokenKind::Or) {
            let at = self.emit_expr(a, None)?;
            if at == SemType::Float {
                self.line("FTOI");
            }

            let bt = self.emit_expr(b, None)?;
            if bt == SemType::Float {
                self.line("FTOI");
            }

            self.line(if op == TokenKind::And { "AND" } else { "OR" });
            return Ok(SemType::Int);
        }

        if Self::is_bool_op(op) {
            let mut at = self.emit_expr(a, None)?;
            let mut bt = self.emit_expr(b, None)?;

            if at == SemType::Float || bt == SemType::Float {
                self.promote_pair_to_float(&mut at, &mut bt);
                self.line("FCMP");
                self.emit_fcmp_to_bool(expr, op)?;
            } else {
                self.emit_cmp_to_bool(expr, op)?;
            }

            return Ok(SemType::Int);
        }

        if op == TokenKind::Pow {
            let at = self.emit_expr(a, None)?;
            let bt = self.emit_expr(b, None)?;

            let instr = match (at, bt) {
                (SemType::Int, SemType::Int) => "POW",
                (SemType::Float, SemType::Int) => "FPOW",
                (SemType::Int, SemType::Float) => "POWF",
                (SemType::Float, SemType::Float) => "FPOWF",
                _ => {
                    return Err(
                        self.fail(expr, "Unsupported types for ^ (need int/float operands)")
                    );
                }
            };
            self.line(instr);

            return Ok(if at == SemType::Int && bt == SemType::Int {
                SemType::Int
            } else {
                SemType::Float
            });
        }

        // arithmetic: decide int/float lowering up front from operand
        // types plus the coercion context
        let ta = self.infer_expr_type(a);
        let tb = self.infer_expr_type(b);
        let want_float =
            want == Some(SemType::Float) || ta == SemType::Float || tb == SemType::Float;

        let at = self.emit_expr(a, None)?;
        if want_float {
            if at != SemType::Float {
                self.line("ITOF");
            }
        } else if at == SemType::Float {
            self.line("FTOI");
        }

        let bt = self.emit_expr(b, None)?;
        if want_float {
            if bt != SemType::Float {
                self.line("ITOF");
            }
        } else if bt == SemType::Float {
            self.line("FTOI");
        }

        let instr = match op {
            TokenKind::Plus => {
                if want_float {
                    "FADD"
                } else {
                    "ADD"
                }
            }
            TokenKind::Minus => {
                if want_float {
                    "FSUB"
                } else {
                    "SUB"
                }
            }
            TokenKind::Mul => {
                if want_float {
                    "FMUL"
                } else {
                    "MUL"
                }
            }
            TokenKind::Div => {
                if want_float {
                    "FDIV"
                } else {
                    "DIV"
                }
            }
            _ => return Err(self.fail(expr, "Unsupported binary operator")),
        };
        self.line(instr);

        Ok(if want_float {
            SemType::Float
        } else {
            SemType::Int
        })
    }
}
