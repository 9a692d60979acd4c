#![warn(clippy::pedantic)]
//! Stack-machine code generation.
//!
//! Lowers an [`rotlang_ast::AstTree`] to the textual assembly consumed by
//! the VM: a 16-register machine with linear RAM, explicit stack
//! operations and a C-style calling convention.
//!
//! ## Register conventions
//!
//! | Register | Role |
//! |---|---|
//! | `x0` / `fx0` | integer / float return value |
//! | `x13` | scratch address register for `PUSHM`/`POPM` |
//! | `x14` | stack pointer (indexes RAM) |
//! | `x15` | frame (base) pointer |
//! | `fx1` | float scratch for operand promotion |
//!
//! ## Frame layout
//!
//! `RAM[BP + 0]` holds the caller's saved BP, `RAM[BP + 1 ..= BP + p]` the
//! `p` incoming parameters, and the slots after that the locals in
//! declaration order. The frame size is `1 + params + locals`, known
//! before a function's first instruction is emitted.
//!
//! Expression lowering is operand-typed: a binary operator goes float as
//! soon as either operand is float, with `ITOF` inserted right after the
//! int operand (spilling through `fx1` when the left operand needs
//! promotion after the right one is already on the stack). Coercion
//! contexts — variable stores, argument passing, returns and the float
//! print — additionally pull integer arithmetic up to float.

mod emitter;

pub use emitter::emit_asm;
