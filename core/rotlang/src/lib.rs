#![warn(clippy::pedantic)]
//! Core orchestration crate for the rotlang compiler pipeline.
//!
//! The toolchain is a set of batch stages communicating through on-disk
//! artifacts:
//!
//! ```text
//! .rot source → [frontend] → .east → [middleend] → .east → [backend] → .asm
//!                                  ↘ [reverse frontend] → .rot
//! ```
//!
//! Each stage is exposed here as a standalone function so drivers (and
//! tests) can compose exactly the pipeline they need:
//!
//! - [`parse`] — lex and parse source text into an [`AstTree`];
//! - [`write_east`] / [`read_east`] — serialize and reload the tree in
//!   the `.east` S-expression interchange format;
//! - [`optimize`] — algebraic simplification and constant folding;
//! - [`emit_asm`] — lower the tree to stack-machine assembly text;
//! - [`unparse`] — regenerate source text from the tree.
//!
//! ## Quick start
//!
//! ```
//! fn compile(source: &str) -> Result<String, rotlang::CompileError> {
//!     let mut tree = rotlang::parse(source)?;
//!     rotlang::optimize(&mut tree);
//!     rotlang::emit_asm(&tree)
//! }
//!
//! let asm = compile("npc main() yap micdrop 40 + 2; yapity").unwrap();
//! assert!(asm.contains("CALL :fn_main"));
//! ```
//!
//! ## Error handling
//!
//! Every fallible stage returns `Result<_, CompileError>`; the first
//! error detected within a stage aborts it. The error carries a message
//! and a source position; CLI drivers add the offending line and a caret.

pub use rotlang_ast::{AstTree, CompileError};
pub use rotlang_lexer::{NameTable, Token, tokenize};

/// Lexes and parses source text into an AST, resolving all names.
///
/// # Examples
///
/// ```
/// let tree = rotlang::parse("npc main() yap micdrop 0; yapity")?;
/// assert!(tree.root.is_some());
/// # Ok::<(), rotlang::CompileError>(())
/// ```
///
/// # Errors
///
/// Returns the first lexical, grammatical or name-resolution error.
pub fn parse(source: &str) -> Result<AstTree, CompileError> {
    let (tokens, names) = rotlang_lexer::tokenize(source)?;
    rotlang_parser::parse(&tokens, names)
}

/// Serializes a tree into the `.east` S-expression text.
#[must_use]
pub fn write_east(tree: &AstTree) -> String {
    rotlang_ast::sexpr::write_sexpr(tree)
}

/// Reads a tree back from `.east` text.
///
/// Structurally the inverse of [`write_east`]: kinds, payloads and child
/// ordering round-trip; source positions are regenerated from the reader
/// offset and string literal content is not carried (only its length).
///
/// # Errors
///
/// Returns a positioned error for malformed input, including trailing
/// garbage after the root form.
pub fn read_east(text: &str) -> Result<AstTree, CompileError> {
    rotlang_ast::sexpr::read_sexpr(text)
}

/// Runs the algebraic simplification / constant folding pass in place.
/// Returns `true` when the tree changed.
pub fn optimize(tree: &mut AstTree) -> bool {
    rotlang_middleend::optimize(tree)
}

/// Lowers the tree to stack-machine assembly text.
///
/// # Errors
///
/// Fails when the program has no `main`, calls an unknown non-builtin
/// function, or the tree has a shape the parser cannot produce.
pub fn emit_asm(tree: &AstTree) -> Result<String, CompileError> {
    rotlang_backend::emit_asm(tree)
}

/// Regenerates source text from the tree.
///
/// # Errors
///
/// Fails on tree shapes outside the statement/expression grammar.
pub fn unparse(tree: &AstTree) -> Result<String, CompileError> {
    rotlang_unparse::unparse(tree)
}

#[cfg(test)]
mod tests {
    #[test]
    fn pipeline_composes_through_east() {
        let tree = super::parse("npc main() yap micdrop 40 + 2; yapity").unwrap();
        let east = super::write_east(&tree);
        let mut reread = super::read_east(&east).unwrap();
        assert!(tree.structural_eq(&reread));

        super::optimize(&mut reread);
        let asm = super::emit_asm(&reread).unwrap();
        assert!(asm.contains("PUSH 42"));
    }

    #[test]
    fn unparse_round_trips_through_parse() {
        let tree = super::parse(
            "npc f(npc x) yap micdrop x * 2; yapity npc main() yap micdrop f(21); yapity",
        )
        .unwrap();
        let source = super::unparse(&tree).unwrap();
        let back = super::parse(&source).unwrap();
        assert!(tree.structural_eq(&back));
    }
}
