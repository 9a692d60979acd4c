#![warn(clippy::pedantic)]
//! Recursive-descent parser.
//!
//! Consumes the token stream from `rotlang-lexer` and produces an
//! [`AstTree`]. Parsing and name resolution happen in one pass: every
//! declaration lands in the scoped symbol table as it is seen, every use
//! is checked against it, and calls to names that are not yet known are
//! queued and re-checked against the final table once the whole program
//! has parsed (forward references between functions are legal).
//!
//! Two constructs are desugared on the way in:
//!
//! - `highkey (init; cond; step) body` becomes
//!   `yap init; lowkey (cond) { body; step } yapity` — the parser emits
//!   the equivalent `BLOCK`/`WHILE` nodes directly, with an omitted
//!   condition turning into the integer literal `1`;
//! - `alpha/omega/sigma` chains become an `IF` whose tail threads a
//!   right-associated chain of `BRANCH` nodes ending in an optional
//!   `ELSE`.

mod parser;

pub use parser::{Parser, parse};
