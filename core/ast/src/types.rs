//! Semantic types.

use core::fmt;
use std::fmt::{Display, Formatter};

/// The semantic type attached to AST nodes, symbols and frame slots.
///
/// The source keywords are `npc` (int), `homie` (float), `sus` (ptr) and
/// `simp` (void, return types only). `Unknown` marks nodes whose type has
/// not been established; the backend infers expression types on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SemType {
    #[default]
    Unknown,
    Int,
    Float,
    Ptr,
    Void,
}

impl SemType {
    /// Spelling used by the `.east` payload atoms (`ret=`, `type=`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SemType::Unknown => "unknown",
            SemType::Int => "int",
            SemType::Float => "float",
            SemType::Ptr => "ptr",
            SemType::Void => "void",
        }
    }

    /// Inverse of [`SemType::as_str`]; anything unrecognized maps to
    /// `Unknown`, matching the tolerant wire behavior.
    #[must_use = "this is a pure lookup with no side effects"]
    pub fn from_text(text: &str) -> SemType {
        match text {
            "int" => SemType::Int,
            "float" => SemType::Float,
            "ptr" => SemType::Ptr,
            "void" => SemType::Void,
            _ => SemType::Unknown,
        }
    }

    /// Source keyword for the unparser.
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            SemType::Int => "npc",
            SemType::Float => "homie",
            SemType::Ptr => "sus",
            SemType::Void => "simp",
            SemType::Unknown => "<type?>",
        }
    }
}

impl Display for SemType {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_spelling_round_trips() {
        for ty in [SemType::Int, SemType::Float, SemType::Ptr, SemType::Void] {
            assert_eq!(SemType::from_text(ty.as_str()), ty);
        }
    }

    #[test]
    fn unrecognized_text_is_unknown() {
        assert_eq!(SemType::from_text("quux"), SemType::Unknown);
    }

    #[test]
    fn keywords_match_the_type_set() {
        assert_eq!(SemType::Int.keyword(), "npc");
        assert_eq!(SemType::Float.keyword(), "homie");
        assert_eq!(SemType::Ptr.keyword(), "sus");
        assert_eq!(SemType::Void.keyword(), "simp");
    }
}
