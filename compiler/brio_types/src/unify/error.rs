//! Unification failures.
//!
//! These carry raw handles; the checker renders them against the pool
//! when it turns them into diagnostics, so failed trial unifications
//! (union member matching) never pay for string formatting.

use brio_ast::Name;

use crate::id::{PackId, TypeId};

/// Why two types failed to unify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnifyError {
    /// The found type is not compatible with the expected one.
    Mismatch { found: TypeId, expected: TypeId },
    /// Two packs with incompatible fixed lengths.
    CountMismatch { found: usize, expected: usize, kind: CountKind },
    /// Binding the variable would create an infinite type.
    Occurs { var: TypeId, ty: TypeId },
    /// Binding the pack variable would create an infinite pack.
    OccursPack { var: PackId, pack: PackId },
    /// Two packs with incompatible shapes (generic pack against a
    /// concrete one).
    PackMismatch { found: PackId, expected: PackId },
    /// A required table property is absent.
    MissingProperty { table: TypeId, prop: Name },
    /// A property present on both sides disagrees on mutability.
    ReadOnlyProperty { table: TypeId, prop: Name },
    /// A configured work limit was exceeded.
    TooComplex,
}

/// What a pack length mismatch was counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountKind {
    Arguments,
    Returns,
    Values,
}

impl CountKind {
    pub fn noun(self) -> &'static str {
        match self {
            Self::Arguments => "arguments",
            Self::Returns => "return values",
            Self::Values => "values",
        }
    }
}
