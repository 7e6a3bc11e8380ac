//! Checker-level type errors.
//!
//! Unification failures carry raw handles; here they are rendered
//! against the pool into owned messages and paired with the source
//! span the constraint came from.

use brio_ast::Span;
use brio_diagnostic::{Diagnostic, ErrorCode};
use thiserror::Error;

use crate::pool::{Pool, TypeFormatter};
use crate::unify::UnifyError;

/// Why a piece of code failed to check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeErrorKind {
    #[error("type mismatch: expected `{expected}`, found `{found}`")]
    Mismatch { expected: String, found: String },
    #[error("recursive type: `{ty}` would contain itself")]
    RecursiveType { ty: String },
    #[error("types are too complex to compare; add an annotation to simplify")]
    UnificationTooComplex,
    #[error("type is too complex to analyze here")]
    NormalizationTooComplex,
    #[error("unknown variable `{name}`")]
    UnknownName { name: String },
    #[error("cannot call a value of type `{ty}`")]
    NotCallable { ty: String },
    #[error("type `{ty}` has no property `{prop}`")]
    MissingProperty { ty: String, prop: String },
    #[error("expected {expected} {noun}, got {found}")]
    CountMismatch { expected: usize, found: usize, noun: &'static str },
    #[error("unknown type annotation `{name}`")]
    UnknownAnnotation { name: String },
    #[error("property `{prop}` of `{ty}` is read-only")]
    ReadOnlyProperty { ty: String, prop: String },
    #[error("{message}")]
    Semantic { message: String },
    #[error("internal checker error: {message}")]
    Internal { message: String },
}

impl TypeErrorKind {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Mismatch { .. } => ErrorCode::E2001,
            Self::RecursiveType { .. } => ErrorCode::E2002,
            Self::UnificationTooComplex => ErrorCode::E2003,
            Self::NormalizationTooComplex => ErrorCode::E2004,
            Self::UnknownName { .. } => ErrorCode::E2005,
            Self::NotCallable { .. } => ErrorCode::E2006,
            Self::MissingProperty { .. } => ErrorCode::E2007,
            Self::CountMismatch { .. } => ErrorCode::E2008,
            Self::UnknownAnnotation { .. } => ErrorCode::E2009,
            Self::ReadOnlyProperty { .. } => ErrorCode::E2010,
            Self::Semantic { .. } => ErrorCode::E2011,
            Self::Internal { .. } => ErrorCode::E9001,
        }
    }
}

/// A type error at a source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeError {
    pub kind: TypeErrorKind,
    pub span: Span,
}

impl TypeError {
    pub fn new(kind: TypeErrorKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Render a unification failure against the pool.
    pub fn from_unify(err: UnifyError, span: Span, pool: &Pool) -> Self {
        let mut fmt = TypeFormatter::new(pool);
        let kind = match err {
            UnifyError::Mismatch { found, expected } => TypeErrorKind::Mismatch {
                expected: fmt.format(expected),
                found: fmt.format(found),
            },
            UnifyError::PackMismatch { found, expected } => TypeErrorKind::Mismatch {
                expected: fmt.format_pack(expected),
                found: fmt.format_pack(found),
            },
            UnifyError::CountMismatch { found, expected, kind } => TypeErrorKind::CountMismatch {
                expected,
                found,
                noun: kind.noun(),
            },
            UnifyError::Occurs { ty, .. } => {
                TypeErrorKind::RecursiveType { ty: fmt.format(ty) }
            }
            UnifyError::OccursPack { pack, .. } => {
                TypeErrorKind::RecursiveType { ty: fmt.format_pack(pack) }
            }
            UnifyError::MissingProperty { table, prop } => TypeErrorKind::MissingProperty {
                ty: fmt.format(table),
                prop: pool.interner().resolve_or_unknown(prop).to_owned(),
            },
            UnifyError::ReadOnlyProperty { table, prop } => TypeErrorKind::ReadOnlyProperty {
                ty: fmt.format(table),
                prop: pool.interner().resolve_or_unknown(prop).to_owned(),
            },
            UnifyError::TooComplex => TypeErrorKind::UnificationTooComplex,
        };
        Self { kind, span }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.kind.code(), self.span, self.kind.to_string())
    }
}
