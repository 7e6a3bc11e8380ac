//! Syntax-side inputs to the Brio type checker.
//!
//! The checker does not parse source text itself; a parser hands it a
//! [`Module`] of statements over an expression arena, together with the
//! [`StringInterner`] that produced the identifiers. This crate defines
//! that boundary:
//!
//! - [`Name`]: compact interned identifier
//! - [`StringInterner`]: sharded, thread-safe interner
//! - [`Span`]: byte-offset source location
//! - [`Module`], [`Expr`], [`Stat`], [`TypeAnnot`]: the tree the checker walks

mod ast;
mod interner;
mod name;
mod span;

pub use ast::{
    BinOp, Expr, ExprArena, ExprId, FunctionBody, LValue, Module, PackAnnot, Param, Stat,
    TableItem, TypeAnnot, UnOp,
};
pub use interner::{InternError, SharedInterner, StringInterner};
pub use name::Name;
pub use span::Span;
