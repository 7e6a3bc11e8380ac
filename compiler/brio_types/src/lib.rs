//! Type inference and unification engine for Brio.
//!
//! The engine is a level-based Hindley-Milner core adapted to a
//! gradually typed scripting language: free variables live in an
//! arena [`Pool`] and are bound in place by the [`unify::Unifier`],
//! `any` and the error sentinel unify with everything, and tables get
//! width subtyping with mutation-based growth while they are still
//! under construction.
//!
//! [`check_module`] is the whole-module entry point: it walks a parsed
//! module, infers a type for every expression, and returns
//! diagnostics. [`Checker`] exposes the same walk piecemeal, one
//! expression, statement, or annotation at a time, for tooling that
//! checks incrementally. All checking is fail-open; an error produces
//! a sentinel and the walk continues.

mod builtins;
mod check;
mod config;
mod flags;
mod generalize;
mod id;
mod instantiate;
mod level;
mod node;
mod normalize;
mod pool;
mod refine;
mod scope;
mod type_error;
mod unify;

pub use builtins::Builtin;
pub use check::{check_module, CheckResult, Checker};
pub use config::Config;
pub use flags::TypeFlags;
pub use generalize::generalize;
pub use id::{PackId, TypeId};
pub use instantiate::instantiate;
pub use level::Level;
pub use node::{
    FunctionType, Indexer, PackNode, Prim, TableProp, TableState, TableType, TypeList, TypeNode,
};
pub use normalize::{normalize, NormalForm, NormalizeTooComplex};
pub use pool::{Pool, TypeFormatter};
pub use refine::{refine, Predicate, TypeTag};
pub use scope::{Binding, ScopeId, Scopes};
pub use type_error::{TypeError, TypeErrorKind};
pub use unify::{CountKind, Unifier, UnifyError, UnifyResult};
