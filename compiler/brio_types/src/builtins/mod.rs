//! Built-in globals and their call shapes.
//!
//! A handful of builtins cannot be described by an ordinary function
//! type: `pcall` prepends a boolean to the callee's returns, `assert`
//! passes its arguments through narrowed, `select` switches on its
//! first argument. [`apply`] computes the return pack of a direct call
//! to one of these from the argument types at the call site. Each also
//! carries an ordinary fallback type (see [`register_globals`]) for
//! when it is passed around as a value.


use std::sync::Arc;

use brio_ast::{Name, Span};
use smallvec::smallvec;

use crate::config::Config;
use crate::id::{PackId, TypeId};
use crate::instantiate::instantiate;
use crate::level::Level;
use crate::node::{TableState, TypeList, TypeNode};
use crate::pool::Pool;
use crate::refine::{refine, Predicate};
use crate::scope::{ScopeId, Scopes};
use crate::type_error::{TypeError, TypeErrorKind};
use crate::unify::{CountKind, Unifier};

/// Builtins whose calls need bespoke return shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    PCall,
    XPCall,
    Assert,
    TypeOf,
    Select,
    SetMetatable,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pcall" => Some(Self::PCall),
            "xpcall" => Some(Self::XPCall),
            "assert" => Some(Self::Assert),
            "type" => Some(Self::TypeOf),
            "select" => Some(Self::Select),
            "setmetatable" => Some(Self::SetMetatable),
            _ => None,
        }
    }
}

/// One argument at a builtin call site.
#[derive(Debug, Clone, Copy)]
pub struct CallArg {
    pub ty: TypeId,
    pub span: Span,
    /// Set when the argument is a string literal; `select` dispatches
    /// on it.
    pub string_literal: Option<Name>,
}

/// Populate the root scope with the default global environment.
pub fn register_globals(pool: &mut Pool, scopes: &mut Scopes) {
    let interner = Arc::clone(pool.interner());
    // `(...any) -> ...any`, the type of an arbitrary function value.
    let any_fn = pool.function(PackId::ANY, PackId::ANY);

    let string_ret = pool.pack(smallvec![TypeId::STRING]);
    let any1 = pool.pack(smallvec![TypeId::ANY]);
    let opt_number = pool.optional(TypeId::NUMBER);
    let never_rets = pool.variadic(TypeId::NEVER);

    let bind = |scopes: &mut Scopes, name: &str, ty: TypeId| {
        scopes.declare(ScopeId::ROOT, interner.intern(name), ty, Span::DUMMY);
    };

    let print_ty = pool.function(PackId::ANY, PackId::EMPTY);
    bind(scopes, "print", print_ty);

    let type_ty = pool.function(any1, string_ret);
    bind(scopes, "type", type_ty);

    let tostring_ty = pool.function(any1, string_ret);
    bind(scopes, "tostring", tostring_ty);

    let tonumber_rets = pool.pack(smallvec![opt_number]);
    let tonumber_ty = pool.function(any1, tonumber_rets);
    bind(scopes, "tonumber", tonumber_ty);

    let error_ty = pool.function(any1, never_rets);
    bind(scopes, "error", error_ty);

    // Fallback shapes; direct calls go through `apply` instead.
    let bool_then_any = pool.pack_with_tail(smallvec![TypeId::BOOLEAN], PackId::ANY);
    let pcall_params = pool.pack_with_tail(smallvec![any_fn], PackId::ANY);
    let pcall_ty = pool.function(pcall_params, bool_then_any);
    bind(scopes, "pcall", pcall_ty);

    let xpcall_params = pool.pack_with_tail(smallvec![any_fn, any_fn], PackId::ANY);
    let xpcall_ty = pool.function(xpcall_params, bool_then_any);
    bind(scopes, "xpcall", xpcall_ty);

    let assert_params = pool.pack_with_tail(smallvec![TypeId::ANY], PackId::ANY);
    let assert_ty = pool.function(assert_params, PackId::ANY);
    bind(scopes, "assert", assert_ty);

    let select_params = pool.pack_with_tail(smallvec![TypeId::ANY], PackId::ANY);
    let select_ty = pool.function(select_params, PackId::ANY);
    bind(scopes, "select", select_ty);

    let table_args = pool.pack(smallvec![TypeId::ANY, TypeId::ANY]);
    let setmetatable_ty = pool.function(table_args, any1);
    bind(scopes, "setmetatable", setmetatable_ty);

    let getmetatable_ty = pool.function(any1, any1);
    bind(scopes, "getmetatable", getmetatable_ty);
}

/// Compute the return pack of a direct call to `builtin`.
pub fn apply(
    pool: &mut Pool,
    config: &Config,
    level: Level,
    builtin: Builtin,
    args: &[CallArg],
    span: Span,
    errors: &mut Vec<TypeError>,
) -> PackId {
    match builtin {
        Builtin::TypeOf => {
            if require_args(args, 1, span, errors).is_none() {
                return PackId::ERROR;
            }
            pool.pack(smallvec![TypeId::STRING])
        }
        Builtin::Assert => {
            let Some(first) = require_args(args, 1, span, errors) else {
                return PackId::ERROR;
            };
            // The asserted value survives the call truthy.
            let narrowed = refine(pool, config, level, first.ty, Predicate::Truthy, true);
            let mut head: TypeList = smallvec![narrowed];
            head.extend(args[1..].iter().map(|a| a.ty));
            pool.pack(head)
        }
        Builtin::PCall => {
            let Some(first) = require_args(args, 1, span, errors) else {
                return PackId::ERROR;
            };
            let rets = protected_call(pool, config, level, *first, &args[1..], errors);
            pool.pack_with_tail(smallvec![TypeId::BOOLEAN], rets)
        }
        Builtin::XPCall => {
            if require_args(args, 2, span, errors).is_none() {
                return PackId::ERROR;
            }
            let handler = args[1];
            check_callable(pool, handler, errors);
            // The protected function's own returns follow the status
            // boolean; the handler only runs on the error path and
            // contributes nothing to the success shape.
            let rets = protected_call(pool, config, level, args[0], &args[2..], errors);
            pool.pack_with_tail(smallvec![TypeId::BOOLEAN], rets)
        }
        Builtin::Select => {
            let Some(first) = require_args(args, 1, span, errors) else {
                return PackId::ERROR;
            };
            if let Some(lit) = first.string_literal {
                if pool.interner().resolve_or_unknown(lit) == "#" {
                    return pool.pack(smallvec![TypeId::NUMBER]);
                }
                errors.push(TypeError::new(
                    TypeErrorKind::Semantic {
                        message: "select expects a number or the string \"#\"".to_owned(),
                    },
                    first.span,
                ));
                return PackId::ERROR;
            }
            let mut unifier = Unifier::new(pool, config, level);
            if let Err(err) = unifier.unify(first.ty, TypeId::NUMBER) {
                errors.push(TypeError::from_unify(err, first.span, pool));
                return PackId::ERROR;
            }
            // The numeric index is not tracked, so the result is any
            // suffix of the remaining arguments.
            let suffix = pool.union(args[1..].iter().map(|a| a.ty));
            pool.variadic(suffix)
        }
        Builtin::SetMetatable => {
            if require_args(args, 2, span, errors).is_none() {
                return PackId::ERROR;
            }
            let target = pool.resolve(args[0].ty);
            let mt = pool.resolve(args[1].ty);
            if !is_table_like(pool, mt) {
                errors.push(TypeError::new(
                    TypeErrorKind::Semantic {
                        message: "setmetatable requires a table as its second argument".to_owned(),
                    },
                    args[1].span,
                ));
                return PackId::ERROR;
            }
            // A still-free metatable is pinned to an open table here,
            // so a later rebinding to a non-table reports a mismatch
            // at that site.
            let mt_free_level = match pool.get(mt) {
                TypeNode::Free { level } => Some(*level),
                _ => None,
            };
            let mt = if let Some(free_level) = mt_free_level {
                let table = pool.table(TableState::Free, free_level);
                pool.bind(mt, table);
                table
            } else {
                mt
            };
            match pool.get(target) {
                // A still-unknown value is constrained to a fresh open
                // table carrying the metatable.
                TypeNode::Free { .. } => {
                    let fresh = pool.table(TableState::Free, level);
                    pool.set_metatable(fresh, mt);
                    pool.bind(target, fresh);
                    pool.pack(smallvec![fresh])
                }
                TypeNode::Table(_) => {
                    pool.set_metatable(target, mt);
                    pool.pack(smallvec![target])
                }
                TypeNode::Prim(p)
                    if matches!(p, crate::node::Prim::Any | crate::node::Prim::Error) =>
                {
                    pool.pack(smallvec![target])
                }
                _ => {
                    errors.push(TypeError::new(
                        TypeErrorKind::Semantic {
                            message: "setmetatable requires a table as its first argument"
                                .to_owned(),
                        },
                        args[0].span,
                    ));
                    PackId::ERROR
                }
            }
        }
    }
}

/// Type-check calling `func` with `call_args` under a protected call,
/// returning the callee's return pack.
fn protected_call(
    pool: &mut Pool,
    config: &Config,
    level: Level,
    func: CallArg,
    call_args: &[CallArg],
    errors: &mut Vec<TypeError>,
) -> PackId {
    let func_ty = instantiate(pool, func.ty, level);
    let func_ty = pool.resolve(func_ty);
    match pool.get(func_ty).clone() {
        TypeNode::Function(ft) => {
            let head: TypeList = call_args.iter().map(|a| a.ty).collect();
            let args_pack = pool.pack(head);
            let mut unifier = Unifier::new(pool, config, level);
            if let Err(err) = unifier.unify_packs(args_pack, ft.params, CountKind::Arguments) {
                errors.push(TypeError::from_unify(err, func.span, pool));
            }
            ft.rets
        }
        TypeNode::Free { .. } => {
            // Constrain the unknown to a function of the given args.
            let head: TypeList = call_args.iter().map(|a| a.ty).collect();
            let tail = pool.fresh_free_pack(level);
            let params = pool.pack_with_tail(head, tail);
            let rets = pool.fresh_free_pack(level);
            let wanted = pool.function(params, rets);
            let mut unifier = Unifier::new(pool, config, level);
            if let Err(err) = unifier.unify(func_ty, wanted) {
                errors.push(TypeError::from_unify(err, func.span, pool));
                return PackId::ERROR;
            }
            rets
        }
        TypeNode::Prim(crate::node::Prim::Any) => PackId::ANY,
        TypeNode::Prim(crate::node::Prim::Error) => PackId::ERROR,
        _ => {
            let rendered = crate::pool::TypeFormatter::new(pool).format(func_ty);
            errors.push(TypeError::new(
                TypeErrorKind::NotCallable { ty: rendered },
                func.span,
            ));
            PackId::ERROR
        }
    }
}

fn check_callable(pool: &mut Pool, arg: CallArg, errors: &mut Vec<TypeError>) {
    let ty = pool.resolve(arg.ty);
    match pool.get(ty) {
        TypeNode::Function(_) | TypeNode::Free { .. } | TypeNode::Intersection(_) => {}
        TypeNode::Prim(crate::node::Prim::Any | crate::node::Prim::Error) => {}
        _ => {
            let rendered = crate::pool::TypeFormatter::new(pool).format(ty);
            errors.push(TypeError::new(TypeErrorKind::NotCallable { ty: rendered }, arg.span));
        }
    }
}

fn is_table_like(pool: &Pool, ty: TypeId) -> bool {
    matches!(
        pool.get(ty),
        TypeNode::Table(_)
            | TypeNode::Free { .. }
            | TypeNode::Prim(crate::node::Prim::Any | crate::node::Prim::Error)
    )
}

fn require_args<'a>(
    args: &'a [CallArg],
    at_least: usize,
    span: Span,
    errors: &mut Vec<TypeError>,
) -> Option<&'a CallArg> {
    if args.len() < at_least {
        errors.push(TypeError::new(
            TypeErrorKind::CountMismatch {
                expected: at_least,
                found: args.len(),
                noun: "arguments",
            },
            span,
        ));
        None
    } else {
        Some(&args[0])
    }
}
