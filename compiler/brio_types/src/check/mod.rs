//! The checker: walks a module and infers types for everything.
//!
//! Checking is fail-open. Every error produces the error sentinel for
//! the offending expression and the walk continues, so one mistake
//! yields one diagnostic instead of a cascade. Blocks are walked in
//! two phases: `local function` names are bound to fresh variables up
//! front so mutually recursive functions can see each other.

mod annotation;
mod expr;

#[cfg(test)]
mod tests;

use brio_ast::{ExprId, LValue, Module, Name, SharedInterner, Span, Stat};
use brio_diagnostic::{Diagnostic, DiagnosticSink};
use rustc_hash::FxHashMap;
use smallvec::smallvec;
use tracing::debug;

use crate::builtins;
use crate::config::Config;
use crate::generalize::generalize;
use crate::id::{PackId, TypeId};
use crate::level::Level;
use crate::node::{PackNode, TableState, TypeList, TypeNode};
use crate::pool::{Pool, TypeFormatter};
use crate::scope::{ScopeId, Scopes};
use crate::type_error::{TypeError, TypeErrorKind};
use crate::unify::{CountKind, Unifier};

/// Everything a consumer needs after checking one module.
pub struct CheckResult {
    pub diagnostics: Vec<Diagnostic>,
    pub error_count: usize,
    /// The inferred type of every expression checked in single-value
    /// position, for hover and completion queries.
    pub expr_types: FxHashMap<ExprId, TypeId>,
    /// The arena the recorded types live in. Render them with
    /// [`TypeFormatter`].
    pub pool: Pool,
}

/// Type-check a module against the default global environment.
pub fn check_module(module: &Module, interner: SharedInterner, config: Config) -> CheckResult {
    let mut checker = Checker::new(module, interner, config);
    checker.run();
    checker.finish()
}

/// An in-progress checking session over one module.
///
/// [`check_module`] drives a whole module through one of these;
/// tooling that wants types for a single expression or statement can
/// hold a session open and call [`Checker::check_expr`],
/// [`Checker::check_statement`] and [`Checker::resolve_annotation`]
/// piecemeal before collecting the result with [`Checker::finish`].
pub struct Checker<'m> {
    pub(crate) module: &'m Module,
    pub(crate) pool: Pool,
    pub(crate) scopes: Scopes,
    pub(crate) config: Config,
    pub(crate) errors: Vec<TypeError>,
    pub(crate) interner: SharedInterner,
    pub(crate) expr_types: FxHashMap<ExprId, TypeId>,
}

impl<'m> Checker<'m> {
    /// Open a session against the default global environment.
    pub fn new(module: &'m Module, interner: SharedInterner, config: Config) -> Self {
        let mut pool = Pool::new(SharedInterner::clone(&interner));
        let mut scopes = Scopes::new();
        builtins::register_globals(&mut pool, &mut scopes);
        // The module body may `return`; it behaves like a vararg
        // function body at the root level.
        let module_returns = pool.fresh_free_pack(Level::ROOT);
        scopes.set_return_pack(ScopeId::ROOT, module_returns);
        scopes.set_vararg(ScopeId::ROOT, PackId::ANY);
        Self {
            module,
            pool,
            scopes,
            config,
            errors: Vec::new(),
            interner,
            expr_types: FxHashMap::default(),
        }
    }

    /// Check the whole module body in the root scope.
    pub fn run(&mut self) {
        let module = self.module;
        debug!(statements = module.body.len(), "checking module body");
        self.check_block(ScopeId::ROOT, &module.body);
        debug!(errors = self.errors.len(), "module body checked");
    }

    /// Infer the type of one expression in the given scope.
    pub fn check_expr(&mut self, scope: ScopeId, expr: ExprId) -> TypeId {
        self.infer_expr(scope, expr)
    }

    /// Check one statement in the given scope.
    pub fn check_statement(&mut self, scope: ScopeId, stat: &'m Stat) {
        self.check_stat(scope, stat);
    }

    /// Collect diagnostics and recorded types, consuming the session.
    pub fn finish(mut self) -> CheckResult {
        // Broken pool invariants are logged where they happen and the
        // walk continues on the error sentinel. Failing closed turns
        // them into diagnostics as well.
        if !self.config.fail_open_internal_errors {
            for message in self.pool.take_invariant_breaks() {
                self.errors.push(TypeError::new(TypeErrorKind::Internal { message }, Span::DUMMY));
            }
        }
        let mut sink = DiagnosticSink::with_limit(self.config.error_limit);
        for error in &self.errors {
            sink.push(error.to_diagnostic());
        }
        let error_count = sink.error_count();
        CheckResult {
            diagnostics: sink.into_diagnostics(),
            error_count,
            expr_types: self.expr_types,
            pool: self.pool,
        }
    }

    pub(crate) fn level(&self, scope: ScopeId) -> Level {
        self.scopes.level(scope)
    }

    pub(crate) fn error(&mut self, kind: TypeErrorKind, span: Span) {
        self.errors.push(TypeError::new(kind, span));
    }

    /// Unify and report; returns whether unification succeeded.
    pub(crate) fn unify_at(&mut self, found: TypeId, expected: TypeId, span: Span) -> bool {
        let mut unifier = Unifier::new(&mut self.pool, &self.config, Level::ROOT);
        match unifier.unify(found, expected) {
            Ok(()) => true,
            Err(err) => {
                self.errors.push(TypeError::from_unify(err, span, &self.pool));
                false
            }
        }
    }

    pub(crate) fn unify_packs_at(
        &mut self,
        found: PackId,
        expected: PackId,
        kind: CountKind,
        span: Span,
    ) -> bool {
        let mut unifier = Unifier::new(&mut self.pool, &self.config, Level::ROOT);
        match unifier.unify_packs(found, expected, kind) {
            Ok(()) => true,
            Err(err) => {
                self.errors.push(TypeError::from_unify(err, span, &self.pool));
                false
            }
        }
    }

    // === Blocks and statements ===

    pub(crate) fn check_block(&mut self, scope: ScopeId, body: &'m [Stat]) {
        // Phase one: bind `local function` names so mutual recursion
        // resolves.
        for stat in body {
            if let Stat::LocalFunction { name, span, .. } = stat {
                let level = self.level(scope);
                let placeholder = self.pool.fresh_free(level);
                self.scopes.declare(scope, *name, placeholder, *span);
            }
        }
        for stat in body {
            self.check_stat(scope, stat);
        }
    }

    fn check_stat(&mut self, scope: ScopeId, stat: &'m Stat) {
        match stat {
            Stat::Local { names, exprs, span } => self.check_local(scope, names, exprs, *span),
            Stat::LocalFunction { name, func, span } => {
                let fty = self.infer_expr(scope, *func);
                let body_level = self.level(scope).next();
                generalize(&mut self.pool, fty, body_level);
                if let Some(binding) = self.scopes.lookup(scope, *name) {
                    self.unify_at(fty, binding.ty, *span);
                }
                // Rebind to the function type itself so later reads
                // see the generalized signature.
                self.scopes.declare(scope, *name, fty, *span);
            }
            Stat::Assign { targets, exprs, .. } => {
                self.check_assign(scope, targets, exprs);
            }
            Stat::If { cond, then_body, else_body, .. } => {
                self.infer_expr(scope, *cond);
                let (then_refs, else_refs) = self.condition_refinements(scope, *cond);

                let then_scope = self.scopes.child(scope);
                self.apply_refinements(then_scope, &then_refs);
                self.check_block(then_scope, then_body);

                let else_scope = self.scopes.child(scope);
                self.apply_refinements(else_scope, &else_refs);
                self.check_block(else_scope, else_body);
            }
            Stat::While { cond, body, .. } => {
                self.infer_expr(scope, *cond);
                let (then_refs, _) = self.condition_refinements(scope, *cond);
                let body_scope = self.scopes.child(scope);
                self.apply_refinements(body_scope, &then_refs);
                self.check_block(body_scope, body);
            }
            Stat::Return { exprs, span } => {
                let pack = self.infer_expr_list(scope, exprs);
                if let Some(expected) = self.scopes.return_pack(scope) {
                    self.unify_packs_at(pack, expected, CountKind::Returns, *span);
                }
            }
            Stat::ExprStat { expr, .. } => {
                self.infer_call_or_expr(scope, *expr);
            }
        }
    }

    fn check_local(
        &mut self,
        scope: ScopeId,
        names: &[(Name, Option<brio_ast::TypeAnnot>)],
        exprs: &'m [brio_ast::ExprId],
        span: Span,
    ) {
        let values = self.infer_expr_list(scope, exprs);
        let level = self.level(scope);

        let mut remaining = values;
        for (name, annot) in names {
            let value = self.take_first(&mut remaining, level);
            let declared = match annot {
                Some(annot) => {
                    let expected = self.resolve_annotation(scope, annot, span);
                    self.unify_at(value, expected, span);
                    expected
                }
                None => value,
            };
            self.scopes.declare(scope, *name, declared, span);

            // `local f = function() ... end` generalizes like a local
            // function.
            if annot.is_none() && self.is_function_type(declared) {
                generalize(&mut self.pool, declared, level.next());
            }
        }
    }

    fn check_assign(
        &mut self,
        scope: ScopeId,
        targets: &[(LValue, Span)],
        exprs: &'m [brio_ast::ExprId],
    ) {
        let values = self.infer_expr_list(scope, exprs);
        let level = self.level(scope);

        let mut remaining = values;
        for (lvalue, target_span) in targets {
            let value = self.take_first(&mut remaining, level);
            match self.assign_target_type(scope, lvalue, value, *target_span) {
                Some(declared) => {
                    // The store is checked against what the target
                    // reads as at this point: a visible refinement
                    // tightens what may be assigned until the
                    // assignment itself resets it.
                    let expected = self.scopes.refined(scope, lvalue).unwrap_or(declared);
                    self.unify_at(value, expected, *target_span);
                    self.scopes.clear_refinement(scope, lvalue, declared);
                }
                None => {
                    // Error already reported; still clear stale
                    // refinements on the path.
                    self.scopes.clear_refinement(scope, lvalue, TypeId::ERROR);
                }
            }
        }
    }

    /// The declared type an assignment to `lvalue` is checked against.
    /// Adds the final property when the path lands in an extensible
    /// table that does not have it yet.
    fn assign_target_type(
        &mut self,
        scope: ScopeId,
        lvalue: &LValue,
        value: TypeId,
        span: Span,
    ) -> Option<TypeId> {
        let Some(binding) = self.scopes.lookup(scope, lvalue.base) else {
            let name = self.interner.resolve_or_unknown(lvalue.base).to_owned();
            self.error(TypeErrorKind::UnknownName { name }, span);
            return None;
        };
        if lvalue.path.is_empty() {
            return Some(binding.ty);
        }

        let mut current = binding.ty;
        let level = self.level(scope);
        for (i, &field) in lvalue.path.iter().enumerate() {
            let last = i + 1 == lvalue.path.len();
            current = self.pool.resolve(current);
            match self.pool.get(current).clone() {
                TypeNode::Table(tt) => {
                    if let Some(prop) = tt.prop(field) {
                        if last && prop.read_only {
                            let rendered = TypeFormatter::new(&self.pool).format(current);
                            let prop_name =
                                self.interner.resolve_or_unknown(field).to_owned();
                            self.error(
                                TypeErrorKind::ReadOnlyProperty { ty: rendered, prop: prop_name },
                                span,
                            );
                            return None;
                        }
                        current = prop.ty;
                    } else if last && tt.is_extensible() && tt.level <= level {
                        // Width by mutation: assigning to a missing
                        // property of a table still under construction
                        // adds it.
                        self.pool.add_prop(current, field, value, span);
                        return Some(value);
                    } else {
                        let rendered = TypeFormatter::new(&self.pool).format(current);
                        let prop_name = self.interner.resolve_or_unknown(field).to_owned();
                        self.error(
                            TypeErrorKind::MissingProperty { ty: rendered, prop: prop_name },
                            span,
                        );
                        return None;
                    }
                }
                TypeNode::Prim(crate::node::Prim::Any | crate::node::Prim::Error) => {
                    return Some(current);
                }
                TypeNode::Free { level: free_level } => {
                    // Reading through an unknown constrains it to a
                    // free table with the property.
                    let table = self.pool.table(TableState::Free, free_level);
                    let prop_ty = if last { value } else { self.pool.fresh_free(free_level) };
                    self.pool.add_prop(table, field, prop_ty, span);
                    self.pool.bind(current, table);
                    if last {
                        return Some(prop_ty);
                    }
                    current = prop_ty;
                }
                _ => {
                    let rendered = TypeFormatter::new(&self.pool).format(current);
                    let prop_name = self.interner.resolve_or_unknown(field).to_owned();
                    self.error(
                        TypeErrorKind::MissingProperty { ty: rendered, prop: prop_name },
                        span,
                    );
                    return None;
                }
            }
        }
        Some(current)
    }

    // === Pack plumbing ===

    /// Infer an expression list the way Lua-family languages expand
    /// one: every expression but the last contributes exactly one
    /// value; the last contributes its whole pack.
    pub(crate) fn infer_expr_list(
        &mut self,
        scope: ScopeId,
        exprs: &'m [brio_ast::ExprId],
    ) -> PackId {
        let Some((&last, init)) = exprs.split_last() else {
            return PackId::EMPTY;
        };
        let mut head: TypeList = TypeList::new();
        for &expr in init {
            head.push(self.infer_expr(scope, expr));
        }
        let tail = self.infer_pack(scope, last);
        self.pool.pack_with_tail(head, tail)
    }

    /// Pop the first type off a pack, leaving the remainder in place.
    /// Missing positions read as `nil`; a free pack is split into a
    /// fresh element plus a fresh remainder.
    pub(crate) fn take_first(&mut self, pack: &mut PackId, level: Level) -> TypeId {
        let resolved = self.pool.resolve_pack(*pack);
        match self.pool.get_pack(resolved).clone() {
            PackNode::List { head, tail } => {
                if head.is_empty() {
                    match tail {
                        Some(t) => {
                            *pack = t;
                            self.take_first(pack, level)
                        }
                        None => {
                            *pack = PackId::EMPTY;
                            TypeId::NIL
                        }
                    }
                } else {
                    let first = head[0];
                    let rest: TypeList = head[1..].iter().copied().collect();
                    *pack = match tail {
                        Some(t) => self.pool.pack_with_tail(rest, t),
                        None => self.pool.pack(rest),
                    };
                    first
                }
            }
            PackNode::Variadic(ty) => {
                *pack = resolved;
                ty
            }
            PackNode::Free { level: pack_level } => {
                let element = self.pool.fresh_free(pack_level.min(level));
                let rest = self.pool.fresh_free_pack(pack_level);
                let split = self.pool.pack_with_tail(smallvec![element], rest);
                self.pool.bind_pack(resolved, split);
                *pack = rest;
                element
            }
            PackNode::Generic { .. } | PackNode::Bound(_) => {
                *pack = PackId::EMPTY;
                TypeId::ERROR
            }
        }
    }

    pub(crate) fn is_function_type(&self, ty: TypeId) -> bool {
        matches!(
            self.pool.get(self.pool.resolve_readonly(ty)),
            TypeNode::Function(_)
        )
    }
}
