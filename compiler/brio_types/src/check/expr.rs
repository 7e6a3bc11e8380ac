//! Expression inference.

use brio_ast::{BinOp, Expr, ExprId, FunctionBody, LValue, Span, TableItem, UnOp};
use smallvec::smallvec;

use crate::builtins::{self, Builtin, CallArg};
use crate::id::{PackId, TypeId};
use crate::instantiate::instantiate;
use crate::node::{Indexer, PackNode, Prim, TableState, TypeList, TypeNode};
use crate::pool::TypeFormatter;
use crate::refine::{refine, Predicate, TypeTag};
use crate::scope::ScopeId;
use crate::type_error::{TypeError, TypeErrorKind};
use crate::unify::{CountKind, Unifier};

use super::Checker;

/// One fact a condition establishes about an lvalue. `sense` is the
/// polarity in the then-branch; the else-branch applies the opposite.
pub(crate) struct Refinement {
    pub(crate) lvalue: LValue,
    pub(crate) predicate: Predicate,
    pub(crate) sense: bool,
}

impl<'m> Checker<'m> {
    /// Infer an expression in single-value position. Multi-value
    /// producers (calls, `...`) contribute their first value; an empty
    /// pack reads as `nil`.
    ///
    /// Every inferred type is recorded in the expression-type map so
    /// tooling can ask what an expression was without re-checking.
    pub(crate) fn infer_expr(&mut self, scope: ScopeId, id: ExprId) -> TypeId {
        let ty = self.infer_expr_inner(scope, id);
        self.expr_types.insert(id, ty);
        ty
    }

    fn infer_expr_inner(&mut self, scope: ScopeId, id: ExprId) -> TypeId {
        let span = self.module.exprs.span(id);
        match self.module.exprs.get(id) {
            Expr::Nil => TypeId::NIL,
            Expr::True | Expr::False => TypeId::BOOLEAN,
            Expr::Number(_) => TypeId::NUMBER,
            Expr::Str(_) => TypeId::STRING,
            Expr::Vararg | Expr::Call { .. } => {
                let mut pack = self.infer_pack(scope, id);
                let level = self.level(scope);
                self.take_first(&mut pack, level)
            }
            Expr::Name(name) => {
                if let Some(refined) = self.scopes.refined(scope, &LValue::name(*name)) {
                    return refined;
                }
                match self.scopes.lookup(scope, *name) {
                    Some(binding) => binding.ty,
                    None => {
                        let rendered = self.interner.resolve_or_unknown(*name).to_owned();
                        self.error(TypeErrorKind::UnknownName { name: rendered }, span);
                        TypeId::ERROR
                    }
                }
            }
            Expr::Index { object, key } => {
                if let Some(lvalue) = self.lvalue_of(id) {
                    if let Some(refined) = self.scopes.refined(scope, &lvalue) {
                        return refined;
                    }
                }
                let object_ty = self.infer_expr(scope, *object);
                self.read_prop(object_ty, *key, span)
            }
            Expr::Function(body) => self.infer_function(scope, body),
            Expr::Table(items) => self.infer_table(scope, items),
            Expr::Binary { op, lhs, rhs } => self.infer_binary(scope, *op, *lhs, *rhs, span),
            Expr::Unary { op, operand } => self.infer_unary(scope, *op, *operand, span),
            Expr::Ascription { expr, annot } => {
                let inferred = self.infer_expr(scope, *expr);
                let declared = self.resolve_annotation(scope, annot, span);
                self.unify_at(inferred, declared, span);
                declared
            }
        }
    }

    /// Infer an expression in pack position (last in an expression
    /// list). Only calls and `...` produce more than one value.
    pub(crate) fn infer_pack(&mut self, scope: ScopeId, id: ExprId) -> PackId {
        let span = self.module.exprs.span(id);
        match self.module.exprs.get(id) {
            Expr::Call { func, args } => self.infer_call_pack(scope, *func, args, span),
            Expr::Vararg => match self.scopes.vararg(scope) {
                Some(pack) => pack,
                None => {
                    self.error(
                        TypeErrorKind::Semantic {
                            message: "cannot use `...` outside a vararg function".to_owned(),
                        },
                        span,
                    );
                    PackId::ERROR
                }
            },
            _ => {
                let ty = self.infer_expr(scope, id);
                self.pool.pack(smallvec![ty])
            }
        }
    }

    /// Infer an expression evaluated for effect.
    pub(crate) fn infer_call_or_expr(&mut self, scope: ScopeId, id: ExprId) {
        match self.module.exprs.get(id) {
            Expr::Call { .. } => {
                self.infer_pack(scope, id);
            }
            _ => {
                self.infer_expr(scope, id);
            }
        }
    }

    // === Calls ===

    fn infer_call_pack(
        &mut self,
        scope: ScopeId,
        func: ExprId,
        args: &'m [ExprId],
        span: Span,
    ) -> PackId {
        if let Some(builtin) = self.builtin_callee(scope, func) {
            let call_args: Vec<CallArg> = args
                .iter()
                .map(|&arg| {
                    let ty = self.infer_expr(scope, arg);
                    let string_literal = match self.module.exprs.get(arg) {
                        Expr::Str(name) => Some(*name),
                        _ => None,
                    };
                    CallArg { ty, span: self.module.exprs.span(arg), string_literal }
                })
                .collect();
            let level = self.level(scope);
            return builtins::apply(
                &mut self.pool,
                &self.config,
                level,
                builtin,
                &call_args,
                span,
                &mut self.errors,
            );
        }

        let callee = self.infer_expr(scope, func);
        let level = self.level(scope);
        let callee = instantiate(&mut self.pool, callee, level);
        let callee = self.pool.resolve(callee);
        match self.pool.get(callee).clone() {
            TypeNode::Function(ft) => {
                let args_pack = self.infer_expr_list(scope, args);
                self.unify_packs_at(args_pack, ft.params, CountKind::Arguments, span);
                ft.rets
            }
            TypeNode::Free { level: free_level } => {
                // Calling an unknown constrains it to a function
                // taking these arguments.
                let args_pack = self.infer_expr_list(scope, args);
                let rets = self.pool.fresh_free_pack(free_level);
                let wanted = self.pool.function(args_pack, rets);
                let mut unifier = Unifier::new(&mut self.pool, &self.config, level);
                if let Err(err) = unifier.unify(callee, wanted) {
                    self.errors.push(TypeError::from_unify(err, span, &self.pool));
                    return PackId::ERROR;
                }
                rets
            }
            TypeNode::Prim(Prim::Any) => {
                self.infer_expr_list(scope, args);
                PackId::ANY
            }
            TypeNode::Prim(Prim::Error) => {
                self.infer_expr_list(scope, args);
                PackId::ERROR
            }
            _ => {
                self.infer_expr_list(scope, args);
                let rendered = TypeFormatter::new(&self.pool).format(callee);
                self.error(TypeErrorKind::NotCallable { ty: rendered }, span);
                PackId::ERROR
            }
        }
    }

    /// Detect a direct call to a magic builtin: the callee is a bare
    /// name that still resolves to the root-scope global.
    fn builtin_callee(&self, scope: ScopeId, func: ExprId) -> Option<Builtin> {
        let Expr::Name(name) = self.module.exprs.get(func) else {
            return None;
        };
        let builtin = Builtin::from_name(self.interner.resolve(*name)?)?;
        let local = self.scopes.lookup(scope, *name)?;
        let global = self.scopes.lookup(ScopeId::ROOT, *name)?;
        (local.ty == global.ty).then_some(builtin)
    }

    // === Functions and tables ===

    fn infer_function(&mut self, scope: ScopeId, body: &'m FunctionBody) -> TypeId {
        let level = self.level(scope).next();
        let rets = match &body.ret_annot {
            Some(annot) => self.resolve_pack_annotation(scope, annot, Span::DUMMY),
            None => self.pool.fresh_free_pack(level),
        };
        let fscope = self.scopes.function_child(scope, rets);

        let mut head = TypeList::new();
        for param in &body.params {
            let ty = match &param.annot {
                Some(annot) => self.resolve_annotation(fscope, annot, param.span),
                None => self.pool.fresh_free(level),
            };
            self.scopes.declare(fscope, param.name, ty, param.span);
            head.push(ty);
        }
        let params = if body.is_vararg {
            let tail = match &body.vararg_annot {
                Some(annot) => {
                    let ty = self.resolve_annotation(fscope, annot, Span::DUMMY);
                    self.pool.variadic(ty)
                }
                None => self.pool.fresh_free_pack(level),
            };
            self.scopes.set_vararg(fscope, tail);
            self.pool.pack_with_tail(head, tail)
        } else {
            self.pool.pack(head)
        };

        self.check_block(fscope, &body.body);

        // A body with no return statement leaves the return pack
        // untouched; such a function returns nothing.
        let rets_resolved = self.pool.resolve_pack(rets);
        if matches!(self.pool.get_pack(rets_resolved), PackNode::Free { .. }) {
            self.pool.bind_pack(rets_resolved, PackId::EMPTY);
        }

        self.pool.function(params, rets)
    }

    fn infer_table(&mut self, scope: ScopeId, items: &'m [TableItem]) -> TypeId {
        let level = self.level(scope);
        let table = self.pool.table(TableState::Unsealed, level);
        let mut positional: Vec<TypeId> = Vec::new();
        for item in items {
            match item {
                TableItem::Named { key, value } => {
                    let ty = self.infer_expr(scope, *value);
                    let span = self.module.exprs.span(*value);
                    self.pool.add_prop(table, *key, ty, span);
                }
                TableItem::Item(value) => {
                    positional.push(self.infer_expr(scope, *value));
                }
            }
        }
        if !positional.is_empty() {
            let value = self.pool.union(positional);
            self.pool.set_indexer(table, Indexer { key: TypeId::NUMBER, value });
        }
        table
    }

    /// Read `object.key`, constraining unknowns and consulting one
    /// level of `__index` metatable.
    fn read_prop(&mut self, object: TypeId, key: brio_ast::Name, span: Span) -> TypeId {
        let object = self.pool.resolve(object);
        match self.pool.get(object).clone() {
            TypeNode::Table(tt) => {
                if let Some(prop) = tt.prop(key) {
                    return prop.ty;
                }
                if let Some(ty) = self.metatable_index(tt.metatable, key) {
                    return ty;
                }
                if let Some(ix) = tt.indexer {
                    if self.pool.resolve(ix.key) == TypeId::STRING {
                        return ix.value;
                    }
                }
                if tt.state == TableState::Free {
                    // Reading through a free table adds the property
                    // as an unknown.
                    let fresh = self.pool.fresh_free(tt.level);
                    self.pool.add_prop(object, key, fresh, span);
                    return fresh;
                }
                self.missing_prop(object, key, span)
            }
            TypeNode::Free { level } => {
                let table = self.pool.table(TableState::Free, level);
                let fresh = self.pool.fresh_free(level);
                self.pool.add_prop(table, key, fresh, span);
                self.pool.bind(object, table);
                fresh
            }
            TypeNode::Union(members) => {
                let mut results: Vec<TypeId> = Vec::with_capacity(members.len());
                for m in members {
                    results.push(self.read_prop(m, key, span));
                }
                self.pool.union(results)
            }
            TypeNode::Intersection(members) => {
                for m in members {
                    let m = self.pool.resolve(m);
                    if let TypeNode::Table(tt) = self.pool.get(m) {
                        if let Some(prop) = tt.prop(key) {
                            return prop.ty;
                        }
                    }
                }
                self.missing_prop(object, key, span)
            }
            TypeNode::Prim(Prim::Any) => TypeId::ANY,
            TypeNode::Prim(Prim::Error) => TypeId::ERROR,
            _ => self.missing_prop(object, key, span),
        }
    }

    fn metatable_index(&mut self, metatable: Option<TypeId>, key: brio_ast::Name) -> Option<TypeId> {
        let mt = self.pool.resolve(metatable?);
        let index_name = self.interner.intern("__index");
        let TypeNode::Table(mt_table) = self.pool.get(mt) else {
            return None;
        };
        let index = self.pool.resolve_readonly(mt_table.prop(index_name)?.ty);
        let TypeNode::Table(index_table) = self.pool.get(index) else {
            return None;
        };
        Some(index_table.prop(key)?.ty)
    }

    fn missing_prop(&mut self, object: TypeId, key: brio_ast::Name, span: Span) -> TypeId {
        let rendered = TypeFormatter::new(&self.pool).format(object);
        let prop = self.interner.resolve_or_unknown(key).to_owned();
        self.error(TypeErrorKind::MissingProperty { ty: rendered, prop }, span);
        TypeId::ERROR
    }

    // === Operators ===

    fn infer_binary(
        &mut self,
        scope: ScopeId,
        op: BinOp,
        lhs: ExprId,
        rhs: ExprId,
        span: Span,
    ) -> TypeId {
        match op {
            BinOp::And => {
                self.infer_expr(scope, lhs);
                // The value of `a and b` is `b` whenever it is not a
                // short-circuited falsy `a`; the falsy side contributes
                // no useful type.
                self.infer_expr(scope, rhs)
            }
            BinOp::Or => {
                let lhs_ty = self.infer_expr(scope, lhs);
                let rhs_ty = self.infer_expr(scope, rhs);
                let level = self.level(scope);
                let truthy_lhs =
                    refine(&mut self.pool, &self.config, level, lhs_ty, Predicate::Truthy, true);
                self.pool.union([truthy_lhs, rhs_ty])
            }
            BinOp::Eq | BinOp::Ne => {
                self.infer_expr(scope, lhs);
                self.infer_expr(scope, rhs);
                TypeId::BOOLEAN
            }
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                let lhs_ty = self.infer_expr(scope, lhs);
                let rhs_ty = self.infer_expr(scope, rhs);
                // Both sides must agree, and only numbers and strings
                // order.
                self.unify_at(rhs_ty, lhs_ty, span);
                let comparable = self.pool.union([TypeId::NUMBER, TypeId::STRING]);
                self.unify_at(lhs_ty, comparable, span);
                TypeId::BOOLEAN
            }
            BinOp::Concat => {
                let lhs_ty = self.infer_expr(scope, lhs);
                let rhs_ty = self.infer_expr(scope, rhs);
                let concatable = self.pool.union([TypeId::STRING, TypeId::NUMBER]);
                self.unify_at(lhs_ty, concatable, span);
                self.unify_at(rhs_ty, concatable, span);
                TypeId::STRING
            }
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod | BinOp::Pow => {
                let lhs_ty = self.infer_expr(scope, lhs);
                let rhs_ty = self.infer_expr(scope, rhs);
                if self.config.lower_bounds_calculation {
                    // Use constrains: `a + b` pins both operands.
                    self.unify_at(lhs_ty, TypeId::NUMBER, span);
                    self.unify_at(rhs_ty, TypeId::NUMBER, span);
                } else {
                    self.check_numeric(lhs_ty, span);
                    self.check_numeric(rhs_ty, span);
                }
                TypeId::NUMBER
            }
        }
    }

    fn check_numeric(&mut self, ty: TypeId, span: Span) {
        let ty = self.pool.resolve(ty);
        match self.pool.get(ty) {
            TypeNode::Prim(Prim::Number | Prim::Any | Prim::Error) | TypeNode::Free { .. } => {}
            _ => {
                let rendered = TypeFormatter::new(&self.pool).format(ty);
                self.error(
                    TypeErrorKind::Mismatch { expected: "number".to_owned(), found: rendered },
                    span,
                );
            }
        }
    }

    fn infer_unary(&mut self, scope: ScopeId, op: UnOp, operand: ExprId, span: Span) -> TypeId {
        let ty = self.infer_expr(scope, operand);
        match op {
            UnOp::Not => TypeId::BOOLEAN,
            UnOp::Neg => {
                self.unify_at(ty, TypeId::NUMBER, span);
                TypeId::NUMBER
            }
            UnOp::Len => {
                let ty = self.pool.resolve(ty);
                match self.pool.get(ty) {
                    TypeNode::Table(_)
                    | TypeNode::Free { .. }
                    | TypeNode::Prim(Prim::String | Prim::Any | Prim::Error) => {}
                    _ => {
                        let rendered = TypeFormatter::new(&self.pool).format(ty);
                        self.error(
                            TypeErrorKind::Semantic {
                                message: format!("cannot take the length of `{rendered}`"),
                            },
                            span,
                        );
                    }
                }
                TypeId::NUMBER
            }
        }
    }

    // === Refinements ===

    /// The facts a condition establishes, as seen by the then-branch
    /// and the else-branch.
    pub(crate) fn condition_refinements(
        &mut self,
        _scope: ScopeId,
        cond: ExprId,
    ) -> (Vec<Refinement>, Vec<Refinement>) {
        let then_refs = self.collect_refinements(cond, true);
        let else_refs = self.collect_refinements(cond, false);
        (then_refs, else_refs)
    }

    fn collect_refinements(&mut self, cond: ExprId, sense: bool) -> Vec<Refinement> {
        match self.module.exprs.get(cond) {
            Expr::Name(_) | Expr::Index { .. } => match self.lvalue_of(cond) {
                Some(lvalue) => vec![Refinement { lvalue, predicate: Predicate::Truthy, sense }],
                None => Vec::new(),
            },
            Expr::Unary { op: UnOp::Not, operand } => self.collect_refinements(*operand, !sense),
            // A conjunction holds in full only when the whole test
            // passed; its negation pins down neither side.
            Expr::Binary { op: BinOp::And, lhs, rhs } if sense => {
                let mut refs = self.collect_refinements(*lhs, true);
                refs.extend(self.collect_refinements(*rhs, true));
                refs
            }
            Expr::Binary { op: BinOp::Or, lhs, rhs } if !sense => {
                let mut refs = self.collect_refinements(*lhs, false);
                refs.extend(self.collect_refinements(*rhs, false));
                refs
            }
            Expr::Binary { op: BinOp::Eq, lhs, rhs } => self.equality_refinements(*lhs, *rhs, sense),
            Expr::Binary { op: BinOp::Ne, lhs, rhs } => {
                self.equality_refinements(*lhs, *rhs, !sense)
            }
            _ => Vec::new(),
        }
    }

    fn equality_refinements(&mut self, lhs: ExprId, rhs: ExprId, sense: bool) -> Vec<Refinement> {
        // Normalize so the scrutinee is on the left.
        for (subject, other) in [(lhs, rhs), (rhs, lhs)] {
            // `x == nil`
            if matches!(self.module.exprs.get(other), Expr::Nil) {
                if let Some(lvalue) = self.lvalue_of(subject) {
                    return vec![Refinement { lvalue, predicate: Predicate::EqNil, sense }];
                }
            }
            // `type(x) == "tag"`
            if let Some(lvalue) = self.typeof_subject(subject) {
                if let Expr::Str(name) = self.module.exprs.get(other) {
                    if let Some(tag) =
                        self.interner.resolve(*name).and_then(TypeTag::parse)
                    {
                        return vec![Refinement {
                            lvalue,
                            predicate: Predicate::IsTag(tag),
                            sense,
                        }];
                    }
                }
            }
        }
        // `x == y`: on the true branch each side narrows toward the
        // overlap with the other. The condition was inferred before
        // refinements are collected, so both types are on record.
        let mut refs = Vec::new();
        if let Some(lvalue) = self.lvalue_of(lhs) {
            if let Some(&other) = self.expr_types.get(&rhs) {
                refs.push(Refinement { lvalue, predicate: Predicate::EqOther(other), sense });
            }
        }
        if let Some(lvalue) = self.lvalue_of(rhs) {
            if let Some(&other) = self.expr_types.get(&lhs) {
                refs.push(Refinement { lvalue, predicate: Predicate::EqOther(other), sense });
            }
        }
        refs
    }

    /// Matches `type(x)` where `type` still means the builtin and `x`
    /// is a refinable path.
    fn typeof_subject(&self, expr: ExprId) -> Option<LValue> {
        let Expr::Call { func, args } = self.module.exprs.get(expr) else {
            return None;
        };
        let Expr::Name(name) = self.module.exprs.get(*func) else {
            return None;
        };
        if self.interner.resolve(*name) != Some("type") {
            return None;
        }
        let [arg] = args.as_slice() else {
            return None;
        };
        self.lvalue_of(*arg)
    }

    pub(crate) fn apply_refinements(&mut self, scope: ScopeId, refs: &[Refinement]) {
        for r in refs {
            let Some(current) = self.lvalue_type(scope, &r.lvalue) else {
                continue;
            };
            let level = self.level(scope);
            let narrowed =
                refine(&mut self.pool, &self.config, level, current, r.predicate, r.sense);
            self.scopes.refine(scope, r.lvalue.clone(), narrowed);
        }
    }

    fn lvalue_of(&self, expr: ExprId) -> Option<LValue> {
        match self.module.exprs.get(expr) {
            Expr::Name(name) => Some(LValue::name(*name)),
            Expr::Index { object, key } => {
                let mut lvalue = self.lvalue_of(*object)?;
                lvalue.path.push(*key);
                Some(lvalue)
            }
            _ => None,
        }
    }

    /// The type an lvalue currently reads as, without reporting
    /// errors.
    fn lvalue_type(&mut self, scope: ScopeId, lvalue: &LValue) -> Option<TypeId> {
        if let Some(refined) = self.scopes.refined(scope, lvalue) {
            return Some(refined);
        }
        let binding = self.scopes.lookup(scope, lvalue.base)?;
        let mut current = binding.ty;
        for &field in &lvalue.path {
            current = self.pool.resolve(current);
            let TypeNode::Table(tt) = self.pool.get(current) else {
                return None;
            };
            current = tt.prop(field)?.ty;
        }
        Some(current)
    }
}
