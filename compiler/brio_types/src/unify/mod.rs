//! Unification.
//!
//! [`Unifier::unify`] checks `found <: expected`, binding free
//! variables as a side effect. Free variables bind in both directions;
//! `any` and the error sentinel unify with everything so a single
//! mistake does not cascade.
//!
//! All work is bounded: pack walks by `iteration_limit`, table and
//! function pair expansion by `child_expansion_limit`. Recursive types
//! terminate through a coinductive seen-set of pairs in progress.
//!
//! Union and intersection matching runs trial unifications: side
//! effects are recorded in an undo log, and a failed trial is rolled
//! back before the next member is attempted.

mod error;

#[cfg(test)]
mod tests;

pub use error::{CountKind, UnifyError};

use rustc_hash::FxHashSet;

use crate::config::Config;
use crate::flags::TypeFlags;
use crate::id::{PackId, TypeId};
use crate::instantiate::instantiate;
use crate::level::Level;
use crate::node::{Indexer, PackNode, TableType, TypeList, TypeNode};
use crate::pool::Pool;

pub type UnifyResult = Result<(), UnifyError>;

/// A reversible side effect of unification.
enum UndoOp {
    BindType { var: TypeId, level: Level },
    BindPack { var: PackId, level: Level },
    AddProp { table: TypeId },
    SetIndexer { table: TypeId },
    SeenType { pair: (TypeId, TypeId) },
}

/// A point in the undo log to roll back to.
pub(crate) struct Snapshot(usize);

/// One unification engine over a pool.
///
/// Create one per top-level constraint; the work budgets and seen-sets
/// span the whole constraint, including union trials.
pub struct Unifier<'a> {
    pool: &'a mut Pool,
    config: &'a Config,
    /// Level fresh variables from instantiation are created at.
    level: Level,
    iterations: usize,
    expansions: usize,
    seen: FxHashSet<(TypeId, TypeId)>,
    undo: Vec<UndoOp>,
}

/// One element peeled off the front of a pack.
enum Step {
    Cons(TypeId, PackId),
    Variadic(TypeId),
    Empty,
    /// A generic pack, opaque to element-wise stepping.
    Opaque(PackId),
}

impl<'a> Unifier<'a> {
    pub fn new(pool: &'a mut Pool, config: &'a Config, level: Level) -> Self {
        Self {
            pool,
            config,
            level,
            iterations: 0,
            expansions: 0,
            seen: FxHashSet::default(),
            undo: Vec::new(),
        }
    }

    /// Check `found <: expected`, binding free variables.
    pub fn unify(&mut self, found: TypeId, expected: TypeId) -> UnifyResult {
        let found = self.pool.resolve(found);
        let expected = self.pool.resolve(expected);
        if found == expected {
            return Ok(());
        }

        // Wildcards first: `any` and `<error>` unify both ways,
        // `unknown` accepts everything, `never` flows into everything.
        if found == TypeId::ANY
            || expected == TypeId::ANY
            || found == TypeId::ERROR
            || expected == TypeId::ERROR
            || expected == TypeId::UNKNOWN
            || found == TypeId::NEVER
        {
            return Ok(());
        }

        let found_node = self.pool.get(found).clone();
        let expected_node = self.pool.get(expected).clone();
        match (found_node, expected_node) {
            (TypeNode::Free { level: lf }, TypeNode::Free { .. }) => {
                // Two unknowns: link them and keep the outermost level
                // so neither generalizes too eagerly.
                self.pool.clamp_level(expected, lf);
                self.record_bind(found, expected, lf);
                Ok(())
            }
            (TypeNode::Free { level }, _) => self.bind_checked(found, expected, level),
            (_, TypeNode::Free { level }) => self.bind_checked(expected, found, level),
            (found_node, expected_node) => {
                self.unify_shapes(found, &found_node, expected, &expected_node)
            }
        }
    }

    fn unify_shapes(
        &mut self,
        found: TypeId,
        found_node: &TypeNode,
        expected: TypeId,
        expected_node: &TypeNode,
    ) -> UnifyResult {
        match (found_node, expected_node) {
            // A union fits when every alternative fits.
            (TypeNode::Union(members), _) => {
                for &m in members {
                    self.unify(m, expected)?;
                }
                Ok(())
            }
            // Fitting into a union means fitting some member; trials
            // that bind variables are rolled back on failure.
            (_, TypeNode::Union(members)) => {
                for &m in members {
                    let snap = self.snapshot();
                    match self.unify(found, m) {
                        Ok(()) => return Ok(()),
                        Err(UnifyError::TooComplex) => return Err(UnifyError::TooComplex),
                        Err(_) => self.rollback(snap),
                    }
                }
                Err(UnifyError::Mismatch { found, expected })
            }
            // Fitting into an intersection means fitting every member.
            (_, TypeNode::Intersection(members)) => {
                for &m in members {
                    self.unify(found, m)?;
                }
                Ok(())
            }
            // An intersection fits when some member fits.
            (TypeNode::Intersection(members), _) => {
                for &m in members {
                    let snap = self.snapshot();
                    match self.unify(m, expected) {
                        Ok(()) => return Ok(()),
                        Err(UnifyError::TooComplex) => return Err(UnifyError::TooComplex),
                        Err(_) => self.rollback(snap),
                    }
                }
                Err(UnifyError::Mismatch { found, expected })
            }
            (TypeNode::Function(ff), TypeNode::Function(ef)) => {
                if !self.note_pair(found, expected) {
                    return Ok(());
                }
                self.expand()?;
                // Generic functions are compared at fresh instances.
                let (fp, fr) = if ff.is_generic() {
                    let inst = instantiate(self.pool, found, self.level);
                    self.function_packs(inst).unwrap_or((ff.params, ff.rets))
                } else {
                    (ff.params, ff.rets)
                };
                let (ep, er) = if ef.is_generic() {
                    let inst = instantiate(self.pool, expected, self.level);
                    self.function_packs(inst).unwrap_or((ef.params, ef.rets))
                } else {
                    (ef.params, ef.rets)
                };
                // Parameters are contravariant, returns covariant.
                self.unify_packs(ep, fp, CountKind::Arguments)?;
                self.unify_packs(fr, er, CountKind::Returns)
            }
            (TypeNode::Table(ft), TypeNode::Table(et)) => {
                if !self.note_pair(found, expected) {
                    return Ok(());
                }
                self.expand()?;
                self.unify_tables(found, ft, expected, et)
            }
            _ => Err(UnifyError::Mismatch { found, expected }),
        }
    }

    fn unify_tables(
        &mut self,
        found: TypeId,
        ft: &TableType,
        expected: TypeId,
        et: &TableType,
    ) -> UnifyResult {
        use crate::node::TableState;

        // Every expected property must exist on the found side. Width
        // subtyping: extra found properties are fine unless the
        // expected table is still free, in which case it learns them.
        for eprop in &et.props {
            match ft.prop(eprop.name) {
                Some(fprop) => {
                    if fprop.read_only && !eprop.read_only {
                        return Err(UnifyError::ReadOnlyProperty {
                            table: found,
                            prop: eprop.name,
                        });
                    }
                    // Properties are mutable slots: invariant.
                    self.unify_invariant(fprop.ty, eprop.ty)?;
                }
                None if ft.state == TableState::Free => {
                    self.pool.add_prop(found, eprop.name, eprop.ty, eprop.span);
                    self.undo.push(UndoOp::AddProp { table: found });
                }
                None => {
                    return Err(UnifyError::MissingProperty { table: found, prop: eprop.name });
                }
            }
        }
        if et.state == TableState::Free {
            for fprop in &ft.props {
                if et.prop(fprop.name).is_none() {
                    self.pool.add_prop(expected, fprop.name, fprop.ty, fprop.span);
                    self.undo.push(UndoOp::AddProp { table: expected });
                }
            }
        }

        if let Some(ei) = et.indexer {
            match ft.indexer {
                Some(fi) => {
                    self.unify_invariant(fi.key, ei.key)?;
                    self.unify_invariant(fi.value, ei.value)?;
                }
                None if ft.state == TableState::Free => {
                    self.pool.set_indexer(found, Indexer { key: ei.key, value: ei.value });
                    self.undo.push(UndoOp::SetIndexer { table: found });
                }
                None => return Err(UnifyError::Mismatch { found, expected }),
            }
        }

        match (ft.metatable, et.metatable) {
            (_, None) => Ok(()),
            (Some(fm), Some(em)) => self.unify_invariant(fm, em),
            (None, Some(_)) => Err(UnifyError::Mismatch { found, expected }),
        }
    }

    /// Unify in both directions: mutable positions admit no variance.
    fn unify_invariant(&mut self, a: TypeId, b: TypeId) -> UnifyResult {
        self.unify(a, b)?;
        self.unify(b, a)
    }

    /// Check `found <: expected` element-wise over packs.
    pub fn unify_packs(&mut self, found: PackId, expected: PackId, kind: CountKind) -> UnifyResult {
        let original = (found, expected);
        let mut f = found;
        let mut e = expected;
        loop {
            self.iterations += 1;
            if self.iterations > self.config.iteration_limit {
                return Err(UnifyError::TooComplex);
            }
            f = self.pool.resolve_pack(f);
            e = self.pool.resolve_pack(e);
            if f == e {
                return Ok(());
            }

            // A free pack swallows the whole remainder of the other
            // side.
            if let PackNode::Free { level } = *self.pool.get_pack(f) {
                return self.bind_pack_checked(f, e, level);
            }
            if let PackNode::Free { level } = *self.pool.get_pack(e) {
                return self.bind_pack_checked(e, f, level);
            }

            match (self.step(f), self.step(e)) {
                (Step::Cons(t1, r1), Step::Cons(t2, r2)) => {
                    self.unify(t1, t2)?;
                    f = r1;
                    e = r2;
                }
                (Step::Cons(t1, r1), Step::Variadic(u)) => {
                    self.unify(t1, u)?;
                    f = r1;
                }
                (Step::Variadic(t), Step::Cons(u, r2)) => {
                    self.unify(t, u)?;
                    e = r2;
                }
                (Step::Variadic(t), Step::Variadic(u)) => return self.unify(t, u),
                (Step::Empty, Step::Empty)
                | (Step::Empty, Step::Variadic(_))
                | (Step::Variadic(_), Step::Empty) => return Ok(()),
                (Step::Empty, Step::Cons(..)) | (Step::Cons(..), Step::Empty) => {
                    return Err(UnifyError::CountMismatch {
                        found: self.fixed_len(original.0),
                        expected: self.fixed_len(original.1),
                        kind,
                    });
                }
                (Step::Opaque(p1), Step::Opaque(p2)) if p1 == p2 => return Ok(()),
                (Step::Opaque(p), _) => {
                    return Err(UnifyError::PackMismatch { found: p, expected: e })
                }
                (_, Step::Opaque(p)) => {
                    return Err(UnifyError::PackMismatch { found: f, expected: p })
                }
            }
        }
    }

    /// Peel the first element off a pack.
    fn step(&mut self, pack: PackId) -> Step {
        let pack = self.pool.resolve_pack(pack);
        match self.pool.get_pack(pack).clone() {
            PackNode::List { head, tail } => {
                if head.is_empty() {
                    match tail {
                        Some(t) => self.step(t),
                        None => Step::Empty,
                    }
                } else if head.len() == 1 {
                    Step::Cons(head[0], tail.unwrap_or(PackId::EMPTY))
                } else {
                    let rest: TypeList = head[1..].iter().copied().collect();
                    let rest_id = match tail {
                        Some(t) => self.pool.pack_with_tail(rest, t),
                        None => self.pool.pack(rest),
                    };
                    Step::Cons(head[0], rest_id)
                }
            }
            PackNode::Variadic(ty) => Step::Variadic(ty),
            PackNode::Generic { .. } => Step::Opaque(pack),
            // Free packs are handled before stepping; Bound is
            // resolved away. Treat both as opaque if they slip through.
            PackNode::Free { .. } | PackNode::Bound(_) => Step::Opaque(pack),
        }
    }

    /// Fixed element count of a pack, ignoring variadic tails. Only
    /// used for count-mismatch messages.
    fn fixed_len(&self, pack: PackId) -> usize {
        let mut n = 0;
        let mut cur = pack;
        for _ in 0..self.config.iteration_limit {
            cur = self.pool.resolve_pack_readonly(cur);
            match self.pool.get_pack(cur) {
                PackNode::List { head, tail } => {
                    n += head.len();
                    match tail {
                        Some(t) => cur = *t,
                        None => break,
                    }
                }
                _ => break,
            }
        }
        n
    }

    // === Binding ===

    fn bind_checked(&mut self, var: TypeId, to: TypeId, level: Level) -> UnifyResult {
        if self.occurs(var, to) {
            // Bind the variable to the error sentinel so the
            // recursive type is reported once, not at every use.
            self.record_bind(var, TypeId::ERROR, level);
            return Err(UnifyError::Occurs { var, ty: to });
        }
        self.promote(to, level);
        self.record_bind(var, to, level);
        Ok(())
    }

    fn record_bind(&mut self, var: TypeId, to: TypeId, level: Level) {
        self.pool.bind(var, to);
        self.undo.push(UndoOp::BindType { var, level });
    }

    fn bind_pack_checked(&mut self, var: PackId, to: PackId, level: Level) -> UnifyResult {
        if self.occurs_pack(var, to) {
            self.pool.bind_pack(var, PackId::ERROR);
            self.undo.push(UndoOp::BindPack { var, level });
            return Err(UnifyError::OccursPack { var, pack: to });
        }
        self.promote_pack_levels(to, level);
        self.pool.bind_pack(var, to);
        self.undo.push(UndoOp::BindPack { var, level });
        Ok(())
    }

    // === Occurs checks ===

    fn occurs(&self, var: TypeId, ty: TypeId) -> bool {
        let mut types = FxHashSet::default();
        let mut packs = FxHashSet::default();
        self.occurs_in_type(var, ty, &mut types, &mut packs)
    }

    fn occurs_in_type(
        &self,
        var: TypeId,
        ty: TypeId,
        types: &mut FxHashSet<TypeId>,
        packs: &mut FxHashSet<PackId>,
    ) -> bool {
        let ty = self.pool.resolve_readonly(ty);
        if ty == var {
            return true;
        }
        if !self.pool.flags(ty).contains(TypeFlags::HAS_FREE) {
            return false;
        }
        if !types.insert(ty) {
            return false;
        }
        match self.pool.get(ty) {
            TypeNode::Table(tt) => {
                tt.props.iter().any(|p| self.occurs_in_type(var, p.ty, types, packs))
                    || tt.indexer.is_some_and(|ix| {
                        self.occurs_in_type(var, ix.key, types, packs)
                            || self.occurs_in_type(var, ix.value, types, packs)
                    })
                    || tt
                        .metatable
                        .is_some_and(|mt| self.occurs_in_type(var, mt, types, packs))
            }
            TypeNode::Function(ft) => {
                self.occurs_in_pack_full(var, ft.params, types, packs)
                    || self.occurs_in_pack_full(var, ft.rets, types, packs)
            }
            TypeNode::Union(members) | TypeNode::Intersection(members) => {
                members.iter().any(|&m| self.occurs_in_type(var, m, types, packs))
            }
            _ => false,
        }
    }

    fn occurs_in_pack_full(
        &self,
        var: TypeId,
        pack: PackId,
        types: &mut FxHashSet<TypeId>,
        packs: &mut FxHashSet<PackId>,
    ) -> bool {
        let pack = self.pool.resolve_pack_readonly(pack);
        if !packs.insert(pack) {
            return false;
        }
        match self.pool.get_pack(pack) {
            PackNode::List { head, tail } => {
                head.iter().any(|&t| self.occurs_in_type(var, t, types, packs))
                    || tail.is_some_and(|t| self.occurs_in_pack_full(var, t, types, packs))
            }
            PackNode::Variadic(ty) => self.occurs_in_type(var, *ty, types, packs),
            _ => false,
        }
    }

    /// Occurs check for pack variables. Follows only the tail chain:
    /// a pack hidden in a head position escapes it, so the iteration
    /// limit is the backstop against the growth that allows.
    fn occurs_pack(&self, var: PackId, pack: PackId) -> bool {
        let mut cur = pack;
        for _ in 0..self.config.iteration_limit {
            cur = self.pool.resolve_pack_readonly(cur);
            if cur == var {
                return true;
            }
            match self.pool.get_pack(cur) {
                PackNode::List { tail: Some(t), .. } => cur = *t,
                _ => return false,
            }
        }
        true
    }

    // === Level promotion ===

    /// Clamp the levels of free variables reachable from `ty` so that
    /// nothing the bound variable now points at generalizes above it.
    fn promote(&mut self, ty: TypeId, max: Level) {
        if !self.pool.flags(ty).contains(TypeFlags::HAS_FREE) {
            return;
        }
        let mut types = FxHashSet::default();
        let mut packs = FxHashSet::default();
        self.promote_type(ty, max, &mut types, &mut packs);
    }

    fn promote_type(
        &mut self,
        ty: TypeId,
        max: Level,
        types: &mut FxHashSet<TypeId>,
        packs: &mut FxHashSet<PackId>,
    ) {
        let ty = self.pool.resolve(ty);
        if !self.pool.flags(ty).contains(TypeFlags::HAS_FREE) || !types.insert(ty) {
            return;
        }
        match self.pool.get(ty).clone() {
            TypeNode::Free { .. } => self.pool.clamp_level(ty, max),
            TypeNode::Table(tt) => {
                self.pool.clamp_table_level(ty, max);
                for prop in &tt.props {
                    self.promote_type(prop.ty, max, types, packs);
                }
                if let Some(ix) = tt.indexer {
                    self.promote_type(ix.key, max, types, packs);
                    self.promote_type(ix.value, max, types, packs);
                }
                if let Some(mt) = tt.metatable {
                    self.promote_type(mt, max, types, packs);
                }
            }
            TypeNode::Function(ft) => {
                self.promote_pack(ft.params, max, types, packs);
                self.promote_pack(ft.rets, max, types, packs);
            }
            TypeNode::Union(members) | TypeNode::Intersection(members) => {
                for m in members {
                    self.promote_type(m, max, types, packs);
                }
            }
            TypeNode::Prim(_) | TypeNode::Bound(_) | TypeNode::Generic { .. } => {}
        }
    }

    fn promote_pack(
        &mut self,
        pack: PackId,
        max: Level,
        types: &mut FxHashSet<TypeId>,
        packs: &mut FxHashSet<PackId>,
    ) {
        let pack = self.pool.resolve_pack(pack);
        if !self.pool.pack_flags(pack).contains(TypeFlags::HAS_FREE) || !packs.insert(pack) {
            return;
        }
        match self.pool.get_pack(pack).clone() {
            PackNode::Free { .. } => self.pool.clamp_pack_level(pack, max),
            PackNode::List { head, tail } => {
                for ty in head {
                    self.promote_type(ty, max, types, packs);
                }
                if let Some(t) = tail {
                    self.promote_pack(t, max, types, packs);
                }
            }
            PackNode::Variadic(ty) => self.promote_type(ty, max, types, packs),
            PackNode::Bound(_) | PackNode::Generic { .. } => {}
        }
    }

    fn promote_pack_levels(&mut self, pack: PackId, max: Level) {
        let mut types = FxHashSet::default();
        let mut packs = FxHashSet::default();
        self.promote_pack(pack, max, &mut types, &mut packs);
    }

    // === Budgets, seen-set, undo ===

    fn expand(&mut self) -> UnifyResult {
        self.expansions += 1;
        if self.expansions > self.config.child_expansion_limit {
            Err(UnifyError::TooComplex)
        } else {
            Ok(())
        }
    }

    /// Record a pair in progress. Returns false if the pair is already
    /// being unified, in which case the caller assumes success
    /// (coinduction: recursive types unify with themselves).
    fn note_pair(&mut self, found: TypeId, expected: TypeId) -> bool {
        if self.seen.insert((found, expected)) {
            self.undo.push(UndoOp::SeenType { pair: (found, expected) });
            true
        } else {
            false
        }
    }

    fn function_packs(&self, func: TypeId) -> Option<(PackId, PackId)> {
        match self.pool.get(self.pool.resolve_readonly(func)) {
            TypeNode::Function(ft) => Some((ft.params, ft.rets)),
            _ => None,
        }
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot(self.undo.len())
    }

    pub(crate) fn rollback(&mut self, snap: Snapshot) {
        while self.undo.len() > snap.0 {
            match self.undo.pop() {
                Some(UndoOp::BindType { var, level }) => self.pool.unbind(var, level),
                Some(UndoOp::BindPack { var, level }) => self.pool.unbind_pack(var, level),
                Some(UndoOp::AddProp { table }) => self.pool.pop_prop(table),
                Some(UndoOp::SetIndexer { table }) => self.pool.clear_indexer(table),
                Some(UndoOp::SeenType { pair }) => {
                    self.seen.remove(&pair);
                }
                None => break,
            }
        }
    }
}
