//! Generalization of inferred function signatures.
//!
//! After a function body is checked, free variables that did not
//! escape it (their level is at or below the body's) are promoted in
//! place to generic parameters and recorded on the function type, so
//! later uses instantiate fresh copies. Variables that escaped into an
//! enclosing scope keep their level and stay free.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::flags::TypeFlags;
use crate::id::{PackId, TypeId};
use crate::level::Level;
use crate::node::{PackNode, TypeNode};
use crate::pool::Pool;

/// Promote the unescaped frees of `func` to generics. `body_level` is
/// the level of the function's own scope; anything created at or
/// inside it belongs to the function.
pub fn generalize(pool: &mut Pool, func: TypeId, body_level: Level) {
    let func = pool.resolve(func);
    let (params, rets) = match pool.get(func) {
        TypeNode::Function(ft) => (ft.params, ft.rets),
        _ => return,
    };

    let mut walker = Generalizer {
        pool,
        body_level,
        generics: SmallVec::new(),
        generic_packs: SmallVec::new(),
        done: FxHashMap::default(),
        in_progress: FxHashSet::default(),
    };
    let mut any = walker.visit_pack(params);
    any |= walker.visit_pack(rets);

    if any && (!walker.generics.is_empty() || !walker.generic_packs.is_empty()) {
        let generics = walker.generics;
        let generic_packs = walker.generic_packs;
        pool.set_function_generics(func, generics, generic_packs);
    }
}

struct Generalizer<'a> {
    pool: &'a mut Pool,
    body_level: Level,
    generics: SmallVec<[TypeId; 2]>,
    generic_packs: SmallVec<[PackId; 1]>,
    done: FxHashMap<TypeId, bool>,
    in_progress: FxHashSet<TypeId>,
}

impl Generalizer<'_> {
    /// Returns whether anything generic is reachable from `ty`,
    /// promoting qualifying frees along the way. Nodes above a
    /// promoted variable get `HAS_GENERIC` so instantiation's flag
    /// gate keeps seeing them.
    fn visit_type(&mut self, ty: TypeId) -> bool {
        let ty = self.pool.resolve(ty);
        if let Some(&known) = self.done.get(&ty) {
            return known;
        }
        let flags = self.pool.flags(ty);
        if !flags.intersects(TypeFlags::HAS_FREE | TypeFlags::HAS_GENERIC) {
            return false;
        }
        if !self.in_progress.insert(ty) {
            // A cycle in progress: assume generic. Over-approximating
            // here only costs instantiation an extra copy.
            return true;
        }

        let generic = match self.pool.get(ty).clone() {
            TypeNode::Free { level } => {
                if level.can_generalize_at(self.body_level) {
                    self.pool.promote_to_generic(ty, None, level);
                    self.generics.push(ty);
                    true
                } else {
                    false
                }
            }
            TypeNode::Generic { .. } => true,
            TypeNode::Table(tt) => {
                let mut generic = false;
                for prop in &tt.props {
                    generic |= self.visit_type(prop.ty);
                }
                if let Some(ix) = tt.indexer {
                    generic |= self.visit_type(ix.key);
                    generic |= self.visit_type(ix.value);
                }
                if let Some(mt) = tt.metatable {
                    generic |= self.visit_type(mt);
                }
                generic
            }
            TypeNode::Function(ft) => {
                let mut generic = self.visit_pack(ft.params);
                generic |= self.visit_pack(ft.rets);
                generic
            }
            TypeNode::Union(members) | TypeNode::Intersection(members) => {
                let mut generic = false;
                for m in members {
                    generic |= self.visit_type(m);
                }
                generic
            }
            TypeNode::Prim(_) | TypeNode::Bound(_) => false,
        };

        if generic {
            self.pool.or_flags(ty, TypeFlags::HAS_GENERIC);
        }
        self.in_progress.remove(&ty);
        self.done.insert(ty, generic);
        generic
    }

    fn visit_pack(&mut self, pack: PackId) -> bool {
        let pack = self.pool.resolve_pack(pack);
        let flags = self.pool.pack_flags(pack);
        if !flags.intersects(TypeFlags::HAS_FREE | TypeFlags::HAS_GENERIC) {
            return false;
        }
        let generic = match self.pool.get_pack(pack).clone() {
            PackNode::Free { level } => {
                if level.can_generalize_at(self.body_level) {
                    self.pool.promote_pack_to_generic(pack, None);
                    self.generic_packs.push(pack);
                    true
                } else {
                    false
                }
            }
            PackNode::Generic { .. } => true,
            PackNode::List { head, tail } => {
                let mut generic = false;
                for ty in head {
                    generic |= self.visit_type(ty);
                }
                if let Some(t) = tail {
                    generic |= self.visit_pack(t);
                }
                generic
            }
            PackNode::Variadic(ty) => self.visit_type(ty),
            PackNode::Bound(_) => false,
        };
        if generic {
            self.pool.or_pack_flags(pack, TypeFlags::HAS_GENERIC);
        }
        generic
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use brio_ast::StringInterner;
    use pretty_assertions::assert_eq;
    use smallvec::smallvec;

    use super::*;
    use crate::instantiate::instantiate;

    fn pool() -> Pool {
        Pool::new(Arc::new(StringInterner::new()))
    }

    #[test]
    fn unescaped_frees_become_generics() {
        let mut pool = pool();
        let body = Level::ROOT.next();

        let param = pool.fresh_free(body);
        let params = pool.pack(smallvec![param]);
        let rets = pool.pack(smallvec![param]);
        let func = pool.function(params, rets);

        generalize(&mut pool, func, body);

        assert!(matches!(pool.get(param), TypeNode::Generic { .. }));
        match pool.get(func) {
            TypeNode::Function(ft) => assert_eq!(ft.generics.as_slice(), &[param]),
            other => panic!("expected a function, got {other:?}"),
        }
    }

    #[test]
    fn escaped_frees_stay_free() {
        let mut pool = pool();
        let body = Level::ROOT.next();

        // A variable at the enclosing level: mentioned by the function
        // but owned by the outer scope.
        let escaped = pool.fresh_free(Level::ROOT);
        let params = pool.pack(smallvec![escaped]);
        let func = pool.function(params, PackId::EMPTY);

        generalize(&mut pool, func, body);

        assert!(matches!(pool.get(escaped), TypeNode::Free { .. }));
        match pool.get(func) {
            TypeNode::Function(ft) => assert!(ft.generics.is_empty()),
            other => panic!("expected a function, got {other:?}"),
        }
    }

    #[test]
    fn generalize_then_instantiate_gives_fresh_variables() {
        let mut pool = pool();
        let body = Level::ROOT.next();

        let param = pool.fresh_free(body);
        let params = pool.pack(smallvec![param]);
        let rets = pool.pack(smallvec![param]);
        let func = pool.function(params, rets);
        generalize(&mut pool, func, body);

        let inst = instantiate(&mut pool, func, Level::ROOT);
        assert_ne!(inst, func);
        match pool.get(inst) {
            TypeNode::Function(ft) => {
                let head = match pool.get_pack(ft.params) {
                    PackNode::List { head, .. } => head.clone(),
                    other => panic!("expected a list pack, got {other:?}"),
                };
                assert!(matches!(pool.get(head[0]), TypeNode::Free { .. }));
                assert_ne!(head[0], param);
            }
            other => panic!("expected a function, got {other:?}"),
        }
    }

    #[test]
    fn free_variadic_tail_becomes_generic_pack() {
        let mut pool = pool();
        let body = Level::ROOT.next();

        let tail = pool.fresh_free_pack(body);
        let params = pool.pack_with_tail(smallvec![TypeId::NUMBER], tail);
        let func = pool.function(params, PackId::EMPTY);

        generalize(&mut pool, func, body);

        assert!(matches!(pool.get_pack(tail), PackNode::Generic { .. }));
        match pool.get(func) {
            TypeNode::Function(ft) => assert_eq!(ft.generic_packs.as_slice(), &[tail]),
            other => panic!("expected a function, got {other:?}"),
        }
    }
}
