//! Instantiation of generic functions.
//!
//! Each use of a generic function gets a fresh copy of its signature
//! with the quantified parameters replaced by new free variables at
//! the use site's level. Structure that contains no generics is shared
//! with the original, so repeated instantiation stays cheap.

use rustc_hash::FxHashMap;

use crate::flags::TypeFlags;
use crate::id::{PackId, TypeId};
use crate::level::Level;
use crate::node::{FunctionType, Indexer, PackNode, TableType, TypeList, TypeNode};
use crate::pool::Pool;

/// Produce a monomorphic instance of `func` at `level`.
///
/// Non-functions and monomorphic functions are returned unchanged.
pub fn instantiate(pool: &mut Pool, func: TypeId, level: Level) -> TypeId {
    let func = pool.resolve(func);
    let ft = match pool.get(func) {
        TypeNode::Function(ft) if ft.is_generic() => ft.clone(),
        _ => return func,
    };

    let mut cloner = Cloner {
        pool,
        type_map: FxHashMap::default(),
        pack_map: FxHashMap::default(),
    };
    for &g in &ft.generics {
        let g = cloner.pool.resolve_readonly(g);
        let fresh = cloner.pool.fresh_free(level);
        cloner.type_map.insert(g, fresh);
    }
    for &gp in &ft.generic_packs {
        let gp = cloner.pool.resolve_pack_readonly(gp);
        let fresh = cloner.pool.fresh_free_pack(level);
        cloner.pack_map.insert(gp, fresh);
    }

    let params = cloner.clone_pack(ft.params);
    let rets = cloner.clone_pack(ft.rets);
    pool.function(params, rets)
}

/// Substituting copier. `type_map`/`pack_map` start as the
/// generic-to-fresh substitution and accumulate clone memos, which
/// both caps the work on shared structure and ties off cycles.
struct Cloner<'a> {
    pool: &'a mut Pool,
    type_map: FxHashMap<TypeId, TypeId>,
    pack_map: FxHashMap<PackId, PackId>,
}

impl Cloner<'_> {
    fn clone_type(&mut self, ty: TypeId) -> TypeId {
        let ty = self.pool.resolve(ty);
        if let Some(&mapped) = self.type_map.get(&ty) {
            return mapped;
        }
        // Nothing generic below: share with the original.
        if !self.pool.flags(ty).contains(TypeFlags::HAS_GENERIC) {
            return ty;
        }
        match self.pool.get(ty).clone() {
            // Every cycle in the graph passes through a table, so a
            // placeholder allocated before recursing ties the knot.
            TypeNode::Table(tt) => {
                let placeholder = self
                    .pool
                    .alloc(TypeNode::Table(TableType::empty(tt.state, tt.level)));
                self.type_map.insert(ty, placeholder);
                let mut cloned = tt.clone();
                for prop in &mut cloned.props {
                    prop.ty = self.clone_type(prop.ty);
                }
                cloned.indexer = tt.indexer.map(|ix| Indexer {
                    key: self.clone_type(ix.key),
                    value: self.clone_type(ix.value),
                });
                cloned.metatable = tt.metatable.map(|mt| self.clone_type(mt));
                self.pool.replace_node(placeholder, TypeNode::Table(cloned));
                placeholder
            }
            TypeNode::Function(ft) => {
                let params = self.clone_pack(ft.params);
                let rets = self.clone_pack(ft.rets);
                if params == ft.params && rets == ft.rets {
                    return ty;
                }
                // A nested generic function keeps its own quantifiers;
                // only the outer function's generics are in the map.
                let cloned = self.pool.alloc(TypeNode::Function(FunctionType {
                    generics: ft.generics.clone(),
                    generic_packs: ft.generic_packs.clone(),
                    params,
                    rets,
                }));
                self.type_map.insert(ty, cloned);
                cloned
            }
            TypeNode::Union(members) => {
                let cloned: TypeList = members.iter().map(|&m| self.clone_type(m)).collect();
                if cloned == members {
                    return ty;
                }
                self.pool.union(cloned)
            }
            TypeNode::Intersection(members) => {
                let cloned: TypeList = members.iter().map(|&m| self.clone_type(m)).collect();
                if cloned == members {
                    return ty;
                }
                self.pool.intersection(cloned)
            }
            // Generics not in the map belong to an enclosing function
            // and stay as they are.
            TypeNode::Prim(_)
            | TypeNode::Free { .. }
            | TypeNode::Bound(_)
            | TypeNode::Generic { .. } => ty,
        }
    }

    fn clone_pack(&mut self, pack: PackId) -> PackId {
        let pack = self.pool.resolve_pack(pack);
        if let Some(&mapped) = self.pack_map.get(&pack) {
            return mapped;
        }
        if !self.pool.pack_flags(pack).contains(TypeFlags::HAS_GENERIC) {
            return pack;
        }
        match self.pool.get_pack(pack).clone() {
            PackNode::List { head, tail } => {
                let cloned_head: TypeList = head.iter().map(|&t| self.clone_type(t)).collect();
                let cloned_tail = tail.map(|t| self.clone_pack(t));
                if cloned_head == head && cloned_tail == tail {
                    return pack;
                }
                let cloned = self.pool.alloc_pack(PackNode::List {
                    head: cloned_head,
                    tail: cloned_tail,
                });
                self.pack_map.insert(pack, cloned);
                cloned
            }
            PackNode::Variadic(ty) => {
                let cloned_ty = self.clone_type(ty);
                if cloned_ty == ty {
                    return pack;
                }
                self.pool.variadic(cloned_ty)
            }
            PackNode::Free { .. } | PackNode::Bound(_) | PackNode::Generic { .. } => pack,
        }
    }
}
