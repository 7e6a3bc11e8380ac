//! The type arena.
//!
//! All types and packs for one checking session live in a single
//! [`Pool`]. Allocation hands out [`TypeId`]/[`PackId`] handles;
//! binding a free variable or adding a table property mutates the node
//! in place, so every handle that reached the node observes the update.
//! Nothing is deduplicated: two structurally identical tables must stay
//! distinct because one of them may later gain a property.

mod format;


use brio_ast::{Name, SharedInterner, Span};
use tracing::error;

use crate::flags::TypeFlags;
use crate::id::{PackId, TypeId};
use crate::level::Level;
use crate::node::{
    own_flags, FunctionType, Indexer, PackNode, Prim, TableProp, TableState, TableType, TypeList,
    TypeNode,
};

pub use format::TypeFormatter;

/// Arena of type and pack nodes plus their conservative flags.
pub struct Pool {
    types: Vec<TypeNode>,
    type_flags: Vec<TypeFlags>,
    packs: Vec<PackNode>,
    pack_flags: Vec<TypeFlags>,
    interner: SharedInterner,
    /// Messages from guarded mutators that were asked to break an
    /// invariant. The checker drains these when it is configured to
    /// fail closed.
    invariant_breaks: Vec<String>,
}

impl Pool {
    /// Create a pool with the primitives and sentinel packs
    /// pre-allocated at their fixed handles.
    pub fn new(interner: SharedInterner) -> Self {
        let mut pool = Self {
            types: Vec::with_capacity(64),
            type_flags: Vec::with_capacity(64),
            packs: Vec::with_capacity(32),
            pack_flags: Vec::with_capacity(32),
            interner,
            invariant_breaks: Vec::new(),
        };
        for prim in [
            Prim::Nil,
            Prim::Boolean,
            Prim::Number,
            Prim::String,
            Prim::Thread,
            Prim::Any,
            Prim::Unknown,
            Prim::Never,
            Prim::Error,
        ] {
            pool.alloc(TypeNode::Prim(prim));
        }
        pool.alloc_pack(PackNode::empty());
        pool.alloc_pack(PackNode::Variadic(TypeId::ANY));
        pool.alloc_pack(PackNode::Variadic(TypeId::ERROR));
        pool
    }

    /// The string interner this pool resolves property names through.
    pub fn interner(&self) -> &SharedInterner {
        &self.interner
    }

    /// Number of type nodes.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Only true for a pool that skipped pre-allocation, which cannot
    /// be constructed. Kept for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Number of pack nodes.
    pub fn pack_len(&self) -> usize {
        self.packs.len()
    }

    // === Allocation ===

    /// Allocate a type node, computing its flags from itself and its
    /// immediate children.
    pub fn alloc(&mut self, node: TypeNode) -> TypeId {
        let flags = own_flags(&node) | self.child_flags(&node);
        let id = TypeId::from_raw(self.types.len() as u32);
        self.types.push(node);
        self.type_flags.push(flags);
        id
    }

    /// Allocate a pack node.
    pub fn alloc_pack(&mut self, node: PackNode) -> PackId {
        let flags = self.pack_own_flags(&node);
        let id = PackId::from_raw(self.packs.len() as u32);
        self.packs.push(node);
        self.pack_flags.push(flags);
        id
    }

    /// A fresh unbound inference variable at `level`.
    pub fn fresh_free(&mut self, level: Level) -> TypeId {
        self.alloc(TypeNode::Free { level })
    }

    /// A fresh unbound pack variable at `level`.
    pub fn fresh_free_pack(&mut self, level: Level) -> PackId {
        self.alloc_pack(PackNode::Free { level })
    }

    /// A fresh generic type parameter.
    pub fn fresh_generic(&mut self, name: Option<Name>, level: Level) -> TypeId {
        self.alloc(TypeNode::Generic { name, level })
    }

    /// A monomorphic function type.
    pub fn function(&mut self, params: PackId, rets: PackId) -> TypeId {
        self.alloc(TypeNode::Function(FunctionType::new(params, rets)))
    }

    /// An empty table in the given state.
    pub fn table(&mut self, state: TableState, level: Level) -> TypeId {
        self.alloc(TypeNode::Table(TableType::empty(state, level)))
    }

    /// A closed pack with the given head.
    pub fn pack(&mut self, head: TypeList) -> PackId {
        if head.is_empty() {
            return PackId::EMPTY;
        }
        self.alloc_pack(PackNode::List { head, tail: None })
    }

    /// A pack with a head and a tail pack.
    pub fn pack_with_tail(&mut self, head: TypeList, tail: PackId) -> PackId {
        if head.is_empty() {
            return tail;
        }
        self.alloc_pack(PackNode::List { head, tail: Some(tail) })
    }

    /// A variadic pack `...ty`.
    pub fn variadic(&mut self, ty: TypeId) -> PackId {
        match ty {
            TypeId::ANY => PackId::ANY,
            TypeId::ERROR => PackId::ERROR,
            _ => self.alloc_pack(PackNode::Variadic(ty)),
        }
    }

    // === Canonicalizing constructors ===

    /// Build a union, canonicalized: members are resolved, nested
    /// unions flattened, duplicates removed, `never` dropped, and
    /// `any`/`<error>` absorb the rest. An empty result is `never`;
    /// a single member is returned as itself.
    pub fn union(&mut self, members: impl IntoIterator<Item = TypeId>) -> TypeId {
        let mut flat = TypeList::new();
        for member in members {
            let member = self.resolve_readonly(member);
            match self.get(member) {
                TypeNode::Union(inner) => {
                    let inner = inner.clone();
                    for &m in &inner {
                        let m = self.resolve_readonly(m);
                        push_unique(&mut flat, m);
                    }
                }
                _ => push_unique(&mut flat, member),
            }
        }
        if flat.contains(&TypeId::ANY) {
            return TypeId::ANY;
        }
        if flat.contains(&TypeId::ERROR) {
            return TypeId::ERROR;
        }
        flat.retain(|&mut m| m != TypeId::NEVER);
        match flat.len() {
            0 => TypeId::NEVER,
            1 => flat[0],
            _ => self.alloc(TypeNode::Union(flat)),
        }
    }

    /// Build an intersection, canonicalized dually to [`Pool::union`]:
    /// `unknown` is dropped, `never` and `any` absorb, empty is
    /// `unknown`, a single member is itself.
    pub fn intersection(&mut self, members: impl IntoIterator<Item = TypeId>) -> TypeId {
        let mut flat = TypeList::new();
        for member in members {
            let member = self.resolve_readonly(member);
            match self.get(member) {
                TypeNode::Intersection(inner) => {
                    let inner = inner.clone();
                    for &m in &inner {
                        let m = self.resolve_readonly(m);
                        push_unique(&mut flat, m);
                    }
                }
                _ => push_unique(&mut flat, member),
            }
        }
        if flat.contains(&TypeId::NEVER) {
            return TypeId::NEVER;
        }
        if flat.contains(&TypeId::ANY) {
            return TypeId::ANY;
        }
        if flat.contains(&TypeId::ERROR) {
            return TypeId::ERROR;
        }
        flat.retain(|&mut m| m != TypeId::UNKNOWN);
        match flat.len() {
            0 => TypeId::UNKNOWN,
            1 => flat[0],
            _ => self.alloc(TypeNode::Intersection(flat)),
        }
    }

    /// `T?` as `T | nil`.
    pub fn optional(&mut self, ty: TypeId) -> TypeId {
        self.union([ty, TypeId::NIL])
    }

    // === Access ===

    /// The node behind a handle. Does not follow `Bound` links.
    pub fn get(&self, id: TypeId) -> &TypeNode {
        &self.types[id.raw() as usize]
    }

    /// The pack node behind a handle. Does not follow `Bound` links.
    pub fn get_pack(&self, id: PackId) -> &PackNode {
        &self.packs[id.raw() as usize]
    }

    /// Conservative flags for a type.
    pub fn flags(&self, id: TypeId) -> TypeFlags {
        self.type_flags[id.raw() as usize]
    }

    /// Conservative flags for a pack.
    pub fn pack_flags(&self, id: PackId) -> TypeFlags {
        self.pack_flags[id.raw() as usize]
    }

    // === Resolution ===

    /// Follow `Bound` links to the representative, compressing the
    /// path behind it.
    pub fn resolve(&mut self, id: TypeId) -> TypeId {
        let root = self.resolve_readonly(id);
        let mut cur = id;
        while cur != root {
            let next = match self.types[cur.raw() as usize] {
                TypeNode::Bound(next) => next,
                _ => break,
            };
            self.types[cur.raw() as usize] = TypeNode::Bound(root);
            cur = next;
        }
        root
    }

    /// Follow `Bound` links without mutating.
    pub fn resolve_readonly(&self, id: TypeId) -> TypeId {
        let mut cur = id;
        while let TypeNode::Bound(next) = self.types[cur.raw() as usize] {
            cur = next;
        }
        cur
    }

    /// Follow pack `Bound` links to the representative, compressing.
    pub fn resolve_pack(&mut self, id: PackId) -> PackId {
        let root = self.resolve_pack_readonly(id);
        let mut cur = id;
        while cur != root {
            let next = match self.packs[cur.raw() as usize] {
                PackNode::Bound(next) => next,
                _ => break,
            };
            self.packs[cur.raw() as usize] = PackNode::Bound(root);
            cur = next;
        }
        root
    }

    /// Follow pack `Bound` links without mutating.
    pub fn resolve_pack_readonly(&self, id: PackId) -> PackId {
        let mut cur = id;
        while let PackNode::Bound(next) = self.packs[cur.raw() as usize] {
            cur = next;
        }
        cur
    }

    // === Mutation ===

    /// Bind a free variable to a target type. The variable's flags are
    /// widened with the target's so downstream gates stay sound.
    ///
    /// Binding anything other than a `Free` node is an internal
    /// invariant break; it is logged and ignored rather than
    /// corrupting the graph.
    pub fn bind(&mut self, var: TypeId, to: TypeId) {
        let slot = &mut self.types[var.raw() as usize];
        match slot {
            TypeNode::Free { .. } => {
                *slot = TypeNode::Bound(to);
                let widened = self.type_flags[to.raw() as usize];
                self.type_flags[var.raw() as usize] |= widened;
            }
            other => {
                error!(var = var.raw(), node = ?other, "bind target is not a free variable");
                self.invariant_breaks
                    .push(format!("bind target {} is not a free variable", var.raw()));
            }
        }
    }

    /// Bind a free pack variable to a target pack.
    pub fn bind_pack(&mut self, var: PackId, to: PackId) {
        let slot = &mut self.packs[var.raw() as usize];
        match slot {
            PackNode::Free { .. } => {
                *slot = PackNode::Bound(to);
                let widened = self.pack_flags[to.raw() as usize];
                self.pack_flags[var.raw() as usize] |= widened;
            }
            other => {
                error!(pack = var.raw(), node = ?other, "bind target is not a free pack");
                self.invariant_breaks
                    .push(format!("bind target pack {} is not a free pack", var.raw()));
            }
        }
    }

    /// Rewrite a free variable into a generic parameter. Used by
    /// generalization; the `HAS_FREE` flag is left set (flags are
    /// conservative) and `HAS_GENERIC` is added.
    pub fn promote_to_generic(&mut self, var: TypeId, name: Option<Name>, level: Level) {
        let slot = &mut self.types[var.raw() as usize];
        match slot {
            TypeNode::Free { .. } => {
                *slot = TypeNode::Generic { name, level };
                self.type_flags[var.raw() as usize] |= TypeFlags::HAS_GENERIC;
            }
            other => {
                error!(var = var.raw(), node = ?other, "promotion target is not a free variable");
                self.invariant_breaks
                    .push(format!("promotion target {} is not a free variable", var.raw()));
            }
        }
    }

    /// Add a property to an extensible table, widening the table's
    /// flags with the property type's.
    pub fn add_prop(&mut self, table: TypeId, name: Name, ty: TypeId, span: Span) {
        let prop_flags = self.type_flags[ty.raw() as usize];
        match &mut self.types[table.raw() as usize] {
            TypeNode::Table(tt) if tt.is_extensible() => {
                tt.props.push(TableProp { name, ty, read_only: false, span });
                self.type_flags[table.raw() as usize] |= prop_flags;
            }
            other => {
                error!(table = table.raw(), node = ?other, "property added to a non-extensible node");
                self.invariant_breaks
                    .push(format!("property added to non-extensible node {}", table.raw()));
            }
        }
    }

    /// Set a table's indexer.
    pub fn set_indexer(&mut self, table: TypeId, indexer: Indexer) {
        let widened =
            self.type_flags[indexer.key.raw() as usize] | self.type_flags[indexer.value.raw() as usize];
        match &mut self.types[table.raw() as usize] {
            TypeNode::Table(tt) => {
                tt.indexer = Some(indexer);
                self.type_flags[table.raw() as usize] |= widened;
            }
            other => {
                error!(table = table.raw(), node = ?other, "indexer set on a non-table node");
                self.invariant_breaks
                    .push(format!("indexer set on non-table node {}", table.raw()));
            }
        }
    }

    /// Attach a metatable to a table.
    pub fn set_metatable(&mut self, table: TypeId, metatable: TypeId) {
        let widened = self.type_flags[metatable.raw() as usize];
        match &mut self.types[table.raw() as usize] {
            TypeNode::Table(tt) => {
                tt.metatable = Some(metatable);
                self.type_flags[table.raw() as usize] |= widened;
            }
            other => {
                error!(table = table.raw(), node = ?other, "metatable set on a non-table node");
                self.invariant_breaks
                    .push(format!("metatable set on non-table node {}", table.raw()));
            }
        }
    }

    /// Drain the invariant-break messages recorded so far.
    pub fn take_invariant_breaks(&mut self) -> Vec<String> {
        std::mem::take(&mut self.invariant_breaks)
    }

    /// Seal a table: no further property additions.
    pub fn seal(&mut self, table: TypeId) {
        if let TypeNode::Table(tt) = &mut self.types[table.raw() as usize] {
            tt.state = TableState::Sealed;
        }
    }

    /// Remove the last property of a table. Supports unification
    /// rollback; callers must pair this with the `add_prop` it undoes.
    pub(crate) fn pop_prop(&mut self, table: TypeId) {
        if let TypeNode::Table(tt) = &mut self.types[table.raw() as usize] {
            tt.props.pop();
        }
    }

    /// Widen a type's flags. Generalization uses this to mark every
    /// node on a path to a promoted generic, so instantiation's flag
    /// gate stays sound after in-place promotion.
    pub(crate) fn or_flags(&mut self, id: TypeId, flags: TypeFlags) {
        self.type_flags[id.raw() as usize] |= flags;
    }

    /// Widen a pack's flags.
    pub(crate) fn or_pack_flags(&mut self, id: PackId, flags: TypeFlags) {
        self.pack_flags[id.raw() as usize] |= flags;
    }

    /// Replace a node wholesale, widening its flags with the new
    /// shape's. Instantiation uses this to fill pre-allocated clones
    /// of cyclic tables.
    pub(crate) fn replace_node(&mut self, id: TypeId, node: TypeNode) {
        let flags = own_flags(&node) | self.child_flags(&node);
        self.types[id.raw() as usize] = node;
        self.type_flags[id.raw() as usize] |= flags;
    }

    /// Rewrite a free pack into a generic pack parameter.
    pub fn promote_pack_to_generic(&mut self, var: PackId, name: Option<Name>) {
        let slot = &mut self.packs[var.raw() as usize];
        match slot {
            PackNode::Free { .. } => {
                *slot = PackNode::Generic { name };
                self.pack_flags[var.raw() as usize] |= TypeFlags::HAS_GENERIC;
            }
            other => {
                error!(pack = var.raw(), node = ?other, "promotion target is not a free pack");
                self.invariant_breaks
                    .push(format!("promotion target pack {} is not a free pack", var.raw()));
            }
        }
    }

    /// Remove a table's indexer. Supports unification rollback.
    pub(crate) fn clear_indexer(&mut self, table: TypeId) {
        if let TypeNode::Table(tt) = &mut self.types[table.raw() as usize] {
            tt.indexer = None;
        }
    }

    /// Reset a bound variable back to `Free`. Supports unification
    /// rollback.
    pub(crate) fn unbind(&mut self, var: TypeId, level: Level) {
        self.types[var.raw() as usize] = TypeNode::Free { level };
    }

    /// Reset a bound pack back to `Free`. Supports unification
    /// rollback.
    pub(crate) fn unbind_pack(&mut self, var: PackId, level: Level) {
        self.packs[var.raw() as usize] = PackNode::Free { level };
    }

    /// Lower a free variable's level in place. Used when a variable
    /// escapes into an outer scope and must not be generalized there.
    pub fn clamp_level(&mut self, var: TypeId, max: Level) {
        if let TypeNode::Free { level } = &mut self.types[var.raw() as usize] {
            *level = (*level).min(max);
        }
    }

    /// Lower a free pack's level in place.
    pub fn clamp_pack_level(&mut self, var: PackId, max: Level) {
        if let PackNode::Free { level } = &mut self.packs[var.raw() as usize] {
            *level = (*level).min(max);
        }
    }

    /// Lower a table's creation level in place. A table escaping into
    /// an outer scope may no longer be mutated by inner ones.
    pub fn clamp_table_level(&mut self, table: TypeId, max: Level) {
        if let TypeNode::Table(tt) = &mut self.types[table.raw() as usize] {
            tt.level = tt.level.min(max);
        }
    }

    /// Record the generic parameters a function quantifies. Used by
    /// generalization after promoting the function's escaped frees.
    pub fn set_function_generics(
        &mut self,
        func: TypeId,
        generics: smallvec::SmallVec<[TypeId; 2]>,
        generic_packs: smallvec::SmallVec<[PackId; 1]>,
    ) {
        match &mut self.types[func.raw() as usize] {
            TypeNode::Function(ft) => {
                ft.generics = generics;
                ft.generic_packs = generic_packs;
                self.type_flags[func.raw() as usize] |= TypeFlags::HAS_GENERIC;
            }
            other => {
                error!(func = func.raw(), node = ?other, "generics set on a non-function node");
                self.invariant_breaks
                    .push(format!("generics set on non-function node {}", func.raw()));
            }
        }
    }

    // === Flag propagation ===

    fn child_flags(&self, node: &TypeNode) -> TypeFlags {
        let mut flags = TypeFlags::empty();
        match node {
            TypeNode::Prim(_) | TypeNode::Free { .. } | TypeNode::Generic { .. } => {}
            TypeNode::Bound(inner) => flags |= self.flags(*inner),
            TypeNode::Table(tt) => {
                for prop in &tt.props {
                    flags |= self.flags(prop.ty);
                }
                if let Some(ix) = tt.indexer {
                    flags |= self.flags(ix.key) | self.flags(ix.value);
                }
                if let Some(mt) = tt.metatable {
                    flags |= self.flags(mt);
                }
            }
            TypeNode::Function(ft) => {
                flags |= self.pack_flags(ft.params) | self.pack_flags(ft.rets);
            }
            TypeNode::Union(members) | TypeNode::Intersection(members) => {
                for &m in members {
                    flags |= self.flags(m);
                }
            }
        }
        flags & TypeFlags::PROPAGATE
    }

    fn pack_own_flags(&self, node: &PackNode) -> TypeFlags {
        match node {
            PackNode::List { head, tail } => {
                let mut flags = TypeFlags::empty();
                for &ty in head {
                    flags |= self.flags(ty);
                }
                if let Some(tail) = tail {
                    flags |= self.pack_flags(*tail);
                }
                flags
            }
            PackNode::Free { .. } => TypeFlags::HAS_FREE,
            PackNode::Bound(inner) => self.pack_flags(*inner),
            PackNode::Variadic(ty) => self.flags(*ty),
            PackNode::Generic { .. } => TypeFlags::HAS_GENERIC,
        }
    }
}

fn push_unique(list: &mut TypeList, id: TypeId) {
    if !list.contains(&id) {
        list.push(id);
    }
}
