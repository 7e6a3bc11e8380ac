//! Lexical scopes and branch-local refinements.
//!
//! Scopes form a tree indexed by [`ScopeId`]; lookups walk the parent
//! chain. A scope carries the plain bindings it declares plus the
//! refinements a branch condition established for lvalues visible in
//! it. Refinements shadow bindings on the way up but never replace
//! them: an assignment resets the lvalue to its declared type for
//! the rest of the branch.

use brio_ast::{LValue, Name, Span};
use rustc_hash::FxHashMap;

use crate::id::{PackId, TypeId};
use crate::level::Level;

/// Handle to a scope in a [`Scopes`] tree.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(transparent)]
pub struct ScopeId(u32);

impl ScopeId {
    /// The module root scope.
    pub const ROOT: Self = Self(0);

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A declared variable.
#[derive(Copy, Clone, Debug)]
pub struct Binding {
    pub ty: TypeId,
    /// Where the variable was declared.
    pub def_span: Span,
}

/// One lexical scope.
pub struct Scope {
    parent: Option<ScopeId>,
    level: Level,
    bindings: FxHashMap<Name, Binding>,
    refinements: FxHashMap<LValue, TypeId>,
    /// The `...` pack, set on vararg function scopes.
    vararg: Option<PackId>,
    /// The return pack `return` statements unify into, set on function
    /// scopes.
    return_pack: Option<PackId>,
}

impl Scope {
    fn new(parent: Option<ScopeId>, level: Level) -> Self {
        Self {
            parent,
            level,
            bindings: FxHashMap::default(),
            refinements: FxHashMap::default(),
            vararg: None,
            return_pack: None,
        }
    }
}

/// The scope tree for one checking session.
pub struct Scopes {
    scopes: Vec<Scope>,
}

impl Scopes {
    /// A tree containing only the root scope.
    pub fn new() -> Self {
        Self { scopes: vec![Scope::new(None, Level::ROOT)] }
    }

    /// Create a child scope at the same level (blocks, branches).
    pub fn child(&mut self, parent: ScopeId) -> ScopeId {
        let level = self.level(parent);
        self.push(Scope::new(Some(parent), level))
    }

    /// Create a child scope one level deeper (function bodies).
    pub fn function_child(&mut self, parent: ScopeId, returns: PackId) -> ScopeId {
        let level = self.level(parent).next();
        let mut scope = Scope::new(Some(parent), level);
        scope.return_pack = Some(returns);
        self.push(scope)
    }

    fn push(&mut self, scope: Scope) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(scope);
        id
    }

    /// The generalization level of a scope.
    pub fn level(&self, id: ScopeId) -> Level {
        self.scopes[id.index()].level
    }

    /// Declare a variable in a scope, shadowing outer declarations.
    pub fn declare(&mut self, id: ScopeId, name: Name, ty: TypeId, def_span: Span) {
        self.scopes[id.index()].bindings.insert(name, Binding { ty, def_span });
    }

    /// Look up the declared binding of a name, walking outward.
    pub fn lookup(&self, id: ScopeId, name: Name) -> Option<Binding> {
        let mut cur = Some(id);
        while let Some(scope_id) = cur {
            let scope = &self.scopes[scope_id.index()];
            if let Some(binding) = scope.bindings.get(&name) {
                return Some(*binding);
            }
            cur = scope.parent;
        }
        None
    }

    /// Rebind a declared variable in the scope that declared it.
    /// Returns false if the name is not declared anywhere.
    pub fn rebind(&mut self, id: ScopeId, name: Name, ty: TypeId) -> bool {
        let mut cur = Some(id);
        while let Some(scope_id) = cur {
            let scope = &mut self.scopes[scope_id.index()];
            if let Some(binding) = scope.bindings.get_mut(&name) {
                binding.ty = ty;
                return true;
            }
            cur = scope.parent;
        }
        false
    }

    /// Record a refinement for an lvalue in this scope.
    pub fn refine(&mut self, id: ScopeId, lvalue: LValue, ty: TypeId) {
        self.scopes[id.index()].refinements.insert(lvalue, ty);
    }

    /// Drop any refinement of an lvalue after an assignment, restoring
    /// the declared type for subsequent reads in this branch.
    pub fn clear_refinement(&mut self, id: ScopeId, lvalue: &LValue, declared: TypeId) {
        // Refinements in outer scopes cannot be removed from here, so
        // the reset is recorded as a refinement to the declared type.
        self.scopes[id.index()].refinements.insert(lvalue.clone(), declared);
    }

    /// The type an lvalue reads as: the innermost refinement if one is
    /// visible, otherwise `None` (caller falls back to the binding).
    pub fn refined(&self, id: ScopeId, lvalue: &LValue) -> Option<TypeId> {
        let mut cur = Some(id);
        while let Some(scope_id) = cur {
            let scope = &self.scopes[scope_id.index()];
            if let Some(&ty) = scope.refinements.get(lvalue) {
                return Some(ty);
            }
            // A scope that redeclares the base name cuts off outer
            // refinements of paths rooted at it.
            if scope.bindings.contains_key(&lvalue.base) {
                return None;
            }
            cur = scope.parent;
        }
        None
    }

    /// Set the return pack of a scope directly. Used for the module
    /// root, which behaves like a vararg function body.
    pub fn set_return_pack(&mut self, id: ScopeId, pack: PackId) {
        self.scopes[id.index()].return_pack = Some(pack);
    }

    /// Set the `...` pack for a vararg function scope.
    pub fn set_vararg(&mut self, id: ScopeId, pack: PackId) {
        self.scopes[id.index()].vararg = Some(pack);
    }

    /// The `...` pack visible in a scope, if inside a vararg function.
    /// The walk stops at the enclosing function boundary.
    pub fn vararg(&self, id: ScopeId) -> Option<PackId> {
        let mut cur = Some(id);
        while let Some(scope_id) = cur {
            let scope = &self.scopes[scope_id.index()];
            if let Some(pack) = scope.vararg {
                return Some(pack);
            }
            if scope.return_pack.is_some() {
                return None;
            }
            cur = scope.parent;
        }
        None
    }

    /// The return pack of the enclosing function, if any.
    pub fn return_pack(&self, id: ScopeId) -> Option<PackId> {
        let mut cur = Some(id);
        while let Some(scope_id) = cur {
            let scope = &self.scopes[scope_id.index()];
            if let Some(pack) = scope.return_pack {
                return Some(pack);
            }
            cur = scope.parent;
        }
        None
    }
}

impl Default for Scopes {
    fn default() -> Self {
        Self::new()
    }
}
