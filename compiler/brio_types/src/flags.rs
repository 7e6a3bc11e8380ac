//! Conservative per-type structural flags.
//!
//! Flags are computed once at allocation from a node's immediate
//! children and are an over-approximation thereafter: in-place
//! mutation (binding a free variable, adding a table property) can
//! clear a property without clearing the flag. Callers may therefore
//! skip work when a flag is *unset* but must still traverse when it is
//! set.

use bitflags::bitflags;

bitflags! {
    /// Structural facts about a type, propagated from children at
    /// allocation time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TypeFlags: u8 {
        /// Contains (or may contain) an unbound free variable.
        const HAS_FREE = 1 << 0;
        /// Contains (or may contain) a generic type parameter.
        const HAS_GENERIC = 1 << 1;
        /// Contains the error sentinel somewhere.
        const HAS_ERROR = 1 << 2;
    }
}

impl TypeFlags {
    /// Flags that propagate from a child type to its parent.
    pub const PROPAGATE: Self = Self::all();
}
