//! Arena handles for types and type packs.
//!
//! All type nodes live in a [`crate::Pool`] and are referenced by a
//! 32-bit handle. Handles are stable for the lifetime of the pool;
//! nodes are mutated in place (free-variable binding, table property
//! addition) and never individually freed. Cyclic structures are
//! therefore just handles that point back into the arena, with no
//! ownership cycles.

use std::fmt;

/// A 32-bit handle to a type node in the pool.
///
/// Primitive and sentinel types are pre-allocated at fixed indices so
/// they can be named as constants and compared without a pool.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct TypeId(u32);

impl TypeId {
    // === Pre-allocated types (indices 0-8) ===

    /// The `nil` type.
    pub const NIL: Self = Self(0);
    /// The `boolean` type.
    pub const BOOLEAN: Self = Self(1);
    /// The `number` type.
    pub const NUMBER: Self = Self(2);
    /// The `string` type.
    pub const STRING: Self = Self(3);
    /// The `thread` (coroutine) type.
    pub const THREAD: Self = Self(4);
    /// The `any` type: unifies with everything, both ways.
    pub const ANY: Self = Self(5);
    /// The `unknown` type (top).
    pub const UNKNOWN: Self = Self(6);
    /// The `never` type (bottom).
    pub const NEVER: Self = Self(7);
    /// The error sentinel: already reported, don't cascade.
    pub const ERROR: Self = Self(8);

    /// Number of pre-allocated types.
    pub const PRE_ALLOCATED: u32 = 9;

    /// Create a handle from a raw index.
    ///
    /// The caller must ensure the index is valid in the pool it is
    /// used with.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw index.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Check if this is a pre-allocated primitive or sentinel.
    #[inline]
    pub const fn is_pre_allocated(self) -> bool {
        self.0 < Self::PRE_ALLOCATED
    }

    /// Check if this is the error sentinel.
    #[inline]
    pub const fn is_error(self) -> bool {
        self.0 == Self::ERROR.0
    }

    /// Human-readable name for pre-allocated types, `None` otherwise.
    #[inline]
    pub const fn name(self) -> Option<&'static str> {
        match self.0 {
            0 => Some("nil"),
            1 => Some("boolean"),
            2 => Some("number"),
            3 => Some("string"),
            4 => Some("thread"),
            5 => Some("any"),
            6 => Some("unknown"),
            7 => Some("never"),
            8 => Some("<error>"),
            _ => None,
        }
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "TypeId({name})"),
            None => write!(f, "TypeId({})", self.0),
        }
    }
}

/// A 32-bit handle to a type-pack node in the pool.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct PackId(u32);

impl PackId {
    // === Pre-allocated packs (indices 0-2) ===

    /// The empty, closed pack `()`.
    pub const EMPTY: Self = Self(0);
    /// The unconstrained pack `...any`.
    pub const ANY: Self = Self(1);
    /// The error pack `...<error>`.
    pub const ERROR: Self = Self(2);

    /// Number of pre-allocated packs.
    pub const PRE_ALLOCATED: u32 = 3;

    /// Create a handle from a raw index.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw index.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for PackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::EMPTY => write!(f, "PackId(())"),
            Self::ANY => write!(f, "PackId(...any)"),
            Self::ERROR => write!(f, "PackId(...<error>)"),
            Self(raw) => write!(f, "PackId({raw})"),
        }
    }
}

// Handles must stay register-sized.
const _: () = assert!(std::mem::size_of::<TypeId>() == 4);
const _: () = assert!(std::mem::size_of::<PackId>() == 4);
