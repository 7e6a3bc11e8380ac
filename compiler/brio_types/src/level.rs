//! Scope level for generalization decisions.
//!
//! Every free type variable is tagged with the level of the scope that
//! created it. A variable can be quantified when the function whose body
//! introduced it finishes checking; a variable shared with an enclosing
//! scope (lower level) escapes quantification.
//!
//! Unifying a free variable with a type containing deeper (higher-level)
//! frees demotes those frees to the shallower level, so they can no
//! longer be generalized by the inner function. That is what prevents
//! unsound generalization of escaping variables.

/// Lexical nesting depth at which a free type variable was created.
///
/// Levels strictly increase with function nesting. Higher levels are
/// deeper scopes.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
#[repr(transparent)]
pub struct Level(u16);

impl Level {
    /// The module root scope (builtins and top-level bindings).
    pub const ROOT: Self = Self(0);

    /// Maximum level (prevents overflow in deeply nested code).
    pub const MAX: Self = Self(u16::MAX - 1);

    /// Create a level from a raw value.
    #[inline]
    pub const fn from_raw(value: u16) -> Self {
        Self(value)
    }

    /// Get the raw level value.
    #[inline]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// The next (deeper) level. Saturates at `MAX`.
    #[inline]
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1).min(Self::MAX.0))
    }

    /// The previous (shallower) level. Saturates at `ROOT`.
    #[inline]
    #[must_use]
    pub fn prev(self) -> Self {
        Self(self.0.saturating_sub(1))
    }

    /// Whether a variable at this level may be quantified when the
    /// function defined at `defining_level` finishes checking.
    ///
    /// True when the variable was introduced at or inside that function.
    #[inline]
    pub fn can_generalize_at(self, defining_level: Self) -> bool {
        self >= defining_level
    }

    /// The shallower of two levels.
    #[inline]
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        if self <= other {
            self
        } else {
            other
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{}", self.0)
    }
}
