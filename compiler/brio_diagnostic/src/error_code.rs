use std::fmt;

/// Error codes for all checker diagnostics.
///
/// Format: E#### where the first digit indicates the phase:
/// - E2xxx: Type errors
/// - E9xxx: Internal invariant violations (downgraded, never fatal)
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ErrorCode {
    // Type Errors (E2xxx)
    /// Type mismatch
    E2001,
    /// Occurs check failed (type would contain itself)
    E2002,
    /// Unification exceeded complexity limits
    E2003,
    /// Normalization exceeded complexity limits
    E2004,
    /// Unknown identifier
    E2005,
    /// Value is not callable
    E2006,
    /// Missing table property
    E2007,
    /// Value count mismatch (arguments or returns)
    E2008,
    /// Unknown type annotation
    E2009,
    /// Property is read-only at this use site
    E2010,
    /// Free-text semantic error (metamethods, builtin misuse)
    E2011,

    // Internal (E9xxx)
    /// Internal invariant violated; checking degraded to `any`
    E9001,
}

impl ErrorCode {
    /// Short description of what the code means.
    pub const fn description(self) -> &'static str {
        match self {
            ErrorCode::E2001 => "type mismatch",
            ErrorCode::E2002 => "occurs check failed",
            ErrorCode::E2003 => "unification too complex",
            ErrorCode::E2004 => "normalization too complex",
            ErrorCode::E2005 => "unknown identifier",
            ErrorCode::E2006 => "value is not callable",
            ErrorCode::E2007 => "missing property",
            ErrorCode::E2008 => "value count mismatch",
            ErrorCode::E2009 => "unknown type annotation",
            ErrorCode::E2010 => "property is read-only",
            ErrorCode::E2011 => "semantic error",
            ErrorCode::E9001 => "internal invariant violated",
        }
    }

    /// Whether this code marks an internal (downgraded) failure.
    pub const fn is_internal(self) -> bool {
        matches!(self, ErrorCode::E9001)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
