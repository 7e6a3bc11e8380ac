//! Inference limits and feature toggles.

/// Tunable limits and toggles for one checking session.
///
/// The limits bound worst-case unification and normalization so
/// pathological programs fail with a "too complex" diagnostic instead
/// of hanging the checker. Defaults are generous; real code stays far
/// below them.
#[derive(Debug, Clone)]
pub struct Config {
    /// Upper bound on pack unification steps in one top-level unify
    /// call. Exceeding it reports `UnificationTooComplex`.
    pub iteration_limit: usize,
    /// Upper bound on the number of type pairs one top-level unify
    /// call may expand through tables and functions.
    pub child_expansion_limit: usize,
    /// Upper bound on types visited while computing a normal form.
    pub normalization_limit: usize,
    /// Cap on reported errors before the sink stops recording.
    pub error_limit: usize,
    /// Broken internal invariants are always logged and checking
    /// continues on the error sentinel. When this is false they are
    /// also reported as `internal checker error` diagnostics.
    pub fail_open_internal_errors: bool,
    /// Infer operand types from arithmetic use (`a + b` constrains
    /// both sides to `number`) rather than only checking them.
    pub lower_bounds_calculation: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            iteration_limit: 512,
            child_expansion_limit: 32,
            normalization_limit: 256,
            error_limit: 100,
            fail_open_internal_errors: true,
            lower_bounds_calculation: true,
        }
    }
}

impl Config {
    /// Tight limits for tests that exercise complexity failures.
    #[cfg(test)]
    pub(crate) fn strict(child_expansion_limit: usize) -> Self {
        Self { child_expansion_limit, ..Self::default() }
    }
}
