//! Ordered diagnostic collection.
//!
//! The checker pushes diagnostics as it walks statements; order is
//! therefore already source order within a file. The sink adds an error
//! limit and same-span deduplication so one bad expression cannot flood
//! the consumer.

use brio_ast::Span;

use crate::{Diagnostic, ErrorCode};

/// Ordered sink for diagnostics with a soft error limit.
#[derive(Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    /// Maximum number of errors before further errors are dropped
    /// (0 = unlimited).
    error_limit: usize,
    /// Last (code, span) pushed, for adjacent-duplicate suppression.
    last: Option<(ErrorCode, Span)>,
}

impl DiagnosticSink {
    /// Create a sink with the default error limit.
    pub fn new() -> Self {
        DiagnosticSink {
            error_limit: 100,
            ..DiagnosticSink::default()
        }
    }

    /// Create a sink with a specific error limit (0 = unlimited).
    pub fn with_limit(error_limit: usize) -> Self {
        DiagnosticSink {
            error_limit,
            ..DiagnosticSink::default()
        }
    }

    /// Create a sink with no error limit and no deduplication suppression.
    pub fn unlimited() -> Self {
        DiagnosticSink::default()
    }

    /// Push a diagnostic, applying limit and duplicate suppression.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_error() {
            if self.error_limit > 0 && self.error_count >= self.error_limit {
                return;
            }
            // Identical code on the identical span is always the same report.
            if self.last == Some((diagnostic.code, diagnostic.span)) {
                return;
            }
            self.last = Some((diagnostic.code, diagnostic.span));
            self.error_count += 1;
        }
        self.diagnostics.push(diagnostic);
    }

    /// Number of error-severity diagnostics collected.
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// Whether any errors were collected.
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Borrow the collected diagnostics in emission order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Consume the sink, returning the ordered diagnostics.
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}
