//! Structured diagnostics for the Brio type checker.
//!
//! The checker never prints; it produces an ordered sequence of
//! [`Diagnostic`] values, each carrying an [`ErrorCode`], a [`Severity`],
//! a source span, and a rendered message. Formatting for terminals,
//! editors, or JSON is a consumer concern.

mod diagnostic;
mod error_code;
mod sink;

pub use diagnostic::{Diagnostic, Label, Severity};
pub use error_code::ErrorCode;
pub use sink::DiagnosticSink;
