//! Parse-time and resolve-time errors.

use thiserror::Error;

/// Error type user-supplied references and functions report failures with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A template or expression could not be built.
///
/// Parsing is all-or-nothing: when this is returned no partial template
/// exists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("source cannot contain reserved characters")]
    InvalidSource,

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("parentheses do not match")]
    UnbalancedParentheses,

    #[error("expression must not be empty")]
    EmptyExpression,

    #[error("unterminated literal: missing closing {0:?}")]
    UnterminatedLiteral(char),

    #[error("expression contains invalid operator {0}")]
    InvalidOperator(String),

    #[error("expression contains an operator in an invalid position: {0}")]
    MisplacedOperator(String),

    #[error("expression missing expected operator")]
    MissingOperator,

    #[error("{0} must be a function")]
    UnknownFunction(String),

    #[error("reference factory returned no resolver for {0:?}")]
    InvalidReferenceFactory(String),

    #[error("{0} must be a boolean, number, string or null")]
    InvalidConstantType(String),
}

/// A user reference or function failed during `resolve`.
///
/// The engine never wraps or rewrites these: `Display` and `source()` are
/// those of the original error, and [`ResolveError::into_inner`] returns it.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ResolveError(#[from] BoxError);

impl ResolveError {
    pub fn into_inner(self) -> BoxError {
        self.0
    }

    /// Borrow the original error, e.g. for `downcast_ref`.
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        &*self.0
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
