//! Rich diagnostic error types for the thoth engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text. Every variant is a local, synchronous,
//! recoverable failure: a failing operation never leaves the store in a partial
//! state, and search exhaustion (no match, unprovable goal, depth cap reached)
//! is an empty result, not an error.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the thoth engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum ThothError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Space(#[from] SpaceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Reason(#[from] ReasonError),
}

// ---------------------------------------------------------------------------
// Atom store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SpaceError {
    #[error("atom not found: {id}")]
    #[diagnostic(
        code(thoth::space::not_found),
        help("The requested atom id does not exist in this store. Verify the id is correct and was not removed.")
    )]
    NotFound { id: u64 },

    #[error("link outgoing set references unknown atom {missing}")]
    #[diagnostic(
        code(thoth::space::invalid_reference),
        help(
            "Every id in a link's outgoing set must resolve to a live atom \
             in the same store. Add the referenced atoms first."
        )
    )]
    InvalidReference { missing: u64 },

    #[error("atom {id} is still referenced by {referrers} link(s)")]
    #[diagnostic(
        code(thoth::space::referenced_by_others),
        help(
            "Removing this atom would leave dangling hyperedges. \
             Remove the referencing links first, or use RemovePolicy::Cascade."
        )
    )]
    ReferencedByOthers { id: u64, referrers: usize },

    #[error("invalid snapshot at record {index}: {message}")]
    #[diagnostic(
        code(thoth::space::invalid_snapshot),
        help(
            "Snapshot records must be topologically ordered: a link may only \
             reference ids that appear earlier in the snapshot or are already \
             present in the store. The store was left unchanged."
        )
    )]
    InvalidSnapshot { index: usize, message: String },

    #[error("atom id allocator exhausted")]
    #[diagnostic(
        code(thoth::space::id_exhausted),
        help(
            "The id space is exhausted. This requires 2^64 allocations and \
             should never happen in practice. Check for an allocation loop."
        )
    )]
    IdExhausted,
}

// ---------------------------------------------------------------------------
// Pattern errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum PatternError {
    #[error("invalid pattern: {message}")]
    #[diagnostic(
        code(thoth::pattern::invalid_pattern),
        help(
            "Patterns are validated eagerly before any traversal. Common causes: \
             a shape with no constraints at all, the same variable carrying two \
             different type constraints, an empty variable name, or nesting \
             deeper than the structural guard allows."
        )
    )]
    InvalidPattern { message: String },
}

// ---------------------------------------------------------------------------
// Reasoning errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ReasonError {
    #[error("rule '{rule_name}': conclusion variable ${variable} is not bound by any premise")]
    #[diagnostic(
        code(thoth::reason::unbound_conclusion_variable),
        help(
            "Every variable in a rule's conclusion must appear in at least one \
             premise, otherwise forward chaining cannot instantiate it."
        )
    )]
    UnboundConclusionVariable { rule_name: String, variable: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Space(#[from] SpaceError),
}

/// Convenience alias for functions returning thoth results.
pub type ThothResult<T> = std::result::Result<T, ThothError>;
