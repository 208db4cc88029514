//! Harness error taxonomy.
//!
//! Fixture authoring mistakes (unknown or reused ids) are errors here;
//! allocator misbehavior is never an error; it is a failed
//! [`crate::VerificationResult`].

use thiserror::Error;

/// Errors surfaced by fixture loading and trace replay.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Fixture file could not be read.
    #[error("fixture i/o: {0}")]
    Io(#[from] std::io::Error),
    /// Fixture JSON did not match the trace schema.
    #[error("fixture parse: {0}")]
    Parse(#[from] serde_json::Error),
    /// An operation referenced an id with no live binding.
    #[error("case {case}: op references unknown id {id}")]
    UnknownId { case: String, id: u32 },
    /// An allocation operation reused an id that is still live.
    #[error("case {case}: op reuses live id {id}")]
    DuplicateId { case: String, id: u32 },
}
