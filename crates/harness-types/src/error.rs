//! Unified error taxonomy for the harness.
//!
//! Per the engine's propagation policy, this type is reserved for the narrow
//! set of conditions allowed to escape a component as a caller-visible error
//! (misuse, refused construction). Everything a stage or probe can fail on
//! in the ordinary course of testing a server is captured as data inside the
//! record it was building, not returned as an `Err`.

use thiserror::Error;

/// Result type alias used at harness API boundaries.
pub type HarnessResult<T> = Result<T, HarnessError>;

/// The seven error kinds of the engine's flat taxonomy.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// `SafeInvoker` refused to construct a subprocess: the inputs did not
    /// meet the path/name/argument discipline rules.
    #[error("validation refused: {0}")]
    ValidationRefused(String),

    /// An optional external tool was not found on `PATH`. Callers degrade
    /// this to a warning on the owning record rather than propagate it;
    /// the variant exists so that code which cannot recover in place still
    /// has a typed way to say so.
    #[error("external tool absent: {0}")]
    ExternalToolAbsent(String),

    /// An external tool ran and returned a failing exit status.
    #[error("external tool failed: {0}")]
    ExternalToolFailure(String),

    /// A transport-level failure: malformed frame, unmatched response,
    /// closed stream.
    #[error("transport error: {0}")]
    Transport(String),

    /// The deepest deadline that applied to an operation fired first.
    #[error("timed out: {0}")]
    Timeout(String),

    /// A response violated one of the MCP shape contracts.
    #[error("protocol conformance failure: {0}")]
    ProtocolConformance(String),

    /// Misuse of the engine's API: reentrant pipeline invocation, invalid
    /// configuration, or any other condition that is a bug in the caller
    /// rather than a property of the server under test.
    #[error("internal/misuse error: {0}")]
    Internal(String),
}

impl HarnessError {
    /// Human-readable kind name, used by Diagnostics and the reporters to
    /// bucket errors without matching on the `Display` string.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::ValidationRefused(_) => "validation_refused",
            Self::ExternalToolAbsent(_) => "external_tool_absent",
            Self::ExternalToolFailure(_) => "external_tool_failure",
            Self::Transport(_) => "transport",
            Self::Timeout(_) => "timeout",
            Self::ProtocolConformance(_) => "protocol_conformance",
            Self::Internal(_) => "internal",
        }
    }
}
