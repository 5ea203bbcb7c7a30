use thiserror::Error;

/// Errors raised by the synchronization engine.
///
/// Synchronous validation errors (`OutOfBounds`, `PermissionDenied`,
/// `MalformedOperation`) are returned to the caller without mutating any
/// client state. `InvariantViolated` is fatal: it means either the text
/// operation algebra produced an impossible result or the peer violated the
/// OT protocol, and the client must be reconstructed after it occurs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error("operation is not well-formed: {0}")]
    MalformedOperation(String),

    #[error("operation base length does not match the string it was applied to")]
    OperationLengthMismatch,

    #[error("edit range [{pos}, {end}) is out of bounds for a document of length {len}")]
    OutOfBounds { pos: usize, end: usize, len: usize },

    #[error("the current permission level does not allow edits")]
    PermissionDenied,

    #[error("not connected to a session")]
    NotConnected,

    #[error("timed out waiting for server acknowledgment")]
    OperationTimeout,

    #[error("queued operation was dropped after reconnect: {0}")]
    OperationDropped(String),

    #[error("OT invariant violated in {context}: {detail}")]
    InvariantViolated {
        context: &'static str,
        detail: String,
    },
}

impl SyncError {
    pub fn invariant(context: &'static str, detail: impl Into<String>) -> Self {
        SyncError::InvariantViolated {
            context,
            detail: detail.into(),
        }
    }
}
