//! The OT client state machine: holds the three synchronization states and
//! drives transitions on local edit, server acknowledgment, and server
//! operation, per §4.2. This module only knows about the text-operation
//! algebra and the replica; it is transport-agnostic (the [`crate::queue`]
//! and [`crate::session`] modules decide when to actually put bytes on the
//! wire).

use crate::error::SyncError;
use crate::ot::TextOperation;

/// The three-state OT protocol described in §3/§4.2. Only one operation is
/// ever in flight at a time: that invariant is enforced structurally by
/// this enum having exactly one variant that carries an in-flight op.
#[derive(Debug, Clone, PartialEq)]
pub enum OtClientState {
    Synchronized,
    AwaitingConfirm(TextOperation),
    AwaitingWithBuffer(TextOperation, TextOperation),
}

/// What the caller should do after a state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalOutcome {
    /// The client was `Synchronized`; this operation must be sent now.
    Send(TextOperation),
    /// The client was already waiting on an in-flight operation; this
    /// operation was folded into the buffer and nothing goes out yet.
    Buffered,
}

/// What the caller should do after a server acknowledgment.
#[derive(Debug, Clone, PartialEq)]
pub enum AckOutcome {
    /// There was nothing buffered; the client is now idle.
    Idle,
    /// The buffer must now be sent as the new in-flight operation.
    Send(TextOperation),
}

#[derive(Debug, Clone)]
pub struct OtClient {
    state: OtClientState,
    document: String,
    revision: u64,
}

impl OtClient {
    pub fn new(document: String, revision: u64) -> Self {
        Self {
            state: OtClientState::Synchronized,
            document,
            revision,
        }
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn state(&self) -> &OtClientState {
        &self.state
    }

    pub fn is_synchronized(&self) -> bool {
        matches!(self.state, OtClientState::Synchronized)
    }

    /// Hard-resets document/revision and returns to `Synchronized`,
    /// discarding any in-flight/buffered operation. Used on `connect` and
    /// on the hard replace that follows a successful reconnect (§4.5).
    pub fn reset(&mut self, document: String, revision: u64) {
        self.state = OtClientState::Synchronized;
        self.document = document;
        self.revision = revision;
    }

    /// Consumes `self`, returning whatever operation(s) were in flight or
    /// buffered, in the order they were originally applied locally. The
    /// server never acknowledged them, so from its point of view they
    /// never happened; the caller is expected to replay them as fresh
    /// local edits against a new base (§4.5).
    pub fn into_pending(self) -> Vec<TextOperation> {
        match self.state {
            OtClientState::Synchronized => Vec::new(),
            OtClientState::AwaitingConfirm(sent) => vec![sent],
            OtClientState::AwaitingWithBuffer(sent, buf) => vec![sent, buf],
        }
    }

    /// A local edit was made. The replica is updated immediately; the
    /// return value tells the caller whether to send `op` now or whether
    /// it was folded into the in-flight buffer.
    pub fn apply_local(&mut self, op: TextOperation) -> Result<LocalOutcome, SyncError> {
        match std::mem::replace(&mut self.state, OtClientState::Synchronized) {
            OtClientState::Synchronized => {
                self.document = op.apply(&self.document)?;
                self.state = OtClientState::AwaitingConfirm(op.clone());
                Ok(LocalOutcome::Send(op))
            }
            OtClientState::AwaitingConfirm(sent) => {
                self.document = op.apply(&self.document)?;
                self.state = OtClientState::AwaitingWithBuffer(sent, op);
                Ok(LocalOutcome::Buffered)
            }
            OtClientState::AwaitingWithBuffer(sent, buf) => {
                let buf = buf.compose(&op)?;
                self.document = op.apply(&self.document)?;
                self.state = OtClientState::AwaitingWithBuffer(sent, buf);
                Ok(LocalOutcome::Buffered)
            }
        }
    }

    /// A server operation arrived at the next revision. Transforms it
    /// against whatever is in flight/buffered, applies the result to the
    /// replica, and advances the revision counter.
    pub fn apply_server(&mut self, op: TextOperation) -> Result<(), SyncError> {
        match std::mem::replace(&mut self.state, OtClientState::Synchronized) {
            OtClientState::Synchronized => {
                self.document = op.apply(&self.document)?;
                self.state = OtClientState::Synchronized;
            }
            OtClientState::AwaitingConfirm(sent) => {
                let (sent_prime, op_prime) = sent.transform(&op)?;
                self.document = op_prime.apply(&self.document)?;
                self.state = OtClientState::AwaitingConfirm(sent_prime);
            }
            OtClientState::AwaitingWithBuffer(sent, buf) => {
                let (sent_prime, op1) = sent.transform(&op)?;
                let (buf_prime, op2) = buf.transform(&op1)?;
                self.document = op2.apply(&self.document)?;
                self.state = OtClientState::AwaitingWithBuffer(sent_prime, buf_prime);
            }
        }
        self.revision += 1;
        Ok(())
    }

    /// The server acknowledged the in-flight operation.
    pub fn server_ack(&mut self) -> Result<AckOutcome, SyncError> {
        match std::mem::replace(&mut self.state, OtClientState::Synchronized) {
            OtClientState::Synchronized => Err(SyncError::invariant(
                "server_ack",
                "received an ack while no operation was in flight",
            )),
            OtClientState::AwaitingConfirm(_) => {
                self.revision += 1;
                self.state = OtClientState::Synchronized;
                Ok(AckOutcome::Idle)
            }
            OtClientState::AwaitingWithBuffer(_, buf) => {
                self.revision += 1;
                self.state = OtClientState::AwaitingConfirm(buf.clone());
                Ok(AckOutcome::Send(buf))
            }
        }
    }
}
