//! The public facade (§2 "Session / transport adapter" + the document
//! surface, batch, and undo modules wired together): [`Client`] owns every
//! piece of state named in §3 and is the only thing application code talks
//! to. Synchronous methods (`insert`, `delete`, `undo`, ...) mutate the
//! replica immediately and, per §5, never block on the network. Any
//! outbound bytes are hung off the [`crate::queue::OutboundQueue`] and
//! only actually sent from [`Client::poll_once`], the single cooperative
//! point where I/O happens.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;

use crate::clock::{SharedClock, SystemClock};
use crate::config::Config;
use crate::document;
use crate::error::SyncError;
use crate::events::{Change, ChangeOrigin, Event, EventBus, Listener, ReadyInfo, ReconnectInfo};
use crate::history::{Batch, UndoHistory};
use crate::ot::TextOperation;
use crate::permission::{Credentials, Permission};
use crate::presence::{CursorEvent, Presence, PresenceTable, Selection};
use crate::queue::OutboundQueue;
use crate::reconnect::{ReconnectController, ReconnectDecision};
use crate::session::{
    ChannelTransport, ChannelTransportHandle, ClientMessage, ServerMessage, SnapshotInfo,
    Transport, WebSocketTransport,
};
use crate::state_machine::{AckOutcome, LocalOutcome, OtClient};

/// How often [`Client::poll_once`] gives up waiting on the transport to
/// re-check the rate limiter, the reconnect backoff, and the operation
/// timeout. Not part of the wire protocol; purely a scheduling knob.
const POLL_TICK: Duration = Duration::from_millis(50);

pub struct Client<T: Transport> {
    config: Config,
    credentials: Credentials,
    clock: SharedClock,

    transport: Option<T>,
    intentional_disconnect: bool,
    next_scheduled_delay: Option<Duration>,
    awaiting_since: Option<std::time::Instant>,

    ot: Option<OtClient>,
    queue: OutboundQueue,
    reconnect_ctl: ReconnectController,
    history: UndoHistory,
    presence: PresenceTable,
    events: EventBus,
    permission: Permission,
    batch: Option<Batch>,
    snapshot: Option<SnapshotInfo>,
    presence_outbox: VecDeque<ClientMessage>,
}

impl<T: Transport> Client<T> {
    fn from_parts(
        config: Config,
        credentials: Credentials,
        clock: SharedClock,
        transport: T,
        snapshot: SnapshotInfo,
    ) -> Self {
        let ot = OtClient::new(snapshot.document.clone(), snapshot.revision);
        let queue = OutboundQueue::new(config.rate_limit.clone().into(), clock.clone());
        let reconnect_ctl = ReconnectController::new(config.reconnect.clone().into(), clock.clone());
        let history = UndoHistory::new(clock.clone(), config.undo_group_interval(), config.undo_max_size);
        let events = EventBus::new();
        let permission = snapshot.permission;

        events.emit(Event::Connect);
        events.emit(Event::Ready(ReadyInfo {
            document: snapshot.document.clone(),
            revision: snapshot.revision,
        }));

        Self {
            config,
            credentials,
            clock,
            transport: Some(transport),
            intentional_disconnect: false,
            next_scheduled_delay: None,
            awaiting_since: None,
            ot: Some(ot),
            queue,
            reconnect_ctl,
            history,
            presence: PresenceTable::new(),
            events,
            permission,
            batch: None,
            snapshot: Some(snapshot),
            presence_outbox: VecDeque::new(),
        }
    }

    // -- event subscription -------------------------------------------------

    pub fn subscribe(&self, listener: Listener) {
        self.events.subscribe(listener);
    }

    // -- read-only accessors (§5 "Shared-resource policy") ------------------

    pub fn get_document(&self) -> String {
        self.current_document_owned().unwrap_or_default()
    }

    pub fn get_line(&self, line: usize) -> Option<String> {
        let doc = self.current_document_owned().ok()?;
        doc.split('\n').nth(line).map(str::to_string)
    }

    pub fn get_lines(&self, start: usize, end: usize) -> Vec<String> {
        let doc = match self.current_document_owned() {
            Ok(doc) => doc,
            Err(_) => return Vec::new(),
        };
        let lines: Vec<&str> = doc.split('\n').collect();
        let end = end.min(lines.len());
        if start >= end {
            return Vec::new();
        }
        lines[start..end].iter().map(|s| s.to_string()).collect()
    }

    pub fn revision(&self) -> Option<u64> {
        self.ot.as_ref().map(|ot| ot.revision())
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }

    pub fn can_edit(&self) -> bool {
        self.permission.can_edit(self.credentials.authenticated, self.credentials.is_owner)
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    pub fn get_queued_operation_count(&self) -> usize {
        self.queue.len()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn presence(&self) -> Vec<Presence> {
        self.presence.all()
    }

    fn current_document_owned(&self) -> Result<String, SyncError> {
        if let Some(batch) = &self.batch {
            return Ok(batch.scratch_document().to_string());
        }
        self.ot
            .as_ref()
            .map(|ot| ot.document().to_string())
            .ok_or(SyncError::NotConnected)
    }

    // -- document surface (§4.6) --------------------------------------------

    pub fn insert(&mut self, pos: usize, s: &str) -> Result<(), SyncError> {
        self.edit(|base| document::insert_op(base, pos, s))
    }

    pub fn delete(&mut self, pos: usize, n: usize) -> Result<(), SyncError> {
        self.edit(|base| document::delete_op(base, pos, n))
    }

    pub fn replace(&mut self, pos: usize, n: usize, s: &str) -> Result<(), SyncError> {
        self.edit(|base| document::replace_op(base, pos, n, s))
    }

    pub fn update_content(&mut self, new_text: &str) -> Result<(), SyncError> {
        self.edit(|base| Ok(document::update_content_op(base, new_text)))
    }

    pub fn set_line(&mut self, line: usize, s: &str) -> Result<(), SyncError> {
        self.edit(|base| document::set_line_op(base, line, s))
    }

    pub fn insert_line(&mut self, line: usize, s: &str) -> Result<(), SyncError> {
        self.edit(|base| document::insert_line_op(base, line, s))
    }

    pub fn replace_regex(&mut self, pattern: &str, replacement: &str) -> Result<(), SyncError> {
        let re = Regex::new(pattern).map_err(|e| SyncError::MalformedOperation(e.to_string()))?;
        self.edit(|base| document::replace_regex_op(base, &re, replacement))
    }

    pub fn replace_all_regex(&mut self, pattern: &str, replacement: &str) -> Result<(), SyncError> {
        let re = Regex::new(pattern).map_err(|e| SyncError::MalformedOperation(e.to_string()))?;
        self.edit(|base| document::replace_all_regex_op(base, &re, replacement))
    }

    /// Computes `op` against the currently visible base document (the
    /// batch scratch replica if a batch is open, else the replica) and
    /// submits it, after the permission check every primitive performs
    /// before touching the replica (§4.6).
    fn edit(
        &mut self,
        build: impl FnOnce(&str) -> Result<TextOperation, SyncError>,
    ) -> Result<(), SyncError> {
        if !self.can_edit() {
            return Err(SyncError::PermissionDenied);
        }
        let base = self.current_document_owned()?;
        let op = build(&base)?;
        self.submit_local_edit(op, self.config.track_undo)
    }

    // -- batch (§4.7) --------------------------------------------------------

    pub fn start_batch(&mut self) -> Result<(), SyncError> {
        if self.batch.is_some() {
            return Err(SyncError::invariant("batch", "a batch is already open"));
        }
        let base = self.ot.as_ref().ok_or(SyncError::NotConnected)?.document().to_string();
        self.batch = Some(Batch::start(&base));
        Ok(())
    }

    pub fn end_batch(&mut self) -> Result<(), SyncError> {
        let batch = self
            .batch
            .take()
            .ok_or_else(|| SyncError::invariant("batch", "no batch is open"))?;
        let op = batch.into_operation();
        if op.is_noop() {
            return Ok(());
        }
        self.submit_local_edit(op, self.config.track_undo)
    }

    pub fn cancel_batch(&mut self) {
        self.batch = None;
    }

    /// Applies `op` (already computed against the correct base) through
    /// either the batch accumulator or the OT state machine, records its
    /// inverse for undo when `record_undo` is set, and emits the resulting
    /// events.
    fn submit_local_edit(&mut self, op: TextOperation, record_undo: bool) -> Result<(), SyncError> {
        if let Some(batch) = self.batch.as_mut() {
            batch.record(op)?;
            return Ok(());
        }

        let ot = self.ot.as_mut().ok_or(SyncError::NotConnected)?;
        let pre_document = ot.document().to_string();
        let outcome = ot.apply_local(op.clone())?;

        if record_undo {
            self.history.record(op.invert(&pre_document));
        }

        self.events.emit(Event::Change(Change {
            origin: ChangeOrigin::Local,
            operation: op,
        }));
        self.events.emit(Event::Document(ot.document().to_string()));

        if let LocalOutcome::Send(to_send) = outcome {
            let revision = self.ot.as_ref().ok_or(SyncError::NotConnected)?.revision();
            self.awaiting_since = Some(self.clock.now());
            self.queue.enqueue(to_send, revision);
        }
        Ok(())
    }

    // -- undo/redo (§4.7) -----------------------------------------------------

    pub fn undo(&mut self) -> Result<(), SyncError> {
        if !self.history.can_undo() {
            return Ok(());
        }
        if !self.can_edit() {
            return Err(SyncError::PermissionDenied);
        }
        let inverse = self.history.pop_undo().expect("checked can_undo above");
        let pre_document = self.current_document_owned()?;
        self.submit_local_edit(inverse.clone(), false)?;
        self.history.record_redo(inverse.invert(&pre_document));
        self.events.emit(Event::Undo);
        Ok(())
    }

    pub fn redo(&mut self) -> Result<(), SyncError> {
        if !self.history.can_redo() {
            return Ok(());
        }
        if !self.can_edit() {
            return Err(SyncError::PermissionDenied);
        }
        let op = self.history.pop_redo().expect("checked can_redo above");
        let pre_document = self.current_document_owned()?;
        self.submit_local_edit(op.clone(), false)?;
        self.history.push_undo_after_redo(op.invert(&pre_document));
        self.events.emit(Event::Redo);
        Ok(())
    }

    // -- presence (§6, auxiliary) ---------------------------------------------

    pub fn cursor_focus(&mut self) {
        self.presence_outbox.push_back(ClientMessage::CursorFocus);
    }

    pub fn cursor_activity(&mut self, selection: Selection) {
        self.presence_outbox.push_back(ClientMessage::CursorActivity {
            anchor: selection.anchor,
            head: selection.head,
        });
    }

    pub fn cursor_blur(&mut self) {
        self.presence_outbox.push_back(ClientMessage::CursorBlur);
    }

    pub fn set_user(&mut self, name: impl Into<String>, color: impl Into<String>) {
        self.presence_outbox.push_back(ClientMessage::UserChanged {
            name: name.into(),
            color: color.into(),
        });
    }

    // -- connection lifecycle -------------------------------------------------

    /// `disconnect()`: idempotent, cancels any scheduled reconnect, and
    /// drops pending queue entries with a user-observable event (§5).
    pub async fn disconnect(&mut self) -> Result<(), SyncError> {
        self.intentional_disconnect = true;
        self.next_scheduled_delay = None;
        self.transport = None;

        let dropped = self.queue.clear();
        if !dropped.is_empty() {
            self.events.emit(Event::Error(format!(
                "{} queued operation(s) dropped on disconnect",
                dropped.len()
            )));
        }
        self.awaiting_since = None;
        self.events.emit(Event::Disconnect {
            reason: "disconnect() called".to_string(),
        });
        Ok(())
    }

    /// The hard replace of §4.5: adopts the server snapshot as truth and
    /// replays, as fresh local edits against the new base, whatever was
    /// still `AwaitingConfirm`/`AwaitingWithBuffer` (the server never
    /// acked it, so from its perspective it never happened). Every entry
    /// still sitting in the outbound queue is, by construction, exactly
    /// the not-yet-dispatched copy of that same in-flight operation (see
    /// `submit_local_edit`), so the queue is drained and discarded here
    /// rather than replayed a second time. Operations that no longer
    /// apply are dropped with [`SyncError::OperationDropped`] surfaced as
    /// an error event (a documented failure mode, never silent
    /// corruption, per §4.5).
    fn adopt_reconnected_snapshot(&mut self, transport: T, snapshot: SnapshotInfo) {
        self.transport = Some(transport);
        self.intentional_disconnect = false;
        self.permission = snapshot.permission;

        let pending: Vec<TextOperation> =
            self.ot.take().map(OtClient::into_pending).unwrap_or_default();
        self.queue.flush_all();

        self.ot = Some(OtClient::new(snapshot.document.clone(), snapshot.revision));
        self.awaiting_since = None;
        self.next_scheduled_delay = None;
        self.reconnect_ctl.on_attempt_succeeded();

        self.events.emit(Event::ReconnectSuccess(ReconnectInfo {
            attempt: 0,
            max_attempts: self.reconnect_ctl.max_attempts(),
            delay: None,
            error: None,
        }));
        self.events.emit(Event::Ready(ReadyInfo {
            document: snapshot.document.clone(),
            revision: snapshot.revision,
        }));
        self.snapshot = Some(snapshot);

        for op in pending {
            match self.submit_local_edit(op, false) {
                Ok(()) => {}
                Err(_) => {
                    log::warn!("dropping an unacknowledged operation that no longer applies after reconnect");
                    self.events.emit(Event::Error(
                        SyncError::OperationDropped(
                            "unacknowledged operation no longer applies to the post-reconnect snapshot"
                                .to_string(),
                        )
                        .to_string(),
                    ));
                }
            }
        }
    }

    fn emit_reconnect_decision(&mut self, decision: ReconnectDecision) {
        match decision {
            ReconnectDecision::Disabled => {}
            ReconnectDecision::Scheduled { attempt, delay } => {
                log::info!("reconnect attempt {attempt} scheduled in {delay:?}");
                self.next_scheduled_delay = Some(delay);
                self.events.emit(Event::ReconnectScheduled(ReconnectInfo {
                    attempt,
                    max_attempts: self.reconnect_ctl.max_attempts(),
                    delay: Some(delay),
                    error: self.reconnect_ctl.last_error().map(str::to_string),
                }));
            }
            ReconnectDecision::Failed { attempt, max_attempts } => {
                log::error!("giving up reconnecting after {attempt}/{max_attempts} attempts");
                self.next_scheduled_delay = None;
                self.events.emit(Event::ReconnectFailed(ReconnectInfo {
                    attempt,
                    max_attempts,
                    delay: None,
                    error: self.reconnect_ctl.last_error().map(str::to_string),
                }));
            }
        }
    }

    async fn handle_transport_error(&mut self, err: SyncError) {
        log::warn!("transport error, disconnecting: {err}");
        self.transport = None;
        self.events.emit(Event::Error(err.to_string()));
        self.events.emit(Event::Disconnect {
            reason: err.to_string(),
        });
        if self.intentional_disconnect {
            return;
        }
        let decision = self.reconnect_ctl.on_disconnect();
        self.emit_reconnect_decision(decision);
    }

    // -- message demultiplexing (§4.5/§6) --------------------------------------

    fn handle_server_message(&mut self, message: ServerMessage) -> Result<(), SyncError> {
        match message {
            ServerMessage::Snapshot(_) => Err(SyncError::invariant(
                "session",
                "received an unexpected snapshot mid-session",
            )),
            ServerMessage::Operation { operation } => self.handle_server_operation(operation),
            ServerMessage::Ack => self.handle_ack(),
            ServerMessage::Refresh(info) => {
                self.events.emit(Event::Refresh(info));
                Ok(())
            }
            ServerMessage::Permission { level } => {
                self.permission = level;
                self.events.emit(Event::Permission(level));
                Ok(())
            }
            ServerMessage::Delete => {
                self.events.emit(Event::Delete);
                Ok(())
            }
            ServerMessage::OnlineUsers { users } => {
                self.presence.set_all(users.clone());
                self.events.emit(Event::Users(users));
                Ok(())
            }
            ServerMessage::UserStatus { user } => {
                self.presence.upsert(user.clone());
                self.events.emit(Event::UserStatus(user));
                Ok(())
            }
            ServerMessage::UserLeft { client_id } => {
                self.presence.remove(&client_id);
                self.events.emit(Event::UserLeft(client_id));
                Ok(())
            }
            ServerMessage::CursorFocus { client_id } => {
                self.events.emit(Event::Cursor(CursorEvent::Focus { client_id }));
                Ok(())
            }
            ServerMessage::CursorActivity { client_id, anchor, head } => {
                self.events.emit(Event::Cursor(CursorEvent::Activity {
                    client_id,
                    selection: Selection { anchor, head },
                }));
                Ok(())
            }
            ServerMessage::CursorBlur { client_id } => {
                self.events.emit(Event::Cursor(CursorEvent::Blur { client_id }));
                Ok(())
            }
        }
    }

    fn handle_server_operation(&mut self, value: serde_json::Value) -> Result<(), SyncError> {
        let op = TextOperation::from_json(&value)?;
        let ot = self.ot.as_mut().ok_or(SyncError::NotConnected)?;
        ot.apply_server(op.clone())?;
        self.events.emit(Event::Change(Change {
            origin: ChangeOrigin::Remote,
            operation: op,
        }));
        self.events.emit(Event::Document(ot.document().to_string()));
        Ok(())
    }

    fn handle_ack(&mut self) -> Result<(), SyncError> {
        let ot = self.ot.as_mut().ok_or(SyncError::NotConnected)?;
        let outcome = ot.server_ack()?;
        let revision = ot.revision();
        self.awaiting_since = None;
        if let AckOutcome::Send(buf) = outcome {
            self.awaiting_since = Some(self.clock.now());
            self.queue.enqueue(buf, revision);
        }
        Ok(())
    }

    async fn send_operation(&mut self, op: TextOperation, revision: u64) -> Result<(), SyncError> {
        let transport = self.transport.as_mut().ok_or(SyncError::NotConnected)?;
        transport
            .send(ClientMessage::Operation {
                revision,
                operation: op.to_json(),
            })
            .await
    }

    // -- cooperative event loop (§5) -------------------------------------------

    /// One tick of the single-threaded cooperative loop: dispatches at
    /// most one outbound operation, flushes presence messages, and either
    /// processes the next inbound message or returns after a short timeout
    /// so the caller's reconnect backoff / operation timeout keep moving.
    pub async fn poll_once(&mut self) -> Result<(), SyncError> {
        if self.transport.is_some() {
            if let Some((op, revision)) = self.queue.try_dispatch() {
                if let Err(e) = self.send_operation(op, revision).await {
                    self.handle_transport_error(e).await;
                    return Ok(());
                }
            }
            while let Some(msg) = self.presence_outbox.pop_front() {
                if let Some(transport) = self.transport.as_mut() {
                    let _ = transport.send(msg).await;
                }
            }
        }

        if let Some(since) = self.awaiting_since {
            if self.clock.now().duration_since(since) >= self.config.operation_timeout() {
                self.awaiting_since = None;
                self.handle_transport_error(SyncError::OperationTimeout).await;
                return Ok(());
            }
        }

        let Some(transport) = self.transport.as_mut() else {
            tokio::time::sleep(POLL_TICK).await;
            return Ok(());
        };

        match tokio::time::timeout(POLL_TICK, transport.recv()).await {
            Ok(Ok(message)) => self.handle_server_message(message),
            Ok(Err(e)) => {
                self.handle_transport_error(e).await;
                Ok(())
            }
            Err(_elapsed) => Ok(()),
        }
    }

    /// Drives [`Self::poll_once`] forever. Returns only on a fatal
    /// [`SyncError::InvariantViolated`]; the caller must then
    /// `disconnect()` and reconstruct the client (§7).
    pub async fn run(&mut self) -> Result<(), SyncError> {
        loop {
            self.poll_once().await?;
        }
    }
}

impl Client<WebSocketTransport> {
    pub async fn connect(config: Config, credentials: Credentials) -> Result<Self, SyncError> {
        Self::connect_with_clock(config, credentials, Arc::new(SystemClock)).await
    }

    pub async fn connect_with_clock(
        config: Config,
        credentials: Credentials,
        clock: SharedClock,
    ) -> Result<Self, SyncError> {
        let (transport, snapshot) = WebSocketTransport::connect(
            &config.server_url,
            &config.note_id,
            config.cookie.as_deref(),
            None,
        )
        .await?;
        Ok(Self::from_parts(config, credentials, clock, transport, snapshot))
    }

    /// `reconnect()` invoked manually or by [`Self::run_with_auto_reconnect`]:
    /// resets the attempt counter and forces an immediate try (§4.4).
    pub async fn reconnect(&mut self) -> Result<(), SyncError> {
        self.intentional_disconnect = false;
        let decision = self.reconnect_ctl.reconnect_now();
        self.emit_reconnect_decision(decision);
        self.events.emit(Event::ReconnectAttempting(ReconnectInfo {
            attempt: self.reconnect_ctl.attempt(),
            max_attempts: self.reconnect_ctl.max_attempts(),
            delay: None,
            error: None,
        }));

        let last_revision = self.ot.as_ref().map(|ot| ot.revision());
        match WebSocketTransport::connect(
            &self.config.server_url,
            &self.config.note_id,
            self.config.cookie.as_deref(),
            last_revision,
        )
        .await
        {
            Ok((transport, snapshot)) => {
                self.adopt_reconnected_snapshot(transport, snapshot);
                Ok(())
            }
            Err(e) => {
                self.events.emit(Event::ReconnectError(ReconnectInfo {
                    attempt: self.reconnect_ctl.attempt(),
                    max_attempts: self.reconnect_ctl.max_attempts(),
                    delay: None,
                    error: Some(e.to_string()),
                }));
                let decision = self.reconnect_ctl.on_attempt_failed(e.to_string());
                self.emit_reconnect_decision(decision);
                Err(e)
            }
        }
    }

    /// Drives [`Self::poll_once`], automatically retrying on an
    /// unintentional disconnect after the scheduled backoff delay, until
    /// reconnection is disabled or attempts are exhausted (§4.4).
    pub async fn run_with_auto_reconnect(&mut self) -> Result<(), SyncError> {
        loop {
            self.poll_once().await?;
            if self.transport.is_none() && !self.intentional_disconnect {
                if let Some(delay) = self.next_scheduled_delay.take() {
                    tokio::time::sleep(delay).await;
                    let _ = self.reconnect().await;
                }
            }
        }
    }
}

impl Client<ChannelTransport> {
    /// Test-only entry point: builds a `Client` wired to an in-memory
    /// transport instead of a real socket, with the given snapshot adopted
    /// as if it had just arrived over the wire.
    pub fn connect_for_test(
        config: Config,
        credentials: Credentials,
        clock: SharedClock,
        snapshot: SnapshotInfo,
    ) -> (Self, ChannelTransportHandle) {
        let (transport, handle) = ChannelTransport::pair();
        (Self::from_parts(config, credentials, clock, transport, snapshot), handle)
    }

    /// Test-only: drives the same hard-replace-and-replay path `reconnect()`
    /// uses in production, against a freshly paired in-memory transport.
    pub fn reconnect_for_test(&mut self, snapshot: SnapshotInfo) -> ChannelTransportHandle {
        let (transport, handle) = ChannelTransport::pair();
        self.adopt_reconnected_snapshot(transport, snapshot);
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;
    use serde_json::json;

    fn snapshot(document: &str, revision: u64) -> SnapshotInfo {
        SnapshotInfo {
            document: document.to_string(),
            revision,
            permission: Permission::Freely,
            owner: "owner".to_string(),
            title: "title".to_string(),
            createtime: "2026-01-01T00:00:00Z".to_string(),
            updatetime: "2026-01-01T00:00:00Z".to_string(),
            authors: None,
            authorship: None,
        }
    }

    fn test_client(
        document: &str,
        revision: u64,
    ) -> (Client<ChannelTransport>, ChannelTransportHandle, Arc<TestClock>) {
        let clock = Arc::new(TestClock::new());
        let config = Config::new("wss://example.test", "note-1");
        let (client, handle) = Client::connect_for_test(
            config,
            Credentials {
                authenticated: true,
                is_owner: true,
            },
            clock.clone(),
            snapshot(document, revision),
        );
        (client, handle, clock)
    }

    /// Scenario A: snapshot "abc" at revision 5, insert(1, "X"), ack.
    #[tokio::test]
    async fn scenario_a_insert_then_ack() {
        let (mut client, mut handle, _clock) = test_client("abc", 5);

        client.insert(1, "X").unwrap();
        assert_eq!(client.get_document(), "aXbc");

        client.poll_once().await.unwrap();
        let sent = handle.outbound.recv().await.unwrap();
        match sent {
            ClientMessage::Operation { revision, operation } => {
                assert_eq!(revision, 5);
                assert_eq!(operation, json!([1, "X", 2]));
            }
            other => panic!("expected an operation message, got {other:?}"),
        }

        handle.inbound.send(ServerMessage::Ack).unwrap();
        client.poll_once().await.unwrap();
        assert_eq!(client.get_document(), "aXbc");
        assert_eq!(client.revision(), Some(6));
    }

    #[tokio::test]
    async fn permission_denied_never_touches_the_replica() {
        let clock = Arc::new(TestClock::new());
        let config = Config::new("wss://example.test", "note-1");
        let (mut client, _handle) = Client::connect_for_test(
            config,
            Credentials {
                authenticated: false,
                is_owner: false,
            },
            clock,
            SnapshotInfo {
                permission: Permission::Locked,
                ..snapshot("abc", 0)
            },
        );

        let err = client.insert(0, "X").unwrap_err();
        assert_eq!(err, SyncError::PermissionDenied);
        assert_eq!(client.get_document(), "abc");
    }

    #[tokio::test]
    async fn remote_operation_updates_the_replica_and_revision() {
        let (mut client, mut handle, _clock) = test_client("abc", 0);
        handle
            .inbound
            .send(ServerMessage::Operation {
                operation: json!([3, "!"]),
            })
            .unwrap();
        client.poll_once().await.unwrap();
        assert_eq!(client.get_document(), "abc!");
        assert_eq!(client.revision(), Some(1));
    }

    #[tokio::test]
    async fn undo_then_redo_is_a_no_op_on_the_replica() {
        let (mut client, mut handle, _clock) = test_client("hello", 0);
        client.insert(5, "!").unwrap();
        client.poll_once().await.unwrap();
        handle.outbound.recv().await.unwrap();
        handle.inbound.send(ServerMessage::Ack).unwrap();
        client.poll_once().await.unwrap();
        assert_eq!(client.get_document(), "hello!");

        client.undo().unwrap();
        client.poll_once().await.unwrap();
        handle.outbound.recv().await.unwrap();
        handle.inbound.send(ServerMessage::Ack).unwrap();
        client.poll_once().await.unwrap();
        assert_eq!(client.get_document(), "hello");

        client.redo().unwrap();
        client.poll_once().await.unwrap();
        handle.outbound.recv().await.unwrap();
        handle.inbound.send(ServerMessage::Ack).unwrap();
        client.poll_once().await.unwrap();
        assert_eq!(client.get_document(), "hello!");
    }

    #[tokio::test]
    async fn reconnect_hard_replaces_the_replica_and_replays_the_queue() {
        let (mut client, mut handle, _clock) = test_client("hello", 0);

        client.insert(5, "!").unwrap();
        client.poll_once().await.unwrap();
        handle.outbound.recv().await.unwrap();
        // No ack arrives; the server's snapshot still reads "hello" at a
        // revision bumped by unrelated activity.
        let mut new_handle = client.reconnect_for_test(snapshot("hello", 9));
        assert_eq!(client.get_document(), "hello!");
        assert_eq!(client.revision(), Some(9));

        client.poll_once().await.unwrap();
        let replayed = new_handle.outbound.recv().await.unwrap();
        assert!(matches!(replayed, ClientMessage::Operation { revision: 9, .. }));
    }

    /// A denied undo/redo must not destroy the popped history entry: the
    /// permission check has to run before the stack is touched.
    #[tokio::test]
    async fn undo_denied_by_permission_leaves_the_entry_undoable_once_restored() {
        let clock = Arc::new(TestClock::new());
        let config = Config::new("wss://example.test", "note-1");
        let (mut client, mut handle) = Client::connect_for_test(
            config,
            Credentials {
                authenticated: true,
                is_owner: false,
            },
            clock,
            SnapshotInfo {
                permission: Permission::Editable,
                ..snapshot("hello", 0)
            },
        );

        client.insert(5, "!").unwrap();
        client.poll_once().await.unwrap();
        handle.outbound.recv().await.unwrap();
        handle.inbound.send(ServerMessage::Ack).unwrap();
        client.poll_once().await.unwrap();
        assert!(client.can_undo());

        client.permission = Permission::Locked;
        let err = client.undo().unwrap_err();
        assert_eq!(err, SyncError::PermissionDenied);
        assert!(client.can_undo(), "a denied undo must not drop the popped entry");
        assert_eq!(client.get_document(), "hello!");

        client.permission = Permission::Editable;
        client.undo().unwrap();
        client.poll_once().await.unwrap();
        handle.outbound.recv().await.unwrap();
        handle.inbound.send(ServerMessage::Ack).unwrap();
        client.poll_once().await.unwrap();
        assert_eq!(client.get_document(), "hello");
        assert!(client.can_redo());

        client.permission = Permission::Locked;
        let err = client.redo().unwrap_err();
        assert_eq!(err, SyncError::PermissionDenied);
        assert!(client.can_redo(), "a denied redo must not drop the popped entry");
    }

    #[tokio::test]
    async fn batch_submits_one_composed_operation() {
        let (mut client, mut handle, _clock) = test_client("hello", 0);
        client.start_batch().unwrap();
        client.insert(5, " world").unwrap();
        client.insert(11, "!").unwrap();
        assert_eq!(client.get_document(), "hello world!");
        client.end_batch().unwrap();

        client.poll_once().await.unwrap();
        let sent = handle.outbound.recv().await.unwrap();
        match sent {
            ClientMessage::Operation { operation, .. } => {
                assert_eq!(operation, json!([5, " world!"]));
            }
            other => panic!("expected an operation message, got {other:?}"),
        }
    }
}
