//! A small subscription registry keyed by event name, replacing the generic
//! event-emitter plumbing the original client relied on (out of scope here;
//! see the crate-level docs). Callbacks run synchronously, in the order they
//! were registered, on whatever thread emits the event. A callback that
//! panics only unwinds its own call, it never prevents later subscribers
//! from running.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use crate::ot::TextOperation;
use crate::permission::Permission;
use crate::presence::{CursorEvent, Presence};

/// Whether a change event originated from this client or was received from
/// the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    Local,
    Remote,
}

#[derive(Debug, Clone)]
pub struct Change {
    pub origin: ChangeOrigin,
    pub operation: TextOperation,
}

#[derive(Debug, Clone)]
pub struct ReadyInfo {
    pub document: String,
    pub revision: u64,
}

#[derive(Debug, Clone)]
pub struct ReconnectInfo {
    pub attempt: u32,
    pub max_attempts: u32,
    pub delay: Option<std::time::Duration>,
    pub error: Option<String>,
}

/// Every event the client can emit, per the wire protocol and connection
/// lifecycle described in the crate's data model.
#[derive(Debug, Clone)]
pub enum Event {
    Connect,
    Disconnect { reason: String },
    Ready(ReadyInfo),
    Error(String),
    Document(String),
    Change(Change),
    Refresh(serde_json::Value),
    Permission(Permission),
    Delete,
    Users(Vec<Presence>),
    UserStatus(Presence),
    UserLeft(String),
    Cursor(CursorEvent),
    ReconnectScheduled(ReconnectInfo),
    ReconnectAttempting(ReconnectInfo),
    ReconnectSuccess(ReconnectInfo),
    ReconnectError(ReconnectInfo),
    ReconnectFailed(ReconnectInfo),
    Undo,
    Redo,
}

pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

/// Keyed-by-nothing subscription list: every listener sees every event and
/// decides for itself whether to act on it, mirroring the loosely-typed
/// `on(event, callback)` surface of the original event emitter while giving
/// callers a typed [`Event`] instead of a string tag.
#[derive(Default, Clone)]
pub struct EventBus {
    listeners: Arc<Mutex<Vec<Listener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Listener) {
        self.listeners.lock().expect("event bus poisoned").push(listener);
    }

    pub fn emit(&self, event: Event) {
        let listeners = self.listeners.lock().expect("event bus poisoned").clone();
        for listener in listeners {
            let event = event.clone();
            let _ = panic::catch_unwind(AssertUnwindSafe(|| listener(&event)));
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listener_count", &self.listeners.lock().map(|l| l.len()).unwrap_or(0))
            .finish()
    }
}
