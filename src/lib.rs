//! `enote-collab`: a client library for joining a real-time collaborative
//! Markdown note session and keeping a local replica in sync with the
//! server under operational transformation.
//!
//! [`Client`] is the facade application code drives; everything else is the
//! machinery it's built from: the text-operation algebra ([`ot`]), the
//! three-state OT protocol ([`state_machine`]), the rate-limited outbound
//! queue ([`queue`]), the reconnect backoff controller ([`reconnect`]), the
//! transport adapter ([`session`]), the document editing primitives
//! ([`document`]), and batch/undo history ([`history`]).

pub mod client;
pub mod clock;
pub mod config;
pub mod document;
pub mod error;
pub mod events;
pub mod history;
pub mod ot;
pub mod permission;
pub mod presence;
pub mod queue;
pub mod reconnect;
pub mod session;
pub mod state_machine;

pub use client::Client;
pub use config::Config;
pub use error::SyncError;
pub use events::{Event, Listener};
pub use ot::TextOperation;
pub use permission::{Credentials, Permission};
pub use session::{ChannelTransport, Transport, WebSocketTransport};
