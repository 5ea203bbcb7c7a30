//! Auxiliary presence/cursor state. Not part of the convergence invariant;
//! purely surfaced as events for the caller to render.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: usize,
    pub head: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Presence {
    pub client_id: String,
    pub name: String,
    pub color: String,
    pub cursor: Option<usize>,
    pub selection: Option<Selection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum CursorEvent {
    Focus { client_id: String },
    Activity { client_id: String, selection: Selection },
    Blur { client_id: String },
}

/// Map from client id to presence info, owned by the session.
#[derive(Debug, Clone, Default)]
pub struct PresenceTable {
    by_client: HashMap<String, Presence>,
}

impl PresenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, presence: Presence) {
        self.by_client.insert(presence.client_id.clone(), presence);
    }

    pub fn remove(&mut self, client_id: &str) -> Option<Presence> {
        self.by_client.remove(client_id)
    }

    pub fn get(&self, client_id: &str) -> Option<&Presence> {
        self.by_client.get(client_id)
    }

    pub fn all(&self) -> Vec<Presence> {
        self.by_client.values().cloned().collect()
    }

    pub fn set_all(&mut self, users: Vec<Presence>) {
        self.by_client = users
            .into_iter()
            .map(|u| (u.client_id.clone(), u))
            .collect();
    }
}
