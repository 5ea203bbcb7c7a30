//! End-to-end scenarios driving [`enote_collab::Client`] against an
//! in-memory [`ChannelTransport`], playing the server side by hand. These
//! exercise the same lettered scenarios the unit tests cover in isolation
//! (`ot`, `state_machine`, `queue`, `reconnect`, `document`), but here
//! through the public facade end to end.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use enote_collab::client::Client;
use enote_collab::clock::TestClock;
use enote_collab::config::Config;
use enote_collab::permission::{Credentials, Permission};
use enote_collab::session::{ChannelTransport, ClientMessage, ServerMessage, SnapshotInfo};

fn snapshot(document: &str, revision: u64, permission: Permission) -> SnapshotInfo {
    SnapshotInfo {
        document: document.to_string(),
        revision,
        permission,
        owner: "owner-1".to_string(),
        title: "scratch".to_string(),
        createtime: "2026-01-01T00:00:00Z".to_string(),
        updatetime: "2026-01-01T00:00:00Z".to_string(),
        authors: None,
        authorship: None,
    }
}

fn owner_credentials() -> Credentials {
    Credentials {
        authenticated: true,
        is_owner: true,
    }
}

/// Lets `RUST_LOG=enote_collab=debug cargo test -- --nocapture` surface the
/// crate's `log::` calls while these scenarios run; harmless no-op otherwise.
fn init_logging() {
    let _ = env_logger::try_init();
}

#[tokio::test]
async fn local_insert_is_sent_and_acked_then_matches_the_server() {
    let clock = Arc::new(TestClock::new());
    let config = Config::new("wss://example.test", "note-1");
    let (mut client, mut handle) = Client::<ChannelTransport>::connect_for_test(
        config,
        owner_credentials(),
        clock,
        snapshot("abc", 5, Permission::Freely),
    );

    client.insert(1, "X").unwrap();
    assert_eq!(client.get_document(), "aXbc");

    client.poll_once().await.unwrap();
    let sent = handle.outbound.recv().await.unwrap();
    match sent {
        ClientMessage::Operation { revision, operation } => {
            assert_eq!(revision, 5);
            assert_eq!(operation, json!([1, "X", 2]));
        }
        other => panic!("expected an Operation message, got {other:?}"),
    }

    handle.inbound.send(ServerMessage::Ack).unwrap();
    client.poll_once().await.unwrap();
    assert_eq!(client.revision(), Some(6));
    assert_eq!(client.get_document(), "aXbc");
    assert_eq!(client.get_queued_operation_count(), 0);
}

#[tokio::test]
async fn a_remote_operation_arriving_while_an_edit_is_in_flight_still_converges() {
    let clock = Arc::new(TestClock::new());
    let config = Config::new("wss://example.test", "note-1");
    let (mut client, mut handle) = Client::<ChannelTransport>::connect_for_test(
        config,
        owner_credentials(),
        clock,
        snapshot("abcdef", 0, Permission::Freely),
    );

    client.insert(0, "Z").unwrap();
    assert_eq!(client.get_document(), "Zabcdef");
    client.poll_once().await.unwrap();
    handle.outbound.recv().await.unwrap();

    handle
        .inbound
        .send(ServerMessage::Operation {
            operation: json!([6, "!"]),
        })
        .unwrap();
    client.poll_once().await.unwrap();
    assert_eq!(client.get_document(), "Zabcdef!");

    handle.inbound.send(ServerMessage::Ack).unwrap();
    client.poll_once().await.unwrap();
    assert_eq!(client.revision(), Some(2));
    assert_eq!(client.get_document(), "Zabcdef!");
}

#[tokio::test]
async fn permission_denied_rejects_the_edit_before_it_touches_the_replica() {
    let clock = Arc::new(TestClock::new());
    let config = Config::new("wss://example.test", "note-1");
    let (mut client, _handle) = Client::<ChannelTransport>::connect_for_test(
        config,
        Credentials {
            authenticated: false,
            is_owner: false,
        },
        clock,
        snapshot("abc", 0, Permission::Locked),
    );

    let err = client.insert(0, "X").unwrap_err();
    assert_eq!(err, enote_collab::SyncError::PermissionDenied);
    assert_eq!(client.get_document(), "abc");
}

#[tokio::test]
async fn a_permission_event_updates_what_further_edits_are_allowed() {
    let clock = Arc::new(TestClock::new());
    let config = Config::new("wss://example.test", "note-1");
    let (mut client, mut handle) = Client::<ChannelTransport>::connect_for_test(
        config,
        Credentials {
            authenticated: true,
            is_owner: false,
        },
        clock,
        snapshot("abc", 0, Permission::Editable),
    );

    client.insert(0, "X").unwrap();
    client.poll_once().await.unwrap();
    handle.outbound.recv().await.unwrap();
    handle.inbound.send(ServerMessage::Ack).unwrap();
    client.poll_once().await.unwrap();

    handle
        .inbound
        .send(ServerMessage::Permission {
            level: Permission::Locked,
        })
        .unwrap();
    client.poll_once().await.unwrap();
    assert_eq!(client.permission(), Permission::Locked);

    let err = client.insert(0, "Y").unwrap_err();
    assert_eq!(err, enote_collab::SyncError::PermissionDenied);
}

#[tokio::test]
async fn batching_several_edits_submits_a_single_composed_operation() {
    let clock = Arc::new(TestClock::new());
    let config = Config::new("wss://example.test", "note-1");
    let (mut client, mut handle) = Client::<ChannelTransport>::connect_for_test(
        config,
        owner_credentials(),
        clock,
        snapshot("hello", 0, Permission::Freely),
    );

    client.start_batch().unwrap();
    client.insert(5, " world").unwrap();
    client.insert(11, "!").unwrap();
    client.delete(0, 1).unwrap();
    assert_eq!(client.get_document(), "ello world!");
    client.end_batch().unwrap();

    client.poll_once().await.unwrap();
    let sent = handle.outbound.recv().await.unwrap();
    assert!(matches!(sent, ClientMessage::Operation { .. }));
    assert_eq!(client.get_queued_operation_count(), 0);
}

#[tokio::test]
async fn undo_redo_round_trips_through_acknowledged_operations() {
    let clock = Arc::new(TestClock::new());
    let config = Config::new("wss://example.test", "note-1");
    let (mut client, mut handle) = Client::<ChannelTransport>::connect_for_test(
        config,
        owner_credentials(),
        clock,
        snapshot("hello", 0, Permission::Freely),
    );

    client.insert(5, "!").unwrap();
    client.poll_once().await.unwrap();
    handle.outbound.recv().await.unwrap();
    handle.inbound.send(ServerMessage::Ack).unwrap();
    client.poll_once().await.unwrap();
    assert_eq!(client.get_document(), "hello!");

    assert!(client.can_undo());
    client.undo().unwrap();
    client.poll_once().await.unwrap();
    handle.outbound.recv().await.unwrap();
    handle.inbound.send(ServerMessage::Ack).unwrap();
    client.poll_once().await.unwrap();
    assert_eq!(client.get_document(), "hello");

    assert!(client.can_redo());
    client.redo().unwrap();
    client.poll_once().await.unwrap();
    handle.outbound.recv().await.unwrap();
    handle.inbound.send(ServerMessage::Ack).unwrap();
    client.poll_once().await.unwrap();
    assert_eq!(client.get_document(), "hello!");
    assert!(client.can_undo());
    assert!(!client.can_redo());
}

#[tokio::test]
async fn reconnect_hard_replaces_the_replica_and_replays_the_outbound_queue() {
    init_logging();
    let clock = Arc::new(TestClock::new());
    let config = Config::new("wss://example.test", "note-1");
    let (mut client, mut handle) = Client::<ChannelTransport>::connect_for_test(
        config,
        owner_credentials(),
        clock,
        snapshot("hello", 0, Permission::Freely),
    );

    client.insert(5, "!").unwrap();
    client.poll_once().await.unwrap();
    handle.outbound.recv().await.unwrap();
    // No ack arrives: the operation stays in flight across the reconnect.
    // The server's snapshot still reads "hello" (it never got the edit),
    // just at a revision bumped by unrelated activity.
    let mut new_handle = client.reconnect_for_test(snapshot("hello", 42, Permission::Freely));
    assert_eq!(client.get_document(), "hello!");
    assert_eq!(client.revision(), Some(42));

    client.poll_once().await.unwrap();
    let replayed = new_handle.outbound.recv().await.unwrap();
    assert!(matches!(replayed, ClientMessage::Operation { revision: 42, .. }));
}

#[tokio::test]
async fn disconnect_drops_queued_operations_and_emits_an_error_event() {
    use std::sync::Mutex;

    let clock = Arc::new(TestClock::new());
    let mut config = Config::new("wss://example.test", "note-1");
    config.rate_limit.enabled = true;
    config.rate_limit.min_interval = 60_000;
    let (mut client, _handle) = Client::<ChannelTransport>::connect_for_test(
        config,
        owner_credentials(),
        clock,
        snapshot("hello", 0, Permission::Freely),
    );

    let error_events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = error_events.clone();
    client.subscribe(Arc::new(move |event| {
        if let enote_collab::Event::Error(msg) = event {
            sink.lock().unwrap().push(msg.clone());
        }
    }));

    // Not yet polled, so the operation is still sitting in the outbound
    // queue rather than dispatched over the transport.
    client.insert(5, "!").unwrap();
    assert_eq!(client.get_queued_operation_count(), 1);

    client.disconnect().await.unwrap();
    assert_eq!(client.get_queued_operation_count(), 0);
    assert!(!error_events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn update_content_and_regex_edits_compose_with_the_ot_pipeline() {
    let clock = Arc::new(TestClock::new());
    let config = Config::new("wss://example.test", "note-1");
    let (mut client, mut handle) = Client::<ChannelTransport>::connect_for_test(
        config,
        owner_credentials(),
        clock,
        snapshot("abcdef", 0, Permission::Freely),
    );

    client.update_content("abXYef").unwrap();
    assert_eq!(client.get_document(), "abXYef");
    client.poll_once().await.unwrap();
    handle.outbound.recv().await.unwrap();
    handle.inbound.send(ServerMessage::Ack).unwrap();
    client.poll_once().await.unwrap();

    client.replace_all_regex("[A-Z]", "_").unwrap();
    assert_eq!(client.get_document(), "ab__ef");
}

#[tokio::test]
async fn reconnect_drops_a_queued_operation_that_no_longer_applies() {
    let clock = Arc::new(TestClock::new());
    let mut config = Config::new("wss://example.test", "note-1");
    config.rate_limit.enabled = true;
    config.rate_limit.min_interval = 60_000;
    let (mut client, _handle) = Client::<ChannelTransport>::connect_for_test(
        config,
        owner_credentials(),
        clock,
        snapshot("hello", 0, Permission::Freely),
    );

    client.insert(5, "!").unwrap();
    assert_eq!(client.get_queued_operation_count(), 1);

    // The post-reconnect document is shorter than the queued op's base_len
    // (6), so replaying it against "hi" (base_len 2) must fail and be
    // dropped rather than panic or corrupt the replica.
    let _new_handle = client.reconnect_for_test(snapshot("hi", 7, Permission::Freely));
    assert_eq!(client.get_document(), "hi");
    assert_eq!(client.get_queued_operation_count(), 0);
}
