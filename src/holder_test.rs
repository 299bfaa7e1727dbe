use super::*;
use crate::transport::test_helpers::{Call, RecordingTransport};
use tokio::time::{Duration, timeout};

fn endpoint() -> Url {
    Url::parse("ws://127.0.0.1:8080").unwrap()
}

fn holder(transport: &RecordingTransport) -> ConnectionHolder<RecordingTransport> {
    ConnectionHolder::new(transport.clone(), endpoint())
}

async fn next(holder: &mut ConnectionHolder<RecordingTransport>) -> Option<TransportEvent> {
    timeout(Duration::from_millis(500), holder.next_event())
        .await
        .expect("holder event timed out")
}

async fn assert_no_event(holder: &mut ConnectionHolder<RecordingTransport>) {
    assert!(
        timeout(Duration::from_millis(50), holder.next_event()).await.is_err(),
        "expected no applied event"
    );
}

// =============================================================
// Publication
// =============================================================

#[tokio::test]
async fn handle_absent_until_transport_opens() {
    let transport = RecordingTransport::new();
    let mut holder = holder(&transport);
    let ctx = holder.context();

    assert!(ctx.current().is_none());
    assert_eq!(ctx.status(), ConnectionStatus::Disconnected);

    let id = holder.activate().unwrap();
    assert!(ctx.current().is_none());
    assert_eq!(ctx.status(), ConnectionStatus::Connecting);
    assert_eq!(transport.calls(), vec![Call::Open("ws://127.0.0.1:8080/".into())]);

    transport.emit(TransportEvent::Opened);
    assert_eq!(next(&mut holder).await, Some(TransportEvent::Opened));

    let handle = ctx.current().expect("handle published after open");
    assert_eq!(handle.id(), id);
    assert_eq!(ctx.status(), ConnectionStatus::Connected);
}

#[tokio::test]
async fn handle_is_published_exactly_once() {
    let transport = RecordingTransport::new();
    let mut holder = holder(&transport);
    let mut ctx = holder.context();

    holder.activate().unwrap();
    transport.emit(TransportEvent::Opened);
    transport.emit(TransportEvent::Opened);
    assert_eq!(next(&mut holder).await, Some(TransportEvent::Opened));
    assert_no_event(&mut holder).await;

    let published = timeout(Duration::from_millis(100), ctx.changed()).await.unwrap().unwrap();
    assert!(published.is_some());
    assert!(
        timeout(Duration::from_millis(50), ctx.changed()).await.is_err(),
        "handle should not be republished"
    );
}

#[tokio::test]
async fn deactivate_closes_once_and_publishes_absence() {
    let transport = RecordingTransport::auto_open();
    let mut holder = holder(&transport);
    let ctx = holder.context();

    holder.activate().unwrap();
    next(&mut holder).await;
    let handle = ctx.current().unwrap();
    for _ in 0..3 {
        handle.send_text("Hello, server!").unwrap();
    }

    holder.deactivate();
    holder.deactivate();

    assert!(ctx.current().is_none());
    assert!(!handle.is_live());
    assert_eq!(ctx.status(), ConnectionStatus::Disconnected);
    assert_eq!(transport.close_count(), 1);
    assert_eq!(transport.writes().len(), 3);
}

#[tokio::test]
async fn dropping_holder_closes_connection() {
    let transport = RecordingTransport::auto_open();
    let mut holder = holder(&transport);
    let mut ctx = holder.context();

    holder.activate().unwrap();
    next(&mut holder).await;
    ctx.changed().await.unwrap();
    let handle = ctx.current().unwrap();

    drop(holder);

    assert_eq!(transport.close_count(), 1);
    assert!(!handle.is_live());
    assert!(ctx.current().is_none());
    assert_eq!(ctx.changed().await.unwrap(), None);
    assert!(matches!(ctx.changed().await, Err(HolderError::Unmounted)));
}

#[test]
fn deactivate_without_activation_is_a_noop() {
    let transport = RecordingTransport::new();
    let mut holder = holder(&transport);
    holder.deactivate();
    assert!(transport.calls().is_empty());
}

// =============================================================
// Activation rules
// =============================================================

#[test]
fn second_activation_while_active_is_rejected() {
    let transport = RecordingTransport::new();
    let mut holder = holder(&transport);

    holder.activate().unwrap();
    assert!(matches!(holder.activate(), Err(HolderError::AlreadyActive)));
    assert_eq!(transport.calls().len(), 1);
}

#[tokio::test]
async fn fresh_activation_after_close_opens_new_connection() {
    let transport = RecordingTransport::auto_open();
    let mut holder = holder(&transport);
    let ctx = holder.context();

    let first = holder.activate().unwrap();
    next(&mut holder).await;
    holder.deactivate();

    let second = holder.activate().unwrap();
    assert_ne!(first, second);
    next(&mut holder).await;

    assert_eq!(ctx.current().unwrap().id(), second);
    assert_eq!(
        transport.calls(),
        vec![
            Call::Open("ws://127.0.0.1:8080/".into()),
            Call::Close,
            Call::Open("ws://127.0.0.1:8080/".into()),
        ]
    );
}

#[test]
fn refused_open_is_reported_as_failed() {
    let transport = RecordingTransport::refusing();
    let mut holder = holder(&transport);

    let err = holder.activate().unwrap_err();
    assert!(matches!(err, HolderError::Transport(TransportError::InvalidEndpoint(_))));
    assert!(matches!(holder.status(), ConnectionStatus::Failed(_)));
    assert!(holder.connection_id().is_none());
}

// =============================================================
// Transport events
// =============================================================

#[tokio::test]
async fn failed_open_is_observable_and_handle_stays_absent() {
    let transport = RecordingTransport::new();
    let mut holder = holder(&transport);
    let ctx = holder.context();

    holder.activate().unwrap();
    transport.emit(TransportEvent::Failed("connection refused".into()));

    assert_eq!(next(&mut holder).await, Some(TransportEvent::Failed("connection refused".into())));
    assert_eq!(ctx.status(), ConnectionStatus::Failed("connection refused".into()));
    assert!(ctx.current().is_none());

    // Failure ends the attempt; a new activation is allowed.
    assert!(holder.activate().is_ok());
}

#[tokio::test]
async fn remote_close_withdraws_handle_and_still_closes_once_on_unmount() {
    let transport = RecordingTransport::auto_open();
    let mut holder = holder(&transport);
    let ctx = holder.context();

    holder.activate().unwrap();
    next(&mut holder).await;
    transport.emit(TransportEvent::Closed { reason: Some("bye".into()) });
    assert_eq!(next(&mut holder).await, Some(TransportEvent::Closed { reason: Some("bye".into()) }));

    assert!(ctx.current().is_none());
    assert_eq!(ctx.status(), ConnectionStatus::Disconnected);

    holder.deactivate();
    assert_eq!(transport.close_count(), 1);
}

#[tokio::test]
async fn messages_reach_hook_in_order() {
    let transport = RecordingTransport::auto_open();
    let mut holder = holder(&transport);
    let ctx = holder.context();

    holder.activate().unwrap();
    next(&mut holder).await;

    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    ctx.current()
        .unwrap()
        .set_on_message(move |payload| sink.lock().unwrap().push(payload.to_owned()));

    for payload in ["a", "b", "c"] {
        transport.emit(TransportEvent::Message(payload.into()));
    }
    for _ in 0..3 {
        next(&mut holder).await;
    }
    assert_eq!(*seen.lock().unwrap(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn frames_before_open_are_dropped() {
    let transport = RecordingTransport::new();
    let mut holder = holder(&transport);

    holder.activate().unwrap();
    transport.emit(TransportEvent::Message("early".into()));
    assert_no_event(&mut holder).await;
    assert_eq!(holder.status(), ConnectionStatus::Connecting);
}

#[tokio::test]
async fn events_from_previous_connection_are_ignored() {
    let transport = RecordingTransport::auto_open();
    let mut holder = holder(&transport);
    let ctx = holder.context();

    holder.activate().unwrap();
    next(&mut holder).await;
    holder.deactivate();
    let stale = transport.sink(0).unwrap();

    holder.activate().unwrap();
    next(&mut holder).await;

    stale.emit(TransportEvent::Closed { reason: None });
    assert_no_event(&mut holder).await;
    assert_eq!(ctx.status(), ConnectionStatus::Connected);
    assert!(ctx.current().is_some());
}

#[test]
fn status_display_and_serialization() {
    assert_eq!(ConnectionStatus::Connecting.to_string(), "connecting...");
    assert_eq!(ConnectionStatus::Failed("refused".into()).to_string(), "failed (refused)");

    let json = serde_json::to_value(ConnectionStatus::Failed("refused".into())).unwrap();
    assert_eq!(json, serde_json::json!({"state": "failed", "reason": "refused"}));
    let json = serde_json::to_value(ConnectionStatus::Connected).unwrap();
    assert_eq!(json, serde_json::json!({"state": "connected"}));
}
