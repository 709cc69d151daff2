mod test_helpers;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use faceswap_session::*;
use test_helpers::{config, settle, text, ScriptedConnector, Shared};
use tokio::time::Instant;

fn socket() -> (SessionSocket<Shared>, Arc<ScriptedConnector>) {
    let connector = Arc::new(ScriptedConnector::new());
    let socket = SessionSocket::with_connector(&config(), Shared(Arc::clone(&connector)));
    (socket, connector)
}

#[test]
fn test_ws_url_follows_endpoint() {
    let (socket, _) = socket();
    assert_eq!(socket.url(), "ws://backend.test/ws");
}

#[tokio::test(start_paused = true)]
async fn test_reconnects_every_three_seconds_until_closed() {
    let (socket, connector) = socket();
    socket.connect().unwrap();

    tokio::time::sleep(Duration::from_millis(10_500)).await;
    let attempts = connector.attempts();
    assert_eq!(attempts.len(), 4);
    for pair in attempts.windows(2) {
        assert_eq!(pair[1] - pair[0], Duration::from_secs(3));
    }

    socket.close().await;
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(connector.attempts().len(), 4);
    assert_eq!(socket.state().connection, ConnectionStatus::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_connect_twice_keeps_single_task() {
    let (socket, connector) = socket();
    socket.connect().unwrap();
    socket.connect().unwrap();
    settle().await;
    assert_eq!(connector.attempts().len(), 1);
    socket.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_frames_fold_into_state() {
    let (socket, connector) = socket();
    let feed = connector.open_next();
    socket.connect().unwrap();
    settle().await;
    assert_eq!(socket.state().connection, ConnectionStatus::Connected);

    feed.send(text(r#"{"type": "log", "message": "Loading models"}"#)).unwrap();
    feed.send(text(
        r#"{"type": "progress", "progress": 41.6, "current_frame": 125, "total_frames": 300, "speed": 12.5, "execution_providers": "cuda"}"#,
    ))
    .unwrap();
    settle().await;

    let state = socket.state();
    assert_eq!(state.logs.to_vec(), vec!["Loading models"]);
    assert_eq!(state.progress, 42);
    assert_eq!(state.status, "Processing");
    assert_eq!(state.current_frame, 125);
    assert_eq!(state.total_frames, 300);
    assert_eq!(state.execution_providers, "cuda");
    assert!(state.is_running());

    feed.send(text(r#"{"type": "complete", "output_path": "/tmp/output/result.mp4"}"#))
        .unwrap();
    settle().await;

    let state = socket.state();
    assert!(state.is_complete);
    assert_eq!(state.progress, 100);
    assert_eq!(state.output_path.as_deref(), Some("/tmp/output/result.mp4"));
    socket.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_events_delivered_in_order() {
    let (socket, connector) = socket();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    socket.on_event(move |event| sink.lock().unwrap().push(event.clone()));

    let feed = connector.open_next();
    socket.connect().unwrap();
    settle().await;
    feed.send(text(r#"{"type": "log", "message": "one"}"#)).unwrap();
    feed.send(text(r#"{"type": "pong"}"#)).unwrap();
    feed.send(text(r#"{"type": "log", "message": "two"}"#)).unwrap();
    settle().await;
    socket.close().await;

    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![
            SessionEvent::Connection(ConnectionStatus::Connecting),
            SessionEvent::Connection(ConnectionStatus::Connected),
            SessionEvent::Frame(Frame::Log {
                message: "one".into()
            }),
            SessionEvent::Frame(Frame::Log {
                message: "two".into()
            }),
            SessionEvent::Connection(ConnectionStatus::Disconnected),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_malformed_and_unknown_frames_keep_connection() {
    let (socket, connector) = socket();
    let feed = connector.open_next();
    socket.connect().unwrap();
    settle().await;

    feed.send(text("not json at all")).unwrap();
    feed.send(text(r#"{"type": "telemetry", "cpu": 12}"#)).unwrap();
    feed.send(text(r#"{"message": "no type"}"#)).unwrap();
    feed.send(text(r#"{"type": "log", "message": "still here"}"#)).unwrap();
    settle().await;

    let state = socket.state();
    assert_eq!(state.connection, ConnectionStatus::Connected);
    assert_eq!(state.logs.to_vec(), vec!["still here"]);
    assert_eq!(connector.attempts().len(), 1);
    socket.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_dropped_connection_retries_after_delay() {
    let (socket, connector) = socket();
    let feed = connector.open_next();
    socket.connect().unwrap();
    settle().await;

    feed.send(text(r#"{"type": "log", "message": "before drop"}"#)).unwrap();
    settle().await;
    let dropped_at = Instant::now();
    drop(feed);
    settle().await;

    let state = socket.state();
    assert_eq!(state.connection, ConnectionStatus::Disconnected);
    assert_eq!(state.logs.to_vec(), vec!["before drop"]);

    tokio::time::sleep(Duration::from_secs(4)).await;
    let attempts = connector.attempts();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[1] - dropped_at, Duration::from_secs(3));
    socket.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_reconnects() {
    let (socket, connector) = socket();
    let first = connector.open_next();
    let second = connector.open_next();
    socket.connect().unwrap();
    settle().await;

    first
        .send(Err(SessionError::InvalidResponse("reset by peer".into())))
        .unwrap();
    settle().await;
    assert_eq!(socket.state().connection, ConnectionStatus::Disconnected);

    tokio::time::sleep(Duration::from_millis(3_100)).await;
    assert_eq!(socket.state().connection, ConnectionStatus::Connected);

    second.send(text(r#"{"type": "log", "message": "back"}"#)).unwrap();
    settle().await;
    assert_eq!(socket.state().logs.last(), Some("back"));
    socket.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_log_buffer_keeps_last_hundred() {
    let (socket, connector) = socket();
    let feed = connector.open_next();
    socket.connect().unwrap();
    settle().await;

    for i in 0..150 {
        feed.send(text(&format!(r#"{{"type": "log", "message": "line {}"}}"#, i)))
            .unwrap();
    }
    settle().await;

    let logs = socket.state().logs;
    assert_eq!(logs.len(), 100);
    assert_eq!(logs.iter().next(), Some("line 50"));
    assert_eq!(logs.last(), Some("line 149"));
    socket.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_error_log_latches_until_progress() {
    let (socket, connector) = socket();
    let feed = connector.open_next();
    socket.connect().unwrap();
    settle().await;

    feed.send(text(r#"{"type": "log", "message": "Processing failed: out of memory"}"#))
        .unwrap();
    feed.send(text(r#"{"type": "log", "message": "cleaning up"}"#)).unwrap();
    settle().await;
    let state = socket.state();
    assert!(state.error);
    assert_eq!(state.status, "Error");

    feed.send(text(r#"{"type": "progress", "progress": 5}"#)).unwrap();
    settle().await;
    let state = socket.state();
    assert!(!state.error);
    assert_eq!(state.status, "Processing");
    socket.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_progress_after_complete_resumes_run() {
    let (socket, connector) = socket();
    let feed = connector.open_next();
    socket.connect().unwrap();
    settle().await;

    feed.send(text(r#"{"type": "complete", "output_path": "/tmp/a.mp4"}"#)).unwrap();
    feed.send(text(r#"{"type": "progress", "progress": 150, "status": "Encoding"}"#))
        .unwrap();
    settle().await;

    let state = socket.state();
    assert!(!state.is_complete);
    assert_eq!(state.progress, 100);
    assert_eq!(state.status, "Encoding");
    socket.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_subscribers_see_snapshots() {
    let (socket, connector) = socket();
    let feed = connector.open_next();
    let mut updates = socket.subscribe();
    socket.connect().unwrap();
    settle().await;

    let before = updates.borrow_and_update().clone();
    feed.send(text(r#"{"type": "progress", "progress": 10}"#)).unwrap();
    updates.changed().await.unwrap();

    assert_eq!(before.progress, 0);
    assert_eq!(updates.borrow().progress, 10);
    socket.close().await;
}
