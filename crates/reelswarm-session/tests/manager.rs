use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::FutureExt;
use reelswarm_config::SessionConfig;
use reelswarm_events::{Event, EventBus, EventStream, SessionState};
use reelswarm_session::{
    EngineContext, SessionError, StubSwarmClient, SwarmClientFactory, TorrentSessionManager,
    TracingSink,
};
use reelswarm_telemetry::Metrics;
use reelswarm_test_support::records::{engine_files, record_without_magnet, streamable_record};
use reelswarm_torrent_core::{SwarmClient, TorrentError};
use tokio::time::{sleep, timeout};
use uuid::Uuid;

const WAIT: Duration = Duration::from_secs(3);

fn config() -> SessionConfig {
    SessionConfig {
        ready_timeout_secs: 0,
        poll_interval_ms: 10,
        telemetry_interval_ms: 0,
        remove_data_on_stop: true,
        download_dir: std::env::temp_dir().join("reelswarm-session-tests"),
    }
}

fn manager_with(stub: &Arc<StubSwarmClient>, config: &SessionConfig) -> TorrentSessionManager {
    let client: Arc<dyn SwarmClient> = Arc::clone(stub) as Arc<dyn SwarmClient>;
    TorrentSessionManager::spawn(
        Arc::new(EngineContext::with_client(client)),
        EventBus::with_capacity(256),
        config,
    )
}

async fn next_event(stream: &mut EventStream) -> Event {
    timeout(WAIT, stream.next())
        .await
        .expect("event before timeout")
        .expect("event stream open")
        .event
}

async fn wait_for_state(stream: &mut EventStream, wanted: SessionState) -> Option<String> {
    loop {
        if let Event::StateChanged { state, message, .. } = next_event(stream).await
            && state == wanted
        {
            return message;
        }
    }
}

async fn eventually(mut check: impl FnMut() -> bool) {
    timeout(WAIT, async {
        while !check() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition before timeout");
}

async fn start(manager: &TorrentSessionManager) -> Uuid {
    let snapshot = manager
        .start_session(&streamable_record())
        .await
        .expect("session starts");
    assert_eq!(snapshot.state, SessionState::Resolving);
    snapshot.session_id.expect("session id assigned")
}

#[tokio::test]
async fn missing_magnet_is_rejected_before_the_engine() {
    let stub = Arc::new(StubSwarmClient::new());
    let manager = manager_with(&stub, &config());

    let err = manager
        .start_session(&record_without_magnet())
        .await
        .expect_err("record without magnet");
    assert!(matches!(
        err,
        SessionError::Torrent(TorrentError::Validation { field: "magnet_uri", .. })
    ));
    assert_eq!(stub.add_calls(), 0);
    let snapshot = manager.snapshot().await.expect("snapshot");
    assert_eq!(snapshot.state, SessionState::Idle);
}

#[tokio::test]
async fn ready_selects_the_playable_file() {
    let stub = Arc::new(StubSwarmClient::new());
    let manager = manager_with(&stub, &config());
    let mut events = manager.subscribe(None);

    let id = start(&manager).await;
    eventually(|| stub.magnet_of(id).is_some()).await;
    stub.emit_ready(
        id,
        engine_files(&[("sample.nfo", 2_048), ("movie.mkv", 700_000_000)]),
    );

    let selected = loop {
        if let Event::FileSelected { file, .. } = next_event(&mut events).await {
            break file;
        }
    };
    assert_eq!(selected.name, "movie.mkv");
    assert_eq!(selected.index, 1);
    wait_for_state(&mut events, SessionState::Ready).await;

    let snapshot = manager.snapshot().await.expect("snapshot");
    assert_eq!(snapshot.state, SessionState::Ready);
    assert_eq!(
        snapshot.selected_file.map(|file| file.name).as_deref(),
        Some("movie.mkv")
    );
}

#[tokio::test]
async fn restarting_replaces_the_streaming_torrent() {
    let stub = Arc::new(StubSwarmClient::new());
    let manager = manager_with(&stub, &config());
    let mut events = manager.subscribe(None);

    let first = start(&manager).await;
    eventually(|| stub.magnet_of(first).is_some()).await;
    stub.emit_ready(first, engine_files(&[("movie.mkv", 1_000)]));
    stub.emit_progress(first, 0.1, 2_048, 0);
    wait_for_state(&mut events, SessionState::Streaming).await;

    let second = start(&manager).await;
    let message = wait_for_state(&mut events, SessionState::Stopped).await;
    assert_eq!(message.as_deref(), Some("superseded by a new session"));

    eventually(|| stub.active_torrents() == [second]).await;
    assert_eq!(stub.destroyed(), [(first, true)]);
    assert_eq!(stub.add_calls(), 2);
}

#[tokio::test]
async fn engine_error_ends_the_session_but_keeps_the_client() {
    let stub = Arc::new(StubSwarmClient::new());
    let manager = manager_with(&stub, &config());
    let mut events = manager.subscribe(None);

    let id = start(&manager).await;
    eventually(|| stub.magnet_of(id).is_some()).await;
    stub.emit_ready(id, engine_files(&[("movie.mkv", 1_000)]));
    wait_for_state(&mut events, SessionState::Ready).await;
    stub.emit_error(id, "tracker gone");

    let message = wait_for_state(&mut events, SessionState::Errored).await;
    assert!(message.is_some_and(|message| message.contains("tracker gone")));
    wait_for_state(&mut events, SessionState::Idle).await;

    let snapshot = manager.snapshot().await.expect("snapshot");
    assert_eq!(snapshot.last_outcome, Some(SessionState::Errored));
    assert_eq!(stub.destroyed(), [(id, true)]);

    let next = start(&manager).await;
    eventually(|| stub.active_torrents() == [next]).await;
}

#[tokio::test]
async fn rejected_add_errors_without_destroy() {
    let stub = Arc::new(StubSwarmClient::new());
    stub.fail_next_add("malformed magnet");
    let manager = manager_with(&stub, &config());
    let mut events = manager.subscribe(None);

    start(&manager).await;
    let message = wait_for_state(&mut events, SessionState::Errored).await;
    assert!(message.is_some_and(|message| message.contains("malformed magnet")));
    assert!(stub.destroyed().is_empty());
}

#[tokio::test]
async fn ready_deadline_errors_the_session() {
    let stub = Arc::new(StubSwarmClient::new());
    let manager = manager_with(
        &stub,
        &SessionConfig {
            ready_timeout_secs: 1,
            ..config()
        },
    );
    let mut events = manager.subscribe(None);

    let id = start(&manager).await;
    let message = wait_for_state(&mut events, SessionState::Errored).await;
    assert_eq!(message.as_deref(), Some("swarm not ready after 1s"));
    eventually(|| stub.destroyed() == [(id, true)]).await;
}

#[tokio::test]
async fn locator_failure_does_not_end_the_session() {
    let stub = Arc::new(StubSwarmClient::new());
    stub.fail_locators("file not yet on disk");
    let manager = manager_with(&stub, &config());
    manager
        .bind_playback(Arc::new(TracingSink))
        .await
        .expect("sink registered");
    let mut events = manager.subscribe(None);

    let id = start(&manager).await;
    eventually(|| stub.magnet_of(id).is_some()).await;
    stub.emit_ready(id, engine_files(&[("movie.mkv", 1_000)]));

    let message = loop {
        if let Event::PlaybackFailed { message, .. } = next_event(&mut events).await {
            break message;
        }
    };
    assert!(message.contains("file not yet on disk"));

    stub.emit_progress(id, 0.3, 1_024, 0);
    wait_for_state(&mut events, SessionState::Streaming).await;
    assert!(stub.destroyed().is_empty());
}

#[tokio::test]
async fn registered_sink_receives_the_locator() {
    let stub = Arc::new(StubSwarmClient::new());
    let manager = manager_with(&stub, &config());
    manager
        .bind_playback(Arc::new(TracingSink))
        .await
        .expect("sink registered");
    let mut events = manager.subscribe(None);

    let id = start(&manager).await;
    eventually(|| stub.magnet_of(id).is_some()).await;
    stub.emit_ready(id, engine_files(&[("extras.txt", 10), ("movie.mp4", 1_000)]));

    let locator = loop {
        if let Event::PlaybackBound { locator, .. } = next_event(&mut events).await {
            break locator;
        }
    };
    assert_eq!(locator, format!("stub://{id}/1"));
    wait_for_state(&mut events, SessionState::Streaming).await;
    let snapshot = manager.snapshot().await.expect("snapshot");
    assert_eq!(snapshot.playback_uri, Some(locator));
}

#[tokio::test]
async fn progress_callbacks_see_clamped_ratios() {
    let stub = Arc::new(StubSwarmClient::new());
    let manager = manager_with(&stub, &config());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let subscription = manager.on_progress(move |snapshot| {
        if let Ok(mut seen) = sink.lock() {
            seen.push(snapshot.progress_ratio);
        }
    });

    let id = start(&manager).await;
    eventually(|| stub.magnet_of(id).is_some()).await;
    stub.emit_ready(id, engine_files(&[("movie.mkv", 1_000)]));
    stub.emit_progress(id, 0.25, 1_024, 64);
    stub.emit_progress(id, 1.7, 1_024, 64);

    eventually(|| seen.lock().map(|seen| seen.len() >= 2).unwrap_or(false)).await;
    subscription.cancel();
    let ratios = seen.lock().expect("ratios").clone();
    assert!(ratios.iter().all(|ratio| (0.0..=1.0).contains(ratio)));
    assert_eq!(ratios[..2], [0.25, 1.0]);
}

#[tokio::test]
async fn stop_is_idempotent() {
    let stub = Arc::new(StubSwarmClient::new());
    let manager = manager_with(&stub, &config());

    let idle = manager.stop_session().await.expect("stop while idle");
    assert_eq!(idle.state, SessionState::Idle);
    assert_eq!(idle.last_outcome, None);

    let id = start(&manager).await;
    eventually(|| stub.magnet_of(id).is_some()).await;
    let stopped = manager.stop_session().await.expect("stop");
    assert_eq!(stopped.state, SessionState::Idle);
    assert_eq!(stopped.last_outcome, Some(SessionState::Stopped));
    assert_eq!(stub.destroyed(), [(id, true)]);

    manager.stop_session().await.expect("second stop");
    assert_eq!(stub.destroyed().len(), 1);
}

#[tokio::test]
async fn demo_engine_completes_and_keeps_data() {
    let stub = Arc::new(StubSwarmClient::demo(0.5));
    let metrics = Metrics::new().expect("metrics registry");
    let client: Arc<dyn SwarmClient> = Arc::clone(&stub) as Arc<dyn SwarmClient>;
    let manager = TorrentSessionManager::spawn_with_metrics(
        Arc::new(EngineContext::with_client(client)),
        EventBus::with_capacity(256),
        &config(),
        metrics.clone(),
    );
    let mut events = manager.subscribe(None);

    let id = start(&manager).await;
    wait_for_state(&mut events, SessionState::Completed).await;
    wait_for_state(&mut events, SessionState::Idle).await;

    assert_eq!(stub.destroyed(), [(id, false)]);
    let snapshot = manager.snapshot().await.expect("snapshot");
    assert_eq!(snapshot.last_outcome, Some(SessionState::Completed));

    let rendered = metrics.render().expect("render");
    assert!(rendered.contains("reelswarm_sessions_started_total 1"));
    assert!(rendered.contains(r#"reelswarm_session_outcomes_total{outcome="completed"} 1"#));
    assert_eq!(metrics.snapshot().active_sessions, 0);
}

#[tokio::test]
async fn engine_stats_are_zero_before_first_use() {
    let factory: SwarmClientFactory = Box::new(|| {
        async { Err::<Arc<dyn SwarmClient>, _>(anyhow::anyhow!("engine unavailable")) }.boxed()
    });
    let context = Arc::new(EngineContext::new(factory));
    let manager =
        TorrentSessionManager::spawn(context, EventBus::with_capacity(16), &config());

    assert_eq!(manager.engine_stats().await.torrents, 0);
    let err = manager
        .start_session(&streamable_record())
        .await
        .expect_err("factory failure surfaces");
    assert!(matches!(
        err,
        SessionError::Torrent(TorrentError::Engine { operation: "initialise_client", .. })
    ));
}

#[tokio::test]
async fn open_stream_follows_the_selected_file() {
    let stub = Arc::new(StubSwarmClient::new().with_contents(b"frames".to_vec()));
    let manager = manager_with(&stub, &config());
    let mut events = manager.subscribe(None);

    let err = manager.open_stream(None).await.expect_err("idle");
    assert!(matches!(err, SessionError::Torrent(TorrentError::NoSession)));

    let id = start(&manager).await;
    let err = manager.open_stream(None).await.expect_err("no metadata yet");
    assert!(matches!(err, SessionError::Torrent(TorrentError::FileNotSelected)));

    eventually(|| stub.magnet_of(id).is_some()).await;
    stub.emit_ready(id, engine_files(&[("movie.mp4", 6)]));
    wait_for_state(&mut events, SessionState::Ready).await;

    let stream = manager.open_stream(Some(id)).await.expect("stream opens");
    assert_eq!(stream.length, 6);
    assert_eq!(stream.content_type, "video/mp4");

    let err = manager
        .open_stream(Some(Uuid::new_v4()))
        .await
        .expect_err("stale session id");
    assert!(matches!(err, SessionError::Torrent(TorrentError::NoSession)));
}
