use std::io::Write;

use overseer_config::{ManagerConfig, ResultSocketKind};
use overseer_transport::{Endpoint, PushSocket};

use super::*;

fn test_manager_config() -> ManagerConfig {
    ManagerConfig {
        name: "Generic".into(),
        num_workers: 1,
        worker_variant: "echo".into(),
        result_socket_type: ResultSocketKind::Pushpull,
        result_dataflow_type: DataflowKind::String,
        result_lp_socket: "none".into(),
        result_hp_socket: "none".into(),
    }
}

fn test_emitter() -> Arc<MonitoringEmitter> {
    let socket = PushSocket::connect(Endpoint::parse("tcp://127.0.0.1:1").unwrap())
        .with_connect_timeout(Duration::from_millis(100));
    Arc::new(MonitoringEmitter::new(socket))
}

struct Fixture {
    shared: Arc<SharedState>,
    managers: Vec<Arc<WorkerManager>>,
    sender: PushSocket,
}

/// Bind a pull-side listener, wire it to `manager_count` managers and
/// hand back a connected pusher.
async fn start_listener(dataflow: DataflowKind, manager_count: usize) -> Fixture {
    let shared = Arc::new(SharedState::new());
    let cancel = shared.cancel_token();
    let emitter = test_emitter();

    let managers: Vec<_> = (0..manager_count)
        .map(|i| WorkerManager::new(i, "T1", test_manager_config(), &cancel, Arc::clone(&emitter)))
        .collect();

    let pull = PullSocket::bind(&Endpoint::parse("tcp://127.0.0.1:0").unwrap())
        .await
        .unwrap();
    let endpoint =
        Endpoint::parse(&format!("tcp://127.0.0.1:{}", pull.local_addr().port())).unwrap();

    let listener = IngressListener::new(
        Priority::Low,
        dataflow,
        IngressSocket::Pull(pull),
        managers.clone(),
        Arc::clone(&shared),
        emitter,
        "T1".into(),
    );
    tokio::spawn(listener.run());

    Fixture {
        shared,
        managers,
        sender: PushSocket::connect(endpoint),
    }
}

async fn wait_until(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

#[tokio::test]
async fn test_stopdata_parks_the_listener() {
    let fixture = start_listener(DataflowKind::String, 1).await;
    let manager = &fixture.managers[0];

    // Gate is closed by default: frames may pile up in the transport
    // but must not reach any input queue.
    fixture.sender.send(b"early").await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(manager.input_queue(Priority::Low).len(), 0);

    // Opening the gate lets the frame through.
    fixture.shared.set_stopdata(false);
    assert!(
        wait_until(Duration::from_secs(2), || {
            manager.input_queue(Priority::Low).len() == 1
        })
        .await
    );
    let item = manager.input_queue(Priority::Low).try_pop().unwrap();
    assert_eq!(item.string_form(), "early");
}

#[tokio::test]
async fn test_fan_out_reaches_every_manager() {
    let fixture = start_listener(DataflowKind::String, 3).await;
    fixture.shared.set_stopdata(false);

    fixture.sender.send(b"shared-item").await.unwrap();

    for manager in &fixture.managers {
        let queue = Arc::clone(manager.input_queue(Priority::Low));
        assert!(wait_until(Duration::from_secs(2), || queue.len() == 1).await);
        assert_eq!(queue.try_pop().unwrap().string_form(), "shared-item");
    }
}

#[tokio::test]
async fn test_binary_frames_are_decoded() {
    let fixture = start_listener(DataflowKind::Binary, 1).await;
    fixture.shared.set_stopdata(false);
    let queue = Arc::clone(fixture.managers[0].input_queue(Priority::Low));

    fixture.sender.send(br#"{"name": "mp1"}"#).await.unwrap();

    assert!(wait_until(Duration::from_secs(2), || queue.len() == 1).await);
    let item = queue.try_pop().unwrap();
    assert_eq!(item.as_record().unwrap()["name"], "mp1");
}

#[tokio::test]
async fn test_undecodable_binary_frame_is_dropped() {
    let fixture = start_listener(DataflowKind::Binary, 1).await;
    fixture.shared.set_stopdata(false);
    let queue = Arc::clone(fixture.managers[0].input_queue(Priority::Low));

    fixture.sender.send(b"not a record").await.unwrap();
    fixture.sender.send(br#"{"ok": true}"#).await.unwrap();

    // Only the valid frame lands; the loop survives the bad one.
    assert!(wait_until(Duration::from_secs(2), || queue.len() == 1).await);
    assert_eq!(queue.try_pop().unwrap().as_record().unwrap()["ok"], true);
}

#[tokio::test]
async fn test_filename_fans_out_records_in_order() {
    let fixture = start_listener(DataflowKind::Filename, 1).await;
    fixture.shared.set_stopdata(false);
    let queue = Arc::clone(fixture.managers[0].input_queue(Priority::Low));

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"{{"seq": 0}}"#).unwrap();
    writeln!(file).unwrap();
    writeln!(file, r#"{{"seq": 1}}"#).unwrap();
    writeln!(file, r#"{{"seq": 2}}"#).unwrap();
    file.flush().unwrap();

    fixture
        .sender
        .send(file.path().to_string_lossy().as_bytes())
        .await
        .unwrap();

    // Empty lines are skipped; the three records arrive in file order.
    assert!(wait_until(Duration::from_secs(2), || queue.len() == 3).await);
    for seq in 0..3 {
        let item = queue.try_pop().unwrap();
        assert_eq!(item.as_record().unwrap()["seq"], seq);
    }
}

#[tokio::test]
async fn test_unparseable_file_is_abandoned_whole() {
    let fixture = start_listener(DataflowKind::Filename, 1).await;
    fixture.shared.set_stopdata(false);
    let queue = Arc::clone(fixture.managers[0].input_queue(Priority::Low));

    let mut bad = tempfile::NamedTempFile::new().unwrap();
    writeln!(bad, r#"{{"seq": 0}}"#).unwrap();
    writeln!(bad, "definitely not a record").unwrap();
    writeln!(bad, r#"{{"seq": 2}}"#).unwrap();
    bad.flush().unwrap();

    let mut good = tempfile::NamedTempFile::new().unwrap();
    writeln!(good, r#"{{"seq": 9}}"#).unwrap();
    good.flush().unwrap();

    fixture
        .sender
        .send(bad.path().to_string_lossy().as_bytes())
        .await
        .unwrap();
    fixture
        .sender
        .send(good.path().to_string_lossy().as_bytes())
        .await
        .unwrap();

    // Nothing from the bad file, not even its valid first line.
    assert!(wait_until(Duration::from_secs(2), || queue.len() == 1).await);
    assert_eq!(queue.try_pop().unwrap().as_record().unwrap()["seq"], 9);
}

#[tokio::test]
async fn test_missing_file_is_logged_and_skipped() {
    let fixture = start_listener(DataflowKind::Filename, 1).await;
    fixture.shared.set_stopdata(false);
    let queue = Arc::clone(fixture.managers[0].input_queue(Priority::Low));

    fixture
        .sender
        .send(b"/nonexistent/path/records.jsonl")
        .await
        .unwrap();

    let mut good = tempfile::NamedTempFile::new().unwrap();
    writeln!(good, r#"{{"seq": 1}}"#).unwrap();
    good.flush().unwrap();
    fixture
        .sender
        .send(good.path().to_string_lossy().as_bytes())
        .await
        .unwrap();

    assert!(wait_until(Duration::from_secs(2), || queue.len() == 1).await);
}

#[tokio::test]
async fn test_listener_exits_on_cancellation() {
    let fixture = start_listener(DataflowKind::String, 1).await;
    fixture.shared.set_stopdata(false);

    fixture.shared.stop_all_loops();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Frames sent after shutdown go nowhere.
    let _ = fixture.sender.send(b"too-late").await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(fixture.managers[0].input_queue(Priority::Low).len(), 0);
}
