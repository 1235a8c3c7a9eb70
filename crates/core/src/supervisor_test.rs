use tokio::time::timeout;

use overseer_config::{DataflowKind, ManagerConfig, ResultSocketKind};
use overseer_protocol::{Item, MSG_ALARM, MSG_HEARTBEAT};
use overseer_transport::PubSocket;

use super::*;

fn sup_config(command_socket: String, monitoring_socket: String) -> SupervisorConfig {
    SupervisorConfig {
        logs_path: "logs".into(),
        processing_type: "thread".into(),
        dataflow_type: DataflowKind::String,
        datasocket_type: DataSocketKind::Custom,
        data_lp_socket: String::new(),
        data_hp_socket: String::new(),
        command_socket,
        monitoring_socket,
        managers: vec![ManagerConfig {
            name: "Generic".into(),
            num_workers: 1,
            worker_variant: "echo".into(),
            result_socket_type: ResultSocketKind::Pushpull,
            result_dataflow_type: DataflowKind::String,
            result_lp_socket: "none".into(),
            result_hp_socket: "none".into(),
        }],
    }
}

struct Fixture {
    command: PubSocket,
    monitoring: PullSocket,
    shared: Arc<SharedState>,
    managers: Vec<Arc<WorkerManager>>,
    handle: ControlHandle,
    task: tokio::task::JoinHandle<Result<(), SupervisorError>>,
}

impl Fixture {
    async fn send_command(&self, kind: CommandKind, pidsource: &str, pidtarget: &str) {
        let envelope = Envelope::command(&kind, pidsource, pidtarget);
        self.command
            .send(&envelope.encode().unwrap())
            .await
            .unwrap();
    }

    async fn next_monitoring(&mut self) -> Option<Envelope> {
        let frame = timeout(Duration::from_secs(2), self.monitoring.recv())
            .await
            .ok()??;
        Envelope::decode(&frame).ok()
    }

    async fn wait_for_state(&self, state: State) -> bool {
        let start = tokio::time::Instant::now();
        while start.elapsed() < Duration::from_secs(3) {
            if self.shared.state() == state {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.shared.state() == state
    }

    async fn shut_down(self) {
        self.handle.send(CommandKind::Shutdown);
        let _ = timeout(Duration::from_secs(5), self.task).await;
    }
}

/// Boot a supervisor with custom ingress against live command and
/// monitoring peers, and wait until it is accepting commands.
async fn start_supervisor(name: &str) -> Fixture {
    let command = PubSocket::bind(&Endpoint::parse("tcp://127.0.0.1:0").unwrap())
        .await
        .unwrap();
    let monitoring = PullSocket::bind(&Endpoint::parse("tcp://127.0.0.1:0").unwrap())
        .await
        .unwrap();

    let cfg = sup_config(
        format!("tcp://127.0.0.1:{}", command.local_addr().port()),
        format!("tcp://127.0.0.1:{}", monitoring.local_addr().port()),
    );

    let supervisor = Supervisor::new(cfg, name).unwrap();
    let shared = supervisor.shared_state();
    let managers = supervisor.managers().to_vec();
    let handle = supervisor.control_handle();
    let task = tokio::spawn(supervisor.run());

    let fixture = Fixture {
        command,
        monitoring,
        shared,
        managers,
        handle,
        task,
    };

    assert!(fixture.wait_for_state(State::Waiting).await);

    // The command subscription must be live before tests publish.
    let start = tokio::time::Instant::now();
    while fixture.command.subscriber_count().await == 0 {
        assert!(start.elapsed() < Duration::from_secs(3), "sub never connected");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    fixture
}

#[tokio::test]
async fn test_start_stop_state_machine() {
    let fixture = start_supervisor("SM1").await;

    fixture
        .send_command(CommandKind::Start, "testbench", "SM1")
        .await;
    assert!(fixture.wait_for_state(State::Processing).await);
    assert!(!fixture.shared.stopdata());
    assert!(fixture.managers[0].processdata());

    fixture
        .send_command(CommandKind::Stop, "testbench", "SM1")
        .await;
    assert!(fixture.wait_for_state(State::Waiting).await);
    assert!(fixture.shared.stopdata());
    assert!(!fixture.managers[0].processdata());

    fixture.shut_down().await;
}

#[tokio::test]
async fn test_getstatus_heartbeat_echoes_pidsource() {
    let mut fixture = start_supervisor("SM2").await;

    fixture
        .send_command(CommandKind::GetStatus, "console-7", "SM2")
        .await;

    // Skip state-change info reports until the heartbeat shows up.
    let mut heartbeat = None;
    for _ in 0..20 {
        match fixture.next_monitoring().await {
            Some(env) if env.header.kind == MSG_HEARTBEAT => {
                heartbeat = Some(env);
                break;
            }
            Some(_) => continue,
            None => break,
        }
    }

    let heartbeat = heartbeat.expect("no heartbeat received");
    assert_eq!(heartbeat.header.pidtarget, "console-7");
    assert_eq!(heartbeat.header.pidsource, "SM2-Generic");
    assert_eq!(
        heartbeat.body["globalname"],
        "WorkerManager-SM2-Generic"
    );
    assert_eq!(heartbeat.body["worker_count"], 1);

    fixture.shut_down().await;
}

#[tokio::test]
async fn test_unknown_command_is_ignored() {
    let mut fixture = start_supervisor("SM3").await;

    let envelope = Envelope::command(
        &CommandKind::Unknown("nonsense".into()),
        "testbench",
        "SM3",
    );
    fixture
        .command
        .send(&envelope.encode().unwrap())
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(fixture.shared.state(), State::Waiting);

    // No new alarm on the monitoring channel either.
    fixture
        .send_command(CommandKind::GetStatus, "probe", "SM3")
        .await;
    loop {
        match fixture.next_monitoring().await {
            Some(env) => {
                assert_ne!(env.header.kind, MSG_ALARM);
                if env.header.kind == MSG_HEARTBEAT {
                    break;
                }
            }
            None => panic!("monitoring went quiet before the heartbeat"),
        }
    }

    fixture.shut_down().await;
}

#[tokio::test]
async fn test_command_for_other_supervisor_is_ignored() {
    let fixture = start_supervisor("SM4").await;

    fixture
        .send_command(CommandKind::Start, "testbench", "SOMEONE-ELSE")
        .await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(fixture.shared.state(), State::Waiting);

    // Broadcast targets do reach it.
    fixture
        .send_command(CommandKind::Start, "testbench", "all")
        .await;
    assert!(fixture.wait_for_state(State::Processing).await);

    fixture.shut_down().await;
}

#[tokio::test]
async fn test_reset_clears_queues_and_is_idempotent() {
    let fixture = start_supervisor("SM5").await;
    let manager = &fixture.managers[0];

    // Processing is gated in Waiting, so injected items stay queued.
    for i in 0..10 {
        manager
            .input_queue(Priority::Low)
            .push(Item::text(format!("{i}")));
    }
    assert_eq!(manager.input_queue(Priority::Low).len(), 10);

    fixture
        .send_command(CommandKind::Reset, "testbench", "SM5")
        .await;

    let start = tokio::time::Instant::now();
    while !manager.input_queues_empty() && start.elapsed() < Duration::from_secs(2) {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(manager.input_queues_empty());
    assert!(manager.result_queues_empty());
    assert_eq!(fixture.shared.state(), State::Waiting);

    // A second reset at steady state changes nothing.
    fixture
        .send_command(CommandKind::Reset, "testbench", "SM5")
        .await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(fixture.shared.state(), State::Waiting);
    assert!(manager.input_queues_empty());

    fixture.shut_down().await;
}

#[tokio::test]
async fn test_shutdown_terminates_run() {
    let fixture = start_supervisor("SM6").await;

    fixture
        .send_command(CommandKind::Shutdown, "testbench", "SM6")
        .await;

    let result = timeout(Duration::from_secs(5), fixture.task)
        .await
        .expect("run did not terminate")
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(fixture.shared.state(), State::Shutdown);
    assert!(!fixture.shared.continue_all());
}

#[tokio::test]
async fn test_cleanedshutdown_outside_processing_forces_shutdown() {
    let fixture = start_supervisor("SM7").await;

    fixture
        .send_command(CommandKind::CleanedShutdown, "testbench", "SM7")
        .await;

    let result = timeout(Duration::from_secs(5), fixture.task)
        .await
        .expect("run did not terminate")
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(fixture.shared.state(), State::Shutdown);
}

#[tokio::test]
async fn test_cleanedshutdown_drains_queues_first() {
    let fixture = start_supervisor("SM8").await;
    let manager = Arc::clone(&fixture.managers[0]);

    fixture
        .send_command(CommandKind::Start, "testbench", "SM8")
        .await;
    assert!(fixture.wait_for_state(State::Processing).await);

    for i in 0..25 {
        manager
            .input_queue(Priority::Low)
            .push(Item::text(format!("{i}")));
    }

    fixture
        .send_command(CommandKind::CleanedShutdown, "testbench", "SM8")
        .await;

    let result = timeout(Duration::from_secs(10), fixture.task)
        .await
        .expect("run did not terminate")
        .unwrap();
    assert!(result.is_ok());

    // Shutdown only completes once every queue has drained.
    assert!(manager.input_queues_empty());
    assert!(manager.result_queues_empty());
    assert_eq!(fixture.shared.state(), State::Shutdown);
}

#[tokio::test]
async fn test_control_handle_drives_shutdown() {
    let fixture = start_supervisor("SM9").await;

    assert!(fixture.handle.send(CommandKind::Shutdown));

    let result = timeout(Duration::from_secs(5), fixture.task)
        .await
        .expect("run did not terminate")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_startup_fails_on_bad_monitoring_endpoint() {
    let cfg = sup_config("tcp://127.0.0.1:5553".into(), "not-a-uri".into());
    assert!(Supervisor::new(cfg, "BAD").is_err());
}

#[tokio::test]
async fn test_startup_fails_on_unknown_worker_variant() {
    let command = PubSocket::bind(&Endpoint::parse("tcp://127.0.0.1:0").unwrap())
        .await
        .unwrap();
    let monitoring = PullSocket::bind(&Endpoint::parse("tcp://127.0.0.1:0").unwrap())
        .await
        .unwrap();

    let mut cfg = sup_config(
        format!("tcp://127.0.0.1:{}", command.local_addr().port()),
        format!("tcp://127.0.0.1:{}", monitoring.local_addr().port()),
    );
    cfg.managers[0].worker_variant = "made-up".into();

    let supervisor = Supervisor::new(cfg, "BAD2").unwrap();
    let result = supervisor.run().await;
    assert!(matches!(
        result,
        Err(SupervisorError::UnknownWorkerVariant { .. })
    ));
}
