use super::common;
use pushpull::{AggregateView, ClientStatus, Mode, RunStatus, TaskSpec};
use std::time::Duration;

const PI_30: &str = "3.141592653589793238462643383279";

#[tokio::test]
async fn e2e_both_modes_reach_identical_pi_result() {
    // Slow enough that every 20ms poller sees the task RUNNING past 0%.
    let (api, server) = common::spawn_backend(Duration::from_millis(30)).await;
    let mut controller = common::controller(common::engine_config(&api, 3));

    let started = controller
        .run(TaskSpec::ComputePi { digits: 30 })
        .await
        .unwrap();
    assert!(!started.task_id.is_empty());
    assert_eq!(controller.active_sessions(), 6);

    let state = common::settle(&controller, Duration::from_secs(20)).await;
    assert_eq!(state.status, RunStatus::Done, "error: {:?}", state.error);
    assert_eq!(state.task_id.as_deref(), Some(started.task_id.as_str()));

    for mode in Mode::ALL {
        for client in state.clients(mode) {
            assert!(client.completed, "{} client {} not completed", mode, client.id);
            assert_eq!(client.status, ClientStatus::Completed);
            assert_eq!(client.result.text(), PI_30, "{} client {}", mode, client.id);
            assert!(client.metrics.units > 0);
            assert!(client.metrics.bytes > 0);
            assert!(client.metrics.first_update.is_some());
            assert!(client.metrics.total.is_some());
        }
    }

    let [streaming, polling] = AggregateView::summaries(&state);
    assert_eq!(streaming.completed, 3);
    assert_eq!(polling.completed, 3);
    // The final push tick always carries a COMPLETED status before the last chunk.
    assert!((streaming.progress - 1.0).abs() < 1e-9);

    controller.shutdown().await;
    server.abort();
}

#[tokio::test]
async fn e2e_invalid_digits_fail_before_any_session() {
    let (api, server) = common::spawn_backend(Duration::from_millis(10)).await;
    let mut controller = common::controller(common::engine_config(&api, 2));

    let err = controller
        .run(TaskSpec::ComputePi { digits: 0 })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("digits"), "got {}", err);
    assert_eq!(controller.active_sessions(), 0);

    let state = common::settle(&controller, Duration::from_secs(5)).await;
    assert_eq!(state.status, RunStatus::Error);
    assert!(state.error.is_some());

    controller.shutdown().await;
    server.abort();
}

#[tokio::test]
async fn e2e_backend_rejection_surfaces_as_startup_error() {
    let (api, server) = common::spawn_backend(Duration::from_millis(10)).await;
    let mut controller = common::controller(common::engine_config(&api, 1));

    // Above the backend's digit limit: creation is refused with 422.
    let err = controller
        .run(TaskSpec::ComputePi { digits: 5000 })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("create push task"), "got {}", err);

    let state = common::settle(&controller, Duration::from_secs(5)).await;
    assert_eq!(state.status, RunStatus::Error);

    controller.shutdown().await;
    server.abort();
}

#[tokio::test]
async fn e2e_unreachable_backend_is_a_startup_error() {
    // Bind then drop to get a port nothing listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut config = common::engine_config(&format!("http://{}/api", addr), 1);
    config.connect_timeout = Duration::from_secs(1);
    let mut controller = common::controller(config);
    let err = controller
        .run(TaskSpec::ComputePi { digits: 10 })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("create push task"), "got {}", err);
    controller.shutdown().await;
}
