use super::common;
use pushpull::{Mode, RunStatus, TaskSpec};
use std::time::Duration;

#[tokio::test]
async fn e2e_rerun_mid_flight_starts_clean() {
    // Slow backend so the first run is still going when the second starts.
    let (api, server) = common::spawn_backend(Duration::from_millis(50)).await;
    let mut controller = common::controller(common::engine_config(&api, 2));

    let first = controller
        .run(TaskSpec::ComputePi { digits: 200 })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    let second = controller
        .run(TaskSpec::ComputePi { digits: 10 })
        .await
        .unwrap();
    assert_ne!(first.task_id, second.task_id);
    assert_eq!(controller.active_sessions(), 4);

    let state = common::settle(&controller, Duration::from_secs(20)).await;
    assert_eq!(state.status, RunStatus::Done);
    assert_eq!(state.generation, 2);
    assert_eq!(state.task_id.as_deref(), Some(second.task_id.as_str()));
    for mode in Mode::ALL {
        for client in state.clients(mode) {
            assert_eq!(client.result.text(), "3.1415926535");
        }
    }

    controller.shutdown().await;
    server.abort();
}
