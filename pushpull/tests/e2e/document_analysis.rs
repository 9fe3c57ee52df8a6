use super::common;
use pushpull::{ClientStatus, Mode, RunStatus, TaskSpec};
use std::time::Duration;

#[tokio::test]
async fn e2e_snippets_render_identically_over_push_and_cursor() {
    let (api, server) = common::spawn_backend(Duration::from_millis(10)).await;
    let mut controller = common::controller(common::engine_config(&api, 2));

    controller
        .run(TaskSpec::DocumentAnalysis {
            document_path: None,
            document_url: Some("https://example.org/books/moby.txt".to_string()),
            keywords: vec!["whale".to_string(), "sea".to_string()],
        })
        .await
        .unwrap();

    let state = common::settle(&controller, Duration::from_secs(20)).await;
    assert_eq!(state.status, RunStatus::Done, "error: {:?}", state.error);

    let expected = state.clients(Mode::Streaming)[0].result.text().to_string();
    let lines: Vec<&str> = expected.lines().collect();
    assert_eq!(lines.len(), 6);
    assert!(lines[0].starts_with("[line 7] whale: "), "got {:?}", lines[0]);
    assert!(lines[0].contains("moby.txt"));
    assert!(lines[1].starts_with("[line 20] sea: "), "got {:?}", lines[1]);

    for mode in Mode::ALL {
        for client in state.clients(mode) {
            assert_eq!(client.status, ClientStatus::Completed);
            assert_eq!(client.result.text(), expected, "{} client {}", mode, client.id);
            assert_eq!(client.rejected_items, 0);
        }
    }
    for client in state.clients(Mode::Polling) {
        assert_eq!(client.result.last_seen_id(), Some(6));
    }

    controller.shutdown().await;
    server.abort();
}

#[tokio::test]
async fn e2e_blank_keywords_are_rejected_locally() {
    let (api, server) = common::spawn_backend(Duration::from_millis(10)).await;
    let mut controller = common::controller(common::engine_config(&api, 1));

    let result = controller
        .run(TaskSpec::DocumentAnalysis {
            document_path: Some("/data/books/a.txt".to_string()),
            document_url: None,
            keywords: vec![" ".to_string()],
        })
        .await;
    assert!(result.is_err());
    assert_eq!(controller.active_sessions(), 0);

    controller.shutdown().await;
    server.abort();
}
