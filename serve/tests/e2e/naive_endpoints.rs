use super::common;
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn e2e_naive_pi_snapshot_grows_to_full_result() {
    let (http, _ws, server) = common::spawn_server(common::fast_config()).await;

    let (status, body) = common::post_json(
        &format!("{}/naive/calculate_pi", http),
        json!({"digits": 20, "task_id": "twin-1"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["task_id"], "twin-1");

    let mut last = String::new();
    for _ in 0..200 {
        let (status, body) = common::get_json(
            &format!("{}/naive/task_result", http),
            &[("task_id", "twin-1".to_string())],
        )
        .await;
        assert_eq!(status, 200);
        let partial = body["partial_result"].as_str().unwrap().to_string();
        assert!(
            partial.starts_with(&last),
            "snapshot shrank: {:?} -> {:?}",
            last,
            partial
        );
        last = partial;
        if body["done"] == true {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(last, "3.14159265358979323846");

    let (_, progress) = common::get_json(
        &format!("{}/naive/check_progress", http),
        &[("task_id", "twin-1".to_string())],
    )
    .await;
    assert_eq!(progress["state"], "COMPLETED");
    assert_eq!(progress["progress"]["percentage"], 1.0);

    server.abort();
}

#[tokio::test]
async fn e2e_snippet_cursor_returns_only_newer_items() {
    let (http, _ws, server) = common::spawn_server(common::fast_config()).await;

    let (status, _) = common::post_json(
        &format!("{}/naive/document-analysis", http),
        json!({"task_id": "doc-1", "document_path": "/data/books/moby.txt", "keywords": ["whale", "sea"]}),
    )
    .await;
    assert_eq!(status, 200);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let url = format!("{}/naive/document-analysis/snippets", http);
    let (_, all) = common::get_json(&url, &[("task_id", "doc-1".to_string())]).await;
    assert_eq!(all["snippets"].as_array().unwrap().len(), 6);
    assert_eq!(all["last_id"], 6);

    let (_, newer) = common::get_json(
        &url,
        &[("task_id", "doc-1".to_string()), ("after", "4".to_string())],
    )
    .await;
    let ids: Vec<u64> = newer["snippets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![5, 6]);

    let (_, none) = common::get_json(
        &url,
        &[("task_id", "doc-1".to_string()), ("after", "6".to_string())],
    )
    .await;
    assert!(none["snippets"].as_array().unwrap().is_empty());
    assert_eq!(none["last_id"], 6);

    server.abort();
}

#[tokio::test]
async fn e2e_unknown_task_and_invalid_input_are_rejected() {
    let (http, _ws, server) = common::spawn_server(common::fast_config()).await;

    let (status, body) = common::get_json(
        &format!("{}/naive/check_progress", http),
        &[("task_id", "missing".to_string())],
    )
    .await;
    assert_eq!(status, 404);
    assert!(body["detail"].as_str().unwrap().contains("missing"));

    let (status, _) = common::post_json(&format!("{}/calculate_pi", http), json!({"n": 0})).await;
    assert_eq!(status, 422);

    let (status, _) = common::post_json(
        &format!("{}/tasks/document-analysis", http),
        json!({"document_path": "/data/books/a.txt", "keywords": ["  "]}),
    )
    .await;
    assert_eq!(status, 422);

    server.abort();
}
