use super::common;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[tokio::test]
async fn e2e_push_channel_replays_pi_then_closes() {
    let (http, ws, server) = common::spawn_server(common::fast_config()).await;

    let (status, body) =
        common::post_json(&format!("{}/calculate_pi", http), json!({"n": 12})).await;
    assert_eq!(status, 200);
    let id = body["id"].as_str().unwrap().to_string();

    let (stream, _) = connect_async(format!("{}/ws/tasks/{}", ws, id)).await.unwrap();
    let (mut write, mut read) = stream.split();
    write.send(Message::Text("ping".to_string())).await.unwrap();

    let frames = common::read_all_frames(&mut read, Duration::from_secs(5)).await;
    assert_eq!(frames[0]["type"], "task.status", "status comes first");
    assert!(frames.iter().all(|f| f["task_id"] == id.as_str()));

    let text: String = frames
        .iter()
        .filter(|f| f["type"] == "task.result_chunk")
        .flat_map(|f| f["payload"]["data"].as_array().cloned().unwrap_or_default())
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert_eq!(text, "3.141592653589");

    let chunks: Vec<_> = frames
        .iter()
        .filter(|f| f["type"] == "task.result_chunk")
        .collect();
    assert_eq!(chunks.last().unwrap()["payload"]["is_last"], true);
    assert!(chunks[..chunks.len() - 1]
        .iter()
        .all(|c| c["payload"]["is_last"] == false));

    let last = frames.last().unwrap();
    assert_eq!(last["type"], "task.result");
    assert_eq!(last["payload"]["result"], "3.141592653589");

    server.abort();
}

#[tokio::test]
async fn e2e_late_subscriber_gets_released_items_in_one_chunk() {
    let (http, ws, server) = common::spawn_server(common::fast_config()).await;

    let (_, body) = common::post_json(
        &format!("{}/tasks/document-analysis", http),
        json!({"document_path": "/data/books/moby.txt", "keywords": ["whale"]}),
    )
    .await;
    let id = body["id"].as_str().unwrap().to_string();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let (stream, _) = connect_async(format!("{}/ws/tasks/{}", ws, id)).await.unwrap();
    let (_write, mut read) = stream.split();
    let frames = common::read_all_frames(&mut read, Duration::from_secs(5)).await;

    let chunks: Vec<_> = frames
        .iter()
        .filter(|f| f["type"] == "task.result_chunk")
        .collect();
    assert_eq!(chunks.len(), 1);
    let items = chunks[0]["payload"]["data"].as_array().unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0]["keyword"], "whale");
    assert_eq!(items[0]["location"]["line"], 7);
    assert_eq!(chunks[0]["payload"]["is_last"], true);

    server.abort();
}

#[tokio::test]
async fn e2e_unknown_push_task_is_refused() {
    let (_http, ws, server) = common::spawn_server(common::fast_config()).await;
    let result = connect_async(format!("{}/ws/tasks/nope", ws)).await;
    assert!(result.is_err(), "upgrade to an unknown task must fail");
    server.abort();
}
