//! Wire-level tests: every request is authenticated and parsed before any
//! action logic runs.

use serde_json::json;

use crate::fixtures::TestDaemon;

#[tokio::test]
async fn test_wrong_key_rejected() {
    let daemon = TestDaemon::start().await;
    let response = daemon
        .request_raw(r#"{"api_key": "wrong", "action": "reboot"}"#)
        .await;
    assert_eq!(response["status"], "error");
    assert_eq!(response["message"], "Unauthorized");
}

#[tokio::test]
async fn test_missing_key_rejected() {
    let daemon = TestDaemon::start().await;
    let response = daemon.request_raw(r#"{"action": "device_info"}"#).await;
    assert_eq!(response["message"], "Unauthorized");
}

#[tokio::test]
async fn test_bad_key_masks_action_validity() {
    // An unauthorized caller gets the same answer for a nonsense action as
    // for a real one.
    let daemon = TestDaemon::start().await;
    let response = daemon
        .request_raw(r#"{"api_key": "wrong", "action": "no_such_thing"}"#)
        .await;
    assert_eq!(response["message"], "Unauthorized");
}

#[tokio::test]
async fn test_unknown_action_rejected() {
    let daemon = TestDaemon::start().await;
    let response = daemon.request(json!({"action": "no_such_thing"})).await;
    assert_eq!(response["status"], "error");
    assert!(response["message"]
        .as_str()
        .unwrap()
        .starts_with("Invalid action:"));
}

#[tokio::test]
async fn test_missing_parameter_rejected() {
    let daemon = TestDaemon::start().await;
    let response = daemon.request(json!({"action": "process_kill"})).await;
    assert_eq!(response["status"], "error");
    assert!(response["message"]
        .as_str()
        .unwrap()
        .starts_with("Invalid action:"));
}

#[tokio::test]
async fn test_malformed_line_gets_structured_error() {
    let daemon = TestDaemon::start().await;
    let response = daemon.request_raw("this is not json").await;
    assert_eq!(response["status"], "error");
    assert!(response["message"]
        .as_str()
        .unwrap()
        .contains("Malformed request"));
}

#[tokio::test]
async fn test_error_response_shape() {
    // Error responses carry exactly status and message, nothing else
    let daemon = TestDaemon::start().await;
    let response = daemon.request_raw(r#"{"action": "reboot"}"#).await;
    let keys: Vec<&String> = response.as_object().unwrap().keys().collect();
    assert_eq!(keys, ["message", "status"]);
}

#[tokio::test]
async fn test_requests_answered_in_order() {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;

    let daemon = TestDaemon::start().await;
    let mut stream = TcpStream::connect(daemon.addr).await.unwrap();
    let batch = format!(
        "{}\n{}\n{}\n",
        json!({"api_key": crate::fixtures::TEST_KEY, "action": "capture_stop"}),
        json!({"api_key": "wrong", "action": "capture_stop"}),
        json!({"api_key": crate::fixtures::TEST_KEY, "action": "no_such_thing"}),
    );
    stream.write_all(batch.as_bytes()).await.unwrap();

    let (read_half, _write_half) = stream.split();
    let mut lines = BufReader::new(read_half).lines();

    let first: serde_json::Value =
        serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
    assert_eq!(first["status"], "success");

    let second: serde_json::Value =
        serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
    assert_eq!(second["message"], "Unauthorized");

    let third: serde_json::Value =
        serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
    assert!(third["message"]
        .as_str()
        .unwrap()
        .starts_with("Invalid action:"));
}
