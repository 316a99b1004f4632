//! Dispatch behavior observable without an attached device.
//!
//! With no device on the bridge, every device-bound action must fail fast
//! with the same error before any command template runs. Deviceless actions
//! keep working.

use serde_json::json;

use crate::fixtures::TestDaemon;

#[tokio::test]
async fn test_device_actions_fail_fast_without_device() {
    let daemon = TestDaemon::start().await;
    let actions = [
        json!({"action": "reboot"}),
        json!({"action": "screenshot"}),
        json!({"action": "device_info"}),
        json!({"action": "process_list"}),
        json!({"action": "toggle_wifi"}),
        json!({"action": "security_audit"}),
        json!({"action": "app_list"}),
        json!({"action": "mirror_start"}),
        json!({"action": "record_start"}),
        json!({"action": "open_url", "value": "example.com"}),
        json!({"action": "key_event", "key": "volume_up"}),
        json!({"action": "shell_exec", "command": "ls"}),
        json!({"action": "file_pull", "path": "/sdcard/x.txt"}),
        json!({"action": "backup_full"}),
    ];
    for action in actions {
        let response = daemon.request(action.clone()).await;
        assert_eq!(response["status"], "error", "action: {}", action);
        assert_eq!(
            response["message"], "No device connected.",
            "action: {}",
            action
        );
    }
}

#[tokio::test]
async fn test_capture_stop_is_idempotent_over_the_wire() {
    let daemon = TestDaemon::start().await;
    for _ in 0..2 {
        let response = daemon.request(json!({"action": "capture_stop"})).await;
        assert_eq!(response["status"], "success");
        assert_eq!(response["message"], "Mirror/Record process stopped.");
    }
    assert!(daemon.capture.active().await.is_none());
}

#[tokio::test]
async fn test_client_launch_without_configured_path() {
    let daemon = TestDaemon::start().await;
    let response = daemon
        .request(json!({"action": "client_launch", "ip": "192.168.1.50"}))
        .await;
    assert_eq!(response["status"], "error");
    assert!(response["message"]
        .as_str()
        .unwrap()
        .contains("No desktop client path configured"));
}

#[tokio::test]
async fn test_client_launch_requires_ip() {
    let daemon = TestDaemon::start().await;
    let response = daemon
        .request(json!({"action": "client_launch", "ip": ""}))
        .await;
    assert_eq!(response["status"], "error");
    assert!(response["message"]
        .as_str()
        .unwrap()
        .contains("Device IP not provided"));
}

#[tokio::test]
async fn test_connect_requires_address() {
    let daemon = TestDaemon::start().await;
    let response = daemon
        .request(json!({"action": "connect", "ip_port": "  "}))
        .await;
    assert_eq!(response["status"], "error");
    assert!(response["message"]
        .as_str()
        .unwrap()
        .contains("No address provided"));
}

#[tokio::test]
async fn test_settings_actions_accept_numeric_values() {
    // The value field may arrive as a JSON number; it still parses and the
    // request proceeds to the (failing) device resolution stage.
    let daemon = TestDaemon::start().await;
    let response = daemon
        .request(json!({"action": "set_dark_mode", "value": 2}))
        .await;
    assert_eq!(response["message"], "No device connected.");

    let response = daemon
        .request(json!({"action": "set_timeout", "value": 60000}))
        .await;
    assert_eq!(response["message"], "No device connected.");
}
