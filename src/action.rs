//! Wire types: the closed action set, the request envelope and the
//! structured response.
//!
//! Requests arrive as one JSON object per line carrying the shared secret,
//! an `action` tag and the parameters that action needs. The enum is closed
//! on purpose — the dispatcher matches exhaustively, so adding an operation
//! means adding a variant, not a string comparison.

use serde::de::{Deserializer, Error as _};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Every operation the daemon supports. Each variant carries only the
/// parameters it needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Reboot,
    Screenshot,
    OpenUrl {
        #[serde(default)]
        value: Option<String>,
    },
    KeyEvent {
        key: KeyKind,
    },
    SetDarkMode {
        #[serde(deserialize_with = "string_or_number")]
        value: String,
    },
    SetTimeout {
        #[serde(deserialize_with = "string_or_number")]
        value: String,
    },
    ToggleWifi,
    LaunchCompanionApp,
    ProcessList,
    ProcessKill {
        package_name: String,
    },
    ShellExec {
        command: String,
    },
    FilePull {
        path: String,
    },
    FilePush {
        filename: String,
    },
    AppInstall {
        filename: String,
    },
    AppUninstall {
        package_name: String,
    },
    AppList,
    BackupFull,
    PhotoPull,
    CacheClear,
    SecurityAudit,
    ConnectionList,
    DeviceInfo,
    Connect {
        ip_port: String,
    },
    MirrorStart,
    RecordStart,
    CaptureStop,
    ClientLaunch {
        ip: String,
    },
}

/// Hardware keys that can be injected as input events, with their platform
/// keycodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    VolumeUp,
    VolumeDown,
    Mute,
    Power,
}

impl KeyKind {
    pub fn code(&self) -> &'static str {
        match self {
            KeyKind::VolumeUp => "24",
            KeyKind::VolumeDown => "25",
            KeyKind::Mute => "164",
            KeyKind::Power => "26",
        }
    }
}

/// One request line off the wire: shared secret plus the action fields.
#[derive(Debug, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Severity of one security audit finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    Good,
    Warning,
}

/// One inspected security setting. Collected in check evaluation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditFinding {
    pub level: AuditLevel,
    pub check: String,
    pub details: String,
}

/// Hardware/software summary assembled by the device-info action. Fields
/// that could not be read carry the parsers' sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub model: String,
    pub android_version: String,
    pub serial: String,
    pub battery_level: String,
    pub battery_status: String,
    pub cpu: String,
    pub ram: String,
    pub ip_address: String,
}

/// Action-specific payload, flattened into the response object so listings
/// appear as top-level keys next to `status` and `message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Output { output: String },
    Processes { processes: String },
    Connections { connections: String },
    Audit { results: Vec<AuditFinding> },
    Apps { apps: Vec<String> },
    Device { info: DeviceInfo },
}

/// Structured result of one dispatched action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    pub message: String,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
}

impl Response {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            message: message.into(),
            payload: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

impl From<&Error> for Response {
    fn from(err: &Error) -> Self {
        Response::error(err.to_string())
    }
}

/// Accept `"2"` and `2` interchangeably for settings values.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_tag_parsing() {
        let action: Action = serde_json::from_str(r#"{"action": "reboot"}"#).unwrap();
        assert_eq!(action, Action::Reboot);

        let action: Action =
            serde_json::from_str(r#"{"action": "process_kill", "package_name": "com.foo"}"#)
                .unwrap();
        assert_eq!(
            action,
            Action::ProcessKill {
                package_name: "com.foo".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_action_rejected() {
        let result: Result<Action, _> =
            serde_json::from_str(r#"{"action": "self_destruct"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_required_parameter_rejected() {
        let result: Result<Action, _> = serde_json::from_str(r#"{"action": "process_kill"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_key_event_codes() {
        assert_eq!(KeyKind::VolumeUp.code(), "24");
        assert_eq!(KeyKind::VolumeDown.code(), "25");
        assert_eq!(KeyKind::Mute.code(), "164");
        assert_eq!(KeyKind::Power.code(), "26");
    }

    #[test]
    fn test_key_event_parsing() {
        let action: Action =
            serde_json::from_str(r#"{"action": "key_event", "key": "volume_up"}"#).unwrap();
        assert_eq!(
            action,
            Action::KeyEvent {
                key: KeyKind::VolumeUp
            }
        );
    }

    #[test]
    fn test_set_dark_mode_accepts_number() {
        let action: Action =
            serde_json::from_str(r#"{"action": "set_dark_mode", "value": 2}"#).unwrap();
        assert_eq!(
            action,
            Action::SetDarkMode {
                value: "2".to_string()
            }
        );
    }

    #[test]
    fn test_set_timeout_accepts_string() {
        let action: Action =
            serde_json::from_str(r#"{"action": "set_timeout", "value": "60000"}"#).unwrap();
        assert_eq!(
            action,
            Action::SetTimeout {
                value: "60000".to_string()
            }
        );
    }

    #[test]
    fn test_open_url_value_optional() {
        let action: Action = serde_json::from_str(r#"{"action": "open_url"}"#).unwrap();
        assert_eq!(action, Action::OpenUrl { value: None });
    }

    #[test]
    fn test_request_envelope() {
        let request: Request = serde_json::from_str(
            r#"{"api_key": "secret", "action": "shell_exec", "command": "ls /sdcard"}"#,
        )
        .unwrap();
        assert_eq!(request.api_key.as_deref(), Some("secret"));
        assert_eq!(
            request.action,
            Action::ShellExec {
                command: "ls /sdcard".to_string()
            }
        );
    }

    #[test]
    fn test_request_without_key() {
        let request: Request = serde_json::from_str(r#"{"action": "device_info"}"#).unwrap();
        assert!(request.api_key.is_none());
    }

    #[test]
    fn test_response_payload_flattened() {
        let response = Response::success("ok").with_payload(Payload::Apps {
            apps: vec!["com.foo".to_string()],
        });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["apps"][0], "com.foo");
        assert!(json.get("payload").is_none());
    }

    #[test]
    fn test_response_without_payload_has_no_extra_keys() {
        let json = serde_json::to_value(Response::error("nope")).unwrap();
        assert_eq!(
            json.as_object().unwrap().keys().collect::<Vec<_>>(),
            ["message", "status"]
        );
    }

    #[test]
    fn test_audit_finding_serialization() {
        let finding = AuditFinding {
            level: AuditLevel::Warning,
            check: "USB Debugging".to_string(),
            details: "ENABLED.".to_string(),
        };
        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["level"], "warning");
    }

    #[test]
    fn test_error_to_response() {
        let response = Response::from(&Error::NoDevice);
        assert_eq!(response.status, Status::Error);
        assert_eq!(response.message, "No device connected.");
    }
}
