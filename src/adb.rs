//! Device bridge invocation vocabulary and device discovery.

use std::fmt;

use crate::runner::{self, CommandSpec};
use crate::{nlog_debug, nlog_trace};

/// Opaque identifier for the currently reachable device. Valid only for the
/// request that resolved it; never cached, so hot-plug changes are picked up
/// on the next request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub struct Adb;

impl Adb {
    /// Query the bridge for reachable devices and pick the first one that is
    /// ready for use. `None` means "no device connected" — a list failure and
    /// an empty list are deliberately indistinguishable to callers.
    pub async fn current_device() -> Option<DeviceId> {
        let result = runner::run(&CommandSpec::new(["adb", "devices"])).await;
        if !result.succeeded {
            nlog_debug!("adb devices failed: {}", result.output);
            return None;
        }
        let device = parse_device_list(&result.output);
        nlog_trace!("Adb::current_device -> {:?}", device);
        device
    }

    /// A deviceless bridge invocation (`adb connect`, `adb devices`, ...).
    pub fn raw<'a, I>(args: I) -> CommandSpec
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut tokens = vec!["adb".to_string()];
        tokens.extend(args.into_iter().map(String::from));
        CommandSpec::new(tokens)
    }

    /// A bridge subcommand targeted at one device (`pull`, `install`, ...).
    pub fn device<'a, I>(device: &DeviceId, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut tokens = vec![
            "adb".to_string(),
            "-s".to_string(),
            device.as_str().to_string(),
        ];
        tokens.extend(args.into_iter().map(String::from));
        CommandSpec::new(tokens)
    }

    /// A shell command run on the device.
    pub fn shell<'a, I>(device: &DeviceId, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut tokens = vec![
            "adb".to_string(),
            "-s".to_string(),
            device.as_str().to_string(),
            "shell".to_string(),
        ];
        tokens.extend(args.into_iter().map(String::from));
        CommandSpec::new(tokens)
    }

    pub fn is_available() -> bool {
        which::which("adb").is_ok()
    }
}

/// Parse `adb devices` tabular output: one device per line after the header,
/// serial and status token separated by a tab. Only a `device` status counts
/// as ready; `offline` and `unauthorized` entries are skipped.
fn parse_device_list(output: &str) -> Option<DeviceId> {
    for line in output.lines().skip(1) {
        if let Some((serial, status)) = line.split_once('\t') {
            if status.trim() == "device" {
                return Some(DeviceId(serial.trim().to_string()));
            }
        }
    }
    None
}
