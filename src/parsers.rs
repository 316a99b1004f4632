//! Tolerant field extraction from device diagnostic dumps.
//!
//! Device output is heterogeneous across vendors and OS versions, so a field
//! being absent is expected rather than exceptional. Every parser here
//! degrades to the `N/A` sentinel (or `None`) on mismatch and never fails the
//! caller.

use regex::Regex;
use std::sync::LazyLock;

/// Sentinel returned when a field cannot be extracted.
pub const SENTINEL: &str = "N/A";

static BATTERY_LEVEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"level: (\d+)").unwrap());

static BATTERY_STATUS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"status: (\d+)").unwrap());

static CPU_HARDWARE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Hardware\s+:\s+(.*)").unwrap());

static MEM_TOTAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"MemTotal:\s+(\d+)\s+kB").unwrap());

/// Extract battery charge percentage and status from a power-diagnostics
/// dump. Status codes follow the platform's battery manager: 1 unknown,
/// 2 charging, 3 discharging, 4 not charging, 5 full.
pub fn battery(text: &str) -> (String, String) {
    let level = BATTERY_LEVEL_RE
        .captures(text)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| SENTINEL.to_string());

    let status = BATTERY_STATUS_RE
        .captures(text)
        .and_then(|c| battery_status_name(&c[1]))
        .unwrap_or(SENTINEL)
        .to_string();

    (level, status)
}

fn battery_status_name(code: &str) -> Option<&'static str> {
    match code {
        "1" => Some("Unknown"),
        "2" => Some("Charging"),
        "3" => Some("Discharging"),
        "4" => Some("Not charging"),
        "5" => Some("Full"),
        _ => None,
    }
}

/// Extract the processor description from a hardware-info dump.
pub fn cpu_model(text: &str) -> String {
    CPU_HARDWARE_RE
        .captures(text)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_else(|| SENTINEL.to_string())
}

/// Extract total memory from a memory-info dump, converted from kilobytes to
/// whole megabytes (integer floor division).
pub fn mem_total_mb(text: &str) -> Option<u64> {
    MEM_TOTAL_RE
        .captures(text)
        .and_then(|c| c[1].parse::<u64>().ok())
        .map(|kb| kb / 1024)
}

/// A boolean security setting read via the settings shell command echoes its
/// raw value; `1` is the enabled sentinel, everything else counts as off.
pub fn setting_enabled(output: &str) -> bool {
    output.trim() == "1"
}
