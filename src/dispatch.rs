//! Maps actions onto bridge invocations and formats the outcome.
//!
//! Every device action re-resolves the device first and short-circuits with a
//! uniform "No device connected." error before any command runs. Failures
//! embed the raw tool output so the operator can diagnose them; multi-step
//! actions document their partial-failure policy at the call site.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::action::{
    Action, AuditFinding, AuditLevel, DeviceInfo, Payload, Response,
};
use crate::adb::{Adb, DeviceId};
use crate::capture::CaptureManager;
use crate::config::Config;
use crate::runner::{self, CommandResult, CommandSpec};
use crate::storage;
use crate::{nlog, nlog_debug, Error, Result};

const SHELL_TIMEOUT: Duration = Duration::from_secs(60);
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(120);
const CACHE_TIMEOUT: Duration = Duration::from_secs(120);
const BACKUP_TIMEOUT: Duration = Duration::from_secs(3600);
const PHOTO_TIMEOUT: Duration = Duration::from_secs(1800);

/// Fixed camera roll location on the device.
const CAMERA_DIR: &str = "/sdcard/DCIM/Camera/";
/// Companion camera app activity launched on the device.
const COMPANION_ACTIVITY: &str = "com.dev47apps.obsdroidcam/.MainActivity";
/// Port the desktop companion client connects to on the device.
const CLIENT_PORT: &str = "4747";

pub struct Dispatcher {
    config: Config,
    capture: Arc<CaptureManager>,
}

impl Dispatcher {
    pub fn new(config: Config, capture: Arc<CaptureManager>) -> Self {
        Self { config, capture }
    }

    /// Execute one action to completion. Never returns an error: every
    /// failure mode becomes a structured error response.
    pub async fn dispatch(&self, action: Action) -> Response {
        nlog_debug!("dispatch {:?}", action);
        match self.dispatch_inner(action).await {
            Ok(response) => response,
            Err(e) => Response::from(&e),
        }
    }

    async fn dispatch_inner(&self, action: Action) -> Result<Response> {
        // Deviceless operations: these create, release or bypass the device
        // rather than requiring one up front.
        match &action {
            Action::Connect { ip_port } => return self.connect(ip_port).await,
            Action::CaptureStop => {
                self.capture.stop().await?;
                return Ok(Response::success("Mirror/Record process stopped."));
            }
            Action::ClientLaunch { ip } => return self.client_launch(ip).await,
            _ => {}
        }

        let device = Adb::current_device().await.ok_or(Error::NoDevice)?;

        match action {
            Action::Reboot => {
                Ok(self
                    .simple(Adb::device(&device, ["reboot"]), "Reboot requested.")
                    .await)
            }
            Action::Screenshot => self.screenshot(&device).await,
            Action::OpenUrl { value } => {
                let target = normalize_url(value.as_deref().unwrap_or("https://www.google.com"));
                let spec = Adb::shell(
                    &device,
                    [
                        "am",
                        "start",
                        "-a",
                        "android.intent.action.VIEW",
                        "-d",
                        target.as_str(),
                    ],
                );
                Ok(self
                    .simple(spec, &format!("Opening {} on the device.", target))
                    .await)
            }
            Action::KeyEvent { key } => {
                let spec = Adb::shell(&device, ["input", "keyevent", key.code()]);
                Ok(self.simple(spec, "Key event sent.").await)
            }
            Action::SetDarkMode { value } => {
                let spec = Adb::shell(
                    &device,
                    ["settings", "put", "secure", "ui_night_mode", value.as_str()],
                );
                Ok(self.simple(spec, "Dark mode setting updated.").await)
            }
            Action::SetTimeout { value } => {
                let spec = Adb::shell(
                    &device,
                    ["settings", "put", "system", "screen_off_timeout", value.as_str()],
                );
                Ok(self.simple(spec, "Screen timeout updated.").await)
            }
            Action::ToggleWifi => {
                let spec = Adb::shell(&device, ["svc", "wifi", "toggle"]);
                Ok(self
                    .simple(spec, "Toggled Wi-Fi. You will be disconnected.")
                    .await)
            }
            Action::LaunchCompanionApp => {
                let spec = Adb::shell(&device, ["am", "start", "-n", COMPANION_ACTIVITY]);
                Ok(self
                    .simple(spec, "Launched the camera app on the device. Now start the desktop client.")
                    .await)
            }
            Action::ProcessList => {
                let result = runner::run(&Adb::shell(&device, ["ps", "-A"])).await;
                if result.succeeded {
                    Ok(Response::success("Process list retrieved.").with_payload(
                        Payload::Processes {
                            processes: result.output,
                        },
                    ))
                } else {
                    Ok(Response::error("Could not list processes."))
                }
            }
            Action::ProcessKill { package_name } => {
                let result =
                    runner::run(&Adb::shell(&device, ["am", "force-stop", package_name.as_str()]))
                        .await;
                // force-stop prints nothing on success but can exit zero with
                // an Error line; require that marker to be absent
                if result.succeeded && !result.output.contains("Error") {
                    Ok(Response::success(format!(
                        "Attempted to force-stop {}.",
                        package_name
                    )))
                } else {
                    Ok(Response::error(format!(
                        "Failed to force-stop: {}",
                        result.output
                    )))
                }
            }
            Action::ShellExec { command } => {
                if command.trim().is_empty() {
                    return Err(Error::InvalidAction("No command provided.".to_string()));
                }
                // Trust boundary: tokens are passed through unquoted, exactly
                // as the operator wrote them. A credentialed caller can run
                // anything the device shell allows.
                let tokens: Vec<&str> = command.split_whitespace().collect();
                let spec = Adb::shell(&device, tokens).with_timeout(SHELL_TIMEOUT);
                let result = runner::run(&spec).await;
                let output = if result.output.is_empty() {
                    "(No output)".to_string()
                } else {
                    result.output
                };
                let response = if result.succeeded {
                    Response::success("Shell command executed.")
                } else {
                    Response::error("Shell command failed.")
                };
                Ok(response.with_payload(Payload::Output { output }))
            }
            Action::FilePull { path } => self.file_pull(&device, &path).await,
            Action::FilePush { filename } => self.file_push(&device, &filename).await,
            Action::AppInstall { filename } => self.app_install(&device, &filename).await,
            Action::AppUninstall { package_name } => {
                let result =
                    runner::run(&Adb::device(&device, ["uninstall", package_name.as_str()])
                        .with_timeout(TRANSFER_TIMEOUT))
                    .await;
                if result.succeeded && result.output.contains("Success") {
                    Ok(Response::success(format!(
                        "Successfully uninstalled {}.",
                        package_name
                    )))
                } else {
                    Ok(Response::error(format!(
                        "Failed to uninstall: {}",
                        result.output
                    )))
                }
            }
            Action::AppList => {
                let result =
                    runner::run(&Adb::shell(&device, ["pm", "list", "packages", "-3"])).await;
                if result.succeeded {
                    let mut apps: Vec<String> = result
                        .output
                        .lines()
                        .filter(|line| !line.is_empty())
                        .map(|line| line.trim_start_matches("package:").trim().to_string())
                        .collect();
                    apps.sort();
                    Ok(Response::success("App list retrieved.")
                        .with_payload(Payload::Apps { apps }))
                } else {
                    Ok(Response::error("Could not list apps."))
                }
            }
            Action::BackupFull => self.backup_full(&device).await,
            Action::PhotoPull => self.photo_pull(&device).await,
            Action::CacheClear => {
                let spec = Adb::shell(&device, ["pm", "trim-caches", "999999999M"])
                    .with_timeout(CACHE_TIMEOUT);
                let result = runner::run(&spec).await;
                if result.succeeded {
                    Ok(Response::success(
                        "Successfully cleared application caches.",
                    ))
                } else {
                    Ok(Response::error(format!(
                        "Failed to clear caches: {}",
                        result.output
                    )))
                }
            }
            Action::SecurityAudit => Ok(self.security_audit(&device).await),
            Action::ConnectionList => {
                let result = runner::run(&Adb::shell(&device, ["netstat", "-tnp"])).await;
                if result.succeeded {
                    Ok(
                        Response::success("Connection list retrieved.").with_payload(
                            Payload::Connections {
                                connections: result.output,
                            },
                        ),
                    )
                } else {
                    Ok(Response::error(format!(
                        "Could not get connections: {}",
                        result.output
                    )))
                }
            }
            Action::DeviceInfo => Ok(self.device_info(&device).await),
            Action::MirrorStart => {
                let message = self
                    .capture
                    .start_mirror(
                        &device,
                        &self.config.mirror_bit_rate,
                        self.config.mirror_max_size,
                    )
                    .await?;
                Ok(Response::success(message))
            }
            Action::RecordStart => {
                let message = self
                    .capture
                    .start_record(&device, &self.config.recordings_dir()?)
                    .await?;
                Ok(Response::success(message))
            }
            // Handled before device resolution
            Action::Connect { .. } | Action::CaptureStop | Action::ClientLaunch { .. } => {
                unreachable!("deviceless actions handled above")
            }
        }
    }

    /// One templated invocation; success maps straight off the exit status
    /// and failures embed the raw output.
    async fn simple(&self, spec: CommandSpec, message: &str) -> Response {
        let result = runner::run(&spec).await;
        if result.succeeded {
            Response::success(message).with_payload(Payload::Output {
                output: result.output,
            })
        } else {
            Response::error(format!("Action failed: {}", result.output))
        }
    }

    /// Capture -> pull -> remove. Capture tools report success trivially, so
    /// the step that decides the outcome is whether the pulled file actually
    /// landed on the host; on-device removal stays best-effort cleanup.
    async fn screenshot(&self, device: &DeviceId) -> Result<Response> {
        let name = format!("screenshot_{}.png", storage::timestamp());
        let phone_path = format!("/sdcard/{}", name);
        let host_path = self.config.pulled_dir()?.join(&name);
        let host_str = host_path.display().to_string();

        let _ = runner::run(&Adb::shell(device, ["screencap", phone_path.as_str()])).await;
        let pull = runner::run(&Adb::device(
            device,
            ["pull", phone_path.as_str(), host_str.as_str()],
        ))
        .await;
        let _ = runner::run(&Adb::shell(device, ["rm", phone_path.as_str()])).await;

        if host_path.exists() {
            Ok(Response::success(format!(
                "Screenshot saved to {}.",
                host_str
            )))
        } else {
            Ok(Response::error(format!(
                "Screenshot failed: {}",
                pull.output
            )))
        }
    }

    async fn file_pull(&self, device: &DeviceId, path: &str) -> Result<Response> {
        if path.trim().is_empty() {
            return Err(Error::InvalidAction("No file path provided.".to_string()));
        }
        let filename = storage::sanitize_filename(path);
        let host_path = self.config.pulled_dir()?.join(&filename);
        let host_str = host_path.display().to_string();

        let spec = Adb::device(device, ["pull", path, host_str.as_str()])
            .with_timeout(TRANSFER_TIMEOUT);
        let result = runner::run(&spec).await;
        if result.succeeded {
            Ok(Response::success(format!("Pulled {}.", filename)))
        } else {
            Ok(Response::error(format!(
                "Failed to pull file: {}",
                result.output
            )))
        }
    }

    /// Push a previously uploaded file to the device's download directory.
    /// The wire protocol carries names, not bytes; the uploads root is
    /// populated out of band.
    async fn file_push(&self, device: &DeviceId, filename: &str) -> Result<Response> {
        let filename = storage::sanitize_filename(filename);
        let host_path = self.config.uploads_dir()?.join(&filename);
        if !host_path.exists() {
            return Err(Error::InvalidAction(format!(
                "No uploaded file named '{}'.",
                filename
            )));
        }
        let host_str = host_path.display().to_string();
        let phone_path = format!("/sdcard/Download/{}", filename);

        let spec = Adb::device(device, ["push", host_str.as_str(), phone_path.as_str()])
            .with_timeout(TRANSFER_TIMEOUT);
        let result = runner::run(&spec).await;
        if result.succeeded {
            Ok(Response::success(format!("Pushed {}.", filename)))
        } else {
            Ok(Response::error(format!(
                "Failed to push file: {}",
                result.output
            )))
        }
    }

    async fn app_install(&self, device: &DeviceId, filename: &str) -> Result<Response> {
        let filename = storage::sanitize_filename(filename);
        let host_path = self.config.uploads_dir()?.join(&filename);
        if !host_path.exists() {
            return Err(Error::InvalidAction(format!(
                "No uploaded file named '{}'.",
                filename
            )));
        }
        let host_str = host_path.display().to_string();

        let spec = Adb::device(device, ["install", "-r", host_str.as_str()])
            .with_timeout(TRANSFER_TIMEOUT);
        let result = runner::run(&spec).await;
        // The installer can exit zero on logical failure; require its own
        // success marker as well
        if result.succeeded && result.output.to_lowercase().contains("success") {
            Ok(Response::success(format!(
                "Successfully installed {}.",
                filename
            )))
        } else {
            Ok(Response::error(format!(
                "Failed to install APK: {}",
                result.output
            )))
        }
    }

    async fn backup_full(&self, device: &DeviceId) -> Result<Response> {
        let target = self
            .config
            .backups_dir()?
            .join(format!("full_backup_{}.ab", storage::timestamp()));
        let target_str = target.display().to_string();

        nlog!("Starting full backup to {}", target_str);
        let spec = Adb::device(
            device,
            ["backup", "-all", "-f", target_str.as_str()],
        )
        .with_timeout(BACKUP_TIMEOUT);
        let result = runner::run(&spec).await;

        Ok(backup_outcome(&target, &result))
    }

    async fn photo_pull(&self, device: &DeviceId) -> Result<Response> {
        let dest = self
            .config
            .photos_dir()?
            .join(format!("Photos_{}", storage::timestamp()));
        std::fs::create_dir_all(&dest)?;
        let dest_str = dest.display().to_string();

        let spec = Adb::device(device, ["pull", CAMERA_DIR, dest_str.as_str()])
            .with_timeout(PHOTO_TIMEOUT);
        let result = runner::run(&spec).await;

        if result.succeeded {
            // The transfer tool's own count is unreliable; report what
            // actually landed in the directory
            let count = storage::count_entries(&dest);
            Ok(Response::success(format!(
                "Successfully pulled {} items to {}",
                count, dest_str
            )))
        } else {
            Ok(Response::error(format!(
                "Failed to download photos: {}",
                result.output
            )))
        }
    }

    /// Checks run in a fixed order and their order is the payload order.
    /// Exit status is ignored on purpose: an unreadable setting parses as
    /// "not enabled", matching the tolerant-parser policy.
    async fn security_audit(&self, device: &DeviceId) -> Response {
        let mut results = Vec::new();

        let unknown = runner::run(&Adb::shell(
            device,
            ["settings", "get", "secure", "install_non_market_apps"],
        ))
        .await;
        if crate::parsers::setting_enabled(&unknown.output) {
            results.push(AuditFinding {
                level: AuditLevel::Warning,
                check: "Unknown Sources".to_string(),
                details: "ENABLED. This allows app installation from outside the store, which is a security risk.".to_string(),
            });
        } else {
            results.push(AuditFinding {
                level: AuditLevel::Good,
                check: "Unknown Sources".to_string(),
                details: "DISABLED. Apps can only be installed from the store.".to_string(),
            });
        }

        let debugging = runner::run(&Adb::shell(
            device,
            ["settings", "get", "global", "adb_enabled"],
        ))
        .await;
        if crate::parsers::setting_enabled(&debugging.output) {
            results.push(AuditFinding {
                level: AuditLevel::Warning,
                check: "USB Debugging".to_string(),
                details: "ENABLED. This is a security risk if your device is lost or stolen.".to_string(),
            });
        } else {
            results.push(AuditFinding {
                level: AuditLevel::Good,
                check: "USB Debugging".to_string(),
                details: "DISABLED. Good for daily use.".to_string(),
            });
        }

        Response::success("Security audit complete.").with_payload(Payload::Audit { results })
    }

    async fn device_info(&self, device: &DeviceId) -> Response {
        let model = self.getprop(device, "ro.product.model").await;
        let android_version = self.getprop(device, "ro.build.version.release").await;
        let serial = self.getprop(device, "ro.serialno").await;

        let battery_dump = runner::run(&Adb::shell(device, ["dumpsys", "battery"])).await;
        let (battery_level, battery_status) = crate::parsers::battery(&battery_dump.output);

        let cpu_dump = runner::run(&Adb::shell(device, ["cat", "/proc/cpuinfo"])).await;
        let cpu = crate::parsers::cpu_model(&cpu_dump.output);

        let mem_dump = runner::run(&Adb::shell(device, ["cat", "/proc/meminfo"])).await;
        let ram = crate::parsers::mem_total_mb(&mem_dump.output)
            .map(|mb| format!("{} MB", mb))
            .unwrap_or_else(|| crate::parsers::SENTINEL.to_string());

        let info = DeviceInfo {
            model,
            android_version,
            serial,
            battery_level,
            battery_status,
            cpu,
            ram,
            ip_address: device.as_str().to_string(),
        };
        Response::success("Device info retrieved.").with_payload(Payload::Device { info })
    }

    async fn getprop(&self, device: &DeviceId, prop: &str) -> String {
        let result = runner::run(&Adb::shell(device, ["getprop", prop])).await;
        if result.output.is_empty() {
            crate::parsers::SENTINEL.to_string()
        } else {
            result.output
        }
    }

    /// Drop any stale link first, then attach; the bridge reports "already
    /// connected" as plain text rather than a distinct exit code.
    async fn connect(&self, ip_port: &str) -> Result<Response> {
        if ip_port.trim().is_empty() {
            return Err(Error::InvalidAction("No address provided.".to_string()));
        }
        let _ = runner::run(&Adb::raw(["disconnect", ip_port])).await;
        let result = runner::run(&Adb::raw(["connect", ip_port])).await;
        if result.succeeded
            && (result.output.contains("connected") || result.output.contains("already"))
        {
            Ok(Response::success(format!("Connected to {}!", ip_port)))
        } else {
            Ok(Response::error(result.output))
        }
    }

    /// Spawn the desktop companion client pointed at the device. The client
    /// resolves resources relative to its own directory, so cwd is set there.
    async fn client_launch(&self, ip: &str) -> Result<Response> {
        if ip.trim().is_empty() {
            return Err(Error::InvalidAction("Device IP not provided.".to_string()));
        }
        let Some(client_path) = self.config.client_path.as_deref() else {
            return Err(Error::LaunchFailure(
                "No desktop client path configured.".to_string(),
            ));
        };
        let client_path = PathBuf::from(client_path);
        if !client_path.exists() {
            return Err(Error::LaunchFailure(format!(
                "Desktop client not found at {}.",
                client_path.display()
            )));
        }

        let client_dir = client_path.parent().unwrap_or(Path::new("."));
        tokio::process::Command::new(&client_path)
            .args(["-connect", ip, CLIENT_PORT])
            .current_dir(client_dir)
            .spawn()
            .map_err(|e| Error::LaunchFailure(format!("Failed to launch desktop client: {}", e)))?;

        Ok(Response::success(
            "Attempting to launch and connect the desktop client.",
        ))
    }
}

/// Prefix a bare host/path with the default scheme; explicit http/https
/// URLs pass through unchanged.
pub fn normalize_url(value: &str) -> String {
    if value.starts_with("http://") || value.starts_with("https://") {
        value.to_string()
    } else {
        format!("https://{}", value)
    }
}

/// Distinguish a backup the user cancelled on the device (the tool fails and
/// leaves an empty target file, which is removed) from a genuine tool error.
fn backup_outcome(target: &Path, result: &CommandResult) -> Response {
    if result.succeeded {
        return Response::success(format!(
            "Backup process finished. File saved to {}",
            target.display()
        ));
    }

    let cancelled = target
        .metadata()
        .map(|m| m.len() == 0)
        .unwrap_or(false);
    if cancelled {
        let _ = std::fs::remove_file(target);
        Response::error("Backup was cancelled or failed on the device.")
    } else {
        Response::error(format!("Backup failed: {}", result.output))
    }
}
