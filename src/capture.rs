//! Singleton manager for the long-lived capture subprocess.
//!
//! Mirroring and recording share one slot: exactly one capture process may
//! exist across the whole daemon, and a second start is rejected rather than
//! queued. The poll-liveness / check-idle / spawn sequence runs inside a
//! single mutex guard so two concurrent starts can never both observe an idle
//! slot.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::adb::DeviceId;
use crate::storage;
use crate::{nlog, nlog_debug, nlog_warn, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    Mirror,
    Record,
}

impl std::fmt::Display for CaptureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureKind::Mirror => write!(f, "mirror"),
            CaptureKind::Record => write!(f, "record"),
        }
    }
}

#[derive(Debug)]
struct Running {
    kind: CaptureKind,
    child: Child,
    target: Option<PathBuf>,
}

/// Process-wide capture state: `None` is idle, `Some` owns the subprocess.
/// The raw child handle never leaves this module.
#[derive(Debug, Default)]
pub struct CaptureManager {
    state: Mutex<Option<Running>>,
}

impl CaptureManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start mirroring the device's screen to a host window.
    pub async fn start_mirror(
        &self,
        device: &DeviceId,
        bit_rate: &str,
        max_size: u32,
    ) -> Result<String> {
        let max_size = max_size.to_string();
        let tokens = vec![
            "scrcpy".to_string(),
            "--serial".to_string(),
            device.as_str().to_string(),
            "--no-audio".to_string(),
            "--video-bit-rate".to_string(),
            bit_rate.to_string(),
            "--max-size".to_string(),
            max_size,
            "--window-title".to_string(),
            format!("Mirroring {}", device),
        ];
        self.start(CaptureKind::Mirror, tokens, None).await?;
        Ok("Mirroring started!".to_string())
    }

    /// Start recording the device's screen to a timestamped file under the
    /// recordings root.
    pub async fn start_record(&self, device: &DeviceId, recordings_dir: &Path) -> Result<String> {
        let target = recordings_dir.join(format!("recording_{}.mp4", storage::timestamp()));
        let tokens = vec![
            "scrcpy".to_string(),
            "--serial".to_string(),
            device.as_str().to_string(),
            "--no-audio".to_string(),
            "--record".to_string(),
            target.display().to_string(),
            "--window-title".to_string(),
            format!("RECORDING - {}", device),
        ];
        let message = format!("Recording started! Saving to {}", target.display());
        self.start(CaptureKind::Record, tokens, Some(target)).await?;
        Ok(message)
    }

    /// Transition Idle -> Running. The whole sequence — liveness poll, idle
    /// check, spawn — holds the state lock, closing the race where two
    /// concurrent starts both see an idle slot.
    async fn start(
        &self,
        kind: CaptureKind,
        tokens: Vec<String>,
        target: Option<PathBuf>,
    ) -> Result<()> {
        let mut guard = self.state.lock().await;

        if let Some(running) = guard.as_mut() {
            match running.child.try_wait() {
                Ok(Some(status)) => {
                    // Exited on its own; lazily reset to idle
                    nlog_debug!(
                        "Previous {} process exited ({}), slot reclaimed",
                        running.kind,
                        status
                    );
                    *guard = None;
                }
                Ok(None) => {
                    nlog_debug!("Capture start rejected: {} already active", running.kind);
                    return Err(Error::SessionConflict);
                }
                Err(e) => {
                    nlog_warn!("Failed to poll capture process: {}", e);
                    return Err(Error::SessionConflict);
                }
            }
        }

        let Some((program, args)) = tokens.split_first() else {
            return Err(Error::Validation("Capture command cannot be empty".to_string()));
        };

        nlog_debug!("CaptureManager::start kind={} cmd={:?}", kind, tokens);
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::LaunchFailure(format!("Failed to start {}: {}", kind, e)))?;

        *guard = Some(Running {
            kind,
            child,
            target,
        });
        nlog!("Capture started: {}", kind);
        Ok(())
    }

    /// Stop the active capture process. Idempotent: stopping an idle manager
    /// succeeds as a no-op.
    pub async fn stop(&self) -> Result<()> {
        let mut guard = self.state.lock().await;
        if let Some(mut running) = guard.take() {
            nlog!("Stopping {} process", running.kind);
            if let Err(e) = running.child.start_kill() {
                nlog_warn!("Failed to signal {} process: {}", running.kind, e);
            }
            // Reap so the child doesn't linger as a zombie
            let _ = running.child.wait().await;
        }
        Ok(())
    }

    /// Which capture is currently running, with the same lazy liveness reset
    /// as `start`.
    pub async fn active(&self) -> Option<CaptureKind> {
        let mut guard = self.state.lock().await;
        if let Some(running) = guard.as_mut() {
            match running.child.try_wait() {
                Ok(Some(_)) => *guard = None,
                Ok(None) => return Some(running.kind),
                Err(_) => return Some(running.kind),
            }
        }
        None
    }

    /// Recording target of the active session, if any.
    pub async fn target(&self) -> Option<PathBuf> {
        let guard = self.state.lock().await;
        guard.as_ref().and_then(|r| r.target.clone())
    }
}
