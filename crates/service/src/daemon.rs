//! Daemon lifecycle: builds the real collaborators, installs signal
//! handlers, and runs the session from capture through restore.
//!
//! Every exit path after the device capture goes through the controller's
//! restore, so the device's persistent lighting state is put back whether
//! the daemon leaves on a signal, a listener fault, or a startup failure
//! partway through the lifecycle.

use crate::adapters::{BridgeLightService, FileBackupPort, UsbDevicePort};
use crate::config::Config;
use anyhow::{Context, Result, anyhow};
use huedeck_backup::BackupStore;
use huedeck_engine::{KnobId, LightAssignment, SessionController};
use huedeck_hid_common::ReportReader;
use huedeck_hue::HueBridge;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::info;

/// Capacity of the raw report channel between the blocking reader thread
/// and the listening loop.
const REPORT_CHANNEL_CAPACITY: usize = 64;

type Controller = SessionController<UsbDevicePort, BridgeLightService, FileBackupPort>;

/// Owns the shutdown fan-out and drives one controller session.
pub struct Daemon {
    config: Config,
    config_path: PathBuf,
    shutdown_tx: broadcast::Sender<()>,
}

impl Daemon {
    pub fn new(config: Config, config_path: PathBuf) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            config_path,
            shutdown_tx,
        }
    }

    /// Run the full session lifecycle to completion.
    ///
    /// Fatal startup errors (bridge unreachable, device not found) come
    /// back as `Err`; everything after the capture is restored first.
    pub async fn run(self) -> Result<()> {
        let bridge = HueBridge::new(&self.config.bridge_ip, &self.config.api_key);
        let visible = bridge
            .test_connection()
            .await
            .context("hue bridge unreachable")?;
        info!(lights = visible, "bridge connection verified");

        let lights = Arc::new(BridgeLightService::new(bridge));
        let store = BackupStore::new(self.config.backup_dir(&self.config_path))
            .context("backup directory unavailable")?;
        let backup = Arc::new(FileBackupPort::new(store));
        let device = Arc::new(
            UsbDevicePort::new().map_err(|e| anyhow!("hid api unavailable: {e}"))?,
        );

        let assignments = vec![
            LightAssignment {
                knob: KnobId::Knob1,
                light_id: self.config.bulb1_id.clone(),
            },
            LightAssignment {
                knob: KnobId::Knob2,
                light_id: self.config.bulb2_id.clone(),
            },
        ];
        let mut controller =
            SessionController::new(Arc::clone(&device), lights, backup, assignments);

        // Subscribe before the handlers go live so a signal during the
        // capture/override window is not lost.
        let shutdown_rx = self.shutdown_tx.subscribe();
        let signal_tx = self.shutdown_tx.clone();
        tokio::spawn(async move {
            wait_for_termination_signal().await;
            let _ = signal_tx.send(());
        });

        // Nothing on the device has been touched yet; a failure here owes
        // no restore.
        controller
            .initialize()
            .await
            .context("light service initialization failed")?;

        let outcome = drive(&mut controller, &device, shutdown_rx).await;
        controller.restore_and_terminate().await;
        outcome
    }
}

/// Capture, override, and listen. Split out so `run` can unconditionally
/// restore after any of these steps fails.
async fn drive(
    controller: &mut Controller,
    device: &UsbDevicePort,
    shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    controller.capture().await.context("device capture failed")?;
    controller
        .override_device()
        .await
        .context("device override failed")?;

    let input = device
        .open_input_interface()
        .map_err(|e| anyhow!("knob input interface unavailable: {e}"))?;
    let (report_tx, report_rx) = mpsc::channel(REPORT_CHANNEL_CAPACITY);
    let mut reader = ReportReader::spawn(input, report_tx);

    controller.listen(report_rx, shutdown_rx).await;
    reader.stop();
    Ok(())
}

/// Block until any process-termination signal arrives.
async fn wait_for_termination_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let (mut sigterm, mut sigint, mut sighup) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
            signal(SignalKind::hangup()),
        ) {
            (Ok(t), Ok(i), Ok(h)) => (t, i, h),
            _ => {
                tracing::error!("signal handler registration failed; shutdown only via fault paths");
                return std::future::pending().await;
            }
        };
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM"),
            _ = sigint.recv() => info!("received SIGINT"),
            _ = sighup.recv() => info!("received SIGHUP"),
        }
    }

    #[cfg(windows)]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("ctrl-c handler failed: {e}");
            return std::future::pending().await;
        }
        info!("received ctrl-c");
    }
}
