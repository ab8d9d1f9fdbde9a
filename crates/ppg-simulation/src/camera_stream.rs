//! Real-time simulated camera with keep-only-latest frame delivery

use crate::finger_patterns::FingerPattern;
use crate::frame_simulator::{FrameSimulator, FrameSimulatorConfig};
use ppg_core::{Frame, PpgError, PpgResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Commands for controlling the camera
#[derive(Debug, Clone)]
pub enum CameraCommand {
    Start,
    Stop,
    SetPattern(FingerPattern),
    SetHeartRate(f32),
}

/// Capture statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CameraStats {
    pub is_capturing: bool,
    pub frames_generated: u64,
    pub last_frame_time_us: u64,
}

/// Simulated camera pushing frames into a single-slot watch channel
///
/// A consumer that falls behind only ever sees the newest frame; older
/// undelivered frames are overwritten, never queued.
pub struct SimulatedCamera {
    simulator: FrameSimulator,
    frame_sender: watch::Sender<Option<Arc<Frame>>>,
    control_receiver: mpsc::Receiver<CameraCommand>,
    control_sender: mpsc::Sender<CameraCommand>,
    stats: CameraStats,
}

impl SimulatedCamera {
    /// Create a camera; capture begins as soon as [`SimulatedCamera::run`] is polled
    pub fn new(config: FrameSimulatorConfig) -> PpgResult<Self> {
        let simulator = FrameSimulator::new(config).map_err(|e| PpgError::CaptureUnavailable {
            reason: e.to_string(),
        })?;
        let (frame_sender, _) = watch::channel(None);
        let (control_sender, control_receiver) = mpsc::channel(16);

        Ok(SimulatedCamera {
            simulator,
            frame_sender,
            control_receiver,
            control_sender,
            stats: CameraStats {
                is_capturing: true,
                ..Default::default()
            },
        })
    }

    /// Get a receiver for the latest frame
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Frame>>> {
        self.frame_sender.subscribe()
    }

    /// Get control sender for sending commands
    pub fn control_handle(&self) -> mpsc::Sender<CameraCommand> {
        self.control_sender.clone()
    }

    /// Run the capture loop until every frame receiver or the control channel is gone
    pub async fn run(self) -> PpgResult<()> {
        let SimulatedCamera {
            mut simulator,
            frame_sender,
            mut control_receiver,
            control_sender,
            mut stats,
        } = self;
        // Only external handles keep the control channel open
        drop(control_sender);

        let period = Duration::from_secs_f32(1.0 / simulator.config().frame_rate);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Simulated camera started: {}x{} @ {:.0} fps, pattern: {}",
            simulator.config().width,
            simulator.config().height,
            simulator.config().frame_rate,
            simulator.config().pattern.description()
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !stats.is_capturing {
                        continue;
                    }

                    let started = std::time::Instant::now();
                    let frame = simulator.next_frame()?;
                    stats.frames_generated += 1;
                    stats.last_frame_time_us = started.elapsed().as_micros() as u64;

                    if frame_sender.send(Some(Arc::new(frame))).is_err() {
                        info!("Simulated camera has no consumers, stopping");
                        break;
                    }

                    if stats.last_frame_time_us > period.as_micros() as u64 {
                        warn!(
                            "Frame generation took {}us, longer than the frame period",
                            stats.last_frame_time_us
                        );
                    }
                }

                command = control_receiver.recv() => {
                    match command {
                        Some(CameraCommand::Start) => {
                            stats.is_capturing = true;
                            info!("Simulated camera capturing");
                        }
                        Some(CameraCommand::Stop) => {
                            stats.is_capturing = false;
                            simulator.reset_time();
                            info!("Simulated camera stopped after {} frames", stats.frames_generated);
                        }
                        Some(CameraCommand::SetPattern(pattern)) => {
                            simulator.set_pattern(pattern);
                            info!("Finger pattern set: {}", pattern.description());
                        }
                        Some(CameraCommand::SetHeartRate(bpm)) => {
                            simulator.set_heart_rate(bpm);
                            debug!("Simulated heart rate set to {:.0} bpm", bpm);
                        }
                        None => {
                            info!("Camera control channel closed");
                            break;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// Helper function to create and start a simulated camera in the background
pub fn start_simulated_camera(
    config: FrameSimulatorConfig,
) -> PpgResult<(watch::Receiver<Option<Arc<Frame>>>, mpsc::Sender<CameraCommand>)> {
    let camera = SimulatedCamera::new(config)?;
    let frames = camera.subscribe();
    let control = camera.control_handle();

    tokio::spawn(async move {
        if let Err(e) = camera.run().await {
            warn!("Simulated camera error: {}", e);
        }
    });

    Ok((frames, control))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, timeout};

    fn fast_config() -> FrameSimulatorConfig {
        FrameSimulatorConfig {
            frame_rate: 100.0,
            seed: Some(3),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_camera_delivers_latest_frame() {
        let (mut frames, control) = start_simulated_camera(fast_config()).unwrap();

        timeout(Duration::from_secs(2), frames.changed()).await.unwrap().unwrap();
        let first = frames.borrow_and_update().clone().unwrap();

        // Let several frames pass unobserved
        sleep(Duration::from_millis(100)).await;
        let latest = frames.borrow_and_update().clone().unwrap();
        assert!(latest.sequence > first.sequence + 1);
        assert_eq!(latest.width, 120);

        control.send(CameraCommand::Stop).await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_halts_delivery() {
        let (mut frames, control) = start_simulated_camera(fast_config()).unwrap();
        timeout(Duration::from_secs(2), frames.changed()).await.unwrap().unwrap();

        control.send(CameraCommand::Stop).await.unwrap();
        sleep(Duration::from_millis(50)).await;
        frames.borrow_and_update();

        sleep(Duration::from_millis(100)).await;
        assert!(!frames.has_changed().unwrap());

        control.send(CameraCommand::Start).await.unwrap();
        timeout(Duration::from_secs(2), frames.changed()).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_invalid_config_is_capture_unavailable() {
        let config = FrameSimulatorConfig {
            width: 1,
            ..Default::default()
        };
        let err = start_simulated_camera(config).unwrap_err();
        assert!(matches!(err, PpgError::CaptureUnavailable { .. }));
    }
}
