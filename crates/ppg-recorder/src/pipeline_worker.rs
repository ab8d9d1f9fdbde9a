//! Frame pipeline worker: turns camera frames into tagged gate verdicts
//!
//! Runs apart from the session owner. Frames arrive through a single-slot
//! watch channel, so a slow worker only ever sees the newest frame. Verdicts
//! leave through a capacity-1 channel and the worker waits for room, so no
//! verdict is lost once computed.

use ppg_core::{Frame, PpgError, PpgResult, SamplingStrategy};
use ppg_processing::{FrameProcessor, ProcessingConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::machine::TaggedVerdict;

/// Commands for controlling the worker
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerCommand {
    /// Rebuild the filters, adopt `strategy` and stamp later verdicts with `epoch`
    Reset {
        epoch: u64,
        strategy: SamplingStrategy,
    },
}

/// Running counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub frames_received: u64,
    pub frames_processed: u64,
    /// Frames dropped for a degenerate sampling region
    pub frames_skipped: u64,
    pub finger_absent: u64,
    pub last_processing_time_us: u64,
    pub epoch: u64,
    pub strategy: SamplingStrategy,
}

pub struct PipelineWorker {
    processor: FrameProcessor,
    epoch: u64,
    frames: watch::Receiver<Option<Arc<Frame>>>,
    commands: mpsc::Receiver<WorkerCommand>,
    verdicts: mpsc::Sender<TaggedVerdict>,
    stats_sender: watch::Sender<PipelineStats>,
    stats: PipelineStats,
}

impl PipelineWorker {
    pub fn new(
        config: ProcessingConfig,
        frames: watch::Receiver<Option<Arc<Frame>>>,
        commands: mpsc::Receiver<WorkerCommand>,
        verdicts: mpsc::Sender<TaggedVerdict>,
    ) -> PpgResult<Self> {
        let processor = FrameProcessor::new(config)?;
        let stats = PipelineStats {
            strategy: processor.strategy(),
            ..Default::default()
        };
        let (stats_sender, _) = watch::channel(stats.clone());

        Ok(PipelineWorker {
            processor,
            epoch: 0,
            frames,
            commands,
            verdicts,
            stats_sender,
            stats,
        })
    }

    /// Get a receiver for statistics updates
    pub fn subscribe_stats(&self) -> watch::Receiver<PipelineStats> {
        self.stats_sender.subscribe()
    }

    /// Main loop; ends when the camera, the command channel or the verdict consumer goes away
    pub async fn run(mut self) {
        info!("Pipeline worker started with {}", self.processor.strategy());

        loop {
            tokio::select! {
                // Resets must land before the next frame is processed
                biased;

                command = self.commands.recv() => {
                    match command {
                        Some(WorkerCommand::Reset { epoch, strategy }) => {
                            self.processor.reset(strategy);
                            self.epoch = epoch;
                            self.stats.epoch = epoch;
                            self.stats.strategy = strategy;
                            self.publish_stats();
                            debug!("Pipeline reset to epoch {} with {}", epoch, strategy);
                        }
                        None => {
                            info!("Worker command channel closed");
                            break;
                        }
                    }
                }

                changed = self.frames.changed() => {
                    if changed.is_err() {
                        info!("Camera stream closed, stopping pipeline worker");
                        break;
                    }
                    let frame = self.frames.borrow_and_update().clone();
                    let Some(frame) = frame else {
                        continue;
                    };

                    let Some(verdict) = self.process(&frame) else {
                        continue;
                    };
                    if self.verdicts.send(verdict).await.is_err() {
                        info!("Verdict consumer gone, stopping pipeline worker");
                        break;
                    }
                }
            }
        }
    }

    fn process(&mut self, frame: &Frame) -> Option<TaggedVerdict> {
        self.stats.frames_received += 1;

        let result = match self.processor.process(frame) {
            Ok(result) => result,
            Err(PpgError::DegenerateRegion { height, .. }) => {
                self.stats.frames_skipped += 1;
                debug!("Skipping frame {}: cropped height {}", frame.sequence, height);
                self.publish_stats();
                return None;
            }
            Err(e) => {
                warn!("Frame {} rejected: {}", frame.sequence, e);
                return None;
            }
        };

        self.stats.frames_processed += 1;
        self.stats.last_processing_time_us = result.metrics.processing_time_us;
        if !result.verdict.finger_present {
            self.stats.finger_absent += 1;
        }
        self.publish_stats();

        Some(TaggedVerdict {
            epoch: self.epoch,
            verdict: result.verdict,
        })
    }

    fn publish_stats(&self) {
        // No subscribers is fine
        let _ = self.stats_sender.send(self.stats.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ppg_core::ChromaPlane;
    use tokio::time::{timeout, Duration};

    fn frame(sequence: u64, width: usize, height: usize, luma: u8, chroma: u8) -> Arc<Frame> {
        let cw = width / 2;
        let ch = height / 2;
        Arc::new(
            Frame::new(
                sequence,
                width,
                height,
                vec![luma; width * height],
                ChromaPlane {
                    data: vec![chroma; cw * ch],
                    row_stride: cw,
                    pixel_stride: 1,
                },
            )
            .unwrap(),
        )
    }

    struct Harness {
        frames: watch::Sender<Option<Arc<Frame>>>,
        commands: mpsc::Sender<WorkerCommand>,
        verdicts: mpsc::Receiver<TaggedVerdict>,
        stats: watch::Receiver<PipelineStats>,
    }

    fn spawn(config: ProcessingConfig) -> Harness {
        let (frames_tx, frames_rx) = watch::channel(None);
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (verdict_tx, verdict_rx) = mpsc::channel(1);
        let worker = PipelineWorker::new(config, frames_rx, cmd_rx, verdict_tx).unwrap();
        let stats = worker.subscribe_stats();
        tokio::spawn(worker.run());
        Harness {
            frames: frames_tx,
            commands: cmd_tx,
            verdicts: verdict_rx,
            stats,
        }
    }

    async fn next(h: &mut Harness) -> TaggedVerdict {
        timeout(Duration::from_secs(2), h.verdicts.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_verdicts_carry_epoch() {
        let mut h = spawn(ProcessingConfig::center_box_raw());

        h.frames.send(Some(frame(1, 120, 160, 60, 170))).unwrap();
        let v = next(&mut h).await;
        assert_eq!(v.epoch, 0);
        assert!(v.verdict.signal_good);

        h.commands
            .send(WorkerCommand::Reset {
                epoch: 3,
                strategy: SamplingStrategy::CenterBoxRaw,
            })
            .await
            .unwrap();
        h.frames.send(Some(frame(2, 120, 160, 60, 170))).unwrap();
        let v = next(&mut h).await;
        assert_eq!(v.epoch, 3);
    }

    #[tokio::test]
    async fn test_reset_switches_strategy() {
        let mut h = spawn(ProcessingConfig::default());
        h.commands
            .send(WorkerCommand::Reset {
                epoch: 1,
                strategy: SamplingStrategy::CenterBoxRaw,
            })
            .await
            .unwrap();
        h.frames.send(Some(frame(1, 120, 160, 60, 170))).unwrap();

        let v = next(&mut h).await;
        assert_eq!(v.verdict.samples.unwrap().strategy(), SamplingStrategy::CenterBoxRaw);
    }

    #[tokio::test]
    async fn test_degenerate_frames_are_skipped_silently() {
        let mut h = spawn(ProcessingConfig::default());

        h.frames.send(Some(frame(1, 40, 10, 60, 170))).unwrap();
        timeout(Duration::from_secs(2), h.stats.wait_for(|s| s.frames_skipped == 1))
            .await
            .unwrap()
            .unwrap();
        assert!(h.verdicts.try_recv().is_err());

        h.frames.send(Some(frame(2, 120, 160, 60, 170))).unwrap();
        let v = next(&mut h).await;
        assert!(v.verdict.finger_present);
        assert_eq!(v.verdict.samples.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_absent_finger_is_counted() {
        let mut h = spawn(ProcessingConfig::default());
        h.frames.send(Some(frame(1, 120, 160, 50, 100))).unwrap();

        let v = next(&mut h).await;
        assert!(!v.verdict.finger_present);
        let stats = h.stats.borrow().clone();
        assert_eq!(stats.finger_absent, 1);
        assert_eq!(stats.frames_processed, 1);
    }

    #[tokio::test]
    async fn test_worker_stops_when_camera_closes() {
        let (frames_tx, frames_rx) = watch::channel(None);
        let (_cmd_tx, cmd_rx) = mpsc::channel(8);
        let (verdict_tx, _verdict_rx) = mpsc::channel(1);
        let worker =
            PipelineWorker::new(ProcessingConfig::default(), frames_rx, cmd_rx, verdict_tx).unwrap();

        let task = tokio::spawn(worker.run());
        drop(frames_tx);
        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    }
}
