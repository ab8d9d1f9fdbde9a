//! Frame processor: sampler, zone filters and quality gate in one step

use ppg_core::{Frame, PpgResult, SampleVector, SamplingStrategy, ZONE_COUNT};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::config::ProcessingConfig;
use crate::filters::FilterBank;
use crate::quality::{GateVerdict, QualityGate};
use crate::sampler::{FrameSampler, PlaneAverages};

/// Result of processing one frame
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// Gate verdict with the conditioned sample vector
    pub verdict: GateVerdict,
    /// Processing metrics
    pub metrics: ProcessingMetrics,
}

/// Performance metrics for processing operations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingMetrics {
    /// Actual processing time in microseconds
    pub processing_time_us: u64,
    /// Whole-plane averages seen by the finger test
    pub plane_averages: PlaneAverages,
    /// Strategy used for this frame
    pub strategy: Option<SamplingStrategy>,
}

impl ProcessingMetrics {
    /// Start timing a processing operation
    pub fn start_timing() -> ProcessingTimer {
        ProcessingTimer {
            start_time: Instant::now(),
            metrics: ProcessingMetrics::default(),
        }
    }
}

/// Helper for timing processing operations
pub struct ProcessingTimer {
    start_time: Instant,
    metrics: ProcessingMetrics,
}

impl ProcessingTimer {
    /// Finish timing and return metrics
    pub fn finish(mut self) -> ProcessingMetrics {
        self.metrics.processing_time_us = self.start_time.elapsed().as_micros() as u64;
        self.metrics
    }

    pub fn set_plane_averages(&mut self, averages: PlaneAverages) {
        self.metrics.plane_averages = averages;
    }

    pub fn set_strategy(&mut self, strategy: SamplingStrategy) {
        self.metrics.strategy = Some(strategy);
    }
}

/// Turns frames into gate verdicts under one sampling strategy
///
/// Owns the per-zone filter state; it lives as long as one recording attempt
/// and is rebuilt by [`FrameProcessor::reset`].
pub struct FrameProcessor {
    config: ProcessingConfig,
    strategy: SamplingStrategy,
    sampler: FrameSampler,
    gate: QualityGate,
    filters: FilterBank,
}

impl FrameProcessor {
    /// Create new frame processor using the configured strategy
    pub fn new(config: ProcessingConfig) -> PpgResult<Self> {
        config.validate()?;

        Ok(FrameProcessor {
            strategy: config.strategy,
            sampler: FrameSampler::new(config.region.clone())?,
            gate: QualityGate::new(config.quality.clone()),
            filters: FilterBank::new(ZONE_COUNT, config.filters.clone()),
            config,
        })
    }

    pub fn strategy(&self) -> SamplingStrategy {
        self.strategy
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// Switch strategy and reconstruct every zone filter
    pub fn reset(&mut self, strategy: SamplingStrategy) {
        self.strategy = strategy;
        self.filters.rebuild();
        debug!("Frame processor reset for {}", strategy);
    }

    /// Process one frame
    ///
    /// Returns `Err(PpgError::DegenerateRegion)` when the frame must be skipped;
    /// no filter state is touched in that case.
    pub fn process(&mut self, frame: &Frame) -> PpgResult<ProcessingResult> {
        let mut timer = ProcessingMetrics::start_timing();
        timer.set_strategy(self.strategy);

        let averages = self.sampler.plane_averages(frame);
        timer.set_plane_averages(averages);

        if !self.gate.finger_present(&averages) {
            return Ok(ProcessingResult {
                verdict: GateVerdict::absent(),
                metrics: timer.finish(),
            });
        }

        let samples = match self.strategy {
            SamplingStrategy::FourZoneFiltered => {
                let raw = self.sampler.four_zone_averages(frame)?;
                let filtered = self.filters.apply(&raw);
                SampleVector::new(SamplingStrategy::FourZoneFiltered, filtered)?
            }
            SamplingStrategy::CenterBoxRaw => {
                let raw = self.sampler.center_box_average(frame);
                SampleVector::new(SamplingStrategy::CenterBoxRaw, vec![raw])?
            }
        };

        Ok(ProcessingResult {
            verdict: self.gate.classify(samples),
            metrics: timer.finish(),
        })
    }
}
