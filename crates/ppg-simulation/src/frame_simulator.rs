//! Synthetic YUV frames with a pulsatile chrominance component

use ppg_core::{ChromaPlane, Frame, PpgError, PpgResult};
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

use crate::finger_patterns::FingerPattern;

/// Plane levels for one lighting condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaneLevels {
    /// Mean luma byte value
    pub luma: f32,
    /// Mean chroma byte value
    pub chroma: f32,
}

/// Configuration for frame simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSimulatorConfig {
    /// Full-resolution width in pixels
    pub width: usize,
    /// Full-resolution height in pixels
    pub height: usize,
    /// Capture rate used to advance simulated time
    pub frame_rate: f32,
    /// Bytes between chroma pixels (2 for interleaved semi-planar layouts)
    pub pixel_stride: usize,
    /// Extra bytes at the end of each chroma row
    pub row_padding: usize,
    /// Levels with a finger over the lens and torch lit
    pub covered: PlaneLevels,
    /// Levels with nothing over the lens
    pub uncovered: PlaneLevels,
    /// Simulated heart rate
    pub heart_rate_bpm: f32,
    /// Peak chroma swing caused by the pulse, in byte units
    pub pulse_amplitude: f32,
    /// Per-pixel gaussian noise standard deviation
    pub noise_std: f32,
    /// Finger contact over time
    pub pattern: FingerPattern,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
}

impl FrameSimulatorConfig {
    /// Validate configuration
    pub fn validate(&self) -> PpgResult<()> {
        if self.width < 2 || self.height < 2 {
            return Err(PpgError::config("simulated frame must be at least 2x2"));
        }
        if self.frame_rate <= 0.0 {
            return Err(PpgError::config("frame rate must be positive"));
        }
        if self.pixel_stride == 0 {
            return Err(PpgError::config("pixel stride must be non-zero"));
        }
        if self.noise_std < 0.0 || !self.noise_std.is_finite() {
            return Err(PpgError::config("noise standard deviation must be finite and non-negative"));
        }
        Ok(())
    }
}

impl Default for FrameSimulatorConfig {
    fn default() -> Self {
        Self {
            width: 120,
            height: 160,
            frame_rate: 30.0,
            pixel_stride: 1,
            row_padding: 0,
            covered: PlaneLevels { luma: 60.0, chroma: 170.0 },
            uncovered: PlaneLevels { luma: 90.0, chroma: 110.0 },
            heart_rate_bpm: 72.0,
            pulse_amplitude: 0.6,
            noise_std: 0.8,
            pattern: FingerPattern::Steady,
            seed: None,
        }
    }
}

/// Frame simulator
pub struct FrameSimulator {
    config: FrameSimulatorConfig,
    rng: rand::rngs::StdRng,
    noise: Normal<f32>,
    time_offset: f32,
    sequence: u64,
}

impl FrameSimulator {
    /// Create new frame simulator with configuration
    pub fn new(config: FrameSimulatorConfig) -> PpgResult<Self> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => rand::rngs::StdRng::seed_from_u64(seed),
            None => rand::rngs::StdRng::from_entropy(),
        };
        let noise = Normal::new(0.0, config.noise_std)
            .map_err(|e| PpgError::config(format!("Failed to create normal distribution: {}", e)))?;

        Ok(FrameSimulator {
            config,
            rng,
            noise,
            time_offset: 0.0,
            sequence: 0,
        })
    }

    /// Blood volume waveform in [0, 1]: systolic peak plus a dicrotic bump
    pub fn blood_volume(&self, time: f32) -> f32 {
        let phase = 2.0 * PI * self.config.heart_rate_bpm / 60.0 * time;
        let wave = phase.sin() + 0.3 * (2.0 * phase).sin();
        (wave + 1.3) / 2.6
    }

    /// Generate the next frame and advance simulated time
    pub fn next_frame(&mut self) -> PpgResult<Frame> {
        let time = self.time_offset;
        let covered = self.config.pattern.in_contact(time);

        let (levels, pulse) = if covered {
            (&self.config.covered, self.config.pulse_amplitude * self.blood_volume(time))
        } else {
            (&self.config.uncovered, 0.0)
        };
        let luma_level = levels.luma;
        let chroma_level = levels.chroma + pulse;

        let luma = vec![quantize(luma_level); self.config.width * self.config.height];
        let chroma = self.chroma_plane(chroma_level);

        self.time_offset += 1.0 / self.config.frame_rate;
        self.sequence += 1;

        Frame::new(self.sequence, self.config.width, self.config.height, luma, chroma)
    }

    fn chroma_plane(&mut self, level: f32) -> ChromaPlane {
        let plane_width = self.config.width / 2;
        let plane_height = self.config.height / 2;
        let pixel_stride = self.config.pixel_stride;
        let row_stride = plane_width * pixel_stride + self.config.row_padding;

        // Interleaved and padding bytes carry the bare level
        let mut data = vec![quantize(level); row_stride * plane_height];
        for row in 0..plane_height {
            for col in 0..plane_width {
                let value = level + self.noise.sample(&mut self.rng);
                data[row * row_stride + col * pixel_stride] = quantize(value);
            }
        }

        ChromaPlane {
            data,
            row_stride,
            pixel_stride,
        }
    }

    /// Current simulated time in seconds
    pub fn elapsed(&self) -> f32 {
        self.time_offset
    }

    /// Reset time offset (useful for restarting simulation)
    pub fn reset_time(&mut self) {
        self.time_offset = 0.0;
    }

    /// Get current configuration
    pub fn config(&self) -> &FrameSimulatorConfig {
        &self.config
    }

    /// Replace the finger contact pattern, restarting its clock
    pub fn set_pattern(&mut self, pattern: FingerPattern) {
        self.config.pattern = pattern;
        self.time_offset = 0.0;
    }

    pub fn set_heart_rate(&mut self, bpm: f32) {
        self.config.heart_rate_bpm = bpm;
    }
}

fn quantize(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
