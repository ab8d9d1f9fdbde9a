//! Sampling strategies, per-frame sample vectors and application states

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{PpgError, PpgResult};

/// Number of horizontal zones in the four-zone strategy
pub const ZONE_COUNT: usize = 4;

/// How a frame is reduced to a sample vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SamplingStrategy {
    /// Four horizontal slices of a cropped region, each conditioned by its own filter chain
    FourZoneFiltered,
    /// One centered box, raw average, no filtering
    CenterBoxRaw,
}

impl SamplingStrategy {
    /// Identifier written into exported records
    pub fn tag(&self) -> &'static str {
        match self {
            SamplingStrategy::FourZoneFiltered => "FOUR_ZONES_FILTERED",
            SamplingStrategy::CenterBoxRaw => "CENTER_BOX_RAW",
        }
    }

    /// Values produced per frame
    pub fn arity(&self) -> usize {
        match self {
            SamplingStrategy::FourZoneFiltered => ZONE_COUNT,
            SamplingStrategy::CenterBoxRaw => 1,
        }
    }

    /// Human readable description
    pub fn description(&self) -> &'static str {
        match self {
            SamplingStrategy::FourZoneFiltered => "4 filtered zones",
            SamplingStrategy::CenterBoxRaw => "raw center box",
        }
    }

    /// The other strategy
    pub fn toggled(&self) -> Self {
        match self {
            SamplingStrategy::FourZoneFiltered => SamplingStrategy::CenterBoxRaw,
            SamplingStrategy::CenterBoxRaw => SamplingStrategy::FourZoneFiltered,
        }
    }
}

impl Default for SamplingStrategy {
    fn default() -> Self {
        SamplingStrategy::FourZoneFiltered
    }
}

impl fmt::Display for SamplingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for SamplingStrategy {
    type Err = PpgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "FOUR_ZONES_FILTERED" | "four-zone" | "four-zone-filtered" => {
                Ok(SamplingStrategy::FourZoneFiltered)
            }
            "CENTER_BOX_RAW" | "center-box" | "center-box-raw" => Ok(SamplingStrategy::CenterBoxRaw),
            other => Err(PpgError::config(format!("unknown sampling strategy '{}'", other))),
        }
    }
}

/// Intensities extracted from one frame, in emission order
///
/// The length is fixed by the strategy that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleVector {
    strategy: SamplingStrategy,
    values: Vec<f32>,
}

impl SampleVector {
    /// Create a sample vector, checking its length against the strategy
    pub fn new(strategy: SamplingStrategy, values: Vec<f32>) -> PpgResult<Self> {
        if values.len() != strategy.arity() {
            return Err(PpgError::ArityMismatch {
                strategy,
                expected: strategy.arity(),
                got: values.len(),
            });
        }
        Ok(SampleVector { strategy, values })
    }

    /// Strategy that produced these values
    pub fn strategy(&self) -> SamplingStrategy {
        self.strategy
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True if every value lies inside `[-limit, limit]`
    pub fn within_amplitude(&self, limit: f32) -> bool {
        self.values.iter().all(|v| (-limit..=limit).contains(v))
    }

    pub fn into_values(self) -> Vec<f32> {
        self.values
    }
}

/// Process-wide recorder state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppState {
    Idle,
    WaitingForFinger,
    Stabilizing,
    Recording,
    WaitingForInput,
}

impl AppState {
    /// States in which frame verdicts drive transitions
    pub fn is_acquiring(&self) -> bool {
        matches!(
            self,
            AppState::WaitingForFinger | AppState::Stabilizing | AppState::Recording
        )
    }

    /// States guarded by a running countdown
    pub fn is_timed(&self) -> bool {
        matches!(self, AppState::Stabilizing | AppState::Recording)
    }
}

impl Default for AppState {
    fn default() -> Self {
        AppState::Idle
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AppState::Idle => "Idle",
            AppState::WaitingForFinger => "WaitingForFinger",
            AppState::Stabilizing => "Stabilizing",
            AppState::Recording => "Recording",
            AppState::WaitingForInput => "WaitingForInput",
        };
        f.write_str(name)
    }
}
