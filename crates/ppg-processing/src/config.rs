//! Configuration management for frame processing

use ppg_core::{PpgError, PpgResult, SamplingStrategy};
use serde::{Deserialize, Serialize};

use crate::filters::FilterConfig;
use crate::quality::QualityThresholds;
use crate::sampler::RegionConfig;

/// Global processing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Strategy selected at startup
    pub strategy: SamplingStrategy,
    /// Zone filter coefficients
    pub filters: FilterConfig,
    /// Sampling region geometry
    pub region: RegionConfig,
    /// Quality gate thresholds
    pub quality: QualityThresholds,
}

impl ProcessingConfig {
    /// Preset for the raw center-box strategy
    pub fn center_box_raw() -> Self {
        Self {
            strategy: SamplingStrategy::CenterBoxRaw,
            ..Self::default()
        }
    }

    /// Validate entire configuration
    pub fn validate(&self) -> PpgResult<()> {
        if !self.filters.is_valid() {
            return Err(PpgError::config(
                "filter coefficients must lie in (0, 1] and the window must be non-empty",
            ));
        }

        if !self.region.is_valid() {
            return Err(PpgError::config(
                "crop margins must be below one half, the center box ratio in (0, 1] \
                 and the minimum crop height at least one row per zone",
            ));
        }

        if self.quality.amplitude_limit <= 0.0 {
            return Err(PpgError::config("amplitude limit must be positive"));
        }

        if !(0.0..=255.0).contains(&self.quality.min_chroma_avg)
            || !(0.0..=255.0).contains(&self.quality.min_luma_avg)
        {
            return Err(PpgError::config("plane average thresholds must lie within the byte range"));
        }

        Ok(())
    }

    /// Export configuration to JSON
    pub fn to_json(&self) -> PpgResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PpgError::config(format!("Failed to serialize configuration: {}", e)))
    }

    /// Import configuration from JSON
    pub fn from_json(json: &str) -> PpgResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| PpgError::config(format!("Failed to deserialize configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            strategy: SamplingStrategy::FourZoneFiltered,
            filters: FilterConfig::default(),
            region: RegionConfig::default(),
            quality: QualityThresholds::default(),
        }
    }
}
