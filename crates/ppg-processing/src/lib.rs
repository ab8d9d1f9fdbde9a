//! PPG-Processing: Signal conditioning for camera PPG
//!
//! Region sampling, per-zone filter chains and the quality gate.

pub mod config;
pub mod filters;
pub mod processor;
pub mod quality;
pub mod sampler;

pub use config::ProcessingConfig;
pub use filters::{
    FilterBank, FilterConfig, HighPassFilter, LowPassFilter, MovingAverageFilter,
    SampleFilter, ZoneFilterChain,
};
pub use processor::{FrameProcessor, ProcessingMetrics, ProcessingResult};
pub use quality::{GateVerdict, QualityGate, QualityThresholds};
pub use sampler::{FrameSampler, PlaneAverages, Region, RegionConfig};
