//! PPG-Simulation: synthetic camera frames for development and testing
//!
//! Stands in for the phone camera: YUV frames with a pulsatile chroma
//! component, finger contact patterns and a real-time capture loop.

pub mod camera_stream;
pub mod finger_patterns;
pub mod frame_simulator;

pub use camera_stream::*;
pub use finger_patterns::*;
pub use frame_simulator::*;
