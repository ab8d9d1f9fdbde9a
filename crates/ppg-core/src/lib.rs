//! PPG-Core: Foundation types for camera photoplethysmography
//!
//! Frames, sampling strategies, sample vectors, sessions and the shared error type.

pub mod error;
pub mod frame;
pub mod session;
pub mod types;

pub use error::{PpgError, PpgResult};
pub use frame::{ChromaPlane, Frame};
pub use session::Session;
pub use types::{AppState, SampleVector, SamplingStrategy, ZONE_COUNT};
