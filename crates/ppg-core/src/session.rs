//! Session: one recording attempt and its user-entered reference value

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PpgError, PpgResult};
use crate::types::{SampleVector, SamplingStrategy};

/// An in-progress or completed recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier for this session
    pub id: Uuid,
    /// Strategy the session is locked to
    pub method: SamplingStrategy,
    /// Recorded samples, in recording order
    samples: Vec<f32>,
    /// User-entered reference value
    pub reference_value: Option<String>,
    /// When recording started
    pub started_at: DateTime<Local>,
    /// When recording stopped accepting samples
    pub finalized_at: Option<DateTime<Local>>,
}

impl Session {
    /// Start a new session locked to `method`
    pub fn new(method: SamplingStrategy) -> Self {
        Session {
            id: Uuid::new_v4(),
            method,
            samples: Vec::new(),
            reference_value: None,
            started_at: Local::now(),
            finalized_at: None,
        }
    }

    /// Append every value of one frame's sample vector
    ///
    /// Rejects vectors produced by another strategy and anything after finalization.
    pub fn append(&mut self, vector: &SampleVector) -> PpgResult<()> {
        if vector.strategy() != self.method || vector.len() != self.method.arity() {
            return Err(PpgError::ArityMismatch {
                strategy: self.method,
                expected: self.method.arity(),
                got: vector.len(),
            });
        }
        if self.is_finalized() {
            return Err(PpgError::InvalidFrame {
                reason: "session already finalized".to_string(),
            });
        }
        self.samples.extend_from_slice(vector.values());
        Ok(())
    }

    /// Drop every recorded sample
    pub fn clear_samples(&mut self) {
        self.samples.clear();
    }

    /// Stop accepting samples
    pub fn finalize(&mut self) {
        if self.finalized_at.is_none() {
            self.finalized_at = Some(Local::now());
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized_at.is_some()
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Number of frames that contributed samples
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.method.arity()
    }

    /// Check the session can be persisted
    pub fn validate_for_export(&self) -> PpgResult<()> {
        match self.reference_value.as_deref() {
            Some(value) if !value.is_empty() => {}
            _ => return Err(PpgError::EmptyReferenceValue),
        }
        if self.samples.is_empty() {
            return Err(PpgError::EmptySession);
        }
        Ok(())
    }
}
