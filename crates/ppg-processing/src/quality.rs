//! Quality gate: finger presence and signal amplitude checks

use ppg_core::{SampleVector, SamplingStrategy};
use serde::{Deserialize, Serialize};

use crate::sampler::PlaneAverages;

/// Quality thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    /// Whole chroma plane average must exceed this for a finger to count as present
    pub min_chroma_avg: f32,
    /// Whole luma plane average must exceed this for a finger to count as present
    pub min_luma_avg: f32,
    /// Filtered zone values outside `[-limit, limit]` mark the signal bad
    pub amplitude_limit: f32,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_chroma_avg: 120.0,
            min_luma_avg: 10.0,
            amplitude_limit: 1.0,
        }
    }
}

/// Gate output for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct GateVerdict {
    pub finger_present: bool,
    pub signal_good: bool,
    /// Present whenever the finger was detected
    pub samples: Option<SampleVector>,
}

impl GateVerdict {
    /// Verdict for a frame with no finger on the lens
    pub fn absent() -> Self {
        GateVerdict {
            finger_present: false,
            signal_good: false,
            samples: None,
        }
    }

    /// Samples to chart and record, only when the signal is good
    pub fn good_samples(&self) -> Option<&SampleVector> {
        if self.signal_good {
            self.samples.as_ref()
        } else {
            None
        }
    }
}

/// Two-stage frame classifier
#[derive(Debug, Clone, Default)]
pub struct QualityGate {
    thresholds: QualityThresholds,
}

impl QualityGate {
    pub fn new(thresholds: QualityThresholds) -> Self {
        QualityGate { thresholds }
    }

    pub fn thresholds(&self) -> &QualityThresholds {
        &self.thresholds
    }

    /// Stage one: both plane averages above their thresholds
    pub fn finger_present(&self, averages: &PlaneAverages) -> bool {
        averages.chroma > self.thresholds.min_chroma_avg && averages.luma > self.thresholds.min_luma_avg
    }

    /// Stage two: amplitude band for filtered zones; raw samples pass unconditionally
    pub fn signal_good(&self, samples: &SampleVector) -> bool {
        match samples.strategy() {
            SamplingStrategy::FourZoneFiltered => samples.within_amplitude(self.thresholds.amplitude_limit),
            SamplingStrategy::CenterBoxRaw => true,
        }
    }

    /// Classify a frame whose finger-presence test already passed
    pub fn classify(&self, samples: SampleVector) -> GateVerdict {
        GateVerdict {
            finger_present: true,
            signal_good: self.signal_good(&samples),
            samples: Some(samples),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finger_presence_thresholds() {
        let gate = QualityGate::default();

        assert!(!gate.finger_present(&PlaneAverages { luma: 50.0, chroma: 100.0 }));
        assert!(!gate.finger_present(&PlaneAverages { luma: 10.0, chroma: 200.0 }));
        assert!(!gate.finger_present(&PlaneAverages { luma: 50.0, chroma: 120.0 }));
        assert!(gate.finger_present(&PlaneAverages { luma: 10.5, chroma: 120.5 }));
    }

    #[test]
    fn test_four_zone_amplitude_band() {
        let gate = QualityGate::default();

        let good = SampleVector::new(SamplingStrategy::FourZoneFiltered, vec![0.3, -0.8, 1.0, -1.0]).unwrap();
        let verdict = gate.classify(good);
        assert!(verdict.finger_present);
        assert!(verdict.signal_good);
        assert!(verdict.good_samples().is_some());

        let bad = SampleVector::new(SamplingStrategy::FourZoneFiltered, vec![0.3, -0.8, 1.2, 0.0]).unwrap();
        let verdict = gate.classify(bad);
        assert!(verdict.finger_present);
        assert!(!verdict.signal_good);
        assert!(verdict.good_samples().is_none());
    }

    #[test]
    fn test_center_box_presence_is_sufficient() {
        let gate = QualityGate::default();
        let raw = SampleVector::new(SamplingStrategy::CenterBoxRaw, vec![-172.4]).unwrap();
        assert!(gate.classify(raw).signal_good);
    }

    #[test]
    fn test_absent_verdict() {
        let verdict = GateVerdict::absent();
        assert!(!verdict.finger_present);
        assert!(!verdict.signal_good);
        assert!(verdict.samples.is_none());
    }
}
