//! Pre-defined finger contact patterns for simulated captures

use serde::{Deserialize, Serialize};

/// Whether the finger covers the lens over time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FingerPattern {
    /// Finger on the lens the whole time
    Steady,
    /// No finger at all
    Absent,
    /// Finger placed after a delay in seconds
    PlacedAfter { delay: f32 },
    /// Finger lifted after a duration in seconds
    LiftedAfter { duration: f32 },
    /// Finger on for `on` seconds, off for `off` seconds, repeating
    Intermittent { on: f32, off: f32 },
}

impl FingerPattern {
    /// Contact state at given time
    pub fn in_contact(&self, time: f32) -> bool {
        match self {
            FingerPattern::Steady => true,
            FingerPattern::Absent => false,
            FingerPattern::PlacedAfter { delay } => time >= *delay,
            FingerPattern::LiftedAfter { duration } => time < *duration,
            FingerPattern::Intermittent { on, off } => {
                let cycle = on + off;
                if cycle <= 0.0 {
                    return true;
                }
                time % cycle < *on
            }
        }
    }

    /// Get pattern description
    pub fn description(&self) -> &'static str {
        match self {
            FingerPattern::Steady => "Steady contact",
            FingerPattern::Absent => "No finger",
            FingerPattern::PlacedAfter { .. } => "Finger placed late",
            FingerPattern::LiftedAfter { .. } => "Finger lifted early",
            FingerPattern::Intermittent { .. } => "Intermittent contact",
        }
    }

    /// Create common preset patterns
    pub fn presets() -> Vec<(&'static str, FingerPattern)> {
        vec![
            ("steady", FingerPattern::Steady),
            ("absent", FingerPattern::Absent),
            ("late", FingerPattern::PlacedAfter { delay: 3.0 }),
            ("lift", FingerPattern::LiftedAfter { duration: 20.0 }),
            ("fidget", FingerPattern::Intermittent { on: 8.0, off: 1.0 }),
        ]
    }

    /// Look up a preset by name
    pub fn preset(name: &str) -> Option<FingerPattern> {
        Self::presets()
            .into_iter()
            .find(|(preset, _)| preset.eq_ignore_ascii_case(name))
            .map(|(_, pattern)| pattern)
    }
}

impl Default for FingerPattern {
    fn default() -> Self {
        FingerPattern::Steady
    }
}
