//! Intents emitted towards the UI layer
//!
//! The recorder never renders anything itself. Every visible change is
//! described by a [`UiEvent`] and broadcast to whoever draws the screen.

use ppg_core::{AppState, SamplingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Which countdown is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CountdownPhase {
    Stabilization,
    Recording,
}

impl fmt::Display for CountdownPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountdownPhase::Stabilization => f.write_str("stabilization"),
            CountdownPhase::Recording => f.write_str("recording"),
        }
    }
}

/// Visibility and enablement of the controls for one state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlState {
    pub new_recording_visible: bool,
    pub strategy_toggle_visible: bool,
    /// Panel holding the reference input and the save button
    pub recording_panel_visible: bool,
    pub reference_input_enabled: bool,
    pub save_enabled: bool,
}

impl ControlState {
    pub fn for_state(state: AppState, save_enabled: bool) -> Self {
        match state {
            AppState::Idle => ControlState {
                new_recording_visible: true,
                strategy_toggle_visible: true,
                recording_panel_visible: false,
                reference_input_enabled: false,
                save_enabled: false,
            },
            AppState::WaitingForFinger | AppState::Stabilizing | AppState::Recording => {
                ControlState {
                    new_recording_visible: false,
                    strategy_toggle_visible: false,
                    recording_panel_visible: true,
                    reference_input_enabled: false,
                    save_enabled: false,
                }
            }
            AppState::WaitingForInput => ControlState {
                new_recording_visible: false,
                strategy_toggle_visible: false,
                recording_panel_visible: true,
                reference_input_enabled: true,
                save_enabled,
            },
        }
    }
}

/// Transient toast-style messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notice {
    StrategyChanged(SamplingStrategy),
    /// Emitted for every bad verdict while acquiring
    AdjustFinger,
    SignalLost,
    RecordingComplete { samples: usize },
    MissingReference,
    NoData,
    SaveInProgress,
    Saved(PathBuf),
    SaveFailed(String),
    /// The frame source stopped; acquisition cannot continue
    CaptureUnavailable,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::StrategyChanged(strategy) => {
                write!(f, "Recording method changed to: {}", strategy.description())
            }
            Notice::AdjustFinger => f.write_str(
                "Please adjust your finger position or cover the camera completely",
            ),
            Notice::SignalLost => f.write_str("Signal lost! Restarting the measurement."),
            Notice::RecordingComplete { samples } => {
                write!(f, "Recording saved in memory ({} samples)", samples)
            }
            Notice::MissingReference => f.write_str("Please enter the blood sugar value first!"),
            Notice::NoData => f.write_str("There is no data to save!"),
            Notice::SaveInProgress => f.write_str("A save is already in progress"),
            Notice::Saved(path) => write!(f, "Saved successfully: {}", path.display()),
            Notice::SaveFailed(cause) => write!(f, "Could not save the file: {}", cause),
            Notice::CaptureUnavailable => f.write_str("The camera stopped delivering frames"),
        }
    }
}

/// One UI intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UiEvent {
    StateChanged {
        state: AppState,
        controls: ControlState,
    },
    Instruction(String),
    Countdown {
        phase: CountdownPhase,
        remaining_secs: u64,
    },
    /// One or four points, in sample order
    ChartAppend(Vec<f32>),
    ChartVisibility(bool),
    ChartCleared,
    ReferenceCleared,
    SaveEnabled(bool),
    Notice(Notice),
}

/// Instruction text shown on entering `state`
pub fn instruction_for(state: AppState) -> String {
    match state {
        AppState::Idle => "Press the button to start a new recording".to_string(),
        AppState::WaitingForFinger => "Place your finger correctly over the camera".to_string(),
        AppState::Stabilizing => "Signal good! Hold still...".to_string(),
        AppState::Recording => "Recording...".to_string(),
        AppState::WaitingForInput => {
            "Recording complete. Enter the blood sugar value and press save.".to_string()
        }
    }
}

/// Instruction text for a countdown tick
pub fn countdown_instruction(phase: CountdownPhase, remaining_secs: u64) -> String {
    match phase {
        CountdownPhase::Stabilization => format!("Signal good! Hold still... {}", remaining_secs),
        CountdownPhase::Recording => format!("Recording... {}", remaining_secs),
    }
}

/// Whole seconds left, rounded up
pub fn whole_seconds(remaining_ms: u64) -> u64 {
    (remaining_ms + 999) / 1000
}
