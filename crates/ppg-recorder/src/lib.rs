//! PPG-Recorder: session sequencing for camera PPG capture
//!
//! Finger detection, stabilization and timed recording driven by frame
//! verdicts, followed by reference-value entry and export.

pub mod config;
pub mod countdown;
pub mod exporter;
pub mod machine;
pub mod pipeline_worker;
pub mod service;
pub mod ui_events;

pub use config::{CameraConfig, ExportConfig, RecorderConfig, TimingConfig};
pub use countdown::{spawn_countdown, CountdownScheduler};
pub use exporter::{export_session, FsSessionStore, SessionExporter, SessionStore};
pub use machine::{
    CountdownEvent, Effect, SessionEvent, SessionStateMachine, TaggedVerdict, TimerId, UserAction,
};
pub use pipeline_worker::{PipelineStats, PipelineWorker, WorkerCommand};
pub use service::{start_recorder, start_recorder_with_store, RecorderHandle, SessionService};
pub use ui_events::{ControlState, CountdownPhase, Notice, UiEvent};
