//! PPG recorder command line
//!
//! Runs one scripted session against the simulated camera: start, wait for
//! the recording to complete, enter the reference value and save.
//!
//! ```bash
//! # Default timings, four filtered zones
//! ppg-recorder --reference 104
//!
//! # Short demo run with the raw center box and a late finger
//! ppg-recorder --reference 98 --strategy center-box --pattern late \
//!     --stabilization-ms 2000 --recording-ms 5000
//! ```

use anyhow::{bail, Context};
use clap::Parser;
use ppg_core::{AppState, SamplingStrategy};
use ppg_recorder::{start_recorder, Notice, RecorderConfig, UiEvent};
use ppg_simulation::{start_simulated_camera, FingerPattern, FrameSimulatorConfig};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Camera PPG recorder
#[derive(Parser, Debug)]
#[command(name = "ppg-recorder")]
#[command(author, version, about = "Record a PPG session from a simulated camera", long_about = None)]
struct Cli {
    /// Logging verbosity level: trace, debug, info, warn or error
    #[arg(short, long, default_value = "info")]
    log_level: Level,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reference value saved with the recording
    #[arg(short, long)]
    reference: String,

    /// Sampling strategy: four-zone or center-box
    #[arg(short, long)]
    strategy: Option<String>,

    /// Simulated finger pattern: steady, absent, late, lift or fidget
    #[arg(short, long, default_value = "steady")]
    pattern: String,

    /// Base directory for saved records
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Override the stabilization countdown
    #[arg(long)]
    stabilization_ms: Option<u64>,

    /// Override the recording countdown
    #[arg(long)]
    recording_ms: Option<u64>,

    /// Simulated heart rate
    #[arg(long, default_value = "72")]
    heart_rate: f32,

    /// Give up if the session has not been saved after this many seconds
    #[arg(long, default_value = "120")]
    timeout_secs: u64,
}

impl Cli {
    fn recorder_config(&self) -> anyhow::Result<RecorderConfig> {
        let mut config = match &self.config {
            Some(path) => RecorderConfig::from_file(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => RecorderConfig::default(),
        };

        if let Some(strategy) = &self.strategy {
            config.processing.strategy = strategy
                .parse::<SamplingStrategy>()
                .context("parsing --strategy")?;
        }
        if let Some(dir) = &self.output_dir {
            config.export.base_dir = dir.clone();
        }
        if let Some(ms) = self.stabilization_ms {
            config.timing.stabilization_ms = ms;
        }
        if let Some(ms) = self.recording_ms {
            config.timing.recording_ms = ms;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    fn camera_config(&self, config: &RecorderConfig) -> anyhow::Result<FrameSimulatorConfig> {
        let pattern = FingerPattern::preset(&self.pattern)
            .with_context(|| format!("unknown finger pattern '{}'", self.pattern))?;

        Ok(FrameSimulatorConfig {
            width: config.camera.width,
            height: config.camera.height,
            frame_rate: config.camera.fps,
            heart_rate_bpm: self.heart_rate,
            pattern,
            ..Default::default()
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_target(true)
        .with_thread_ids(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("PPG recorder v{}", env!("CARGO_PKG_VERSION"));

    let config = cli.recorder_config()?;
    let camera = cli.camera_config(&config)?;
    info!(
        "Method: {}, stabilization {} ms, recording {} ms, output {}",
        config.processing.strategy,
        config.timing.stabilization_ms,
        config.timing.recording_ms,
        config.export.folder().display()
    );

    let (frames, _camera_control) =
        start_simulated_camera(camera).context("starting simulated camera")?;
    let recorder = start_recorder(config, frames).context("starting recorder")?;
    let mut ui = recorder.subscribe();

    recorder.start_new_recording().await?;

    let outcome = tokio::time::timeout(
        Duration::from_secs(cli.timeout_secs),
        drive_session(&recorder, &mut ui, &cli.reference),
    )
    .await;

    recorder.shutdown().await;

    match outcome {
        Ok(Ok(path)) => {
            println!("{}", path.display());
            Ok(())
        }
        Ok(Err(e)) => Err(e),
        Err(_) => bail!("session did not complete within {} s", cli.timeout_secs),
    }
}

/// Follow UI intents until the session is saved
async fn drive_session(
    recorder: &ppg_recorder::RecorderHandle,
    ui: &mut broadcast::Receiver<UiEvent>,
    reference: &str,
) -> anyhow::Result<PathBuf> {
    let mut last_instruction = String::new();

    loop {
        let event = match ui.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("UI listener lagged, skipped {} events", skipped);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => bail!("recorder stopped unexpectedly"),
        };

        match event {
            UiEvent::Instruction(text) if text != last_instruction => {
                info!("{}", text);
                last_instruction = text;
            }
            UiEvent::StateChanged {
                state: AppState::WaitingForInput,
                ..
            } => {
                recorder.set_reference(reference).await?;
                recorder.save().await?;
            }
            UiEvent::Notice(Notice::Saved(path)) => return Ok(path),
            UiEvent::Notice(Notice::SaveFailed(cause)) => bail!("save failed: {}", cause),
            UiEvent::Notice(Notice::MissingReference) => bail!("reference value must not be empty"),
            UiEvent::Notice(Notice::NoData) => bail!("no samples were recorded"),
            UiEvent::Notice(Notice::CaptureUnavailable)
                if recorder.state() != AppState::WaitingForInput =>
            {
                bail!("camera stopped before the recording completed")
            }
            UiEvent::Notice(Notice::AdjustFinger) => {}
            UiEvent::Notice(notice) => info!("{}", notice),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_is_parsed() {
        let cli = Cli::try_parse_from(["ppg-recorder", "-r", "100", "--log-level", "debug"]).unwrap();
        assert_eq!(cli.log_level, Level::DEBUG);

        let cli = Cli::try_parse_from(["ppg-recorder", "-r", "100"]).unwrap();
        assert_eq!(cli.log_level, Level::INFO);
    }

    #[test]
    fn test_unknown_log_level_is_rejected() {
        assert!(Cli::try_parse_from(["ppg-recorder", "-r", "100", "--log-level", "loud"]).is_err());
    }
}
