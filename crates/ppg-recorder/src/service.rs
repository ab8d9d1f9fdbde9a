//! Session service: the single owner of recorder state
//!
//! Frame verdicts, countdown events, user actions and save outcomes are all
//! serialized through this task and applied to the [`SessionStateMachine`].
//! The effects it returns are carried out here: countdowns are spawned or
//! aborted, the pipeline worker is reset, exports run on the blocking pool
//! and UI intents are broadcast.

use chrono::Local;
use ppg_core::{AppState, Frame, PpgError, PpgResult, SamplingStrategy};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::RecorderConfig;
use crate::countdown::CountdownScheduler;
use crate::exporter::{export_session, FsSessionStore, SessionStore};
use crate::machine::{Effect, SessionEvent, SessionStateMachine, TaggedVerdict, UserAction};
use crate::pipeline_worker::{PipelineStats, PipelineWorker, WorkerCommand};
use crate::ui_events::{Notice, UiEvent};

const EVENT_CAPACITY: usize = 64;
const UI_CAPACITY: usize = 256;

pub struct SessionService {
    machine: SessionStateMachine,
    store: Arc<dyn SessionStore>,
    countdowns: CountdownScheduler,
    events_sender: mpsc::Sender<SessionEvent>,
    events: mpsc::Receiver<SessionEvent>,
    verdicts: mpsc::Receiver<TaggedVerdict>,
    worker_commands: mpsc::Sender<WorkerCommand>,
    ui_sender: broadcast::Sender<UiEvent>,
    state_sender: watch::Sender<AppState>,
    shutdown: oneshot::Receiver<()>,
}

impl SessionService {
    /// Main loop; every input is handled to completion before the next
    pub async fn run(mut self) {
        info!("Session service started in {}", self.machine.state());
        let initial = self.machine.initial_effects();
        self.apply(initial).await;
        let mut verdicts_open = true;

        loop {
            let event = tokio::select! {
                _ = &mut self.shutdown => {
                    info!("Session service shutting down");
                    break;
                }
                Some(event) = self.events.recv() => event,
                verdict = self.verdicts.recv(), if verdicts_open => match verdict {
                    Some(verdict) => SessionEvent::Verdict(verdict),
                    None => {
                        // Countdowns, user actions and saves are still served
                        warn!("Pipeline worker stopped in {}, no more verdicts", self.machine.state());
                        verdicts_open = false;
                        let notice = Effect::Ui(UiEvent::Notice(Notice::CaptureUnavailable));
                        self.apply(vec![notice]).await;
                        continue;
                    }
                },
            };

            let effects = self.machine.handle(event);
            self.apply(effects).await;
        }

        if let Some(id) = self.countdowns.running_id() {
            debug!("Aborting countdown {} on shutdown", id);
        }
        self.countdowns.cancel_all();
    }

    async fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::StartCountdown { id, phase, duration } => {
                    self.countdowns.start(id, phase, duration);
                }
                Effect::CancelCountdown { id } => {
                    self.countdowns.cancel(id);
                }
                Effect::ResetPipeline { epoch, strategy } => {
                    if self
                        .worker_commands
                        .send(WorkerCommand::Reset { epoch, strategy })
                        .await
                        .is_err()
                    {
                        debug!("Pipeline worker is gone, reset to epoch {} not delivered", epoch);
                    }
                }
                Effect::Export { session } => {
                    let store = Arc::clone(&self.store);
                    let events = self.events_sender.clone();
                    tokio::spawn(async move {
                        let saved = tokio::task::spawn_blocking(move || {
                            export_session(store.as_ref(), &session, Local::now())
                        })
                        .await
                        .unwrap_or_else(|e| {
                            Err(PpgError::Storage {
                                path: Default::default(),
                                reason: format!("export task failed: {}", e),
                            })
                        });
                        if events.send(SessionEvent::SaveCompleted(saved)).await.is_err() {
                            warn!("Save finished after the session service stopped");
                        }
                    });
                }
                Effect::Ui(event) => {
                    if let UiEvent::StateChanged { state, .. } = &event {
                        self.state_sender.send_replace(*state);
                    }
                    // No subscribers is fine
                    let _ = self.ui_sender.send(event);
                }
            }
        }
    }
}

/// Handle to a running recorder
pub struct RecorderHandle {
    events: mpsc::Sender<SessionEvent>,
    ui: broadcast::Sender<UiEvent>,
    state: watch::Receiver<AppState>,
    stats: watch::Receiver<PipelineStats>,
    shutdown: Option<oneshot::Sender<()>>,
    service_task: JoinHandle<()>,
    worker_task: JoinHandle<()>,
}

impl RecorderHandle {
    async fn act(&self, action: UserAction) -> PpgResult<()> {
        debug!("User action: {:?}", action);
        self.events
            .send(SessionEvent::User(action))
            .await
            .map_err(|_| PpgError::ChannelClosed { channel: "session events" })
    }

    pub async fn start_new_recording(&self) -> PpgResult<()> {
        self.act(UserAction::StartNewRecording).await
    }

    pub async fn toggle_strategy(&self) -> PpgResult<()> {
        self.act(UserAction::ToggleStrategy).await
    }

    pub async fn select_strategy(&self, strategy: SamplingStrategy) -> PpgResult<()> {
        self.act(UserAction::SelectStrategy(strategy)).await
    }

    pub async fn set_reference(&self, value: impl Into<String>) -> PpgResult<()> {
        self.act(UserAction::SetReference(value.into())).await
    }

    pub async fn save(&self) -> PpgResult<()> {
        self.act(UserAction::Save).await
    }

    /// Get a receiver for UI intents
    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.ui.subscribe()
    }

    pub fn state(&self) -> AppState {
        *self.state.borrow()
    }

    /// Watch the application state
    pub fn state_watch(&self) -> watch::Receiver<AppState> {
        self.state.clone()
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats.borrow().clone()
    }

    /// Stop the service and wait for it to finish
    pub async fn shutdown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Err(e) = (&mut self.service_task).await {
            warn!("Session service ended abnormally: {}", e);
        }
        self.worker_task.abort();
    }
}

/// Start the recorder writing into the folder named by `config.export`
pub fn start_recorder(
    config: RecorderConfig,
    frames: watch::Receiver<Option<Arc<Frame>>>,
) -> PpgResult<RecorderHandle> {
    let store = Arc::new(FsSessionStore::from_config(&config.export));
    start_recorder_with_store(config, frames, store)
}

/// Start the pipeline worker and the session service in the background
pub fn start_recorder_with_store(
    config: RecorderConfig,
    frames: watch::Receiver<Option<Arc<Frame>>>,
    store: Arc<dyn SessionStore>,
) -> PpgResult<RecorderHandle> {
    config.validate()?;

    let (events_sender, events) = mpsc::channel(EVENT_CAPACITY);
    let (verdict_sender, verdicts) = mpsc::channel(1);
    let (worker_commands, worker_command_receiver) = mpsc::channel(8);
    let (ui_sender, _) = broadcast::channel(UI_CAPACITY);
    let (state_sender, state) = watch::channel(AppState::Idle);
    let (shutdown_sender, shutdown) = oneshot::channel();

    let worker = PipelineWorker::new(
        config.processing.clone(),
        frames,
        worker_command_receiver,
        verdict_sender,
    )?;
    let stats = worker.subscribe_stats();

    let service = SessionService {
        machine: SessionStateMachine::new(config.timing.clone(), config.processing.strategy),
        store,
        countdowns: CountdownScheduler::new(config.timing.tick(), events_sender.clone()),
        events_sender: events_sender.clone(),
        events,
        verdicts,
        worker_commands,
        ui_sender: ui_sender.clone(),
        state_sender,
        shutdown,
    };

    let worker_task = tokio::spawn(worker.run());
    let service_task = tokio::spawn(service.run());

    Ok(RecorderHandle {
        events: events_sender,
        ui: ui_sender,
        state,
        stats,
        shutdown: Some(shutdown_sender),
        service_task,
        worker_task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ppg_core::ChromaPlane;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tokio::time::{timeout, Duration};

    /// Store that records writes in memory and can be told to fail
    #[derive(Default)]
    struct MemoryStore {
        writes: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl SessionStore for MemoryStore {
        fn write(&self, file_name: &str, contents: &str) -> PpgResult<PathBuf> {
            if self.fail {
                return Err(PpgError::Storage {
                    path: PathBuf::from("/mem").join(file_name),
                    reason: "disk full".to_string(),
                });
            }
            self.writes
                .lock()
                .unwrap()
                .push((file_name.to_string(), contents.to_string()));
            Ok(PathBuf::from("/mem").join(file_name))
        }
    }

    fn covered_frame(sequence: u64) -> Arc<Frame> {
        Arc::new(
            Frame::new(
                sequence,
                120,
                160,
                vec![60; 120 * 160],
                ChromaPlane {
                    data: vec![170; 60 * 80],
                    row_stride: 60,
                    pixel_stride: 1,
                },
            )
            .unwrap(),
        )
    }

    fn quick_config() -> RecorderConfig {
        let mut config = RecorderConfig::quick(100, 200);
        config.processing.strategy = SamplingStrategy::CenterBoxRaw;
        config
    }

    async fn wait_for_state(handle: &RecorderHandle, target: AppState) {
        let mut state = handle.state_watch();
        timeout(Duration::from_secs(5), state.wait_for(|s| *s == target))
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {}", target))
            .unwrap();
    }

    /// Feed covered frames until told to stop
    fn feed(frames: watch::Sender<Option<Arc<Frame>>>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut sequence = 0;
            loop {
                sequence += 1;
                if frames.send(Some(covered_frame(sequence))).is_err() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
    }

    #[tokio::test]
    async fn test_full_session_with_memory_store() {
        let (frames_tx, frames_rx) = watch::channel(None);
        let store = Arc::new(MemoryStore::default());
        let handle = start_recorder_with_store(quick_config(), frames_rx, store.clone()).unwrap();
        let feeder = feed(frames_tx);

        handle.start_new_recording().await.unwrap();
        wait_for_state(&handle, AppState::WaitingForInput).await;

        handle.set_reference("101").await.unwrap();
        handle.save().await.unwrap();
        wait_for_state(&handle, AppState::Idle).await;

        let writes = store.writes.lock().unwrap().clone();
        assert_eq!(writes.len(), 1);
        let (name, contents) = &writes[0];
        assert!(name.starts_with("PPG_Signal_") && name.ends_with(".csv"));
        assert!(contents.starts_with("recording_method\nCENTER_BOX_RAW\nblood_sugar_value\n101\nppg_data\n-170.0\n"));

        feeder.abort();
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_save_failure_keeps_waiting_for_input() {
        let (frames_tx, frames_rx) = watch::channel(None);
        let store = Arc::new(MemoryStore {
            fail: true,
            ..Default::default()
        });
        let handle = start_recorder_with_store(quick_config(), frames_rx, store).unwrap();
        let mut ui = handle.subscribe();
        let feeder = feed(frames_tx);

        handle.start_new_recording().await.unwrap();
        wait_for_state(&handle, AppState::WaitingForInput).await;
        handle.set_reference("101").await.unwrap();
        handle.save().await.unwrap();

        let failure = timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(UiEvent::Notice(Notice::SaveFailed(cause))) = ui.recv().await {
                    return cause;
                }
            }
        })
        .await
        .unwrap();
        assert!(failure.contains("disk full"));
        assert_eq!(handle.state(), AppState::WaitingForInput);

        feeder.abort();
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_finished_recording_survives_camera_shutdown() {
        let (frames_tx, frames_rx) = watch::channel(None);
        let store = Arc::new(MemoryStore::default());
        let handle = start_recorder_with_store(quick_config(), frames_rx, store.clone()).unwrap();
        let mut ui = handle.subscribe();
        let feeder = feed(frames_tx);

        handle.start_new_recording().await.unwrap();
        wait_for_state(&handle, AppState::WaitingForInput).await;

        // Dropping the feeder drops the last frame sender
        feeder.abort();
        timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(UiEvent::Notice(Notice::CaptureUnavailable)) = ui.recv().await {
                    return;
                }
            }
        })
        .await
        .unwrap();

        handle.set_reference("97").await.unwrap();
        handle.save().await.unwrap();
        wait_for_state(&handle, AppState::Idle).await;

        let writes = store.writes.lock().unwrap().clone();
        assert_eq!(writes.len(), 1);
        assert!(writes[0].1.contains("blood_sugar_value\n97\n"));

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_stats_follow_frames() {
        let (frames_tx, frames_rx) = watch::channel(None);
        let handle =
            start_recorder_with_store(quick_config(), frames_rx, Arc::new(MemoryStore::default()))
                .unwrap();

        frames_tx.send(Some(covered_frame(1))).unwrap();
        let mut stats = handle.stats.clone();
        timeout(Duration::from_secs(2), stats.wait_for(|s| s.frames_processed >= 1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(handle.state(), AppState::Idle);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let (_frames_tx, frames_rx) = watch::channel(None);
        let mut config = RecorderConfig::default();
        config.timing.tick_ms = 0;
        assert!(start_recorder(config, frames_rx).is_err());
    }
}
