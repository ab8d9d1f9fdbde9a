//! Session state machine
//!
//! A pure transition function: every input (frame verdict, countdown event,
//! user action, save outcome) goes through [`SessionStateMachine::handle`],
//! which mutates the owned state and returns the side effects the caller
//! must perform. Nothing in here touches timers, channels or the disk.
//!
//! Two counters make late events harmless:
//! - the pipeline epoch, bumped on every measurement reset; verdicts computed
//!   before the reset carry an older epoch and are dropped.
//! - the countdown id; events from a countdown that was cancelled or has
//!   already been superseded are dropped.

use ppg_core::{AppState, PpgError, PpgResult, Session, SamplingStrategy};
use ppg_processing::GateVerdict;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::TimingConfig;
use crate::ui_events::{
    countdown_instruction, instruction_for, whole_seconds, ControlState, CountdownPhase, Notice,
    UiEvent,
};

/// Identifier of one countdown run
pub type TimerId = u64;

/// Gate verdict stamped with the pipeline epoch it was computed in
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedVerdict {
    pub epoch: u64,
    pub verdict: GateVerdict,
}

/// Countdown progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownEvent {
    Tick {
        id: TimerId,
        phase: CountdownPhase,
        remaining: Duration,
    },
    Finished {
        id: TimerId,
        phase: CountdownPhase,
    },
}

impl CountdownEvent {
    pub fn id(&self) -> TimerId {
        match self {
            CountdownEvent::Tick { id, .. } | CountdownEvent::Finished { id, .. } => *id,
        }
    }
}

/// Actions from the UI layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    StartNewRecording,
    ToggleStrategy,
    SelectStrategy(SamplingStrategy),
    SetReference(String),
    Save,
}

/// Every input the state machine reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Verdict(TaggedVerdict),
    Countdown(CountdownEvent),
    User(UserAction),
    SaveCompleted(PpgResult<PathBuf>),
}

/// Side effects requested by a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartCountdown {
        id: TimerId,
        phase: CountdownPhase,
        duration: Duration,
    },
    CancelCountdown {
        id: TimerId,
    },
    /// Rebuild the per-zone filters and adopt `strategy`
    ResetPipeline {
        epoch: u64,
        strategy: SamplingStrategy,
    },
    /// Persist a validated session
    Export {
        session: Session,
    },
    Ui(UiEvent),
}

/// Exclusive owner of the application state and the session buffer
#[derive(Debug)]
pub struct SessionStateMachine {
    state: AppState,
    timing: TimingConfig,
    /// Strategy the next session will lock to
    selected_strategy: SamplingStrategy,
    /// Strategy of the current session
    session_strategy: SamplingStrategy,
    session: Option<Session>,
    reference: String,
    epoch: u64,
    next_timer_id: TimerId,
    active_countdown: Option<(TimerId, CountdownPhase)>,
    save_in_flight: bool,
}

impl SessionStateMachine {
    pub fn new(timing: TimingConfig, strategy: SamplingStrategy) -> Self {
        SessionStateMachine {
            state: AppState::Idle,
            timing,
            selected_strategy: strategy,
            session_strategy: strategy,
            session: None,
            reference: String::new(),
            epoch: 0,
            next_timer_id: 0,
            active_countdown: None,
            save_in_flight: false,
        }
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn selected_strategy(&self) -> SamplingStrategy {
        self.selected_strategy
    }

    /// Strategy locked by the current (or last) session
    pub fn session_strategy(&self) -> SamplingStrategy {
        self.session_strategy
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn active_countdown(&self) -> Option<(TimerId, CountdownPhase)> {
        self.active_countdown
    }

    pub fn is_save_in_flight(&self) -> bool {
        self.save_in_flight
    }

    /// Save control is enabled only with input pending, a reference and no save outstanding
    pub fn save_enabled(&self) -> bool {
        self.state == AppState::WaitingForInput && !self.reference.is_empty() && !self.save_in_flight
    }

    /// A new recording may start from Idle, or after a recording that captured nothing
    pub fn can_start(&self) -> bool {
        match self.state {
            AppState::Idle => true,
            AppState::WaitingForInput => {
                !self.save_in_flight
                    && self.session.as_ref().map_or(true, |s| s.sample_count() == 0)
            }
            _ => false,
        }
    }

    /// UI snapshot for the current state, emitted once at startup
    pub fn initial_effects(&self) -> Vec<Effect> {
        vec![
            self.state_changed(),
            Effect::Ui(UiEvent::Instruction(instruction_for(self.state))),
        ]
    }

    /// Apply one event and return the effects to perform, in order
    pub fn handle(&mut self, event: SessionEvent) -> Vec<Effect> {
        let mut effects = Vec::new();
        match event {
            SessionEvent::Verdict(tagged) => self.on_verdict(tagged, &mut effects),
            SessionEvent::Countdown(event) => self.on_countdown(event, &mut effects),
            SessionEvent::User(action) => self.on_user(action, &mut effects),
            SessionEvent::SaveCompleted(result) => self.on_save_completed(result, &mut effects),
        }
        effects
    }

    fn on_verdict(&mut self, tagged: TaggedVerdict, effects: &mut Vec<Effect>) {
        if tagged.epoch != self.epoch {
            debug!("Dropping verdict from epoch {} (current {})", tagged.epoch, self.epoch);
            return;
        }
        if !self.state.is_acquiring() {
            return;
        }

        let Some(samples) = tagged.verdict.good_samples() else {
            effects.push(Effect::Ui(UiEvent::ChartVisibility(false)));
            effects.push(Effect::Ui(UiEvent::Notice(Notice::AdjustFinger)));

            if self.state.is_timed() {
                warn!("Signal lost during {}, restarting measurement", self.state);
                effects.push(Effect::Ui(UiEvent::Notice(Notice::SignalLost)));
                self.reset_measurement(effects);
                self.enter(AppState::WaitingForFinger, effects);
            } else {
                effects.push(Effect::Ui(UiEvent::Instruction(instruction_for(self.state))));
            }
            return;
        };

        if samples.strategy() != self.session_strategy {
            debug!(
                "Dropping {} verdict, session is locked to {}",
                samples.strategy(),
                self.session_strategy
            );
            return;
        }

        effects.push(Effect::Ui(UiEvent::ChartVisibility(true)));
        effects.push(Effect::Ui(UiEvent::ChartAppend(samples.values().to_vec())));

        match self.state {
            AppState::WaitingForFinger => {
                info!("Signal good, stabilizing");
                self.start_countdown(CountdownPhase::Stabilization, effects);
                self.enter(AppState::Stabilizing, effects);
            }
            AppState::Recording => {
                if let Some(session) = self.session.as_mut() {
                    if let Err(e) = session.append(samples) {
                        warn!("Sample vector rejected: {}", e);
                    }
                }
            }
            _ => {}
        }
    }

    fn on_countdown(&mut self, event: CountdownEvent, effects: &mut Vec<Effect>) {
        match self.active_countdown {
            Some((id, _)) if id == event.id() => {}
            _ => {
                debug!("Dropping event from stale countdown {}", event.id());
                return;
            }
        }

        match event {
            CountdownEvent::Tick { phase, remaining, .. } => {
                let secs = whole_seconds(remaining.as_millis() as u64);
                effects.push(Effect::Ui(UiEvent::Countdown {
                    phase,
                    remaining_secs: secs,
                }));
                effects.push(Effect::Ui(UiEvent::Instruction(countdown_instruction(phase, secs))));
            }
            CountdownEvent::Finished { phase, id } => {
                info!("Countdown {} ({}) finished", id, phase);
                self.active_countdown = None;
                match (phase, self.state) {
                    (CountdownPhase::Stabilization, AppState::Stabilizing) => {
                        self.session = Some(Session::new(self.session_strategy));
                        self.start_countdown(CountdownPhase::Recording, effects);
                        self.enter(AppState::Recording, effects);
                    }
                    (CountdownPhase::Recording, AppState::Recording) => {
                        let (samples, frames) = match self.session.as_mut() {
                            Some(session) => {
                                session.finalize();
                                (session.sample_count(), session.frame_count())
                            }
                            None => (0, 0),
                        };
                        info!("Recording complete with {} samples from {} frames", samples, frames);
                        self.enter(AppState::WaitingForInput, effects);
                        effects.push(Effect::Ui(UiEvent::Notice(Notice::RecordingComplete { samples })));
                    }
                    (phase, state) => {
                        warn!("Countdown {} finished in unexpected state {}", phase, state);
                    }
                }
            }
        }
    }

    fn on_user(&mut self, action: UserAction, effects: &mut Vec<Effect>) {
        match action {
            UserAction::StartNewRecording => {
                if !self.can_start() {
                    debug!("Ignoring start request in {}", self.state);
                    return;
                }
                self.session_strategy = self.selected_strategy;
                info!("Starting new recording with {}", self.session_strategy);
                self.reset_measurement(effects);
                self.enter(AppState::WaitingForFinger, effects);
            }
            UserAction::ToggleStrategy => {
                self.select_strategy(self.selected_strategy.toggled(), effects);
            }
            UserAction::SelectStrategy(strategy) => {
                self.select_strategy(strategy, effects);
            }
            UserAction::SetReference(value) => {
                if self.state != AppState::WaitingForInput {
                    debug!("Ignoring reference edit in {}", self.state);
                    return;
                }
                self.reference = value;
                effects.push(Effect::Ui(UiEvent::SaveEnabled(self.save_enabled())));
            }
            UserAction::Save => self.request_save(effects),
        }
    }

    fn select_strategy(&mut self, strategy: SamplingStrategy, effects: &mut Vec<Effect>) {
        if strategy == self.selected_strategy {
            return;
        }
        self.selected_strategy = strategy;
        if self.state == AppState::Idle {
            info!("Recording method set to {}", strategy);
        } else {
            info!(
                "Recording method set to {} for the next session, current stays {}",
                strategy, self.session_strategy
            );
        }
        effects.push(Effect::Ui(UiEvent::Notice(Notice::StrategyChanged(strategy))));
    }

    fn request_save(&mut self, effects: &mut Vec<Effect>) {
        if self.state != AppState::WaitingForInput {
            debug!("Ignoring save request in {}", self.state);
            return;
        }
        if self.save_in_flight {
            warn!("{}", PpgError::SaveInProgress);
            effects.push(Effect::Ui(UiEvent::Notice(Notice::SaveInProgress)));
            return;
        }

        let Some(session) = self.session.as_mut() else {
            effects.push(Effect::Ui(UiEvent::Notice(Notice::NoData)));
            effects.push(self.state_changed());
            return;
        };
        session.reference_value = Some(self.reference.clone());

        match session.validate_for_export() {
            Ok(()) => {
                info!("Saving session {} ({} samples)", session.id, session.sample_count());
                let session = session.clone();
                self.save_in_flight = true;
                effects.push(Effect::Ui(UiEvent::SaveEnabled(false)));
                effects.push(Effect::Export { session });
            }
            Err(e) => {
                warn!("Save rejected: {}", e);
                let notice = match e {
                    PpgError::EmptyReferenceValue => Notice::MissingReference,
                    _ => Notice::NoData,
                };
                effects.push(Effect::Ui(UiEvent::Notice(notice)));
                effects.push(Effect::Ui(UiEvent::SaveEnabled(self.save_enabled())));
                if self.can_start() {
                    effects.push(self.state_changed());
                }
            }
        }
    }

    fn on_save_completed(&mut self, result: PpgResult<PathBuf>, effects: &mut Vec<Effect>) {
        if !self.save_in_flight {
            warn!("Save completion without an outstanding save");
            return;
        }
        self.save_in_flight = false;

        match result {
            Ok(path) => {
                info!("Session saved to {}", path.display());
                effects.push(Effect::Ui(UiEvent::Notice(Notice::Saved(path))));
                self.reset_measurement(effects);
                self.enter(AppState::Idle, effects);
            }
            Err(e) => {
                warn!("Save failed: {}", e);
                effects.push(Effect::Ui(UiEvent::Notice(Notice::SaveFailed(e.to_string()))));
                effects.push(Effect::Ui(UiEvent::SaveEnabled(self.save_enabled())));
            }
        }
    }

    /// Cancel the countdown, drop the session, rebuild the filters, clear inputs
    fn reset_measurement(&mut self, effects: &mut Vec<Effect>) {
        if let Some((id, phase)) = self.active_countdown.take() {
            debug!("Cancelling {} countdown {}", phase, id);
            effects.push(Effect::CancelCountdown { id });
        }

        self.session = None;
        self.reference.clear();
        self.epoch += 1;

        effects.push(Effect::ResetPipeline {
            epoch: self.epoch,
            strategy: self.session_strategy,
        });
        effects.push(Effect::Ui(UiEvent::ChartCleared));
        effects.push(Effect::Ui(UiEvent::ChartVisibility(false)));
        effects.push(Effect::Ui(UiEvent::ReferenceCleared));
    }

    fn start_countdown(&mut self, phase: CountdownPhase, effects: &mut Vec<Effect>) {
        if let Some((id, _)) = self.active_countdown.take() {
            effects.push(Effect::CancelCountdown { id });
        }

        self.next_timer_id += 1;
        let id = self.next_timer_id;
        let duration = match phase {
            CountdownPhase::Stabilization => self.timing.stabilization(),
            CountdownPhase::Recording => self.timing.recording(),
        };
        self.active_countdown = Some((id, phase));

        debug!("Starting {} countdown {} for {:?}", phase, id, duration);
        effects.push(Effect::StartCountdown { id, phase, duration });
    }

    fn enter(&mut self, state: AppState, effects: &mut Vec<Effect>) {
        if state != self.state {
            info!("State {} -> {}", self.state, state);
        }
        self.state = state;
        effects.push(self.state_changed());
        effects.push(Effect::Ui(UiEvent::Instruction(instruction_for(state))));
        effects.push(Effect::Ui(UiEvent::SaveEnabled(self.save_enabled())));
    }

    fn state_changed(&self) -> Effect {
        let mut controls = ControlState::for_state(self.state, self.save_enabled());
        if self.state == AppState::WaitingForInput && self.can_start() {
            controls.new_recording_visible = true;
        }
        Effect::Ui(UiEvent::StateChanged {
            state: self.state,
            controls,
        })
    }
}
