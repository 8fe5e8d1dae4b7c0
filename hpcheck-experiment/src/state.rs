use crate::config::{CheckConfig, ThresholdMode};
use crate::events::{CheckEvent, CheckObserver};
use crate::sampler::{self, SampleError};
use crate::scoring;
use crate::session::Session;
use crate::source::{DataLoadError, StimulusSource};
use hpcheck_cache::ProgressCache;
use hpcheck_core::{Answer, CheckPhase, StimulusPool, TrialId};
use rand::Rng;
use std::collections::BTreeSet;
use std::ops::Range;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Data-free signals a host can send through [`TrialStateMachine::handle_signal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSignal {
    Start,
    CalibrationComplete,
    PresentPage,
    Continue,
    PlaybackEnded,
}

#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("signal `{signal}` is not accepted while {phase}")]
    UnexpectedSignal {
        signal: &'static str,
        phase: CheckPhase,
    },

    #[error("stimulus pool contains no stimuli")]
    EmptyPool,

    #[error("calibration is enabled but the stimulus pool has no calibration entry")]
    MissingCalibration,
}

impl From<SampleError> for EngineError {
    fn from(err: SampleError) -> Self {
        match err {
            SampleError::EmptyPool => EngineError::EmptyPool,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlaybackRefused {
    #[error("playback is not possible while {0}")]
    NotAcceptingInput(CheckPhase),

    #[error("trial {0} is not on the active page")]
    NotOnPage(usize),

    #[error("trial {previous} must be answered before trial {trial} can play")]
    PreviousUnanswered { trial: usize, previous: usize },

    #[error("trial {0} has already been played")]
    AlreadyPlayed(usize),

    #[error("another sound is still playing")]
    AlreadyPlaying,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResponseRefused {
    #[error("responses are not accepted while {0}")]
    NotAcceptingInput(CheckPhase),

    #[error("trial {0} is not on the active page")]
    NotOnPage(usize),

    #[error("trial {0} must be played before it can be answered")]
    NotPlayed(usize),

    #[error("trial {0} is still playing")]
    StillPlaying(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Playback {
    Trial(usize),
    Calibration,
}

/// A trial as the host needs it to render a page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageTrial {
    pub index: usize,
    pub id: TrialId,
    pub src: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
    pub page: usize,
    pub last_page: usize,
    pub trials: Vec<PageTrial>,
}

/// Drives one headphone check from start to pass/fail.
///
/// The machine owns its [`Session`]; hosts only read it. Every signal is
/// handled to completion before the next one, and a signal that does not
/// fit the current phase is rejected without touching any state, so the
/// machine can sit in any phase for as long as the host takes.
pub struct TrialStateMachine<R: Rng> {
    config: CheckConfig,
    rng: R,
    phase: CheckPhase,
    session: Session,
    cache: Option<Box<dyn ProgressCache>>,
    caching: bool,
    observers: Vec<Box<dyn CheckObserver>>,
    played: BTreeSet<usize>,
    playing: Option<Playback>,
}

impl<R: Rng> TrialStateMachine<R> {
    pub fn new(config: CheckConfig, rng: R) -> Self {
        Self {
            config,
            rng,
            phase: CheckPhase::Uninitialized,
            session: Session::default(),
            cache: None,
            caching: false,
            observers: Vec::new(),
            played: BTreeSet::new(),
            playing: None,
        }
    }

    pub fn with_cache(mut self, cache: impl ProgressCache + 'static) -> Self {
        self.cache = Some(Box::new(cache));
        self
    }

    pub fn subscribe(&mut self, observer: impl CheckObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    pub fn phase(&self) -> CheckPhase {
        self.phase
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_complete(&self) -> bool {
        self.phase.is_complete()
    }

    pub fn did_pass(&self) -> Option<bool> {
        self.session.did_pass()
    }

    pub fn is_playing(&self) -> bool {
        self.playing.is_some()
    }

    pub fn handle_signal(&mut self, signal: HostSignal) -> Result<CheckPhase, EngineError> {
        match signal {
            HostSignal::Start => self.start(),
            HostSignal::CalibrationComplete => self.complete_calibration(),
            HostSignal::PresentPage => self.present_page().map(|_| self.phase),
            HostSignal::Continue => self.continue_page(),
            HostSignal::PlaybackEnded => {
                self.finish_playback();
                Ok(self.phase)
            }
        }
    }

    /// Leaves `Uninitialized`. Resumes a cached session when one can be
    /// restored, otherwise parks in `AwaitingStimuli` until the pool arrives.
    pub fn start(&mut self) -> Result<CheckPhase, EngineError> {
        if self.phase != CheckPhase::Uninitialized {
            return Err(self.unexpected("start"));
        }
        self.emit(CheckEvent::Initialized {
            config: self.config.clone(),
        });
        self.phase = CheckPhase::AwaitingStimuli;

        self.caching = self.probe_cache();
        if self.caching && self.restore_progress() {
            return Ok(self.phase);
        }
        info!(total_trials = self.config.total_trials(), "awaiting stimulus pool");
        Ok(self.phase)
    }

    /// Fetches from `source` and hands the result to [`Self::deliver_stimuli`].
    pub fn load_stimuli<S>(&mut self, source: &mut S) -> Result<CheckPhase, EngineError>
    where
        S: StimulusSource + ?Sized,
    {
        if self.phase != CheckPhase::AwaitingStimuli {
            return Err(self.unexpected("load_stimuli"));
        }
        let result = source.fetch();
        self.deliver_stimuli(result)
    }

    /// Accepts the outcome of a pool fetch.
    ///
    /// A failed fetch is reported through events and keeps the machine in
    /// `AwaitingStimuli` so the host may retry. A pool that cannot produce a
    /// consistent session is rejected with an error.
    pub fn deliver_stimuli(
        &mut self,
        result: Result<StimulusPool, DataLoadError>,
    ) -> Result<CheckPhase, EngineError> {
        if self.phase != CheckPhase::AwaitingStimuli {
            return Err(self.unexpected("deliver_stimuli"));
        }
        let pool = match result {
            Ok(pool) => pool,
            Err(err) => {
                warn!(error = %err, "stimulus pool failed to load");
                self.emit(CheckEvent::StimuliLoadFailed {
                    reason: err.to_string(),
                });
                self.emit(CheckEvent::StimuliLoadCompleted);
                return Ok(self.phase);
            }
        };

        let session = match self.prepare_session(&pool) {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "stimulus pool rejected");
                self.emit(CheckEvent::StimuliLoadFailed {
                    reason: err.to_string(),
                });
                self.emit(CheckEvent::StimuliLoadCompleted);
                return Err(err);
            }
        };

        self.emit(CheckEvent::StimuliLoadSucceeded {
            stimulus_count: pool.len(),
        });
        info!(
            trials = session.trial_count(),
            pages = session.last_page(),
            "session initialized"
        );
        self.session = session;
        self.played.clear();
        self.playing = None;
        self.store_progress();
        self.emit(CheckEvent::StimuliLoadCompleted);

        match self.session.calibration().cloned() {
            Some(calibration) if self.config.do_calibration() => {
                self.phase = CheckPhase::Calibrating;
                self.emit(CheckEvent::CalibrationStarted { calibration });
            }
            _ => self.enter_first_page(),
        }
        Ok(self.phase)
    }

    /// Calibration sound may be replayed any number of times.
    pub fn start_calibration_playback(&mut self) -> Result<String, PlaybackRefused> {
        if !self.phase.requires_calibration() {
            return Err(PlaybackRefused::NotAcceptingInput(self.phase));
        }
        if self.playing.is_some() {
            return Err(PlaybackRefused::AlreadyPlaying);
        }
        let src = self
            .session
            .calibration()
            .map(|c| c.src.clone())
            .ok_or(PlaybackRefused::NotAcceptingInput(self.phase))?;
        self.playing = Some(Playback::Calibration);
        Ok(src)
    }

    pub fn complete_calibration(&mut self) -> Result<CheckPhase, EngineError> {
        if !self.phase.requires_calibration() {
            return Err(self.unexpected("calibration_complete"));
        }
        self.playing = None;
        self.emit(CheckEvent::CalibrationEnded);
        self.enter_first_page();
        Ok(self.phase)
    }

    /// Shows the active page; the machine then waits for responses and a
    /// continue signal. Presenting the same page again is harmless.
    pub fn present_page(&mut self) -> Result<PageView, EngineError> {
        let page = match self.phase {
            CheckPhase::Paging { page } | CheckPhase::AwaitingResponses { page } => page,
            _ => return Err(self.unexpected("present_page")),
        };
        self.phase = CheckPhase::AwaitingResponses { page };
        debug!(page, "page presented");
        Ok(self.page_view(page))
    }

    /// Sequential gating: with `use_sequential`, trial `i > 0` may only play
    /// once trial `i - 1` holds a response or a score.
    pub fn can_play(&self, trial_index: usize) -> bool {
        if trial_index >= self.session.trial_count() {
            return false;
        }
        if !self.config.use_sequential() || trial_index == 0 {
            return true;
        }
        let previous = trial_index - 1;
        self.session.response(previous).is_some() || self.session.score(previous).is_some()
    }

    /// Marks the trial as playing and returns its `src`. Each trial plays once.
    pub fn start_playback(&mut self, trial_index: usize) -> Result<String, PlaybackRefused> {
        if !self.phase.allows_input() {
            return Err(PlaybackRefused::NotAcceptingInput(self.phase));
        }
        if !self.active_page_contains(trial_index) {
            return Err(PlaybackRefused::NotOnPage(trial_index));
        }
        if self.playing.is_some() {
            return Err(PlaybackRefused::AlreadyPlaying);
        }
        if self.played.contains(&trial_index) {
            return Err(PlaybackRefused::AlreadyPlayed(trial_index));
        }
        if !self.can_play(trial_index) {
            return Err(PlaybackRefused::PreviousUnanswered {
                trial: trial_index,
                previous: trial_index - 1,
            });
        }
        let src = self
            .session
            .trial(trial_index)
            .map(|t| t.src().to_string())
            .ok_or(PlaybackRefused::NotOnPage(trial_index))?;

        self.played.insert(trial_index);
        self.playing = Some(Playback::Trial(trial_index));
        debug!(trial = trial_index, %src, "playback started");
        Ok(src)
    }

    pub fn finish_playback(&mut self) {
        if let Some(playback) = self.playing.take() {
            debug!(?playback, "playback ended");
        }
    }

    /// Records (or replaces) the response for a trial on the active page.
    /// Scoring happens on continue.
    pub fn record_response(
        &mut self,
        trial_index: usize,
        response: impl Into<Answer>,
    ) -> Result<(), ResponseRefused> {
        if !self.phase.allows_input() {
            return Err(ResponseRefused::NotAcceptingInput(self.phase));
        }
        if !self.active_page_contains(trial_index) {
            return Err(ResponseRefused::NotOnPage(trial_index));
        }
        if self.playing == Some(Playback::Trial(trial_index)) {
            return Err(ResponseRefused::StillPlaying(trial_index));
        }
        if self.config.require_playback() && !self.played.contains(&trial_index) {
            return Err(ResponseRefused::NotPlayed(trial_index));
        }
        let response = response.into();
        debug!(trial = trial_index, %response, "response recorded");
        self.session.set_response(trial_index, response);
        Ok(())
    }

    /// Trials on the active page still lacking a response.
    pub fn unanswered_on_page(&self) -> Vec<usize> {
        match self.phase.page() {
            Some(page) => self
                .page_indices(page)
                .filter(|&i| self.session.response(i).is_none())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Scores the active page, then advances or completes when every trial
    /// on it is answered. Otherwise emits `ResponsesMissing` and stays put.
    pub fn continue_page(&mut self) -> Result<CheckPhase, EngineError> {
        let CheckPhase::AwaitingResponses { page } = self.phase else {
            return Err(self.unexpected("continue"));
        };

        for index in self.page_indices(page) {
            let Some(trial) = self.session.trial(index) else {
                continue;
            };
            let stimulus = trial.stimulus.clone();
            let response = self.session.response(index).cloned();
            scoring::score_trial(&mut self.session, index, &stimulus, response.as_ref());
        }

        let missing = self.unanswered_on_page();
        if !missing.is_empty() {
            info!(page, ?missing, "cannot continue, responses missing");
            self.emit(CheckEvent::ResponsesMissing { page, missing });
            return Ok(self.phase);
        }

        if self.session.is_last_page() {
            self.finish();
        } else {
            self.session.advance_page();
            let next = self.session.page_num();
            self.phase = CheckPhase::Paging { page: next };
            self.playing = None;
            debug!(page = next, "page advanced");
            self.emit(CheckEvent::PageAdvanced { page: next });
            self.store_progress();
        }
        Ok(self.phase)
    }

    /// Drops the session and returns to `Uninitialized` for a new run.
    pub fn reset(&mut self) {
        self.session = Session::default();
        self.phase = CheckPhase::Uninitialized;
        self.caching = false;
        self.played.clear();
        self.playing = None;
    }

    fn prepare_session(&mut self, pool: &StimulusPool) -> Result<Session, EngineError> {
        if pool.is_empty() {
            return Err(EngineError::EmptyPool);
        }
        let calibration = if self.config.do_calibration() {
            Some(
                pool.calibration
                    .clone()
                    .ok_or(EngineError::MissingCalibration)?,
            )
        } else {
            None
        };
        let trials = sampler::draw_trials(&pool.stimuli, &self.config, &mut self.rng)?;
        Ok(Session::new(
            trials,
            self.config.trials_per_page(),
            calibration,
        ))
    }

    fn enter_first_page(&mut self) {
        self.phase = CheckPhase::Paging { page: 0 };
        self.emit(CheckEvent::CheckStarted {
            session: self.session.clone(),
        });
    }

    fn finish(&mut self) {
        let total = scoring::total_correct(self.session.scores());
        let did_pass = scoring::check_pass_fail(total, &self.config, self.session.trial_count());
        self.session.finalize(total, did_pass);
        self.phase = CheckPhase::Complete;
        self.playing = None;
        info!(total_correct = total, did_pass, "headphone check complete");
        self.store_progress();
        self.emit(CheckEvent::CheckEnded {
            did_pass,
            total_correct: total,
            session: self.session.clone(),
        });
    }

    fn page_indices(&self, page: usize) -> Range<usize> {
        self.session.page_range(page, self.config.trials_per_page())
    }

    fn active_page_contains(&self, trial_index: usize) -> bool {
        self.phase
            .page()
            .is_some_and(|page| self.page_indices(page).contains(&trial_index))
    }

    fn page_view(&self, page: usize) -> PageView {
        let trials = self
            .page_indices(page)
            .filter_map(|i| self.session.trial(i))
            .map(|t| PageTrial {
                index: t.index(),
                id: t.id.clone(),
                src: t.src().to_string(),
            })
            .collect();
        PageView {
            page,
            last_page: self.session.last_page(),
            trials,
        }
    }

    /// Caching is only used when the configuration asks for it, a backend
    /// is attached, and that backend passes the probe.
    fn probe_cache(&mut self) -> bool {
        if !self.config.use_cache() {
            return false;
        }
        let Some(cache) = self.cache.as_mut() else {
            return false;
        };
        if !cache.is_available() {
            self.emit(CheckEvent::StorageUnavailable);
            return false;
        }
        true
    }

    fn restore_progress(&mut self) -> bool {
        let key = self.config.cache_key().to_string();
        let loaded = match self.cache.as_ref() {
            Some(cache) => cache.load(&key),
            None => return false,
        };
        let outcome = match loaded {
            Ok(Some(blob)) => Session::from_json_str(&blob)
                .map_err(|e| format!("stored session is unreadable: {e}"))
                .and_then(|session| self.check_restored(session)),
            Ok(None) => Err(format!("no stored session under {key}")),
            Err(err) => Err(err.to_string()),
        };

        match outcome {
            Ok(session) => {
                let page = session.page_num();
                self.played = (0..session.trial_count())
                    .filter(|&i| session.response(i).is_some())
                    .collect();
                self.session = session;
                self.phase = CheckPhase::Paging { page };
                info!(page, %key, "progress restored");
                self.emit(CheckEvent::ProgressRestored { page });
                true
            }
            Err(reason) => {
                debug!(%reason, "progress not restored");
                self.emit(CheckEvent::RestoreFailed { reason });
                false
            }
        }
    }

    fn check_restored(&self, session: Session) -> Result<Session, String> {
        if session.is_finalized() {
            return Err("stored session already completed".to_string());
        }
        if !session.is_consistent(self.config.trials_per_page()) {
            return Err("stored session does not match the configured page size".to_string());
        }
        let count = session.trial_count();
        if count > self.config.total_trials() {
            return Err(format!(
                "stored session has {count} trials but totalTrials is {}",
                self.config.total_trials()
            ));
        }
        let threshold = self.config.correct_threshold();
        let absolute = self.config.threshold_mode() == ThresholdMode::AbsoluteCount;
        if absolute && threshold > count as f64 {
            return Err(format!(
                "correctThreshold {threshold} is unreachable with the {count} stored trials"
            ));
        }
        Ok(session)
    }

    /// Overwrites the cached blob with the full session. Failures are
    /// reported as events only.
    fn store_progress(&mut self) {
        if !self.caching {
            return;
        }
        let Some(cache) = self.cache.as_mut() else {
            return;
        };
        let key = self.config.cache_key().to_string();
        let result = self
            .session
            .to_json()
            .map_err(|e| e.to_string())
            .and_then(|blob| cache.store(&key, &blob).map_err(|e| e.to_string()));

        let event = match result {
            Ok(()) => {
                debug!(%key, page = self.session.page_num(), "progress stored");
                CheckEvent::ProgressStored { key }
            }
            Err(reason) => {
                warn!(%reason, "failed to store progress");
                CheckEvent::StoreFailed { reason }
            }
        };
        self.emit(event);
    }

    fn unexpected(&self, signal: &'static str) -> EngineError {
        warn!(signal, phase = %self.phase, "signal rejected");
        EngineError::UnexpectedSignal {
            signal,
            phase: self.phase,
        }
    }

    fn emit(&mut self, event: CheckEvent) {
        debug!(event = event.name(), "check event");
        for observer in &mut self.observers {
            observer.notify(&event);
        }
    }
}
