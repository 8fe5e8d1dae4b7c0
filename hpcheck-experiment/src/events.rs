use crate::config::CheckConfig;
use crate::session::Session;
use hpcheck_core::Calibration;
use std::sync::mpsc::Sender;

/// Lifecycle notifications published by the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckEvent {
    Initialized { config: CheckConfig },
    StimuliLoadSucceeded { stimulus_count: usize },
    StimuliLoadFailed { reason: String },
    /// Follows every load attempt, successful or not.
    StimuliLoadCompleted,
    CalibrationStarted { calibration: Calibration },
    CalibrationEnded,
    CheckStarted { session: Session },
    PageAdvanced { page: usize },
    CheckEnded {
        did_pass: bool,
        total_correct: u32,
        session: Session,
    },
    ProgressRestored { page: usize },
    RestoreFailed { reason: String },
    ProgressStored { key: String },
    StoreFailed { reason: String },
    StorageUnavailable,
    ResponsesMissing { page: usize, missing: Vec<usize> },
}

impl CheckEvent {
    pub fn name(&self) -> &'static str {
        match self {
            CheckEvent::Initialized { .. } => "initialized",
            CheckEvent::StimuliLoadSucceeded { .. } => "stimuli_load_succeeded",
            CheckEvent::StimuliLoadFailed { .. } => "stimuli_load_failed",
            CheckEvent::StimuliLoadCompleted => "stimuli_load_completed",
            CheckEvent::CalibrationStarted { .. } => "calibration_started",
            CheckEvent::CalibrationEnded => "calibration_ended",
            CheckEvent::CheckStarted { .. } => "check_started",
            CheckEvent::PageAdvanced { .. } => "page_advanced",
            CheckEvent::CheckEnded { .. } => "check_ended",
            CheckEvent::ProgressRestored { .. } => "progress_restored",
            CheckEvent::RestoreFailed { .. } => "restore_failed",
            CheckEvent::ProgressStored { .. } => "progress_stored",
            CheckEvent::StoreFailed { .. } => "store_failed",
            CheckEvent::StorageUnavailable => "storage_unavailable",
            CheckEvent::ResponsesMissing { .. } => "responses_missing",
        }
    }
}

/// Receives every event the machine publishes, in order.
pub trait CheckObserver {
    fn notify(&mut self, event: &CheckEvent);
}

impl<F> CheckObserver for F
where
    F: FnMut(&CheckEvent),
{
    fn notify(&mut self, event: &CheckEvent) {
        self(event)
    }
}

/// Forwards events into an mpsc channel. A dropped receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: Sender<CheckEvent>,
}

impl ChannelObserver {
    pub fn new(tx: Sender<CheckEvent>) -> Self {
        Self { tx }
    }
}

impl CheckObserver for ChannelObserver {
    fn notify(&mut self, event: &CheckEvent) {
        let _ = self.tx.send(event.clone());
    }
}
