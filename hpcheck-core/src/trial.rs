use crate::answer::StimulusId;
use crate::stimulus::Stimulus;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a trial: its position in the run plus the stimulus it plays.
///
/// The same stimulus may appear several times when sampling with
/// replacement; the sequence index keeps those trials apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrialId {
    pub index: usize,
    pub stimulus_id: StimulusId,
}

impl fmt::Display for TrialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trial{}-src{}", self.index, self.stimulus_id)
    }
}

/// A stimulus scheduled at a fixed position of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub id: TrialId,
    pub stimulus: Stimulus,
}

impl Trial {
    pub fn new(index: usize, stimulus: Stimulus) -> Self {
        Self {
            id: TrialId {
                index,
                stimulus_id: stimulus.id.clone(),
            },
            stimulus,
        }
    }

    pub fn index(&self) -> usize {
        self.id.index
    }

    pub fn src(&self) -> &str {
        &self.stimulus.src
    }
}
