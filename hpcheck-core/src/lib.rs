pub mod answer;
pub mod phase;
pub mod stimulus;
pub mod trial;

pub use answer::{Answer, StimulusId};
pub use phase::CheckPhase;
pub use stimulus::{Calibration, Stimulus, StimulusPool};
pub use trial::{Trial, TrialId};
