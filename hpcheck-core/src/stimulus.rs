use crate::answer::{Answer, StimulusId};
use serde::{Deserialize, Serialize};

/// One playable stimulus group from the pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stimulus {
    pub id: StimulusId,
    pub src: String,
    #[serde(rename = "correct")]
    pub correct_answer: Answer,
}

impl Stimulus {
    pub fn new(id: impl Into<StimulusId>, src: impl Into<String>, correct: impl Into<Answer>) -> Self {
        Self {
            id: id.into(),
            src: src.into(),
            correct_answer: correct.into(),
        }
    }
}

/// Volume-leveling sound played before the scored trials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calibration {
    pub src: String,
}

/// Raw pool as delivered by a stimulus source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StimulusPool {
    pub stimuli: Vec<Stimulus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration: Option<Calibration>,
}

impl StimulusPool {
    pub fn new(stimuli: Vec<Stimulus>, calibration: Option<Calibration>) -> Self {
        Self {
            stimuli,
            calibration,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn len(&self) -> usize {
        self.stimuli.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stimuli.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POOL: &str = r#"{
        "stimuli": [
            {"id": 1, "src": "antiphase_HC_ISO.wav", "correct": "2"},
            {"id": "b", "src": "antiphase_HC_IOS.wav", "correct": 3}
        ],
        "calibration": {"src": "noise_calib_stim.wav"}
    }"#;

    #[test]
    fn parses_pool_schema() {
        let pool = StimulusPool::from_json_str(POOL).unwrap();
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.stimuli[0].id.as_str(), "1");
        assert_eq!(pool.stimuli[1].correct_answer, Answer::Number(3.0));
        assert_eq!(pool.stimuli[0].correct_answer, Answer::from("2"));
        assert_eq!(
            pool.calibration,
            Some(Calibration {
                src: "noise_calib_stim.wav".into()
            })
        );
    }

    #[test]
    fn calibration_is_optional() {
        let pool = StimulusPool::from_json_str(r#"{"stimuli": []}"#).unwrap();
        assert!(pool.is_empty());
        assert!(pool.calibration.is_none());
    }

    #[test]
    fn missing_stimuli_is_malformed() {
        assert!(StimulusPool::from_json_str(r#"{"calibration": {"src": "x"}}"#).is_err());
    }
}
