use hpcheck_core::{Answer, Calibration, Trial};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Mutable record of one run: trial list, page cursor, responses and scores.
///
/// Scores and responses are indexed by trial position, never by stimulus id.
/// A score is only ever set together with its response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    page_num: usize,
    trials: Vec<Trial>,
    scores: Vec<Option<u8>>,
    responses: Vec<Option<Answer>>,
    last_page: usize,
    calibration: Option<Calibration>,
    total_correct: Option<u32>,
    did_pass: Option<bool>,
}

impl Session {
    pub fn new(trials: Vec<Trial>, trials_per_page: usize, calibration: Option<Calibration>) -> Self {
        let count = trials.len();
        Self {
            page_num: 0,
            scores: vec![None; count],
            responses: vec![None; count],
            last_page: count.div_ceil(trials_per_page.max(1)),
            trials,
            calibration,
            total_correct: None,
            did_pass: None,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn page_num(&self) -> usize {
        self.page_num
    }

    /// Number of pages, not the index of the final one.
    pub fn last_page(&self) -> usize {
        self.last_page
    }

    pub fn is_last_page(&self) -> bool {
        self.last_page > 0 && self.page_num == self.last_page - 1
    }

    pub fn trial_count(&self) -> usize {
        self.trials.len()
    }

    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    pub fn trial(&self, index: usize) -> Option<&Trial> {
        self.trials.get(index)
    }

    pub fn scores(&self) -> &[Option<u8>] {
        &self.scores
    }

    pub fn responses(&self) -> &[Option<Answer>] {
        &self.responses
    }

    pub fn score(&self, index: usize) -> Option<u8> {
        self.scores.get(index).copied().flatten()
    }

    pub fn response(&self, index: usize) -> Option<&Answer> {
        self.responses.get(index).and_then(Option::as_ref)
    }

    pub fn calibration(&self) -> Option<&Calibration> {
        self.calibration.as_ref()
    }

    pub fn total_correct(&self) -> Option<u32> {
        self.total_correct
    }

    pub fn did_pass(&self) -> Option<bool> {
        self.did_pass
    }

    pub fn is_finalized(&self) -> bool {
        self.did_pass.is_some()
    }

    /// Trial indices shown on `page`.
    pub fn page_range(&self, page: usize, trials_per_page: usize) -> Range<usize> {
        let start = (page * trials_per_page).min(self.trials.len());
        let end = (start + trials_per_page).min(self.trials.len());
        start..end
    }

    /// Checks a deserialized session against the current page size. Scores
    /// must be 0 or 1 and may only sit next to a response.
    pub fn is_consistent(&self, trials_per_page: usize) -> bool {
        let count = self.trials.len();
        count > 0
            && self.scores.len() == count
            && self.responses.len() == count
            && self.last_page == count.div_ceil(trials_per_page.max(1))
            && self.page_num < self.last_page
            && self
                .trials
                .iter()
                .enumerate()
                .all(|(i, t)| t.index() == i)
            && self
                .scores
                .iter()
                .zip(&self.responses)
                .all(|(s, r)| match s {
                    Some(score) => *score <= 1 && r.is_some(),
                    None => true,
                })
    }

    pub(crate) fn set_response(&mut self, index: usize, response: Answer) -> bool {
        match self.responses.get_mut(index) {
            Some(slot) => {
                *slot = Some(response);
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_score(&mut self, index: usize, response: Answer, score: u8) -> bool {
        if index >= self.trials.len() {
            return false;
        }
        self.responses[index] = Some(response);
        self.scores[index] = Some(score);
        true
    }

    pub(crate) fn advance_page(&mut self) {
        if self.page_num + 1 < self.last_page {
            self.page_num += 1;
        }
    }

    pub(crate) fn finalize(&mut self, total_correct: u32, did_pass: bool) {
        self.total_correct = Some(total_correct);
        self.did_pass = Some(did_pass);
    }
}
