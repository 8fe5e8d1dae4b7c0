//! Per-trial grading and pass/fail aggregation.

use crate::config::{CheckConfig, ThresholdMode};
use crate::session::Session;
use hpcheck_core::{Answer, Stimulus};
use tracing::trace;

/// Grades `response` against the stimulus and records both in `session`.
///
/// A missing response leaves the session untouched and returns `None`, so
/// an unanswered trial stays distinguishable from a wrong one.
pub fn score_trial(
    session: &mut Session,
    trial_index: usize,
    stimulus: &Stimulus,
    response: Option<&Answer>,
) -> Option<u8> {
    let response = response?;
    let score = u8::from(response.loosely_eq(&stimulus.correct_answer));
    if !session.set_score(trial_index, response.clone(), score) {
        return None;
    }
    trace!(trial = trial_index, %response, score, "scored trial");
    Some(score)
}

/// Sum of all recorded scores; unscored trials count as zero.
pub fn total_correct(scores: &[Option<u8>]) -> u32 {
    scores.iter().map(|s| u32::from(s.unwrap_or(0))).sum()
}

pub fn check_pass_fail(total_correct: u32, config: &CheckConfig, trial_count: usize) -> bool {
    let threshold = config.correct_threshold();
    match config.threshold_mode() {
        ThresholdMode::AbsoluteCount => f64::from(total_correct) >= threshold,
        ThresholdMode::Fraction => {
            trial_count > 0 && f64::from(total_correct) / trial_count as f64 >= threshold
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigOverrides;
    use hpcheck_core::Trial;

    fn session_with(stimulus: &Stimulus, n: usize) -> Session {
        let trials = (0..n).map(|i| Trial::new(i, stimulus.clone())).collect();
        Session::new(trials, 3, None)
    }

    fn config(json: &str) -> CheckConfig {
        CheckConfig::resolve(&ConfigOverrides::from_json_str(json).unwrap()).unwrap()
    }

    #[test]
    fn matching_response_scores_one() {
        let stimulus = Stimulus::new("a", "a.wav", "2");
        let mut session = session_with(&stimulus, 3);

        assert_eq!(score_trial(&mut session, 0, &stimulus, Some(&Answer::from("2"))), Some(1));
        assert_eq!(score_trial(&mut session, 1, &stimulus, Some(&Answer::from("1"))), Some(0));
        assert_eq!(score_trial(&mut session, 2, &stimulus, None), None);

        assert_eq!(session.score(0), Some(1));
        assert_eq!(session.score(1), Some(0));
        assert_eq!(session.score(2), None);
        assert_eq!(session.response(1), Some(&Answer::from("1")));
        assert!(session.response(2).is_none());
    }

    #[test]
    fn numeric_answer_matches_string_response() {
        let stimulus = Stimulus::new(1, "a.wav", 3);
        let mut session = session_with(&stimulus, 1);
        assert_eq!(score_trial(&mut session, 0, &stimulus, Some(&Answer::from("3"))), Some(1));
    }

    #[test]
    fn out_of_range_trial_is_ignored() {
        let stimulus = Stimulus::new("a", "a.wav", "2");
        let mut session = session_with(&stimulus, 1);
        assert_eq!(score_trial(&mut session, 5, &stimulus, Some(&Answer::from("2"))), None);
    }

    #[test]
    fn unset_scores_count_as_zero() {
        assert_eq!(total_correct(&[Some(1), None, Some(0), Some(1)]), 2);
        assert_eq!(total_correct(&[]), 0);
    }

    #[test]
    fn absolute_mode_compares_counts() {
        let config = config(r#"{"totalTrials": 6, "correctThreshold": 4}"#);
        assert!(check_pass_fail(4, &config, 6));
        assert!(!check_pass_fail(3, &config, 6));
    }

    #[test]
    fn fraction_mode_compares_proportions() {
        let config = config(&format!(
            r#"{{"totalTrials": 6, "thresholdMode": "fraction", "correctThreshold": {}}}"#,
            5.0 / 6.0
        ));
        assert!(check_pass_fail(5, &config, 6));
        assert!(!check_pass_fail(4, &config, 6));
        assert!(!check_pass_fail(0, &config, 0));
    }

    #[test]
    fn fraction_threshold_is_not_read_as_a_count() {
        // 0.5 as an absolute count passes with a single correct trial.
        let absolute = config(r#"{"correctThreshold": 0.5}"#);
        let fraction = config(r#"{"correctThreshold": 0.5, "thresholdMode": "fraction"}"#);
        assert!(check_pass_fail(1, &absolute, 6));
        assert!(!check_pass_fail(1, &fraction, 6));
    }
}
