use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CACHE_KEY: &str = "headphoneCheckCache";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("totalTrials must be positive, got {0}")]
    NonPositiveTotalTrials(i64),

    #[error("trialsPerPage must be positive, got {0}")]
    NonPositiveTrialsPerPage(i64),

    #[error("totalTrials ({total_trials}) cannot be less than trialsPerPage ({trials_per_page})")]
    PageLargerThanRun {
        total_trials: usize,
        trials_per_page: usize,
    },

    #[error("correctThreshold must be a finite, non-negative number, got {0}")]
    InvalidThreshold(f64),

    #[error("correctThreshold ({threshold}) cannot be greater than totalTrials ({total_trials})")]
    ThresholdAboveTotal { threshold: f64, total_trials: usize },

    #[error("correctThreshold is a fraction in fraction mode and cannot exceed 1, got {0}")]
    FractionAboveOne(f64),

    #[error("cacheKey cannot be empty")]
    EmptyCacheKey,

    #[error("failed to parse configuration overrides: {0}")]
    Parse(#[from] serde_json::Error),
}

/// How `correctThreshold` is read when deciding pass/fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ThresholdMode {
    /// Pass iff `total_correct >= threshold`.
    #[default]
    AbsoluteCount,
    /// Pass iff `total_correct / trial_count >= threshold`.
    Fraction,
}

impl ThresholdMode {
    pub fn default_threshold(self) -> f64 {
        match self {
            ThresholdMode::AbsoluteCount => 4.0,
            ThresholdMode::Fraction => 2.0 / 3.0,
        }
    }
}

/// Partial configuration as supplied by a host. Absent fields fall back to
/// the defaults; unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_trials: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trials_per_page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold_mode: Option<ThresholdMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_sequential: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub do_shuffle_trials: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_with_replacement: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub do_calibration: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_cache: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_playback: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
}

impl ConfigOverrides {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Fields set in `other` win over fields set in `self`.
    pub fn merged_with(self, other: ConfigOverrides) -> Self {
        Self {
            total_trials: other.total_trials.or(self.total_trials),
            trials_per_page: other.trials_per_page.or(self.trials_per_page),
            correct_threshold: other.correct_threshold.or(self.correct_threshold),
            threshold_mode: other.threshold_mode.or(self.threshold_mode),
            use_sequential: other.use_sequential.or(self.use_sequential),
            do_shuffle_trials: other.do_shuffle_trials.or(self.do_shuffle_trials),
            sample_with_replacement: other
                .sample_with_replacement
                .or(self.sample_with_replacement),
            do_calibration: other.do_calibration.or(self.do_calibration),
            use_cache: other.use_cache.or(self.use_cache),
            require_playback: other.require_playback.or(self.require_playback),
            cache_key: other.cache_key.or(self.cache_key),
        }
    }
}

/// Validated, immutable configuration of one headphone check.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckConfig {
    total_trials: usize,
    trials_per_page: usize,
    correct_threshold: f64,
    threshold_mode: ThresholdMode,
    use_sequential: bool,
    do_shuffle_trials: bool,
    sample_with_replacement: bool,
    do_calibration: bool,
    use_cache: bool,
    require_playback: bool,
    cache_key: String,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            total_trials: 6,
            trials_per_page: 3,
            correct_threshold: ThresholdMode::AbsoluteCount.default_threshold(),
            threshold_mode: ThresholdMode::AbsoluteCount,
            use_sequential: true,
            do_shuffle_trials: true,
            sample_with_replacement: false,
            do_calibration: true,
            use_cache: false,
            require_playback: true,
            cache_key: DEFAULT_CACHE_KEY.to_string(),
        }
    }
}

impl CheckConfig {
    /// Applies `overrides` onto the defaults and validates the result.
    pub fn resolve(overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let total_trials = overrides.total_trials.unwrap_or(defaults.total_trials as i64);
        if total_trials <= 0 {
            return Err(ConfigError::NonPositiveTotalTrials(total_trials));
        }
        let trials_per_page = overrides
            .trials_per_page
            .unwrap_or(defaults.trials_per_page as i64);
        if trials_per_page <= 0 {
            return Err(ConfigError::NonPositiveTrialsPerPage(trials_per_page));
        }
        let total_trials = total_trials as usize;
        let trials_per_page = trials_per_page as usize;
        if total_trials < trials_per_page {
            return Err(ConfigError::PageLargerThanRun {
                total_trials,
                trials_per_page,
            });
        }

        let threshold_mode = overrides.threshold_mode.unwrap_or(defaults.threshold_mode);
        let correct_threshold = overrides
            .correct_threshold
            .unwrap_or_else(|| threshold_mode.default_threshold());
        if !correct_threshold.is_finite() || correct_threshold < 0.0 {
            return Err(ConfigError::InvalidThreshold(correct_threshold));
        }
        match threshold_mode {
            ThresholdMode::AbsoluteCount if correct_threshold > total_trials as f64 => {
                return Err(ConfigError::ThresholdAboveTotal {
                    threshold: correct_threshold,
                    total_trials,
                });
            }
            ThresholdMode::Fraction if correct_threshold > 1.0 => {
                return Err(ConfigError::FractionAboveOne(correct_threshold));
            }
            _ => {}
        }

        let cache_key = overrides
            .cache_key
            .clone()
            .unwrap_or(defaults.cache_key);
        if cache_key.is_empty() {
            return Err(ConfigError::EmptyCacheKey);
        }

        Ok(Self {
            total_trials,
            trials_per_page,
            correct_threshold,
            threshold_mode,
            use_sequential: overrides.use_sequential.unwrap_or(defaults.use_sequential),
            do_shuffle_trials: overrides
                .do_shuffle_trials
                .unwrap_or(defaults.do_shuffle_trials),
            sample_with_replacement: overrides
                .sample_with_replacement
                .unwrap_or(defaults.sample_with_replacement),
            do_calibration: overrides.do_calibration.unwrap_or(defaults.do_calibration),
            use_cache: overrides.use_cache.unwrap_or(defaults.use_cache),
            require_playback: overrides
                .require_playback
                .unwrap_or(defaults.require_playback),
            cache_key,
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Self::resolve(&ConfigOverrides::from_json_str(json)?)
    }

    pub fn total_trials(&self) -> usize {
        self.total_trials
    }

    pub fn trials_per_page(&self) -> usize {
        self.trials_per_page
    }

    pub fn correct_threshold(&self) -> f64 {
        self.correct_threshold
    }

    pub fn threshold_mode(&self) -> ThresholdMode {
        self.threshold_mode
    }

    pub fn use_sequential(&self) -> bool {
        self.use_sequential
    }

    pub fn do_shuffle_trials(&self) -> bool {
        self.do_shuffle_trials
    }

    pub fn sample_with_replacement(&self) -> bool {
        self.sample_with_replacement
    }

    pub fn do_calibration(&self) -> bool {
        self.do_calibration
    }

    pub fn use_cache(&self) -> bool {
        self.use_cache
    }

    pub fn require_playback(&self) -> bool {
        self.require_playback
    }

    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }
}
