use crate::cli::RunArgs;
use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized};
use figment::value::{Uncased, UncasedStr};
use hpcheck_experiment::{CheckConfig, ConfigOverrides};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything the terminal host needs, layered from defaults, an optional
/// JSON settings file, `HPCHECK_*` environment variables, then CLI flags.
///
/// The `check` table uses the engine's camelCase keys:
///
/// ```json
/// { "stimuli": "pool.json", "check": { "totalTrials": 6, "useCache": true } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub stimuli: Option<PathBuf>,
    pub log_level: String,
    pub cache_dir: Option<PathBuf>,
    pub player: Option<String>,
    pub seed: Option<u64>,
    pub check: ConfigOverrides,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            stimuli: None,
            log_level: "info".to_string(),
            cache_dir: None,
            player: None,
            seed: None,
            check: ConfigOverrides::default(),
        }
    }
}

impl AppSettings {
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        Self::figment(config_path)
            .extract()
            .context("failed to extract settings")
    }

    fn figment(config_path: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(AppSettings::default()));
        if let Some(path) = config_path {
            figment = figment.merge(Json::file(path));
        }
        // `map` resets lowercasing, so it is switched off afterwards
        figment.merge(Env::prefixed("HPCHECK_").map(env_key).lowercase(false))
    }

    /// Flags given on the command line win over every other layer.
    pub fn apply_args(mut self, args: &RunArgs) -> Self {
        if let Some(stimuli) = &args.stimuli {
            self.stimuli = Some(stimuli.clone());
        }
        if let Some(dir) = &args.cache_dir {
            self.cache_dir = Some(dir.clone());
        }
        if let Some(player) = &args.player {
            self.player = Some(player.clone());
        }
        if args.seed.is_some() {
            self.seed = args.seed;
        }

        let from_flags = ConfigOverrides {
            total_trials: args.total_trials,
            trials_per_page: args.trials_per_page,
            correct_threshold: args.correct_threshold,
            do_calibration: args.no_calibration.then_some(false),
            use_cache: args.cache_dir.is_some().then_some(true),
            ..ConfigOverrides::default()
        };
        self.check = self.check.merged_with(from_flags);
        self
    }

    pub fn check_config(&self) -> Result<CheckConfig> {
        CheckConfig::resolve(&self.check).context("invalid check configuration")
    }
}

/// Keys of the `check` table, which keep the engine's camelCase.
const CHECK_FIELDS: &[&str] = &[
    "totalTrials",
    "trialsPerPage",
    "correctThreshold",
    "thresholdMode",
    "useSequential",
    "doShuffleTrials",
    "sampleWithReplacement",
    "doCalibration",
    "useCache",
    "requirePlayback",
    "cacheKey",
];

/// `CACHE_DIR` becomes `cache_dir`, `CHECK__TOTAL_TRIALS` and
/// `CHECK__TOTALTRIALS` both become `check.totalTrials`.
fn env_key(key: &UncasedStr) -> Uncased<'_> {
    let lower = key.as_str().to_ascii_lowercase();
    match lower.split_once("__") {
        Some(("check", field)) => format!("check.{}", check_field(field)).into(),
        _ => lower.replace("__", ".").into(),
    }
}

fn check_field(field: &str) -> String {
    let squashed: String = field.chars().filter(|c| *c != '_').collect();
    CHECK_FIELDS
        .iter()
        .find(|name| name.eq_ignore_ascii_case(&squashed))
        .map_or(squashed, |name| name.to_string())
}
