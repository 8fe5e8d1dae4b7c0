//! Turns a stimulus pool into the ordered trial list of one run.

use crate::config::CheckConfig;
use hpcheck_core::{Stimulus, Trial};
use rand::Rng;
use rand::seq::SliceRandom;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SampleError {
    #[error("cannot sample from an empty stimulus pool")]
    EmptyPool,
}

/// Non-fatal adjustment made while sampling without replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleWarning {
    /// Zero samples requested; the whole pool is used.
    NothingRequested { available: usize },
    /// More samples requested than the pool holds; the whole pool is used.
    NotEnoughStimuli { requested: usize, available: usize },
}

/// Items drawn plus the warning raised while drawing them, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Sampled<T> {
    pub items: Vec<T>,
    pub warning: Option<SampleWarning>,
}

/// Clamps a without-replacement request to the pool size.
pub fn clamp_count(requested: usize, available: usize) -> (usize, Option<SampleWarning>) {
    if requested == 0 {
        (available, Some(SampleWarning::NothingRequested { available }))
    } else if requested > available {
        (
            available,
            Some(SampleWarning::NotEnoughStimuli {
                requested,
                available,
            }),
        )
    } else {
        (requested, None)
    }
}

/// `n` independent uniform draws from `pool`; repeats are expected.
/// An empty pool yields nothing.
pub fn sample_with_replacement<T, R>(pool: &[T], n: usize, rng: &mut R) -> Vec<T>
where
    T: Clone,
    R: Rng + ?Sized,
{
    if pool.is_empty() {
        return Vec::new();
    }
    (0..n)
        .map(|_| pool[rng.random_range(0..pool.len())].clone())
        .collect()
}

/// Shuffles a private copy of `pool` and keeps the first `k` elements.
pub fn shuffle_sample<T, R>(pool: &[T], k: usize, rng: &mut R) -> Sampled<T>
where
    T: Clone,
    R: Rng + ?Sized,
{
    let (k, warning) = clamp_count(k, pool.len());
    let mut items = pool.to_vec();
    items.shuffle(rng);
    items.truncate(k);
    Sampled { items, warning }
}

/// First `k` elements of `pool` in their original order.
pub fn take_in_order<T: Clone>(pool: &[T], k: usize) -> Sampled<T> {
    let (k, warning) = clamp_count(k, pool.len());
    Sampled {
        items: pool[..k].to_vec(),
        warning,
    }
}

/// Builds the run's trial list according to the sampling options.
pub fn draw_trials<R>(
    pool: &[Stimulus],
    config: &CheckConfig,
    rng: &mut R,
) -> Result<Vec<Trial>, SampleError>
where
    R: Rng + ?Sized,
{
    if pool.is_empty() {
        return Err(SampleError::EmptyPool);
    }
    let requested = config.total_trials();

    let sampled = if !config.do_shuffle_trials() {
        if config.sample_with_replacement() {
            debug!("sampleWithReplacement ignored while doShuffleTrials is off");
        }
        take_in_order(pool, requested)
    } else if config.sample_with_replacement() {
        Sampled {
            items: sample_with_replacement(pool, requested, rng),
            warning: None,
        }
    } else {
        shuffle_sample(pool, requested, rng)
    };

    if let Some(warning) = sampled.warning {
        warn!(?warning, "trial count clamped to pool size");
    }

    Ok(sampled
        .items
        .into_iter()
        .enumerate()
        .map(|(index, stimulus)| Trial::new(index, stimulus))
        .collect())
}
