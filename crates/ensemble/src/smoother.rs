//! Majority-vote temporal smoothing over recent predictions

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::config::SmoothingConfig;

const PREALLOCATED: usize = 16;

/// Smoother state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SmootherState {
    /// Fewer than `warmup` observations; raw labels pass through
    WarmingUp,
    /// Majority vote over the history
    Steady,
}

/// Output of one smoothing step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Smoothed {
    pub label_index: usize,
    pub confidence: f32,
    /// Whether the majority vote was applied
    pub smoothed: bool,
}

/// Bounded label history with majority-vote smoothing
///
/// Confidence in the steady state is the vote share of the winning label,
/// not a model probability.
#[derive(Debug, Clone)]
pub struct TemporalSmoother {
    history: VecDeque<usize>,
    capacity: usize,
    warmup: usize,
}

impl TemporalSmoother {
    /// Create a smoother with an empty history
    ///
    /// The buffer grows on demand up to `config.capacity`.
    pub fn new(config: SmoothingConfig) -> Self {
        Self {
            history: VecDeque::with_capacity(config.capacity.min(PREALLOCATED)),
            capacity: config.capacity.max(1),
            warmup: config.warmup.max(1),
        }
    }

    /// Record a fused label and return the smoothed one
    pub fn observe(&mut self, label_index: usize, confidence: f32) -> Smoothed {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(label_index);

        if self.history.len() < self.warmup {
            return Smoothed {
                label_index,
                confidence,
                smoothed: false,
            };
        }

        // History is non-empty here
        let (winner, count) = self.majority(None).unwrap_or((label_index, 1));
        Smoothed {
            label_index: winner,
            confidence: count as f32 / self.history.len() as f32,
            smoothed: true,
        }
    }

    /// Most frequent label over the last `window` entries, or the whole
    /// history when `window` is `None` or zero
    ///
    /// Ties go to the label seen most recently.
    pub fn dominant(&self, window: Option<usize>) -> Option<usize> {
        self.majority(window).map(|(label, _)| label)
    }

    fn majority(&self, window: Option<usize>) -> Option<(usize, usize)> {
        let take = match window {
            Some(n) if n > 0 => n.min(self.history.len()),
            _ => self.history.len(),
        };
        let recent = self.history.iter().rev().take(take);

        let mut counts: HashMap<usize, usize> = HashMap::new();
        for &label in recent.clone() {
            *counts.entry(label).or_insert(0) += 1;
        }
        let max = counts.values().copied().max()?;

        // Newest first, so the first label reaching `max` is the most recent
        recent
            .copied()
            .find(|label| counts.get(label) == Some(&max))
            .map(|label| (label, max))
    }

    /// Percentage of the history held by each label; empty when the
    /// history is empty
    pub fn distribution(&self) -> HashMap<usize, f32> {
        let mut counts: HashMap<usize, usize> = HashMap::new();
        for &label in &self.history {
            *counts.entry(label).or_insert(0) += 1;
        }
        let total = self.history.len() as f32;
        counts
            .into_iter()
            .map(|(label, count)| (label, count as f32 / total * 100.0))
            .collect()
    }

    /// Label indices, oldest first
    pub fn history(&self) -> impl Iterator<Item = usize> + '_ {
        self.history.iter().copied()
    }

    /// Entries in the history
    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Maximum history length
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the warm-up is over
    pub fn state(&self) -> SmootherState {
        if self.history.len() < self.warmup {
            SmootherState::WarmingUp
        } else {
            SmootherState::Steady
        }
    }

    /// Clear the history
    pub fn reset(&mut self) {
        self.history.clear();
    }
}

impl Default for TemporalSmoother {
    fn default() -> Self {
        Self::new(SmoothingConfig::default())
    }
}
