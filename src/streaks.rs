//! Win/loss streaks and career counts.
//!
//! Streaks are computed on the decisive results only: draws and no-contests are
//! removed from the input sequence, so they neither extend nor break a run.

use serde::{Deserialize, Serialize};

use crate::history::EntityHistory;
use crate::records::Outcome;

/// A boundary is flagged at the first observation and wherever the outcome
/// differs from the one before it.
pub fn run_boundaries(results: &[bool]) -> Vec<bool> {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| i == 0 || results[i - 1] != *r)
        .collect()
}

/// Monotonic run ids: the cumulative sum of boundary flags.
pub fn run_ids(boundaries: &[bool]) -> Vec<usize> {
    let mut run = 0usize;
    boundaries
        .iter()
        .map(|b| {
            if *b {
                run += 1;
            }
            run
        })
        .collect()
}

/// 1-indexed position of every observation inside its run.
pub fn run_lengths(results: &[bool]) -> Vec<u32> {
    let ids = run_ids(&run_boundaries(results));
    let mut out = Vec::with_capacity(ids.len());
    for (i, id) in ids.iter().enumerate() {
        let len = if i > 0 && ids[i - 1] == *id {
            out[i - 1] + 1
        } else {
            1
        };
        out.push(len);
    }
    out
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakState {
    pub win_streak: u32,
    pub loss_streak: u32,
}

/// Point-in-time streaks for every position of an outcome sequence, plus the
/// pending state after the final one (`outcomes.len() + 1` entries).
pub fn point_in_time_streaks(outcomes: &[Outcome]) -> Vec<StreakState> {
    let decisive = outcomes
        .iter()
        .filter_map(|o| o.decisive())
        .collect::<Vec<_>>();
    let lengths = run_lengths(&decisive);

    let mut out = Vec::with_capacity(outcomes.len() + 1);
    let mut state = StreakState::default();
    let mut decisive_idx = 0usize;
    for outcome in outcomes {
        out.push(state);
        if let Some(won) = outcome.decisive() {
            let len = lengths[decisive_idx];
            decisive_idx += 1;
            state = if won {
                StreakState {
                    win_streak: len,
                    loss_streak: 0,
                }
            } else {
                StreakState {
                    win_streak: 0,
                    loss_streak: len,
                }
            };
        }
    }
    out.push(state);
    out
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CareerFeatures {
    pub total_events_before: f64,
    pub wins_before: f64,
    pub losses_before: f64,
    pub win_streak: f64,
    pub loss_streak: f64,
}

impl CareerFeatures {
    pub const NAMES: [&'static str; 5] = [
        "total_events_before",
        "wins_before",
        "losses_before",
        "win_streak",
        "loss_streak",
    ];

    pub fn values(&self) -> [Option<f64>; 5] {
        [
            Some(self.total_events_before),
            Some(self.wins_before),
            Some(self.losses_before),
            Some(self.win_streak),
            Some(self.loss_streak),
        ]
    }
}

/// Career counts and streaks, `history.len() + 1` entries (last one pending).
pub fn career_features(history: &EntityHistory) -> Vec<CareerFeatures> {
    let outcomes = history.entries.iter().map(|p| p.outcome).collect::<Vec<_>>();
    let streaks = point_in_time_streaks(&outcomes);

    let mut wins = 0u32;
    let mut losses = 0u32;
    let mut out = Vec::with_capacity(outcomes.len() + 1);
    for (i, streak) in streaks.iter().enumerate() {
        out.push(CareerFeatures {
            total_events_before: i as f64,
            wins_before: wins as f64,
            losses_before: losses as f64,
            win_streak: streak.win_streak as f64,
            loss_streak: streak.loss_streak as f64,
        });
        match outcomes.get(i) {
            Some(Outcome::Win) => wins += 1,
            Some(Outcome::Loss) => losses += 1,
            _ => {}
        }
    }
    out
}
