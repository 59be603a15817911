//! Opponent quality and strength of schedule.
//!
//! Each entity's point-in-time record is propagated onto its opponent's row by
//! joining on (opponent_id, event_id); the propagated sequence is then
//! aggregated per entity like any other observation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::history::EntityHistory;
use crate::records::RowKey;
use crate::streaks::CareerFeatures;
use crate::temporal::{expanding_mean, expanding_sum, safe_div};

/// Point-in-time record of one entity going into one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PointInTimeRecord {
    pub win_pct: f64,
    pub losses: f64,
}

impl PointInTimeRecord {
    /// An entity with no prior events counts as a 0% opponent with no losses.
    pub fn from_career(career: &CareerFeatures) -> Self {
        Self {
            win_pct: safe_div(Some(career.wins_before), Some(career.total_events_before))
                .unwrap_or(0.0),
            losses: career.losses_before,
        }
    }
}

/// Read-only join from (entity_id, event_id) to a per-event value.
#[derive(Debug, Clone)]
pub struct OpponentIndex<T> {
    by_key: HashMap<RowKey, T>,
}

impl<T: Clone> OpponentIndex<T> {
    pub fn new(by_key: HashMap<RowKey, T>) -> Self {
        Self { by_key }
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// For every event in `history`, the value recorded for the opponent in
    /// that same event, if the opponent's side is present.
    pub fn propagate(&self, history: &EntityHistory) -> Vec<Option<T>> {
        let out = history
            .entries
            .iter()
            .map(|p| self.by_key.get(&p.opponent_key()).cloned())
            .collect::<Vec<_>>();
        let missing = out.iter().filter(|v| v.is_none()).count();
        if missing > 0 {
            debug!(
                entity = %history.entity_id,
                missing,
                "opponent rows missing from join"
            );
        }
        out
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OpponentQuality {
    pub avg_opponent_win_pct: Option<f64>,
    pub strength_of_schedule: f64,
    pub avg_opponent_losses: Option<f64>,
}

impl OpponentQuality {
    pub const NAMES: [&'static str; 3] = [
        "avg_opponent_win_pct",
        "strength_of_schedule",
        "avg_opponent_losses",
    ];

    pub fn values(&self) -> [Option<f64>; 3] {
        [
            self.avg_opponent_win_pct,
            Some(self.strength_of_schedule),
            self.avg_opponent_losses,
        ]
    }
}

/// Opponent quality for every position of `history`, plus the pending state.
pub fn opponent_quality(
    history: &EntityHistory,
    records: &OpponentIndex<PointInTimeRecord>,
) -> Vec<OpponentQuality> {
    let propagated = records.propagate(history);
    let win_pcts = propagated
        .iter()
        .map(|r| r.map(|r| r.win_pct))
        .collect::<Vec<_>>();
    let losses = propagated
        .iter()
        .map(|r| r.map(|r| r.losses))
        .collect::<Vec<_>>();

    let avg_win_pct = expanding_mean(&win_pcts);
    let schedule = expanding_sum(&win_pcts);
    let avg_losses = expanding_mean(&losses);

    avg_win_pct
        .into_iter()
        .zip(schedule)
        .zip(avg_losses)
        .map(|((avg_opponent_win_pct, strength_of_schedule), avg_opponent_losses)| {
            OpponentQuality {
                avg_opponent_win_pct,
                strength_of_schedule,
                avg_opponent_losses,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debut_opponent_counts_as_zero_percent() {
        let rec = PointInTimeRecord::from_career(&CareerFeatures::default());
        assert_eq!(rec.win_pct, 0.0);
        assert_eq!(rec.losses, 0.0);
    }

    #[test]
    fn win_pct_uses_all_prior_events() {
        let rec = PointInTimeRecord::from_career(&CareerFeatures {
            total_events_before: 4.0,
            wins_before: 3.0,
            losses_before: 1.0,
            win_streak: 2.0,
            loss_streak: 0.0,
        });
        assert_eq!(rec.win_pct, 0.75);
        assert_eq!(rec.losses, 1.0);
    }
}
