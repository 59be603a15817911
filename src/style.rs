//! Career style ratios and finish-method rates.
//!
//! All inputs are shifted cumulative sums over the entity's prior events, so
//! every ratio is pooled (sum over sum) and null when its denominator is zero.

use serde::{Deserialize, Serialize};

use crate::history::EntityHistory;
use crate::opponent_quality::OpponentIndex;
use crate::records::{FinishMethod, Observations, Outcome};
use crate::temporal::{expanding_mean, expanding_sum, safe_div};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleFeatures {
    pub striking_ratio: Option<f64>,
    pub grappling_ratio: Option<f64>,
    pub aggression_score: Option<f64>,
    pub defense_score: Option<f64>,
    pub ko_rate: Option<f64>,
    pub sub_rate: Option<f64>,
    pub decision_rate: Option<f64>,
    pub ko_win_share: Option<f64>,
    pub sub_win_share: Option<f64>,
    pub decision_win_share: Option<f64>,
    pub finish_rate: Option<f64>,
}

impl StyleFeatures {
    pub const NAMES: [&'static str; 11] = [
        "striking_ratio",
        "grappling_ratio",
        "aggression_score",
        "defense_score",
        "ko_rate",
        "sub_rate",
        "decision_rate",
        "ko_win_share",
        "sub_win_share",
        "decision_win_share",
        "finish_rate",
    ];

    pub fn values(&self) -> [Option<f64>; 11] {
        [
            self.striking_ratio,
            self.grappling_ratio,
            self.aggression_score,
            self.defense_score,
            self.ko_rate,
            self.sub_rate,
            self.decision_rate,
            self.ko_win_share,
            self.sub_win_share,
            self.decision_win_share,
            self.finish_rate,
        ]
    }
}

fn indicator(history: &EntityHistory, hit: impl Fn(Outcome, FinishMethod) -> bool) -> Vec<Option<f64>> {
    history
        .entries
        .iter()
        .map(|p| Some(if hit(p.outcome, p.finish_method) { 1.0 } else { 0.0 }))
        .collect()
}

fn observed(history: &EntityHistory, pick: impl Fn(&Observations) -> f64) -> Vec<Option<f64>> {
    history
        .entries
        .iter()
        .map(|p| p.observations.as_ref().map(&pick))
        .collect()
}

/// Style features for every position of `history` plus the pending state.
///
/// `opponent_accuracy` maps (entity_id, event_id) to the strike accuracy that
/// entity achieved; it is read from the opponent's side of each event to build
/// `defense_score`.
pub fn style_features(
    history: &EntityHistory,
    opponent_accuracy: &OpponentIndex<Option<f64>>,
) -> Vec<StyleFeatures> {
    let n = history.len();

    let sig_landed = expanding_sum(&observed(history, |o| o.sig_str_landed));
    let total_landed = expanding_sum(&observed(history, |o| o.total_str_landed));
    let td_landed = expanding_sum(&observed(history, |o| o.td_landed));
    // Pace only counts events with both observations and a known duration.
    let (paced_attempts, paced_minutes): (Vec<_>, Vec<_>) = history
        .entries
        .iter()
        .map(|p| match (&p.observations, p.duration_seconds) {
            (Some(o), Some(seconds)) => (Some(o.sig_str_attempted), Some(seconds / 60.0)),
            _ => (None, None),
        })
        .unzip();
    let paced_attempts = expanding_sum(&paced_attempts);
    let minutes = expanding_sum(&paced_minutes);

    let against = opponent_accuracy
        .propagate(history)
        .into_iter()
        .map(Option::flatten)
        .collect::<Vec<_>>();
    let mean_against = expanding_mean(&against);

    let wins = expanding_sum(&indicator(history, |o, _| o == Outcome::Win));
    let ko_wins = expanding_sum(&indicator(history, |o, m| {
        o == Outcome::Win && m == FinishMethod::StrikeFinish
    }));
    let sub_wins = expanding_sum(&indicator(history, |o, m| {
        o == Outcome::Win && m == FinishMethod::Submission
    }));
    let dec_wins = expanding_sum(&indicator(history, |o, m| {
        o == Outcome::Win && m == FinishMethod::Decision
    }));

    (0..=n)
        .map(|i| {
            let events = Some(i as f64);
            StyleFeatures {
                striking_ratio: safe_div(Some(sig_landed[i]), Some(total_landed[i])),
                grappling_ratio: safe_div(
                    Some(td_landed[i]),
                    Some(td_landed[i] + sig_landed[i]),
                ),
                aggression_score: safe_div(Some(paced_attempts[i]), Some(minutes[i])),
                defense_score: mean_against[i].map(|acc| 1.0 - acc),
                ko_rate: safe_div(Some(ko_wins[i]), events),
                sub_rate: safe_div(Some(sub_wins[i]), events),
                decision_rate: safe_div(Some(dec_wins[i]), events),
                ko_win_share: safe_div(Some(ko_wins[i]), Some(wins[i])),
                sub_win_share: safe_div(Some(sub_wins[i]), Some(wins[i])),
                decision_win_share: safe_div(Some(dec_wins[i]), Some(wins[i])),
                finish_rate: safe_div(Some(ko_wins[i] + sub_wins[i]), Some(wins[i])),
            }
        })
        .collect()
}
