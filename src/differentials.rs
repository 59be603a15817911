//! Pairwise "A minus B" assembly.
//!
//! Bulk mode joins both sides' single-entity rows onto every decisive matchup;
//! point queries reuse [`pairwise_values`] on pending rows.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dataset::FeedSnapshot;
use crate::entity_frame::{EntityFeatureRow, EntityFeatureSet};
use crate::error::{FeatureError, Result};
use crate::history::EntityHistories;
use crate::logging::SPARSITY_TARGET;
use crate::records::{Entity, EntityId, EventId, Matchup};

/// Physical and experience differentials, computed from static attributes
/// and career counts rather than from the per-entity aggregate columns.
///
/// Age enters only as `diff_age_at_event_days`.
pub const PHYSICAL_FEATURES: [&str; 6] = [
    "height_diff_inches",
    "weight_diff_lbs",
    "reach_diff_inches",
    "experience_diff",
    "win_streak_diff",
    "loss_streak_diff",
];

pub const CONTEXT_FEATURES: [&str; 1] = ["is_title_event"];

pub const CATEGORICAL_FEATURES: [&str; 1] = ["category"];

pub const DIFF_PREFIX: &str = "diff_";

/// Ordered numeric column names of the pairwise frame.
pub fn pairwise_feature_names() -> Vec<String> {
    PHYSICAL_FEATURES
        .iter()
        .chain(CONTEXT_FEATURES.iter())
        .map(|s| s.to_string())
        .chain(EntityFeatureRow::differential_names().map(|n| format!("{DIFF_PREFIX}{n}")))
        .collect()
}

pub fn categorical_feature_names() -> Vec<String> {
    CATEGORICAL_FEATURES.iter().map(|s| s.to_string()).collect()
}

fn diff(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some(a? - b?)
}

/// One side of a pairing: static attributes plus that entity's feature row.
#[derive(Debug, Clone, Copy)]
pub struct PairSide<'a> {
    pub entity: Option<&'a Entity>,
    pub row: &'a EntityFeatureRow,
}

fn attr(side: PairSide<'_>, pick: fn(&Entity) -> Option<f64>) -> Option<f64> {
    side.entity.and_then(pick)
}

/// Numeric pairwise values in [`pairwise_feature_names`] order.
pub fn pairwise_values(a: PairSide<'_>, b: PairSide<'_>, is_title: bool) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(PHYSICAL_FEATURES.len() + 1 + 32);
    out.push(diff(attr(a, |e| e.height_inches), attr(b, |e| e.height_inches)));
    out.push(diff(attr(a, |e| e.weight_lbs), attr(b, |e| e.weight_lbs)));
    out.push(diff(attr(a, |e| e.reach_inches), attr(b, |e| e.reach_inches)));
    out.push(Some(
        a.row.career.total_events_before - b.row.career.total_events_before,
    ));
    out.push(Some(a.row.career.win_streak - b.row.career.win_streak));
    out.push(Some(a.row.career.loss_streak - b.row.career.loss_streak));
    out.push(Some(if is_title { 1.0 } else { 0.0 }));
    out.extend(
        a.row
            .differential_values()
            .into_iter()
            .zip(b.row.differential_values())
            .map(|(a, b)| diff(a, b)),
    );
    out
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRow {
    pub event_id: EventId,
    pub entity_a_id: EntityId,
    pub entity_b_id: EntityId,
    pub event_date: NaiveDate,
    pub category: Option<String>,
    /// `true` when entity A won.
    pub label: bool,
    pub features: Vec<Option<f64>>,
}

/// Bulk differential matrix: one row per decisive matchup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingMatrix {
    pub feature_names: Vec<String>,
    pub categorical_names: Vec<String>,
    pub rows: Vec<TrainingRow>,
}

impl TrainingMatrix {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r.features[idx]).collect())
    }

    pub fn labels(&self) -> Vec<bool> {
        self.rows.iter().map(|r| r.label).collect()
    }

    pub fn row(&self, event_id: &EventId) -> Option<&TrainingRow> {
        self.rows.iter().find(|r| &r.event_id == event_id)
    }
}

/// Inclusive event-date window on emitted rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.is_none_or(|from| date >= from) && self.to.is_none_or(|to| date <= to)
    }
}

fn matchup_date(matchup: &Matchup, histories: &EntityHistories) -> Result<NaiveDate> {
    if let Some(date) = matchup.event_date {
        return Ok(date);
    }
    histories
        .find(&matchup.entity_a_id, &matchup.event_id)
        .or_else(|| histories.find(&matchup.entity_b_id, &matchup.event_id))
        .map(|p| p.event_date)
        .ok_or_else(|| {
            FeatureError::validation(
                "matchups",
                format!("event {} has no date", matchup.event_id),
            )
        })
}

/// Joins both sides' rows onto every decisive matchup.
///
/// History is never filtered by `range`: early rows keep their full past, only
/// the emitted rows are restricted.
pub fn build_training_matrix(
    snapshot: &FeedSnapshot,
    histories: &EntityHistories,
    features: &EntityFeatureSet,
    range: DateRange,
) -> Result<TrainingMatrix> {
    let mut rows = Vec::new();
    let mut undecided = 0usize;
    let mut unjoined = 0usize;

    for matchup in &snapshot.matchups {
        if matchup.entity_a_id == matchup.entity_b_id {
            return Err(FeatureError::validation(
                "matchups",
                format!("event {} pairs {} with itself", matchup.event_id, matchup.entity_a_id),
            ));
        }
        let Some(label) = matchup.outcome_label else {
            undecided += 1;
            continue;
        };
        let event_date = matchup_date(matchup, histories)?;
        if !range.contains(event_date) {
            continue;
        }

        let a_row = features.row(&matchup.entity_a_id, &matchup.event_id);
        let b_row = features.row(&matchup.entity_b_id, &matchup.event_id);
        let (Some(a_row), Some(b_row)) = (a_row, b_row) else {
            unjoined += 1;
            debug!(event = %matchup.event_id, "matchup side has no participation row");
            continue;
        };

        let a = PairSide {
            entity: snapshot.entities.get(&matchup.entity_a_id),
            row: a_row,
        };
        let b = PairSide {
            entity: snapshot.entities.get(&matchup.entity_b_id),
            row: b_row,
        };
        rows.push(TrainingRow {
            event_id: matchup.event_id.clone(),
            entity_a_id: matchup.entity_a_id.clone(),
            entity_b_id: matchup.entity_b_id.clone(),
            event_date,
            category: matchup.category.clone(),
            label,
            features: pairwise_values(a, b, matchup.is_title),
        });
    }

    rows.sort_by(|a, b| {
        a.event_date
            .cmp(&b.event_date)
            .then_with(|| a.event_id.cmp(&b.event_id))
    });

    if unjoined > 0 {
        warn!(matchups = unjoined, "matchups skipped: missing participation rows");
    }
    let matrix = TrainingMatrix {
        feature_names: pairwise_feature_names(),
        categorical_names: categorical_feature_names(),
        rows,
    };
    log_null_columns(&matrix);
    info!(
        rows = matrix.len(),
        features = matrix.feature_names.len(),
        excluded_undecided = undecided,
        "training matrix assembled"
    );
    Ok(matrix)
}

fn log_null_columns(matrix: &TrainingMatrix) {
    if matrix.is_empty() {
        return;
    }
    let mut nulls: HashMap<&str, usize> = HashMap::new();
    for row in &matrix.rows {
        for (name, value) in matrix.feature_names.iter().zip(&row.features) {
            if value.is_none() {
                *nulls.entry(name.as_str()).or_default() += 1;
            }
        }
    }
    let mut names = nulls.into_iter().collect::<Vec<_>>();
    names.sort();
    for (name, count) in names {
        debug!(target: SPARSITY_TARGET, feature = name, nulls = count, "null differential values");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_and_prefixes_line_up() {
        let names = pairwise_feature_names();
        assert_eq!(names[0], "height_diff_inches");
        assert_eq!(names[6], "is_title_event");
        assert!(names[7..].iter().all(|n| n.starts_with(DIFF_PREFIX)));
        assert!(names.contains(&"diff_strength_of_schedule".to_string()));
        let mut unique = names.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn age_enters_the_frame_once() {
        let side = |age| EntityFeatureRow {
            entity_id: EntityId::from("x"),
            event_id: None,
            event_date: None,
            career: Default::default(),
            rolling: Default::default(),
            style: Default::default(),
            time: crate::time_features::TimeFeatures {
                age_at_event_days: Some(age),
                ..Default::default()
            },
            opponent: Default::default(),
        };
        let (older, younger) = (side(12_000.0), side(10_000.0));
        let values = pairwise_values(
            PairSide { entity: None, row: &older },
            PairSide { entity: None, row: &younger },
            false,
        );
        let names = pairwise_feature_names();
        assert_eq!(values.len(), names.len());
        let ages = names
            .iter()
            .zip(&values)
            .filter(|(_, v)| **v == Some(2_000.0))
            .map(|(n, _)| n.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ages, vec!["diff_age_at_event_days"]);
    }

    #[test]
    fn diff_needs_both_sides() {
        assert_eq!(diff(Some(3.0), None), None);
        assert_eq!(diff(Some(3.0), Some(5.0)), Some(-2.0));
    }

    #[test]
    fn date_range_is_inclusive() {
        let d = |day| NaiveDate::from_ymd_opt(2022, 1, day).unwrap();
        let range = DateRange {
            from: Some(d(5)),
            to: Some(d(10)),
        };
        assert!(range.contains(d(5)));
        assert!(range.contains(d(10)));
        assert!(!range.contains(d(11)));
        assert!(DateRange::default().contains(d(1)));
    }
}
