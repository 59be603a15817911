//! Single-entity feature frame.
//!
//! Built in two passes over the history arena. The first pass computes every
//! entity's point-in-time record and per-event accuracy and merges them into
//! the opponent join; the second pass reads that join to assemble one
//! [`EntityFeatureRow`] per (entity_id, event_id) plus a pending row per
//! entity. Both passes run per entity on rayon and merge through `BTreeMap`s,
//! so the output does not depend on scheduling.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::FeatureConfig;
use crate::history::{EntityHistories, EntityHistory};
use crate::logging::SPARSITY_TARGET;
use crate::opponent_quality::{opponent_quality, OpponentIndex, OpponentQuality, PointInTimeRecord};
use crate::records::{Entity, EntityId, EventId, RowKey};
use crate::rolling::{rolling_features, RollingFeatures};
use crate::streaks::{career_features, CareerFeatures};
use crate::style::{style_features, StyleFeatures};
use crate::time_features::{time_features, TimeFeatures};

#[derive(Debug, Clone, PartialEq)]
pub struct EntityFeatureRow {
    pub entity_id: EntityId,
    /// `None` on a pending row.
    pub event_id: Option<EventId>,
    pub event_date: Option<NaiveDate>,
    pub career: CareerFeatures,
    pub rolling: RollingFeatures,
    pub style: StyleFeatures,
    pub time: TimeFeatures,
    pub opponent: OpponentQuality,
}

impl EntityFeatureRow {
    /// Names of the per-entity features that enter the pairwise frame as
    /// `diff_<name>`, in column order.
    pub fn differential_names() -> impl Iterator<Item = &'static str> {
        RollingFeatures::NAMES
            .into_iter()
            .chain(StyleFeatures::NAMES)
            .chain(TimeFeatures::NAMES)
            .chain(OpponentQuality::NAMES)
    }

    /// Values matching [`Self::differential_names`].
    pub fn differential_values(&self) -> Vec<Option<f64>> {
        self.rolling
            .values()
            .into_iter()
            .chain(self.style.values())
            .chain(self.time.values())
            .chain(self.opponent.values())
            .collect()
    }

    /// Every feature of the row by name, career counts included.
    pub fn named_values(&self) -> Vec<(&'static str, Option<f64>)> {
        CareerFeatures::NAMES
            .into_iter()
            .zip(self.career.values())
            .chain(Self::differential_names().zip(self.differential_values()))
            .collect()
    }

    pub fn is_debut(&self) -> bool {
        self.career.total_events_before == 0.0
    }
}

/// Cross-entity joins read by the second pass.
#[derive(Debug, Clone)]
pub struct OpponentJoin {
    pub records: OpponentIndex<PointInTimeRecord>,
    pub accuracy: OpponentIndex<Option<f64>>,
}

impl OpponentJoin {
    pub fn build(histories: &EntityHistories) -> Self {
        let per_entity = histories
            .iter()
            .collect::<Vec<_>>()
            .par_iter()
            .map(|history| {
                let careers = career_features(history);
                history
                    .entries
                    .iter()
                    .zip(history.prior_counts())
                    .map(|(p, prior)| {
                        (
                            p.key(),
                            PointInTimeRecord::from_career(&careers[prior]),
                            p.sig_str_accuracy(),
                        )
                    })
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        let mut records = HashMap::new();
        let mut accuracy = HashMap::new();
        for (key, record, acc) in per_entity.into_iter().flatten() {
            records.insert(key.clone(), record);
            accuracy.insert(key, acc);
        }
        Self {
            records: OpponentIndex::new(records),
            accuracy: OpponentIndex::new(accuracy),
        }
    }
}

/// Rows for each recorded event of `history`, followed by the pending row.
///
/// The aggregates are expanding states where index `k` has absorbed the first
/// `k` entries. An event row reads the state at its prior count, so every
/// event on the same date sees only the entries dated before it.
pub fn entity_rows(
    history: &EntityHistory,
    entity: Option<&Entity>,
    join: &OpponentJoin,
    config: &FeatureConfig,
) -> (Vec<EntityFeatureRow>, EntityFeatureRow) {
    let careers = career_features(history);
    let rolling = rolling_features(history, config.rolling_window, config.ewm_alpha);
    let style = style_features(history, &join.accuracy);
    let opponent = opponent_quality(history, &join.records);
    let time = time_features(history, entity, config.debut_days_since_last_event);

    let n = history.len();
    let prior = history.prior_counts();
    let row = |i: usize| {
        let k = prior.get(i).copied().unwrap_or(n);
        EntityFeatureRow {
            entity_id: history.entity_id.clone(),
            event_id: history.entries.get(i).map(|p| p.event_id.clone()),
            event_date: history.entries.get(i).map(|p| p.event_date),
            career: careers[k],
            rolling: rolling[k],
            style: style[k],
            time: time.get(i).copied().unwrap_or_default(),
            opponent: opponent[k],
        }
    };
    ((0..n).map(row).collect(), row(n))
}

/// Every entity's feature rows keyed by (entity_id, event_id), plus pending rows.
#[derive(Debug, Clone)]
pub struct EntityFeatureSet {
    rows: BTreeMap<RowKey, EntityFeatureRow>,
    pending: BTreeMap<EntityId, EntityFeatureRow>,
    join: OpponentJoin,
}

impl EntityFeatureSet {
    pub fn build(
        histories: &EntityHistories,
        entities: &BTreeMap<EntityId, Entity>,
        config: &FeatureConfig,
    ) -> Self {
        let join = OpponentJoin::build(histories);
        info!(
            entities = histories.len(),
            joined = join.records.len(),
            "opponent join complete"
        );

        let per_entity = histories
            .iter()
            .collect::<Vec<_>>()
            .par_iter()
            .map(|history| {
                let entity = entities.get(&history.entity_id);
                entity_rows(history, entity, &join, config)
            })
            .collect::<Vec<_>>();

        let mut rows = BTreeMap::new();
        let mut pending = BTreeMap::new();
        for (event_rows, pending_row) in per_entity {
            for row in event_rows {
                if let Some(event_id) = row.event_id.clone() {
                    rows.insert((row.entity_id.clone(), event_id), row);
                }
            }
            pending.insert(pending_row.entity_id.clone(), pending_row);
        }

        let set = Self {
            rows,
            pending,
            join,
        };
        set.log_sparsity();
        info!(rows = set.rows.len(), "entity feature rows built");
        set
    }

    fn log_sparsity(&self) {
        let mut debuts = 0usize;
        for row in self.rows.values().filter(|r| r.is_debut()) {
            debuts += 1;
            debug!(
                target: SPARSITY_TARGET,
                entity = %row.entity_id,
                event = ?row.event_id,
                "no prior history; aggregate features are null"
            );
        }
        if debuts > 0 {
            warn!(
                target: SPARSITY_TARGET,
                rows = debuts,
                "rows without prior history carry null aggregates"
            );
        }
    }

    pub fn row(&self, entity_id: &EntityId, event_id: &EventId) -> Option<&EntityFeatureRow> {
        self.rows.get(&(entity_id.clone(), event_id.clone()))
    }

    pub fn pending(&self, entity_id: &EntityId) -> Option<&EntityFeatureRow> {
        self.pending.get(entity_id)
    }

    /// Pending row of an arbitrary (typically as-of truncated) history, using
    /// the opponent join of the full feed.
    pub fn pending_for(
        &self,
        history: &EntityHistory,
        entity: Option<&Entity>,
        config: &FeatureConfig,
    ) -> EntityFeatureRow {
        entity_rows(history, entity, &self.join, config).1
    }

    pub fn rows(&self) -> impl Iterator<Item = &EntityFeatureRow> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
