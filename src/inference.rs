//! As-of point queries for hypothetical matchups.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::warn;

use crate::config::FeatureConfig;
use crate::dataset::FeedSnapshot;
use crate::differentials::{
    categorical_feature_names, pairwise_feature_names, pairwise_values, PairSide,
};
use crate::entity_frame::{EntityFeatureRow, EntityFeatureSet};
use crate::error::{FeatureError, Result};
use crate::history::{EntityHistories, EntityHistory};
use crate::logging::SPARSITY_TARGET;
use crate::manifest::FeatureManifest;
use crate::records::{Entity, EntityId};
use crate::time_features::time_features_as_of;

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Number(Option<f64>),
    Category(Option<String>),
}

impl FeatureValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FeatureValue::Number(v) => *v,
            FeatureValue::Category(_) => None,
        }
    }
}

/// Ordered feature map of one point query. Every requested name is present;
/// missing values are explicit nulls.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceFeatures {
    entries: Vec<(String, FeatureValue)>,
}

impl InferenceFeatures {
    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(FeatureValue::as_number)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for InferenceFeatures {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            match value {
                FeatureValue::Number(v) => map.serialize_entry(name, v)?,
                FeatureValue::Category(v) => map.serialize_entry(name, v)?,
            }
        }
        map.end()
    }
}

/// A hypothetical matchup to featurize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchupQuery {
    pub entity_a_id: EntityId,
    pub entity_b_id: EntityId,
    pub category: Option<String>,
    pub as_of: NaiveDate,
}

struct QuerySide<'a> {
    entity: Option<&'a Entity>,
    history: EntityHistory,
}

fn resolve<'a>(
    id: &EntityId,
    snapshot: &'a FeedSnapshot,
    histories: &EntityHistories,
    as_of: NaiveDate,
) -> Result<QuerySide<'a>> {
    let entity = snapshot.entities.get(id);
    let history = match histories.get(id) {
        Some(full) => full.truncated_before(as_of),
        None if entity.is_some() => EntityHistory {
            entity_id: id.clone(),
            entries: Vec::new(),
        },
        None => return Err(FeatureError::EntityNotFound(id.clone())),
    };
    Ok(QuerySide { entity, history })
}

fn pending_as_of(
    side: &QuerySide<'_>,
    features: &EntityFeatureSet,
    config: &FeatureConfig,
    category: Option<&str>,
    as_of: NaiveDate,
) -> EntityFeatureRow {
    let mut row = features.pending_for(&side.history, side.entity, config);
    row.time = time_features_as_of(
        &side.history,
        side.entity,
        category,
        as_of,
        config.debut_days_since_last_event,
    );
    if side.history.is_empty() {
        warn!(
            target: SPARSITY_TARGET,
            entity = %side.history.entity_id,
            %as_of,
            "no history before as-of date; using debut defaults"
        );
    }
    row
}

/// Features of a hypothetical A-vs-B event on `query.as_of`.
///
/// Each side's aggregates are its pending row over events dated strictly
/// before `as_of`; elapsed-time features are recomputed against `as_of`. With a
/// manifest the result holds exactly the manifest's names in manifest order,
/// and a name the engine does not produce is an error.
pub fn build_inference_features(
    snapshot: &FeedSnapshot,
    histories: &EntityHistories,
    features: &EntityFeatureSet,
    config: &FeatureConfig,
    manifest: Option<&FeatureManifest>,
    query: &MatchupQuery,
) -> Result<InferenceFeatures> {
    let a = resolve(&query.entity_a_id, snapshot, histories, query.as_of)?;
    let b = resolve(&query.entity_b_id, snapshot, histories, query.as_of)?;

    let category = query
        .category
        .clone()
        .or_else(|| a.history.last_category().map(str::to_string));

    let a_row = pending_as_of(&a, features, config, category.as_deref(), query.as_of);
    let b_row = pending_as_of(&b, features, config, category.as_deref(), query.as_of);

    let values = pairwise_values(
        PairSide {
            entity: a.entity,
            row: &a_row,
        },
        PairSide {
            entity: b.entity,
            row: &b_row,
        },
        false,
    );

    let mut available: HashMap<String, FeatureValue> = pairwise_feature_names()
        .into_iter()
        .zip(values)
        .map(|(n, v)| (n, FeatureValue::Number(v)))
        .collect();
    for name in categorical_feature_names() {
        available.insert(name, FeatureValue::Category(category.clone()));
    }

    let entries = match manifest {
        Some(manifest) => manifest
            .all_names()
            .map(|name| {
                available
                    .remove(name)
                    .map(|v| (name.to_string(), v))
                    .ok_or_else(|| FeatureError::UnknownFeature(name.to_string()))
            })
            .collect::<Result<Vec<_>>>()?,
        None => pairwise_feature_names()
            .into_iter()
            .chain(categorical_feature_names())
            .filter_map(|name| available.remove(&name).map(|v| (name, v)))
            .collect(),
    };
    Ok(InferenceFeatures { entries })
}
