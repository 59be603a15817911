use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;

use crate::error::{FeatureError, Result};
use crate::records::{EntityId, EventId, Participation, ParticipationRecord};

/// One entity's participations in (event_date, event_id) order.
#[derive(Debug, Clone)]
pub struct EntityHistory {
    pub entity_id: EntityId,
    pub entries: Vec<Participation>,
}

impl EntityHistory {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// For each entry, the number of entries dated strictly before it.
    ///
    /// Events sharing a date all map to the start of their date group, so
    /// same-day events never count as each other's history.
    pub fn prior_counts(&self) -> Vec<usize> {
        let mut group_start = 0;
        self.entries
            .iter()
            .enumerate()
            .map(|(i, p)| {
                if i > 0 && self.entries[i - 1].event_date != p.event_date {
                    group_start = i;
                }
                group_start
            })
            .collect()
    }

    /// Number of leading entries dated strictly before `as_of`.
    pub fn count_before(&self, as_of: NaiveDate) -> usize {
        self.entries.partition_point(|p| p.event_date < as_of)
    }

    /// The history restricted to entries dated strictly before `as_of`.
    pub fn truncated_before(&self, as_of: NaiveDate) -> EntityHistory {
        EntityHistory {
            entity_id: self.entity_id.clone(),
            entries: self.entries[..self.count_before(as_of)].to_vec(),
        }
    }

    pub fn last_category(&self) -> Option<&str> {
        self.entries.iter().rev().find_map(|p| p.category.as_deref())
    }
}

/// Orders one entity's records by (event_date, event_id).
///
/// Fails when a record has no date, belongs to another entity, or repeats an event.
pub fn sort_history(
    entity_id: &EntityId,
    records: Vec<ParticipationRecord>,
) -> Result<EntityHistory> {
    let mut seen = HashSet::with_capacity(records.len());
    let mut entries = Vec::with_capacity(records.len());
    for record in records {
        if &record.entity_id != entity_id {
            return Err(FeatureError::validation(
                "participations",
                format!(
                    "record for {} grouped under entity {}",
                    record.entity_id, entity_id
                ),
            ));
        }
        let Some(event_date) = record.event_date else {
            return Err(FeatureError::validation(
                "participations",
                format!(
                    "entity {} event {} has no event date",
                    record.entity_id, record.event_id
                ),
            ));
        };
        if !seen.insert(record.event_id.clone()) {
            return Err(FeatureError::validation(
                "participations",
                format!(
                    "entity {} appears twice in event {}",
                    record.entity_id, record.event_id
                ),
            ));
        }
        entries.push(Participation {
            entity_id: record.entity_id,
            event_id: record.event_id,
            event_date,
            opponent_id: record.opponent_id,
            outcome: record.outcome,
            finish_method: record.finish_method,
            category: record.category,
            duration_seconds: record.duration_seconds,
            observations: record.observations,
        });
    }

    entries.sort_by(|a, b| {
        a.event_date
            .cmp(&b.event_date)
            .then_with(|| a.event_id.cmp(&b.event_id))
    });

    Ok(EntityHistory {
        entity_id: entity_id.clone(),
        entries,
    })
}

/// Arena of every entity's sorted history, built once per run.
#[derive(Debug, Clone, Default)]
pub struct EntityHistories {
    by_entity: BTreeMap<EntityId, EntityHistory>,
}

impl EntityHistories {
    pub fn from_records(records: &[ParticipationRecord]) -> Result<Self> {
        let mut grouped: BTreeMap<EntityId, Vec<ParticipationRecord>> = BTreeMap::new();
        for record in records {
            if record.entity_id.0.trim().is_empty() || record.event_id.0.trim().is_empty() {
                return Err(FeatureError::validation(
                    "participations",
                    "record with empty entity or event id",
                ));
            }
            if record.opponent_id.0.trim().is_empty() {
                return Err(FeatureError::validation(
                    "participations",
                    format!(
                        "entity {} event {} has no opponent id",
                        record.entity_id, record.event_id
                    ),
                ));
            }
            grouped
                .entry(record.entity_id.clone())
                .or_default()
                .push(record.clone());
        }

        let mut by_entity = BTreeMap::new();
        for (entity_id, group) in grouped {
            let history = sort_history(&entity_id, group)?;
            by_entity.insert(entity_id, history);
        }
        Ok(Self { by_entity })
    }

    pub fn get(&self, entity_id: &EntityId) -> Option<&EntityHistory> {
        self.by_entity.get(entity_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityHistory> {
        self.by_entity.values()
    }

    pub fn len(&self) -> usize {
        self.by_entity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_entity.is_empty()
    }

    pub fn participation_count(&self) -> usize {
        self.by_entity.values().map(EntityHistory::len).sum()
    }

    pub fn find(&self, entity_id: &EntityId, event_id: &EventId) -> Option<&Participation> {
        self.by_entity
            .get(entity_id)?
            .entries
            .iter()
            .find(|p| &p.event_id == event_id)
    }
}
