//! Elapsed-time context: rest, tenure, age and time in category.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::history::EntityHistory;
use crate::records::Entity;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeFeatures {
    pub days_since_last_event: Option<f64>,
    pub career_length_days: Option<f64>,
    pub age_at_event_days: Option<f64>,
    pub days_in_category: Option<f64>,
}

impl TimeFeatures {
    pub const NAMES: [&'static str; 4] = [
        "days_since_last_event",
        "career_length_days",
        "age_at_event_days",
        "days_in_category",
    ];

    pub fn values(&self) -> [Option<f64>; 4] {
        [
            self.days_since_last_event,
            self.career_length_days,
            self.age_at_event_days,
            self.days_in_category,
        ]
    }
}

fn days(from: NaiveDate, to: NaiveDate) -> f64 {
    (to - from).num_days() as f64
}

/// Time features for every recorded event of `history`.
///
/// Unlike the aggregates, these describe the event date itself, so the result
/// has exactly `history.len()` entries; the pending state depends on a
/// reference date and comes from [`time_features_as_of`].
pub fn time_features(
    history: &EntityHistory,
    entity: Option<&Entity>,
    debut_days_since_last: f64,
) -> Vec<TimeFeatures> {
    let Some(first) = history.entries.first().map(|p| p.event_date) else {
        return Vec::new();
    };
    let mut first_in_category: HashMap<&str, NaiveDate> = HashMap::new();
    // Last date strictly before the current one; same-day events share it.
    let mut previous: Option<NaiveDate> = None;
    let mut current: Option<NaiveDate> = None;

    history
        .entries
        .iter()
        .map(|p| {
            let date = p.event_date;
            if current != Some(date) {
                previous = current;
                current = Some(date);
            }
            let days_in_category = p.category.as_deref().map(|c| {
                let since = *first_in_category.entry(c).or_insert(date);
                days(since, date)
            });
            TimeFeatures {
                days_since_last_event: Some(
                    previous.map_or(debut_days_since_last, |prev| days(prev, date)),
                ),
                career_length_days: Some(days(first, date)),
                age_at_event_days: entity.and_then(|e| e.age_days_at(date)),
                days_in_category,
            }
        })
        .collect()
}

/// Time features of a hypothetical event on `as_of`.
///
/// `history` must already be restricted to events dated before `as_of`. An
/// entity with no history gets the debut encoding (`debut_days_since_last`,
/// zero tenure, zero days in category).
pub fn time_features_as_of(
    history: &EntityHistory,
    entity: Option<&Entity>,
    category: Option<&str>,
    as_of: NaiveDate,
    debut_days_since_last: f64,
) -> TimeFeatures {
    let age_at_event_days = entity.and_then(|e| e.age_days_at(as_of));
    let (Some(first), Some(last)) = (history.entries.first(), history.entries.last()) else {
        return TimeFeatures {
            days_since_last_event: Some(debut_days_since_last),
            career_length_days: Some(0.0),
            age_at_event_days,
            days_in_category: Some(0.0),
        };
    };

    let days_in_category = category.map(|c| {
        history
            .entries
            .iter()
            .find(|p| p.category.as_deref() == Some(c))
            .map_or(0.0, |p| days(p.event_date, as_of))
    });

    TimeFeatures {
        days_since_last_event: Some(days(last.event_date, as_of)),
        career_length_days: Some(days(first.event_date, as_of)),
        age_at_event_days,
        days_in_category,
    }
}
