use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Stable identifier of a competitor.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub String);

/// Key of a single-entity feature row: (entity_id, event_id).
pub type RowKey = (EntityId, EventId);

/// Identifier of one two-party contest.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(pub String);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(raw: &str) -> Self {
        EntityId(raw.to_string())
    }
}

impl From<&str> for EventId {
    fn from(raw: &str) -> Self {
        EventId(raw.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub height_inches: Option<f64>,
    #[serde(default)]
    pub weight_lbs: Option<f64>,
    #[serde(default)]
    pub reach_inches: Option<f64>,
}

impl Entity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: EntityId(id.into()),
            name: None,
            birth_date: None,
            height_inches: None,
            weight_lbs: None,
            reach_inches: None,
        }
    }

    pub fn age_days_at(&self, date: NaiveDate) -> Option<f64> {
        self.birth_date
            .map(|dob| (date - dob).num_days() as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Win,
    Loss,
    Draw,
    NoContest,
}

impl Outcome {
    /// `Some(true)` for a win, `Some(false)` for a loss, `None` when nobody won.
    pub fn decisive(self) -> Option<bool> {
        match self {
            Outcome::Win => Some(true),
            Outcome::Loss => Some(false),
            Outcome::Draw | Outcome::NoContest => None,
        }
    }

    pub fn is_win(self) -> bool {
        self == Outcome::Win
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "w" | "win" => Some(Outcome::Win),
            "l" | "loss" => Some(Outcome::Loss),
            "d" | "draw" => Some(Outcome::Draw),
            "nc" | "no contest" | "no_contest" => Some(Outcome::NoContest),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Outcome::Win => "W",
            Outcome::Loss => "L",
            Outcome::Draw => "D",
            Outcome::NoContest => "NC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishMethod {
    StrikeFinish,
    Submission,
    Decision,
    Other,
}

impl FinishMethod {
    /// Classifies a free-text method string ("KO/TKO", "Decision - Split", ...).
    pub fn classify(raw: &str) -> Self {
        let upper = raw.to_ascii_uppercase();
        if upper.contains("KO") {
            FinishMethod::StrikeFinish
        } else if upper.contains("SUBMISSION") {
            FinishMethod::Submission
        } else if upper.contains("DECISION") {
            FinishMethod::Decision
        } else {
            FinishMethod::Other
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FinishMethod::StrikeFinish => "KO/TKO",
            FinishMethod::Submission => "Submission",
            FinishMethod::Decision => "Decision",
            FinishMethod::Other => "Other",
        }
    }
}

/// Per-event observations, already summed across rounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Observations {
    pub knockdowns: f64,
    pub sig_str_landed: f64,
    pub sig_str_attempted: f64,
    pub total_str_landed: f64,
    pub total_str_attempted: f64,
    pub td_landed: f64,
    pub td_attempted: f64,
    pub ctrl_seconds: f64,
}

/// Raw Participations feed row as delivered by the extraction layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipationRecord {
    pub entity_id: EntityId,
    pub event_id: EventId,
    pub event_date: Option<NaiveDate>,
    pub opponent_id: EntityId,
    pub outcome: Outcome,
    pub finish_method: FinishMethod,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub observations: Option<Observations>,
}

/// A participation whose date has been validated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participation {
    pub entity_id: EntityId,
    pub event_id: EventId,
    pub event_date: NaiveDate,
    pub opponent_id: EntityId,
    pub outcome: Outcome,
    pub finish_method: FinishMethod,
    pub category: Option<String>,
    pub duration_seconds: Option<f64>,
    pub observations: Option<Observations>,
}

impl Participation {
    pub fn key(&self) -> RowKey {
        (self.entity_id.clone(), self.event_id.clone())
    }

    pub fn opponent_key(&self) -> RowKey {
        (self.opponent_id.clone(), self.event_id.clone())
    }

    /// Strike accuracy this entity achieved in this event.
    pub fn sig_str_accuracy(&self) -> Option<f64> {
        let obs = self.observations?;
        crate::temporal::safe_div(Some(obs.sig_str_landed), Some(obs.sig_str_attempted))
    }
}

/// Matchups feed row: the join backbone of the bulk differential matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Matchup {
    pub event_id: EventId,
    pub entity_a_id: EntityId,
    pub entity_b_id: EntityId,
    pub event_date: Option<NaiveDate>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub is_title: bool,
    /// `Some(true)` when entity A won, `None` for draws and no-contests.
    #[serde(default)]
    pub outcome_label: Option<bool>,
}

impl Matchup {
    pub fn swapped(&self) -> Self {
        Self {
            event_id: self.event_id.clone(),
            entity_a_id: self.entity_b_id.clone(),
            entity_b_id: self.entity_a_id.clone(),
            event_date: self.event_date,
            category: self.category.clone(),
            is_title: self.is_title,
            outcome_label: self.outcome_label.map(|a_won| !a_won),
        }
    }
}
