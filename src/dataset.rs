use std::collections::BTreeMap;
use std::path::Path;

use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use crate::error::{FeatureError, Result};
use crate::records::{
    Entity, EntityId, EventId, FinishMethod, Matchup, Observations, Outcome, ParticipationRecord,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// The three input feeds, loaded once per run and never mutated.
#[derive(Debug, Clone, Default)]
pub struct FeedSnapshot {
    pub entities: BTreeMap<EntityId, Entity>,
    pub participations: Vec<ParticipationRecord>,
    pub matchups: Vec<Matchup>,
}

impl FeedSnapshot {
    pub fn new(
        entities: Vec<Entity>,
        participations: Vec<ParticipationRecord>,
        matchups: Vec<Matchup>,
    ) -> Self {
        Self {
            entities: entities.into_iter().map(|e| (e.id.clone(), e)).collect(),
            participations,
            matchups,
        }
    }

    pub fn load(conn: &Connection) -> Result<Self> {
        let entities = load_entities(conn)?;
        let participations = load_participations(conn)?;
        let matchups = load_matchups(conn)?;
        info!(
            entities = entities.len(),
            participations = participations.len(),
            matchups = matchups.len(),
            "feed snapshot loaded"
        );
        Ok(Self::new(entities, participations, matchups))
    }

    pub fn load_path(path: &Path) -> Result<Self> {
        let conn = open_db(path)?;
        Self::load(&conn)
    }

    /// Writes every feed row in one transaction, replacing rows with the same key.
    pub fn write(&self, conn: &mut Connection) -> Result<()> {
        let tx = conn.transaction()?;
        for entity in self.entities.values() {
            upsert_entity(&tx, entity)?;
        }
        for record in &self.participations {
            upsert_participation(&tx, record)?;
        }
        for matchup in &self.matchups {
            upsert_matchup(&tx, matchup)?;
        }
        tx.commit()?;
        Ok(())
    }
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS entities (
            entity_id TEXT PRIMARY KEY,
            name TEXT NULL,
            birth_date TEXT NULL,
            height_inches REAL NULL,
            weight_lbs REAL NULL,
            reach_inches REAL NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS participations (
            entity_id TEXT NOT NULL,
            event_id TEXT NOT NULL,
            event_date TEXT NULL,
            opponent_id TEXT NOT NULL,
            outcome TEXT NOT NULL,
            finish_method TEXT NOT NULL,
            category TEXT NULL,
            duration_seconds REAL NULL,
            knockdowns REAL NULL,
            sig_str_landed REAL NULL,
            sig_str_attempted REAL NULL,
            total_str_landed REAL NULL,
            total_str_attempted REAL NULL,
            td_landed REAL NULL,
            td_attempted REAL NULL,
            ctrl_seconds REAL NULL,
            PRIMARY KEY (entity_id, event_id)
        );
        CREATE INDEX IF NOT EXISTS idx_participations_event ON participations(event_id);
        CREATE INDEX IF NOT EXISTS idx_participations_date ON participations(event_date);

        CREATE TABLE IF NOT EXISTS matchups (
            event_id TEXT PRIMARY KEY,
            entity_a_id TEXT NOT NULL,
            entity_b_id TEXT NOT NULL,
            event_date TEXT NULL,
            category TEXT NULL,
            is_title INTEGER NOT NULL DEFAULT 0,
            outcome_label INTEGER NULL
        );
        CREATE INDEX IF NOT EXISTS idx_matchups_date ON matchups(event_date);
        "#,
    )?;
    Ok(())
}

fn parse_date(feed: &'static str, raw: Option<String>) -> Result<Option<NaiveDate>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .map(Some)
        .map_err(|err| FeatureError::validation(feed, format!("bad date {trimmed:?}: {err}")))
}

fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format(DATE_FORMAT).to_string())
}

pub fn load_entities(conn: &Connection) -> Result<Vec<Entity>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT entity_id, name, birth_date, height_inches, weight_lbs, reach_inches
        FROM entities
        ORDER BY entity_id ASC
        "#,
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Option<String>>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, Option<f64>>(3)?,
            row.get::<_, Option<f64>>(4)?,
            row.get::<_, Option<f64>>(5)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (id, name, birth_date, height_inches, weight_lbs, reach_inches) = row?;
        out.push(Entity {
            id: EntityId(id),
            name,
            birth_date: parse_date("entities", birth_date)?,
            height_inches,
            weight_lbs,
            reach_inches,
        });
    }
    Ok(out)
}

struct RawParticipation {
    entity_id: String,
    event_id: String,
    event_date: Option<String>,
    opponent_id: String,
    outcome: String,
    finish_method: String,
    category: Option<String>,
    duration_seconds: Option<f64>,
    observed: [Option<f64>; 8],
}

fn decode_participation(row: &Row<'_>) -> rusqlite::Result<RawParticipation> {
    let mut observed = [None; 8];
    for (i, slot) in observed.iter_mut().enumerate() {
        *slot = row.get::<_, Option<f64>>(8 + i)?;
    }
    Ok(RawParticipation {
        entity_id: row.get(0)?,
        event_id: row.get(1)?,
        event_date: row.get(2)?,
        opponent_id: row.get(3)?,
        outcome: row.get(4)?,
        finish_method: row.get(5)?,
        category: row.get(6)?,
        duration_seconds: row.get(7)?,
        observed,
    })
}

/// Rows with every observation column null carry no observations at all.
fn observations_from(observed: [Option<f64>; 8]) -> Option<Observations> {
    if observed.iter().all(Option::is_none) {
        return None;
    }
    let [kd, sig_l, sig_a, tot_l, tot_a, td_l, td_a, ctrl] = observed.map(|v| v.unwrap_or(0.0));
    Some(Observations {
        knockdowns: kd,
        sig_str_landed: sig_l,
        sig_str_attempted: sig_a,
        total_str_landed: tot_l,
        total_str_attempted: tot_a,
        td_landed: td_l,
        td_attempted: td_a,
        ctrl_seconds: ctrl,
    })
}

pub fn load_participations(conn: &Connection) -> Result<Vec<ParticipationRecord>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT
            entity_id, event_id, event_date, opponent_id, outcome, finish_method,
            category, duration_seconds,
            knockdowns, sig_str_landed, sig_str_attempted,
            total_str_landed, total_str_attempted,
            td_landed, td_attempted, ctrl_seconds
        FROM participations
        ORDER BY entity_id ASC, event_date ASC, event_id ASC
        "#,
    )?;
    let rows = stmt.query_map([], decode_participation)?;

    let mut out = Vec::new();
    for row in rows {
        let raw = row?;
        let outcome = Outcome::parse(&raw.outcome).ok_or_else(|| {
            FeatureError::validation(
                "participations",
                format!(
                    "entity {} event {} has unknown outcome {:?}",
                    raw.entity_id, raw.event_id, raw.outcome
                ),
            )
        })?;
        out.push(ParticipationRecord {
            entity_id: EntityId(raw.entity_id),
            event_id: EventId(raw.event_id),
            event_date: parse_date("participations", raw.event_date)?,
            opponent_id: EntityId(raw.opponent_id),
            outcome,
            finish_method: FinishMethod::classify(&raw.finish_method),
            category: raw.category,
            duration_seconds: raw.duration_seconds,
            observations: observations_from(raw.observed),
        });
    }
    Ok(out)
}

pub fn load_matchups(conn: &Connection) -> Result<Vec<Matchup>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT event_id, entity_a_id, entity_b_id, event_date, category, is_title, outcome_label
        FROM matchups
        ORDER BY event_date ASC, event_id ASC
        "#,
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, i64>(5)?,
            row.get::<_, Option<i64>>(6)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (event_id, a, b, date, category, is_title, label) = row?;
        out.push(Matchup {
            event_id: EventId(event_id),
            entity_a_id: EntityId(a),
            entity_b_id: EntityId(b),
            event_date: parse_date("matchups", date)?,
            category,
            is_title: is_title != 0,
            outcome_label: label.map(|v| v != 0),
        });
    }
    Ok(out)
}

pub fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    let sql = match table {
        "entities" => "SELECT COUNT(*) FROM entities",
        "participations" => "SELECT COUNT(*) FROM participations",
        "matchups" => "SELECT COUNT(*) FROM matchups",
        other => {
            return Err(FeatureError::validation(
                "sqlite",
                format!("unknown table {other}"),
            ));
        }
    };
    let count = conn
        .query_row(sql, [], |row| row.get::<_, i64>(0))
        .optional()?;
    Ok(count.unwrap_or(0))
}

fn upsert_entity(tx: &rusqlite::Transaction<'_>, e: &Entity) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO entities (
            entity_id, name, birth_date, height_inches, weight_lbs, reach_inches, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(entity_id) DO UPDATE SET
            name = excluded.name,
            birth_date = excluded.birth_date,
            height_inches = excluded.height_inches,
            weight_lbs = excluded.weight_lbs,
            reach_inches = excluded.reach_inches,
            updated_at = excluded.updated_at
        "#,
        params![
            e.id.0,
            e.name,
            format_date(e.birth_date),
            e.height_inches,
            e.weight_lbs,
            e.reach_inches,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn upsert_participation(tx: &rusqlite::Transaction<'_>, p: &ParticipationRecord) -> Result<()> {
    let obs = p.observations;
    tx.execute(
        r#"
        INSERT INTO participations (
            entity_id, event_id, event_date, opponent_id, outcome, finish_method,
            category, duration_seconds,
            knockdowns, sig_str_landed, sig_str_attempted,
            total_str_landed, total_str_attempted,
            td_landed, td_attempted, ctrl_seconds
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6,
            ?7, ?8,
            ?9, ?10, ?11,
            ?12, ?13,
            ?14, ?15, ?16
        )
        ON CONFLICT(entity_id, event_id) DO UPDATE SET
            event_date = excluded.event_date,
            opponent_id = excluded.opponent_id,
            outcome = excluded.outcome,
            finish_method = excluded.finish_method,
            category = excluded.category,
            duration_seconds = excluded.duration_seconds,
            knockdowns = excluded.knockdowns,
            sig_str_landed = excluded.sig_str_landed,
            sig_str_attempted = excluded.sig_str_attempted,
            total_str_landed = excluded.total_str_landed,
            total_str_attempted = excluded.total_str_attempted,
            td_landed = excluded.td_landed,
            td_attempted = excluded.td_attempted,
            ctrl_seconds = excluded.ctrl_seconds
        "#,
        params![
            p.entity_id.0,
            p.event_id.0,
            format_date(p.event_date),
            p.opponent_id.0,
            p.outcome.code(),
            p.finish_method.label(),
            p.category,
            p.duration_seconds,
            obs.map(|o| o.knockdowns),
            obs.map(|o| o.sig_str_landed),
            obs.map(|o| o.sig_str_attempted),
            obs.map(|o| o.total_str_landed),
            obs.map(|o| o.total_str_attempted),
            obs.map(|o| o.td_landed),
            obs.map(|o| o.td_attempted),
            obs.map(|o| o.ctrl_seconds),
        ],
    )?;
    Ok(())
}

fn upsert_matchup(tx: &rusqlite::Transaction<'_>, m: &Matchup) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO matchups (
            event_id, entity_a_id, entity_b_id, event_date, category, is_title, outcome_label
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(event_id) DO UPDATE SET
            entity_a_id = excluded.entity_a_id,
            entity_b_id = excluded.entity_b_id,
            event_date = excluded.event_date,
            category = excluded.category,
            is_title = excluded.is_title,
            outcome_label = excluded.outcome_label
        "#,
        params![
            m.event_id.0,
            m.entity_a_id.0,
            m.entity_b_id.0,
            format_date(m.event_date),
            m.category,
            i64::from(m.is_title),
            m.outcome_label.map(i64::from),
        ],
    )?;
    Ok(())
}
