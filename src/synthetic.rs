//! Deterministic synthetic league for demos, benches and property tests.
//!
//! Each entity gets a latent skill; event winners are drawn from a logistic
//! of the skill gap, so form and record features carry real signal.

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::dataset::FeedSnapshot;
use crate::records::{
    Entity, EventId, FinishMethod, Matchup, Observations, Outcome, ParticipationRecord,
};

pub const CATEGORIES: [&str; 5] = [
    "Flyweight",
    "Bantamweight",
    "Lightweight",
    "Welterweight",
    "Middleweight",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeagueSpec {
    pub entities: usize,
    pub events: usize,
    pub seed: u64,
    pub start: NaiveDate,
    /// Probability that an event ends without a winner.
    pub undecided_rate: f64,
}

impl Default for LeagueSpec {
    fn default() -> Self {
        Self {
            entities: 40,
            events: 300,
            seed: 7,
            start: NaiveDate::from_ymd_opt(2015, 1, 3).unwrap_or(NaiveDate::MIN),
            undecided_rate: 0.03,
        }
    }
}

struct Competitor {
    entity: Entity,
    skill: f64,
    category: usize,
}

fn observations(rng: &mut StdRng, skill: f64, won: bool, minutes: f64) -> Observations {
    let pace = (1.0 + skill * 0.2).max(0.3);
    let sig_att = (rng.gen_range(4.0..9.0) * minutes * pace).round();
    let sig_landed = (sig_att * rng.gen_range(0.3..0.6)).round();
    let total_att = sig_att + rng.gen_range(0.0..30.0_f64).round();
    let total_landed = sig_landed + (total_att - sig_att) * rng.gen_range(0.4..0.8);
    let td_att = rng.gen_range(0.0..6.0_f64).round();
    let td_landed = (td_att * rng.gen_range(0.0..0.7)).round();
    Observations {
        knockdowns: if won && rng.gen_bool(0.25) { 1.0 } else { 0.0 },
        sig_str_landed: sig_landed,
        sig_str_attempted: sig_att,
        total_str_landed: total_landed.round(),
        total_str_attempted: total_att,
        td_landed,
        td_attempted: td_att,
        ctrl_seconds: (td_landed * rng.gen_range(20.0..90.0)).round(),
    }
}

fn finish(rng: &mut StdRng) -> (FinishMethod, f64) {
    match rng.gen_range(0..10) {
        0..=2 => (FinishMethod::StrikeFinish, rng.gen_range(30.0..900.0)),
        3..=4 => (FinishMethod::Submission, rng.gen_range(60.0..900.0)),
        5..=8 => (FinishMethod::Decision, 900.0),
        _ => (FinishMethod::Other, rng.gen_range(60.0..900.0)),
    }
}

/// Builds a complete three-feed snapshot. Equal `LeagueSpec`s give equal leagues.
pub fn generate_league(spec: &LeagueSpec) -> FeedSnapshot {
    let mut rng = StdRng::seed_from_u64(spec.seed);
    let n = spec.entities.max(2);

    let mut roster = (0..n)
        .map(|i| {
            let mut entity = Entity::new(format!("E{i:04}"));
            entity.name = Some(format!("Competitor {i}"));
            entity.birth_date = if rng.gen_bool(0.9) {
                spec.start
                    .checked_sub_signed(Duration::days(rng.gen_range(7_300..12_800)))
            } else {
                None
            };
            entity.height_inches = Some(rng.gen_range(62.0..78.0_f64).round());
            entity.weight_lbs = Some(rng.gen_range(125.0..205.0_f64).round());
            entity.reach_inches = rng.gen_bool(0.85).then(|| rng.gen_range(62.0..82.0_f64).round());
            Competitor {
                entity,
                skill: rng.gen_range(-1.5..1.5),
                category: rng.gen_range(0..CATEGORIES.len()),
            }
        })
        .collect::<Vec<_>>();

    let mut participations = Vec::with_capacity(spec.events * 2);
    let mut matchups = Vec::with_capacity(spec.events);
    let mut date = spec.start;

    for e in 0..spec.events {
        if rng.gen_bool(0.35) {
            date += Duration::days(rng.gen_range(3..21));
        }
        let mut picks = (0..n).collect::<Vec<_>>();
        picks.shuffle(&mut rng);
        let (a, b) = (picks[0], picks[1]);

        if rng.gen_bool(0.05) {
            let c = &mut roster[a];
            c.category = (c.category + 1) % CATEGORIES.len();
        }
        let category = CATEGORIES[roster[a].category].to_string();
        let event_id = EventId(format!("EV{e:05}"));

        let gap = roster[a].skill - roster[b].skill;
        let p_a = 1.0 / (1.0 + (-1.2 * gap).exp());
        let undecided = rng.gen_bool(spec.undecided_rate.clamp(0.0, 1.0));
        let a_won = rng.gen_bool(p_a);
        let draw = rng.gen_bool(0.5);
        let (method, seconds) = if undecided {
            (FinishMethod::Other, 900.0)
        } else {
            finish(&mut rng)
        };
        let minutes = seconds / 60.0;

        let (outcome_a, outcome_b) = match (undecided, a_won) {
            (true, _) if draw => (Outcome::Draw, Outcome::Draw),
            (true, _) => (Outcome::NoContest, Outcome::NoContest),
            (false, true) => (Outcome::Win, Outcome::Loss),
            (false, false) => (Outcome::Loss, Outcome::Win),
        };

        for (me, them, outcome) in [(a, b, outcome_a), (b, a, outcome_b)] {
            let observed = rng.gen_bool(0.95);
            participations.push(ParticipationRecord {
                entity_id: roster[me].entity.id.clone(),
                event_id: event_id.clone(),
                event_date: Some(date),
                opponent_id: roster[them].entity.id.clone(),
                outcome,
                finish_method: method,
                category: Some(category.clone()),
                duration_seconds: Some(seconds),
                observations: observed.then(|| {
                    observations(&mut rng, roster[me].skill, outcome.is_win(), minutes)
                }),
            });
        }

        matchups.push(Matchup {
            event_id,
            entity_a_id: roster[a].entity.id.clone(),
            entity_b_id: roster[b].entity.id.clone(),
            event_date: Some(date),
            category: Some(category),
            is_title: rng.gen_bool(0.05),
            outcome_label: outcome_a.decisive(),
        });
    }

    FeedSnapshot::new(
        roster.into_iter().map(|c| c.entity).collect(),
        participations,
        matchups,
    )
}
