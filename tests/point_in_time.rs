use chrono::NaiveDate;

use bout_features::FeatureConfig;
use bout_features::dataset::FeedSnapshot;
use bout_features::pipeline::FeaturePipeline;
use bout_features::records::{
    Entity, EntityId, EventId, FinishMethod, Matchup, Observations, Outcome, ParticipationRecord,
};
use bout_features::synthetic::{LeagueSpec, generate_league};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn obs(sig_landed: f64, sig_att: f64) -> Observations {
    Observations {
        sig_str_landed: sig_landed,
        sig_str_attempted: sig_att,
        total_str_landed: sig_landed,
        total_str_attempted: sig_att,
        ..Observations::default()
    }
}

/// Both sides of one event, `a` recording `outcome`.
fn bout(
    event: &str,
    on: NaiveDate,
    a: &str,
    b: &str,
    outcome: Outcome,
    a_obs: Option<Observations>,
) -> [ParticipationRecord; 2] {
    let mirrored = match outcome {
        Outcome::Win => Outcome::Loss,
        Outcome::Loss => Outcome::Win,
        other => other,
    };
    let side = |me: &str, them: &str, outcome, observations| ParticipationRecord {
        entity_id: EntityId::from(me),
        event_id: EventId::from(event),
        event_date: Some(on),
        opponent_id: EntityId::from(them),
        outcome,
        finish_method: FinishMethod::Decision,
        category: Some("Lightweight".to_string()),
        duration_seconds: Some(900.0),
        observations,
    };
    [side(a, b, outcome, a_obs), side(b, a, mirrored, Some(obs(5.0, 10.0)))]
}

fn matchup(event: &str, on: NaiveDate, a: &str, b: &str, label: Option<bool>) -> Matchup {
    Matchup {
        event_id: EventId::from(event),
        entity_a_id: EntityId::from(a),
        entity_b_id: EntityId::from(b),
        event_date: Some(on),
        category: Some("Lightweight".to_string()),
        is_title: false,
        outcome_label: label,
    }
}

fn pipeline(bouts: Vec<[ParticipationRecord; 2]>, matchups: Vec<Matchup>) -> FeaturePipeline {
    let participations = bouts.into_iter().flatten().collect::<Vec<_>>();
    let mut ids = participations
        .iter()
        .map(|p| p.entity_id.0.clone())
        .collect::<Vec<_>>();
    ids.sort();
    ids.dedup();
    let entities = ids.into_iter().map(Entity::new).collect();
    FeaturePipeline::new(
        FeedSnapshot::new(entities, participations, matchups),
        FeatureConfig::default(),
    )
    .unwrap()
}

#[test]
fn win_win_loss_leaves_a_one_event_losing_streak() {
    let p = pipeline(
        vec![
            bout("e1", date(2020, 1, 1), "x", "o1", Outcome::Win, None),
            bout("e2", date(2020, 3, 1), "x", "o2", Outcome::Win, None),
            bout("e3", date(2020, 5, 1), "x", "o3", Outcome::Loss, None),
        ],
        Vec::new(),
    );
    let x = EntityId::from("x");
    let history = p.histories.get(&x).unwrap().truncated_before(date(2020, 7, 1));
    let row = p.features.pending_for(&history, None, &p.config);
    assert_eq!(row.career.win_streak, 0.0);
    assert_eq!(row.career.loss_streak, 1.0);
    assert_eq!(row.career.total_events_before, 3.0);

    let at_e3 = p.features.row(&x, &EventId::from("e3")).unwrap();
    assert_eq!(at_e3.career.win_streak, 2.0);
    assert_eq!(at_e3.career.loss_streak, 0.0);
}

#[test]
fn draws_do_not_break_or_extend_streaks() {
    let p = pipeline(
        vec![
            bout("e1", date(2020, 1, 1), "x", "o1", Outcome::Win, None),
            bout("e2", date(2020, 2, 1), "x", "o2", Outcome::Draw, None),
            bout("e3", date(2020, 3, 1), "x", "o3", Outcome::Win, None),
            bout("e4", date(2020, 4, 1), "x", "o4", Outcome::NoContest, None),
        ],
        Vec::new(),
    );
    let pending = p.features.pending(&EntityId::from("x")).unwrap();
    assert_eq!(pending.career.win_streak, 2.0);
    assert_eq!(pending.career.total_events_before, 4.0);
    assert_eq!(pending.career.wins_before, 2.0);
}

#[test]
fn rolling_accuracy_pools_numerators_and_denominators() {
    let p = pipeline(
        vec![
            bout("e1", date(2021, 1, 1), "x", "o1", Outcome::Win, Some(obs(10.0, 20.0))),
            bout("e2", date(2021, 2, 1), "x", "o2", Outcome::Win, Some(obs(9.0, 10.0))),
            bout("e3", date(2021, 3, 1), "x", "o3", Outcome::Win, Some(obs(1.0, 10.0))),
        ],
        Vec::new(),
    );
    let x = EntityId::from("x");
    let e2 = p.features.row(&x, &EventId::from("e2")).unwrap();
    assert_eq!(e2.rolling.roll_sig_str_pct, Some(0.5));

    // (10 + 9) / (20 + 10), not the mean of 0.5 and 0.9.
    let e3 = p.features.row(&x, &EventId::from("e3")).unwrap();
    let pooled = e3.rolling.roll_sig_str_pct.unwrap();
    assert!((pooled - 19.0 / 30.0).abs() < 1e-12);
}

#[test]
fn zero_attempts_give_null_ratios() {
    let p = pipeline(
        vec![
            bout("e1", date(2021, 1, 1), "x", "o1", Outcome::Win, Some(obs(0.0, 0.0))),
            bout("e2", date(2021, 2, 1), "x", "o2", Outcome::Win, Some(obs(0.0, 0.0))),
        ],
        Vec::new(),
    );
    let row = p
        .features
        .row(&EntityId::from("x"), &EventId::from("e2"))
        .unwrap();
    assert_eq!(row.rolling.roll_sig_str_pct, None);
    assert_eq!(row.rolling.roll_td_pct, None);
    assert_eq!(row.rolling.ewa_sig_str_pct, None);
    assert_eq!(row.style.striking_ratio, None);
    assert_eq!(row.style.grappling_ratio, None);
}

#[test]
fn debut_rows_carry_null_aggregates() {
    let p = pipeline(
        vec![bout("e1", date(2021, 1, 1), "x", "o1", Outcome::Win, Some(obs(3.0, 6.0)))],
        vec![matchup("e1", date(2021, 1, 1), "x", "o1", Some(true))],
    );
    let row = p
        .features
        .row(&EntityId::from("x"), &EventId::from("e1"))
        .unwrap();
    assert!(row.is_debut());
    assert_eq!(row.rolling.roll_sig_str_pct, None);
    assert_eq!(row.style.defense_score, None);
    assert_eq!(row.opponent.avg_opponent_win_pct, None);
    assert_eq!(row.opponent.strength_of_schedule, 0.0);
    assert_eq!(row.time.days_since_last_event, Some(365.0));
}

#[test]
fn streaks_are_mutually_exclusive_across_a_league() {
    let league = generate_league(&LeagueSpec {
        entities: 20,
        events: 150,
        ..LeagueSpec::default()
    });
    let p = FeaturePipeline::new(league, FeatureConfig::default()).unwrap();
    for row in p.features.rows() {
        let career = row.career;
        assert!(career.win_streak == 0.0 || career.loss_streak == 0.0);
        if career.win_streak == 0.0 && career.loss_streak == 0.0 {
            // Only debuts, or histories made solely of draws and no-contests.
            assert_eq!(career.wins_before + career.losses_before, 0.0);
        }
    }
}

#[test]
fn schedule_strength_is_monotonic_and_win_pct_bounded() {
    let league = generate_league(&LeagueSpec {
        entities: 16,
        events: 200,
        seed: 11,
        ..LeagueSpec::default()
    });
    let p = FeaturePipeline::new(league, FeatureConfig::default()).unwrap();
    for history in p.histories.iter() {
        let mut previous = 0.0;
        for entry in &history.entries {
            let row = p.features.row(&history.entity_id, &entry.event_id).unwrap();
            assert!(row.opponent.strength_of_schedule >= previous);
            previous = row.opponent.strength_of_schedule;
            if let Some(pct) = row.opponent.avg_opponent_win_pct {
                assert!((0.0..=1.0).contains(&pct));
            }
        }
        let pending = p.features.pending(&history.entity_id).unwrap();
        assert!(pending.opponent.strength_of_schedule >= previous);
    }
}

#[test]
fn opponent_record_is_taken_at_the_shared_event() {
    // o beats two others, then meets x; x should see o at 2 wins from 2 events.
    let p = pipeline(
        vec![
            bout("e1", date(2022, 1, 1), "o", "p1", Outcome::Win, None),
            bout("e2", date(2022, 2, 1), "o", "p2", Outcome::Win, None),
            bout("e3", date(2022, 3, 1), "x", "o", Outcome::Loss, None),
            bout("e4", date(2022, 4, 1), "x", "p3", Outcome::Win, None),
        ],
        Vec::new(),
    );
    let row = p
        .features
        .row(&EntityId::from("x"), &EventId::from("e4"))
        .unwrap();
    assert_eq!(row.opponent.avg_opponent_win_pct, Some(1.0));
    assert_eq!(row.opponent.strength_of_schedule, 1.0);
    assert_eq!(row.opponent.avg_opponent_losses, Some(0.0));
}

#[test]
fn same_day_events_do_not_see_each_other() {
    let full = pipeline(
        vec![
            bout("e1", date(2020, 1, 1), "x", "o1", Outcome::Win, None),
            bout("e2", date(2020, 1, 1), "x", "o2", Outcome::Win, None),
        ],
        Vec::new(),
    );
    let cut = pipeline(
        vec![bout("e2", date(2020, 1, 1), "x", "o2", Outcome::Win, None)],
        Vec::new(),
    );
    let x = EntityId::from("x");
    let e2 = EventId::from("e2");
    let row = full.features.row(&x, &e2).unwrap();
    assert_eq!(row, cut.features.row(&x, &e2).unwrap());
    assert!(row.is_debut());
    assert_eq!(row.career.win_streak, 0.0);
    assert_eq!(row.time.days_since_last_event, Some(365.0));
    assert_eq!(row.style.aggression_score, None);

    // The pending row absorbs both.
    let pending = full.features.pending(&x).unwrap();
    assert_eq!(pending.career.total_events_before, 2.0);
    assert_eq!(pending.career.win_streak, 2.0);
}

#[test]
fn opponent_record_ignores_the_opponents_same_day_events() {
    // o wins e1, then loses e2 and meets x on the same later date.
    let p = pipeline(
        vec![
            bout("e1", date(2022, 1, 1), "o", "p1", Outcome::Win, None),
            bout("e2", date(2022, 3, 1), "o", "p2", Outcome::Loss, None),
            bout("e3", date(2022, 3, 1), "x", "o", Outcome::Loss, None),
            bout("e4", date(2022, 4, 1), "x", "p3", Outcome::Win, None),
        ],
        Vec::new(),
    );
    let row = p
        .features
        .row(&EntityId::from("x"), &EventId::from("e4"))
        .unwrap();
    assert_eq!(row.opponent.avg_opponent_win_pct, Some(1.0));
    assert_eq!(row.opponent.avg_opponent_losses, Some(0.0));
}

#[test]
fn missing_participation_date_is_rejected() {
    let mut records = bout("e1", date(2021, 1, 1), "x", "o", Outcome::Win, None);
    records[0].event_date = None;
    let err = FeaturePipeline::new(
        FeedSnapshot::new(Vec::new(), records.to_vec(), Vec::new()),
        FeatureConfig::default(),
    );
    assert!(matches!(
        err,
        Err(bout_features::FeatureError::Validation { .. })
    ));
}
