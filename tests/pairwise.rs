use chrono::NaiveDate;

use bout_features::dataset::FeedSnapshot;
use bout_features::differentials::{DIFF_PREFIX, DateRange, PHYSICAL_FEATURES};
use bout_features::inference::FeatureValue;
use bout_features::manifest::{FeatureManifest, MANIFEST_VERSION, fingerprint_of};
use bout_features::records::{Entity, EntityId, Outcome};
use bout_features::synthetic::{LeagueSpec, generate_league};
use bout_features::{FeatureConfig, FeatureError, FeaturePipeline};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn league() -> FeedSnapshot {
    generate_league(&LeagueSpec {
        entities: 24,
        events: 180,
        seed: 3,
        ..LeagueSpec::default()
    })
}

fn manifest_with(names: &[&str]) -> FeatureManifest {
    let feature_names = names.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    let categorical = vec!["category".to_string()];
    FeatureManifest {
        version: MANIFEST_VERSION,
        fingerprint: fingerprint_of(&feature_names, &categorical),
        generated_at: "2024-01-01T00:00:00Z".to_string(),
        n_training_rows: 0,
        n_features_before: feature_names.len(),
        n_features_removed_collinear: 0,
        n_features_removed_empty: 0,
        n_features_selected: feature_names.len(),
        mi_scores: Default::default(),
        feature_names,
        removed_collinear: Vec::new(),
        removed_empty: Vec::new(),
        categorical_features: categorical,
    }
}

#[test]
fn swapping_sides_negates_every_differential() {
    let snapshot = league();
    let mut swapped = snapshot.clone();
    swapped.matchups = snapshot.matchups.iter().map(|m| m.swapped()).collect();

    let forward = FeaturePipeline::new(snapshot, FeatureConfig::default())
        .unwrap()
        .build_training_matrix(DateRange::default())
        .unwrap();
    let backward = FeaturePipeline::new(swapped, FeatureConfig::default())
        .unwrap()
        .build_training_matrix(DateRange::default())
        .unwrap();

    assert_eq!(forward.len(), backward.len());
    assert!(!forward.is_empty());
    for (idx, name) in forward.feature_names.iter().enumerate() {
        let negated = name.starts_with(DIFF_PREFIX) || PHYSICAL_FEATURES.contains(&name.as_str());
        for (f, b) in forward.rows.iter().zip(&backward.rows) {
            assert_eq!(f.event_id, b.event_id);
            assert_eq!(f.label, !b.label);
            if negated {
                assert_eq!(f.features[idx], b.features[idx].map(|v| -v), "{name}");
            } else {
                assert_eq!(f.features[idx], b.features[idx], "{name}");
            }
        }
    }
}

#[test]
fn undecided_events_never_reach_the_matrix() {
    let snapshot = generate_league(&LeagueSpec {
        undecided_rate: 0.3,
        ..LeagueSpec::default()
    });
    let undecided = snapshot
        .matchups
        .iter()
        .filter(|m| m.outcome_label.is_none())
        .map(|m| m.event_id.clone())
        .collect::<Vec<_>>();
    assert!(!undecided.is_empty());

    let matrix = FeaturePipeline::new(snapshot, FeatureConfig::default())
        .unwrap()
        .build_training_matrix(DateRange::default())
        .unwrap();
    for event in &undecided {
        assert!(matrix.row(event).is_none());
    }
}

#[test]
fn date_range_restricts_rows_but_not_history() {
    let pipeline = FeaturePipeline::new(league(), FeatureConfig::default()).unwrap();
    let full = pipeline.build_training_matrix(DateRange::default()).unwrap();
    let from = full.rows[full.len() / 2].event_date;
    let late = pipeline
        .build_training_matrix(DateRange {
            from: Some(from),
            to: None,
        })
        .unwrap();

    assert!(late.len() < full.len());
    for row in &late.rows {
        assert!(row.event_date >= from);
        assert_eq!(full.row(&row.event_id), Some(row));
    }
}

#[test]
fn self_pairing_is_a_validation_error() {
    let mut snapshot = league();
    let first = snapshot.matchups[0].clone();
    snapshot.matchups[0].entity_b_id = first.entity_a_id.clone();
    let pipeline = FeaturePipeline::new(snapshot, FeatureConfig::default()).unwrap();
    assert!(matches!(
        pipeline.build_training_matrix(DateRange::default()),
        Err(FeatureError::Validation { .. })
    ));
}

#[test]
fn two_debutants_with_equal_builds_have_zero_differentials() {
    let twin = |id: &str| {
        let mut e = Entity::new(id);
        e.birth_date = Some(date(1994, 6, 1));
        e.height_inches = Some(70.0);
        e.weight_lbs = Some(155.0);
        e.reach_inches = Some(72.0);
        e
    };
    let snapshot = FeedSnapshot::new(vec![twin("n1"), twin("n2")], Vec::new(), Vec::new());
    let pipeline = FeaturePipeline::new(snapshot, FeatureConfig::default()).unwrap();
    let features = pipeline
        .build_inference_features(
            &EntityId::from("n1"),
            &EntityId::from("n2"),
            Some("Lightweight"),
            Some(date(2024, 5, 4)),
            None,
        )
        .unwrap();

    for name in PHYSICAL_FEATURES {
        assert_eq!(features.number(name), Some(0.0), "{name}");
    }
    assert_eq!(features.number("diff_days_since_last_event"), Some(0.0));
    assert_eq!(features.number("diff_roll_sig_str_pct"), None);
    assert_eq!(features.number("is_title_event"), Some(0.0));
    assert_eq!(
        features.get("category"),
        Some(&FeatureValue::Category(Some("Lightweight".to_string())))
    );
}

#[test]
fn debutant_against_veteran_uses_debut_layoff() {
    let snapshot = league();
    let veteran = snapshot.participations[0].entity_id.clone();
    let mut snapshot = snapshot;
    snapshot
        .entities
        .insert(EntityId::from("rookie"), Entity::new("rookie"));
    let pipeline = FeaturePipeline::new(snapshot, FeatureConfig::default()).unwrap();

    let as_of = date(2030, 1, 1);
    let history = pipeline.histories.get(&veteran).unwrap();
    let last = history.entries.last().unwrap().event_date;
    let features = pipeline
        .build_inference_features(&veteran, &EntityId::from("rookie"), None, Some(as_of), None)
        .unwrap();

    let layoff = (as_of - last).num_days() as f64;
    assert_eq!(
        features.number("diff_days_since_last_event"),
        Some(layoff - 365.0)
    );
    assert_eq!(
        features.number("experience_diff"),
        Some(history.len() as f64)
    );
}

#[test]
fn point_query_ignores_events_on_or_after_as_of() {
    let pipeline = FeaturePipeline::new(league(), FeatureConfig::default()).unwrap();
    let matrix = pipeline.build_training_matrix(DateRange::default()).unwrap();

    let mut shared_days = 0;
    for row in &matrix.rows {
        let busy = [&row.entity_a_id, &row.entity_b_id].iter().any(|id| {
            let h = pipeline.histories.get(id).unwrap();
            h.entries.iter().filter(|p| p.event_date == row.event_date).count() > 1
        });
        shared_days += usize::from(busy);

        let features = pipeline
            .build_inference_features(
                &row.entity_a_id,
                &row.entity_b_id,
                row.category.as_deref(),
                Some(row.event_date),
                None,
            )
            .unwrap();
        for name in [
            "experience_diff",
            "win_streak_diff",
            "loss_streak_diff",
            "diff_roll_sig_str_pct",
            "diff_strength_of_schedule",
            "diff_defense_score",
            "diff_aggression_score",
            "diff_days_since_last_event",
        ] {
            let idx = matrix.column_index(name).unwrap();
            assert_eq!(features.number(name), row.features[idx], "{name} at {}", row.event_id);
        }
    }
    assert!(shared_days > 0);
}

#[test]
fn manifest_fixes_keys_and_order() {
    let pipeline = FeaturePipeline::new(league(), FeatureConfig::default()).unwrap();
    let ids = pipeline.snapshot.entities.keys().cloned().collect::<Vec<_>>();
    let manifest = manifest_with(&["diff_ko_rate", "reach_diff_inches", "diff_roll_kd"]);

    let features = pipeline
        .build_inference_features(&ids[0], &ids[1], None, Some(date(2030, 1, 1)), Some(&manifest))
        .unwrap();
    assert_eq!(
        features.names().collect::<Vec<_>>(),
        vec!["diff_ko_rate", "reach_diff_inches", "diff_roll_kd", "category"]
    );

    let json = serde_json::to_value(&features).unwrap();
    assert_eq!(json.as_object().unwrap().len(), 4);
}

#[test]
fn unknown_manifest_feature_fails_the_query() {
    let pipeline = FeaturePipeline::new(league(), FeatureConfig::default()).unwrap();
    let ids = pipeline.snapshot.entities.keys().cloned().collect::<Vec<_>>();
    let manifest = manifest_with(&["diff_ko_rate", "diff_vibes"]);
    let err = pipeline
        .build_inference_features(&ids[0], &ids[1], None, None, Some(&manifest))
        .unwrap_err();
    assert!(matches!(err, FeatureError::UnknownFeature(name) if name == "diff_vibes"));
}

#[test]
fn unknown_entity_is_reported() {
    let pipeline = FeaturePipeline::new(league(), FeatureConfig::default()).unwrap();
    let known = pipeline.snapshot.participations[0].entity_id.clone();
    let err = pipeline
        .build_inference_features(&known, &EntityId::from("ghost"), None, None, None)
        .unwrap_err();
    assert!(matches!(err, FeatureError::EntityNotFound(id) if id.0 == "ghost"));
}

#[test]
fn draw_outcomes_exist_in_generated_feed() {
    let snapshot = generate_league(&LeagueSpec {
        undecided_rate: 0.5,
        ..LeagueSpec::default()
    });
    assert!(
        snapshot
            .participations
            .iter()
            .any(|p| p.outcome == Outcome::Draw)
    );
}
