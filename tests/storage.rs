use std::fs::File;

use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::RowAccessor;

use bout_features::dataset::{self, FeedSnapshot, count_rows};
use bout_features::differentials::DateRange;
use bout_features::synthetic::{LeagueSpec, generate_league};
use bout_features::{FeatureConfig, FeatureError, FeaturePipeline};

fn small_league() -> FeedSnapshot {
    generate_league(&LeagueSpec {
        entities: 12,
        events: 90,
        seed: 21,
        ..LeagueSpec::default()
    })
}

#[test]
fn sqlite_round_trip_preserves_the_training_matrix() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("data").join("bouts.sqlite");
    let league = small_league();

    let mut conn = dataset::open_db(&db_path).unwrap();
    league.write(&mut conn).unwrap();
    // Writing twice upserts in place.
    league.write(&mut conn).unwrap();
    assert_eq!(count_rows(&conn, "entities").unwrap(), 12);
    assert_eq!(count_rows(&conn, "participations").unwrap(), 180);
    assert_eq!(count_rows(&conn, "matchups").unwrap(), 90);
    assert!(count_rows(&conn, "sqlite_master").is_err());
    drop(conn);

    let expected = FeaturePipeline::new(league, FeatureConfig::default())
        .unwrap()
        .build_training_matrix(DateRange::default())
        .unwrap();
    let loaded = FeaturePipeline::from_db(&db_path, FeatureConfig::default())
        .unwrap()
        .build_training_matrix(DateRange::default())
        .unwrap();
    assert_eq!(loaded, expected);
}

#[test]
fn unparsable_participation_date_is_a_validation_error() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("bouts.sqlite");
    let conn = dataset::open_db(&db_path).unwrap();
    conn.execute(
        "INSERT INTO participations (entity_id, event_id, event_date, opponent_id, outcome, finish_method)
         VALUES ('x', 'e1', '2021-13-45', 'y', 'W', 'KO/TKO')",
        [],
    )
    .unwrap();
    drop(conn);

    let err = FeedSnapshot::load_path(&db_path).unwrap_err();
    assert!(matches!(
        err,
        FeatureError::Validation {
            feed: "participations",
            ..
        }
    ));
}

#[test]
fn unknown_outcome_code_is_a_validation_error() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("bouts.sqlite");
    let conn = dataset::open_db(&db_path).unwrap();
    conn.execute(
        "INSERT INTO participations (entity_id, event_id, event_date, opponent_id, outcome, finish_method)
         VALUES ('x', 'e1', '2021-03-04', 'y', 'maybe', 'Decision - Split')",
        [],
    )
    .unwrap();
    drop(conn);

    assert!(matches!(
        FeedSnapshot::load_path(&db_path),
        Err(FeatureError::Validation { .. })
    ));
}

#[test]
fn parquet_export_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out").join("training_data.parquet");
    let pipeline = FeaturePipeline::new(small_league(), FeatureConfig::default()).unwrap();
    let matrix = pipeline
        .export_training_matrix(DateRange::default(), &out)
        .unwrap();
    assert!(!out.with_extension("parquet.tmp").exists());

    let reader = SerializedFileReader::new(File::open(&out).unwrap()).unwrap();
    let meta = reader.metadata().file_metadata();
    assert_eq!(meta.num_rows() as usize, matrix.len());
    assert_eq!(
        meta.schema_descr().num_columns(),
        matrix.feature_names.len() + 6
    );

    let mut wins = 0usize;
    let mut seen = 0usize;
    for (row, expected) in reader.get_row_iter(None).unwrap().zip(&matrix.rows) {
        let row = row.unwrap();
        assert_eq!(row.get_string(0).unwrap(), &expected.event_id.0);
        assert_eq!(row.get_long(5).unwrap(), i64::from(expected.label));
        wins += usize::from(row.get_long(5).unwrap() == 1);
        seen += 1;
    }
    assert_eq!(seen, matrix.len());
    assert_eq!(wins, matrix.labels().iter().filter(|l| **l).count());
}
