use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use bout_features::dataset::{self, count_rows};
use bout_features::differentials::DateRange;
use bout_features::logging::{init_tracing, json_from_env};
use bout_features::manifest::FeatureManifest;
use bout_features::records::EntityId;
use bout_features::synthetic::{LeagueSpec, generate_league};
use bout_features::{FeatureConfig, FeaturePipeline};

#[derive(Parser, Debug)]
#[command(name = "bout_features", about = "Point-in-time features for two-party contests")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a synthetic league into the database.
    Seed {
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long, default_value_t = 40)]
        entities: usize,
        #[arg(long, default_value_t = 300)]
        events: usize,
        #[arg(long, default_value_t = 7)]
        seed: u64,
    },
    /// Build the training matrix and export it as Parquet.
    Matrix {
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Run feature selection and write the manifest.
    Select {
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long)]
        manifest: Option<PathBuf>,
    },
    /// Print the feature map of a hypothetical matchup as JSON.
    Predict {
        entity_a: String,
        entity_b: String,
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        as_of: Option<NaiveDate>,
        #[arg(long)]
        manifest: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    init_tracing(json_from_env());

    let cli = Cli::parse();
    let mut config = FeatureConfig::from_env();

    match cli.command {
        Command::Seed {
            db,
            entities,
            events,
            seed,
        } => {
            let db_path = db.unwrap_or(config.db_path);
            let league = generate_league(&LeagueSpec {
                entities,
                events,
                seed,
                ..LeagueSpec::default()
            });
            let mut conn = dataset::open_db(&db_path)
                .with_context(|| format!("unable to open {}", db_path.display()))?;
            league.write(&mut conn).context("failed to write synthetic league")?;
            println!("Synthetic league written");
            println!("DB: {}", db_path.display());
            for table in ["entities", "participations", "matchups"] {
                println!("{table}: {}", count_rows(&conn, table)?);
            }
        }
        Command::Matrix { db, from, to, out } => {
            if let Some(db) = db {
                config.db_path = db;
            }
            let out = out.unwrap_or_else(|| config.matrix_path.clone());
            let pipeline = load(config)?;
            let matrix = pipeline
                .export_training_matrix(DateRange { from, to }, &out)
                .context("failed to build training matrix")?;
            println!("Training matrix: {} rows x {} features", matrix.len(), matrix.feature_names.len());
            println!("Written: {}", out.display());
        }
        Command::Select { db, manifest } => {
            if let Some(db) = db {
                config.db_path = db;
            }
            let path = manifest.unwrap_or_else(|| config.manifest_path.clone());
            let pipeline = load(config)?;
            let manifest = pipeline
                .select_and_save(&path)
                .context("feature selection failed")?;
            println!(
                "Selected {}/{} features ({} collinear, {} empty removed)",
                manifest.n_features_selected,
                manifest.n_features_before,
                manifest.n_features_removed_collinear,
                manifest.n_features_removed_empty
            );
            for name in manifest.feature_names.iter().take(10) {
                let score = manifest.mi_scores.get(name).copied().unwrap_or(0.0);
                println!("  {name:<36} {score:.6}");
            }
            println!("Manifest: {}", path.display());
        }
        Command::Predict {
            entity_a,
            entity_b,
            db,
            category,
            as_of,
            manifest,
        } => {
            if let Some(db) = db {
                config.db_path = db;
            }
            let manifest = manifest
                .map(|path| {
                    FeatureManifest::load(&path)
                        .with_context(|| format!("unable to read manifest {}", path.display()))
                })
                .transpose()?;
            let pipeline = load(config)?;
            let features = pipeline
                .build_inference_features(
                    &EntityId(entity_a),
                    &EntityId(entity_b),
                    category.as_deref(),
                    as_of,
                    manifest.as_ref(),
                )
                .context("point query failed")?;
            println!("{}", serde_json::to_string_pretty(&features)?);
        }
    }
    Ok(())
}

fn load(config: FeatureConfig) -> Result<FeaturePipeline> {
    let db_path = config.db_path.clone();
    FeaturePipeline::from_db(&db_path, config)
        .with_context(|| format!("unable to build features from {}", db_path.display()))
}
