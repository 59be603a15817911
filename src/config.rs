use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Tunables of one feature run.
///
/// Defaults are overridden by `FEATURES_*` environment variables; invalid or
/// empty values fall back to the default silently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub rolling_window: usize,
    pub ewm_alpha: f64,
    pub debut_days_since_last_event: f64,
    pub collinearity_threshold: f64,
    pub mi_neighbors: usize,
    pub mi_seed: u64,
    pub db_path: PathBuf,
    pub manifest_path: PathBuf,
    pub matrix_path: PathBuf,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            rolling_window: 3,
            ewm_alpha: 0.5,
            debut_days_since_last_event: 365.0,
            collinearity_threshold: 0.90,
            mi_neighbors: 3,
            mi_seed: 42,
            db_path: PathBuf::from("data/bouts.sqlite"),
            manifest_path: PathBuf::from("data/selected_features.json"),
            matrix_path: PathBuf::from("data/training_data.parquet"),
        }
    }
}

impl FeatureConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            rolling_window: parsed_env("FEATURES_ROLLING_WINDOW")
                .unwrap_or(d.rolling_window)
                .max(1),
            ewm_alpha: parsed_env::<f64>("FEATURES_EWM_ALPHA")
                .filter(|a| *a > 0.0 && *a <= 1.0)
                .unwrap_or(d.ewm_alpha),
            debut_days_since_last_event: parsed_env("FEATURES_DEBUT_DAYS")
                .unwrap_or(d.debut_days_since_last_event),
            collinearity_threshold: parsed_env::<f64>("FEATURES_COLLINEARITY_THRESHOLD")
                .filter(|t| *t > 0.0 && *t <= 1.0)
                .unwrap_or(d.collinearity_threshold),
            mi_neighbors: parsed_env("FEATURES_MI_NEIGHBORS")
                .unwrap_or(d.mi_neighbors)
                .max(1),
            mi_seed: parsed_env("FEATURES_MI_SEED").unwrap_or(d.mi_seed),
            db_path: path_env("FEATURES_DB_PATH").unwrap_or(d.db_path),
            manifest_path: path_env("FEATURES_MANIFEST_PATH").unwrap_or(d.manifest_path),
            matrix_path: path_env("FEATURES_MATRIX_PATH").unwrap_or(d.matrix_path),
        }
    }
}

fn opt_env(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|val| {
        if val.trim().is_empty() {
            None
        } else {
            Some(val)
        }
    })
}

fn parsed_env<T: FromStr>(key: &str) -> Option<T> {
    opt_env(key).and_then(|val| val.trim().parse::<T>().ok())
}

fn path_env(key: &str) -> Option<PathBuf> {
    opt_env(key).map(PathBuf::from)
}
