use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{FeatureError, Result};

pub const MANIFEST_VERSION: u32 = 1;

/// Audit entry for a feature dropped by the collinearity filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovedFeature {
    pub feature: String,
    pub correlated_with: String,
    pub r: f64,
    pub mi_score_dropped: f64,
    pub mi_score_kept: f64,
}

/// Output of one selection run; the only state persisted between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureManifest {
    pub version: u32,
    /// SHA-256 over the ordered feature names followed by the categorical names.
    pub fingerprint: String,
    pub generated_at: String,
    pub n_training_rows: usize,
    pub n_features_before: usize,
    pub n_features_removed_collinear: usize,
    pub n_features_removed_empty: usize,
    pub n_features_selected: usize,
    pub feature_names: Vec<String>,
    pub mi_scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub removed_collinear: Vec<RemovedFeature>,
    #[serde(default)]
    pub removed_empty: Vec<String>,
    #[serde(default)]
    pub categorical_features: Vec<String>,
}

pub fn fingerprint_of(feature_names: &[String], categorical: &[String]) -> String {
    let mut hasher = Sha256::new();
    for name in feature_names {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
    }
    hasher.update([0xffu8]);
    for name in categorical {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

impl FeatureManifest {
    /// Numeric then categorical names: the key set of an inference map.
    pub fn all_names(&self) -> impl Iterator<Item = &str> {
        self.feature_names
            .iter()
            .chain(self.categorical_features.iter())
            .map(String::as_str)
    }

    pub fn fingerprint_matches(&self) -> bool {
        self.fingerprint == fingerprint_of(&self.feature_names, &self.categorical_features)
    }

    /// Writes `<path>.tmp` and renames it over `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let manifest = serde_json::from_str::<FeatureManifest>(&raw)?;
        if manifest.version != MANIFEST_VERSION {
            return Err(FeatureError::validation(
                "manifest",
                format!(
                    "version {} is not supported (expected {MANIFEST_VERSION})",
                    manifest.version
                ),
            ));
        }
        if !manifest.fingerprint_matches() {
            return Err(FeatureError::validation(
                "manifest",
                "fingerprint does not match the listed feature names",
            ));
        }
        Ok(manifest)
    }
}
