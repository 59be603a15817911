//! Loaded-once snapshot plus every derived per-entity structure, built in
//! one pass and shared by the bulk and point-query paths.

use std::path::Path;

use chrono::{Local, NaiveDate};
use tracing::info;

use crate::config::FeatureConfig;
use crate::dataset::FeedSnapshot;
use crate::differentials::{self, DateRange, TrainingMatrix};
use crate::entity_frame::EntityFeatureSet;
use crate::error::Result;
use crate::export;
use crate::history::EntityHistories;
use crate::inference::{self, InferenceFeatures, MatchupQuery};
use crate::manifest::FeatureManifest;
use crate::records::EntityId;
use crate::selection;

pub struct FeaturePipeline {
    pub snapshot: FeedSnapshot,
    pub histories: EntityHistories,
    pub features: EntityFeatureSet,
    pub config: FeatureConfig,
}

impl FeaturePipeline {
    /// Validates and sorts every history, then computes all entity rows.
    /// A feed error aborts before anything is built.
    pub fn new(snapshot: FeedSnapshot, config: FeatureConfig) -> Result<Self> {
        let histories = EntityHistories::from_records(&snapshot.participations)?;
        info!(
            entities = histories.len(),
            participations = histories.participation_count(),
            matchups = snapshot.matchups.len(),
            "histories sorted"
        );
        let features = EntityFeatureSet::build(&histories, &snapshot.entities, &config);
        Ok(Self {
            snapshot,
            histories,
            features,
            config,
        })
    }

    pub fn from_db(path: &Path, config: FeatureConfig) -> Result<Self> {
        let snapshot = FeedSnapshot::load_path(path)?;
        Self::new(snapshot, config)
    }

    pub fn build_training_matrix(&self, range: DateRange) -> Result<TrainingMatrix> {
        differentials::build_training_matrix(&self.snapshot, &self.histories, &self.features, range)
    }

    /// Builds the matrix and writes it to `path`. Nothing is written when the
    /// build fails.
    pub fn export_training_matrix(&self, range: DateRange, path: &Path) -> Result<TrainingMatrix> {
        let matrix = self.build_training_matrix(range)?;
        export::write_training_matrix(&matrix, path)?;
        Ok(matrix)
    }

    /// Point query; `as_of` defaults to today.
    pub fn build_inference_features(
        &self,
        entity_a_id: &EntityId,
        entity_b_id: &EntityId,
        category: Option<&str>,
        as_of: Option<NaiveDate>,
        manifest: Option<&FeatureManifest>,
    ) -> Result<InferenceFeatures> {
        let query = MatchupQuery {
            entity_a_id: entity_a_id.clone(),
            entity_b_id: entity_b_id.clone(),
            category: category.map(str::to_string),
            as_of: as_of.unwrap_or_else(|| Local::now().date_naive()),
        };
        inference::build_inference_features(
            &self.snapshot,
            &self.histories,
            &self.features,
            &self.config,
            manifest,
            &query,
        )
    }

    pub fn run_selection(&self, range: DateRange) -> Result<FeatureManifest> {
        let matrix = self.build_training_matrix(range)?;
        selection::run_feature_selection(&matrix, &self.config)
    }

    /// Runs selection over the full history and persists the manifest.
    pub fn select_and_save(&self, path: &Path) -> Result<FeatureManifest> {
        let manifest = self.run_selection(DateRange::default())?;
        manifest.save(path)?;
        info!(
            selected = manifest.n_features_selected,
            path = %path.display(),
            "manifest written"
        );
        Ok(manifest)
    }
}
