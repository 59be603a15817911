pub mod config;
pub mod dataset;
pub mod differentials;
pub mod entity_frame;
pub mod error;
pub mod export;
pub mod history;
pub mod inference;
pub mod logging;
pub mod manifest;
pub mod opponent_quality;
pub mod pipeline;
pub mod records;
pub mod rolling;
pub mod selection;
pub mod streaks;
pub mod style;
pub mod synthetic;
pub mod temporal;
pub mod time_features;

pub use config::FeatureConfig;
pub use error::{FeatureError, Result};
pub use pipeline::FeaturePipeline;
