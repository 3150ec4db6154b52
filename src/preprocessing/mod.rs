//! Data preprocessing module
//!
//! Cleans raw housing listings into numeric feature frames:
//! - Training-row outlier removal
//! - Text normalization and derived floor-level/tenure fields
//! - Geocoordinate repair and optional auxiliary enrichment
//! - Categorical, one-hot and target encoding
//! - Spatial and KNN imputation of missing values

pub mod auxiliary;
pub mod columns;
mod config;
pub mod encoder;
pub mod geo;
pub mod outlier;
mod pipeline;
mod scaler;
pub mod transforms;

pub use auxiliary::AuxiliaryData;
pub use config::{GeoConfig, ImputationConfig, OutlierConfig, PipelineConfig};
pub use encoder::{CategoryEncoder, CategoryMapping, TargetEncoder, UNSEEN_CODE};
pub use geo::SpatialLabelIndex;
pub use outlier::drop_outliers;
pub use pipeline::{FeaturePipeline, FittedPipeline, ProcessedData};
pub use scaler::{ScalerType, TargetScaler};
