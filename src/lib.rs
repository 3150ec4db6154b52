//! Housing AutoML - feature pipeline and model selection for property prices
//!
//! This crate turns raw housing listings into a clean numeric feature table
//! and picks a regressor for it by cross-validated hyperparameter search:
//! - [`preprocessing`]: outlier removal, text cleanup, coordinate repair,
//!   categorical and target encoding, spatial and KNN imputation
//! - [`training`]: regression estimators behind a common [`training::Regressor`] trait
//! - [`optimizer`]: grid and random search scored by k-fold RMSE, with JSON reports
//! - [`utils`]: CSV input and submission/report output

pub mod cli;
pub mod error;
pub mod imputation;
pub mod optimizer;
pub mod preprocessing;
pub mod training;
pub mod utils;

pub use error::{AutomlError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{AutomlError, Result};
    pub use crate::imputation::{Imputer, KNNImputer};
    pub use crate::optimizer::{
        param_grid, GridSearchRegressor, ParamGrid, ParamValue, SearchConfig, SearchReport, SearchStrategy,
    };
    pub use crate::preprocessing::{AuxiliaryData, FeaturePipeline, PipelineConfig, ProcessedData};
    pub use crate::training::{ModelKind, Regressor, TransformedTargetRegressor};
    pub use crate::utils::{read_csv, write_report, write_submission};
}
