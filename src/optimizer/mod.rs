//! Hyperparameter search module
//!
//! Provides cross-validated model selection:
//! - Parameter grids with typed values
//! - Exhaustive grid search and seeded random search
//! - k-fold scoring by negated RMSE, run in parallel
//! - JSON reports with fold summaries and model diagnostics

mod config;
mod grid_search;
mod report;
mod search_space;

pub use config::{SearchConfig, SearchStrategy};
pub use grid_search::GridSearchRegressor;
pub use report::{CvResults, RmseSummary, SearchReport, SummaryStats};
pub use search_space::{
    grid_candidates, grid_size, param_grid, sample_candidates, strip_regressor_prefix, HyperParams, ParamGrid,
    ParamValue, REGRESSOR_PREFIX,
};
