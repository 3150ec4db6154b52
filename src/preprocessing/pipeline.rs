//! Housing feature pipeline
//!
//! Turns the raw listing tables into numeric frames. Every statistic
//! (category mappings, spatial indexes, the KNN imputer, target means and
//! column means) is fitted on the training table only and reused verbatim on
//! the test table.

use super::auxiliary::{add_infrastructure_features, join_subzones, AuxiliaryData};
use super::columns::{column_names, from_matrix, has_column, numeric_values, set_numeric, to_matrix};
use super::config::PipelineConfig;
use super::encoder::{expand_one_hot, CategoryEncoder, TargetEncoder};
use super::geo::{fill_spatial_codes, fit_spatial_index, repair_coordinates, SpatialLabelIndex};
use super::outlier::drop_outliers;
use super::transforms::{
    drop_residual_columns, drop_unused_columns, extract_floor_level, extract_tenure, lowercase_strings,
    normalize_listing_text, round_up_columns,
};
use crate::error::{AutomlError, Result};
use crate::imputation::{count_missing, Imputer, KNNImputer, NeighborWeights};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Everything learned from the training table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedPipeline {
    pub encoder: CategoryEncoder,
    /// Spatial label indexes by column, in fitting order
    pub spatial: BTreeMap<String, SpatialLabelIndex>,
    pub imputer: KNNImputer,
    pub target_encoder: TargetEncoder,
    /// Training column means used for the final fill
    pub column_means: BTreeMap<String, f64>,
    /// Output column order
    pub feature_names: Vec<String>,
}

/// Output of a pipeline run
#[derive(Debug, Clone)]
pub struct ProcessedData {
    pub train: DataFrame,
    /// Training target aligned with the surviving training rows
    pub target: Array1<f64>,
    pub test: DataFrame,
    pub fitted: FittedPipeline,
}

impl ProcessedData {
    /// Training features as a dense matrix plus column names
    pub fn train_matrix(&self) -> Result<(Array2<f64>, Vec<String>)> {
        to_matrix(&self.train)
    }

    /// Test features as a dense matrix, same column order as training
    pub fn test_matrix(&self) -> Result<Array2<f64>> {
        Ok(to_matrix(&self.test)?.0)
    }
}

/// Reorder `df` to `order`; the column sets must match exactly
fn align_columns(df: &DataFrame, order: &[String]) -> Result<DataFrame> {
    let have: BTreeSet<String> = column_names(df).into_iter().collect();
    let want: BTreeSet<String> = order.iter().cloned().collect();
    if have != want {
        return Err(AutomlError::ColumnMismatch {
            missing: want.difference(&have).cloned().collect(),
            unexpected: have.difference(&want).cloned().collect(),
        });
    }
    Ok(df.select(order.iter().map(|s| s.as_str()))?)
}

/// Spatial imputation for one column, fitted on train and applied to both
fn impute_spatial(
    train: &mut DataFrame,
    test: &mut DataFrame,
    column: &str,
    missing_code: i64,
    n_neighbors: usize,
) -> Result<SpatialLabelIndex> {
    let index = fit_spatial_index(train, column, missing_code, n_neighbors)?;
    let filled_train = fill_spatial_codes(train, column, missing_code, &index)?;
    let filled_test = fill_spatial_codes(test, column, missing_code, &index)?;
    info!(
        column = %column,
        train_rows = filled_train,
        test_rows = filled_test,
        "Spatially imputed missing labels"
    );
    Ok(index)
}

/// Subzone names of each row, decoded from subzone codes
fn subzone_labels(df: &DataFrame, encoder: &CategoryEncoder) -> Result<Vec<Option<String>>> {
    let mapping = match encoder.mapping("subzone") {
        Some(mapping) => mapping,
        None => return Ok(vec![None; df.height()]),
    };
    Ok(numeric_values(df, "subzone")?
        .into_iter()
        .map(|code| code.and_then(|c| mapping.label(c as i64)).map(|s| s.to_string()))
        .collect())
}

/// KNN imputation over the whole numeric frame
fn impute_statistical(
    train: &DataFrame,
    test: &DataFrame,
    imputer: &mut KNNImputer,
) -> Result<(DataFrame, DataFrame)> {
    let (train_matrix, names) = to_matrix(train)?;
    let test_matrix = to_matrix(&align_columns(test, &names)?)?.0;

    debug!(
        train_missing = count_missing(&train_matrix),
        test_missing = count_missing(&test_matrix),
        "Cells left for KNN imputation"
    );
    let train_filled = imputer.fit_transform(&train_matrix)?;
    let test_filled = imputer.transform(&test_matrix)?;

    Ok((from_matrix(&train_filled, &names)?, from_matrix(&test_filled, &names)?))
}

/// Fill any remaining gaps with the training column mean
fn fill_with_means(df: &mut DataFrame, means: &BTreeMap<String, f64>) -> Result<()> {
    for (name, &mean) in means {
        if !has_column(df, name) {
            continue;
        }
        let values = numeric_values(df, name)?
            .into_iter()
            .map(|v| Some(v.unwrap_or(mean)))
            .collect();
        set_numeric(df, name, values)?;
    }
    Ok(())
}

fn training_means(df: &DataFrame) -> Result<BTreeMap<String, f64>> {
    let mut means = BTreeMap::new();
    for name in column_names(df) {
        let present: Vec<f64> = numeric_values(df, &name)?.into_iter().flatten().collect();
        // An all-missing column has no mean; zero keeps the matrix dense
        let mean = if present.is_empty() {
            0.0
        } else {
            present.iter().sum::<f64>() / present.len() as f64
        };
        means.insert(name, mean);
    }
    Ok(means)
}

/// The housing feature pipeline
#[derive(Debug, Clone, Default)]
pub struct FeaturePipeline {
    config: PipelineConfig,
    auxiliary: AuxiliaryData,
}

impl FeaturePipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            auxiliary: AuxiliaryData::new(),
        }
    }

    /// Attach auxiliary datasets
    pub fn with_auxiliary(mut self, auxiliary: AuxiliaryData) -> Self {
        self.auxiliary = auxiliary;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every step on the training and test tables
    pub fn run(&self, train_x: &DataFrame, train_y: &Array1<f64>, test_x: &DataFrame) -> Result<ProcessedData> {
        let start = Instant::now();
        let config = &self.config;

        info!(
            train_rows = train_x.height(),
            test_rows = test_x.height(),
            "Starting feature pipeline"
        );

        // Outliers are a training-only concern
        let (mut train, target) = drop_outliers(train_x, train_y, &config.outliers)?;
        let mut test = test_x.clone();

        for df in [&mut train, &mut test] {
            normalize_listing_text(df)?;
            drop_unused_columns(df, &config.columns_to_drop)?;
        }

        let has_coordinates = has_column(&train, "lat") && has_column(&train, "lng");
        if has_coordinates {
            for df in [&mut train, &mut test] {
                repair_coordinates(df, &config.geo)?;
                add_infrastructure_features(df, &self.auxiliary, config.geo.infra_radius_km)?;
            }
        } else {
            warn!("No lat/lng columns; skipping coordinate repair and spatial steps");
        }

        for df in [&mut train, &mut test] {
            extract_floor_level(df)?;
            extract_tenure(df)?;
        }

        let mut encoder = CategoryEncoder::new();
        encoder.fit(&train, &config.categorical_columns)?;
        encoder.transform(&mut train)?;
        encoder.transform(&mut test)?;
        info!(columns = encoder.mappings().len(), "Encoded categorical columns");

        let mut spatial = BTreeMap::new();
        if has_coordinates {
            for column in &config.spatial_columns {
                let Some(mapping) = encoder.mapping(column) else {
                    continue;
                };
                let index = impute_spatial(
                    &mut train,
                    &mut test,
                    column,
                    mapping.missing_code(),
                    config.geo.n_neighbors,
                )?;
                spatial.insert(column.clone(), index);
            }
        }

        if self.auxiliary.subzones.is_some() {
            let train_labels = subzone_labels(&train, &encoder)?;
            let test_labels = subzone_labels(&test, &encoder)?;
            join_subzones(&mut train, &self.auxiliary, &train_labels)?;
            join_subzones(&mut test, &self.auxiliary, &test_labels)?;
        }

        for column in &config.onehot_columns {
            if let Some(mapping) = encoder.mapping(column) {
                expand_one_hot(&mut train, column, mapping)?;
                expand_one_hot(&mut test, column, mapping)?;
                debug!(column = %column, indicators = mapping.len() + 1, "Expanded to indicators");
            }
        }

        let mut imputer = KNNImputer::new(config.imputation.n_neighbors)
            .with_weights(NeighborWeights::from_name(&config.imputation.weights)?);
        let (mut train, mut test) = impute_statistical(&train, &test, &mut imputer)?;
        info!(neighbors = imputer.n_neighbors(), "Statistical imputation done");

        for df in [&mut train, &mut test] {
            let present: Vec<String> = config
                .round_up_columns
                .iter()
                .filter(|c| has_column(df, c))
                .cloned()
                .collect();
            round_up_columns(df, &present)?;
        }

        let mut target_encoder = TargetEncoder::new();
        target_encoder.fit(&train, &config.target_encode_columns, &target)?;
        target_encoder.transform(&mut train)?;
        target_encoder.transform(&mut test)?;

        for df in [&mut train, &mut test] {
            drop_residual_columns(df, &config.residual_columns)?;
        }

        let column_means = training_means(&train)?;
        fill_with_means(&mut train, &column_means)?;
        fill_with_means(&mut test, &column_means)?;

        let feature_names = column_names(&train);
        let test = align_columns(&test, &feature_names)?;

        info!(
            features = feature_names.len(),
            train_rows = train.height(),
            test_rows = test.height(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Feature pipeline finished"
        );

        Ok(ProcessedData {
            train,
            target,
            test,
            fitted: FittedPipeline {
                encoder,
                spatial,
                imputer,
                target_encoder,
                column_means,
                feature_names,
            },
        })
    }

    /// Human-readable training table for data exploration.
    ///
    /// Lowercased, outlier-filtered and pruned raw columns, with the numeric
    /// fields `built_year, num_beds, num_baths, size_sqft` replaced by their
    /// processed values. Returned alongside the matching targets.
    pub fn inspection_frame(
        &self,
        train_x: &DataFrame,
        train_y: &Array1<f64>,
        test_x: &DataFrame,
    ) -> Result<(DataFrame, Array1<f64>)> {
        let (mut frame, target) = drop_outliers(train_x, train_y, &self.config.outliers)?;
        lowercase_strings(&mut frame)?;
        drop_unused_columns(&mut frame, &self.config.columns_to_drop)?;

        let processed = self.run(train_x, train_y, test_x)?;
        for name in ["built_year", "num_beds", "num_baths", "size_sqft"] {
            if has_column(&processed.train, name) {
                set_numeric(&mut frame, name, numeric_values(&processed.train, name)?)?;
            }
        }

        Ok((frame, target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn train_frame() -> DataFrame {
        df!(
            "listing_id" => &[1i64, 2, 3, 4, 5, 6],
            "property_name" => &["a", "a", "b", "c", "c", "d"],
            "property_type" => &["Condo", "condo", "HDB 4 rooms", "hdb", "Condo", "Landed"],
            "tenure" => &[Some("freehold"), Some("99-year leasehold"), None, Some("103-year leasehold"), Some("freehold"), None],
            "built_year" => &[Some(2001.0), None, Some(1990.0), Some(1985.0), Some(2010.0), Some(1999.0)],
            "num_beds" => &[Some(2.0), Some(3.0), None, Some(3.0), Some(4.0), Some(5.0)],
            "num_baths" => &[Some(2.0), Some(2.0), Some(1.0), None, Some(3.0), Some(4.0)],
            "size_sqft" => &[800.0, 900.0, 100.0, 1000.0, 1500.0, 3000.0],
            "floor_level" => &[Some("high (10 total)"), None, None, Some("low"), None, None],
            "furnishing" => &["fully", "NA", "unfurnished", "partial", "fully", "unspecified"],
            "lat" => &[1.30, 1.301, 1.35, 1.36, 1.361, 1.40],
            "lng" => &[103.80, 103.801, 103.85, 103.90, 103.901, 103.95],
            "subzone" => &[Some("alpha"), None, Some("beta"), Some("gamma"), Some("gamma"), Some("delta")],
            "planning_area" => &[Some("north"), Some("north"), Some("east"), None, Some("east"), Some("east")],
        )
        .unwrap()
    }

    fn test_frame() -> DataFrame {
        df!(
            "listing_id" => &[7i64, 8],
            "property_name" => &["a", "zzz"],
            "property_type" => &["condo", "Executive Condo"],
            "tenure" => &[Some("freehold"), Some("60-year leasehold")],
            "built_year" => &[Some(2001.0), None],
            "num_beds" => &[Some(2.0), Some(3.0)],
            "num_baths" => &[None, Some(2.0)],
            "size_sqft" => &[50.0, 1200.0],
            "floor_level" => &[None::<&str>, None],
            "furnishing" => &["fully", "bare"],
            "lat" => &[1.30, 91.0],
            "lng" => &[103.80, 0.0],
            "subzone" => &[None, Some("omega")],
            "planning_area" => &[Some("north"), Some("east")],
        )
        .unwrap()
    }

    fn target() -> Array1<f64> {
        array![1.0e6, 1.2e6, 5.0e5, 9.0e5, 2.0e6, 4.0e6]
    }

    fn pipeline() -> FeaturePipeline {
        let config = PipelineConfig::new().with_known_bad_rows(vec![]).with_imputer_neighbors(2);
        FeaturePipeline::new(config)
    }

    #[test]
    fn test_run_shapes_and_alignment() {
        let processed = pipeline().run(&train_frame(), &target(), &test_frame()).unwrap();

        // Row with size 100 removed; test rows kept even when tiny
        assert_eq!(processed.train.height(), 5);
        assert_eq!(processed.target.len(), 5);
        assert_eq!(processed.test.height(), 2);

        assert_eq!(column_names(&processed.train), column_names(&processed.test));
        assert_eq!(processed.fitted.feature_names, column_names(&processed.train));

        for name in ["listing_id", "address", "property_name", "tenure", "floor_level"] {
            assert!(!has_column(&processed.train, name), "{} should be dropped", name);
        }
        assert!(has_column(&processed.train, "furnishing_unspecified"));
        assert!(has_column(&processed.train, "furnishing_missing"));
    }

    #[test]
    fn test_no_missing_values() {
        let processed = pipeline().run(&train_frame(), &target(), &test_frame()).unwrap();
        let (train, _) = processed.train_matrix().unwrap();
        let test = processed.test_matrix().unwrap();
        assert!(train.iter().all(|v| v.is_finite()));
        assert!(test.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_target_encoding_uses_training_means() {
        let processed = pipeline().run(&train_frame(), &target(), &test_frame()).unwrap();

        // "executive condo" was never seen: global training mean
        let global = processed.fitted.target_encoder.global_mean();
        let property_type = numeric_values(&processed.test, "property_type").unwrap();
        assert_eq!(property_type[1], Some(global));
    }

    #[test]
    fn test_rounding_applied() {
        let processed = pipeline().run(&train_frame(), &target(), &test_frame()).unwrap();
        for name in ["built_year", "num_beds", "num_baths"] {
            for v in numeric_values(&processed.train, name).unwrap().into_iter().flatten() {
                assert_eq!(v, v.ceil());
            }
        }
    }

    #[test]
    fn test_column_mismatch_is_error() {
        let train = df!("a" => &[1.0], "b" => &[2.0]).unwrap();
        let test = df!("a" => &[1.0], "c" => &[2.0]).unwrap();
        assert!(matches!(
            align_columns(&test, &column_names(&train)),
            Err(AutomlError::ColumnMismatch { .. })
        ));
    }

    #[test]
    fn test_inspection_frame() {
        let (frame, target) = pipeline()
            .inspection_frame(&train_frame(), &target(), &test_frame())
            .unwrap();

        assert_eq!(frame.height(), 5);
        assert_eq!(target.len(), 5);
        assert!(!has_column(&frame, "listing_id"));

        // Raw text kept, lowercased
        let types = crate::preprocessing::columns::string_values(&frame, "property_type").unwrap();
        assert_eq!(types[0].as_deref(), Some("condo"));

        // Numeric fields come from the processed table
        assert!(numeric_values(&frame, "built_year").unwrap().iter().all(|v| v.is_some()));
    }
}
