//! Integration test: housing feature pipeline end-to-end

mod common;

use common::{listings, prices, stations, subzone_table};
use housing_automl::preprocessing::{AuxiliaryData, FeaturePipeline, PipelineConfig};

fn has(names: &[String], name: &str) -> bool {
    names.iter().any(|n| n == name)
}

#[test]
fn test_pipeline_produces_aligned_numeric_tables() {
    let train = listings(40, 0);
    let test = listings(12, 100);

    let processed = FeaturePipeline::new(PipelineConfig::default())
        .run(&train, &prices(40, 0), &test)
        .unwrap();

    assert_eq!(processed.train.height(), 40);
    assert_eq!(processed.target.len(), 40);
    assert_eq!(processed.test.height(), 12, "test rows are never dropped");

    let names = &processed.fitted.feature_names;
    let test_names: Vec<String> = processed.test.get_column_names().iter().map(|n| n.to_string()).collect();
    assert_eq!(names, &test_names);

    for dropped in ["listing_id", "title", "address", "property_name", "tenure", "floor_level"] {
        assert!(!has(names, dropped), "{} should not survive", dropped);
    }
    assert!(has(names, "furnishing_unspecified"));
    assert!(!names.iter().any(|n| n.contains("floor_level")));

    let (x, feature_names) = processed.train_matrix().unwrap();
    assert_eq!(x.ncols(), feature_names.len());
    assert!(x.iter().all(|v| v.is_finite()));
    assert!(processed.test_matrix().unwrap().iter().all(|v| v.is_finite()));
}

#[test]
fn test_outliers_removed_from_training_only() {
    let mut train = listings(30, 0);
    let mut test = listings(5, 200);

    // Shrink one training and one test listing below the size floor
    let mut sizes: Vec<f64> = train.column("size_sqft").unwrap().f64().unwrap().into_no_null_iter().collect();
    sizes[3] = 120.0;
    train.with_column(polars::prelude::Column::new("size_sqft".into(), sizes)).unwrap();

    let mut test_sizes: Vec<f64> = test.column("size_sqft").unwrap().f64().unwrap().into_no_null_iter().collect();
    test_sizes[0] = 120.0;
    test.with_column(polars::prelude::Column::new("size_sqft".into(), test_sizes)).unwrap();

    let processed = FeaturePipeline::new(PipelineConfig::default())
        .run(&train, &prices(30, 0), &test)
        .unwrap();

    assert_eq!(processed.train.height(), 29);
    assert_eq!(processed.target.len(), 29);
    assert_eq!(processed.test.height(), 5);
}

#[test]
fn test_known_bad_rows_dropped() {
    let config = PipelineConfig::default().with_known_bad_rows(vec![0, 7]);
    let processed = FeaturePipeline::new(config)
        .run(&listings(25, 0), &prices(25, 0), &listings(4, 50))
        .unwrap();

    assert_eq!(processed.train.height(), 23);
    let expected = prices(25, 0);
    assert_eq!(processed.target[0], expected[1]);
}

#[test]
fn test_auxiliary_enrichment_adds_features() {
    let auxiliary = AuxiliaryData::new()
        .with_infrastructure("mrt", stations())
        .with_subzones(subzone_table())
        .with_subzone_key("name");

    let processed = FeaturePipeline::new(PipelineConfig::default())
        .with_auxiliary(auxiliary)
        .run(&listings(40, 0), &prices(40, 0), &listings(10, 100))
        .unwrap();

    let names = &processed.fitted.feature_names;
    assert!(has(names, "mrt_nearest_km"));
    assert!(has(names, "mrt_within_1km"));
    assert!(has(names, "subzone_population"));
    assert!(has(names, "subzone_area_size"));

    let nearest = processed.train.column("mrt_nearest_km").unwrap().f64().unwrap();
    assert!(nearest.into_no_null_iter().all(|d| d >= 0.0 && d < 50.0));

    let (x, _) = processed.train_matrix().unwrap();
    assert!(x.iter().all(|v| v.is_finite()));
    assert!(processed.test_matrix().unwrap().iter().all(|v| v.is_finite()));
}

#[test]
fn test_empty_auxiliary_matches_plain_run() {
    let train = listings(30, 0);
    let test = listings(8, 60);
    let y = prices(30, 0);

    let plain = FeaturePipeline::new(PipelineConfig::default()).run(&train, &y, &test).unwrap();
    let empty = FeaturePipeline::new(PipelineConfig::default())
        .with_auxiliary(AuxiliaryData::new())
        .run(&train, &y, &test)
        .unwrap();

    assert!(plain.train.equals_missing(&empty.train));
    assert!(plain.test.equals_missing(&empty.test));
    assert!(!has(&plain.fitted.feature_names, "mrt_nearest_km"));
}

#[test]
fn test_pipeline_is_deterministic() {
    let train = listings(35, 0);
    let test = listings(6, 70);
    let y = prices(35, 0);
    let pipeline = FeaturePipeline::new(PipelineConfig::default());

    let first = pipeline.run(&train, &y, &test).unwrap();
    let second = pipeline.run(&train, &y, &test).unwrap();

    assert!(first.train.equals_missing(&second.train));
    assert!(first.test.equals_missing(&second.test));
    assert_eq!(first.target, second.target);
}

#[test]
fn test_unseen_test_categories_are_tolerated() {
    let mut test = listings(3, 0);
    test.with_column(polars::prelude::Column::new(
        "property_type".into(),
        vec!["Cluster House", "Walk-up", "Shophouse"],
    ))
    .unwrap();

    let processed = FeaturePipeline::new(PipelineConfig::default())
        .run(&listings(30, 0), &prices(30, 0), &test)
        .unwrap();

    let global = processed.fitted.target_encoder.global_mean();
    let encoded = processed.test.column("property_type").unwrap().f64().unwrap();
    assert!(encoded.into_no_null_iter().all(|v| v == global));
}
