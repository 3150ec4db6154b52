//! Integration test: pipeline output through cross-validated model selection

mod common;

use common::{listings, prices};
use housing_automl::optimizer::{param_grid, GridSearchRegressor, ParamValue, SearchConfig};
use housing_automl::preprocessing::{FeaturePipeline, PipelineConfig, ProcessedData};
use housing_automl::training::{rmse, ModelKind, RandomForest, Regressor, RidgeRegression};

fn processed() -> ProcessedData {
    FeaturePipeline::new(PipelineConfig::default())
        .run(&listings(60, 0), &prices(60, 0), &listings(10, 300))
        .unwrap()
}

#[test]
fn test_ridge_search_on_processed_features() {
    let data = processed();
    let (x, names) = data.train_matrix().unwrap();

    let grid = param_grid([(
        "regressor__alpha",
        vec![ParamValue::Float(0.1), ParamValue::Float(1.0), ParamValue::Float(10.0)],
    )]);
    let mut search = GridSearchRegressor::new("ridge", Box::new(RidgeRegression::default()), grid, 5);
    let best = search.fit(&x, &data.target, &names, true).unwrap();

    let results = search.cv_results().unwrap();
    assert_eq!(results.n_candidates(), 3);
    assert_eq!(results.n_splits(), 5);
    assert!(results.rank_test_score().contains(&1));

    let predictions = best.predict(&data.test_matrix().unwrap()).unwrap();
    assert_eq!(predictions.len(), 10);
    assert!(predictions.iter().all(|p| p.is_finite()));

    // Fitted on all rows, the model should beat predicting the mean
    let train_pred = best.predict(&x).unwrap();
    let mean = data.target.mean().unwrap();
    let baseline = rmse(&data.target.mapv(|_| mean), &data.target).unwrap();
    assert!(rmse(&train_pred, &data.target).unwrap() < baseline);

    let report = search.report().unwrap();
    assert_eq!(report.model, "ridge");
    assert_eq!(report.best_estimator_index, results.best_index().unwrap());
    assert!(report.best_validation_rmse > 0.0);
}

#[test]
fn test_random_forest_report_names_features() {
    let data = processed();
    let (x, names) = data.train_matrix().unwrap();

    let grid = param_grid([
        ("regressor__n_estimators", vec![ParamValue::Int(5)]),
        ("regressor__max_depth", vec![ParamValue::Int(3), ParamValue::Int(6)]),
    ]);
    let config = SearchConfig::default().with_cv_folds(3).with_random_state(7);
    let mut search = GridSearchRegressor::new("random_forest", Box::new(RandomForest::default()), grid, 3)
        .with_config(config);
    search.fit(&x, &data.target, &names, true).unwrap();

    let report = search.report().unwrap();
    let importance = report.feature_importance.as_ref().unwrap();
    assert_eq!(importance.len(), names.len());
    assert!(importance.iter().all(|(name, _)| names.contains(name)));
    assert!(importance.windows(2).all(|w| w[0].1 >= w[1].1));
    assert_eq!(report.number_of_features, Some(names.len()));

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["model"], "random_forest");
    let results = &json["grid_search_results"];
    assert_eq!(results["split2_test_score"].as_array().unwrap().len(), 2);
    assert_eq!(results["param_regressor__max_depth"].as_array().unwrap().len(), 2);
    assert!(json["best_estimator_rmse_table"].as_str().unwrap().contains("Validation"));
}

#[test]
fn test_random_search_samples_default_grid() {
    let data = processed();
    let (x, names) = data.train_matrix().unwrap();

    let kind = ModelKind::DecisionTree;
    let config = SearchConfig::default().with_cv_folds(4).with_random_search(3);
    let mut search = GridSearchRegressor::new(kind.name(), kind.default_estimator(), kind.default_grid(), 4)
        .with_config(config);
    search.fit(&x, &data.target, &names, false).unwrap();

    let results = search.cv_results().unwrap();
    assert_eq!(results.n_candidates(), 3);
    assert!(search.report().is_none());
}

#[test]
fn test_default_estimators_train_on_pipeline_output() {
    let data = processed();
    let (x, names) = data.train_matrix().unwrap();

    for kind in [ModelKind::Ridge, ModelKind::Lasso, ModelKind::DecisionTree, ModelKind::GradientBoosting] {
        let mut search = GridSearchRegressor::new(kind.name(), kind.default_estimator(), Default::default(), 3);
        let best = search.fit(&x, &data.target, &names, false).unwrap();
        let predictions = best.predict(&data.test_matrix().unwrap()).unwrap();
        assert_eq!(predictions.len(), 10, "{}", kind);
        assert!(predictions.iter().all(|p| p.is_finite()), "{}", kind);
    }
}
