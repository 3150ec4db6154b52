//! Cross-validated hyperparameter search over a regressor

use super::config::{SearchConfig, SearchStrategy};
use super::report::{CvResults, SearchReport};
use super::search_space::{grid_candidates, grid_size, sample_candidates, HyperParams, ParamGrid};
use crate::error::{AutomlError, Result};
use crate::training::{rmse, KFold, Regressor, TransformedTargetRegressor};
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, info};

/// Scores of one candidate on one fold
#[derive(Debug, Clone, Copy)]
struct FoldOutcome {
    train_score: f64,
    test_score: f64,
    fit_time: f64,
    score_time: f64,
}

/// Exhaustive or randomized search with k-fold cross-validation.
///
/// The estimator is wrapped in a [`TransformedTargetRegressor`] with a
/// min-max target scaler; candidates are scored by negated RMSE on the
/// original target scale and the winner is refit on all rows.
#[derive(Debug, Clone)]
pub struct GridSearchRegressor {
    name: String,
    estimator: TransformedTargetRegressor,
    grid: ParamGrid,
    config: SearchConfig,
    cv_results: Option<CvResults>,
    report: Option<SearchReport>,
}

impl GridSearchRegressor {
    pub fn new(name: impl Into<String>, estimator: Box<dyn Regressor>, grid: ParamGrid, k_fold: usize) -> Self {
        Self {
            name: name.into(),
            estimator: TransformedTargetRegressor::new(estimator),
            grid,
            config: SearchConfig::default().with_cv_folds(k_fold),
            cv_results: None,
            report: None,
        }
    }

    /// Replace the search settings.
    ///
    /// A `config` still at the default fold count keeps the `k_fold` given
    /// to [`Self::new`]; any other `cv_folds` takes precedence.
    pub fn with_config(mut self, mut config: SearchConfig) -> Self {
        if config.cv_folds == SearchConfig::default().cv_folds {
            config.cv_folds = self.config.cv_folds;
        }
        self.config = config;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Results of the last `fit`
    pub fn cv_results(&self) -> Option<&CvResults> {
        self.cv_results.as_ref()
    }

    /// Report of the last `fit` run with `report = true`
    pub fn report(&self) -> Option<&SearchReport> {
        self.report.as_ref()
    }

    /// Candidates in evaluation order
    pub fn candidates(&self) -> Result<Vec<HyperParams>> {
        match self.config.strategy {
            SearchStrategy::Grid => grid_candidates(&self.grid),
            SearchStrategy::Random { n_iter } => sample_candidates(&self.grid, n_iter, self.config.random_state),
        }
    }

    fn configured(&self, params: &HyperParams) -> Result<TransformedTargetRegressor> {
        let mut estimator = self.estimator.clone();
        for (name, value) in params {
            estimator.set_param(name, value)?;
        }
        Ok(estimator)
    }

    fn evaluate(
        &self,
        params: &HyperParams,
        x: &Array2<f64>,
        y: &Array1<f64>,
        train_idx: &[usize],
        test_idx: &[usize],
    ) -> Result<FoldOutcome> {
        let x_train = x.select(Axis(0), train_idx);
        let y_train = y.select(Axis(0), train_idx);
        let x_test = x.select(Axis(0), test_idx);
        let y_test = y.select(Axis(0), test_idx);

        let mut estimator = self.configured(params)?;
        let fit_start = Instant::now();
        estimator.fit(&x_train, &y_train)?;
        let fit_time = fit_start.elapsed().as_secs_f64();

        let score_start = Instant::now();
        let test_score = -rmse(&y_test, &estimator.predict(&x_test)?)?;
        let score_time = score_start.elapsed().as_secs_f64();
        let train_score = -rmse(&y_train, &estimator.predict(&x_train)?)?;

        Ok(FoldOutcome {
            train_score,
            test_score,
            fit_time,
            score_time,
        })
    }

    fn cross_validate(&self, candidates: &[HyperParams], x: &Array2<f64>, y: &Array1<f64>) -> Result<CvResults> {
        // Unknown names and badly typed values fail before any fold runs
        for params in candidates {
            self.configured(params)?;
        }

        let splits = KFold::new(self.config.cv_folds).split(x.nrows())?;
        let n_splits = splits.len();
        let jobs: Vec<(usize, usize)> = (0..candidates.len())
            .flat_map(|c| (0..n_splits).map(move |f| (c, f)))
            .collect();

        let run = || {
            jobs.par_iter()
                .map(|&(c, f)| {
                    let split = &splits[f];
                    let outcome = self
                        .evaluate(&candidates[c], x, y, &split.train_indices, &split.test_indices)
                        .map_err(|e| AutomlError::FoldFailed {
                            candidate: c,
                            fold: f,
                            source: Box::new(e),
                        })?;
                    if self.config.verbose {
                        info!(candidate = c, fold = f, rmse = -outcome.test_score, "CV fold scored");
                    } else {
                        debug!(candidate = c, fold = f, rmse = -outcome.test_score, "CV fold scored");
                    }
                    Ok(outcome)
                })
                .collect::<Result<Vec<FoldOutcome>>>()
        };

        let outcomes = match self.config.n_jobs {
            Some(n) => rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| AutomlError::ComputationError(format!("Thread pool error: {}", e)))?
                .install(run)?,
            None => run()?,
        };

        let mut results = CvResults {
            params: candidates.to_vec(),
            ..Default::default()
        };
        for per_candidate in outcomes.chunks(n_splits) {
            results.test_scores.push(per_candidate.iter().map(|o| o.test_score).collect());
            results.train_scores.push(per_candidate.iter().map(|o| o.train_score).collect());
            results.fit_times.push(per_candidate.iter().map(|o| o.fit_time).collect());
            results.score_times.push(per_candidate.iter().map(|o| o.score_time).collect());
        }
        Ok(results)
    }

    /// Cross-validate every candidate, refit the best on all rows and return it.
    ///
    /// With `report` set, a [`SearchReport`] naming features by
    /// `feature_names` is logged and kept for [`Self::report`].
    pub fn fit(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        feature_names: &[String],
        report: bool,
    ) -> Result<TransformedTargetRegressor> {
        if x.nrows() != y.len() {
            return Err(AutomlError::ShapeError {
                expected: format!("{} targets", x.nrows()),
                actual: format!("{} targets", y.len()),
            });
        }

        let candidates = self.candidates()?;
        info!(
            model = %self.name,
            candidates = candidates.len(),
            grid_size = grid_size(&self.grid),
            folds = self.config.cv_folds,
            "Starting model search"
        );

        let start = Instant::now();
        let results = self.cross_validate(&candidates, x, y)?;
        let best = results.best_index()?;
        let best_rmse = -results.mean_test_score()[best];
        info!(
            model = %self.name,
            best_index = best,
            validation_rmse = best_rmse,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Model search finished"
        );

        let mut best_estimator = self.configured(&results.params[best])?;
        best_estimator.fit(x, y)?;

        if report {
            let search_report = SearchReport::build(&self.name, results.clone(), best_estimator.diagnostics(), feature_names)?;
            info!("{}", search_report.to_json()?);
            self.report = Some(search_report);
        }
        self.cv_results = Some(results);

        Ok(best_estimator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::{param_grid, ParamValue};
    use crate::training::{DecisionTree, GradientBoostingRegressor, LassoRegression, RidgeRegression};

    fn linear_data(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| ((i * 7 + j * 3) % 11) as f64 + j as f64);
        let y = x.rows().into_iter().map(|r| 3.0 * r[0] - 2.0 * r[1] + 5.0).collect();
        (x, y)
    }

    #[test]
    fn test_grid_search_picks_least_regularised_ridge() {
        let (x, y) = linear_data(40);
        let grid = param_grid([(
            "regressor__alpha",
            vec![ParamValue::Float(100.0), ParamValue::Float(1e-6), ParamValue::Float(10.0)],
        )]);

        let mut search = GridSearchRegressor::new("ridge", Box::new(RidgeRegression::default()), grid, 5);
        let model = search.fit(&x, &y, &[], false).unwrap();

        let results = search.cv_results().unwrap();
        assert_eq!(results.n_candidates(), 3);
        assert_eq!(results.n_splits(), 5);
        assert_eq!(results.best_index().unwrap(), 1);
        assert!(search.report().is_none());

        let pred = model.predict(&x).unwrap();
        assert!(rmse(&y, &pred).unwrap() < 1e-3);
    }

    #[test]
    fn test_empty_grid_is_plain_cross_validation() {
        let (x, y) = linear_data(30);
        let mut search = GridSearchRegressor::new("lasso", Box::new(LassoRegression::new(0.001)), ParamGrid::new(), 3);
        search.fit(&x, &y, &[], false).unwrap();

        let results = search.cv_results().unwrap();
        assert_eq!(results.n_candidates(), 1);
        assert!(results.params[0].is_empty());
    }

    #[test]
    fn test_random_search_is_seeded() {
        let (x, y) = linear_data(30);
        let grid = param_grid([
            ("max_depth", vec![ParamValue::Int(1), ParamValue::Int(2), ParamValue::Int(4)]),
            ("min_samples_leaf", vec![ParamValue::Int(1), ParamValue::Int(3)]),
        ]);
        let config = SearchConfig::new().with_random_search(3).with_cv_folds(3).with_random_state(5);

        let mut a = GridSearchRegressor::new("tree", Box::new(DecisionTree::new()), grid.clone(), 3).with_config(config.clone());
        let mut b = GridSearchRegressor::new("tree", Box::new(DecisionTree::new()), grid, 3).with_config(config);
        a.fit(&x, &y, &[], false).unwrap();
        b.fit(&x, &y, &[], false).unwrap();

        assert_eq!(a.cv_results().unwrap().params, b.cv_results().unwrap().params);
        assert_eq!(a.cv_results().unwrap().n_candidates(), 3);
    }

    #[test]
    fn test_report_requested() {
        let (x, y) = linear_data(30);
        let names = vec!["a".to_string(), "b".to_string()];
        let mut search = GridSearchRegressor::new("tree", Box::new(DecisionTree::new()), ParamGrid::new(), 3)
            .with_config(SearchConfig::new().with_cv_folds(3).with_n_jobs(2));
        search.fit(&x, &y, &names, true).unwrap();

        let report = search.report().unwrap();
        assert_eq!(report.best_estimator_index, 0);
        let importance = report.feature_importance.as_ref().unwrap();
        assert_eq!(importance.len(), 2);
        assert!(importance[0].1 >= importance[1].1);
        let v = &report.rmse_summary.validation;
        assert!(v.minimum <= v.mean && v.mean <= v.maximum);
    }

    #[test]
    fn test_unknown_parameter_aborts() {
        let (x, y) = linear_data(20);
        let grid = param_grid([("regressor__n_estimators", vec![ParamValue::Int(10)])]);
        let mut search = GridSearchRegressor::new("ridge", Box::new(RidgeRegression::default()), grid, 2);
        assert!(matches!(
            search.fit(&x, &y, &[], false),
            Err(AutomlError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_failing_fold_names_candidate() {
        let (x, y) = linear_data(20);
        let grid = param_grid([("regressor__subsample", vec![ParamValue::Float(1.0), ParamValue::Float(0.0)])]);
        let mut search =
            GridSearchRegressor::new("gbm", Box::new(GradientBoostingRegressor::default()), grid, 2);

        match search.fit(&x, &y, &[], false) {
            Err(AutomlError::FoldFailed { candidate, source, .. }) => {
                assert_eq!(candidate, 1);
                assert!(matches!(*source, AutomlError::InvalidParameter { .. }));
            }
            other => panic!("expected a fold failure, got {:?}", other.map(|_| ())),
        }
        assert!(search.cv_results().is_none());
    }

    #[test]
    fn test_single_value_grid_reports_that_value() {
        let (x, y) = linear_data(30);
        let grid = param_grid([("regressor__alpha", vec![ParamValue::Float(1.0)])]);
        let mut search = GridSearchRegressor::new("ridge", Box::new(RidgeRegression::default()), grid, 3);
        search.fit(&x, &y, &[], true).unwrap();

        assert_eq!(search.cv_results().unwrap().n_candidates(), 1);
        let report = search.report().unwrap();
        let expected: HyperParams = [("regressor__alpha".to_string(), ParamValue::Float(1.0))].into_iter().collect();
        assert_eq!(report.best_hyperparameters, expected);
        assert_eq!(report.best_estimator_index, 0);
    }

    #[test]
    fn test_with_config_keeps_constructor_folds() {
        let make = || GridSearchRegressor::new("ridge", Box::new(RidgeRegression::default()), ParamGrid::new(), 3);

        let search = make().with_config(SearchConfig::new().with_random_search(2).with_random_state(1));
        assert_eq!(search.config().cv_folds, 3);
        assert_eq!(search.config().random_state, 1);

        let search = make().with_config(SearchConfig::new().with_cv_folds(5));
        assert_eq!(search.config().cv_folds, 5);
    }
}
