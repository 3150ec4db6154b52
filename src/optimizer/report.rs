//! Cross-validation results and the model selection report

use super::search_space::HyperParams;
use crate::error::{AutomlError, Result};
use crate::training::Diagnostics;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Per-candidate, per-fold scores and timings.
///
/// Scores are negated RMSE so that greater is better. Serializes to a flat
/// columnar map (`mean_test_score`, `split0_test_score`, `param_alpha`, ...)
/// holding only plain numbers, strings and lists.
#[derive(Debug, Clone, Default)]
pub struct CvResults {
    pub params: Vec<HyperParams>,
    /// `[candidate][fold]`
    pub test_scores: Vec<Vec<f64>>,
    pub train_scores: Vec<Vec<f64>>,
    pub fit_times: Vec<Vec<f64>>,
    pub score_times: Vec<Vec<f64>>,
}

impl CvResults {
    pub fn n_candidates(&self) -> usize {
        self.params.len()
    }

    pub fn n_splits(&self) -> usize {
        self.test_scores.first().map_or(0, Vec::len)
    }

    pub fn mean_test_score(&self) -> Vec<f64> {
        self.test_scores.iter().map(|s| mean(s)).collect()
    }

    pub fn mean_train_score(&self) -> Vec<f64> {
        self.train_scores.iter().map(|s| mean(s)).collect()
    }

    /// Competition ranking: 1 for the best mean score, equal scores share a rank
    pub fn rank_test_score(&self) -> Vec<usize> {
        let means: Vec<f64> = self.mean_test_score().into_iter().map(comparable).collect();
        means
            .iter()
            .map(|m| 1 + means.iter().filter(|other| *other > m).count())
            .collect()
    }

    /// Index of the highest mean validation score, the first one on ties
    pub fn best_index(&self) -> Result<usize> {
        let means = self.mean_test_score();
        let mut best: Option<(usize, f64)> = None;
        for (i, m) in means.into_iter().map(comparable).enumerate() {
            match best {
                Some((_, b)) if m <= b => {}
                _ => best = Some((i, m)),
            }
        }
        best.map(|(i, _)| i)
            .ok_or_else(|| AutomlError::TrainingError("No candidates were evaluated".to_string()))
    }

    /// Positive RMSE per fold for one candidate
    pub fn fold_rmse(&self, candidate: usize) -> (Vec<f64>, Vec<f64>) {
        let abs = |scores: &Vec<f64>| scores.iter().map(|s| s.abs()).collect::<Vec<_>>();
        (abs(&self.train_scores[candidate]), abs(&self.test_scores[candidate]))
    }

    fn param_names(&self) -> BTreeSet<&str> {
        self.params.iter().flat_map(|p| p.keys().map(String::as_str)).collect()
    }
}

/// NaN scores rank below every real score
fn comparable(score: f64) -> f64 {
    if score.is_nan() {
        f64::NEG_INFINITY
    } else {
        score
    }
}

impl Serialize for CvResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;

        let column_stats = |rows: &Vec<Vec<f64>>| -> (Vec<f64>, Vec<f64>) {
            (rows.iter().map(|r| mean(r)).collect(), rows.iter().map(|r| std_dev(r)).collect())
        };

        let (mean_fit, std_fit) = column_stats(&self.fit_times);
        let (mean_score, std_score) = column_stats(&self.score_times);
        map.serialize_entry("mean_fit_time", &mean_fit)?;
        map.serialize_entry("std_fit_time", &std_fit)?;
        map.serialize_entry("mean_score_time", &mean_score)?;
        map.serialize_entry("std_score_time", &std_score)?;

        for name in self.param_names() {
            let column: Vec<_> = self.params.iter().map(|p| p.get(name)).collect();
            map.serialize_entry(&format!("param_{}", name), &column)?;
        }
        map.serialize_entry("params", &self.params)?;

        for fold in 0..self.n_splits() {
            let column: Vec<f64> = self.test_scores.iter().map(|s| s[fold]).collect();
            map.serialize_entry(&format!("split{}_test_score", fold), &column)?;
        }
        let (mean_test, std_test) = column_stats(&self.test_scores);
        map.serialize_entry("mean_test_score", &mean_test)?;
        map.serialize_entry("std_test_score", &std_test)?;
        map.serialize_entry("rank_test_score", &self.rank_test_score())?;

        for fold in 0..self.n_splits() {
            let column: Vec<f64> = self.train_scores.iter().map(|s| s[fold]).collect();
            map.serialize_entry(&format!("split{}_train_score", fold), &column)?;
        }
        let (mean_train, std_train) = column_stats(&self.train_scores);
        map.serialize_entry("mean_train_score", &mean_train)?;
        map.serialize_entry("std_train_score", &std_train)?;

        map.end()
    }
}

/// Minimum, mean, median and maximum of a set of fold RMSEs
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SummaryStats {
    pub minimum: f64,
    pub mean: f64,
    pub median: f64,
    pub maximum: f64,
}

impl SummaryStats {
    pub fn from_values(values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(AutomlError::ValidationError("Cannot summarise zero folds".to_string()));
        }
        Ok(Self {
            minimum: values.iter().copied().fold(f64::INFINITY, f64::min),
            mean: mean(values),
            median: median(values),
            maximum: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

/// Train and validation RMSE summaries of the best candidate
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RmseSummary {
    pub train: SummaryStats,
    pub validation: SummaryStats,
}

impl RmseSummary {
    pub fn new(train_rmse: &[f64], validation_rmse: &[f64]) -> Result<Self> {
        Ok(Self {
            train: SummaryStats::from_values(train_rmse)?,
            validation: SummaryStats::from_values(validation_rmse)?,
        })
    }

    /// GitHub-flavoured markdown table with four decimals
    pub fn to_table(&self) -> String {
        let rows = [
            ("Minimum", self.train.minimum, self.validation.minimum),
            ("Mean", self.train.mean, self.validation.mean),
            ("Median", self.train.median, self.validation.median),
            ("Maximum", self.train.maximum, self.validation.maximum),
        ];
        let cells: Vec<[String; 3]> = rows
            .iter()
            .map(|(label, train, validation)| {
                [label.to_string(), format!("{:.4}", train), format!("{:.4}", validation)]
            })
            .collect();
        github_table(["Metric", "Train", "Validation"], &cells)
    }
}

/// Text column left-aligned, numeric columns right-aligned, each at least two
/// wider than its header.
fn github_table(headers: [&str; 3], rows: &[[String; 3]]) -> String {
    let widths: Vec<usize> = (0..3)
        .map(|c| {
            rows.iter()
                .map(|r| r[c].len())
                .chain(std::iter::once(headers[c].len() + 2))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let format_row = |cells: [&str; 3]| -> String {
        let parts: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(c, cell)| {
                if c == 0 {
                    format!(" {:<w$} ", cell, w = widths[c])
                } else {
                    format!(" {:>w$} ", cell, w = widths[c])
                }
            })
            .collect();
        format!("|{}|", parts.join("|"))
    };

    let mut lines = vec![format_row(headers)];
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(w + 2)).collect();
    lines.push(format!("|{}|", rule.join("|")));
    for row in rows {
        lines.push(format_row([&row[0], &row[1], &row[2]]));
    }
    lines.join("\n")
}

fn ordered_map<S: Serializer>(
    entries: &Option<Vec<(String, f64)>>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match entries {
        Some(entries) => serializer.collect_map(entries.iter().map(|(k, v)| (k, v))),
        None => serializer.serialize_none(),
    }
}

/// Outcome of a model search, written as JSON
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub model: String,
    pub best_estimator_index: usize,
    pub best_hyperparameters: HyperParams,
    /// Mean validation RMSE of the best candidate
    pub best_validation_rmse: f64,
    pub best_estimator_rmse_table: String,
    pub rmse_summary: RmseSummary,
    pub grid_search_results: CvResults,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loss_curve: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_loss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_features: Option<usize>,
    /// Feature name to importance, most important first
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "ordered_map")]
    pub feature_importance: Option<Vec<(String, f64)>>,
}

impl SearchReport {
    /// Assemble the report for the refit best candidate
    pub fn build(
        model: &str,
        results: CvResults,
        diagnostics: Diagnostics,
        feature_names: &[String],
    ) -> Result<Self> {
        let best = results.best_index()?;
        let (train_rmse, validation_rmse) = results.fold_rmse(best);
        let rmse_summary = RmseSummary::new(&train_rmse, &validation_rmse)?;

        let feature_importance = diagnostics.feature_importances.map(|importances| {
            let mut named: Vec<(String, f64)> = importances
                .into_iter()
                .enumerate()
                .map(|(i, imp)| {
                    let name = feature_names.get(i).cloned().unwrap_or_else(|| format!("feature_{}", i));
                    (name, imp)
                })
                .collect();
            // Stable: equal importances keep column order
            named.sort_by(|a, b| b.1.total_cmp(&a.1));
            named
        });

        Ok(Self {
            model: model.to_string(),
            best_estimator_index: best,
            best_hyperparameters: results.params[best].clone(),
            best_validation_rmse: rmse_summary.validation.mean,
            best_estimator_rmse_table: rmse_summary.to_table(),
            rmse_summary,
            grid_search_results: results,
            iterations: diagnostics.iterations,
            loss_curve: diagnostics.loss_curve,
            loss: diagnostics.loss,
            best_loss: diagnostics.best_loss,
            number_of_features: diagnostics.number_of_features,
            feature_importance,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write pretty JSON to `path`
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
