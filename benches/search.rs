use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use housing_automl::optimizer::{param_grid, GridSearchRegressor, ParamValue};
use housing_automl::training::{DecisionTree, Regressor, RidgeRegression};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_regression_data(n_rows: usize, n_features: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let x = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>() * 10.0);
    let y = x.rows().into_iter().map(|r| r.sum() + rng.gen::<f64>() * 0.1).collect();
    (x, y)
}

fn bench_grid_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_search");
    group.sample_size(10);

    for n_rows in [500, 2000].iter() {
        let (x, y) = create_regression_data(*n_rows, 10);

        group.bench_with_input(BenchmarkId::new("ridge", n_rows), n_rows, |b, _| {
            b.iter(|| {
                let grid = param_grid([(
                    "regressor__alpha",
                    vec![ParamValue::Float(0.1), ParamValue::Float(1.0), ParamValue::Float(10.0)],
                )]);
                let mut search = GridSearchRegressor::new("ridge", Box::new(RidgeRegression::default()), grid, 10);
                black_box(search.fit(&x, &y, &[], false).unwrap())
            })
        });

        group.bench_with_input(BenchmarkId::new("decision_tree", n_rows), n_rows, |b, _| {
            b.iter(|| {
                let grid = param_grid([("regressor__max_depth", vec![ParamValue::Int(4), ParamValue::Int(8)])]);
                let mut search =
                    GridSearchRegressor::new("decision_tree", Box::new(DecisionTree::new()), grid, 5);
                black_box(search.fit(&x, &y, &[], false).unwrap())
            })
        });
    }

    group.finish();
}

fn bench_predict(c: &mut Criterion) {
    let (x, y) = create_regression_data(5000, 10);
    let mut model = DecisionTree::new().with_max_depth(10);
    model.fit(&x, &y).unwrap();

    c.bench_function("decision_tree_predict_5000", |b| {
        b.iter(|| black_box(model.predict(black_box(&x)).unwrap()))
    });
}

criterion_group!(benches, bench_grid_search, bench_predict);
criterion_main!(benches);
