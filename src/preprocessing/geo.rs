//! Location handling: coordinate repair and spatial label inference

use super::columns::{has_column, numeric_values, set_numeric, string_values};
use super::config::GeoConfig;
use super::encoder::UNSEEN_CODE;
use crate::error::{AutomlError, Result};
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use tracing::{debug, warn};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two (lat, lng) points, in kilometres
pub fn haversine_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lng1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lng2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlng = lng2 - lng1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

fn in_bounds(lat: Option<f64>, lng: Option<f64>, config: &GeoConfig) -> bool {
    match (lat, lng) {
        (Some(lat), Some(lng)) => {
            lat >= config.lat_range.0
                && lat <= config.lat_range.1
                && lng >= config.lng_range.0
                && lng <= config.lng_range.1
        }
        _ => false,
    }
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let n = values.len();
    if n % 2 == 0 {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    } else {
        values[n / 2]
    }
}

/// Replace corrupted coordinates.
///
/// A coordinate pair outside the configured bounding box (or missing) takes
/// the median valid coordinates of listings in the same table with the same
/// property name, or the configured fallback when there are none.
/// Returns the number of repaired rows.
pub fn repair_coordinates(df: &mut DataFrame, config: &GeoConfig) -> Result<usize> {
    let mut lats = numeric_values(df, "lat")?;
    let mut lngs = numeric_values(df, "lng")?;
    let names = if has_column(df, "property_name") {
        string_values(df, "property_name")?
    } else {
        vec![None; df.height()]
    };

    let mut by_name: HashMap<&str, (Vec<f64>, Vec<f64>)> = HashMap::new();
    for ((lat, lng), name) in lats.iter().zip(lngs.iter()).zip(names.iter()) {
        if let (Some(name), true) = (name, in_bounds(*lat, *lng, config)) {
            let entry = by_name.entry(name.as_str()).or_default();
            entry.0.push(lat.unwrap_or_default());
            entry.1.push(lng.unwrap_or_default());
        }
    }
    let centres: HashMap<&str, (f64, f64)> = by_name
        .into_iter()
        .map(|(name, (mut la, mut ln))| (name, (median(&mut la), median(&mut ln))))
        .collect();

    let mut repaired = 0usize;
    for i in 0..lats.len() {
        if in_bounds(lats[i], lngs[i], config) {
            continue;
        }
        let (lat, lng) = names[i]
            .as_deref()
            .and_then(|name| centres.get(name).copied())
            .unwrap_or(config.fallback);
        lats[i] = Some(lat);
        lngs[i] = Some(lng);
        repaired += 1;
    }

    if repaired > 0 {
        warn!(rows = repaired, "Repaired corrupted coordinates");
    }

    set_numeric(df, "lat", lats)?;
    set_numeric(df, "lng", lngs)?;
    Ok(repaired)
}

/// Read the (lat, lng) pairs of a frame; missing values become NaN
pub fn coordinates(df: &DataFrame) -> Result<Vec<(f64, f64)>> {
    let lats = numeric_values(df, "lat")?;
    let lngs = numeric_values(df, "lng")?;
    Ok(lats
        .into_iter()
        .zip(lngs)
        .map(|(lat, lng)| (lat.unwrap_or(f64::NAN), lng.unwrap_or(f64::NAN)))
        .collect())
}

/// Ordered float for the neighbour heap
#[derive(Debug, Clone, Copy)]
struct DistanceIdx(f64, usize);

impl PartialEq for DistanceIdx {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for DistanceIdx {}

impl PartialOrd for DistanceIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DistanceIdx {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max heap by distance (we want to pop largest distances)
        self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
    }
}

/// Nearest-neighbour label index over training coordinates.
///
/// Built from training rows whose label is known and reused unchanged to
/// label both training and test rows whose label is missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpatialLabelIndex {
    n_neighbors: usize,
    points: Vec<(f64, f64)>,
    labels: Vec<i64>,
}

impl SpatialLabelIndex {
    /// Fit on labelled points; points with NaN coordinates are skipped
    pub fn fit(points: &[(f64, f64)], labels: &[i64], n_neighbors: usize) -> Result<Self> {
        if points.len() != labels.len() {
            return Err(AutomlError::ShapeError {
                expected: format!("{} labels", points.len()),
                actual: format!("{} labels", labels.len()),
            });
        }

        let (points, labels): (Vec<(f64, f64)>, Vec<i64>) = points
            .iter()
            .zip(labels.iter())
            .filter(|(p, _)| !p.0.is_nan() && !p.1.is_nan())
            .map(|(&p, &l)| (p, l))
            .unzip();

        if points.is_empty() {
            return Err(AutomlError::ValidationError(
                "No labelled points for spatial imputation".to_string(),
            ));
        }

        Ok(Self {
            n_neighbors: n_neighbors.max(1),
            points,
            labels,
        })
    }

    /// Number of labelled points in the index
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn neighbors(&self, point: (f64, f64)) -> Vec<(usize, f64)> {
        let k = self.n_neighbors;
        let mut heap: BinaryHeap<DistanceIdx> = BinaryHeap::with_capacity(k + 1);

        for (i, p) in self.points.iter().enumerate() {
            let dist = ((p.0 - point.0).powi(2) + (p.1 - point.1).powi(2)).sqrt();
            if heap.len() < k {
                heap.push(DistanceIdx(dist, i));
            } else if let Some(&DistanceIdx(max_dist, _)) = heap.peek() {
                if dist < max_dist {
                    heap.pop();
                    heap.push(DistanceIdx(dist, i));
                }
            }
        }

        let mut found: Vec<(usize, f64)> = heap.into_iter().map(|DistanceIdx(d, i)| (i, d)).collect();
        found.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        found
    }

    /// Majority label among the nearest neighbours.
    ///
    /// Ties go to the tied label whose closest member is nearest.
    pub fn predict(&self, point: (f64, f64)) -> i64 {
        let neighbors = self.neighbors(point);

        // label -> (votes, rank of closest member)
        let mut votes: HashMap<i64, (usize, usize)> = HashMap::new();
        for (rank, &(idx, _)) in neighbors.iter().enumerate() {
            let entry = votes.entry(self.labels[idx]).or_insert((0, rank));
            entry.0 += 1;
        }

        votes
            .into_iter()
            .max_by(|a, b| a.1 .0.cmp(&b.1 .0).then(b.1 .1.cmp(&a.1 .1)))
            .map(|(label, _)| label)
            .unwrap_or(self.labels[0])
    }

    pub fn predict_many(&self, points: &[(f64, f64)]) -> Vec<i64> {
        points.par_iter().map(|&p| self.predict(p)).collect()
    }
}

fn needs_label(code: Option<f64>, missing_code: i64) -> bool {
    match code {
        None => true,
        Some(c) => {
            let c = c as i64;
            c == missing_code || c == UNSEEN_CODE
        }
    }
}

/// Fit a spatial index over the training rows whose code is known
pub fn fit_spatial_index(
    df: &DataFrame,
    column: &str,
    missing_code: i64,
    n_neighbors: usize,
) -> Result<SpatialLabelIndex> {
    let codes = numeric_values(df, column)?;
    let coords = coordinates(df)?;

    let (points, labels): (Vec<(f64, f64)>, Vec<i64>) = coords
        .into_iter()
        .zip(codes)
        .filter(|(_, code)| !needs_label(*code, missing_code))
        .map(|(p, code)| (p, code.map(|c| c as i64).unwrap_or(missing_code)))
        .unzip();

    SpatialLabelIndex::fit(&points, &labels, n_neighbors)
}

/// Assign codes to rows whose label is missing or unseen.
/// Returns the number of rows labelled.
pub fn fill_spatial_codes(
    df: &mut DataFrame,
    column: &str,
    missing_code: i64,
    index: &SpatialLabelIndex,
) -> Result<usize> {
    let mut codes = numeric_values(df, column)?;
    let coords = coordinates(df)?;

    let targets: Vec<usize> = codes
        .iter()
        .enumerate()
        .filter(|(_, code)| needs_label(**code, missing_code))
        .map(|(i, _)| i)
        .collect();

    let points: Vec<(f64, f64)> = targets.iter().map(|&i| coords[i]).collect();
    let predicted = index.predict_many(&points);
    for (&i, label) in targets.iter().zip(predicted) {
        codes[i] = Some(label as f64);
    }

    debug!(column = %column, rows = targets.len(), "Filled labels from nearest neighbours");
    set_numeric(df, column, codes)?;
    Ok(targets.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_known_distance() {
        // Roughly 1.11 km per 0.01 degree of latitude
        let d = haversine_km((1.30, 103.80), (1.31, 103.80));
        assert!((d - 1.112).abs() < 0.01, "distance was {}", d);
        assert_eq!(haversine_km((1.3, 103.8), (1.3, 103.8)), 0.0);
    }

    #[test]
    fn test_repair_coordinates() {
        let mut df = df!(
            "property_name" => &["a", "a", "b"],
            "lat" => &[Some(1.30), Some(69.4), None],
            "lng" => &[Some(103.80), Some(-75.1), Some(103.9)],
        )
        .unwrap();

        let config = GeoConfig::default();
        let repaired = repair_coordinates(&mut df, &config).unwrap();
        assert_eq!(repaired, 2);

        let lats = numeric_values(&df, "lat").unwrap();
        let lngs = numeric_values(&df, "lng").unwrap();
        // Sibling listing supplies the coordinates
        assert_eq!(lats[1], Some(1.30));
        assert_eq!(lngs[1], Some(103.80));
        // No valid sibling: fallback
        assert_eq!(lats[2], Some(config.fallback.0));
        assert_eq!(lngs[2], Some(config.fallback.1));
    }

    #[test]
    fn test_spatial_index_majority() {
        let points = vec![(0.0, 0.0), (0.0, 0.1), (0.1, 0.0), (5.0, 5.0), (5.0, 5.1)];
        let labels = vec![1, 1, 2, 3, 3];
        let index = SpatialLabelIndex::fit(&points, &labels, 3).unwrap();

        assert_eq!(index.predict((0.01, 0.01)), 1);
        assert_eq!(index.predict((5.0, 5.05)), 3);
    }

    #[test]
    fn test_spatial_index_tie_goes_to_nearest() {
        let points = vec![(0.0, 0.0), (1.0, 0.0)];
        let labels = vec![7, 9];
        let index = SpatialLabelIndex::fit(&points, &labels, 2).unwrap();
        assert_eq!(index.predict((0.9, 0.0)), 9);
    }

    #[test]
    fn test_fill_spatial_codes() {
        let mut train = df!(
            "lat" => &[1.30, 1.31, 1.40, 1.30],
            "lng" => &[103.80, 103.80, 103.90, 103.81],
            "subzone" => &[0.0, 0.0, 1.0, 2.0],
        )
        .unwrap();

        // Code 2 is the missing sentinel
        let index = fit_spatial_index(&train, "subzone", 2, 1).unwrap();
        assert_eq!(index.len(), 3);

        let filled = fill_spatial_codes(&mut train, "subzone", 2, &index).unwrap();
        assert_eq!(filled, 1);
        assert_eq!(numeric_values(&train, "subzone").unwrap()[3], Some(0.0));

        let mut test = df!(
            "lat" => &[1.40],
            "lng" => &[103.90],
            "subzone" => &[UNSEEN_CODE as f64],
        )
        .unwrap();
        fill_spatial_codes(&mut test, "subzone", 2, &index).unwrap();
        assert_eq!(numeric_values(&test, "subzone").unwrap()[0], Some(1.0));
    }
}
