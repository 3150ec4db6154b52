//! Optional auxiliary datasets joined onto listings
//!
//! Infrastructure tables (MRT stations, schools, malls, ...) are point sets
//! with `lat`/`lng` columns; each yields a nearest-distance feature and a
//! count within a radius. The subzone table is keyed by subzone name and
//! contributes its numeric columns.

use super::columns::{column_names, has_column, is_numeric_column, numeric_values, set_numeric, string_values};
use super::geo::{coordinates, haversine_km};
use crate::error::{AutomlError, Result};
use polars::prelude::*;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Auxiliary tables supplied alongside the listings
#[derive(Debug, Clone)]
pub struct AuxiliaryData {
    /// Named point datasets; iteration order fixes output column order
    pub infrastructure: BTreeMap<String, DataFrame>,

    /// Table keyed by subzone name
    pub subzones: Option<DataFrame>,

    /// Key column of the subzone table
    pub subzone_key: String,
}

impl Default for AuxiliaryData {
    fn default() -> Self {
        Self::new()
    }
}

impl AuxiliaryData {
    pub fn new() -> Self {
        Self {
            infrastructure: BTreeMap::new(),
            subzones: None,
            subzone_key: "name".to_string(),
        }
    }

    /// Builder method to add a named infrastructure point set
    pub fn with_infrastructure(mut self, name: impl Into<String>, points: DataFrame) -> Self {
        self.infrastructure.insert(name.into(), points);
        self
    }

    /// Builder method to set the subzone table
    pub fn with_subzones(mut self, table: DataFrame) -> Self {
        self.subzones = Some(table);
        self
    }

    /// Builder method to set the subzone key column
    pub fn with_subzone_key(mut self, key: impl Into<String>) -> Self {
        self.subzone_key = key.into();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.infrastructure.is_empty() && self.subzones.is_none()
    }
}

fn points(name: &str, table: &DataFrame) -> Result<Vec<(f64, f64)>> {
    if !has_column(table, "lat") || !has_column(table, "lng") {
        return Err(AutomlError::DataError(format!(
            "infrastructure table '{}' needs lat and lng columns",
            name
        )));
    }
    Ok(coordinates(table)?
        .into_iter()
        .filter(|p| !p.0.is_nan() && !p.1.is_nan())
        .collect())
}

/// Append `<name>_nearest_km` and `<name>_within_<r>km` for every point set
pub fn add_infrastructure_features(
    df: &mut DataFrame,
    aux: &AuxiliaryData,
    radius_km: f64,
) -> Result<()> {
    if aux.infrastructure.is_empty() {
        return Ok(());
    }

    let listings = coordinates(df)?;

    for (name, table) in &aux.infrastructure {
        let pts = points(name, table)?;

        let features: Vec<(Option<f64>, Option<f64>)> = listings
            .par_iter()
            .map(|&listing| {
                if listing.0.is_nan() || listing.1.is_nan() || pts.is_empty() {
                    return (None, Some(0.0));
                }
                let mut nearest = f64::INFINITY;
                let mut within = 0usize;
                for &p in &pts {
                    let d = haversine_km(listing, p);
                    nearest = nearest.min(d);
                    if d <= radius_km {
                        within += 1;
                    }
                }
                (Some(nearest), Some(within as f64))
            })
            .collect();

        let (nearest, within): (Vec<Option<f64>>, Vec<Option<f64>>) = features.into_iter().unzip();
        set_numeric(df, &format!("{}_nearest_km", name), nearest)?;
        set_numeric(df, &format!("{}_within_{}km", name, radius_km), within)?;

        debug!(dataset = %name, points = pts.len(), "Added infrastructure features");
    }

    info!(datasets = aux.infrastructure.len(), "Infrastructure enrichment done");
    Ok(())
}

/// Join the subzone table onto the listings by subzone label.
///
/// `labels` holds each listing's subzone name (after spatial imputation);
/// every numeric column of the table except the key is appended as
/// `subzone_<col>`. Unmatched rows get missing values.
pub fn join_subzones(df: &mut DataFrame, aux: &AuxiliaryData, labels: &[Option<String>]) -> Result<()> {
    let table = match &aux.subzones {
        Some(table) => table,
        None => return Ok(()),
    };

    if labels.len() != df.height() {
        return Err(AutomlError::ShapeError {
            expected: format!("{} subzone labels", df.height()),
            actual: format!("{} subzone labels", labels.len()),
        });
    }

    let keys = string_values(table, &aux.subzone_key)?;
    let index: HashMap<String, usize> = keys
        .into_iter()
        .enumerate()
        .filter_map(|(i, k)| k.map(|k| (k.to_lowercase(), i)))
        .collect();

    let rows: Vec<Option<usize>> = labels
        .iter()
        .map(|label| label.as_ref().and_then(|l| index.get(&l.to_lowercase()).copied()))
        .collect();

    let numeric: Vec<String> = column_names(table)
        .into_iter()
        .filter(|name| name != &aux.subzone_key)
        .filter(|name| is_numeric_column(table, name))
        .collect();

    for name in &numeric {
        let source = numeric_values(table, name)?;
        let joined: Vec<Option<f64>> = rows.iter().map(|r| r.and_then(|i| source[i])).collect();
        set_numeric(df, &format!("subzone_{}", name), joined)?;
    }

    let matched = rows.iter().filter(|r| r.is_some()).count();
    info!(columns = numeric.len(), matched, unmatched = rows.len() - matched, "Joined subzone table");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infrastructure_features() {
        let mut df = df!(
            "lat" => &[1.30, 1.40],
            "lng" => &[103.80, 103.80],
        )
        .unwrap();
        let stations = df!(
            "lat" => &[1.30, 1.305],
            "lng" => &[103.80, 103.80],
        )
        .unwrap();
        let aux = AuxiliaryData::new().with_infrastructure("mrt", stations);

        add_infrastructure_features(&mut df, &aux, 1.0).unwrap();

        let nearest = numeric_values(&df, "mrt_nearest_km").unwrap();
        assert_eq!(nearest[0], Some(0.0));
        assert!(nearest[1].unwrap() > 10.0);

        let within = numeric_values(&df, "mrt_within_1km").unwrap();
        assert_eq!(within, vec![Some(2.0), Some(0.0)]);
    }

    #[test]
    fn test_infrastructure_requires_coordinates() {
        let mut df = df!("lat" => &[1.3], "lng" => &[103.8]).unwrap();
        let aux = AuxiliaryData::new().with_infrastructure("bad", df!("x" => &[1.0]).unwrap());
        assert!(add_infrastructure_features(&mut df, &aux, 1.0).is_err());
    }

    #[test]
    fn test_join_subzones() {
        let mut df = df!("size_sqft" => &[800.0, 900.0, 1000.0]).unwrap();
        let table = df!(
            "name" => &["Bedok North", "Tampines East"],
            "population" => &[1000.0, 2000.0],
            "region" => &["east", "east"],
        )
        .unwrap();
        let aux = AuxiliaryData::new().with_subzones(table);

        let labels = vec![Some("tampines east".to_string()), None, Some("nowhere".to_string())];
        join_subzones(&mut df, &aux, &labels).unwrap();

        assert!(!has_column(&df, "subzone_region"));
        assert_eq!(
            numeric_values(&df, "subzone_population").unwrap(),
            vec![Some(2000.0), None, None]
        );
    }

    #[test]
    fn test_empty_aux_is_noop() {
        let mut df = df!("lat" => &[1.3], "lng" => &[103.8]).unwrap();
        let before = df.clone();
        let aux = AuxiliaryData::new();
        add_infrastructure_features(&mut df, &aux, 1.0).unwrap();
        join_subzones(&mut df, &aux, &[None]).unwrap();
        assert!(df.equals_missing(&before));
    }

    #[test]
    fn test_default_joins_on_name_key() {
        let mut df = df!("size_sqft" => &[800.0]).unwrap();
        let table = df!("name" => &["Bedok North"], "population" => &[1000.0]).unwrap();
        let aux = AuxiliaryData::default().with_subzones(table);
        assert_eq!(aux.subzone_key, "name");

        join_subzones(&mut df, &aux, &[Some("bedok north".to_string())]).unwrap();
        assert_eq!(numeric_values(&df, "subzone_population").unwrap(), vec![Some(1000.0)]);
    }
}
