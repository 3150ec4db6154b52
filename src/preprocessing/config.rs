//! Feature pipeline configuration

use serde::{Deserialize, Serialize};

/// Thresholds for training-row outlier removal
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierConfig {
    /// Rows must have `size_sqft` strictly above this value
    pub min_size_sqft: f64,

    /// Rows must have a target strictly above this value
    pub min_target: f64,

    /// Rows must have a target strictly below this value
    pub max_target: f64,

    /// Row positions known to be corrupt in the raw training table
    pub known_bad_rows: Vec<usize>,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            min_size_sqft: 300.0,
            min_target: 0.0,
            max_target: 2e8,
            known_bad_rows: vec![14218, 15027, 4347, 663, 19587, 13461],
        }
    }
}

/// Bounding box and fallback used for coordinate repair
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    pub lat_range: (f64, f64),
    pub lng_range: (f64, f64),
    /// Coordinates assigned when no valid sibling listing exists
    pub fallback: (f64, f64),
    /// Neighbours consulted by the spatial label index
    pub n_neighbors: usize,
    /// Radius for the infrastructure "within" counts, in kilometres
    pub infra_radius_km: f64,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            lat_range: (1.15, 1.50),
            lng_range: (103.55, 104.10),
            fallback: (1.3521, 103.8198),
            n_neighbors: 5,
            infra_radius_km: 1.0,
        }
    }
}

/// Settings for the KNN statistical imputer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImputationConfig {
    pub n_neighbors: usize,
    /// "uniform" or "distance"
    pub weights: String,
}

impl Default for ImputationConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 7,
            weights: "distance".to_string(),
        }
    }
}

/// Configuration for the housing feature pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub outliers: OutlierConfig,
    pub geo: GeoConfig,
    pub imputation: ImputationConfig,

    /// Identifier and free-text columns removed up front
    pub columns_to_drop: Vec<String>,

    /// Columns mapped to integer codes
    pub categorical_columns: Vec<String>,

    /// Categorical columns whose missing labels are inferred from location
    pub spatial_columns: Vec<String>,

    /// Low-cardinality categoricals expanded to indicator columns
    pub onehot_columns: Vec<String>,

    /// Numeric columns rounded up after imputation
    pub round_up_columns: Vec<String>,

    /// High-cardinality categoricals replaced by their mean target
    pub target_encode_columns: Vec<String>,

    /// Columns removed once they have served intermediate steps.
    /// Any column whose name contains `floor_level` is removed as well.
    pub residual_columns: Vec<String>,
}

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            outliers: OutlierConfig::default(),
            geo: GeoConfig::default(),
            imputation: ImputationConfig::default(),
            columns_to_drop: strings(&[
                "listing_id",
                "title",
                "property_details_url",
                "elevation",
                "available_unit_types",
            ]),
            categorical_columns: strings(&[
                "property_type",
                "subzone",
                "planning_area",
                "tenure",
                "furnishing",
                "floor_level",
                "address",
                "property_name",
            ]),
            spatial_columns: strings(&["subzone", "planning_area"]),
            onehot_columns: strings(&["furnishing", "floor_level"]),
            round_up_columns: strings(&["built_year", "num_beds", "num_baths"]),
            target_encode_columns: strings(&["subzone", "planning_area", "property_type"]),
            residual_columns: strings(&["address", "property_name", "tenure"]),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the outlier thresholds
    pub fn with_outliers(mut self, outliers: OutlierConfig) -> Self {
        self.outliers = outliers;
        self
    }

    /// Builder method to set the known-bad row positions
    pub fn with_known_bad_rows(mut self, rows: Vec<usize>) -> Self {
        self.outliers.known_bad_rows = rows;
        self
    }

    /// Builder method to set the geographic settings
    pub fn with_geo(mut self, geo: GeoConfig) -> Self {
        self.geo = geo;
        self
    }

    /// Builder method to set the number of imputation neighbours
    pub fn with_imputer_neighbors(mut self, n_neighbors: usize) -> Self {
        self.imputation.n_neighbors = n_neighbors;
        self
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> crate::error::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
