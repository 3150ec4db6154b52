//! Shared listing fixtures for the integration tests
#![allow(dead_code)]

use ndarray::Array1;
use polars::prelude::*;

const TYPES: [&str; 4] = ["Condo", "HDB 4 Rooms", "Landed", "Apartment"];
const FURNISHING: [&str; 4] = ["fully", "partial", "unfurnished", "NA"];
const FLOORS: [Option<&str>; 4] = [Some("high (20 total)"), Some("low"), None, Some("mid (10 total)")];
const SUBZONES: [Option<&str>; 5] = [Some("alpha"), Some("beta"), None, Some("gamma"), Some("delta")];
const AREAS: [Option<&str>; 4] = [Some("north"), Some("east"), Some("west"), None];
const TENURE: [Option<&str>; 4] = [Some("freehold"), Some("99-year leasehold"), Some("999-year leasehold"), None];

fn size_of(k: usize) -> f64 {
    (500 + (k * 37) % 2500) as f64
}

/// `n` synthetic listings, numbered from `offset`
pub fn listings(n: usize, offset: usize) -> DataFrame {
    let ks: Vec<usize> = (offset..offset + n).collect();

    let lat: Vec<f64> = ks
        .iter()
        .map(|&k| if k % 11 == 5 { 0.0 } else { 1.28 + (k % 10) as f64 * 0.01 })
        .collect();
    let lng: Vec<f64> = ks.iter().map(|&k| 103.75 + (k % 8) as f64 * 0.02).collect();

    df!(
        "listing_id" => ks.iter().map(|&k| k as i64).collect::<Vec<_>>(),
        "title" => ks.iter().map(|&k| format!("Listing {}", k)).collect::<Vec<_>>(),
        "address" => ks.iter().map(|&k| format!("{} street", k % 7)).collect::<Vec<_>>(),
        "property_name" => ks.iter().map(|&k| format!("Estate {}", k % 6)).collect::<Vec<_>>(),
        "property_type" => ks.iter().map(|&k| TYPES[k % 4]).collect::<Vec<_>>(),
        "tenure" => ks.iter().map(|&k| TENURE[k % 4]).collect::<Vec<_>>(),
        "built_year" => ks.iter().map(|&k| if k % 5 == 0 { None } else { Some((1980 + (k * 7) % 40) as f64) }).collect::<Vec<_>>(),
        "num_beds" => ks.iter().map(|&k| if k % 6 == 0 { None } else { Some((1 + k % 5) as f64) }).collect::<Vec<_>>(),
        "num_baths" => ks.iter().map(|&k| if k % 7 == 3 { None } else { Some((1 + k % 3) as f64) }).collect::<Vec<_>>(),
        "size_sqft" => ks.iter().map(|&k| size_of(k)).collect::<Vec<_>>(),
        "floor_level" => ks.iter().map(|&k| FLOORS[k % 4]).collect::<Vec<_>>(),
        "furnishing" => ks.iter().map(|&k| FURNISHING[k % 4]).collect::<Vec<_>>(),
        "lat" => lat,
        "lng" => lng,
        "subzone" => ks.iter().map(|&k| SUBZONES[k % 5]).collect::<Vec<_>>(),
        "planning_area" => ks.iter().map(|&k| AREAS[k % 4]).collect::<Vec<_>>(),
    )
    .unwrap()
}

/// Prices for the listings numbered from `offset`, driven mostly by size
pub fn prices(n: usize, offset: usize) -> Array1<f64> {
    (offset..offset + n)
        .map(|k| 1_000.0 * size_of(k) + 50_000.0 * (k % 5) as f64 + 300_000.0)
        .collect()
}

/// Two train stations inside the listing area
pub fn stations() -> DataFrame {
    df!(
        "name" => &["north station", "east station"],
        "lat" => &[1.29, 1.33],
        "lng" => &[103.77, 103.85],
    )
    .unwrap()
}

/// Subzone attribute table keyed by `name`
pub fn subzone_table() -> DataFrame {
    df!(
        "name" => &["Alpha", "Beta", "Gamma", "Delta"],
        "population" => &[12_000.0, 8_000.0, 20_000.0, 5_000.0],
        "area_size" => &[1.5, 0.8, 2.2, 0.6],
    )
    .unwrap()
}
