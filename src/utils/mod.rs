//! Utility functions and types

pub mod data_loader;

pub use data_loader::{load_csv, load_table, read_csv, write_csv, write_report, write_submission};
