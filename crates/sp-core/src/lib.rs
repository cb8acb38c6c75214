//! # sp-core
//!
//! Core building blocks for stackplot: the binned-series value container
//! and the shared error taxonomy. Everything else (aggregation pipeline,
//! configuration, CLI) lives in the higher crates.

pub mod error;
pub mod series;

pub use error::{Error, Result};
pub use series::BinnedSeries;

/// Crate version, reported in output artifacts.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
