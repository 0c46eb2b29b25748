//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - measured input (`Sweep`)
//! - model parameter sets (`LineshapeParams`, `KittelParams`)
//! - fit outputs (`LineshapeFitResult`, `DispersionFitResult`, `DampingFitResult`)
//! - the saved run record (`ResultsFile`)
//! - run configuration (`FitConfig`)

pub mod config;
pub mod results;
pub mod types;

pub use config::*;
pub use results::*;
pub use types::*;
