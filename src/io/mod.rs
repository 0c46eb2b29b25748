//! Input/output helpers.
//!
//! - CSV ingest of sweeps, manifests and long tables (`ingest`)
//! - flat CSV exports (`export`)
//! - results JSON read/write (`results`)

pub mod export;
pub mod ingest;
pub mod results;

pub use export::*;
pub use ingest::*;
pub use results::*;
