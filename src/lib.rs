//! `fmr-fit` library crate.
//!
//! The binary (`fmr`) is a thin wrapper around this library so that:
//!
//! - the fitting core is testable without spawning processes
//! - the fitters can be driven directly from other Rust code
//!
//! Pipeline: `io::ingest` -> `fit::lineshape` (per sweep, parallel) ->
//! `fit::dispersion` + `fit::damping` -> `io::results` / `report`.

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
