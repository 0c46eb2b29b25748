//! Mathematical utilities: linear least squares, Levenberg–Marquardt, and the
//! special functions behind regression p-values.

pub mod lm;
pub mod ols;
pub mod special;

pub use lm::*;
pub use ols::*;
pub use special::*;
