//! Fitting stages.
//!
//! - per-sweep lineshape fits (`lineshape`)
//! - Kittel dispersion fit over resonance fields (`dispersion`)
//! - linewidth-vs-frequency regression (`damping`)
//! - batch orchestration tying them together (`batch`)

pub mod batch;
pub mod damping;
pub mod dispersion;
pub mod lineshape;

pub use batch::*;
pub use damping::*;
pub use dispersion::*;
pub use lineshape::*;
