mod config;
mod constants;
mod metric;
mod stats;
mod variant;

pub use config::*;
pub use constants::*;
pub use metric::*;
pub use stats::*;
pub use variant::*;
