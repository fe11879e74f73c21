pub mod handlers;
pub mod metadata;
pub mod runtime;

mod error;

pub use crate::error::RuntimeError;
pub use crate::handlers::{EnterpriseHandler, OperationalHandler};
pub use crate::metadata::RunMetadata;
pub use crate::runtime::{BenchCli, BenchRuntime};
