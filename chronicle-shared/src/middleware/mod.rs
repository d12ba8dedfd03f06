mod auth_extractor;
mod metrics_layer;
mod rate_limit;
mod tracing_layer;

pub use auth_extractor::*;
pub use metrics_layer::*;
pub use rate_limit::*;
pub use tracing_layer::*;
