//! HTTP API handlers for sampler-api

pub mod audit;
pub mod health;
pub mod presets;
pub mod samples;
pub mod upload;

pub use audit::audit_routes;
pub use health::health_routes;
pub use presets::preset_routes;
pub use samples::sample_routes;
pub use upload::upload_routes;
