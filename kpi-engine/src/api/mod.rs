//! HTTP API handlers for kpi-engine

pub mod dashboard;
pub mod execution;
pub mod health;
pub mod values;

pub use dashboard::dashboard_routes;
pub use execution::execution_routes;
pub use health::health_routes;
pub use values::value_routes;
