//! HTTP API handlers for qkpi-rp

pub mod buildinfo;
pub mod entry;
pub mod error;
pub mod health;
pub mod reports;

pub use buildinfo::get_build_info;
pub use entry::entry_routes;
pub use error::ApiError;
pub use health::health_routes;
pub use reports::report_routes;
