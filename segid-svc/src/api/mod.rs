//! HTTP API handlers for segid-svc

pub mod download;
pub mod extract;
pub mod health;
pub mod sse;

pub use download::download_routes;
pub use extract::extract_routes;
pub use health::health_routes;
pub use sse::event_routes;
