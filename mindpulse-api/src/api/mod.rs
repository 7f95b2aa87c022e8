//! HTTP API handlers for mindpulse-api

pub mod health;
pub mod predict;
pub mod voice;

pub use health::health_routes;
pub use predict::predict_routes;
pub use voice::voice_routes;
