//! Pulse dashboard feed.
//!
//! Main application that orchestrates all components:
//! - Bulk instrument loading per category (REST or simulated)
//! - Tick ingestion with automatic reconnection
//! - Instrument catalog with monotonic tick merging
//! - Per-column view projection and flash markers

pub mod app;
pub mod config;
pub mod error;
pub mod simulator;

pub use app::Application;
pub use config::{AppConfig, RunMode};
pub use error::{AppError, AppResult};
pub use simulator::SimulatedMarket;
