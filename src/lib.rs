pub mod analytics;
pub mod api;
pub mod config;
pub mod errors;
pub mod ingestion;
pub mod metrics;
pub mod models;
pub mod services;
pub mod session;
pub mod state;
pub mod view;

pub use config::DashConfig;
pub use errors::DashError;
pub use session::{DashboardSession, SelectOutcome};
