//! REST access to the dashboard backend.

pub mod client;
pub mod normalize;

pub use client::ApiClient;
