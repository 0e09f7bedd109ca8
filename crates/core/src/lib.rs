//! Shared types, configuration, and errors for the EdgeMatch audience engine.

pub mod config;
pub mod error;
pub mod time;
pub mod types;

pub use config::EdgeConfig;
pub use error::{EdgeError, EdgeResult};
