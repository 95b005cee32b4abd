// nitrous-common - Shared types for the nitrous cache drivers
//
// This crate defines the error taxonomy, connection options and key sets
// shared by every driver adapter.

pub mod config;
pub mod error;
pub mod types;

// Re-export for convenience
pub use config::*;
pub use error::*;
pub use types::*;
