//! Application configuration and constants
//!
//! Central naming and identification values. All banners and console
//! output should reference these constants rather than hardcoding values.

/// The application name
pub const APP_NAME: &str = "Skylark FCC";

/// Application version (synchronized with Cargo.toml)
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
