//! # uno-rs-core
//!
//! Core types, settings, and error types shared by the uno-rs migration crates.
//! This crate has no database dependencies and provides the foundation for all
//! other crates in the workspace.
//!
//! ## Modules
//!
//! - [`error`] - The [`UnoError`] taxonomy and result alias
//! - [`settings`] - Tool configuration with defaults
//! - [`settings_loader`] - Loading settings from TOML and the environment
//! - [`logging`] - Tracing-based logging integration
//! - [`utils`] - Text helpers used when naming new migrations

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;
pub mod utils;

// Re-export the most commonly used types at the crate root.
pub use error::{UnoError, UnoResult};
pub use settings::{LogFormat, Settings};
