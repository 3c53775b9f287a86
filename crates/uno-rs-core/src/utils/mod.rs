//! Utility functions for uno-rs.
//!
//! - [`text`]: identifier case conversion used when naming new migrations.

pub mod text;
