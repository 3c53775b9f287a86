//! Logging integration for uno-rs.
//!
//! Provides helpers for configuring [`tracing`]-based logging from
//! [`Settings`](crate::settings::Settings) and for creating per-migration spans.

use crate::settings::{LogFormat, Settings};

/// Sets up the global tracing subscriber based on the given settings.
///
/// The filter is read from [`Settings::effective_log_level`], so `verbose`
/// forces debug output. Text output is compact and human-readable; JSON
/// output emits one structured object per line.
///
/// Installing a second subscriber is a no-op, which keeps this safe to call
/// from tests and embedding applications.
pub fn setup_logging(settings: &Settings) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(settings.effective_log_level())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match settings.log_format {
        LogFormat::Text => {
            fmt::Subscriber::builder()
                .with_env_filter(filter)
                .with_target(false)
                .compact()
                .try_init()
                .ok();
        }
        LogFormat::Json => {
            fmt::Subscriber::builder()
                .with_env_filter(filter)
                .with_target(true)
                .json()
                .try_init()
                .ok();
        }
    }
}

/// Creates a tracing span for one migration run.
///
/// # Examples
///
/// ```
/// use uno_rs_core::logging::migration_span;
///
/// let span = migration_span("00001_create_users.sql", "up");
/// let _guard = span.enter();
/// tracing::info!("applying");
/// ```
pub fn migration_span(file: &str, direction: &str) -> tracing::Span {
    tracing::info_span!("migration", file = file, direction = direction)
}
