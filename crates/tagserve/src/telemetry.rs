//! Logging setup.
//!
//! Library code logs through the `log` facade and opens `tracing` spans around
//! job runs. [`init_logging`] installs a `tracing-subscriber` registry for
//! both and bridges `log` records into it with `tracing_log::LogTracer`.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LogSettings};

/// Builds the filter from `RUST_LOG`, falling back to the configured
/// directive and then to `info`.
fn build_env_filter(settings: &LogSettings) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber. Returns false if one was already
/// installed, in which case nothing changes.
pub fn init_logging(settings: &LogSettings) -> bool {
    let (text_layer, json_layer) = match settings.format {
        LogFormat::Text => (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::CLOSE),
            ),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .with_span_list(true),
            ),
        ),
    };

    let subscriber = tracing_subscriber::registry()
        .with(build_env_filter(settings))
        .with(text_layer)
        .with(json_layer);

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return false;
    }
    // A `log` logger may already be installed by the host application
    if let Err(e) = tracing_log::LogTracer::init() {
        tracing::debug!("log bridge not installed: {}", e);
    }
    tracing::debug!("Logging initialized: filter={}, format={:?}", settings.filter, settings.format);
    true
}
