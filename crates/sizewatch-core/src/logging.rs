#![forbid(unsafe_code)]

//! Structured logging for the observation pipeline.
//!
//! All crates log through `tracing`. Nothing here installs a subscriber by
//! default: the embedding application owns that decision. With the
//! `tracing-json` feature, [`init_json_subscriber`] installs a JSON formatter
//! filtered by `RUST_LOG`.
//!
//! Levels used across the workspace:
//! - `debug`: observe/unobserve, attach/detach, mechanism creation.
//! - `trace`: regulator scheduling, timer firing, suppressed duplicates.
//! - `warn`: caller-error sequences and unmeasurable elements.

pub use tracing::{
    debug, debug_span, error, error_span, info, info_span, trace, trace_span, warn, warn_span,
};

/// Install a global JSON subscriber honoring `RUST_LOG`.
///
/// Returns an error if a global subscriber is already set.
#[cfg(feature = "tracing-json")]
pub fn init_json_subscriber() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
}
