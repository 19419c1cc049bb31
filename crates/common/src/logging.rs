//! Provides utilities to initialize logging.

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Environment variable name for the service label, which is appended to
/// the whoami string.
pub const SVC_LABEL_ENVVAR: &str = "KEEP_TBTC_SVC_LABEL";

/// Configuration for the logger.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// The whoami string, which is used to identify the service in logs.
    whoami: String,
}

impl LoggerConfig {
    /// Creates a new instance with whoami set.
    pub const fn new(whoami: String) -> Self {
        Self { whoami }
    }

    /// Creates a new instance with the whoami string computed from the
    /// provided base name.
    pub fn with_base_name(s: &str) -> Self {
        Self::new(get_whoami_string(s))
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::with_base_name("(keep-tbtc)")
    }
}

/// Initializes the logging subsystem with the provided config.
///
/// Safe to call more than once; subsequent calls are no-ops so tests can
/// initialize logging independently.
pub fn init(config: LoggerConfig) {
    let filt = tracing_subscriber::EnvFilter::from_default_env();

    let stdout_sub = tracing_subscriber::fmt::layer()
        .compact()
        .with_filter(filt);

    if tracing_subscriber::registry().with(stdout_sub).try_init().is_ok() {
        info!(whoami = %config.whoami, "logging started");
    }
}

/// Gets the service label from the standard envvar, which should be
/// included in the whoami string.
pub fn get_service_label_from_env() -> Option<String> {
    std::env::var(SVC_LABEL_ENVVAR).ok()
}

/// Computes a standard whoami string.
pub fn get_whoami_string(base: &str) -> String {
    match get_service_label_from_env() {
        Some(label) => format!("{base}%{label}"),
        None => base.to_owned(),
    }
}
