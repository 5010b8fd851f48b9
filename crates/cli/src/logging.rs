use fairquote_core::config::{AppConfig, LoadOptions, LogFormat, LoggingConfig};
use tracing::Level;

/// Logs go to stderr so stdout stays a single JSON envelope.
pub fn init_from_config() {
    let logging = AppConfig::load(LoadOptions::default())
        .map(|config| config.logging)
        .unwrap_or_else(|_| AppConfig::default().logging);
    init_logging(&logging);
}

pub fn init_logging(logging: &LoggingConfig) {
    let log_level = logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    // A subscriber may already be installed (tests, embedding); keep it.
    let _ = match logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
