//! Structured logging initialization.

use crate::config::LoggingSettings;
use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global tracing subscriber.
///
/// The filter is resolved in order: explicit `filter` setting,
/// `COLLEGUE_LOG` environment variable, then the `level` setting
/// (default `info`). Logs go to stderr so stdout stays clean for
/// JSON tool output.
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init(settings: &LoggingSettings) {
    let filter = settings.filter.clone().map_or_else(
        || {
            std::env::var("COLLEGUE_LOG").unwrap_or_else(|_| {
                settings
                    .level
                    .clone()
                    .unwrap_or_else(|| "info".to_string())
            })
        },
        |filter| filter,
    );

    let env_filter = EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let result = if settings.format.as_deref() == Some("json") {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .try_init()
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .try_init()
    };

    if let Err(err) = result {
        tracing::debug!("logging already initialized: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let settings = LoggingSettings {
            level: Some("debug".to_string()),
            ..LoggingSettings::default()
        };
        init(&settings);
        init(&settings);
    }
}
