//! Structured logging setup.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::TrellisError;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level. Fails if a subscriber is
/// already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), TrellisError> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(&config.level).map_err(|err| TrellisError::Logging(err.to_string()))
    })?;

    let fmt_layer = fmt::layer().with_target(true);

    let result = if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
    };
    result.map_err(|err| TrellisError::Logging(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_fails_instead_of_panicking() {
        let _ = init_logging(&LoggingConfig::default());
        assert!(matches!(
            init_logging(&LoggingConfig::default()),
            Err(TrellisError::Logging(_))
        ));
    }
}
