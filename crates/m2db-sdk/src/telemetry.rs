use std::str::FromStr;

use tracing::Level;

use crate::config::LoggingConfig;
use crate::error::{SdkError, SdkResult};

/// Install a formatting subscriber at the configured level.
///
/// Returns `Ok(false)` when a global subscriber was already installed,
/// so calling this more than once is harmless.
pub fn init_tracing(config: &LoggingConfig) -> SdkResult<bool> {
    let level = Level::from_str(config.level.trim())
        .map_err(|_| SdkError::Config(format!("unknown log level {:?}", config.level)))?;
    Ok(tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_level_is_rejected() {
        let config = LoggingConfig {
            level: "chatty".into(),
        };
        assert!(matches!(init_tracing(&config), Err(SdkError::Config(_))));
    }

    #[test]
    fn second_install_is_harmless() {
        let config = LoggingConfig::default();
        let _ = init_tracing(&config).unwrap();
        assert!(!init_tracing(&config).unwrap());
    }
}
