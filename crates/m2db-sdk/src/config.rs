use std::path::Path;

use m2db_blob::BlobConfig;
use m2db_store::SessionConfig;
use m2db_timeseries::SeriesConfig;
use serde::{Deserialize, Serialize};

use crate::error::{SdkError, SdkResult};

/// Settings for every layer, usually read from a TOML file.
///
/// Every table and field is optional:
///
/// ```toml
/// [session]
/// statement_cache_capacity = 100
/// default_consistency = "LOCAL_QUORUM"
///
/// [blob]
/// default_block_size = 524288
///
/// [series]
/// lookback_days = 730
/// lookahead_days = 7
///
/// [logging]
/// level = "info"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub session: SessionConfig,
    pub blob: BlobConfig,
    pub series: SeriesConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Maximum level for [`init_tracing`](crate::init_tracing).
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl DatabaseConfig {
    pub fn from_toml_str(text: &str) -> SdkResult<Self> {
        toml::from_str(text).map_err(|e| SdkError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> SdkResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> SdkResult<String> {
        toml::to_string(self).map_err(|e| SdkError::Config(e.to_string()))
    }
}
