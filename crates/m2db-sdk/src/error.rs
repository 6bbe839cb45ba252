use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] m2db_store::StoreError),

    #[error("registry error: {0}")]
    Registry(#[from] m2db_registry::RegistryError),

    #[error("blob error: {0}")]
    Blob(#[from] m2db_blob::BlobError),

    #[error("time series error: {0}")]
    Series(#[from] m2db_timeseries::SeriesError),
}

pub type SdkResult<T> = Result<T, SdkError>;
