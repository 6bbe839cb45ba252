use m2db_registry::RegistryError;
use m2db_store::StoreError;
use thiserror::Error;

/// Errors from blob operations.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The block size is chosen once per object and never changes.
    #[error("block size of {path} is already fixed at {current}")]
    BlockSizeFixed { path: String, current: usize },

    #[error("invalid block size {0}")]
    InvalidBlockSize(usize),

    /// A block row longer than the object's block size.
    #[error("block {index} is {len} bytes, larger than block size {block_size}")]
    BlockTooLarge {
        index: i32,
        len: usize,
        block_size: usize,
    },

    /// The offset maps to a block index the store cannot address.
    #[error("offset {0} is out of range")]
    OffsetOutOfRange(u64),
}

/// Result alias for blob operations.
pub type BlobResult<T> = Result<T, BlobError>;

impl From<BlobError> for std::io::Error {
    fn from(e: BlobError) -> Self {
        std::io::Error::other(e)
    }
}
