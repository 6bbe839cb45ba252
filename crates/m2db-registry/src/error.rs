use m2db_store::StoreError;
use thiserror::Error;

/// Errors from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The backing store failed; never retried here.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A node name that cannot appear in a path.
    #[error("invalid node name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// A property holds text that does not parse as the requested type.
    #[error("property {name} = {value:?} is not a valid {expected}")]
    InvalidProperty {
        name: String,
        value: String,
        expected: &'static str,
    },

    /// Copying a subtree into itself would never terminate.
    #[error("cannot copy {from} into its own subtree at {to}")]
    CopyIntoSelf { from: String, to: String },

    /// Tree import from a structure that is not an object.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
