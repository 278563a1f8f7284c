//! Error hierarchy for the registry bridge.
//!
//! Two layers: [`StoreError`] covers everything that can go wrong against
//! the backing resource store, [`Error`] is the bridge-level taxonomy that
//! callers and the RPC boundary see. The `tonic::Status` conversion keeps
//! "bad request" distinguishable from "backend unavailable" on the wire.

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed request, rejected synchronously and never retried
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration validation failures
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Failures against the backing resource store
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration loading failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not complete the call (connection loss, backend down)
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// No stored entity under the requested key
    #[error("Resource {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },

    /// Create raced with an existing entity under the same key
    #[error("Resource {namespace}/{name} already exists")]
    AlreadyExists { namespace: String, name: String },

    /// Update lost the store's per-key version check
    #[error("Conflict on {namespace}/{name}: expected version {expected}, got {actual}")]
    Conflict {
        namespace: String,
        name: String,
        expected: u64,
        actual: u64,
    },

    /// The watch stream terminated; watchers must be re-snapshotted
    #[error("Watch stream closed: {0}")]
    WatchClosed(String),
}

impl From<Error> for tonic::Status {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidArgument(msg) => tonic::Status::invalid_argument(msg),
            Error::Store(StoreError::NotFound { .. }) => tonic::Status::not_found(err.to_string()),
            Error::Store(StoreError::AlreadyExists { .. }) | Error::Store(StoreError::Conflict { .. }) => {
                tonic::Status::aborted(err.to_string())
            }
            Error::Store(e) => tonic::Status::unavailable(e.to_string()),
            Error::InvalidConfig(_) | Error::Config(_) | Error::Fatal(_) => {
                tonic::Status::internal(err.to_string())
            }
        }
    }
}

impl From<StoreError> for tonic::Status {
    fn from(err: StoreError) -> Self {
        Error::from(err).into()
    }
}
