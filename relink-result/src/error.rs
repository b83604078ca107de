use std::fmt;
use thiserror::Error;

/// Unified error type for all relink operations.
///
/// This enum covers every failure mode of the linked-table adapter, from
/// establishing the remote session to executing individual statements. Each
/// variant includes context-specific information to help diagnose and handle
/// the error appropriately.
///
/// # Cloning
///
/// `Error` implements `Clone` because a failed link remembers its connect
/// error and replays it on every later operation until a reconnect succeeds.
/// Driver-level failures are therefore carried as message strings rather than
/// boxed source errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Establishing the remote session failed after the retry budget.
    ///
    /// This is the terminal form of a connect failure: every attempt
    /// (including the introspection handshake) failed, and the last
    /// underlying error is carried in `message`. A forced link stores this
    /// error and replays it whenever the broken link is used.
    #[error("could not connect to '{url}': {message}")]
    ConnectFailure { url: String, message: String },

    /// The remote catalog reported more than one object for the linked name.
    ///
    /// Raised during introspection when the table-name lookup matches
    /// multiple remote objects (typically the same table name in several
    /// schemas) and no schema was given to disambiguate. This error does not
    /// consume connect retries; the caller must qualify the name instead.
    #[error("ambiguous remote table name: {name}")]
    AmbiguousRemoteObject { name: String },

    /// The linked object could not be probed on the remote source.
    ///
    /// Raised when the zero-row accessibility probe fails, meaning the
    /// qualified name does not resolve to a readable object. `message`
    /// carries the remote driver's explanation.
    #[error("remote table not found: {name} ({message})")]
    ObjectNotFound { name: String, message: String },

    /// The operation is not meaningful for a linked table.
    ///
    /// Linked tables delegate storage to the remote source, so local
    /// structural operations (adding indexes, truncation, storage-level
    /// alteration) are rejected with this error.
    #[error("operation is not supported on a linked table: {0}")]
    Unsupported(String),

    /// A write was attempted against a read-only link.
    #[error("linked table is read only: {0}")]
    ReadOnly(String),

    /// A remote statement failed after the per-call retry budget.
    ///
    /// The SQL text is included so the user can see exactly which generated
    /// statement the remote source rejected.
    #[error("error executing remote statement '{sql}': {message}")]
    RemoteExecution { sql: String, message: String },

    /// Raw failure reported by a remote driver.
    ///
    /// Drivers return this variant for connection and statement faults; the
    /// adapter classifies it into [`Error::ConnectFailure`] or
    /// [`Error::RemoteExecution`] once the relevant retry budget is spent.
    #[error("remote driver error: {0}")]
    Remote(String),

    /// The executing statement was canceled cooperatively.
    #[error("statement was canceled")]
    Canceled,

    /// Invalid user input or API parameter.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Internal error indicating a bug or unexpected state.
    ///
    /// This error should never occur during normal operation. It indicates a
    /// violated internal invariant, such as a poisoned lock or a statement
    /// guard used after teardown.
    #[error("an internal operation failed: {0}")]
    Internal(String),
}

impl Error {
    /// Create a raw driver error from any displayable error.
    #[inline]
    pub fn remote<E: fmt::Display>(err: E) -> Self {
        Error::Remote(err.to_string())
    }

    /// Create an internal error from any displayable error.
    #[inline]
    pub fn internal<E: fmt::Display>(err: E) -> Self {
        Error::Internal(err.to_string())
    }

    /// Wrap a statement failure with the SQL text that produced it.
    ///
    /// Mirrors how surfaced execution errors always carry the generated SQL
    /// alongside the remote message.
    #[inline]
    pub fn remote_execution<E: fmt::Display>(sql: impl Into<String>, err: E) -> Self {
        Error::RemoteExecution {
            sql: sql.into(),
            message: err.to_string(),
        }
    }
}
