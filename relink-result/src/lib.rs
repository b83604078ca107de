//! Error types and result definitions for the relink linked-table adapter.
//!
//! This crate provides the unified error type ([`Error`]) and result type alias
//! ([`Result<T>`]) used throughout all relink crates. All operations that could
//! fail return `Result<T>`, where the error variant contains detailed
//! information about what went wrong.
//!
//! # Error Philosophy
//!
//! relink uses a single error enum ([`Error`]) rather than crate-specific error
//! types. This approach:
//! - Simplifies error handling across crate boundaries
//! - Allows errors to propagate naturally with the `?` operator
//! - Provides clear error messages for end users
//! - Enables structured error matching for programmatic handling
//!
//! # Error Categories
//!
//! - **Link establishment** ([`Error::ConnectFailure`]): the retry budget for
//!   opening a remote session was exhausted
//! - **Introspection failures** ([`Error::AmbiguousRemoteObject`],
//!   [`Error::ObjectNotFound`]): the remote object could not be resolved
//! - **Statement failures** ([`Error::RemoteExecution`]): a remote statement
//!   failed after the per-call retry budget
//! - **Driver errors** ([`Error::Remote`]): raw failures reported by a remote
//!   driver before the adapter has classified them
//! - **Usage errors** ([`Error::ReadOnly`], [`Error::Unsupported`],
//!   [`Error::InvalidArgument`], [`Error::Canceled`])
//! - **Internal errors** ([`Error::Internal`]): bugs or unexpected states

pub mod error;
pub mod result;

pub use error::Error;
pub use result::Result;
