//! Remote side of the relink linked-table adapter.
//!
//! This crate defines the seam between the adapter and concrete remote
//! sources: the [`RemoteDriver`] / [`RemoteConnection`] / [`RemoteStatement`]
//! traits, the catalog metadata row shapes those traits return, the untyped
//! [`Value`] scalar used for parameter binding and result rows, and the
//! managed [`RemoteSession`] (connection plus statement cache) handed out by a
//! [`SessionPool`].

pub mod driver;
pub mod session;
pub mod value;

pub use driver::{
    CatalogColumn, CatalogTable, ConnectionSpec, DialectFlags, IndexInfoEntry, PrimaryKeyEntry,
    RemoteConnection, RemoteDriver, RemoteStatement, ResultColumn,
};
pub use session::{RemoteSession, SessionInner, SessionPool};
pub use value::{SqlKind, Value};
