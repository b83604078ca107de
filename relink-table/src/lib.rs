//! Linked tables: expose a remote relational table (or sub-query) as a
//! native table of the local engine.
//!
//! A [`LinkedTable`] is built by connecting to the remote source through a
//! [`relink_remote::SessionPool`], introspecting the linked object's schema,
//! and reconstructing its indexes. Afterwards every row-level operation is
//! translated into parameterized SQL executed on the exclusively-owned
//! remote session, with cached prepared statements and a bounded retry path
//! that reconnects on transient failures.
//!
//! ```no_run
//! use std::sync::Arc;
//! use relink_remote::SessionPool;
//! use relink_table::{LinkedTable, LinkedTableConfig};
//!
//! # fn main() -> relink_result::Result<()> {
//! let pool = Arc::new(SessionPool::new());
//! // pool.register_driver("pg", ...);
//! let config = LinkedTableConfig::new(
//!     "PUBLIC", 1, "REMOTE_USERS",
//!     "pg", "postgresql://db/app", "app", "secret",
//!     "users",
//! );
//! let table = LinkedTable::open(pool, config)?;
//! table.scan_rows(&mut |row| {
//!     println!("{:?}", row);
//!     Ok(())
//! })?;
//! # Ok(())
//! # }
//! ```

pub mod column;
mod connection;
mod ddl;
pub mod dialect;
pub mod indexes;
mod introspect;
pub mod link;
pub mod row;
mod scan;
pub mod traits;

pub use column::{Column, DefaultSource};
pub use dialect::{normalize_identifier, vendor_family_for_url, VendorFamily};
pub use indexes::{IndexKind, LinkIndex};
pub use link::{LinkedTable, LinkedTableConfig, OpenStatement, ROW_COUNT_APPROXIMATION};
pub use row::Row;
pub use traits::{
    ExecContext, NoCancel, SequenceSource, TableDelete, TableInsert, TableRowCount, TableScan,
    TableUpdate, TableVariant, UndoOp, UndoSink,
};
