//! The driver seam: traits a concrete remote source implements, plus the
//! catalog metadata row shapes those traits return.
//!
//! Metadata rows are plain structs mirroring the relational catalog surfaces
//! every driver exposes (table lookup, column enumeration, primary keys,
//! index info). The adapter consumes these rows; it never interprets
//! driver-native metadata directly.

use crate::value::{SqlKind, Value};
use relink_result::Result;

/// How the remote source stores unquoted and quoted identifiers.
///
/// Captured once per session, at connect time, and used to canonicalize every
/// identifier read from the remote catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DialectFlags {
    /// Unquoted identifiers are stored lower-cased.
    pub stores_lower_case: bool,
    /// Unquoted identifiers are stored in mixed case.
    pub stores_mixed_case: bool,
    /// Quoted identifiers are stored in mixed case.
    pub stores_mixed_case_quoted: bool,
    /// The source supports mixed-case identifiers at all.
    pub supports_mixed_case: bool,
}

/// Everything needed to open one remote session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSpec {
    /// Registered driver name, resolved through the [`crate::SessionPool`].
    pub driver: String,
    pub url: String,
    pub user: String,
    pub password: String,
}

/// One row of a remote table-name lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogTable {
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub name: String,
}

/// One row of a remote column enumeration.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogColumn {
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub name: String,
    pub kind: SqlKind,
    pub precision: u32,
    pub scale: i32,
}

/// One row of a remote primary-key enumeration.
///
/// `sequence` is the 1-based position of the column within the key. Some
/// drivers report 0 for every entry; the index reconstruction treats that as
/// "append in arrival order".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKeyEntry {
    pub constraint_name: Option<String>,
    pub column: String,
    pub sequence: u16,
}

/// One row of a remote index-info enumeration.
///
/// Rows arrive ordered by index name, one row per column. Drivers interleave
/// table-statistics rows that describe no index at all; those carry
/// `statistic = true` and are skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfoEntry {
    pub index_name: Option<String>,
    pub column: Option<String>,
    pub non_unique: bool,
    pub statistic: bool,
}

/// Shape of one column of an executed statement's result.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultColumn {
    pub name: String,
    pub kind: SqlKind,
    pub precision: u32,
    pub scale: i32,
}

/// A registered remote source implementation.
pub trait RemoteDriver: Send + Sync {
    /// Open a new physical connection. Each call yields an independent
    /// connection; the pool wraps it in an exclusively-owned session.
    fn connect(&self, spec: &ConnectionSpec) -> Result<Box<dyn RemoteConnection>>;
}

/// A live connection to a remote source.
///
/// Connections are never shared: exactly one [`crate::RemoteSession`] owns a
/// connection, and all access is serialized through the session's lock.
pub trait RemoteConnection: Send {
    /// Identifier storage behavior of this source.
    fn dialect_flags(&self) -> Result<DialectFlags>;

    /// Look up tables matching `table` (optionally restricted to `schema`).
    fn catalog_tables(&self, schema: Option<&str>, table: &str) -> Result<Vec<CatalogTable>>;

    /// Enumerate columns of tables matching `table`, in ordinal order.
    fn catalog_columns(&self, schema: Option<&str>, table: &str) -> Result<Vec<CatalogColumn>>;

    /// Enumerate primary-key columns of the named table.
    fn primary_keys(&self, schema: Option<&str>, table: &str) -> Result<Vec<PrimaryKeyEntry>>;

    /// Enumerate index columns of the named table, ordered by index name.
    fn index_info(&self, schema: Option<&str>, table: &str) -> Result<Vec<IndexInfoEntry>>;

    /// Prepare a parameterized statement.
    fn prepare(&mut self, sql: &str) -> Result<Box<dyn RemoteStatement>>;

    /// Close the physical connection. Must be idempotent.
    fn close(&mut self);
}

/// A prepared remote statement.
pub trait RemoteStatement: Send {
    /// Hint how many rows to fetch per round trip. A hint of 0 means driver
    /// default.
    fn set_fetch_size(&mut self, rows: u32);

    /// Bind a parameter. Ordinals are 1-based.
    fn bind(&mut self, ordinal: usize, value: &Value) -> Result<()>;

    /// Execute with the currently bound parameters. Re-executable; each
    /// execution replaces any previous result.
    fn execute(&mut self) -> Result<()>;

    /// Shape of the current result, empty for statements without one.
    fn result_columns(&self) -> Vec<ResultColumn>;

    /// Fetch the next result row, `None` once exhausted.
    fn next_row(&mut self) -> Result<Option<Vec<Value>>>;
}
