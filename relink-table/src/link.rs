//! The linked table: a local table definition whose rows live in a remote
//! relational source.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use relink_remote::{ConnectionSpec, RemoteSession, RemoteStatement, ResultColumn, SessionPool, Value};
use relink_result::{Error, Result};

use crate::column::Column;
use crate::connection::ConnectionManager;
use crate::ddl::{self, CreateParams};
use crate::dialect::{self, VendorFamily};
use crate::indexes::LinkIndex;
use crate::introspect;
use crate::row::Row;
use crate::scan;
use crate::traits::{ExecContext, TableDelete, TableInsert, TableRowCount, TableScan, TableUpdate, UndoOp, UndoSink};

/// Extra execute attempts after the first one.
pub(crate) const EXECUTE_MAX_RETRY: usize = 2;

/// Planner estimate for a linked table; the real count needs a remote query.
pub const ROW_COUNT_APPROXIMATION: u64 = 100_000;

/// Construction parameters for a linked table.
#[derive(Debug, Clone)]
pub struct LinkedTableConfig {
    pub schema: String,
    pub id: u64,
    pub name: String,
    pub driver: String,
    pub url: String,
    pub user: String,
    pub password: String,
    pub original_schema: Option<String>,
    pub original_table: String,
    /// Send row replacement as a remote UPDATE instead of delete+insert.
    pub emit_updates: bool,
    /// Create the table even when the remote source is unreachable.
    pub force: bool,
    pub read_only: bool,
    pub temporary: bool,
    pub global_temporary: bool,
    pub fetch_size: u32,
}

impl LinkedTableConfig {
    pub fn new(
        schema: impl Into<String>,
        id: u64,
        name: impl Into<String>,
        driver: impl Into<String>,
        url: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        original_table: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            id,
            name: name.into(),
            driver: driver.into(),
            url: url.into(),
            user: user.into(),
            password: password.into(),
            original_schema: None,
            original_table: original_table.into(),
            emit_updates: false,
            force: false,
            read_only: false,
            temporary: false,
            global_temporary: false,
            fetch_size: 0,
        }
    }
}

/// A remote table (or sub-query) exposed as a native local table.
///
/// Columns and indexes are fixed at construction; only the session, the
/// statement cache, and a few flag fields change afterwards. All remote
/// access is serialized through the session lock.
pub struct LinkedTable {
    schema: String,
    id: u64,
    name: String,
    original_schema: Option<String>,
    original_table: String,
    qualified_name: String,
    vendor: VendorFamily,
    emit_updates: bool,
    columns: Vec<Column>,
    /// Index 0 is always the synthesized scan index.
    indexes: Vec<LinkIndex>,
    conn: ConnectionManager,
    read_only: AtomicBool,
    temporary: AtomicBool,
    global_temporary: AtomicBool,
    fetch_size: AtomicU32,
    comment: RwLock<Option<String>>,
    /// Serializes exact row-count queries; the result feeds planner state
    /// that must not interleave.
    count_lock: Mutex<()>,
}

impl std::fmt::Debug for LinkedTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkedTable")
            .field("schema", &self.schema)
            .field("id", &self.id)
            .field("name", &self.name)
            .field("original_schema", &self.original_schema)
            .field("original_table", &self.original_table)
            .field("qualified_name", &self.qualified_name)
            .field("vendor", &self.vendor)
            .finish_non_exhaustive()
    }
}

impl LinkedTable {
    /// Open the link: connect with retry, introspect, build the table.
    ///
    /// With `force` set, a failed connect still yields a usable table object
    /// with zero columns and the failure remembered; every operation on it
    /// replays that failure until the table is recreated.
    pub fn open(pool: Arc<SessionPool>, config: LinkedTableConfig) -> Result<LinkedTable> {
        let vendor = dialect::vendor_family_for_url(&config.url);
        let spec = ConnectionSpec {
            driver: config.driver.clone(),
            url: config.url.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
        };
        let conn = ConnectionManager::new(pool, spec);

        let original_schema = config.original_schema.clone();
        let original_table = config.original_table.clone();
        let discovered = conn.connect_with(|session| {
            introspect::read_meta_data(session, original_schema.as_deref(), &original_table, vendor)
        });

        let (columns, qualified_name, indexes) = match discovered {
            Ok(d) => (d.columns, d.qualified_name, d.indexes),
            Err(e) if config.force => {
                tracing::warn!(table = %config.name, error = %e,
                    "creating forced linked table despite connect failure");
                (Vec::new(), original_table.clone(), vec![LinkIndex::scan(0)])
            }
            Err(e) => return Err(e),
        };

        Ok(LinkedTable {
            schema: config.schema,
            id: config.id,
            name: config.name,
            original_schema,
            original_table,
            qualified_name,
            vendor,
            emit_updates: config.emit_updates,
            columns,
            indexes,
            conn,
            read_only: AtomicBool::new(config.read_only),
            temporary: AtomicBool::new(config.temporary),
            global_temporary: AtomicBool::new(config.global_temporary),
            fetch_size: AtomicU32::new(config.fetch_size),
            comment: RwLock::new(None),
            count_lock: Mutex::new(()),
        })
    }

    // ========================================================================
    // Identity and metadata
    // ========================================================================

    #[inline]
    pub fn schema(&self) -> &str {
        &self.schema
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn original_table(&self) -> &str {
        &self.original_table
    }

    /// Remote name used in every generated statement; carries the remote
    /// schema when one was discovered and the link name was unqualified.
    #[inline]
    pub fn qualified_table(&self) -> &str {
        &self.qualified_name
    }

    #[inline]
    pub fn vendor_family(&self) -> VendorFamily {
        self.vendor
    }

    #[inline]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[inline]
    pub fn indexes(&self) -> &[LinkIndex] {
        &self.indexes
    }

    /// The synthesized scan index.
    pub fn scan_index(&self) -> &LinkIndex {
        &self.indexes[0]
    }

    /// First unique index, if any (the primary key sorts first).
    pub fn unique_index(&self) -> Option<&LinkIndex> {
        self.indexes.iter().find(|i| i.kind().is_unique())
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::Acquire)
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::Release);
    }

    pub fn is_insertable(&self) -> bool {
        !self.is_read_only()
    }

    pub fn set_temporary(&self, temporary: bool) {
        self.temporary.store(temporary, Ordering::Release);
    }

    pub fn set_global_temporary(&self, global: bool) {
        self.global_temporary.store(global, Ordering::Release);
    }

    pub fn fetch_size(&self) -> u32 {
        self.fetch_size.load(Ordering::Acquire)
    }

    /// Hint how many rows the remote driver should fetch per round trip.
    pub fn set_fetch_size(&self, rows: u32) {
        self.fetch_size.store(rows, Ordering::Release);
    }

    pub fn set_comment(&self, comment: Option<String>) {
        if let Ok(mut slot) = self.comment.write() {
            *slot = comment;
        }
    }

    pub fn comment(&self) -> Option<String> {
        self.comment.read().ok().and_then(|slot| slot.clone())
    }

    // ========================================================================
    // Unsupported structural operations
    // ========================================================================

    pub fn add_local_index(&self) -> Result<()> {
        Err(Error::Unsupported("ADD INDEX".into()))
    }

    pub fn check_support_alter(&self) -> Result<()> {
        Err(Error::Unsupported("ALTER".into()))
    }

    pub fn truncate(&self) -> Result<()> {
        Err(Error::Unsupported("TRUNCATE".into()))
    }

    // ========================================================================
    // Executor
    // ========================================================================

    /// Execute `sql` with `params` against the remote session.
    ///
    /// Fails immediately with the remembered connect failure while
    /// disconnected. With `reuse` the prepared statement goes straight back
    /// into the cache and no result is returned; otherwise the caller
    /// receives an [`OpenStatement`] and must finish or drop it.
    ///
    /// On execution failure the session is discarded (invalidating its
    /// statement cache), the link reconnects, and the call is retried, up to
    /// [`EXECUTE_MAX_RETRY`] extra attempts.
    pub fn execute(
        &self,
        sql: &str,
        params: &[Value],
        reuse: bool,
    ) -> Result<Option<OpenStatement>> {
        let mut attempt = 0;
        loop {
            let session = self.conn.session()?;
            match self.execute_once(&session, sql, params, reuse) {
                Ok(out) => return Ok(out),
                Err(e) => {
                    if attempt >= EXECUTE_MAX_RETRY {
                        return Err(Error::remote_execution(sql, e));
                    }
                    tracing::warn!(table = %self.name, sql = %sql, error = %e,
                        "remote statement failed, discarding session and reconnecting");
                    self.conn.discard_session()?;
                    self.reconnect()?;
                    attempt += 1;
                }
            }
        }
    }

    fn execute_once(
        &self,
        session: &Arc<RemoteSession>,
        sql: &str,
        params: &[Value],
        reuse: bool,
    ) -> Result<Option<OpenStatement>> {
        let mut guard = session.lock()?;
        let mut stmt = match guard.take_statement(sql) {
            Some(stmt) => stmt,
            None => {
                let mut stmt = guard.connection()?.prepare(sql)?;
                let fetch = self.fetch_size();
                if fetch != 0 {
                    stmt.set_fetch_size(fetch);
                }
                stmt
            }
        };
        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(table = %self.name, sql = %sql,
                params = %render_params(params), "executing remote statement");
        }
        for (i, value) in params.iter().enumerate() {
            stmt.bind(i + 1, value)?;
        }
        stmt.execute()?;
        if reuse {
            guard.put_statement(sql, stmt);
            Ok(None)
        } else {
            drop(guard);
            Ok(Some(OpenStatement {
                session: Arc::clone(session),
                sql: sql.to_string(),
                stmt: Some(stmt),
            }))
        }
    }

    /// Re-establish the session after a discard. Runs the full handshake for
    /// validation; the construction-time column and index lists stay as they
    /// are.
    fn reconnect(&self) -> Result<()> {
        let original_schema = self.original_schema.as_deref();
        self.conn
            .connect_with(|session| {
                introspect::read_meta_data(
                    session,
                    original_schema,
                    &self.original_table,
                    self.vendor,
                )
                .map(|_| ())
            })
    }

    // ========================================================================
    // Row operations
    // ========================================================================

    fn check_writable(&self, op: &str) -> Result<()> {
        if self.is_read_only() {
            Err(Error::ReadOnly(format!("{} on table {}", op, self.name)))
        } else {
            Ok(())
        }
    }

    /// Substitute column defaults into an insert row.
    pub fn convert_insert_row(&self, row: &Row) -> Result<Vec<Value>> {
        self.convert_row(row)
    }

    /// Substitute column defaults into the new row of an update.
    pub fn convert_update_row(&self, row: &Row) -> Result<Vec<Value>> {
        self.convert_row(row)
    }

    fn check_row_shape(&self, row: &Row) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(Error::InvalidArgument(format!(
                "row has {} values, table {} has {} columns",
                row.len(),
                self.name,
                self.columns.len()
            )));
        }
        Ok(())
    }

    fn convert_row(&self, row: &Row) -> Result<Vec<Value>> {
        self.check_row_shape(row)?;
        self.columns
            .iter()
            .map(|c| c.resolve_stored_value(row.get(c.ordinal()).cloned()))
            .collect()
    }

    /// Insert one row.
    pub fn add_row(&self, row: &Row) -> Result<()> {
        self.check_writable("INSERT")?;
        let values = self.convert_insert_row(row)?;
        let sql = scan::insert_sql(&self.qualified_name, self.columns.len());
        self.execute(&sql, &values, true)?;
        Ok(())
    }

    /// Delete one row, addressed by full-row equality.
    pub fn remove_row(&self, row: &Row) -> Result<()> {
        self.check_writable("DELETE")?;
        self.check_row_shape(row)?;
        let old = row.materialized();
        let (sql, params) = scan::delete_sql(&self.qualified_name, &self.columns, &old);
        self.execute(&sql, &params, true)?;
        Ok(())
    }

    /// Replace rows, pair by pair, with cooperative cancellation between
    /// pairs.
    ///
    /// With `emit_updates` each pair becomes one remote UPDATE; without it,
    /// a remote DELETE then INSERT. Either way the undo sink records a
    /// delete of the old row followed by an insert of the new one, so local
    /// recovery bookkeeping is identical on both paths.
    pub fn update_rows(
        &self,
        ctx: &dyn ExecContext,
        undo: &mut dyn UndoSink,
        pairs: &[(Row, Row)],
    ) -> Result<()> {
        self.check_writable("UPDATE")?;
        for (old, new) in pairs {
            ctx.check_canceled()?;
            if self.emit_updates {
                let new_values = self.convert_update_row(new)?;
                self.check_row_shape(old)?;
                let old_values = old.materialized();
                let (sql, params) = scan::update_sql(
                    &self.qualified_name,
                    &self.columns,
                    &old_values,
                    &new_values,
                );
                self.execute(&sql, &params, true)?;
            } else {
                self.remove_row(old)?;
                self.add_row(new)?;
            }
            undo.log(UndoOp::Delete, old)?;
            undo.log(UndoOp::Insert, new)?;
        }
        Ok(())
    }

    /// Stream every row to `on_row`, in remote delivery order.
    pub fn scan_rows(&self, on_row: &mut dyn FnMut(Row) -> Result<()>) -> Result<()> {
        let sql = scan::select_all_sql(&self.qualified_name);
        let mut stmt = self
            .execute(&sql, &[], false)?
            .ok_or_else(|| Error::Internal("scan produced no open statement".into()))?;
        while let Some(values) = stmt.next_row()? {
            on_row(Row::from_values(values))?;
        }
        stmt.finish()
    }

    /// Exact row count, queried from the remote source.
    pub fn row_count(&self) -> Result<u64> {
        let _serialized = self
            .count_lock
            .lock()
            .map_err(|_| Error::Internal("row count lock poisoned".into()))?;
        let sql = scan::count_sql(&self.qualified_name);
        let mut stmt = self
            .execute(&sql, &[], false)?
            .ok_or_else(|| Error::Internal("count produced no open statement".into()))?;
        let row = stmt
            .next_row()
            .map_err(|e| Error::remote_execution(&sql, e))?;
        let count = match row.as_deref() {
            Some([Value::Int64(n), ..]) if *n >= 0 => *n as u64,
            Some([Value::Int32(n), ..]) if *n >= 0 => *n as u64,
            Some([Value::Decimal(d), ..]) => d
                .parse::<u64>()
                .map_err(|e| Error::remote_execution(&sql, e))?,
            _ => {
                return Err(Error::remote_execution(
                    &sql,
                    "count query returned no usable row",
                ));
            }
        };
        stmt.finish()?;
        Ok(count)
    }

    /// Planner estimate; never touches the remote source.
    pub fn row_count_approximation(&self) -> u64 {
        ROW_COUNT_APPROXIMATION
    }

    // ========================================================================
    // DDL and teardown
    // ========================================================================

    /// Re-create text for this link.
    pub fn create_sql(&self) -> Result<String> {
        let spec = self.conn.spec()?;
        let comment = self.comment();
        Ok(ddl::create_sql(&CreateParams {
            schema: &self.schema,
            name: &self.name,
            comment: comment.as_deref(),
            driver: &spec.driver,
            url: &spec.url,
            user: &spec.user,
            password: &spec.password,
            original_table: &self.original_table,
            temporary: self.temporary.load(Ordering::Acquire),
            global_temporary: self.global_temporary.load(Ordering::Acquire),
            emit_updates: self.emit_updates,
            read_only: self.is_read_only(),
            fetch_size: self.fetch_size(),
        }))
    }

    /// Drop text for this link.
    pub fn drop_sql(&self) -> String {
        ddl::drop_sql(&self.schema, &self.name)
    }

    /// Close the remote session. The table keeps its definition and could
    /// be reconnected by a later operation's retry path.
    pub fn close(&self) {
        self.conn.close();
    }

    /// Permanent teardown: close the session and clear the connection
    /// identity so the table can no longer be used. Idempotent.
    pub fn shutdown(&self) {
        self.conn.shutdown();
    }
}

fn render_params(params: &[Value]) -> String {
    let mut out = String::from("{");
    for (i, value) in params.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&format!("{}: {}", i + 1, value.format_sql()));
    }
    out.push('}');
    out
}

/// An executed statement handed out by the non-reuse path of
/// [`LinkedTable::execute`].
///
/// The guard owns the prepared statement while rows are being read. Both
/// [`OpenStatement::finish`] and dropping the guard re-admit the statement to
/// the session's cache, so statements never leak outside it.
pub struct OpenStatement {
    session: Arc<RemoteSession>,
    sql: String,
    stmt: Option<Box<dyn RemoteStatement>>,
}

impl OpenStatement {
    /// Fetch the next result row, `None` once exhausted.
    pub fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        match self.stmt.as_mut() {
            Some(stmt) => stmt.next_row(),
            None => Err(Error::Internal("statement already finished".into())),
        }
    }

    /// Shape of the result.
    pub fn result_columns(&self) -> Vec<ResultColumn> {
        self.stmt
            .as_ref()
            .map(|s| s.result_columns())
            .unwrap_or_default()
    }

    /// Declare the statement done and re-admit it to the cache.
    pub fn finish(mut self) -> Result<()> {
        self.readmit()
    }

    fn readmit(&mut self) -> Result<()> {
        if let Some(stmt) = self.stmt.take() {
            let mut guard = self.session.lock()?;
            guard.put_statement(&self.sql, stmt);
        }
        Ok(())
    }
}

impl Drop for OpenStatement {
    fn drop(&mut self) {
        let _ = self.readmit();
    }
}

// Capability trait wiring; inherent methods carry the documentation.

impl TableScan for LinkedTable {
    fn scan_rows(&self, on_row: &mut dyn FnMut(Row) -> Result<()>) -> Result<()> {
        LinkedTable::scan_rows(self, on_row)
    }
}

impl TableInsert for LinkedTable {
    fn add_row(&self, row: &Row) -> Result<()> {
        LinkedTable::add_row(self, row)
    }
}

impl TableDelete for LinkedTable {
    fn remove_row(&self, row: &Row) -> Result<()> {
        LinkedTable::remove_row(self, row)
    }
}

impl TableUpdate for LinkedTable {
    fn update_rows(
        &self,
        ctx: &dyn ExecContext,
        undo: &mut dyn UndoSink,
        pairs: &[(Row, Row)],
    ) -> Result<()> {
        LinkedTable::update_rows(self, ctx, undo, pairs)
    }
}

impl TableRowCount for LinkedTable {
    fn row_count(&self) -> Result<u64> {
        LinkedTable::row_count(self)
    }

    fn row_count_approximation(&self) -> u64 {
        LinkedTable::row_count_approximation(self)
    }
}
