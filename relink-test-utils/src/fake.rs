//! A scripted in-memory remote driver for linked-table tests.
//!
//! The fake holds seeded tables (catalog metadata plus data rows), optional
//! query shapes for query links, and failure-injection counters. It
//! interprets exactly the SQL shapes the adapter generates: the zero-row
//! probe, full scans, COUNT, INSERT, DELETE and UPDATE keyed by full-row
//! equality. Anything else fails, which is itself useful in tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use relink_remote::{
    CatalogColumn, CatalogTable, ConnectionSpec, DialectFlags, IndexInfoEntry, PrimaryKeyEntry,
    RemoteConnection, RemoteDriver, RemoteStatement, ResultColumn, SqlKind, Value,
};
use relink_result::{Error, Result};

/// One seeded remote table.
#[derive(Debug, Clone, Default)]
pub struct FakeTable {
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub name: String,
    pub columns: Vec<CatalogColumn>,
    /// Appended verbatim to column enumerations, for simulating drivers
    /// that report the same table name from several catalogs or schemas.
    pub extra_columns: Vec<CatalogColumn>,
    pub primary_keys: Vec<PrimaryKeyEntry>,
    pub index_info: Vec<IndexInfoEntry>,
    pub rows: Vec<Vec<Value>>,
}

impl FakeTable {
    pub fn new(schema: Option<&str>, name: &str) -> Self {
        Self {
            schema: schema.map(str::to_string),
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn catalog(mut self, catalog: &str) -> Self {
        self.catalog = Some(catalog.to_string());
        self
    }

    pub fn column(mut self, name: &str, kind: SqlKind, precision: u32, scale: i32) -> Self {
        self.columns.push(CatalogColumn {
            catalog: self.catalog.clone(),
            schema: self.schema.clone(),
            name: name.to_string(),
            kind,
            precision,
            scale,
        });
        self
    }

    pub fn extra_catalog_column(mut self, column: CatalogColumn) -> Self {
        self.extra_columns.push(column);
        self
    }

    pub fn row(mut self, values: Vec<Value>) -> Self {
        self.rows.push(values);
        self
    }

    pub fn primary_key(mut self, constraint: Option<&str>, column: &str, sequence: u16) -> Self {
        self.primary_keys.push(PrimaryKeyEntry {
            constraint_name: constraint.map(str::to_string),
            column: column.to_string(),
            sequence,
        });
        self
    }

    pub fn index_entry(mut self, name: &str, column: &str, non_unique: bool) -> Self {
        self.index_info.push(IndexInfoEntry {
            index_name: Some(name.to_string()),
            column: Some(column.to_string()),
            non_unique,
            statistic: false,
        });
        self
    }

    pub fn statistics_entry(mut self) -> Self {
        self.index_info.push(IndexInfoEntry {
            index_name: None,
            column: None,
            non_unique: true,
            statistic: true,
        });
        self
    }

    fn ordinal_of(&self, column: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(column))
            .ok_or_else(|| {
                Error::Remote(format!(
                    "fake remote: column '{}' does not exist in '{}'",
                    column, self.name
                ))
            })
    }
}

#[derive(Default)]
struct FakeState {
    dialect: DialectFlags,
    tables: Vec<FakeTable>,
    /// Result shapes for query links, keyed by the parenthesized text.
    query_shapes: Vec<(String, Vec<ResultColumn>)>,
    connect_failures: usize,
    execute_failures: usize,
    connect_attempts: usize,
    executed: Vec<String>,
    prepared: Vec<String>,
}

/// The scripted remote source. Clone handles share the same state.
#[derive(Clone, Default)]
pub struct FakeRemote {
    state: Arc<Mutex<FakeState>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake remote state lock")
    }

    pub fn set_dialect(&self, dialect: DialectFlags) {
        self.state().dialect = dialect;
    }

    pub fn add_table(&self, table: FakeTable) {
        self.state().tables.push(table);
    }

    pub fn add_query_shape(&self, text: &str, columns: Vec<ResultColumn>) {
        self.state().query_shapes.push((text.to_string(), columns));
    }

    /// Fail the next `n` connect attempts.
    pub fn fail_next_connects(&self, n: usize) {
        self.state().connect_failures = n;
    }

    /// Fail the next `n` statement executions. Zero-row probes are exempt so
    /// reconnect handshakes still succeed.
    pub fn fail_next_executes(&self, n: usize) {
        self.state().execute_failures = n;
    }

    pub fn connect_attempts(&self) -> usize {
        self.state().connect_attempts
    }

    /// Successfully executed statements, in order.
    pub fn executed_sql(&self) -> Vec<String> {
        self.state().executed.clone()
    }

    /// How often `sql` was prepared (cache hits do not prepare).
    pub fn prepared_count(&self, sql: &str) -> usize {
        self.state().prepared.iter().filter(|s| *s == sql).count()
    }

    /// Current data rows of a seeded table.
    pub fn rows_of(&self, table: &str) -> Vec<Vec<Value>> {
        self.state()
            .tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(table))
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    pub fn driver(&self) -> Arc<dyn RemoteDriver> {
        Arc::new(self.clone())
    }
}

impl RemoteDriver for FakeRemote {
    fn connect(&self, _spec: &ConnectionSpec) -> Result<Box<dyn RemoteConnection>> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::Internal("fake remote state lock poisoned".into()))?;
        state.connect_attempts += 1;
        if state.connect_failures > 0 {
            state.connect_failures -= 1;
            return Err(Error::Remote("fake remote: connection refused".into()));
        }
        Ok(Box::new(FakeConnection {
            state: Arc::clone(&self.state),
            closed: false,
        }))
    }
}

struct FakeConnection {
    state: Arc<Mutex<FakeState>>,
    closed: bool,
}

impl FakeConnection {
    fn state(&self) -> Result<MutexGuard<'_, FakeState>> {
        self.state
            .lock()
            .map_err(|_| Error::Internal("fake remote state lock poisoned".into()))
    }
}

fn table_matches(table: &FakeTable, schema: Option<&str>, name: &str) -> bool {
    if !table.name.eq_ignore_ascii_case(name) {
        return false;
    }
    match schema {
        None => true,
        Some(s) => table
            .schema
            .as_deref()
            .is_some_and(|ts| ts.eq_ignore_ascii_case(s)),
    }
}

impl RemoteConnection for FakeConnection {
    fn dialect_flags(&self) -> Result<DialectFlags> {
        Ok(self.state()?.dialect)
    }

    fn catalog_tables(&self, schema: Option<&str>, table: &str) -> Result<Vec<CatalogTable>> {
        let state = self.state()?;
        Ok(state
            .tables
            .iter()
            .filter(|t| table_matches(t, schema, table))
            .map(|t| CatalogTable {
                catalog: t.catalog.clone(),
                schema: t.schema.clone(),
                name: t.name.clone(),
            })
            .collect())
    }

    fn catalog_columns(&self, schema: Option<&str>, table: &str) -> Result<Vec<CatalogColumn>> {
        let state = self.state()?;
        let mut out = Vec::new();
        for t in state.tables.iter().filter(|t| table_matches(t, schema, table)) {
            out.extend(t.columns.iter().cloned());
            out.extend(t.extra_columns.iter().cloned());
        }
        Ok(out)
    }

    fn primary_keys(&self, schema: Option<&str>, table: &str) -> Result<Vec<PrimaryKeyEntry>> {
        let state = self.state()?;
        Ok(state
            .tables
            .iter()
            .find(|t| table_matches(t, schema, table))
            .map(|t| t.primary_keys.clone())
            .unwrap_or_default())
    }

    fn index_info(&self, schema: Option<&str>, table: &str) -> Result<Vec<IndexInfoEntry>> {
        let state = self.state()?;
        Ok(state
            .tables
            .iter()
            .find(|t| table_matches(t, schema, table))
            .map(|t| t.index_info.clone())
            .unwrap_or_default())
    }

    fn prepare(&mut self, sql: &str) -> Result<Box<dyn RemoteStatement>> {
        if self.closed {
            return Err(Error::Remote("fake remote: connection is closed".into()));
        }
        self.state()?.prepared.push(sql.to_string());
        Ok(Box::new(FakeStatement {
            state: Arc::clone(&self.state),
            sql: sql.to_string(),
            binds: Vec::new(),
            cols: Vec::new(),
            rows_out: VecDeque::new(),
        }))
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

struct FakeStatement {
    state: Arc<Mutex<FakeState>>,
    sql: String,
    binds: Vec<Value>,
    cols: Vec<ResultColumn>,
    rows_out: VecDeque<Vec<Value>>,
}

/// A parsed `col = ?` / `col IS NULL` conjunct, value already resolved.
struct Cond {
    ordinal: usize,
    value: Option<Value>,
}

fn split_qualified(target: &str) -> (Option<&str>, &str) {
    match target.split_once('.') {
        Some((schema, name)) => (Some(schema), name),
        None => (None, target),
    }
}

fn find_table<'a>(state: &'a FakeState, target: &str) -> Result<&'a FakeTable> {
    let (schema, name) = split_qualified(target);
    state
        .tables
        .iter()
        .find(|t| table_matches(t, schema, name))
        .ok_or_else(|| Error::Remote(format!("fake remote: relation '{}' does not exist", target)))
}

fn find_table_mut<'a>(state: &'a mut FakeState, target: &str) -> Result<&'a mut FakeTable> {
    let (schema, name) = split_qualified(target);
    state
        .tables
        .iter_mut()
        .find(|t| table_matches(t, schema, name))
        .ok_or_else(|| Error::Remote(format!("fake remote: relation '{}' does not exist", target)))
}

fn result_columns_of(table: &FakeTable) -> Vec<ResultColumn> {
    table
        .columns
        .iter()
        .map(|c| ResultColumn {
            name: c.name.clone(),
            kind: c.kind,
            precision: c.precision,
            scale: c.scale,
        })
        .collect()
}

fn parse_conds<'a>(
    table: &FakeTable,
    clause: &str,
    binds: &mut impl Iterator<Item = &'a Value>,
) -> Result<Vec<Cond>> {
    let mut conds = Vec::new();
    for part in clause.split(" AND ") {
        if let Some(col) = part.strip_suffix(" IS NULL") {
            conds.push(Cond {
                ordinal: table.ordinal_of(col)?,
                value: None,
            });
        } else if let Some(col) = part.strip_suffix(" = ?") {
            let value = binds.next().cloned().ok_or_else(|| {
                Error::Remote("fake remote: not enough bound parameters".into())
            })?;
            conds.push(Cond {
                ordinal: table.ordinal_of(col)?,
                value: Some(value),
            });
        } else {
            return Err(Error::Remote(format!(
                "fake remote: cannot parse condition '{}'",
                part
            )));
        }
    }
    Ok(conds)
}

fn row_matches(row: &[Value], conds: &[Cond]) -> bool {
    conds.iter().all(|cond| match &cond.value {
        None => row[cond.ordinal] == Value::Null,
        Some(v) => &row[cond.ordinal] == v,
    })
}

impl FakeStatement {
    fn run(&mut self, state: &mut FakeState) -> Result<()> {
        self.cols.clear();
        self.rows_out.clear();
        let sql = self.sql.clone();

        if let Some(rest) = sql.strip_prefix("SELECT COUNT(*) FROM ") {
            let target = rest.strip_suffix(" as foo").unwrap_or(rest);
            let table = find_table(state, target)?;
            self.cols = vec![ResultColumn {
                name: "COUNT(*)".into(),
                kind: SqlKind::BigInt,
                precision: 19,
                scale: 0,
            }];
            self.rows_out
                .push_back(vec![Value::Int64(table.rows.len() as i64)]);
            return Ok(());
        }

        if let Some(rest) = sql.strip_prefix("SELECT * FROM ") {
            if let Some(target) = rest.strip_suffix(" T WHERE 1=0") {
                // Zero-row probe: shape only.
                self.cols = if target.starts_with('(') {
                    state
                        .query_shapes
                        .iter()
                        .find(|(text, _)| text == target)
                        .map(|(_, cols)| cols.clone())
                        .ok_or_else(|| {
                            Error::Remote(format!(
                                "fake remote: cannot derive shape of '{}'",
                                target
                            ))
                        })?
                } else {
                    result_columns_of(find_table(state, target)?)
                };
                return Ok(());
            }
            let table = find_table(state, rest)?;
            self.cols = result_columns_of(table);
            self.rows_out = table.rows.iter().cloned().collect();
            return Ok(());
        }

        if let Some(rest) = sql.strip_prefix("INSERT INTO ") {
            let target = rest.split(" VALUES").next().unwrap_or(rest);
            let binds = self.binds.clone();
            let table = find_table_mut(state, target)?;
            if binds.len() != table.columns.len() {
                return Err(Error::Remote(format!(
                    "fake remote: expected {} values, got {}",
                    table.columns.len(),
                    binds.len()
                )));
            }
            table.rows.push(binds);
            return Ok(());
        }

        if let Some(rest) = sql.strip_prefix("DELETE FROM ") {
            let (target, clause) = rest
                .split_once(" WHERE ")
                .ok_or_else(|| Error::Remote("fake remote: DELETE without WHERE".into()))?;
            let binds = self.binds.clone();
            let table = find_table_mut(state, target)?;
            let conds = parse_conds(table, clause, &mut binds.iter())?;
            table.rows.retain(|row| !row_matches(row, &conds));
            return Ok(());
        }

        if let Some(rest) = sql.strip_prefix("UPDATE ") {
            let (target, rest) = rest
                .split_once(" SET ")
                .ok_or_else(|| Error::Remote("fake remote: UPDATE without SET".into()))?;
            let (assigns, clause) = rest
                .split_once(" WHERE ")
                .ok_or_else(|| Error::Remote("fake remote: UPDATE without WHERE".into()))?;
            let binds = self.binds.clone();
            let mut bind_iter = binds.iter();
            let table = find_table_mut(state, target)?;
            let mut new_values = Vec::new();
            for assign in assigns.split(", ") {
                let col = assign.strip_suffix(" = ?").ok_or_else(|| {
                    Error::Remote(format!("fake remote: cannot parse assignment '{}'", assign))
                })?;
                let value = bind_iter.next().cloned().ok_or_else(|| {
                    Error::Remote("fake remote: not enough bound parameters".into())
                })?;
                new_values.push((table.ordinal_of(col)?, value));
            }
            let conds = parse_conds(table, clause, &mut bind_iter)?;
            for row in table.rows.iter_mut() {
                if row_matches(row, &conds) {
                    for (ordinal, value) in &new_values {
                        row[*ordinal] = value.clone();
                    }
                }
            }
            return Ok(());
        }

        Err(Error::Remote(format!(
            "fake remote: cannot execute '{}'",
            sql
        )))
    }
}

impl RemoteStatement for FakeStatement {
    fn set_fetch_size(&mut self, _rows: u32) {}

    fn bind(&mut self, ordinal: usize, value: &Value) -> Result<()> {
        if ordinal == 0 {
            return Err(Error::Remote("fake remote: bind ordinals are 1-based".into()));
        }
        if self.binds.len() < ordinal {
            self.binds.resize(ordinal, Value::Null);
        }
        self.binds[ordinal - 1] = value.clone();
        Ok(())
    }

    fn execute(&mut self) -> Result<()> {
        let shared = Arc::clone(&self.state);
        let mut state = shared
            .lock()
            .map_err(|_| Error::Internal("fake remote state lock poisoned".into()))?;
        if state.execute_failures > 0 && !self.sql.ends_with(" T WHERE 1=0") {
            state.execute_failures -= 1;
            return Err(Error::Remote("fake remote: connection reset".into()));
        }
        self.run(&mut state)?;
        state.executed.push(self.sql.clone());
        Ok(())
    }

    fn result_columns(&self) -> Vec<ResultColumn> {
        self.cols.clone()
    }

    fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        Ok(self.rows_out.pop_front())
    }
}
