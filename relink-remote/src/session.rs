//! Managed remote sessions and the pool that creates them.
//!
//! A [`RemoteSession`] owns exactly one remote connection plus the cache of
//! prepared statements created on it. Because the cache lives inside the
//! session, discarding a session structurally invalidates every statement it
//! ever prepared; a fresh session always starts with an empty cache.
//!
//! The [`SessionPool`] is an explicit value: it holds the driver registry and
//! builds one exclusively-owned session per acquire. There is no process-wide
//! singleton and no sharing of live sessions between tables.

use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use rustc_hash::FxHashMap;

use crate::driver::{
    ConnectionSpec, DialectFlags, RemoteConnection, RemoteDriver, RemoteStatement,
};
use relink_result::{Error, Result};

// ============================================================================
// RemoteSession
// ============================================================================

/// Lock-owned state of one session: the connection and its statement cache.
pub struct SessionInner {
    conn: Option<Box<dyn RemoteConnection>>,
    statements: FxHashMap<String, Box<dyn RemoteStatement>>,
}

impl SessionInner {
    /// Access the live connection, failing once the session is closed.
    pub fn connection(&mut self) -> Result<&mut dyn RemoteConnection> {
        match self.conn.as_deref_mut() {
            Some(conn) => Ok(conn),
            None => Err(Error::Internal("remote session is closed".into())),
        }
    }

    /// True once [`RemoteSession::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    /// Remove and return the cached statement for `sql`, if any.
    ///
    /// The cache hands the statement over entirely: while a caller holds it,
    /// it is absent from the cache, so concurrent operations can never share
    /// a statement object.
    pub fn take_statement(&mut self, sql: &str) -> Option<Box<dyn RemoteStatement>> {
        self.statements.remove(sql)
    }

    /// Re-admit a statement to the cache for later reuse.
    ///
    /// Statements offered after the session has closed are dropped; their
    /// connection is gone.
    pub fn put_statement(&mut self, sql: &str, stmt: Box<dyn RemoteStatement>) {
        if self.conn.is_some() {
            self.statements.insert(sql.to_string(), stmt);
        }
    }

    /// Number of cached statements. Fresh sessions start at zero.
    pub fn cached_statement_count(&self) -> usize {
        self.statements.len()
    }
}

/// An exclusively-owned remote session.
///
/// Dialect flags are captured once, when the session is built, and stay valid
/// for its whole lifetime. All other state is behind the session lock.
pub struct RemoteSession {
    dialect: DialectFlags,
    inner: Mutex<SessionInner>,
}

impl RemoteSession {
    fn new(conn: Box<dyn RemoteConnection>) -> Result<Self> {
        let dialect = conn.dialect_flags()?;
        Ok(Self {
            dialect,
            inner: Mutex::new(SessionInner {
                conn: Some(conn),
                statements: FxHashMap::default(),
            }),
        })
    }

    /// Identifier storage behavior captured at connect time.
    #[inline]
    pub fn dialect_flags(&self) -> DialectFlags {
        self.dialect
    }

    /// Acquire the session lock.
    pub fn lock(&self) -> Result<MutexGuard<'_, SessionInner>> {
        self.inner
            .lock()
            .map_err(|_| Error::Internal("remote session lock poisoned".into()))
    }

    /// Close the underlying connection and drop all cached statements.
    /// Idempotent; later use of the session fails cleanly.
    pub fn close(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.statements.clear();
            if let Some(mut conn) = inner.conn.take() {
                conn.close();
            }
        }
    }
}

impl Drop for RemoteSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for RemoteSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSession")
            .field("dialect", &self.dialect)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SessionPool
// ============================================================================

/// Driver registry and session factory.
#[derive(Default)]
pub struct SessionPool {
    drivers: RwLock<FxHashMap<String, Arc<dyn RemoteDriver>>>,
}

impl SessionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver under a name referenced by [`ConnectionSpec::driver`].
    pub fn register_driver(
        &self,
        name: impl Into<String>,
        driver: Arc<dyn RemoteDriver>,
    ) -> Result<()> {
        let name = name.into();
        let mut drivers = self
            .drivers
            .write()
            .map_err(|_| Error::Internal("driver registry lock poisoned".into()))?;
        if drivers.contains_key(&name) {
            return Err(Error::InvalidArgument(format!(
                "driver '{}' is already registered",
                name
            )));
        }
        drivers.insert(name, driver);
        Ok(())
    }

    /// Open one new session for `spec`.
    ///
    /// Every call opens a fresh connection with an empty statement cache.
    /// Failures are returned raw; retry policy belongs to the caller.
    pub fn acquire(&self, spec: &ConnectionSpec) -> Result<Arc<RemoteSession>> {
        let driver = {
            let drivers = self
                .drivers
                .read()
                .map_err(|_| Error::Internal("driver registry lock poisoned".into()))?;
            drivers
                .get(&spec.driver)
                .cloned()
                .ok_or_else(|| {
                    Error::InvalidArgument(format!("unknown remote driver '{}'", spec.driver))
                })?
        };
        let conn = driver.connect(spec)?;
        Ok(Arc::new(RemoteSession::new(conn)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{
        CatalogColumn, CatalogTable, IndexInfoEntry, PrimaryKeyEntry, ResultColumn,
    };
    use crate::value::Value;

    struct StubStatement;

    impl RemoteStatement for StubStatement {
        fn set_fetch_size(&mut self, _rows: u32) {}
        fn bind(&mut self, _ordinal: usize, _value: &Value) -> Result<()> {
            Ok(())
        }
        fn execute(&mut self) -> Result<()> {
            Ok(())
        }
        fn result_columns(&self) -> Vec<ResultColumn> {
            Vec::new()
        }
        fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
            Ok(None)
        }
    }

    struct StubConnection {
        closed: bool,
    }

    impl RemoteConnection for StubConnection {
        fn dialect_flags(&self) -> Result<DialectFlags> {
            Ok(DialectFlags {
                stores_lower_case: true,
                ..DialectFlags::default()
            })
        }
        fn catalog_tables(&self, _schema: Option<&str>, _table: &str) -> Result<Vec<CatalogTable>> {
            Ok(Vec::new())
        }
        fn catalog_columns(
            &self,
            _schema: Option<&str>,
            _table: &str,
        ) -> Result<Vec<CatalogColumn>> {
            Ok(Vec::new())
        }
        fn primary_keys(&self, _schema: Option<&str>, _table: &str) -> Result<Vec<PrimaryKeyEntry>> {
            Ok(Vec::new())
        }
        fn index_info(&self, _schema: Option<&str>, _table: &str) -> Result<Vec<IndexInfoEntry>> {
            Ok(Vec::new())
        }
        fn prepare(&mut self, _sql: &str) -> Result<Box<dyn RemoteStatement>> {
            Ok(Box::new(StubStatement))
        }
        fn close(&mut self) {
            self.closed = true;
        }
    }

    struct StubDriver;

    impl RemoteDriver for StubDriver {
        fn connect(&self, _spec: &ConnectionSpec) -> Result<Box<dyn RemoteConnection>> {
            Ok(Box::new(StubConnection { closed: false }))
        }
    }

    fn spec() -> ConnectionSpec {
        ConnectionSpec {
            driver: "stub".into(),
            url: "stub:mem".into(),
            user: "sa".into(),
            password: String::new(),
        }
    }

    #[test]
    fn test_acquire_captures_dialect_flags() {
        let pool = SessionPool::new();
        pool.register_driver("stub", Arc::new(StubDriver)).unwrap();
        let session = pool.acquire(&spec()).unwrap();
        assert!(session.dialect_flags().stores_lower_case);
    }

    #[test]
    fn test_unknown_driver_is_invalid_argument() {
        let pool = SessionPool::new();
        let err = pool.acquire(&spec()).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_duplicate_driver_registration_rejected() {
        let pool = SessionPool::new();
        pool.register_driver("stub", Arc::new(StubDriver)).unwrap();
        let err = pool
            .register_driver("stub", Arc::new(StubDriver))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_statement_cache_hands_over_on_take() {
        let pool = SessionPool::new();
        pool.register_driver("stub", Arc::new(StubDriver)).unwrap();
        let session = pool.acquire(&spec()).unwrap();

        let mut guard = session.lock().unwrap();
        assert!(guard.take_statement("SELECT 1").is_none());
        let stmt = guard.connection().unwrap().prepare("SELECT 1").unwrap();
        guard.put_statement("SELECT 1", stmt);
        assert_eq!(guard.cached_statement_count(), 1);

        let taken = guard.take_statement("SELECT 1");
        assert!(taken.is_some());
        assert_eq!(guard.cached_statement_count(), 0);
    }

    #[test]
    fn test_close_clears_cache_and_is_idempotent() {
        let pool = SessionPool::new();
        pool.register_driver("stub", Arc::new(StubDriver)).unwrap();
        let session = pool.acquire(&spec()).unwrap();

        {
            let mut guard = session.lock().unwrap();
            let stmt = guard.connection().unwrap().prepare("SELECT 1").unwrap();
            guard.put_statement("SELECT 1", stmt);
        }

        session.close();
        session.close();

        let mut guard = session.lock().unwrap();
        assert!(guard.is_closed());
        assert_eq!(guard.cached_statement_count(), 0);
        assert!(guard.connection().is_err());
    }
}
