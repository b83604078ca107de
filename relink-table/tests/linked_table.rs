//! End-to-end tests of linked-table construction and row operations against
//! the scripted fake remote driver.

use std::sync::Arc;

use relink_remote::{DialectFlags, CatalogColumn, ResultColumn, SessionPool, SqlKind, Value};
use relink_result::{Error, Result};
use relink_table::{
    ExecContext, IndexKind, LinkedTable, LinkedTableConfig, NoCancel, Row, UndoOp, UndoSink,
};
use relink_test_utils::fake::{FakeRemote, FakeTable};

fn pool_for(remote: &FakeRemote) -> Arc<SessionPool> {
    let pool = Arc::new(SessionPool::new());
    pool.register_driver("fake", remote.driver()).unwrap();
    pool
}

fn config(original: &str) -> LinkedTableConfig {
    LinkedTableConfig::new("PUBLIC", 1, "LINKED", "fake", "fake:mem", "sa", "", original)
}

fn users_table() -> FakeTable {
    FakeTable::new(Some("public"), "users")
        .column("id", SqlKind::Integer, 10, 0)
        .column("name", SqlKind::Varchar, 64, 0)
        .row(vec![Value::Int32(1), Value::Text("ann".into())])
        .row(vec![Value::Int32(2), Value::Text("bob".into())])
}

struct RecordingUndo {
    entries: Vec<(UndoOp, Row)>,
}

impl RecordingUndo {
    fn new() -> Self {
        Self { entries: Vec::new() }
    }
}

impl UndoSink for RecordingUndo {
    fn log(&mut self, op: UndoOp, row: &Row) -> Result<()> {
        self.entries.push((op, row.clone()));
        Ok(())
    }
}

#[test]
fn test_construction_discovers_columns_and_scan_index() {
    let remote = FakeRemote::new();
    remote.add_table(users_table());
    let table = LinkedTable::open(pool_for(&remote), config("users")).unwrap();

    assert_eq!(table.qualified_table(), "public.users");
    let columns = table.columns();
    assert_eq!(columns.len(), 2);
    assert_eq!(columns[0].name(), "id");
    assert_eq!(columns[0].ordinal(), 0);
    assert_eq!(columns[1].name(), "name");
    assert_eq!(columns[1].ordinal(), 1);

    let scan = table.scan_index();
    assert_eq!(scan.kind(), IndexKind::NonUnique);
    assert_eq!(scan.columns(), &[0, 1]);
}

#[test]
fn test_scan_streams_rows_in_remote_order() {
    let remote = FakeRemote::new();
    remote.add_table(users_table());
    let table = LinkedTable::open(pool_for(&remote), config("users")).unwrap();

    let mut rows = Vec::new();
    table
        .scan_rows(&mut |row| {
            rows.push(row);
            Ok(())
        })
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get(0), Some(&Value::Int32(1)));
    assert_eq!(rows[1].get(1), Some(&Value::Text("bob".into())));
}

#[test]
fn test_cross_schema_collision_falls_back_to_probe_shape() {
    let remote = FakeRemote::new();
    remote.add_table(users_table().extra_catalog_column(CatalogColumn {
        catalog: None,
        schema: Some("audit".into()),
        name: "ghost".into(),
        kind: SqlKind::Integer,
        precision: 10,
        scale: 0,
    }));
    let table = LinkedTable::open(pool_for(&remote), config("users")).unwrap();

    // Catalog discovery was discarded; the probe shape has two columns and
    // no ghost.
    let names: Vec<&str> = table.columns().iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["id", "name"]);
}

#[test]
fn test_query_link_derives_columns_from_probe() {
    let remote = FakeRemote::new();
    remote.add_table(users_table());
    remote.add_query_shape(
        "(SELECT id FROM users)",
        vec![ResultColumn {
            name: "id".into(),
            kind: SqlKind::Integer,
            precision: 10,
            scale: 0,
        }],
    );
    let table = LinkedTable::open(pool_for(&remote), config("(SELECT id FROM users)")).unwrap();

    assert_eq!(table.qualified_table(), "(SELECT id FROM users)");
    assert_eq!(table.columns().len(), 1);
    // Query links never get catalog indexes, only the scan index.
    assert_eq!(table.indexes().len(), 1);
}

#[test]
fn test_ambiguous_remote_name_is_rejected() {
    let remote = FakeRemote::new();
    remote.add_table(users_table());
    remote.add_table(FakeTable::new(Some("audit"), "users").column(
        "id",
        SqlKind::Integer,
        10,
        0,
    ));
    let err = LinkedTable::open(pool_for(&remote), config("users")).unwrap_err();
    assert!(matches!(err, Error::AmbiguousRemoteObject { name } if name == "users"));
    // Not a connection problem; no retries were spent on it.
    assert_eq!(remote.connect_attempts(), 1);
}

#[test]
fn test_schema_qualification_disambiguates() {
    let remote = FakeRemote::new();
    remote.add_table(users_table());
    remote.add_table(
        FakeTable::new(Some("audit"), "users").column("id", SqlKind::Integer, 10, 0),
    );
    let mut cfg = config("users");
    cfg.original_schema = Some("audit".into());
    let table = LinkedTable::open(pool_for(&remote), cfg).unwrap();
    assert_eq!(table.qualified_table(), "audit.users");
    assert_eq!(table.columns().len(), 1);
}

#[test]
fn test_missing_object_reports_not_found() {
    let remote = FakeRemote::new();
    let err = LinkedTable::open(pool_for(&remote), config("missing")).unwrap_err();
    assert!(matches!(err, Error::ObjectNotFound { name, .. } if name == "missing"));
}

#[test]
fn test_mysql_url_uppercases_identifiers() {
    let remote = FakeRemote::new();
    remote.add_table(
        FakeTable::new(Some("public"), "users")
            .column("Foo", SqlKind::Integer, 10, 0)
            .primary_key(Some("PRIMARY"), "Foo", 1),
    );
    let mut cfg = config("users");
    cfg.url = "mysql:remote".into();
    let table = LinkedTable::open(pool_for(&remote), cfg).unwrap();

    assert_eq!(table.columns()[0].name(), "FOO");
    // The primary key resolves through the same normalization.
    let pk = table.unique_index().unwrap();
    assert_eq!(pk.kind(), IndexKind::PrimaryKey);
    assert_eq!(pk.columns(), &[0]);
}

#[test]
fn test_index_reconstruction_with_statistics_and_pk_repeat() {
    let remote = FakeRemote::new();
    remote.add_table(
        users_table()
            .primary_key(Some("pk_users"), "id", 1)
            .statistics_entry()
            .index_entry("pk_users", "id", false)
            .index_entry("ix_name", "name", true),
    );
    let table = LinkedTable::open(pool_for(&remote), config("users")).unwrap();

    // Scan index, primary key, one secondary index.
    let indexes = table.indexes();
    assert_eq!(indexes.len(), 3);
    assert_eq!(indexes[1].kind(), IndexKind::PrimaryKey);
    assert_eq!(indexes[1].columns(), &[0]);
    assert_eq!(indexes[2].name(), Some("ix_name"));
    assert_eq!(indexes[2].kind(), IndexKind::NonUnique);
    assert_eq!(indexes[2].columns(), &[1]);
}

#[test]
fn test_dialect_flags_fold_lower_case_names() {
    let remote = FakeRemote::new();
    remote.set_dialect(DialectFlags {
        stores_lower_case: true,
        ..DialectFlags::default()
    });
    remote.add_table(users_table());
    let table = LinkedTable::open(pool_for(&remote), config("users")).unwrap();
    let names: Vec<&str> = table.columns().iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["ID", "NAME"]);
}

#[test]
fn test_read_only_rejects_writes_without_remote_calls() {
    let remote = FakeRemote::new();
    remote.add_table(users_table());
    let mut cfg = config("users");
    cfg.read_only = true;
    let table = LinkedTable::open(pool_for(&remote), cfg).unwrap();

    let executed_before = remote.executed_sql().len();
    let row = Row::from_values(vec![Value::Int32(3), Value::Text("eve".into())]);

    assert!(matches!(table.add_row(&row), Err(Error::ReadOnly(_))));
    assert!(matches!(table.remove_row(&row), Err(Error::ReadOnly(_))));
    let mut undo = RecordingUndo::new();
    let pairs = vec![(row.clone(), row.clone())];
    assert!(matches!(
        table.update_rows(&NoCancel, &mut undo, &pairs),
        Err(Error::ReadOnly(_))
    ));
    assert_eq!(remote.executed_sql().len(), executed_before);
    assert!(undo.entries.is_empty());
}

#[test]
fn test_row_count_exact() {
    for n in [0usize, 1, 100] {
        let remote = FakeRemote::new();
        let mut t = FakeTable::new(Some("public"), "users").column("id", SqlKind::Integer, 10, 0);
        for i in 0..n {
            t = t.row(vec![Value::Int32(i as i32)]);
        }
        remote.add_table(t);
        let table = LinkedTable::open(pool_for(&remote), config("users")).unwrap();
        assert_eq!(table.row_count().unwrap(), n as u64);
    }
}

#[test]
fn test_row_count_approximation_is_static() {
    let remote = FakeRemote::new();
    remote.add_table(users_table());
    let table = LinkedTable::open(pool_for(&remote), config("users")).unwrap();
    let before = remote.executed_sql().len();
    assert_eq!(table.row_count_approximation(), relink_table::ROW_COUNT_APPROXIMATION);
    assert_eq!(remote.executed_sql().len(), before);
}

#[test]
fn test_insert_and_delete_round_trip() {
    let remote = FakeRemote::new();
    remote.add_table(users_table());
    let table = LinkedTable::open(pool_for(&remote), config("users")).unwrap();

    table
        .add_row(&Row::from_values(vec![
            Value::Int32(3),
            Value::Text("eve".into()),
        ]))
        .unwrap();
    assert_eq!(remote.rows_of("users").len(), 3);

    table
        .remove_row(&Row::from_values(vec![
            Value::Int32(1),
            Value::Text("ann".into()),
        ]))
        .unwrap();
    let rows = remote.rows_of("users");
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r[0] != Value::Int32(1)));
}

#[test]
fn test_delete_keys_null_cells_with_is_null() {
    let remote = FakeRemote::new();
    remote.add_table(
        FakeTable::new(Some("public"), "users")
            .column("id", SqlKind::Integer, 10, 0)
            .column("name", SqlKind::Varchar, 64, 0)
            .row(vec![Value::Int32(1), Value::Null])
            .row(vec![Value::Int32(1), Value::Text("ann".into())]),
    );
    let table = LinkedTable::open(pool_for(&remote), config("users")).unwrap();

    table
        .remove_row(&Row::from_values(vec![Value::Int32(1), Value::Null]))
        .unwrap();
    let rows = remote.rows_of("users");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][1], Value::Text("ann".into()));

    let deletes: Vec<String> = remote
        .executed_sql()
        .into_iter()
        .filter(|s| s.starts_with("DELETE"))
        .collect();
    assert_eq!(
        deletes,
        vec!["DELETE FROM public.users WHERE id = ? AND name IS NULL".to_string()]
    );
}

#[test]
fn test_emit_updates_sends_updates_and_logs_delete_insert() {
    let remote = FakeRemote::new();
    remote.add_table(users_table());
    let mut cfg = config("users");
    cfg.emit_updates = true;
    let table = LinkedTable::open(pool_for(&remote), cfg).unwrap();

    let pairs: Vec<(Row, Row)> = vec![
        (
            Row::from_values(vec![Value::Int32(1), Value::Text("ann".into())]),
            Row::from_values(vec![Value::Int32(1), Value::Text("anne".into())]),
        ),
        (
            Row::from_values(vec![Value::Int32(2), Value::Text("bob".into())]),
            Row::from_values(vec![Value::Int32(2), Value::Text("rob".into())]),
        ),
    ];
    let mut undo = RecordingUndo::new();
    table.update_rows(&NoCancel, &mut undo, &pairs).unwrap();

    let updates: Vec<String> = remote
        .executed_sql()
        .into_iter()
        .filter(|s| s.starts_with("UPDATE"))
        .collect();
    assert_eq!(updates.len(), 2);
    assert!(remote
        .executed_sql()
        .iter()
        .all(|s| !s.starts_with("DELETE") && !s.starts_with("INSERT")));

    // Per pair: delete of old, then insert of new.
    assert_eq!(undo.entries.len(), 4);
    assert_eq!(undo.entries[0].0, UndoOp::Delete);
    assert_eq!(undo.entries[0].1, pairs[0].0);
    assert_eq!(undo.entries[1].0, UndoOp::Insert);
    assert_eq!(undo.entries[1].1, pairs[0].1);
    assert_eq!(undo.entries[2].0, UndoOp::Delete);
    assert_eq!(undo.entries[3].0, UndoOp::Insert);

    let rows = remote.rows_of("users");
    assert!(rows.contains(&vec![Value::Int32(1), Value::Text("anne".into())]));
    assert!(rows.contains(&vec![Value::Int32(2), Value::Text("rob".into())]));
}

#[test]
fn test_generic_update_path_deletes_then_inserts() {
    let remote = FakeRemote::new();
    remote.add_table(users_table());
    let table = LinkedTable::open(pool_for(&remote), config("users")).unwrap();

    let pairs = vec![(
        Row::from_values(vec![Value::Int32(1), Value::Text("ann".into())]),
        Row::from_values(vec![Value::Int32(1), Value::Text("anne".into())]),
    )];
    let mut undo = RecordingUndo::new();
    table.update_rows(&NoCancel, &mut undo, &pairs).unwrap();

    let statements: Vec<String> = remote
        .executed_sql()
        .into_iter()
        .filter(|s| s.starts_with("DELETE") || s.starts_with("INSERT"))
        .collect();
    assert_eq!(statements.len(), 2);
    assert!(statements[0].starts_with("DELETE"));
    assert!(statements[1].starts_with("INSERT"));
    assert_eq!(undo.entries.len(), 2);
    assert_eq!(
        (undo.entries[0].0, undo.entries[1].0),
        (UndoOp::Delete, UndoOp::Insert)
    );
}

#[test]
fn test_update_rows_checks_cancellation_between_pairs() {
    struct CancelBudget(std::cell::Cell<usize>);
    impl ExecContext for CancelBudget {
        fn check_canceled(&self) -> Result<()> {
            let left = self.0.get();
            if left == 0 {
                return Err(Error::Canceled);
            }
            self.0.set(left - 1);
            Ok(())
        }
    }

    let remote = FakeRemote::new();
    remote.add_table(users_table());
    let mut cfg = config("users");
    cfg.emit_updates = true;
    let table = LinkedTable::open(pool_for(&remote), cfg).unwrap();

    let pairs: Vec<(Row, Row)> = vec![
        (
            Row::from_values(vec![Value::Int32(1), Value::Text("ann".into())]),
            Row::from_values(vec![Value::Int32(1), Value::Text("anne".into())]),
        ),
        (
            Row::from_values(vec![Value::Int32(2), Value::Text("bob".into())]),
            Row::from_values(vec![Value::Int32(2), Value::Text("rob".into())]),
        ),
    ];
    let mut undo = RecordingUndo::new();
    let ctx = CancelBudget(std::cell::Cell::new(1));
    let err = table.update_rows(&ctx, &mut undo, &pairs).unwrap_err();
    assert_eq!(err, Error::Canceled);

    // First pair went through, second was canceled before any remote call.
    let updates = remote
        .executed_sql()
        .iter()
        .filter(|s| s.starts_with("UPDATE"))
        .count();
    assert_eq!(updates, 1);
    assert_eq!(undo.entries.len(), 2);
}

#[test]
fn test_structural_operations_are_unsupported() {
    let remote = FakeRemote::new();
    remote.add_table(users_table());
    let table = LinkedTable::open(pool_for(&remote), config("users")).unwrap();

    assert!(matches!(table.truncate(), Err(Error::Unsupported(_))));
    assert!(matches!(table.check_support_alter(), Err(Error::Unsupported(_))));
    assert!(matches!(table.add_local_index(), Err(Error::Unsupported(_))));
}

#[test]
fn test_create_and_drop_sql() {
    let remote = FakeRemote::new();
    remote.add_table(users_table());
    let mut cfg = config("users");
    cfg.emit_updates = true;
    let table = LinkedTable::open(pool_for(&remote), cfg).unwrap();
    table.set_fetch_size(25);

    let create = table.create_sql().unwrap();
    assert_eq!(
        create,
        "CREATE FORCE LINKED TABLE \"PUBLIC\".\"LINKED\"\
         ('fake', 'fake:mem', 'sa', '', 'users') EMIT UPDATES FETCH_SIZE 25"
    );
    assert_eq!(table.drop_sql(), "DROP TABLE IF EXISTS \"PUBLIC\".\"LINKED\"");
}

#[test]
fn test_shutdown_invalidates_the_table() {
    let remote = FakeRemote::new();
    remote.add_table(users_table());
    let table = LinkedTable::open(pool_for(&remote), config("users")).unwrap();

    table.shutdown();
    table.shutdown();
    assert!(matches!(table.row_count(), Err(Error::Internal(_))));
    assert!(table.create_sql().is_err());
}
