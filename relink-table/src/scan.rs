//! SQL text generation for the scan index's row operations.
//!
//! All statements are parameterized; values never appear as literals in the
//! generated text. Rows are addressed by equality over every column of the
//! old row, with `IS NULL` taking the place of `= ?` for null cells.

use relink_remote::Value;

use crate::column::Column;

/// Full-table read, in remote delivery order.
pub(crate) fn select_all_sql(qualified: &str) -> String {
    format!("SELECT * FROM {}", qualified)
}

/// Exact cardinality. The alias keeps PostgreSQL happy.
pub(crate) fn count_sql(qualified: &str) -> String {
    format!("SELECT COUNT(*) FROM {} as foo", qualified)
}

/// Positional insert over every column.
pub(crate) fn insert_sql(qualified: &str, column_count: usize) -> String {
    let mut sql = format!("INSERT INTO {} VALUES(", qualified);
    for i in 0..column_count {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push('?');
    }
    sql.push(')');
    sql
}

/// Append the whole-row equality condition for `row` and collect the
/// parameters it binds.
fn push_row_condition(
    columns: &[Column],
    row: &[Value],
    sql: &mut String,
    params: &mut Vec<Value>,
) {
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            sql.push_str(" AND ");
        }
        sql.push_str(column.name());
        match &row[i] {
            Value::Null => sql.push_str(" IS NULL"),
            value => {
                sql.push_str(" = ?");
                params.push(value.clone());
            }
        }
    }
}

/// Delete keyed by the full old row.
pub(crate) fn delete_sql(
    qualified: &str,
    columns: &[Column],
    old: &[Value],
) -> (String, Vec<Value>) {
    let mut sql = format!("DELETE FROM {} WHERE ", qualified);
    let mut params = Vec::with_capacity(old.len());
    push_row_condition(columns, old, &mut sql, &mut params);
    (sql, params)
}

/// Update of every column, keyed by the full old row. Parameters are the new
/// values followed by the non-null old values.
pub(crate) fn update_sql(
    qualified: &str,
    columns: &[Column],
    old: &[Value],
    new: &[Value],
) -> (String, Vec<Value>) {
    let mut sql = format!("UPDATE {} SET ", qualified);
    let mut params = Vec::with_capacity(new.len() + old.len());
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push_str(column.name());
        sql.push_str(" = ?");
        params.push(new[i].clone());
    }
    sql.push_str(" WHERE ");
    push_row_condition(columns, old, &mut sql, &mut params);
    (sql, params)
}
