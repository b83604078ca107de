//! Schema introspection: run once per connect attempt as the handshake.
//!
//! Discovers columns from the remote catalog (or, as fallback, from the
//! shape of a zero-row probe query), synthesizes the qualified remote name
//! and the scan index, and reconstructs primary-key and secondary indexes
//! for named-table links.

use rustc_hash::FxHashMap;

use relink_remote::{CatalogColumn, RemoteSession, ResultColumn};
use relink_result::{Error, Result};

use crate::column::{self, Column};
use crate::dialect::{self, VendorFamily};
use crate::indexes::{self, LinkIndex};

/// Everything introspection learns about the linked object.
pub(crate) struct DiscoveredSchema {
    pub columns: Vec<Column>,
    /// Remote name the adapter uses in every generated statement.
    pub qualified_name: String,
    /// Index 0 is always the synthesized scan index.
    pub indexes: Vec<LinkIndex>,
}

/// What the link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkTarget {
    NamedTable,
    /// A parenthesized sub-query; no catalog metadata exists for it.
    Query,
}

pub(crate) fn link_target(original_table: &str) -> LinkTarget {
    if original_table.starts_with('(') {
        LinkTarget::Query
    } else {
        LinkTarget::NamedTable
    }
}

/// Read the remote metadata for one link.
///
/// Catalog lookups may legitimately return nothing (query links, drivers
/// with unusable column metadata); the zero-row probe then serves double
/// duty as both accessibility check and column-shape source.
pub(crate) fn read_meta_data(
    session: &RemoteSession,
    original_schema: Option<&str>,
    original_table: &str,
    vendor: VendorFamily,
) -> Result<DiscoveredSchema> {
    let flags = session.dialect_flags();
    let target = link_target(original_table);

    let mut columns: Vec<Column> = Vec::new();
    let mut schema_hint: Option<String> = None;

    let mut guard = session.lock()?;

    if target == LinkTarget::NamedTable {
        let tables = guard
            .connection()?
            .catalog_tables(original_schema, original_table)?;
        if tables.len() >= 2 {
            return Err(Error::AmbiguousRemoteObject {
                name: original_table.to_string(),
            });
        }

        let raw = guard
            .connection()?
            .catalog_columns(original_schema, original_table)?;
        let mut catalog_hint: Option<String> = None;
        for (i, raw_col) in raw.iter().enumerate() {
            if catalog_hint.is_none() {
                catalog_hint = raw_col.catalog.clone();
            }
            if schema_hint.is_none() {
                schema_hint = raw_col.schema.clone();
            }
            if catalog_hint != raw_col.catalog || schema_hint != raw_col.schema {
                // The table exists in multiple schemas or catalogs; fall
                // back to deriving columns from the probe result.
                columns.clear();
                break;
            }
            columns.push(build_column(raw_col, i, flags, vendor));
        }
    }

    let qualified_name = match &schema_hint {
        Some(schema) if !schema.is_empty() && !original_table.contains('.') => {
            format!("{}.{}", schema, original_table)
        }
        _ => original_table.to_string(),
    };

    // Check that the table is accessible.
    let probe_sql = format!("SELECT * FROM {} T WHERE 1=0", qualified_name);
    let probe_shape = run_probe(&mut guard, &probe_sql).map_err(|e| Error::ObjectNotFound {
        name: original_table.to_string(),
        message: e.to_string(),
    })?;

    if columns.is_empty() {
        for (i, rc) in probe_shape.iter().enumerate() {
            columns.push(build_probe_column(rc, i, flags, vendor));
        }
    }

    let mut index_list = vec![LinkIndex::scan(columns.len())];
    if target == LinkTarget::NamedTable {
        let column_map: FxHashMap<String, usize> = columns
            .iter()
            .map(|c| (c.name().to_string(), c.ordinal()))
            .collect();
        read_indexes(
            &mut guard,
            original_schema,
            original_table,
            flags,
            vendor,
            &column_map,
            &mut index_list,
        );
    }

    Ok(DiscoveredSchema {
        columns,
        qualified_name,
        indexes: index_list,
    })
}

fn build_column(
    raw: &CatalogColumn,
    ordinal: usize,
    flags: relink_remote::DialectFlags,
    vendor: VendorFamily,
) -> Column {
    make_column(&raw.name, raw.kind, raw.precision, raw.scale, ordinal, flags, vendor)
}

fn build_probe_column(
    raw: &ResultColumn,
    ordinal: usize,
    flags: relink_remote::DialectFlags,
    vendor: VendorFamily,
) -> Column {
    make_column(&raw.name, raw.kind, raw.precision, raw.scale, ordinal, flags, vendor)
}

fn make_column(
    name: &str,
    kind: relink_remote::SqlKind,
    precision: u32,
    scale: i32,
    ordinal: usize,
    flags: relink_remote::DialectFlags,
    vendor: VendorFamily,
) -> Column {
    let name = dialect::normalize_identifier(name, flags, vendor);
    Column::new(
        name,
        kind,
        column::correct_precision(kind, precision),
        column::correct_scale(kind, scale),
        ordinal,
    )
}

fn run_probe(
    guard: &mut relink_remote::SessionInner,
    probe_sql: &str,
) -> Result<Vec<ResultColumn>> {
    let mut stmt = guard.connection()?.prepare(probe_sql)?;
    stmt.execute()?;
    Ok(stmt.result_columns())
}

/// Read primary-key and secondary-index metadata.
///
/// Both reads are tolerant of driver failures: some ODBC bridge drivers do
/// not support primary-key metadata, and Oracle raises when asked for index
/// info on a synonym. A failed read just leaves that index class out.
fn read_indexes(
    guard: &mut relink_remote::SessionInner,
    original_schema: Option<&str>,
    original_table: &str,
    flags: relink_remote::DialectFlags,
    vendor: VendorFamily,
    column_map: &FxHashMap<String, usize>,
    out: &mut Vec<LinkIndex>,
) {
    let mut pk_name: Option<String> = None;
    match guard
        .connection()
        .and_then(|c| c.primary_keys(original_schema, original_table))
    {
        Ok(entries) => {
            let pk = indexes::assemble_primary_key(&entries, column_map, flags, vendor);
            pk_name = pk.name;
            if let Some(index) = pk.index {
                out.push(index);
            }
        }
        Err(e) => {
            tracing::debug!(error = %e, "primary key metadata unavailable, continuing without it");
        }
    }

    match guard
        .connection()
        .and_then(|c| c.index_info(original_schema, original_table))
    {
        Ok(entries) => {
            out.extend(indexes::assemble_secondary_indexes(
                &entries,
                pk_name.as_deref(),
                column_map,
                flags,
                vendor,
            ));
        }
        Err(e) => {
            tracing::debug!(error = %e, "index metadata unavailable, continuing without it");
        }
    }
}
