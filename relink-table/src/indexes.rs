//! Reconstruction of local index definitions from remote catalog metadata.
//!
//! Remote drivers report primary-key and index metadata one column per row,
//! with loose ordering guarantees and a few documented quirks. The functions
//! here reconcile those rows into local index definitions; unresolvable
//! columns are handled by the truncation rule in [`register_index`].

use rustc_hash::FxHashMap;

use relink_remote::{DialectFlags, IndexInfoEntry, PrimaryKeyEntry};

use crate::dialect::{self, VendorFamily};

/// Local index kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    PrimaryKey,
    Unique,
    NonUnique,
}

impl IndexKind {
    #[inline]
    pub fn is_unique(self) -> bool {
        !matches!(self, IndexKind::NonUnique)
    }
}

/// One reconstructed index over a linked table.
///
/// Columns are held as ordinals into the table's column list; the index may
/// cover a strict prefix of what the remote index reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkIndex {
    name: Option<String>,
    kind: IndexKind,
    columns: Vec<usize>,
}

impl LinkIndex {
    pub fn new(name: Option<String>, kind: IndexKind, columns: Vec<usize>) -> Self {
        Self { name, kind, columns }
    }

    /// The synthesized scan index: every column, in ordinal order.
    pub fn scan(column_count: usize) -> Self {
        Self {
            name: None,
            kind: IndexKind::NonUnique,
            columns: (0..column_count).collect(),
        }
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    #[inline]
    pub fn columns(&self) -> &[usize] {
        &self.columns
    }
}

/// Primary-key assembly result: the constraint name (used to skip the key's
/// reappearance in index info) and the index, if one was registered.
pub(crate) struct PrimaryKey {
    pub name: Option<String>,
    pub index: Option<LinkIndex>,
}

/// Reconcile primary-key rows into a single index.
///
/// Each row carries a 1-based sequence number placing its column within the
/// key; rows are not guaranteed sorted. A sequence of 0 means "append next":
/// a workaround for a bug in the SQLite driver, deliberately not generalized
/// beyond that single case.
pub(crate) fn assemble_primary_key(
    entries: &[PrimaryKeyEntry],
    column_map: &FxHashMap<String, usize>,
    flags: DialectFlags,
    vendor: VendorFamily,
) -> PrimaryKey {
    if entries.is_empty() {
        return PrimaryKey {
            name: None,
            index: None,
        };
    }

    let mut name: Option<String> = None;
    let mut slots: Vec<Option<usize>> = Vec::new();
    for entry in entries {
        if name.is_none() {
            name = entry
                .constraint_name
                .as_ref()
                .filter(|n| !n.is_empty())
                .cloned();
        }
        let col = dialect::normalize_identifier(&entry.column, flags, vendor);
        let ordinal = column_map.get(&col).copied();
        let seq = entry.sequence as usize;
        if seq == 0 {
            slots.push(ordinal);
        } else {
            while slots.len() < seq {
                slots.push(None);
            }
            slots[seq - 1] = ordinal;
        }
    }

    PrimaryKey {
        name,
        index: register_index(None, IndexKind::PrimaryKey, slots),
    }
}

/// Reconcile index-info rows into secondary indexes.
///
/// Rows arrive ordered by index name, one per column, interleaved with
/// table-statistics rows (skipped) and possibly repeating the primary key
/// under its constraint name (skipped). A name change flushes the current
/// accumulation; uniqueness is taken from the rows' non-unique flag.
pub(crate) fn assemble_secondary_indexes(
    entries: &[IndexInfoEntry],
    pk_name: Option<&str>,
    column_map: &FxHashMap<String, usize>,
    flags: DialectFlags,
    vendor: VendorFamily,
) -> Vec<LinkIndex> {
    let mut out = Vec::new();
    let mut current: Option<String> = None;
    let mut kind = IndexKind::NonUnique;
    let mut slots: Vec<Option<usize>> = Vec::new();

    for entry in entries {
        if entry.statistic {
            continue;
        }
        let new_name = match entry.index_name.as_deref() {
            Some(n) => n,
            None => {
                tracing::debug!("skipping index metadata row without an index name");
                continue;
            }
        };
        if pk_name == Some(new_name) {
            continue;
        }
        if let Some(ref cur) = current {
            if cur != new_name {
                if let Some(index) =
                    register_index(Some(cur.clone()), kind, std::mem::take(&mut slots))
                {
                    out.push(index);
                }
                current = None;
            }
        }
        if current.is_none() {
            current = Some(new_name.to_string());
            slots.clear();
        }
        kind = if entry.non_unique {
            IndexKind::NonUnique
        } else {
            IndexKind::Unique
        };
        let ordinal = entry.column.as_deref().and_then(|c| {
            let col = dialect::normalize_identifier(c, flags, vendor);
            column_map.get(&col).copied()
        });
        slots.push(ordinal);
    }

    if let Some(cur) = current {
        if let Some(index) = register_index(Some(cur), kind, slots) {
            out.push(index);
        }
    }
    out
}

/// Bind an index to the leading recognized columns (truncation rule).
///
/// Unresolved slots can come from a function-based index term. If the first
/// slot is unresolved the index is omitted; if a later slot is, the index
/// keeps only the columns before it.
pub(crate) fn register_index(
    name: Option<String>,
    kind: IndexKind,
    slots: Vec<Option<usize>>,
) -> Option<LinkIndex> {
    let first_unresolved = slots.iter().position(|s| s.is_none());
    let columns: Vec<usize> = match first_unresolved {
        Some(0) => {
            tracing::info!("omitting linked index - no recognized columns");
            return None;
        }
        Some(k) => {
            tracing::info!(
                "unrecognized columns in linked index, using the {} leading columns",
                k
            );
            slots.into_iter().take(k).flatten().collect()
        }
        None => slots.into_iter().flatten().collect(),
    };
    if columns.is_empty() {
        return None;
    }
    Some(LinkIndex::new(name, kind, columns))
}
