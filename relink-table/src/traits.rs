//! Seams between the linked-table adapter and the surrounding engine.
//!
//! The adapter is composed into the engine through small capability traits
//! plus a tagged [`TableVariant`] enum, not through a table base class. The
//! engine supplies the undo mechanism, cancellation checks, and sequence
//! defaults through the traits here.

use std::sync::Arc;

use relink_remote::Value;
use relink_result::Result;

use crate::link::LinkedTable;
use crate::row::Row;

/// Kind of undo record the engine must keep for local recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoOp {
    Delete,
    Insert,
}

/// Sink for undo records produced by row replacement.
///
/// An update against the remote source is always recorded locally as a
/// delete of the old row followed by an insert of the new one, so recovery
/// bookkeeping matches the generic replacement path.
pub trait UndoSink {
    fn log(&mut self, op: UndoOp, row: &Row) -> Result<()>;
}

/// Cooperative cancellation supplied by the executing statement's context.
pub trait ExecContext {
    /// Returns `Err(Error::Canceled)` once cancellation was requested.
    fn check_canceled(&self) -> Result<()>;
}

/// Context for callers without a cancelable statement.
pub struct NoCancel;

impl ExecContext for NoCancel {
    fn check_canceled(&self) -> Result<()> {
        Ok(())
    }
}

/// Generator backing a sequence-valued column default.
pub trait SequenceSource: Send + Sync {
    fn next_value(&self) -> Result<Value>;
}

// ============================================================================
// Capability traits
// ============================================================================

pub trait TableScan {
    /// Stream every row of the table to `on_row`, in remote delivery order.
    fn scan_rows(&self, on_row: &mut dyn FnMut(Row) -> Result<()>) -> Result<()>;
}

pub trait TableInsert {
    fn add_row(&self, row: &Row) -> Result<()>;
}

pub trait TableDelete {
    fn remove_row(&self, row: &Row) -> Result<()>;
}

pub trait TableUpdate {
    fn update_rows(
        &self,
        ctx: &dyn ExecContext,
        undo: &mut dyn UndoSink,
        pairs: &[(Row, Row)],
    ) -> Result<()>;
}

pub trait TableRowCount {
    /// Exact cardinality, queried from the remote source.
    fn row_count(&self) -> Result<u64>;
    /// Cheap estimate for the planner; never touches the remote source.
    fn row_count_approximation(&self) -> u64;
}

/// The engine's table enumeration. Linked tables are one variant; dispatch
/// goes through the capability traits rather than downcasting.
#[derive(Clone)]
pub enum TableVariant {
    Linked(Arc<LinkedTable>),
}

impl TableVariant {
    pub fn as_scan(&self) -> &dyn TableScan {
        match self {
            TableVariant::Linked(t) => t.as_ref(),
        }
    }

    pub fn as_insert(&self) -> &dyn TableInsert {
        match self {
            TableVariant::Linked(t) => t.as_ref(),
        }
    }

    pub fn as_delete(&self) -> &dyn TableDelete {
        match self {
            TableVariant::Linked(t) => t.as_ref(),
        }
    }

    pub fn as_update(&self) -> &dyn TableUpdate {
        match self {
            TableVariant::Linked(t) => t.as_ref(),
        }
    }

    pub fn as_row_count(&self) -> &dyn TableRowCount {
        match self {
            TableVariant::Linked(t) => t.as_ref(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            TableVariant::Linked(t) => t.name(),
        }
    }
}
