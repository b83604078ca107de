//! Column definitions and vendor type corrections.

use std::fmt;
use std::sync::Arc;

use relink_remote::{SqlKind, Value};
use relink_result::Result;

use crate::traits::SequenceSource;

/// Minimum precision of a DATE value (`yyyy-MM-dd`).
pub const DATE_PRECISION: u32 = 10;
/// Maximum precision of a TIME value, used as the reporting floor.
pub const TIME_MAX_PRECISION: u32 = 18;
/// Maximum precision of a TIMESTAMP value, used as the reporting floor.
pub const TIMESTAMP_MAX_PRECISION: u32 = 29;
/// Precision substituted for exact numerics reported with precision 0.
pub const DECIMAL_DEFAULT_PRECISION: u32 = 65535;
/// Scale substituted for exact numerics reported with a negative scale.
pub const DECIMAL_DEFAULT_SCALE: i32 = 32767;

/// Correct a remote-reported precision.
///
/// Workaround for an Oracle problem: for DATE columns the reported precision
/// is 7, for DECIMAL columns it is 0.
pub fn correct_precision(kind: SqlKind, precision: u32) -> u32 {
    match kind {
        SqlKind::Decimal | SqlKind::Numeric => {
            if precision == 0 {
                DECIMAL_DEFAULT_PRECISION
            } else {
                precision
            }
        }
        SqlKind::Date => precision.max(DATE_PRECISION),
        SqlKind::Timestamp => precision.max(TIMESTAMP_MAX_PRECISION),
        SqlKind::Time => precision.max(TIME_MAX_PRECISION),
        _ => precision,
    }
}

/// Correct a remote-reported scale.
///
/// Workaround for an Oracle problem: for DECIMAL columns the reported scale
/// can be -127.
pub fn correct_scale(kind: SqlKind, scale: i32) -> i32 {
    match kind {
        SqlKind::Decimal | SqlKind::Numeric if scale < 0 => DECIMAL_DEFAULT_SCALE,
        _ => scale,
    }
}

/// Where an omitted insert value comes from.
#[derive(Clone)]
pub enum DefaultSource {
    Literal(Value),
    Sequence(Arc<dyn SequenceSource>),
}

impl fmt::Debug for DefaultSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultSource::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            DefaultSource::Sequence(_) => f.write_str("Sequence(..)"),
        }
    }
}

/// One column of a linked table.
///
/// Names are canonicalized before construction, ordinals are 0-based and
/// contiguous, and nothing here changes for the table's lifetime.
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    kind: SqlKind,
    precision: u32,
    scale: i32,
    ordinal: usize,
    default: Option<DefaultSource>,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: SqlKind, precision: u32, scale: i32, ordinal: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            precision,
            scale,
            ordinal,
            default: None,
        }
    }

    pub fn with_default(mut self, default: DefaultSource) -> Self {
        self.default = Some(default);
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> SqlKind {
        self.kind
    }

    #[inline]
    pub fn precision(&self) -> u32 {
        self.precision
    }

    #[inline]
    pub fn scale(&self) -> i32 {
        self.scale
    }

    #[inline]
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Resolve the value to store for this column: the provided value if
    /// present, otherwise the column default (NULL when there is none).
    pub fn resolve_stored_value(&self, value: Option<Value>) -> Result<Value> {
        match value {
            Some(v) => Ok(v),
            None => match &self.default {
                None => Ok(Value::Null),
                Some(DefaultSource::Literal(v)) => Ok(v.clone()),
                Some(DefaultSource::Sequence(seq)) => seq.next_value(),
            },
        }
    }
}
