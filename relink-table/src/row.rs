//! Row values exchanged with the surrounding engine.

use relink_remote::Value;

/// One row as handed across the engine boundary.
///
/// Each slot is `Some(value)` for an explicit value (including SQL NULL) or
/// `None` for "use the column default". Rows produced by scans are always
/// fully materialized.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    values: Vec<Option<Value>>,
}

impl Row {
    pub fn new(values: Vec<Option<Value>>) -> Self {
        Self { values }
    }

    /// Build a fully materialized row, as scans do.
    pub fn from_values(values: Vec<Value>) -> Self {
        Self {
            values: values.into_iter().map(Some).collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn get(&self, ordinal: usize) -> Option<&Value> {
        self.values.get(ordinal).and_then(|v| v.as_ref())
    }

    #[inline]
    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }

    /// Concrete values for statement generation. Unset slots read as NULL;
    /// rows reaching delete/update paths come from prior scans and have none.
    pub fn materialized(&self) -> Vec<Value> {
        self.values
            .iter()
            .map(|v| v.clone().unwrap_or(Value::Null))
            .collect()
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Row::from_values(values)
    }
}
