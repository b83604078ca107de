//! Untyped scalar values exchanged with remote statements.
//!
//! Values capture statement parameters and result cells before the adapter
//! knows anything about the remote column types. Rendering helpers here
//! produce SQL-literal text for trace output only; parameter transport is
//! always through binding, never through literal splicing.

use time::{Date, Month};

/// Semantic type descriptor for a remote column.
///
/// This is deliberately coarse: the adapter only needs enough type
/// information to apply vendor precision corrections and to describe columns
/// to the local engine. Anything it does not recognize maps to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlKind {
    Boolean,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Decimal,
    Numeric,
    Char,
    Varchar,
    Binary,
    Date,
    Time,
    Timestamp,
    Other,
}

/// A scalar value bound to or read from a remote statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    /// Exact numeric carried as its decimal string form.
    Decimal(String),
    Text(String),
    Bytes(Vec<u8>),
    /// Days since the Unix epoch (1970-01-01).
    Date(i32),
    /// Nanoseconds since midnight.
    Time(i64),
    /// Microseconds since the Unix epoch.
    Timestamp(i64),
}

macro_rules! impl_from_for_value {
    ($variant:ident, $($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

impl_from_for_value!(Int32, i8, i16, i32);
impl_from_for_value!(Int64, i64);
impl_from_for_value!(Float64, f32, f64);
impl_from_for_value!(Text, String);
impl_from_for_value!(Boolean, bool);
impl_from_for_value!(Bytes, Vec<u8>);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl Value {
    /// True for the SQL NULL value.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// SQL-literal rendering used in statement trace output.
    pub fn format_sql(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Boolean(true) => "TRUE".to_string(),
            Value::Boolean(false) => "FALSE".to_string(),
            Value::Int32(i) => i.to_string(),
            Value::Int64(i) => i.to_string(),
            Value::Float64(f) => f.to_string(),
            Value::Decimal(d) => d.clone(),
            Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Bytes(b) => {
                let mut out = String::with_capacity(3 + b.len() * 2);
                out.push_str("X'");
                for byte in b {
                    out.push_str(&format!("{:02x}", byte));
                }
                out.push('\'');
                out
            }
            Value::Date(days) => format!("DATE '{}'", format_epoch_days(*days)),
            Value::Time(nanos) => format!("TIME '{}'", format_day_nanos(*nanos)),
            Value::Timestamp(micros) => {
                let days = micros.div_euclid(86_400_000_000);
                let in_day = micros.rem_euclid(86_400_000_000);
                format!(
                    "TIMESTAMP '{} {}'",
                    format_epoch_days(days as i32),
                    format_day_nanos(in_day * 1_000)
                )
            }
        }
    }
}

fn format_epoch_days(days: i32) -> String {
    let julian = match epoch_julian_day().checked_add(days) {
        Some(value) => value,
        None => return days.to_string(),
    };

    match Date::from_julian_day(julian) {
        Ok(date) => {
            let (year, month, day) = date.to_calendar_date();
            format!("{:04}-{:02}-{:02}", year, month as u8, day)
        }
        Err(_) => days.to_string(),
    }
}

fn epoch_julian_day() -> i32 {
    // Julian day number of 1970-01-01.
    Date::from_calendar_date(1970, Month::January, 1)
        .map(|d| d.to_julian_day())
        .unwrap_or(2_440_588)
}

fn format_day_nanos(nanos: i64) -> String {
    let total_secs = nanos.div_euclid(1_000_000_000);
    let sub_nanos = nanos.rem_euclid(1_000_000_000);
    let h = total_secs / 3600;
    let m = (total_secs % 3600) / 60;
    let s = total_secs % 60;
    if sub_nanos == 0 {
        format!("{:02}:{:02}:{:02}", h, m, s)
    } else {
        let frac = format!("{:09}", sub_nanos);
        format!("{:02}:{:02}:{:02}.{}", h, m, s, frac.trim_end_matches('0'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_sql_basics() {
        assert_eq!(Value::Null.format_sql(), "NULL");
        assert_eq!(Value::Boolean(true).format_sql(), "TRUE");
        assert_eq!(Value::Int64(-7).format_sql(), "-7");
        assert_eq!(Value::Decimal("12.50".into()).format_sql(), "12.50");
    }

    #[test]
    fn test_format_sql_text_escapes_quotes() {
        assert_eq!(Value::Text("O'Hare".into()).format_sql(), "'O''Hare'");
    }

    #[test]
    fn test_format_sql_bytes_hex() {
        assert_eq!(Value::Bytes(vec![0xde, 0xad]).format_sql(), "X'dead'");
    }

    #[test]
    fn test_format_sql_date() {
        assert_eq!(Value::Date(0).format_sql(), "DATE '1970-01-01'");
        assert_eq!(Value::Date(19_723).format_sql(), "DATE '2024-01-01'");
    }

    #[test]
    fn test_format_sql_time() {
        assert_eq!(
            Value::Time(3_600_000_000_000 + 500_000_000).format_sql(),
            "TIME '01:00:00.5'"
        );
    }

    #[test]
    fn test_from_impls() {
        assert_eq!(Value::from(5i32), Value::Int32(5));
        assert_eq!(Value::from(5i64), Value::Int64(5));
        assert_eq!(Value::from("x"), Value::Text("x".into()));
        assert_eq!(Value::from(false), Value::Boolean(false));
    }
}
