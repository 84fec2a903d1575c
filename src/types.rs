//! Core data model types shared by discovery and sync.
//!
//! A sheet becomes a stream whose shape is a [`Schema`] (an ordered list of typed [`Field`]s).
//! Cells are read as typed [`Value`]s and emitted inside [`Record`]s.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Logical data type of a column.
///
/// Types form a small lattice used by schema inference (see [`DataType::join`]):
/// `Unknown` is the bottom, `Utf8` the top, `Int64` widens to `Float64` and `Date` widens to
/// `DateTime`. Any other mix widens straight to `Utf8`. `Time` only joins with itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// No non-null value has been observed yet.
    Unknown,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// Boolean.
    Bool,
    /// Calendar date without time.
    Date,
    /// Date and time without timezone.
    DateTime,
    /// Time of day.
    Time,
    /// UTF-8 string.
    Utf8,
}

impl DataType {
    /// Least upper bound of two types in the inference lattice.
    pub fn join(self, other: DataType) -> DataType {
        use DataType::*;
        match (self, other) {
            (Unknown, t) | (t, Unknown) => t,
            (a, b) if a == b => a,
            (Int64, Float64) | (Float64, Int64) => Float64,
            (Date, DateTime) | (DateTime, Date) => DateTime,
            _ => Utf8,
        }
    }

    /// Returns `true` for `Int64` and `Float64`.
    pub fn is_numeric(self) -> bool {
        matches!(self, DataType::Int64 | DataType::Float64)
    }

    /// Lower-case name used in logs and summaries.
    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Unknown => "unknown",
            DataType::Int64 => "integer",
            DataType::Float64 => "float",
            DataType::Bool => "boolean",
            DataType::Date => "date",
            DataType::DateTime => "datetime",
            DataType::Time => "time",
            DataType::Utf8 => "string",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single named, typed field in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field/column name.
    pub name: String,
    /// Field data type.
    pub data_type: DataType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered column-name-to-type mapping of a stream.
///
/// Field order matches the sheet's header row, left to right.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Returns the data type of a field by name, if present.
    pub fn data_type_of(&self, name: &str) -> Option<DataType> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.data_type)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A single typed cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// Calendar date.
    Date(NaiveDate),
    /// Date and time.
    DateTime(NaiveDateTime),
    /// Time of day.
    Time(NaiveTime),
    /// UTF-8 string.
    Utf8(String),
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y", "%Y.%m.%d"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M:%S%.f"];

/// Parses a date written in one of the unambiguous textual layouts recognised by inference.
pub(crate) fn parse_date_text(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Parses an ISO-like `YYYY-MM-DD[ T]HH:MM:SS[.fff]` timestamp.
pub(crate) fn parse_datetime_text(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// Parses an `HH:MM:SS[.fff]` time of day.
pub(crate) fn parse_time_text(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
}

/// Parses `true` / `false` (case-insensitive). Nothing else counts as a boolean.
pub(crate) fn parse_bool_text(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Best-effort conversion of this value to `data_type`.
    ///
    /// Values that cannot be represented in the target type are returned unchanged, so a column
    /// whose inferred type is narrower than some of its cells never loses data.
    pub fn coerce_to(&self, data_type: DataType) -> Value {
        let converted = match (data_type, self) {
            (_, Value::Null) | (DataType::Unknown, _) => None,
            (DataType::Int64, Value::Float64(f)) if f.fract() == 0.0 && f.is_finite() => {
                Some(Value::Int64(*f as i64))
            }
            (DataType::Int64, Value::Utf8(s)) => s.trim().parse::<i64>().ok().map(Value::Int64),
            (DataType::Float64, Value::Int64(i)) => Some(Value::Float64(*i as f64)),
            (DataType::Float64, Value::Utf8(s)) => s.trim().parse::<f64>().ok().map(Value::Float64),
            (DataType::Bool, Value::Utf8(s)) => parse_bool_text(s).map(Value::Bool),
            (DataType::Date, Value::Utf8(s)) => parse_date_text(s).map(Value::Date),
            (DataType::Date, Value::DateTime(dt)) if dt.time() == NaiveTime::MIN => {
                Some(Value::Date(dt.date()))
            }
            (DataType::DateTime, Value::Date(d)) => Some(Value::DateTime(d.and_time(NaiveTime::MIN))),
            (DataType::DateTime, Value::Utf8(s)) => parse_datetime_text(s)
                .or_else(|| parse_date_text(s).map(|d| d.and_time(NaiveTime::MIN)))
                .map(Value::DateTime),
            (DataType::Time, Value::Utf8(s)) => parse_time_text(s).map(Value::Time),
            (DataType::Utf8, Value::Utf8(_)) => None,
            (DataType::Utf8, other) => Some(Value::Utf8(other.to_string())),
            _ => None,
        };
        converted.unwrap_or_else(|| self.clone())
    }

    /// Returns `true` when this value is non-null and already of `data_type`.
    ///
    /// After [`Value::coerce_to`], a value that does not conform is one the column type could not
    /// represent.
    pub fn conforms_to(&self, data_type: DataType) -> bool {
        matches!(
            (data_type, self),
            (DataType::Int64, Value::Int64(_))
                | (DataType::Float64, Value::Float64(_))
                | (DataType::Bool, Value::Bool(_))
                | (DataType::Date, Value::Date(_))
                | (DataType::DateTime, Value::DateTime(_))
                | (DataType::Time, Value::Time(_))
                | (DataType::Utf8, Value::Utf8(_))
        )
    }

    /// Orders two non-null values.
    ///
    /// Numbers compare numerically, dates and timestamps chronologically (a date compares as its
    /// midnight), and everything else by its text rendering. Returns `None` when either side is
    /// null or the comparison is undefined (NaN).
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Int64(a), Value::Int64(b)) => Some(a.cmp(b)),
            (Value::Int64(_) | Value::Float64(_), Value::Int64(_) | Value::Float64(_)) => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            (Value::Date(_) | Value::DateTime(_), Value::Date(_) | Value::DateTime(_)) => {
                Some(self.as_datetime()?.cmp(&other.as_datetime()?))
            }
            (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
            _ => Some(self.to_string().cmp(&other.to_string())),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int64(i) => Some(*i as f64),
            Value::Float64(f) => Some(*f),
            _ => None,
        }
    }

    fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Date(d) => Some(d.and_time(NaiveTime::MIN)),
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Rounds floats to `places` decimal places; other values are returned unchanged.
    pub fn rounded(&self, places: u32) -> Value {
        match self {
            Value::Float64(f) if f.is_finite() => {
                let scale = 10f64.powi(places as i32);
                let scaled = f * scale;
                if scaled.is_finite() {
                    Value::Float64(scaled.round() / scale)
                } else {
                    Value::Float64(*f)
                }
            }
            other => other.clone(),
        }
    }

    /// JSON representation used in emitted records and persisted state.
    ///
    /// Dates render as `YYYY-MM-DD`, timestamps as ISO-8601 without offset. Non-finite floats
    /// become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Int64(i) => serde_json::Value::from(*i),
            Value::Float64(f) => serde_json::Value::from(*f),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Date(_) | Value::DateTime(_) | Value::Time(_) | Value::Utf8(_) => {
                serde_json::Value::String(self.to_string())
            }
        }
    }

    /// Reads a value back from its JSON representation.
    ///
    /// Strings stay strings; use [`Value::coerce_to`] with the column type to recover dates.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int64(i),
                None => n.as_f64().map(Value::Float64).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::Utf8(s.clone()),
            other => Value::Utf8(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int64(i) => write!(f, "{i}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.f")),
            Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
            Value::Utf8(s) => f.write_str(s),
        }
    }
}

/// One emitted row of a stream.
///
/// `values` is aligned with `columns`, which is shared by every record of the same stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Name of the stream (sheet) the record belongs to.
    pub stream_name: String,
    /// Column names in header order.
    pub columns: Arc<[String]>,
    /// Cell values, one per column.
    pub values: Vec<Value>,
    /// Position of this record in the run's output, starting at 0.
    pub emitted_at: u64,
}

impl Record {
    /// Returns the value of `column`, if the stream has such a column.
    pub fn get(&self, column: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.values.get(idx)
    }

    /// The record as a JSON object whose keys follow header order.
    pub fn to_json_object(&self) -> serde_json::Map<String, serde_json::Value> {
        self.columns
            .iter()
            .zip(self.values.iter())
            .map(|(c, v)| (c.clone(), v.to_json()))
            .collect()
    }
}
