//! Snapshot, record and cell value types

use std::fmt;
use std::sync::Arc;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// A single cell value
///
/// Floats are always finite, so derived equality is a true structural
/// equality (no `NaN != NaN` surprises when diffing snapshots).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Empty cell
    Null,
    /// `true` / `false`
    Bool(bool),
    /// Integral number
    Integer(i64),
    /// Finite floating point number
    Float(f64),
    /// Anything else
    Text(String),
}

impl Value {
    /// Infer a typed value from a raw CSV cell
    ///
    /// Order: empty → `Null`, boolean literal → `Bool`, `i64` → `Integer`,
    /// finite `f64` → `Float`, otherwise `Text`.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Value::Null;
        }

        if trimmed.eq_ignore_ascii_case("true") {
            return Value::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Value::Bool(false);
        }

        if let Ok(n) = trimmed.parse::<i64>() {
            return Value::Integer(n);
        }

        match trimmed.parse::<f64>() {
            Ok(f) if f.is_finite() => Value::Float(f),
            _ => Value::Text(raw.to_string()),
        }
    }

    /// Check if this is a null cell
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

/// One row of a snapshot
///
/// Values are positional; column names live on the owning [`Snapshot`] and
/// are shared between all records.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Record {
    pub(crate) fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Get a value by column name
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|idx| self.values.get(idx))
    }

    /// Values in column order
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Iterate `(column, value)` pairs in column order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.fields() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// One complete captured dataset from a single poll cycle
///
/// Immutable once built. The store swaps whole `Arc<Snapshot>`s; nothing
/// ever edits one in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    columns: Arc<[String]>,
    records: Vec<Record>,
}

impl Snapshot {
    /// Create an empty snapshot with the given header
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            records: Vec::new(),
        }
    }

    /// Append a row, builder style
    ///
    /// Use [`Value::Null`] for missing cells.
    ///
    /// # Panics
    ///
    /// Panics if the row does not have exactly one value per column.
    pub fn with_row<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        assert_eq!(
            values.len(),
            self.columns.len(),
            "row has {} values for {} columns",
            values.len(),
            self.columns.len()
        );
        self.push_row(values);
        self
    }

    /// Append a row already checked against the header
    pub(crate) fn push_row(&mut self, values: Vec<Value>) {
        debug_assert_eq!(values.len(), self.columns.len());
        self.records
            .push(Record::new(Arc::clone(&self.columns), values));
    }

    /// Column names in header order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Records in source order
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the snapshot has no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serialize records as a JSON array of objects, columns in header order
    pub fn to_records_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.records)
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records x {} columns",
            self.records.len(),
            self.columns.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_inference() {
        assert_eq!(Value::infer(""), Value::Null);
        assert_eq!(Value::infer("   "), Value::Null);
        assert_eq!(Value::infer("TRUE"), Value::Bool(true));
        assert_eq!(Value::infer("false"), Value::Bool(false));
        assert_eq!(Value::infer("42"), Value::Integer(42));
        assert_eq!(Value::infer("0130"), Value::Integer(130));
        assert_eq!(Value::infer("-7"), Value::Integer(-7));
        assert_eq!(Value::infer("34.5612"), Value::Float(34.5612));
        assert_eq!(Value::infer("2024-01-15"), Value::Text("2024-01-15".into()));
        assert_eq!(Value::infer("n"), Value::Text("n".into()));
    }

    #[test]
    fn test_non_finite_stays_text() {
        assert_eq!(Value::infer("NaN"), Value::Text("NaN".into()));
        assert_eq!(Value::infer("inf"), Value::Text("inf".into()));
    }

    #[test]
    fn test_record_lookup() {
        let snap = Snapshot::new(["id", "val"]).with_row([1i64, 10]);
        let record = &snap.records()[0];

        assert_eq!(record.get("id"), Some(&Value::Integer(1)));
        assert_eq!(record.get("val"), Some(&Value::Integer(10)));
        assert_eq!(record.get("missing"), None);
    }

    #[test]
    #[should_panic(expected = "row has 1 values for 3 columns")]
    fn test_short_row_is_rejected() {
        let _ = Snapshot::new(["a", "b", "c"]).with_row([1i64]);
    }

    #[test]
    #[should_panic(expected = "row has 3 values for 2 columns")]
    fn test_long_row_is_rejected() {
        let _ = Snapshot::new(["a", "b"]).with_row([1i64, 2, 3]);
    }

    #[test]
    fn test_explicit_nulls_fill_a_row() {
        let snap = Snapshot::new(["a", "b", "c"]).with_row([
            Value::Integer(1),
            Value::Null,
            Value::Null,
        ]);

        assert_eq!(
            snap.records()[0].values(),
            &[Value::Integer(1), Value::Null, Value::Null]
        );
    }

    #[test]
    fn test_structural_equality() {
        let a = Snapshot::new(["id", "val"]).with_row([1i64, 10]);
        let b = Snapshot::new(["id", "val"]).with_row([1i64, 10]);
        let c = Snapshot::new(["id", "val"]).with_row([1i64, 11]);
        let d = a.clone().with_row([2i64, 5]);
        let renamed = Snapshot::new(["id", "value"]).with_row([1i64, 10]);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_ne!(a, renamed);
    }

    #[test]
    fn test_records_json_keeps_column_order() {
        let snap = Snapshot::new(["zeta", "alpha", "note"])
            .with_row([Value::Integer(1), Value::Float(2.5), Value::Null])
            .with_row([Value::Integer(2), Value::Bool(true), Value::from("x")]);

        let json = snap.to_records_json().unwrap();

        assert_eq!(
            json,
            r#"[{"zeta":1,"alpha":2.5,"note":null},{"zeta":2,"alpha":true,"note":"x"}]"#
        );
    }

    #[test]
    fn test_display() {
        let snap = Snapshot::new(["a", "b"]).with_row([1i64, 2]);
        assert_eq!(snap.to_string(), "1 records x 2 columns");
    }
}
