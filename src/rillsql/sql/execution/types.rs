//! Core streaming dataflow data types.
//!
//! This module contains the shapes that flow between operators:
//! - [`FieldValue`] - the closed value enum for record fields
//! - [`StreamRecord`] - one event/row with emitter, message and timestamp
//! - [`WindowBatch`] / [`WindowBatchSet`] - the contents of one triggered window
//! - [`JoinedRecord`] / [`JoinedBatch`] - rows formed by joining streams
//! - [`RecordGroup`] / [`GroupedBatch`] - aggregation output buckets
//! - [`StreamData`] - the tagged sum over every payload shape an operator
//!   can receive, matched exhaustively at operator boundaries

use crate::rillsql::sql::error::SqlError;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A value in a record field.
///
/// The numeric tower is `i64`/`u64`/`f64`; the evaluator widens anything it
/// produces into these. `Map` and `Array` carry nested payloads reached with
/// the `->` and `[]` operators.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// SQL NULL
    Null,
    /// Boolean value
    Boolean(bool),
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit unsigned integer
    Unsigned(u64),
    /// 64-bit floating point number
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// Array of values
    Array(Vec<FieldValue>),
    /// Nested map keyed by field name
    Map(HashMap<String, FieldValue>),
}

impl FieldValue {
    /// Human-readable type name, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "NULL",
            FieldValue::Boolean(_) => "BOOLEAN",
            FieldValue::Integer(_) => "INTEGER",
            FieldValue::Unsigned(_) => "UNSIGNED",
            FieldValue::Float(_) => "FLOAT",
            FieldValue::String(_) => "STRING",
            FieldValue::Timestamp(_) => "TIMESTAMP",
            FieldValue::Array(_) => "ARRAY",
            FieldValue::Map(_) => "MAP",
        }
    }

    /// True only for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Convert a JSON value into a field value.
    ///
    /// Numbers become `Integer` when they fit an `i64`, `Unsigned` when they
    /// only fit a `u64`, and `Float` otherwise.
    pub fn from_json(value: &serde_json::Value) -> FieldValue {
        match value {
            serde_json::Value::Null => FieldValue::Null,
            serde_json::Value::Bool(b) => FieldValue::Boolean(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::Integer(i)
                } else if let Some(u) = n.as_u64() {
                    FieldValue::Unsigned(u)
                } else {
                    FieldValue::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => FieldValue::String(s.clone()),
            serde_json::Value::Array(items) => {
                FieldValue::Array(items.iter().map(FieldValue::from_json).collect())
            }
            serde_json::Value::Object(map) => FieldValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), FieldValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert a field value into a JSON value for sinks and tests.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Null => serde_json::Value::Null,
            FieldValue::Boolean(b) => serde_json::Value::Bool(*b),
            FieldValue::Integer(i) => serde_json::Value::from(*i),
            FieldValue::Unsigned(u) => serde_json::Value::from(*u),
            FieldValue::Float(f) => {
                serde_json::Number::from_f64(*f).map_or(serde_json::Value::Null, serde_json::Value::Number)
            }
            FieldValue::String(s) => serde_json::Value::String(s.clone()),
            FieldValue::Timestamp(t) => serde_json::Value::String(t.to_string()),
            FieldValue::Array(items) => {
                serde_json::Value::Array(items.iter().map(FieldValue::to_json).collect())
            }
            FieldValue::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

/// Display is used to build deterministic group keys, so every variant must
/// render the same way for equal values.
impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "NULL"),
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Unsigned(u) => write!(f, "{}", u),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Timestamp(t) => write!(f, "{}", t),
            FieldValue::Array(items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            FieldValue::Map(map) => {
                // Sort keys so equal maps produce equal key strings.
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                write!(f, "{{")?;
                for (i, k) in keys.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, map[*k])?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Boolean(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

/// One event/row flowing through the pipeline.
///
/// Immutable once constructed; operators share it through `Arc` rather than
/// copying the message.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRecord {
    /// Source/stream name that emitted this record
    pub emitter: String,
    /// Field name to value mapping
    pub message: HashMap<String, FieldValue>,
    /// Logical event time in milliseconds
    pub timestamp: i64,
}

impl StreamRecord {
    pub fn new(
        emitter: impl Into<String>,
        message: HashMap<String, FieldValue>,
        timestamp: i64,
    ) -> Self {
        StreamRecord {
            emitter: emitter.into(),
            message,
            timestamp,
        }
    }

    /// Look up a field, accepting both `field` and `stream.field` keys.
    ///
    /// A qualified key resolves against the field part only; the record does
    /// not check the qualifier since a single record has a single emitter.
    pub fn field(&self, key: &str) -> Option<FieldValue> {
        match key.split_once('.') {
            None => self.message.get(key).cloned(),
            Some((_, name)) => self.message.get(name).cloned(),
        }
    }
}

/// Ordered records from one emitter inside a triggered window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowBatch {
    /// Source/stream name shared by every record in the batch
    pub emitter: String,
    /// Records in emission order
    pub records: Vec<Arc<StreamRecord>>,
}

impl WindowBatch {
    pub fn new(emitter: impl Into<String>) -> Self {
        WindowBatch {
            emitter: emitter.into(),
            records: Vec::new(),
        }
    }
}

/// Contents of one triggered window across (possibly joined) streams: one
/// [`WindowBatch`] per contributing source, in first-seen order.
///
/// Invariant: a single-stream pipeline holds exactly one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowBatchSet {
    /// One batch per source
    pub batches: Vec<WindowBatch>,
}

impl WindowBatchSet {
    pub fn new() -> Self {
        WindowBatchSet::default()
    }

    /// Append a record to the batch for its emitter, creating the batch on
    /// first sight of that emitter.
    pub fn add_record(&mut self, record: Arc<StreamRecord>) {
        for batch in &mut self.batches {
            if batch.emitter == record.emitter {
                batch.records.push(record);
                return;
            }
        }
        let mut batch = WindowBatch::new(record.emitter.clone());
        batch.records.push(record);
        self.batches.push(batch);
    }

    /// Records for one source, if present.
    pub fn records_for(&self, emitter: &str) -> Option<&[Arc<StreamRecord>]> {
        self.batches
            .iter()
            .find(|b| b.emitter == emitter)
            .map(|b| b.records.as_slice())
    }

    /// Number of records in the first batch (the sortable view).
    pub fn len(&self) -> usize {
        self.batches.first().map_or(0, |b| b.records.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when no batch or exactly one batch is present.
    pub fn is_single_stream(&self) -> bool {
        self.batches.len() <= 1
    }

    /// Stable-sort every batch by record timestamp; applied in event-time
    /// mode where arrival order may not match event order.
    pub fn sort_by_timestamp(&mut self) {
        for batch in &mut self.batches {
            batch.records.sort_by_key(|r| r.timestamp);
        }
    }
}

/// One row formed by concatenating matched records from multiple streams.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRecord {
    /// Constituent records, one per joined stream
    pub records: Vec<Arc<StreamRecord>>,
}

impl JoinedRecord {
    pub fn new(records: Vec<Arc<StreamRecord>>) -> Self {
        JoinedRecord { records }
    }

    /// Look up a field across the constituent records.
    ///
    /// `stream.field` keys match the record with that emitter; bare keys fall
    /// back to the first constituent that carries the field.
    pub fn field(&self, key: &str) -> Option<FieldValue> {
        match key.split_once('.') {
            Some((emitter, name)) => self
                .records
                .iter()
                .find(|r| r.emitter == emitter)
                .and_then(|r| r.message.get(name).cloned()),
            None => self
                .records
                .iter()
                .find_map(|r| r.message.get(key).cloned()),
        }
    }

    /// Merge every constituent message, first-wins per key.
    pub fn merged_message(&self) -> HashMap<String, FieldValue> {
        let mut merged = HashMap::new();
        for record in &self.records {
            for (k, v) in &record.message {
                merged.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }
        merged
    }
}

/// Ordered collection of joined rows, the output of a join stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinedBatch {
    /// Joined rows in emission order
    pub rows: Vec<JoinedRecord>,
}

impl JoinedBatch {
    pub fn new(rows: Vec<JoinedRecord>) -> Self {
        JoinedBatch { rows }
    }
}

/// One row inside an aggregation context: either a plain record or a joined
/// row. This is the row shape dimension expressions and aggregate arguments
/// are evaluated against.
#[derive(Debug, Clone, PartialEq)]
pub enum DataRow {
    /// A single-stream record
    Record(Arc<StreamRecord>),
    /// A joined multi-stream row
    Joined(JoinedRecord),
}

impl DataRow {
    /// Field lookup delegating to the underlying row shape.
    pub fn field(&self, key: &str) -> Option<FieldValue> {
        match self {
            DataRow::Record(r) => r.field(key),
            DataRow::Joined(j) => j.field(key),
        }
    }
}

/// The row bucket produced by aggregation for one distinct dimension key.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordGroup {
    /// Comma-joined stringified dimension values
    pub key: String,
    /// All rows sharing the key, in arrival order
    pub rows: Vec<DataRow>,
}

impl RecordGroup {
    pub fn new(key: impl Into<String>) -> Self {
        RecordGroup {
            key: key.into(),
            rows: Vec::new(),
        }
    }
}

/// Aggregation output: one group per distinct dimension key, in first-seen
/// key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedBatch {
    /// Groups in first-seen key order
    pub groups: Vec<RecordGroup>,
}

impl GroupedBatch {
    pub fn new() -> Self {
        GroupedBatch::default()
    }

    /// Group for a key, if present.
    pub fn group(&self, key: &str) -> Option<&RecordGroup> {
        self.groups.iter().find(|g| g.key == key)
    }
}

/// The closed payload sum carried between operators.
///
/// Every operator matches this exhaustively, so an unsupported shape at a
/// given stage is an explicit match arm rather than a failed downcast.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamData {
    /// One record from a source/preprocessing stage
    Record(Arc<StreamRecord>),
    /// Joined rows from a join stage
    Joined(JoinedBatch),
    /// Contents of a triggered window
    Window(WindowBatchSet),
    /// Aggregation output
    Grouped(GroupedBatch),
    /// An error surfaced as data so collector stages can observe it
    Error(SqlError),
}

impl StreamData {
    /// Wrap a record map as `Record` data.
    pub fn record(
        emitter: impl Into<String>,
        message: HashMap<String, FieldValue>,
        timestamp: i64,
    ) -> StreamData {
        StreamData::Record(Arc::new(StreamRecord::new(emitter, message, timestamp)))
    }

    /// Shape name for log messages.
    pub fn shape_name(&self) -> &'static str {
        match self {
            StreamData::Record(_) => "record",
            StreamData::Joined(_) => "joined batch",
            StreamData::Window(_) => "window batch set",
            StreamData::Grouped(_) => "grouped batch",
            StreamData::Error(_) => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(emitter: &str, fields: &[(&str, FieldValue)], ts: i64) -> Arc<StreamRecord> {
        let message = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Arc::new(StreamRecord::new(emitter, message, ts))
    }

    #[test]
    fn test_field_value_json_round_trip() {
        let json: serde_json::Value = serde_json::json!({
            "name": "sensor-1",
            "temp": 21.5,
            "count": 3,
            "tags": ["a", "b"],
            "meta": {"zone": "east"},
            "gone": null
        });
        let value = FieldValue::from_json(&json);
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn test_field_value_display_for_group_keys() {
        assert_eq!(FieldValue::Integer(5).to_string(), "5");
        assert_eq!(FieldValue::String("x".into()).to_string(), "x");
        assert_eq!(FieldValue::Null.to_string(), "NULL");
        let mut m = HashMap::new();
        m.insert("b".to_string(), FieldValue::Integer(2));
        m.insert("a".to_string(), FieldValue::Integer(1));
        // Keys render sorted, so equal maps always produce equal strings.
        assert_eq!(FieldValue::Map(m).to_string(), "{a: 1, b: 2}");
    }

    #[test]
    fn test_record_qualified_field_lookup() {
        let r = record("demo", &[("a", FieldValue::Integer(1))], 0);
        assert_eq!(r.field("a"), Some(FieldValue::Integer(1)));
        assert_eq!(r.field("demo.a"), Some(FieldValue::Integer(1)));
        assert_eq!(r.field("missing"), None);
    }

    #[test]
    fn test_window_batch_set_groups_by_emitter() {
        let mut set = WindowBatchSet::new();
        set.add_record(record("s1", &[("a", FieldValue::Integer(1))], 100));
        set.add_record(record("s2", &[("b", FieldValue::Integer(2))], 150));
        set.add_record(record("s1", &[("a", FieldValue::Integer(3))], 200));
        assert_eq!(set.batches.len(), 2);
        assert_eq!(set.records_for("s1").unwrap().len(), 2);
        assert_eq!(set.records_for("s2").unwrap().len(), 1);
        assert!(!set.is_single_stream());
    }

    #[test]
    fn test_window_batch_set_sort_by_timestamp() {
        let mut set = WindowBatchSet::new();
        set.add_record(record("s", &[], 300));
        set.add_record(record("s", &[], 100));
        set.add_record(record("s", &[], 200));
        set.sort_by_timestamp();
        let ts: Vec<i64> = set.records_for("s").unwrap().iter().map(|r| r.timestamp).collect();
        assert_eq!(ts, vec![100, 200, 300]);
    }

    #[test]
    fn test_joined_record_lookup_rules() {
        let joined = JoinedRecord::new(vec![
            record("left", &[("id", FieldValue::Integer(1)), ("v", FieldValue::Integer(10))], 0),
            record("right", &[("id", FieldValue::Integer(1)), ("v", FieldValue::Integer(20))], 0),
        ]);
        // Qualified lookup disambiguates.
        assert_eq!(joined.field("right.v"), Some(FieldValue::Integer(20)));
        // Bare lookup falls back to the first match.
        assert_eq!(joined.field("v"), Some(FieldValue::Integer(10)));
        assert_eq!(joined.field("other.v"), None);
        // Merged message is first-wins.
        let merged = joined.merged_message();
        assert_eq!(merged.get("v"), Some(&FieldValue::Integer(10)));
    }
}
