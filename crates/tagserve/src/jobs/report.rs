use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const FIELD_COMPLETED: &str = "completed";
const FIELD_START_TIME: &str = "start_time";
const FIELD_END_TIME: &str = "end_time";
const FIELD_RUNTIME_MILLIS: &str = "runtime_millis";
const FIELD_DOCUMENTS: &str = "documents";
const FIELD_SKIPPED: &str = "skipped";
const FIELD_ERROR_MESSAGE: &str = "error_message";
const FIELD_PRECISION: &str = "precision";
const FIELD_RECALL: &str = "recall";

/// Record of one job execution.
///
/// The report is a flat JSON document. Timestamps are kept as typed fields and
/// everything else lives in `fields`, so keys written by other versions survive
/// a load/modify/store cycle untouched. `runtime_millis` is derived from the
/// timestamps and recomputed whenever the report is serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    fields: Map<String, Value>,
}

impl Default for JobReport {
    fn default() -> Self {
        Self::new()
    }
}

impl JobReport {
    pub fn new() -> Self {
        let mut fields = Map::new();
        fields.insert(FIELD_COMPLETED.to_string(), Value::Bool(false));
        Self {
            start_time: None,
            end_time: None,
            fields,
        }
    }

    /// Builds a report from a stored document. Unparseable timestamps are
    /// treated as absent.
    pub fn from_json(mut json: Map<String, Value>) -> Self {
        let start_time = json.remove(FIELD_START_TIME).and_then(|v| parse_time(&v));
        let end_time = json.remove(FIELD_END_TIME).and_then(|v| parse_time(&v));
        json.remove(FIELD_RUNTIME_MILLIS);

        let mut report = Self::new();
        report.fields.extend(json);
        report.start_time = start_time;
        report.end_time = end_time;
        report
    }

    /// Flat document with absent fields omitted.
    pub fn to_json(&self) -> Map<String, Value> {
        let mut json = self.fields.clone();
        if let Some(start) = self.start_time {
            json.insert(FIELD_START_TIME.to_string(), Value::String(format_time(start)));
        }
        if let Some(end) = self.end_time {
            json.insert(FIELD_END_TIME.to_string(), Value::String(format_time(end)));
        }
        if let Some(runtime) = self.runtime_millis() {
            json.insert(FIELD_RUNTIME_MILLIS.to_string(), Value::from(runtime));
        }
        json
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn is_completed(&self) -> bool {
        self.fields
            .get(FIELD_COMPLETED)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn error_message(&self) -> Option<&str> {
        self.fields.get(FIELD_ERROR_MESSAGE).and_then(Value::as_str)
    }

    /// Milliseconds between start and end, or between start and now while
    /// the job is still running. `None` if the job never started.
    pub fn runtime_millis(&self) -> Option<i64> {
        let start = self.start_time?;
        let end = self.end_time.unwrap_or_else(Utc::now);
        Some((end - start).num_milliseconds())
    }

    pub fn document_count(&self) -> Option<u64> {
        self.fields.get(FIELD_DOCUMENTS).and_then(Value::as_u64)
    }

    pub fn skipped_document_count(&self) -> Option<u64> {
        self.fields.get(FIELD_SKIPPED).and_then(Value::as_u64)
    }

    pub fn precision(&self) -> Option<f64> {
        self.fields.get(FIELD_PRECISION).and_then(Value::as_f64)
    }

    pub fn recall(&self) -> Option<f64> {
        self.fields.get(FIELD_RECALL).and_then(Value::as_f64)
    }

    /// Job-specific value, including keys this version does not know about.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn log_start(&mut self) {
        self.start_time = Some(Utc::now());
    }

    pub fn log_end(&mut self) {
        self.fields
            .insert(FIELD_COMPLETED.to_string(), Value::Bool(true));
        self.end_time = Some(Utc::now());
    }

    pub fn log_error(&mut self, message: impl Into<String>) {
        self.fields.insert(
            FIELD_ERROR_MESSAGE.to_string(),
            Value::String(message.into()),
        );
        self.end_time = Some(Utc::now());
    }

    pub fn log_document_counts(&mut self, total: usize, skipped: usize) {
        self.fields
            .insert(FIELD_DOCUMENTS.to_string(), Value::from(total));
        self.fields
            .insert(FIELD_SKIPPED.to_string(), Value::from(skipped));
    }

    pub fn log_precision_and_recall(&mut self, precision: f64, recall: f64) {
        self.set_metric(FIELD_PRECISION, precision);
        self.set_metric(FIELD_RECALL, recall);
    }

    /// Records a numeric job-specific field. Non-finite values are stored as
    /// `null` since JSON cannot represent them.
    pub fn set_metric(&mut self, key: &str, value: f64) {
        let value = serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null);
        self.fields.insert(key.to_string(), value);
    }
}

fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, false)
}

fn parse_time(value: &Value) -> Option<DateTime<Utc>> {
    let text = value.as_str()?;
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

impl Serialize for JobReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for JobReport {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Map::deserialize(deserializer).map(Self::from_json)
    }
}
