//! Logbook operations and the lifecycle traceability query.

use super::object::MetadataType;
use crate::status::StatusCode;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const LOGBOOK_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Parse a logbook timestamp (`2019-01-31T10:02:03.123`, or RFC 3339).
pub fn parse_logbook_date(value: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| DateTime::parse_from_rfc3339(value).map(|d| d.naive_utc()))
}

pub fn format_logbook_date(value: NaiveDateTime) -> String {
    value.format(LOGBOOK_DATE_FORMAT).to_string()
}

/// One event appended to a logbook operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogbookEvent {
    #[serde(rename = "evId")]
    pub event_id: String,
    #[serde(rename = "evType")]
    pub event_type: String,
    #[serde(rename = "evDateTime")]
    pub event_date_time: DateTime<Utc>,
    pub outcome: StatusCode,
    #[serde(rename = "outDetail")]
    pub outcome_detail: String,
    #[serde(rename = "evDetData", default, skip_serializing_if = "Option::is_none")]
    pub event_detail_data: Option<Value>,
}

impl LogbookEvent {
    pub fn new(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        at: DateTime<Utc>,
        outcome: StatusCode,
    ) -> Self {
        let event_type = event_type.into();
        Self {
            outcome_detail: format!("{event_type}.{outcome}"),
            event_id: event_id.into(),
            event_type,
            event_date_time: at,
            outcome,
            event_detail_data: None,
        }
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.event_detail_data = Some(detail);
        self
    }
}

/// A logbook operation with its appended events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogbookOperation {
    #[serde(rename = "evId")]
    pub event_id: String,
    #[serde(rename = "evType")]
    pub event_type: String,
    #[serde(rename = "evDateTime")]
    pub event_date_time: DateTime<Utc>,
    pub outcome: StatusCode,
    #[serde(rename = "outDetail")]
    pub outcome_detail: String,
    #[serde(rename = "evDetData", default, skip_serializing_if = "Option::is_none")]
    pub event_detail_data: Option<Value>,
    #[serde(default)]
    pub events: Vec<LogbookEvent>,
}

impl LogbookOperation {
    /// Operation whose detail and outcome come from its opening event.
    pub fn from_event(event: LogbookEvent) -> Self {
        Self {
            event_id: event.event_id,
            event_type: event.event_type,
            event_date_time: event.event_date_time,
            outcome: event.outcome,
            outcome_detail: event.outcome_detail,
            event_detail_data: event.event_detail_data,
            events: Vec::new(),
        }
    }

    /// Detail payload of a traceability operation.
    ///
    /// The payload may be stored either as a JSON object or as a string
    /// holding serialized JSON.
    pub fn traceability_detail(&self) -> Result<TraceabilityDetail, String> {
        let raw = self
            .event_detail_data
            .as_ref()
            .ok_or_else(|| format!("Operation '{}' has no detail data", self.event_id))?;
        let parsed = match raw {
            Value::String(text) => serde_json::from_str(text),
            other => serde_json::from_value(other.clone()),
        };
        parsed.map_err(|e| format!("Invalid detail data on operation '{}': {e}", self.event_id))
    }
}

/// Detail payload of a lifecycle traceability operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TraceabilityDetail {
    /// Name of the secure export zip in storage.
    pub file_name: String,
    pub digest_algorithm: String,
    /// Root hash of the records secured by the operation. Informational.
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

impl TraceabilityDetail {
    /// Whether `[StartDate, EndDate]` contains `date`. Missing or unparsable
    /// bounds never cover anything.
    pub fn covers(&self, date: NaiveDateTime) -> bool {
        let bound = |value: &Option<String>| value.as_deref().and_then(|v| parse_logbook_date(v).ok());
        match (bound(&self.start_date), bound(&self.end_date)) {
            (Some(start), Some(end)) => start <= date && date <= end,
            _ => false,
        }
    }
}

/// Selection of traceability operations, returned most recent first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationQuery {
    pub event_type: String,
    /// Accepted outcome details; empty accepts any.
    pub outcome_details: Vec<String>,
    /// Only operations whose detail names a secure export file.
    pub require_file_name: bool,
    /// Only operations whose coverage window contains this instant.
    pub covering: Option<NaiveDateTime>,
    pub limit: usize,
}

impl OperationQuery {
    /// Successful lifecycle traceability operations for one object kind.
    pub fn lfc_traceability(object_type: MetadataType) -> Self {
        let event_type = object_type.traceability_event_type();
        Self {
            event_type: event_type.to_string(),
            outcome_details: vec![format!("{event_type}.OK"), format!("{event_type}.WARNING")],
            require_file_name: true,
            covering: None,
            limit: 1,
        }
    }

    pub fn covering(mut self, date: NaiveDateTime) -> Self {
        self.covering = Some(date);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Filter predicate; ordering and limit are applied by the logbook.
    pub fn matches(&self, operation: &LogbookOperation) -> bool {
        if operation.event_type != self.event_type {
            return false;
        }
        if !self.outcome_details.is_empty()
            && !self.outcome_details.contains(&operation.outcome_detail)
        {
            return false;
        }
        if !self.require_file_name && self.covering.is_none() {
            return true;
        }
        let Ok(detail) = operation.traceability_detail() else {
            return false;
        };
        if self.require_file_name && detail.file_name.is_empty() {
            return false;
        }
        self.covering.map_or(true, |date| detail.covers(date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn operation(detail: Value) -> LogbookOperation {
        LogbookOperation {
            event_id: "op1".into(),
            event_type: "LOGBOOK_UNIT_LFC_TRACEABILITY".into(),
            event_date_time: Utc::now(),
            outcome: StatusCode::Ok,
            outcome_detail: "LOGBOOK_UNIT_LFC_TRACEABILITY.OK".into(),
            event_detail_data: Some(detail),
            events: Vec::new(),
        }
    }

    #[test]
    fn detail_parses_from_string_payload() {
        let op = operation(Value::String(
            r#"{"FileName":"f.zip","DigestAlgorithm":"SHA-512","Hash":"h"}"#.into(),
        ));
        assert_eq!(op.traceability_detail().unwrap().file_name, "f.zip");
    }

    #[test]
    fn query_filters_on_coverage_window() {
        let op = operation(json!({
            "FileName": "f.zip", "DigestAlgorithm": "SHA-512", "Hash": "h",
            "StartDate": "2024-01-01T00:00:00.000", "EndDate": "2024-01-31T00:00:00.000"
        }));
        let inside = parse_logbook_date("2024-01-15T12:00:00.000").unwrap();
        let outside = parse_logbook_date("2024-02-15T12:00:00.000").unwrap();
        let query = OperationQuery::lfc_traceability(MetadataType::Unit);
        assert!(query.clone().covering(inside).matches(&op));
        assert!(!query.covering(outside).matches(&op));
    }

    #[test]
    fn query_rejects_failed_operations() {
        let mut op = operation(json!({"FileName": "f.zip", "DigestAlgorithm": "SHA-512", "Hash": "h"}));
        op.outcome_detail = "LOGBOOK_UNIT_LFC_TRACEABILITY.KO".into();
        assert!(!OperationQuery::lfc_traceability(MetadataType::Unit).matches(&op));
    }

    #[test]
    fn dates_round_trip_through_logbook_format() {
        let date = parse_logbook_date("2024-03-04T05:06:07.089").unwrap();
        assert_eq!(format_logbook_date(date), "2024-03-04T05:06:07.089");
    }
}
