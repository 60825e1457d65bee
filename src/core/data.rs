//! Data types for the scan pipeline.
//!
//! Three layers, from the wire inwards:
//!
//! - [`TagResponse`]: what a transport hands back for one tag (raw value plus
//!   device status).
//! - [`ReadResult`]: the single tagged result type used for every outcome of a
//!   read, including failures synthesized by the reader.
//! - [`Reading`]: the persisted, timestamped observation of one signal.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::signal::SignalId;

/// A raw value as returned by a controller.
///
/// Controllers return whatever the tag holds; only numbers are stored.
/// See [`RawValue::coerce`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    /// Floating-point number (REAL/LREAL tags)
    Float(f64),

    /// Integer value (SINT/INT/DINT/LINT tags)
    Integer(i64),

    /// Boolean value (BOOL tags)
    Bool(bool),

    /// String value (STRING tags)
    String(String),

    /// Raw bytes (UDTs and other structured tags)
    Bytes(Vec<u8>),

    /// Null/missing value
    #[default]
    Null,
}

impl RawValue {
    /// Coerce to a finite number.
    ///
    /// Integers and booleans widen to `f64`, strings are parsed after trimming.
    /// Anything else fails with a description of the offending value; no
    /// default is ever substituted.
    pub fn coerce(&self) -> std::result::Result<f64, String> {
        let v = match self {
            Self::Float(v) => *v,
            Self::Integer(v) => *v as f64,
            Self::Bool(v) => {
                if *v {
                    1.0
                } else {
                    0.0
                }
            }
            Self::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("not a number: {:?}", s))?,
            Self::Bytes(b) => return Err(format!("not a number: {} raw bytes", b.len())),
            Self::Null => return Err("no value returned".to_string()),
        };

        if v.is_finite() {
            Ok(v)
        } else {
            Err(format!("non-finite value: {}", v))
        }
    }

    /// Check if this is a null value.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<f32> for RawValue {
    fn from(v: f32) -> Self {
        Self::Float(v as f64)
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for RawValue {
    fn from(v: i32) -> Self {
        Self::Integer(v as i64)
    }
}

impl From<bool> for RawValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for RawValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

/// Per-tag status reported by the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagStatus {
    Success,
    /// Device-side rejection, carrying the device's status text.
    Error(String),
}

/// One entry of a batched read response, as normalized by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct TagResponse {
    pub tag: String,
    pub value: RawValue,
    pub status: TagStatus,
}

impl TagResponse {
    /// Successful response.
    pub fn ok(tag: impl Into<String>, value: impl Into<RawValue>) -> Self {
        Self {
            tag: tag.into(),
            value: value.into(),
            status: TagStatus::Success,
        }
    }

    /// Device-rejected response.
    pub fn error(tag: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            value: RawValue::Null,
            status: TagStatus::Error(status.into()),
        }
    }
}

/// Outcome kind of one tag read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadStatus {
    /// Value read and coerced.
    Success,
    /// The device rejected this tag (unknown path, type mismatch, ...).
    TagError,
    /// The device returned a value that is not a valid number.
    CoercionError,
    /// The batched read containing this tag failed.
    ChunkError,
    /// The connection to the endpoint could not be opened.
    ConnectionError,
    /// No protocol transport is available.
    NoTransport,
}

impl ReadStatus {
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::TagError => "tag_error",
            Self::CoercionError => "coercion_error",
            Self::ChunkError => "chunk_error",
            Self::ConnectionError => "connection_error",
            Self::NoTransport => "no_transport",
        }
    }
}

impl fmt::Display for ReadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of reading one tag.
///
/// Fields are private so that `value.is_some()` always implies
/// `status == Success`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadResult {
    tag: String,
    value: Option<f64>,
    status: ReadStatus,
    detail: Option<String>,
}

impl ReadResult {
    /// A successfully read numeric value.
    pub fn success(tag: impl Into<String>, value: f64) -> Self {
        Self {
            tag: tag.into(),
            value: Some(value),
            status: ReadStatus::Success,
            detail: None,
        }
    }

    /// A failed read. `status` must not be `Success`; if it is, it is
    /// downgraded to `CoercionError` since there is no value to carry.
    pub fn failed(tag: impl Into<String>, status: ReadStatus, detail: impl Into<String>) -> Self {
        let status = if status.is_success() {
            ReadStatus::CoercionError
        } else {
            status
        };
        Self {
            tag: tag.into(),
            value: None,
            status,
            detail: Some(detail.into()),
        }
    }

    /// Convert a transport response, coercing its value to a number.
    pub fn from_response(response: TagResponse) -> Self {
        match response.status {
            TagStatus::Error(status) => Self::failed(response.tag, ReadStatus::TagError, status),
            TagStatus::Success => match response.value.coerce() {
                Ok(v) => Self::success(response.tag, v),
                Err(reason) => Self::failed(response.tag, ReadStatus::CoercionError, reason),
            },
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn status(&self) -> ReadStatus {
        self.status
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// A persisted observation of one signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub signal_id: SignalId,
    pub value: Option<f64>,
    pub timestamp: DateTime<Utc>,
    pub status: ReadStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Reading {
    /// Build a reading for `signal_id` from a read result.
    pub fn from_result(signal_id: SignalId, result: &ReadResult, timestamp: DateTime<Utc>) -> Self {
        Self {
            signal_id,
            value: result.value(),
            timestamp,
            status: result.status(),
            detail: result.detail().map(str::to_string),
        }
    }

    /// `value` is present exactly when the read succeeded.
    pub fn is_consistent(&self) -> bool {
        self.value.is_some() == self.status.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_numbers() {
        assert_eq!(RawValue::Float(12.5).coerce(), Ok(12.5));
        assert_eq!(RawValue::Integer(40).coerce(), Ok(40.0));
        assert_eq!(RawValue::Bool(true).coerce(), Ok(1.0));
        assert_eq!(RawValue::from(" 3.25 ").coerce(), Ok(3.25));
    }

    #[test]
    fn test_coerce_rejects_non_numbers() {
        assert!(RawValue::from("abc").coerce().is_err());
        assert!(RawValue::Bytes(vec![1, 2]).coerce().is_err());
        assert!(RawValue::Null.coerce().is_err());
        assert!(RawValue::Float(f64::NAN).coerce().is_err());
        assert!(RawValue::Float(f64::INFINITY).coerce().is_err());
    }

    #[test]
    fn test_read_result_from_response() {
        let ok = ReadResult::from_response(TagResponse::ok("tagX", 12.5));
        assert_eq!(ok.value(), Some(12.5));
        assert_eq!(ok.status(), ReadStatus::Success);

        let rejected = ReadResult::from_response(TagResponse::error("tagY", "Path destination unknown"));
        assert_eq!(rejected.value(), None);
        assert_eq!(rejected.status(), ReadStatus::TagError);
        assert_eq!(rejected.detail(), Some("Path destination unknown"));

        let garbage = ReadResult::from_response(TagResponse::ok("tagZ", "n/a"));
        assert_eq!(garbage.value(), None);
        assert_eq!(garbage.status(), ReadStatus::CoercionError);

        let empty = ReadResult::from_response(TagResponse::ok("tagW", RawValue::Null));
        assert_eq!(empty.status(), ReadStatus::CoercionError);
    }

    #[test]
    fn test_failed_never_success() {
        let r = ReadResult::failed("t", ReadStatus::Success, "x");
        assert_eq!(r.status(), ReadStatus::CoercionError);
        assert!(r.value().is_none());
    }

    #[test]
    fn test_reading_consistency() {
        let ts = Utc::now();
        let ok = Reading::from_result(SignalId(1), &ReadResult::success("a", 1.0), ts);
        let bad = Reading::from_result(
            SignalId(2),
            &ReadResult::failed("b", ReadStatus::ConnectionError, "refused"),
            ts,
        );
        assert!(ok.is_consistent());
        assert!(bad.is_consistent());
        assert_eq!(bad.detail.as_deref(), Some("refused"));
    }

    #[test]
    fn test_reading_serialization() {
        let ts = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let reading = Reading::from_result(SignalId(7), &ReadResult::success("a", 2.5), ts);
        let json = serde_json::to_string(&reading).unwrap();
        assert_eq!(
            json,
            r#"{"signal_id":7,"value":2.5,"timestamp":"2026-01-01T00:00:00Z","status":"success"}"#
        );
    }
}
