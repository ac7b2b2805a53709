// src/parsers/record.rs

use chrono::{DateTime, FixedOffset};
use url::Url;

use super::fields::{FieldMap, FieldValue};
use super::ParseError;
use crate::time::parse_time_local;

/// Address recorded when a line carries no usable upstream.
pub const NO_UPSTREAM_ADDR: &str = "0.0.0.0";
/// Status forced onto records built from the error-log format.
pub const GATEWAY_TIMEOUT_STATUS: u16 = 504;

/// The `"METHOD PATH PROTOCOL"` request field, split and URL-decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    /// The upstream answered; latency and timestamp come from the access
    /// log line.
    Completed {
        time_local: DateTime<FixedOffset>,
        request_time: f64,
    },
    /// The line only matched the error-log format: the upstream never
    /// returned a normal response.
    TimedOut,
}

/// One fully validated log line. Built fresh per line, consumed by the
/// collector, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestRecord {
    pub upstream_addr: String,
    pub request: RequestLine,
    pub upstream_status: u16,
    pub outcome: Outcome,
}

impl RequestRecord {
    pub fn timed_out(&self) -> bool {
        matches!(self.outcome, Outcome::TimedOut)
    }

    /// Builds the record for a line that matched the access format.
    /// Every required field missing or mistyped is a hard failure here;
    /// the caller decides whether to retry against the error format.
    pub(crate) fn from_access_fields(fields: &FieldMap) -> Result<Self, ParseError> {
        let request = RequestLine::parse(require_text(fields, "request")?)?;
        let request_time = fields
            .get("request_time")
            .and_then(FieldValue::as_f64)
            .ok_or(ParseError::MissingField("request_time"))?;
        let time_local = parse_time_local(require_text(fields, "time_local")?)?;
        let upstream_status = fields
            .get("upstream_status")
            .and_then(FieldValue::as_i64)
            .and_then(|code| u16::try_from(code).ok())
            .ok_or(ParseError::MissingField("upstream_status"))?;

        Ok(Self {
            upstream_addr: upstream_addr_or_default(fields),
            request,
            upstream_status,
            outcome: Outcome::Completed {
                time_local,
                request_time,
            },
        })
    }

    /// Builds the record for a line that matched the error format. The
    /// status is pinned to 504 no matter what status-like fields the line
    /// carried, and there is no latency to report.
    pub(crate) fn from_error_fields(fields: &FieldMap) -> Result<Self, ParseError> {
        let request = RequestLine::parse(require_text(fields, "request")?)?;

        Ok(Self {
            upstream_addr: upstream_addr_or_default(fields),
            request,
            upstream_status: GATEWAY_TIMEOUT_STATUS,
            outcome: Outcome::TimedOut,
        })
    }
}

impl RequestLine {
    /// Splits `METHOD TARGET PROTOCOL` (exactly three tokens) and parses
    /// the target against a throwaway base authority; only path and query
    /// survive.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let tokens: Vec<&str> = raw.split_whitespace().collect();
        let &[method, target, _protocol] = tokens.as_slice() else {
            return Err(ParseError::MalformedRequest(raw.to_string()));
        };

        let url = Url::parse(&format!("http://localhost{target}"))
            .map_err(|_| ParseError::RequestTarget(target.to_string()))?;

        Ok(Self {
            method: method.to_string(),
            path: url.path().to_string(),
            query: url.query().map(str::to_string),
        })
    }
}

fn require_text<'a>(fields: &'a FieldMap, name: &'static str) -> Result<&'a str, ParseError> {
    fields
        .get(name)
        .and_then(FieldValue::as_str)
        .ok_or(ParseError::MissingField(name))
}

fn upstream_addr_or_default(fields: &FieldMap) -> String {
    fields
        .get("upstream_addr")
        .and_then(FieldValue::as_str)
        .unwrap_or(NO_UPSTREAM_ADDR)
        .to_string()
}
