// File: src/parsers/mod.rs

pub mod fields;
pub mod record;

use crate::template::{Template, TemplateError};
use fields::typeify;
use record::RequestRecord;

/// The nginx-ingress controller's access log format.
pub const ACCESS_LOG_FORMAT: &str = r#"$remote_addr - $remote_user [$time_local] "$request" $status $body_bytes_sent "$http_referer" "$http_user_agent" $request_length $request_time [$proxy_upstream_name] [$proxy_alternative_upstream_name] $upstream_addr $upstream_response_length $upstream_response_time $upstream_status $req_id"#;

/// The error-log shape nginx emits when an upstream times out.
pub const ERROR_LOG_FORMAT: &str = r#"$time_date $time_hms [$status] $code: $id $message, client: $upstream_addr, server: $proxy_upstream_name, request: "$request", upstream: "$upstream_full", host: "$host""#;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("line matches neither the access nor the error log format")]
    NoFormatMatched,
    #[error("field `{0}` is missing or has an unexpected type")]
    MissingField(&'static str),
    #[error("request line `{0}` is not `METHOD PATH PROTOCOL`")]
    MalformedRequest(String),
    #[error("request target `{0}` is not a usable path")]
    RequestTarget(String),
    #[error("unrecognized timestamp")]
    Timestamp(#[from] chrono::ParseError),
}

/// Turns raw log lines into [`RequestRecord`]s.
///
/// Owns the two compiled templates for its lifetime; `parse` is a pure
/// function of the line. Lines are tried against the access format first
/// and fall back to the error format, which marks the request timed out.
pub struct LineParser {
    access: Template,
    error: Template,
}

impl LineParser {
    /// A parser for the stock nginx-ingress formats.
    pub fn new() -> Result<Self, TemplateError> {
        Self::with_formats(ACCESS_LOG_FORMAT, ERROR_LOG_FORMAT)
    }

    /// A parser for caller-supplied `$field` formats. The access format
    /// must carry `request`, `request_time`, `time_local` and
    /// `upstream_status`; the error format must carry `request`.
    pub fn with_formats(access: &str, error: &str) -> Result<Self, TemplateError> {
        Ok(Self {
            access: Template::compile(access)?,
            error: Template::compile(error)?,
        })
    }

    pub fn parse(&self, line: &str) -> Result<RequestRecord, ParseError> {
        // A structural match that then fails field typing is retried
        // against the error format, same as a non-match.
        let access_err = match self.access.captures(line) {
            Some(raw) => match RequestRecord::from_access_fields(&typeify(&raw)) {
                Ok(record) => return Ok(record),
                Err(err) => Some(err),
            },
            None => None,
        };

        if let Some(raw) = self.error.captures(line) {
            return RequestRecord::from_error_fields(&typeify(&raw));
        }

        // Prefer the access path's error when it got further than the
        // error template did.
        Err(access_err.unwrap_or(ParseError::NoFormatMatched))
    }
}
