//! Response classification
//!
//! Every store response is reduced to an [`ErrorSet`] with three independent
//! slots. The set decides whether the calling operation must abort
//! ([`ErrorSet::is_fatal`]) or whether the failure is ordinary traffic, such as
//! a 404 while the record layer probes for an identifier before an insert.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Store error string that always aborts the operation
pub const UNAUTHORIZED: &str = "unauthorized";
/// Store reason string reported for a missing database file
pub const NO_DB_FILE: &str = "no_db_file";

/// HTTP status >= 400
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportFailure {
    /// Status code
    pub code: u16,
    /// Reason phrase
    pub message: String,
}

/// `{"error": ..., "reason": ...}` pair reported by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationFailure {
    /// Value of the `error` key
    pub error: String,
    /// Value of the `reason` key, when present
    pub reason: Option<String>,
}

/// Body could not be decoded as JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeFailure {
    /// Failure category (`syntax`, `eof`, `data`, `io`)
    pub category: String,
    /// Decoder message
    pub message: String,
}

impl From<serde_json::Error> for DecodeFailure {
    fn from(e: serde_json::Error) -> Self {
        let category = match e.classify() {
            serde_json::error::Category::Io => "io",
            serde_json::error::Category::Syntax => "syntax",
            serde_json::error::Category::Data => "data",
            serde_json::error::Category::Eof => "eof",
        };
        DecodeFailure {
            category: category.to_string(),
            message: e.to_string(),
        }
    }
}

/// Decode a response body.
///
/// An empty (or whitespace-only) body decodes to `null`; HEAD responses and
/// some DELETE proxies return nothing at all and that is not a decode error.
pub fn decode_body(body: &[u8]) -> Result<Value, DecodeFailure> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(DecodeFailure::from)
}

/// Per-request error classification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSet {
    /// Status >= 400
    pub transport: Option<TransportFailure>,
    /// Store-reported error
    pub application: Option<ApplicationFailure>,
    /// Body decode failure
    pub decode: Option<DecodeFailure>,
}

impl ErrorSet {
    /// Classify a response from its status line and decode result.
    pub fn classify(status: u16, reason: &str, decoded: &Result<Value, DecodeFailure>) -> Self {
        let mut errors = ErrorSet::default();

        if status >= 400 {
            errors.transport = Some(TransportFailure {
                code: status,
                message: reason.to_string(),
            });

            if let Ok(Value::Object(body)) = decoded {
                if let Some(error) = body.get("error") {
                    errors.application = Some(ApplicationFailure {
                        error: scalar_text(error),
                        reason: body.get("reason").map(scalar_text),
                    });
                }
            }
        }

        if let Err(failure) = decoded {
            errors.decode = Some(failure.clone());
        }

        errors
    }

    /// True if any slot is set
    pub fn is_error(&self) -> bool {
        self.transport.is_some() || self.application.is_some() || self.decode.is_some()
    }

    /// True if the operation must abort rather than report a negative result
    pub fn is_fatal(&self) -> bool {
        if self.decode.is_some() {
            return true;
        }
        match &self.application {
            Some(app) => app.error == UNAUTHORIZED || app.reason.as_deref() == Some(NO_DB_FILE),
            None => false,
        }
    }

    /// Status code of the transport slot, if set
    pub fn status(&self) -> Option<u16> {
        self.transport.as_ref().map(|t| t.code)
    }

    /// True when the store reported `not_found` (or a bare 404)
    pub fn is_not_found(&self) -> bool {
        match &self.application {
            Some(app) => app.error == "not_found",
            None => self.status() == Some(404),
        }
    }

    /// True when the store rejected a write because of a stale revision
    pub fn is_conflict(&self) -> bool {
        match &self.application {
            Some(app) => app.error == "conflict",
            None => self.status() == Some(409),
        }
    }

    /// Human-readable summary, `(slot) detail;` per set slot.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(t) = &self.transport {
            parts.push(format!("(transport) {} {};", t.code, t.message));
        }
        if let Some(a) = &self.application {
            match &a.reason {
                Some(reason) => parts.push(format!("(application) {} {};", a.error, reason)),
                None => parts.push(format!("(application) {};", a.error)),
            }
        }
        if let Some(d) = &self.decode {
            parts.push(format!("(decode) {} {};", d.category, d.message));
        }
        parts.join(" ")
    }
}

impl fmt::Display for ErrorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
