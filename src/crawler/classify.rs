//! Response classification
//!
//! Every portal response goes through a single decode-and-validate step that
//! produces a `ResponseClassification`. The engine's retry policy only ever
//! matches on the classification, never on the raw body.
//!
//! | Condition | Classification |
//! |-----------|----------------|
//! | transport failed | `TransportError` |
//! | status != 200 | `HttpError(status)` |
//! | body not JSON or no boolean `flag` | `MalformedPayload(MissingFlag)` |
//! | `msg` is the login prompt | `NeedLogin` |
//! | `msg` is the rate-limit sentinel | `RateLimited` |
//! | `flag` true and `msg.list` is an array | `Success` |
//! | anything else | `MalformedPayload(UnexpectedShape)` |

use serde_json::Value;
use std::fmt;

/// Message the portal returns when the session has lapsed
pub const LOGIN_PROMPT: &str = "请登录";

/// A page of list items from a successful response
#[derive(Debug, Clone, PartialEq)]
pub struct ListPayload {
    pub items: Vec<Value>,
    pub next_page_available: bool,
}

/// Why a payload was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedKind {
    /// Body is not JSON or lacks a boolean `flag`
    MissingFlag,
    /// Flag present but the envelope is not a usable list
    UnexpectedShape(String),
}

/// Transport-layer failure, split by whether the proxy ladder should react
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    /// Could not connect (refused, unreachable, proxy down)
    Connect(String),
    /// Anything else: timeouts, resets, body read errors
    Other(String),
}

impl From<reqwest::Error> for TransportFailure {
    fn from(error: reqwest::Error) -> Self {
        if error.is_connect() {
            Self::Connect(error.to_string())
        } else {
            Self::Other(error.to_string())
        }
    }
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(msg) => write!(f, "connect error: {}", msg),
            Self::Other(msg) => write!(f, "transport error: {}", msg),
        }
    }
}

/// Outcome of one portal request
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseClassification {
    Success(ListPayload),
    NeedLogin,
    RateLimited,
    MalformedPayload(MalformedKind),
    HttpError(u16),
    TransportError(TransportFailure),
}

/// Maps raw request outcomes to classifications
#[derive(Debug, Clone)]
pub struct ResponseClassifier {
    rate_limit_message: String,
}

impl ResponseClassifier {
    pub fn new(rate_limit_message: impl Into<String>) -> Self {
        Self {
            rate_limit_message: rate_limit_message.into(),
        }
    }

    /// Classifies a transport outcome: `(status, body)` or the failure that prevented one
    pub fn classify(
        &self,
        outcome: Result<(u16, String), TransportFailure>,
    ) -> ResponseClassification {
        match outcome {
            Err(failure) => ResponseClassification::TransportError(failure),
            Ok((200, body)) => self.classify_body(&body),
            Ok((status, _)) => ResponseClassification::HttpError(status),
        }
    }

    /// Classifies the body of an HTTP 200 response
    pub fn classify_body(&self, body: &str) -> ResponseClassification {
        let envelope: Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(_) => return ResponseClassification::MalformedPayload(MalformedKind::MissingFlag),
        };

        let Some(flag) = envelope.get("flag").and_then(Value::as_bool) else {
            return ResponseClassification::MalformedPayload(MalformedKind::MissingFlag);
        };

        let msg = envelope.get("msg").unwrap_or(&Value::Null);

        if let Some(text) = msg.as_str() {
            if text == LOGIN_PROMPT {
                return ResponseClassification::NeedLogin;
            }
            if text == self.rate_limit_message {
                return ResponseClassification::RateLimited;
            }
        }

        if flag {
            if let Some(items) = msg.get("list").and_then(Value::as_array) {
                let next_page_available = msg
                    .get("nextPageAvailable")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                return ResponseClassification::Success(ListPayload {
                    items: items.clone(),
                    next_page_available,
                });
            }
        }

        let detail = match msg {
            Value::String(text) => format!("flag={} msg={}", flag, text),
            Value::Null => format!("flag={} without msg", flag),
            _ => format!("flag={} msg without a list", flag),
        };
        ResponseClassification::MalformedPayload(MalformedKind::UnexpectedShape(detail))
    }
}
