//! Line formats for the failure log
//!
//! Two formats are written and both are always read back:
//!
//! - JSON lines: one object per line with a `reason` field
//! - Legacy text: `[ts] [type] {params}, xwlxmc: v, province_code: v，错误原因: 重试次数过多`
//!
//! Only lines carrying the exhausted-retries reason are reconcilable; anything
//! else in the file is passed through untouched.

use crate::failure_log::entry::FailureLogEntry;
use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Reason text marking a reconcilable line
pub const EXHAUSTED_REASON: &str = "重试次数过多";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const LEGACY_MARKER: &str = "，错误原因: 重试次数过多";

fn legacy_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^\[(?P<ts>[^\]]+)\] \[(?P<kind>[^\]]+)\] (?P<params>\{.*\})(?:, xwlxmc: (?P<xwlxmc>.*?))?(?:, province_code: (?P<province>.*?))?，错误原因: 重试次数过多$",
        )
        .expect("legacy failure line pattern is valid")
    })
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonLine {
    timestamp: String,
    request_type: String,
    params: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    xwlxmc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    province_code: Option<String>,
    reason: String,
}

/// What a single log line turned out to be
#[derive(Debug, PartialEq)]
pub enum LineKind {
    /// An exhausted-retries entry that can be replayed
    Reconcilable(FailureLogEntry),
    /// Carries the exhausted marker but could not be decoded
    Unparseable(String),
    /// Anything else
    PassThrough,
}

/// Renders an entry in the legacy text format, without a trailing newline
pub fn to_legacy_line(entry: &FailureLogEntry) -> Result<String, serde_json::Error> {
    let mut line = format!(
        "[{}] [{}] {}",
        entry.timestamp.format(TIMESTAMP_FORMAT),
        entry.request_type,
        serde_json::to_string(&entry.params)?
    );
    if let Some(xwlxmc) = &entry.xwlxmc {
        line.push_str(&format!(", xwlxmc: {}", xwlxmc));
    }
    if let Some(code) = &entry.province_code {
        line.push_str(&format!(", province_code: {}", code));
    }
    line.push_str(LEGACY_MARKER);
    Ok(line)
}

/// Renders an entry as one JSON object, without a trailing newline
pub fn to_json_line(entry: &FailureLogEntry) -> Result<String, serde_json::Error> {
    let line = JsonLine {
        timestamp: entry.timestamp.format(TIMESTAMP_FORMAT).to_string(),
        request_type: entry.request_type.to_string(),
        params: entry
            .params
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
        xwlxmc: entry.xwlxmc.clone(),
        province_code: entry.province_code.clone(),
        reason: EXHAUSTED_REASON.to_string(),
    };
    serde_json::to_string(&line)
}

/// Classifies one line of the log
pub fn inspect_line(line: &str) -> LineKind {
    let trimmed = line.trim();

    if trimmed.starts_with('{') {
        return match serde_json::from_str::<JsonLine>(trimmed) {
            Ok(json) if json.reason == EXHAUSTED_REASON => match from_json_line(json) {
                Ok(entry) => LineKind::Reconcilable(entry),
                Err(reason) => LineKind::Unparseable(reason),
            },
            _ => LineKind::PassThrough,
        };
    }

    if trimmed.contains(LEGACY_MARKER) {
        return match parse_legacy_line(trimmed) {
            Ok(entry) => LineKind::Reconcilable(entry),
            Err(reason) => LineKind::Unparseable(reason),
        };
    }

    LineKind::PassThrough
}

fn from_json_line(json: JsonLine) -> Result<FailureLogEntry, String> {
    Ok(FailureLogEntry {
        timestamp: parse_timestamp(&json.timestamp)?,
        request_type: json.request_type.parse()?,
        params: stringify_params(json.params),
        xwlxmc: json.xwlxmc,
        province_code: json.province_code,
    })
}

fn parse_legacy_line(line: &str) -> Result<FailureLogEntry, String> {
    let caps = legacy_pattern()
        .captures(line)
        .ok_or_else(|| "line does not match the legacy layout".to_string())?;

    let params_text = &caps["params"];
    let params: BTreeMap<String, Value> = serde_json::from_str(params_text)
        .or_else(|_| serde_json::from_str(&python_repr_to_json(params_text)))
        .map_err(|e| format!("unreadable params: {}", e))?;

    let optional = |name: &str| {
        caps.name(name)
            .map(|m| m.as_str().trim().to_string())
            .filter(|v| !v.is_empty() && v.as_str() != "None")
    };

    Ok(FailureLogEntry {
        timestamp: parse_timestamp(&caps["ts"])?,
        request_type: caps["kind"].parse()?,
        params: stringify_params(params),
        xwlxmc: optional("xwlxmc"),
        province_code: optional("province"),
    })
}

fn parse_timestamp(text: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(text.trim(), TIMESTAMP_FORMAT)
        .map_err(|e| format!("bad timestamp '{}': {}", text, e))
}

/// Older writers emitted Python dict reprs: single quotes and `None`
fn python_repr_to_json(text: &str) -> String {
    text.replace('\'', "\"")
        .replace(": None", ": null")
        .replace(": True", ": true")
        .replace(": False", ": false")
}

fn stringify_params(params: BTreeMap<String, Value>) -> BTreeMap<String, String> {
    params
        .into_iter()
        .map(|(k, v)| {
            let text = match v {
                Value::String(s) => s,
                Value::Null => String::new(),
                other => other.to_string(),
            };
            (k, text)
        })
        .collect()
}
