//! Append-only audit events in `sessions/sessions-events.jsonl`.
//!
//! One JSON object per line: `{"timestamp": <RFC 3339>, "type": ..., ...}`.
//! Appends are best effort; a failed append is logged and never changes the
//! admission decision.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// A single audit record before it is stamped and written.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    pub kind: String,
    pub fields: Map<String, Value>,
}

impl AuditEvent {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.fields.insert(key.to_string(), value);
        self
    }

    fn to_line(&self, now: DateTime<Utc>) -> Result<String> {
        let mut record = Map::new();
        record.insert(
            "timestamp".to_string(),
            Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        record.insert("type".to_string(), Value::String(self.kind.clone()));
        for (key, value) in &self.fields {
            record.entry(key.clone()).or_insert_with(|| value.clone());
        }
        serde_json::to_string(&Value::Object(record)).context("serialize audit event")
    }
}

/// Writer for the project's audit stream.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append events, logging instead of failing.
    pub fn record(&self, events: &[AuditEvent], now: DateTime<Utc>) {
        if events.is_empty() {
            return;
        }
        if let Err(err) = self.append(events, now) {
            warn!(err = %format!("{err:#}"), path = %self.path.display(), "audit append failed");
        }
    }

    /// Append events, surfacing I/O errors.
    pub fn append(&self, events: &[AuditEvent], now: DateTime<Utc>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let mut buf = String::new();
        for event in events {
            buf.push_str(&event.to_line(now)?);
            buf.push('\n');
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open {}", self.path.display()))?;
        file.write_all(buf.as_bytes())
            .with_context(|| format!("append {}", self.path.display()))?;
        debug!(count = events.len(), "audit events appended");
        Ok(())
    }
}
