//! Reentrant, TTL-bounded subagent markers in `.claude/state/subagents.json`.
//!
//! A marker counts nested delegations for one session. While a marker is
//! active, writes into the reserved state directory are refused.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::paths::is_within;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubagentMarker {
    pub entry_count: u32,
    pub last_seen: DateTime<Utc>,
    pub ttl_secs: u64,
}

impl SubagentMarker {
    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        let ttl = Duration::try_seconds(i64::try_from(self.ttl_secs).unwrap_or(i64::MAX))
            .unwrap_or(Duration::MAX);
        match self.last_seen.checked_add_signed(ttl) {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.entry_count > 0 && !self.expired(now)
    }
}

/// All markers, keyed by session id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubagentRegistry {
    #[serde(default)]
    pub sessions: BTreeMap<String, SubagentMarker>,
}

impl SubagentRegistry {
    pub fn is_active(&self, session_id: &str, now: DateTime<Utc>) -> bool {
        self.sessions
            .get(session_id)
            .is_some_and(|marker| marker.is_active(now))
    }

    /// Record a delegation start. Expired markers restart from zero.
    pub fn enter(&mut self, session_id: &str, now: DateTime<Utc>, ttl_secs: u64) -> u32 {
        let marker = self
            .sessions
            .entry(session_id.to_string())
            .or_insert(SubagentMarker {
                entry_count: 0,
                last_seen: now,
                ttl_secs,
            });
        if marker.expired(now) {
            marker.entry_count = 0;
        }
        marker.entry_count = marker.entry_count.saturating_add(1);
        marker.last_seen = now;
        marker.ttl_secs = ttl_secs;
        marker.entry_count
    }

    /// Record a delegation end. The marker disappears when the count reaches
    /// zero or it had already expired.
    pub fn exit(&mut self, session_id: &str, now: DateTime<Utc>) -> u32 {
        let Some(marker) = self.sessions.get_mut(session_id) else {
            return 0;
        };
        if marker.expired(now) {
            marker.entry_count = 0;
        }
        marker.entry_count = marker.entry_count.saturating_sub(1);
        marker.last_seen = now;
        let remaining = marker.entry_count;
        if remaining == 0 {
            self.sessions.remove(session_id);
        }
        remaining
    }

    /// Drop one session's marker, or all markers.
    pub fn reset(&mut self, session_id: Option<&str>) {
        match session_id {
            Some(id) => {
                self.sessions.remove(id);
            }
            None => self.sessions.clear(),
        }
    }

    /// Subagent boundary: an active session may not write inside `reserved_dir`.
    ///
    /// `target` must already be resolved (absolute, symlinks followed).
    pub fn blocks_write(
        &self,
        session_id: &str,
        target: &Path,
        reserved_dir: &Path,
        now: DateTime<Utc>,
    ) -> bool {
        self.is_active(session_id, now) && is_within(target, reserved_dir)
    }
}

/// Load the registry; a missing or unreadable file means no active markers.
pub fn load_registry(path: &Path) -> SubagentRegistry {
    if !path.exists() {
        return SubagentRegistry::default();
    }
    let parsed = fs::read_to_string(path)
        .with_context(|| format!("read {}", path.display()))
        .and_then(|contents| {
            serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
        });
    match parsed {
        Ok(registry) => registry,
        Err(err) => {
            warn!(err = %format!("{err:#}"), "subagent registry unusable, treating as empty");
            SubagentRegistry::default()
        }
    }
}

/// Atomically write the registry (temp file + rename).
pub fn write_registry(path: &Path, registry: &SubagentRegistry) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("registry path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut buf = serde_json::to_string_pretty(registry).context("serialize registry")?;
    buf.push('\n');
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp registry {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace registry {}", path.display()))?;
    Ok(())
}

/// Load, apply `update`, and persist when changed.
pub fn update_registry<T>(
    path: &Path,
    update: impl FnOnce(&mut SubagentRegistry) -> T,
) -> Result<T> {
    let mut registry = load_registry(path);
    let before = registry.clone();
    let out = update(&mut registry);
    if registry != before {
        debug!(sessions = registry.sessions.len(), "writing subagent registry");
        write_registry(path, &registry)?;
    }
    Ok(out)
}
