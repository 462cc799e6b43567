//! Session state load/save with schema validation and atomic replacement.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde_json::Value;
use tracing::{debug, warn};

use crate::state::{STATE_VERSION, SessionState};

const STATE_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/session_state.v1.schema.json"
));

/// Load and validate the state document.
///
/// A missing file yields the default state. Unreadable, unparsable,
/// schema-invalid or wrong-version documents are errors.
pub fn load_state(path: &Path) -> Result<SessionState> {
    if !path.exists() {
        debug!(path = %path.display(), "no state file, using defaults");
        return Ok(SessionState::default());
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read state {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse state {}", path.display()))?;
    if let Some(version) = value.get("version").and_then(Value::as_u64)
        && version != u64::from(STATE_VERSION)
    {
        return Err(anyhow!(
            "unsupported state version {version} (expected {STATE_VERSION})"
        ));
    }
    validate_schema(&value)?;
    let mut state: SessionState = serde_json::from_value(value)
        .with_context(|| format!("deserialize state {}", path.display()))?;
    if state.normalize() {
        warn!("state had plan bookkeeping outside plan mode, repaired");
    }
    debug!(mode = %state.mode, active_steps = state.plan.active.len(), "state loaded");
    Ok(state)
}

/// Load state for a hook invocation; any problem resets to defaults
/// (Discussion, empty plan).
pub fn load_state_or_default(path: &Path) -> SessionState {
    match load_state(path) {
        Ok(state) => state,
        Err(err) => {
            warn!(err = %format!("{err:#}"), "state unusable, resetting to discussion");
            SessionState::default()
        }
    }
}

/// Atomically write state to disk (temp file + rename).
pub fn write_state(path: &Path, state: &SessionState) -> Result<()> {
    debug!(path = %path.display(), mode = %state.mode, "writing state");
    let mut buf = serde_json::to_string_pretty(state).context("serialize state")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

/// Load (or default), apply `update`, and persist when the state changed.
pub fn update_state<T>(path: &Path, update: impl FnOnce(&mut SessionState) -> T) -> Result<T> {
    let mut state = load_state_or_default(path);
    let before = state.clone();
    let out = update(&mut state);
    if state != before || !path.exists() {
        write_state(path, &state)?;
    }
    Ok(out)
}

fn validate_schema(value: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(STATE_SCHEMA).context("parse state schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    if !compiled.is_valid(value) {
        let messages = compiled
            .iter_errors(value)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "state schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("state path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp state {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace state {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::WorkflowMode;
    use crate::test_support::steps;

    #[test]
    fn missing_file_is_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let state = load_state(&temp.path().join("sessions-state.json")).expect("load");
        assert_eq!(state, SessionState::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("sessions/sessions-state.json");
        let mut state = SessionState {
            mode: WorkflowMode::Plan,
            plan_prev_mode: Some(WorkflowMode::Implementation),
            ..SessionState::default()
        };
        state.plan.stashed = Some(steps(&["a"]));
        state.current_task.branch = Some("feature/x".to_string());
        state.current_task.declare_submodule("svcA");

        write_state(&path, &state).expect("write");
        assert_eq!(load_state(&path).expect("load"), state);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn default_document_is_stable() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("state.json");
        write_state(&path, &SessionState::default()).expect("write");
        let value: Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(
            value,
            serde_json::json!({
                "version": 1,
                "mode": "discussion",
                "current_task": {"task_id": null, "branch": null, "submodules": []},
                "plan": {"active": [], "stashed": null},
                "plan_prev_mode": null,
                "cooldown": null,
                "flags": {"bypass_mode": false}
            })
        );
    }

    #[test]
    fn corrupt_state_reads_back_as_discussion() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("state.json");
        for body in [
            "{not json",
            r#"{"version": 1, "mode": "party"}"#,
            r#"{"version": 7, "mode": "implementation"}"#,
        ] {
            fs::write(&path, body).expect("write");
            assert!(load_state(&path).is_err(), "{body}");
            let state = load_state_or_default(&path);
            assert_eq!(state.mode, WorkflowMode::Discussion);
            assert!(state.plan.active.is_empty());
        }
    }

    #[test]
    fn update_persists_only_changes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("state.json");
        update_state(&path, |state| state.mode = WorkflowMode::Implementation).expect("update");
        assert_eq!(
            load_state(&path).expect("load").mode,
            WorkflowMode::Implementation
        );
        let mtime = fs::metadata(&path).expect("meta").modified().expect("mtime");
        update_state(&path, |_| ()).expect("noop update");
        assert_eq!(
            fs::metadata(&path).expect("meta").modified().expect("mtime"),
            mtime
        );
    }
}
