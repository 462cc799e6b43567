//! `gate post-tool-use` and `gate session-start`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::core::types::{ToolKind, WorkflowMode};
use crate::core::workflow::{WorkflowEvent, apply_event, plan_completed};
use crate::gate::transition_events;
use crate::hook::{HookOutcome, ToolRequest};
use crate::io::config::GateConfig;
use crate::io::events::EventLog;
use crate::io::layout::GatePaths;
use crate::io::state_store::{load_state_or_default, write_state};
use crate::io::subagent::{load_registry, update_registry};
use crate::messages::Messages;

const HOOK_EVENT: &str = "PostToolUse";

/// Bookkeeping after a tool ran: delegation exit, plan-completion auto
/// return and context notices for edits and directory changes. Never blocks.
#[instrument(skip_all)]
pub fn run_post_tool_use(
    paths: &GatePaths,
    config: &GateConfig,
    input: &str,
    now: DateTime<Utc>,
) -> Result<HookOutcome> {
    let request = ToolRequest::parse(input)?;
    let kind = ToolKind::from_name(
        &request.tool_name,
        &config.blocked_actions.implementation_only_tools,
    );

    match kind {
        ToolKind::Delegate => {
            let session = request.session();
            match update_registry(&paths.subagents_path, |registry| {
                registry.exit(session, now)
            }) {
                Ok(depth) => debug!(session, depth, "subagent exited"),
                Err(err) => warn!(err = %format!("{err:#}"), "failed to record subagent exit"),
            }
            Ok(HookOutcome::proceed())
        }
        ToolKind::PlanUpdate if config.features.auto_return_to_discussion => {
            auto_return(paths, config, now)
        }
        ToolKind::FileEdit => edit_reminder(paths, &request, now),
        ToolKind::Shell => match request.cwd.as_deref() {
            Some(cwd) if changes_directory(request.command().unwrap_or_default()) => {
                HookOutcome::with_context(HOOK_EVENT, &Messages::new().cwd_notice(cwd)?)
            }
            _ => Ok(HookOutcome::proceed()),
        },
        _ => Ok(HookOutcome::proceed()),
    }
}

/// Remind the agent to hand back control once an edit lands in
/// Implementation mode. Delegated work gets no reminder.
fn edit_reminder(
    paths: &GatePaths,
    request: &ToolRequest,
    now: DateTime<Utc>,
) -> Result<HookOutcome> {
    let state = load_state_or_default(&paths.state_path);
    if state.mode != WorkflowMode::Implementation
        || load_registry(&paths.subagents_path).is_active(request.session(), now)
    {
        return Ok(HookOutcome::proceed());
    }
    HookOutcome::with_context(HOOK_EVENT, &Messages::new().edit_reminder()?)
}

/// True when some segment of `command` is a `cd` invocation.
fn changes_directory(command: &str) -> bool {
    command
        .split(['\n', ';', '&', '|'])
        .map(str::trim)
        .any(|segment| segment == "cd" || segment.starts_with("cd "))
}

fn auto_return(paths: &GatePaths, config: &GateConfig, now: DateTime<Utc>) -> Result<HookOutcome> {
    let mut state = load_state_or_default(&paths.state_path);
    if state.mode != WorkflowMode::Implementation || !plan_completed(&state) {
        return Ok(HookOutcome::proceed());
    }

    let summary = apply_event(
        &mut state,
        WorkflowEvent::PlanCompleted,
        now,
        config.features.cooldown_secs,
    );
    info!(from = %summary.from, to = %summary.to, "plan completed, returning to discussion");
    if let Err(err) = write_state(&paths.state_path, &state) {
        warn!(err = %format!("{err:#}"), "failed to persist plan completion");
    }
    EventLog::new(&paths.events_path).record(&transition_events(&[summary]), now);

    match Messages::new().mode_context(WorkflowEvent::PlanCompleted)? {
        Some(context) => HookOutcome::with_context(HOOK_EVENT, &context),
        None => Ok(HookOutcome::proceed()),
    }
}

/// Clear every subagent marker; a new session starts outside any delegation.
#[instrument(skip_all)]
pub fn run_session_start(paths: &GatePaths) -> Result<HookOutcome> {
    update_registry(&paths.subagents_path, |registry| registry.reset(None))
        .context("reset subagent markers")?;
    Ok(HookOutcome::proceed())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::core::types::StepStatus;
    use crate::state::SessionState;
    use crate::test_support::{TestProject, steps_with, todos_json};

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .expect("timestamp")
            .with_timezone(&Utc)
    }

    fn todo_input() -> String {
        json!({
            "tool_name": "TodoWrite",
            "tool_input": todos_json(&[("A", "completed"), ("B", "completed")]),
            "session_id": "s1",
        })
        .to_string()
    }

    fn implementation_with(statuses: &[(&str, StepStatus)]) -> SessionState {
        let mut state = SessionState {
            mode: WorkflowMode::Implementation,
            ..SessionState::default()
        };
        state.plan.active = steps_with(statuses);
        state
    }

    #[test]
    fn completed_plan_returns_to_discussion() {
        let project = TestProject::new();
        project.write_state(&implementation_with(&[
            ("A", StepStatus::Completed),
            ("B", StepStatus::Completed),
        ]));
        let paths = GatePaths::new(project.root());

        let outcome =
            run_post_tool_use(&paths, &GateConfig::default(), &todo_input(), now()).expect("run");
        assert!(outcome.stdout.is_some());

        let state = project.read_state();
        assert_eq!(state.mode, WorkflowMode::Discussion);
        assert!(state.plan.active.is_empty());
    }

    #[test]
    fn unfinished_plan_or_disabled_feature_keeps_mode() {
        let project = TestProject::new();
        project.write_state(&implementation_with(&[
            ("A", StepStatus::Completed),
            ("B", StepStatus::InProgress),
        ]));
        let paths = GatePaths::new(project.root());
        let outcome =
            run_post_tool_use(&paths, &GateConfig::default(), &todo_input(), now()).expect("run");
        assert_eq!(outcome, HookOutcome::proceed());

        project.write_state(&implementation_with(&[("A", StepStatus::Completed)]));
        let mut config = GateConfig::default();
        config.features.auto_return_to_discussion = false;
        run_post_tool_use(&paths, &config, &todo_input(), now()).expect("run");
        assert_eq!(project.read_state().mode, WorkflowMode::Implementation);
    }

    fn post(paths: &GatePaths, tool: &str, input: serde_json::Value) -> HookOutcome {
        let request = json!({
            "tool_name": tool,
            "tool_input": input,
            "session_id": "s1",
            "cwd": "/work/app/src",
        });
        run_post_tool_use(paths, &GateConfig::default(), &request.to_string(), now()).expect("run")
    }

    fn context_of(outcome: &HookOutcome) -> String {
        let payload: serde_json::Value =
            serde_json::from_str(outcome.stdout.as_deref().expect("stdout")).expect("json");
        payload["hookSpecificOutput"]["additionalContext"]
            .as_str()
            .expect("context")
            .to_string()
    }

    #[test]
    fn edits_in_implementation_get_a_reminder() {
        let project = TestProject::new();
        let paths = GatePaths::new(project.root());
        let edit = json!({"file_path": "src/app.py"});

        assert_eq!(post(&paths, "Edit", edit.clone()), HookOutcome::proceed());

        project.write_state(&implementation_with(&[]));
        let outcome = post(&paths, "MultiEdit", edit.clone());
        assert_eq!(outcome.exit_code, crate::exit_codes::OK);
        assert!(context_of(&outcome).starts_with("[DAIC Reminder]"));

        update_registry(&paths.subagents_path, |registry| {
            registry.enter("s1", now(), 1800);
        })
        .expect("seed");
        assert_eq!(post(&paths, "Write", edit), HookOutcome::proceed());
    }

    #[test]
    fn directory_changes_echo_the_working_directory() {
        let project = TestProject::new();
        let paths = GatePaths::new(project.root());

        let outcome = post(&paths, "Bash", json!({"command": "cd src && ls"}));
        assert_eq!(context_of(&outcome), "[CWD: /work/app/src]");

        assert_eq!(
            post(&paths, "Bash", json!({"command": "abcd efg; ls"})),
            HookOutcome::proceed()
        );
    }

    #[test]
    fn delegation_exit_and_session_start_clear_markers() {
        let project = TestProject::new();
        let paths = GatePaths::new(project.root());
        update_registry(&paths.subagents_path, |registry| {
            registry.enter("s1", now(), 1800);
            registry.enter("s1", now(), 1800);
            registry.enter("s2", now(), 1800);
        })
        .expect("seed");

        let input = json!({"tool_name": "Task", "tool_input": {}, "session_id": "s1"}).to_string();
        run_post_tool_use(&paths, &GateConfig::default(), &input, now()).expect("run");
        assert!(load_registry(&paths.subagents_path).is_active("s1", now()));

        run_session_start(&paths).expect("session start");
        let registry = load_registry(&paths.subagents_path);
        assert!(!registry.is_active("s1", now()));
        assert!(!registry.is_active("s2", now()));
    }
}
