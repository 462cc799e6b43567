//! Workflow mode transitions over the session state document.
//!
//! Every transition is a pure function of the current state, the event and
//! the clock reading supplied by the caller. Applying the same event twice is
//! safe: the second application is a no-op.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::types::{StepStatus, WorkflowMode};
use crate::state::{CooldownWindow, SessionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// Operator said an implementation phrase.
    ImplementationTrigger,
    /// Operator said a discussion phrase or ran `gate mode discussion`.
    DiscussionTrigger,
    /// Every step of the active plan is completed.
    PlanCompleted,
    /// Planning tool invoked.
    EnterPlan,
    /// Plan-exit tool invoked.
    ExitPlan,
    /// Operator said an emergency-stop phrase.
    EmergencyStop,
    /// A plan update diverged from the agreed plan.
    PlanViolation,
}

impl WorkflowEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowEvent::ImplementationTrigger => "implementation_trigger",
            WorkflowEvent::DiscussionTrigger => "discussion_trigger",
            WorkflowEvent::PlanCompleted => "plan_completed",
            WorkflowEvent::EnterPlan => "enter_plan",
            WorkflowEvent::ExitPlan => "exit_plan",
            WorkflowEvent::EmergencyStop => "emergency_stop",
            WorkflowEvent::PlanViolation => "plan_violation",
        }
    }
}

/// What a transition did, for logging and audit events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionSummary {
    pub event: WorkflowEvent,
    pub from: WorkflowMode,
    pub to: WorkflowMode,
    /// False when the event did not apply in the current mode.
    pub changed: bool,
}

/// Apply `event` to `state`.
///
/// `cooldown_secs` opens a cooldown window on entering Implementation; zero
/// disables the window.
pub fn apply_event(
    state: &mut SessionState,
    event: WorkflowEvent,
    now: DateTime<Utc>,
    cooldown_secs: u64,
) -> TransitionSummary {
    let before = state.clone();
    let from = state.mode;

    match event {
        WorkflowEvent::ImplementationTrigger => {
            if state.mode == WorkflowMode::Discussion {
                state.mode = WorkflowMode::Implementation;
                state.cooldown =
                    (cooldown_secs > 0).then(|| CooldownWindow::starting_at(now, cooldown_secs));
            }
        }
        WorkflowEvent::DiscussionTrigger => {
            state.cooldown = None;
            match state.mode {
                WorkflowMode::Implementation => state.mode = WorkflowMode::Discussion,
                WorkflowMode::Plan => state.plan_prev_mode = Some(WorkflowMode::Discussion),
                WorkflowMode::Discussion => {}
            }
        }
        WorkflowEvent::PlanCompleted => {
            if state.mode == WorkflowMode::Implementation {
                state.plan.active.clear();
                state.cooldown = None;
                state.mode = WorkflowMode::Discussion;
            }
        }
        WorkflowEvent::EnterPlan => {
            if state.mode != WorkflowMode::Plan {
                state.plan_prev_mode = Some(state.mode);
                state.mode = WorkflowMode::Plan;
            }
            if state.plan.stashed.is_none() && !state.plan.active.is_empty() {
                state.plan.stashed = Some(std::mem::take(&mut state.plan.active));
            }
        }
        WorkflowEvent::ExitPlan => {
            if state.mode == WorkflowMode::Plan {
                let target = match state.plan_prev_mode.take() {
                    Some(WorkflowMode::Implementation) | Some(WorkflowMode::Plan) | None => {
                        WorkflowMode::Discussion
                    }
                    Some(mode) => mode,
                };
                if let Some(stashed) = state.plan.stashed.take() {
                    state.plan.active = stashed;
                }
                state.mode = target;
            }
        }
        WorkflowEvent::EmergencyStop => {
            leave_plan_mode(state);
            state.cooldown = None;
            state.mode = WorkflowMode::Discussion;
        }
        WorkflowEvent::PlanViolation => {
            state.plan.active.clear();
            leave_plan_mode(state);
            state.cooldown = None;
            state.mode = WorkflowMode::Discussion;
        }
    }

    TransitionSummary {
        event,
        from,
        to: state.mode,
        changed: *state != before,
    }
}

/// Drop Plan bookkeeping when leaving Plan mode by any route other than the
/// plan-exit tool. The stashed plan becomes active again.
fn leave_plan_mode(state: &mut SessionState) {
    if state.mode != WorkflowMode::Plan {
        return;
    }
    state.plan_prev_mode = None;
    if let Some(stashed) = state.plan.stashed.take() {
        state.plan.active = stashed;
    }
}

/// True when the active plan is non-empty and every step is completed.
pub fn plan_completed(state: &SessionState) -> bool {
    !state.plan.active.is_empty()
        && state
            .plan
            .active
            .iter()
            .all(|step| step.status == StepStatus::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{steps, steps_with};

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .expect("timestamp")
            .with_timezone(&Utc)
    }

    fn in_mode(mode: WorkflowMode) -> SessionState {
        SessionState {
            mode,
            ..SessionState::default()
        }
    }

    #[test]
    fn implementation_trigger_only_from_discussion() {
        let mut state = in_mode(WorkflowMode::Discussion);
        let summary = apply_event(&mut state, WorkflowEvent::ImplementationTrigger, now(), 0);
        assert_eq!(summary.to, WorkflowMode::Implementation);
        assert!(summary.changed);
        assert_eq!(state.cooldown, None);

        let mut plan = in_mode(WorkflowMode::Plan);
        let summary = apply_event(&mut plan, WorkflowEvent::ImplementationTrigger, now(), 0);
        assert!(!summary.changed);
        assert_eq!(plan.mode, WorkflowMode::Plan);
    }

    #[test]
    fn implementation_trigger_opens_cooldown_when_configured() {
        let mut state = in_mode(WorkflowMode::Discussion);
        apply_event(&mut state, WorkflowEvent::ImplementationTrigger, now(), 60);
        let window = state.cooldown.clone().expect("cooldown");
        assert_eq!(window.duration_secs, 60);
        assert!(state.cooldown_active(now()));

        apply_event(&mut state, WorkflowEvent::DiscussionTrigger, now(), 60);
        assert_eq!(state.mode, WorkflowMode::Discussion);
        assert_eq!(state.cooldown, None);
    }

    #[test]
    fn discussion_trigger_in_plan_rewrites_remembered_mode() {
        let mut state = in_mode(WorkflowMode::Implementation);
        apply_event(&mut state, WorkflowEvent::EnterPlan, now(), 0);
        apply_event(&mut state, WorkflowEvent::DiscussionTrigger, now(), 0);
        assert_eq!(state.mode, WorkflowMode::Plan);
        assert_eq!(state.plan_prev_mode, Some(WorkflowMode::Discussion));
    }

    #[test]
    fn plan_completed_returns_to_discussion_and_clears_plan() {
        let mut state = in_mode(WorkflowMode::Implementation);
        state.plan.active = steps_with(&[("a", StepStatus::Completed)]);
        assert!(plan_completed(&state));
        apply_event(&mut state, WorkflowEvent::PlanCompleted, now(), 0);
        assert_eq!(state.mode, WorkflowMode::Discussion);
        assert!(state.plan.active.is_empty());
    }

    #[test]
    fn plan_completed_requires_every_step_done() {
        let mut state = in_mode(WorkflowMode::Implementation);
        state.plan.active =
            steps_with(&[("a", StepStatus::Completed), ("b", StepStatus::InProgress)]);
        assert!(!plan_completed(&state));
        state.plan.active.clear();
        assert!(!plan_completed(&state));
    }

    #[test]
    fn plan_entry_twice_does_not_double_stash() {
        let mut state = in_mode(WorkflowMode::Implementation);
        state.plan.active = steps(&["a", "b"]);

        apply_event(&mut state, WorkflowEvent::EnterPlan, now(), 0);
        assert_eq!(state.plan.stashed, Some(steps(&["a", "b"])));
        assert!(state.plan.active.is_empty());

        state.plan.active = steps(&["draft"]);
        let summary = apply_event(&mut state, WorkflowEvent::EnterPlan, now(), 0);
        assert!(!summary.changed);
        assert_eq!(state.plan.stashed, Some(steps(&["a", "b"])));
        assert_eq!(state.plan_prev_mode, Some(WorkflowMode::Implementation));
    }

    #[test]
    fn plan_exit_restores_stash_and_collapses_to_discussion() {
        let mut state = in_mode(WorkflowMode::Implementation);
        state.plan.active = steps(&["a", "b"]);
        apply_event(&mut state, WorkflowEvent::EnterPlan, now(), 0);
        state.plan.active = steps(&["draft"]);

        apply_event(&mut state, WorkflowEvent::ExitPlan, now(), 0);
        assert_eq!(state.mode, WorkflowMode::Discussion);
        assert_eq!(state.plan.active, steps(&["a", "b"]));
        assert_eq!(state.plan.stashed, None);
        assert_eq!(state.plan_prev_mode, None);
    }

    #[test]
    fn plan_exit_outside_plan_is_noop() {
        let mut state = in_mode(WorkflowMode::Implementation);
        let summary = apply_event(&mut state, WorkflowEvent::ExitPlan, now(), 0);
        assert!(!summary.changed);
        assert_eq!(state.mode, WorkflowMode::Implementation);
    }

    #[test]
    fn emergency_stop_leaves_plan_cleanly() {
        let mut state = in_mode(WorkflowMode::Discussion);
        state.plan.active = steps(&["a"]);
        apply_event(&mut state, WorkflowEvent::EnterPlan, now(), 0);

        apply_event(&mut state, WorkflowEvent::EmergencyStop, now(), 0);
        assert_eq!(state.mode, WorkflowMode::Discussion);
        assert_eq!(state.plan.active, steps(&["a"]));
        assert_eq!(state.plan.stashed, None);
        assert_eq!(state.plan_prev_mode, None);
    }

    #[test]
    fn violation_clears_active_plan_and_forces_discussion() {
        let mut state = in_mode(WorkflowMode::Implementation);
        state.plan.active = steps(&["a", "b"]);
        apply_event(&mut state, WorkflowEvent::PlanViolation, now(), 0);
        assert_eq!(state.mode, WorkflowMode::Discussion);
        assert!(state.plan.active.is_empty());
    }
}
