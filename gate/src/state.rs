//! Versioned session state document shared by every hook invocation.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::core::types::{PlanStep, WorkflowMode};

/// Current on-disk format version.
pub const STATE_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionState {
    pub version: u32,
    pub mode: WorkflowMode,
    pub current_task: TaskState,
    pub plan: PlanState,
    /// Mode remembered on Plan entry. Only set while `mode` is Plan.
    pub plan_prev_mode: Option<WorkflowMode>,
    pub cooldown: Option<CooldownWindow>,
    pub flags: SessionFlags,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            mode: WorkflowMode::Discussion,
            current_task: TaskState::default(),
            plan: PlanState::default(),
            plan_prev_mode: None,
            cooldown: None,
            flags: SessionFlags::default(),
        }
    }
}

impl SessionState {
    /// True when a cooldown window exists and has not expired at `now`.
    pub fn cooldown_active(&self, now: DateTime<Utc>) -> bool {
        self.cooldown
            .as_ref()
            .is_some_and(|window| window.is_active(now))
    }

    /// Repair Plan bookkeeping left behind outside Plan mode.
    ///
    /// Returns true when anything was changed.
    pub fn normalize(&mut self) -> bool {
        if self.mode == WorkflowMode::Plan {
            return false;
        }
        let mut changed = self.plan_prev_mode.take().is_some();
        if let Some(stashed) = self.plan.stashed.take() {
            if self.plan.active.is_empty() {
                self.plan.active = stashed;
            }
            changed = true;
        }
        changed
    }
}

/// The task the operator is currently working on.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskState {
    pub task_id: Option<String>,
    pub branch: Option<String>,
    /// Repositories (by directory name) declared as part of the task, in
    /// declaration order, without duplicates.
    #[serde(default)]
    pub submodules: Vec<String>,
}

impl TaskState {
    pub fn declare_submodule(&mut self, name: &str) {
        let name = name.trim();
        if name.is_empty() || self.submodules.iter().any(|existing| existing == name) {
            return;
        }
        self.submodules.push(name.to_string());
    }

    pub fn declares(&self, name: &str) -> bool {
        self.submodules.iter().any(|existing| existing == name)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanState {
    #[serde(default)]
    pub active: Vec<PlanStep>,
    /// Plan parked on Plan-mode entry, restored verbatim on exit.
    pub stashed: Option<Vec<PlanStep>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CooldownWindow {
    pub expires_at: DateTime<Utc>,
    pub duration_secs: u64,
}

impl CooldownWindow {
    pub fn starting_at(now: DateTime<Utc>, duration_secs: u64) -> Self {
        let secs = i64::try_from(duration_secs).unwrap_or(i64::MAX);
        let expires_at = Duration::try_seconds(secs)
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            expires_at,
            duration_secs,
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionFlags {
    /// Skip mode-based checks. Standing protections still apply.
    #[serde(default)]
    pub bypass_mode: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::steps;

    #[test]
    fn cooldown_expires() {
        let now = Utc::now();
        let window = CooldownWindow::starting_at(now, 30);
        assert!(window.is_active(now));
        assert!(!window.is_active(now + Duration::seconds(31)));
    }

    #[test]
    fn submodules_stay_unique_and_ordered() {
        let mut task = TaskState::default();
        task.declare_submodule("svcB");
        task.declare_submodule("svcA");
        task.declare_submodule("svcB");
        task.declare_submodule("  ");
        assert_eq!(task.submodules, vec!["svcB", "svcA"]);
        assert!(task.declares("svcA"));
    }

    #[test]
    fn normalize_restores_stash_outside_plan_mode() {
        let mut state = SessionState {
            mode: WorkflowMode::Discussion,
            plan_prev_mode: Some(WorkflowMode::Implementation),
            ..SessionState::default()
        };
        state.plan.stashed = Some(steps(&["a", "b"]));

        assert!(state.normalize());
        assert_eq!(state.plan_prev_mode, None);
        assert_eq!(state.plan.active, steps(&["a", "b"]));
        assert!(!state.normalize());
    }

    #[test]
    fn normalize_leaves_plan_mode_alone() {
        let mut state = SessionState {
            mode: WorkflowMode::Plan,
            plan_prev_mode: Some(WorkflowMode::Discussion),
            ..SessionState::default()
        };
        state.plan.stashed = Some(steps(&["a"]));
        assert!(!state.normalize());
        assert!(state.plan.stashed.is_some());
    }
}
