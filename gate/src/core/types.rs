//! Shared deterministic types for gate core logic.
//!
//! These types define stable contracts between core components and the
//! persisted session state. They must not depend on I/O.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Workflow mode controlling whether mutating operations are permitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowMode {
    /// Investigate and align with the operator; no code changes.
    #[default]
    Discussion,
    /// Execute the agreed plan.
    Implementation,
    /// Nested planning mode entered through the planning tool.
    Plan,
}

impl WorkflowMode {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowMode::Discussion => "discussion",
            WorkflowMode::Implementation => "implementation",
            WorkflowMode::Plan => "plan",
        }
    }

    /// Title-case name used in operator-facing messages.
    pub fn label(self) -> &'static str {
        match self {
            WorkflowMode::Discussion => "Discussion",
            WorkflowMode::Implementation => "Implementation",
            WorkflowMode::Plan => "Plan",
        }
    }

    /// True for the modes in which mutating tools are restricted.
    pub fn restricts_mutation(self) -> bool {
        matches!(self, WorkflowMode::Discussion | WorkflowMode::Plan)
    }
}

impl fmt::Display for WorkflowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one planned step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

/// One entry of an agreed execution plan (a todo).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub content: String,
    #[serde(default)]
    pub status: StepStatus,
}

impl PlanStep {
    pub fn new(content: impl Into<String>, status: StepStatus) -> Self {
        Self {
            content: content.into(),
            status,
        }
    }
}

/// Result of classifying a shell command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    ReadOnly,
    Mutating,
}

impl CommandKind {
    pub fn is_read_only(self) -> bool {
        self == CommandKind::ReadOnly
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::ReadOnly => f.write_str("read-only"),
            CommandKind::Mutating => f.write_str("mutating"),
        }
    }
}

/// Four-way outcome of the branch/scope consistency check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchCheckOutcome {
    Consistent,
    WrongBranch,
    NotDeclaredInTask,
    WrongBranchAndNotDeclared,
}

impl BranchCheckOutcome {
    /// Combine scope membership and branch equality into an outcome.
    pub fn from_flags(declared_in_task: bool, branch_matches: bool) -> Self {
        match (declared_in_task, branch_matches) {
            (true, true) => BranchCheckOutcome::Consistent,
            (true, false) => BranchCheckOutcome::WrongBranch,
            (false, true) => BranchCheckOutcome::NotDeclaredInTask,
            (false, false) => BranchCheckOutcome::WrongBranchAndNotDeclared,
        }
    }

    /// Audit event type recorded for a non-consistent outcome.
    pub fn event_type(self) -> Option<&'static str> {
        match self {
            BranchCheckOutcome::Consistent => None,
            BranchCheckOutcome::WrongBranch => Some("branch_mismatch"),
            BranchCheckOutcome::NotDeclaredInTask => Some("service_not_in_task"),
            BranchCheckOutcome::WrongBranchAndNotDeclared => {
                Some("service_not_in_task_and_wrong_branch")
            }
        }
    }
}

/// Tool category as far as admission control is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// Shell execution (`Bash`).
    Shell,
    /// File-mutating editor tool (`Write`, `Edit`, `MultiEdit`, ...).
    FileEdit,
    /// Todo/plan update (`TodoWrite`).
    PlanUpdate,
    /// Delegation to a sub-task (`Task`).
    Delegate,
    /// Planning tool entry.
    PlanEnter,
    /// Planning tool exit.
    PlanExit,
    /// Anything else (reads, searches, web access).
    Other,
}

impl ToolKind {
    /// Categorize `name`; `file_edit_tools` is the configured list of
    /// implementation-only editor tools.
    pub fn from_name(name: &str, file_edit_tools: &[String]) -> Self {
        match name {
            "Bash" => ToolKind::Shell,
            "TodoWrite" => ToolKind::PlanUpdate,
            "Task" => ToolKind::Delegate,
            "EnterPlanMode" | "Plan" => ToolKind::PlanEnter,
            "ExitPlanMode" => ToolKind::PlanExit,
            other if file_edit_tools.iter().any(|tool| tool == other) => ToolKind::FileEdit,
            _ => ToolKind::Other,
        }
    }
}
