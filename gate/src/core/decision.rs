//! Admission decisions produced by the gate for one tool request.

use serde::Serialize;

use crate::core::types::{BranchCheckOutcome, PlanStep, WorkflowMode};
use crate::core::workflow::WorkflowEvent;

/// State change the caller must persist after deciding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    Transition(WorkflowEvent),
    /// Replace the active plan with these steps.
    StorePlan(Vec<PlanStep>),
    /// Record delegation start for the requesting session.
    EnterSubagent,
}

/// Why a request was allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowReason {
    PlanBoundary,
    ReadOnlyCommand,
    StateCommand,
    Permitted,
}

/// Which rule blocked a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    ModeRestriction,
    InvalidPlan,
    PlanViolation,
    StateFileProtected,
    SubagentBoundary,
    Branch(BranchCheckOutcome),
}

/// Operator-facing description of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockNotice {
    pub kind: BlockKind,
    pub reason: String,
    pub suggested_action: String,
    pub current_mode: WorkflowMode,
    pub blocked_tool: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionDecision {
    Allow {
        reason: AllowReason,
    },
    AllowWithSideEffect {
        reason: AllowReason,
        effects: Vec<SideEffect>,
    },
    /// Blocks may still reset state (plan violation).
    Block {
        notice: BlockNotice,
        effects: Vec<SideEffect>,
    },
}

impl AdmissionDecision {
    pub fn allow(reason: AllowReason) -> Self {
        AdmissionDecision::Allow { reason }
    }

    pub fn allow_with(reason: AllowReason, effects: Vec<SideEffect>) -> Self {
        if effects.is_empty() {
            return AdmissionDecision::Allow { reason };
        }
        AdmissionDecision::AllowWithSideEffect { reason, effects }
    }

    pub fn block(notice: BlockNotice) -> Self {
        AdmissionDecision::Block {
            notice,
            effects: Vec::new(),
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, AdmissionDecision::Block { .. })
    }

    pub fn notice(&self) -> Option<&BlockNotice> {
        match self {
            AdmissionDecision::Block { notice, .. } => Some(notice),
            _ => None,
        }
    }

    pub fn effects(&self) -> &[SideEffect] {
        match self {
            AdmissionDecision::Allow { .. } => &[],
            AdmissionDecision::AllowWithSideEffect { effects, .. }
            | AdmissionDecision::Block { effects, .. } => effects,
        }
    }

    /// Attach an extra side effect, upgrading a plain allow.
    pub fn with_effect(self, effect: SideEffect) -> Self {
        match self {
            AdmissionDecision::Allow { reason } => AdmissionDecision::AllowWithSideEffect {
                reason,
                effects: vec![effect],
            },
            AdmissionDecision::AllowWithSideEffect {
                reason,
                mut effects,
            } => {
                effects.push(effect);
                AdmissionDecision::AllowWithSideEffect { reason, effects }
            }
            AdmissionDecision::Block {
                notice,
                mut effects,
            } => {
                effects.push(effect);
                AdmissionDecision::Block { notice, effects }
            }
        }
    }
}
