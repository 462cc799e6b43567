//! Agreed-plan consistency checks for todo list updates.

use serde_json::Value;

use crate::core::types::PlanStep;

/// Result of comparing an incoming todo list against the active plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanCheck {
    /// No active plan; the incoming list becomes the agreed plan.
    Adopt,
    /// Same ordered contents; statuses may have changed.
    Consistent,
    /// Contents drifted from the agreed plan.
    Violation(PlanDrift),
}

/// Where the incoming list first diverges from the agreed one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanDrift {
    pub index: usize,
    pub expected: Option<String>,
    pub received: Option<String>,
}

/// Compare `incoming` against `active` by ordered `content`.
pub fn check_update(active: &[PlanStep], incoming: &[PlanStep]) -> PlanCheck {
    if active.is_empty() {
        return PlanCheck::Adopt;
    }

    let len = active.len().max(incoming.len());
    for index in 0..len {
        let expected = active.get(index).map(|step| step.content.as_str());
        let received = incoming.get(index).map(|step| step.content.as_str());
        if expected != received {
            return PlanCheck::Violation(PlanDrift {
                index,
                expected: expected.map(str::to_string),
                received: received.map(str::to_string),
            });
        }
    }
    PlanCheck::Consistent
}

/// Parse `tool_input.todos` into plan steps.
///
/// Returns a short description of the first problem for malformed input.
pub fn parse_todos(tool_input: &Value) -> Result<Vec<PlanStep>, String> {
    let todos = tool_input
        .get("todos")
        .ok_or_else(|| "missing `todos`".to_string())?;
    let items = todos
        .as_array()
        .ok_or_else(|| "`todos` must be an array".to_string())?;

    items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let step: PlanStep = serde_json::from_value(item.clone())
                .map_err(|err| format!("todo {idx}: {err}"))?;
            if step.content.trim().is_empty() {
                return Err(format!("todo {idx}: empty content"));
            }
            Ok(step)
        })
        .collect()
}
