//! Operator-facing block and mode messages rendered from templates.
//!
//! Each template renders into `<!-- section:KEY -->` delimited sections; block
//! templates carry `reason` and `remediation`, mode templates carry `context`.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use minijinja::{Environment, Value, context};
use regex::Regex;

use crate::core::branch::BranchFinding;
use crate::core::plan_guard::PlanDrift;
use crate::core::types::WorkflowMode;
use crate::core::workflow::WorkflowEvent;

const TEMPLATES: &[(&str, &str)] = &[
    ("mode_shell", include_str!("messages/mode_shell.md")),
    ("mode_tool", include_str!("messages/mode_tool.md")),
    ("plan_violation", include_str!("messages/plan_violation.md")),
    ("invalid_plan", include_str!("messages/invalid_plan.md")),
    ("state_file", include_str!("messages/state_file.md")),
    ("subagent_boundary", include_str!("messages/subagent_boundary.md")),
    ("branch", include_str!("messages/branch.md")),
    ("mode_context", include_str!("messages/mode_context.md")),
    ("post_tool", include_str!("messages/post_tool.md")),
];

static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!--\s*section:(\w+)\s*-->").expect("valid section marker pattern")
});

/// Reason and remediation for a blocked request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockText {
    pub reason: String,
    pub remediation: String,
}

/// Template engine wrapper around minijinja.
pub struct Messages {
    env: Environment<'static>,
}

impl Default for Messages {
    fn default() -> Self {
        Self::new()
    }
}

impl Messages {
    pub fn new() -> Self {
        let mut env = Environment::new();
        for &(name, source) in TEMPLATES {
            env.add_template(name, source)
                .expect("message template should be valid");
        }
        Self { env }
    }

    pub fn mode_shell(&self, mode: WorkflowMode, phrases: &[String]) -> Result<BlockText> {
        self.block(
            "mode_shell",
            context! { mode => mode.label(), phrases => phrases },
        )
    }

    pub fn mode_tool(
        &self,
        mode: WorkflowMode,
        tool: &str,
        directories: &[String],
        phrases: &[String],
    ) -> Result<BlockText> {
        self.block(
            "mode_tool",
            context! {
                mode => mode.label(),
                tool => tool,
                directories => directories,
                phrases => phrases,
            },
        )
    }

    pub fn plan_violation(&self, drift: &PlanDrift) -> Result<BlockText> {
        self.block(
            "plan_violation",
            context! {
                step => drift.index + 1,
                expected => drift.expected.as_deref().unwrap_or("(none)"),
                received => drift.received.as_deref().unwrap_or("(none)"),
            },
        )
    }

    pub fn invalid_plan(&self, error: &str) -> Result<BlockText> {
        self.block("invalid_plan", context! { error => error })
    }

    pub fn state_file(&self, file: &str) -> Result<BlockText> {
        self.block("state_file", context! { file => file })
    }

    pub fn subagent_boundary(&self, dir: &str) -> Result<BlockText> {
        self.block("subagent_boundary", context! { dir => dir })
    }

    pub fn branch(&self, finding: &BranchFinding) -> Result<BlockText> {
        self.block("branch", Value::from_serialize(finding))
    }

    /// Context injected after a mode transition; `None` for events without one.
    pub fn mode_context(&self, event: WorkflowEvent) -> Result<Option<String>> {
        let rendered = self.render("mode_context", context! { event => event.as_str() })?;
        Ok(section(&rendered, "context").filter(|text| !text.is_empty()))
    }

    /// Reminder shown after an editor tool ran in Implementation mode.
    pub fn edit_reminder(&self) -> Result<String> {
        self.post_tool(context! { notice => "edit_reminder" })
    }

    /// Working directory echoed after a shell command changed it.
    pub fn cwd_notice(&self, cwd: &Path) -> Result<String> {
        self.post_tool(context! { notice => "cwd", cwd => cwd.display().to_string() })
    }

    fn post_tool(&self, ctx: Value) -> Result<String> {
        let rendered = self.render("post_tool", ctx)?;
        section(&rendered, "context")
            .ok_or_else(|| anyhow!("template post_tool has no context section"))
    }

    fn block(&self, name: &str, ctx: Value) -> Result<BlockText> {
        let rendered = self.render(name, ctx)?;
        let reason = section(&rendered, "reason")
            .ok_or_else(|| anyhow!("template {name} has no reason section"))?;
        let remediation = section(&rendered, "remediation")
            .ok_or_else(|| anyhow!("template {name} has no remediation section"))?;
        Ok(BlockText {
            reason,
            remediation,
        })
    }

    fn render(&self, name: &str, ctx: Value) -> Result<String> {
        let template = self.env.get_template(name)?;
        template
            .render(ctx)
            .with_context(|| format!("render message template {name}"))
    }
}

/// Trimmed body of section `key`, up to the next marker.
fn section(rendered: &str, key: &str) -> Option<String> {
    let markers: Vec<_> = SECTION_RE.captures_iter(rendered).collect();
    markers.iter().enumerate().find_map(|(idx, caps)| {
        if caps.get(1)?.as_str() != key {
            return None;
        }
        let start = caps.get(0)?.end();
        let end = markers
            .get(idx + 1)
            .and_then(|next| next.get(0))
            .map_or(rendered.len(), |next| next.start());
        Some(rendered[start..end].trim().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::BranchCheckOutcome;

    fn phrases() -> Vec<String> {
        vec!["make it so".to_string(), "go ahead".to_string()]
    }

    #[test]
    fn mode_shell_names_mode_and_phrases() {
        let text = Messages::new()
            .mode_shell(WorkflowMode::Discussion, &phrases())
            .expect("render");
        assert_eq!(
            text.reason,
            "Write-like bash command blocked in Discussion mode. Only the user can activate implementation mode."
        );
        assert!(text.remediation.contains("make it so, go ahead"));
    }

    #[test]
    fn mode_tool_lists_artifact_directories() {
        let dirs = vec!["sessions/".to_string(), "docs/".to_string()];
        let text = Messages::new()
            .mode_tool(WorkflowMode::Plan, "Edit", &dirs, &phrases())
            .expect("render");
        assert_eq!(
            text.reason,
            "You're in Plan mode. The Edit tool is blocked for code changes."
        );
        assert!(text.remediation.contains("sessions/, docs/"));
    }

    #[test]
    fn post_tool_notices() {
        let messages = Messages::new();
        assert_eq!(
            messages.edit_reminder().expect("render"),
            "[DAIC Reminder] When you're done implementing, run: gate mode discussion"
        );
        assert_eq!(
            messages.cwd_notice(Path::new("/work/app/src")).expect("render"),
            "[CWD: /work/app/src]"
        );
    }

    #[test]
    fn plan_violation_shows_first_drift() {
        let drift = PlanDrift {
            index: 1,
            expected: Some("b".to_string()),
            received: None,
        };
        let text = Messages::new().plan_violation(&drift).expect("render");
        assert!(text.reason.contains("Step 2 was 'b', received '(none)'"));
        assert!(text.remediation.starts_with("Previous todos cleared"));
    }

    #[test]
    fn branch_messages_cover_each_outcome() {
        let messages = Messages::new();
        let mut finding = BranchFinding {
            outcome: BranchCheckOutcome::WrongBranch,
            repo: "svcA".to_string(),
            repo_path: "services/svcA".to_string(),
            expected: "feature/x".to_string(),
            actual: "main".to_string(),
        };
        let text = messages.branch(&finding).expect("render");
        assert_eq!(
            text.remediation,
            "Please run: cd services/svcA && git checkout feature/x"
        );

        finding.outcome = BranchCheckOutcome::NotDeclaredInTask;
        let text = messages.branch(&finding).expect("render");
        assert!(text.reason.contains("not listed in the task's submodules"));
        assert!(text.remediation.contains("gate task add svcA"));

        finding.outcome = BranchCheckOutcome::WrongBranchAndNotDeclared;
        let text = messages.branch(&finding).expect("render");
        assert!(text.remediation.contains("git checkout -b feature/x"));
        assert!(text.remediation.contains("gate task add svcA"));
    }

    #[test]
    fn mode_context_only_for_announced_events() {
        let messages = Messages::new();
        let text = messages
            .mode_context(WorkflowEvent::ImplementationTrigger)
            .expect("render")
            .expect("context");
        assert!(text.contains("Implementation Mode Activated"));
        let stop = messages
            .mode_context(WorkflowEvent::EmergencyStop)
            .expect("render")
            .expect("context");
        assert!(stop.contains("EMERGENCY STOP"));
        assert_eq!(
            messages.mode_context(WorkflowEvent::EnterPlan).expect("render"),
            None
        );
    }

    #[test]
    fn every_template_parses() {
        let messages = Messages::new();
        assert!(messages.state_file("sessions/sessions-state.json").is_ok());
        assert!(messages.subagent_boundary(".claude/state").is_ok());
        assert!(messages.invalid_plan("missing `todos`").is_ok());
    }
}
