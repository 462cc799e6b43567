//! Admission control for a single tool request (`gate pre-tool-use`).
//!
//! Checks run in a fixed order and stop at the first block:
//!
//! 1. plan enter/exit tools (mode bookkeeping, nothing else applies)
//! 2. shell commands: protected state file, read-only fast path, mode gate
//! 3. editor tools in Discussion/Plan outside work-artifact directories
//! 4. todo updates against the agreed plan
//! 5. editor writes to the protected state file
//! 6. subagent boundary around the reserved state directory
//! 7. branch and task-scope consistency of the owning repository
//! 8. allow
//!
//! Every decision is audited: `tool_blocked` for blocks, `tool_allowed` with
//! the allow reason otherwise.

use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use crate::core::branch::check_branch;
use crate::core::classifier::CommandClassifier;
use crate::core::decision::{AdmissionDecision, AllowReason, BlockKind, BlockNotice, SideEffect};
use crate::core::paths::is_work_artifact;
use crate::core::plan_guard::{PlanCheck, check_update, parse_todos};
use crate::core::types::{CommandKind, ToolKind, WorkflowMode};
use crate::core::workflow::{TransitionSummary, WorkflowEvent, apply_event};
use crate::hook::{HookOutcome, ToolRequest};
use crate::io::config::GateConfig;
use crate::io::events::{AuditEvent, EventLog};
use crate::io::git::{BranchProbe, RepoLookup, observe_repo};
use crate::io::layout::{GatePaths, STATE_FILE_NAME};
use crate::io::state_store::{load_state_or_default, write_state};
use crate::io::subagent::{SubagentRegistry, load_registry, update_registry};
use crate::messages::{BlockText, Messages};
use crate::state::SessionState;

/// Label used in messages for the reserved state directory.
const RESERVED_STATE_LABEL: &str = ".claude/state";

/// Decision for one request plus the audit events it produced.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub decision: AdmissionDecision,
    pub events: Vec<AuditEvent>,
}

/// Composes the guards for one project.
pub struct AdmissionGate<'a, P: BranchProbe> {
    paths: &'a GatePaths,
    config: &'a GateConfig,
    probe: &'a P,
    classifier: CommandClassifier,
    messages: Messages,
}

/// Per-request inputs shared by the individual checks.
struct Request<'r> {
    tool: &'r str,
    session: &'r str,
    mode: WorkflowMode,
    now: DateTime<Utc>,
}

impl<'a, P: BranchProbe> AdmissionGate<'a, P> {
    pub fn new(paths: &'a GatePaths, config: &'a GateConfig, probe: &'a P) -> Self {
        Self {
            paths,
            config,
            probe,
            classifier: CommandClassifier::new(config.command_policy()),
            messages: Messages::new(),
        }
    }

    /// Decide `request` against `state`. Pure apart from the git branch query;
    /// the caller persists side effects and audit events.
    pub fn evaluate(
        &self,
        state: &SessionState,
        subagents: &SubagentRegistry,
        request: &ToolRequest,
        now: DateTime<Utc>,
    ) -> Result<Evaluation> {
        let mut events = Vec::new();
        let decision = self.decide(state, subagents, request, now, &mut events)?;
        match &decision {
            AdmissionDecision::Block { notice, .. } => {
                debug!(tool = %request.tool_name, kind = ?notice.kind, "request blocked");
                events.push(
                    AuditEvent::new("tool_blocked")
                        .with("tool", &notice.blocked_tool)
                        .with("mode", notice.current_mode)
                        .with("kind", notice.kind)
                        .with("reason", &notice.reason),
                );
            }
            AdmissionDecision::Allow { reason }
            | AdmissionDecision::AllowWithSideEffect { reason, .. } => {
                debug!(tool = %request.tool_name, ?reason, "request allowed");
                events.push(
                    AuditEvent::new("tool_allowed")
                        .with("tool", &request.tool_name)
                        .with("mode", state.mode)
                        .with("reason", reason),
                );
            }
        }
        Ok(Evaluation { decision, events })
    }

    fn decide(
        &self,
        state: &SessionState,
        subagents: &SubagentRegistry,
        request: &ToolRequest,
        now: DateTime<Utc>,
        events: &mut Vec<AuditEvent>,
    ) -> Result<AdmissionDecision> {
        let kind = ToolKind::from_name(
            &request.tool_name,
            &self.config.blocked_actions.implementation_only_tools,
        );
        let bypass = state.flags.bypass_mode;
        let restricted = state.mode.restricts_mutation() && !bypass && !state.cooldown_active(now);
        let req = Request {
            tool: &request.tool_name,
            session: request.session(),
            mode: state.mode,
            now,
        };

        if matches!(kind, ToolKind::PlanEnter | ToolKind::PlanExit) {
            if bypass {
                return Ok(AdmissionDecision::allow(AllowReason::PlanBoundary));
            }
            let event = if kind == ToolKind::PlanEnter {
                WorkflowEvent::EnterPlan
            } else {
                WorkflowEvent::ExitPlan
            };
            return Ok(AdmissionDecision::allow_with(
                AllowReason::PlanBoundary,
                vec![SideEffect::Transition(event)],
            ));
        }

        if kind == ToolKind::Shell {
            let command = request.command().unwrap_or_default();
            if let Some(decision) = self.check_shell(command, restricted, subagents, &req)? {
                return Ok(decision);
            }
        }

        let target = match kind {
            ToolKind::FileEdit => request.file_path().map(|raw| self.paths.resolve(&raw)),
            _ => None,
        };

        if kind == ToolKind::FileEdit && restricted && !self.is_artifact(target.as_deref()) {
            let text = self.messages.mode_tool(
                req.mode,
                req.tool,
                &self.config.work_artifacts.directories,
                &self.config.trigger_phrases.implementation_mode,
            )?;
            return Ok(block(BlockKind::ModeRestriction, text, &req));
        }

        let mut effects = Vec::new();
        if kind == ToolKind::PlanUpdate && !bypass {
            let incoming = match parse_todos(&request.tool_input) {
                Ok(steps) => steps,
                Err(err) => {
                    let text = self.messages.invalid_plan(&err)?;
                    return Ok(block(BlockKind::InvalidPlan, text, &req));
                }
            };
            match check_update(&state.plan.active, &incoming) {
                PlanCheck::Adopt | PlanCheck::Consistent => {
                    effects.push(SideEffect::StorePlan(incoming));
                }
                PlanCheck::Violation(drift) => {
                    events.push(
                        AuditEvent::new("plan_violation")
                            .with("step", drift.index + 1)
                            .with("expected", &drift.expected)
                            .with("received", &drift.received),
                    );
                    let text = self.messages.plan_violation(&drift)?;
                    return Ok(block(BlockKind::PlanViolation, text, &req)
                        .with_effect(SideEffect::Transition(WorkflowEvent::PlanViolation)));
                }
            }
        }

        if let Some(target) = target.as_deref() {
            if target == self.paths.state_path {
                let text = self.messages.state_file(&state_file_label())?;
                return Ok(block(BlockKind::StateFileProtected, text, &req));
            }

            let reserved = self.paths.resolve(&self.paths.reserved_state_dir);
            if subagents.blocks_write(req.session, target, &reserved, now) {
                let text = self.messages.subagent_boundary(RESERVED_STATE_LABEL)?;
                return Ok(block(BlockKind::SubagentBoundary, text, &req));
            }

            if let Some(decision) = self.check_repo_branch(state, target, &req, events)? {
                return Ok(decision);
            }
        }

        if kind == ToolKind::Delegate {
            effects.push(SideEffect::EnterSubagent);
        }
        Ok(AdmissionDecision::allow_with(AllowReason::Permitted, effects))
    }

    /// Shell rules. `None` means the command continues to the general checks.
    fn check_shell(
        &self,
        command: &str,
        restricted: bool,
        subagents: &SubagentRegistry,
        req: &Request<'_>,
    ) -> Result<Option<AdmissionDecision>> {
        if self
            .classifier
            .touches_protected_file(command, STATE_FILE_NAME)
        {
            let text = self.messages.state_file(&state_file_label())?;
            return Ok(Some(block(BlockKind::StateFileProtected, text, req)));
        }

        let kind = self.classifier.classify(command);
        debug!(%kind, "shell command classified");
        if kind == CommandKind::ReadOnly {
            return Ok(Some(AdmissionDecision::allow(AllowReason::ReadOnlyCommand)));
        }

        if restricted {
            if self.is_state_command(command) {
                return Ok(Some(AdmissionDecision::allow(AllowReason::StateCommand)));
            }
            let text = self
                .messages
                .mode_shell(req.mode, &self.config.trigger_phrases.implementation_mode)?;
            return Ok(Some(block(BlockKind::ModeRestriction, text, req)));
        }

        if subagents.is_active(req.session, req.now) && command.contains(RESERVED_STATE_LABEL) {
            let text = self.messages.subagent_boundary(RESERVED_STATE_LABEL)?;
            return Ok(Some(block(BlockKind::SubagentBoundary, text, req)));
        }
        Ok(None)
    }

    fn check_repo_branch(
        &self,
        state: &SessionState,
        target: &Path,
        req: &Request<'_>,
        events: &mut Vec<AuditEvent>,
    ) -> Result<Option<AdmissionDecision>> {
        if !self.config.features.branch_enforcement {
            return Ok(None);
        }
        let Some(expected) = state.current_task.branch.as_deref() else {
            return Ok(None);
        };
        let observation = match observe_repo(&self.paths.root, target, self.probe) {
            RepoLookup::Observed(observation) => observation,
            RepoLookup::NoRepo | RepoLookup::Unavailable { .. } => return Ok(None),
        };

        let finding = check_branch(&state.current_task, expected, &observation);
        let Some(event_type) = finding.outcome.event_type() else {
            return Ok(None);
        };
        let file = self
            .paths
            .relative(target)
            .unwrap_or_else(|| target.to_path_buf());
        events.push(
            AuditEvent::new(event_type)
                .with("repo", &finding.repo)
                .with("expected", &finding.expected)
                .with("actual", &finding.actual)
                .with("file", file.display().to_string()),
        );
        let text = self.messages.branch(&finding)?;
        Ok(Some(block(BlockKind::Branch(finding.outcome), text, req)))
    }

    fn is_artifact(&self, target: Option<&Path>) -> bool {
        let Some(rel) = target.and_then(|target| self.paths.relative(target)) else {
            return false;
        };
        is_work_artifact(&rel, &self.config.work_artifacts.directories)
    }

    /// True when every segment of `command` is either a whitelisted state
    /// command or read-only on its own. Redirections and substitutions never
    /// qualify.
    fn is_state_command(&self, command: &str) -> bool {
        let kind = self
            .classifier
            .classify_exempting(command, |words| self.is_state_words(words));
        kind.is_read_only()
    }

    fn is_state_words(&self, words: &[String]) -> bool {
        self.config
            .blocked_actions
            .allowed_state_commands
            .iter()
            .map(|prefix| prefix.split_whitespace().collect::<Vec<_>>())
            .filter(|prefix| !prefix.is_empty())
            .any(|prefix| {
                words.len() >= prefix.len()
                    && prefix.iter().zip(words).all(|(want, word)| *want == word.as_str())
            })
    }
}

fn block(kind: BlockKind, text: BlockText, req: &Request<'_>) -> AdmissionDecision {
    AdmissionDecision::block(BlockNotice {
        kind,
        reason: text.reason,
        suggested_action: text.remediation,
        current_mode: req.mode,
        blocked_tool: req.tool.to_string(),
    })
}

fn state_file_label() -> String {
    format!("sessions/{STATE_FILE_NAME}")
}

/// Apply state side effects and report the transitions that ran.
///
/// `EnterSubagent` is not a session-state change and is ignored here.
pub fn apply_state_effects(
    state: &mut SessionState,
    effects: &[SideEffect],
    now: DateTime<Utc>,
    cooldown_secs: u64,
) -> Vec<TransitionSummary> {
    let mut transitions = Vec::new();
    for effect in effects {
        match effect {
            SideEffect::Transition(event) => {
                transitions.push(apply_event(state, *event, now, cooldown_secs));
            }
            SideEffect::StorePlan(steps) => state.plan.active = steps.clone(),
            SideEffect::EnterSubagent => {}
        }
    }
    transitions
}

/// Audit events for transitions that changed something.
pub fn transition_events(transitions: &[TransitionSummary]) -> Vec<AuditEvent> {
    transitions
        .iter()
        .filter(|summary| summary.changed)
        .map(|summary| {
            AuditEvent::new("daic_transition")
                .with("event", summary.event)
                .with("from", summary.from)
                .with("to", summary.to)
        })
        .collect()
}

/// `gate pre-tool-use`: decide one request read from `input`.
///
/// A malformed request is an error. Failing to persist side effects or audit
/// events is logged and never changes the decision.
#[instrument(skip_all)]
pub fn run_pre_tool_use<P: BranchProbe>(
    paths: &GatePaths,
    config: &GateConfig,
    probe: &P,
    input: &str,
    now: DateTime<Utc>,
) -> Result<HookOutcome> {
    let request = ToolRequest::parse(input)?;
    let state = load_state_or_default(&paths.state_path);
    let subagents = load_registry(&paths.subagents_path);

    let gate = AdmissionGate::new(paths, config, probe);
    let Evaluation {
        decision,
        mut events,
    } = gate.evaluate(&state, &subagents, &request, now)?;

    let mut next = state.clone();
    let transitions = apply_state_effects(
        &mut next,
        decision.effects(),
        now,
        config.features.cooldown_secs,
    );
    events.extend(transition_events(&transitions));
    if next != state
        && let Err(err) = write_state(&paths.state_path, &next)
    {
        warn!(err = %format!("{err:#}"), "failed to persist state side effects");
    }

    if decision.effects().contains(&SideEffect::EnterSubagent) {
        let session = request.session().to_string();
        let ttl = config.subagent.ttl_secs;
        match update_registry(&paths.subagents_path, |registry| {
            registry.enter(&session, now, ttl)
        }) {
            Ok(depth) => debug!(session = %session, depth, "subagent entered"),
            Err(err) => warn!(err = %format!("{err:#}"), "failed to record subagent entry"),
        }
    }

    EventLog::new(&paths.events_path).record(&events, now);

    match decision.notice() {
        Some(notice) => HookOutcome::blocked(notice),
        None => Ok(HookOutcome::proceed()),
    }
}
