//! `gate user-prompt`: trigger-phrase driven mode transitions.

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::core::workflow::{TransitionSummary, WorkflowEvent, apply_event};
use crate::gate::transition_events;
use crate::hook::{HookOutcome, PromptRequest};
use crate::io::config::GateConfig;
use crate::io::events::EventLog;
use crate::io::layout::GatePaths;
use crate::io::state_store::{load_state_or_default, write_state};
use crate::messages::Messages;

const HOOK_EVENT: &str = "UserPromptSubmit";

/// Apply the transition requested by an operator prompt, if any, and return
/// the context announcing it.
#[instrument(skip_all)]
pub fn run_user_prompt(
    paths: &GatePaths,
    config: &GateConfig,
    input: &str,
    now: DateTime<Utc>,
) -> Result<HookOutcome> {
    let request = PromptRequest::parse(input)?;
    let Some(event) = config.trigger_detector().detect(&request.prompt) else {
        debug!("no trigger phrase in prompt");
        return Ok(HookOutcome::proceed());
    };

    let summary = transition(paths, config, event, now);
    EventLog::new(&paths.events_path).record(&transition_events(&[summary.clone()]), now);

    if !summary.changed && event != WorkflowEvent::EmergencyStop {
        return Ok(HookOutcome::proceed());
    }
    match Messages::new().mode_context(event)? {
        Some(context) => HookOutcome::with_context(HOOK_EVENT, &context),
        None => Ok(HookOutcome::proceed()),
    }
}

fn transition(
    paths: &GatePaths,
    config: &GateConfig,
    event: WorkflowEvent,
    now: DateTime<Utc>,
) -> TransitionSummary {
    let mut state = load_state_or_default(&paths.state_path);
    let summary = apply_event(&mut state, event, now, config.features.cooldown_secs);
    if summary.changed {
        info!(event = event.as_str(), from = %summary.from, to = %summary.to, "mode transition");
        if let Err(err) = write_state(&paths.state_path, &state) {
            warn!(err = %format!("{err:#}"), "failed to persist mode transition");
        }
    }
    summary
}
