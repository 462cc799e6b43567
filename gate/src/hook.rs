//! Hook request and response wire types.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::decision::BlockNotice;
use crate::exit_codes;

/// Session id used when the caller does not send one.
pub const DEFAULT_SESSION: &str = "default";

/// Tool request delivered on stdin for `pre-tool-use` and `post-tool-use`.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolRequest {
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: Value,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub hook_event_name: Option<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

impl ToolRequest {
    pub fn parse(input: &str) -> Result<Self> {
        serde_json::from_str(input).context("parse tool request")
    }

    pub fn session(&self) -> &str {
        self.session_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or(DEFAULT_SESSION)
    }

    /// Shell command for `Bash` requests.
    pub fn command(&self) -> Option<&str> {
        self.tool_input.get("command").and_then(Value::as_str)
    }

    /// Target file for editor tools.
    pub fn file_path(&self) -> Option<PathBuf> {
        ["file_path", "notebook_path", "path"]
            .iter()
            .find_map(|key| self.tool_input.get(key).and_then(Value::as_str))
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from)
    }
}

/// Operator prompt delivered on stdin for `user-prompt`.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptRequest {
    pub prompt: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl PromptRequest {
    pub fn parse(input: &str) -> Result<Self> {
        serde_json::from_str(input).context("parse prompt request")
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BlockPayload<'a> {
    hook_event_name: &'static str,
    hook_specific_output: BlockDetails<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BlockDetails<'a> {
    permission_decision_reason: &'a str,
    suggested_action: &'a str,
    current_mode: &'a str,
    blocked_tool: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContextPayload<'a> {
    hook_specific_output: ContextDetails<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContextDetails<'a> {
    hook_event_name: &'a str,
    additional_context: &'a str,
}

/// What the binary prints and how it exits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookOutcome {
    pub exit_code: i32,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

impl HookOutcome {
    pub fn proceed() -> Self {
        Self {
            exit_code: exit_codes::OK,
            stdout: None,
            stderr: None,
        }
    }

    /// Exit 2 with the structured payload on stdout and the readable
    /// message on stderr.
    pub fn blocked(notice: &BlockNotice) -> Result<Self> {
        let payload = BlockPayload {
            hook_event_name: "PreToolUse",
            hook_specific_output: BlockDetails {
                permission_decision_reason: &notice.reason,
                suggested_action: &notice.suggested_action,
                current_mode: notice.current_mode.as_str(),
                blocked_tool: &notice.blocked_tool,
            },
        };
        let stdout = serde_json::to_string(&payload).context("serialize block payload")?;
        let stderr = format!(
            "[DAIC: Tool Blocked] {}\n\n{}",
            notice.reason, notice.suggested_action
        );
        Ok(Self {
            exit_code: exit_codes::BLOCKED,
            stdout: Some(stdout),
            stderr: Some(stderr),
        })
    }

    /// Exit 0 with additional context for the agent.
    pub fn with_context(hook_event_name: &str, context: &str) -> Result<Self> {
        let payload = ContextPayload {
            hook_specific_output: ContextDetails {
                hook_event_name,
                additional_context: context,
            },
        };
        let stdout = serde_json::to_string(&payload).context("serialize context payload")?;
        Ok(Self {
            exit_code: exit_codes::OK,
            stdout: Some(stdout),
            stderr: None,
        })
    }
}
