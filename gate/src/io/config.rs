//! Gate configuration stored under `sessions/sessions-config.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::classifier::CommandPolicy;
use crate::core::triggers::{PhraseSets, TriggerDetector};

/// Gate configuration (TOML).
///
/// Edited by humans and by `gate config`. Missing fields take the defaults
/// below; a broken file never blocks a tool call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GateConfig {
    pub trigger_phrases: TriggerPhrases,
    pub blocked_actions: BlockedActions,
    pub features: Features,
    pub work_artifacts: WorkArtifacts,
    pub subagent: SubagentConfig,
    pub git: GitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TriggerPhrases {
    /// Case-insensitive phrases that move Discussion to Implementation.
    pub implementation_mode: Vec<String>,
    /// Case-sensitive phrases that return to Discussion.
    pub discussion_mode: Vec<String>,
    /// Case-sensitive phrases that force Discussion from any mode.
    pub emergency_stop: Vec<String>,
}

impl Default for TriggerPhrases {
    fn default() -> Self {
        Self {
            implementation_mode: strings(&["make it so", "run that", "go ahead", "yert"]),
            discussion_mode: strings(&["SILENCE"]),
            emergency_stop: strings(&["STOP"]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BlockedActions {
    /// Editor tools that may only mutate files in Implementation mode.
    pub implementation_only_tools: Vec<String>,
    /// Extra shell command names treated as read-only.
    pub bash_read_patterns: Vec<String>,
    /// Extra shell command names treated as mutating.
    pub bash_write_patterns: Vec<String>,
    /// Unknown commands count as mutating.
    pub extrasafe: bool,
    /// Command prefixes that inspect gate state and are allowed in every mode.
    pub allowed_state_commands: Vec<String>,
}

impl Default for BlockedActions {
    fn default() -> Self {
        Self {
            implementation_only_tools: strings(&["Edit", "Write", "MultiEdit", "NotebookEdit"]),
            bash_read_patterns: Vec::new(),
            bash_write_patterns: Vec::new(),
            extrasafe: true,
            allowed_state_commands: strings(&[
                "gate state",
                "gate mode",
                "gate classify",
                "gate config show",
            ]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Features {
    pub branch_enforcement: bool,
    /// Return to Discussion once every active plan step is completed.
    pub auto_return_to_discussion: bool,
    /// Seconds after an implementation trigger during which mode checks are
    /// relaxed. Zero disables the window.
    pub cooldown_secs: u64,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            branch_enforcement: true,
            auto_return_to_discussion: true,
            cooldown_secs: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkArtifacts {
    /// Project-relative directories editable in every mode.
    pub directories: Vec<String>,
}

impl Default for WorkArtifacts {
    fn default() -> Self {
        Self {
            directories: strings(&["sessions/", ".claude/", "docs/", "plans/", "notes/", "logs/"]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SubagentConfig {
    pub ttl_secs: u64,
}

impl Default for SubagentConfig {
    fn default() -> Self {
        Self { ttl_secs: 30 * 60 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GitConfig {
    pub branch_timeout_ms: u64,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            branch_timeout_ms: 2000,
        }
    }
}

impl GateConfig {
    pub fn validate(&self) -> Result<()> {
        if self.subagent.ttl_secs == 0 {
            return Err(anyhow!("subagent.ttl_secs must be > 0"));
        }
        if self.git.branch_timeout_ms == 0 {
            return Err(anyhow!("git.branch_timeout_ms must be > 0"));
        }
        if self
            .work_artifacts
            .directories
            .iter()
            .any(|dir| dir.trim().trim_end_matches('/').is_empty())
        {
            return Err(anyhow!("work_artifacts.directories must not contain empty entries"));
        }
        if self
            .work_artifacts
            .directories
            .iter()
            .any(|dir| dir.starts_with('/') || dir.split('/').any(|part| part == ".."))
        {
            return Err(anyhow!(
                "work_artifacts.directories must be project-relative without '..'"
            ));
        }
        Ok(())
    }

    pub fn command_policy(&self) -> CommandPolicy {
        CommandPolicy {
            read_patterns: self.blocked_actions.bash_read_patterns.clone(),
            write_patterns: self.blocked_actions.bash_write_patterns.clone(),
            extrasafe: self.blocked_actions.extrasafe,
        }
    }

    pub fn trigger_detector(&self) -> TriggerDetector {
        TriggerDetector::new(PhraseSets {
            implementation: &self.trigger_phrases.implementation_mode,
            discussion: &self.trigger_phrases.discussion_mode,
            emergency_stop: &self.trigger_phrases.emergency_stop,
        })
    }
}

/// Load config from a TOML file, strictly.
///
/// If the file is missing, returns `GateConfig::default()`.
pub fn load_config(path: &Path) -> Result<GateConfig> {
    if !path.exists() {
        return Ok(GateConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: GateConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Load config for a hook invocation: any problem falls back to defaults.
pub fn load_config_or_default(path: &Path) -> GateConfig {
    match load_config(path) {
        Ok(cfg) => {
            debug!(path = %path.display(), "config loaded");
            cfg
        }
        Err(err) => {
            warn!(err = %format!("{err:#}"), "config unusable, using defaults");
            GateConfig::default()
        }
    }
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &GateConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

/// Which command list `gate config read|write` edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternList {
    Read,
    Write,
}

/// Add `command` to a pattern list. Returns false when already present.
pub fn add_pattern(cfg: &mut GateConfig, list: PatternList, command: &str) -> bool {
    let entries = pattern_list_mut(cfg, list);
    let command = command.trim();
    if command.is_empty() || entries.iter().any(|entry| entry == command) {
        return false;
    }
    entries.push(command.to_string());
    true
}

/// Remove `command` from a pattern list. Returns false when absent.
pub fn remove_pattern(cfg: &mut GateConfig, list: PatternList, command: &str) -> bool {
    let entries = pattern_list_mut(cfg, list);
    let before = entries.len();
    entries.retain(|entry| entry != command.trim());
    entries.len() != before
}

fn pattern_list_mut(cfg: &mut GateConfig, list: PatternList) -> &mut Vec<String> {
    match list {
        PatternList::Read => &mut cfg.blocked_actions.bash_read_patterns,
        PatternList::Write => &mut cfg.blocked_actions.bash_write_patterns,
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}
