//! Workflow admission gate.
//!
//! Hook commands read one JSON request from stdin and answer through the exit
//! code (`0` proceed, `2` blocked) plus optional JSON on stdout. The remaining
//! commands inspect and edit the session state and configuration under
//! `sessions/`.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use gate::core::classifier::CommandClassifier;
use gate::core::workflow::{WorkflowEvent, apply_event};
use gate::exit_codes;
use gate::gate::{run_pre_tool_use, transition_events};
use gate::hook::HookOutcome;
use gate::io::config::{
    GateConfig, PatternList, add_pattern, load_config, load_config_or_default, remove_pattern,
    write_config,
};
use gate::io::events::EventLog;
use gate::io::git::GitBranchProbe;
use gate::io::layout::{GatePaths, discover_root};
use gate::io::state_store::{load_state_or_default, update_state};
use gate::io::subagent::update_registry;
use gate::logging;
use gate::post_tool::{run_post_tool_use, run_session_start};
use gate::prompt::run_user_prompt;
use gate::state::TaskState;

#[derive(Parser)]
#[command(
    name = "gate",
    version,
    about = "Workflow admission gate for coding-agent tool calls"
)]
struct Cli {
    /// Project root. Defaults to $CLAUDE_PROJECT_DIR, then the nearest
    /// ancestor holding `sessions/` or `.claude/`, then the current directory.
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decide a tool request read from stdin (exit 0 allow, 2 block).
    PreToolUse,
    /// Bookkeeping after a tool ran (plan completion, delegation exit).
    PostToolUse,
    /// Apply trigger phrases in an operator prompt read from stdin.
    UserPrompt,
    /// Reset per-session markers at the start of a session.
    SessionStart,
    /// Print the current mode, or return to discussion.
    Mode {
        #[arg(value_enum)]
        target: Option<ModeTarget>,
    },
    /// Print the session state document.
    State,
    /// Manage the active task.
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },
    /// Print how a shell command is classified (`read-only` or `mutating`).
    Classify {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Show or edit `sessions/sessions-config.toml`.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Manage subagent markers.
    Subagent {
        #[command(subcommand)]
        action: SubagentAction,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeTarget {
    Discussion,
}

#[derive(Subcommand)]
enum TaskAction {
    /// Replace the active task.
    Set {
        #[arg(long)]
        branch: String,
        #[arg(long)]
        id: Option<String>,
        /// Repository directory name that is part of the task (repeatable).
        #[arg(long = "submodule")]
        submodules: Vec<String>,
    },
    /// Declare one more repository as part of the active task.
    Add { name: String },
    /// Forget the active task.
    Clear,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration.
    Show,
    /// Write the default configuration if missing.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Edit the extra read-only command names.
    Read {
        #[command(subcommand)]
        action: PatternAction,
    },
    /// Edit the extra mutating command names.
    Write {
        #[command(subcommand)]
        action: PatternAction,
    },
}

#[derive(Subcommand)]
enum PatternAction {
    Add { command: String },
    Remove { command: String },
}

#[derive(Subcommand)]
enum SubagentAction {
    Enter {
        #[arg(long)]
        session: String,
    },
    Exit {
        #[arg(long)]
        session: String,
    },
    /// Clear one session's marker, or all markers.
    Reset {
        #[arg(long)]
        session: Option<String>,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let paths = project_paths(cli.root.as_deref())?;
    match cli.command {
        Command::PreToolUse => cmd_pre_tool_use(&paths),
        Command::PostToolUse => {
            let config = load_config_or_default(&paths.config_path);
            let input = read_stdin()?;
            emit(run_post_tool_use(&paths, &config, &input, Utc::now())?)
        }
        Command::UserPrompt => {
            let config = load_config_or_default(&paths.config_path);
            let input = read_stdin()?;
            emit(run_user_prompt(&paths, &config, &input, Utc::now())?)
        }
        Command::SessionStart => emit(run_session_start(&paths)?),
        Command::Mode { target } => cmd_mode(&paths, target),
        Command::State => cmd_state(&paths),
        Command::Task { action } => cmd_task(&paths, action),
        Command::Classify { command } => cmd_classify(&paths, &command.join(" ")),
        Command::Config { action } => cmd_config(&paths, action),
        Command::Subagent { action } => cmd_subagent(&paths, action),
    }
}

fn project_paths(explicit: Option<&Path>) -> Result<GatePaths> {
    let cwd = std::env::current_dir().context("read current directory")?;
    let env_dir = std::env::var_os("CLAUDE_PROJECT_DIR")
        .filter(|value| !value.is_empty())
        .map(PathBuf::from);
    Ok(GatePaths::new(discover_root(
        explicit,
        env_dir.as_deref(),
        &cwd,
    )))
}

fn read_stdin() -> Result<String> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("read hook request from stdin")?;
    Ok(input)
}

fn emit(outcome: HookOutcome) -> Result<i32> {
    if let Some(stdout) = &outcome.stdout {
        println!("{stdout}");
    }
    if let Some(stderr) = &outcome.stderr {
        eprintln!("{stderr}");
    }
    Ok(outcome.exit_code)
}

fn cmd_pre_tool_use(paths: &GatePaths) -> Result<i32> {
    let config = load_config_or_default(&paths.config_path);
    let probe = GitBranchProbe::new(Duration::from_millis(config.git.branch_timeout_ms));
    let input = read_stdin()?;
    emit(run_pre_tool_use(paths, &config, &probe, &input, Utc::now())?)
}

fn cmd_mode(paths: &GatePaths, target: Option<ModeTarget>) -> Result<i32> {
    let Some(ModeTarget::Discussion) = target else {
        println!("{}", load_state_or_default(&paths.state_path).mode);
        return Ok(exit_codes::OK);
    };

    let config = load_config_or_default(&paths.config_path);
    let now = Utc::now();
    let summary = update_state(&paths.state_path, |state| {
        apply_event(
            state,
            WorkflowEvent::DiscussionTrigger,
            now,
            config.features.cooldown_secs,
        )
    })?;
    EventLog::new(&paths.events_path).record(&transition_events(&[summary.clone()]), now);
    println!("{}", summary.to);
    Ok(exit_codes::OK)
}

fn cmd_state(paths: &GatePaths) -> Result<i32> {
    let state = load_state_or_default(&paths.state_path);
    println!(
        "{}",
        serde_json::to_string_pretty(&state).context("serialize state")?
    );
    Ok(exit_codes::OK)
}

fn cmd_task(paths: &GatePaths, action: TaskAction) -> Result<i32> {
    match action {
        TaskAction::Set {
            branch,
            id,
            submodules,
        } => {
            if branch.trim().is_empty() {
                bail!("--branch must not be empty");
            }
            let mut task = TaskState {
                task_id: id,
                branch: Some(branch),
                submodules: Vec::new(),
            };
            for name in &submodules {
                task.declare_submodule(name);
            }
            update_state(&paths.state_path, |state| state.current_task = task)?;
        }
        TaskAction::Add { name } => {
            if name.trim().is_empty() {
                bail!("repository name must not be empty");
            }
            update_state(&paths.state_path, |state| {
                state.current_task.declare_submodule(&name);
            })?;
        }
        TaskAction::Clear => {
            update_state(&paths.state_path, |state| {
                state.current_task = TaskState::default();
            })?;
        }
    }
    Ok(exit_codes::OK)
}

fn cmd_classify(paths: &GatePaths, command: &str) -> Result<i32> {
    let config = load_config_or_default(&paths.config_path);
    let kind = CommandClassifier::new(config.command_policy()).classify(command);
    println!("{kind}");
    Ok(exit_codes::OK)
}

fn cmd_config(paths: &GatePaths, action: ConfigAction) -> Result<i32> {
    match action {
        ConfigAction::Show => {
            let config = load_config(&paths.config_path)?;
            print!(
                "{}",
                toml::to_string_pretty(&config).context("serialize config toml")?
            );
        }
        ConfigAction::Init { force } => {
            if !force && paths.config_path.exists() {
                println!("{} already exists", paths.config_path.display());
                return Ok(exit_codes::OK);
            }
            write_config(&paths.config_path, &GateConfig::default())?;
        }
        ConfigAction::Read { action } => edit_patterns(paths, PatternList::Read, action)?,
        ConfigAction::Write { action } => edit_patterns(paths, PatternList::Write, action)?,
    }
    Ok(exit_codes::OK)
}

fn edit_patterns(paths: &GatePaths, list: PatternList, action: PatternAction) -> Result<()> {
    let mut config = load_config(&paths.config_path)?;
    let changed = match &action {
        PatternAction::Add { command } => add_pattern(&mut config, list, command),
        PatternAction::Remove { command } => remove_pattern(&mut config, list, command),
    };
    if changed {
        write_config(&paths.config_path, &config)?;
    }
    Ok(())
}

fn cmd_subagent(paths: &GatePaths, action: SubagentAction) -> Result<i32> {
    let now = Utc::now();
    match action {
        SubagentAction::Enter { session } => {
            let ttl = load_config_or_default(&paths.config_path).subagent.ttl_secs;
            let depth = update_registry(&paths.subagents_path, |registry| {
                registry.enter(&session, now, ttl)
            })?;
            println!("{depth}");
        }
        SubagentAction::Exit { session } => {
            let depth = update_registry(&paths.subagents_path, |registry| {
                registry.exit(&session, now)
            })?;
            println!("{depth}");
        }
        SubagentAction::Reset { session } => {
            update_registry(&paths.subagents_path, |registry| {
                registry.reset(session.as_deref());
            })?;
        }
    }
    Ok(exit_codes::OK)
}
