use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "taskloop", about = "Autonomous plan/execute/verify loop for coding tasks")]
pub struct RunnerConfig {
    /// Task description
    pub task: String,

    /// Constraint the solution must respect (repeatable)
    #[arg(long = "constraint")]
    pub constraints: Vec<String>,

    /// Project directory the tools operate in
    #[arg(long, env = "TASKLOOP_WORKSPACE", default_value = ".")]
    pub workspace: PathBuf,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "TASKLOOP_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub base_url: String,

    /// API key for the model endpoint
    #[arg(long, env = "TASKLOOP_API_KEY")]
    pub api_key: Option<String>,

    /// Model name sent with every request
    #[arg(long, env = "TASKLOOP_MODEL", default_value = "gpt-4o")]
    pub model: String,

    /// Maximum loop iterations
    #[arg(long, default_value = "50")]
    pub max_iterations: u32,

    /// Wall-clock limit for the whole run (minutes)
    #[arg(long, default_value = "30")]
    pub max_minutes: u64,

    /// Stop once more than this many subtasks have failed
    #[arg(long, default_value = "5")]
    pub max_failed_subtasks: usize,

    /// Attempts per subtask before it is handed to the adapter
    #[arg(long, default_value = "3")]
    pub max_subtask_attempts: u32,

    /// Model/tool round trips per attempt
    #[arg(long, default_value = "5")]
    pub max_tool_rounds: usize,

    /// Past iterations summarised in each execution prompt
    #[arg(long, default_value = "3")]
    pub history_window: usize,

    /// Timeout for each build, lint or test command (seconds)
    #[arg(long, env = "TASKLOOP_CHECK_TIMEOUT", default_value = "600")]
    pub check_timeout: u64,

    /// Timeout for the run_command tool (seconds)
    #[arg(long, env = "TASKLOOP_COMMAND_TIMEOUT", default_value = "300")]
    pub command_timeout: u64,

    /// Write the final report as JSON to this path
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl RunnerConfig {
    pub fn limits(&self) -> LoopLimits {
        LoopLimits {
            max_iterations: self.max_iterations,
            max_duration: Duration::from_secs(self.max_minutes * 60),
            max_failed_subtasks: self.max_failed_subtasks,
            max_subtask_attempts: self.max_subtask_attempts.max(1),
            max_tool_rounds: self.max_tool_rounds.max(1),
            history_window: self.history_window,
        }
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout)
    }
}

/// Global stop conditions and per-subtask budgets of the completion loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopLimits {
    pub max_iterations: u32,
    pub max_duration: Duration,
    /// The loop stops once the failed count exceeds this.
    pub max_failed_subtasks: usize,
    pub max_subtask_attempts: u32,
    pub max_tool_rounds: usize,
    pub history_window: usize,
}

impl Default for LoopLimits {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            max_duration: Duration::from_secs(30 * 60),
            max_failed_subtasks: 5,
            max_subtask_attempts: 3,
            max_tool_rounds: 5,
            history_window: 3,
        }
    }
}
