pub mod profiles;
pub mod runner;
pub mod tool;

pub use profiles::{discover, BuildSystem, CheckKind, CheckProfile, ProjectDescriptor};
pub use runner::{CheckStep, RunResult, RunStatus, Runner, StepResult};
pub use tool::{validation_tools, CheckTool};
