pub mod adapt;
pub mod context;
pub mod execute;
pub mod plan;

pub use context::{truncate, HistoryEntry};

/// System message sent with every model request.
pub const SYSTEM_PROMPT: &str = "You are an autonomous software engineer working inside a \
    project workspace. Work in small, verifiable steps. Use the provided tools to inspect \
    and change files or run commands instead of describing changes in prose. When a tool \
    fails, read the error and try a different approach rather than repeating the same call.";
