pub mod error;
pub mod plan;
pub mod result;
pub mod scheduler;
pub mod subtask;
pub mod task;

pub use error::{AdaptationError, PlanningError, StatusError};
pub use plan::{Plan, PlanProgress};
pub use result::{
    ActionResult, AdaptationRecord, AdaptationStrategy, CritiqueResult, ErrorType, Issue,
    IterationResult, ObservationMetrics, ObservationResult, TaskCompletionResult,
    TerminationReason,
};
pub use subtask::{Complexity, Subtask, SubtaskStatus};
pub use task::Task;
