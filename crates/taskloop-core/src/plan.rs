use std::fmt;

use serde::{Deserialize, Serialize};

use crate::subtask::{Subtask, SubtaskStatus};

/// The full, mutable collection of subtasks for one task run.
///
/// Insertion order is creation order. Subtasks are only ever appended,
/// never removed, so adaptation is monotonic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    subtasks: Vec<Subtask>,
}

/// Per-status counts over a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanProgress {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub replaced: usize,
    pub skipped: usize,
}

impl PlanProgress {
    pub fn resolved(&self) -> usize {
        self.completed + self.replaced + self.skipped
    }
}

impl fmt::Display for PlanProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} resolved (completed {}, replaced {}, skipped {}, failed {}, pending {}, in progress {})",
            self.resolved(),
            self.total,
            self.completed,
            self.replaced,
            self.skipped,
            self.failed,
            self.pending,
            self.in_progress,
        )
    }
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_subtasks(subtasks: impl IntoIterator<Item = Subtask>) -> Self {
        let mut plan = Self::new();
        for subtask in subtasks {
            plan.push(subtask);
        }
        plan
    }

    /// Append a subtask and return the id it was stored under.
    ///
    /// Ids are unique within a plan: on collision the incoming subtask is
    /// renamed `<id>-2`, `<id>-3`, ... Existing dependencies keep pointing
    /// at the original holder of the id.
    pub fn push(&mut self, mut subtask: Subtask) -> String {
        if self.get(&subtask.id).is_some() {
            let base = subtask.id.clone();
            let mut n = 2;
            while self.get(&format!("{base}-{n}")).is_some() {
                n += 1;
            }
            subtask.id = format!("{base}-{n}");
        }
        let id = subtask.id.clone();
        self.subtasks.push(subtask);
        id
    }

    pub fn subtasks(&self) -> &[Subtask] {
        &self.subtasks
    }

    pub fn len(&self) -> usize {
        self.subtasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subtasks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Subtask> {
        self.subtasks.iter().find(|s| s.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Subtask> {
        self.subtasks.iter_mut().find(|s| s.id == id)
    }

    /// True when `id` names a subtask in a resolved status. Unknown ids
    /// never resolve.
    pub fn is_resolved(&self, id: &str) -> bool {
        self.get(id).is_some_and(|s| s.status.is_resolved())
    }

    pub fn dependencies_resolved(&self, subtask: &Subtask) -> bool {
        subtask.dependencies.iter().all(|dep| self.is_resolved(dep))
    }

    pub fn all_resolved(&self) -> bool {
        self.subtasks.iter().all(|s| s.status.is_resolved())
    }

    pub fn unresolved_ids(&self) -> Vec<String> {
        self.subtasks
            .iter()
            .filter(|s| !s.status.is_resolved())
            .map(|s| s.id.clone())
            .collect()
    }

    pub fn count_status(&self, status: SubtaskStatus) -> usize {
        self.subtasks.iter().filter(|s| s.status == status).count()
    }

    pub fn progress(&self) -> PlanProgress {
        let mut p = PlanProgress {
            total: self.subtasks.len(),
            ..Default::default()
        };
        for s in &self.subtasks {
            match s.status {
                SubtaskStatus::Pending => p.pending += 1,
                SubtaskStatus::InProgress => p.in_progress += 1,
                SubtaskStatus::Completed => p.completed += 1,
                SubtaskStatus::Failed => p.failed += 1,
                SubtaskStatus::Replaced => p.replaced += 1,
                SubtaskStatus::Skipped => p.skipped += 1,
            }
        }
        p
    }
}
