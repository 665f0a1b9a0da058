//! Deterministic selection of the next subtask to run.

use crate::plan::Plan;
use crate::subtask::{Subtask, SubtaskStatus};

/// Pick the next eligible subtask.
///
/// Eligible means `Pending` with every dependency resolved. Among those the
/// lowest priority wins, then the lowest complexity, then insertion order.
/// Returns `None` when nothing is eligible, which is either completion or a
/// deadlock; [`is_deadlocked`] tells the two apart.
pub fn select_next(plan: &Plan) -> Option<&Subtask> {
    plan.subtasks()
        .iter()
        .enumerate()
        .filter(|(_, s)| s.status == SubtaskStatus::Pending && plan.dependencies_resolved(s))
        .min_by_key(|(index, s)| (s.priority, s.complexity, *index))
        .map(|(_, s)| s)
}

/// No subtask can be scheduled, yet some remain unresolved.
pub fn is_deadlocked(plan: &Plan) -> bool {
    select_next(plan).is_none() && !plan.all_resolved()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtask::Complexity;

    fn subtask(id: &str, priority: i64, complexity: Complexity, deps: &[&str]) -> Subtask {
        let mut s = Subtask::new(id, format!("do {id}"));
        s.priority = priority;
        s.complexity = complexity;
        s.dependencies = deps.iter().map(|d| d.to_string()).collect();
        s
    }

    #[test]
    fn empty_plan_selects_nothing() {
        assert!(select_next(&Plan::new()).is_none());
        assert!(!is_deadlocked(&Plan::new()));
    }

    #[test]
    fn lowest_priority_wins() {
        let plan = Plan::from_subtasks([
            subtask("a", 3, Complexity::Low, &[]),
            subtask("b", 1, Complexity::High, &[]),
            subtask("c", 2, Complexity::Low, &[]),
        ]);
        assert_eq!(select_next(&plan).unwrap().id, "b");
    }

    #[test]
    fn complexity_breaks_priority_ties() {
        let plan = Plan::from_subtasks([
            subtask("a", 1, Complexity::High, &[]),
            subtask("b", 1, Complexity::Medium, &[]),
            subtask("c", 1, Complexity::Low, &[]),
        ]);
        assert_eq!(select_next(&plan).unwrap().id, "c");
    }

    #[test]
    fn insertion_order_breaks_full_ties() {
        let plan = Plan::from_subtasks([
            subtask("first", 1, Complexity::Low, &[]),
            subtask("second", 1, Complexity::Low, &[]),
        ]);
        assert_eq!(select_next(&plan).unwrap().id, "first");
    }

    #[test]
    fn repeated_selection_is_stable() {
        let plan = Plan::from_subtasks([
            subtask("a", 2, Complexity::Low, &[]),
            subtask("b", 2, Complexity::Low, &[]),
            subtask("c", 5, Complexity::Low, &[]),
        ]);
        let first = select_next(&plan).unwrap().id.clone();
        for _ in 0..10 {
            assert_eq!(select_next(&plan).unwrap().id, first);
        }
    }

    #[test]
    fn pending_dependency_blocks() {
        let plan = Plan::from_subtasks([
            subtask("a", 5, Complexity::Low, &[]),
            subtask("b", 1, Complexity::Low, &["a"]),
        ]);
        assert_eq!(select_next(&plan).unwrap().id, "a");
    }

    #[test]
    fn resolved_dependencies_unblock() {
        for status in [
            SubtaskStatus::Completed,
            SubtaskStatus::Replaced,
            SubtaskStatus::Skipped,
        ] {
            let mut plan = Plan::from_subtasks([
                subtask("a", 5, Complexity::Low, &[]),
                subtask("b", 1, Complexity::Low, &["a"]),
            ]);
            plan.get_mut("a").unwrap().status = status;
            assert_eq!(select_next(&plan).unwrap().id, "b", "dep {status}");
        }
    }

    #[test]
    fn failed_dependency_deadlocks() {
        let mut plan = Plan::from_subtasks([
            subtask("a", 1, Complexity::Low, &[]),
            subtask("b", 1, Complexity::Low, &["a"]),
        ]);
        plan.get_mut("a").unwrap().status = SubtaskStatus::Failed;
        assert!(select_next(&plan).is_none());
        assert!(is_deadlocked(&plan));
    }

    #[test]
    fn dependency_cycle_deadlocks() {
        let plan = Plan::from_subtasks([
            subtask("a", 1, Complexity::Low, &["b"]),
            subtask("b", 1, Complexity::Low, &["a"]),
        ]);
        assert!(is_deadlocked(&plan));
    }

    #[test]
    fn completed_subtask_is_never_reselected() {
        let mut plan = Plan::from_subtasks([
            subtask("a", 1, Complexity::Low, &[]),
            subtask("b", 2, Complexity::Low, &[]),
        ]);
        let mut seen = Vec::new();
        while let Some(next) = select_next(&plan) {
            let id = next.id.clone();
            assert!(!seen.contains(&id), "{id} selected twice");
            plan.get_mut(&id).unwrap().status = SubtaskStatus::Completed;
            seen.push(id);
        }
        assert_eq!(seen, vec!["a", "b"]);
        assert!(!is_deadlocked(&plan));
    }

    #[test]
    fn never_selects_subtask_with_unresolved_dependency() {
        let statuses = [
            SubtaskStatus::Pending,
            SubtaskStatus::InProgress,
            SubtaskStatus::Failed,
        ];
        for status in statuses {
            let mut plan = Plan::from_subtasks([
                subtask("dep", 9, Complexity::High, &[]),
                subtask("s", 0, Complexity::Low, &["dep"]),
            ]);
            plan.get_mut("dep").unwrap().status = status;
            if let Some(next) = select_next(&plan) {
                assert_ne!(next.id, "s", "selected with dep {status}");
            }
        }
    }
}
