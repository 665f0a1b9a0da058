//! Classifies an attempt as success or failure.
//!
//! Classification is keyword based: the subtask's description and required
//! tools decide whether it is an implementation task, a research task or
//! neither, and that decides which failed checks block.

use taskloop_core::{
    CritiqueResult, ErrorType, Issue, ObservationResult, StatusError, Subtask, SubtaskStatus,
};

const MUTATION_TOOLS: &[&str] = &["write_file", "edit_file", "create_file", "delete_file"];
const SHELL_TOOLS: &[&str] = &["run_command", "execute_command", "shell"];

const IMPLEMENTATION_WORDS: &[&str] = &["create", "implement", "update", "modify", "fix", "add"];
const RESEARCH_WORDS: &[&str] = &["understand", "research", "analyze", "investigate"];
/// Descriptions that must show evidence of real tool use.
const WORK_WORDS: &[&str] = &["implement", "create"];
/// Definition-of-done criteria that only real work can satisfy.
const DOD_WORK_WORDS: &[&str] = &["create", "implement", "add", "modify"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskKind {
    Implementation,
    Research,
    Other,
}

fn mentions(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

fn uses_work_tools(subtask: &Subtask) -> bool {
    subtask.required_tools.iter().any(|t| {
        let t = t.to_ascii_lowercase();
        MUTATION_TOOLS.contains(&t.as_str()) || SHELL_TOOLS.contains(&t.as_str())
    })
}

fn classify(description: &str, work_tools: bool) -> TaskKind {
    if work_tools || mentions(description, IMPLEMENTATION_WORDS) {
        TaskKind::Implementation
    } else if mentions(description, RESEARCH_WORDS) {
        TaskKind::Research
    } else {
        TaskKind::Other
    }
}

/// Judge an attempt without touching the subtask. Same inputs, same verdict.
pub fn evaluate(observation: &ObservationResult, subtask: &Subtask) -> CritiqueResult {
    let description = subtask.description.to_lowercase();
    let work_tools = uses_work_tools(subtask);
    let kind = classify(&description, work_tools);
    let work_performed = work_tools && observation.metrics.tool_calls > 0;

    let mut issues = Vec::new();
    let mut dod_unmet = false;

    if mentions(&description, WORK_WORDS) && !work_tools {
        issues.push(Issue::critical(
            "No actual work performed: no file-mutation or shell tool among required tools",
            ErrorType::Logic,
        ));
    }

    if !observation.build_success {
        issues.push(Issue::critical("Build failed", ErrorType::Compilation));
    }

    if !observation.tests_pass {
        issues.push(match kind {
            TaskKind::Implementation => Issue::critical("Tests failed", ErrorType::Logic),
            _ => Issue::minor("Tests failed", ErrorType::Logic),
        });
    }

    if !observation.lint_pass {
        issues.push(match kind {
            TaskKind::Implementation => Issue::critical("Lint check failed", ErrorType::Style),
            _ => Issue::minor("Lint check failed", ErrorType::Style),
        });
    }

    for criterion in &subtask.definition_of_done {
        if mentions(&criterion.to_lowercase(), DOD_WORK_WORDS) && !work_performed {
            dod_unmet = true;
            issues.push(Issue::critical(
                format!("Definition of done not met: {criterion}"),
                ErrorType::Logic,
            ));
        }
    }

    let passed = match kind {
        TaskKind::Research => observation.build_success && !dod_unmet,
        TaskKind::Implementation => {
            observation.all_passed() && issues.iter().all(|i| !i.critical)
        }
        TaskKind::Other => issues.is_empty(),
    };

    let summary = issues
        .iter()
        .map(|i| i.message.as_str())
        .collect::<Vec<_>>()
        .join("; ");

    if passed && issues.is_empty() {
        return CritiqueResult {
            success: true,
            issues,
            error_type: ErrorType::None,
            feedback: "Subtask completed successfully".into(),
        };
    }

    if passed || issues.iter().all(|i| !i.critical) {
        return CritiqueResult {
            success: true,
            issues,
            error_type: ErrorType::None,
            feedback: format!("Subtask completed with minor warnings: {summary}"),
        };
    }

    let error_type = issues
        .iter()
        .find(|i| i.critical)
        .map_or(ErrorType::None, |i| i.error_type);
    CritiqueResult {
        success: false,
        issues,
        error_type,
        feedback: format!("Subtask failed: {summary}"),
    }
}

/// Apply a verdict to an in-progress subtask: `Completed` on success,
/// otherwise back to `Pending` while attempts remain, else `Failed`.
pub fn settle(subtask: &mut Subtask, success: bool, max_attempts: u32) -> Result<(), StatusError> {
    let next = if success {
        SubtaskStatus::Completed
    } else if subtask.attempt_count < max_attempts {
        SubtaskStatus::Pending
    } else {
        SubtaskStatus::Failed
    };
    subtask.transition_to(next)?;
    subtask.finish_attempt();
    Ok(())
}

/// [`evaluate`] then [`settle`].
pub fn critique(
    observation: &ObservationResult,
    subtask: &mut Subtask,
    max_attempts: u32,
) -> Result<CritiqueResult, StatusError> {
    let verdict = evaluate(observation, subtask);
    settle(subtask, verdict.success, max_attempts)?;
    Ok(verdict)
}
