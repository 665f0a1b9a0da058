use taskloop_core::{CritiqueResult, PlanProgress, Subtask};

use crate::plan::{append_tools, SUBTASK_SCHEMA};

/// Prompt asking the model how to remediate a subtask that exhausted its
/// attempts.
pub fn assemble(
    failed: &Subtask,
    critique: &CritiqueResult,
    progress: &PlanProgress,
    tool_names: &[String],
) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!(
        "# Failed Subtask {}\n\n{}\n\nAttempts made: {}\n\n",
        failed.id,
        failed.description.trim(),
        failed.attempt_count
    ));

    prompt.push_str("## Last Critique\n\n");
    prompt.push_str(&format!("Error type: {}\n", critique.error_type));
    prompt.push_str(&format!("Feedback: {}\n", critique.feedback));
    if !critique.issues.is_empty() {
        prompt.push_str("Issues:\n");
        for issue in &critique.issues {
            prompt.push_str(&format!("- {issue}\n"));
        }
    }
    prompt.push('\n');

    prompt.push_str(&format!("## Plan Progress\n\n{progress}\n\n"));
    append_tools(&mut prompt, tool_names);

    prompt.push_str(
        "## Instructions\n\n\
         Choose one remediation strategy:\n\
         - \"replace\": abandon the failed subtask and add new subtasks that achieve its goal differently\n\
         - \"supplement\": keep the failed subtask as failed and add subtasks that work around it\n\
         - \"skip\": the subtask is not needed for the overall task\n\n\
         Respond with a single JSON object and nothing else:\n\n\
         ```json\n{\n  \"strategy\": \"replace | supplement | skip\",\n  \"reasoning\": \"why\",\n  \"subtasks\": [\n",
    );
    for line in SUBTASK_SCHEMA.lines() {
        prompt.push_str("    ");
        prompt.push_str(line);
        prompt.push('\n');
    }
    prompt.push_str("  ]\n}\n```\n\nOmit priority to inherit the failed subtask's priority.\n");
    prompt
}
