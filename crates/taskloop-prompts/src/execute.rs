use taskloop_core::{IterationResult, Subtask};

use crate::context::append_history;

/// First user turn for one execution attempt of a subtask.
pub fn assemble(subtask: &Subtask, history: &[IterationResult]) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!("# Subtask {}\n\n{}\n\n", subtask.id, subtask.description.trim()));

    if !subtask.definition_of_done.is_empty() {
        prompt.push_str("## Definition of Done\n\n");
        for (i, criterion) in subtask.definition_of_done.iter().enumerate() {
            prompt.push_str(&format!("{}. {criterion}\n", i + 1));
        }
        prompt.push('\n');
    }

    if !subtask.required_tools.is_empty() {
        prompt.push_str(&format!(
            "## Suggested Tools\n\n{}\n\n",
            subtask.required_tools.join(", ")
        ));
    }

    if subtask.attempt_count > 1 {
        prompt.push_str(&format!(
            "This is attempt {} for this subtask. Earlier attempts did not pass verification.\n\n",
            subtask.attempt_count
        ));
    }

    append_history(&mut prompt, history);

    prompt.push_str(
        "## Instructions\n\n\
         Complete this subtask using the available tools. When you are done, reply with a \
         short summary of what changed and do not request further tools.\n",
    );
    prompt
}

/// Synthetic user turn reporting one round of tool executions.
pub fn tool_results_turn(results: &[String]) -> String {
    let mut turn = String::from("## Tool Execution Results\n\n");
    for result in results {
        turn.push_str(&format!("- {result}\n"));
    }
    turn.push_str(
        "\nDecide your next action: continue with further tool calls, retry a failed call \
         differently, or conclude with a summary if the subtask is complete.\n",
    );
    turn
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subtask() -> Subtask {
        let mut s = Subtask::new("s1", "Add Multiply to Calculator");
        s.definition_of_done = vec!["Multiply exists".into(), "Tests pass".into()];
        s.required_tools = vec!["edit_file".into()];
        s
    }

    #[test]
    fn lists_dod_and_tools() {
        let out = assemble(&subtask(), &[]);
        assert!(out.contains("# Subtask s1"));
        assert!(out.contains("1. Multiply exists"));
        assert!(out.contains("2. Tests pass"));
        assert!(out.contains("## Suggested Tools\n\nedit_file"));
        assert!(!out.contains("Recent Attempts"));
        assert!(!out.contains("attempt"));
    }

    #[test]
    fn mentions_retry_attempt() {
        let mut s = subtask();
        s.attempt_count = 2;
        assert!(assemble(&s, &[]).contains("This is attempt 2"));
    }

    #[test]
    fn tool_results_turn_asks_for_next_action() {
        let out = tool_results_turn(&["read_file: Error - Tool not found".into()]);
        assert!(out.contains("- read_file: Error - Tool not found"));
        assert!(out.contains("Decide your next action"));
    }
}
