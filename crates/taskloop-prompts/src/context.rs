use taskloop_core::IterationResult;

const RESPONSE_CHARS: usize = 300;
const TOOL_RESULT_CHARS: usize = 200;
const MAX_TOOL_RESULTS: usize = 5;

/// Compact view of a past iteration, for inclusion in prompts.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub iteration: u32,
    pub subtask: String,
    pub success: bool,
    pub tool_calls: usize,
    pub response: String,
    pub tool_results: Vec<String>,
    pub feedback: Option<String>,
    pub error: Option<String>,
}

impl HistoryEntry {
    pub fn from_iteration(it: &IterationResult) -> Self {
        let (tool_calls, response, tool_results) = match &it.action {
            Some(action) => (
                action.tool_calls_executed,
                truncate(&action.response, RESPONSE_CHARS),
                action
                    .tool_results
                    .iter()
                    .take(MAX_TOOL_RESULTS)
                    .map(|r| truncate(r, TOOL_RESULT_CHARS))
                    .collect(),
            ),
            None => (0, String::new(), Vec::new()),
        };
        Self {
            iteration: it.iteration,
            subtask: it.subtask.description.clone(),
            success: it.success,
            tool_calls,
            response,
            tool_results,
            feedback: it.critique.as_ref().map(|c| c.feedback.clone()),
            error: it.error.clone(),
        }
    }
}

/// Render the "Recent Attempts" section. Nothing is written for an empty
/// history.
pub fn append_history(prompt: &mut String, history: &[IterationResult]) {
    if history.is_empty() {
        return;
    }
    prompt.push_str("## Recent Attempts\n\n");
    prompt.push_str("Do not repeat actions that already failed.\n\n");
    for it in history {
        let entry = HistoryEntry::from_iteration(it);
        let outcome = if entry.success { "succeeded" } else { "FAILED" };
        prompt.push_str(&format!(
            "### Iteration {}: {} ({outcome}, {} tool calls)\n",
            entry.iteration, entry.subtask, entry.tool_calls
        ));
        if !entry.response.is_empty() {
            prompt.push_str(&format!("Response: {}\n", entry.response));
        }
        for result in &entry.tool_results {
            prompt.push_str(&format!("- {result}\n"));
        }
        if let Some(ref feedback) = entry.feedback {
            prompt.push_str(&format!("Feedback: {feedback}\n"));
        }
        if let Some(ref error) = entry.error {
            prompt.push_str(&format!("Error: {error}\n"));
        }
        prompt.push('\n');
    }
}

/// Cut `s` to at most `max` characters, marking the cut.
pub fn truncate(s: &str, max: usize) -> String {
    let s = s.trim();
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use taskloop_core::{ActionResult, Subtask};

    fn iteration(n: u32, success: bool, response: &str) -> IterationResult {
        IterationResult {
            iteration: n,
            progress: String::new(),
            subtask: Subtask::new("s1", "Add Multiply method"),
            action: Some(ActionResult {
                response: response.into(),
                tool_calls_executed: 1,
                tool_results: vec!["edit_file: Error - old_text not found".into()],
                success,
            }),
            observation: None,
            critique: None,
            adaptation: None,
            success,
            error: None,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo wörld", 5), "héllo...");
        assert_eq!(truncate("  short  ", 10), "short");
    }

    #[test]
    fn empty_history_renders_nothing() {
        let mut out = String::new();
        append_history(&mut out, &[]);
        assert!(out.is_empty());
    }

    #[test]
    fn history_shows_outcome_and_tool_results() {
        let mut out = String::new();
        append_history(&mut out, &[iteration(2, false, "tried editing")]);
        assert!(out.contains("## Recent Attempts"));
        assert!(out.contains("Iteration 2: Add Multiply method (FAILED, 1 tool calls)"));
        assert!(out.contains("Response: tried editing"));
        assert!(out.contains("- edit_file: Error - old_text not found"));
    }

    #[test]
    fn history_entry_truncates_long_response() {
        let long = "x".repeat(1000);
        let entry = HistoryEntry::from_iteration(&iteration(1, true, &long));
        assert_eq!(entry.response.chars().count(), RESPONSE_CHARS + 3);
        assert!(entry.response.ends_with("..."));

        let exact = "y".repeat(RESPONSE_CHARS);
        let entry = HistoryEntry::from_iteration(&iteration(1, true, &exact));
        assert_eq!(entry.response, exact);
    }

    #[test]
    fn history_entry_truncates_and_caps_tool_results() {
        let mut it = iteration(1, false, "ok");
        if let Some(action) = it.action.as_mut() {
            action.tool_results = (0..8).map(|i| format!("{i}{}", "r".repeat(500))).collect();
        }
        let entry = HistoryEntry::from_iteration(&it);
        assert_eq!(entry.tool_results.len(), MAX_TOOL_RESULTS);
        for result in &entry.tool_results {
            assert_eq!(result.chars().count(), TOOL_RESULT_CHARS + 3);
        }
        assert!(entry.tool_results[4].starts_with('4'));

        let mut out = String::new();
        append_history(&mut out, &[it]);
        assert!(!out.contains(&"r".repeat(TOOL_RESULT_CHARS + 1)));
        assert!(!out.contains("- 5r"));
    }
}
