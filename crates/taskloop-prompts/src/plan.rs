use taskloop_core::Task;

/// JSON shape every subtask must follow, shared with the adaptation prompt.
pub const SUBTASK_SCHEMA: &str = r#"{
  "id": "short-unique-id",
  "description": "what to do",
  "definition_of_done": ["observable acceptance criterion"],
  "dependencies": ["id of a subtask that must finish first"],
  "priority": 1,
  "complexity": "low | medium | high",
  "required_tools": ["tool_name"]
}"#;

/// Prompt asking the model to decompose a task into subtasks.
pub fn assemble(task: &Task, tool_names: &[String]) -> String {
    let mut prompt = String::new();
    append_task(&mut prompt, task);
    append_tools(&mut prompt, tool_names);
    append_instructions(&mut prompt);
    prompt
}

pub fn append_task(prompt: &mut String, task: &Task) {
    prompt.push_str(&format!("# Task\n\n{}\n\n", task.description.trim()));
    if !task.constraints.is_empty() {
        prompt.push_str("## Constraints\n\n");
        for constraint in &task.constraints {
            prompt.push_str(&format!("- {constraint}\n"));
        }
        prompt.push('\n');
    }
}

pub fn append_tools(prompt: &mut String, tool_names: &[String]) {
    prompt.push_str("## Available Tools\n\n");
    if tool_names.is_empty() {
        prompt.push_str("(none)\n\n");
        return;
    }
    prompt.push_str(&tool_names.join(", "));
    prompt.push_str("\n\n");
}

fn append_instructions(prompt: &mut String) {
    prompt.push_str("## Instructions\n\n");
    prompt.push_str(
        "Decompose the task into the smallest set of subtasks that fully accomplishes it. \
         Each subtask must be independently verifiable. Lower priority numbers run first; \
         use dependencies for ordering that must hold regardless of priority. \
         Only reference tools from the list above in required_tools.\n\n\
         Respond with a single JSON object and nothing else, in this form:\n\n",
    );
    prompt.push_str("```json\n{\n  \"subtasks\": [\n");
    for line in SUBTASK_SCHEMA.lines() {
        prompt.push_str("    ");
        prompt.push_str(line);
        prompt.push('\n');
    }
    prompt.push_str("  ]\n}\n```\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn includes_task_constraints_and_tools() {
        let task = Task::new(
            "Add a Multiply method",
            vec!["Do not change public signatures".into()],
        );
        let out = assemble(&task, &["read_file".into(), "edit_file".into()]);
        assert!(out.contains("# Task\n\nAdd a Multiply method"));
        assert!(out.contains("- Do not change public signatures"));
        assert!(out.contains("read_file, edit_file"));
        assert!(out.contains("\"subtasks\""));
        assert!(out.contains("definition_of_done"));
    }

    #[test]
    fn omits_empty_constraints() {
        let out = assemble(&Task::new("t", vec![]), &[]);
        assert!(!out.contains("## Constraints"));
        assert!(out.contains("(none)"));
    }
}
