//! Pull a JSON payload out of free-form model text.

struct Fence<'a> {
    lang: &'a str,
    body: &'a str,
}

/// Return the JSON payload in `text`.
///
/// Tries, in order: a fenced block tagged `json`, any fenced block whose
/// body starts with `{`, and finally the whole trimmed text.
pub fn extract_json(text: &str) -> &str {
    let fences = fenced_blocks(text);
    if let Some(fence) = fences
        .iter()
        .find(|f| f.lang.eq_ignore_ascii_case("json"))
    {
        return fence.body.trim();
    }
    if let Some(fence) = fences.iter().find(|f| f.body.trim_start().starts_with('{')) {
        return fence.body.trim();
    }
    text.trim()
}

fn fenced_blocks(text: &str) -> Vec<Fence<'_>> {
    let mut fences = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find("```") {
        let after = &rest[open + 3..];
        let line_end = after.find('\n').unwrap_or(after.len());
        let first_line = &after[..line_end];

        // ```{"a": 1}``` on a single line
        if let Some(close) = first_line.find("```") {
            fences.push(Fence {
                lang: "",
                body: &first_line[..close],
            });
            rest = &after[close + 3..];
            continue;
        }

        let body_start = &after[(line_end + 1).min(after.len())..];
        let lang = first_line.trim();
        match body_start.find("```") {
            Some(close) => {
                fences.push(Fence {
                    lang,
                    body: &body_start[..close],
                });
                rest = &body_start[close + 3..];
            }
            None => {
                // Unterminated fence, typically a truncated reply.
                fences.push(Fence {
                    lang,
                    body: body_start,
                });
                break;
            }
        }
    }
    fences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_json_is_trimmed() {
        assert_eq!(extract_json("  {\"a\": 1}\n"), "{\"a\": 1}");
    }

    #[test]
    fn json_tagged_fence_wins() {
        let text = "Here:\n```text\nnot this\n```\n```json\n{\"a\": 1}\n```\nthanks";
        assert_eq!(extract_json(text), "{\"a\": 1}");
    }

    #[test]
    fn tag_is_case_insensitive() {
        assert_eq!(extract_json("```JSON\n{\"a\": 2}\n```"), "{\"a\": 2}");
    }

    #[test]
    fn untagged_fence_with_object() {
        let text = "Plan follows\n```\n{\"subtasks\": []}\n```";
        assert_eq!(extract_json(text), "{\"subtasks\": []}");
    }

    #[test]
    fn untagged_fence_without_object_falls_back() {
        let text = "```\nls -la\n```";
        assert_eq!(extract_json(text), text);
    }

    #[test]
    fn single_line_fence() {
        assert_eq!(extract_json("```{\"a\": 3}```"), "{\"a\": 3}");
    }

    #[test]
    fn unterminated_fence_takes_remainder() {
        assert_eq!(extract_json("```json\n{\"a\": 4}\n"), "{\"a\": 4}");
    }

    #[test]
    fn empty_text() {
        assert_eq!(extract_json("   "), "");
    }
}
