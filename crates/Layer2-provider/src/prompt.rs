//! Prompt building and reasoning-model output parsing

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

/// Build the question prompt; the context variant asks the model to stay on it
pub fn build_think_prompt(question: &str, context: Option<&str>) -> String {
    match context.map(str::trim).filter(|c| !c.is_empty()) {
        Some(context) => format!(
            "Context: {}\n\nQuestion: {}\n\nPlease provide a concise and accurate answer based on the context provided.",
            context, question
        ),
        None => format!(
            "Question: {}\n\nPlease provide a concise and accurate answer based on your knowledge.",
            question
        ),
    }
}

/// Split a reasoning-model response into `(thinking, answer)`.
///
/// Every `<think>...</think>` block goes to `thinking` (joined by a blank
/// line); an unclosed `<think>` swallows the rest of the text. Both parts are
/// trimmed.
pub fn split_think_content(text: &str) -> (String, String) {
    let mut thinking: Vec<&str> = Vec::new();
    let mut answer = String::new();
    let mut rest = text;

    while let Some(start) = rest.find(THINK_OPEN) {
        answer.push_str(&rest[..start]);
        let inner = &rest[start + THINK_OPEN.len()..];
        match inner.find(THINK_CLOSE) {
            Some(end) => {
                thinking.push(inner[..end].trim());
                rest = &inner[end + THINK_CLOSE.len()..];
            }
            None => {
                thinking.push(inner.trim());
                rest = "";
            }
        }
    }
    answer.push_str(rest);

    let thinking = thinking
        .into_iter()
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    (thinking, answer.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_with_and_without_context() {
        let p = build_think_prompt("Why?", Some("Because."));
        assert!(p.starts_with("Context: Because."));
        assert!(p.contains("Question: Why?"));

        let p = build_think_prompt("Why?", Some("   "));
        assert!(p.starts_with("Question: Why?"));
        assert!(p.contains("based on your knowledge"));
    }

    #[test]
    fn test_split_think_content() {
        let (thinking, answer) =
            split_think_content("<think>\nLet me see.\n</think>\n\nThe answer is 4.");
        assert_eq!(thinking, "Let me see.");
        assert_eq!(answer, "The answer is 4.");
    }

    #[test]
    fn test_split_without_think_block() {
        let (thinking, answer) = split_think_content("  plain answer ");
        assert_eq!(thinking, "");
        assert_eq!(answer, "plain answer");
    }

    #[test]
    fn test_split_multiple_and_unclosed() {
        let (thinking, answer) =
            split_think_content("a <think>one</think> b <think>two</think> c");
        assert_eq!(thinking, "one\n\ntwo");
        assert_eq!(answer, "a  b  c");

        let (thinking, answer) = split_think_content("intro <think>never closed");
        assert_eq!(thinking, "never closed");
        assert_eq!(answer, "intro");
    }
}
