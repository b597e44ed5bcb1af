//! LLM-assisted content tools.
//!
//! Code generation, explanation, refactoring, documentation, and test
//! generation. Each tool builds a structured prompt enriched with the
//! parser's structural hints, requests a completion through the injected
//! LLM manager, and always carries a deterministic local fallback — a
//! missing or failing provider downgrades the result, never the response.

mod documentation;
mod explanation;
mod generation;
mod refactoring;
mod test_generation;

pub use documentation::DocumentationTool;
pub use explanation::CodeExplanationTool;
pub use generation::CodeGenerationTool;
pub use refactoring::RefactoringTool;
pub use test_generation::TestGenerationTool;

/// Strips a single markdown code fence wrapping `text`, if any.
pub(crate) fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    // Drop the language marker line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.strip_suffix("```")
        .unwrap_or(body)
        .trim_end()
        .to_string()
}

/// The comment leader for a language.
pub(crate) fn comment_prefix(language: &str) -> &'static str {
    match language {
        "python" | "ruby" | "shell" | "yaml" | "dockerfile" | "terraform" => "#",
        _ => "//",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```python\nx = 1\n```"), "x = 1");
        assert_eq!(strip_code_fence("```\nx = 1\n```"), "x = 1");
        assert_eq!(strip_code_fence("x = 1"), "x = 1");
    }

    #[test]
    fn test_comment_prefix() {
        assert_eq!(comment_prefix("python"), "#");
        assert_eq!(comment_prefix("typescript"), "//");
    }
}
