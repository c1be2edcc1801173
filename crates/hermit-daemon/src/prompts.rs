//! Prompt templates for the one-shot routes.

/// Commit-message prompt for `scribe`.
pub fn scribe_prompt(diff: &str) -> String {
    format!(
        "Based on the following git diff, generate a conventional commit message. \
         Only output the commit message itself, with no conversational text.\n\n\
         Diff:\n```diff\n{diff}\n```"
    )
}

/// Diagnosis prompt for `diagnose`.
pub fn diagnose_prompt(error_log: &str, source_code: Option<&str>, language: Option<&str>) -> String {
    let source_block = match source_code {
        Some(code) => format!("```\n{code}\n```"),
        None => "Not provided.".to_string(),
    };
    format!(
        "You are an expert debugging assistant. Analyze the error log below and provide a \
         helpful diagnosis.\n\
         1. Explain the root cause of the error in simple terms.\n\
         2. Provide a clear, numbered list of the most likely solutions.\n\
         - File extension: `{}`\n\
         - Source code: {source_block}\n\
         - Error log to analyze:\n```\n{error_log}\n```",
        language.unwrap_or("not available"),
    )
}
