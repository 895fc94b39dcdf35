//! Response parsing for LLM outputs.
//!
//! Extracts SQL from LLM responses that may wrap it in markdown code blocks.

/// Extracts the SQL statement from an LLM response.
///
/// Looks for SQL in the following formats:
/// - ```sql ... ```
/// - ``` ... ``` (no language specified)
///
/// If multiple code blocks are found, uses the first one. Without a code
/// block the whole response is taken to be SQL.
pub fn extract_sql(response: &str) -> String {
    extract_code_block(response, "sql")
        .or_else(|| extract_code_block(response, ""))
        .unwrap_or_else(|| response.to_string())
        .trim()
        .to_string()
}

/// Extracts content from a markdown code block with the specified language.
///
/// Pass an empty string for `lang` to match blocks without a language specifier.
fn extract_code_block(text: &str, lang: &str) -> Option<String> {
    let mut rest = text;

    while let Some(start_idx) = rest.find("```") {
        let after_fence = &rest[start_idx + 3..];

        // Find the newline after the opening fence
        let newline = after_fence.find('\n')?;
        let info = after_fence[..newline].trim();
        let body = &after_fence[newline + 1..];

        // Find the closing fence
        let end_idx = body.find("```")?;
        if info.eq_ignore_ascii_case(lang) {
            return Some(body[..end_idx].to_string());
        }

        rest = &body[end_idx + 3..];
    }

    None
}
