//! Helpers for digging structured data out of generation gateway responses.
//!
//! Model output arrives with markdown fences, commentary, smart quotes, and
//! trailing commas often enough that every JSON consumer in the pipeline
//! goes through these.

use serde::de::DeserializeOwned;

/// Strip markdown code fences from a response
pub(crate) fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let clean = if trimmed.starts_with("```json") {
        trimmed.strip_prefix("```json").unwrap_or(trimmed)
    } else if trimmed.starts_with("```") {
        trimmed.strip_prefix("```").unwrap_or(trimmed)
    } else {
        trimmed
    };
    let clean = if clean.ends_with("```") {
        clean.strip_suffix("```").unwrap_or(clean)
    } else {
        clean
    };
    clean.trim()
}

/// Extract a JSON fragment between matching delimiters
fn extract_json_fragment(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if start <= end {
        Some(&text[start..=end])
    } else {
        None
    }
}

/// Extract the outermost JSON object from a response, handling fences and noise
pub(crate) fn extract_json_object(response: &str) -> Option<&str> {
    let clean = strip_markdown_fences(response);
    extract_json_fragment(clean, '{', '}')
}

/// Fix common JSON issues in model responses
pub(crate) fn fix_json_issues(json: &str) -> String {
    let mut fixed = json.to_string();

    // Trailing commas before ] or }
    fixed = fixed.replace(",]", "]");
    fixed = fixed.replace(",}", "}");

    // Smart quotes to regular quotes
    fixed = fixed.replace('\u{201C}', "\"");
    fixed = fixed.replace('\u{201D}', "\"");
    fixed = fixed.replace('\u{2018}', "'");
    fixed = fixed.replace('\u{2019}', "'");

    // Control characters that slipped in
    fixed = fixed
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();

    fixed
}

/// Parse a JSON object out of a model response, retrying once with local
/// repair of common issues. Returns an error when no object is present or
/// the repaired text still fails to parse.
pub(crate) fn parse_json_lenient<T>(response: &str, context_hint: &str) -> anyhow::Result<T>
where
    T: DeserializeOwned,
{
    let json_str = extract_json_object(response)
        .ok_or_else(|| anyhow::anyhow!("no JSON object found in {} response", context_hint))?;

    match serde_json::from_str::<T>(json_str) {
        Ok(parsed) => Ok(parsed),
        Err(initial_error) => {
            let fixed = fix_json_issues(json_str);
            serde_json::from_str::<T>(&fixed).map_err(|_| {
                anyhow::anyhow!(
                    "invalid JSON in {} response: {}",
                    context_hint,
                    initial_error
                )
            })
        }
    }
}

/// Truncate text for prompt safety, keeping beginning and end
pub(crate) fn truncate_content(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        content.to_string()
    } else {
        let head: String = content.chars().take(max_chars / 2).collect();
        let tail: String = content
            .chars()
            .rev()
            .take(max_chars / 2)
            .collect::<String>()
            .chars()
            .rev()
            .collect();
        format!("{}\n\n... [truncated] ...\n\n{}", head, tail)
    }
}

/// Truncate a string for display (Unicode-safe)
pub(crate) fn truncate_str(s: &str, max_chars: usize) -> &str {
    if s.chars().count() <= max_chars {
        s
    } else {
        let byte_idx = s
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(s.len());
        &s[..byte_idx]
    }
}
