use crate::prompt::NO_NEW_MEMORIES;
use anyhow::Context;

/// Drop a surrounding markdown code fence, if any.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse the selection reply: a JSON array of strings, possibly fenced or
/// wrapped in prose.
pub fn parse_selection(raw: &str) -> anyhow::Result<Vec<String>> {
    let body = strip_code_fence(raw);
    let start = body.find('[');
    let end = body.rfind(']');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => anyhow::bail!("selection reply holds no JSON array"),
    };
    serde_json::from_str(json).context("selection reply is not a JSON array of strings")
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    for bullet in ["- ", "* ", "• "] {
        if let Some(rest) = line.strip_prefix(bullet) {
            return rest.trim();
        }
    }
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return rest.trim();
        }
    }
    line
}

/// Lead-in prose or a markdown heading rather than a statement.
fn is_heading(line: &str) -> bool {
    line.starts_with('#') || line.ends_with(':')
}

/// Parse the extraction reply: one statement per line, or the sentinel
/// meaning nothing was learned.
pub fn parse_extraction(raw: &str, max: usize) -> Vec<String> {
    let body = strip_code_fence(raw);
    let sentinel = NO_NEW_MEMORIES.trim_end_matches('.').to_lowercase();
    if body.is_empty() || body.to_lowercase().starts_with(&sentinel) {
        return Vec::new();
    }
    body.lines()
        .map(strip_list_marker)
        .filter(|line| !line.is_empty() && !is_heading(line))
        .map(str::to_string)
        .take(max)
        .collect()
}
