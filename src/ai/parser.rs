//! Tolerant parsing of free-form model output into an [`EnrichmentResult`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::EnrichmentResult;

pub const MAX_TAGS: usize = 5;
pub const MAX_TAG_WORDS: usize = 4;
pub const DESCRIPTION_PLACEHOLDER: &str = "Content summary not available";

/// From the first `{` to the last `}`, across newlines.
static BRACE_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("static regex"));

/// Trim, collapse inner whitespace, drop empty or overlong tags, keep at most five.
pub fn clean_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .filter_map(|tag| {
            let words = tag.as_ref().split_whitespace().collect::<Vec<_>>();
            if words.is_empty() || words.len() > MAX_TAG_WORDS {
                None
            } else {
                Some(words.join(" "))
            }
        })
        .take(MAX_TAGS)
        .collect()
}

fn parse_structured(raw: &str) -> Option<EnrichmentResult> {
    let block = BRACE_BLOCK.find(raw)?;
    let data: Value = match serde_json::from_str(block.as_str()) {
        Ok(v) => v,
        Err(err) => {
            log::debug!("model output is not valid json: {err}");
            return None;
        }
    };

    let description = data.get("description")?.as_str()?.trim().to_string();
    let tags = match data.get("tags")? {
        Value::Array(items) => clean_tags(items.iter().filter_map(Value::as_str)),
        Value::String(joined) => clean_tags(joined.split(',')),
        _ => Vec::new(),
    };
    let author = data
        .get("author")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();

    Some(EnrichmentResult {
        description,
        tags,
        author,
    })
}

fn field_after<'a>(line: &'a str, prefixes: &[&str]) -> Option<&'a str> {
    prefixes
        .iter()
        .find_map(|prefix| line.strip_prefix(prefix))
        .map(str::trim)
}

fn parse_lines(raw: &str) -> EnrichmentResult {
    let mut description = None;
    let mut tags = None;
    let mut author = None;

    for line in raw.lines().map(str::trim) {
        if description.is_none() {
            if let Some(value) = field_after(line, &["Description:", "Summary:"]) {
                description = Some(value.to_string());
                continue;
            }
        }
        if tags.is_none() {
            if let Some(value) = field_after(line, &["Tags:"]) {
                tags = Some(clean_tags(value.split(',')));
                continue;
            }
        }
        if author.is_none() {
            if let Some(value) = field_after(line, &["Author:"]) {
                author = Some(value.to_string());
            }
        }
    }

    EnrichmentResult {
        description: description.unwrap_or_default(),
        tags: tags.unwrap_or_default(),
        author: author.unwrap_or_default(),
    }
}

/// Never fails: structured block first, then `Key: value` lines, then placeholders.
pub fn parse_response(raw: &str) -> EnrichmentResult {
    let mut result = parse_structured(raw).unwrap_or_else(|| parse_lines(raw));

    if result.description.is_empty() {
        result.description = DESCRIPTION_PLACEHOLDER.to_string();
    }

    result
}
