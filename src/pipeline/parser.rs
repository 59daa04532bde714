//! Recover structured payloads from free-text model output.
//!
//! The model is told to answer with a bare JSON array but may wrap it in code
//! fences, prefix it with prose, or cut it short. Nothing here returns an error:
//! an unrecoverable output is `None` and the caller decides what that means.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;

/// A markdown table header separator row, e.g. `| --- | :---: |`.
static TABLE_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\|?\s*:?-{3,}:?\s*(\|\s*:?-{3,}:?\s*)*\|?\s*$").unwrap()
});

/// Remove a leading fence line (```` ``` ```` or ```` ```json ````) and a trailing fence.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if text.starts_with("```") {
        text = match text.find('\n') {
            Some(newline) => &text[newline + 1..],
            None => text.trim_start_matches('`'),
        };
    }
    if let Some(stripped) = text.trim_end().strip_suffix("```") {
        text = stripped;
    }
    text.trim()
}

/// Locate a JSON array in model output.
///
/// Starts at the first `[` and tries closing brackets from the last one
/// backwards, returning the longest span that decodes as a JSON array. If the
/// first `[` yields nothing (e.g. a citation like `[1]` is not the payload
/// and the payload is truncated), later openings are tried the same way.
pub fn extract_json_array(raw: &str) -> Option<String> {
    let body = strip_code_fences(raw);
    let closes: Vec<usize> = body.match_indices(']').map(|(i, _)| i).collect();

    for (start, _) in body.match_indices('[') {
        for &end in closes.iter().rev().filter(|&&end| end > start) {
            let candidate = &body[start..=end];
            if let Ok(serde_json::Value::Array(_)) = serde_json::from_str(candidate) {
                return Some(candidate.to_string());
            }
        }
    }
    None
}

/// Decode the located array item by item, skipping items that do not fit `T`.
pub fn parse_array_lenient<T: DeserializeOwned>(raw: &str) -> Option<Vec<T>> {
    let span = extract_json_array(raw)?;
    let items: Vec<serde_json::Value> = serde_json::from_str(&span).ok()?;
    Some(
        items
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect(),
    )
}

/// Split output that mixes a narrative with a table or JSON array.
///
/// The summary is every line before the first line that opens a markdown
/// table (`|`), a JSON array (`[`), or a code fence. The remainder is the
/// table markup, with fences stripped and a missing header separator restored.
pub fn split_narrative_and_table(raw: &str) -> (String, String) {
    let mut offset = 0;
    for line in raw.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with('|') || trimmed.starts_with('[') || trimmed.starts_with("```") {
            let summary = raw[..offset].trim().to_string();
            let payload = strip_code_fences(&raw[offset..]);
            return (summary, repair_markdown_table(payload));
        }
        offset += line.len();
    }
    (raw.trim().to_string(), String::new())
}

/// Ensure a markdown table has a header separator row matching the header's
/// column count. Non-table input is returned unchanged.
pub fn repair_markdown_table(table: &str) -> String {
    let lines: Vec<&str> = table.lines().collect();
    let Some(header) = lines.first() else {
        return table.to_string();
    };
    if !header.trim_start().starts_with('|') {
        return table.to_string();
    }

    let columns = count_columns(header);
    let separator_ok = lines
        .get(1)
        .map(|line| TABLE_SEPARATOR.is_match(line) && count_columns(line) == columns)
        .unwrap_or(false);
    if separator_ok {
        return table.to_string();
    }

    let separator = format!("|{}", " --- |".repeat(columns));
    let has_bad_separator = lines
        .get(1)
        .map(|line| TABLE_SEPARATOR.is_match(line))
        .unwrap_or(false);
    let body_start = if has_bad_separator { 2 } else { 1 };

    let mut repaired = Vec::with_capacity(lines.len() + 1);
    repaired.push(header.to_string());
    repaired.push(separator);
    repaired.extend(lines.iter().skip(body_start).map(|l| l.to_string()));
    repaired.join("\n")
}

fn count_columns(row: &str) -> usize {
    let inner = row.trim();
    let inner = inner.strip_prefix('|').unwrap_or(inner);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn decoded(span: Option<String>) -> serde_json::Value {
        serde_json::from_str(&span.expect("array located")).unwrap()
    }

    #[test]
    fn fenced_array() {
        let span = extract_json_array("```json\n[{\"a\":1}]\n```");
        assert_eq!(decoded(span), serde_json::json!([{"a": 1}]));
    }

    #[test]
    fn bare_fence_without_language() {
        let span = extract_json_array("```\n[\"x\", \"y\"]\n```");
        assert_eq!(decoded(span), serde_json::json!(["x", "y"]));
    }

    #[test]
    fn no_array_is_none() {
        assert_eq!(extract_json_array("no array here"), None);
        assert_eq!(extract_json_array(""), None);
    }

    #[test]
    fn prose_around_array_is_ignored() {
        let span = extract_json_array(r#"Summary text. [{"a":1},{"b":2}] trailing"#);
        assert_eq!(span.as_deref(), Some(r#"[{"a":1},{"b":2}]"#));
    }

    #[test]
    fn nested_brackets_take_longest_span() {
        let raw = r#"[{"requirement":"Bolts [A325]","tags":["a","b"]}]"#;
        let span = extract_json_array(raw);
        assert_eq!(span.as_deref(), Some(raw));
    }

    #[test]
    fn trailing_bracket_in_prose_does_not_break_match() {
        let raw = r#"Here: ["one", "two"] (see note [3]"#;
        let span = extract_json_array(raw);
        assert_eq!(decoded(span), serde_json::json!(["one", "two"]));
    }

    #[test]
    fn truncated_array_is_none() {
        assert_eq!(extract_json_array(r#"[{"a":1},{"b":"#), None);
    }

    #[test]
    fn citation_before_truncated_payload() {
        // "[1]" is itself a valid array and is the only complete one.
        let span = extract_json_array(r#"Per [1]: [{"a":"#);
        assert_eq!(span.as_deref(), Some("[1]"));
    }

    #[test]
    fn json_object_is_not_an_array() {
        assert_eq!(extract_json_array(r#"{"a":[}"#), None);
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        name: String,
    }

    #[test]
    fn lenient_parse_skips_bad_items() {
        let raw = r#"[{"name":"ok"},{"other":1},{"name":"also ok"}]"#;
        let items: Vec<Item> = parse_array_lenient(raw).unwrap();
        assert_eq!(
            items,
            vec![
                Item { name: "ok".into() },
                Item {
                    name: "also ok".into()
                }
            ]
        );
    }

    #[test]
    fn lenient_parse_none_without_array() {
        assert!(parse_array_lenient::<Item>("nothing").is_none());
    }

    #[test]
    fn split_narrative_from_table() {
        let raw = "Most items comply.\nTwo do not.\n| Requirement | Compliant |\n| --- | --- |\n| A | yes |";
        let (summary, table) = split_narrative_and_table(raw);
        assert_eq!(summary, "Most items comply.\nTwo do not.");
        assert!(table.starts_with("| Requirement | Compliant |"));
        assert_eq!(table.lines().count(), 3);
    }

    #[test]
    fn split_narrative_from_fenced_array() {
        let raw = "Overall compliant.\n```json\n[{\"a\":1}]\n```";
        let (summary, payload) = split_narrative_and_table(raw);
        assert_eq!(summary, "Overall compliant.");
        assert_eq!(payload, "[{\"a\":1}]");
    }

    #[test]
    fn split_without_marker_is_all_summary() {
        let (summary, payload) = split_narrative_and_table("  3 of 4 requirements comply. ");
        assert_eq!(summary, "3 of 4 requirements comply.");
        assert!(payload.is_empty());
    }

    #[test]
    fn split_inserts_missing_separator() {
        let raw = "Summary.\n| Requirement | Provided | Compliant |\n| A | B | yes |";
        let (_, table) = split_narrative_and_table(raw);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[1], "| --- | --- | --- |");
        assert_eq!(lines[2], "| A | B | yes |");
    }

    #[test]
    fn repair_replaces_mismatched_separator() {
        let table = "| a | b | c |\n| --- | --- |\n| 1 | 2 | 3 |";
        let repaired = repair_markdown_table(table);
        let lines: Vec<&str> = repaired.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "| --- | --- | --- |");
    }

    #[test]
    fn repair_keeps_valid_table() {
        let table = "| a | b |\n|:---|---:|\n| 1 | 2 |";
        assert_eq!(repair_markdown_table(table), table);
    }

    #[test]
    fn repair_ignores_non_table() {
        assert_eq!(repair_markdown_table("[1,2]"), "[1,2]");
        assert_eq!(repair_markdown_table(""), "");
    }

    #[test]
    fn strip_fences_handles_plain_text() {
        assert_eq!(strip_code_fences("  plain  "), "plain");
        assert_eq!(strip_code_fences("```json\n[]\n```"), "[]");
    }
}
