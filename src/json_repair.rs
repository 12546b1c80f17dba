// src/json_repair.rs
// Robust JSON argument parsing (§4.7): tool-call argument JSON is produced by
// an imperfect model and may arrive truncated or fenced.

use serde_json::Value;

/// Parses `raw` as a tool-call argument blob, attempting a fixed sequence of
/// repairs before giving up. Empty input yields the empty object.
pub fn robust_json_parse(raw: &str) -> Result<Value, serde_json::Error> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }

    let unfenced = strip_fence(trimmed);

    if let Ok(v) = serde_json::from_str(unfenced) {
        return Ok(v);
    }

    let repairs = [
        format!("{unfenced}\""),
        format!("{unfenced}\"}}"),
        format!("{unfenced}}}"),
        format!("{unfenced}\"]"),
        format!("{unfenced}]"),
    ];

    for candidate in &repairs {
        if let Ok(v) = serde_json::from_str(candidate) {
            return Ok(v);
        }
    }

    // Return the original parse error, not one from a repair attempt.
    serde_json::from_str(unfenced)
}

fn strip_fence(s: &str) -> &str {
    let mut lines = s.lines();
    let Some(first) = lines.clone().next() else {
        return s;
    };
    if !first.trim_start().starts_with("```") {
        return s;
    }

    let rest: Vec<&str> = s.lines().collect();
    if rest.len() < 2 {
        return s;
    }
    let Some(last) = rest.last() else { return s };
    if last.trim() != "```" {
        return s;
    }

    let body = &rest[1..rest.len() - 1];
    // Safe: body is a contiguous sub-slice of the original lines; we hand
    // back a re-joined owned-free view by trimming the original string
    // between the fence markers instead of allocating here would be nicer,
    // but repair is rare enough that this keeps the function a pure slice op.
    let start = s.find('\n').map(|i| i + 1).unwrap_or(s.len());
    let end = s.rfind("```").unwrap_or(s.len());
    let _ = body;
    s[start..end].trim_end_matches('\n')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_json_unchanged() {
        let v = robust_json_parse(r#"{"path":"a.txt","recursive":false}"#).unwrap();
        assert_eq!(v["path"], "a.txt");
        assert_eq!(v["recursive"], false);
    }

    #[test]
    fn empty_input_yields_empty_object() {
        let v = robust_json_parse("").unwrap();
        assert_eq!(v, serde_json::json!({}));
    }

    #[test]
    fn repairs_missing_closing_quote_and_brace() {
        // scenario E
        let v = robust_json_parse(r#"{"path":"a.txt"#).unwrap();
        assert_eq!(v["path"], "a.txt");
    }

    #[test]
    fn repairs_missing_closing_brace_only() {
        let v = robust_json_parse(r#"{"path":"a.txt""#).unwrap();
        assert_eq!(v["path"], "a.txt");
    }

    #[test]
    fn strips_code_fence() {
        let v = robust_json_parse("```\n{\"a\":1}\n```").unwrap();
        assert_eq!(v["a"], 1);
    }

    #[test]
    fn gives_up_with_original_error_when_unrepairable() {
        let err = robust_json_parse("not json at all {{{").unwrap_err();
        // Just confirm we surface *a* parse error, not a panic or repaired nonsense.
        assert!(err.to_string().len() > 0);
    }
}
