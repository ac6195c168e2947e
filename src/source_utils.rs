//! Hydration-state extraction shared by the fetch tasks.
//!
//! The source site server-renders its pages and embeds the client
//! bootstrap state as a literal assignment inside a script tag:
//! `window.__INITIAL_STATE__={...}`. Rather than evaluating the script,
//! the object literal after the `=` is captured with a balanced-brace
//! scan and parsed as JSON.

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

const STATE_MARKER: &str = "window.__INITIAL_STATE__";

/// Extract the hydration state object from a full HTML document.
///
/// Scans every script tag that mentions the assignment marker and returns
/// the first state object that parses. Returns `None` when no script
/// carries the state; a page without it is a normal condition, not an
/// error. A script that matches the marker but fails to parse is logged
/// and skipped so one malformed tag does not end the scan.
pub fn extract_initial_state(html: &str) -> Option<Value> {
    let document = Html::parse_document(html);
    let script_selector = Selector::parse("script").unwrap();

    for script in document.select(&script_selector) {
        let content: String = script.text().collect();
        if !content.contains(STATE_MARKER) {
            continue;
        }
        let Some(literal) = state_literal(&content) else {
            log::warn!("script tag mentions {} but carries no object literal", STATE_MARKER);
            continue;
        };
        match serde_json::from_str::<Value>(literal) {
            Ok(state) => return Some(state),
            Err(e) => log::warn!("failed to parse hydration state literal: {}", e),
        }
    }

    None
}

/// Locate the object literal assigned to the state marker within one
/// script body. Tolerates whitespace around the `=` and any trailing
/// statements after the literal.
fn state_literal(script: &str) -> Option<&str> {
    let re = Regex::new(r"window\.__INITIAL_STATE__\s*=\s*").ok()?;
    let assignment = re.find(script)?;
    json_object_prefix(&script[assignment.end()..])
}

/// Return the leading balanced `{...}` of `s`, honoring string literals
/// and escape sequences so braces inside values do not end the scan.
fn json_object_prefix(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    if bytes.first() != Some(&b'{') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_none_without_marker() {
        let html = "<html><head><script>var a = 1;</script></head><body></body></html>";
        assert!(extract_initial_state(html).is_none());
    }

    #[test]
    fn extracts_simple_state() {
        let html = r#"<html><script>window.__INITIAL_STATE__={"page":{"bookName":"Test"}};</script></html>"#;
        let state = extract_initial_state(html).unwrap();
        assert_eq!(state["page"]["bookName"], "Test");
    }

    #[test]
    fn tolerates_trailing_statements() {
        let html = r#"<script>window.__INITIAL_STATE__ = {"a":1};(function(){window.x={};})();</script>"#;
        let state = extract_initial_state(html).unwrap();
        assert_eq!(state["a"], 1);
    }

    #[test]
    fn braces_and_quotes_inside_strings_do_not_break_the_scan() {
        let html = r#"<script>window.__INITIAL_STATE__={"title":"a } \" { b","n":2};</script>"#;
        let state = extract_initial_state(html).unwrap();
        assert_eq!(state["title"], "a } \" { b");
        assert_eq!(state["n"], 2);
    }

    #[test]
    fn malformed_script_does_not_abort_the_scan() {
        let html = concat!(
            r#"<script>window.__INITIAL_STATE__=notjson;</script>"#,
            r#"<script>window.__INITIAL_STATE__={"ok":true};</script>"#
        );
        let state = extract_initial_state(html).unwrap();
        assert_eq!(state["ok"], true);
    }

    #[test]
    fn first_parseable_state_wins() {
        let html = concat!(
            r#"<script>window.__INITIAL_STATE__={"first":1};</script>"#,
            r#"<script>window.__INITIAL_STATE__={"second":2};</script>"#
        );
        let state = extract_initial_state(html).unwrap();
        assert_eq!(state["first"], 1);
    }

    #[test]
    fn unterminated_literal_is_rejected() {
        assert!(json_object_prefix(r#"{"a": {"b": 1}"#).is_none());
        assert!(json_object_prefix("notjson").is_none());
    }
}
