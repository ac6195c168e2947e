//! Deobfuscation codec for chapter body text.
//!
//! The source site substitutes common characters with private code points
//! rendered through a custom font. The reverse mapping ships as a JSON
//! file keyed by decimal code point. The map is loaded once per process
//! and shared read-only across all handler invocations.

use scraper::{Html, Selector};
use std::collections::HashMap;
use std::fs;
use std::sync::OnceLock;

static CHAR_MAP: OnceLock<HashMap<u32, char>> = OnceLock::new();

/// Load the character map once. Safe to call more than once; only the
/// first call reads the file. A missing or malformed file leaves the
/// codec in pass-through mode rather than failing ingestion.
pub fn init(path: &str) {
    CHAR_MAP.get_or_init(|| load_map(path));
}

fn load_map(path: &str) -> HashMap<u32, char> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            log::warn!("character map {} unavailable, decoding disabled: {}", path, e);
            return HashMap::new();
        }
    };
    let entries: HashMap<String, String> = match serde_json::from_str(&raw) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("character map {} is malformed, decoding disabled: {}", path, e);
            return HashMap::new();
        }
    };

    let mut map = HashMap::with_capacity(entries.len());
    for (code, replacement) in entries {
        let (Ok(code), Some(ch)) = (code.parse::<u32>(), replacement.chars().next()) else {
            log::warn!("ignoring malformed character map entry {:?}", code);
            continue;
        };
        map.insert(code, ch);
    }
    log::info!("loaded {} character substitutions from {}", map.len(), path);
    map
}

/// Decode obfuscated text using the process-wide map. Characters without
/// a mapping pass through unchanged; with no map loaded the input is
/// returned as-is.
pub fn decode(raw: &str) -> String {
    match CHAR_MAP.get() {
        Some(map) if !map.is_empty() => decode_with(map, raw),
        _ => raw.to_string(),
    }
}

/// Per-character substitution against an explicit map.
pub fn decode_with(map: &HashMap<u32, char>, raw: &str) -> String {
    raw.chars()
        .map(|c| map.get(&(c as u32)).copied().unwrap_or(c))
        .collect()
}

/// Split chapter body HTML into decoded, ordered, non-empty paragraphs,
/// one per source `<p>` element.
pub fn parse_chapter_content(html: &str) -> Vec<String> {
    let fragment = Html::parse_fragment(html);
    let p_selector = Selector::parse("p").unwrap();

    let mut paragraphs = Vec::new();
    for p in fragment.select(&p_selector) {
        let text: String = p.text().collect();
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        paragraphs.push(decode(text));
    }
    paragraphs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(u32, char)]) -> HashMap<u32, char> {
        entries.iter().copied().collect()
    }

    #[test]
    fn decode_with_substitutes_mapped_characters() {
        let m = map(&[(97, 'a'), (98, 'x')]);
        assert_eq!(decode_with(&m, "a"), "a");
        assert_eq!(decode_with(&m, "b"), "x");
        assert_eq!(decode_with(&m, "abc"), "axc");
    }

    #[test]
    fn decode_with_passes_unmapped_through() {
        let m = map(&[(58344, '的')]);
        assert_eq!(decode_with(&m, "plain text"), "plain text");
        assert_eq!(decode_with(&m, "\u{e3e8}"), "的");
    }

    #[test]
    fn decode_with_empty_input() {
        let m = map(&[(97, 'a')]);
        assert_eq!(decode_with(&m, ""), "");
    }

    #[test]
    fn paragraph_split_preserves_order_and_drops_empties() {
        let html = "<p>first</p><p>  </p><p>second</p><div>not a paragraph</div><p>third</p>";
        let got = parse_chapter_content(html);
        assert_eq!(got, vec!["first", "second", "third"]);
    }

    #[test]
    fn paragraph_split_of_empty_body() {
        assert!(parse_chapter_content("").is_empty());
        assert!(parse_chapter_content("<div>no paragraphs</div>").is_empty());
    }
}
