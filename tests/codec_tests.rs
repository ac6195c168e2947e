//! Tests for the process-wide character map. The map is load-once state,
//! so every test funnels through the same init helper.

use rust_novel_ingest::codec;
use std::sync::Once;

static INIT: Once = Once::new();

fn init_codec() {
    INIT.call_once(|| {
        let mut path = std::env::temp_dir();
        path.push(format!("ingest_codec_test_{}.json", std::process::id()));
        std::fs::write(&path, r#"{"97":"a","98":"x","58344":"的"}"#).unwrap();
        codec::init(path.to_str().unwrap());
        let _ = std::fs::remove_file(&path);
    });
}

#[test]
fn mapped_code_points_are_substituted() {
    init_codec();
    assert_eq!(codec::decode("a"), "a");
    assert_eq!(codec::decode("b"), "x");
    assert_eq!(codec::decode("\u{e3e8}"), "的");
}

#[test]
fn unmapped_characters_pass_through() {
    init_codec();
    assert_eq!(codec::decode("zq 标题"), "zq 标题");
}

#[test]
fn empty_input_decodes_to_empty() {
    init_codec();
    assert_eq!(codec::decode(""), "");
}

#[test]
fn chapter_content_is_decoded_per_paragraph() {
    init_codec();
    let html = "<p>ab</p><p>plain</p>";
    assert_eq!(codec::parse_chapter_content(html), vec!["ax", "plain"]);
}
