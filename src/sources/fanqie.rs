//! Typed views of the fanqienovel.com hydration state.
//!
//! Only the fields the pipeline consumes are modeled; everything else in
//! the state object is ignored. All fields are optional because the site
//! does not guarantee any of them.

use serde::Deserialize;
use serde_json::Value;

pub const BASE_URL: &str = "https://fanqienovel.com";

pub fn book_page_url(fanqie_book_id: &str) -> String {
    format!("{}/page/{}", BASE_URL, fanqie_book_id)
}

pub fn reader_url(fanqie_chapter_id: &str) -> String {
    format!("{}/reader/{}", BASE_URL, fanqie_chapter_id)
}

/// Cookie presented when re-fetching a locked chapter.
pub fn session_cookie(session_id: &str) -> String {
    format!("sessionid={}", session_id)
}

#[derive(Debug, Default, Deserialize)]
pub struct CatalogState {
    #[serde(default)]
    pub page: CatalogPage,
}

#[derive(Debug, Default, Deserialize)]
pub struct CatalogPage {
    #[serde(default, rename = "bookName")]
    pub book_name: Option<String>,

    #[serde(default, rename = "authorName")]
    pub author_name: Option<String>,

    /// Outer list is one entry per volume, in site order; inner list is
    /// that volume's chapters, in site order.
    #[serde(default, rename = "chapterListWithVolume")]
    pub chapter_list_with_volume: Vec<Vec<CatalogChapter>>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct CatalogChapter {
    #[serde(default)]
    pub volume_name: Option<String>,

    #[serde(default, rename = "itemId")]
    pub item_id: Option<Value>,

    #[serde(default)]
    pub title: Option<String>,
}

impl CatalogChapter {
    /// The site serves itemId as either a JSON number or a string.
    pub fn item_id(&self) -> Option<String> {
        match &self.item_id {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl CatalogState {
    pub fn from_value(state: &Value) -> Self {
        match serde_json::from_value(state.clone()) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("catalog state had unexpected shape: {}", e);
                Self::default()
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReaderState {
    #[serde(default)]
    pub reader: ReaderPage,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReaderPage {
    #[serde(default, rename = "chapterData")]
    pub chapter_data: ChapterData,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChapterData {
    #[serde(default, rename = "isChapterLock")]
    pub is_chapter_lock: Option<bool>,

    /// Raw chapter body HTML, obfuscated.
    #[serde(default)]
    pub content: Option<String>,

    #[serde(default)]
    pub title: Option<String>,
}

impl ReaderState {
    pub fn from_value(state: &Value) -> Self {
        match serde_json::from_value(state.clone()) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("reader state had unexpected shape: {}", e);
                Self::default()
            }
        }
    }

    pub fn is_locked(&self) -> bool {
        self.reader.chapter_data.is_chapter_lock.unwrap_or(false)
    }

    /// Body HTML when present and non-empty.
    pub fn body_html(&self) -> Option<&str> {
        match self.reader.chapter_data.content.as_deref() {
            Some(html) if !html.trim().is_empty() => Some(html),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn item_id_accepts_number_and_string() {
        let numeric = CatalogChapter {
            item_id: Some(json!(7143038691974324_i64)),
            ..Default::default()
        };
        assert_eq!(numeric.item_id().as_deref(), Some("7143038691974324"));

        let string = CatalogChapter {
            item_id: Some(json!("c1")),
            ..Default::default()
        };
        assert_eq!(string.item_id().as_deref(), Some("c1"));

        let empty = CatalogChapter {
            item_id: Some(json!("")),
            ..Default::default()
        };
        assert_eq!(empty.item_id(), None);
        assert_eq!(CatalogChapter::default().item_id(), None);
    }

    #[test]
    fn catalog_state_tolerates_missing_fields() {
        let state = CatalogState::from_value(&json!({"page": {}}));
        assert!(state.page.book_name.is_none());
        assert!(state.page.chapter_list_with_volume.is_empty());

        let unrelated = CatalogState::from_value(&json!({"something": "else"}));
        assert!(unrelated.page.book_name.is_none());
    }

    #[test]
    fn reader_state_reads_lock_and_body() {
        let locked = ReaderState::from_value(&json!({
            "reader": {"chapterData": {"isChapterLock": true}}
        }));
        assert!(locked.is_locked());
        assert!(locked.body_html().is_none());

        let open = ReaderState::from_value(&json!({
            "reader": {"chapterData": {"isChapterLock": false, "content": "<p>hi</p>"}}
        }));
        assert!(!open.is_locked());
        assert_eq!(open.body_html(), Some("<p>hi</p>"));

        let blank = ReaderState::from_value(&json!({
            "reader": {"chapterData": {"content": "   "}}
        }));
        assert!(blank.body_html().is_none());
    }

    #[test]
    fn url_builders() {
        assert_eq!(book_page_url("123"), "https://fanqienovel.com/page/123");
        assert_eq!(reader_url("c1"), "https://fanqienovel.com/reader/c1");
        assert_eq!(session_cookie("abc"), "sessionid=abc");
    }
}
