//! Shared helpers for the pipeline integration tests: an in-memory
//! database and a canned-page fetcher so no test touches the network.

use async_trait::async_trait;
use rusqlite::Connection;
use rust_novel_ingest::db;
use rust_novel_ingest::error::IngestError;
use rust_novel_ingest::http_client::PageFetcher;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

pub fn test_db() -> Mutex<Connection> {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    db::create_tables(&conn).expect("create tables");
    Mutex::new(conn)
}

/// Serves canned pages keyed by (url, with-cookie). A URL registered only
/// without a cookie also answers cookie requests, so tests only register
/// the cookie variant when the page differs for authenticated fetches.
#[derive(Default)]
pub struct StubFetcher {
    pages: HashMap<(String, bool), Result<String, u16>>,
    pub requests: Mutex<Vec<(String, Option<String>)>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages
            .insert((url.to_string(), false), Ok(html.to_string()));
        self
    }

    pub fn page_with_cookie(mut self, url: &str, html: &str) -> Self {
        self.pages
            .insert((url.to_string(), true), Ok(html.to_string()));
        self
    }

    pub fn status(mut self, url: &str, status: u16) -> Self {
        self.pages.insert((url.to_string(), false), Err(status));
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl PageFetcher for StubFetcher {
    async fn fetch_page(&self, url: &str, cookie: Option<&str>) -> Result<String, IngestError> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), cookie.map(String::from)));

        let keyed = self.pages.get(&(url.to_string(), cookie.is_some()));
        let entry = keyed.or_else(|| self.pages.get(&(url.to_string(), false)));
        match entry {
            Some(Ok(html)) => Ok(html.clone()),
            Some(Err(status)) => Err(IngestError::Fetch {
                url: url.to_string(),
                status: *status,
            }),
            None => Err(IngestError::Fetch {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// Wrap a hydration state object in the page shape the source site serves.
pub fn page_html(state: &Value) -> String {
    format!(
        "<html><head><script>var x=1;</script></head><body>\
         <script>window.__INITIAL_STATE__={};(function(){{}})();</script>\
         </body></html>",
        state
    )
}

pub fn reader_page(locked: bool, content: Option<&str>) -> String {
    page_html(&serde_json::json!({
        "reader": {
            "chapterData": {
                "isChapterLock": locked,
                "content": content,
            }
        }
    }))
}
