use thiserror::Error;

/// Errors that terminate the enclosing job. Chapter-scoped conditions that
/// only skip a chapter (missing hydration state, locked content without a
/// session, empty body) are not errors; they are reported as
/// `ChapterSkip` outcomes by the content fetcher.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("book {0} not found")]
    BookNotFound(i64),

    #[error("chapter {0} not found")]
    ChapterNotFound(i64),

    #[error("book {0} has no fanqie book id")]
    MissingExternalId(i64),

    #[error("fetch failed for {url}: HTTP {status}")]
    Fetch { url: String, status: u16 },

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("invalid payload for {task}: {reason}")]
    Payload { task: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),
}
