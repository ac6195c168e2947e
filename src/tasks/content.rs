//! Content fetching: populate paragraph text for chapters still in EMPTY.

use crate::codec;
use crate::config::FetchConfig;
use crate::db;
use crate::error::IngestError;
use crate::http_client::PageFetcher;
use crate::models::Chapter;
use crate::queue::JobQueue;
use crate::source_utils::extract_initial_state;
use crate::sources::fanqie;
use rusqlite::Connection;
use serde_json::json;
use std::fmt;
use std::sync::Mutex;
use tokio::time::{sleep, Duration};

/// Why a chapter was left untouched. Skips are normal outcomes, not
/// errors; the chapter stays EMPTY and is retried on a later pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterSkip {
    NoExternalId,
    NoState,
    Locked,
    NoBody,
    NoParagraphs,
}

impl fmt::Display for ChapterSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            ChapterSkip::NoExternalId => "no external chapter id",
            ChapterSkip::NoState => "no hydration state in reader page",
            ChapterSkip::Locked => "chapter is locked and no session is configured",
            ChapterSkip::NoBody => "no chapter body in hydration state",
            ChapterSkip::NoParagraphs => "decoded body contained no paragraphs",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ChapterOutcome {
    Saved(usize),
    Skipped(ChapterSkip),
}

/// Handler for fetch-book-content jobs: process up to one batch of EMPTY
/// chapters, optionally scoped to a book. Per-chapter failures are logged
/// and counted but never abort the batch; progress advances after every
/// chapter either way.
pub async fn fetch_book_content<F: PageFetcher>(
    db: &Mutex<Connection>,
    queue: &JobQueue,
    fetcher: &F,
    cfg: &FetchConfig,
    job_id: u64,
    book_id: Option<i64>,
) -> Result<serde_json::Value, IngestError> {
    let chapters = {
        let conn = db.lock().unwrap();
        db::chapters_needing_content(&conn, book_id, cfg.content_batch_size)?
    };

    if chapters.is_empty() {
        log::info!("no chapters need content");
        queue.update_progress(job_id, 100);
        return Ok(json!({ "processed": 0, "saved": 0, "skipped": 0, "failed": 0 }));
    }

    let total = chapters.len();
    log::info!("fetching content for {} chapters", total);

    let mut saved = 0usize;
    let mut skipped = 0usize;
    let mut failed = 0usize;
    for (i, chapter) in chapters.iter().enumerate() {
        match fetch_chapter_body(db, fetcher, cfg, chapter).await {
            Ok(ChapterOutcome::Saved(count)) => {
                saved += 1;
                log::info!("chapter {}: saved {} paragraphs", chapter.id, count);
            }
            Ok(ChapterOutcome::Skipped(reason)) => {
                skipped += 1;
                log::warn!("chapter {} skipped: {}", chapter.id, reason);
            }
            Err(e) => {
                failed += 1;
                log::error!("chapter {} failed: {}", chapter.id, e);
            }
        }
        queue.update_progress(job_id, ((i + 1) * 100 / total) as u8);

        if cfg.request_delay_ms > 0 && i + 1 < total {
            sleep(Duration::from_millis(cfg.request_delay_ms)).await;
        }
    }

    Ok(json!({ "processed": total, "saved": saved, "skipped": skipped, "failed": failed }))
}

/// Handler for fetch-single-chapter-content jobs. Unlike the batch path,
/// a missing chapter or a fetch failure fails the job.
pub async fn fetch_single_chapter_content<F: PageFetcher>(
    db: &Mutex<Connection>,
    queue: &JobQueue,
    fetcher: &F,
    cfg: &FetchConfig,
    job_id: u64,
    chapter_id: i64,
) -> Result<serde_json::Value, IngestError> {
    let chapter = {
        let conn = db.lock().unwrap();
        db::get_chapter(&conn, chapter_id)?
    }
    .ok_or(IngestError::ChapterNotFound(chapter_id))?;

    queue.update_progress(job_id, 10);
    let outcome = fetch_chapter_body(db, fetcher, cfg, &chapter).await?;
    queue.update_progress(job_id, 100);

    match outcome {
        ChapterOutcome::Saved(count) => {
            log::info!("chapter {}: saved {} paragraphs", chapter_id, count);
            Ok(json!({ "chapterId": chapter_id, "saved": count }))
        }
        ChapterOutcome::Skipped(reason) => {
            log::warn!("chapter {} skipped: {}", chapter_id, reason);
            Ok(json!({ "chapterId": chapter_id, "skipped": reason.to_string() }))
        }
    }
}

/// Fetch, decode and persist one chapter's body.
///
/// Locked chapters are retried once with the configured session cookie;
/// without a session they are skipped. Paragraph insertion and the
/// EMPTY -> UNANALYZED transition happen in one transaction.
pub async fn fetch_chapter_body<F: PageFetcher>(
    db: &Mutex<Connection>,
    fetcher: &F,
    cfg: &FetchConfig,
    chapter: &Chapter,
) -> Result<ChapterOutcome, IngestError> {
    let Some(fanqie_chapter_id) = chapter.fanqie_chapter_id.as_deref() else {
        return Ok(ChapterOutcome::Skipped(ChapterSkip::NoExternalId));
    };

    let url = fanqie::reader_url(fanqie_chapter_id);
    let html = fetcher.fetch_page(&url, None).await?;
    let Some(state) = extract_initial_state(&html) else {
        return Ok(ChapterOutcome::Skipped(ChapterSkip::NoState));
    };
    let mut reader = fanqie::ReaderState::from_value(&state);

    if reader.is_locked() {
        let Some(session_id) = cfg.session_id.as_deref() else {
            return Ok(ChapterOutcome::Skipped(ChapterSkip::Locked));
        };
        log::info!("chapter {} is locked, retrying with session", chapter.id);
        let cookie = fanqie::session_cookie(session_id);
        let html = fetcher.fetch_page(&url, Some(&cookie)).await?;
        let Some(state) = extract_initial_state(&html) else {
            return Ok(ChapterOutcome::Skipped(ChapterSkip::NoState));
        };
        reader = fanqie::ReaderState::from_value(&state);
    }

    let Some(body) = reader.body_html() else {
        return Ok(ChapterOutcome::Skipped(ChapterSkip::NoBody));
    };

    let paragraphs = codec::parse_chapter_content(body);
    if paragraphs.is_empty() {
        return Ok(ChapterOutcome::Skipped(ChapterSkip::NoParagraphs));
    }

    {
        let mut conn = db.lock().unwrap();
        db::insert_paragraphs_and_mark_unanalyzed(&mut conn, chapter.id, &paragraphs)?;
    }
    Ok(ChapterOutcome::Saved(paragraphs.len()))
}
