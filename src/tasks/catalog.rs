//! Catalog synchronization: mirror a book's volume/chapter skeleton from
//! the source site's table of contents.

use crate::db;
use crate::error::IngestError;
use crate::http_client::PageFetcher;
use crate::queue::JobQueue;
use crate::source_utils::extract_initial_state;
use crate::sources::fanqie;
use rusqlite::Connection;
use serde_json::json;
use std::sync::Mutex;

/// Handler for fetch-catalog jobs.
///
/// Fails when the book is unknown or has no external id; an absent
/// hydration state on the catalog page is a normal outcome and completes
/// the job with zero new chapters.
pub async fn fetch_catalog<F: PageFetcher>(
    db: &Mutex<Connection>,
    queue: &JobQueue,
    fetcher: &F,
    job_id: u64,
    book_id: i64,
) -> Result<serde_json::Value, IngestError> {
    let book = {
        let conn = db.lock().unwrap();
        db::get_book(&conn, book_id)?
    }
    .ok_or(IngestError::BookNotFound(book_id))?;
    let fanqie_book_id = book
        .fanqie_book_id
        .ok_or(IngestError::MissingExternalId(book_id))?;

    let url = fanqie::book_page_url(&fanqie_book_id);
    log::info!("fetching catalog for book {} from {}", book_id, url);
    queue.update_progress(job_id, 10);

    let html = fetcher.fetch_page(&url, None).await?;
    queue.update_progress(job_id, 60);

    let Some(state) = extract_initial_state(&html) else {
        log::warn!("no hydration state on catalog page for book {}", book_id);
        queue.update_progress(job_id, 100);
        return Ok(json!({ "newChapters": 0 }));
    };
    let catalog = fanqie::CatalogState::from_value(&state);

    let new_chapters = {
        let conn = db.lock().unwrap();
        apply_catalog(&conn, book_id, &catalog)?
    };
    queue.update_progress(job_id, 90);

    if new_chapters > 0 {
        log::info!("created {} new chapters for book {}", new_chapters, book_id);
    } else {
        log::info!("no new chapters for book {}", book_id);
    }
    queue.update_progress(job_id, 100);
    Ok(json!({ "newChapters": new_chapters }))
}

/// Persist one extracted catalog. Split out from the fetch so the
/// idempotence and uniqueness behavior is testable without network.
///
/// Volumes are upserted by (book, title); chapters are created only for
/// external ids not yet seen, tracked in a set seeded once from the
/// database. Returns the number of chapters created.
pub fn apply_catalog(
    conn: &Connection,
    book_id: i64,
    catalog: &fanqie::CatalogState,
) -> Result<usize, IngestError> {
    if let (Some(name), Some(author)) = (&catalog.page.book_name, &catalog.page.author_name) {
        db::update_book_meta(conn, book_id, name, author)?;
        log::info!("updated book {} title to {:?} and author to {:?}", book_id, name, author);
    }

    let mut known_ids = db::chapter_external_ids(conn, book_id)?;
    let mut created = 0usize;

    for (volume_index, volume_chapters) in catalog.page.chapter_list_with_volume.iter().enumerate()
    {
        let Some(volume_name) = volume_chapters
            .first()
            .and_then(|c| c.volume_name.clone())
        else {
            continue;
        };
        let volume = db::upsert_volume(conn, book_id, &volume_name, volume_index as i64)?;

        for (chapter_index, chapter) in volume_chapters.iter().enumerate() {
            let Some(item_id) = chapter.item_id() else {
                continue;
            };
            if known_ids.contains(&item_id) {
                continue;
            }
            db::insert_chapter(
                conn,
                book_id,
                volume.id,
                chapter.title.as_deref().unwrap_or(""),
                chapter_index as i64,
                &item_id,
            )?;
            known_ids.insert(item_id);
            created += 1;
        }
    }

    Ok(created)
}
