mod common;

use common::{page_html, test_db, StubFetcher};
use rust_novel_ingest::db;
use rust_novel_ingest::error::IngestError;
use rust_novel_ingest::models::ChapterStatus;
use rust_novel_ingest::queue::{JobQueue, TaskPayload, TaskType};
use rust_novel_ingest::tasks::catalog::fetch_catalog;
use serde_json::{json, Value};

const CATALOG_URL: &str = "https://fanqienovel.com/page/123";

fn catalog_state() -> Value {
    json!({
        "page": {
            "bookName": "Test Book",
            "authorName": "An Author",
            "chapterListWithVolume": [
                [
                    {"volume_name": "Vol 1", "itemId": "c1", "title": "Chapter 1"},
                    {"volume_name": "Vol 1", "itemId": "c2", "title": "Chapter 2"}
                ]
            ]
        }
    })
}

fn active_job(queue: &JobQueue, book_id: i64) -> u64 {
    let id = queue
        .submit(
            TaskType::FetchCatalog,
            TaskPayload {
                book_id: Some(book_id),
                chapter_id: None,
            },
        )
        .unwrap();
    queue.take_next().unwrap();
    id
}

#[tokio::test]
async fn catalog_fetch_creates_volume_and_chapters() {
    let db = test_db();
    let book_id = db::insert_book(&db.lock().unwrap(), None, None, Some("123")).unwrap();
    let queue = JobQueue::new();
    let job = active_job(&queue, book_id);
    let fetcher = StubFetcher::new().page(CATALOG_URL, &page_html(&catalog_state()));

    let result = fetch_catalog(&db, &queue, &fetcher, job, book_id)
        .await
        .unwrap();
    assert_eq!(result["newChapters"], 2);
    assert_eq!(queue.get(job).unwrap().progress, 100);

    let conn = db.lock().unwrap();
    let book = db::get_book(&conn, book_id).unwrap().unwrap();
    assert_eq!(book.title.as_deref(), Some("Test Book"));
    assert_eq!(book.author.as_deref(), Some("An Author"));

    let volume_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM volumes", [], |r| r.get(0))
        .unwrap();
    assert_eq!(volume_count, 1);

    let chapters = db::chapters_needing_content(&conn, Some(book_id), 100).unwrap();
    assert_eq!(chapters.len(), 2);
    assert!(chapters.iter().all(|c| c.status == ChapterStatus::Empty));
    let ids: Vec<_> = chapters
        .iter()
        .map(|c| c.fanqie_chapter_id.clone().unwrap())
        .collect();
    assert_eq!(ids, vec!["c1", "c2"]);
}

#[tokio::test]
async fn catalog_fetch_is_idempotent() {
    let db = test_db();
    let book_id = db::insert_book(&db.lock().unwrap(), None, None, Some("123")).unwrap();
    let queue = JobQueue::new();
    let html = page_html(&catalog_state());
    let fetcher = StubFetcher::new().page(CATALOG_URL, &html);

    let job = active_job(&queue, book_id);
    let first = fetch_catalog(&db, &queue, &fetcher, job, book_id)
        .await
        .unwrap();
    assert_eq!(first["newChapters"], 2);

    let job = active_job(&queue, book_id);
    let second = fetch_catalog(&db, &queue, &fetcher, job, book_id)
        .await
        .unwrap();
    assert_eq!(second["newChapters"], 0);

    let conn = db.lock().unwrap();
    let chapter_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM chapters", [], |r| r.get(0))
        .unwrap();
    assert_eq!(chapter_count, 2);
    let volume_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM volumes", [], |r| r.get(0))
        .unwrap();
    assert_eq!(volume_count, 1);
}

#[tokio::test]
async fn no_two_chapters_share_an_external_id() {
    let db = test_db();
    let book_id = db::insert_book(&db.lock().unwrap(), None, None, Some("123")).unwrap();
    let queue = JobQueue::new();

    // the same itemId appears twice in one payload, and a numeric variant
    // of an already-known id appears on a second run
    let state = json!({
        "page": {
            "chapterListWithVolume": [
                [
                    {"volume_name": "Vol 1", "itemId": "77", "title": "A"},
                    {"volume_name": "Vol 1", "itemId": "77", "title": "A again"},
                    {"volume_name": "Vol 1", "itemId": 78, "title": "B"}
                ]
            ]
        }
    });
    let fetcher = StubFetcher::new().page(CATALOG_URL, &page_html(&state));
    let job = active_job(&queue, book_id);
    let result = fetch_catalog(&db, &queue, &fetcher, job, book_id)
        .await
        .unwrap();
    assert_eq!(result["newChapters"], 2);

    let conn = db.lock().unwrap();
    let distinct: i64 = conn
        .query_row(
            "SELECT COUNT(DISTINCT fanqie_chapter_id) FROM chapters WHERE book_id = ?1",
            [book_id],
            |r| r.get(0),
        )
        .unwrap();
    let total: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM chapters WHERE book_id = ?1",
            [book_id],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(distinct, total);
}

#[tokio::test]
async fn repeat_run_keeps_existing_volume_row() {
    let db = test_db();
    let book_id = db::insert_book(&db.lock().unwrap(), None, None, Some("123")).unwrap();
    let queue = JobQueue::new();

    let fetcher = StubFetcher::new().page(CATALOG_URL, &page_html(&catalog_state()));
    let job = active_job(&queue, book_id);
    fetch_catalog(&db, &queue, &fetcher, job, book_id)
        .await
        .unwrap();
    let first_volume_id: i64 = {
        let conn = db.lock().unwrap();
        conn.query_row("SELECT id FROM volumes", [], |r| r.get(0)).unwrap()
    };

    // second run sees the same volume name at a different position plus a
    // new chapter; the volume row must be reused, not replaced
    let moved = json!({
        "page": {
            "chapterListWithVolume": [
                [
                    {"volume_name": "Vol 0", "itemId": "c0", "title": "Prologue"}
                ],
                [
                    {"volume_name": "Vol 1", "itemId": "c3", "title": "Chapter 3"}
                ]
            ]
        }
    });
    let fetcher = StubFetcher::new().page(CATALOG_URL, &page_html(&moved));
    let job = active_job(&queue, book_id);
    fetch_catalog(&db, &queue, &fetcher, job, book_id)
        .await
        .unwrap();

    let conn = db.lock().unwrap();
    let (id, idx): (i64, i64) = conn
        .query_row(
            "SELECT id, idx FROM volumes WHERE book_id = ?1 AND title = 'Vol 1'",
            [book_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap();
    assert_eq!(id, first_volume_id);
    assert_eq!(idx, 0, "existing volume index must not be overwritten");
}

#[tokio::test]
async fn page_without_state_completes_with_nothing_to_persist() {
    let db = test_db();
    let book_id = db::insert_book(&db.lock().unwrap(), None, None, Some("123")).unwrap();
    let queue = JobQueue::new();
    let fetcher = StubFetcher::new().page(CATALOG_URL, "<html><body>plain page</body></html>");

    let job = active_job(&queue, book_id);
    let result = fetch_catalog(&db, &queue, &fetcher, job, book_id)
        .await
        .unwrap();
    assert_eq!(result["newChapters"], 0);
    assert_eq!(queue.get(job).unwrap().progress, 100);
}

#[tokio::test]
async fn unknown_book_fails_the_job() {
    let db = test_db();
    let queue = JobQueue::new();
    let fetcher = StubFetcher::new();
    let job = active_job(&queue, 42);

    let err = fetch_catalog(&db, &queue, &fetcher, job, 42)
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::BookNotFound(42)));
    assert_eq!(fetcher.request_count(), 0);
}

#[tokio::test]
async fn book_without_external_id_fails_the_job() {
    let db = test_db();
    let book_id = db::insert_book(&db.lock().unwrap(), Some("Manual"), None, None).unwrap();
    let queue = JobQueue::new();
    let fetcher = StubFetcher::new();
    let job = active_job(&queue, book_id);

    let err = fetch_catalog(&db, &queue, &fetcher, job, book_id)
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::MissingExternalId(_)));
}

#[tokio::test]
async fn non_2xx_catalog_response_fails_the_job() {
    let db = test_db();
    let book_id = db::insert_book(&db.lock().unwrap(), None, None, Some("123")).unwrap();
    let queue = JobQueue::new();
    let fetcher = StubFetcher::new().status(CATALOG_URL, 503);
    let job = active_job(&queue, book_id);

    let err = fetch_catalog(&db, &queue, &fetcher, job, book_id)
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Fetch { status: 503, .. }));
}
