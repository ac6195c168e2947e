//! Worker runtime: a single background loop that drains the job queue.
//!
//! One job runs at a time. A handler error marks that job failed and the
//! loop keeps serving the queue; nothing a handler does can stop it.

use crate::app_state::AppState;
use crate::error::IngestError;
use crate::queue::{Job, TaskType};
use crate::tasks;
use actix_web::web;
use std::time::Duration;

const IDLE_POLL_MS: u64 = 500;

pub fn spawn(data: web::Data<AppState>) {
    let data = data.clone();
    actix_web::rt::spawn(async move {
        log::info!("ingestion worker started");
        loop {
            let Some(job) = data.queue.take_next() else {
                actix_web::rt::time::sleep(Duration::from_millis(IDLE_POLL_MS)).await;
                continue;
            };

            log::info!("job {} started: {}", job.id, job.task.as_str());
            match run_job(&data, &job).await {
                Ok(value) => {
                    data.queue.complete(job.id, value);
                    log::info!("job {} completed", job.id);
                }
                Err(e) => {
                    data.queue.fail(job.id, &e.to_string());
                    log::error!("job {} failed: {}", job.id, e);
                }
            }
        }
    });
}

async fn run_job(data: &web::Data<AppState>, job: &Job) -> Result<serde_json::Value, IngestError> {
    match job.task {
        TaskType::FetchCatalog => {
            let book_id = require(job, job.payload.book_id, "bookId")?;
            tasks::catalog::fetch_catalog(&data.db, &data.queue, &data.fetcher, job.id, book_id)
                .await
        }
        TaskType::FetchBookContent => {
            tasks::content::fetch_book_content(
                &data.db,
                &data.queue,
                &data.fetcher,
                &data.config.fetch,
                job.id,
                job.payload.book_id,
            )
            .await
        }
        TaskType::FetchSingleChapterContent => {
            let chapter_id = require(job, job.payload.chapter_id, "chapterId")?;
            tasks::content::fetch_single_chapter_content(
                &data.db,
                &data.queue,
                &data.fetcher,
                &data.config.fetch,
                job.id,
                chapter_id,
            )
            .await
        }
    }
}

/// Submission validates payloads, so a miss here is a programming error;
/// it still fails the job descriptively instead of panicking the loop.
fn require(job: &Job, field: Option<i64>, name: &str) -> Result<i64, IngestError> {
    field.ok_or_else(|| IngestError::Payload {
        task: job.task.as_str().to_string(),
        reason: format!("{} is required", name),
    })
}
