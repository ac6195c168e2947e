//! In-process job queue for ingestion work.
//!
//! One queue per process, FIFO dispatch, explicit per-job state machine:
//! waiting -> active -> completed | failed. Failed jobs are terminal;
//! callers resubmit. Finished jobs stay in the map so a polling client
//! can always read the terminal state.

use crate::error::IngestError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    FetchCatalog,
    FetchBookContent,
    FetchSingleChapterContent,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::FetchCatalog => "fetch-catalog",
            TaskType::FetchBookContent => "fetch-book-content",
            TaskType::FetchSingleChapterContent => "fetch-single-chapter-content",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fetch-catalog" => Some(TaskType::FetchCatalog),
            "fetch-book-content" => Some(TaskType::FetchBookContent),
            "fetch-single-chapter-content" => Some(TaskType::FetchSingleChapterContent),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Waiting,
    Active,
    Completed,
    Failed,
}

impl JobState {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "waiting" => Some(JobState::Waiting),
            "active" => Some(JobState::Active),
            "completed" => Some(JobState::Completed),
            "failed" => Some(JobState::Failed),
            _ => None,
        }
    }
}

/// What a task operates on: a book, a chapter, or (for an unscoped
/// content sweep) nothing.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskPayload {
    #[serde(default)]
    pub book_id: Option<i64>,
    #[serde(default)]
    pub chapter_id: Option<i64>,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: u64,
    pub task: TaskType,
    pub payload: TaskPayload,
    pub state: JobState,
    pub progress: u8,
    pub return_value: Option<serde_json::Value>,
    pub error: Option<String>,
    pub submitted_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
}

#[derive(Default)]
struct QueueInner {
    jobs: HashMap<u64, Job>,
    pending: VecDeque<u64>,
    next_id: u64,
}

#[derive(Default)]
pub struct JobQueue {
    inner: Mutex<QueueInner>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a job after validating that the payload carries what the
    /// task type needs.
    pub fn submit(&self, task: TaskType, payload: TaskPayload) -> Result<u64, IngestError> {
        let missing = match task {
            TaskType::FetchCatalog if payload.book_id.is_none() => Some("bookId is required"),
            TaskType::FetchSingleChapterContent if payload.chapter_id.is_none() => {
                Some("chapterId is required")
            }
            _ => None,
        };
        if let Some(reason) = missing {
            return Err(IngestError::Payload {
                task: task.as_str().to_string(),
                reason: reason.to_string(),
            });
        }

        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = inner.next_id;
        let job = Job {
            id,
            task,
            payload,
            state: JobState::Waiting,
            progress: 0,
            return_value: None,
            error: None,
            submitted_at: Utc::now().timestamp(),
            started_at: None,
            finished_at: None,
        };
        inner.jobs.insert(id, job);
        inner.pending.push_back(id);
        log::info!("job {} submitted: {}", id, task.as_str());
        Ok(id)
    }

    /// FIFO pop of the next waiting job; marks it active and returns a
    /// snapshot for the worker.
    pub fn take_next(&self) -> Option<Job> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.pending.pop_front()?;
        let job = inner.jobs.get_mut(&id)?;
        job.state = JobState::Active;
        job.started_at = Some(Utc::now().timestamp());
        Some(job.clone())
    }

    /// Publish progress for a running job. Clamped to 100 and never
    /// allowed to move backward, so polling clients observe a
    /// monotonically non-decreasing sequence.
    pub fn update_progress(&self, id: u64, percent: u8) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(job) = inner.jobs.get_mut(&id) {
            let percent = percent.min(100);
            if percent > job.progress {
                job.progress = percent;
            }
        }
    }

    pub fn complete(&self, id: u64, return_value: serde_json::Value) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(job) = inner.jobs.get_mut(&id) {
            job.state = JobState::Completed;
            job.progress = 100;
            job.return_value = Some(return_value);
            job.finished_at = Some(Utc::now().timestamp());
        }
    }

    pub fn fail(&self, id: u64, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(job) = inner.jobs.get_mut(&id) {
            job.state = JobState::Failed;
            job.error = Some(error.to_string());
            job.finished_at = Some(Utc::now().timestamp());
        }
    }

    pub fn get(&self, id: u64) -> Option<Job> {
        self.inner.lock().unwrap().jobs.get(&id).cloned()
    }

    pub fn list(&self, states: &[JobState]) -> Vec<Job> {
        let inner = self.inner.lock().unwrap();
        let mut jobs: Vec<Job> = inner
            .jobs
            .values()
            .filter(|j| states.contains(&j.state))
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.id);
        jobs
    }
}
