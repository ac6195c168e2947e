use actix_web::{get, post, web, App, HttpResponse, HttpServer, Responder};
use rust_novel_ingest::app_state::AppState;
use rust_novel_ingest::queue::{JobState, TaskPayload, TaskType};
use rust_novel_ingest::{codec, config, db, worker};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitTaskRequest {
    task_type: String,
    #[serde(default)]
    book_id: Option<i64>,
    #[serde(default)]
    chapter_id: Option<i64>,
}

#[post("/api/tasks")]
async fn submit_task(
    data: web::Data<AppState>,
    body: web::Json<SubmitTaskRequest>,
) -> impl Responder {
    let Some(task) = TaskType::parse(&body.task_type) else {
        return HttpResponse::BadRequest()
            .json(json!({ "error": format!("unknown task type: {}", body.task_type) }));
    };
    let payload = TaskPayload {
        book_id: body.book_id,
        chapter_id: body.chapter_id,
    };
    match data.queue.submit(task, payload) {
        Ok(job_id) => HttpResponse::Accepted().json(json!({ "jobId": job_id })),
        Err(e) => HttpResponse::BadRequest().json(json!({ "error": e.to_string() })),
    }
}

#[get("/api/tasks")]
async fn list_tasks(
    data: web::Data<AppState>,
    query: web::Query<HashMap<String, String>>,
) -> impl Responder {
    let states = match query.get("states") {
        Some(raw) => {
            let mut states = Vec::new();
            for name in raw.split(',') {
                match JobState::parse(name.trim()) {
                    Some(state) => states.push(state),
                    None => {
                        return HttpResponse::BadRequest()
                            .json(json!({ "error": format!("unknown job state: {}", name) }));
                    }
                }
            }
            states
        }
        None => vec![JobState::Active, JobState::Waiting],
    };
    HttpResponse::Ok().json(data.queue.list(&states))
}

#[get("/api/tasks/{job_id}")]
async fn get_task(data: web::Data<AppState>, path: web::Path<u64>) -> impl Responder {
    match data.queue.get(path.into_inner()) {
        Some(job) => HttpResponse::Ok().json(job),
        None => HttpResponse::NotFound().json(json!({ "error": "Job not found" })),
    }
}

#[post("/api/chapters/{id}/download")]
async fn download_chapter(data: web::Data<AppState>, path: web::Path<i64>) -> impl Responder {
    let chapter_id = path.into_inner();
    let payload = TaskPayload {
        book_id: None,
        chapter_id: Some(chapter_id),
    };
    match data.queue.submit(TaskType::FetchSingleChapterContent, payload) {
        Ok(job_id) => HttpResponse::Accepted().json(json!({
            "message": "Chapter download task scheduled successfully",
            "jobId": job_id,
        })),
        Err(e) => HttpResponse::BadRequest().json(json!({ "error": e.to_string() })),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBookRequest {
    fanqie_book_id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    author: Option<String>,
}

#[post("/api/books")]
async fn create_book(
    data: web::Data<AppState>,
    body: web::Json<CreateBookRequest>,
) -> impl Responder {
    let conn = data.db.lock().unwrap();
    match db::insert_book(
        &conn,
        body.title.as_deref(),
        body.author.as_deref(),
        Some(&body.fanqie_book_id),
    ) {
        Ok(id) => HttpResponse::Created().json(json!({ "id": id })),
        Err(e) => {
            log::error!("failed to create book: {}", e);
            HttpResponse::InternalServerError().json(json!({ "error": "Failed to create book" }))
        }
    }
}

#[get("/api/books")]
async fn list_books(data: web::Data<AppState>) -> impl Responder {
    let conn = data.db.lock().unwrap();
    match db::list_books(&conn) {
        Ok(books) => HttpResponse::Ok().json(books),
        Err(e) => {
            log::error!("failed to list books: {}", e);
            HttpResponse::InternalServerError().json(json!({ "error": "Failed to list books" }))
        }
    }
}

#[get("/api/stats")]
async fn get_stats(data: web::Data<AppState>) -> impl Responder {
    let conn = data.db.lock().unwrap();
    match db::get_stats(&conn) {
        Ok(stats) => HttpResponse::Ok().json(stats),
        Err(e) => {
            log::error!("failed to compute stats: {}", e);
            HttpResponse::InternalServerError().json(json!({ "error": "Failed to compute stats" }))
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    log4rs::init_file("log4rs.yml", Default::default()).unwrap();

    let cfg = config::Config::load();
    codec::init(&cfg.char_map_path);

    let conn = db::init_db(&cfg.db_path).unwrap();
    db::create_tables(&conn).unwrap();

    let fetcher = cfg
        .fetch
        .create_http_client()
        .expect("Failed to create HTTP client");

    log::info!("HTTP client initialized:");
    log::info!("  Max retries: {}", cfg.fetch.max_retries);
    log::info!("  Timeout: {}s", cfg.fetch.timeout_secs);
    log::info!("  Session configured: {}", cfg.fetch.session_id.is_some());

    let data = web::Data::new(AppState {
        db: Mutex::new(conn),
        fetcher,
        queue: Default::default(),
        config: cfg,
    });

    // start the background worker loop
    worker::spawn(data.clone());

    // Try to bind to an available port starting at 8080
    let mut last_err: Option<std::io::Error> = None;
    for port in 8080..=8090 {
        let data_clone = data.clone();
        let addr = format!("127.0.0.1:{}", port);
        match HttpServer::new(move || {
            App::new()
                .app_data(data_clone.clone())
                .service(submit_task)
                .service(list_tasks)
                .service(get_task)
                .service(download_chapter)
                .service(create_book)
                .service(list_books)
                .service(get_stats)
        })
        .bind(&addr)
        {
            Ok(server) => {
                log::info!("listening on {}", addr);
                return server.run().await;
            }
            Err(e) => {
                log::warn!("failed to bind {}: {}", addr, e);
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap())
}
