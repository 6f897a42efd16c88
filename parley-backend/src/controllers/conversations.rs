//! Conversation REST API.
//!
//! Markdown in (`ask.md`), markdown or JSON out (`answers.md`, `wait.md`,
//! `answers*`), plus whole-document access for the answering UI (`data`),
//! the notes side channel, the marker table, and conversation discovery.

use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use std::time::Duration;

use crate::AppState;
use crate::conversation::model::Note;
use crate::conversation::parser::{parse_chunk, split_chunks};
use crate::conversation::render::{RenderOptions, render_conversation, render_notes_appendix};
use crate::conversation::status::{collect_new_answers, compute_status};
use crate::conversation::wait::{DEFAULT_TIMEOUT_MS, wait_for_activity};

const MARKDOWN_CONTENT_TYPE: &str = "text/markdown; charset=utf-8";

fn storage_error(id: &str, what: &str, e: std::io::Error) -> HttpResponse {
    log::error!("[CONV] Failed to {} conversation {}: {}", what, id, e);
    HttpResponse::InternalServerError().json(serde_json::json!({
        "error": format!("Failed to {} conversation", what)
    }))
}

// --- Ask ---

/// Append questions posted as markdown. Chunks are split on `---` lines and
/// parsed independently; unparseable chunks are dropped silently, and only
/// a payload with zero valid chunks is an error.
async fn post_ask_md(
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Bytes,
) -> impl Responder {
    let id = path.into_inner();
    let markdown = String::from_utf8_lossy(&body);

    let parsed: Vec<_> = split_chunks(&markdown)
        .iter()
        .filter_map(|chunk| parse_chunk(chunk))
        .collect();

    if parsed.is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Could not parse question"
        }));
    }

    match data.store.append_questions(&id, parsed) {
        Ok((ids, conversation)) => {
            log::info!("[CONV] {} question(s) appended to {}", ids.len(), id);
            HttpResponse::Ok().json(serde_json::json!({
                "ok": true,
                "ids": ids,
                "status": compute_status(&conversation),
            }))
        }
        Err(e) => storage_error(&id, "save", e),
    }
}

// --- Answers (markdown) ---

async fn get_answers_md(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let id = path.into_inner();
    let conversation = match data.store.load(&id) {
        Ok(c) => c,
        Err(e) => return storage_error(&id, "load", e),
    };

    let doc = render_conversation(
        &id,
        &conversation,
        &data.markers,
        RenderOptions {
            answers_only: true,
            ..Default::default()
        },
    );

    HttpResponse::Ok().content_type(MARKDOWN_CONTENT_TYPE).body(doc)
}

// --- Long poll ---

#[derive(Debug, Deserialize)]
struct WaitQuery {
    timeout: Option<u64>,
}

impl WaitQuery {
    fn duration(&self) -> Duration {
        Duration::from_millis(self.timeout.unwrap_or(DEFAULT_TIMEOUT_MS))
    }
}

/// Long-poll for new answers, delivered as markdown. The rendered document
/// comes from the pre-mutation snapshot; delivered notes are appended as a
/// trailing section. A timeout is flagged in the frontmatter, not an error.
async fn get_wait_md(
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<WaitQuery>,
) -> impl Responder {
    let id = path.into_inner();

    let outcome =
        match wait_for_activity(&data.store, &id, query.duration(), &data.shutdown).await {
            Ok(o) => o,
            Err(e) => return storage_error(&id, "poll", e),
        };

    let mut doc = render_conversation(
        &id,
        &outcome.conversation,
        &data.markers,
        RenderOptions {
            answers_only: true,
            new_only: true,
            timed_out: outcome.timed_out,
        },
    );

    if !outcome.notes.is_empty() {
        doc.push_str(&render_notes_appendix(&outcome.notes));
    }

    HttpResponse::Ok().content_type(MARKDOWN_CONTENT_TYPE).body(doc)
}

/// Long-poll for new answers, delivered as JSON.
async fn wait_answers_json(
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<WaitQuery>,
) -> impl Responder {
    let id = path.into_inner();

    match wait_for_activity(&data.store, &id, query.duration(), &data.shutdown).await {
        Ok(outcome) if outcome.timed_out => HttpResponse::Ok().json(serde_json::json!({
            "answers": [],
            "notes": [],
            "timeout": true,
        })),
        Ok(outcome) => HttpResponse::Ok().json(serde_json::json!({
            "answers": outcome.answers,
            "notes": outcome.notes,
        })),
        Err(e) => storage_error(&id, "poll", e),
    }
}

// --- Answers (JSON) ---

/// All checked answers, regardless of seen state.
async fn get_answers(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let id = path.into_inner();
    let conversation = match data.store.load(&id) {
        Ok(c) => c,
        Err(e) => return storage_error(&id, "load", e),
    };

    let answers: Vec<serde_json::Value> = conversation
        .questions
        .iter()
        .filter_map(|q| {
            let selected: Vec<serde_json::Value> = q
                .options
                .iter()
                .filter(|o| o.checked)
                .map(|o| {
                    serde_json::json!({
                        "id": o.id,
                        "text": o.text,
                        "description": o.description,
                        "marker": o.marker,
                    })
                })
                .collect();

            (!selected.is_empty()).then(|| {
                serde_json::json!({
                    "question_id": q.id,
                    "question_text": q.text,
                    "selected": selected,
                })
            })
        })
        .collect();

    HttpResponse::Ok().json(serde_json::json!({ "answers": answers }))
}

/// New answers since the last check, marked seen on the way out.
async fn get_new_answers(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let id = path.into_inner();
    let mut conversation = match data.store.load(&id) {
        Ok(c) => c,
        Err(e) => return storage_error(&id, "load", e),
    };

    let answers = collect_new_answers(&mut conversation, true);
    if let Err(e) = data.store.save(&id, &conversation) {
        return storage_error(&id, "save", e);
    }

    HttpResponse::Ok().json(serde_json::json!({ "answers": answers }))
}

// --- Whole-document access ---

async fn get_data(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let id = path.into_inner();
    match data.store.load(&id) {
        Ok(conversation) => HttpResponse::Ok().json(conversation),
        Err(e) => storage_error(&id, "load", e),
    }
}

/// Whole-document overwrite from the answering UI. Last write wins; there
/// is deliberately no merge with concurrent waiter saves.
async fn post_data(
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<crate::conversation::Conversation>,
) -> impl Responder {
    let id = path.into_inner();
    let conversation = body.into_inner();
    match data.store.save(&id, &conversation) {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({ "ok": true })),
        Err(e) => storage_error(&id, "save", e),
    }
}

async fn delete_data(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let id = path.into_inner();
    match data.store.reset(&id) {
        Ok(()) => {
            log::info!("[CONV] Conversation {} reset", id);
            HttpResponse::Ok().json(serde_json::json!({ "ok": true }))
        }
        Err(e) => storage_error(&id, "reset", e),
    }
}

// --- Notes ---

async fn post_note(
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Bytes,
) -> impl Responder {
    let id = path.into_inner();
    let text = String::from_utf8_lossy(&body);

    if text.trim().is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Empty note"
        }));
    }

    let note = Note::from_text(&text);
    let category = note.category.clone();

    match data.store.append_note(&id, note) {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "ok": true,
            "category": category,
        })),
        Err(e) => storage_error(&id, "save", e),
    }
}

// --- Discovery / markers ---

async fn list_conversations(data: web::Data<AppState>) -> impl Responder {
    match data.store.list() {
        Ok(entries) => HttpResponse::Ok().json(entries),
        Err(e) => {
            log::error!("[CONV] Failed to list conversations: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to list conversations"
            }))
        }
    }
}

async fn get_markers(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(data.markers.as_map())
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/conversation/{id}")
            .route("/ask.md", web::post().to(post_ask_md))
            .route("/answers.md", web::get().to(get_answers_md))
            .route("/wait.md", web::get().to(get_wait_md))
            .route("/answers", web::get().to(get_answers))
            .route("/answers/new", web::get().to(get_new_answers))
            .route("/answers/wait", web::get().to(wait_answers_json))
            .route("/data", web::get().to(get_data))
            .route("/data", web::post().to(post_data))
            .route("/data", web::delete().to(delete_data))
            .route("/note", web::post().to(post_note)),
    );
    cfg.service(web::resource("/api/conversations").route(web::get().to(list_conversations)));
    cfg.service(web::resource("/api/markers").route(web::get().to(get_markers)));
}
