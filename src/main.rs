use actix_web::cookie::Cookie;
use actix_web::http::StatusCode;
use actix_web::{get, post, web, App, HttpRequest, HttpResponse, HttpServer, Responder};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

mod conversation;
mod intent;
mod knowledge;
mod present;
mod session;
mod settings;
mod slots;
mod state;

use conversation::{ConversationManager, DialogueError};
use intent::IntentLabel;
use knowledge::{KnowledgeBase, StaticKnowledgeBase};
use session::{InMemorySessionStore, SessionStore};
use settings::Settings;
use state::{ConversationState, StackOp, Topic, Turn, HISTORY_LIMIT};

const DEBUG_HISTORY_LIMIT: usize = 5;

// --- Request / response bodies ---
#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: String,
}
#[derive(Serialize)]
struct ChatResponse {
    reply: String,
}
#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
}
#[derive(Serialize)]
struct HistoryResponse {
    history: Vec<Turn>,
}
#[derive(Serialize)]
struct StackResponse {
    stack: Vec<Topic>,
    current_state: IntentLabel,
    operation: Option<Operation>,
    history: Vec<Turn>,
}
#[derive(Serialize)]
struct Operation {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
}
#[derive(Serialize)]
struct IntentTrailResponse {
    history: Vec<IntentLabel>,
    current_state: IntentLabel,
}

struct AppState {
    manager: ConversationManager,
    sessions: Arc<dyn SessionStore>,
    cookie_name: String,
}

impl AppState {
    fn session_id(&self, req: &HttpRequest) -> Option<String> {
        req.cookie(&self.cookie_name).map(|c| c.value().to_string())
    }

    /// Existing session id, or a new one plus the cookie that carries it.
    fn session_or_new(&self, req: &HttpRequest) -> (String, Option<Cookie<'static>>) {
        if let Some(id) = self.session_id(req) {
            return (id, None);
        }
        let id = uuid::Uuid::new_v4().to_string();
        let cookie = Cookie::build(self.cookie_name.clone(), id.clone())
            .path("/")
            .http_only(true)
            .finish();
        log::info!("New chat session {}", id);
        (id, Some(cookie))
    }

    fn load(&self, req: &HttpRequest) -> ConversationState {
        self.session_id(req)
            .map(|id| self.sessions.load(&id))
            .unwrap_or_default()
    }
}

// --- Web Server Endpoints ---
#[get("/")]
async fn index(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    // Opening the page starts a new conversation.
    if let Some(id) = data.session_id(&req) {
        data.sessions.clear(&id);
    }
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(include_str!("index.html"))
}

#[post("/chat")]
async fn chat(
    req: HttpRequest,
    body: web::Json<ChatRequest>,
    data: web::Data<AppState>,
) -> impl Responder {
    let (session_id, new_cookie) = data.session_or_new(&req);
    let mut state = data.sessions.load(&session_id);

    let (status, reply) = match data.manager.handle_user_input(&mut state, &body.message) {
        Ok(reply) => {
            if reply.end_session {
                log::info!("Session {} ended by user", session_id);
                data.sessions.clear(&session_id);
            } else if let Err(e) = data.sessions.save(&session_id, &state) {
                log::error!("Failed to save session {}: {:#}", session_id, e);
            }
            (StatusCode::OK, reply.text)
        }
        Err(DialogueError::EmptyInput) => {
            (StatusCode::BAD_REQUEST, "Please enter a message.".to_string())
        }
        Err(e) => {
            log::error!("Unexpected dialogue error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, conversation::APOLOGY.to_string())
        }
    };

    let mut response = HttpResponse::build(status);
    if let Some(cookie) = new_cookie {
        response.cookie(cookie);
    }
    response.json(ChatResponse { reply })
}

#[post("/reset")]
async fn reset(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    if let Some(id) = data.session_id(&req) {
        data.sessions.clear(&id);
    }
    HttpResponse::Ok().json(StatusResponse {
        status: "Conversation reset successfully!",
    })
}

#[get("/history")]
async fn history(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    let state = data.load(&req);
    HttpResponse::Ok().json(HistoryResponse {
        history: state.turns.recent(HISTORY_LIMIT),
    })
}

#[get("/debug/state")]
async fn debug_state(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    let state = data.load(&req);
    let operation = state.topics.last_op().map(|op| Operation {
        kind: match op {
            StackOp::Push(_) => "push",
            StackOp::Pop(_) => "pop",
        },
        text: op.to_string(),
    });
    HttpResponse::Ok().json(StackResponse {
        stack: state.topics.items().to_vec(),
        current_state: state.intent,
        operation,
        history: state.turns.recent(DEBUG_HISTORY_LIMIT),
    })
}

#[get("/debug/intents")]
async fn debug_intents(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    let state = data.load(&req);
    HttpResponse::Ok().json(IntentTrailResponse {
        history: state.intent_trail(),
        current_state: state.intent,
    })
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(index)
        .service(chat)
        .service(reset)
        .service(history)
        .service(debug_state)
        .service(debug_intents);
}

#[actix_web::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::load("Config")?;
    let kb = StaticKnowledgeBase::load(&settings.data.knowledge_file)
        .with_context(|| format!("loading {}", settings.data.knowledge_file))?;
    log::info!(
        "Loaded {} courses and {} faculty members",
        kb.courses().len(),
        kb.faculty_keys().len()
    );

    let data = web::Data::new(AppState {
        manager: ConversationManager::new(Arc::new(kb), &settings.dialogue),
        sessions: Arc::new(InMemorySessionStore::with_limits(
            settings.session.max_sessions,
            Duration::from_secs(settings.session.idle_minutes * 60),
        )),
        cookie_name: settings.session.cookie_name.clone(),
    });

    let (host, port) = (settings.server.host.clone(), settings.server.port);
    log::info!("Starting server at http://{}:{}", host, port);
    HttpServer::new(move || App::new().app_data(data.clone()).configure(routes))
        .bind((host, port))?
        .run()
        .await?;
    Ok(())
}
