use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    response::{
        Html, IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures_util::stream::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    errors::{Result, StudioError},
    studio::{PortraitStudio, UploadedImage},
    styles::style_ids,
};

const INDEX_HTML: &str = include_str!("../static/index.html");

pub type BroadcastSender = broadcast::Sender<String>;

pub fn message_bus() -> (BroadcastSender, broadcast::Receiver<String>) {
    broadcast::channel(256)
}

pub fn encode_message(event: &str, payload: Value) -> String {
    json!({
        "event": event,
        "payload": payload,
    })
    .to_string()
}

pub fn broadcast_json(sender: &BroadcastSender, event: &str, payload: Value) {
    let message = encode_message(event, payload);
    let _ = sender.send(message);
}

#[derive(Clone)]
struct AppState {
    studio: Arc<PortraitStudio>,
    broadcaster: BroadcastSender,
}

pub fn router(
    studio: Arc<PortraitStudio>,
    broadcaster: BroadcastSender,
    max_upload_bytes: usize,
) -> Router {
    let state = AppState {
        studio,
        broadcaster,
    };

    Router::new()
        .route("/", get(index_handler))
        .route("/api/session", get(session_handler))
        .route("/api/generate", post(generate_handler))
        .route("/events", get(sse_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(addr: SocketAddr, app: Router) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(target: "web", %addr, "写真馆服务已启动");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!(target: "web", error = ?err, "监听退出信号失败");
            }
            info!(target: "web", "收到退出信号，准备关闭");
        })
        .await
        .map_err(|err| StudioError::other(format!("HTTP 服务器错误: {err}")))?;

    Ok(())
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn session_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "has_server_key": state.studio.has_server_key(),
        "styles": style_ids(state.studio.catalog()),
    }))
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    run_id: Uuid,
}

async fn sse_handler(
    Query(query): Query<EventsQuery>,
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let stream = run_events(state.broadcaster.subscribe(), query.run_id)
        .map(|message| Ok(Event::default().data(message)));

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Messages from the bus whose `payload.run_id` is `run_id`; everything else is dropped.
pub fn run_events(
    rx: broadcast::Receiver<String>,
    run_id: Uuid,
) -> impl Stream<Item = String> + Send + 'static {
    let run_id = run_id.to_string();
    BroadcastStream::new(rx).filter_map(move |result| {
        let message = result.ok().filter(|message| belongs_to_run(message, &run_id));
        async move { message }
    })
}

fn belongs_to_run(message: &str, run_id: &str) -> bool {
    serde_json::from_str::<Value>(message)
        .ok()
        .and_then(|value| {
            value["payload"]["run_id"]
                .as_str()
                .map(|id| id == run_id)
        })
        .unwrap_or(false)
}

async fn generate_handler(State(state): State<AppState>, multipart: Multipart) -> Response {
    let form = match GenerateForm::read(multipart).await {
        Ok(form) => form,
        Err(response) => return response,
    };

    let Some(image) = form.image else {
        return status_response(
            StatusCode::BAD_REQUEST,
            "warning",
            "请上传人物照片 (JPG/PNG)",
        );
    };

    let run_id = form.run_id.unwrap_or_else(Uuid::new_v4);
    match state
        .studio
        .generate(run_id, form.fal_key.as_deref(), image)
        .await
    {
        Ok(outcome) => Json(json!({
            "status": "completed",
            "run_id": outcome.run_id,
            "source_url": outcome.source_url,
            "results": outcome.tiles(),
        }))
        .into_response(),
        Err(err) => error_response(&err),
    }
}

#[derive(Default)]
struct GenerateForm {
    fal_key: Option<String>,
    run_id: Option<Uuid>,
    image: Option<UploadedImage>,
}

impl GenerateForm {
    async fn read(mut multipart: Multipart) -> std::result::Result<Self, Response> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(malformed_form)? {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("fal_key") => form.fal_key = Some(field.text().await.map_err(malformed_form)?),
                Some("run_id") => {
                    let text = field.text().await.map_err(malformed_form)?;
                    form.run_id = Uuid::parse_str(text.trim()).ok();
                }
                Some("image") => {
                    let file_name = field.file_name().unwrap_or("upload").to_string();
                    let bytes = field.bytes().await.map_err(malformed_form)?;
                    if !bytes.is_empty() {
                        form.image = Some(UploadedImage { file_name, bytes });
                    }
                }
                _ => {}
            }
        }

        Ok(form)
    }
}

fn malformed_form(err: axum::extract::multipart::MultipartError) -> Response {
    status_response(err.status(), "error", &format!("表单解析失败: {}", err.body_text()))
}

fn error_response(err: &StudioError) -> Response {
    let (status, level) = match err {
        StudioError::MissingCredential => (StatusCode::BAD_REQUEST, "warning"),
        StudioError::UnsupportedFormat(_) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, "error"),
        StudioError::Transfer(_) => (StatusCode::BAD_GATEWAY, "error"),
        _ => {
            error!(target: "web", error = %err, "生成请求处理失败");
            (StatusCode::INTERNAL_SERVER_ERROR, "error")
        }
    };
    status_response(status, level, &err.to_string())
}

fn status_response(status: StatusCode, level: &str, message: &str) -> Response {
    (
        status,
        Json(json!({
            "status": level,
            "message": message,
        })),
    )
        .into_response()
}
