//! # mb-api Handlers
//!
//! This module coordinates the flow between HTTP requests and the engine.

use std::fmt;

use actix_web::http::{header, StatusCode};
use actix_web::{web, Either, HttpResponse, ResponseError};
use mb_core::engine::{ListOptions, ThreadEngine};
use mb_core::error::AppError;
use serde::Deserialize;

/// State shared across all Actix-web workers.
pub struct AppState {
    pub engine: ThreadEngine,
    /// Threads returned by a board listing.
    pub page_size: usize,
}

/// Request bodies arrive either as JSON or as an urlencoded form.
type Body<T> = Either<web::Json<T>, web::Form<T>>;

fn body<T>(body: Body<T>) -> T {
    match body {
        Either::Left(json) => json.into_inner(),
        Either::Right(form) => form.into_inner(),
    }
}

#[derive(Debug, Deserialize)]
pub struct NewThreadForm {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub delete_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ReportThreadForm {
    pub report_id: Option<String>,
    pub thread_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteThreadForm {
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub delete_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ThreadQuery {
    #[serde(default)]
    pub thread_id: String,
}

#[derive(Debug, Deserialize)]
pub struct NewReplyForm {
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub delete_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ReportReplyForm {
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub reply_id: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteReplyForm {
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub reply_id: String,
    #[serde(default)]
    pub delete_password: String,
}

/// Engine errors rendered as HTTP responses.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self.0 {
            AppError::ValidationError(_) | AppError::InvalidIdentifier(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(..) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AppError::ConnectionNotReady | AppError::Storage(_) | AppError::Conflict(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if status.is_server_error() {
            tracing::error!("request failed: {}", self.0);
            "error".to_string()
        } else {
            self.0.to_string()
        };
        HttpResponse::build(status)
            .content_type("text/plain; charset=utf-8")
            .body(message)
    }
}

type ApiResult = Result<HttpResponse, ApiError>;

/// Board names end up in collection names, so only a conservative alphabet is accepted.
fn board_name(path: web::Path<String>) -> Result<String, ApiError> {
    let board = path.into_inner();
    let valid = !board.is_empty()
        && board.len() <= 64
        && board
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(board)
    } else {
        Err(AppError::ValidationError(format!("invalid board name {board:?}")).into())
    }
}

fn plain(message: &'static str) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(message)
}

fn see_other(location: String) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location))
        .finish()
}

/// `GET /api/threads/{board}`: the most recently bumped threads.
pub async fn list_threads(data: web::Data<AppState>, path: web::Path<String>) -> ApiResult {
    let board = board_name(path)?;
    let options = ListOptions {
        limit: data.page_size,
        filtered: true,
    };
    let threads = data.engine.list_threads(&board, options).await?;
    Ok(HttpResponse::Ok().json(threads))
}

/// `POST /api/threads/{board}`: posts a thread and redirects to the board page.
pub async fn create_thread(
    data: web::Data<AppState>,
    path: web::Path<String>,
    form: Body<NewThreadForm>,
) -> ApiResult {
    let board = board_name(path)?;
    let form = body(form);

    data.engine
        .create_thread(&board, &form.text, &form.delete_password)
        .await?;
    Ok(see_other(format!("/b/{board}/")))
}

/// `PUT /api/threads/{board}`: flags a thread as reported.
pub async fn report_thread(
    data: web::Data<AppState>,
    path: web::Path<String>,
    form: Body<ReportThreadForm>,
) -> ApiResult {
    let board = board_name(path)?;
    let form = body(form);
    let thread_id = form.report_id.or(form.thread_id).unwrap_or_default();

    let outcome = data.engine.report_thread(&board, &thread_id).await?;
    Ok(if outcome.is_applied() {
        plain("success")
    } else {
        plain("error: no threads updated")
    })
}

/// `DELETE /api/threads/{board}`: removes a thread given its delete password.
pub async fn delete_thread(
    data: web::Data<AppState>,
    path: web::Path<String>,
    form: Body<DeleteThreadForm>,
) -> ApiResult {
    let board = board_name(path)?;
    let form = body(form);

    let outcome = data
        .engine
        .delete_thread(&board, &form.thread_id, &form.delete_password)
        .await?;
    Ok(if outcome.is_applied() {
        plain("success")
    } else {
        plain("incorrect password")
    })
}

/// `GET /api/replies/{board}?thread_id=`: a thread with all of its replies.
pub async fn get_thread(
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<ThreadQuery>,
) -> ApiResult {
    let board = board_name(path)?;
    let thread = data
        .engine
        .get_full_thread(&board, &query.thread_id)
        .await?;
    Ok(HttpResponse::Ok().json(thread))
}

/// `POST /api/replies/{board}`: replies to a thread and redirects to it.
pub async fn create_reply(
    data: web::Data<AppState>,
    path: web::Path<String>,
    form: Body<NewReplyForm>,
) -> ApiResult {
    let board = board_name(path)?;
    let form = body(form);

    let outcome = data
        .engine
        .create_reply(&board, &form.thread_id, &form.text, &form.delete_password)
        .await?;
    if !outcome.is_applied() {
        return Ok(HttpResponse::NotFound()
            .content_type("text/plain; charset=utf-8")
            .body("error"));
    }
    Ok(see_other(format!("/b/{board}/{}", form.thread_id)))
}

/// `PUT /api/replies/{board}`: flags a reply as reported.
pub async fn report_reply(
    data: web::Data<AppState>,
    path: web::Path<String>,
    form: Body<ReportReplyForm>,
) -> ApiResult {
    let board = board_name(path)?;
    let form = body(form);

    let outcome = data
        .engine
        .report_reply(&board, &form.thread_id, &form.reply_id)
        .await?;
    Ok(if outcome.is_applied() {
        plain("success")
    } else {
        plain("error: reply not reported")
    })
}

/// `DELETE /api/replies/{board}`: removes a reply given its delete password.
pub async fn delete_reply(
    data: web::Data<AppState>,
    path: web::Path<String>,
    form: Body<DeleteReplyForm>,
) -> ApiResult {
    let board = board_name(path)?;
    let form = body(form);

    let outcome = data
        .engine
        .delete_reply(&board, &form.thread_id, &form.reply_id, &form.delete_password)
        .await?;
    Ok(if outcome.is_applied() {
        plain("success")
    } else {
        plain("incorrect password")
    })
}
