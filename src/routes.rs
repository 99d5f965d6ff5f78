use std::sync::Arc;

use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpResponse};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use chrono::Utc;
use futures_util::TryStreamExt as _;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::{Auth, AuthError, Role};
use crate::error::ApiError;
use crate::models::*;
use crate::repo::Repo;
use crate::service::{board, comment, user};
use crate::stats::{self, view_date, StatWindow};
use crate::storage::{ImageStore, ImageUpload, IMAGE_SIZE_LIMIT};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            // static board paths must precede /board/{id}
            .service(web::resource("/board/search").route(web::get().to(search_boards)))
            .service(
                web::resource("/board/qna")
                    .route(web::get().to(list_qna))
                    .route(web::post().to(create_qna)),
            )
            .service(
                web::resource("/board/inquiry")
                    .route(web::get().to(list_inquiries))
                    .route(web::post().to(create_inquiry)),
            )
            .service(web::resource("/board/notice").route(web::post().to(create_notice)))
            .service(
                web::resource("/board/{id}")
                    .route(web::get().to(get_board))
                    .route(web::put().to(update_board))
                    .route(web::delete().to(delete_board)),
            )
            .service(web::resource("/comment/subcomment/{id}").route(web::post().to(create_reply)))
            .service(
                web::resource("/comment/{id}")
                    .route(web::post().to(create_comment))
                    .route(web::put().to(update_comment))
                    .route(web::delete().to(delete_comment)),
            )
            .service(web::resource("/user/signup").route(web::post().to(signup)))
            .service(web::resource("/user/login").route(web::post().to(login)))
            .service(web::resource("/user/refresh").route(web::post().to(refresh)))
            .service(web::resource("/stats/rollup/{window}").route(web::post().to(run_rollup))),
    );
}

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repo>,
    pub image_store: Arc<dyn ImageStore>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RollupResponse {
    pub window: StatWindow,
    pub updated: u64,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// Substring to look for; empty matches everything.
    #[serde(default)]
    pub query: String,
    /// `all` (default), `title` or `author`.
    pub criteria: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct QnaParams {
    /// `createdAt` (default), `totalView`, `weeklyView`, `monthlyView` or `annualView`.
    pub sort_by: Option<String>,
}

/// Multipart form shared by board create and update (documentation only).
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct BoardForm {
    /// JSON-encoded `BoardInput`.
    body: String,
    #[schema(value_type = String, format = Binary)]
    file: Option<Vec<u8>>,
}

const BODY_FIELD_LIMIT: usize = 16 * 1024;

// ---------------------------------------------------------------------
// boards

#[utoipa::path(
    get,
    path = "/api/v1/board/search",
    params(SearchParams),
    responses(
        (status = 200, description = "Matching boards, newest first", body = [Board]),
        (status = 400, description = "Unknown criteria", body = crate::error::ApiErrorBody)
    ),
    tag = "boards"
)]
pub async fn search_boards(
    data: web::Data<AppState>,
    params: web::Query<SearchParams>,
) -> Result<HttpResponse, ApiError> {
    let params = params.into_inner();
    let criteria = match params.criteria.as_deref() {
        Some(c) => c.parse::<SearchCriteria>()?,
        None => SearchCriteria::default(),
    };
    let boards = board::search(&data, params.query.trim(), criteria).await?;
    Ok(HttpResponse::Ok().json(boards))
}

#[utoipa::path(
    get,
    path = "/api/v1/board/qna",
    params(QnaParams),
    responses(
        (status = 200, description = "Notices plus sorted QnA boards", body = QnaListing),
        (status = 400, description = "Unknown sortBy", body = crate::error::ApiErrorBody)
    ),
    tag = "boards"
)]
pub async fn list_qna(data: web::Data<AppState>, params: web::Query<QnaParams>) -> Result<HttpResponse, ApiError> {
    let sort = match params.sort_by.as_deref() {
        Some(s) => s.parse::<SortBy>()?,
        None => SortBy::default(),
    };
    let listing = board::qna_listing(&data, sort).await?;
    Ok(HttpResponse::Ok().json(listing))
}

#[utoipa::path(
    get,
    path = "/api/v1/board/inquiry",
    responses(
        (status = 200, description = "Caller's inquiries", body = [Board]),
        (status = 401, description = "Unauthorized", body = crate::error::ApiErrorBody)
    ),
    security(("bearer" = [])),
    tag = "boards"
)]
pub async fn list_inquiries(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let boards = board::inquiries(&data, auth.user_id()?).await?;
    Ok(HttpResponse::Ok().json(boards))
}

#[utoipa::path(
    get,
    path = "/api/v1/board/{id}",
    params(("id" = i64, Path, description = "Board id")),
    responses(
        (status = 200, description = "Board with ordered comments", body = BoardDetail),
        (status = 404, description = "Board not found", body = crate::error::ApiErrorBody)
    ),
    tag = "boards"
)]
pub async fn get_board(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let detail = board::detail(&data, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(detail))
}

#[utoipa::path(
    post,
    path = "/api/v1/board/qna",
    request_body(content = BoardForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Board created", body = BoardSummary),
        (status = 400, description = "Validation failure", body = crate::error::ApiErrorBody),
        (status = 401, description = "Unauthorized", body = crate::error::ApiErrorBody)
    ),
    security(("bearer" = [])),
    tag = "boards"
)]
pub async fn create_qna(auth: Auth, data: web::Data<AppState>, payload: Multipart) -> Result<HttpResponse, ApiError> {
    create_in(auth, data, payload, Category::Qna).await
}

#[utoipa::path(
    post,
    path = "/api/v1/board/inquiry",
    request_body(content = BoardForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Board created", body = BoardSummary),
        (status = 400, description = "Validation failure", body = crate::error::ApiErrorBody),
        (status = 401, description = "Unauthorized", body = crate::error::ApiErrorBody)
    ),
    security(("bearer" = [])),
    tag = "boards"
)]
pub async fn create_inquiry(auth: Auth, data: web::Data<AppState>, payload: Multipart) -> Result<HttpResponse, ApiError> {
    create_in(auth, data, payload, Category::Inquiry).await
}

#[utoipa::path(
    post,
    path = "/api/v1/board/notice",
    request_body(content = BoardForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Notice created", body = BoardSummary),
        (status = 403, description = "Forbidden – admins only", body = crate::error::ApiErrorBody)
    ),
    security(("bearer" = [])),
    tag = "boards"
)]
pub async fn create_notice(auth: Auth, data: web::Data<AppState>, payload: Multipart) -> Result<HttpResponse, ApiError> {
    crate::require_role!(auth, Role::Admin);
    create_in(auth, data, payload, Category::Notice).await
}

async fn create_in(
    auth: Auth,
    data: web::Data<AppState>,
    payload: Multipart,
    category: Category,
) -> Result<HttpResponse, ApiError> {
    let (input, image) = read_board_form(payload).await?;
    let created = board::create(&data, &auth.0, category, input, image).await?;
    Ok(HttpResponse::Created().json(created))
}

#[utoipa::path(
    put,
    path = "/api/v1/board/{id}",
    params(("id" = i64, Path, description = "Board id")),
    request_body(content = BoardForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Board updated", body = BoardSummary),
        (status = 403, description = "Not the author", body = crate::error::ApiErrorBody),
        (status = 404, description = "Board not found", body = crate::error::ApiErrorBody)
    ),
    security(("bearer" = [])),
    tag = "boards"
)]
pub async fn update_board(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let (input, image) = read_board_form(payload).await?;
    let updated = board::update(&data, auth.user_id()?, path.into_inner(), input, image).await?;
    Ok(HttpResponse::Ok().json(updated))
}

#[utoipa::path(
    delete,
    path = "/api/v1/board/{id}",
    params(("id" = i64, Path, description = "Board id")),
    responses(
        (status = 200, description = "Board and its comments soft-deleted", body = MessageResponse),
        (status = 403, description = "Not the author", body = crate::error::ApiErrorBody),
        (status = 404, description = "Board not found", body = crate::error::ApiErrorBody)
    ),
    security(("bearer" = [])),
    tag = "boards"
)]
pub async fn delete_board(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let message = board::delete(&data, auth.user_id()?, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(MessageResponse { message }))
}

/// Pull the `body` JSON and optional `file` image out of a board form.
async fn read_board_form(mut payload: Multipart) -> Result<(BoardInput, Option<ImageUpload>), ApiError> {
    let mut input: Option<BoardInput> = None;
    let mut image: Option<ImageUpload> = None;

    while let Some(mut field) = payload.try_next().await.map_err(|e| {
        log::warn!("multipart error: {e}");
        ApiError::BadRequest("malformed multipart body".into())
    })? {
        let name = field.content_disposition().get_name().map(str::to_owned);
        match name.as_deref() {
            Some("body") => {
                let bytes = read_field(&mut field, BODY_FIELD_LIMIT, "body").await?;
                let parsed = serde_json::from_slice::<BoardInput>(&bytes)
                    .map_err(|e| ApiError::BadRequest(format!("'body' is not valid board JSON: {e}")))?;
                input = Some(parsed);
            }
            Some("file") => {
                let bytes = read_field(&mut field, IMAGE_SIZE_LIMIT, "file").await?;
                if bytes.is_empty() {
                    continue;
                }
                let upload = ImageUpload::from_bytes(bytes).map_err(|_| {
                    ApiError::BadRequest("'file' must be a png, jpeg, gif or webp image".into())
                })?;
                image = Some(upload);
            }
            _ => {
                read_field(&mut field, IMAGE_SIZE_LIMIT, "field").await?;
            }
        }
    }

    let input = input.ok_or_else(|| ApiError::BadRequest("missing 'body' field".into()))?;
    Ok((input, image))
}

async fn read_field(field: &mut Field, limit: usize, name: &str) -> Result<Vec<u8>, ApiError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.try_next().await.map_err(|e| {
        log::warn!("stream read error: {e}");
        ApiError::BadRequest("malformed multipart body".into())
    })? {
        if bytes.len() + chunk.len() > limit {
            return Err(ApiError::BadRequest(format!("'{name}' exceeds {limit} bytes")));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

// ---------------------------------------------------------------------
// comments

#[utoipa::path(
    post,
    path = "/api/v1/comment/{id}",
    params(("id" = i64, Path, description = "Board id")),
    request_body = CommentInput,
    responses(
        (status = 201, description = "Top-level comment created", body = Comment),
        (status = 404, description = "Board not found", body = crate::error::ApiErrorBody)
    ),
    security(("bearer" = [])),
    tag = "comments"
)]
pub async fn create_comment(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<CommentInput>,
) -> Result<HttpResponse, ApiError> {
    let created = comment::create(&data, auth.user_id()?, path.into_inner(), payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(created))
}

#[utoipa::path(
    post,
    path = "/api/v1/comment/subcomment/{id}",
    params(("id" = i64, Path, description = "Parent comment id")),
    request_body = CommentInput,
    responses(
        (status = 201, description = "Reply created in the parent's thread", body = Comment),
        (status = 404, description = "Parent comment not found", body = crate::error::ApiErrorBody)
    ),
    security(("bearer" = [])),
    tag = "comments"
)]
pub async fn create_reply(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<CommentInput>,
) -> Result<HttpResponse, ApiError> {
    let created = comment::reply(&data, auth.user_id()?, path.into_inner(), payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(created))
}

#[utoipa::path(
    put,
    path = "/api/v1/comment/{id}",
    params(("id" = i64, Path, description = "Comment id")),
    request_body = CommentInput,
    responses(
        (status = 200, description = "Comment updated", body = Comment),
        (status = 403, description = "Not the author", body = crate::error::ApiErrorBody),
        (status = 404, description = "Comment not found", body = crate::error::ApiErrorBody)
    ),
    security(("bearer" = [])),
    tag = "comments"
)]
pub async fn update_comment(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<CommentInput>,
) -> Result<HttpResponse, ApiError> {
    let updated = comment::update(&data, auth.user_id()?, path.into_inner(), payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(updated))
}

#[utoipa::path(
    delete,
    path = "/api/v1/comment/{id}",
    params(("id" = i64, Path, description = "Comment id")),
    responses(
        (status = 200, description = "Comment soft-deleted", body = MessageResponse),
        (status = 403, description = "Not the author", body = crate::error::ApiErrorBody),
        (status = 404, description = "Comment not found", body = crate::error::ApiErrorBody)
    ),
    security(("bearer" = [])),
    tag = "comments"
)]
pub async fn delete_comment(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let message = comment::delete(&data, auth.user_id()?, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(MessageResponse { message }))
}

// ---------------------------------------------------------------------
// users

#[utoipa::path(
    post,
    path = "/api/v1/user/signup",
    request_body = Credentials,
    responses(
        (status = 201, description = "User created", body = SignupResponse),
        (status = 400, description = "Validation failure", body = crate::error::ApiErrorBody),
        (status = 409, description = "Username taken", body = crate::error::ApiErrorBody)
    ),
    tag = "users"
)]
pub async fn signup(data: web::Data<AppState>, payload: web::Json<Credentials>) -> Result<HttpResponse, ApiError> {
    let created = user::signup(&data, payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(created))
}

#[utoipa::path(
    post,
    path = "/api/v1/user/login",
    request_body = Credentials,
    responses(
        (status = 200, description = "Access and refresh tokens", body = TokenPair),
        (status = 401, description = "Bad credentials", body = crate::error::ApiErrorBody)
    ),
    tag = "users"
)]
pub async fn login(data: web::Data<AppState>, payload: web::Json<Credentials>) -> Result<HttpResponse, ApiError> {
    let tokens = user::login(&data, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(tokens))
}

#[utoipa::path(
    post,
    path = "/api/v1/user/refresh",
    responses(
        (status = 200, description = "Rotated token pair", body = TokenPair),
        (status = 401, description = "Refresh token missing, expired or revoked", body = crate::error::ApiErrorBody)
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn refresh(data: web::Data<AppState>, bearer: Option<BearerAuth>) -> Result<HttpResponse, ApiError> {
    let bearer = bearer.ok_or(AuthError::Missing)?;
    let tokens = user::refresh(&data, bearer.token()).await?;
    Ok(HttpResponse::Ok().json(tokens))
}

// ---------------------------------------------------------------------
// stats

#[utoipa::path(
    post,
    path = "/api/v1/stats/rollup/{window}",
    params(("window" = String, Path, description = "weekly, monthly or annual")),
    responses(
        (status = 200, description = "Rollup ran", body = RollupResponse),
        (status = 400, description = "Unknown window", body = crate::error::ApiErrorBody),
        (status = 403, description = "Forbidden – admins only", body = crate::error::ApiErrorBody)
    ),
    security(("bearer" = [])),
    tag = "stats"
)]
pub async fn run_rollup(auth: Auth, data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    crate::require_role!(auth, Role::Admin);
    let window = path.into_inner().parse::<StatWindow>().map_err(ApiError::BadRequest)?;
    let updated = stats::run_rollup(data.repo.as_ref(), window, view_date(Utc::now())).await?;
    Ok(HttpResponse::Ok().json(RollupResponse { window, updated }))
}
