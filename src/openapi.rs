use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error::ApiErrorBody;
use crate::models::{
    Board, BoardDetail, BoardInput, BoardSummary, Category, Comment, CommentInput, Credentials, QnaListing,
    SignupResponse, TokenPair,
};
use crate::routes::{BoardForm, MessageResponse, RollupResponse};
use crate::stats::StatWindow;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::search_boards,
        crate::routes::list_qna,
        crate::routes::list_inquiries,
        crate::routes::get_board,
        crate::routes::create_qna,
        crate::routes::create_inquiry,
        crate::routes::create_notice,
        crate::routes::update_board,
        crate::routes::delete_board,
        crate::routes::create_comment,
        crate::routes::create_reply,
        crate::routes::update_comment,
        crate::routes::delete_comment,
        crate::routes::signup,
        crate::routes::login,
        crate::routes::refresh,
        crate::routes::run_rollup,
    ),
    components(schemas(
        Board, BoardDetail, BoardInput, BoardSummary, BoardForm, Category, Comment, CommentInput,
        Credentials, QnaListing, SignupResponse, TokenPair, MessageResponse, RollupResponse,
        StatWindow, ApiErrorBody
    )),
    modifiers(&BearerScheme),
    tags(
        (name = "boards", description = "Board operations"),
        (name = "comments", description = "Comment threads"),
        (name = "users", description = "Signup, login and token refresh"),
        (name = "stats", description = "View counter rollups"),
    )
)]
pub struct ApiDoc;

struct BearerScheme;

impl Modify for BearerScheme {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
            );
        }
    }
}
