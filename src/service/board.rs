use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{comment, missing};
use crate::auth::Claims;
use crate::error::ApiError;
use crate::models::*;
use crate::routes::AppState;
use crate::stats::view_date;
use crate::storage::ImageUpload;

pub async fn search(state: &AppState, query: &str, criteria: SearchCriteria) -> Result<Vec<Board>, ApiError> {
    Ok(state.repo.search_boards(query, criteria).await?)
}

/// Every notice plus QnA boards ordered by `sort`.
pub async fn qna_listing(state: &AppState, sort: SortBy) -> Result<QnaListing, ApiError> {
    let notice = state.repo.list_by_category(Category::Notice, SortBy::CreatedAt).await?;
    let qna = state.repo.list_by_category(Category::Qna, sort).await?;
    Ok(QnaListing { notice, qna })
}

pub async fn inquiries(state: &AppState, user_id: Id) -> Result<Vec<Board>, ApiError> {
    Ok(state.repo.list_inquiries(user_id).await?)
}

/// Detail view. Bumps the total counter, then records one view event.
pub async fn detail(state: &AppState, board_id: Id) -> Result<BoardDetail, ApiError> {
    let mut board = state.repo.get_board(board_id).await.map_err(missing("board", board_id))?;

    board.view_count = state
        .repo
        .increment_view_count(board_id)
        .await
        .map_err(missing("board", board_id))?;
    // Only a view that was counted gets a dated event.
    state
        .repo
        .record_view(board_id, view_date(Utc::now()))
        .await
        .map_err(missing("board", board_id))?;

    let comments = comment::thread_order(state.repo.list_comments(board_id).await?);
    Ok(BoardDetail { board, comments })
}

pub async fn create(
    state: &AppState,
    caller: &Claims,
    category: Category,
    input: BoardInput,
    image: Option<ImageUpload>,
) -> Result<BoardSummary, ApiError> {
    if category == Category::Notice && !caller.is_admin() {
        return Err(ApiError::Forbidden("only admins may post notices".into()));
    }
    input.validate()?;
    let user_id = caller.user_id()?;

    let board = state
        .repo
        .create_board(NewBoard {
            title: input.title.trim().to_string(),
            content: input.content.trim().to_string(),
            category,
            user_id,
            author: caller.username.clone(),
        })
        .await
        .map_err(missing("user", user_id))?;
    info!(board_id = board.id, ?category, user_id, "board created");

    // The response does not wait for the upload.
    if let Some(image) = image {
        let key = image.object_key(board.id);
        spawn_image_upload(state.clone(), board.id, key, image);
    }

    Ok(summary(&board))
}

pub async fn update(
    state: &AppState,
    caller_id: Id,
    board_id: Id,
    input: BoardInput,
    image: Option<ImageUpload>,
) -> Result<BoardSummary, ApiError> {
    input.validate()?;
    let current = owned_board(state, board_id, caller_id).await?;
    let updated = state
        .repo
        .update_board(board_id, input.title.trim(), input.content.trim())
        .await
        .map_err(missing("board", board_id))?;

    if let Some(image) = image {
        // Overwrite the existing object in place when there is one.
        let key = current
            .image_url
            .as_deref()
            .and_then(|url| state.image_store.key_for_url(url))
            .unwrap_or_else(|| image.object_key(board_id));
        spawn_image_upload(state.clone(), board_id, key, image);
    }

    Ok(summary(&updated))
}

/// Owner-only soft delete; cascades to every comment on the board.
pub async fn delete(state: &AppState, caller_id: Id, board_id: Id) -> Result<String, ApiError> {
    let board = owned_board(state, board_id, caller_id).await?;

    if let Some(url) = &board.image_url {
        if let Err(e) = state.image_store.delete(url).await {
            warn!(board_id, url = %url, error = %e, "image delete failed; continuing");
        }
    }

    state.repo.soft_delete_board(board_id).await.map_err(missing("board", board_id))?;
    let comments = state.repo.soft_delete_comments_by_board(board_id).await?;
    info!(board_id, comments, "board deleted");
    Ok(format!("board {board_id} deleted"))
}

async fn owned_board(state: &AppState, board_id: Id, caller_id: Id) -> Result<Board, ApiError> {
    let board = state.repo.get_board(board_id).await.map_err(missing("board", board_id))?;
    if board.user_id != caller_id {
        return Err(ApiError::Forbidden("only the author may modify this board".into()));
    }
    Ok(board)
}

fn summary(board: &Board) -> BoardSummary {
    BoardSummary {
        board_id: board.id,
        title: board.title.clone(),
        content: board.content.clone(),
        user_id: board.user_id,
        author: board.author.clone(),
    }
}

/// Detached upload. Failures are visible only in the logs.
fn spawn_image_upload(state: AppState, board_id: Id, key: String, image: ImageUpload) -> JoinHandle<()> {
    tokio::spawn(async move {
        let url = match state.image_store.put(&key, &image.mime, &image.bytes).await {
            Ok(url) => url,
            Err(e) => {
                warn!(board_id, key = %key, error = %e, "image upload failed");
                return;
            }
        };
        match state.repo.set_image_url(board_id, &url).await {
            Ok(()) => info!(board_id, url = %url, "image attached"),
            Err(e) => warn!(board_id, error = %e, "could not record image url"),
        }
    })
}
