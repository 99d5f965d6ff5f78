//! Two-level comment threads stored flat.
//!
//! A top-level comment gets a fresh random tag; replies copy their parent's
//! tag. Sorting by `(comment_tag, id)` puts every reply directly after its
//! thread head, in creation order.

use tracing::info;

use super::missing;
use crate::error::ApiError;
use crate::models::*;
use crate::routes::AppState;

/// 10 random bytes, hex encoded: 20 characters, 80 bits.
pub const TAG_BYTES: usize = 10;

pub fn generate_thread_tag() -> String {
    hex::encode(rand::random::<[u8; TAG_BYTES]>())
}

pub fn thread_order(mut comments: Vec<Comment>) -> Vec<Comment> {
    comments.sort_by(|a, b| a.comment_tag.cmp(&b.comment_tag).then(a.id.cmp(&b.id)));
    comments
}

pub async fn create(state: &AppState, caller_id: Id, board_id: Id, input: CommentInput) -> Result<Comment, ApiError> {
    input.validate()?;
    state.repo.get_board(board_id).await.map_err(missing("board", board_id))?;
    let comment = state
        .repo
        .create_comment(NewComment {
            comment_tag: generate_thread_tag(),
            content: input.content.trim().to_string(),
            board_id,
            user_id: caller_id,
        })
        .await
        .map_err(missing("board", board_id))?;
    info!(comment_id = comment.id, board_id, "comment created");
    Ok(comment)
}

/// Reply to `parent_id`, joining the parent's thread on the parent's board.
pub async fn reply(state: &AppState, caller_id: Id, parent_id: Id, input: CommentInput) -> Result<Comment, ApiError> {
    input.validate()?;
    let parent = state.repo.get_comment(parent_id).await.map_err(missing("comment", parent_id))?;
    let comment = state
        .repo
        .create_comment(NewComment {
            comment_tag: parent.comment_tag,
            content: input.content.trim().to_string(),
            board_id: parent.board_id,
            user_id: caller_id,
        })
        .await
        .map_err(missing("board", parent.board_id))?;
    info!(comment_id = comment.id, parent_id, "reply created");
    Ok(comment)
}

pub async fn update(state: &AppState, caller_id: Id, comment_id: Id, input: CommentInput) -> Result<Comment, ApiError> {
    input.validate()?;
    owned_comment(state, comment_id, caller_id).await?;
    let updated = state
        .repo
        .update_comment(comment_id, input.content.trim())
        .await
        .map_err(missing("comment", comment_id))?;
    Ok(updated)
}

pub async fn delete(state: &AppState, caller_id: Id, comment_id: Id) -> Result<String, ApiError> {
    owned_comment(state, comment_id, caller_id).await?;
    state
        .repo
        .soft_delete_comment(comment_id)
        .await
        .map_err(missing("comment", comment_id))?;
    Ok(format!("comment {comment_id} deleted"))
}

async fn owned_comment(state: &AppState, comment_id: Id, caller_id: Id) -> Result<Comment, ApiError> {
    let comment = state.repo.get_comment(comment_id).await.map_err(missing("comment", comment_id))?;
    if comment.user_id != caller_id {
        return Err(ApiError::Forbidden("you may only modify your own comments".into()));
    }
    Ok(comment)
}
