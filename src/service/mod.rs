//! Request-independent operations behind the HTTP handlers.
//!
//! Handlers parse and authenticate; everything that touches the repository
//! or the image store goes through here so it can be exercised without an
//! HTTP stack.

pub mod board;
pub mod comment;
pub mod user;

use crate::error::ApiError;
use crate::models::Id;
use crate::repo::RepoError;

/// Map a repository miss to a 404 naming the entity.
pub(crate) fn missing(kind: &'static str, id: Id) -> impl FnOnce(RepoError) -> ApiError {
    move |e| match e {
        RepoError::NotFound => ApiError::NotFound(format!("{kind} {id} not found")),
        other => other.into(),
    }
}
