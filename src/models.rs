use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ApiError;

// Always Postgres backed in production
pub type Id = i64;

pub const TITLE_MAX: usize = 50;
pub const CONTENT_MAX: usize = 200;
pub const COMMENT_MAX: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum Category {
    Notice = 0,
    Qna = 1,
    Inquiry = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    Normal,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Board {
    pub id: Id,
    pub author: String,
    pub title: String,
    pub content: String,
    pub category: Category,
    pub image_url: Option<String>,
    pub view_count: i64,
    pub weekly_view: i64,
    pub monthly_view: i64,
    pub annual_view: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_deleted: bool, // soft delete marker
    pub user_id: Id,
}

#[derive(Debug, Clone)]
pub struct NewBoard {
    pub title: String,
    pub content: String,
    pub category: Category,
    pub user_id: Id,
    pub author: String,
}

/// JSON carried in the `body` part of board create/update requests.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BoardInput {
    pub title: String,
    pub content: String,
}

impl BoardInput {
    pub fn validate(&self) -> Result<(), ApiError> {
        let title = self.title.trim();
        if title.is_empty() || title.chars().count() > TITLE_MAX {
            return Err(ApiError::BadRequest(format!("title must be 1..={TITLE_MAX} characters")));
        }
        let content = self.content.trim();
        if content.is_empty() || content.chars().count() > CONTENT_MAX {
            return Err(ApiError::BadRequest(format!("content must be 1..={CONTENT_MAX} characters")));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BoardSummary {
    pub board_id: Id,
    pub title: String,
    pub content: String,
    pub user_id: Id,
    pub author: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BoardDetail {
    #[serde(flatten)]
    pub board: Board,
    /// Ordered by thread tag, then id.
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QnaListing {
    pub notice: Vec<Board>,
    pub qna: Vec<Board>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SearchCriteria {
    #[default]
    All,
    Title,
    Author,
}

impl FromStr for SearchCriteria {
    type Err = ApiError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "title" => Ok(Self::Title),
            "author" => Ok(Self::Author),
            other => Err(ApiError::BadRequest(format!(
                "'criteria' must be one of 'all', 'title', 'author' (got '{other}')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    #[default]
    CreatedAt,
    TotalView,
    WeeklyView,
    MonthlyView,
    AnnualView,
}

impl SortBy {
    pub fn column(self) -> &'static str {
        match self {
            SortBy::CreatedAt => "created_at",
            SortBy::TotalView => "view_count",
            SortBy::WeeklyView => "weekly_view",
            SortBy::MonthlyView => "monthly_view",
            SortBy::AnnualView => "annual_view",
        }
    }
}

impl FromStr for SortBy {
    type Err = ApiError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "createdAt" => Ok(Self::CreatedAt),
            "totalView" => Ok(Self::TotalView),
            "weeklyView" => Ok(Self::WeeklyView),
            "monthlyView" => Ok(Self::MonthlyView),
            "annualView" => Ok(Self::AnnualView),
            other => Err(ApiError::BadRequest(format!(
                "'sortBy' must be one of 'createdAt', 'totalView', 'weeklyView', 'monthlyView', 'annualView' (got '{other}')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct ViewEvent {
    pub id: Id,
    pub board_id: Id,
    pub viewed_on: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Comment {
    pub id: Id,
    pub content: String,
    pub comment_tag: String,
    #[serde(default)]
    pub is_deleted: bool,
    pub board_id: Id,
    pub user_id: Id,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub comment_tag: String,
    pub content: String,
    pub board_id: Id,
    pub user_id: Id,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommentInput {
    pub content: String,
}

impl CommentInput {
    pub fn validate(&self) -> Result<(), ApiError> {
        let len = self.content.trim().chars().count();
        if len == 0 || len > COMMENT_MAX {
            return Err(ApiError::BadRequest(format!("content must be 1..={COMMENT_MAX} characters")));
        }
        Ok(())
    }
}

/// Never serialized into API responses; `SignupResponse` is the public view.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Id,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

/// Body for both signup and login.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut problems = Vec::new();
        if !(4..=20).contains(&self.username.chars().count()) {
            problems.push("username must be 4..=20 characters");
        }
        if !(10..=20).contains(&self.password.chars().count()) {
            problems.push("password must be 10..=20 characters");
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ApiError::BadRequest(problems.join("; ")))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignupResponse {
    pub user_id: Id,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}
