use chrono::NaiveDate;

use crate::models::*;
use crate::stats::StatWindow;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("conflict")] Conflict,
    #[error("storage: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            // unique_violation
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => RepoError::Conflict,
            // foreign_key_violation: the referenced board/user is gone
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23503") => RepoError::NotFound,
            _ => RepoError::Internal(e.to_string()),
        }
    }
}

use async_trait::async_trait;

/// Read methods never return soft-deleted rows.
#[async_trait]
pub trait BoardRepo: Send + Sync {
    async fn create_board(&self, new: NewBoard) -> RepoResult<Board>;
    async fn get_board(&self, id: Id) -> RepoResult<Board>;
    async fn update_board(&self, id: Id, title: &str, content: &str) -> RepoResult<Board>;
    async fn set_image_url(&self, id: Id, url: &str) -> RepoResult<()>;
    async fn soft_delete_board(&self, id: Id) -> RepoResult<()>;
    async fn search_boards(&self, query: &str, criteria: SearchCriteria) -> RepoResult<Vec<Board>>;
    /// Sorted descending by `sort`, ties broken by newest id.
    async fn list_by_category(&self, category: Category, sort: SortBy) -> RepoResult<Vec<Board>>;
    async fn list_inquiries(&self, user_id: Id) -> RepoResult<Vec<Board>>;
}

#[async_trait]
pub trait ViewRepo: Send + Sync {
    async fn record_view(&self, board_id: Id, viewed_on: NaiveDate) -> RepoResult<ViewEvent>;
    /// Adds exactly one to the total counter under a row lock; returns the new total.
    async fn increment_view_count(&self, board_id: Id) -> RepoResult<i64>;
    /// Overwrites `window`'s counter for every board with events after `cutoff`.
    async fn rollup_views(&self, window: StatWindow, cutoff: NaiveDate) -> RepoResult<u64>;
}

#[async_trait]
pub trait CommentRepo: Send + Sync {
    async fn create_comment(&self, new: NewComment) -> RepoResult<Comment>;
    async fn get_comment(&self, id: Id) -> RepoResult<Comment>;
    async fn update_comment(&self, id: Id, content: &str) -> RepoResult<Comment>;
    async fn soft_delete_comment(&self, id: Id) -> RepoResult<()>;
    /// Ordered by (comment_tag, id).
    async fn list_comments(&self, board_id: Id) -> RepoResult<Vec<Comment>>;
    async fn soft_delete_comments_by_board(&self, board_id: Id) -> RepoResult<u64>;
}

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn create_user(&self, new: NewUser) -> RepoResult<User>;
    async fn find_user_by_username(&self, username: &str) -> RepoResult<User>;
    async fn get_user(&self, id: Id) -> RepoResult<User>;
    async fn set_refresh_token(&self, id: Id, token: Option<&str>) -> RepoResult<()>;
}

pub trait Repo: BoardRepo + ViewRepo + CommentRepo + UserRepo {}

impl<T> Repo for T where T: BoardRepo + ViewRepo + CommentRepo + UserRepo {}

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use chrono::Utc;
    use serde::{Deserialize, Serialize};
    use std::collections::{BTreeMap, HashMap};
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

    #[derive(Default, Serialize, Deserialize)]
    struct State {
        boards: BTreeMap<Id, Board>,
        views: BTreeMap<Id, ViewEvent>,
        comments: BTreeMap<Id, Comment>,
        users: BTreeMap<Id, User>,
        next_id: Id,
    }

    /// `RwLock`-backed store. The write lock plays the part of the row lock.
    #[derive(Clone, Default)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
        snapshot_path: Option<Arc<PathBuf>>,
    }

    impl InMemRepo {
        /// Ephemeral store; nothing touches disk.
        pub fn new() -> Self {
            Self::default()
        }

        /// Store that loads from and persists every write to `path` as JSON.
        pub fn with_snapshot(path: impl Into<PathBuf>) -> Self {
            let path = path.into();
            let state = Self::load_state_from(&path);
            Self {
                state: Arc::new(RwLock::new(state)),
                snapshot_path: Some(Arc::new(path)),
            }
        }

        fn load_state_from(path: &Path) -> State {
            match std::fs::read(path) {
                Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                    Ok(s) => {
                        tracing::info!(path = %path.display(), "loaded in-memory snapshot");
                        s
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "unparseable snapshot; starting empty");
                        State::default()
                    }
                },
                Err(e) => {
                    tracing::info!(path = %path.display(), error = %e, "no snapshot; starting empty");
                    State::default()
                }
            }
        }

        /// Writes `state` to the snapshot file. Callers hold the write guard
        /// across this call so snapshots land in the order writes commit.
        fn persist(&self, state: &State) {
            let Some(path) = self.snapshot_path.as_ref() else { return };
            let bytes = match serde_json::to_vec_pretty(state) {
                Ok(b) => b,
                Err(e) => {
                    tracing::error!(error = %e, "snapshot serialization failed");
                    return;
                }
            };
            if let Some(dir) = path.parent() {
                let _ = std::fs::create_dir_all(dir);
            }
            if let Err(e) = std::fs::write(path.as_path(), bytes) {
                tracing::error!(path = %path.display(), error = %e, "snapshot write failed");
            }
        }

        // A poisoned lock only means another task panicked mid-write; the maps stay usable.
        fn read(&self) -> RwLockReadGuard<'_, State> {
            self.state.read().unwrap_or_else(|p| p.into_inner())
        }

        fn write(&self) -> RwLockWriteGuard<'_, State> {
            self.state.write().unwrap_or_else(|p| p.into_inner())
        }

        fn next_id(state: &mut State) -> Id {
            state.next_id += 1;
            state.next_id
        }

        fn live_board_mut(state: &mut State, id: Id) -> RepoResult<&mut Board> {
            state.boards.get_mut(&id).filter(|b| !b.is_deleted).ok_or(RepoError::NotFound)
        }

        fn live_comment_mut(state: &mut State, id: Id) -> RepoResult<&mut Comment> {
            state.comments.get_mut(&id).filter(|c| !c.is_deleted).ok_or(RepoError::NotFound)
        }

        fn newest_first(boards: &mut [Board]) {
            boards.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        }
    }

    #[async_trait]
    impl BoardRepo for InMemRepo {
        async fn create_board(&self, new: NewBoard) -> RepoResult<Board> {
            let mut s = self.write();
            if !s.users.contains_key(&new.user_id) {
                return Err(RepoError::NotFound);
            }
            let id = Self::next_id(&mut s);
            let board = Board {
                id,
                author: new.author,
                title: new.title,
                content: new.content,
                category: new.category,
                image_url: None,
                view_count: 0,
                weekly_view: 0,
                monthly_view: 0,
                annual_view: 0,
                created_at: Utc::now(),
                is_deleted: false,
                user_id: new.user_id,
            };
            s.boards.insert(id, board.clone());
            self.persist(&s);
            drop(s);
            Ok(board)
        }

        async fn get_board(&self, id: Id) -> RepoResult<Board> {
            let s = self.read();
            s.boards.get(&id).filter(|b| !b.is_deleted).cloned().ok_or(RepoError::NotFound)
        }

        async fn update_board(&self, id: Id, title: &str, content: &str) -> RepoResult<Board> {
            let mut s = self.write();
            let board = Self::live_board_mut(&mut s, id)?;
            board.title = title.to_string();
            board.content = content.to_string();
            let updated = board.clone();
            self.persist(&s);
            drop(s);
            Ok(updated)
        }

        async fn set_image_url(&self, id: Id, url: &str) -> RepoResult<()> {
            let mut s = self.write();
            // deleted boards may still receive a late upload; matches the SQL path
            let board = s.boards.get_mut(&id).ok_or(RepoError::NotFound)?;
            board.image_url = Some(url.to_string());
            self.persist(&s);
            drop(s);
            Ok(())
        }

        async fn soft_delete_board(&self, id: Id) -> RepoResult<()> {
            let mut s = self.write();
            Self::live_board_mut(&mut s, id)?.is_deleted = true;
            self.persist(&s);
            drop(s);
            Ok(())
        }

        async fn search_boards(&self, query: &str, criteria: SearchCriteria) -> RepoResult<Vec<Board>> {
            let needle = query.to_lowercase();
            let hit = |field: &str| field.to_lowercase().contains(&needle);
            let s = self.read();
            let mut v: Vec<Board> = s
                .boards
                .values()
                .filter(|b| !b.is_deleted)
                .filter(|b| match criteria {
                    SearchCriteria::Title => hit(&b.title),
                    SearchCriteria::Author => hit(&b.author),
                    SearchCriteria::All => hit(&b.title) || hit(&b.author),
                })
                .cloned()
                .collect();
            Self::newest_first(&mut v);
            Ok(v)
        }

        async fn list_by_category(&self, category: Category, sort: SortBy) -> RepoResult<Vec<Board>> {
            let s = self.read();
            let mut v: Vec<Board> = s
                .boards
                .values()
                .filter(|b| !b.is_deleted && b.category == category)
                .cloned()
                .collect();
            match sort {
                SortBy::CreatedAt => Self::newest_first(&mut v),
                _ => {
                    let key = |b: &Board| match sort {
                        SortBy::TotalView => b.view_count,
                        SortBy::WeeklyView => b.weekly_view,
                        SortBy::MonthlyView => b.monthly_view,
                        SortBy::AnnualView => b.annual_view,
                        SortBy::CreatedAt => 0,
                    };
                    v.sort_by(|a, b| key(b).cmp(&key(a)).then(b.id.cmp(&a.id)));
                }
            }
            Ok(v)
        }

        async fn list_inquiries(&self, user_id: Id) -> RepoResult<Vec<Board>> {
            let s = self.read();
            let mut v: Vec<Board> = s
                .boards
                .values()
                .filter(|b| !b.is_deleted && b.category == Category::Inquiry && b.user_id == user_id)
                .cloned()
                .collect();
            Self::newest_first(&mut v);
            Ok(v)
        }
    }

    #[async_trait]
    impl ViewRepo for InMemRepo {
        async fn record_view(&self, board_id: Id, viewed_on: NaiveDate) -> RepoResult<ViewEvent> {
            let mut s = self.write();
            if !s.boards.contains_key(&board_id) {
                return Err(RepoError::NotFound);
            }
            let id = Self::next_id(&mut s);
            let event = ViewEvent { id, board_id, viewed_on };
            s.views.insert(id, event.clone());
            self.persist(&s);
            drop(s);
            Ok(event)
        }

        async fn increment_view_count(&self, board_id: Id) -> RepoResult<i64> {
            let mut s = self.write();
            let board = Self::live_board_mut(&mut s, board_id)?;
            board.view_count += 1;
            let total = board.view_count;
            self.persist(&s);
            drop(s);
            Ok(total)
        }

        async fn rollup_views(&self, window: StatWindow, cutoff: NaiveDate) -> RepoResult<u64> {
            let mut s = self.write();
            let mut counts: HashMap<Id, i64> = HashMap::new();
            for ev in s.views.values().filter(|ev| ev.viewed_on > cutoff) {
                *counts.entry(ev.board_id).or_default() += 1;
            }
            let mut updated = 0;
            for (board_id, count) in counts {
                if let Some(board) = s.boards.get_mut(&board_id) {
                    let slot = match window {
                        StatWindow::Weekly => &mut board.weekly_view,
                        StatWindow::Monthly => &mut board.monthly_view,
                        StatWindow::Annual => &mut board.annual_view,
                    };
                    *slot = count;
                    updated += 1;
                }
            }
            self.persist(&s);
            drop(s);
            Ok(updated)
        }
    }

    #[async_trait]
    impl CommentRepo for InMemRepo {
        async fn create_comment(&self, new: NewComment) -> RepoResult<Comment> {
            let mut s = self.write();
            if !s.boards.contains_key(&new.board_id) || !s.users.contains_key(&new.user_id) {
                return Err(RepoError::NotFound);
            }
            let id = Self::next_id(&mut s);
            let comment = Comment {
                id,
                content: new.content,
                comment_tag: new.comment_tag,
                is_deleted: false,
                board_id: new.board_id,
                user_id: new.user_id,
                created_at: Utc::now(),
            };
            s.comments.insert(id, comment.clone());
            self.persist(&s);
            drop(s);
            Ok(comment)
        }

        async fn get_comment(&self, id: Id) -> RepoResult<Comment> {
            let s = self.read();
            s.comments.get(&id).filter(|c| !c.is_deleted).cloned().ok_or(RepoError::NotFound)
        }

        async fn update_comment(&self, id: Id, content: &str) -> RepoResult<Comment> {
            let mut s = self.write();
            let comment = Self::live_comment_mut(&mut s, id)?;
            comment.content = content.to_string();
            let updated = comment.clone();
            self.persist(&s);
            drop(s);
            Ok(updated)
        }

        async fn soft_delete_comment(&self, id: Id) -> RepoResult<()> {
            let mut s = self.write();
            Self::live_comment_mut(&mut s, id)?.is_deleted = true;
            self.persist(&s);
            drop(s);
            Ok(())
        }

        async fn list_comments(&self, board_id: Id) -> RepoResult<Vec<Comment>> {
            let s = self.read();
            let mut v: Vec<Comment> = s
                .comments
                .values()
                .filter(|c| c.board_id == board_id && !c.is_deleted)
                .cloned()
                .collect();
            v.sort_by(|a, b| a.comment_tag.cmp(&b.comment_tag).then(a.id.cmp(&b.id)));
            Ok(v)
        }

        async fn soft_delete_comments_by_board(&self, board_id: Id) -> RepoResult<u64> {
            let mut s = self.write();
            let mut n = 0;
            for c in s.comments.values_mut().filter(|c| c.board_id == board_id && !c.is_deleted) {
                c.is_deleted = true;
                n += 1;
            }
            self.persist(&s);
            drop(s);
            Ok(n)
        }
    }

    #[async_trait]
    impl UserRepo for InMemRepo {
        async fn create_user(&self, new: NewUser) -> RepoResult<User> {
            let mut s = self.write();
            if s.users.values().any(|u| u.username == new.username) {
                return Err(RepoError::Conflict);
            }
            let id = Self::next_id(&mut s);
            let user = User {
                id,
                username: new.username,
                password_hash: new.password_hash,
                role: new.role,
                refresh_token: None,
            };
            s.users.insert(id, user.clone());
            self.persist(&s);
            drop(s);
            Ok(user)
        }

        async fn find_user_by_username(&self, username: &str) -> RepoResult<User> {
            let s = self.read();
            s.users.values().find(|u| u.username == username).cloned().ok_or(RepoError::NotFound)
        }

        async fn get_user(&self, id: Id) -> RepoResult<User> {
            let s = self.read();
            s.users.get(&id).cloned().ok_or(RepoError::NotFound)
        }

        async fn set_refresh_token(&self, id: Id, token: Option<&str>) -> RepoResult<()> {
            let mut s = self.write();
            let user = s.users.get_mut(&id).ok_or(RepoError::NotFound)?;
            user.refresh_token = token.map(str::to_string);
            self.persist(&s);
            drop(s);
            Ok(())
        }
    }
}

// Postgres implementation (feature = "postgres-store")
#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use sqlx::{Pool, Postgres, Transaction};

    const BOARD_COLUMNS: &str = "id, author, title, content, category, image_url, view_count, \
        weekly_view, monthly_view, annual_view, created_at, is_deleted, user_id";
    const COMMENT_COLUMNS: &str = "id, content, comment_tag, is_deleted, board_id, user_id, created_at";
    const USER_COLUMNS: &str = "id, username, password_hash, role, refresh_token";

    #[derive(Clone)]
    pub struct PgRepo { pool: Pool<Postgres> }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self { Self { pool } }

        pub fn pool(&self) -> &Pool<Postgres> { &self.pool }

        /// Body of the increment transaction. The caller commits or rolls back.
        async fn bump_locked(tx: &mut Transaction<'_, Postgres>, board_id: Id) -> RepoResult<i64> {
            let locked: Option<(i64,)> = sqlx::query_as(
                "SELECT view_count FROM boards WHERE id = $1 AND NOT is_deleted FOR UPDATE",
            )
            .bind(board_id)
            .fetch_optional(&mut **tx)
            .await?;
            if locked.is_none() {
                return Err(RepoError::NotFound);
            }
            let (total,): (i64,) = sqlx::query_as(
                "UPDATE boards SET view_count = COALESCE(view_count, 0) + 1 WHERE id = $1 RETURNING view_count",
            )
            .bind(board_id)
            .fetch_one(&mut **tx)
            .await?;
            Ok(total)
        }
    }

    /// Escape LIKE metacharacters and wrap for a substring match.
    fn like_pattern(query: &str) -> String {
        let escaped = query.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
        format!("%{escaped}%")
    }

    #[async_trait]
    impl BoardRepo for PgRepo {
        async fn create_board(&self, new: NewBoard) -> RepoResult<Board> {
            let sql = format!(
                "INSERT INTO boards (author, title, content, category, user_id) VALUES ($1,$2,$3,$4,$5) RETURNING {BOARD_COLUMNS}"
            );
            let rec = sqlx::query_as::<_, Board>(&sql)
                .bind(&new.author)
                .bind(&new.title)
                .bind(&new.content)
                .bind(new.category)
                .bind(new.user_id)
                .fetch_one(&self.pool)
                .await?;
            Ok(rec)
        }

        async fn get_board(&self, id: Id) -> RepoResult<Board> {
            let sql = format!("SELECT {BOARD_COLUMNS} FROM boards WHERE id = $1 AND NOT is_deleted");
            let rec = sqlx::query_as::<_, Board>(&sql).bind(id).fetch_one(&self.pool).await?;
            Ok(rec)
        }

        async fn update_board(&self, id: Id, title: &str, content: &str) -> RepoResult<Board> {
            let sql = format!(
                "UPDATE boards SET title = $2, content = $3 WHERE id = $1 AND NOT is_deleted RETURNING {BOARD_COLUMNS}"
            );
            let rec = sqlx::query_as::<_, Board>(&sql)
                .bind(id)
                .bind(title)
                .bind(content)
                .fetch_one(&self.pool)
                .await?;
            Ok(rec)
        }

        async fn set_image_url(&self, id: Id, url: &str) -> RepoResult<()> {
            let res = sqlx::query("UPDATE boards SET image_url = $2 WHERE id = $1")
                .bind(id)
                .bind(url)
                .execute(&self.pool)
                .await?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }

        async fn soft_delete_board(&self, id: Id) -> RepoResult<()> {
            let res = sqlx::query("UPDATE boards SET is_deleted = TRUE WHERE id = $1 AND NOT is_deleted")
                .bind(id)
                .execute(&self.pool)
                .await?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }

        async fn search_boards(&self, query: &str, criteria: SearchCriteria) -> RepoResult<Vec<Board>> {
            let predicate = match criteria {
                SearchCriteria::Title => "title ILIKE $1",
                SearchCriteria::Author => "author ILIKE $1",
                SearchCriteria::All => "(title ILIKE $1 OR author ILIKE $1)",
            };
            let sql = format!(
                "SELECT {BOARD_COLUMNS} FROM boards WHERE NOT is_deleted AND {predicate} ORDER BY created_at DESC, id DESC"
            );
            let recs = sqlx::query_as::<_, Board>(&sql)
                .bind(like_pattern(query))
                .fetch_all(&self.pool)
                .await?;
            Ok(recs)
        }

        async fn list_by_category(&self, category: Category, sort: SortBy) -> RepoResult<Vec<Board>> {
            // column names come from a closed enum, never from user input
            let sql = format!(
                "SELECT {BOARD_COLUMNS} FROM boards WHERE category = $1 AND NOT is_deleted ORDER BY {} DESC, id DESC",
                sort.column()
            );
            let recs = sqlx::query_as::<_, Board>(&sql).bind(category).fetch_all(&self.pool).await?;
            Ok(recs)
        }

        async fn list_inquiries(&self, user_id: Id) -> RepoResult<Vec<Board>> {
            let sql = format!(
                "SELECT {BOARD_COLUMNS} FROM boards WHERE category = $1 AND user_id = $2 AND NOT is_deleted ORDER BY created_at DESC, id DESC"
            );
            let recs = sqlx::query_as::<_, Board>(&sql)
                .bind(Category::Inquiry)
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
            Ok(recs)
        }
    }

    #[async_trait]
    impl ViewRepo for PgRepo {
        async fn record_view(&self, board_id: Id, viewed_on: NaiveDate) -> RepoResult<ViewEvent> {
            let rec = sqlx::query_as::<_, ViewEvent>(
                "INSERT INTO view_events (board_id, viewed_on) VALUES ($1,$2) RETURNING id, board_id, viewed_on",
            )
            .bind(board_id)
            .bind(viewed_on)
            .fetch_one(&self.pool)
            .await?;
            Ok(rec)
        }

        async fn increment_view_count(&self, board_id: Id) -> RepoResult<i64> {
            let mut tx = self.pool.begin().await?;
            match Self::bump_locked(&mut tx, board_id).await {
                Ok(total) => {
                    tx.commit().await?;
                    Ok(total)
                }
                Err(e) => {
                    tx.rollback().await?;
                    Err(e)
                }
            }
        }

        async fn rollup_views(&self, window: StatWindow, cutoff: NaiveDate) -> RepoResult<u64> {
            let sql = format!(
                r#"
                UPDATE boards AS b SET {col} = v.cnt
                FROM (
                    SELECT board_id, COUNT(*) AS cnt
                    FROM view_events
                    WHERE viewed_on > $1
                    GROUP BY board_id
                ) AS v
                WHERE b.id = v.board_id
                "#,
                col = window.column()
            );
            let res = sqlx::query(&sql).bind(cutoff).execute(&self.pool).await?;
            Ok(res.rows_affected())
        }
    }

    #[async_trait]
    impl CommentRepo for PgRepo {
        async fn create_comment(&self, new: NewComment) -> RepoResult<Comment> {
            let sql = format!(
                "INSERT INTO comments (comment_tag, content, board_id, user_id) VALUES ($1,$2,$3,$4) RETURNING {COMMENT_COLUMNS}"
            );
            let rec = sqlx::query_as::<_, Comment>(&sql)
                .bind(&new.comment_tag)
                .bind(&new.content)
                .bind(new.board_id)
                .bind(new.user_id)
                .fetch_one(&self.pool)
                .await?;
            Ok(rec)
        }

        async fn get_comment(&self, id: Id) -> RepoResult<Comment> {
            let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1 AND NOT is_deleted");
            let rec = sqlx::query_as::<_, Comment>(&sql).bind(id).fetch_one(&self.pool).await?;
            Ok(rec)
        }

        async fn update_comment(&self, id: Id, content: &str) -> RepoResult<Comment> {
            let sql = format!(
                "UPDATE comments SET content = $2 WHERE id = $1 AND NOT is_deleted RETURNING {COMMENT_COLUMNS}"
            );
            let rec = sqlx::query_as::<_, Comment>(&sql)
                .bind(id)
                .bind(content)
                .fetch_one(&self.pool)
                .await?;
            Ok(rec)
        }

        async fn soft_delete_comment(&self, id: Id) -> RepoResult<()> {
            let res = sqlx::query("UPDATE comments SET is_deleted = TRUE WHERE id = $1 AND NOT is_deleted")
                .bind(id)
                .execute(&self.pool)
                .await?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }

        async fn list_comments(&self, board_id: Id) -> RepoResult<Vec<Comment>> {
            let sql = format!(
                "SELECT {COMMENT_COLUMNS} FROM comments WHERE board_id = $1 AND NOT is_deleted ORDER BY comment_tag ASC, id ASC"
            );
            let recs = sqlx::query_as::<_, Comment>(&sql).bind(board_id).fetch_all(&self.pool).await?;
            Ok(recs)
        }

        async fn soft_delete_comments_by_board(&self, board_id: Id) -> RepoResult<u64> {
            let res = sqlx::query("UPDATE comments SET is_deleted = TRUE WHERE board_id = $1 AND NOT is_deleted")
                .bind(board_id)
                .execute(&self.pool)
                .await?;
            Ok(res.rows_affected())
        }
    }

    #[async_trait]
    impl UserRepo for PgRepo {
        async fn create_user(&self, new: NewUser) -> RepoResult<User> {
            let sql = format!(
                "INSERT INTO users (username, password_hash, role) VALUES ($1,$2,$3) RETURNING {USER_COLUMNS}"
            );
            let rec = sqlx::query_as::<_, User>(&sql)
                .bind(&new.username)
                .bind(&new.password_hash)
                .bind(new.role)
                .fetch_one(&self.pool)
                .await?;
            Ok(rec)
        }

        async fn find_user_by_username(&self, username: &str) -> RepoResult<User> {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
            let rec = sqlx::query_as::<_, User>(&sql).bind(username).fetch_one(&self.pool).await?;
            Ok(rec)
        }

        async fn get_user(&self, id: Id) -> RepoResult<User> {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
            let rec = sqlx::query_as::<_, User>(&sql).bind(id).fetch_one(&self.pool).await?;
            Ok(rec)
        }

        async fn set_refresh_token(&self, id: Id, token: Option<&str>) -> RepoResult<()> {
            let res = sqlx::query("UPDATE users SET refresh_token = $2 WHERE id = $1")
                .bind(id)
                .bind(token)
                .execute(&self.pool)
                .await?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }
    }

}
