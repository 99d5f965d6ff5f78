#![cfg(feature = "postgres-store")]

use chrono::{Days, Utc};
use sqlx::postgres::PgPoolOptions;

use boardhub::models::{Category, NewBoard, NewUser, Role, SortBy};
use boardhub::repo::pg::PgRepo;
use boardhub::repo::{BoardRepo, RepoError, UserRepo, ViewRepo};
use boardhub::stats::{run_rollup, view_date, StatWindow};

async fn pg_repo() -> Option<PgRepo> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new().max_connections(8).connect(&url).await.ok()?;
    sqlx::migrate!("./migrations").run(&pool).await.ok()?;
    Some(PgRepo::new(pool))
}

async fn seed_board(repo: &PgRepo) -> i64 {
    let username = format!("u{}", &uuid::Uuid::new_v4().simple().to_string()[..12]);
    let user = repo
        .create_user(NewUser { username: username.clone(), password_hash: "h".into(), role: Role::Normal })
        .await
        .unwrap();
    repo.create_board(NewBoard {
        title: "pg".into(),
        content: "body".into(),
        category: Category::Qna,
        user_id: user.id,
        author: username,
    })
    .await
    .unwrap()
    .id
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pg_concurrent_increments_serialize_on_row_lock() {
    let Some(repo) = pg_repo().await else { eprintln!("skip: no DATABASE_URL"); return };
    let id = seed_board(&repo).await;

    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let repo = repo.clone();
            tokio::spawn(async move { repo.increment_view_count(id).await.unwrap() })
        })
        .collect();
    for t in tasks {
        t.await.unwrap();
    }
    assert_eq!(repo.get_board(id).await.unwrap().view_count, 32);
}

#[tokio::test]
async fn pg_increment_on_deleted_board_rolls_back() {
    let Some(repo) = pg_repo().await else { eprintln!("skip: no DATABASE_URL"); return };
    let id = seed_board(&repo).await;
    repo.increment_view_count(id).await.unwrap();
    repo.soft_delete_board(id).await.unwrap();

    assert!(matches!(repo.increment_view_count(id).await, Err(RepoError::NotFound)));
    let (count,): (i64,) = sqlx::query_as("SELECT view_count FROM boards WHERE id = $1")
        .bind(id)
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn pg_weekly_rollup_counts_recent_events() {
    let Some(repo) = pg_repo().await else { eprintln!("skip: no DATABASE_URL"); return };
    let id = seed_board(&repo).await;
    let today = view_date(Utc::now());
    for days in [10, 5, 1] {
        repo.record_view(id, today - Days::new(days)).await.unwrap();
    }

    run_rollup(&repo, StatWindow::Weekly, today).await.unwrap();
    assert_eq!(repo.get_board(id).await.unwrap().weekly_view, 2);

    let listed = repo.list_by_category(Category::Qna, SortBy::WeeklyView).await.unwrap();
    assert!(listed.iter().any(|b| b.id == id));
}

#[tokio::test]
async fn pg_duplicate_username_is_conflict() {
    let Some(repo) = pg_repo().await else { eprintln!("skip: no DATABASE_URL"); return };
    let username = format!("d{}", &uuid::Uuid::new_v4().simple().to_string()[..12]);
    let new = || NewUser { username: username.clone(), password_hash: "h".into(), role: Role::Normal };
    repo.create_user(new()).await.unwrap();
    assert!(matches!(repo.create_user(new()).await, Err(RepoError::Conflict)));
}
