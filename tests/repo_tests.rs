#![cfg(feature = "inmem-store")]

use chrono::{Days, NaiveDate};

use boardhub::models::{Category, NewBoard, NewComment, NewUser, Role, SortBy};
use boardhub::repo::inmem::InMemRepo;
use boardhub::repo::RepoError;
// Bring trait method namespaces into scope so calls on InMemRepo resolve.
use boardhub::repo::{BoardRepo, CommentRepo, UserRepo, ViewRepo};
use boardhub::stats::{run_rollup, StatWindow};

async fn repo_with_user() -> (InMemRepo, i64) {
    let r = InMemRepo::new();
    let u = r
        .create_user(NewUser { username: "alice".into(), password_hash: "h".into(), role: Role::Normal })
        .await
        .unwrap();
    (r, u.id)
}

async fn board(r: &InMemRepo, user_id: i64, title: &str, category: Category) -> i64 {
    r.create_board(NewBoard {
        title: title.into(),
        content: "body".into(),
        category,
        user_id,
        author: "alice".into(),
    })
    .await
    .unwrap()
    .id
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_increments_are_not_lost() {
    let (r, uid) = repo_with_user().await;
    let id = board(&r, uid, "hot", Category::Qna).await;

    let tasks: Vec<_> = (0..64)
        .map(|_| {
            let r = r.clone();
            tokio::spawn(async move { r.increment_view_count(id).await.unwrap() })
        })
        .collect();
    let mut totals = Vec::new();
    for t in tasks {
        totals.push(t.await.unwrap());
    }
    totals.sort();

    // every caller saw a distinct post-increment value
    assert_eq!(totals, (1..=64).collect::<Vec<i64>>());
    assert_eq!(r.get_board(id).await.unwrap().view_count, 64);
}

#[tokio::test]
async fn increment_on_deleted_or_missing_board_is_not_found() {
    let (r, uid) = repo_with_user().await;
    let id = board(&r, uid, "gone", Category::Qna).await;
    r.increment_view_count(id).await.unwrap();
    r.soft_delete_board(id).await.unwrap();

    assert!(matches!(r.increment_view_count(id).await, Err(RepoError::NotFound)));
    assert!(matches!(r.increment_view_count(9999).await, Err(RepoError::NotFound)));
    assert!(matches!(r.get_board(id).await, Err(RepoError::NotFound)));
}

#[tokio::test]
async fn weekly_rollup_counts_only_recent_events() {
    let (r, uid) = repo_with_user().await;
    let x = board(&r, uid, "x", Category::Qna).await;
    let quiet = board(&r, uid, "quiet", Category::Qna).await;
    let today = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();

    for days in [10, 5, 1] {
        r.record_view(x, today - Days::new(days)).await.unwrap();
    }
    r.record_view(quiet, today - Days::new(20)).await.unwrap();

    let updated = run_rollup(&r, StatWindow::Weekly, today).await.unwrap();
    assert_eq!(updated, 1);
    assert_eq!(r.get_board(x).await.unwrap().weekly_view, 2);
    assert_eq!(r.get_board(quiet).await.unwrap().weekly_view, 0);

    // monthly window reaches back to 2024-02-20
    run_rollup(&r, StatWindow::Monthly, today).await.unwrap();
    assert_eq!(r.get_board(x).await.unwrap().monthly_view, 3);
    assert_eq!(r.get_board(quiet).await.unwrap().monthly_view, 1);
}

#[tokio::test]
async fn stale_window_counts_are_kept() {
    let (r, uid) = repo_with_user().await;
    let x = board(&r, uid, "x", Category::Qna).await;
    let day = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
    r.record_view(x, day).await.unwrap();

    run_rollup(&r, StatWindow::Weekly, day).await.unwrap();
    assert_eq!(r.get_board(x).await.unwrap().weekly_view, 1);

    // a month later nothing qualifies, so the board is not touched
    let later = day + Days::new(31);
    assert_eq!(run_rollup(&r, StatWindow::Weekly, later).await.unwrap(), 0);
    assert_eq!(r.get_board(x).await.unwrap().weekly_view, 1);
}

#[tokio::test]
async fn comments_list_in_thread_order_and_cascade_on_board_delete() {
    let (r, uid) = repo_with_user().await;
    let b = board(&r, uid, "threads", Category::Qna).await;
    let new = |tag: &str, content: &str| NewComment {
        comment_tag: tag.into(),
        content: content.into(),
        board_id: b,
        user_id: uid,
    };

    let head_z = r.create_comment(new("ffff", "head z")).await.unwrap();
    let head_a = r.create_comment(new("0000", "head a")).await.unwrap();
    let reply_z = r.create_comment(new("ffff", "reply z")).await.unwrap();
    let reply_a = r.create_comment(new("0000", "reply a")).await.unwrap();

    let ids: Vec<i64> = r.list_comments(b).await.unwrap().iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![head_a.id, reply_a.id, head_z.id, reply_z.id]);

    r.soft_delete_board(b).await.unwrap();
    assert_eq!(r.soft_delete_comments_by_board(b).await.unwrap(), 4);
    assert!(r.list_comments(b).await.unwrap().is_empty());
    assert!(matches!(r.get_comment(head_a.id).await, Err(RepoError::NotFound)));
}

#[tokio::test]
async fn comment_requires_existing_board() {
    let (r, uid) = repo_with_user().await;
    let err = r
        .create_comment(NewComment { comment_tag: "t".into(), content: "c".into(), board_id: 42, user_id: uid })
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound));
}

#[tokio::test]
async fn duplicate_username_conflicts() {
    let (r, _) = repo_with_user().await;
    let err = r
        .create_user(NewUser { username: "alice".into(), password_hash: "h".into(), role: Role::Normal })
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::Conflict));
}

#[tokio::test]
async fn qna_sorted_by_views_and_inquiries_scoped_to_owner() {
    let (r, alice) = repo_with_user().await;
    let bob = r
        .create_user(NewUser { username: "bob1".into(), password_hash: "h".into(), role: Role::Normal })
        .await
        .unwrap()
        .id;

    let low = board(&r, alice, "low", Category::Qna).await;
    let high = board(&r, alice, "high", Category::Qna).await;
    for _ in 0..3 {
        r.increment_view_count(high).await.unwrap();
    }
    r.increment_view_count(low).await.unwrap();
    board(&r, alice, "notice", Category::Notice).await;

    let by_views: Vec<i64> = r
        .list_by_category(Category::Qna, SortBy::TotalView)
        .await
        .unwrap()
        .iter()
        .map(|b| b.id)
        .collect();
    assert_eq!(by_views, vec![high, low]);

    let mine = board(&r, alice, "my question", Category::Inquiry).await;
    board(&r, bob, "bob's question", Category::Inquiry).await;
    let listed: Vec<i64> = r.list_inquiries(alice).await.unwrap().iter().map(|b| b.id).collect();
    assert_eq!(listed, vec![mine]);
}

#[tokio::test]
async fn snapshot_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let r = InMemRepo::with_snapshot(&path);
    let u = r
        .create_user(NewUser { username: "carol".into(), password_hash: "phc".into(), role: Role::Admin })
        .await
        .unwrap();
    let id = board(&r, u.id, "persisted", Category::Notice).await;
    r.soft_delete_board(id).await.unwrap();
    drop(r);

    let reloaded = InMemRepo::with_snapshot(&path);
    let user = reloaded.find_user_by_username("carol").await.unwrap();
    assert_eq!(user.password_hash, "phc");
    assert_eq!(user.role, Role::Admin);
    // soft delete marker is part of the snapshot
    assert!(matches!(reloaded.get_board(id).await, Err(RepoError::NotFound)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn snapshot_keeps_every_concurrent_increment() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let r = InMemRepo::with_snapshot(&path);
    let u = r
        .create_user(NewUser { username: "dave".into(), password_hash: "h".into(), role: Role::Normal })
        .await
        .unwrap();
    let id = board(&r, u.id, "busy", Category::Qna).await;

    let tasks: Vec<_> = (0..64)
        .map(|_| {
            let r = r.clone();
            tokio::spawn(async move { r.increment_view_count(id).await.unwrap() })
        })
        .collect();
    for t in tasks {
        t.await.unwrap();
    }
    assert_eq!(r.get_board(id).await.unwrap().view_count, 64);
    drop(r);

    // the file must reflect the last write, not an earlier one that finished late
    let reloaded = InMemRepo::with_snapshot(&path);
    assert_eq!(reloaded.get_board(id).await.unwrap().view_count, 64);
}
