#![cfg(feature = "inmem-store")]

mod common;

use std::sync::Arc;
use std::time::Duration;

use actix_web::{test, web, App};
use serial_test::serial;

use boardhub::models::{Board, Role};
use boardhub::repo::inmem::InMemRepo;
use boardhub::repo::BoardRepo;
use boardhub::routes::config;

use common::*;

/// Uploads run detached from the request; poll until the URL lands.
async fn wait_for_image(repo: &InMemRepo, board_id: i64) -> Board {
    for _ in 0..100 {
        let board = repo.get_board(board_id).await.unwrap();
        if board.image_url.is_some() {
            return board;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("image url never recorded for board {board_id}");
}

#[actix_web::test]
#[serial]
async fn create_uploads_in_background_and_update_overwrites_same_key() {
    set_secret();
    let repo = InMemRepo::new();
    let a = seed_user(&repo, "alice", Role::Normal).await;
    let store = Arc::new(MockImageStore::default());
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state_with(repo.clone(), store.clone())))
            .configure(config),
    )
    .await;

    let png = sample_png();
    let (ct, body) = board_form("With image", "look", Some(&png));
    let req = test::TestRequest::post()
        .uri("/api/v1/board/qna")
        .insert_header(bearer(&a))
        .insert_header(("Content-Type", ct))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let created: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let board_id = created["board_id"].as_i64().unwrap();

    let board = wait_for_image(&repo, board_id).await;
    let url = board.image_url.unwrap();
    assert!(url.starts_with(&format!("{IMAGE_BASE}/images/{board_id}/")));
    assert!(url.ends_with(".png"));
    let keys = store.keys();
    assert_eq!(keys.len(), 1);

    // a new image replaces the object under the existing key
    let mut other = png.clone();
    other.extend_from_slice(b"trailing bytes change the hash");
    let (ct, body) = board_form("With image", "updated", Some(&other));
    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/board/{board_id}"))
        .insert_header(bearer(&a))
        .insert_header(("Content-Type", ct))
        .set_payload(body)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    for _ in 0..100 {
        let stored = store.objects.lock().unwrap().get(&keys[0]).map(|(b, _)| b.len());
        if stored == Some(other.len()) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(store.keys(), keys);
    assert_eq!(store.objects.lock().unwrap()[&keys[0]].0, other);

    // delete removes the object too
    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/board/{board_id}"))
        .insert_header(bearer(&a))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
    assert_eq!(*store.deleted.lock().unwrap(), keys);
    assert!(store.keys().is_empty());
}

#[actix_web::test]
#[serial]
async fn storage_outage_never_fails_board_requests() {
    set_secret();
    let repo = InMemRepo::new();
    let a = seed_user(&repo, "alice", Role::Normal).await;
    let store = Arc::new(MockImageStore::failing());
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state_with(repo.clone(), store.clone())))
            .configure(config),
    )
    .await;

    let png = sample_png();
    let (ct, body) = board_form("Unlucky", "upload fails", Some(&png));
    let req = test::TestRequest::post()
        .uri("/api/v1/board/qna")
        .insert_header(bearer(&a))
        .insert_header(("Content-Type", ct))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let created: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let board_id = created["board_id"].as_i64().unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(repo.get_board(board_id).await.unwrap().image_url.is_none());

    // an image URL the store cannot delete is logged and skipped
    repo.set_image_url(board_id, &format!("{IMAGE_BASE}/images/{board_id}/x.png")).await.unwrap();
    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/board/{board_id}"))
        .insert_header(bearer(&a))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
    assert!(repo.get_board(board_id).await.is_err());
}
