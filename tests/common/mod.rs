#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use boardhub::auth::create_access_token;
use boardhub::models::{NewUser, Role, User};
use boardhub::repo::inmem::InMemRepo;
use boardhub::repo::UserRepo;
use boardhub::routes::AppState;
use boardhub::storage::{key_under, ImageStore, ImageStoreError};

pub const IMAGE_BASE: &str = "https://images.test/bucket";
pub const BOUNDARY: &str = "----boardhub-test-boundary";

pub fn set_secret() {
    std::env::set_var("JWT_SECRET", "test-secret-must-be-32-bytes-long!!");
}

// ---------------- In-memory Mock ImageStore (tests only) ----------------
#[derive(Default)]
pub struct MockImageStore {
    pub objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
    pub deleted: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

impl MockImageStore {
    pub fn failing() -> Self {
        let store = Self::default();
        store.fail.store(true, Ordering::SeqCst);
        store
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait::async_trait]
impl ImageStore for MockImageStore {
    async fn put(&self, key: &str, mime: &str, bytes: &[u8]) -> Result<String, ImageStoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ImageStoreError::Other("simulated outage".into()));
        }
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (bytes.to_vec(), mime.to_string()));
        Ok(format!("{IMAGE_BASE}/{key}"))
    }

    async fn delete(&self, url: &str) -> Result<(), ImageStoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ImageStoreError::Other("simulated outage".into()));
        }
        let key = self.key_for_url(url).ok_or(ImageStoreError::NotFound)?;
        self.objects.lock().unwrap().remove(&key);
        self.deleted.lock().unwrap().push(key);
        Ok(())
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        key_under(IMAGE_BASE, url)
    }
}

pub fn state_with(repo: InMemRepo, store: Arc<MockImageStore>) -> AppState {
    AppState { repo: Arc::new(repo), image_store: store }
}

/// Insert a user directly; the hash is never checked by these tests.
pub async fn seed_user(repo: &InMemRepo, username: &str, role: Role) -> User {
    repo.create_user(NewUser {
        username: username.into(),
        password_hash: "unused".into(),
        role,
    })
    .await
    .unwrap()
}

pub fn bearer(user: &User) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", create_access_token(user).unwrap()))
}

/// Multipart body with a JSON `body` part and an optional `file` part.
pub fn board_form(title: &str, content: &str, file: Option<&[u8]>) -> (String, Vec<u8>) {
    let mut body: Vec<u8> = Vec::new();
    let json = serde_json::json!({ "title": title, "content": content }).to_string();
    body.extend_from_slice(
        format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"body\"\r\n\r\n{json}\r\n").as_bytes(),
    );
    if let Some(bytes) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a.png\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

// Minimal 1x1 PNG (transparent)
pub fn sample_png() -> Vec<u8> {
    vec![
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, // signature
        0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D', b'R', 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
        0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, b'I',
        b'D', b'A', b'T', 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A,
        0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, b'I', b'E', b'N', b'D', 0xAE, 0x42, 0x60, 0x82,
    ]
}
