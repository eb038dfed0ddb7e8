use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, App};
use log::debug;
use serde_json::{json, Value};

use crate::{market::test_utils::context, server::configure, store::MemoryStore};

/// A marketplace backed by a shared in-memory store. Every request is served by a fresh app over the same store, the
/// same way separate workers share one database.
#[derive(Clone, Default)]
pub struct TestMarket {
    pub db: MemoryStore,
}

impl TestMarket {
    pub fn new() -> Self {
        let _ = env_logger::try_init();
        Self::default()
    }

    pub async fn send(&self, req: TestRequest) -> (StatusCode, Value) {
        let ctx = context(self.db.clone());
        let app = test::init_service(App::new().configure(|cfg| configure(cfg, ctx))).await;
        // Guard rejections surface as service errors here; a running server renders them the same way.
        let res = match test::try_call_service(&app, req.to_request()).await {
            Ok(res) => res.into_parts().1.map_into_boxed_body(),
            Err(e) => e.error_response(),
        };
        let status = res.status();
        let body = res.into_body().try_into_bytes().unwrap_or_default();
        debug!("{status}: {}", String::from_utf8_lossy(&body));
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(with_token(TestRequest::get().uri(path), token)).await
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(with_token(TestRequest::post().uri(path).set_json(body), token)).await
    }

    pub async fn put(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(with_token(TestRequest::put().uri(path).set_json(body), token)).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(with_token(TestRequest::delete().uri(path), token)).await
    }

    /// Registers and logs in an account of the given role (`"user"` or `"seller"`), returning the login payload.
    pub async fn sign_up_and_login(&self, role: &str, email: &str) -> Value {
        let creds = json!({ "email": email, "password": "hunter2", "first_name": "Test" });
        let (status, _) = self.post(&format!("/{role}/create"), None, creds.clone()).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = self.post(&format!("/{role}/login"), None, creds).await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["data"].clone()
    }
}

fn with_token(req: TestRequest, token: Option<&str>) -> TestRequest {
    match token {
        Some(t) => req.insert_header(("Authorization", format!("Bearer {t}"))),
        None => req,
    }
}

pub fn access_token(login: &Value) -> String {
    login["access_token"].as_str().unwrap_or_default().to_string()
}

pub fn assert_envelope(body: &Value) {
    let obj = body.as_object().unwrap_or_else(|| panic!("not an envelope: {body}"));
    for key in ["message", "data", "errors", "status", "timestamp"] {
        assert!(obj.contains_key(key), "missing {key} in {body}");
    }
}
