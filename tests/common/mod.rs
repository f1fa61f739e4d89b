#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use bookswap_app::{
    modules::users::{models::UpdateUser, store as users},
    AppState, Outbox,
};
use bookswap_authz::Role;
use bookswap_db::Database;
use bookswap_kernel::settings::Settings;
use serde_json::{json, Value};
use tower::ServiceExt;

/// Captures account notices so tests can read the tokens they carry.
#[derive(Default)]
pub struct MemoryOutbox {
    sent: Mutex<Vec<(String, String)>>,
}

impl MemoryOutbox {
    /// The token at the end of the last notice sent to `to`.
    pub fn last_token(&self, to: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(recipient, _)| recipient == to)
            .and_then(|(_, body)| body.split_whitespace().last().map(str::to_string))
    }
}

impl Outbox for MemoryOutbox {
    fn deliver(&self, to: &str, _subject: &str, body: &str) {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
    }
}

pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub struct Account {
    pub id: String,
    pub email: String,
    pub token: String,
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub outbox: Arc<MemoryOutbox>,
}

impl TestApp {
    pub fn new() -> Self {
        let settings = Settings::default();
        let outbox = Arc::new(MemoryOutbox::default());
        let state = AppState::new(Database::in_memory().unwrap(), &settings)
            .with_outbox(outbox.clone());
        let router = bookswap_app::build_router(&state, &settings).unwrap();
        Self {
            router,
            state,
            outbox,
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        Response {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: &str) -> Response {
        self.send(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> Response {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> Response {
        self.send(Method::PATCH, uri, Some(token), Some(body)).await
    }

    /// Register and log in `name`, promoting the account when `role` is admin.
    pub async fn account(&self, name: &str, role: Role) -> Account {
        let email = format!("{name}@example.com");
        let registered = self
            .post(
                "/register",
                None,
                json!({ "email": email, "username": name, "password": "12345678" }),
            )
            .await;
        assert_eq!(registered.status, StatusCode::CREATED, "{:?}", registered.body);
        let id = registered.body["id"].as_str().unwrap().to_string();

        if role == Role::Admin {
            let user_id = id.clone();
            self.state
                .db
                .write(move |conn| {
                    users::update(
                        conn,
                        &user_id,
                        &UpdateUser {
                            role: Some(Role::Admin),
                            ..UpdateUser::default()
                        },
                    )
                })
                .unwrap();
        }

        let login = self
            .post(
                "/login",
                None,
                json!({ "email": email, "password": "12345678" }),
            )
            .await;
        assert_eq!(login.status, StatusCode::OK, "{:?}", login.body);

        Account {
            id,
            email,
            token: login.body["token"].as_str().unwrap().to_string(),
        }
    }

    /// List a book as `owner`, who must be an administrator.
    pub async fn book(&self, owner: &Account, name: &str) -> String {
        let created = self
            .post(
                "/book",
                Some(&owner.token),
                json!({ "name": name, "photo": format!("https://covers.example/{name}.jpg") }),
            )
            .await;
        assert_eq!(created.status, StatusCode::CREATED, "{:?}", created.body);
        created.body["id"].as_str().unwrap().to_string()
    }
}
