mod common;

use axum::http::{header, Method, StatusCode};
use bookswap_authz::Role;
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn login_sets_cookie_and_check_resolves_the_caller() {
    let app = TestApp::new();
    let alice = app.account("alice", Role::User).await;

    let login = app
        .post(
            "/login",
            None,
            json!({ "email": "ALICE@example.com", "password": "12345678" }),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
    assert_eq!(login.body["userId"], alice.id.as_str());
    let cookie = login.headers[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("auth_token="));
    assert!(cookie.contains("HttpOnly"));

    let check = app.get("/check", &alice.token).await;
    assert_eq!(check.status, StatusCode::OK);
    assert_eq!(check.body["userId"], alice.id.as_str());

    let wrong = app
        .post(
            "/login",
            None,
            json!({ "email": "alice@example.com", "password": "wrong-password" }),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    let unknown = app
        .post(
            "/login",
            None,
            json!({ "email": "nobody@example.com", "password": "12345678" }),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.body["error"]["message"], unknown.body["error"]["message"]);
}

#[tokio::test]
async fn registration_validates_and_rejects_duplicates() {
    let app = TestApp::new();
    app.account("alice", Role::User).await;

    let duplicate = app
        .post(
            "/register",
            None,
            json!({ "email": "alice@example.com", "username": "alice2", "password": "12345678" }),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let invalid = app
        .post(
            "/register",
            None,
            json!({ "email": "not-an-email", "username": "bob", "password": "short" }),
        )
        .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    assert_eq!(invalid.body["error"]["details"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn password_reset_round_trip() {
    let app = TestApp::new();
    let alice = app.account("alice", Role::User).await;

    let requested = app
        .post("/forgot-password", None, json!({ "email": alice.email }))
        .await;
    assert_eq!(requested.status, StatusCode::ACCEPTED);
    let unknown = app
        .post("/forgot-password", None, json!({ "email": "nobody@example.com" }))
        .await;
    assert_eq!(unknown.status, StatusCode::ACCEPTED);

    let token = app.outbox.last_token(&alice.email).unwrap();

    // A reset token is not a session.
    let misuse = app.get("/check", &token).await;
    assert_eq!(misuse.status, StatusCode::UNAUTHORIZED);

    let reset = app
        .post(
            "/reset-password",
            None,
            json!({ "token": token, "password": "a-new-password" }),
        )
        .await;
    assert_eq!(reset.status, StatusCode::NO_CONTENT);

    // The reset spends the token and ends sessions issued before it.
    let replayed = app
        .post(
            "/reset-password",
            None,
            json!({ "token": token, "password": "attacker-password" }),
        )
        .await;
    assert_eq!(replayed.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.get("/check", &alice.token).await.status, StatusCode::UNAUTHORIZED);

    let old = app
        .post("/login", None, json!({ "email": alice.email, "password": "12345678" }))
        .await;
    assert_eq!(old.status, StatusCode::UNAUTHORIZED);
    let new = app
        .post(
            "/login",
            None,
            json!({ "email": alice.email, "password": "a-new-password" }),
        )
        .await;
    assert_eq!(new.status, StatusCode::OK);
    let session = new.body["token"].as_str().unwrap();
    assert_eq!(app.get("/check", session).await.status, StatusCode::OK);

    let forged = app
        .post(
            "/reset-password",
            None,
            json!({ "token": "forged.token", "password": "another-password" }),
        )
        .await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn email_verification_round_trip() {
    let app = TestApp::new();
    let alice = app.account("alice", Role::User).await;

    let sent = app.send(Method::POST, "/verify-email", Some(&alice.token), None).await;
    assert_eq!(sent.status, StatusCode::ACCEPTED);

    let token = app.outbox.last_token(&alice.email).unwrap();
    let confirmed = app
        .post("/verify-email/confirm", None, json!({ "token": token }))
        .await;
    assert_eq!(confirmed.status, StatusCode::OK);
    assert_eq!(confirmed.body["emailVerified"], true);
}

#[tokio::test]
async fn catalog_respects_roles_and_holders() {
    let app = TestApp::new();
    let alice = app.account("alice", Role::Admin).await;
    let bob = app.account("bob", Role::Admin).await;
    let carol = app.account("carol", Role::User).await;
    let dune = app.book(&alice, "Dune").await;
    app.book(&bob, "Emma").await;
    app.book(&bob, "Dune Messiah").await;

    let not_admin = app
        .post("/book", Some(&carol.token), json!({ "name": "Kindred" }))
        .await;
    assert_eq!(not_admin.status, StatusCode::FORBIDDEN);

    let browse = app.get("/book?search=dune", &alice.token).await;
    assert_eq!(browse.status, StatusCode::OK);
    assert_eq!(browse.body["meta"]["total"], 1);
    assert_eq!(browse.body["data"][0]["name"], "Dune Messiah");

    let paged = app.get("/book?page=2&limit=1", &carol.token).await;
    assert_eq!(paged.body["meta"]["lastPage"], 3);
    assert_eq!(paged.body["data"][0]["name"], "Dune Messiah");

    let lenient = app.get("/book?page=zero&limit=-4", &carol.token).await;
    assert_eq!(lenient.body["meta"]["page"], 1);

    let far = app
        .get("/book?page=4294967295&limit=4294967295", &carol.token)
        .await;
    assert_eq!(far.status, StatusCode::OK);
    assert_eq!(far.body["data"].as_array().unwrap().len(), 0);
    assert_eq!(far.body["meta"]["total"], 3);

    let foreign = app
        .send(
            Method::PATCH,
            &format!("/book/{dune}"),
            Some(&bob.token),
            Some(json!({ "name": "Mine now" })),
        )
        .await;
    assert_eq!(foreign.status, StatusCode::FORBIDDEN);

    let renamed = app
        .send(
            Method::PATCH,
            &format!("/book/{dune}"),
            Some(&alice.token),
            Some(json!({ "name": "Dune (1965)" })),
        )
        .await;
    assert_eq!(renamed.status, StatusCode::OK);
    assert_eq!(renamed.body["name"], "Dune (1965)");

    let deleted = app
        .send(Method::DELETE, &format!("/book/{dune}"), Some(&alice.token), None)
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
    let gone = app.get(&format!("/book/{dune}"), &alice.token).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_a_user_removes_their_books_and_session() {
    let app = TestApp::new();
    let admin = app.account("admin", Role::Admin).await;
    let bob = app.account("bob", Role::Admin).await;
    let emma = app.book(&bob, "Emma").await;

    let listed = app.get("/user", &admin.token).await;
    assert_eq!(listed.body["meta"]["total"], 2);

    let deleted = app
        .send(Method::DELETE, &format!("/user/{}", bob.id), Some(&admin.token), None)
        .await;
    assert_eq!(deleted.status, StatusCode::OK);

    assert_eq!(
        app.get(&format!("/book/{emma}"), &admin.token).await.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(app.get("/check", &bob.token).await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_and_openapi_are_served() {
    let app = TestApp::new();

    let health = app.send(Method::GET, "/healthz", None, None).await;
    assert_eq!(health.status, StatusCode::OK);

    let doc = app.send(Method::GET, "/docs/openapi.json", None, None).await;
    assert_eq!(doc.status, StatusCode::OK);
    for path in ["/trade", "/trade/me", "/trade/{id}", "/login", "/book/{id}", "/user"] {
        assert!(doc.body["paths"].get(path).is_some(), "missing {path}");
    }
    assert!(doc.body["components"]["schemas"].get("Settlement").is_some());
}
