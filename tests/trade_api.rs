mod common;

use axum::http::{Method, StatusCode};
use bookswap_authz::Role;
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn accepted_trade_swaps_books_end_to_end() {
    let app = TestApp::new();
    let alice = app.account("alice", Role::Admin).await;
    let bob = app.account("bob", Role::Admin).await;
    let dune = app.book(&alice, "Dune").await;
    let emma = app.book(&bob, "Emma").await;

    let proposed = app
        .post(
            "/trade",
            Some(&alice.token),
            json!({ "receiverId": bob.id, "senderBookId": dune, "receiverBookId": emma }),
        )
        .await;
    assert_eq!(proposed.status, StatusCode::CREATED, "{:?}", proposed.body);
    assert_eq!(proposed.body["status"], "PENDING");
    assert_eq!(proposed.body["senderId"], alice.id.as_str());
    let trade_id = proposed.body["id"].as_str().unwrap().to_string();

    let inbox = app.get("/trade/me", &bob.token).await;
    assert_eq!(inbox.status, StatusCode::OK);
    assert_eq!(inbox.body.as_array().unwrap().len(), 1);
    assert_eq!(inbox.body[0]["id"], trade_id.as_str());

    let by_sender = app
        .patch(&format!("/trade/{trade_id}"), &alice.token, json!({ "status": "ACCEPTED" }))
        .await;
    assert_eq!(by_sender.status, StatusCode::FORBIDDEN);

    let accepted = app
        .patch(&format!("/trade/{trade_id}"), &bob.token, json!({ "status": "ACCEPTED" }))
        .await;
    assert_eq!(accepted.status, StatusCode::OK, "{:?}", accepted.body);
    assert_eq!(accepted.body["trade"]["status"], "ACCEPTED");
    assert_eq!(accepted.body["senderBook"]["ownerId"], bob.id.as_str());
    assert_eq!(accepted.body["receiverBook"]["ownerId"], alice.id.as_str());

    let again = app
        .patch(&format!("/trade/{trade_id}"), &bob.token, json!({ "status": "REJECTED" }))
        .await;
    assert_eq!(again.status, StatusCode::CONFLICT);
    assert_eq!(again.body["error"]["code"], "conflict");

    let shelf = app.get("/book/me", &alice.token).await;
    assert_eq!(shelf.body["meta"]["total"], 1);
    assert_eq!(shelf.body["data"][0]["id"], emma.as_str());
}

#[tokio::test]
async fn stale_custody_is_a_conflict() {
    let app = TestApp::new();
    let alice = app.account("alice", Role::Admin).await;
    let bob = app.account("bob", Role::Admin).await;
    let carol = app.account("carol", Role::Admin).await;
    let dune = app.book(&alice, "Dune").await;
    let emma = app.book(&bob, "Emma").await;
    let ulysses = app.book(&carol, "Ulysses").await;

    let mut ids = Vec::new();
    for (receiver, wanted) in [(&bob, &emma), (&carol, &ulysses)] {
        let trade = app
            .post(
                "/trade",
                Some(&alice.token),
                json!({ "receiverId": receiver.id, "senderBookId": dune, "receiverBookId": wanted }),
            )
            .await;
        ids.push(trade.body["id"].as_str().unwrap().to_string());
    }

    let settled = app
        .patch(&format!("/trade/{}", ids[1]), &carol.token, json!({ "status": "ACCEPTED" }))
        .await;
    assert_eq!(settled.status, StatusCode::OK);

    let stale = app
        .patch(&format!("/trade/{}", ids[0]), &bob.token, json!({ "status": "ACCEPTED" }))
        .await;
    assert_eq!(stale.status, StatusCode::CONFLICT);
    assert_eq!(stale.body["error"]["message"], "books already changed owner");

    let bobs_books = app.get("/book/me/", &bob.token).await;
    assert_eq!(bobs_books.body["data"][0]["id"], emma.as_str());

    let outbox = app.get("/trade/me/", &alice.token).await;
    let statuses: Vec<_> = outbox
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["status"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(statuses, ["PENDING", "ACCEPTED"]);
}

#[tokio::test]
async fn either_party_can_reject_but_not_a_stranger() {
    let app = TestApp::new();
    let alice = app.account("alice", Role::User).await;
    let bob = app.account("bob", Role::User).await;
    let mallory = app.account("mallory", Role::User).await;

    let trade = app
        .post(
            "/trade",
            Some(&alice.token),
            json!({ "receiverId": bob.id, "senderBookId": "b-1", "receiverBookId": "b-2" }),
        )
        .await;
    assert_eq!(trade.status, StatusCode::CREATED);
    let uri = format!("/trade/{}", trade.body["id"].as_str().unwrap());

    let stranger = app.patch(&uri, &mallory.token, json!({ "status": "REJECTED" })).await;
    assert_eq!(stranger.status, StatusCode::FORBIDDEN);
    assert!(app.get("/trade/me", &mallory.token).await.body.as_array().unwrap().is_empty());

    let cancelled = app.patch(&uri, &alice.token, json!({ "status": "REJECTED" })).await;
    assert_eq!(cancelled.status, StatusCode::OK);
    assert_eq!(cancelled.body["status"], "REJECTED");
    assert!(cancelled.body.get("trade").is_none());
}

#[tokio::test]
async fn malformed_requests_are_rejected() {
    let app = TestApp::new();
    let alice = app.account("alice", Role::User).await;
    let bob = app.account("bob", Role::User).await;

    let anonymous = app.send(Method::GET, "/trade/me", None, None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let forged = app.get("/trade/me", "not.a-token").await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);

    let same_book = app
        .post(
            "/trade",
            Some(&alice.token),
            json!({ "receiverId": bob.id, "senderBookId": "b-1", "receiverBookId": "b-1" }),
        )
        .await;
    assert_eq!(same_book.status, StatusCode::BAD_REQUEST);
    assert_eq!(same_book.body["error"]["code"], "validation_error");

    let missing = app.post("/trade", Some(&alice.token), json!({})).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.body["error"]["details"].as_array().unwrap().len(), 3);

    let unknown = app
        .patch("/trade/does-not-exist", &bob.token, json!({ "status": "ACCEPTED" }))
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    let trade = app
        .post(
            "/trade",
            Some(&alice.token),
            json!({ "receiverId": bob.id, "senderBookId": "b-1", "receiverBookId": "b-2" }),
        )
        .await;
    let uri = format!("/trade/{}", trade.body["id"].as_str().unwrap());

    let bogus = app.patch(&uri, &bob.token, json!({ "status": "PENDING" })).await;
    assert_eq!(bogus.status, StatusCode::BAD_REQUEST);

    let not_json = app
        .send(Method::PATCH, &uri, Some(&bob.token), None)
        .await;
    assert_eq!(not_json.status, StatusCode::BAD_REQUEST);
}
