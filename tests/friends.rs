mod common;

use axum::http::StatusCode;
use common::{body_string, TestApp};

#[tokio::test]
async fn add_friend_is_symmetric() {
    let app = TestApp::new().await;
    let (_alice_id, alice) = app.member_session("alice").await;
    let (_bob_id, bob) = app.member_session("bob").await;

    let resp = app.post_form("/friends", "username=bob", Some(&alice)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_string(resp).await.contains("We added bob to your friends!"));
    assert_eq!(app.count("SELECT COUNT(*) FROM friendships").await, 2);

    let html = body_string(app.get("/friends", Some(&bob)).await).await;
    assert!(html.contains("alice"));
}

#[tokio::test]
async fn add_friend_errors() {
    let app = TestApp::new().await;
    let (_alice_id, alice) = app.member_session("alice").await;
    app.create_member("bob").await;

    let html = body_string(app.post_form("/friends", "username=nobody", Some(&alice)).await).await;
    assert!(html.contains("No member found with username"));

    let html = body_string(app.post_form("/friends", "username=alice", Some(&alice)).await).await;
    assert!(html.contains("You cannot add yourself."));

    app.post_form("/friends", "username=bob", Some(&alice)).await;
    let html = body_string(app.post_form("/friends", "username=bob", Some(&alice)).await).await;
    assert!(html.contains("is already one of your friends."));
    assert_eq!(app.count("SELECT COUNT(*) FROM friendships").await, 2);
}

#[tokio::test]
async fn remove_friend_both_ways() {
    let app = TestApp::new().await;
    let (_alice_id, alice) = app.member_session("alice").await;
    app.create_member("bob").await;

    app.post_form("/friends", "username=bob", Some(&alice)).await;
    let html = body_string(app.post_form("/friends/remove", "username=bob", Some(&alice)).await).await;
    assert!(html.contains("bob was removed from your friends."));
    assert_eq!(app.count("SELECT COUNT(*) FROM friendships").await, 0);

    let html = body_string(app.post_form("/friends/remove", "username=bob", Some(&alice)).await).await;
    assert!(html.contains("bob is not one of your friends."));
}
