mod common;

use axum::http::StatusCode;
use common::{assert_redirect, body_string, TestApp};
use recipe_journal::models::Category;

const TATIN: &str = "title=Tarte+Tatin&category=dessert&short_description=Upside+down\
&name=Apples&quantity=6&unit=&name=Butter&quantity=80&unit=g\
&cooking_time=45&tags=fruit%2C+Classic&add_to_album=on&add_to_history=on";

#[tokio::test]
async fn create_recipe_and_show_it() {
    let app = TestApp::new().await;
    let (member_id, cookie) = app.member_session("alice").await;

    let resp = app.post_form("/recipes", TATIN, Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let location = resp.headers()["location"].to_str().unwrap().to_string();
    assert!(location.starts_with("/recipes/confirmation?id="));

    let (recipe_id,): (String,) = sqlx::query_as("SELECT id FROM recipes WHERE title = 'Tarte Tatin'")
        .fetch_one(&app.db)
        .await
        .unwrap();

    let resp = app.get(&location, Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_string(resp).await.contains("Tarte Tatin"));

    let resp = app.get(&format!("/recipes/{recipe_id}"), Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let html = body_string(resp).await;
    assert!(html.contains("80 g butter"));
    assert!(html.contains("apples"));
    assert!(html.contains(">classic<"));
    assert!(html.contains("Total: 45 min"));

    let entries: Vec<(String, Option<String>)> = sqlx::query_as(
        "SELECT collection_name, event_date FROM collection_entries WHERE member_id = ? ORDER BY collection_name",
    )
    .bind(&member_id)
    .fetch_all(&app.db)
    .await
    .unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0], ("album".to_string(), None));
    assert_eq!(entries[1].0, "history");
    assert!(entries[1].1.is_some());
}

#[tokio::test]
async fn create_recipe_requires_a_collection() {
    let app = TestApp::new().await;
    let (_id, cookie) = app.member_session("alice").await;

    let resp = app
        .post_form("/recipes", "title=Soup&category=starter", Some(&cookie))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_string(resp).await.contains("Select at least one collection"));
    assert_eq!(app.count("SELECT COUNT(*) FROM recipes").await, 0);
}

#[tokio::test]
async fn create_recipe_rejects_duplicate_title() {
    let app = TestApp::new().await;
    let (member_id, cookie) = app.member_session("alice").await;
    app.create_recipe(&member_id, "Tarte Tatin").await;

    let resp = app
        .post_form(
            "/recipes",
            "title=tarte++TATIN&category=dessert&add_to_trials=on",
            Some(&cookie),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let html = body_string(resp).await;
    assert!(html.contains("Title already used."));
    assert_eq!(app.count("SELECT COUNT(*) FROM recipes").await, 1);
    assert_eq!(app.count("SELECT COUNT(*) FROM collection_entries").await, 0);
}

#[tokio::test]
async fn new_recipe_form_renders() {
    let app = TestApp::new().await;
    let (_id, cookie) = app.member_session("alice").await;

    let resp = app.get("/recipes/new", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let html = body_string(resp).await;
    assert!(html.contains("ingredient-row"));
    assert!(html.contains("Main course"));
}

#[tokio::test]
async fn unknown_recipe_is_404() {
    let app = TestApp::new().await;
    let resp = app.get("/recipes/does-not-exist", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn comment_and_rate_recipe() {
    let app = TestApp::new().await;
    let (member_id, cookie) = app.member_session("alice").await;
    let recipe_id = app.create_recipe(&member_id, "Ratatouille").await;

    let resp = app
        .post_form(
            &format!("/recipes/{recipe_id}/comments"),
            "content=Lovely+with+rice",
            Some(&cookie),
        )
        .await;
    assert_redirect(&resp, &format!("/recipes/{recipe_id}"));

    for score in ["2", "4"] {
        let resp = app
            .post_form(
                &format!("/recipes/{recipe_id}/rating"),
                &format!("score={score}"),
                Some(&cookie),
            )
            .await;
        assert_redirect(&resp, &format!("/recipes/{recipe_id}"));
    }

    assert_eq!(app.count("SELECT COUNT(*) FROM ratings").await, 1);
    assert_eq!(app.count("SELECT score FROM ratings").await, 4);

    let html = body_string(app.get(&format!("/recipes/{recipe_id}"), Some(&cookie)).await).await;
    assert!(html.contains("Lovely with rice"));
    assert!(html.contains("rated 4.0/5 (1)"));
}

#[tokio::test]
async fn rating_out_of_range_is_ignored() {
    let app = TestApp::new().await;
    let (member_id, cookie) = app.member_session("alice").await;
    let recipe_id = app.create_recipe(&member_id, "Ratatouille").await;

    let resp = app
        .post_form(&format!("/recipes/{recipe_id}/rating"), "score=9", Some(&cookie))
        .await;
    assert_redirect(&resp, &format!("/recipes/{recipe_id}"));
    assert_eq!(app.count("SELECT COUNT(*) FROM ratings").await, 0);
}

#[tokio::test]
async fn comment_on_missing_recipe_is_404() {
    let app = TestApp::new().await;
    let (_id, cookie) = app.member_session("alice").await;

    let resp = app
        .post_form("/recipes/nope/comments", "content=Hello", Some(&cookie))
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn welcome_lists_recipes() {
    let app = TestApp::new().await;
    let member_id = app.create_member("alice").await;
    for title in ["Soup", "Salad", "Stew"] {
        app.create_recipe(&member_id, title).await;
    }

    let html = body_string(app.get("/", None).await).await;
    for title in ["Soup", "Salad", "Stew"] {
        assert!(html.contains(title), "{title}");
    }
}

#[tokio::test]
async fn search_filters_recipes() {
    let app = TestApp::new().await;
    let member_id = app.create_member("alice").await;
    app.create_recipe_with(&member_id, "Leek Soup", Category::Starter, &["leeks", "potatoes"], &["winter"])
        .await;
    app.create_recipe_with(&member_id, "Chocolate Mousse", Category::Dessert, &["chocolate", "eggs"], &["party"])
        .await;

    let html = body_string(app.get("/search?title=soup", None).await).await;
    assert!(html.contains("Leek Soup"));
    assert!(!html.contains("Chocolate Mousse"));

    let html = body_string(app.get("/search?category=dessert", None).await).await;
    assert!(html.contains("Chocolate Mousse"));
    assert!(!html.contains("Leek Soup"));

    let html = body_string(app.get("/search?ingredient=Potato", None).await).await;
    assert!(html.contains("Leek Soup"));
    assert!(!html.contains("Chocolate Mousse"));

    let html = body_string(app.get("/search?tag=party", None).await).await;
    assert!(html.contains("Chocolate Mousse"));
    assert!(!html.contains("Leek Soup"));
}

#[tokio::test]
async fn search_within_my_collection_and_friends() {
    let app = TestApp::new().await;
    let (alice_id, alice) = app.member_session("alice").await;
    let (_bob_id, bob) = app.member_session("bob").await;
    let soup = app.create_recipe(&alice_id, "Leek Soup").await;
    app.create_recipe(&alice_id, "Chocolate Mousse").await;

    recipe_journal::membership::add_to_collection(
        &app.db,
        &alice_id,
        &soup,
        recipe_journal::models::CollectionName::Album,
        None,
    )
    .await
    .unwrap();

    let html = body_string(app.get("/search?collection=album&scope=mine", Some(&alice)).await).await;
    assert!(html.contains("Leek Soup"));
    assert!(!html.contains("Chocolate Mousse"));

    // Nothing shows for bob until alice is a friend.
    let html = body_string(app.get("/search?collection=album&scope=friends", Some(&bob)).await).await;
    assert!(!html.contains("Leek Soup"));

    app.post_form("/friends", "username=alice", Some(&bob)).await;
    let html = body_string(app.get("/search?collection=album&scope=friends", Some(&bob)).await).await;
    assert!(html.contains("Leek Soup"));
    assert!(!html.contains("Chocolate Mousse"));
}

fn small_png() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(4, 3, image::Rgb([180, 90, 30]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

const CLAFOUTIS: &[(&str, &str)] = &[
    ("title", "Clafoutis"),
    ("category", "dessert"),
    ("name", "Cherries"),
    ("quantity", "500"),
    ("unit", "g"),
    ("add_to_album", "on"),
];

#[tokio::test]
async fn upload_picture_with_recipe() {
    let app = TestApp::new().await;
    let (_id, cookie) = app.member_session("alice").await;

    let png = small_png();
    let resp = app
        .post_multipart("/recipes", CLAFOUTIS, Some(png.as_slice()), Some(&cookie))
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let (recipe_id, image_ref): (String, Option<String>) =
        sqlx::query_as("SELECT id, image_ref FROM recipes WHERE title = 'Clafoutis'")
            .fetch_one(&app.db)
            .await
            .unwrap();
    let image_ref = image_ref.expect("picture should be recorded");
    assert!(image_ref.ends_with(".jpg"));

    let stored = std::fs::read(app.media_dir.join(&image_ref)).unwrap();
    assert_eq!(
        image::guess_format(&stored).unwrap(),
        image::ImageFormat::Jpeg
    );

    let html = body_string(app.get(&format!("/recipes/{recipe_id}"), None).await).await;
    assert!(html.contains(&format!("src=\"/media/{image_ref}\"")));

    let html = body_string(app.get("/", None).await).await;
    assert!(html.contains(&format!("/media/{image_ref}")));

    let resp = app.get(&format!("/media/{image_ref}"), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn unreadable_picture_is_a_form_error() {
    let app = TestApp::new().await;
    let (_id, cookie) = app.member_session("alice").await;

    let resp = app
        .post_multipart("/recipes", CLAFOUTIS, Some(b"definitely not a png".as_slice()), Some(&cookie))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_string(resp).await.contains("Please upload a valid image."));
    assert_eq!(app.count("SELECT COUNT(*) FROM recipes").await, 0);
    assert!(!app.media_dir.exists() || std::fs::read_dir(&app.media_dir).unwrap().next().is_none());
}

#[tokio::test]
async fn multipart_form_without_picture() {
    let app = TestApp::new().await;
    let (_id, cookie) = app.member_session("alice").await;

    let resp = app
        .post_multipart("/recipes", CLAFOUTIS, None, Some(&cookie))
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let (image_ref,): (Option<String>,) =
        sqlx::query_as("SELECT image_ref FROM recipes WHERE title = 'Clafoutis'")
            .fetch_one(&app.db)
            .await
            .unwrap();
    assert!(image_ref.is_none());
}

#[tokio::test]
async fn anonymous_visitor_gets_login_prompts() {
    let app = TestApp::new().await;
    let author = app.create_member("alice").await;
    let recipe_id = app.create_recipe(&author, "Ratatouille").await;

    let html = body_string(app.get(&format!("/recipes/{recipe_id}"), None).await).await;
    assert!(html.contains("<a href=\"/login\">Log in</a> to add this recipe to your collections."));
    assert!(html.contains("<a href=\"/login\">Log in</a> to record when you made this recipe"));
    assert!(!html.contains("collection-toggle"));
    assert!(!html.contains("history-container"));

    let cookie = app.login("alice").await;
    let html = body_string(app.get(&format!("/recipes/{recipe_id}"), Some(&cookie)).await).await;
    assert!(!html.contains("login-prompt"));
    assert!(html.contains("collection-toggle"));
}
