#![allow(dead_code)]

use axum::body::Body;
use http_body_util::BodyExt;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use recipe_journal::models::recipe::NewRecipe;
use recipe_journal::models::Category;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use tempfile::TempDir;

pub const PASSWORD: &str = "correct-horse";
const BOUNDARY: &str = "recipe-journal-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub db: SqlitePool,
    pub media_dir: PathBuf,
    _media: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .expect("Failed to create in-memory SQLite pool");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        let media = tempfile::tempdir().expect("Failed to create media dir");
        let media_dir = media.path().join("media");

        let router = recipe_journal::build_app(pool.clone(), false, media_dir.clone())
            .await
            .expect("Failed to build app");

        Self {
            router,
            db: pool,
            media_dir,
            _media: media,
        }
    }

    /// Send a request through the app and return the response.
    pub async fn request(&self, req: Request<Body>) -> Response {
        tower::ServiceExt::oneshot(self.router.clone(), req)
            .await
            .unwrap()
    }

    /// Create a member with [`PASSWORD`] and return its id.
    pub async fn create_member(&self, username: &str) -> String {
        recipe_journal::cli::create_member(&self.db, username, PASSWORD)
            .await
            .expect("Failed to create test member")
            .id
    }

    /// Log in as the given member and return the session cookie string.
    pub async fn login(&self, username: &str) -> String {
        let resp = self
            .post_form(
                "/login",
                &format!("username={username}&password={PASSWORD}"),
                None,
            )
            .await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);

        resp.headers()
            .get("set-cookie")
            .expect("Login should set a session cookie")
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string()
    }

    /// Create a member, log in, and return (member_id, cookie).
    pub async fn member_session(&self, username: &str) -> (String, String) {
        let id = self.create_member(username).await;
        let cookie = self.login(username).await;
        (id, cookie)
    }

    /// Insert a recipe with the given ingredient names and tags; returns its id.
    pub async fn create_recipe_with(
        &self,
        author_id: &str,
        title: &str,
        category: Category,
        ingredients: &[&str],
        tags: &[&str],
    ) -> String {
        let recipe = NewRecipe {
            author_id: author_id.to_string(),
            title: title.to_string(),
            category,
            source: None,
            url_link: None,
            short_description: None,
            content: None,
            cooking_time: None,
            preparation_time: None,
            resting_time: None,
            image_ref: None,
            ingredients: ingredients
                .iter()
                .map(|name| recipe_journal::models::recipe::IngredientLine {
                    name: name.to_string(),
                    quantity: 1.0,
                    unit: String::new(),
                })
                .collect(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        };

        let mut conn = self.db.acquire().await.unwrap();
        recipe.insert(&mut conn).await.expect("Failed to create test recipe")
    }

    pub async fn create_recipe(&self, author_id: &str, title: &str) -> String {
        self.create_recipe_with(author_id, title, Category::Main, &[], &[])
            .await
    }

    /// Send a GET request with an optional session cookie.
    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        let req = builder.body(Body::empty()).unwrap();
        self.request(req).await
    }

    /// Send a POST form request with an optional session cookie.
    pub async fn post_form(&self, uri: &str, body: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder()
            .uri(uri)
            .method("POST")
            .header("content-type", "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        let req = builder.body(Body::from(body.to_string())).unwrap();
        self.request(req).await
    }

    /// Send a POST JSON request with an optional session cookie.
    pub async fn post_json(
        &self,
        uri: &str,
        body: serde_json::Value,
        cookie: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder()
            .uri(uri)
            .method("POST")
            .header("content-type", "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        let req = builder.body(Body::from(body.to_string())).unwrap();
        self.request(req).await
    }

    /// Send a POST multipart form; `image` becomes a file field named `image`.
    pub async fn post_multipart(
        &self,
        uri: &str,
        fields: &[(&str, &str)],
        image: Option<&[u8]>,
        cookie: Option<&str>,
    ) -> Response {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some(bytes) = image {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"picture.png\"\r\nContent-Type: image/png\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let mut builder = Request::builder()
            .uri(uri)
            .method("POST")
            .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"));
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        let req = builder.body(Body::from(body)).unwrap();
        self.request(req).await
    }

    pub async fn count(&self, sql: &str) -> i64 {
        let (n,): (i64,) = sqlx::query_as(sql).fetch_one(&self.db).await.unwrap();
        n
    }
}

/// Read the full response body as a String.
pub async fn body_string(resp: Response) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Read the full response body as JSON.
pub async fn body_json(resp: Response) -> serde_json::Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Assert that a response is a redirect to the given location.
pub fn assert_redirect(resp: &Response, expected_location: &str) {
    assert!(
        resp.status().is_redirection(),
        "Expected redirect, got {}",
        resp.status()
    );
    let location = resp
        .headers()
        .get("location")
        .expect("Redirect should have location header")
        .to_str()
        .unwrap();
    assert_eq!(location, expected_location);
}
