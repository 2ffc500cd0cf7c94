use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

use vidtube::config::Config;
use vidtube::media::local::LocalMediaStorage;
use vidtube::media::MediaGateway;
use vidtube::store::MemoryStore;
use vidtube::AppState;

const BASE_URL: &str = "http://localhost:8000";
const BOUNDARY: &str = "vidtube-test-boundary";
const PASSWORD: &str = "correct horse battery";

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

struct Reply {
    status: StatusCode,
    cookies: Vec<String>,
    body: Value,
}

impl Reply {
    fn message(&self) -> &str {
        self.body["message"].as_str().unwrap_or_default()
    }

    fn cookie(&self, name: &str) -> Option<&str> {
        let prefix = format!("{}=", name);
        self.cookies.iter().find(|c| c.starts_with(&prefix)).map(String::as_str)
    }
}

struct Session {
    user_id: String,
    access_token: String,
    refresh_token: String,
}

struct TestApp {
    router: Router,
    upload_dir: PathBuf,
    media_dir: PathBuf,
    _root: TempDir,
}

impl TestApp {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let upload_dir = root.path().join("temp");
        let media_dir = root.path().join("media");

        let vars: HashMap<&str, String> = HashMap::from([
            ("ACCESS_TOKEN_SECRET", "test-access-secret".to_string()),
            ("REFRESH_TOKEN_SECRET", "test-refresh-secret".to_string()),
            ("UPLOAD_DIR", upload_dir.display().to_string()),
            ("MEDIA_DIR", media_dir.display().to_string()),
            ("PUBLIC_BASE_URL", BASE_URL.to_string()),
            ("BCRYPT_COST", "4".to_string()),
            ("UPLOAD_TIMEOUT_SECS", "5".to_string()),
        ]);
        let config = Config::from_lookup(|key| vars.get(key).cloned()).unwrap();

        let storage = LocalMediaStorage::new(media_dir.clone(), BASE_URL);
        let media = MediaGateway::new(Arc::new(storage), config.upload_timeout);
        let state = AppState::new(config, Arc::new(MemoryStore::new()), media).with_local_media(media_dir.clone());

        TestApp {
            router: vidtube::app(Arc::new(state)),
            upload_dir,
            media_dir,
            _root: root,
        }
    }

    async fn send(&self, request: Request<Body>) -> Reply {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let cookies = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        Reply { status, cookies, body }
    }

    async fn register(&self, username: &str) -> Reply {
        let email = format!("{}@example.com", username);
        let fullname = format!("{} Tester", username);
        self.send(multipart_request(
            "POST",
            "/api/v1/users/register",
            None,
            &[
                Part::Text("fullname", &fullname),
                Part::Text("email", &email),
                Part::Text("username", username),
                Part::Text("password", PASSWORD),
                Part::File("avatar", "avatar.png", b"\x89PNG avatar bytes"),
            ],
        ))
        .await
    }

    async fn login(&self, username: &str) -> Session {
        let reply = self
            .send(json_request(
                "POST",
                "/api/v1/users/login",
                None,
                json!({ "username": username, "password": PASSWORD }),
            ))
            .await;
        assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);

        Session {
            user_id: reply.body["data"]["user"]["id"].as_str().unwrap().to_string(),
            access_token: reply.body["data"]["accessToken"].as_str().unwrap().to_string(),
            refresh_token: reply.body["data"]["refreshToken"].as_str().unwrap().to_string(),
        }
    }

    async fn signup(&self, username: &str) -> Session {
        let reply = self.register(username).await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
        self.login(username).await
    }

    async fn publish(&self, token: &str, title: &str, duration: &str) -> Value {
        let description = format!("{} description", title);
        let reply = self
            .send(multipart_request(
                "POST",
                "/api/v1/videos",
                Some(token),
                &[
                    Part::Text("title", title),
                    Part::Text("description", &description),
                    Part::Text("duration", duration),
                    Part::File("videoFile", "clip.mp4", b"fake mp4 payload"),
                    Part::File("thumbnail", "thumb.jpg", b"fake jpeg payload"),
                ],
            ))
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
        reply.body["data"].clone()
    }

    async fn toggle_publish(&self, token: &str, video_id: &str) -> Reply {
        self.send(empty_request(
            "PATCH",
            &format!("/api/v1/videos/toggle/publish/{}", video_id),
            Some(token),
        ))
        .await
    }

    fn staged_uploads(&self) -> usize {
        std::fs::read_dir(&self.upload_dir).map(|entries| entries.count()).unwrap_or(0)
    }

    fn media_path(&self, url: &str) -> PathBuf {
        let public_id = url.strip_prefix(&format!("{}/media/", BASE_URL)).unwrap();
        self.media_dir.join(public_id)
    }
}

fn with_auth(builder: axum::http::request::Builder, token: Option<&str>) -> axum::http::request::Builder {
    match token {
        Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {}", token)),
        None => builder,
    }
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    with_auth(Request::builder().method(method).uri(uri), token)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    with_auth(Request::builder().method(method).uri(uri), token)
        .body(Body::empty())
        .unwrap()
}

fn multipart_request(method: &str, uri: &str, token: Option<&str>, parts: &[Part]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes());
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, filename, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                        name, filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    with_auth(Request::builder().method(method).uri(uri), token)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(body))
        .unwrap()
}

async fn wait_until_removed(path: &Path) -> bool {
    for _ in 0..50 {
        if !path.exists() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    !path.exists()
}

#[tokio::test]
async fn test_healthcheck_and_unknown_route() {
    let app = TestApp::new();

    let reply = app.send(empty_request("GET", "/api/v1/healthcheck", None)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["statusCode"], 200);
    assert_eq!(reply.body["success"], true);
    assert_eq!(reply.body["data"]["status"], "ok");

    let reply = app.send(empty_request("GET", "/api/v1/nowhere", None)).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body["success"], false);
    assert_eq!(reply.body["statusCode"], 404);
}

#[tokio::test]
async fn test_register_hides_secrets_and_cleans_temp_files() {
    let app = TestApp::new();

    let reply = app.register("Alice").await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    assert_eq!(reply.body["statusCode"], 201);

    let user = &reply.body["data"];
    assert_eq!(user["username"], "alice");
    assert_eq!(user["email"], "alice@example.com");
    assert!(user.get("password").is_none());
    assert!(user.get("passwordHash").is_none());
    assert!(user.get("refreshToken").is_none());
    assert!(user.get("refreshTokenHash").is_none());
    assert!(user["coverImage"].is_null());

    let avatar = user["avatar"].as_str().unwrap();
    assert!(avatar.starts_with(&format!("{}/media/images/", BASE_URL)));
    assert!(app.media_path(avatar).exists());
    assert_eq!(app.staged_uploads(), 0);

    // The stored file is served back under /media.
    let path = avatar.strip_prefix(BASE_URL).unwrap();
    let reply = app.send(empty_request("GET", path, None)).await;
    assert_eq!(reply.status, StatusCode::OK);
}

#[tokio::test]
async fn test_register_validation_errors() {
    let app = TestApp::new();

    let reply = app
        .send(multipart_request(
            "POST",
            "/api/v1/users/register",
            None,
            &[
                Part::Text("fullname", "   "),
                Part::Text("email", "bob@example.com"),
                Part::Text("username", "bob"),
                Part::Text("password", PASSWORD),
                Part::File("avatar", "avatar.png", b"png"),
            ],
        ))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.message(), "All fields are required");
    assert_eq!(reply.body["success"], false);
    assert_eq!(app.staged_uploads(), 0);

    let reply = app
        .send(multipart_request(
            "POST",
            "/api/v1/users/register",
            None,
            &[
                Part::Text("fullname", "Bob"),
                Part::Text("email", "bob@example.com"),
                Part::Text("username", "bob"),
                Part::Text("password", PASSWORD),
            ],
        ))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.message(), "Avatar file is required");
    // Nothing was stored, so the same identity can still register.
    assert_eq!(app.register("bob").await.status, StatusCode::CREATED);

    let reply = app
        .send(multipart_request(
            "POST",
            "/api/v1/users/register",
            None,
            &[
                Part::Text("fullname", "Bob"),
                Part::Text("email", "bobby@example.com"),
                Part::Text("username", "bobby"),
                Part::Text("password", PASSWORD),
                Part::File("avatar", "avatar.exe", b"MZ"),
            ],
        ))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.staged_uploads(), 0);
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let app = TestApp::new();
    assert_eq!(app.register("carol").await.status, StatusCode::CREATED);

    let reply = app.register("CAROL").await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.body["statusCode"], 409);
    assert_eq!(app.staged_uploads(), 0);
}

#[tokio::test]
async fn test_login_failures() {
    let app = TestApp::new();
    app.register("dave").await;

    let reply = app
        .send(json_request("POST", "/api/v1/users/login", None, json!({ "password": PASSWORD })))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = app
        .send(json_request(
            "POST",
            "/api/v1/users/login",
            None,
            json!({ "username": "nobody", "password": PASSWORD }),
        ))
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.message(), "User does not exist");

    let reply = app
        .send(json_request(
            "POST",
            "/api/v1/users/login",
            None,
            json!({ "email": "dave@example.com", "password": "wrong" }),
        ))
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.message(), "Invalid user credentials");

    let reply = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/v1/users/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["success"], false);
}

#[tokio::test]
async fn test_login_sets_http_only_cookies() {
    let app = TestApp::new();
    app.register("erin").await;

    let reply = app
        .send(json_request(
            "POST",
            "/api/v1/users/login",
            None,
            json!({ "username": "erin", "password": PASSWORD }),
        ))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body["data"]["user"].get("refreshTokenHash").is_none());

    for name in ["accessToken", "refreshToken"] {
        let cookie = reply.cookie(name).unwrap();
        assert!(cookie.contains("HttpOnly"), "{}", cookie);
        assert!(cookie.contains("Secure"), "{}", cookie);
        assert!(cookie.contains("Path=/"), "{}", cookie);
    }

    // The access cookie alone authenticates.
    let access = reply.body["data"]["accessToken"].as_str().unwrap();
    let reply = app
        .send(
            Request::builder()
                .uri("/api/v1/users/currentUser")
                .header(header::COOKIE, format!("accessToken={}", access))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"]["username"], "erin");
}

#[tokio::test]
async fn test_protected_routes_require_valid_access_token() {
    let app = TestApp::new();
    let session = app.signup("frank").await;

    let reply = app.send(empty_request("GET", "/api/v1/users/currentUser", None)).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.message(), "Unauthorized request");

    let reply = app
        .send(empty_request("GET", "/api/v1/users/currentUser", Some("garbage.token.value")))
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    // A refresh token is signed with a different secret.
    let reply = app
        .send(empty_request("GET", "/api/v1/users/currentUser", Some(&session.refresh_token)))
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = app
        .send(empty_request("GET", "/api/v1/users/currentUser", Some(&session.access_token)))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"]["id"], session.user_id.as_str());
}

#[tokio::test]
async fn test_refresh_rotates_and_rejects_replay() {
    let app = TestApp::new();
    let session = app.signup("grace").await;

    let reply = app
        .send(json_request(
            "POST",
            "/api/v1/users/refreshToken",
            None,
            json!({ "refreshToken": session.refresh_token }),
        ))
        .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    let rotated = reply.body["data"]["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(rotated, session.refresh_token);
    assert!(reply.cookie("refreshToken").is_some());

    // The old token was single-use.
    let reply = app
        .send(json_request(
            "POST",
            "/api/v1/users/refreshToken",
            None,
            json!({ "refreshToken": session.refresh_token }),
        ))
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    // Cookie transport works too.
    let reply = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/v1/users/refreshToken")
                .header(header::COOKIE, format!("refreshToken={}", rotated))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);

    let reply = app
        .send(json_request("POST", "/api/v1/users/refreshToken", None, json!({})))
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    // An access token is never accepted as a refresh token.
    let reply = app
        .send(json_request(
            "POST",
            "/api/v1/users/refreshToken",
            None,
            json!({ "refreshToken": session.access_token }),
        ))
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_invalidates_refresh_token() {
    let app = TestApp::new();
    let session = app.signup("heidi").await;

    let reply = app
        .send(empty_request("POST", "/api/v1/users/logout", Some(&session.access_token)))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    let cleared = reply.cookie("accessToken").unwrap();
    assert!(cleared.starts_with("accessToken=;"), "{}", cleared);
    assert!(reply.cookie("refreshToken").is_some());

    let reply = app
        .send(json_request(
            "POST",
            "/api/v1/users/refreshToken",
            None,
            json!({ "refreshToken": session.refresh_token }),
        ))
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.message(), "Refresh token is expired or used");
}

#[tokio::test]
async fn test_change_password() {
    let app = TestApp::new();
    let session = app.signup("ivan").await;

    let reply = app
        .send(json_request(
            "POST",
            "/api/v1/users/changePassword",
            Some(&session.access_token),
            json!({ "oldPassword": "not it", "newPassword": "brand new" }),
        ))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.message(), "Invalid old password");

    let reply = app
        .send(json_request(
            "PATCH",
            "/api/v1/users/changePassword",
            Some(&session.access_token),
            json!({ "oldPassword": PASSWORD, "newPassword": "brand new" }),
        ))
        .await;
    assert_eq!(reply.status, StatusCode::OK);

    let reply = app
        .send(json_request(
            "POST",
            "/api/v1/users/login",
            None,
            json!({ "username": "ivan", "password": PASSWORD }),
        ))
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = app
        .send(json_request(
            "POST",
            "/api/v1/users/login",
            None,
            json!({ "username": "ivan", "password": "brand new" }),
        ))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
}

#[tokio::test]
async fn test_update_account_and_avatar() {
    let app = TestApp::new();
    let judy = app.signup("judy").await;
    app.register("karl").await;

    let reply = app
        .send(json_request(
            "PATCH",
            "/api/v1/users/updateAccount",
            Some(&judy.access_token),
            json!({ "email": "KARL@example.com" }),
        ))
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);

    let reply = app
        .send(json_request("PATCH", "/api/v1/users/updateAccount", Some(&judy.access_token), json!({})))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = app
        .send(json_request(
            "PATCH",
            "/api/v1/users/updateAccount",
            Some(&judy.access_token),
            json!({ "fullname": "Judy Updated" }),
        ))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"]["fullname"], "Judy Updated");
    assert_eq!(reply.body["data"]["email"], "judy@example.com");

    let before = app
        .send(empty_request("GET", "/api/v1/users/currentUser", Some(&judy.access_token)))
        .await;
    let old_avatar = before.body["data"]["avatar"].as_str().unwrap().to_string();

    let reply = app
        .send(multipart_request(
            "PATCH",
            "/api/v1/users/avatar",
            Some(&judy.access_token),
            &[Part::File("avatar", "new.webp", b"webp bytes")],
        ))
        .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    let new_avatar = reply.body["data"]["avatar"].as_str().unwrap();
    assert_ne!(new_avatar, old_avatar);
    assert!(app.media_path(new_avatar).exists());
    assert!(wait_until_removed(&app.media_path(&old_avatar)).await);

    let reply = app
        .send(multipart_request(
            "PATCH",
            "/api/v1/users/coverImage",
            Some(&judy.access_token),
            &[Part::File("coverImage", "cover.jpg", b"jpeg bytes")],
        ))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body["data"]["coverImage"].as_str().is_some());

    let reply = app
        .send(multipart_request(
            "PATCH",
            "/api/v1/users/coverImage",
            Some(&judy.access_token),
            &[Part::Text("caption", "no file attached")],
        ))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.staged_uploads(), 0);
}

#[tokio::test]
async fn test_channel_profile_counts_subscribers() {
    let app = TestApp::new();
    let owner = app.signup("studio").await;

    let mut viewers = Vec::new();
    for name in ["v1", "v2", "v3"] {
        let viewer = app.signup(name).await;
        let reply = app
            .send(empty_request(
                "POST",
                &format!("/api/v1/subscriptions/c/{}", owner.user_id),
                Some(&viewer.access_token),
            ))
            .await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["data"]["subscribed"], true);
        viewers.push(viewer);
    }

    let reply = app
        .send(empty_request("GET", "/api/v1/users/c/STUDIO", Some(&viewers[0].access_token)))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    let profile = &reply.body["data"];
    assert_eq!(profile["subscribersCount"], 3);
    assert_eq!(profile["channelsSubscribedToCount"], 0);
    assert_eq!(profile["isSubscribed"], true);

    let reply = app
        .send(empty_request("GET", "/api/v1/users/c/studio", Some(&owner.access_token)))
        .await;
    assert_eq!(reply.body["data"]["isSubscribed"], false);

    let reply = app
        .send(empty_request("GET", "/api/v1/users/c/v1", Some(&owner.access_token)))
        .await;
    assert_eq!(reply.body["data"]["channelsSubscribedToCount"], 1);

    let reply = app
        .send(empty_request("GET", "/api/v1/users/c/ghost", Some(&owner.access_token)))
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    // Toggling again unsubscribes.
    let reply = app
        .send(empty_request(
            "POST",
            &format!("/api/v1/subscriptions/c/{}", owner.user_id),
            Some(&viewers[0].access_token),
        ))
        .await;
    assert_eq!(reply.body["data"]["subscribed"], false);

    let reply = app
        .send(empty_request(
            "POST",
            &format!("/api/v1/subscriptions/c/{}", owner.user_id),
            Some(&owner.access_token),
        ))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = app
        .send(empty_request(
            "POST",
            "/api/v1/subscriptions/c/not-a-uuid",
            Some(&owner.access_token),
        ))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_publish_validation() {
    let app = TestApp::new();
    let session = app.signup("maker").await;

    let reply = app
        .send(multipart_request(
            "POST",
            "/api/v1/videos",
            Some(&session.access_token),
            &[
                Part::Text("title", "No file"),
                Part::Text("description", "missing upload"),
                Part::Text("duration", "12"),
            ],
        ))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.message(), "Video file is required");

    let reply = app
        .send(multipart_request(
            "POST",
            "/api/v1/videos",
            Some(&session.access_token),
            &[
                Part::Text("title", "Bad duration"),
                Part::Text("description", "negative"),
                Part::Text("duration", "-3"),
                Part::File("videoFile", "clip.mp4", b"mp4"),
            ],
        ))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.staged_uploads(), 0);

    let video = app.publish(&session.access_token, "First cut", "42.5").await;
    assert_eq!(video["title"], "First cut");
    assert_eq!(video["isPublished"], false);
    assert_eq!(video["views"], 0);
    assert_eq!(video["duration"], 42.5);
    assert_eq!(video["owner"], session.user_id.as_str());
    assert!(video.get("videoPublicId").is_none());
    assert!(app.media_path(video["videoFile"].as_str().unwrap()).exists());
    assert_eq!(app.staged_uploads(), 0);
}

#[tokio::test]
async fn test_unpublished_videos_are_owner_only() {
    let app = TestApp::new();
    let owner = app.signup("owner").await;
    let other = app.signup("other").await;

    let video = app.publish(&owner.access_token, "Draft", "10").await;
    let id = video["id"].as_str().unwrap();
    let uri = format!("/api/v1/videos/{}", id);

    let reply = app.send(empty_request("GET", &uri, Some(&other.access_token))).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = app.send(empty_request("GET", &uri, Some(&owner.access_token))).await;
    assert_eq!(reply.status, StatusCode::OK);

    let reply = app.send(empty_request("GET", "/api/v1/videos", Some(&other.access_token))).await;
    assert_eq!(reply.body["data"]["totalVideos"], 0);

    let reply = app.toggle_publish(&other.access_token, id).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = app.toggle_publish(&owner.access_token, id).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"]["isPublished"], true);

    let reply = app.send(empty_request("GET", &uri, Some(&other.access_token))).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"]["views"], 2);
}

#[tokio::test]
async fn test_watch_history_moves_rewatched_video_to_end() {
    let app = TestApp::new();
    let owner = app.signup("creator").await;
    let viewer = app.signup("watcher").await;

    let first = app.publish(&owner.access_token, "First", "5").await;
    let second = app.publish(&owner.access_token, "Second", "6").await;
    for video in [&first, &second] {
        app.toggle_publish(&owner.access_token, video["id"].as_str().unwrap()).await;
    }

    for video in [&first, &second, &first] {
        let uri = format!("/api/v1/videos/{}", video["id"].as_str().unwrap());
        let reply = app.send(empty_request("GET", &uri, Some(&viewer.access_token))).await;
        assert_eq!(reply.status, StatusCode::OK);
    }

    let reply = app
        .send(empty_request("GET", "/api/v1/users/history", Some(&viewer.access_token)))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    let history = reply.body["data"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["title"], "Second");
    assert_eq!(history[1]["title"], "First");
    assert_eq!(history[1]["views"], 2);
    assert_eq!(history[0]["owner"]["username"], "creator");
    assert!(history[0]["owner"].get("email").is_none());

    let reply = app
        .send(empty_request("GET", "/api/v1/users/history", Some(&owner.access_token)))
        .await;
    assert_eq!(reply.body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_video_listing_pagination_and_sorting() {
    let app = TestApp::new();
    let owner = app.signup("lister").await;
    let viewer = app.signup("browser").await;

    for (title, duration) in [("Bravo", "30"), ("Alpha", "10"), ("Charlie", "20")] {
        let video = app.publish(&owner.access_token, title, duration).await;
        app.toggle_publish(&owner.access_token, video["id"].as_str().unwrap()).await;
    }
    app.publish(&owner.access_token, "Hidden draft", "99").await;

    let reply = app
        .send(empty_request(
            "GET",
            "/api/v1/videos?sortBy=title&sortType=asc&limit=2&page=1",
            Some(&viewer.access_token),
        ))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    let page = &reply.body["data"];
    assert_eq!(page["totalVideos"], 3);
    assert_eq!(page["totalPages"], 2);
    let titles: Vec<&str> = page["videos"].as_array().unwrap().iter().map(|v| v["title"].as_str().unwrap()).collect();
    assert_eq!(titles, ["Alpha", "Bravo"]);

    let reply = app
        .send(empty_request(
            "GET",
            "/api/v1/videos?sortBy=duration&limit=1",
            Some(&viewer.access_token),
        ))
        .await;
    assert_eq!(reply.body["data"]["videos"][0]["title"], "Bravo");

    let reply = app
        .send(empty_request("GET", "/api/v1/videos?query=char", Some(&viewer.access_token)))
        .await;
    assert_eq!(reply.body["data"]["totalVideos"], 1);

    // The owner also sees their draft.
    let uri = format!("/api/v1/videos?userId={}", owner.user_id);
    let reply = app.send(empty_request("GET", &uri, Some(&owner.access_token))).await;
    assert_eq!(reply.body["data"]["totalVideos"], 4);

    let reply = app
        .send(empty_request("GET", "/api/v1/videos?sortBy=secret", Some(&viewer.access_token)))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_and_delete_require_ownership() {
    let app = TestApp::new();
    let owner = app.signup("author").await;
    let intruder = app.signup("intruder").await;

    let video = app.publish(&owner.access_token, "Original", "15").await;
    let id = video["id"].as_str().unwrap();
    let uri = format!("/api/v1/videos/{}", id);
    let old_thumbnail = video["thumbnail"].as_str().unwrap().to_string();

    let reply = app
        .send(multipart_request(
            "PATCH",
            &uri,
            Some(&intruder.access_token),
            &[Part::Text("title", "Hijacked")],
        ))
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = app
        .send(multipart_request("PATCH", &uri, Some(&owner.access_token), &[Part::Text("title", "   ")]))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = app
        .send(multipart_request(
            "PATCH",
            &uri,
            Some(&owner.access_token),
            &[
                Part::Text("title", "Renamed"),
                Part::File("thumbnail", "fresh.png", b"png bytes"),
            ],
        ))
        .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert_eq!(reply.body["data"]["title"], "Renamed");
    assert_eq!(reply.body["data"]["description"], "Original description");
    assert_ne!(reply.body["data"]["thumbnail"].as_str().unwrap(), old_thumbnail);
    assert!(wait_until_removed(&app.media_path(&old_thumbnail)).await);

    let reply = app.send(empty_request("DELETE", &uri, Some(&intruder.access_token))).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let video_file = app.media_path(video["videoFile"].as_str().unwrap());
    let reply = app.send(empty_request("DELETE", &uri, Some(&owner.access_token))).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(wait_until_removed(&video_file).await);

    let reply = app.send(empty_request("GET", &uri, Some(&owner.access_token))).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = app.send(empty_request("DELETE", &uri, Some(&owner.access_token))).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}
