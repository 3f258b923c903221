use std::net::TcpListener;

use auth_service::configuration::{get_configuration, StorageBackend};
use auth_service::startup::{build_from_settings, run};
use serde_json::{json, Value};

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

async fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.database.backend = StorageBackend::Memory;
    configuration.security.bcrypt_cost = 4;

    let service = build_from_settings(&configuration)
        .await
        .expect("Failed to build auth service");
    let server = run(listener, service).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(&format!("{}{}", &self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn register(&self, email: &str, password: &str) -> reqwest::Response {
        self.post_json(
            "/auth/register",
            &json!({ "email": email, "password": password }),
        )
        .await
    }

    async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.post_json("/auth/login", &json!({ "email": email, "password": password }))
            .await
    }

    async fn refresh(&self, refresh_token: &str) -> reqwest::Response {
        self.post_json("/auth/refresh", &json!({ "refresh_token": refresh_token }))
            .await
    }

    async fn logout(&self, access_token: Option<&str>) -> reqwest::Response {
        let mut request = self.client.post(&format!("{}/auth/logout", &self.address));
        if let Some(token) = access_token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to execute request.")
    }

    /// Register and log in, returning the token response body
    async fn signed_in(&self, email: &str) -> Value {
        assert_eq!(201, self.register(email, "SecurePass123!").await.status().as_u16());
        let response = self.login(email, "SecurePass123!").await;
        assert_eq!(200, response.status().as_u16());
        response.json().await.expect("Failed to parse response")
    }
}

fn token(body: &Value, field: &str) -> String {
    body[field].as_str().expect("token missing").to_string()
}

// --- Registration Tests ---

#[tokio::test]
async fn register_returns_201_for_valid_credentials() {
    let app = spawn_app().await;

    let response = app.register("john@example.com", "SecurePass123!").await;

    assert_eq!(201, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body.get("access_token").is_none());
    assert!(body.get("message").is_some());
}

#[tokio::test]
async fn register_returns_409_for_duplicate_email() {
    let app = spawn_app().await;

    app.register("dup@example.com", "SecurePass123!").await;
    let response = app.register("dup@example.com", "OtherPass456!").await;

    assert_eq!(409, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["code"], "EMAIL_EXISTS");
}

#[tokio::test]
async fn register_returns_400_for_invalid_data() {
    let app = spawn_app().await;
    let test_cases = vec![
        ("not-an-email", "SecurePass123!", "invalid email"),
        ("", "SecurePass123!", "empty email"),
        ("weak@example.com", "short", "short password"),
        ("weak@example.com", "alllowercase123!", "missing uppercase"),
        ("weak@example.com", "NoDigitsHere!", "missing digit"),
    ];

    for (email, password, description) in test_cases {
        let response = app.register(email, password).await;
        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 Bad Request when the payload was {}.",
            description
        );
    }
}

#[tokio::test]
async fn register_returns_400_for_missing_fields() {
    let app = spawn_app().await;

    let response = app
        .post_json("/auth/register", &json!({ "email": "a@example.com" }))
        .await;

    assert_eq!(400, response.status().as_u16());
}

// --- Login Tests ---

#[tokio::test]
async fn login_returns_token_pair() {
    let app = spawn_app().await;

    let body = app.signed_in("login@example.com").await;

    assert!(body["access_token"].is_string());
    assert!(body["refresh_token"].is_string());
    assert_ne!(body["access_token"], body["refresh_token"]);
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 900);
}

#[tokio::test]
async fn login_returns_401_for_wrong_password_and_unknown_email() {
    let app = spawn_app().await;
    app.register("user@example.com", "SecurePass123!").await;

    let wrong_password = app.login("user@example.com", "WrongPass123!").await;
    let unknown_email = app.login("nobody@example.com", "SecurePass123!").await;

    assert_eq!(401, wrong_password.status().as_u16());
    assert_eq!(401, unknown_email.status().as_u16());

    let a: Value = wrong_password.json().await.unwrap();
    let b: Value = unknown_email.json().await.unwrap();
    assert_eq!(a["code"], b["code"]);
    assert_eq!(a["message"], b["message"]);
}

// --- Refresh Tests ---

#[tokio::test]
async fn refresh_rotates_and_rejects_reuse() {
    let app = spawn_app().await;
    let first = app.signed_in("rotate@example.com").await;

    let response = app.refresh(&token(&first, "refresh_token")).await;
    assert_eq!(200, response.status().as_u16());
    let second: Value = response.json().await.unwrap();
    assert_ne!(first["refresh_token"], second["refresh_token"]);

    let replay = app.refresh(&token(&first, "refresh_token")).await;
    assert_eq!(401, replay.status().as_u16());
}

#[tokio::test]
async fn refresh_rejects_access_token() {
    let app = spawn_app().await;
    let body = app.signed_in("kinds@example.com").await;

    let response = app.refresh(&token(&body, "access_token")).await;

    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn refresh_returns_400_for_empty_token() {
    let app = spawn_app().await;

    let response = app.refresh("").await;

    assert_eq!(400, response.status().as_u16());
}

// --- Logout Tests ---

#[tokio::test]
async fn logout_requires_access_token() {
    let app = spawn_app().await;

    let response = app.logout(None).await;
    assert_eq!(401, response.status().as_u16());

    let response = app.logout(Some("garbage")).await;
    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn logout_rejects_refresh_token_as_bearer() {
    let app = spawn_app().await;
    let body = app.signed_in("bearer@example.com").await;

    let response = app.logout(Some(&token(&body, "refresh_token"))).await;

    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn logout_revokes_refresh_tokens() {
    let app = spawn_app().await;
    let body = app.signed_in("logout@example.com").await;

    let response = app.logout(Some(&token(&body, "access_token"))).await;
    assert_eq!(204, response.status().as_u16());

    let response = app.refresh(&token(&body, "refresh_token")).await;
    assert_eq!(401, response.status().as_u16());

    // The access token itself stays valid until it expires
    let response = app.logout(Some(&token(&body, "access_token"))).await;
    assert_eq!(204, response.status().as_u16());
}
