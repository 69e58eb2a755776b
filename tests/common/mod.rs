use std::net::TcpListener;
use std::sync::Arc;

use auth_service::auth::{AuthService, BcryptHasher, JwtSigner, TokenTtl};
use auth_service::configuration::JwtSettings;
use auth_service::startup::run;
use auth_service::store::{InMemorySessionStore, InMemoryUserStore};
use serde_json::{json, Value};

pub const PASSWORD: &str = "SecurePass123";

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

pub fn jwt_settings() -> JwtSettings {
    JwtSettings {
        secret: "integration-secret-key-at-least-32-chars".to_string(),
        access_token_expiry: 900,
        refresh_token_expiry: 3600,
        issuer: "auth-service-tests".to_string(),
    }
}

pub async fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let jwt = jwt_settings();
    let service = AuthService::new(
        Arc::new(InMemoryUserStore::new()),
        Arc::new(InMemorySessionStore::new()),
        Arc::new(BcryptHasher::new(4)),
        Arc::new(JwtSigner::new(&jwt)),
        TokenTtl::from_settings(&jwt),
    );

    let server = run(listener, service).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
    }
}

pub fn registration(email: &str) -> Value {
    json!({
        "email": email,
        "password": PASSWORD,
        "passwordConfirmation": PASSWORD,
        "firstname": "Ivan",
        "patronymic": "Ivanovich",
        "lastname": "Petrov"
    })
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn register(&self, email: &str) -> reqwest::Response {
        self.post_json("/auth/register", &registration(email)).await
    }

    pub async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.post_json("/auth/login", &json!({ "email": email, "password": password }))
            .await
    }

    /// Registers `email` and logs in once, returning the token pair body
    pub async fn signed_in(&self, email: &str) -> Value {
        assert_eq!(201, self.register(email).await.status().as_u16());
        let response = self.login(email, PASSWORD).await;
        assert_eq!(200, response.status().as_u16());
        response.json().await.expect("Failed to parse tokens")
    }

    pub async fn sessions(&self, access_token: &str) -> reqwest::Response {
        self.client
            .get(self.url("/auth/sessions"))
            .bearer_auth(access_token)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn remove_session(&self, access_token: &str, jti: &Value) -> reqwest::Response {
        self.client
            .delete(self.url("/auth/sessions"))
            .bearer_auth(access_token)
            .json(&json!({ "jti": jti }))
            .send()
            .await
            .expect("Failed to execute request.")
    }
}

pub fn token(body: &Value, field: &str) -> String {
    body[field]
        .as_str()
        .unwrap_or_else(|| panic!("missing {}", field))
        .to_string()
}
