//! Integration test helpers
//!
//! Each test gets its own server on an ephemeral port, backed by in-memory
//! storage and the in-process cache.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::LazyLock;
use taskdesk_web::config::Environment;
use taskdesk_web::{AppState, WebConfig};
use tokio::net::TcpListener;
use uuid::Uuid;

// Initialise tracing once for the whole test binary
static TRACING: LazyLock<()> = LazyLock::new(|| {
    let level = if std::env::var("TEST_LOG").is_ok() {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_test_writer()
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
});

pub struct TestApp {
    pub address: String,
    pub state: AppState,
    /// Client without a cookie store; authenticates with bearer tokens
    pub api_client: reqwest::Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// A client that keeps cookies between requests, like a browser
    pub fn browser(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .expect("Failed to build client")
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.api_client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get_with_auth(&self, path: &str, token: &str) -> reqwest::Response {
        self.api_client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_with_auth(&self, path: &str, token: &str, body: &Value) -> reqwest::Response {
        self.api_client
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn put_with_auth(&self, path: &str, token: &str, body: &Value) -> reqwest::Response {
        self.api_client
            .put(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn delete_with_auth(&self, path: &str, token: &str) -> reqwest::Response {
        self.api_client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Register `user` and return their id and token
    pub async fn register(&self, user: &TestUser) -> LoggedInUser {
        let response = self
            .post_json("/api/auth/register", &user.to_register_json())
            .await;
        assert_eq!(response.status().as_u16(), 201, "registration failed");
        let body: Value = response.json().await.expect("Invalid JSON");
        LoggedInUser {
            id: body["data"]["user"]["id"]
                .as_str()
                .expect("missing user id")
                .to_string(),
            token: body["data"]["token"]
                .as_str()
                .expect("missing token")
                .to_string(),
        }
    }

    /// Create a task as `creator` for `agent_id` and return its id
    pub async fn create_task(&self, creator: &LoggedInUser, agent_id: &str, title: &str) -> String {
        let response = self
            .post_with_auth(
                "/api/tasks",
                &creator.token,
                &json!({ "title": title, "assignedTo": agent_id, "priority": "high" }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201, "task creation failed");
        let body: Value = response.json().await.expect("Invalid JSON");
        body["data"]["task"]["id"]
            .as_str()
            .expect("missing task id")
            .to_string()
    }
}

pub async fn spawn_app() -> TestApp {
    LazyLock::force(&TRACING);

    let config = WebConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: Environment::Test,
        database_url: "memory".to_string(),
        jwt_secret: "integration-test-secret".to_string(),
        ..WebConfig::default()
    };

    let state = AppState::new(config).await.expect("Failed to build state");
    let app = taskdesk_web::create_app(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().expect("No local address").port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        state,
        api_client: reqwest::Client::new(),
    }
}

pub struct TestUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub role: &'static str,
}

impl TestUser {
    pub fn generate(role: &'static str) -> Self {
        let id = Uuid::new_v4().simple().to_string();
        Self {
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            email: format!("{}_{}@example.com", role, &id[..8]),
            password: "test_password_123".to_string(),
            role,
        }
    }

    pub fn to_register_json(&self) -> Value {
        json!({
            "firstName": self.first_name,
            "lastName": self.last_name,
            "email": self.email,
            "password": self.password,
            "role": self.role,
        })
    }

    pub fn to_login_json(&self) -> Value {
        json!({ "email": self.email, "password": self.password })
    }
}

pub struct LoggedInUser {
    pub id: String,
    pub token: String,
}
