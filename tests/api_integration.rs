use hal_chatlog::{run_server, MemoryStore};
use reqwest::{header, Client, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;

// Test client wrapper for making API calls
struct TestClient {
    client: Client,
    base_url: String,
}

impl TestClient {
    /// Serve a fresh in-memory store on an ephemeral port
    async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(run_server(Arc::new(MemoryStore::new()), listener));

        Self {
            client: Client::new(),
            base_url,
        }
    }

    async fn post(&self, path: &str, json: Value) -> reqwest::Result<reqwest::Response> {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .json(&json)
            .send()
            .await
    }

    async fn put(&self, path: &str, json: Value) -> reqwest::Result<reqwest::Response> {
        self.client
            .put(format!("{}{}", self.base_url, path))
            .json(&json)
            .send()
            .await
    }

    async fn get(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .header(header::ACCEPT, "application/hal+json")
            .send()
            .await
    }

    async fn get_json(&self, path: &str) -> Value {
        let response = self.get(path).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "GET {path}");
        response.json().await.unwrap()
    }

    async fn delete(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client
            .delete(format!("{}{}", self.base_url, path))
            .send()
            .await
    }
}

fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

fn hrefs(links: &Value) -> Vec<String> {
    links
        .as_array()
        .unwrap()
        .iter()
        .map(|link| link["href"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_chat_log_workflow() {
    let client = TestClient::spawn().await;

    let root = client.get_json("/api/v1").await;
    assert_eq!(
        hrefs(&root["_links"]["related"]),
        vec!["/api/v1/users", "/api/v1/messages", "/api/v1/logs"]
    );

    for name in ["alice", "bob"] {
        let response = client.post("/api/v1/users", json!({ "name": name })).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(location(&response), format!("/api/v1/users/{name}"));
    }

    let mut message_locations = Vec::new();
    for (user, text) in [("alice", "hi"), ("bob", "hello"), ("alice", "lunch?")] {
        let response = client
            .post("/api/v1/messages", json!({ "user": user, "text": text }))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        message_locations.push(location(&response));
    }
    assert_eq!(
        message_locations,
        vec!["/api/v1/messages/1", "/api/v1/messages/2", "/api/v1/messages/3"]
    );

    let response = client
        .post(
            "/api/v1/logs",
            json!({ "name": "general", "users": ["alice", "bob"], "messages": [1, "2", 3] }),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(location(&response), "/api/v1/logs/general");

    let log = client.get_json("/api/v1/logs/general").await;
    assert_eq!(log["name"], "general");
    assert_eq!(
        hrefs(&log["_links"]["related"]),
        vec![
            "/api/v1/users/alice",
            "/api/v1/users/bob",
            "/api/v1/messages/1",
            "/api/v1/messages/2",
            "/api/v1/messages/3"
        ]
    );

    let response = client
        .put("/api/v1/logs/general", json!({ "name": "random", "messages": [2] }))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(location(&response), "/api/v1/logs/random");
    assert_eq!(
        client.get("/api/v1/logs/general").await.unwrap().status(),
        StatusCode::NOT_FOUND
    );

    let response = client.delete("/api/v1/users/bob").await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let log = client.get_json("/api/v1/logs/random").await;
    assert_eq!(log["users"], json!(["alice"]));
    assert_eq!(log["messages"], json!([]));

    let messages = client.get_json("/api/v1/messages").await;
    assert_eq!(
        hrefs(&messages["_links"]["item"]),
        vec!["/api/v1/messages/1", "/api/v1/messages/3"]
    );

    let response = client.delete("/api/v1/logs/random").await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let logs = client.get_json("/api/v1/logs").await;
    assert_eq!(logs["_links"]["item"], json!([]));
}

#[tokio::test]
async fn test_error_responses_over_http() {
    let client = TestClient::spawn().await;

    let response = client
        .client
        .get(format!("{}/api/v1/users", client.base_url))
        .header(header::ACCEPT, "text/html")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
    assert_eq!(
        response.headers().get(header::ALLOW).unwrap(),
        "HEAD, OPTIONS, GET, POST"
    );

    let response = client.delete("/api/v1/messages").await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(
        response.text().await.unwrap(),
        "You cannot DELETE /api/v1/messages. Try HEAD, OPTIONS, GET, POST instead."
    );

    let response = client
        .client
        .post(format!("{}/api/v1/users", client.base_url))
        .header(header::CONTENT_TYPE, "text/plain")
        .body("alice")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let response = client.get("/api/v1/users/nobody").await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.text().await.unwrap(),
        "nobody isn't an existing user (GET /api/v1/users/nobody)."
    );

    let response = client
        .client
        .head(format!("{}/api/v1/logs", client.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/hal+json"
    );
}
