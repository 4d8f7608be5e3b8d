use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::Router;
use despesas::config::{Config, ConfigV1};
use despesas::provider::oidc::OidcProvider;
use despesas::routes::create_router;
use despesas::session::SessionManager;
use despesas::state::AppState;
use despesas::store::create_store;
use despesas::upload::DriveUploader;
use figment::{
    providers::{Format, Yaml},
    Figment,
};

/// Test config pointing every external endpoint at a mock server.
pub fn test_config(mock_url: &str, folder_id: Option<&str>) -> ConfigV1 {
    let folder_line = match folder_id {
        Some(id) => format!("folder_id: \"{}\"", id),
        None => String::new(),
    };

    let yaml = format!(
        r#"
version: "1.0.0"
provider:
  client_id: "client"
  client_secret: "secret"
  auth_uri: "{url}/auth"
  token_uri: "{url}/token"
  userinfo_uri: "{url}/userinfo"
  scopes: ["drive.file", "profile"]
  timeout_secs: 5
session:
  secret: "test-secret"
  ttl_hours: 24
store:
  type: "memory"
upload:
  {folder_line}
  upload_uri: "{url}/upload"
  timeout_secs: 5
bind_address: "127.0.0.1:8081"
logging:
  level: "debug"
  format: "console"
"#,
        url = mock_url,
        folder_line = folder_line,
    );

    let config: Config = Figment::new()
        .merge(Yaml::string(&yaml))
        .extract()
        .expect("Failed to parse test config YAML");

    match config {
        Config::ConfigV1(cfg) => cfg,
    }
}

pub async fn build_app(config: ConfigV1) -> Router {
    let config = Arc::new(config);
    let store = create_store(&config.store).await;
    let provider = Arc::new(OidcProvider::new(&config.provider));
    let sessions = Arc::new(SessionManager::new(
        provider,
        store,
        config.session.ttl_hours,
    ));
    let uploader = Arc::new(DriveUploader::new(&config.upload));

    let state = AppState {
        config: config.clone(),
        sessions,
        uploader,
    };

    create_router(state)
}

pub fn request(path: &str, method: Method, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header(header::HOST, "localhost:3000");

    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, format!("session={}", cookie));
    }

    builder.body(Body::empty()).expect("failed to build request")
}

/// Extracts the session cookie value from a Set-Cookie header.
pub fn session_cookie(response: &axum::http::Response<Body>) -> String {
    let raw = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("response should set a session cookie")
        .to_str()
        .expect("cookie header should be valid UTF-8");

    raw.split(';')
        .next()
        .and_then(|pair| pair.strip_prefix("session="))
        .expect("session cookie should be present")
        .to_string()
}

/// Builds a multipart/form-data submission request by hand.
pub fn multipart_request(
    cookie: Option<&str>,
    description: Option<&str>,
    amount: Option<&str>,
    receipt: Option<(&str, &str, &[u8])>,
) -> Request<Body> {
    const BOUNDARY: &str = "test-boundary";
    let mut body: Vec<u8> = Vec::new();

    if let Some(description) = description {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"description\"\r\n\r\n{}\r\n",
                BOUNDARY, description
            )
            .as_bytes(),
        );
    }
    if let Some(amount) = amount {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"amount\"\r\n\r\n{}\r\n",
                BOUNDARY, amount
            )
            .as_bytes(),
        );
    }
    if let Some((filename, mime, data)) = receipt {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"receipt\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, filename, mime
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/submit-expense")
        .header(header::HOST, "localhost:3000")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );

    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, format!("session={}", cookie));
    }

    builder
        .body(Body::from(body))
        .expect("failed to build multipart request")
}

pub async fn body_json(response: axum::http::Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&bytes).expect("response body should be JSON")
}
