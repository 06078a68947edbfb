//! HTTP vault backend (KV version 2 API)
//!
//! Items are read with `GET {address}/v1/{mount}/data/{container}/{item}`
//! and the secret pairs come back under `data.data`.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{SecretItem, VaultClient};
use crate::error::{Result, SecretsError};

/// Default KV mount point
pub const DEFAULT_MOUNT: &str = "secret";

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for [`HttpVaultClient`]
#[derive(Clone)]
pub struct HttpVaultConfig {
    /// Base address, e.g. `https://vault.internal:8200`
    pub address: Url,
    /// Token sent as `X-Vault-Token`
    pub token: String,
    /// KV engine mount point
    pub mount: String,
    /// Enterprise namespace sent as `X-Vault-Namespace`
    pub namespace: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl HttpVaultConfig {
    pub fn new(address: Url, token: impl Into<String>) -> Self {
        Self {
            address,
            token: token.into(),
            mount: DEFAULT_MOUNT.to_string(),
            namespace: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_mount(mut self, mount: impl Into<String>) -> Self {
        self.mount = mount.into();
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl std::fmt::Debug for HttpVaultConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpVaultConfig")
            .field("address", &self.address.as_str())
            .field("token", &"[REDACTED]")
            .field("mount", &self.mount)
            .field("namespace", &self.namespace)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Deserialize)]
struct KvResponse {
    data: KvData,
}

#[derive(Deserialize)]
struct KvData {
    data: serde_json::Map<String, serde_json::Value>,
}

/// Vault client speaking the KV v2 HTTP API
pub struct HttpVaultClient {
    config: HttpVaultConfig,
    http: reqwest::Client,
}

impl HttpVaultClient {
    /// Create a client; fails only if the HTTP client cannot be built
    pub fn new(config: HttpVaultConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SecretsError::ConfigError(format!("HTTP client: {}", e)))?;

        Ok(Self { config, http })
    }

    /// Get the connection settings
    pub fn config(&self) -> &HttpVaultConfig {
        &self.config
    }

    /// Build the read URL for an item
    fn item_url(&self, container: &str, item: &str) -> Result<Url> {
        for name in [container, item] {
            if name.is_empty() || name == "." || name == ".." || name.contains('/') {
                return Err(SecretsError::InvalidItem(format!(
                    "'{}' is not a valid vault path segment",
                    name
                )));
            }
        }

        let mut url = self.config.address.clone();
        url.path_segments_mut()
            .map_err(|_| {
                SecretsError::ConfigError(format!(
                    "vault address '{}' cannot carry a path",
                    self.config.address
                ))
            })?
            .pop_if_empty()
            .push("v1")
            .extend(self.config.mount.split('/').filter(|s| !s.is_empty()))
            .push("data")
            .push(container)
            .push(item);

        Ok(url)
    }
}

/// Map a non-success HTTP status onto the error taxonomy
fn status_error(status: StatusCode, label: &str) -> SecretsError {
    match status {
        StatusCode::NOT_FOUND => SecretsError::ItemNotFound(label.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            SecretsError::Authorization(format!("{} rejected with {}", label, status))
        }
        s if s.is_client_error() => {
            SecretsError::InvalidItem(format!("{} rejected with {}", label, status))
        }
        _ => SecretsError::NetworkError(format!("{} failed with {}", label, status)),
    }
}

#[async_trait]
impl VaultClient for HttpVaultClient {
    async fn load(&self, container: &str, item: &str) -> Result<SecretItem> {
        let label = format!("{}/{}", container, item);
        let url = self.item_url(container, item)?;

        debug!(container, item, url = %url, "Fetching vault item");

        let mut request = self
            .http
            .get(url)
            .header("X-Vault-Token", &self.config.token);
        if let Some(namespace) = &self.config.namespace {
            request = request.header("X-Vault-Namespace", namespace);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, &label));
        }

        let body = response.bytes().await?;
        // serde's message can quote body content, so only its position is kept
        let parsed: KvResponse = serde_json::from_slice(&body).map_err(|e| {
            SecretsError::MalformedItem(format!(
                "{}: not a KV v2 read response ({:?} error at line {} column {})",
                label,
                e.classify(),
                e.line(),
                e.column()
            ))
        })?;

        let loaded = SecretItem::from_json_object(parsed.data.data);
        debug!(container, item, keys = loaded.len(), "Loaded vault item");
        Ok(loaded)
    }

    fn backend_name(&self) -> &'static str {
        "HTTP Vault (KV v2)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> HttpVaultClient {
        let address = Url::parse(&server.uri()).unwrap();
        HttpVaultClient::new(
            HttpVaultConfig::new(address, "test-token").with_timeout(Duration::from_millis(500)),
        )
        .unwrap()
    }

    fn kv_body(data: serde_json::Value) -> serde_json::Value {
        json!({
            "request_id": "5b1b6c0e",
            "data": {
                "data": data,
                "metadata": {"version": 3, "destroyed": false}
            }
        })
    }

    #[tokio::test]
    async fn test_load_item() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/secret/data/passwords/mysql"))
            .and(header("X-Vault-Token", "test-token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(kv_body(json!({"root": "s3cr3t"}))),
            )
            .mount(&server)
            .await;

        let item = test_client(&server).load("passwords", "mysql").await.unwrap();
        assert_eq!(item.get("root"), Some("s3cr3t"));
    }

    #[tokio::test]
    async fn test_custom_mount_and_namespace() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/kv/db/data/passwords/mysql"))
            .and(header("X-Vault-Namespace", "ops"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(kv_body(json!({"root": "s3cr3t"}))),
            )
            .mount(&server)
            .await;

        let address = Url::parse(&server.uri()).unwrap();
        let client = HttpVaultClient::new(
            HttpVaultConfig::new(address, "test-token")
                .with_mount("kv/db")
                .with_namespace("ops"),
        )
        .unwrap();

        let item = client.load("passwords", "mysql").await.unwrap();
        assert_eq!(item.get("root"), Some("s3cr3t"));
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let cases = [
            (403, true),
            (401, true),
            (400, true),
            (404, false),
            (500, false),
            (503, false),
        ];

        for (status, is_validation) in cases {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(status))
                .mount(&server)
                .await;

            let err = test_client(&server).load("passwords", "mysql").await.unwrap_err();
            assert_eq!(err.is_validation(), is_validation, "status {}: {:?}", status, err);
        }
    }

    #[tokio::test]
    async fn test_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = test_client(&server).load("passwords", "mysql").await.unwrap_err();
        assert!(matches!(err, SecretsError::ItemNotFound(ref label) if label == "passwords/mysql"));
    }

    #[tokio::test]
    async fn test_timeout_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(kv_body(json!({"root": "s3cr3t"})))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let err = test_client(&server).load("passwords", "mysql").await.unwrap_err();
        assert!(matches!(err, SecretsError::NetworkError(_)));
    }

    #[tokio::test]
    async fn test_unexpected_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"errors": []})))
            .mount(&server)
            .await;

        let err = test_client(&server).load("passwords", "mysql").await.unwrap_err();
        assert!(matches!(err, SecretsError::MalformedItem(_)));
    }

    #[tokio::test]
    async fn test_non_scalar_sibling_keeps_item_usable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(kv_body(json!({
                "root": "s3cr3t",
                "hosts": ["a", "b"]
            }))))
            .mount(&server)
            .await;

        let item = test_client(&server).load("passwords", "mysql").await.unwrap();
        assert_eq!(item.get("root"), Some("s3cr3t"));
        assert_eq!(item.get("hosts"), None);
        assert!(item.unreadable_reason("hosts").unwrap().contains("array"));
    }

    #[tokio::test]
    async fn test_malformed_body_error_omits_content() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"data": {"data": "LEAKED-PW"}})),
            )
            .mount(&server)
            .await;

        let err = test_client(&server).load("passwords", "mysql").await.unwrap_err();
        assert!(matches!(err, SecretsError::MalformedItem(_)));
        assert!(!err.to_string().contains("LEAKED-PW"), "{}", err);
    }

    #[test]
    fn test_item_url_rejects_traversal() {
        let client = HttpVaultClient::new(HttpVaultConfig::new(
            Url::parse("http://127.0.0.1:8200").unwrap(),
            "t",
        ))
        .unwrap();

        assert!(client.item_url("passwords", "..").unwrap_err().is_validation());
        assert!(client.item_url("passwords", "a/b").unwrap_err().is_validation());
        assert!(client.item_url("", "mysql").unwrap_err().is_validation());

        let url = client.item_url("passwords", "mysql").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8200/v1/secret/data/passwords/mysql");
    }

    #[test]
    fn test_debug_redacts_token() {
        let address = Url::parse("http://127.0.0.1:8200").unwrap();
        let config = HttpVaultConfig::new(address, "hvs.topsecret");
        assert!(!format!("{:?}", config).contains("hvs.topsecret"));
    }
}
