//! HTTP client for a single Schema Registry endpoint.
//!
//! A thin wrapper around `reqwest` speaking the Confluent REST API. Context
//! handling follows one rule everywhere: the default context is addressed
//! by the bare base URL, and `"."` is the default context. Getting this
//! wrong historically produced "zero subjects migrated" runs, so the
//! collapse lives in exactly one place ([`RegistryClient::build_url`]).

use std::time::{Duration, Instant};

use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::config::RegistryConfig;
use crate::error::{Result, WardenError};
use crate::registry::types::{
    CompatibilityCheckBody, ConfigBody, ConfigUpdateBody, ConnectionStatus, ConnectionTest, Mode,
    ModeBody, RegisterSchemaRequest, RegisteredId, SchemaRecord, SchemaType,
};

pub const VND_SCHEMA_REGISTRY_V1_JSON: &str = "application/vnd.schemaregistry.v1+json";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Returns true when `context` addresses the default context.
///
/// Absent and `"."` are the same namespace and must build the same URLs.
pub fn is_default_context(context: Option<&str>) -> bool {
    matches!(context, None | Some(".") | Some(""))
}

/// Client for one registry endpoint. Cheap to clone; lives for the process.
#[derive(Clone)]
pub struct RegistryClient {
    config: RegistryConfig,
    http: reqwest::Client,
}

impl RegistryClient {
    pub fn new(config: RegistryConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let (Some(user), Some(password)) = (&config.user, &config.password) {
            let credentials =
                base64::engine::general_purpose::STANDARD.encode(format!("{user}:{password}"));
            let value = HeaderValue::from_str(&format!("Basic {credentials}")).map_err(|e| {
                WardenError::Config {
                    message: format!("invalid credentials for registry '{}': {e}", config.name),
                }
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| WardenError::Config {
                message: format!("failed to build HTTP client for '{}': {e}", config.name),
            })?;

        Ok(Self { config, http })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Build a request URL, inserting `/contexts/{ctx}` for named contexts.
    ///
    /// Invariant: `build_url(p, None) == build_url(p, Some("."))`.
    pub fn build_url(&self, path: &str, context: Option<&str>) -> String {
        match context {
            Some(ctx) if !is_default_context(Some(ctx)) => {
                format!("{}/contexts/{}{}", self.config.url, ctx, path)
            }
            _ => format!("{}{}", self.config.url, path),
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(reqwest::header::ACCEPT, VND_SCHEMA_REGISTRY_V1_JSON)
    }

    fn transport_err(&self, err: reqwest::Error) -> WardenError {
        WardenError::RegistryUnreachable {
            name: self.config.name.clone(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Parse a response, mapping non-2xx statuses onto error kinds.
    async fn parse<T: DeserializeOwned>(
        &self,
        response: Response,
        subject: Option<&str>,
    ) -> Result<T> {
        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| self.transport_err(e))?;

        if status.is_success() {
            serde_json::from_slice::<T>(&bytes).map_err(|e| WardenError::Upstream {
                registry: self.config.name.clone(),
                status: status.as_u16(),
                body: format!(
                    "unparseable body ({e}): {}",
                    String::from_utf8_lossy(&bytes)
                ),
            })
        } else {
            Err(WardenError::from_upstream_status(
                &self.config.name,
                subject,
                status.as_u16(),
                String::from_utf8_lossy(&bytes).to_string(),
            ))
        }
    }

    /// Probe the endpoint. Errors come back as values, never `Err`.
    pub async fn test_connection(&self) -> ConnectionTest {
        let url = format!("{}/subjects", self.config.url);
        let started = Instant::now();
        let result = self
            .request(Method::GET, &url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => ConnectionTest {
                status: ConnectionStatus::Connected,
                registry: self.config.name.clone(),
                url: self.config.url.clone(),
                response_time_ms: Some(started.elapsed().as_secs_f64() * 1000.0),
                error: None,
            },
            Ok(response) => ConnectionTest {
                status: ConnectionStatus::Error,
                registry: self.config.name.clone(),
                url: self.config.url.clone(),
                response_time_ms: None,
                error: Some(format!("HTTP {}", response.status())),
            },
            Err(e) => ConnectionTest {
                status: ConnectionStatus::Error,
                registry: self.config.name.clone(),
                url: self.config.url.clone(),
                response_time_ms: None,
                error: Some(e.to_string()),
            },
        }
    }

    /// `GET /contexts`. Registries without context support yield an empty list.
    pub async fn list_contexts(&self) -> Result<Vec<String>> {
        let url = format!("{}/contexts", self.config.url);
        let response = self
            .request(Method::GET, &url)
            .send()
            .await
            .map_err(|e| self.transport_err(e))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        self.parse(response, None).await
    }

    pub async fn list_subjects(&self, context: Option<&str>) -> Result<Vec<String>> {
        let url = self.build_url("/subjects", context);
        let response = self
            .request(Method::GET, &url)
            .send()
            .await
            .map_err(|e| self.transport_err(e))?;
        self.parse(response, None).await
    }

    /// `GET /subjects/{subject}/versions`; 404 means "no versions", not an error.
    pub async fn list_versions(&self, subject: &str, context: Option<&str>) -> Result<Vec<i32>> {
        let url = self.build_url(&format!("/subjects/{subject}/versions"), context);
        let response = self
            .request(Method::GET, &url)
            .send()
            .await
            .map_err(|e| self.transport_err(e))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        self.parse(response, Some(subject)).await
    }

    pub async fn get_schema(
        &self,
        subject: &str,
        version: Option<i32>,
        context: Option<&str>,
    ) -> Result<SchemaRecord> {
        let version_path = match version {
            Some(v) => v.to_string(),
            None => "latest".to_string(),
        };
        let url = self.build_url(
            &format!("/subjects/{subject}/versions/{version_path}"),
            context,
        );
        let response = self
            .request(Method::GET, &url)
            .send()
            .await
            .map_err(|e| self.transport_err(e))?;

        if response.status() == StatusCode::NOT_FOUND {
            if let Some(v) = version {
                // Distinguish a missing version from a missing subject.
                let versions = self.list_versions(subject, context).await?;
                if !versions.is_empty() {
                    return Err(WardenError::VersionNotFound {
                        subject: subject.to_string(),
                        version: v,
                        registry: self.config.name.clone(),
                    });
                }
            }
            return Err(WardenError::SubjectNotFound {
                subject: subject.to_string(),
                registry: self.config.name.clone(),
            });
        }
        self.parse(response, Some(subject)).await
    }

    /// Register a schema version.
    ///
    /// With `id` set, the request carries the explicit id and the target
    /// must already be in IMPORT mode. A 409 means the exact schema is
    /// already registered; the existing id is looked up and returned so
    /// migration reruns converge instead of failing.
    pub async fn register_schema(
        &self,
        subject: &str,
        schema: &str,
        schema_type: SchemaType,
        context: Option<&str>,
        id: Option<i64>,
        version: Option<i32>,
    ) -> Result<i64> {
        let url = self.build_url(&format!("/subjects/{subject}/versions"), context);
        let body = RegisterSchemaRequest {
            schema: schema.to_string(),
            schema_type,
            id,
            version,
        };
        let response = self
            .request(Method::POST, &url)
            .header(reqwest::header::CONTENT_TYPE, VND_SCHEMA_REGISTRY_V1_JSON)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_err(e))?;

        if response.status() == StatusCode::CONFLICT {
            tracing::debug!(subject, registry = %self.config.name, "schema already registered");
            if let Ok(existing) = self.lookup_schema(subject, schema, schema_type, context).await {
                return Ok(existing.id);
            }
            return Err(WardenError::ConflictExists {
                subject: subject.to_string(),
                registry: self.config.name.clone(),
            });
        }

        let registered: RegisteredId = self.parse(response, Some(subject)).await?;
        Ok(registered.id)
    }

    /// `POST /subjects/{subject}`: find the version of an already-registered body.
    pub async fn lookup_schema(
        &self,
        subject: &str,
        schema: &str,
        schema_type: SchemaType,
        context: Option<&str>,
    ) -> Result<SchemaRecord> {
        let url = self.build_url(&format!("/subjects/{subject}"), context);
        let body = RegisterSchemaRequest {
            schema: schema.to_string(),
            schema_type,
            id: None,
            version: None,
        };
        let response = self
            .request(Method::POST, &url)
            .header(reqwest::header::CONTENT_TYPE, VND_SCHEMA_REGISTRY_V1_JSON)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_err(e))?;
        self.parse(response, Some(subject)).await
    }

    /// Delete a subject with all its versions; returns the deleted version list.
    pub async fn delete_subject(&self, subject: &str, context: Option<&str>) -> Result<Vec<i32>> {
        let url = self.build_url(&format!("/subjects/{subject}"), context);
        let response = self
            .request(Method::DELETE, &url)
            .send()
            .await
            .map_err(|e| self.transport_err(e))?;
        self.parse(response, Some(subject)).await
    }

    /// Force-create a context by registering and deleting a throwaway
    /// subject in it; there is no direct create endpoint upstream.
    pub async fn create_context(&self, context: &str) -> Result<()> {
        const PROBE_SUBJECT: &str = "_context-probe";
        const PROBE_SCHEMA: &str =
            r#"{"type":"record","name":"ContextProbe","fields":[{"name":"ok","type":"boolean"}]}"#;
        self.register_schema(
            PROBE_SUBJECT,
            PROBE_SCHEMA,
            SchemaType::Avro,
            Some(context),
            None,
            None,
        )
        .await?;
        if let Err(e) = self.delete_subject(PROBE_SUBJECT, Some(context)).await {
            tracing::warn!(context, error = %e, "context probe subject not cleaned up");
        }
        Ok(())
    }

    /// Best-effort context deletion; not all upstreams support it.
    pub async fn delete_context(&self, context: &str) -> Result<()> {
        let url = format!("{}/contexts/{}", self.config.url, context);
        let response = self
            .request(Method::DELETE, &url)
            .send()
            .await
            .map_err(|e| self.transport_err(e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(WardenError::from_upstream_status(
            &self.config.name,
            None,
            status.as_u16(),
            body,
        ))
    }

    pub async fn get_global_config(&self, context: Option<&str>) -> Result<String> {
        let url = self.build_url("/config", context);
        let response = self
            .request(Method::GET, &url)
            .send()
            .await
            .map_err(|e| self.transport_err(e))?;
        let config: ConfigBody = self.parse(response, None).await?;
        Ok(config.compatibility_level)
    }

    pub async fn set_global_config(&self, context: Option<&str>, compatibility: &str) -> Result<String> {
        let url = self.build_url("/config", context);
        let response = self
            .request(Method::PUT, &url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(&ConfigUpdateBody {
                compatibility: compatibility.to_string(),
            })
            .send()
            .await
            .map_err(|e| self.transport_err(e))?;
        let config: ConfigBody = self.parse(response, None).await?;
        Ok(config.compatibility_level)
    }

    pub async fn get_subject_config(
        &self,
        subject: &str,
        context: Option<&str>,
    ) -> Result<String> {
        let url = self.build_url(&format!("/config/{subject}"), context);
        let response = self
            .request(Method::GET, &url)
            .send()
            .await
            .map_err(|e| self.transport_err(e))?;
        let config: ConfigBody = self.parse(response, Some(subject)).await?;
        Ok(config.compatibility_level)
    }

    pub async fn set_subject_config(
        &self,
        subject: &str,
        context: Option<&str>,
        compatibility: &str,
    ) -> Result<String> {
        let url = self.build_url(&format!("/config/{subject}"), context);
        let response = self
            .request(Method::PUT, &url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(&ConfigUpdateBody {
                compatibility: compatibility.to_string(),
            })
            .send()
            .await
            .map_err(|e| self.transport_err(e))?;
        let config: ConfigBody = self.parse(response, Some(subject)).await?;
        Ok(config.compatibility_level)
    }

    fn mode_path(subject: Option<&str>) -> String {
        match subject {
            Some(subject) => format!("/mode/{subject}"),
            None => "/mode".to_string(),
        }
    }

    pub async fn get_mode(&self, context: Option<&str>, subject: Option<&str>) -> Result<Mode> {
        let url = self.build_url(&Self::mode_path(subject), context);
        let response = self
            .request(Method::GET, &url)
            .send()
            .await
            .map_err(|e| self.transport_err(e))?;
        let body: ModeBody = self.parse(response, subject).await?;
        Ok(body.mode)
    }

    /// `PUT /mode` (optionally context- and subject-scoped).
    ///
    /// 405 maps to [`WardenError::ImportModeUnsupported`]; the migration
    /// engine uses that signal to fall back to auto-assigned ids.
    pub async fn set_mode(
        &self,
        context: Option<&str>,
        subject: Option<&str>,
        mode: Mode,
    ) -> Result<Mode> {
        let url = self.build_url(&Self::mode_path(subject), context);
        let response = self
            .request(Method::PUT, &url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(&ModeBody { mode })
            .send()
            .await
            .map_err(|e| self.transport_err(e))?;
        let body: ModeBody = self.parse(response, subject).await?;
        Ok(body.mode)
    }

    pub async fn check_compatibility(
        &self,
        subject: &str,
        schema: &str,
        schema_type: SchemaType,
        context: Option<&str>,
    ) -> Result<bool> {
        let url = self.build_url(
            &format!("/compatibility/subjects/{subject}/versions/latest"),
            context,
        );
        let body = RegisterSchemaRequest {
            schema: schema.to_string(),
            schema_type,
            id: None,
            version: None,
        };
        let response = self
            .request(Method::POST, &url)
            .header(reqwest::header::CONTENT_TYPE, VND_SCHEMA_REGISTRY_V1_JSON)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_err(e))?;
        // A subject with no versions yet is trivially compatible.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(true);
        }
        let check: CompatibilityCheckBody = self.parse(response, Some(subject)).await?;
        Ok(check.is_compatible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(url: &str) -> RegistryClient {
        RegistryClient::new(RegistryConfig {
            name: "test".to_string(),
            url: url.to_string(),
            user: None,
            password: None,
            readonly: false,
            description: String::new(),
        })
        .unwrap()
    }

    #[test]
    fn test_default_context_url_collapse() {
        let client = client_for("http://localhost:8081");
        let bare = client.build_url("/subjects", None);
        let dotted = client.build_url("/subjects", Some("."));
        let empty = client.build_url("/subjects", Some(""));
        assert_eq!(bare, "http://localhost:8081/subjects");
        assert_eq!(bare, dotted);
        assert_eq!(bare, empty);

        let named = client.build_url("/subjects", Some("team-a"));
        assert_eq!(named, "http://localhost:8081/contexts/team-a/subjects");
    }

    #[tokio::test]
    async fn test_list_subjects_same_for_dot_and_absent_context() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/subjects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec!["a", "b"]))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let bare = client.list_subjects(None).await.unwrap();
        let dotted = client.list_subjects(Some(".")).await.unwrap();
        assert_eq!(bare, dotted);
        assert_eq!(bare, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_list_versions_404_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/subjects/ghost/versions"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error_code": 40401, "message": "Subject not found"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let versions = client.list_versions("ghost", None).await.unwrap();
        assert!(versions.is_empty());
    }

    #[tokio::test]
    async fn test_register_schema_carries_explicit_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/subjects/user-events/versions"))
            .and(header("content-type", VND_SCHEMA_REGISTRY_V1_JSON))
            .and(body_json_string(
                r#"{"schema":"{}","schemaType":"AVRO","id":42,"version":3}"#,
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 42})))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let id = client
            .register_schema("user-events", "{}", SchemaType::Avro, None, Some(42), Some(3))
            .await
            .unwrap();
        assert_eq!(id, 42);
    }

    #[tokio::test]
    async fn test_register_conflict_resolves_existing_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/subjects/orders/versions"))
            .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
                "error_code": 409, "message": "already registered"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/subjects/orders"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "subject": "orders", "id": 17, "version": 1, "schema": "{}"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let id = client
            .register_schema("orders", "{}", SchemaType::Avro, None, None, None)
            .await
            .unwrap();
        assert_eq!(id, 17);
    }

    #[tokio::test]
    async fn test_set_mode_405_maps_to_import_unsupported() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/mode"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let err = client.set_mode(None, None, Mode::Import).await.unwrap_err();
        assert!(matches!(err, WardenError::ImportModeUnsupported { .. }));
    }

    #[tokio::test]
    async fn test_get_schema_missing_version_vs_subject() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/subjects/user-events/versions/9"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/subjects/user-events/versions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec![1, 2]))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let err = client
            .get_schema("user-events", Some(9), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WardenError::VersionNotFound { version: 9, .. }
        ));
    }

    #[tokio::test]
    async fn test_named_context_prefix_on_wire() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/contexts/team-a/subjects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec!["x"]))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let subjects = client.list_subjects(Some("team-a")).await.unwrap();
        assert_eq!(subjects, vec!["x"]);
    }
}
