//! Mediplus REST API gateway.
//!
//! One [`ApiClient`] with per-resource accessors:
//!
//! - [`ApiClient::auth`] - token, signup, current user
//! - [`ApiClient::prescriptions`] - upload, override, search, view
//! - [`ApiClient::pharmacy`] - send, mark preparing, confirm pickup, queue
//! - [`ApiClient::inventory`] - admin stock management
//! - [`ApiClient::analytics`] - admin dashboard series and alerts
//! - [`ApiClient::chatbot`] - patient assistant
//!
//! Protected calls attach `Authorization: Bearer <token>` from the token the
//! session installed with [`ApiClient::set_token`]. Non-success responses are
//! mapped to [`ApiError`] from the backend's `detail` field.

mod analytics;
mod auth;
mod chatbot;
mod error;
mod inventory;
mod pharmacy;
mod prescriptions;

pub use analytics::AnalyticsApi;
pub use auth::{AuthApi, NewAccount};
pub use chatbot::ChatbotApi;
pub use error::ApiError;
pub use inventory::InventoryApi;
pub use pharmacy::PharmacyApi;
pub use prescriptions::{PrescriptionFile, PrescriptionsApi, UploadFields};

use std::sync::Arc;
use std::time::Duration;

use reqwest::{RequestBuilder, Response, header};
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::session::AccessToken;

/// A downloaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    /// From `Content-Disposition`, when the backend sends one.
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Mediplus API client.
///
/// Cheap to clone; clones share the HTTP connection pool and the token.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    /// Bearer token for protected calls
    token: RwLock<Option<AccessToken>>,
}

impl ApiClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        Self::with_base_url(config.api_url.clone(), config.http_timeout)
    }

    /// Create a client for `base_url` with a request timeout.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn with_base_url(base_url: Url, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url,
                token: RwLock::new(None),
            }),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    // =========================================================================
    // Token
    // =========================================================================

    /// Install the token used for protected calls.
    pub async fn set_token(&self, token: AccessToken) {
        *self.inner.token.write().await = Some(token);
    }

    /// Drop the token; protected calls fail with `NotSignedIn` afterwards.
    pub async fn clear_token(&self) {
        *self.inner.token.write().await = None;
    }

    pub async fn has_token(&self) -> bool {
        self.inner.token.read().await.is_some()
    }

    // =========================================================================
    // Resources
    // =========================================================================

    #[must_use]
    pub const fn auth(&self) -> AuthApi<'_> {
        AuthApi::new(self)
    }

    #[must_use]
    pub const fn prescriptions(&self) -> PrescriptionsApi<'_> {
        PrescriptionsApi::new(self)
    }

    #[must_use]
    pub const fn pharmacy(&self) -> PharmacyApi<'_> {
        PharmacyApi::new(self)
    }

    #[must_use]
    pub const fn inventory(&self) -> InventoryApi<'_> {
        InventoryApi::new(self)
    }

    #[must_use]
    pub const fn analytics(&self) -> AnalyticsApi<'_> {
        AnalyticsApi::new(self)
    }

    #[must_use]
    pub const fn chatbot(&self) -> ChatbotApi<'_> {
        ChatbotApi::new(self)
    }

    // =========================================================================
    // Request helpers
    // =========================================================================

    /// Build an endpoint URL under the base URL, keeping any base path.
    pub(crate) fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ApiError> {
        let base = self.inner.base_url.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}{path}"))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// `prefix/<id>` with `id` percent-encoded as one path segment, so an id
    /// containing `/`, `?` or `#` cannot change the route or query.
    pub(crate) fn id_path(prefix: &str, id: &impl std::fmt::Display) -> Result<String, ApiError> {
        let id = id.to_string();
        if matches!(id.trim(), "" | "." | "..") {
            return Err(ApiError::InvalidId(id));
        }
        Ok(format!("{prefix}/{}", urlencoding::encode(&id)))
    }

    async fn bearer(&self) -> Result<String, ApiError> {
        self.inner
            .token
            .read()
            .await
            .as_ref()
            .map(|token| token.expose().to_string())
            .ok_or(ApiError::NotSignedIn)
    }

    /// Send with the session token attached.
    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let token = self.bearer().await?;
        Ok(request.bearer_auth(token).send().await?)
    }

    /// GET and parse JSON.
    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let url = self.url(path, query)?;
        debug!(%url, "GET");
        let response = self.send(self.inner.client.get(url)).await?;
        Self::handle_response(response).await
    }

    /// GET a list from an endpoint that answers 404 instead of `[]` when it
    /// has nothing (a patient's prescriptions, the pending orders). Other
    /// lists use [`Self::get`] so a 404 stays an error.
    pub(crate) async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, ApiError> {
        match self.get(path, query).await {
            Err(ApiError::NotFound(message)) => {
                debug!(path, %message, "empty list");
                Ok(Vec::new())
            }
            other => other,
        }
    }

    /// POST a JSON body.
    pub(crate) async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.url(path, &[])?;
        debug!(%url, "POST");
        let response = self.send(self.inner.client.post(url).json(body)).await?;
        Self::handle_response(response).await
    }

    /// POST with no body; parameters travel in the query string.
    pub(crate) async fn post_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let url = self.url(path, query)?;
        debug!(path, "POST");
        let response = self.send(self.inner.client.post(url)).await?;
        Self::handle_response(response).await
    }

    /// POST a multipart form.
    pub(crate) async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<T, ApiError> {
        let url = self.url(path, &[])?;
        debug!(%url, "POST multipart");
        let response = self.send(self.inner.client.post(url).multipart(form)).await?;
        Self::handle_response(response).await
    }

    /// PUT a JSON body.
    pub(crate) async fn put<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.url(path, &[])?;
        debug!(%url, "PUT");
        let response = self.send(self.inner.client.put(url).json(body)).await?;
        Self::handle_response(response).await
    }

    /// DELETE.
    pub(crate) async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path, &[])?;
        debug!(%url, "DELETE");
        let response = self.send(self.inner.client.delete(url)).await?;
        Self::handle_response(response).await
    }

    /// GET a binary body.
    pub(crate) async fn get_bytes(&self, path: &str) -> Result<Download, ApiError> {
        let url = self.url(path, &[])?;
        debug!(%url, "GET bytes");
        let response = self.send(self.inner.client.get(url)).await?;

        if !response.status().is_success() {
            return Err(Self::parse_error(response).await);
        }

        let headers = response.headers();
        let file_name = headers
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(content_disposition_filename);
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);
        let bytes = response.bytes().await?.to_vec();

        Ok(Download {
            file_name,
            content_type,
            bytes,
        })
    }

    /// Unauthenticated POST of a urlencoded form.
    pub(crate) async fn post_form_public<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let url = self.url(path, &[])?;
        debug!(%url, "POST form");
        let response = self.inner.client.post(url).form(form).send().await?;
        Self::handle_response(response).await
    }

    /// Unauthenticated POST of a JSON body.
    pub(crate) async fn post_public<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.url(path, &[])?;
        debug!(%url, "POST");
        let response = self.inner.client.post(url).json(body).send().await?;
        Self::handle_response(response).await
    }

    /// GET with an explicit token instead of the installed one.
    pub(crate) async fn get_with_token<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &AccessToken,
    ) -> Result<T, ApiError> {
        let url = self.url(path, &[])?;
        debug!(%url, "GET");
        let response = self
            .inner
            .client
            .get(url)
            .bearer_auth(token.expose())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Handle API response and parse JSON. An empty success body parses as `null`.
    async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let status = response.status();

        if status.is_success() {
            let bytes = response.bytes().await?;
            let body: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
                b"null"
            } else {
                bytes.as_ref()
            };
            return serde_json::from_slice(body)
                .map_err(|e| ApiError::Parse(format!("Failed to parse response: {e}")));
        }

        Err(Self::parse_error(response).await)
    }

    /// Parse error response from the API.
    async fn parse_error(response: Response) -> ApiError {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let err = ApiError::from_status(status, &body);
        debug!(status, error = %err, "request rejected");
        err
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

/// Extract the file name from a `Content-Disposition` header value.
fn content_disposition_filename(value: &str) -> Option<String> {
    let params = value.split(';').skip(1).map(str::trim);
    let mut plain = None;
    for param in params {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                // RFC 5987: charset'lang'percent-encoded
                let encoded = raw.rsplit('\'').next().unwrap_or(raw);
                let decoded: String = url::form_urlencoded::parse(encoded.as_bytes())
                    .map(|(k, _)| k.into_owned())
                    .next()
                    .unwrap_or_default();
                if !decoded.is_empty() {
                    return Some(decoded);
                }
            }
            "filename" => {
                let name = raw.trim().trim_matches('"');
                if !name.is_empty() {
                    plain = Some(name.to_string());
                }
            }
            _ => {}
        }
    }
    plain
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        ApiClient::with_base_url(Url::parse(base).unwrap(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_url_keeps_base_path() {
        let api = client("https://api.mediplus.test/v1/");
        let url = api.url("/auth/token", &[]).unwrap();
        assert_eq!(url.as_str(), "https://api.mediplus.test/v1/auth/token");
    }

    #[test]
    fn test_url_encodes_query() {
        let api = client("http://127.0.0.1:8000");
        let url = api
            .url("/prescriptions", &[("name", "Asha K"), ("user_id", "123")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:8000/prescriptions?name=Asha+K&user_id=123"
        );
    }

    #[test]
    fn test_id_path_encodes_one_segment() {
        assert_eq!(
            ApiClient::id_path("/pharmacy/send", &"8d0c-11").unwrap(),
            "/pharmacy/send/8d0c-11"
        );
        let hostile =
            ApiClient::id_path("/pharmacy/confirm-pickup", &"a/../b?otp_code=1#x").unwrap();
        assert_eq!(
            hostile,
            "/pharmacy/confirm-pickup/a%2F..%2Fb%3Fotp_code%3D1%23x"
        );

        let api = client("http://127.0.0.1:8000");
        let url = api.url(&hostile, &[("otp_code", "123456")]).unwrap();
        assert_eq!(
            url.path(),
            "/pharmacy/confirm-pickup/a%2F..%2Fb%3Fotp_code%3D1%23x"
        );
        assert_eq!(url.query(), Some("otp_code=123456"));
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn test_id_path_rejects_dot_segments() {
        for id in ["", " ", ".", ".."] {
            assert!(matches!(
                ApiClient::id_path("/prescriptions/view", &id),
                Err(ApiError::InvalidId(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_protected_call_without_token_fails_fast() {
        let api = client("http://127.0.0.1:9");
        let err = api
            .get::<serde_json::Value>("/auth/me", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotSignedIn));
    }

    #[tokio::test]
    async fn test_token_install_and_clear() {
        let api = client("http://127.0.0.1:9");
        assert!(!api.has_token().await);
        api.set_token(AccessToken::new("t")).await;
        assert!(api.clone().has_token().await);
        api.clear_token().await;
        assert!(!api.has_token().await);
    }

    #[test]
    fn test_content_disposition_filename() {
        assert_eq!(
            content_disposition_filename(r#"attachment; filename="rx_123.pdf""#).as_deref(),
            Some("rx_123.pdf")
        );
        assert_eq!(
            content_disposition_filename("inline; filename=plain.pdf").as_deref(),
            Some("plain.pdf")
        );
        assert_eq!(
            content_disposition_filename(
                "attachment; filename=\"fallback.pdf\"; filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"
            )
            .as_deref(),
            Some("résumé.pdf")
        );
        assert_eq!(content_disposition_filename("attachment"), None);
    }
}
