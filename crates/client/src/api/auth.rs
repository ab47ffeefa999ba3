//! `/auth` endpoints.

use mediplus_core::{Email, Role, User};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{ApiClient, ApiError};
use crate::session::AccessToken;

/// Response from `POST /auth/token`.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
}

/// Account details for `POST /auth/`.
pub struct NewAccount {
    pub name: String,
    pub email: Email,
    pub password: SecretString,
    pub role: Role,
    pub hospital_name: Option<String>,
}

impl std::fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewAccount")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("role", &self.role)
            .field("hospital_name", &self.hospital_name)
            .finish()
    }
}

#[derive(Serialize)]
struct SignupRequest<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
    role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    hospital_name: Option<&'a str>,
}

/// Authentication endpoints.
#[derive(Debug, Clone, Copy)]
pub struct AuthApi<'a> {
    client: &'a ApiClient,
}

impl<'a> AuthApi<'a> {
    pub(crate) const fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Exchange credentials for an access token (OAuth2 password form).
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` on bad credentials.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn token(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AccessToken, ApiError> {
        let response: TokenResponse = self
            .client
            .post_form_public(
                "/auth/token",
                &[
                    ("username", email.as_str()),
                    ("password", password.expose_secret()),
                ],
            )
            .await?;

        if let Some(kind) = response.token_type.as_deref()
            && !kind.eq_ignore_ascii_case("bearer")
        {
            return Err(ApiError::Parse(format!("unsupported token type: {kind}")));
        }

        Ok(AccessToken::new(response.access_token))
    }

    /// Create an account. Does not sign in.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Api` with status 400 when the email is taken.
    #[instrument(skip(self, account), fields(email = %account.email, role = %account.role))]
    pub async fn register(&self, account: &NewAccount) -> Result<(), ApiError> {
        let body = SignupRequest {
            name: &account.name,
            email: account.email.as_str(),
            password: account.password.expose_secret(),
            role: account.role,
            hospital_name: account.hospital_name.as_deref(),
        };
        let _created: serde_json::Value = self.client.post_public("/auth/", &body).await?;
        Ok(())
    }

    /// The signed-in account.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` when the token is invalid or expired.
    #[instrument(skip(self))]
    pub async fn me(&self) -> Result<User, ApiError> {
        self.client.get("/auth/me", &[]).await
    }

    /// The account a not-yet-installed token belongs to.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` when the token is invalid or expired.
    #[instrument(skip(self, token))]
    pub async fn me_with(&self, token: &AccessToken) -> Result<User, ApiError> {
        self.client.get_with_token("/auth/me", token).await
    }
}
