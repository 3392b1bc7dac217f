//! Token acquisition and disposal.
//!
//! User-context clients move through `Unauthenticated -> RequestTokenObtained
//! -> AccessTokenObtained` via the PIN flow (or xAuth). Application-only
//! clients move through `Unauthenticated -> BearerTokenObtained ->
//! Invalidated`. Every transition holds the client's transition lock, so at
//! most one is in flight; regular requests keep running against the
//! credential snapshot they took.

use base64::Engine;
use serde::Deserialize;
use tracing::info;
use url::Url;

use crate::client::{send, sign_header};
use crate::config::{
    ACCESS_TOKEN_PATH, AUTHORIZE_PATH, BEARER_TOKEN_PATH, INVALIDATE_TOKEN_PATH,
    REQUEST_TOKEN_PATH,
};
use crate::encoding::encode;
use crate::secrets::ClientKind;
use crate::{
    AuthError, Client, ConfigError, Credentials, Error, OAuthParameters, OAuthToken,
    ProtocolError, RequestDescriptor, Result, Secrets, TokenReader, OAUTH_TOKEN_KEY,
};

const X_AUTH_MODE_KEY: &str = "x_auth_mode";
const X_AUTH_MODE_CLIENT_AUTH: &str = "client_auth";
const X_AUTH_USERNAME_KEY: &str = "x_auth_username";
const X_AUTH_PASSWORD_KEY: &str = "x_auth_password";
const GRANT_TYPE_KEY: &str = "grant_type";
const CLIENT_CREDENTIALS: &str = "client_credentials";
const ACCESS_TOKEN_KEY: &str = "access_token";
const SCREEN_NAME_KEY: &str = "screen_name";
const CALLBACK_CONFIRMED_KEY: &str = "oauth_callback_confirmed";

/// Callback value selecting the out-of-band PIN flow.
pub const OUT_OF_BAND_CALLBACK: &str = "oob";

#[derive(Deserialize)]
struct BearerTokenResponse {
    token_type: String,
    access_token: String,
}

impl Client {
    /// Obtains a request token, signed with consumer credentials only.
    ///
    /// Pass [`OUT_OF_BAND_CALLBACK`] for the PIN flow. The user then visits
    /// [`authorize_url`](Self::authorize_url) to get the PIN.
    pub async fn request_token(&self, callback: &str) -> Result<OAuthToken> {
        let _transition = self.transition.lock().await;
        self.require_kind(ClientKind::User, "request_token")?;

        let url = self.config.oauth_url(REQUEST_TOKEN_PATH)?;
        let credentials = self.store.snapshot();
        let secrets = Secrets::new(
            credentials.consumer_key.as_str(),
            credentials.consumer_secret.as_str(),
        );
        let request = RequestDescriptor::post(REQUEST_TOKEN_PATH);
        let authorization = sign_header(
            &secrets,
            OAuthParameters::new().callback(callback),
            request.method(),
            &url,
            &request.signed_pairs(),
        )?;
        let token = request
            .into_builder(&self.inner, url, authorization)?
            .send()
            .await?
            .parse_oauth_token()
            .await?;
        if token.extra.get(CALLBACK_CONFIRMED_KEY).map(String::as_str) != Some("true") {
            return Err(ProtocolError::CallbackNotConfirmed.into());
        }

        *self.pending_request_token.lock() = Some(token.clone());
        self.store.mark_request_token();
        info!("request token obtained");
        Ok(token)
    }

    /// URL at which the user authorizes `request_token` and reads the PIN.
    pub fn authorize_url(&self, request_token: &OAuthToken) -> Result<Url> {
        let mut url = self.config.oauth_url(AUTHORIZE_PATH)?;
        url.query_pairs_mut()
            .append_pair(OAUTH_TOKEN_KEY, &request_token.token);
        Ok(url)
    }

    /// The request token from the last [`request_token`](Self::request_token)
    /// call that has not been exchanged yet.
    pub fn pending_request_token(&self) -> Option<OAuthToken> {
        self.pending_request_token.lock().clone()
    }

    /// Exchanges `request_token` and the user's PIN for an access token,
    /// which becomes this client's user-context credential.
    ///
    /// A malformed PIN, or a token other than the pending one, fails without
    /// a network call; any rejection by the server is reported as
    /// [`AuthError::Rejected`] and leaves the credentials untouched.
    pub async fn exchange_pin(&self, pin: &str, request_token: &OAuthToken) -> Result<OAuthToken> {
        let _transition = self.transition.lock().await;
        self.require_kind(ClientKind::User, "exchange_pin")?;
        let pin = pin.trim();
        if pin.is_empty() || !pin.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(AuthError::MalformedVerifier.into());
        }
        // a token restored from elsewhere is accepted when nothing is pending
        if let Some(ref pending) = *self.pending_request_token.lock() {
            if pending.token != request_token.token {
                return Err(AuthError::StaleRequestToken.into());
            }
        }

        let url = self.config.oauth_url(ACCESS_TOKEN_PATH)?;
        let credentials = self.store.snapshot();
        let secrets = Secrets::new(
            credentials.consumer_key.as_str(),
            credentials.consumer_secret.as_str(),
        )
        .token(request_token.token.as_str(), request_token.secret.as_str());
        let request = RequestDescriptor::post(ACCESS_TOKEN_PATH);
        let authorization = sign_header(
            &secrets,
            OAuthParameters::new().verifier(pin),
            request.method(),
            &url,
            &request.signed_pairs(),
        )?;
        let access = request
            .into_builder(&self.inner, url, authorization)?
            .send()
            .await?
            .parse_oauth_token()
            .await
            .map_err(rejection_as_auth)?;

        self.pending_request_token.lock().take();
        self.adopt_access_token(&access);
        Ok(access)
    }

    /// xAuth: exchanges a username and password directly for an access token.
    /// Only available to consumer keys that were granted xAuth access.
    pub async fn x_auth_access_token(&self, username: &str, password: &str) -> Result<OAuthToken> {
        let _transition = self.transition.lock().await;
        self.require_kind(ClientKind::User, "x_auth_access_token")?;

        let url = self.config.oauth_url(ACCESS_TOKEN_PATH)?;
        let credentials = self.store.snapshot();
        let secrets = Secrets::new(
            credentials.consumer_key.as_str(),
            credentials.consumer_secret.as_str(),
        );
        let request = RequestDescriptor::post(ACCESS_TOKEN_PATH)
            .parameter(X_AUTH_MODE_KEY, X_AUTH_MODE_CLIENT_AUTH)
            .parameter(X_AUTH_USERNAME_KEY, username)
            .parameter(X_AUTH_PASSWORD_KEY, password);
        let authorization = sign_header(
            &secrets,
            OAuthParameters::new(),
            request.method(),
            &url,
            &request.signed_pairs(),
        )?;
        let access = request
            .into_builder(&self.inner, url, authorization)?
            .send()
            .await?
            .parse_oauth_token()
            .await
            .map_err(rejection_as_auth)?;

        self.adopt_access_token(&access);
        Ok(access)
    }

    /// Checks that the stored access token is still accepted and returns the
    /// user's screen name.
    pub async fn verify_credentials(&self) -> Result<String> {
        let path = self.config.verify_path().to_string();
        let value = self.get_resource::<_, String, String>(&path, None).await?;
        let screen_name = value
            .get(SCREEN_NAME_KEY)
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProtocolError::MissingField(SCREEN_NAME_KEY.to_string()))?
            .to_string();
        *self.user_name.write() = Some(screen_name.clone());
        Ok(screen_name)
    }

    /// OAuth 2.0 client-credentials grant. Stores and returns the bearer token.
    pub async fn obtain_bearer_token(&self) -> Result<String> {
        let _transition = self.transition.lock().await;
        self.require_kind(ClientKind::ApplicationOnly, "obtain_bearer_token")?;

        let url = self.config.oauth_url(BEARER_TOKEN_PATH)?;
        let credentials = self.store.snapshot();
        let response = RequestDescriptor::post(BEARER_TOKEN_PATH)
            .parameter(GRANT_TYPE_KEY, CLIENT_CREDENTIALS)
            .into_builder(&self.inner, url, basic_header(&credentials))?;
        let token: BearerTokenResponse = send(response).await?.deserialize()?;
        if !token.token_type.eq_ignore_ascii_case("bearer") {
            return Err(ProtocolError::UnexpectedTokenType(token.token_type).into());
        }

        self.store.set_bearer_token(token.access_token.clone());
        info!("bearer token obtained");
        Ok(token.access_token)
    }

    /// Revokes the stored bearer token. Afterwards every request fails with
    /// [`AuthError::NotAuthenticated`] until a new token is obtained.
    pub async fn invalidate_bearer_token(&self) -> Result<()> {
        let _transition = self.transition.lock().await;
        self.require_kind(ClientKind::ApplicationOnly, "invalidate_bearer_token")?;

        let credentials = self.store.snapshot();
        let bearer = credentials
            .bearer_token
            .as_deref()
            .ok_or(AuthError::NotAuthenticated)?;
        let url = self.config.oauth_url(INVALIDATE_TOKEN_PATH)?;
        let request = RequestDescriptor::post(INVALIDATE_TOKEN_PATH)
            .parameter(ACCESS_TOKEN_KEY, bearer)
            .into_builder(&self.inner, url, basic_header(&credentials))?;
        send(request).await?;

        self.store.clear_bearer_token();
        info!("bearer token invalidated");
        Ok(())
    }

    fn adopt_access_token(&self, access: &OAuthToken) {
        self.store
            .set_access_token(access.token.clone(), access.secret.clone());
        if let Some(screen_name) = access.screen_name() {
            *self.user_name.write() = Some(screen_name.to_string());
        }
        info!(user_id = access.user_id(), "access token obtained");
    }

    fn require_kind(&self, kind: ClientKind, operation: &'static str) -> Result<()> {
        if self.store.kind() == kind {
            return Ok(());
        }
        let expected = match kind {
            ClientKind::User => "user-context",
            ClientKind::ApplicationOnly => "application-only",
        };
        Err(ConfigError::WrongAuthMode(operation, expected).into())
    }
}

/// `Basic base64(encode(key):encode(secret))`, used only against the
/// OAuth 2.0 token endpoints.
fn basic_header(credentials: &Credentials) -> String {
    let pair = format!(
        "{}:{}",
        encode(&credentials.consumer_key),
        encode(&credentials.consumer_secret)
    );
    format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode(pair)
    )
}

/// Any non-2xx answer to an access-token exchange means the verifier or
/// password was refused; server errors and rate limits keep their class.
fn rejection_as_auth(err: Error) -> Error {
    match err {
        Error::Http { status, errors } => AuthError::Rejected { status, errors }.into(),
        Error::NotFound { errors } => AuthError::Rejected {
            status: reqwest::StatusCode::NOT_FOUND,
            errors,
        }
        .into(),
        other => other,
    }
}
