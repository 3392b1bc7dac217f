use std::sync::Arc;

use http::Method;
use parking_lot::{Mutex, RwLock};
use reqwest::{Client as ReqwestClient, RequestBuilder as ReqwestRequestBuilder};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::debug;
use url::Url;

use crate::secrets::{auth_mode_of, ClientKind};
use crate::{
    AuthError, AuthMode, ClientConfig, CredentialStore, Credentials, CursoredPage, Error,
    OAuthParameters, OAuthToken, RequestDescriptor, ResponseEnvelope, Result, SecretsProvider,
    Signer, TokenState,
};

/// Lets an existing `reqwest::Client` be reused as the transport.
pub trait OAuthClientProvider {
    /// Starts a user-context (OAuth 1.0a) client.
    fn oauth1(self, credentials: Credentials) -> ClientBuilder;

    /// Starts an application-only (OAuth 2.0 bearer) client.
    fn oauth2_app_only(self, credentials: Credentials) -> ClientBuilder;
}

impl OAuthClientProvider for ReqwestClient {
    fn oauth1(self, credentials: Credentials) -> ClientBuilder {
        ClientBuilder::new(ClientKind::User, credentials).http_client(self)
    }

    fn oauth2_app_only(self, credentials: Credentials) -> ClientBuilder {
        ClientBuilder::new(ClientKind::ApplicationOnly, credentials).http_client(self)
    }
}

#[derive(Debug)]
pub struct ClientBuilder {
    kind: ClientKind,
    credentials: Credentials,
    config: ClientConfig,
    http: Option<ReqwestClient>,
}

impl ClientBuilder {
    fn new(kind: ClientKind, credentials: Credentials) -> Self {
        ClientBuilder {
            kind,
            credentials,
            config: ClientConfig::default(),
            http: None,
        }
    }

    pub fn config(self, config: ClientConfig) -> Self {
        ClientBuilder { config, ..self }
    }

    /// Uses `client` as transport. The user agent and timeout of the
    /// [`ClientConfig`] are then left to `client`.
    pub fn http_client(self, client: ReqwestClient) -> Self {
        ClientBuilder {
            http: Some(client),
            ..self
        }
    }

    pub fn build(self) -> Result<Client> {
        self.credentials.validate_for(self.kind)?;
        let inner = match self.http {
            Some(client) => client,
            None => self.config.http_client()?,
        };
        Ok(Client {
            inner,
            config: Arc::new(self.config),
            store: CredentialStore::new(self.kind, self.credentials),
            transition: Arc::new(tokio::sync::Mutex::new(())),
            pending_request_token: Arc::new(Mutex::new(None)),
            user_name: Arc::new(RwLock::new(None)),
        })
    }
}

/// Authenticated dispatcher for one set of credentials.
///
/// Cloning is cheap and clones share credentials and token state.
#[derive(Debug, Clone)]
pub struct Client {
    pub(crate) inner: ReqwestClient,
    pub(crate) config: Arc<ClientConfig>,
    pub(crate) store: CredentialStore,
    /// Held for the whole of a token transition.
    pub(crate) transition: Arc<tokio::sync::Mutex<()>>,
    pub(crate) pending_request_token: Arc<Mutex<Option<OAuthToken>>>,
    pub(crate) user_name: Arc<RwLock<Option<String>>>,
}

impl Client {
    /// A client acting on behalf of a user. Pass credentials without an
    /// access token to run the PIN flow first.
    pub fn user(credentials: Credentials) -> ClientBuilder {
        ClientBuilder::new(ClientKind::User, credentials)
    }

    /// A client acting as the application itself, with a bearer token.
    pub fn application_only(credentials: Credentials) -> ClientBuilder {
        ClientBuilder::new(ClientKind::ApplicationOnly, credentials)
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.store
    }

    pub fn current_auth_mode(&self) -> AuthMode {
        self.store.current_auth_mode()
    }

    pub fn token_state(&self) -> TokenState {
        self.store.token_state()
    }

    /// Screen name learned from the last token exchange or credential check.
    pub fn user_name(&self) -> Option<String> {
        self.user_name.read().clone()
    }

    /// Signs and sends `request`, mapping any non-2xx status to an [`Error`].
    ///
    /// Credentials are read once, at dispatch; a concurrent token change does
    /// not affect a request already built.
    pub async fn execute(&self, request: RequestDescriptor) -> Result<ResponseEnvelope> {
        request.validate()?;
        let url = self.config.resource_url(request.path())?;
        let credentials = self.store.snapshot();
        let mode = auth_mode_of(self.store.kind(), &credentials);
        debug!(
            method = %request.method(),
            path = request.path(),
            mode = ?mode,
            multipart = request.is_multipart(),
            "dispatching request"
        );

        let authorization = match mode {
            AuthMode::UserContext => sign_header(
                &*credentials,
                OAuthParameters::new(),
                request.method(),
                &url,
                &request.signed_pairs(),
            )?,
            AuthMode::ApplicationOnly => bearer_header(&credentials)?,
            AuthMode::Unauthenticated => return Err(AuthError::NotAuthenticated.into()),
        };
        let builder = request.into_builder(&self.inner, url, authorization)?;
        send(builder).await
    }

    /// Runs [`execute`](Self::execute) on the tokio runtime and returns at once.
    pub fn spawn_execute(&self, request: RequestDescriptor) -> JoinHandle<Result<ResponseEnvelope>> {
        let client = self.clone();
        tokio::spawn(async move { client.execute(request).await })
    }

    pub async fn get_resource<I, K, V>(&self, path: &str, parameters: I) -> Result<Value>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.execute(RequestDescriptor::get(path).parameters(parameters))
            .await?
            .into_json()
    }

    pub async fn post_resource<I, K, V>(&self, path: &str, parameters: I) -> Result<Value>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.execute(RequestDescriptor::post(path).parameters(parameters))
            .await?
            .into_json()
    }

    /// GETs one page of a cursored collection whose elements live under `items_key`.
    pub async fn get_cursored<I, K, V>(
        &self,
        path: &str,
        parameters: I,
        items_key: &str,
    ) -> Result<CursoredPage>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let value = self.get_resource(path, parameters).await?;
        CursoredPage::from_json(value, items_key)
    }
}

pub(crate) fn sign_header<S: SecretsProvider>(
    secrets: &S,
    parameters: OAuthParameters<'_>,
    method: &Method,
    url: &Url,
    pairs: &[(&str, &str)],
) -> Result<String> {
    Ok(Signer::new(secrets, parameters)
        .sign(method, url, pairs)?
        .authorization())
}

fn bearer_header(credentials: &Credentials) -> Result<String> {
    credentials
        .bearer_token
        .as_ref()
        .map(|token| format!("Bearer {}", token))
        .ok_or_else(|| Error::from(AuthError::NotAuthenticated))
}

pub(crate) async fn send(builder: ReqwestRequestBuilder) -> Result<ResponseEnvelope> {
    let response = builder.send().await?;
    debug!(status = response.status().as_u16(), "response received");
    ResponseEnvelope::read(response).await
}
