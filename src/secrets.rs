use std::{borrow::Cow, env, fmt, sync::Arc};

use parking_lot::RwLock;

use crate::error::ConfigError;

pub trait SecretsProvider {
    fn get_consumer_key_pair<'a>(&'a self) -> (&'a str, &'a str);

    fn get_token_pair_option<'a>(&'a self) -> Option<(&'a str, &'a str)>;

    fn get_token_option_pair<'a>(&'a self) -> (Option<&'a str>, Option<&'a str>) {
        self.get_token_pair_option()
            .map(|s| (Some(s.0), Some(s.1)))
            .unwrap_or_else(|| (None, None))
    }
}

/// Ad-hoc signing secrets, used for the request-token and access-token legs
/// where the token pair is not (yet) the client's own.
#[derive(Debug, Clone)]
pub struct Secrets<'a, T> {
    token: T,
    token_secret: T,
    consumer_key: Cow<'a, str>,
    consumer_secret: Cow<'a, str>,
}

impl<'a> Secrets<'a, ()> {
    pub fn new<TKey, TSecret>(consumer_key: TKey, consumer_secret: TSecret) -> Self
    where
        TKey: Into<Cow<'a, str>>,
        TSecret: Into<Cow<'a, str>>,
    {
        Secrets {
            token: (),
            token_secret: (),
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
        }
    }

    pub fn token<TKey, TSecret>(
        self,
        token: TKey,
        token_secret: TSecret,
    ) -> Secrets<'a, Cow<'a, str>>
    where
        TKey: Into<Cow<'a, str>>,
        TSecret: Into<Cow<'a, str>>,
    {
        Secrets {
            token: token.into(),
            token_secret: token_secret.into(),
            consumer_key: self.consumer_key,
            consumer_secret: self.consumer_secret,
        }
    }
}

impl SecretsProvider for Secrets<'_, ()> {
    fn get_consumer_key_pair<'a>(&'a self) -> (&'a str, &'a str) {
        (&self.consumer_key, &self.consumer_secret)
    }

    fn get_token_pair_option<'a>(&'a self) -> Option<(&'a str, &'a str)> {
        None
    }
}

impl SecretsProvider for Secrets<'_, Cow<'_, str>> {
    fn get_consumer_key_pair<'a>(&'a self) -> (&'a str, &'a str) {
        (&self.consumer_key, &self.consumer_secret)
    }

    fn get_token_pair_option<'a>(&'a self) -> Option<(&'a str, &'a str)> {
        Some((&self.token, &self.token_secret))
    }
}

/// The credential set owned by one client.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: Option<String>,
    pub access_token_secret: Option<String>,
    pub bearer_token: Option<String>,
}

pub const CONSUMER_KEY_ENV: &str = "TWITTER_CONSUMER_KEY";
pub const CONSUMER_SECRET_ENV: &str = "TWITTER_CONSUMER_SECRET";
pub const ACCESS_TOKEN_ENV: &str = "TWITTER_ACCESS_TOKEN";
pub const ACCESS_TOKEN_SECRET_ENV: &str = "TWITTER_ACCESS_TOKEN_SECRET";
pub const BEARER_TOKEN_ENV: &str = "TWITTER_BEARER_TOKEN";

impl Credentials {
    pub fn new<K, S>(consumer_key: K, consumer_secret: S) -> Self
    where
        K: Into<String>,
        S: Into<String>,
    {
        Credentials {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            access_token: None,
            access_token_secret: None,
            bearer_token: None,
        }
    }

    pub fn access_token<T, S>(self, token: T, token_secret: S) -> Self
    where
        T: Into<String>,
        S: Into<String>,
    {
        Credentials {
            access_token: Some(token.into()),
            access_token_secret: Some(token_secret.into()),
            ..self
        }
    }

    pub fn bearer_token<T: Into<String>>(self, token: T) -> Self {
        Credentials {
            bearer_token: Some(token.into()),
            ..self
        }
    }

    /// Reads the consumer pair and any stored token from `TWITTER_*`
    /// environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let read = |name: &'static str| env::var(name).ok().filter(|v| !v.is_empty());
        let key = read(CONSUMER_KEY_ENV).ok_or(ConfigError::MissingEnvironment(CONSUMER_KEY_ENV))?;
        let secret =
            read(CONSUMER_SECRET_ENV).ok_or(ConfigError::MissingEnvironment(CONSUMER_SECRET_ENV))?;
        let credentials = Credentials {
            consumer_key: key,
            consumer_secret: secret,
            access_token: read(ACCESS_TOKEN_ENV),
            access_token_secret: read(ACCESS_TOKEN_SECRET_ENV),
            bearer_token: read(BEARER_TOKEN_ENV),
        };
        credentials.validate()?;
        Ok(credentials)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.consumer_key.is_empty() || self.consumer_secret.is_empty() {
            return Err(ConfigError::MissingConsumerCredentials);
        }
        match (&self.access_token, &self.access_token_secret) {
            (Some(_), None) => return Err(ConfigError::IncompleteToken("access token")),
            (None, Some(_)) => return Err(ConfigError::IncompleteToken("access token secret")),
            _ => {}
        }
        if self.access_token.is_some() && self.bearer_token.is_some() {
            return Err(ConfigError::ConflictingCredentials);
        }
        Ok(())
    }

    /// [`validate`](Self::validate), plus a check that any stored token
    /// belongs to the flow family of `kind`.
    pub(crate) fn validate_for(&self, kind: ClientKind) -> Result<(), ConfigError> {
        self.validate()?;
        let mismatched = match kind {
            ClientKind::User => self.bearer_token.is_some(),
            ClientKind::ApplicationOnly => self.access_token.is_some(),
        };
        if mismatched {
            return Err(ConfigError::ConflictingCredentials);
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("Credentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .field("access_token", &self.access_token)
            .field("access_token_secret", &redact(&self.access_token_secret))
            .field("bearer_token", &redact(&self.bearer_token))
            .finish()
    }
}

impl SecretsProvider for Credentials {
    fn get_consumer_key_pair<'a>(&'a self) -> (&'a str, &'a str) {
        (&self.consumer_key, &self.consumer_secret)
    }

    fn get_token_pair_option<'a>(&'a self) -> Option<(&'a str, &'a str)> {
        match (&self.access_token, &self.access_token_secret) {
            (Some(token), Some(secret)) => Some((token, secret)),
            _ => None,
        }
    }
}

/// Which family of flows a client was built for. Fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    User,
    ApplicationOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    UserContext,
    ApplicationOnly,
    Unauthenticated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Unauthenticated,
    RequestTokenObtained,
    AccessTokenObtained,
    BearerTokenObtained,
    Invalidated,
}

#[derive(Debug)]
struct StoreCell {
    credentials: Arc<Credentials>,
    state: TokenState,
}

/// Shared, lock-guarded holder of a client's [`Credentials`].
///
/// Readers get an `Arc` snapshot; writers swap the whole value, so a request
/// never observes a half-updated credential set.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    kind: ClientKind,
    cell: Arc<RwLock<StoreCell>>,
}

impl CredentialStore {
    pub(crate) fn new(kind: ClientKind, credentials: Credentials) -> Self {
        let state = match kind {
            ClientKind::User if credentials.get_token_pair_option().is_some() => {
                TokenState::AccessTokenObtained
            }
            ClientKind::ApplicationOnly if credentials.bearer_token.is_some() => {
                TokenState::BearerTokenObtained
            }
            _ => TokenState::Unauthenticated,
        };
        CredentialStore {
            kind,
            cell: Arc::new(RwLock::new(StoreCell {
                credentials: Arc::new(credentials),
                state,
            })),
        }
    }

    pub fn kind(&self) -> ClientKind {
        self.kind
    }

    pub fn snapshot(&self) -> Arc<Credentials> {
        self.cell.read().credentials.clone()
    }

    pub fn token_state(&self) -> TokenState {
        self.cell.read().state
    }

    pub fn current_auth_mode(&self) -> AuthMode {
        auth_mode_of(self.kind, &self.snapshot())
    }

    pub(crate) fn mark_request_token(&self) {
        let mut cell = self.cell.write();
        if cell.state == TokenState::Unauthenticated {
            cell.state = TokenState::RequestTokenObtained;
        }
    }

    pub(crate) fn set_access_token(&self, token: String, token_secret: String) {
        self.update(TokenState::AccessTokenObtained, |c| Credentials {
            access_token: Some(token),
            access_token_secret: Some(token_secret),
            ..c
        });
    }

    pub(crate) fn set_bearer_token(&self, token: String) {
        self.update(TokenState::BearerTokenObtained, |c| Credentials {
            bearer_token: Some(token),
            ..c
        });
    }

    pub(crate) fn clear_bearer_token(&self) {
        self.update(TokenState::Invalidated, |c| Credentials {
            bearer_token: None,
            ..c
        });
    }

    fn update<F>(&self, state: TokenState, f: F)
    where
        F: FnOnce(Credentials) -> Credentials,
    {
        let mut cell = self.cell.write();
        let next = f(Credentials::clone(&cell.credentials));
        cell.credentials = Arc::new(next);
        cell.state = state;
    }
}

pub(crate) fn auth_mode_of(kind: ClientKind, credentials: &Credentials) -> AuthMode {
    match kind {
        ClientKind::User if credentials.get_token_pair_option().is_some() => AuthMode::UserContext,
        ClientKind::ApplicationOnly if credentials.bearer_token.is_some() => {
            AuthMode::ApplicationOnly
        }
        _ => AuthMode::Unauthenticated,
    }
}
