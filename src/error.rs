use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;
pub type SignResult<T> = std::result::Result<T, SignError>;
pub type TokenReaderResult<T> = std::result::Result<T, TokenReaderError>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid client configuration : {0}")]
    Configuration(#[from] ConfigError),
    #[error("authentication failed : {0}")]
    Auth(#[from] AuthError),
    #[error("rate limit exceeded with {status} (retry after {retry_after:?}s){}", first_message(.errors))]
    RateLimited {
        /// 429, or the legacy 420.
        status: StatusCode,
        /// Seconds from the `Retry-After` header.
        retry_after: Option<u64>,
        /// Epoch seconds from the `x-rate-limit-reset` header.
        reset_at: Option<u64>,
        errors: Vec<ApiError>,
    },
    #[error("resource not found{}", first_message(.errors))]
    NotFound { errors: Vec<ApiError> },
    #[error("server error {status}{}", first_message(.errors))]
    Server {
        status: StatusCode,
        errors: Vec<ApiError>,
    },
    #[error("request rejected with {status}{}", first_message(.errors))]
    Http {
        status: StatusCode,
        errors: Vec<ApiError>,
    },
    #[error("request failed : {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected response : {0}")]
    Protocol(#[from] ProtocolError),
    #[error("OAuth sign failed : {0}")]
    Signer(#[from] SignError),
    #[error("token acquisition failed : {0}")]
    TokenReader(#[from] TokenReaderError),
}

impl Error {
    /// HTTP status of the failed response, if the failure came from the server.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Auth(AuthError::Rejected { status, .. }) => Some(*status),
            Error::NotFound { .. } => Some(StatusCode::NOT_FOUND),
            Error::RateLimited { status, .. }
            | Error::Server { status, .. }
            | Error::Http { status, .. } => Some(*status),
            Error::Network(err) => err.status(),
            _ => None,
        }
    }

    /// Seconds the server asked the caller to wait before retrying.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Error::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Structured error payload returned by the API, empty when none was sent.
    pub fn api_errors(&self) -> &[ApiError] {
        match self {
            Error::Auth(AuthError::Rejected { errors, .. })
            | Error::RateLimited { errors, .. }
            | Error::NotFound { errors }
            | Error::Server { errors, .. }
            | Error::Http { errors, .. } => errors,
            _ => &[],
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Auth(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("consumer key and secret must not be empty")]
    MissingConsumerCredentials,
    #[error("{0} was given without its matching secret")]
    IncompleteToken(&'static str),
    #[error("a client holds either a user access token or a bearer token, not both")]
    ConflictingCredentials,
    #[error("environment variable {0} is not set")]
    MissingEnvironment(&'static str),
    #[error("invalid url {0}")]
    InvalidUrl(String),
    #[error("invalid media content type {0}")]
    InvalidMediaType(String),
    #[error("media parts can only be sent with POST")]
    MediaRequiresPost,
    #[error("{0} is only available to {1} clients")]
    WrongAuthMode(&'static str, &'static str),
}

#[derive(Error, Debug, Clone)]
pub enum AuthError {
    #[error("client holds no usable token")]
    NotAuthenticated,
    #[error("verifier must be a non-empty alphanumeric PIN")]
    MalformedVerifier,
    #[error("request token is not the one this client is waiting on")]
    StaleRequestToken,
    #[error("server rejected credentials with {status}{}", first_message(.errors))]
    Rejected {
        status: StatusCode,
        errors: Vec<ApiError>,
    },
}

#[derive(Error, Debug, Clone)]
pub enum SignError {
    #[error("parameter {0} uses the reserved oauth_ prefix")]
    ReservedParameter(String),
    #[error("signing key rejected : {0}")]
    InvalidKey(String),
}

#[derive(Error, Debug, Clone)]
pub enum ProtocolError {
    #[error("response body is not valid JSON : {0}")]
    InvalidJson(String),
    #[error("response is missing field {0}")]
    MissingField(String),
    #[error("unexpected token type {0}")]
    UnexpectedTokenType(String),
    #[error("server did not confirm the oauth_callback")]
    CallbackNotConfirmed,
}

#[derive(Error, Debug, Clone)]
pub enum TokenReaderError {
    #[error("response has malformed format: not found {0} in {1}")]
    TokenKeyNotFound(&'static str, String),
}

/// One entry of the API's `{"errors": [...]}` payload.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    #[serde(default)]
    pub code: i64,
    pub message: String,
}

fn first_message(errors: &[ApiError]) -> String {
    errors
        .first()
        .map(|e| format!(" : [{}] {}", e.code, e.message))
        .unwrap_or_default()
}
