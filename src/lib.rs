/*!
twitter-oauth-client: authenticated request core for the Twitter REST API.

# Overview

This library signs and dispatches requests against the Twitter v1.1 REST API
on top of [reqwest](https://crates.io/crates/reqwest). It covers the part
every endpoint funnels through:

- OAuth 1.0a HMAC-SHA1 request signing (user context),
- the OAuth 2.0 application-only bearer token lifecycle,
- a generic dispatcher that turns a resource path and a flat parameter map
  into a signed GET, urlencoded POST or multipart POST, and maps the
  response to a JSON value, raw bytes or a classified [`Error`].

Endpoint-specific wrappers are left to the caller; any endpoint is a path
plus parameters.

# How to use

## Basic usecase 1 - sending the tweet

```rust,no_run
use twitter_oauth_client::{Client, Credentials};

# async fn run() -> twitter_oauth_client::Result<()> {
let credentials = Credentials::new("[CONSUMER_KEY]", "[CONSUMER_SECRET]")
    .access_token("[ACCESS_TOKEN]", "[TOKEN_SECRET]");

let client = Client::user(credentials).build()?;
let status = client
    .post_resource("statuses/update.json", vec![("status", "Hello, Twitter!")])
    .await?;
println!("{}", status["id_str"]);
# Ok(())
# }
```

## Basic usecase 2 - Acquiring OAuth token & secret

```rust,no_run
use std::io;
use twitter_oauth_client::{Client, Credentials, OUT_OF_BAND_CALLBACK};

# async fn run() -> Result<(), Box<dyn std::error::Error>> {
let client = Client::user(Credentials::new("[CONSUMER_KEY]", "[CONSUMER_SECRET]")).build()?;

// step 1: acquire request token & token secret
let request_token = client.request_token(OUT_OF_BAND_CALLBACK).await?;

// step 2. acquire user pin
println!("please access to: {}", client.authorize_url(&request_token)?);
println!("input pin: ");
let mut user_input = String::new();
io::stdin().read_line(&mut user_input)?;

// step 3. acquire access token; the client now acts as the user
let access = client.exchange_pin(user_input.trim(), &request_token).await?;
println!(
    "your token and secret is: \n token: {}\n secret: {}",
    access.token, access.secret
);
println!("signed in as {:?}", access.screen_name());
# Ok(())
# }
```

## Basic usecase 3 - application-only requests

```rust,no_run
use twitter_oauth_client::{Client, Credentials};

# async fn run() -> twitter_oauth_client::Result<()> {
let client = Client::application_only(Credentials::new("[CONSUMER_KEY]", "[CONSUMER_SECRET]"))
    .build()?;
client.obtain_bearer_token().await?;

let page = client
    .get_cursored("followers/ids.json", vec![("screen_name", "twitterapi")], "ids")
    .await?;
println!("{} ids, next cursor {:?}", page.items.len(), page.next_cursor);

client.invalidate_bearer_token().await?;
# Ok(())
# }
```

Nothing is retried. A [`Error::RateLimited`] carries the server's
`Retry-After`, and deciding whether to wait is up to the caller.
*/
mod client;
mod config;
pub mod encoding;
mod error;
mod lifecycle;
mod request;
mod response;
mod secrets;
mod signer;
mod token_reader;

// exposed to external program
pub use client::{Client, ClientBuilder, OAuthClientProvider};
pub use config::{ClientConfig, DEFAULT_API_BASE, DEFAULT_OAUTH_BASE};
pub use error::{
    ApiError, AuthError, ConfigError, Error, ProtocolError, Result, SignError, SignResult,
    TokenReaderError, TokenReaderResult,
};
pub use lifecycle::OUT_OF_BAND_CALLBACK;
pub use request::{MediaPart, RequestDescriptor};
pub use response::{CursoredPage, RateLimitStatus, ResponseBody, ResponseEnvelope};
pub use secrets::{
    AuthMode, ClientKind, CredentialStore, Credentials, Secrets, SecretsProvider, TokenState,
};
pub use signer::{OAuthParameters, SignatureContext, Signer};
pub use token_reader::{OAuthToken, TokenReader};

// exposed constant variables
/// Represents `oauth_callback`.
pub const OAUTH_CALLBACK_KEY: &str = "oauth_callback";
/// Represents `oauth_nonce`.
pub const OAUTH_NONCE_KEY: &str = "oauth_nonce";
/// Represents `oauth_timestamp`.
pub const OAUTH_TIMESTAMP_KEY: &str = "oauth_timestamp";
/// Represents `oauth_verifier`.
pub const OAUTH_VERIFIER_KEY: &str = "oauth_verifier";
/// Represents `oauth_version`.
pub const OAUTH_VERSION_KEY: &str = "oauth_version";
/// Represents `oauth_token`.
pub const OAUTH_TOKEN_KEY: &str = "oauth_token";
/// Represents `realm`.
pub const REALM_KEY: &str = "realm";

// crate-private constant variables
pub(crate) const OAUTH_KEY_PREFIX: &str = "oauth_";
pub(crate) const OAUTH_SIGNATURE_KEY: &str = "oauth_signature";
pub(crate) const OAUTH_SIGNATURE_METHOD_KEY: &str = "oauth_signature_method";
pub(crate) const OAUTH_CONSUMER_KEY: &str = "oauth_consumer_key";
