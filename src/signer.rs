use std::{
    borrow::Cow,
    fmt,
    time::{SystemTime, UNIX_EPOCH},
};

use base64::Engine;
use hmac::{Hmac, Mac};
use http::Method;
use rand::{distributions::Alphanumeric, Rng};
use sha1::Sha1;
use url::Url;

use crate::encoding::{canonicalize, encode};
use crate::{
    SecretsProvider, SignError, SignResult, OAUTH_CALLBACK_KEY, OAUTH_CONSUMER_KEY,
    OAUTH_KEY_PREFIX, OAUTH_NONCE_KEY, OAUTH_SIGNATURE_KEY, OAUTH_SIGNATURE_METHOD_KEY,
    OAUTH_TIMESTAMP_KEY, OAUTH_TOKEN_KEY, OAUTH_VERIFIER_KEY, OAUTH_VERSION_KEY, REALM_KEY,
};

type HmacSha1 = Hmac<Sha1>;

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const OAUTH_VERSION: &str = "1.0";
const NONCE_LENGTH: usize = 32;

#[derive(Debug, Clone)]
pub struct Signer<'a, TSecretsProvider>
where
    TSecretsProvider: SecretsProvider,
{
    secrets: &'a TSecretsProvider,
    parameters: OAuthParameters<'a>,
}

impl<'a, TSecretsProvider> Signer<'a, TSecretsProvider>
where
    TSecretsProvider: SecretsProvider,
{
    pub fn new(secrets: &'a TSecretsProvider, parameters: OAuthParameters<'a>) -> Self {
        Signer {
            secrets,
            parameters,
        }
    }

    /// Signs a request for `method` on `url` carrying `payload`.
    ///
    /// `payload` holds the query parameters of a GET or the form fields of a
    /// POST; binary multipart parts must not be passed. Any query already on
    /// `url` is merged into the signed set and stripped from the base URI.
    pub fn sign<K, V>(
        self,
        method: &Method,
        url: &Url,
        payload: &[(K, V)],
    ) -> SignResult<SignatureContext>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let (consumer_key, consumer_secret) = self.secrets.get_consumer_key_pair();
        let (token, token_secret) = self.secrets.get_token_option_pair();

        let mut base_url = url.clone();
        base_url.set_query(None);
        base_url.set_fragment(None);

        let mut params: Vec<(Cow<str>, Cow<str>)> = url.query_pairs().collect();
        for (key, value) in payload {
            params.push((Cow::from(key.as_ref()), Cow::from(value.as_ref())));
        }
        if let Some((key, _)) = params.iter().find(|(k, _)| k.starts_with(OAUTH_KEY_PREFIX)) {
            return Err(SignError::ReservedParameter(key.to_string()));
        }

        let oauth_parameters = self.parameters.build(consumer_key, token);
        params.extend(
            oauth_parameters
                .iter()
                .map(|(k, v)| (Cow::from(*k), Cow::from(v.as_str()))),
        );

        let normalized_parameters = canonicalize(params);
        let base_string = format!(
            "{}&{}&{}",
            method.as_str().to_ascii_uppercase(),
            encode(base_url.as_str()),
            encode(&normalized_parameters)
        );
        let signing_key = format!(
            "{}&{}",
            encode(consumer_secret),
            encode(token_secret.unwrap_or_default())
        );
        let signature = hmac_sha1_base64(&signing_key, &base_string)?;

        Ok(SignatureContext {
            oauth_parameters,
            realm: self.parameters.realm.map(Cow::into_owned),
            normalized_parameters,
            base_string,
            signing_key,
            signature,
        })
    }
}

fn hmac_sha1_base64(key: &str, message: &str) -> SignResult<String> {
    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| SignError::InvalidKey(e.to_string()))?;
    mac.update(message.as_bytes());
    Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

/// Everything derived while signing one request. Single use: every call to
/// [`Signer::sign`] draws a new nonce and timestamp unless they were pinned.
#[derive(Clone)]
pub struct SignatureContext {
    oauth_parameters: Vec<(&'static str, String)>,
    realm: Option<String>,
    normalized_parameters: String,
    base_string: String,
    signing_key: String,
    signature: String,
}

impl SignatureContext {
    pub fn normalized_parameters(&self) -> &str {
        &self.normalized_parameters
    }

    pub fn base_string(&self) -> &str {
        &self.base_string
    }

    pub fn signing_key(&self) -> &str {
        &self.signing_key
    }

    /// Base64 HMAC-SHA1 digest, not yet percent-encoded.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// The `oauth_*` protocol parameters that went into the signature.
    pub fn oauth_parameter(&self, key: &str) -> Option<&str> {
        self.oauth_parameters
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Renders the `Authorization` header value.
    pub fn authorization(&self) -> String {
        let mut fields = self
            .oauth_parameters
            .iter()
            .map(|(k, v)| (*k, v.as_str()))
            .chain(std::iter::once((OAUTH_SIGNATURE_KEY, self.signature.as_str())))
            .collect::<Vec<(&str, &str)>>();
        fields.sort();

        let realm = self
            .realm
            .as_deref()
            .map(|realm| (REALM_KEY, realm))
            .into_iter();
        let rendered = realm
            .chain(fields)
            .map(|(k, v)| format!("{}=\"{}\"", k, encode(v)))
            .collect::<Vec<String>>()
            .join(", ");
        format!("OAuth {}", rendered)
    }
}

impl fmt::Debug for SignatureContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureContext")
            .field("normalized_parameters", &self.normalized_parameters)
            .field("base_string", &self.base_string)
            .field("signing_key", &"<redacted>")
            .field("signature", &self.signature)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct OAuthParameters<'a> {
    callback: Option<Cow<'a, str>>,
    nonce: Option<Cow<'a, str>>,
    realm: Option<Cow<'a, str>>,
    timestamp: Option<u64>,
    verifier: Option<Cow<'a, str>>,
    version: bool,
}

impl Default for OAuthParameters<'static> {
    fn default() -> Self {
        OAuthParameters {
            callback: None,
            nonce: None,
            realm: None,
            timestamp: None,
            verifier: None,
            version: true,
        }
    }
}

impl<'a> OAuthParameters<'a> {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn callback<T>(self, callback: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        OAuthParameters {
            callback: Some(callback.into()),
            ..self
        }
    }

    /// set the oauth_nonce value
    pub fn nonce<T>(self, nonce: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        OAuthParameters {
            nonce: Some(nonce.into()),
            ..self
        }
    }

    /// set the realm value of the Authorization header (not signed)
    pub fn realm<T>(self, realm: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        OAuthParameters {
            realm: Some(realm.into()),
            ..self
        }
    }

    /// set the oauth_timestamp value
    pub fn timestamp<T>(self, timestamp: T) -> Self
    where
        T: Into<u64>,
    {
        OAuthParameters {
            timestamp: Some(timestamp.into()),
            ..self
        }
    }

    /// set the oauth_verifier value
    pub fn verifier<T>(self, verifier: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        OAuthParameters {
            verifier: Some(verifier.into()),
            ..self
        }
    }

    /// set the oauth_version value (boolean)
    ///
    /// # Note
    /// When the version has value `true` (the default), oauth_version will be set with "1.0".
    /// Otherwise, oauth_version will not be included in your request.
    /// In oauth1, oauth_version value must be "1.0" or not specified.
    pub fn version<T>(self, version: T) -> Self
    where
        T: Into<bool>,
    {
        OAuthParameters {
            version: version.into(),
            ..self
        }
    }

    fn build(&self, consumer_key: &str, token: Option<&str>) -> Vec<(&'static str, String)> {
        let mut params = vec![
            (OAUTH_CONSUMER_KEY, consumer_key.to_string()),
            (
                OAUTH_NONCE_KEY,
                self.nonce
                    .as_ref()
                    .map(|n| n.to_string())
                    .unwrap_or_else(generate_nonce),
            ),
            (OAUTH_SIGNATURE_METHOD_KEY, SIGNATURE_METHOD.to_string()),
            (
                OAUTH_TIMESTAMP_KEY,
                self.timestamp.unwrap_or_else(unix_timestamp).to_string(),
            ),
        ];
        if let Some(ref callback) = self.callback {
            params.push((OAUTH_CALLBACK_KEY, callback.to_string()));
        }
        if let Some(token) = token {
            params.push((OAUTH_TOKEN_KEY, token.to_string()));
        }
        if let Some(ref verifier) = self.verifier {
            params.push((OAUTH_VERIFIER_KEY, verifier.to_string()));
        }
        if self.version {
            params.push((OAUTH_VERSION_KEY, OAUTH_VERSION.to_string()));
        }
        params
    }
}

fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LENGTH)
        .map(char::from)
        .collect()
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
