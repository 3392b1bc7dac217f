use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Response;
use serde::Deserialize;

use crate::response::classify_failure;
use crate::{Result, TokenReaderError, TokenReaderResult};

const OAUTH_TOKEN_KEY: &str = "oauth_token";

const OAUTH_TOKEN_SECRET_KEY: &str = "oauth_token_secret";

const USER_ID_KEY: &str = "user_id";

const SCREEN_NAME_KEY: &str = "screen_name";

/// A request token or access token returned by the `oauth/*` endpoints.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OAuthToken {
    /// OAuth Token
    #[serde(rename = "oauth_token")]
    pub token: String,
    /// OAuth Token Secret
    #[serde(rename = "oauth_token_secret")]
    pub secret: String,
    /// Other contents, e.g. `user_id`, `screen_name`, `oauth_callback_confirmed`
    #[serde(flatten)]
    pub extra: HashMap<String, String>,
}

impl OAuthToken {
    pub fn user_id(&self) -> Option<&str> {
        self.extra.get(USER_ID_KEY).map(String::as_str)
    }

    pub fn screen_name(&self) -> Option<&str> {
        self.extra.get(SCREEN_NAME_KEY).map(String::as_str)
    }
}

/// Add parse_oauth_token feature to reqwest::Response.
// this trait is sealed
#[async_trait]
pub trait TokenReader: private::Sealed {
    /// Classifies non-2xx statuses, then reads a
    /// `oauth_token=...&oauth_token_secret=...` body.
    async fn parse_oauth_token(self) -> Result<OAuthToken>;
}

#[async_trait]
impl TokenReader for Response {
    async fn parse_oauth_token(self) -> Result<OAuthToken> {
        let status = self.status();
        let headers = self.headers().clone();
        let text = self.text().await?;
        if !status.is_success() {
            return Err(classify_failure(status, &headers, text.as_bytes()));
        }
        Ok(read_oauth_token(text)?)
    }
}

fn read_oauth_token(text: String) -> TokenReaderResult<OAuthToken> {
    let mut destructured = text
        .trim()
        .split('&')
        .map(|e| e.splitn(2, '='))
        .map(|mut iter| {
            (
                iter.next().unwrap_or_default().to_string(),
                iter.next().unwrap_or_default().to_string(),
            )
        })
        .collect::<HashMap<String, String>>();
    let token = destructured.remove(OAUTH_TOKEN_KEY);
    let secret = destructured.remove(OAUTH_TOKEN_SECRET_KEY);
    match (token, secret) {
        (Some(token), Some(secret)) => Ok(OAuthToken {
            token,
            secret,
            extra: destructured,
        }),
        (None, _) => Err(TokenReaderError::TokenKeyNotFound(OAUTH_TOKEN_KEY, text)),
        (_, _) => Err(TokenReaderError::TokenKeyNotFound(
            OAUTH_TOKEN_SECRET_KEY,
            text,
        )),
    }
}

mod private {
    use reqwest::Response;

    pub trait Sealed {}
    impl Sealed for Response {}
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn parse_response_typical() {
        let resp_str_sample = "oauth_token=Z6eEdO8MOmk394WozF5oKyuAv855l4Mlqo7hhlSLik&oauth_token_secret=Kd75W4OQfb2oJTV0vzGzeXftVAwgMnEK9MumzYcM&oauth_callback_confirmed=true";
        for parsed in &[
            read_oauth_token(resp_str_sample.to_string()).unwrap(),
            serde_urlencoded::from_str::<OAuthToken>(resp_str_sample).unwrap(),
        ] {
            assert_eq!(parsed.token, "Z6eEdO8MOmk394WozF5oKyuAv855l4Mlqo7hhlSLik");
            assert_eq!(parsed.secret, "Kd75W4OQfb2oJTV0vzGzeXftVAwgMnEK9MumzYcM");
            assert_eq!(parsed.extra.len(), 1);
            let oauth_callback_confirmed = parsed.extra.get("oauth_callback_confirmed").unwrap();
            assert_eq!(oauth_callback_confirmed, "true");
        }
    }

    #[test]
    fn parse_access_token_response() {
        let resp_str_sample = "oauth_token=6253282-eWudHldSbIaelX7swmsiHImEL4KinwaGloHANdrY&oauth_token_secret=2EEfA6BG5ly3sR3XjE0IBSnlQu4ZrUzPiYTmrkVU&user_id=6253282&screen_name=twitterapi";
        let parsed = read_oauth_token(resp_str_sample.to_string()).unwrap();
        assert_eq!(parsed.user_id(), Some("6253282"));
        assert_eq!(parsed.screen_name(), Some("twitterapi"));
    }

    #[test]
    fn parse_response_edge() {
        let resp_str_sample = "oauth_token==&oauth_token_secret=&keyonly=&keyonly2&=&&";
        let parsed = read_oauth_token(resp_str_sample.to_string()).unwrap();
        assert_eq!(parsed.token, "=");
        assert_eq!(parsed.secret, "");
        assert_eq!(parsed.extra.len(), 3);
        let keyonly = parsed.extra.get("keyonly").unwrap();
        assert_eq!(keyonly, "");
        let keyonly2 = parsed.extra.get("keyonly2").unwrap();
        assert_eq!(keyonly2, "");
        let empty = parsed.extra.get("").unwrap();
        assert_eq!(empty, "");
    }

    #[test]
    fn parse_minimal() {
        let resp_str_sample = "oauth_token&oauth_token_secret";
        let parsed = read_oauth_token(resp_str_sample.to_string()).unwrap();
        assert_eq!(parsed.token, "");
        assert_eq!(parsed.secret, "");
        assert_eq!(parsed.extra.len(), 0);
    }

    #[test]
    fn parse_token_notfound() {
        let resp_str_sample = "oauth_token_secret=";
        let parsed = read_oauth_token(resp_str_sample.to_string());
        if let Err(TokenReaderError::TokenKeyNotFound(key, resp_str)) = parsed {
            assert_eq!(key, OAUTH_TOKEN_KEY);
            assert_eq!(resp_str, resp_str_sample)
        } else {
            panic!("expected TokenKeyNotFound")
        }
    }

    #[test]
    fn parse_token_secret_notfound() {
        let resp_str_sample = "oauth_token=";
        let parsed = read_oauth_token(resp_str_sample.to_string());
        if let Err(TokenReaderError::TokenKeyNotFound(key, resp_str)) = parsed {
            assert_eq!(key, OAUTH_TOKEN_SECRET_KEY);
            assert_eq!(resp_str, resp_str_sample)
        } else {
            panic!("expected TokenKeyNotFound")
        }
    }
}
