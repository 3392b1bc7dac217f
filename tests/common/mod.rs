//! Shared fixtures for the mock-server tests.

#![allow(dead_code)]

use std::collections::HashMap;

use percent_encoding::percent_decode_str;
use reqwest::Method;
use twitter_oauth_client::{Client, ClientConfig, Credentials, OAuthParameters, Secrets, Signer};
use url::Url;
use wiremock::{MockServer, Request};

pub const CONSUMER_KEY: &str = "xvz1evFS4wEEPTGEFPHBog";
pub const CONSUMER_SECRET: &str = "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw";
pub const ACCESS_TOKEN: &str = "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb";
pub const ACCESS_TOKEN_SECRET: &str = "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE";

pub fn config(server: &MockServer) -> ClientConfig {
    ClientConfig::new()
        .api_base(&format!("{}/1.1/", server.uri()))
        .unwrap()
        .oauth_base(&server.uri())
        .unwrap()
}

pub fn user_client(server: &MockServer) -> Client {
    Client::user(
        Credentials::new(CONSUMER_KEY, CONSUMER_SECRET)
            .access_token(ACCESS_TOKEN, ACCESS_TOKEN_SECRET),
    )
    .config(config(server))
    .build()
    .unwrap()
}

pub fn pending_user_client(server: &MockServer) -> Client {
    Client::user(Credentials::new(CONSUMER_KEY, CONSUMER_SECRET))
        .config(config(server))
        .build()
        .unwrap()
}

pub fn app_client(server: &MockServer) -> Client {
    Client::application_only(Credentials::new(CONSUMER_KEY, CONSUMER_SECRET))
        .config(config(server))
        .build()
        .unwrap()
}

pub fn header<'a>(request: &'a Request, name: &str) -> &'a str {
    request
        .headers
        .get(name)
        .unwrap_or_else(|| panic!("missing header {}", name))
        .to_str()
        .unwrap()
}

/// Splits an `OAuth k="v", ...` header into decoded fields.
pub fn oauth_fields(authorization: &str) -> HashMap<String, String> {
    authorization
        .strip_prefix("OAuth ")
        .expect("OAuth scheme")
        .split(", ")
        .filter_map(|item| item.split_once('='))
        .map(|(k, v)| {
            (
                k.to_string(),
                percent_decode_str(v.trim_matches('"'))
                    .decode_utf8_lossy()
                    .into_owned(),
            )
        })
        .collect()
}

/// Re-signs a captured request with its own nonce and timestamp.
pub fn expected_signature(
    method: Method,
    url: &str,
    pairs: &[(&str, &str)],
    fields: &HashMap<String, String>,
    token: Option<(&str, &str)>,
) -> String {
    let url = Url::parse(url).unwrap();
    let mut params = OAuthParameters::new()
        .nonce(fields["oauth_nonce"].clone())
        .timestamp(fields["oauth_timestamp"].parse::<u64>().unwrap());
    if let Some(callback) = fields.get("oauth_callback") {
        params = params.callback(callback.clone());
    }
    if let Some(verifier) = fields.get("oauth_verifier") {
        params = params.verifier(verifier.clone());
    }
    let secrets = Secrets::new(CONSUMER_KEY, CONSUMER_SECRET);
    let ctx = match token {
        Some((token, secret)) => {
            let secrets = secrets.token(token, secret);
            Signer::new(&secrets, params).sign(&method, &url, pairs)
        }
        None => Signer::new(&secrets, params).sign(&method, &url, pairs),
    };
    ctx.unwrap().signature().to_string()
}
