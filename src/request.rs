use std::collections::BTreeMap;

use bytes::Bytes;
use http::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    Method,
};
use reqwest::{multipart, Client as ReqwestClient, RequestBuilder as ReqwestRequestBuilder};
use url::Url;

use crate::encoding::canonicalize;
use crate::{ConfigError, Result};

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// A binary multipart part. Never covered by the OAuth signature.
#[derive(Debug, Clone)]
pub struct MediaPart {
    name: String,
    content_type: String,
    file_name: Option<String>,
    bytes: Bytes,
}

impl MediaPart {
    pub fn new<N, C, B>(name: N, content_type: C, bytes: B) -> Self
    where
        N: Into<String>,
        C: Into<String>,
        B: Into<Bytes>,
    {
        MediaPart {
            name: name.into(),
            content_type: content_type.into(),
            file_name: None,
            bytes: bytes.into(),
        }
    }

    pub fn file_name<T: Into<String>>(self, file_name: T) -> Self {
        MediaPart {
            file_name: Some(file_name.into()),
            ..self
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    fn into_part(self) -> Result<multipart::Part> {
        let content_type = self.content_type;
        let part = multipart::Part::bytes(self.bytes.to_vec())
            .mime_str(&content_type)
            .map_err(|_| ConfigError::InvalidMediaType(content_type.clone()))?;
        Ok(match self.file_name {
            Some(file_name) => part.file_name(file_name),
            None => part,
        })
    }
}

/// One call against a resource path: verb, parameters and optional media.
///
/// Parameters are kept in a map, so a key never carries two values.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    path: String,
    parameters: BTreeMap<String, String>,
    media: Vec<MediaPart>,
}

impl RequestDescriptor {
    pub fn new<P: Into<String>>(method: Method, path: P) -> Self {
        RequestDescriptor {
            method,
            path: path.into(),
            parameters: BTreeMap::new(),
            media: Vec::new(),
        }
    }

    pub fn get<P: Into<String>>(path: P) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post<P: Into<String>>(path: P) -> Self {
        Self::new(Method::POST, path)
    }

    /// Adds a parameter, replacing any earlier value under the same key.
    pub fn parameter<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn parameters<I, K, V>(self, parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        parameters
            .into_iter()
            .fold(self, |req, (k, v)| req.parameter(k, v))
    }

    pub fn media(mut self, part: MediaPart) -> Self {
        self.media.push(part);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn parameter_map(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    pub fn is_multipart(&self) -> bool {
        !self.media.is_empty()
    }

    /// The pairs covered by the OAuth signature. Media parts are excluded.
    pub(crate) fn signed_pairs(&self) -> Vec<(&str, &str)> {
        self.parameters
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.is_multipart() && self.method != Method::POST {
            return Err(ConfigError::MediaRequiresPost.into());
        }
        Ok(())
    }

    /// Builds the transport request: query string for GET, urlencoded body
    /// for a plain POST, `multipart/form-data` when media is attached.
    pub(crate) fn into_builder(
        self,
        client: &ReqwestClient,
        mut url: Url,
        authorization: String,
    ) -> Result<ReqwestRequestBuilder> {
        if self.method == Method::GET {
            // a query written into the path is signed too, so it must be sent
            let mut pairs = url.query_pairs().into_owned().collect::<Vec<(String, String)>>();
            pairs.extend(self.parameters);
            let encoded = canonicalize(pairs);
            url.set_query(if encoded.is_empty() { None } else { Some(encoded.as_str()) });
            return Ok(client
                .request(self.method, url)
                .header(AUTHORIZATION, authorization));
        }

        let encoded = canonicalize(&self.parameters);
        let builder = client
            .request(self.method, url)
            .header(AUTHORIZATION, authorization);
        if self.media.is_empty() {
            return Ok(builder.header(CONTENT_TYPE, FORM_URLENCODED).body(encoded));
        }

        let mut form = multipart::Form::new();
        for (key, value) in self.parameters {
            form = form.text(key, value);
        }
        for part in self.media {
            let name = part.name.clone();
            form = form.part(name, part.into_part()?);
        }
        Ok(builder.multipart(form))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(req: RequestDescriptor, url: &str) -> reqwest::Request {
        req.into_builder(
            &ReqwestClient::new(),
            Url::parse(url).unwrap(),
            "OAuth test".to_string(),
        )
        .unwrap()
        .build()
        .unwrap()
    }

    #[test]
    fn later_value_replaces_earlier() {
        let req = RequestDescriptor::get("statuses/show.json")
            .parameter("id", "1")
            .parameter("id", "2");
        assert_eq!(req.signed_pairs(), vec![("id", "2")]);
    }

    #[test]
    fn get_parameters_go_to_query() {
        let req = RequestDescriptor::get("search/tweets.json")
            .parameters(vec![("q", "rust lang"), ("count", "5")]);
        let built = build(req, "https://api.twitter.com/1.1/search/tweets.json");
        assert_eq!(built.url().query(), Some("count=5&q=rust%20lang"));
        assert!(built.body().is_none());
        assert_eq!(built.headers()[AUTHORIZATION], "OAuth test");
    }

    #[test]
    fn query_in_path_is_kept_alongside_parameters() {
        let req = RequestDescriptor::get("search/tweets.json?q=rust").parameter("count", "5");
        let built = build(req, "https://api.twitter.com/1.1/search/tweets.json?q=rust");
        assert_eq!(built.url().query(), Some("count=5&q=rust"));
    }

    #[test]
    fn post_parameters_go_to_form_body() {
        let req = RequestDescriptor::post("statuses/update.json")
            .parameter("status", "Hello Ladies + Gentlemen, a signed OAuth request!");
        let built = build(req, "https://api.twitter.com/1.1/statuses/update.json");
        assert_eq!(built.url().query(), None);
        assert_eq!(built.headers()[CONTENT_TYPE], FORM_URLENCODED);
        assert_eq!(
            built.body().and_then(|b| b.as_bytes()),
            Some(&b"status=Hello%20Ladies%20%2B%20Gentlemen%2C%20a%20signed%20OAuth%20request%21"[..])
        );
    }

    #[test]
    fn media_is_excluded_from_signed_pairs() {
        let req = RequestDescriptor::post("statuses/update_with_media.json")
            .parameter("status", "hello")
            .media(MediaPart::new("media[]", "image/jpeg", vec![0xffu8, 0xd8, 0xff]));
        assert!(req.is_multipart());
        assert_eq!(req.signed_pairs(), vec![("status", "hello")]);

        let built = build(req, "https://api.twitter.com/1.1/statuses/update_with_media.json");
        let content_type = built.headers()[CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("multipart/form-data; boundary="));
    }

    #[test]
    fn media_on_get_is_rejected() {
        let req = RequestDescriptor::get("statuses/show.json")
            .media(MediaPart::new("media", "image/png", Bytes::from_static(b"png")));
        assert!(matches!(
            req.validate(),
            Err(crate::Error::Configuration(ConfigError::MediaRequiresPost))
        ));
    }

    #[test]
    fn invalid_content_type_is_rejected() {
        let req = RequestDescriptor::post("statuses/update_with_media.json")
            .media(MediaPart::new("media", "not a mime type", Bytes::from_static(b"x")));
        let result = req.into_builder(
            &ReqwestClient::new(),
            Url::parse("https://api.twitter.com/1.1/statuses/update_with_media.json").unwrap(),
            "OAuth test".to_string(),
        );
        assert!(matches!(
            result,
            Err(crate::Error::Configuration(ConfigError::InvalidMediaType(_)))
        ));
    }
}
