//! Percent-encoding and parameter normalization as required by
//! [RFC 5849 section 3.6](https://tools.ietf.org/html/rfc5849#section-3.6).

use std::borrow::Cow;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Every byte except `ALPHA / DIGIT / "-" / "." / "_" / "~"`.
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encodes `raw` leaving only unreserved characters intact.
///
/// Space is always encoded as `%20`, never `+`.
pub fn encode(raw: &str) -> Cow<'_, str> {
    utf8_percent_encode(raw, OAUTH_ENCODE_SET).into()
}

/// Encodes each pair and joins them as `key=value&...`, sorted by encoded key
/// and then by encoded value.
///
/// The result depends only on the set of pairs, never on their input order.
pub fn canonicalize<I, K, V>(params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut encoded = params
        .into_iter()
        .map(|(k, v)| {
            (
                encode(k.as_ref()).into_owned(),
                encode(v.as_ref()).into_owned(),
            )
        })
        .collect::<Vec<(String, String)>>();
    encoded.sort();
    encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<String>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreserved_are_untouched() {
        let raw = "AZaz09-._~";
        assert_eq!(encode(raw), raw);
    }

    #[test]
    fn reserved_are_escaped_uppercase() {
        assert_eq!(
            encode("Ladies + Gentlemen, a signed OAuth request!"),
            "Ladies%20%2B%20Gentlemen%2C%20a%20signed%20OAuth%20request%21"
        );
        assert_eq!(encode("a/b?c=d&e*"), "a%2Fb%3Fc%3Dd%26e%2A");
        assert_eq!(encode("☃"), "%E2%98%83");
    }

    #[test]
    fn encoding_round_trips_through_percent_decoding() {
        let raw: String = (0x20u8..0x7f).map(char::from).chain("少女終末旅行".chars()).collect();
        let encoded = encode(&raw);
        let decoded = percent_encoding::percent_decode_str(&encoded)
            .decode_utf8()
            .unwrap();
        assert_eq!(decoded, raw);
        assert!(encoded
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-._~%".contains(&b)));
    }

    #[test]
    fn canonical_order_ignores_insertion_order() {
        let forward = vec![("b", "2"), ("a", "1"), ("a b", "x"), ("c", "")];
        let mut backward = forward.clone();
        backward.reverse();
        assert_eq!(canonicalize(forward.clone()), canonicalize(backward));
        assert_eq!(canonicalize(forward), "a=1&a%20b=x&b=2&c=");
    }

    #[test]
    fn duplicate_keys_sort_by_value() {
        let params = vec![("a", "z"), ("a", "x y"), ("a", "t")];
        assert_eq!(canonicalize(params), "a=t&a=x%20y&a=z");
    }

    #[test]
    fn sorts_on_encoded_form() {
        // '%' (0x25) sorts before digits and letters once encoded
        let params = vec![("a", "b"), ("!", "c")];
        assert_eq!(canonicalize(params), "%21=c&a=b");
    }
}
