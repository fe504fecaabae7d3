//! OAuth 1.0a request signing (HMAC-SHA1) for the X/Twitter API.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use rand::Rng;
use rand::distributions::Alphanumeric;
use sha1::Sha1;

use crate::publisher::XCredentials;

type HmacSha1 = Hmac<Sha1>;

/// Per-request values that must be fresh for every signature.
#[derive(Debug, Clone)]
pub struct OAuthNonce {
    pub nonce: String,
    pub timestamp: i64,
}

impl OAuthNonce {
    pub fn generate() -> Self {
        let nonce = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        Self {
            nonce,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// RFC 3986 encoding as required by OAuth 1.0a (only unreserved characters pass).
fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Build the `Authorization` header for a request.
///
/// `params` are the query/form parameters that take part in the signature.
/// Multipart and JSON bodies do not, so callers pass an empty slice for those.
pub fn authorization_header(
    creds: &XCredentials,
    method: &str,
    url: &str,
    params: &[(&str, &str)],
    nonce: &OAuthNonce,
) -> Result<String> {
    let timestamp = nonce.timestamp.to_string();
    let mut oauth: BTreeMap<&str, &str> = BTreeMap::new();
    oauth.insert("oauth_consumer_key", &creds.api_key);
    oauth.insert("oauth_nonce", &nonce.nonce);
    oauth.insert("oauth_signature_method", "HMAC-SHA1");
    oauth.insert("oauth_timestamp", &timestamp);
    oauth.insert("oauth_token", &creds.access_token);
    oauth.insert("oauth_version", "1.0");

    let signature = sign(creds, method, url, params, &oauth)?;

    let mut fields: Vec<String> = oauth
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
        .collect();
    fields.push(format!("oauth_signature=\"{}\"", encode(&signature)));
    Ok(format!("OAuth {}", fields.join(", ")))
}

/// Signature base string: `METHOD&url&sorted-params`, each part percent-encoded.
fn signature_base_string(
    method: &str,
    url: &str,
    params: &[(&str, &str)],
    oauth: &BTreeMap<&str, &str>,
) -> String {
    let mut pairs: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (encode(k), encode(v)))
        .chain(oauth.iter().map(|(k, v)| (encode(k), encode(v))))
        .collect();
    pairs.sort();
    let param_string = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        encode(url),
        encode(&param_string)
    )
}

fn sign(
    creds: &XCredentials,
    method: &str,
    url: &str,
    params: &[(&str, &str)],
    oauth: &BTreeMap<&str, &str>,
) -> Result<String> {
    let base = signature_base_string(method, url, params, oauth);
    let key = format!("{}&{}", encode(&creds.api_secret), encode(&creds.access_secret));
    let mut mac = HmacSha1::new_from_slice(key.as_bytes()).context("invalid HMAC key")?;
    mac.update(base.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}
