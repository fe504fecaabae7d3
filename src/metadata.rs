//! Decoding of on-chain token metadata.
//!
//! Fully on-chain collections return `tokenURI` as a `data:` URI wrapping a
//! JSON document whose `image` field is itself a `data:` URI holding the SVG.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

const JSON_BASE64_PREFIX: &str = "data:application/json;base64,";
const JSON_UTF8_PREFIX: &str = "data:application/json;utf8,";
const JSON_URL_PREFIX: &str = "data:application/json,";

const SVG_BASE64_PREFIX: &str = "data:image/svg+xml;base64,";
const SVG_UTF8_PREFIX: &str = "data:image/svg+xml;utf8,";
const SVG_URL_PREFIX: &str = "data:image/svg+xml,";

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("token uri is empty")]
    Empty,
    #[error("invalid base64 in {part}: {source}")]
    Base64 {
        part: &'static str,
        #[source]
        source: base64::DecodeError,
    },
    #[error("invalid percent-encoding in {0}")]
    PercentEncoding(&'static str),
    #[error("metadata is not utf-8")]
    NotUtf8,
    #[error("metadata is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("metadata has no image field")]
    MissingImage,
    #[error("image is not an svg data uri (starts with {0:?})")]
    UnsupportedImage(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// Decode a `tokenURI` result into the metadata JSON document.
pub fn decode_metadata(token_uri: &str) -> Result<TokenMetadata, MetadataError> {
    let uri = token_uri.trim();
    if uri.is_empty() {
        return Err(MetadataError::Empty);
    }

    let json = if let Some(payload) = uri.strip_prefix(JSON_BASE64_PREFIX) {
        decode_base64_text(payload, "metadata")?
    } else if let Some(payload) = uri.strip_prefix(JSON_UTF8_PREFIX) {
        payload.to_string()
    } else if let Some(payload) = uri.strip_prefix(JSON_URL_PREFIX) {
        urlencoding::decode(payload)
            .map_err(|_| MetadataError::PercentEncoding("metadata"))?
            .into_owned()
    } else if uri.starts_with('{') {
        uri.to_string()
    } else {
        decode_base64_text(uri, "metadata")?
    };

    Ok(serde_json::from_str(&json)?)
}

/// Extract the raw SVG bytes from a decoded metadata document.
pub fn extract_svg(metadata: &TokenMetadata) -> Result<Vec<u8>, MetadataError> {
    let image = metadata
        .image
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(MetadataError::MissingImage)?;

    if let Some(payload) = image.strip_prefix(SVG_BASE64_PREFIX) {
        BASE64
            .decode(payload)
            .map_err(|source| MetadataError::Base64 {
                part: "image",
                source,
            })
    } else if let Some(payload) = image.strip_prefix(SVG_UTF8_PREFIX) {
        Ok(payload.as_bytes().to_vec())
    } else if let Some(payload) = image.strip_prefix(SVG_URL_PREFIX) {
        Ok(urlencoding::decode_binary(payload.as_bytes()).into_owned())
    } else if image.starts_with("<svg") || image.starts_with("<?xml") {
        Ok(image.as_bytes().to_vec())
    } else {
        let head: String = image.chars().take(24).collect();
        Err(MetadataError::UnsupportedImage(head))
    }
}

/// `tokenURI` → SVG bytes.
pub fn svg_from_token_uri(token_uri: &str) -> Result<Vec<u8>, MetadataError> {
    let metadata = decode_metadata(token_uri)?;
    if let Some(name) = &metadata.name {
        debug!("token metadata: {name}");
    }
    extract_svg(&metadata)
}

fn decode_base64_text(payload: &str, part: &'static str) -> Result<String, MetadataError> {
    let bytes = BASE64
        .decode(payload)
        .map_err(|source| MetadataError::Base64 { part, source })?;
    String::from_utf8(bytes).map_err(|_| MetadataError::NotUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="2" height="2"><rect width="2" height="2" fill="red"/></svg>"#;

    fn svg_data_uri() -> String {
        format!("{SVG_BASE64_PREFIX}{}", BASE64.encode(SVG))
    }

    fn token_uri(image: serde_json::Value) -> String {
        let doc = json!({ "name": "Boun 7", "description": "on-chain", "image": image });
        format!("{JSON_BASE64_PREFIX}{}", BASE64.encode(doc.to_string()))
    }

    #[test]
    fn decodes_nested_base64() {
        let svg = svg_from_token_uri(&token_uri(json!(svg_data_uri()))).unwrap();
        assert_eq!(svg, SVG.as_bytes());
    }

    #[test]
    fn keeps_metadata_fields() {
        let meta = decode_metadata(&token_uri(json!(svg_data_uri()))).unwrap();
        assert_eq!(meta.name.as_deref(), Some("Boun 7"));
    }

    #[test]
    fn accepts_plain_json_uri() {
        let doc = json!({ "image": format!("{SVG_UTF8_PREFIX}{SVG}") });
        let uri = format!("{JSON_UTF8_PREFIX}{doc}");
        assert_eq!(svg_from_token_uri(&uri).unwrap(), SVG.as_bytes());
    }

    #[test]
    fn accepts_percent_encoded_svg() {
        let doc = json!({ "image": "data:image/svg+xml,%3Csvg%3E%3C%2Fsvg%3E" });
        let svg = svg_from_token_uri(&doc.to_string()).unwrap();
        assert_eq!(svg, b"<svg></svg>");
    }

    #[test]
    fn accepts_bare_base64_json() {
        let doc = json!({ "image": svg_data_uri() });
        let uri = BASE64.encode(doc.to_string());
        assert_eq!(svg_from_token_uri(&uri).unwrap(), SVG.as_bytes());
    }

    #[test]
    fn empty_uri_fails() {
        assert!(matches!(svg_from_token_uri("  "), Err(MetadataError::Empty)));
    }

    #[test]
    fn missing_image_fails() {
        let uri = format!("{JSON_BASE64_PREFIX}{}", BASE64.encode(r#"{"name":"x"}"#));
        assert!(matches!(
            svg_from_token_uri(&uri),
            Err(MetadataError::MissingImage)
        ));
    }

    #[test]
    fn malformed_base64_fails() {
        let uri = format!("{JSON_BASE64_PREFIX}not*base64");
        assert!(matches!(
            svg_from_token_uri(&uri),
            Err(MetadataError::Base64 { part: "metadata", .. })
        ));
    }

    #[test]
    fn malformed_json_fails() {
        let uri = format!("{JSON_BASE64_PREFIX}{}", BASE64.encode("{not json"));
        assert!(matches!(svg_from_token_uri(&uri), Err(MetadataError::Json(_))));
    }

    #[test]
    fn http_image_is_unsupported() {
        let uri = token_uri(json!("ipfs://bafy/7.png"));
        assert!(matches!(
            svg_from_token_uri(&uri),
            Err(MetadataError::UnsupportedImage(_))
        ));
    }
}
