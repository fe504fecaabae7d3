use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::auth::{self, OAuthNonce};
use crate::error::PipelineError;
use crate::types::PublishReceipt;

/// Media upload endpoint (v1.1; v2 posting references the returned id).
pub const MEDIA_UPLOAD_URL: &str = "https://upload.twitter.com/1.1/media/upload.json";

/// Post creation endpoint.
pub const CREATE_POST_URL: &str = "https://api.twitter.com/2/tweets";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Publishes an image with a caption. Upload and post count as one unit.
pub trait Publisher {
    fn publish(
        &self,
        png: &[u8],
        caption: &str,
    ) -> impl Future<Output = Result<PublishReceipt, PipelineError>> + Send;
}

/// OAuth 1.0a user-context credentials.
#[derive(Clone)]
pub struct XCredentials {
    pub api_key: String,
    pub api_secret: String,
    pub access_token: String,
    pub access_secret: String,
}

impl std::fmt::Debug for XCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XCredentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("access_token", &"<redacted>")
            .field("access_secret", &"<redacted>")
            .finish()
    }
}

/// Caption text with an `{id}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionTemplate(String);

impl CaptionTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn render(&self, item_id: u64) -> String {
        self.0.replace("{id}", &item_id.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct MediaUploadResponse {
    media_id_string: String,
}

#[derive(Debug, Deserialize)]
struct CreatePostResponse {
    data: CreatedPost,
}

#[derive(Debug, Deserialize)]
struct CreatedPost {
    id: String,
}

/// Posts to X/Twitter: media upload, then a post referencing it.
pub struct XPublisher {
    client: reqwest::Client,
    creds: XCredentials,
}

impl XPublisher {
    pub fn new(creds: XCredentials) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self { client, creds })
    }

    fn auth_header(&self, url: &str) -> Result<String, PipelineError> {
        auth::authorization_header(&self.creds, "POST", url, &[], &OAuthNonce::generate())
            .map_err(|e| PipelineError::Publish(format!("signing failed: {e}")))
    }

    async fn upload_media(&self, png: &[u8]) -> Result<String, PipelineError> {
        let part = Part::bytes(png.to_vec())
            .file_name("mint.png")
            .mime_str("image/png")
            .map_err(|e| PipelineError::Publish(e.to_string()))?;
        let form = Form::new().part("media", part);

        let resp = self
            .client
            .post(MEDIA_UPLOAD_URL)
            .header(reqwest::header::AUTHORIZATION, self.auth_header(MEDIA_UPLOAD_URL)?)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PipelineError::Publish(format!("media upload: {e}")))?;
        let body: MediaUploadResponse = read_json(resp, "media upload").await?;
        debug!("uploaded media {}", body.media_id_string);
        Ok(body.media_id_string)
    }

    async fn create_post(&self, caption: &str, media_id: &str) -> Result<String, PipelineError> {
        let resp = self
            .client
            .post(CREATE_POST_URL)
            .header(reqwest::header::AUTHORIZATION, self.auth_header(CREATE_POST_URL)?)
            .json(&post_body(caption, media_id))
            .send()
            .await
            .map_err(|e| PipelineError::Publish(format!("create post: {e}")))?;
        let body: CreatePostResponse = read_json(resp, "create post").await?;
        Ok(body.data.id)
    }
}

impl Publisher for XPublisher {
    async fn publish(&self, png: &[u8], caption: &str) -> Result<PublishReceipt, PipelineError> {
        let media_id = self.upload_media(png).await?;
        let post_id = self.create_post(caption, &media_id).await?;
        info!("Posted {post_id}: {caption}");
        Ok(PublishReceipt {
            media_id: Some(media_id),
            post_id: Some(post_id),
            mock: false,
        })
    }
}

fn post_body(caption: &str, media_id: &str) -> serde_json::Value {
    json!({
        "text": caption,
        "media": { "media_ids": [media_id] },
    })
}

/// Decode a success body, or turn a non-2xx response into a publish error.
async fn read_json<T: for<'de> Deserialize<'de>>(
    resp: reqwest::Response,
    what: &str,
) -> Result<T, PipelineError> {
    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|e| PipelineError::Publish(format!("{what}: reading body: {e}")))?;
    if !status.is_success() {
        let snippet: String = text.chars().take(300).collect();
        return Err(PipelineError::Publish(format!("{what}: HTTP {status}: {snippet}")));
    }
    serde_json::from_str(&text)
        .map_err(|e| PipelineError::Publish(format!("{what}: unexpected response: {e}")))
}

/// Logs the post it would have made. Used when credentials are absent.
#[derive(Debug, Default)]
pub struct MockPublisher;

impl Publisher for MockPublisher {
    async fn publish(&self, png: &[u8], caption: &str) -> Result<PublishReceipt, PipelineError> {
        info!("[MOCK] Post text: {caption}");
        info!("[MOCK] Image size: {} bytes", png.len());
        Ok(PublishReceipt {
            media_id: None,
            post_id: None,
            mock: true,
        })
    }
}

/// The publisher chosen at startup.
pub enum AnyPublisher {
    X(XPublisher),
    Mock(MockPublisher),
}

impl AnyPublisher {
    /// Real publisher when credentials are present and `dry_run` is off, mock otherwise.
    pub fn select(creds: Option<XCredentials>, dry_run: bool) -> Result<Self> {
        match creds {
            Some(creds) if !dry_run => Ok(AnyPublisher::X(XPublisher::new(creds)?)),
            _ => Ok(AnyPublisher::Mock(MockPublisher)),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AnyPublisher::X(_) => "x",
            AnyPublisher::Mock(_) => "mock",
        }
    }
}

impl Publisher for AnyPublisher {
    async fn publish(&self, png: &[u8], caption: &str) -> Result<PublishReceipt, PipelineError> {
        match self {
            AnyPublisher::X(p) => p.publish(png, caption).await,
            AnyPublisher::Mock(p) => p.publish(png, caption).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> XCredentials {
        XCredentials {
            api_key: "k".into(),
            api_secret: "ks".into(),
            access_token: "t".into(),
            access_secret: "ts".into(),
        }
    }

    #[test]
    fn caption_replaces_every_placeholder() {
        let t = CaptionTemplate::new("#{id} minted ({id})");
        assert_eq!(t.render(42), "#42 minted (42)");
    }

    #[test]
    fn caption_without_placeholder_is_verbatim() {
        assert_eq!(CaptionTemplate::new("gm").render(1), "gm");
    }

    #[test]
    fn select_without_credentials_is_mock() {
        assert_eq!(AnyPublisher::select(None, false).unwrap().label(), "mock");
    }

    #[test]
    fn select_dry_run_is_mock() {
        assert_eq!(AnyPublisher::select(Some(creds()), true).unwrap().label(), "mock");
    }

    #[test]
    fn select_with_credentials_is_real() {
        assert_eq!(AnyPublisher::select(Some(creds()), false).unwrap().label(), "x");
    }

    #[test]
    fn debug_redacts_secrets() {
        let dbg = format!("{:?}", creds());
        assert!(dbg.contains("<redacted>"));
        assert!(!dbg.contains("\"ks\""));
    }

    #[test]
    fn post_body_references_media() {
        let body = post_body("New Boun minted! #7", "123");
        assert_eq!(body["text"], "New Boun minted! #7");
        assert_eq!(body["media"]["media_ids"][0], "123");
    }

    #[test]
    fn parses_upload_and_post_responses() {
        let upload: MediaUploadResponse = serde_json::from_str(
            r#"{"media_id":710511363345354753,"media_id_string":"710511363345354753","size":11065,"expires_after_secs":86400}"#,
        )
        .unwrap();
        assert_eq!(upload.media_id_string, "710511363345354753");

        let post: CreatePostResponse =
            serde_json::from_str(r#"{"data":{"id":"1445880548472328192","text":"hi"}}"#).unwrap();
        assert_eq!(post.data.id, "1445880548472328192");
    }

    #[tokio::test]
    async fn mock_publish_returns_mock_receipt() {
        let receipt = MockPublisher.publish(b"png", "caption").await.unwrap();
        assert!(receipt.mock);
        assert!(receipt.post_id.is_none());
    }
}
