use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use thiserror::Error;

use crate::models::{ImageUpload, ProgramImage};

#[derive(Error, Debug)]
pub enum BlobError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Blob store rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Unexpected blob store response: {0}")]
    Unexpected(String),
}

/// Object storage for program images.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, image: &ImageUpload, folder: &str) -> Result<ProgramImage, BlobError>;
    async fn delete(&self, public_id: &str) -> Result<(), BlobError>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

pub struct CloudinaryClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

impl CloudinaryClient {
    pub fn new(cloud_name: &str, api_key: String, api_secret: String) -> Self {
        Self::with_base_url(
            format!("https://api.cloudinary.com/v1_1/{}", cloud_name),
            api_key,
            api_secret,
        )
    }

    /// Points the client at another API root, e.g. a regional endpoint.
    pub fn with_base_url(base_url: impl Into<String>, api_key: String, api_secret: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            api_secret,
        }
    }

    /// Signs request parameters: sorted `k=v` pairs joined by `&`, secret appended, SHA-1 hex.
    fn sign(&self, params: &[(&str, String)]) -> String {
        sign_params(params, &self.api_secret)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BlobError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await?;
        Err(BlobError::Rejected { status, body })
    }
}

pub(crate) fn sign_params(params: &[(&str, String)], secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by_key(|(key, _)| *key);
    let joined = sorted
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha1::new();
    hasher.update(joined.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl BlobStore for CloudinaryClient {
    async fn upload(&self, image: &ImageUpload, folder: &str) -> Result<ProgramImage, BlobError> {
        let url = format!("{}/image/upload", self.base_url);
        let timestamp = Utc::now().timestamp().to_string();
        let signature = self.sign(&[
            ("folder", folder.to_string()),
            ("timestamp", timestamp.clone()),
        ]);

        let mut part = Part::bytes(image.data.clone()).file_name(image.file_name.clone());
        if let Some(content_type) = &image.content_type {
            part = part.mime_str(content_type)?;
        }

        let form = Form::new()
            .text("folder", folder.to_string())
            .text("timestamp", timestamp)
            .text("api_key", self.api_key.clone())
            .text("signature", signature)
            .part("file", part);

        tracing::debug!("Uploading {} ({} bytes) to {}", image.file_name, image.data.len(), folder);
        let response = self.client.post(&url).multipart(form).send().await?;
        let uploaded: UploadResponse = Self::check_status(response).await?.json().await?;

        Ok(ProgramImage {
            public_id: uploaded.public_id,
            url: uploaded.secure_url,
        })
    }

    async fn delete(&self, public_id: &str) -> Result<(), BlobError> {
        let url = format!("{}/image/destroy", self.base_url);
        let timestamp = Utc::now().timestamp().to_string();
        let signature = self.sign(&[
            ("public_id", public_id.to_string()),
            ("timestamp", timestamp.clone()),
        ]);

        let form = [
            ("public_id", public_id.to_string()),
            ("timestamp", timestamp),
            ("api_key", self.api_key.clone()),
            ("signature", signature),
        ];

        let response = self.client.post(&url).form(&form).send().await?;
        let destroyed: DestroyResponse = Self::check_status(response).await?.json().await?;

        match destroyed.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(BlobError::Unexpected(format!(
                "destroy of {} returned '{}'",
                public_id, other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_ignores_parameter_order() {
        let a = sign_params(
            &[("timestamp", "1315060510".into()), ("public_id", "sample_image".into())],
            "abcd",
        );
        let b = sign_params(
            &[("public_id", "sample_image".into()), ("timestamp", "1315060510".into())],
            "abcd",
        );
        assert_eq!(a, b);
        assert_eq!(a.len(), 40);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn signature_is_sha1_of_sorted_query_and_secret() {
        let expected = hex::encode(Sha1::digest(b"folder=site/programs&timestamp=42secret"));
        let actual = sign_params(
            &[("timestamp", "42".into()), ("folder", "site/programs".into())],
            "secret",
        );
        assert_eq!(actual, expected);
    }

    #[test]
    fn signature_depends_on_secret() {
        let params = [("timestamp", "42".to_string())];
        assert_ne!(sign_params(&params, "one"), sign_params(&params, "two"));
    }

    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> CloudinaryClient {
        CloudinaryClient::with_base_url(server.uri(), "key".into(), "secret".into())
    }

    fn image() -> ImageUpload {
        ImageUpload {
            file_name: "main.png".into(),
            content_type: Some("image/png".into()),
            data: b"\x89PNG".to_vec(),
        }
    }

    async fn mount_destroy(server: &MockServer, result: &str) {
        Mock::given(method("POST"))
            .and(path("/image/destroy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": result })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn upload_returns_public_id_and_secure_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/image/upload"))
            .and(body_string_contains("plantbased/programs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "public_id": "plantbased/programs/abc123",
                "secure_url": "https://res.cloudinary.com/demo/image/upload/abc123.png",
                "url": "http://res.cloudinary.com/demo/image/upload/abc123.png"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let stored = client(&server).upload(&image(), "plantbased/programs").await.unwrap();
        assert_eq!(stored.public_id, "plantbased/programs/abc123");
        assert_eq!(stored.url, "https://res.cloudinary.com/demo/image/upload/abc123.png");
    }

    #[tokio::test]
    async fn non_success_status_is_rejected_with_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/image/upload"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid Signature"))
            .mount(&server)
            .await;

        match client(&server).upload(&image(), "plantbased/programs").await {
            Err(BlobError::Rejected { status, body }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "Invalid Signature");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn destroy_accepts_ok_and_not_found() {
        let server = MockServer::start().await;
        mount_destroy(&server, "ok").await;
        client(&server).delete("plantbased/programs/abc123").await.unwrap();

        let server = MockServer::start().await;
        mount_destroy(&server, "not found").await;
        client(&server).delete("plantbased/programs/gone").await.unwrap();
    }

    #[tokio::test]
    async fn destroy_with_other_result_is_unexpected() {
        let server = MockServer::start().await;
        mount_destroy(&server, "error").await;
        match client(&server).delete("plantbased/programs/abc123").await {
            Err(BlobError::Unexpected(msg)) => assert!(msg.contains("'error'")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
