//! Google Drive API client.

use async_trait::async_trait;
use futures::{stream, StreamExt};
use reqwest::{header, Body, Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use drivekit_common::{Error, Result};

use super::auth::TokenManager;
use super::config::DriveConfig;
use crate::provider::{ByteStream, FilePage, ListQuery, NewResource, RemoteFile, RemoteStore, UPLOAD_FIELDS};

/// Fields returned for a freshly created folder.
const CREATE_FIELDS: &str = "id,name,mimeType,description,createdTime,parents";

/// Bytes inspected when detecting an upload's media type.
const SNIFF_LEN: usize = 512;

/// Google Drive API client.
///
/// Safe to reuse for any number of sequential calls.
pub struct DriveClient {
    http: Client,
    token_manager: Arc<TokenManager>,
    api_base: String,
    upload_base: String,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

impl DriveClient {
    /// Create a new Drive client using the endpoints from `config`.
    pub fn new(token_manager: Arc<TokenManager>, config: &DriveConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("drivekit/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            token_manager,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            upload_base: config.upload_base.trim_end_matches('/').to_string(),
        })
    }

    /// The token manager backing this client.
    pub fn token_manager(&self) -> &Arc<TokenManager> {
        &self.token_manager
    }

    async fn auth_header(&self) -> Result<String> {
        self.token_manager.authorization().await
    }

    async fn create_folder(&self, resource: &NewResource) -> Result<RemoteFile> {
        let url = format!("{}/files", self.api_base);
        let auth = self.auth_header().await?;

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, auth)
            .query(&[("fields", CREATE_FIELDS)])
            .json(resource)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to create resource: {}", e)))?;

        handle_response(response).await
    }

    /// Multipart upload: JSON metadata part followed by the streamed content.
    ///
    /// The media part's type is detected from the first content chunk.
    async fn upload_multipart(&self, resource: &NewResource, mut content: ByteStream) -> Result<RemoteFile> {
        let url = format!("{}/files", self.upload_base);
        let auth = self.auth_header().await?;

        let first = content.next().await.transpose()?;
        let media_type = match &resource.mime_type {
            Some(mime) => mime.clone(),
            None => detect_media_type(&resource.name, first.as_deref().unwrap_or(&[])),
        };
        debug!(name = %resource.name, media_type = %media_type, "Uploading file");

        let metadata = serde_json::to_string(resource)?;
        let boundary = format!("drivekit-{}", Uuid::new_v4().simple());

        let head = format!(
            "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{m}\r\n--{b}\r\nContent-Type: {t}\r\n\r\n",
            b = boundary,
            m = metadata,
            t = media_type
        );
        let tail = format!("\r\n--{}--\r\n", boundary);

        let body = stream::once(async move { Ok::<_, Error>(head.into_bytes()) })
            .chain(stream::iter(first.map(Ok)))
            .chain(content)
            .chain(stream::once(async move { Ok(tail.into_bytes()) }));

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, auth)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .query(&[("uploadType", "multipart"), ("fields", UPLOAD_FIELDS)])
            .body(Body::wrap_stream(body))
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to upload file: {}", e)))?;

        handle_response(response).await
    }
}

#[async_trait]
impl RemoteStore for DriveClient {
    fn name(&self) -> &str {
        "gdrive"
    }

    async fn list_page(&self, query: &ListQuery, page_token: Option<&str>) -> Result<FilePage> {
        let url = format!("{}/files", self.api_base);
        let auth = self.auth_header().await?;

        let page_size = query.page_size.to_string();
        let q = query.to_query_string();

        let mut request = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, auth)
            .query(&[("fields", query.fields), ("pageSize", page_size.as_str())]);

        if !q.is_empty() {
            request = request.query(&[("q", q.as_str())]);
        }
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        debug!(q = %q, page_size = query.page_size, "Listing files");

        let response = request
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to list files: {}", e)))?;

        handle_response(response).await
    }

    async fn get_content(&self, id: &str) -> Result<Vec<u8>> {
        let url = format!("{}/files/{}", self.api_base, id);
        let auth = self.auth_header().await?;

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, auth)
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to download file: {}", e)))?;

        let response = check_status(response).await?;

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| Error::Network(format!("Failed to read download response: {}", e)))
    }

    async fn create_resource(
        &self,
        resource: NewResource,
        content: Option<ByteStream>,
    ) -> Result<RemoteFile> {
        match content {
            Some(content) => self.upload_multipart(&resource, content).await,
            None => self.create_folder(&resource).await,
        }
    }

    async fn delete_resource(&self, id: &str) -> Result<()> {
        let url = format!("{}/files/{}", self.api_base, id);
        let auth = self.auth_header().await?;

        let response = self
            .http
            .delete(&url)
            .header(header::AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to delete file: {}", e)))?;

        check_status(response).await?;
        Ok(())
    }
}

/// Pick a media type for uploaded content.
///
/// Magic bytes win, then the file name's extension. Anything else is plain
/// text when it decodes as UTF-8 and opaque bytes otherwise.
fn detect_media_type(name: &str, head: &[u8]) -> String {
    let head = &head[..head.len().min(SNIFF_LEN)];

    if let Some(kind) = infer::get(head) {
        return kind.mime_type().to_string();
    }
    if let Some(mime) = mime_guess::from_path(name).first() {
        return mime.essence_str().to_string();
    }
    // A character cut off at the sniff boundary still counts as text.
    let is_text = match std::str::from_utf8(head) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    };
    if !head.is_empty() && is_text {
        return "text/plain; charset=utf-8".to_string();
    }
    "application/octet-stream".to_string()
}

/// Check the status and decode a JSON body.
async fn handle_response<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    check_status(response)
        .await?
        .json()
        .await
        .map_err(|e| Error::Network(format!("Failed to parse response: {}", e)))
}

/// Map non-success statuses onto error variants.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|b| b.error.message)
        .unwrap_or(body);

    Err(match status {
        StatusCode::NOT_FOUND => Error::NotFound(message),
        StatusCode::UNAUTHORIZED => Error::Authentication(format!("Invalid or expired token: {}", message)),
        StatusCode::FORBIDDEN => Error::PermissionDenied(message),
        _ => Error::Network(format!("API error: {} - {}", status, message)),
    })
}
