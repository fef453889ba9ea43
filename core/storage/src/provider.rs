//! Remote store capability trait and the resource model it exchanges.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use drivekit_common::Result;

/// MIME type that marks a resource as a folder.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Largest page size the remote service accepts for a list call.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Fields requested when listing folder contents.
pub const LIST_FIELDS: &str = "nextPageToken,files(id,name,md5Checksum,mimeType,size,createdTime,parents)";

/// Fields requested by name lookups.
pub const LOOKUP_FIELDS: &str = "nextPageToken,files(id,name)";

/// Fields returned for a freshly uploaded file.
pub const UPLOAD_FIELDS: &str = "id,name,size,webContentLink";

/// Byte stream type for upload content.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Snapshot of a remote file or folder as reported by the remote service.
///
/// Values are never mutated after they are returned; ask the remote service
/// for a fresh copy instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    /// Opaque identifier assigned by the remote service.
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5_checksum: Option<String>,
    /// Size in bytes, sent by the API as a decimal string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<DateTime<Utc>>,
    /// Parent folder IDs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Public download link (only populated for uploads).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_content_link: Option<String>,
}

impl RemoteFile {
    /// Check if this is a folder.
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    /// Get size as u64.
    pub fn size_bytes(&self) -> Option<u64> {
        self.size.as_ref().and_then(|s| s.parse().ok())
    }
}

/// Metadata for a resource the remote service should create.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewResource {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
}

impl NewResource {
    /// Metadata for a folder named `name`.
    pub fn folder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime_type: Some(FOLDER_MIME_TYPE.to_string()),
            ..Default::default()
        }
    }

    /// Metadata for a regular file named `name`.
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Attach a description; empty descriptions are omitted.
    pub fn with_description(mut self, description: &str) -> Self {
        if !description.is_empty() {
            self.description = Some(description.to_string());
        }
        self
    }

    /// Link the resource under `parent`, if any.
    pub fn with_parent(mut self, parent: Option<&RemoteFile>) -> Self {
        if let Some(parent) = parent {
            self.parents = vec![parent.id.clone()];
        }
        self
    }
}

/// Filter and shape of a single list call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// Only return children of this folder.
    pub parent_id: Option<String>,
    /// Only return resources with exactly this name.
    pub name: Option<String>,
    /// Requested page size; the remote may return fewer.
    pub page_size: u32,
    /// Partial-response field selector.
    pub fields: &'static str,
}

impl ListQuery {
    /// Children of `parent_id` (or everything visible when `None`).
    pub fn children(parent_id: Option<&str>, page_size: u32) -> Self {
        Self {
            parent_id: parent_id.map(str::to_string),
            name: None,
            page_size: page_size.min(MAX_PAGE_SIZE),
            fields: LIST_FIELDS,
        }
    }

    /// Exact-name lookup, optionally scoped to a parent folder.
    pub fn named(name: &str, parent_id: Option<&str>, page_size: u32) -> Self {
        Self {
            parent_id: parent_id.map(str::to_string),
            name: Some(name.to_string()),
            page_size: page_size.min(MAX_PAGE_SIZE),
            fields: LOOKUP_FIELDS,
        }
    }

    /// Render the remote query language form, e.g.
    /// `name='a' and 'folder' in parents`.
    pub fn to_query_string(&self) -> String {
        let mut clauses = Vec::new();
        if let Some(name) = &self.name {
            clauses.push(format!("name='{}'", escape_literal(name)));
        }
        if let Some(parent) = &self.parent_id {
            clauses.push(format!("'{}' in parents", escape_literal(parent)));
        }
        clauses.join(" and ")
    }
}

fn escape_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// One page of list results.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePage {
    #[serde(default)]
    pub files: Vec<RemoteFile>,
    /// Token for the next page; `None` when the listing is exhausted.
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Narrow capability interface over the remote file service.
///
/// The file operations facade only needs these four calls, which keeps it
/// testable against an in-memory implementation.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Get the store name (e.g., "gdrive", "memory").
    fn name(&self) -> &str;

    /// Fetch one page of resources matching `query`.
    ///
    /// `page_token` is the token returned by the previous page, or `None` for
    /// the first page.
    async fn list_page(&self, query: &ListQuery, page_token: Option<&str>) -> Result<FilePage>;

    /// Fetch the full content of a file.
    async fn get_content(&self, id: &str) -> Result<Vec<u8>>;

    /// Create a resource, uploading `content` when given.
    ///
    /// Folders are created without content.
    async fn create_resource(
        &self,
        resource: NewResource,
        content: Option<ByteStream>,
    ) -> Result<RemoteFile>;

    /// Permanently delete a resource.
    async fn delete_resource(&self, id: &str) -> Result<()>;
}
