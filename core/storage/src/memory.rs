//! In-memory remote store for testing.

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use md5::{Digest, Md5};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use drivekit_common::{Error, Result};

use crate::provider::{
    ByteStream, FilePage, ListQuery, NewResource, RemoteFile, RemoteStore, MAX_PAGE_SIZE,
};

#[derive(Debug, Clone)]
struct Entry {
    file: RemoteFile,
    content: Vec<u8>,
}

/// In-memory remote store.
///
/// Keeps resources in insertion order and pages through them the way the
/// remote service does, including a server-side page size cap. Every trait
/// call is counted so tests can assert that validation failures never reach
/// the store.
pub struct MemoryStore {
    entries: RwLock<Vec<Entry>>,
    page_limit: u32,
    calls: AtomicUsize,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            page_limit: MAX_PAGE_SIZE,
            calls: AtomicUsize::new(0),
        }
    }

    /// Cap every page at `limit` entries regardless of the requested size.
    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = limit.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Number of trait calls served so far.
    pub fn remote_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of stored resources.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Check if the store holds no resources.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Insert a resource directly, bypassing the call counter.
    pub fn insert(&self, resource: NewResource, content: Vec<u8>) -> Result<RemoteFile> {
        let mut entries = self.write();

        for parent in &resource.parents {
            match entries.iter().find(|e| &e.file.id == parent) {
                Some(e) if e.file.is_folder() => {}
                Some(_) => {
                    return Err(Error::InvalidInput(format!("Parent is not a folder: {}", parent)));
                }
                None => return Err(Error::NotFound(format!("Parent not found: {}", parent))),
            }
        }

        let is_folder = resource
            .mime_type
            .as_deref()
            .is_some_and(|m| m == crate::provider::FOLDER_MIME_TYPE);
        let id = Uuid::new_v4().simple().to_string();

        let file = RemoteFile {
            web_content_link: (!is_folder)
                .then(|| format!("memory://{}?export=download", id)),
            id,
            name: resource.name,
            mime_type: resource
                .mime_type
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            md5_checksum: (!is_folder).then(|| hex::encode(Md5::digest(&content))),
            size: (!is_folder).then(|| content.len().to_string()),
            created_time: Some(Utc::now()),
            parents: resource.parents,
            description: resource.description,
        };

        entries.push(Entry {
            file: file.clone(),
            content,
        });

        Ok(file)
    }

    fn count_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Entry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Entry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn matches(query: &ListQuery, file: &RemoteFile) -> bool {
    if let Some(parent) = &query.parent_id {
        if !file.parents.iter().any(|p| p == parent) {
            return false;
        }
    }
    if let Some(name) = &query.name {
        if &file.name != name {
            return false;
        }
    }
    true
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_page(&self, query: &ListQuery, page_token: Option<&str>) -> Result<FilePage> {
        self.count_call();

        let offset = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| Error::InvalidInput(format!("Invalid page token: {}", token)))?,
            None => 0,
        };

        let page_size = match query.page_size {
            0 => self.page_limit,
            n => n.min(self.page_limit),
        };
        let page_size = page_size as usize;

        let entries = self.read();
        let matching: Vec<&Entry> = entries.iter().filter(|e| matches(query, &e.file)).collect();

        let files: Vec<RemoteFile> = matching
            .iter()
            .skip(offset)
            .take(page_size)
            .map(|e| e.file.clone())
            .collect();

        let next = offset + files.len();
        let next_page_token = (next < matching.len()).then(|| next.to_string());

        Ok(FilePage {
            files,
            next_page_token,
        })
    }

    async fn get_content(&self, id: &str) -> Result<Vec<u8>> {
        self.count_call();

        let entries = self.read();
        match entries.iter().find(|e| e.file.id == id) {
            Some(e) if e.file.is_folder() => {
                Err(Error::InvalidInput("Cannot download a folder".to_string()))
            }
            Some(e) => Ok(e.content.clone()),
            None => Err(Error::NotFound(format!("File not found: {}", id))),
        }
    }

    async fn create_resource(
        &self,
        resource: NewResource,
        content: Option<ByteStream>,
    ) -> Result<RemoteFile> {
        self.count_call();

        let mut data = Vec::new();
        if let Some(mut stream) = content {
            while let Some(chunk) = stream.next().await {
                data.extend_from_slice(&chunk?);
            }
        }

        self.insert(resource, data)
    }

    async fn delete_resource(&self, id: &str) -> Result<()> {
        self.count_call();

        let mut entries = self.write();
        if !entries.iter().any(|e| e.file.id == id) {
            return Err(Error::NotFound(format!("File not found: {}", id)));
        }

        // Deleting a folder removes everything beneath it.
        let mut doomed = vec![id.to_string()];
        let mut i = 0;
        while i < doomed.len() {
            let current = doomed[i].clone();
            doomed.extend(
                entries
                    .iter()
                    .filter(|e| e.file.parents.contains(&current))
                    .map(|e| e.file.id.clone()),
            );
            i += 1;
        }

        entries.retain(|e| !doomed.contains(&e.file.id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn seed(store: &MemoryStore, parent: Option<&RemoteFile>, count: usize) {
        for i in 0..count {
            store
                .insert(
                    NewResource::file(format!("file-{}", i)).with_parent(parent),
                    vec![i as u8],
                )
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_list_page_follows_tokens() {
        let store = MemoryStore::new();
        seed(&store, None, 5);

        let query = ListQuery::children(None, 2);
        let first = store.list_page(&query, None).await.unwrap();
        assert_eq!(first.files.len(), 2);
        let token = first.next_page_token.unwrap();

        let second = store.list_page(&query, Some(&token)).await.unwrap();
        assert_eq!(second.files[0].name, "file-2");

        let third = store
            .list_page(&query, second.next_page_token.as_deref())
            .await
            .unwrap();
        assert_eq!(third.files.len(), 1);
        assert!(third.next_page_token.is_none());
        assert_eq!(store.remote_calls(), 3);
    }

    #[tokio::test]
    async fn test_page_limit_caps_requested_size() {
        let store = MemoryStore::new().with_page_limit(3);
        seed(&store, None, 10);

        let page = store
            .list_page(&ListQuery::children(None, 100), None)
            .await
            .unwrap();
        assert_eq!(page.files.len(), 3);
        assert_eq!(page.next_page_token.as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_invalid_page_token() {
        let store = MemoryStore::new();
        let result = store
            .list_page(&ListQuery::children(None, 10), Some("garbage"))
            .await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_list_filters_by_parent_and_name() {
        let store = MemoryStore::new();
        let folder = store.insert(NewResource::folder("dir"), vec![]).unwrap();
        seed(&store, Some(&folder), 3);
        seed(&store, None, 2);

        let children = store
            .list_page(&ListQuery::children(Some(&folder.id), 100), None)
            .await
            .unwrap();
        assert_eq!(children.files.len(), 3);

        let named = store
            .list_page(&ListQuery::named("file-1", None, 10), None)
            .await
            .unwrap();
        assert_eq!(named.files.len(), 2);
    }

    #[tokio::test]
    async fn test_create_collects_stream() {
        let store = MemoryStore::new();
        let content: ByteStream = Box::pin(stream::iter(vec![
            Ok::<_, Error>(b"hello ".to_vec()),
            Ok(b"world".to_vec()),
        ]));

        let file = store
            .create_resource(NewResource::file("greeting.txt"), Some(content))
            .await
            .unwrap();

        assert_eq!(file.size_bytes(), Some(11));
        assert_eq!(
            file.md5_checksum.as_deref(),
            Some("5eb63bbbe01eeed093cb22bb8f5acdc3")
        );
        assert!(file.web_content_link.is_some());
        assert_eq!(store.get_content(&file.id).await.unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_create_under_missing_parent() {
        let store = MemoryStore::new();
        let mut resource = NewResource::file("orphan");
        resource.parents = vec!["nope".to_string()];

        let result = store.create_resource(resource, None).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_folder_removes_descendants() {
        let store = MemoryStore::new();
        let top = store.insert(NewResource::folder("top"), vec![]).unwrap();
        let nested = store
            .insert(NewResource::folder("nested").with_parent(Some(&top)), vec![])
            .unwrap();
        seed(&store, Some(&nested), 2);
        seed(&store, None, 1);
        assert_eq!(store.len(), 5);

        store.delete_resource(&top.id).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_resources() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.get_content("missing").await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            store.delete_resource("missing").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_folder_has_no_content() {
        let store = MemoryStore::new();
        let folder = store.insert(NewResource::folder("dir"), vec![]).unwrap();
        assert!(folder.is_folder());
        assert!(folder.size.is_none());
        assert!(folder.md5_checksum.is_none());
        assert!(matches!(
            store.get_content(&folder.id).await,
            Err(Error::InvalidInput(_))
        ));
    }
}
