//! File operations facade over a [`RemoteStore`].
//!
//! Each operation validates its arguments, then issues a single remote call
//! (or a sequential page loop for listings). Nothing is retried or cached.

use tracing::debug;

use drivekit_common::{require_name, Error, ResourceId, Result};

use crate::provider::{ByteStream, ListQuery, NewResource, RemoteFile, RemoteStore, MAX_PAGE_SIZE};

/// Page size used for name lookups.
const LOOKUP_PAGE_SIZE: u32 = 10;

/// File operations on an explicitly owned remote store handle.
pub struct DriveFiles<S> {
    store: S,
}

impl<S: RemoteStore> DriveFiles<S> {
    /// Wrap a remote store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Borrow the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Release the underlying store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// List files, optionally under `parent`, stopping once at least
    /// `max_files` have been collected.
    ///
    /// Paging stops at the first page boundary that reaches `max_files`; the
    /// last page is kept whole, so the result may hold more than `max_files`
    /// entries. An empty listing returns an empty vector.
    ///
    /// # Errors
    /// - `max_files <= 0` (no remote call is made)
    /// - Any remote error
    pub async fn list_files(
        &self,
        parent: Option<&RemoteFile>,
        max_files: i64,
    ) -> Result<Vec<RemoteFile>> {
        if max_files <= 0 {
            return Err(Error::InvalidInput("maxFiles is invalid".to_string()));
        }

        let page_size = u32::try_from(max_files)
            .unwrap_or(MAX_PAGE_SIZE)
            .min(MAX_PAGE_SIZE);
        let query = ListQuery::children(parent.map(|p| p.id.as_str()), page_size);

        self.collect_pages(&query, Some(max_files as u64)).await
    }

    /// List every file under `parent`.
    ///
    /// Trashed files still count as children of their folder until the trash
    /// is emptied.
    ///
    /// # Errors
    /// - `parent` is `None` (no remote call is made)
    /// - Any remote error
    pub async fn list_all_files(&self, parent: Option<&RemoteFile>) -> Result<Vec<RemoteFile>> {
        let parent = parent
            .ok_or_else(|| Error::InvalidInput("parentFolder can't be nil".to_string()))?;

        let query = ListQuery::children(Some(&parent.id), MAX_PAGE_SIZE);
        self.collect_pages(&query, None).await
    }

    async fn collect_pages(&self, query: &ListQuery, limit: Option<u64>) -> Result<Vec<RemoteFile>> {
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.store.list_page(query, page_token.as_deref()).await?;
            debug!(
                store = self.store.name(),
                count = page.files.len(),
                more = page.next_page_token.is_some(),
                "Fetched file page"
            );
            files.extend(page.files);

            if limit.is_some_and(|max| files.len() as u64 >= max) {
                break;
            }

            // An empty token also marks the last page.
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(files)
    }

    /// Find a file by exact name, optionally scoped to `parent`.
    ///
    /// Returns the first match in remote order, or `None`. When several
    /// resources share the name, which one comes first is up to the remote.
    pub async fn find_by_name(
        &self,
        name: &str,
        parent: Option<&RemoteFile>,
    ) -> Result<Option<RemoteFile>> {
        let query = ListQuery::named(name, parent.map(|p| p.id.as_str()), LOOKUP_PAGE_SIZE);
        let page = self.store.list_page(&query, None).await?;
        Ok(page.files.into_iter().next())
    }

    /// Download the full content of a file into memory.
    ///
    /// # Errors
    /// - Empty `id` (no remote call is made)
    /// - Any remote error, unwrapped
    pub async fn download(&self, id: &str) -> Result<Vec<u8>> {
        let id = ResourceId::new(id)?;
        self.store.get_content(id.as_str()).await
    }

    /// Create a folder, optionally under `parent`.
    ///
    /// # Errors
    /// - Empty `name` (no remote call is made)
    /// - Remote failure, wrapped as "Failed to create directory"
    pub async fn mkdir(
        &self,
        name: &str,
        description: &str,
        parent: Option<&RemoteFile>,
    ) -> Result<RemoteFile> {
        let name = require_name(name, "folder name")?;

        let folder = NewResource::folder(name)
            .with_description(description)
            .with_parent(parent);

        self.store
            .create_resource(folder, None)
            .await
            .map_err(|e| e.context("Failed to create directory"))
    }

    /// Delete a file or folder by ID.
    ///
    /// # Errors
    /// - Empty `id` (no remote call is made)
    /// - Remote failure, wrapped as "Failed to delete file"
    pub async fn delete(&self, id: &str) -> Result<()> {
        let id = ResourceId::new(id)?;
        self.store
            .delete_resource(id.as_str())
            .await
            .map_err(|e| e.context("Failed to delete file"))
    }

    /// Upload `content` as a new file named `name`, optionally under `parent`.
    ///
    /// Returns the created file's id, name, size and download link.
    ///
    /// # Errors
    /// - Empty `name` (no remote call is made)
    /// - Any remote error
    pub async fn upload(
        &self,
        name: &str,
        description: &str,
        content: ByteStream,
        parent: Option<&RemoteFile>,
    ) -> Result<RemoteFile> {
        let name = require_name(name, "file name")?;

        let file = NewResource::file(name)
            .with_description(description)
            .with_parent(parent);

        self.store.create_resource(file, Some(content)).await
    }
}
