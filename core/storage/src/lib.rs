//! Remote file storage for drivekit.
//!
//! A narrow [`RemoteStore`] capability trait sits between the file operations
//! facade ([`DriveFiles`]) and the concrete backends: the Google Drive REST
//! client and an in-memory store for tests.

pub mod files;
pub mod gdrive;
pub mod memory;
pub mod provider;

pub use files::DriveFiles;
pub use memory::MemoryStore;
pub use provider::{
    ByteStream, FilePage, ListQuery, NewResource, RemoteFile, RemoteStore, FOLDER_MIME_TYPE,
    MAX_PAGE_SIZE,
};
