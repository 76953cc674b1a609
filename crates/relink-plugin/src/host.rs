//! Host boundary traits.
//!
//! Everything the plugin needs from its host application arrives
//! through these seams, so the whole orchestration layer can run
//! against [`crate::memory::MemoryHost`] in tests.

use async_trait::async_trait;
use thiserror::Error;

use relink_core::model::{HostStyleDefaults, LinkOccurrence};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("file changed since it was read: {0}")]
    Conflict(String),
    #[error("host io failure: {0}")]
    Io(String),
}

/// A file snapshot plus the digest the host computed for it. Writes
/// hand the digest back so the host can reject stale updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnapshot {
    pub content: String,
    pub digest: String,
}

/// Read and write access to the vault's files.
#[async_trait]
pub trait VaultFiles: Send + Sync {
    async fn read(&self, path: &str) -> Result<FileSnapshot, HostError>;

    /// Replace a file's content. Fails with [`HostError::Conflict`]
    /// when the file no longer matches `expected_digest`.
    async fn write(
        &self,
        path: &str,
        expected_digest: &str,
        content: &str,
    ) -> Result<(), HostError>;

    /// Vault paths of every markdown file, sorted.
    async fn list_markdown_files(&self) -> Result<Vec<String>, HostError>;
}

/// The host's link index: per-document occurrences, the reverse map,
/// and its link resolution rules.
#[async_trait]
pub trait LinkIndex: Send + Sync {
    /// Link occurrences in one document, in no particular order. The
    /// index may report footnote-definition links twice.
    async fn occurrences(&self, path: &str) -> Result<Vec<LinkOccurrence>, HostError>;

    /// Documents that contain at least one link resolving to `path`,
    /// with those occurrences.
    async fn backlinks(&self, path: &str) -> Result<Vec<(String, Vec<LinkOccurrence>)>, HostError>;

    /// Resolve a written link path from `source_path` to a vault path,
    /// or `None` when the target does not exist.
    async fn resolve(&self, link_path: &str, source_path: &str) -> Option<String>;

    /// Shortest written path that still resolves to `target_path`.
    async fn shortest_link_path(&self, target_path: &str, source_path: &str) -> Option<String>;
}

/// Host-level style preferences the plugin falls back to.
#[async_trait]
pub trait HostConfigSource: Send + Sync {
    async fn style_defaults(&self) -> HostStyleDefaults;
}

/// User-visible, transient notifications.
#[async_trait]
pub trait NoticeSink: Send + Sync {
    async fn notify(&self, message: &str);
}

/// Durable storage for the plugin's own settings blob.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self) -> Result<Option<serde_json::Value>, HostError>;
    async fn save(&self, value: serde_json::Value) -> Result<(), HostError>;
}
