//! In-memory host, the reference implementation of the host traits.
//!
//! Resolution follows the common host rules: a leading slash or a
//! plain vault path wins, then a path relative to the source's folder,
//! then a vault-wide basename match.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use relink_core::model::{HostStyleDefaults, LinkOccurrence};
use relink_core::vpath;

use crate::host::{
    FileSnapshot, HostConfigSource, HostError, LinkIndex, NoticeSink, SettingsStore, VaultFiles,
};
use crate::index::scan_links;

pub fn content_digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text);
    format!("{:x}", hasher.finalize())
}

#[derive(Default)]
struct MemoryState {
    files: BTreeMap<String, String>,
    settings_blob: Option<serde_json::Value>,
    style_defaults: HostStyleDefaults,
    notices: Vec<String>,
}

#[derive(Default)]
pub struct MemoryHost {
    state: Mutex<MemoryState>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_file(&self, path: &str, content: &str) {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(path.to_string(), content.to_string());
    }

    pub fn remove_file(&self, path: &str) -> Option<String> {
        self.state.lock().unwrap().files.remove(path)
    }

    /// Move a file without touching its content, as a host rename does.
    pub fn rename_file(&self, old_path: &str, new_path: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(content) = state.files.remove(old_path) {
            state.files.insert(new_path.to_string(), content);
        }
    }

    pub fn file_content(&self, path: &str) -> Option<String> {
        self.state.lock().unwrap().files.get(path).cloned()
    }

    pub fn set_style_defaults(&self, defaults: HostStyleDefaults) {
        self.state.lock().unwrap().style_defaults = defaults;
    }

    pub fn notices(&self) -> Vec<String> {
        self.state.lock().unwrap().notices.clone()
    }

    fn resolve_sync(&self, link_path: &str, source_path: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        let exists = |path: &str| -> Option<String> {
            if state.files.contains_key(path) {
                return Some(path.to_string());
            }
            if vpath::extension(path).is_none() {
                let with_md = format!("{path}.md");
                if state.files.contains_key(&with_md) {
                    return Some(with_md);
                }
            }
            None
        };

        if let Some(stripped) = link_path.strip_prefix('/') {
            return exists(stripped);
        }
        if let Some(found) = exists(link_path) {
            return Some(found);
        }
        let joined = vpath::join(vpath::parent_dir(source_path), link_path);
        if let Some(normalized) = vpath::normalize(&joined) {
            if let Some(found) = exists(&normalized) {
                return Some(found);
            }
        }
        // Bare name: first match in path order, like hosts do.
        if !link_path.contains('/') {
            for path in state.files.keys() {
                let name = vpath::file_name(path);
                if name == link_path
                    || (vpath::is_markdown(path) && vpath::file_stem(path) == link_path)
                {
                    return Some(path.clone());
                }
            }
        }
        None
    }
}

#[async_trait]
impl VaultFiles for MemoryHost {
    async fn read(&self, path: &str) -> Result<FileSnapshot, HostError> {
        let state = self.state.lock().unwrap();
        let content = state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| HostError::NotFound(path.to_string()))?;
        let digest = content_digest(&content);
        Ok(FileSnapshot { content, digest })
    }

    async fn write(
        &self,
        path: &str,
        expected_digest: &str,
        content: &str,
    ) -> Result<(), HostError> {
        let mut state = self.state.lock().unwrap();
        let current = state
            .files
            .get(path)
            .ok_or_else(|| HostError::NotFound(path.to_string()))?;
        if content_digest(current) != expected_digest {
            return Err(HostError::Conflict(path.to_string()));
        }
        state.files.insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn list_markdown_files(&self) -> Result<Vec<String>, HostError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .files
            .keys()
            .filter(|path| vpath::is_markdown(path))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LinkIndex for MemoryHost {
    async fn occurrences(&self, path: &str) -> Result<Vec<LinkOccurrence>, HostError> {
        let content = self
            .file_content(path)
            .ok_or_else(|| HostError::NotFound(path.to_string()))?;
        Ok(scan_links(&content))
    }

    async fn backlinks(&self, path: &str) -> Result<Vec<(String, Vec<LinkOccurrence>)>, HostError> {
        let docs: Vec<(String, String)> = {
            let state = self.state.lock().unwrap();
            state
                .files
                .iter()
                .filter(|(doc, _)| vpath::is_markdown(doc))
                .map(|(doc, content)| (doc.clone(), content.clone()))
                .collect()
        };

        let mut result = Vec::new();
        for (doc, content) in docs {
            let matching: Vec<LinkOccurrence> = scan_links(&content)
                .into_iter()
                .filter(|occurrence| {
                    self.resolve_sync(&occurrence.link_path, &doc).as_deref() == Some(path)
                })
                .collect();
            if !matching.is_empty() {
                result.push((doc, matching));
            }
        }
        Ok(result)
    }

    async fn resolve(&self, link_path: &str, source_path: &str) -> Option<String> {
        self.resolve_sync(link_path, source_path)
    }

    async fn shortest_link_path(&self, target_path: &str, source_path: &str) -> Option<String> {
        let name = vpath::file_name(target_path).to_string();
        if self.resolve_sync(&name, source_path).as_deref() == Some(target_path) {
            let state = self.state.lock().unwrap();
            let ambiguous = state
                .files
                .keys()
                .filter(|path| vpath::file_name(path) == name)
                .count()
                > 1;
            if !ambiguous {
                return Some(name);
            }
        }
        None
    }
}

#[async_trait]
impl HostConfigSource for MemoryHost {
    async fn style_defaults(&self) -> HostStyleDefaults {
        self.state.lock().unwrap().style_defaults
    }
}

#[async_trait]
impl NoticeSink for MemoryHost {
    async fn notify(&self, message: &str) {
        self.state.lock().unwrap().notices.push(message.to_string());
    }
}

#[async_trait]
impl SettingsStore for MemoryHost {
    async fn load(&self) -> Result<Option<serde_json::Value>, HostError> {
        Ok(self.state.lock().unwrap().settings_blob.clone())
    }

    async fn save(&self, value: serde_json::Value) -> Result<(), HostError> {
        self.state.lock().unwrap().settings_blob = Some(value);
        Ok(())
    }
}
