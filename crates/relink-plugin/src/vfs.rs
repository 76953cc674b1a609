//! Directory-backed vault.
//!
//! Serves a real folder through the host traits, with vault-relative
//! forward-slash paths. Useful for integrations that run outside a
//! note application, and for exercising the plugin against disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use walkdir::WalkDir;

use relink_core::model::LinkOccurrence;
use relink_core::vpath;

use crate::host::{FileSnapshot, HostError, LinkIndex, VaultFiles};
use crate::index::scan_links;
use crate::memory::content_digest;

pub struct DirectoryVault {
    root: PathBuf,
}

impl DirectoryVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn absolute(&self, vault_path: &str) -> PathBuf {
        self.root.join(Path::new(vault_path))
    }

    fn vault_path(&self, absolute: &Path) -> Option<String> {
        let relative = absolute.strip_prefix(&self.root).ok()?;
        let mut out = String::new();
        for component in relative.components() {
            if !out.is_empty() {
                out.push('/');
            }
            out.push_str(&component.as_os_str().to_string_lossy());
        }
        Some(out)
    }

    fn list_files(&self) -> Result<Vec<String>, HostError> {
        let mut paths = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = entry.map_err(|e| HostError::Io(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(path) = self.vault_path(entry.path()) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn exists(&self, vault_path: &str) -> bool {
        self.absolute(vault_path).is_file()
    }

    fn resolve_sync(&self, link_path: &str, source_path: &str) -> Option<String> {
        let try_path = |path: &str| -> Option<String> {
            if self.exists(path) {
                return Some(path.to_string());
            }
            if vpath::extension(path).is_none() {
                let with_md = format!("{path}.md");
                if self.exists(&with_md) {
                    return Some(with_md);
                }
            }
            None
        };

        if let Some(stripped) = link_path.strip_prefix('/') {
            return try_path(stripped);
        }
        if let Some(found) = try_path(link_path) {
            return Some(found);
        }
        let joined = vpath::join(vpath::parent_dir(source_path), link_path);
        if let Some(normalized) = vpath::normalize(&joined) {
            if let Some(found) = try_path(&normalized) {
                return Some(found);
            }
        }
        if !link_path.contains('/') {
            let paths = self.list_files().ok()?;
            for path in paths {
                let name = vpath::file_name(&path);
                if name == link_path
                    || (vpath::is_markdown(&path) && vpath::file_stem(&path) == link_path)
                {
                    return Some(path);
                }
            }
        }
        None
    }
}

#[async_trait]
impl VaultFiles for DirectoryVault {
    async fn read(&self, path: &str) -> Result<FileSnapshot, HostError> {
        let content = std::fs::read_to_string(self.absolute(path)).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                HostError::NotFound(path.to_string())
            } else {
                HostError::Io(e.to_string())
            }
        })?;
        let digest = content_digest(&content);
        Ok(FileSnapshot { content, digest })
    }

    async fn write(
        &self,
        path: &str,
        expected_digest: &str,
        content: &str,
    ) -> Result<(), HostError> {
        let absolute = self.absolute(path);
        let current = std::fs::read_to_string(&absolute).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                HostError::NotFound(path.to_string())
            } else {
                HostError::Io(e.to_string())
            }
        })?;
        if content_digest(&current) != expected_digest {
            return Err(HostError::Conflict(path.to_string()));
        }
        std::fs::write(&absolute, content).map_err(|e| HostError::Io(e.to_string()))
    }

    async fn list_markdown_files(&self) -> Result<Vec<String>, HostError> {
        Ok(self
            .list_files()?
            .into_iter()
            .filter(|path| vpath::is_markdown(path))
            .collect())
    }
}

#[async_trait]
impl LinkIndex for DirectoryVault {
    async fn occurrences(&self, path: &str) -> Result<Vec<LinkOccurrence>, HostError> {
        let snapshot = self.read(path).await?;
        Ok(scan_links(&snapshot.content))
    }

    async fn backlinks(&self, path: &str) -> Result<Vec<(String, Vec<LinkOccurrence>)>, HostError> {
        let mut result = Vec::new();
        for doc in self.list_markdown_files().await? {
            let snapshot = self.read(&doc).await?;
            let matching: Vec<LinkOccurrence> = scan_links(&snapshot.content)
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
        if self.resolve_sync(&name, source_path).as_deref() != Some(target_path) {
            return None;
        }
        let paths = self.list_files().ok()?;
        let ambiguous = paths
            .iter()
            .filter(|path| vpath::file_name(path) == name)
            .count()
            > 1;
        if ambiguous {
            None
        } else {
            Some(name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn lists_reads_and_writes_vault_files() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("notes")).unwrap();
        fs::write(dir.path().join("notes/a.md"), "[[b]]").unwrap();
        fs::write(dir.path().join("b.md"), "# B").unwrap();
        fs::write(dir.path().join("image.png"), "binary-ish").unwrap();

        let vault = DirectoryVault::new(dir.path());
        assert_eq!(
            vault.list_markdown_files().await.unwrap(),
            vec!["b.md".to_string(), "notes/a.md".to_string()]
        );

        let snapshot = vault.read("notes/a.md").await.unwrap();
        assert_eq!(snapshot.content, "[[b]]");
        vault
            .write("notes/a.md", &snapshot.digest, "[b](../b.md)")
            .await
            .unwrap();
        assert_eq!(vault.read("notes/a.md").await.unwrap().content, "[b](../b.md)");

        let err = vault
            .write("notes/a.md", &snapshot.digest, "stale")
            .await
            .unwrap_err();
        assert_eq!(err, HostError::Conflict("notes/a.md".to_string()));
    }

    #[tokio::test]
    async fn resolves_and_finds_backlinks_on_disk() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("notes")).unwrap();
        fs::write(dir.path().join("notes/a.md"), "see [[b]] here").unwrap();
        fs::write(dir.path().join("b.md"), "# B").unwrap();

        let vault = DirectoryVault::new(dir.path());
        assert_eq!(
            vault.resolve("b", "notes/a.md").await,
            Some("b.md".to_string())
        );
        let backlinks = vault.backlinks("b.md").await.unwrap();
        assert_eq!(backlinks.len(), 1);
        assert_eq!(backlinks[0].0, "notes/a.md");
        assert_eq!(
            vault.shortest_link_path("b.md", "notes/a.md").await,
            Some("b.md".to_string())
        );
    }
}
