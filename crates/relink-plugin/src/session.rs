//! Plugin session state.
//!
//! One [`Session`] lives for the plugin's lifetime. It owns the host
//! service handles, the current settings, the warning debounce and the
//! per-document in-flight conversion map.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use relink_core::model::{HostStyleDefaults, NewLinkFormat};
use relink_core::settings::PluginSettings;

use crate::host::{
    HostConfigSource, HostError, LinkIndex, NoticeSink, SettingsStore, VaultFiles,
};

const INCOMPATIBLE_SETTINGS_WARNING: &str = "Host link settings are incompatible: link \
     conversion needs markdown links with relative paths. Adjust the host settings or \
     enable \"ignore incompatible host settings\".";

/// How long one incompatibility warning suppresses the next.
const WARNING_DEBOUNCE: Duration = Duration::from_secs(10);

struct WarningState {
    last_shown: Option<Instant>,
}

impl WarningState {
    fn should_show(&self, now: Instant) -> bool {
        match self.last_shown {
            Some(at) => now.duration_since(at) >= WARNING_DEBOUNCE,
            None => true,
        }
    }
}

/// Ticket for one in-flight per-document conversion. A newer ticket
/// for the same document supersedes the older one by cancelling it.
struct InFlight {
    seq: u64,
    token: CancellationToken,
}

pub struct Session {
    pub files: Arc<dyn VaultFiles>,
    pub index: Arc<dyn LinkIndex>,
    pub host_config: Arc<dyn HostConfigSource>,
    pub notices: Arc<dyn NoticeSink>,
    pub settings_store: Arc<dyn SettingsStore>,
    settings: RwLock<PluginSettings>,
    warning: Mutex<WarningState>,
    in_flight: Mutex<HashMap<String, InFlight>>,
    next_seq: AtomicU64,
}

impl Session {
    pub fn new(
        files: Arc<dyn VaultFiles>,
        index: Arc<dyn LinkIndex>,
        host_config: Arc<dyn HostConfigSource>,
        notices: Arc<dyn NoticeSink>,
        settings_store: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            files,
            index,
            host_config,
            notices,
            settings_store,
            settings: RwLock::new(PluginSettings::default()),
            warning: Mutex::new(WarningState { last_shown: None }),
            in_flight: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
        }
    }

    /// Load stored settings, falling back to defaults when nothing was
    /// saved yet. A malformed blob is reported and replaced by the
    /// defaults rather than wedging the plugin.
    pub async fn load_settings(&self) -> Result<(), HostError> {
        let loaded = match self.settings_store.load().await? {
            Some(value) => match PluginSettings::from_value(value) {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!("stored settings are unusable, falling back to defaults: {e}");
                    self.notices
                        .notify(&format!("Stored settings could not be read: {e}"))
                        .await;
                    PluginSettings::default()
                }
            },
            None => PluginSettings::default(),
        };
        *self.settings.write().await = loaded;
        Ok(())
    }

    pub async fn settings(&self) -> PluginSettings {
        self.settings.read().await.clone()
    }

    pub async fn update_settings(&self, settings: PluginSettings) -> Result<(), HostError> {
        let value = serde_json::to_value(&settings)
            .map_err(|e| HostError::Io(format!("settings serialization failed: {e}")))?;
        self.settings_store.save(value).await?;
        *self.settings.write().await = settings;
        Ok(())
    }

    pub async fn style_defaults(&self) -> HostStyleDefaults {
        self.host_config.style_defaults().await
    }

    /// Whether automatic conversion may run under the current host
    /// style defaults. Incompatible defaults produce a debounced
    /// warning and veto automatic work; explicit commands still run.
    pub async fn check_host_compatibility(&self) -> bool {
        let settings = self.settings.read().await;
        if settings.ignore_incompatible_host_settings {
            return true;
        }
        drop(settings);

        let defaults = self.host_config.style_defaults().await;
        if !defaults.prefer_wikilinks && defaults.new_link_format == NewLinkFormat::Relative {
            return true;
        }

        log::warn!(
            "host style defaults are incompatible with automatic conversion: \
             prefer_wikilinks={}, new_link_format={:?}",
            defaults.prefer_wikilinks,
            defaults.new_link_format
        );
        let now = Instant::now();
        let mut warning = self.warning.lock().await;
        if warning.should_show(now) {
            warning.last_shown = Some(now);
            drop(warning);
            self.notices.notify(INCOMPATIBLE_SETTINGS_WARNING).await;
        }
        false
    }

    /// Register a new in-flight conversion for `path`, cancelling any
    /// older one. Returns the ticket's sequence number and token.
    pub async fn begin_document_work(&self, path: &str) -> (u64, CancellationToken) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let mut in_flight = self.in_flight.lock().await;
        if let Some(old) = in_flight.insert(
            path.to_string(),
            InFlight {
                seq,
                token: token.clone(),
            },
        ) {
            old.token.cancel();
        }
        (seq, token)
    }

    /// Release a ticket. Only the ticket's own entry is removed; a
    /// superseding entry with a newer sequence number stays.
    pub async fn finish_document_work(&self, path: &str, seq: u64) {
        let mut in_flight = self.in_flight.lock().await;
        if in_flight.get(path).is_some_and(|entry| entry.seq == seq) {
            in_flight.remove(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryHost;

    fn session_over(host: Arc<MemoryHost>) -> Session {
        Session::new(
            host.clone(),
            host.clone(),
            host.clone(),
            host.clone(),
            host,
        )
    }

    #[tokio::test]
    async fn compatible_defaults_pass_without_a_notice() {
        let host = Arc::new(MemoryHost::new());
        host.set_style_defaults(HostStyleDefaults {
            prefer_wikilinks: false,
            new_link_format: NewLinkFormat::Relative,
        });
        let session = session_over(host.clone());
        assert!(session.check_host_compatibility().await);
        assert!(host.notices().is_empty());
    }

    #[tokio::test]
    async fn incompatible_defaults_warn_once_per_window() {
        let host = Arc::new(MemoryHost::new());
        host.set_style_defaults(HostStyleDefaults {
            prefer_wikilinks: true,
            new_link_format: NewLinkFormat::Shortest,
        });
        let session = session_over(host.clone());
        assert!(!session.check_host_compatibility().await);
        assert!(!session.check_host_compatibility().await);
        assert_eq!(host.notices().len(), 1);
    }

    #[tokio::test]
    async fn ignore_flag_overrides_incompatible_defaults() {
        let host = Arc::new(MemoryHost::new());
        host.set_style_defaults(HostStyleDefaults {
            prefer_wikilinks: true,
            new_link_format: NewLinkFormat::Shortest,
        });
        let session = session_over(host.clone());
        let mut settings = session.settings().await;
        settings.ignore_incompatible_host_settings = true;
        session.update_settings(settings).await.unwrap();
        assert!(session.check_host_compatibility().await);
        assert!(host.notices().is_empty());
    }

    #[tokio::test]
    async fn newer_document_work_cancels_older() {
        let host = Arc::new(MemoryHost::new());
        let session = session_over(host);
        let (first_seq, first_token) = session.begin_document_work("note.md").await;
        let (second_seq, second_token) = session.begin_document_work("note.md").await;
        assert!(first_token.is_cancelled());
        assert!(!second_token.is_cancelled());

        // Releasing the stale ticket must not evict the live one.
        session.finish_document_work("note.md", first_seq).await;
        let (_, third_token) = session.begin_document_work("note.md").await;
        assert!(second_token.is_cancelled());
        assert!(!third_token.is_cancelled());
        assert_ne!(first_seq, second_seq);
    }

    #[tokio::test]
    async fn settings_round_trip_through_the_store() {
        let host = Arc::new(MemoryHost::new());
        let session = session_over(host.clone());
        let mut settings = session.settings().await;
        settings.use_angle_brackets = false;
        session.update_settings(settings.clone()).await.unwrap();

        let reloaded = session_over(host);
        reloaded.load_settings().await.unwrap();
        assert_eq!(reloaded.settings().await, settings);
    }
}
