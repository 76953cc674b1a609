//! Plugin settings, their serialized form and migration from older
//! layouts.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::filter::{PathFilter, PatternError};
use crate::model::LinkStyle;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("setting `{key}` has the wrong type, expected {expected}")]
    InvalidType { key: String, expected: &'static str },
    #[error("settings payload is not an object")]
    NotAnObject,
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error("malformed settings payload: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PluginSettings {
    pub allow_empty_embed_alias: bool,
    pub auto_convert_new_links: bool,
    pub update_links_on_rename: bool,
    pub include_attachment_extension_in_embed_alias: bool,
    pub preserve_existing_link_style: bool,
    pub use_angle_brackets: bool,
    pub use_leading_dot: bool,
    pub use_leading_slash: bool,
    pub ignore_incompatible_host_settings: bool,
    pub include_paths: Vec<String>,
    pub exclude_paths: Vec<String>,
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            allow_empty_embed_alias: true,
            auto_convert_new_links: true,
            update_links_on_rename: true,
            include_attachment_extension_in_embed_alias: false,
            preserve_existing_link_style: false,
            use_angle_brackets: true,
            use_leading_dot: true,
            use_leading_slash: true,
            ignore_incompatible_host_settings: false,
            include_paths: Vec::new(),
            exclude_paths: vec![
                r"/.+\.excalidraw\.md$/".to_string(),
                r"/.+\.tldraw\.md$/".to_string(),
            ],
        }
    }
}

// Keys written by earlier releases, mapped to their current names.
const LEGACY_KEYS: &[(&str, &str)] = &[
    ("shouldAllowEmptyEmbedAlias", "allowEmptyEmbedAlias"),
    ("shouldAutoConvertNewLinks", "autoConvertNewLinks"),
    ("shouldUpdateLinksOnRename", "updateLinksOnRename"),
    (
        "shouldIncludeAttachmentExtensionInEmbedAlias",
        "includeAttachmentExtensionInEmbedAlias",
    ),
    ("shouldPreserveExistingLinkStyle", "preserveExistingLinkStyle"),
    ("shouldUseAngleBrackets", "useAngleBrackets"),
    ("shouldUseLeadingDot", "useLeadingDot"),
    ("shouldUseLeadingSlash", "useLeadingSlash"),
    (
        "shouldIgnoreIncompatibleHostSettings",
        "ignoreIncompatibleHostSettings",
    ),
];

const BOOL_KEYS: &[&str] = &[
    "allowEmptyEmbedAlias",
    "autoConvertNewLinks",
    "updateLinksOnRename",
    "includeAttachmentExtensionInEmbedAlias",
    "preserveExistingLinkStyle",
    "useAngleBrackets",
    "useLeadingDot",
    "useLeadingSlash",
    "ignoreIncompatibleHostSettings",
];

impl PluginSettings {
    /// Deserialize a stored settings blob, renaming legacy keys and
    /// rejecting values of the wrong type. Unknown keys are ignored so
    /// downgrades do not lose data they merely do not understand.
    pub fn from_value(value: Value) -> Result<Self, SettingsError> {
        let Value::Object(mut map) = value else {
            return Err(SettingsError::NotAnObject);
        };

        for (legacy, current) in LEGACY_KEYS {
            if let Some(v) = map.remove(*legacy) {
                map.entry((*current).to_string()).or_insert(v);
            }
        }

        for key in BOOL_KEYS {
            if let Some(v) = map.get(*key) {
                if !v.is_boolean() {
                    return Err(SettingsError::InvalidType {
                        key: (*key).to_string(),
                        expected: "boolean",
                    });
                }
            }
        }

        serde_json::from_value(Value::Object(map))
            .map_err(|e| SettingsError::Malformed(e.to_string()))
    }

    /// Style to request for a link, depending on whether it rewrites an
    /// existing one.
    pub fn link_style(&self, is_existing_link: bool) -> LinkStyle {
        if self.preserve_existing_link_style && is_existing_link {
            LinkStyle::PreserveExisting
        } else {
            LinkStyle::HostDefault
        }
    }

    pub fn path_filter(&self) -> Result<PathFilter, PatternError> {
        PathFilter::new(&self.include_paths, &self.exclude_paths)
    }
}
