use serde::{Deserialize, Serialize};

/// Notation requested for a generated link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkStyle {
    /// `[alias](path.md)`
    Markdown,
    /// `[[path]]` / `[[path|alias]]`
    Wikilink,
    /// Keep whatever notation the original link text uses.
    PreserveExisting,
    /// Defer to the host's global "use wikilinks" setting.
    HostDefault,
}

/// Path convention requested for a generated link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathStyle {
    /// Relative to the source document's directory.
    Relative,
    /// Full path from the vault root.
    AbsoluteInVault,
    /// Shortest path the host can still resolve unambiguously.
    Shortest,
    /// Defer to the host's global "new link format" setting.
    HostDefault,
}

/// The host's global "new link format" setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NewLinkFormat {
    Relative,
    Absolute,
    Shortest,
}

/// Snapshot of the host-wide link preferences consulted when a request
/// defers to [`LinkStyle::HostDefault`] / [`PathStyle::HostDefault`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostStyleDefaults {
    pub prefer_wikilinks: bool,
    pub new_link_format: NewLinkFormat,
}

impl Default for HostStyleDefaults {
    fn default() -> Self {
        Self {
            prefer_wikilinks: true,
            new_link_format: NewLinkFormat::Shortest,
        }
    }
}

/// One link or embed found inside a document, addressed by byte offsets
/// into the document text at the time the index was read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkOccurrence {
    /// The literal link text, e.g. `[[Note A#Heading|alt]]`.
    pub original: String,
    /// Byte offset of the first character of `original`.
    pub start: usize,
    /// Byte offset one past the last character of `original`.
    pub end: usize,
    /// The written target path, without any subpath suffix.
    pub link_path: String,
    /// `#heading` / `#^block` suffix, including the leading `#`.
    pub subpath: Option<String>,
    /// Alias / display text, when the link carries one.
    pub display_text: Option<String>,
}

impl LinkOccurrence {
    pub fn is_embed(&self) -> bool {
        self.original.starts_with('!')
    }
}

/// A known, offset-addressed substring replacement inside one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementSpan {
    pub start: usize,
    pub end: usize,
    /// The text expected at `start..end` when the span was computed.
    pub old_content: String,
    pub new_content: String,
}

impl ReplacementSpan {
    pub fn is_noop(&self) -> bool {
        self.old_content == self.new_content
    }
}

/// Pure input value for one link generation call.
///
/// `Option<bool>` fields are tri-state: `Some(_)` is an explicit request
/// that beats both inference from `original_link` and the host defaults;
/// `None` lets the lower-priority sources decide.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Canonical vault path of the target, e.g. `folder/Note A.md`.
    pub target_path: String,
    /// Whether the target resolves to an existing file.
    pub target_exists: bool,
    /// Canonical vault path of the document the link will live in.
    pub source_path: String,
    /// `#heading` / `#^block` suffix, including the leading `#`.
    pub subpath: Option<String>,
    pub alias: Option<String>,
    /// `None` infers from the target's file type (attachments embed).
    pub is_embed: Option<bool>,
    pub link_style: LinkStyle,
    pub path_style: PathStyle,
    /// Existing link literal, used by [`LinkStyle::PreserveExisting`] and
    /// as the inference source for unset flags.
    pub original_link: Option<String>,
    pub use_angle_brackets: Option<bool>,
    pub use_leading_dot: Option<bool>,
    pub use_leading_slash: Option<bool>,
    pub allow_empty_embed_alias: Option<bool>,
    pub include_extension_in_embed_alias: Option<bool>,
    /// Backslash-escape `[`, `]` and `\` in markdown aliases.
    pub escape_alias: bool,
    /// Allow `[[#subpath]]` when target and source are the same file.
    pub single_subpath: bool,
    /// When false, a non-existing target is an error; when true, the
    /// written path is taken literally.
    pub allow_nonexistent_target: bool,
}

impl GenerateOptions {
    pub fn new(target_path: impl Into<String>, source_path: impl Into<String>) -> Self {
        Self {
            target_path: target_path.into(),
            target_exists: true,
            source_path: source_path.into(),
            subpath: None,
            alias: None,
            is_embed: None,
            link_style: LinkStyle::HostDefault,
            path_style: PathStyle::HostDefault,
            original_link: None,
            use_angle_brackets: None,
            use_leading_dot: None,
            use_leading_slash: None,
            allow_empty_embed_alias: None,
            include_extension_in_embed_alias: None,
            escape_alias: false,
            single_subpath: true,
            allow_nonexistent_target: false,
        }
    }
}

/// Path convention after every `HostDefault` has been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedPathStyle {
    Relative,
    Absolute,
    Shortest,
}

/// Fully decided style for one generation call, produced by
/// [`crate::style::resolve_style`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedStyle {
    pub is_wikilink: bool,
    pub path_style: ResolvedPathStyle,
    pub use_angle_brackets: bool,
    pub use_leading_dot: bool,
    pub use_leading_slash: bool,
}
