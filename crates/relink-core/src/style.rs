//! Path style resolution.
//!
//! Decides, for one generation request, which notation and path
//! convention apply. Priority order per field: explicit request >
//! inference from the original link literal > host global setting.

use regex::Regex;
use std::sync::LazyLock;

use crate::model::{
    GenerateOptions, HostStyleDefaults, LinkStyle, NewLinkFormat, PathStyle, ResolvedPathStyle,
    ResolvedStyle,
};

// Compile once, reuse across calls.
static WIKILINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(!?)\[\[([^\]|]*)(?:\|[^\]]*)?\]\]$").unwrap());

static MARKDOWN_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(!?)\[(?:[^\[\]\\]|\\.)*\]\((<?)(.*?)>?\)$").unwrap());

/// Style facts sniffed from an existing link literal.
///
/// This is a deliberate pre-pass: the generation algorithm consumes the
/// tagged result instead of re-inspecting the literal itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferredStyle {
    pub is_embed: bool,
    pub is_wikilink: bool,
    pub uses_angle_brackets: bool,
    /// Path portion as written, subpath included.
    pub written_path: String,
}

impl InferredStyle {
    fn path_style(&self) -> Option<ResolvedPathStyle> {
        if self.written_path.starts_with("./") || self.written_path.starts_with("../") {
            Some(ResolvedPathStyle::Relative)
        } else if self.written_path.starts_with('/') {
            Some(ResolvedPathStyle::Absolute)
        } else {
            None
        }
    }

    fn has_leading_dot(&self) -> bool {
        self.written_path.starts_with("./")
    }

    fn has_leading_slash(&self) -> bool {
        self.written_path.starts_with('/')
    }
}

/// Sniff notation and path conventions from a link literal.
/// Returns `None` when the text is not a recognizable link.
pub fn infer_link_style(original: &str) -> Option<InferredStyle> {
    if let Some(caps) = WIKILINK_RE.captures(original) {
        return Some(InferredStyle {
            is_embed: !caps[1].is_empty(),
            is_wikilink: true,
            uses_angle_brackets: false,
            written_path: caps[2].to_string(),
        });
    }
    if let Some(caps) = MARKDOWN_LINK_RE.captures(original) {
        return Some(InferredStyle {
            is_embed: !caps[1].is_empty(),
            is_wikilink: false,
            uses_angle_brackets: !caps[2].is_empty(),
            written_path: caps[3].to_string(),
        });
    }
    None
}

/// Resolve every `HostDefault` / unset flag of a generation request into
/// a concrete style decision.
pub fn resolve_style(opts: &GenerateOptions, host: &HostStyleDefaults) -> ResolvedStyle {
    let inferred = opts.original_link.as_deref().and_then(infer_link_style);

    let is_wikilink = match opts.link_style {
        LinkStyle::Wikilink => true,
        LinkStyle::Markdown => false,
        LinkStyle::PreserveExisting => inferred
            .as_ref()
            .map(|i| i.is_wikilink)
            .unwrap_or(host.prefer_wikilinks),
        LinkStyle::HostDefault => host.prefer_wikilinks,
    };

    let path_style = match opts.path_style {
        PathStyle::Relative => ResolvedPathStyle::Relative,
        PathStyle::AbsoluteInVault => ResolvedPathStyle::Absolute,
        PathStyle::Shortest => ResolvedPathStyle::Shortest,
        PathStyle::HostDefault => inferred
            .as_ref()
            .and_then(|i| i.path_style())
            .unwrap_or(match host.new_link_format {
                NewLinkFormat::Relative => ResolvedPathStyle::Relative,
                NewLinkFormat::Absolute => ResolvedPathStyle::Absolute,
                NewLinkFormat::Shortest => ResolvedPathStyle::Shortest,
            }),
    };

    ResolvedStyle {
        is_wikilink,
        path_style,
        use_angle_brackets: opts
            .use_angle_brackets
            .or(inferred.as_ref().map(|i| i.uses_angle_brackets))
            .unwrap_or(false),
        use_leading_dot: opts
            .use_leading_dot
            .or(inferred.as_ref().map(|i| i.has_leading_dot()))
            .unwrap_or(false),
        use_leading_slash: opts
            .use_leading_slash
            .or(inferred.as_ref().map(|i| i.has_leading_slash()))
            .unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_plain_wikilink() {
        let inferred = infer_link_style("[[Note A]]").unwrap();
        assert!(inferred.is_wikilink);
        assert!(!inferred.is_embed);
        assert_eq!(inferred.written_path, "Note A");
    }

    #[test]
    fn infers_embed_wikilink_with_alias() {
        let inferred = infer_link_style("![[img.png|thumb]]").unwrap();
        assert!(inferred.is_wikilink);
        assert!(inferred.is_embed);
        assert_eq!(inferred.written_path, "img.png");
    }

    #[test]
    fn infers_markdown_link_with_angle_brackets() {
        let inferred = infer_link_style("[alt](<./Note A.md#Heading>)").unwrap();
        assert!(!inferred.is_wikilink);
        assert!(inferred.uses_angle_brackets);
        assert!(inferred.has_leading_dot());
        assert_eq!(inferred.written_path, "./Note A.md#Heading");
    }

    #[test]
    fn infers_markdown_embed_without_angle_brackets() {
        let inferred = infer_link_style("![](img.png)").unwrap();
        assert!(inferred.is_embed);
        assert!(!inferred.uses_angle_brackets);
        assert_eq!(inferred.written_path, "img.png");
    }

    #[test]
    fn markdown_alias_may_contain_escaped_brackets() {
        let inferred = infer_link_style(r"[a\]b](x.md)").unwrap();
        assert_eq!(inferred.written_path, "x.md");
    }

    #[test]
    fn rejects_plain_text() {
        assert_eq!(infer_link_style("not a link"), None);
        assert_eq!(infer_link_style("[[unclosed"), None);
    }

    fn base_opts() -> GenerateOptions {
        GenerateOptions::new("b.md", "a.md")
    }

    fn host() -> HostStyleDefaults {
        HostStyleDefaults {
            prefer_wikilinks: false,
            new_link_format: NewLinkFormat::Relative,
        }
    }

    #[test]
    fn explicit_style_beats_inference_and_host() {
        let mut opts = base_opts();
        opts.link_style = LinkStyle::Wikilink;
        opts.original_link = Some("[x](b.md)".to_string());
        let resolved = resolve_style(&opts, &host());
        assert!(resolved.is_wikilink);
    }

    #[test]
    fn preserve_existing_follows_the_literal() {
        let mut opts = base_opts();
        opts.link_style = LinkStyle::PreserveExisting;
        opts.original_link = Some("[[b]]".to_string());
        assert!(resolve_style(&opts, &host()).is_wikilink);

        opts.original_link = Some("[b](b.md)".to_string());
        assert!(!resolve_style(&opts, &host()).is_wikilink);
    }

    #[test]
    fn preserve_existing_without_literal_falls_back_to_host() {
        let mut opts = base_opts();
        opts.link_style = LinkStyle::PreserveExisting;
        assert!(!resolve_style(&opts, &host()).is_wikilink);
    }

    #[test]
    fn host_default_path_style_defers_to_inference_first() {
        let mut opts = base_opts();
        opts.original_link = Some("[x](/abs/b.md)".to_string());
        let resolved = resolve_style(&opts, &host());
        assert_eq!(resolved.path_style, ResolvedPathStyle::Absolute);
        assert!(resolved.use_leading_slash);
    }

    #[test]
    fn explicit_flag_overrides_inferred_flag() {
        let mut opts = base_opts();
        opts.original_link = Some("[x](<b c.md>)".to_string());
        opts.use_angle_brackets = Some(false);
        assert!(!resolve_style(&opts, &host()).use_angle_brackets);
    }
}
