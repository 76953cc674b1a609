//! Link text generation.
//!
//! `generate` is deterministic and side-effect free: everything it
//! needs about the vault arrives in [`GenerateOptions`] and the
//! [`LinkPathLookup`] seam, so the same inputs always produce the same
//! link text.

use thiserror::Error;

use crate::model::{GenerateOptions, HostStyleDefaults, ResolvedPathStyle};
use crate::style::{infer_link_style, resolve_style};
use crate::vpath;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerateError {
    #[error("link target does not exist: {0}")]
    UnresolvedTarget(String),
}

/// Host seam for [`crate::model::PathStyle::Shortest`]: the shortest
/// written path (extension included) the host still resolves to
/// `target_path` from `source_path`, typically the bare file name when
/// it is unambiguous vault-wide.
pub trait LinkPathLookup {
    fn shortest_link_path(&self, target_path: &str, source_path: &str) -> Option<String>;
}

/// Lookup that never shortens; `Shortest` degrades to the vault path.
pub struct NoShortestLookup;

impl LinkPathLookup for NoShortestLookup {
    fn shortest_link_path(&self, _target_path: &str, _source_path: &str) -> Option<String> {
        None
    }
}

/// Produce the literal link text for one generation request.
pub fn generate(
    opts: &GenerateOptions,
    host: &HostStyleDefaults,
    lookup: &dyn LinkPathLookup,
) -> Result<String, GenerateError> {
    if !opts.target_exists && !opts.allow_nonexistent_target {
        return Err(GenerateError::UnresolvedTarget(opts.target_path.clone()));
    }

    let style = resolve_style(opts, host);
    let inferred = opts.original_link.as_deref().and_then(infer_link_style);
    let is_embed = opts
        .is_embed
        .or(inferred.map(|i| i.is_embed))
        .unwrap_or_else(|| !vpath::is_markdown(&opts.target_path));

    let subpath = opts.subpath.as_deref().unwrap_or("");
    let same_file = opts.target_path == opts.source_path;

    let mut path_text = if same_file && !subpath.is_empty() && opts.single_subpath {
        // Same-document reference: the link degenerates to its subpath.
        String::new()
    } else if !opts.target_exists {
        // Literal fallback for targets the host cannot resolve.
        opts.target_path.clone()
    } else {
        match style.path_style {
            ResolvedPathStyle::Relative => vpath::relative_between(
                vpath::parent_dir(&opts.source_path),
                &opts.target_path,
            ),
            ResolvedPathStyle::Absolute => opts.target_path.clone(),
            ResolvedPathStyle::Shortest => lookup
                .shortest_link_path(&opts.target_path, &opts.source_path)
                .unwrap_or_else(|| opts.target_path.clone()),
        }
    };

    // Wikilinks refer to notes without their extension.
    if style.is_wikilink {
        path_text = vpath::without_markdown_extension(&path_text).to_string();
    }

    if !path_text.is_empty() {
        match style.path_style {
            ResolvedPathStyle::Relative
                if style.use_leading_dot
                    && !path_text.starts_with('.')
                    && !path_text.starts_with('#') =>
            {
                path_text.insert_str(0, "./");
            }
            ResolvedPathStyle::Absolute
                if style.use_leading_slash && !path_text.starts_with('/') =>
            {
                path_text.insert(0, '/');
            }
            _ => {}
        }
    }

    let link_text = format!("{path_text}{subpath}");

    if style.is_wikilink {
        return Ok(compose_wikilink(&link_text, opts.alias.as_deref(), is_embed));
    }

    let target_text = if style.use_angle_brackets {
        format!("<{link_text}>")
    } else {
        encode_special_chars(&link_text)
    };

    let alias = markdown_alias(opts, &link_text, is_embed);
    let alias = if opts.escape_alias {
        escape_alias_text(&alias)
    } else {
        alias
    };

    let bang = if is_embed { "!" } else { "" };
    Ok(format!("{bang}[{alias}]({target_text})"))
}

fn compose_wikilink(link_text: &str, alias: Option<&str>, is_embed: bool) -> String {
    let bang = if is_embed { "!" } else { "" };
    match alias {
        // A redundant alias adds nothing; drop it.
        Some(alias) if !alias.is_empty() && !alias.eq_ignore_ascii_case(link_text) => {
            format!("{bang}[[{link_text}|{alias}]]")
        }
        _ => format!("{bang}[[{link_text}]]"),
    }
}

fn markdown_alias(opts: &GenerateOptions, link_text: &str, is_embed: bool) -> String {
    if let Some(alias) = opts.alias.as_deref().filter(|alias| !alias.is_empty()) {
        return alias.to_string();
    }

    if is_embed {
        if opts.allow_empty_embed_alias.unwrap_or(true) {
            return String::new();
        }
        return if opts.include_extension_in_embed_alias.unwrap_or(false) {
            vpath::file_name(&opts.target_path).to_string()
        } else {
            vpath::file_stem(&opts.target_path).to_string()
        };
    }

    if link_text.starts_with('#') {
        // Subpath-only link: display the heading / block id itself.
        link_text.trim_start_matches(['#', '^']).to_string()
    } else {
        vpath::file_stem(&opts.target_path).to_string()
    }
}

/// Percent-encode the characters markdown path parsing cannot tolerate
/// bare: space, backslash and control characters. Everything else is
/// written through untouched, which keeps paths readable.
fn encode_special_chars(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for ch in path.chars() {
        if ch == ' ' || ch == '\\' || ch.is_control() {
            let mut buf = [0u8; 4];
            for byte in ch.encode_utf8(&mut buf).as_bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        } else {
            out.push(ch);
        }
    }
    out
}

fn escape_alias_text(alias: &str) -> String {
    let mut out = String::with_capacity(alias.len());
    for ch in alias.chars() {
        if matches!(ch, '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LinkStyle, NewLinkFormat, PathStyle};

    fn host_markdown_relative() -> HostStyleDefaults {
        HostStyleDefaults {
            prefer_wikilinks: false,
            new_link_format: NewLinkFormat::Relative,
        }
    }

    fn host_wikilink_shortest() -> HostStyleDefaults {
        HostStyleDefaults {
            prefer_wikilinks: true,
            new_link_format: NewLinkFormat::Shortest,
        }
    }

    struct BasenameLookup;

    impl LinkPathLookup for BasenameLookup {
        fn shortest_link_path(&self, target_path: &str, _source_path: &str) -> Option<String> {
            Some(vpath::file_name(target_path).to_string())
        }
    }

    fn gen(opts: &GenerateOptions, host: &HostStyleDefaults) -> String {
        generate(opts, host, &NoShortestLookup).unwrap()
    }

    #[test]
    fn relative_markdown_link_with_leading_dot() {
        let mut opts = GenerateOptions::new("dir/Note A.md", "dir/src.md");
        opts.use_leading_dot = Some(true);
        assert_eq!(
            gen(&opts, &host_markdown_relative()),
            "[Note A](./Note%20A.md)"
        );
    }

    #[test]
    fn angle_brackets_replace_percent_encoding() {
        let mut opts = GenerateOptions::new("dir/Note A.md", "dir/src.md");
        opts.use_leading_dot = Some(true);
        opts.use_angle_brackets = Some(true);
        assert_eq!(
            gen(&opts, &host_markdown_relative()),
            "[Note A](<./Note A.md>)"
        );
    }

    #[test]
    fn subpath_is_appended_verbatim() {
        let mut opts = GenerateOptions::new("dir/Note A.md", "dir/src.md");
        opts.subpath = Some("#Heading".to_string());
        opts.alias = Some("alt".to_string());
        opts.use_leading_dot = Some(true);
        assert_eq!(
            gen(&opts, &host_markdown_relative()),
            "[alt](./Note%20A.md#Heading)"
        );
    }

    #[test]
    fn no_leading_dot_before_parent_traversal() {
        let opts = {
            let mut o = GenerateOptions::new("other/b.md", "dir/src.md");
            o.use_leading_dot = Some(true);
            o
        };
        assert_eq!(gen(&opts, &host_markdown_relative()), "[b](../other/b.md)");
    }

    #[test]
    fn same_file_link_degenerates_to_subpath() {
        let mut opts = GenerateOptions::new("dir/src.md", "dir/src.md");
        opts.subpath = Some("#Heading".to_string());
        opts.link_style = LinkStyle::Wikilink;
        assert_eq!(gen(&opts, &host_markdown_relative()), "[[#Heading]]");
    }

    #[test]
    fn same_file_markdown_subpath_gets_a_display_alias() {
        let mut opts = GenerateOptions::new("dir/src.md", "dir/src.md");
        opts.subpath = Some("#My Heading".to_string());
        opts.link_style = LinkStyle::Markdown;
        assert_eq!(gen(&opts, &host_markdown_relative()), "[My Heading](#My%20Heading)");
    }

    #[test]
    fn single_subpath_disabled_keeps_the_path() {
        let mut opts = GenerateOptions::new("dir/src.md", "dir/src.md");
        opts.subpath = Some("#Heading".to_string());
        opts.link_style = LinkStyle::Wikilink;
        opts.single_subpath = false;
        assert_eq!(gen(&opts, &host_markdown_relative()), "[[src#Heading]]");
    }

    #[test]
    fn wikilink_drops_note_extension_but_not_attachment_extension() {
        let mut opts = GenerateOptions::new("folder/Note.md", "src.md");
        opts.link_style = LinkStyle::Wikilink;
        opts.path_style = PathStyle::AbsoluteInVault;
        assert_eq!(gen(&opts, &host_markdown_relative()), "[[folder/Note]]");

        let mut opts = GenerateOptions::new("folder/img.png", "src.md");
        opts.link_style = LinkStyle::Wikilink;
        opts.path_style = PathStyle::AbsoluteInVault;
        opts.is_embed = Some(false);
        assert_eq!(gen(&opts, &host_markdown_relative()), "[[folder/img.png]]");
    }

    #[test]
    fn absolute_leading_slash() {
        let mut opts = GenerateOptions::new("folder/Note.md", "src.md");
        opts.link_style = LinkStyle::Wikilink;
        opts.path_style = PathStyle::AbsoluteInVault;
        opts.use_leading_slash = Some(true);
        assert_eq!(gen(&opts, &host_markdown_relative()), "[[/folder/Note]]");
    }

    #[test]
    fn shortest_uses_the_host_lookup() {
        let mut opts = GenerateOptions::new("deep/nested/Note A.md", "src.md");
        opts.path_style = PathStyle::Shortest;
        let text = generate(&opts, &host_wikilink_shortest(), &BasenameLookup).unwrap();
        assert_eq!(text, "[[Note A]]");
    }

    #[test]
    fn shortest_without_lookup_degrades_to_vault_path() {
        let mut opts = GenerateOptions::new("deep/Note.md", "src.md");
        opts.path_style = PathStyle::Shortest;
        let text = generate(&opts, &host_wikilink_shortest(), &NoShortestLookup).unwrap();
        assert_eq!(text, "[[deep/Note]]");
    }

    #[test]
    fn redundant_wikilink_alias_is_dropped() {
        let mut opts = GenerateOptions::new("Note A.md", "src.md");
        opts.link_style = LinkStyle::Wikilink;
        opts.path_style = PathStyle::AbsoluteInVault;
        opts.alias = Some("note a".to_string());
        assert_eq!(gen(&opts, &host_markdown_relative()), "[[Note A]]");

        opts.alias = Some("Something else".to_string());
        assert_eq!(
            gen(&opts, &host_markdown_relative()),
            "[[Note A|Something else]]"
        );
    }

    #[test]
    fn embed_alias_policy_empty_allowed() {
        let mut opts = GenerateOptions::new("image.png", "src.md");
        opts.link_style = LinkStyle::Markdown;
        opts.path_style = PathStyle::AbsoluteInVault;
        opts.allow_empty_embed_alias = Some(true);
        assert_eq!(gen(&opts, &host_markdown_relative()), "![](image.png)");
    }

    #[test]
    fn embed_alias_policy_synthesized_with_extension() {
        let mut opts = GenerateOptions::new("image.png", "src.md");
        opts.link_style = LinkStyle::Markdown;
        opts.path_style = PathStyle::AbsoluteInVault;
        opts.allow_empty_embed_alias = Some(false);
        opts.include_extension_in_embed_alias = Some(true);
        assert_eq!(gen(&opts, &host_markdown_relative()), "![image.png](image.png)");

        opts.include_extension_in_embed_alias = Some(false);
        assert_eq!(gen(&opts, &host_markdown_relative()), "![image](image.png)");
    }

    #[test]
    fn attachments_embed_by_default_notes_do_not() {
        let mut opts = GenerateOptions::new("image.png", "src.md");
        opts.path_style = PathStyle::AbsoluteInVault;
        assert_eq!(gen(&opts, &host_wikilink_shortest()), "![[image.png]]");

        let mut opts = GenerateOptions::new("Note.md", "src.md");
        opts.path_style = PathStyle::AbsoluteInVault;
        assert_eq!(gen(&opts, &host_wikilink_shortest()), "[[Note]]");
    }

    #[test]
    fn unresolved_target_is_an_error_unless_allowed() {
        let mut opts = GenerateOptions::new("ghost.md", "src.md");
        opts.target_exists = false;
        let err = generate(&opts, &host_markdown_relative(), &NoShortestLookup).unwrap_err();
        assert_eq!(err, GenerateError::UnresolvedTarget("ghost.md".to_string()));

        opts.allow_nonexistent_target = true;
        opts.link_style = LinkStyle::Wikilink;
        assert_eq!(gen(&opts, &host_markdown_relative()), "[[ghost]]");
    }

    #[test]
    fn alias_escaping_for_markdown_links() {
        let mut opts = GenerateOptions::new("Note.md", "src.md");
        opts.link_style = LinkStyle::Markdown;
        opts.path_style = PathStyle::AbsoluteInVault;
        opts.alias = Some("a[b]c".to_string());
        opts.escape_alias = true;
        assert_eq!(gen(&opts, &host_markdown_relative()), r"[a\[b\]c](Note.md)");
    }

    #[test]
    fn backslash_is_percent_encoded() {
        let mut opts = GenerateOptions::new(r"odd\name.md", "src.md");
        opts.link_style = LinkStyle::Markdown;
        opts.path_style = PathStyle::AbsoluteInVault;
        assert_eq!(gen(&opts, &host_markdown_relative()), r"[odd\name](odd%5Cname.md)");
    }

    #[test]
    fn round_trip_between_notations_points_at_the_same_target() {
        // Markdown -> wikilink -> markdown, equivalent options.
        let mut opts = GenerateOptions::new("dir/Note A.md", "dir/src.md");
        opts.subpath = Some("#Heading".to_string());
        opts.use_leading_dot = Some(true);
        opts.link_style = LinkStyle::Markdown;
        let md = gen(&opts, &host_markdown_relative());
        assert_eq!(md, "[Note A](./Note%20A.md#Heading)");

        opts.link_style = LinkStyle::Wikilink;
        opts.original_link = Some(md);
        let wiki = gen(&opts, &host_markdown_relative());
        assert_eq!(wiki, "[[./Note A#Heading]]");

        opts.link_style = LinkStyle::Markdown;
        opts.original_link = Some(wiki);
        assert_eq!(gen(&opts, &host_markdown_relative()), "[Note A](./Note%20A.md#Heading)");
    }
}
