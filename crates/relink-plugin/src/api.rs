//! Drop-in link generation entry point for other plugins and host
//! integrations that want links obeying this plugin's settings.

use relink_core::model::GenerateOptions;
use relink_core::{generate, GenerateError, LinkPathLookup};

use crate::host::LinkIndex;
use crate::session::Session;

// The index's shortest-path lookup is async; prefetch the single pair
// the generator could ask about.
struct PrefetchedLookup {
    shortest: Option<(String, String, String)>,
}

impl LinkPathLookup for PrefetchedLookup {
    fn shortest_link_path(&self, target_path: &str, source_path: &str) -> Option<String> {
        match &self.shortest {
            Some((target, source, path)) if target == target_path && source == source_path => {
                Some(path.clone())
            }
            _ => None,
        }
    }
}

/// Generate link text for `target_path` as written from `source_path`,
/// with this plugin's settings folded in. Mirrors the host's own
/// generate-link signature so callers can switch over unchanged.
pub async fn generate_markdown_link(
    session: &Session,
    target_path: &str,
    source_path: &str,
    subpath: Option<&str>,
    alias: Option<&str>,
) -> Result<String, GenerateError> {
    let settings = session.settings().await;
    let defaults = session.style_defaults().await;

    let mut opts = GenerateOptions::new(target_path, source_path);
    opts.subpath = subpath.map(str::to_string);
    opts.alias = alias.map(str::to_string).filter(|a| !a.is_empty());
    opts.link_style = settings.link_style(false);
    opts.use_angle_brackets = Some(settings.use_angle_brackets);
    opts.use_leading_dot = Some(settings.use_leading_dot);
    opts.use_leading_slash = Some(settings.use_leading_slash);
    opts.allow_empty_embed_alias = Some(settings.allow_empty_embed_alias);
    opts.include_extension_in_embed_alias =
        Some(settings.include_attachment_extension_in_embed_alias);

    let shortest = session
        .index
        .shortest_link_path(target_path, source_path)
        .await
        .map(|path| (target_path.to_string(), source_path.to_string(), path));
    let lookup = PrefetchedLookup { shortest };
    generate(&opts, &defaults, &lookup)
}
