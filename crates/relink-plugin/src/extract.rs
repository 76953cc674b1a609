//! Occurrence extraction helpers shared by the conversion paths.

use relink_core::model::LinkOccurrence;
use relink_core::occurrence::{normalize_occurrences, split_subpath};
use relink_core::vpath;

use crate::host::{HostError, LinkIndex};
use crate::session::Session;

/// Occurrences of one document from the index, ordered and with
/// duplicate footnote reports collapsed.
pub async fn document_occurrences(
    session: &Session,
    path: &str,
) -> Result<Vec<LinkOccurrence>, HostError> {
    let raw = session.index.occurrences(path).await?;
    Ok(normalize_occurrences(raw))
}

/// Backlink occurrences of `path`, grouped by referencing document and
/// normalized per document.
pub async fn backlink_occurrences(
    session: &Session,
    path: &str,
) -> Result<Vec<(String, Vec<LinkOccurrence>)>, HostError> {
    let raw = session.index.backlinks(path).await?;
    Ok(raw
        .into_iter()
        .map(|(doc, occurrences)| (doc, normalize_occurrences(occurrences)))
        .collect())
}

/// Resolve an occurrence's written target to a vault path.
///
/// Hosts commonly fail to resolve relative paths that climb above the
/// source's folder even when the target exists, so an initial miss is
/// retried with the `../` segments stripped.
pub async fn resolve_target(
    index: &dyn LinkIndex,
    link_path: &str,
    source_path: &str,
) -> Option<String> {
    if link_path.is_empty() {
        return Some(source_path.to_string());
    }
    if let Some(path) = index.resolve(link_path, source_path).await {
        return Some(path);
    }
    let stripped = link_path.trim_start_matches("../");
    if stripped != link_path {
        return index.resolve(stripped, source_path).await;
    }
    None
}

/// Whether a written link path denotes `target_path`, judged from the
/// path alone. Needed after a rename, when the index no longer
/// resolves links that still point at the old location.
pub fn written_path_points_at(link_path: &str, source_path: &str, target_path: &str) -> bool {
    let matches = |path: &str| {
        path == target_path
            || (vpath::extension(path).is_none() && format!("{path}.md") == target_path)
    };

    if let Some(stripped) = link_path.strip_prefix('/') {
        return matches(stripped);
    }
    if matches(link_path) {
        return true;
    }
    let joined = vpath::join(vpath::parent_dir(source_path), link_path);
    if let Some(normalized) = vpath::normalize(&joined) {
        if matches(&normalized) {
            return true;
        }
    }
    if !link_path.contains('/') {
        return vpath::file_name(target_path) == link_path
            || (vpath::is_markdown(target_path) && vpath::file_stem(target_path) == link_path);
    }
    false
}

/// Written path and subpath of an occurrence, the latter kept verbatim.
pub fn occurrence_parts(occurrence: &LinkOccurrence) -> (String, Option<String>) {
    let full = match &occurrence.subpath {
        Some(subpath) => format!("{}{}", occurrence.link_path, subpath),
        None => occurrence.link_path.clone(),
    };
    let (path, subpath) = split_subpath(&full);
    (path.to_string(), subpath.map(str::to_string))
}
