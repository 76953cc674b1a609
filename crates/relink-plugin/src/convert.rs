//! Conversion and rename-update orchestration.
//!
//! All writes go through a read, patch, digest-checked write loop:
//! the file is re-read and the spans rebuilt whenever the content
//! moved underneath us, up to a bounded number of attempts.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use relink_core::filter::PatternError;
use relink_core::model::{GenerateOptions, LinkOccurrence, ReplacementSpan};
use relink_core::occurrence::split_subpath;
use relink_core::patch::{apply_replacements, PatchError};
use relink_core::settings::PluginSettings;
use relink_core::{generate, vpath, GenerateError, LinkPathLookup};

use crate::extract::{
    backlink_occurrences, document_occurrences, occurrence_parts, resolve_target,
    written_path_points_at,
};
use crate::host::{HostError, LinkIndex, NoticeSink, VaultFiles};
use crate::session::Session;

const MAX_WRITE_ATTEMPTS: u32 = 5;

/// What triggered a conversion. The path filter only gates automatic
/// runs; the host compatibility check applies to every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertOrigin {
    Automatic,
    Explicit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertOutcome {
    Converted(usize),
    Unchanged,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Excluded,
    IncompatibleHost,
    AutoConvertDisabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Patch(PatchError),
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error("conversion of `{path}` was cancelled")]
    Cancelled { path: String },
    #[error("gave up on `{path}` after {attempts} concurrent edits")]
    RetriesExhausted { path: String, attempts: u32 },
}

/// Summary of a multi-file run. Individual failures do not abort the
/// run; they are collected here and logged.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConvertReport {
    pub files_changed: usize,
    pub links_changed: usize,
    pub failures: Vec<(String, String)>,
    pub cancelled: bool,
}

// The index's shortest-path lookup is async; the pure generator gets
// a prefetched answer instead of the index itself.
struct PrefetchedLookup {
    shortest: std::collections::HashMap<(String, String), Option<String>>,
}

impl LinkPathLookup for PrefetchedLookup {
    fn shortest_link_path(&self, target_path: &str, source_path: &str) -> Option<String> {
        self.shortest
            .get(&(target_path.to_string(), source_path.to_string()))
            .cloned()
            .flatten()
    }
}

fn options_for(
    settings: &PluginSettings,
    occurrence: &LinkOccurrence,
    target_path: String,
    source_path: &str,
    subpath: Option<String>,
) -> GenerateOptions {
    let mut opts = GenerateOptions::new(target_path, source_path);
    opts.subpath = subpath;
    opts.alias = occurrence
        .display_text
        .clone()
        .filter(|alias| !alias.is_empty());
    opts.is_embed = Some(occurrence.is_embed());
    opts.link_style = settings.link_style(true);
    opts.original_link = Some(occurrence.original.clone());
    opts.use_angle_brackets = Some(settings.use_angle_brackets);
    opts.use_leading_dot = Some(settings.use_leading_dot);
    opts.use_leading_slash = Some(settings.use_leading_slash);
    opts.allow_empty_embed_alias = Some(settings.allow_empty_embed_alias);
    opts.include_extension_in_embed_alias =
        Some(settings.include_attachment_extension_in_embed_alias);
    opts.escape_alias = true;
    opts
}

/// Build the replacement spans for one document's current occurrences.
/// Unresolvable links are left untouched.
async fn build_spans(
    session: &Session,
    settings: &PluginSettings,
    path: &str,
    occurrences: &[LinkOccurrence],
) -> Vec<ReplacementSpan> {
    let defaults = session.style_defaults().await;
    let mut spans = Vec::new();
    for occurrence in occurrences {
        let (link_path, subpath) = occurrence_parts(occurrence);
        let Some(target) = resolve_target(session.index.as_ref(), &link_path, path).await else {
            continue;
        };
        let opts = options_for(settings, occurrence, target.clone(), path, subpath);

        let mut lookup = PrefetchedLookup {
            shortest: Default::default(),
        };
        let shortest = session.index.shortest_link_path(&target, path).await;
        lookup
            .shortest
            .insert((target, path.to_string()), shortest);

        let new_content = match generate(&opts, &defaults, &lookup) {
            Ok(text) => text,
            Err(GenerateError::UnresolvedTarget(link)) => {
                log::warn!("leaving unresolved link `{link}` in `{path}` as written");
                continue;
            }
        };
        let span = ReplacementSpan {
            start: occurrence.start,
            end: occurrence.end,
            old_content: occurrence.original.clone(),
            new_content,
        };
        if !span.is_noop() {
            spans.push(span);
        }
    }
    spans
}

/// Convert every link in one document to the configured style.
pub async fn convert_file(
    session: &Session,
    path: &str,
    origin: ConvertOrigin,
    token: &CancellationToken,
) -> Result<ConvertOutcome, ConvertError> {
    let settings = session.settings().await;
    // An explicit command on one file is always obeyed; the filter
    // gates automatic work and bulk enumeration.
    if origin == ConvertOrigin::Automatic && settings.path_filter()?.is_ignored(path) {
        return Ok(ConvertOutcome::Skipped(SkipReason::Excluded));
    }
    if !session.check_host_compatibility().await {
        return Ok(ConvertOutcome::Skipped(SkipReason::IncompatibleHost));
    }

    for attempt in 1..=MAX_WRITE_ATTEMPTS {
        if token.is_cancelled() {
            return Err(ConvertError::Cancelled {
                path: path.to_string(),
            });
        }

        let snapshot = session.files.read(path).await?;
        let occurrences = document_occurrences(session, path).await?;
        let spans = build_spans(session, &settings, path, &occurrences).await;
        if spans.is_empty() {
            return Ok(ConvertOutcome::Unchanged);
        }

        let patched = match apply_replacements(&snapshot.content, &spans) {
            Ok(patched) => patched,
            Err(PatchError::ContentMismatch { .. }) => {
                // The index lagged behind an edit; re-read and rebuild.
                log::debug!("stale spans for `{path}`, attempt {attempt}");
                continue;
            }
            Err(e) => return Err(ConvertError::Patch(e)),
        };

        if token.is_cancelled() {
            return Err(ConvertError::Cancelled {
                path: path.to_string(),
            });
        }
        match session
            .files
            .write(path, &snapshot.digest, &patched)
            .await
        {
            Ok(()) => return Ok(ConvertOutcome::Converted(spans.len())),
            Err(HostError::Conflict(_)) => {
                log::debug!("write conflict on `{path}`, attempt {attempt}");
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(ConvertError::RetriesExhausted {
        path: path.to_string(),
        attempts: MAX_WRITE_ATTEMPTS,
    })
}

/// Convert every markdown file under `folder` (the whole vault when
/// `folder` is empty). One shared token cancels the remaining files;
/// cancellation ends the run quietly with the report built so far.
pub async fn convert_folder(
    session: &Session,
    folder: &str,
    origin: ConvertOrigin,
    token: &CancellationToken,
) -> Result<ConvertReport, ConvertError> {
    let mut paths = session.files.list_markdown_files().await?;
    if !folder.is_empty() {
        let prefix = format!("{folder}/");
        paths.retain(|path| path.starts_with(&prefix));
    }
    let filter = session.settings().await.path_filter()?;
    paths.retain(|path| !filter.is_ignored(path));
    paths.sort();

    let total = paths.len();
    let mut report = ConvertReport::default();
    for (i, path) in paths.iter().enumerate() {
        if token.is_cancelled() {
            log::debug!("conversion cancelled after {i} of {total} notes");
            report.cancelled = true;
            break;
        }
        session
            .notices
            .notify(&format!(
                "Converting links in note {}/{total}: {path}",
                i + 1
            ))
            .await;
        match convert_file(session, path, origin, token).await {
            Ok(ConvertOutcome::Converted(n)) => {
                report.files_changed += 1;
                report.links_changed += n;
            }
            Ok(_) => {}
            Err(ConvertError::Cancelled { .. }) => {
                report.cancelled = true;
                break;
            }
            Err(e) => {
                log::warn!("failed to convert `{path}`: {e}");
                report.failures.push((path.clone(), e.to_string()));
            }
        }
    }
    Ok(report)
}

pub async fn convert_vault(
    session: &Session,
    origin: ConvertOrigin,
    token: &CancellationToken,
) -> Result<ConvertReport, ConvertError> {
    convert_folder(session, "", origin, token).await
}

/// Editor-change hook. Supersedes any in-flight conversion for the
/// same document; getting superseded is silent.
pub async fn handle_document_changed(
    session: &Session,
    path: &str,
) -> Result<ConvertOutcome, ConvertError> {
    if !session.settings().await.auto_convert_new_links {
        return Ok(ConvertOutcome::Skipped(SkipReason::AutoConvertDisabled));
    }
    let (seq, token) = session.begin_document_work(path).await;
    let result = convert_file(session, path, ConvertOrigin::Automatic, &token).await;
    session.finish_document_work(path, seq).await;
    match result {
        Err(ConvertError::Cancelled { .. }) => Ok(ConvertOutcome::Unchanged),
        other => other,
    }
}

/// React to a file moving from `old_path` to `new_path`: rewrite the
/// moved note's own relative links, then every link that pointed at it.
pub async fn update_links_for_rename(
    session: &Session,
    old_path: &str,
    new_path: &str,
    token: &CancellationToken,
) -> Result<ConvertReport, ConvertError> {
    let settings = session.settings().await;
    if !settings.update_links_on_rename {
        return Ok(ConvertReport::default());
    }
    let mut report = ConvertReport::default();

    // Links inside the moved note only break when its folder changed.
    if vpath::is_markdown(new_path) && vpath::parent_dir(old_path) != vpath::parent_dir(new_path) {
        let n = rewrite_internal_links(session, &settings, old_path, new_path, token).await?;
        if n > 0 {
            report.files_changed += 1;
            report.links_changed += n;
        }
    }

    let filter = settings.path_filter()?;
    for (doc, occurrences) in rename_backlinks(session, old_path, new_path).await? {
        if filter.is_ignored(&doc) {
            continue;
        }
        let n = rewrite_backlinks(session, &settings, &doc, new_path, &occurrences, token).await?;
        if n > 0 {
            report.files_changed += 1;
            report.links_changed += n;
        }
    }
    Ok(report)
}

/// Occurrences that pointed at `old_path`, per referencing document.
///
/// The index's backlink map may already key by the new path, or drop
/// stale relative links entirely, so it is unioned with a scan that
/// judges each written path on its own.
async fn rename_backlinks(
    session: &Session,
    old_path: &str,
    new_path: &str,
) -> Result<Vec<(String, Vec<LinkOccurrence>)>, ConvertError> {
    let mut per_doc: std::collections::BTreeMap<String, Vec<LinkOccurrence>> =
        Default::default();
    for (doc, occurrences) in backlink_occurrences(session, old_path).await? {
        per_doc.entry(doc).or_default().extend(occurrences);
    }
    for doc in session.files.list_markdown_files().await? {
        if doc == new_path || doc == old_path {
            continue;
        }
        for occurrence in document_occurrences(session, &doc).await? {
            let (link_path, _) = occurrence_parts(&occurrence);
            if link_path.is_empty() {
                continue;
            }
            let resolved = resolve_target(session.index.as_ref(), &link_path, &doc).await;
            let points_at_old = match resolved.as_deref() {
                // The index still resolves this link somewhere. Follow
                // it only when that somewhere is the renamed file, so a
                // namesake note elsewhere keeps its own backlinks.
                Some(resolved) => resolved == new_path || resolved == old_path,
                // Unresolvable after the move; judge the written path.
                None => written_path_points_at(&link_path, &doc, old_path),
            };
            if points_at_old {
                per_doc.entry(doc.clone()).or_default().push(occurrence);
            }
        }
    }
    Ok(per_doc
        .into_iter()
        .filter(|(doc, _)| doc != new_path && doc != old_path)
        .map(|(doc, occurrences)| {
            (
                doc,
                relink_core::occurrence::normalize_occurrences(occurrences),
            )
        })
        .collect())
}

/// Rewrite the moved note's own links, resolving each written path
/// against the note's old location.
async fn rewrite_internal_links(
    session: &Session,
    settings: &PluginSettings,
    old_path: &str,
    new_path: &str,
    token: &CancellationToken,
) -> Result<usize, ConvertError> {
    write_rewritten(session, new_path, token, |occurrences| async move {
        let defaults = session.style_defaults().await;
        let mut spans = Vec::new();
        for occurrence in &occurrences {
            let (link_path, subpath) = occurrence_parts(occurrence);
            let Some(target) =
                resolve_target(session.index.as_ref(), &link_path, old_path).await
            else {
                continue;
            };
            if target == old_path {
                // Self-links follow the note wherever it goes.
                continue;
            }
            let opts = options_for(settings, occurrence, target, new_path, subpath);
            if let Ok(text) = generate(&opts, &defaults, &relink_core::NoShortestLookup) {
                let span = ReplacementSpan {
                    start: occurrence.start,
                    end: occurrence.end,
                    old_content: occurrence.original.clone(),
                    new_content: text,
                };
                if !span.is_noop() {
                    spans.push(span);
                }
            }
        }
        spans
    })
    .await
}

/// Rewrite one referencing document's occurrences to point at the
/// renamed file's new path.
async fn rewrite_backlinks(
    session: &Session,
    settings: &PluginSettings,
    doc: &str,
    new_target: &str,
    occurrences: &[LinkOccurrence],
    token: &CancellationToken,
) -> Result<usize, ConvertError> {
    write_rewritten(session, doc, token, |_current| {
        let occurrences = occurrences.to_vec();
        async move {
            let defaults = session.style_defaults().await;
            let mut spans = Vec::new();
            for occurrence in &occurrences {
                let (_, subpath) = occurrence_parts(occurrence);
                let opts =
                    options_for(settings, occurrence, new_target.to_string(), doc, subpath);
                if let Ok(text) = generate(&opts, &defaults, &relink_core::NoShortestLookup) {
                    let span = ReplacementSpan {
                        start: occurrence.start,
                        end: occurrence.end,
                        old_content: occurrence.original.clone(),
                        new_content: text,
                    };
                    if !span.is_noop() {
                        spans.push(span);
                    }
                }
            }
            spans
        }
    })
    .await
}

/// Shared read, build, patch, digest-checked write loop.
async fn write_rewritten<F, Fut>(
    session: &Session,
    path: &str,
    token: &CancellationToken,
    build: F,
) -> Result<usize, ConvertError>
where
    F: Fn(Vec<LinkOccurrence>) -> Fut,
    Fut: std::future::Future<Output = Vec<ReplacementSpan>>,
{
    for attempt in 1..=MAX_WRITE_ATTEMPTS {
        if token.is_cancelled() {
            return Err(ConvertError::Cancelled {
                path: path.to_string(),
            });
        }
        let snapshot = session.files.read(path).await?;
        let occurrences = document_occurrences(session, path).await?;
        let spans = build(occurrences).await;
        if spans.is_empty() {
            return Ok(0);
        }
        let patched = match apply_replacements(&snapshot.content, &spans) {
            Ok(patched) => patched,
            Err(PatchError::ContentMismatch { .. }) => {
                log::debug!("stale spans for `{path}`, attempt {attempt}");
                continue;
            }
            Err(e) => return Err(ConvertError::Patch(e)),
        };
        match session.files.write(path, &snapshot.digest, &patched).await {
            Ok(()) => return Ok(spans.len()),
            Err(HostError::Conflict(_)) => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(ConvertError::RetriesExhausted {
        path: path.to_string(),
        attempts: MAX_WRITE_ATTEMPTS,
    })
}

// Hosts that rewrite links themselves sometimes mangle angle-bracket
// targets, producing `[alias](path with spaces.md>)` with the opening
// bracket lost.
static MANGLED_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(!?)\[(.*?)\]\(([^<]+?) .+?>\)$").unwrap());

/// Repair a host-proposed link replacement that hit the mangling
/// defect. Sound proposals pass through untouched.
pub async fn fix_proposed_change(
    session: &Session,
    mut span: ReplacementSpan,
    source_path: &str,
) -> ReplacementSpan {
    let Some(caps) = MANGLED_LINK_RE.captures(&span.new_content) else {
        return span;
    };
    let bang = caps.get(1).map_or("", |m| m.as_str());
    let alias = caps.get(2).map_or("", |m| m.as_str());
    let head = caps.get(3).map_or("", |m| m.as_str());

    // The head capture stops at the first space; recover the full
    // target from the proposal's raw tail.
    let tail_start = caps.get(3).map(|m| m.end()).unwrap_or(0);
    let raw_target = format!(
        "{head}{}",
        span.new_content[tail_start..]
            .trim_end_matches(')')
            .trim_end_matches('>')
    );
    let decoded = urlencoding::decode(&raw_target)
        .map(|s| s.into_owned())
        .unwrap_or(raw_target.clone());
    let (link_path, subpath) = split_subpath(&decoded);

    if let Some(target) = resolve_target(session.index.as_ref(), link_path, source_path).await {
        let settings = session.settings().await;
        let defaults = session.style_defaults().await;
        let mut opts = GenerateOptions::new(target, source_path);
        opts.subpath = subpath.map(str::to_string);
        opts.alias = Some(alias.to_string()).filter(|a| !a.is_empty());
        opts.is_embed = Some(bang == "!");
        opts.link_style = relink_core::model::LinkStyle::Markdown;
        opts.use_angle_brackets = Some(settings.use_angle_brackets);
        opts.use_leading_dot = Some(settings.use_leading_dot);
        opts.use_leading_slash = Some(settings.use_leading_slash);
        opts.allow_empty_embed_alias = Some(settings.allow_empty_embed_alias);
        opts.include_extension_in_embed_alias =
            Some(settings.include_attachment_extension_in_embed_alias);
        if let Ok(text) = generate(&opts, &defaults, &relink_core::NoShortestLookup) {
            span.new_content = text;
            return span;
        }
    }

    // Unresolvable target: restore the angle brackets and move on.
    span.new_content = format!("{bang}[{alias}](<{raw_target}>)");
    span
}

/// Apply host-proposed link updates to one document. Each proposal is
/// run through the mangling repair first, and every span is verified
/// against the current content before writing.
pub async fn apply_link_change_updates(
    session: &Session,
    path: &str,
    spans: Vec<ReplacementSpan>,
) -> Result<(), ConvertError> {
    let mut repaired = Vec::with_capacity(spans.len());
    for span in spans {
        repaired.push(fix_proposed_change(session, span, path).await);
    }
    for attempt in 1..=MAX_WRITE_ATTEMPTS {
        let snapshot = session.files.read(path).await?;
        let patched = match apply_replacements(&snapshot.content, &repaired) {
            Ok(patched) => patched,
            Err(PatchError::ContentMismatch { start, end, .. }) => {
                log::warn!(
                    "skipping link updates for `{path}`: content at {start}..{end} changed"
                );
                return Ok(());
            }
            Err(e) => return Err(ConvertError::Patch(e)),
        };
        match session.files.write(path, &snapshot.digest, &patched).await {
            Ok(()) => return Ok(()),
            Err(HostError::Conflict(_)) => {
                log::debug!("write conflict on `{path}`, attempt {attempt}");
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(ConvertError::RetriesExhausted {
        path: path.to_string(),
        attempts: MAX_WRITE_ATTEMPTS,
    })
}
