//! Markdown link scanner.
//!
//! Produces byte-offset [`LinkOccurrence`]s for a document, the shape
//! the reference host's link index hands out. Hosts with their own
//! index do not need this module; [`crate::memory::MemoryHost`] and
//! [`crate::vfs::DirectoryVault`] are built on it.

use pulldown_cmark::{Event, LinkType, Options, Parser, Tag, TagEnd};

use relink_core::model::LinkOccurrence;
use relink_core::occurrence::split_subpath;

struct PendingLink {
    start: usize,
    dest: String,
    is_wikilink: bool,
    display: String,
}

fn is_external(dest: &str) -> bool {
    dest.starts_with("http://")
        || dest.starts_with("https://")
        || dest.starts_with("mailto:")
        || dest.starts_with("obsidian://")
}

/// Scan one document for internal links, in source order.
pub fn scan_links(text: &str) -> Vec<LinkOccurrence> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_WIKILINKS);
    options.insert(Options::ENABLE_YAML_STYLE_METADATA_BLOCKS);

    let parser = Parser::new_ext(text, options);

    let mut occurrences = Vec::new();
    let mut pending: Option<PendingLink> = None;

    for (event, range) in parser.into_offset_iter() {
        match event {
            Event::Start(Tag::Link {
                link_type,
                dest_url,
                ..
            })
            | Event::Start(Tag::Image {
                link_type,
                dest_url,
                ..
            }) => {
                if is_external(&dest_url) {
                    continue;
                }
                pending = Some(PendingLink {
                    start: range.start,
                    dest: dest_url.to_string(),
                    is_wikilink: matches!(link_type, LinkType::WikiLink { .. }),
                    display: String::new(),
                });
            }
            Event::Text(t) | Event::Code(t) => {
                if let Some(pending) = pending.as_mut() {
                    pending.display.push_str(&t);
                }
            }
            Event::End(TagEnd::Link { .. }) | Event::End(TagEnd::Image) => {
                let Some(link) = pending.take() else {
                    continue;
                };

                // pulldown_cmark sometimes reports wikilink ranges
                // ending before the trailing brackets.
                let mut end = range.end;
                if link.is_wikilink {
                    while end < text.len() && text.as_bytes()[end] == b']' {
                        end += 1;
                    }
                }

                let dest = if link.is_wikilink {
                    link.dest.clone()
                } else {
                    urlencoding::decode(&link.dest)
                        .map(|s| s.into_owned())
                        .unwrap_or(link.dest.clone())
                };
                let (link_path, subpath) = split_subpath(&dest);

                let display = link.display.trim();
                let display_text = if display.is_empty() || display == dest {
                    None
                } else {
                    Some(display.to_string())
                };

                occurrences.push(LinkOccurrence {
                    original: text[link.start..end].to_string(),
                    start: link.start,
                    end,
                    link_path: link_path.to_string(),
                    subpath: subpath.map(str::to_string),
                    display_text,
                });
            }
            _ => {}
        }
    }
    occurrences
}
