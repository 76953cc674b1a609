//! Normalization of host-index link occurrences.

use crate::model::LinkOccurrence;

/// Split a written link target into path and `#…` subpath.
///
/// The subpath keeps its leading `#`. A target that is only a subpath
/// (`#Heading`, `#^block`) yields an empty path.
pub fn split_subpath(link: &str) -> (&str, Option<&str>) {
    match link.find('#') {
        Some(idx) => (&link[..idx], Some(&link[idx..])),
        None => (link, None),
    }
}

/// Order occurrences by start offset and collapse duplicates.
///
/// The host index is known to report the same literal span twice for
/// links inside footnotes; exact-equality deduplication of adjacent
/// entries is a workaround for that upstream defect, not a behavior of
/// our own. Overlapping non-identical entries are left in place; the
/// content patcher rejects them loudly.
pub fn normalize_occurrences(mut occurrences: Vec<LinkOccurrence>) -> Vec<LinkOccurrence> {
    occurrences.sort_by_key(|occ| (occ.start, occ.end));
    occurrences.dedup_by(|a, b| a.start == b.start && a.end == b.end && a.original == b.original);
    occurrences
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occ(start: usize, end: usize, original: &str) -> LinkOccurrence {
        LinkOccurrence {
            original: original.to_string(),
            start,
            end,
            link_path: original.trim_matches(['[', ']']).to_string(),
            subpath: None,
            display_text: None,
        }
    }

    #[test]
    fn splits_path_and_subpath() {
        assert_eq!(split_subpath("Note A#Heading"), ("Note A", Some("#Heading")));
        assert_eq!(split_subpath("Note A#^block"), ("Note A", Some("#^block")));
        assert_eq!(split_subpath("Note A"), ("Note A", None));
        assert_eq!(split_subpath("#Heading"), ("", Some("#Heading")));
    }

    #[test]
    fn sorts_by_start_offset() {
        let out = normalize_occurrences(vec![occ(10, 16, "[[b]]"), occ(0, 5, "[[a]]")]);
        assert_eq!(out[0].start, 0);
        assert_eq!(out[1].start, 10);
    }

    #[test]
    fn collapses_footnote_duplicates() {
        let out = normalize_occurrences(vec![
            occ(4, 9, "[[a]]"),
            occ(4, 9, "[[a]]"),
            occ(12, 17, "[[b]]"),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].original, "[[a]]");
        assert_eq!(out[1].original, "[[b]]");
    }

    #[test]
    fn keeps_distinct_occurrences_at_different_offsets() {
        let out = normalize_occurrences(vec![occ(0, 5, "[[a]]"), occ(6, 11, "[[a]]")]);
        assert_eq!(out.len(), 2);
    }
}
