//! Offset-addressed content patching.
//!
//! Applies a batch of known substring replacements to a document in one
//! linear pass. The batch is untrusted in two ways: the upstream index
//! may report the same span twice (collapsed), and the document may
//! have changed since the spans were computed (detected and reported so
//! the caller can re-run the whole cycle).

use thiserror::Error;

use crate::model::ReplacementSpan;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    /// Two non-identical spans overlap. This means the upstream index
    /// handed out inconsistent offsets; patching would corrupt content.
    #[error("replacement spans overlap: {first_start}..{first_end} and {second_start}..{second_end}")]
    Overlap {
        first_start: usize,
        first_end: usize,
        second_start: usize,
        second_end: usize,
    },

    #[error("replacement span {start}..{end} is outside the document (length {len})")]
    OutOfBounds { start: usize, end: usize, len: usize },

    /// The document no longer contains the recorded text at the span's
    /// offsets: it was modified between read and patch time.
    #[error("document changed under span {start}..{end}; expected {expected:?}")]
    ContentMismatch {
        start: usize,
        end: usize,
        expected: String,
    },
}

/// Apply `spans` to `text`, producing the patched document.
///
/// Spans are sorted by start offset; adjacent fully identical spans are
/// collapsed to one. Every span is verified against the current text
/// before being applied, so a stale batch surfaces as
/// [`PatchError::ContentMismatch`] instead of silent corruption.
pub fn apply_replacements(text: &str, spans: &[ReplacementSpan]) -> Result<String, PatchError> {
    let mut ordered: Vec<&ReplacementSpan> = spans.iter().collect();
    ordered.sort_by_key(|span| (span.start, span.end));

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0usize;
    let mut previous: Option<&ReplacementSpan> = None;

    for span in ordered {
        if span.start > span.end || span.end > text.len() {
            return Err(PatchError::OutOfBounds {
                start: span.start,
                end: span.end,
                len: text.len(),
            });
        }
        if let Some(prev) = previous {
            if span.start < prev.end {
                if span == prev {
                    // Duplicate report of the same occurrence; keep one.
                    continue;
                }
                return Err(PatchError::Overlap {
                    first_start: prev.start,
                    first_end: prev.end,
                    second_start: span.start,
                    second_end: span.end,
                });
            }
        }
        if !text.is_char_boundary(span.start)
            || !text.is_char_boundary(span.end)
            || &text[span.start..span.end] != span.old_content
        {
            return Err(PatchError::ContentMismatch {
                start: span.start,
                end: span.end,
                expected: span.old_content.clone(),
            });
        }

        out.push_str(&text[cursor..span.start]);
        out.push_str(&span.new_content);
        cursor = span.end;
        previous = Some(span);
    }

    out.push_str(&text[cursor..]);
    Ok(out)
}

/// True when the current text still matches every span's recorded
/// content, i.e. a patch computed from these spans would still apply.
pub fn spans_match(text: &str, spans: &[ReplacementSpan]) -> bool {
    spans.iter().all(|span| {
        span.end <= text.len()
            && text.is_char_boundary(span.start)
            && text.is_char_boundary(span.end)
            && &text[span.start..span.end] == span.old_content
    })
}
