//! Vault path helpers.
//!
//! Vault paths are `/`-separated and relative to the vault root, the
//! form the host index reports them in. They never carry OS separators
//! or drive prefixes, so plain string handling is both sufficient and
//! portable.

pub const MARKDOWN_EXTENSION: &str = "md";

/// Directory portion of a vault path; empty string for the vault root.
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Last path segment.
pub fn file_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Last path segment without its extension.
pub fn file_stem(path: &str) -> &str {
    let name = file_name(path);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    }
}

pub fn extension(path: &str) -> Option<&str> {
    let name = file_name(path);
    match name.rfind('.') {
        Some(0) | None => None,
        Some(idx) => Some(&name[idx + 1..]),
    }
}

pub fn is_markdown(path: &str) -> bool {
    extension(path).is_some_and(|ext| ext.eq_ignore_ascii_case(MARKDOWN_EXTENSION))
}

/// Join a directory and a name; the directory may be empty (vault root).
pub fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

/// Strip the trailing `.md` of a note path; attachments are untouched.
pub fn without_markdown_extension(path: &str) -> &str {
    if is_markdown(path) {
        &path[..path.len() - MARKDOWN_EXTENSION.len() - 1]
    } else {
        path
    }
}

/// Collapse `.` and `..` segments. Returns `None` when `..` would climb
/// above the vault root, i.e. the path does not denote a vault file.
pub fn normalize(path: &str) -> Option<String> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    Some(segments.join("/"))
}

/// Relative path from `from_dir` (a directory, empty for the vault
/// root) to the file `to`.
pub fn relative_between(from_dir: &str, to: &str) -> String {
    let from: Vec<&str> = from_dir.split('/').filter(|s| !s.is_empty()).collect();
    let to_segments: Vec<&str> = to.split('/').filter(|s| !s.is_empty()).collect();

    // The final segment of `to` is the file name and never part of the
    // common directory prefix.
    let to_dirs = to_segments.len().saturating_sub(1);
    let mut common = 0;
    while common < from.len() && common < to_dirs && from[common] == to_segments[common] {
        common += 1;
    }

    let mut parts: Vec<&str> = Vec::new();
    for _ in common..from.len() {
        parts.push("..");
    }
    parts.extend(&to_segments[common..]);
    parts.join("/")
}
