//! Deterministic mapping from a fetched URL to an on-disk save path, and
//! from one save path to another expressed relative to it.
//!
//! Both functions are pure: same input, same output, every time. That's
//! what lets the parse stage rewrite a page's links before the linked
//! pages have actually been fetched or saved — see the rewrite step in
//! [`crate::pipeline::save`].

use std::path::{Path, PathBuf};

use url::Url;

/// Maps a URL to a path relative to the output directory.
///
/// The directory and base name come from the URL's path component, with
/// trailing slashes collapsed the way Unix path-splitting does — only a
/// bare `/` or an empty path counts as "no name". A missing name falls back
/// to `fallback_name`; if that's also empty, the name is the hex MD5 of the
/// whole URL, so extension-less, name-less assets such as
/// `https://example.com/api/avatar` still get a stable, unique filename.
pub fn resolve_save_path(url: &Url, fallback_name: &str, ext: &str) -> PathBuf {
    let url_path = url.path();
    let dir = path_dirname(url_path);
    let mut name = path_base(url_path);

    if name == "." || name == "/" {
        name = fallback_name.to_string();
    }
    if name.is_empty() {
        name = hex::encode(md5::compute(url.as_str()).0);
    }
    if !ext.is_empty() {
        name = format!("{name}.{ext}");
    }

    Path::new(&dir).join(name)
}

/// Last path segment after stripping trailing slashes; `.` for an empty
/// path, `/` for an all-slash path.
fn path_base(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let mut trimmed = path;
    while !trimmed.is_empty() && trimmed.ends_with('/') {
        trimmed = &trimmed[..trimmed.len() - 1];
    }
    match trimmed.rfind('/') {
        Some(idx) => {
            let base = &trimmed[idx + 1..];
            if base.is_empty() { "/".to_string() } else { base.to_string() }
        }
        None if trimmed.is_empty() => "/".to_string(),
        None => trimmed.to_string(),
    }
}

/// Everything before the last path segment, cleaned of duplicate and
/// trailing slashes (root `/` excepted).
fn path_dirname(path: &str) -> String {
    let dir = match path.rfind('/') {
        Some(idx) => &path[..idx + 1],
        None => "",
    };
    path_clean(dir)
}

fn path_clean(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let mut result = String::new();
    let mut prev_slash = false;
    for c in path.chars() {
        if c == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        result.push(c);
    }
    if result.len() > 1 && result.ends_with('/') {
        result.pop();
    }
    result
}

/// Expresses `target` relative to the directory containing `from`, with a
/// leading `./` so the result always reads as a relative reference.
pub fn relative_url(from: &Path, target: &Path) -> String {
    let from_dir = from.parent().unwrap_or(Path::new(""));
    let rel = match pathdiff::diff_paths(target, from_dir) {
        Some(rel) => rel,
        None => {
            return format!(
                "./{}",
                target.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
            );
        }
    };

    let rel = rel.to_string_lossy().replace(std::path::MAIN_SEPARATOR, "/");
    if rel.starts_with('.') {
        rel
    } else {
        format!("./{rel}")
    }
}
