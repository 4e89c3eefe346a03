//! Utility functions for saving retrieved files

use crate::config::FileCollisionAction;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Highest ` (n)` suffix tried before giving up
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Longest filename (in characters) kept from a server-supplied name
const MAX_FILENAME_CHARS: usize = 200;

/// Pick the path a retrieved file should be written to
///
/// `Rename` appends ` (n)` before the extension until the name is free,
/// `Skip` refuses to touch an existing file and `Overwrite` returns `path`
/// unchanged.
///
/// # Examples
///
/// ```
/// use videomax_client::utils::get_unique_path;
/// use videomax_client::config::FileCollisionAction;
/// use std::path::Path;
///
/// let path = Path::new("/tmp/videomax-doc-missing/clip.mp4");
/// let unique = get_unique_path(path, FileCollisionAction::Rename).unwrap();
/// assert_eq!(unique, path);
/// ```
pub fn get_unique_path(path: &Path, action: FileCollisionAction) -> Result<PathBuf> {
    if !path.exists() || action == FileCollisionAction::Overwrite {
        return Ok(path.to_path_buf());
    }
    if action == FileCollisionAction::Skip {
        return Err(Error::FileCollision {
            path: path.to_path_buf(),
            reason: "file exists and collisions are skipped".to_string(),
        });
    }

    let invalid = |reason: &str| Error::InvalidPath {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| invalid("no file stem"))?;
    let parent = path.parent().ok_or_else(|| invalid("no parent directory"))?;
    let suffix = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default();

    (1..=MAX_RENAME_ATTEMPTS)
        .map(|n| parent.join(format!("{} ({}){}", stem, n, suffix)))
        .find(|candidate| !candidate.exists())
        .ok_or_else(|| Error::FileCollision {
            path: path.to_path_buf(),
            reason: format!("no free name after {} attempts", MAX_RENAME_ATTEMPTS),
        })
}

/// Make a server-supplied filename safe to join onto a local directory
///
/// Strips directory components and characters that are invalid on common
/// filesystems, collapses whitespace and caps the length. Returns `None`
/// when nothing usable remains.
#[must_use]
pub fn sanitize_filename(name: &str) -> Option<String> {
    // last component only, whichever separator the server used
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '|' | '?' | '*') && !c.is_control())
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated: String = collapsed.chars().take(MAX_FILENAME_CHARS).collect();
    let trimmed = truncated.trim_matches('.').trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Name to save a retrieved file under
///
/// Tries the Content-Disposition header (plain and RFC 5987 `filename*=` forms),
/// then the last segment of `url`, then `"download"`. The extension is kept and
/// the result is passed through [`sanitize_filename`].
pub fn extract_filename_from_response(response: &reqwest::Response, url: &str) -> String {
    if let Some(content_disposition) = response.headers().get(reqwest::header::CONTENT_DISPOSITION)
        && let Ok(value) = content_disposition.to_str()
        && let Some(name) = filename_from_content_disposition(value)
        && let Some(safe) = sanitize_filename(&name)
    {
        return safe;
    }

    if let Ok(parsed_url) = url::Url::parse(url)
        && let Some(mut segments) = parsed_url.path_segments()
        && let Some(last_segment) = segments.next_back()
        && !last_segment.is_empty()
    {
        let decoded = urlencoding::decode(last_segment)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| last_segment.to_string());
        if let Some(safe) = sanitize_filename(&decoded) {
            return safe;
        }
    }

    "download".to_string()
}

fn filename_from_content_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    for part in value.split(';') {
        let part = part.trim();
        if let Some(encoded) = part.strip_prefix("filename*=") {
            // charset'lang'encoded-filename; preferred over the plain form
            if let Some(idx) = encoded.rfind('\'')
                && let Ok(decoded) = urlencoding::decode(&encoded[idx + 1..])
            {
                return Some(decoded.into_owned());
            }
        } else if let Some(name) = part.strip_prefix("filename=") {
            plain = Some(name.trim_matches('"').to_string());
        }
    }
    plain
}
