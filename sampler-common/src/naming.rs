//! Preset name codec
//!
//! Maps a human-chosen preset name to the folder name used on disk and to the
//! URL-safe slug stored alongside the preset. Pure functions, no I/O.

use crate::{Error, Result};

/// Characters never allowed in a folder or file name component
const RESERVED_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Reject empty and whitespace-only preset names
pub fn validate_preset_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput(
            "Preset name must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Canonical folder name for a preset
///
/// The name is trimmed and every path separator, control character or
/// reserved character is replaced with `_`, so the result is always a single
/// path component below the store root.
pub fn folder_name(name: &str) -> Result<String> {
    validate_preset_name(name)?;
    sanitize_component(name)
        .ok_or_else(|| Error::InvalidInput(format!("Preset name '{}' is not usable as a folder", name)))
}

/// Sanitized filename for an uploaded sample
///
/// Browsers may send full client paths, so only the last segment is kept.
pub fn sample_file_name(raw: &str) -> Result<String> {
    let base = raw
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(raw);
    sanitize_component(base)
        .ok_or_else(|| Error::InvalidInput(format!("Invalid sample filename '{}'", raw)))
}

/// URL-safe identifier for a preset name
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        "preset".to_string()
    } else {
        slug
    }
}

/// Split `kick.wav` into (`kick`, `.wav`); files without an extension get ""
pub fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(idx) if idx > 0 => filename.split_at(idx),
        _ => (filename, ""),
    }
}

/// Default display name of an uploaded sample: the filename without extension
pub fn display_name_from_file(filename: &str) -> String {
    split_extension(filename).0.to_string()
}

/// Storage path of a sample relative to the store root
pub fn storage_path(folder: &str, filename: &str) -> String {
    format!("{}/{}", folder, filename)
}

fn sanitize_component(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        return None;
    }

    let cleaned: String = trimmed
        .chars()
        .map(|c| {
            if c.is_control() || RESERVED_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect();

    Some(cleaned)
}
