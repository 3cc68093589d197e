//! Utility functions

use std::path::Path;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref ENTITY: Regex = Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").unwrap();
    static ref TAG: Regex = Regex::new(r"</?[a-zA-Z][^<>]*>").unwrap();
}

// ============================================================================
// File Extensions
// ============================================================================

/// Audio file extensions the local server recognises
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "ogg", "m4a", "aac"];

/// Image file extensions the local server recognises
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Fallback MIME type for unknown extensions
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Map a file path to a MIME type from its extension
///
/// # Example
/// ```
/// use bilisound::utils::mime_for_path;
/// assert_eq!(mime_for_path(std::path::Path::new("/music/a.FLAC")), "audio/flac");
/// ```
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "mp3" => "audio/mpeg",
        "flac" => "audio/flac",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => OCTET_STREAM,
    }
}

// ============================================================================
// Text Cleaning
// ============================================================================

fn decode_entity(caps: &Captures) -> String {
    let name = &caps[1];
    let decoded = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
    } else if let Some(dec) = name.strip_prefix('#') {
        dec.parse::<u32>().ok().and_then(char::from_u32)
    } else {
        match name {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some(' '),
            _ => None,
        }
    };

    match decoded {
        Some(c) => c.to_string(),
        // Unknown entity, leave it as written
        None => caps[0].to_string(),
    }
}

/// Decode HTML entities and strip markup tags from a remote title
///
/// Search results wrap matched keywords in `<em class="keyword">` and
/// encode punctuation as entities, sometimes twice. Decoding and stripping
/// repeat until the text stops changing, so the result is a fixed point:
/// applying this to an already clean title returns it unchanged.
pub fn clean_title(raw: &str) -> String {
    let mut current = raw.to_string();
    // Every pass that changes the text makes it strictly shorter
    loop {
        let decoded = ENTITY.replace_all(&current, decode_entity);
        let next = TAG.replace_all(&decoded, "").trim().to_string();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Normalise a protocol-relative cover URL (`//host/path`) to `https://`
pub fn normalize_cover_url(url: &str) -> String {
    match url.strip_prefix("//") {
        Some(rest) => format!("https://{}", rest),
        None => url.to_string(),
    }
}

/// Parse a `m:ss` or `h:mm:ss` duration into seconds
///
/// Plain integers are taken as seconds. Returns `None` for anything else.
pub fn parse_duration(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    text.split(':').try_fold(0u64, |acc, part| {
        let value: u64 = part.trim().parse().ok()?;
        acc.checked_mul(60)?.checked_add(value)
    })
}

/// Format seconds as `mm:ss`, or `h:mm:ss` past an hour
pub fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{:02}:{:02}", mins, secs)
    }
}
