//! Utility functions for text cleanup, logging and file system checks.
//!
//! - Whitespace normalization for text pulled out of markup
//! - HTML escaping for the digest renderer
//! - String truncation for log fields
//! - Output directory validation

use itertools::Itertools;
use std::io;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Concatenate text nodes and collapse runs of whitespace to single spaces.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(clean_text(["  Hello\n", " world "].into_iter()), "Hello world");
/// ```
pub fn clean_text<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts.collect::<String>().split_whitespace().join(" ")
}

/// Escape text for inclusion in HTML element content or attribute values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a character boundary) with
/// an ellipsis and byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…(+{} bytes)", &s[..end], s.len() - end)
}

/// Create `dir` if needed and check that files can be written into it.
#[instrument(level = "info", skip_all, fields(path = %dir.as_ref().display()))]
pub async fn ensure_writable_dir(dir: impl AsRef<Path>) -> io::Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).await?;
    let check = dir.join(".insight_scraper_write_check");
    fs::write(&check, b"").await?;
    fs::remove_file(&check).await?;
    info!("Output directory is writable");
    Ok(())
}
