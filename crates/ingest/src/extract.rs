//! Sender extraction from a raw message header block.
//!
//! Only the header block is scanned: reading stops at the first `From:` line,
//! the first empty line, or end of input. MIME structure is never interpreted.

use std::io::{self, BufRead};

const FROM_PREFIX: &str = "from:";

/// Scan `reader` line by line and return the trimmed value of the first
/// `From:` header (matched case-insensitively), or `None` if the header block
/// ends first. The value's case is preserved.
///
/// Lines are consumed lazily, so arbitrarily large messages are never held
/// in memory. Read failures (including invalid UTF-8) are returned as-is.
pub fn extract_sender<R: BufRead>(reader: R) -> io::Result<Option<String>> {
    for line in reader.lines() {
        let line = line?;
        if let Some(value) = strip_from_prefix(&line) {
            return Ok(Some(value.trim().to_string()));
        }
        if line.is_empty() {
            break;
        }
    }
    Ok(None)
}

/// [`extract_sender`] over an in-memory message.
pub fn extract_sender_from_str(content: &str) -> Option<String> {
    // Reading from a byte slice of valid UTF-8 cannot fail.
    extract_sender(content.as_bytes()).ok().flatten()
}

/// Turn a raw extracted value into a counting key. Blank values yield `None`
/// and are never counted.
pub fn normalize_sender(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

fn strip_from_prefix(line: &str) -> Option<&str> {
    let head = line.get(..FROM_PREFIX.len())?;
    if head.eq_ignore_ascii_case(FROM_PREFIX) {
        Some(&line[FROM_PREFIX.len()..])
    } else {
        None
    }
}
