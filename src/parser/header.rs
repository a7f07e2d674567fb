//! RFC 5322 header block parsing.
//!
//! The sanitizer copies surviving headers onto the output verbatim, so this
//! parser keeps what a lossy header map would destroy: original name case,
//! original order, repeated names, and the original folding of each value.

use crate::model::header::HeaderField;

/// Return the header block of a serialized message (everything before the
/// first blank line). If there is no blank line, the whole input is headers.
pub fn header_block(data: &[u8]) -> &[u8] {
    match find_header_end(data) {
        Some(end) => &data[..end],
        None => data,
    }
}

/// Find the byte offset where headers end (position of the first blank line).
fn find_header_end(data: &[u8]) -> Option<usize> {
    // Look for \n\n or \r\n\r\n
    for i in 0..data.len().saturating_sub(1) {
        if data[i] == b'\n' && data[i + 1] == b'\n' {
            return Some(i + 1);
        }
        if i + 3 < data.len()
            && data[i] == b'\r'
            && data[i + 1] == b'\n'
            && data[i + 2] == b'\r'
            && data[i + 3] == b'\n'
        {
            return Some(i + 2);
        }
    }
    None
}

/// Parse the top-level header block into an ordered list of fields.
///
/// Continuation lines (starting with space or tab) are folded into the
/// previous field's value with their `\r\n` + whitespace prefix preserved,
/// so the field re-serializes byte-compatibly. Lines without a colon that
/// are not continuations are silently skipped.
pub fn parse_header_block(data: &[u8]) -> Vec<HeaderField> {
    let text = decode_header_bytes(header_block(data));
    let mut result: Vec<HeaderField> = Vec::new();

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            // Continuation line: keep the fold
            if let Some(last) = result.last_mut() {
                last.value.push_str("\r\n");
                last.value.push_str(line.trim_end());
            }
        } else if let Some(colon_pos) = line.find(':') {
            let name = line[..colon_pos].trim().to_string();
            let value = line[colon_pos + 1..].trim().to_string();
            result.push(HeaderField::new(name, value));
        }
    }

    result
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every
/// byte). A leading BOM is stripped.
fn decode_header_bytes(bytes: &[u8]) -> String {
    let bytes = if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &bytes[3..]
    } else {
        bytes
    };

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}
