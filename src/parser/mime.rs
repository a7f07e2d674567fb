//! MIME body extraction: the depth-first walk over all body parts.
//!
//! Classification order per leaf mirrors the transform contract exactly:
//! `attachment` disposition wins (discard), then `text/plain`, then
//! `text/html`, then `inline` + Content-ID (retain verbatim). Duplicate
//! text candidates are resolved last-write-wins, a documented quirk kept
//! for compatibility rather than fixed.

use mail_parser::{Message, MessageParser, MessagePart, MimeHeaders, PartType};

use crate::error::{Result, ScrubError};
use crate::model::part::{ExtractedBody, InlinePart};

/// Maximum nesting depth for embedded `message/rfc822` parts.
const MAX_DEPTH: usize = 10;

/// Parse a complete raw message and extract its body content.
///
/// Fails with [`ScrubError::Parse`] if the bytes do not form a structurally
/// valid message. Charset problems inside individual parts are never fatal:
/// undecodable bytes become U+FFFD and are counted in
/// [`ExtractedBody::decode_problems`].
pub fn extract_body(raw: &[u8]) -> Result<ExtractedBody> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Err(ScrubError::Parse("empty input".into()));
    }

    let parser = MessageParser::default();
    let msg = parser
        .parse(raw)
        .ok_or_else(|| ScrubError::Parse("message structure could not be parsed".into()))?;

    let mut body = ExtractedBody::default();
    walk(&msg, 0, 0, &mut body);
    Ok(body)
}

/// Depth-first traversal starting at `part_id`.
///
/// Containers are recursed into, never classified. An embedded
/// `message/rfc822` part is classified like a leaf *and* descended into,
/// matching a flat walk where a skipped container node does not prune its
/// children.
fn walk(msg: &Message<'_>, part_id: usize, depth: usize, out: &mut ExtractedBody) {
    let Some(part) = msg.parts.get(part_id) else {
        return;
    };

    match &part.body {
        PartType::Multipart(children) => {
            for &child in children {
                walk(msg, child, depth, out);
            }
        }
        PartType::Message(nested) => {
            classify_leaf(part, out);
            if depth < MAX_DEPTH {
                walk(nested, 0, depth + 1, out);
            } else {
                tracing::warn!(depth, "message nesting too deep, not descending");
            }
        }
        _ => classify_leaf(part, out),
    }
}

/// Apply the leaf classification rules to a single non-container part.
fn classify_leaf(part: &MessagePart<'_>, out: &mut ExtractedBody) {
    let content_type = effective_content_type(part);
    let disposition = part
        .content_disposition()
        .map(|d| d.ctype().to_ascii_lowercase());

    if disposition.as_deref() == Some("attachment") {
        // True attachments are never carried forward.
        out.attachments_discarded += 1;
    } else if content_type == "text/plain" {
        out.plain = Some(leaf_text(part, out));
    } else if content_type == "text/html" {
        out.html = Some(leaf_text(part, out));
    } else if disposition.as_deref() == Some("inline") {
        if let Some(cid) = part.content_id() {
            out.inline_parts.push(InlinePart {
                content_type,
                content_id: strip_angle_brackets(cid),
                filename: part.attachment_name().map(String::from),
                data: part.contents().to_vec(),
            });
        }
    }
}

/// The leaf's declared content type as lowercase `type/subtype`.
///
/// A leaf without a Content-Type header defaults to `text/plain`
/// (RFC 2045 §5.2).
fn effective_content_type(part: &MessagePart<'_>) -> String {
    match part.content_type() {
        Some(ct) => {
            let main = ct.ctype().to_ascii_lowercase();
            match ct.subtype() {
                Some(sub) => format!("{main}/{}", sub.to_ascii_lowercase()),
                None => main,
            }
        }
        None => "text/plain".to_string(),
    }
}

/// Decode a text leaf's payload using its declared charset.
///
/// `mail-parser` decodes the common charsets itself; parts it could not
/// decode surface as binary and are handed to `encoding_rs` here. Either
/// way, undecodable byte sequences become U+FFFD and are counted.
fn leaf_text(part: &MessagePart<'_>, out: &mut ExtractedBody) -> String {
    if part.is_encoding_problem {
        out.decode_problems += 1;
    }

    match &part.body {
        PartType::Text(text) | PartType::Html(text) => text.to_string(),
        PartType::Binary(bytes) | PartType::InlineBinary(bytes) => {
            let charset = part
                .content_type()
                .and_then(|ct| ct.attribute("charset"))
                .unwrap_or("utf-8");
            decode_charset(charset, bytes, out)
        }
        _ => String::new(),
    }
}

/// Decode bytes using a named charset, falling back to lossy UTF-8.
fn decode_charset(charset: &str, bytes: &[u8], out: &mut ExtractedBody) -> String {
    if let Some(encoding) = encoding_rs::Encoding::for_label(charset.as_bytes()) {
        let (decoded, _, had_errors) = encoding.decode(bytes);
        if had_errors {
            out.decode_problems += 1;
        }
        decoded.into_owned()
    } else {
        tracing::warn!(charset, "Unknown charset, falling back to UTF-8 lossy");
        out.decode_problems += 1;
        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// Strip surrounding `<` and `>` from a Content-ID value.
fn strip_angle_brackets(s: &str) -> String {
    let trimmed = s.trim();
    trimmed
        .strip_prefix('<')
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(trimmed)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitize_crlf(s: &str) -> Vec<u8> {
        s.replace('\n', "\r\n").into_bytes()
    }

    #[test]
    fn test_simple_plain_message() {
        let raw = sanitize_crlf(
            "From: a@b.com\nSubject: Hi\nContent-Type: text/plain; charset=utf-8\n\nHello there\n",
        );
        let body = extract_body(&raw).unwrap();
        assert!(body.plain.as_deref().unwrap().contains("Hello there"));
        assert!(body.html.is_none());
        assert!(body.inline_parts.is_empty());
    }

    #[test]
    fn test_untyped_leaf_defaults_to_plain() {
        let raw = sanitize_crlf("From: a@b.com\nSubject: Hi\n\nDefault type body\n");
        let body = extract_body(&raw).unwrap();
        assert!(body.plain.as_deref().unwrap().contains("Default type body"));
    }

    #[test]
    fn test_attachment_disposition_discarded() {
        let raw = sanitize_crlf(
            "From: a@b.com\nSubject: Hi\nContent-Type: text/plain\nContent-Disposition: attachment; filename=\"note.txt\"\n\nnot a body\n",
        );
        let body = extract_body(&raw).unwrap();
        assert!(body.plain.is_none(), "attachment must not become the text body");
        assert_eq!(body.attachments_discarded, 1);
    }

    #[test]
    fn test_multipart_alternative() {
        let raw = sanitize_crlf(
            "From: a@b.com\nSubject: Hi\nMIME-Version: 1.0\nContent-Type: multipart/alternative; boundary=\"XX\"\n\n--XX\nContent-Type: text/plain\n\nplain body\n--XX\nContent-Type: text/html\n\n<p>html body</p>\n--XX--\n",
        );
        let body = extract_body(&raw).unwrap();
        assert!(body.plain.as_deref().unwrap().contains("plain body"));
        assert!(body.html.as_deref().unwrap().contains("html body"));
    }

    #[test]
    fn test_last_write_wins_on_duplicate_plain() {
        let raw = sanitize_crlf(
            "From: a@b.com\nSubject: Hi\nMIME-Version: 1.0\nContent-Type: multipart/mixed; boundary=\"XX\"\n\n--XX\nContent-Type: text/plain\n\nfirst\n--XX\nContent-Type: text/plain\n\nsecond\n--XX--\n",
        );
        let body = extract_body(&raw).unwrap();
        assert!(
            body.plain.as_deref().unwrap().contains("second"),
            "later candidate must overwrite the earlier one, got: {:?}",
            body.plain
        );
    }

    #[test]
    fn test_inline_part_retained_in_order() {
        let raw = sanitize_crlf(
            "From: a@b.com\nSubject: Hi\nMIME-Version: 1.0\nContent-Type: multipart/related; boundary=\"XX\"\n\n--XX\nContent-Type: text/html\n\n<img src=\"cid:img1\">\n--XX\nContent-Type: image/png; name=\"one.png\"\nContent-Transfer-Encoding: base64\nContent-Disposition: inline; filename=\"one.png\"\nContent-ID: <img1>\n\nUE5HMQ==\n--XX\nContent-Type: image/png\nContent-Transfer-Encoding: base64\nContent-Disposition: inline\nContent-ID: <img2>\n\nUE5HMg==\n--XX--\n",
        );
        let body = extract_body(&raw).unwrap();
        assert_eq!(body.inline_parts.len(), 2);
        assert_eq!(body.inline_parts[0].content_id, "img1");
        assert_eq!(body.inline_parts[1].content_id, "img2");
        assert_eq!(body.inline_parts[0].data, b"PNG1");
        assert_eq!(body.inline_parts[0].filename.as_deref(), Some("one.png"));
    }

    #[test]
    fn test_inline_without_content_id_ignored() {
        let raw = sanitize_crlf(
            "From: a@b.com\nSubject: Hi\nMIME-Version: 1.0\nContent-Type: multipart/related; boundary=\"XX\"\n\n--XX\nContent-Type: text/html\n\n<p>x</p>\n--XX\nContent-Type: image/png\nContent-Disposition: inline\n\nrawbytes\n--XX--\n",
        );
        let body = extract_body(&raw).unwrap();
        assert!(body.inline_parts.is_empty());
    }

    #[test]
    fn test_empty_input_is_parse_error() {
        let err = extract_body(b"").unwrap_err();
        assert!(matches!(err, ScrubError::Parse(_)));
    }

    #[test]
    fn test_strip_angle_brackets() {
        assert_eq!(strip_angle_brackets("<a@b>"), "a@b");
        assert_eq!(strip_angle_brackets("a@b"), "a@b");
        assert_eq!(strip_angle_brackets(" <a@b> "), "a@b");
    }
}
