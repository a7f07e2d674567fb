//! MIME reassembly and serialization.
//!
//! The output shape is fixed: a `multipart/mixed` top level holding a
//! `multipart/related` container (whose first child is a
//! `multipart/alternative` with the plain and HTML bodies) followed by the
//! retained inline leaves as siblings, plus zero or one appended attachment
//! leaf. Slots for absent bodies are omitted; a container is never emitted
//! with zero children.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::Rng;

use crate::error::{Result, ScrubError};
use crate::model::header::HeaderField;
use crate::model::part::{Attachment, ExtractedBody, InlinePart};

/// Base64 line width (RFC 2045 limit is 76).
const BASE64_LINE_WIDTH: usize = 76;

/// One node of the output body tree.
enum BodyNode {
    /// A `text/{subtype}` leaf, re-encoded as UTF-8.
    Text {
        subtype: &'static str,
        text: String,
    },
    /// An inline leaf carried over from the input.
    Inline(InlinePart),
    /// The appended side-channel attachment.
    Attachment(Attachment),
    /// A `multipart/{subtype}` container.
    Container {
        subtype: &'static str,
        children: Vec<BodyNode>,
    },
}

/// Serialize the output message: retained headers, then the rebuilt body.
///
/// Structural MIME headers of the original top level are not copied: the
/// composer owns `MIME-Version` and the top-level `Content-Type` of the new
/// tree. All other headers are emitted in original order with original
/// folding.
pub fn serialize_message(
    headers: &[HeaderField],
    body: &ExtractedBody,
    attachment: Option<&Attachment>,
) -> Result<Vec<u8>> {
    let tree = build_tree(body, attachment);

    let mut out = Vec::with_capacity(estimate_size(body, attachment));
    for h in headers {
        if is_structural_header(&h.name) {
            continue;
        }
        out.extend_from_slice(h.name.as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(h.value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"MIME-Version: 1.0\r\n");

    write_part(&mut out, &tree)?;
    Ok(out)
}

/// Whether a header name belongs to the MIME structure of the message
/// rather than its envelope, and must therefore be regenerated instead of
/// copied.
pub fn is_structural_header(name: &str) -> bool {
    name.eq_ignore_ascii_case("content-type")
        || name.eq_ignore_ascii_case("content-transfer-encoding")
        || name.eq_ignore_ascii_case("content-disposition")
        || name.eq_ignore_ascii_case("content-id")
        || name.eq_ignore_ascii_case("content-description")
        || name.eq_ignore_ascii_case("mime-version")
}

/// Assemble the output body tree.
fn build_tree(body: &ExtractedBody, attachment: Option<&Attachment>) -> BodyNode {
    let mut alternatives = Vec::new();
    if let Some(plain) = &body.plain {
        alternatives.push(BodyNode::Text {
            subtype: "plain",
            text: plain.clone(),
        });
    }
    if let Some(html) = &body.html {
        alternatives.push(BodyNode::Text {
            subtype: "html",
            text: html.clone(),
        });
    }

    let mut related = Vec::new();
    if !alternatives.is_empty() {
        related.push(BodyNode::Container {
            subtype: "alternative",
            children: alternatives,
        });
    }
    for part in &body.inline_parts {
        related.push(BodyNode::Inline(part.clone()));
    }

    let mut top = Vec::new();
    if !related.is_empty() {
        top.push(BodyNode::Container {
            subtype: "related",
            children: related,
        });
    }
    if let Some(att) = attachment {
        top.push(BodyNode::Attachment(att.clone()));
    }

    if top.is_empty() {
        // Nothing retained and nothing appended: an empty plain-text leaf
        // keeps the output structurally valid.
        return BodyNode::Text {
            subtype: "plain",
            text: String::new(),
        };
    }

    BodyNode::Container {
        subtype: "mixed",
        children: top,
    }
}

/// Write one part (its own Content-* headers, a blank line, its body).
///
/// Every part's serialization ends with CRLF, which the container framing
/// relies on.
fn write_part(out: &mut Vec<u8>, node: &BodyNode) -> Result<()> {
    match node {
        BodyNode::Text { subtype, text } => {
            push_line(out, &format!("Content-Type: text/{subtype}; charset=\"utf-8\""));
            push_line(out, "Content-Transfer-Encoding: base64");
            push_line(out, "");
            write_base64(out, text.as_bytes());
        }
        BodyNode::Inline(part) => {
            match &part.filename {
                Some(name) => push_line(
                    out,
                    &format!(
                        "Content-Type: {}; name=\"{}\"",
                        part.content_type,
                        quote_safe(name)
                    ),
                ),
                None => push_line(out, &format!("Content-Type: {}", part.content_type)),
            }
            push_line(out, "Content-Transfer-Encoding: base64");
            match &part.filename {
                Some(name) => push_line(
                    out,
                    &format!("Content-Disposition: inline; filename=\"{}\"", quote_safe(name)),
                ),
                None => push_line(out, "Content-Disposition: inline"),
            }
            push_line(out, &format!("Content-ID: <{}>", part.content_id));
            push_line(out, "");
            write_base64(out, &part.data);
        }
        BodyNode::Attachment(att) => {
            push_line(out, &format!("Content-Type: {}", att.content_type));
            push_line(out, "Content-Transfer-Encoding: base64");
            push_line(
                out,
                &format!(
                    "Content-Disposition: attachment; filename=\"{}\"",
                    quote_safe(&att.filename)
                ),
            );
            push_line(out, "");
            write_base64(out, &att.data);
        }
        BodyNode::Container { subtype, children } => {
            if children.is_empty() {
                return Err(ScrubError::Serialization(format!(
                    "multipart/{subtype} container with zero children"
                )));
            }
            let boundary = make_boundary();
            push_line(
                out,
                &format!("Content-Type: multipart/{subtype}; boundary=\"{boundary}\""),
            );
            push_line(out, "");
            for child in children {
                push_line(out, &format!("--{boundary}"));
                write_part(out, child)?;
            }
            push_line(out, &format!("--{boundary}--"));
        }
    }
    Ok(())
}

/// Append a line with CRLF termination.
fn push_line(out: &mut Vec<u8>, line: &str) {
    out.extend_from_slice(line.as_bytes());
    out.extend_from_slice(b"\r\n");
}

/// Base64-encode a payload, wrapped at 76 columns with CRLF line endings.
fn write_base64(out: &mut Vec<u8>, data: &[u8]) {
    let encoded = BASE64.encode(data);
    for chunk in encoded.as_bytes().chunks(BASE64_LINE_WIDTH) {
        out.extend_from_slice(chunk);
        out.extend_from_slice(b"\r\n");
    }
}

/// Generate a multipart boundary: 128 random bits, hex-encoded.
fn make_boundary() -> String {
    let mut rng = rand::thread_rng();
    format!("=_{:016x}{:016x}", rng.gen::<u64>(), rng.gen::<u64>())
}

/// Make a filename safe for use inside a quoted-string parameter.
///
/// Control characters (CR/LF injection) are dropped; double quotes and
/// backslashes are replaced so the quoting cannot be broken out of.
fn quote_safe(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_control())
        .map(|c| if c == '"' || c == '\\' { '_' } else { c })
        .collect()
}

/// Rough output-size estimate to seed the buffer (base64 expands by 4/3).
fn estimate_size(body: &ExtractedBody, attachment: Option<&Attachment>) -> usize {
    let payload: usize = body.plain.as_ref().map_or(0, String::len)
        + body.html.as_ref().map_or(0, String::len)
        + body.inline_parts.iter().map(|p| p.data.len()).sum::<usize>()
        + attachment.map_or(0, |a| a.data.len());
    payload + payload / 3 + 1024
}

#[cfg(test)]
mod tests {
    use super::*;
    use mail_parser::MessageParser;

    fn header(name: &str, value: &str) -> HeaderField {
        HeaderField::new(name, value)
    }

    #[test]
    fn test_empty_container_is_serialization_error() {
        let mut out = Vec::new();
        let node = BodyNode::Container {
            subtype: "related",
            children: Vec::new(),
        };
        let err = write_part(&mut out, &node).unwrap_err();
        assert!(matches!(err, ScrubError::Serialization(_)));
    }

    #[test]
    fn test_boundaries_are_unique() {
        let a = make_boundary();
        let b = make_boundary();
        assert_ne!(a, b);
        assert!(a.len() > 16);
    }

    #[test]
    fn test_base64_wrapping() {
        let mut out = Vec::new();
        write_base64(&mut out, &vec![0u8; 300]);
        let text = String::from_utf8(out).unwrap();
        for line in text.lines() {
            assert!(line.len() <= BASE64_LINE_WIDTH);
        }
    }

    #[test]
    fn test_quote_safe_strips_injection() {
        assert_eq!(quote_safe("report.pdf"), "report.pdf");
        assert_eq!(quote_safe("a\r\nB: x"), "aB: x");
        assert_eq!(quote_safe("a\"b\\c"), "a_b_c");
    }

    #[test]
    fn test_structural_headers_not_copied() {
        assert!(is_structural_header("Content-Type"));
        assert!(is_structural_header("MIME-Version"));
        assert!(is_structural_header("content-transfer-encoding"));
        assert!(!is_structural_header("From"));
        assert!(!is_structural_header("X-Gm-Message-State"));
    }

    #[test]
    fn test_serialized_output_reparses() {
        let headers = vec![
            header("From", "a@b.com"),
            header("Subject", "Hi"),
            header("Date", "Fri, 11 Jul 2025 13:35:00 +0530"),
        ];
        let body = ExtractedBody {
            plain: Some("plain body".to_string()),
            html: Some("<p>html body</p>".to_string()),
            inline_parts: vec![InlinePart {
                content_type: "image/png".to_string(),
                content_id: "img1".to_string(),
                filename: Some("one.png".to_string()),
                data: b"PNG1".to_vec(),
            }],
            ..Default::default()
        };
        let att = Attachment {
            filename: "report.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            data: b"%PDF-1.4 fake".to_vec(),
        };

        let bytes = serialize_message(&headers, &body, Some(&att)).unwrap();
        let msg = MessageParser::default().parse(&bytes[..]).unwrap();

        assert_eq!(msg.subject(), Some("Hi"));
        assert_eq!(msg.body_text(0).as_deref(), Some("plain body"));
        assert_eq!(msg.body_html(0).as_deref(), Some("<p>html body</p>"));

        let attachments: Vec<_> = msg.attachments().collect();
        assert!(
            attachments
                .iter()
                .any(|p| p.contents() == b"%PDF-1.4 fake"),
            "appended attachment must survive a reparse"
        );
    }

    #[test]
    fn test_empty_body_serializes_as_empty_plain_leaf() {
        let headers = vec![header("From", "a@b.com")];
        let body = ExtractedBody::default();
        let bytes = serialize_message(&headers, &body, None).unwrap();
        let msg = MessageParser::default().parse(&bytes[..]).unwrap();
        assert_eq!(msg.body_text(0).as_deref(), Some(""));
        assert_eq!(msg.attachment_count(), 0);
    }
}
