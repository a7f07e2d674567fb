//! The sanitize pipeline: one deterministic pass over one message.
//!
//! Parse → replace `Date` → strip internal headers → extract body parts →
//! rebuild the MIME tree → serialize. The input is read-only; the output is
//! constructed from scratch, copying only the retained headers.

pub mod date;
pub mod denylist;

use std::path::Path;

use chrono::{DateTime, FixedOffset};
use tracing::{debug, warn};

use crate::compose;
use crate::error::{Result, ScrubError};
use crate::model::header::HeaderField;
use crate::model::part::Attachment;
use crate::parser::{header, mime};

/// Caller-supplied parameters for one sanitize run.
///
/// The core never touches the filesystem: the attachment, if any, arrives
/// as bytes plus a filename. Path resolution belongs to the caller (see
/// [`sanitize_file`]).
#[derive(Debug, Clone)]
pub struct SanitizeOptions {
    /// Replacement value for the `Date` header, with an explicit UTC offset.
    pub date: DateTime<FixedOffset>,

    /// Optional binary attachment to append to the output.
    pub attachment: Option<Attachment>,
}

/// Diagnostics from one sanitize run.
///
/// None of these affect the output contract; they exist for operator
/// feedback (`--json` and the report table).
#[derive(Debug, Clone, serde::Serialize)]
pub struct CleanReport {
    /// Headers removed by the denylist.
    pub headers_removed: usize,
    /// Headers copied onto the output.
    pub headers_kept: usize,
    /// Whether a plain-text body was retained.
    pub has_plain_body: bool,
    /// Whether an HTML body was retained.
    pub has_html_body: bool,
    /// Inline parts retained, in original order.
    pub inline_parts: usize,
    /// Original attachments discarded during the walk.
    pub attachments_discarded: usize,
    /// Parts with charset problems (decoded lossily, never fatal).
    pub decode_problems: usize,
    /// Whether the side-channel attachment was appended.
    pub attachment_added: bool,
    /// Input size in bytes.
    pub input_size: u64,
    /// Output size in bytes.
    pub output_size: u64,
}

/// A sanitized message plus its run diagnostics.
#[derive(Debug, Clone)]
pub struct CleanOutcome {
    /// The serialized output message.
    pub bytes: Vec<u8>,
    /// Diagnostics for reporting.
    pub report: CleanReport,
}

/// Sanitize one serialized message.
///
/// Pure given its inputs: no side effects beyond the returned buffer.
/// Fails with [`ScrubError::Parse`] on malformed input (no partial output)
/// and [`ScrubError::Serialization`] only on an internal reconstruction bug.
pub fn sanitize(input: &[u8], opts: &SanitizeOptions) -> Result<CleanOutcome> {
    // Parsing the body tree doubles as the structural validation of the
    // whole message.
    let body = mime::extract_body(input)?;

    let mut headers = header::parse_header_block(input);

    set_date_header(&mut headers, &opts.date);

    let headers_removed = denylist::strip_internal_headers(&mut headers);
    debug!(removed = headers_removed, "stripped internal headers");

    if body.decode_problems > 0 {
        warn!(
            parts = body.decode_problems,
            "charset problems in body parts, replacement characters substituted"
        );
    }

    let bytes = compose::serialize_message(&headers, &body, opts.attachment.as_ref())?;

    let report = CleanReport {
        headers_removed,
        headers_kept: headers
            .iter()
            .filter(|h| !compose::is_structural_header(&h.name))
            .count(),
        has_plain_body: body.plain.is_some(),
        has_html_body: body.html.is_some(),
        inline_parts: body.inline_parts.len(),
        attachments_discarded: body.attachments_discarded,
        decode_problems: body.decode_problems,
        attachment_added: opts.attachment.is_some(),
        input_size: input.len() as u64,
        output_size: bytes.len() as u64,
    };

    Ok(CleanOutcome { bytes, report })
}

/// Replace the `Date` header with the formatted replacement value.
///
/// The first existing `Date` keeps its position; duplicates are dropped so
/// the output carries exactly one. A message without `Date` gets it
/// appended.
fn set_date_header(headers: &mut Vec<HeaderField>, date: &DateTime<FixedOffset>) {
    let formatted = date::format_rfc5322(date);

    let mut seen = false;
    headers.retain_mut(|h| {
        if h.is_named("date") {
            if seen {
                return false;
            }
            seen = true;
            h.value = formatted.clone();
        }
        true
    });

    if !seen {
        headers.push(HeaderField::new("Date", formatted));
    }
}

/// Sanitize a message file on disk.
///
/// This is the path-resolving wrapper around [`sanitize`]: it reads the
/// input, loads the optional attachment, and writes the output. A missing
/// attachment file is soft: a warning is logged and the output simply has
/// no attachment leaf, signalled via [`CleanReport::attachment_added`].
pub fn sanitize_file(
    input: &Path,
    output: &Path,
    date: DateTime<FixedOffset>,
    attach: Option<&Path>,
    attach_name: Option<&str>,
    attach_type: &str,
) -> anyhow::Result<CleanReport> {
    let raw = std::fs::read(input).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ScrubError::FileNotFound(input.to_path_buf())
        } else {
            ScrubError::io(input, e)
        }
    })?;

    let attachment = attach.and_then(|path| load_attachment(path, attach_name, attach_type));

    let opts = SanitizeOptions { date, attachment };
    let outcome = sanitize(&raw, &opts)?;

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(output, &outcome.bytes).map_err(|e| ScrubError::io(output, e))?;

    Ok(outcome.report)
}

/// Load the attachment file, or `None` (with a warning) if unreadable.
fn load_attachment(path: &Path, name: Option<&str>, content_type: &str) -> Option<Attachment> {
    match std::fs::read(path) {
        Ok(data) => {
            let filename = name
                .map(String::from)
                .or_else(|| {
                    path.file_name()
                        .and_then(|n| n.to_str())
                        .map(String::from)
                })
                .unwrap_or_else(|| "attachment.bin".to_string());
            Some(Attachment {
                filename,
                content_type: content_type.to_string(),
                data,
            })
        }
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "Attachment not readable, skipping"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(date: &str) -> SanitizeOptions {
        SanitizeOptions {
            date: date::parse_date_arg(date).unwrap(),
            attachment: None,
        }
    }

    fn raw(msg: &str) -> Vec<u8> {
        msg.replace('\n', "\r\n").into_bytes()
    }

    #[test]
    fn test_date_replaced_in_place() {
        let mut headers = vec![
            HeaderField::new("From", "a@b.com"),
            HeaderField::new("Date", "Mon, 01 Jan 2024 00:00:00 +0000"),
            HeaderField::new("Subject", "Hi"),
        ];
        let dt = date::parse_date_arg("2025-07-11T13:35:00+05:30").unwrap();
        set_date_header(&mut headers, &dt);
        assert_eq!(headers.len(), 3);
        assert_eq!(headers[1].name, "Date");
        assert_eq!(headers[1].value, "Fri, 11 Jul 2025 13:35:00 +0530");
    }

    #[test]
    fn test_date_appended_when_absent() {
        let mut headers = vec![HeaderField::new("From", "a@b.com")];
        let dt = date::parse_date_arg("2025-07-11T13:35:00+05:30").unwrap();
        set_date_header(&mut headers, &dt);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[1].name, "Date");
    }

    #[test]
    fn test_duplicate_dates_collapse_to_one() {
        let mut headers = vec![
            HeaderField::new("Date", "Mon, 01 Jan 2024 00:00:00 +0000"),
            HeaderField::new("From", "a@b.com"),
            HeaderField::new("Date", "Tue, 02 Jan 2024 00:00:00 +0000"),
        ];
        let dt = date::parse_date_arg("2025-07-11T13:35:00+05:30").unwrap();
        set_date_header(&mut headers, &dt);
        let dates: Vec<&HeaderField> = headers.iter().filter(|h| h.is_named("date")).collect();
        assert_eq!(dates.len(), 1);
        assert_eq!(dates[0].value, "Fri, 11 Jul 2025 13:35:00 +0530");
    }

    #[test]
    fn test_sanitize_reports_counts() {
        let input = raw(
            "Received: from relay.example.com\nX-Mailer: Foo 1.0\nX-Gm-Message-State: AOJu0Yz\nFrom: a@b.com\nSubject: Hi\nDate: Mon, 01 Jan 2024 00:00:00 +0000\nContent-Type: text/plain; charset=utf-8\n\nHello\n",
        );
        let outcome = sanitize(&input, &opts("2025-07-11T13:35:00+05:30")).unwrap();
        assert_eq!(outcome.report.headers_removed, 2);
        assert!(outcome.report.has_plain_body);
        assert!(!outcome.report.has_html_body);
        assert!(!outcome.report.attachment_added);
        assert_eq!(outcome.report.input_size, input.len() as u64);
        assert_eq!(outcome.report.output_size, outcome.bytes.len() as u64);
    }

    #[test]
    fn test_sanitize_malformed_input_aborts() {
        let err = sanitize(b"", &opts("2025-07-11T13:35:00+05:30")).unwrap_err();
        assert!(matches!(err, ScrubError::Parse(_)));
    }
}
