//! Body parts retained or injected by the sanitizer.

/// An inline leaf retained from the original message, in encounter order.
///
/// Inline parts (typically images) are referenced from the HTML body via
/// their Content-ID, so all three of content type, Content-ID, and payload
/// must survive the rebuild together.
#[derive(Debug, Clone)]
pub struct InlinePart {
    /// MIME content type (e.g. `image/png`).
    pub content_type: String,

    /// Content-ID without the surrounding angle brackets.
    pub content_id: String,

    /// Filename from the Content-Disposition/Content-Type parameters, if any.
    pub filename: Option<String>,

    /// Decoded payload bytes (content-transfer-encoding already removed).
    pub data: Vec<u8>,
}

/// An externally supplied binary attachment to append to the output.
///
/// Reading the file behind this is the caller's responsibility; the core
/// only ever sees bytes and a filename.
#[derive(Debug, Clone)]
pub struct Attachment {
    /// Filename to advertise in the Content-Disposition header.
    pub filename: String,

    /// MIME content type (e.g. `application/pdf`).
    pub content_type: String,

    /// Raw file bytes.
    pub data: Vec<u8>,
}

/// Result of the depth-first body walk.
#[derive(Debug, Clone, Default)]
pub struct ExtractedBody {
    /// The plain-text body candidate. If the message carries several
    /// `text/plain` leaves, only the last one encountered is kept
    /// (last-write-wins, a documented compatibility quirk).
    pub plain: Option<String>,

    /// The HTML body candidate. Same last-write-wins rule as `plain`.
    pub html: Option<String>,

    /// Inline leaves with a Content-ID, in encounter order.
    pub inline_parts: Vec<InlinePart>,

    /// Number of leaves discarded because their disposition was `attachment`.
    pub attachments_discarded: usize,

    /// Number of parts whose declared charset could not cleanly decode;
    /// undecodable bytes were replaced with U+FFFD and decoding continued.
    pub decode_problems: usize,
}
