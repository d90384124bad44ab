//! MIME tree walking: subject, client signature, bodies, attachment blobs.

use crate::error::ExtractError;
use mailparse::{DispositionType, MailHeaderMap, MailParseError, ParsedMail, parse_mail};
use tracing::warn;

/// Headers consulted, in order, for the sending client's signature.
const CLIENT_HEADERS: [&str; 2] = ["User-Agent", "X-Mailer"];
const FALLBACK_FILENAME: &str = "attachment";

/// Attachment payload pulled out of the MIME tree, not yet on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentBlob {
  pub filename: String,
  pub data: Vec<u8>,
}

/// Structured fields of one message. Bodies are as decoded, before any cleanup.
#[derive(Debug, Default)]
pub struct NormalizedMessage {
  pub subject: String,
  pub client_app: String,
  pub plain_body: String,
  pub html_body: String,
  /// In MIME part order.
  pub attachments: Vec<AttachmentBlob>,
}

/// Parse raw message bytes and extract their structured fields.
pub fn normalize(raw: &[u8]) -> Result<NormalizedMessage, ExtractError> {
  let parsed = parse_mail(raw)?;
  Ok(normalize_parsed(&parsed))
}

/// Extract fields from an already parsed message. Parts that fail to decode
/// are logged and skipped.
pub fn normalize_parsed(parsed: &ParsedMail<'_>) -> NormalizedMessage {
  let mut out = NormalizedMessage {
    subject: parsed.headers.get_first_value("Subject").unwrap_or_default(),
    client_app: client_app(parsed),
    ..Default::default()
  };

  if !is_container(parsed) {
    match decode_text(parsed) {
      Ok(body) if has_mimetype(parsed, "text/html") => out.html_body = body,
      Ok(body) => out.plain_body = body,
      Err(source) => warn!("{}", ExtractError::Part { index: 0, source }),
    }
    return out;
  }

  let mut walk = Walk::default();
  walk.visit(parsed);
  out.plain_body = walk.plain.unwrap_or_default();
  out.html_body = walk.html.unwrap_or_default();
  out.attachments = walk.attachments;
  out
}

fn client_app(parsed: &ParsedMail<'_>) -> String {
  CLIENT_HEADERS
    .iter()
    .filter_map(|name| parsed.headers.get_first_value(name))
    .map(|v| v.trim().to_string())
    .find(|v| !v.is_empty())
    .unwrap_or_default()
}

/// Decoded text of a leaf. Parts left at the implicit `us-ascii` charset that
/// are valid UTF-8 are read as UTF-8, matching what most clients actually send.
fn decode_text(part: &ParsedMail<'_>) -> Result<String, MailParseError> {
  if part.ctype.charset.eq_ignore_ascii_case("us-ascii") {
    if let Ok(text) = String::from_utf8(part.get_body_raw()?) {
      return Ok(text);
    }
  }
  part.get_body()
}

fn is_container(part: &ParsedMail<'_>) -> bool {
  !part.subparts.is_empty() || part.ctype.mimetype.to_ascii_lowercase().starts_with("multipart/")
}

fn has_mimetype(part: &ParsedMail<'_>, mimetype: &str) -> bool {
  part.ctype.mimetype.eq_ignore_ascii_case(mimetype)
}

/// Depth-first, document-order walk over leaf parts. Bodies are first-wins.
#[derive(Default)]
struct Walk {
  plain: Option<String>,
  html: Option<String>,
  attachments: Vec<AttachmentBlob>,
  leaves: usize,
}

impl Walk {
  fn visit(&mut self, part: &ParsedMail<'_>) {
    if is_container(part) {
      for sub in &part.subparts {
        self.visit(sub);
      }
      return;
    }
    let index = self.leaves;
    self.leaves += 1;

    let disposition = part.get_content_disposition();
    if disposition.disposition == DispositionType::Attachment {
      let filename = disposition
        .params
        .get("filename")
        .or_else(|| part.ctype.params.get("name"))
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .unwrap_or(FALLBACK_FILENAME)
        .to_string();
      match part.get_body_raw() {
        Ok(data) => self.attachments.push(AttachmentBlob { filename, data }),
        Err(source) => warn!(
          filename = %filename,
          "dropping attachment: {}",
          ExtractError::Part { index, source }
        ),
      }
    } else if has_mimetype(part, "text/plain") && self.plain.is_none() {
      match decode_text(part) {
        Ok(body) => self.plain = Some(body),
        Err(source) => warn!("{}", ExtractError::Part { index, source }),
      }
    } else if has_mimetype(part, "text/html") && self.html.is_none() {
      match decode_text(part) {
        Ok(body) => self.html = Some(body),
        Err(source) => warn!("{}", ExtractError::Part { index, source }),
      }
    }
  }
}
