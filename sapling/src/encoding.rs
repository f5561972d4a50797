//! Character encoding resolution and transcoding to UTF-8.
//!
//! Precedence: explicit label, byte order mark, in-document declaration
//! (`<?xml encoding="..."?>` or `<meta charset>`), UTF-8.

use std::sync::LazyLock;

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use regex::bytes::Regex;

use crate::document::DocumentKind;
use crate::error::ParseError;

/// How far into the input declarations are searched for
const SNIFF_LEN: usize = 1024;

/// `encoding="..."` inside the XML declaration
#[allow(clippy::expect_used)]
static XML_DECL_ENCODING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*<\?xml[^>]*?\sencoding\s*=\s*["']([A-Za-z0-9._:-]+)["']"#)
        .expect("valid regex")
});

/// `<meta charset="...">` or the charset parameter of `<meta http-equiv content>`
#[allow(clippy::expect_used)]
static META_CHARSET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?([A-Za-z0-9._:-]+)"#).expect("valid regex")
});

/// Look up an encoding by WHATWG label.
pub fn for_label(label: &str) -> Result<&'static Encoding, ParseError> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| ParseError::UnknownEncoding(label.to_string()))
}

/// Encoding named inside the document, if any.
///
/// XML without a BOM may still be UTF-16: `<?` encoded in either byte order
/// gives it away before any declaration can be read.
pub fn sniff(bytes: &[u8], kind: DocumentKind) -> Option<&'static Encoding> {
    if kind == DocumentKind::Xml {
        match bytes.get(..4) {
            Some([0x3C, 0x00, 0x3F, 0x00]) => return Some(UTF_16LE),
            Some([0x00, 0x3C, 0x00, 0x3F]) => return Some(UTF_16BE),
            _ => {}
        }
    }
    let head = &bytes[..bytes.len().min(SNIFF_LEN)];
    let re = match kind {
        DocumentKind::Xml => &*XML_DECL_ENCODING_RE,
        DocumentKind::Html => &*META_CHARSET_RE,
    };
    let label = re.captures(head)?.get(1)?;
    Encoding::for_label(label.as_bytes())
}

/// Pick the encoding for `bytes`. A BOM wins over sniffing but not over `hint`.
pub fn resolve(
    bytes: &[u8],
    hint: Option<&str>,
    kind: DocumentKind,
) -> Result<&'static Encoding, ParseError> {
    if let Some(label) = hint {
        return for_label(label);
    }
    if let Some((encoding, _bom_len)) = Encoding::for_bom(bytes) {
        return Ok(encoding);
    }
    Ok(sniff(bytes, kind).unwrap_or(UTF_8))
}

/// Transcode to UTF-8. Malformed sequences become U+FFFD.
pub fn decode(
    bytes: &[u8],
    hint: Option<&str>,
    kind: DocumentKind,
) -> Result<String, ParseError> {
    let encoding = resolve(bytes, hint, kind)?;
    let text = match hint {
        // An explicit label also overrides the BOM
        Some(_) => {
            let (text, had_errors) = encoding.decode_with_bom_removal(bytes);
            if had_errors {
                warn!("malformed {} sequences replaced", encoding.name());
            }
            text
        }
        None => {
            let (text, used, had_errors) = encoding.decode(bytes);
            if had_errors {
                warn!("malformed {} sequences replaced", used.name());
            }
            text
        }
    };
    Ok(text.into_owned())
}
