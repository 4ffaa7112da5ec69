//! Content sniffing
//!
//! Infers a MIME type from the first bytes of a file when its extension is
//! unknown, following the byte-pattern rules browsers use: markup
//! signatures after leading whitespace, fixed magic numbers, a few masked
//! container formats, and finally a text-or-binary decision.

/// Maximum number of bytes [`sniff`] looks at
pub const SNIFF_LEN: usize = 512;

const TEXT_HTML: &str = "text/html; charset=utf-8";
const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const OCTET_STREAM: &str = "application/octet-stream";

/// Tags that mark an HTML document, matched case-insensitively and
/// followed by a space or `>`
const HTML_SIGNATURES: &[&[u8]] = &[
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

const MAGIC: &[(&[u8], &str)] = &[
    (b"%PDF-", "application/pdf"),
    (b"%!PS-Adobe-", "application/postscript"),
    (b"\xFE\xFF", "text/plain; charset=utf-16be"),
    (b"\xFF\xFE", "text/plain; charset=utf-16le"),
    (b"\xEF\xBB\xBF", TEXT_PLAIN),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"\x89PNG\r\n\x1A\n", "image/png"),
    (b"\xFF\xD8\xFF", "image/jpeg"),
    (b"BM", "image/bmp"),
    (b"\x00\x00\x01\x00", "image/x-icon"),
    (b"\x00\x00\x02\x00", "image/x-icon"),
    (b"OggS\x00", "application/ogg"),
    (b"ID3", "audio/mpeg"),
    (b"MThd\x00\x00\x00\x06", "audio/midi"),
    (b"\x1A\x45\xDF\xA3", "video/webm"),
    (b"wOFF", "font/woff"),
    (b"wOF2", "font/woff2"),
    (b"OTTO", "font/otf"),
    (b"\x00\x01\x00\x00", "font/ttf"),
    (b"ttcf", "font/collection"),
    (b"\x1F\x8B\x08", "application/x-gzip"),
    (b"PK\x03\x04", "application/zip"),
    (b"Rar!\x1A\x07\x00", "application/x-rar-compressed"),
    (b"Rar!\x1A\x07\x01\x00", "application/x-rar-compressed"),
    (b"\x00asm", "application/wasm"),
];

/// `(container, form type)` pairs: bytes 0..4 and 8..12 must match
const CONTAINERS: &[(&[u8; 4], &[u8], &str)] = &[
    (b"RIFF", b"WEBPVP", "image/webp"),
    (b"RIFF", b"WAVE", "audio/wave"),
    (b"RIFF", b"AVI ", "video/avi"),
    (b"FORM", b"AIFF", "audio/aiff"),
];

/// Guess the MIME type of `data`, looking at no more than [`SNIFF_LEN`] bytes
pub fn sniff(data: &[u8]) -> &'static str {
    let data = &data[..data.len().min(SNIFF_LEN)];

    let start = data
        .iter()
        .position(|b| !is_whitespace(*b))
        .unwrap_or(data.len());
    let trimmed = &data[start..];

    if HTML_SIGNATURES.iter().any(|sig| matches_html(trimmed, sig)) {
        return TEXT_HTML;
    }
    if trimmed.starts_with(b"<?xml") {
        return "text/xml; charset=utf-8";
    }

    if let Some((_, mime)) = MAGIC.iter().find(|(magic, _)| data.starts_with(magic)) {
        return *mime;
    }

    for (container, form, mime) in CONTAINERS {
        if data.len() >= 8 + form.len() && &data[..4] == *container && data[8..].starts_with(form) {
            return *mime;
        }
    }

    if is_mp4(data) {
        return "video/mp4";
    }

    if data.iter().any(|b| is_binary(*b)) {
        OCTET_STREAM
    } else {
        TEXT_PLAIN
    }
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\t' | b'\n' | 0x0C | b'\r' | b' ')
}

fn is_binary(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

fn matches_html(data: &[u8], sig: &[u8]) -> bool {
    if data.len() <= sig.len() {
        return false;
    }
    let head = &data[..sig.len()];
    if !head.eq_ignore_ascii_case(sig) {
        return false;
    }
    matches!(data[sig.len()], b' ' | b'>')
}

/// ISO base media file: an `ftyp` box whose brands include `mp4`
fn is_mp4(data: &[u8]) -> bool {
    if data.len() < 12 {
        return false;
    }
    let box_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if data.len() < box_size || box_size % 4 != 0 || &data[4..8] != b"ftyp" {
        return false;
    }
    // Offset 12 holds the minor version, not a brand.
    (8..box_size)
        .step_by(4)
        .filter(|offset| *offset != 12)
        .any(|offset| data.get(offset..offset + 3) == Some(b"mp4".as_slice()))
}
