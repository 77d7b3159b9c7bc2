//! Stream classification: container signatures first, declared metadata
//! second.
//!
//! PDF producers routinely mislabel or omit the subtype of embedded media, so
//! the leading bytes always win over `/Subtype`, `/ContentType` or a file
//! name.

use crate::media::MediaKind;

/// Leading bytes needed to recognise every supported signature.
pub const SNIFF_LEN: usize = 64;

/// A recognised container format.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Signature {
    /// `ID3` tag or an MPEG audio frame sync.
    Mp3,
    /// ISO base media `ftyp` box at offset 4 or 8.
    Mp4,
    /// `RIFF....AVI `
    Avi,
    /// `RIFF....WAVE`
    Wav,
    /// `OggS`. The codec inside is not inspected.
    Ogg,
    /// `fLaC`
    Flac,
    /// EBML magic `1A 45 DF A3`.
    WebM,
}

impl Signature {
    pub fn kind(self) -> MediaKind {
        match self {
            Signature::Mp3 | Signature::Wav | Signature::Ogg | Signature::Flac => MediaKind::Audio,
            Signature::Mp4 | Signature::Avi | Signature::WebM => MediaKind::Video,
        }
    }
}

/// Identify the container format from a stream's leading bytes.
///
/// Buffers shorter than four bytes never match.
pub fn sniff_signature(head: &[u8]) -> Option<Signature> {
    if head.len() < 4 {
        return None;
    }

    if head.starts_with(b"ID3") || (head[0] == 0xFF && (head[1] & 0xE0) == 0xE0) {
        return Some(Signature::Mp3);
    }
    if has_at(head, 4, b"ftyp") || has_at(head, 8, b"ftyp") {
        return Some(Signature::Mp4);
    }
    if head.starts_with(b"RIFF") {
        // A RIFF container that is neither AVI nor WAV falls through.
        if has_at(head, 8, b"AVI ") {
            return Some(Signature::Avi);
        }
        if has_at(head, 8, b"WAVE") {
            return Some(Signature::Wav);
        }
    }
    if head.starts_with(b"OggS") {
        return Some(Signature::Ogg);
    }
    if head.starts_with(b"fLaC") {
        return Some(Signature::Flac);
    }
    if head.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        return Some(Signature::WebM);
    }
    None
}

fn has_at(head: &[u8], offset: usize, magic: &[u8]) -> bool {
    head.get(offset..offset + magic.len()) == Some(magic)
}

/// Kind implied by a MIME-like content type (`audio/mpeg`, `video/mp4`, ...).
pub fn classify_by_content_type(content_type: &str) -> Option<MediaKind> {
    let lower = content_type.to_ascii_lowercase();
    if lower.contains("audio") {
        Some(MediaKind::Audio)
    } else if lower.contains("video") {
        Some(MediaKind::Video)
    } else if lower.contains("image") {
        Some(MediaKind::Image)
    } else {
        None
    }
}

const AUDIO_HINTS: &[&str] = &["audio", "sound", ".mp3", ".wav", ".m4a", ".aac", ".ogg", ".flac"];
const VIDEO_HINTS: &[&str] = &["video", "movie", ".mp4", ".mov", ".avi", ".mkv", ".webm", ".flv"];
const IMAGE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".bmp", ".webp"];

/// Kind implied by a declared subtype combined with a name or file name.
///
/// Audio hints win over video hints, which win over image hints.
pub fn classify_by_metadata(subtype: &str, name: &str) -> Option<MediaKind> {
    let subtype = subtype.to_ascii_lowercase();
    let name = name.to_ascii_lowercase();

    let hinted = |hints: &[&str]| hints.iter().any(|h| subtype.contains(h) || name.contains(h));

    if hinted(AUDIO_HINTS) {
        Some(MediaKind::Audio)
    } else if hinted(VIDEO_HINTS) {
        Some(MediaKind::Video)
    } else if subtype.contains("image") || IMAGE_EXTENSIONS.iter().any(|e| name.contains(e)) {
        Some(MediaKind::Image)
    } else {
        None
    }
}

/// Classify a stream.
///
/// Priority order:
/// 1. container signature in `head`;
/// 2. `content_type` substring (`audio`, `video`, `image`);
/// 3. `subtype` together with extension heuristics on `name`.
///
/// `None` means unknown. Content with no signature and no hint is never
/// reported as audio, video or image.
pub fn classify(head: &[u8], subtype: &str, content_type: &str, name: &str) -> Option<MediaKind> {
    sniff_signature(head)
        .map(Signature::kind)
        .or_else(|| classify_by_content_type(content_type))
        .or_else(|| classify_by_metadata(subtype, name))
}

/// Leading slice used for sniffing.
pub(crate) fn head_of(bytes: &[u8]) -> &[u8] {
    &bytes[..bytes.len().min(SNIFF_LEN)]
}
