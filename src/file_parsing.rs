use lopdf::{Dictionary, Document, Object, Stream};
use tracing::debug;

use crate::pdf_utils::{extract_name_from_dict, extract_string_from_dict};
use crate::walker::{resolve, resolve_dict, resolve_stream};
use crate::{ExtractError, Result};

/// The byte stream behind a file specification, with what the specification
/// declares about it.
#[derive(Debug, Clone)]
pub(crate) struct EmbeddedStream<'a> {
    pub stream: &'a Stream,
    /// Unicode (`/UF`) or ASCII (`/F`) file name, when declared.
    pub file_name: Option<String>,
    /// MIME type from the embedded stream's `/Subtype`, or `/ContentType`.
    pub content_type: Option<String>,
    /// `true` when the stream was found through `/EF`.
    pub embedded: bool,
}

/// Resolves file specifications to the stream holding their bytes.
pub(crate) struct FileSpecParser<'a> {
    document: &'a Document,
}

impl<'a> FileSpecParser<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    fn parse_error(name: &str, message: &str) -> ExtractError {
        ExtractError::InvalidPdf(format!("file spec '{name}': {message}"))
    }

    /// Resolve a file specification value to its embedded stream.
    ///
    /// Layout of a file specification:
    ///
    /// ```text
    /// <<
    ///   /Type  /Filespec
    ///   /F     (ascii filename)
    ///   /UF    (unicode filename)
    ///   /EF    << /F <stream-ref>  /UF <stream-ref> >>
    /// >>
    /// ```
    ///
    /// Producers that skip `/EF` sometimes hang the stream directly off the
    /// specification's `/F` or `/Contents`; both are accepted. A value that
    /// is itself a stream is returned as is.
    pub fn parse_file_spec(&self, name: &str, spec: &'a Object) -> Result<EmbeddedStream<'a>> {
        let resolved = resolve(self.document, spec)
            .ok_or_else(|| Self::parse_error(name, "reference does not resolve"))?;

        if let Object::Stream(stream) = resolved {
            return Ok(EmbeddedStream {
                stream,
                file_name: None,
                content_type: Self::declared_content_type(&stream.dict),
                embedded: false,
            });
        }

        let spec_dict = resolved
            .as_dict()
            .map_err(|_| Self::parse_error(name, "not a dictionary"))?;

        let (stream, embedded) = match self.embedded_stream(spec_dict) {
            Some(stream) => (stream, true),
            None => {
                let stream = self
                    .direct_stream(spec_dict)
                    .ok_or_else(|| Self::parse_error(name, "no /EF entry and no direct stream"))?;
                debug!(name, "file spec without /EF, using direct stream");
                (stream, false)
            }
        };

        Ok(EmbeddedStream {
            stream,
            file_name: Self::best_filename(spec_dict),
            content_type: Self::declared_content_type(&stream.dict)
                .or_else(|| Self::declared_content_type(spec_dict)),
            embedded,
        })
    }

    /// `/EF` (inline or referenced) → `/UF` or `/F` stream.
    fn embedded_stream(&self, spec_dict: &'a Dictionary) -> Option<&'a Stream> {
        let ef = resolve_dict(self.document, spec_dict.get(b"EF").ok()?)?;
        [b"UF".as_slice(), b"F"]
            .iter()
            .filter_map(|key| ef.get(key).ok())
            .find_map(|v| resolve_stream(self.document, v))
    }

    fn direct_stream(&self, spec_dict: &'a Dictionary) -> Option<&'a Stream> {
        [b"F".as_slice(), b"Contents"]
            .iter()
            .filter_map(|key| spec_dict.get(key).ok())
            .find_map(|v| resolve_stream(self.document, v))
    }

    /// Return the best available filename: Unicode (/UF) > ASCII (/F).
    fn best_filename(spec_dict: &Dictionary) -> Option<String> {
        [b"UF".as_slice(), b"F"]
            .iter()
            .find_map(|key| extract_string_from_dict(spec_dict, key))
    }

    /// `/Subtype` as a MIME type (PDF names encode '/' as `#2F`), or
    /// `/ContentType`.
    fn declared_content_type(dict: &Dictionary) -> Option<String> {
        extract_name_from_dict(dict, b"Subtype")
            .map(|s| s.replace("#2F", "/").replace("#2f", "/").to_ascii_lowercase())
            .filter(|s| s.contains('/'))
            .or_else(|| extract_string_from_dict(dict, b"ContentType"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, StringFormat};

    fn text(s: &str) -> Object {
        Object::String(s.as_bytes().to_vec(), StringFormat::Literal)
    }

    #[test]
    fn ef_stream_is_preferred_and_metadata_read() {
        let mut doc = Document::with_version("1.7");
        let data = doc.add_object(Stream::new(dictionary! { "Subtype" => "video/mp4" }, vec![1, 2, 3]));
        let spec = Object::Dictionary(dictionary! {
            "Type" => "Filespec",
            "F" => text("clip.mp4"),
            "UF" => text("Clip ünicode.mp4"),
            "EF" => dictionary! { "F" => data },
        });

        let parsed = FileSpecParser::new(&doc).parse_file_spec("clip", &spec).unwrap();
        assert!(parsed.embedded);
        assert_eq!(parsed.stream.content, vec![1, 2, 3]);
        assert_eq!(parsed.file_name.as_deref(), Some("Clip ünicode.mp4"));
        assert_eq!(parsed.content_type.as_deref(), Some("video/mp4"));
    }

    #[test]
    fn direct_stream_is_used_without_ef() {
        let mut doc = Document::with_version("1.7");
        let data = doc.add_object(Stream::new(Dictionary::new(), vec![9; 4]));
        let spec = Object::Dictionary(dictionary! { "Contents" => data });

        let parsed = FileSpecParser::new(&doc).parse_file_spec("x", &spec).unwrap();
        assert!(!parsed.embedded);
        assert_eq!(parsed.stream.content.len(), 4);
        assert_eq!(parsed.file_name, None);
    }

    #[test]
    fn specs_without_any_stream_are_errors() {
        let doc = Document::with_version("1.7");
        let spec = Object::Dictionary(dictionary! { "F" => text("missing.mp3") });
        assert!(FileSpecParser::new(&doc).parse_file_spec("x", &spec).is_err());
        assert!(FileSpecParser::new(&doc).parse_file_spec("x", &Object::Reference((40, 0))).is_err());
    }
}
