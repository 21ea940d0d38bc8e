//! multipart/form-data parsing.
//!
//! Uploads arrive as a single buffered body. [`parse`] splits it into parts
//! without copying the content, and [`parse_file`] picks the file part.

use std::borrow::Cow;

use thiserror::Error;

use crate::FileboxError;

/// Errors from multipart parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MultipartError {
    /// Content-Type is not multipart/form-data.
    #[error("expected multipart/form-data")]
    NotMultipart,

    /// No boundary parameter, or the boundary never appears in the body.
    #[error("missing multipart boundary")]
    MissingBoundary,

    /// A part's header block has no terminating blank line.
    #[error("malformed part headers")]
    MalformedHeaders,

    /// The body ends before the closing delimiter.
    #[error("truncated multipart body")]
    Truncated,

    /// No part carries a file.
    #[error("no file uploaded")]
    NoFilePart,

    /// The file part has no usable filename.
    #[error("missing filename")]
    MissingFilename,
}

impl From<MultipartError> for FileboxError {
    fn from(e: MultipartError) -> Self {
        FileboxError::BadRequest(e.to_string())
    }
}

/// One part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part<'a> {
    /// Header fields, names lowercased, in order.
    pub headers: Vec<(String, String)>,
    /// Raw part content.
    pub data: &'a [u8],
}

impl Part<'_> {
    /// Look up a header value (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Form field name from Content-Disposition.
    pub fn name(&self) -> Option<String> {
        self.disposition_param("name")
    }

    /// Filename from Content-Disposition, preferring the RFC 5987 form.
    pub fn file_name(&self) -> Option<String> {
        if let Some(encoded) = self.disposition_param("filename*") {
            if let Some(decoded) = decode_ext_value(&encoded) {
                return Some(decoded);
            }
        }
        self.disposition_param("filename")
    }

    fn disposition_param(&self, key: &str) -> Option<String> {
        let disposition = self.header("content-disposition")?;
        split_params(disposition)
            .into_iter()
            .skip(1)
            .find_map(|param| {
                let (k, v) = param.split_once('=')?;
                k.trim()
                    .eq_ignore_ascii_case(key)
                    .then(|| unquote(v.trim()).into_owned())
            })
    }
}

/// The uploaded file extracted from a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart<'a> {
    /// Filename as sent by the client (not yet sanitized).
    pub file_name: String,
    /// Declared content type of the part.
    pub content_type: Option<String>,
    /// File content.
    pub data: &'a [u8],
}

/// Extract the boundary from a `multipart/form-data` Content-Type value.
pub fn boundary_from_content_type(content_type: &str) -> Result<String, MultipartError> {
    let params = split_params(content_type);
    let mime = params.first().map(|s| s.trim()).unwrap_or_default();
    if !mime.eq_ignore_ascii_case("multipart/form-data") {
        return Err(MultipartError::NotMultipart);
    }

    params
        .iter()
        .skip(1)
        .filter_map(|p| p.split_once('='))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, v)| unquote(v.trim()).into_owned())
        .filter(|b| !b.is_empty())
        .ok_or(MultipartError::MissingBoundary)
}

/// Split a multipart body into its parts.
pub fn parse<'a>(body: &'a [u8], boundary: &str) -> Result<Vec<Part<'a>>, MultipartError> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();
    let mut next_delimiter = Vec::with_capacity(delimiter.len() + 2);
    next_delimiter.extend_from_slice(b"\r\n");
    next_delimiter.extend_from_slice(delimiter);

    let mut pos = find(body, delimiter).ok_or(MultipartError::MissingBoundary)?;
    let mut parts = Vec::new();

    loop {
        let mut cursor = pos + delimiter.len();
        let rest = &body[cursor..];

        if rest.starts_with(b"--") {
            return Ok(parts);
        }

        // Transport padding before the line break
        let padding = rest.iter().take_while(|b| **b == b' ' || **b == b'\t').count();
        cursor += padding;
        match &body[cursor..] {
            r if r.starts_with(b"\r\n") => cursor += 2,
            r if r.len() < 2 => return Err(MultipartError::Truncated),
            _ => return Err(MultipartError::MalformedHeaders),
        }

        let (headers, content_start) = if body[cursor..].starts_with(b"\r\n") {
            (Vec::new(), cursor + 2)
        } else {
            let end = find(&body[cursor..], b"\r\n\r\n").ok_or(MultipartError::MalformedHeaders)?;
            let headers = parse_headers(&body[cursor..cursor + end])?;
            (headers, cursor + end + 4)
        };

        let content_len =
            find(&body[content_start..], &next_delimiter).ok_or(MultipartError::Truncated)?;

        parts.push(Part {
            headers,
            data: &body[content_start..content_start + content_len],
        });
        pos = content_start + content_len + 2;
    }
}

/// Parse a multipart body and return the uploaded file.
///
/// The first part with a filename wins. A `file` field without a filename
/// is reported as [`MultipartError::MissingFilename`].
pub fn parse_file<'a>(body: &'a [u8], boundary: &str) -> Result<FilePart<'a>, MultipartError> {
    let parts = parse(body, boundary)?;
    let mut saw_file_field = false;

    for part in &parts {
        match part.file_name() {
            Some(name) if !name.is_empty() => {
                return Ok(FilePart {
                    file_name: name,
                    content_type: part.header("content-type").map(str::to_string),
                    data: part.data,
                });
            }
            Some(_) => saw_file_field = true,
            None if part.name().as_deref() == Some("file") => saw_file_field = true,
            None => {}
        }
    }

    if saw_file_field {
        Err(MultipartError::MissingFilename)
    } else {
        Err(MultipartError::NoFilePart)
    }
}

fn parse_headers(block: &[u8]) -> Result<Vec<(String, String)>, MultipartError> {
    String::from_utf8_lossy(block)
        .split("\r\n")
        .filter(|line| !line.is_empty())
        .map(|line| {
            let (name, value) = line.split_once(':').ok_or(MultipartError::MalformedHeaders)?;
            Ok((name.trim().to_ascii_lowercase(), value.trim().to_string()))
        })
        .collect()
}

/// Split a header value on `;`, ignoring separators inside quotes.
fn split_params(value: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;

    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                params.push(value[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(value[start..].trim());
    params
}

fn unquote(value: &str) -> Cow<'_, str> {
    match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) if inner.contains('\\') => {
            let mut out = String::with_capacity(inner.len());
            let mut chars = inner.chars();
            while let Some(c) = chars.next() {
                if c == '\\' {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                } else {
                    out.push(c);
                }
            }
            Cow::Owned(out)
        }
        Some(inner) => Cow::Borrowed(inner),
        None => Cow::Borrowed(value),
    }
}

/// Decode an RFC 5987 value such as `UTF-8''na%C3%AFve.txt`.
fn decode_ext_value(value: &str) -> Option<String> {
    let (charset, rest) = value.split_once('\'')?;
    let (_language, encoded) = rest.split_once('\'')?;
    if !charset.eq_ignore_ascii_case("utf-8") {
        return None;
    }
    urlencoding::decode(encoded).ok().map(Cow::into_owned)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    let first = needle[0];
    let last_start = haystack.len() - needle.len();
    let mut i = 0;
    while i <= last_start {
        let offset = haystack[i..=last_start].iter().position(|b| *b == first)?;
        i += offset;
        if &haystack[i..i + needle.len()] == needle {
            return Some(i);
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDARY: &str = "----boundary42";

    fn body(parts: &[(&str, &[u8])]) -> Vec<u8> {
        let mut out = Vec::new();
        for (headers, data) in parts {
            out.extend_from_slice(format!("--{BOUNDARY}\r\n{headers}\r\n\r\n").as_bytes());
            out.extend_from_slice(data);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        out
    }

    #[test]
    fn test_boundary_from_content_type() {
        assert_eq!(
            boundary_from_content_type("multipart/form-data; boundary=abc").unwrap(),
            "abc"
        );
        assert_eq!(
            boundary_from_content_type("Multipart/Form-Data; charset=utf-8; Boundary=\"a b\"")
                .unwrap(),
            "a b"
        );
        assert_eq!(
            boundary_from_content_type("application/json"),
            Err(MultipartError::NotMultipart)
        );
        assert_eq!(
            boundary_from_content_type("multipart/form-data"),
            Err(MultipartError::MissingBoundary)
        );
        assert_eq!(
            boundary_from_content_type("multipart/form-data; boundary=\"\""),
            Err(MultipartError::MissingBoundary)
        );
    }

    #[test]
    fn test_parse_file() {
        let data = body(&[(
            "Content-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\nContent-Type: text/plain",
            b"hello",
        )]);

        let file = parse_file(&data, BOUNDARY).unwrap();
        assert_eq!(file.file_name, "a.txt");
        assert_eq!(file.content_type.as_deref(), Some("text/plain"));
        assert_eq!(file.data, b"hello");
    }

    #[test]
    fn test_parse_binary_content_with_crlf() {
        let content: &[u8] = b"\r\n--not-the-boundary\r\n\x00\xff\r\n";
        let data = body(&[(
            "Content-Disposition: form-data; name=\"file\"; filename=\"bin.dat\"",
            content,
        )]);

        let file = parse_file(&data, BOUNDARY).unwrap();
        assert_eq!(file.data, content);
    }

    #[test]
    fn test_parse_empty_file() {
        let data = body(&[(
            "Content-Disposition: form-data; name=\"file\"; filename=\"empty.txt\"",
            b"",
        )]);

        let file = parse_file(&data, BOUNDARY).unwrap();
        assert_eq!(file.file_name, "empty.txt");
        assert!(file.data.is_empty());
    }

    #[test]
    fn test_parse_skips_fields_before_file() {
        let data = body(&[
            ("Content-Disposition: form-data; name=\"comment\"", b"note"),
            (
                "Content-Disposition: form-data; name=\"file\"; filename=\"b.txt\"",
                b"file body",
            ),
        ]);

        let parts = parse(&data, BOUNDARY).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].name().as_deref(), Some("comment"));
        assert_eq!(parts[0].data, b"note");

        let file = parse_file(&data, BOUNDARY).unwrap();
        assert_eq!(file.file_name, "b.txt");
        assert_eq!(file.data, b"file body");
    }

    #[test]
    fn test_filename_with_semicolon_and_escapes() {
        let data = body(&[(
            "Content-Disposition: form-data; name=\"file\"; filename=\"a;b \\\"c\\\".txt\"",
            b"x",
        )]);

        let file = parse_file(&data, BOUNDARY).unwrap();
        assert_eq!(file.file_name, "a;b \"c\".txt");
    }

    #[test]
    fn test_extended_filename() {
        let data = body(&[(
            "Content-Disposition: form-data; name=\"file\"; filename=\"fallback.txt\"; filename*=UTF-8''%E6%97%A5%E6%9C%AC.txt",
            b"x",
        )]);

        let file = parse_file(&data, BOUNDARY).unwrap();
        assert_eq!(file.file_name, "日本.txt");
    }

    #[test]
    fn test_missing_filename() {
        let data = body(&[("Content-Disposition: form-data; name=\"file\"", b"x")]);
        assert_eq!(parse_file(&data, BOUNDARY), Err(MultipartError::MissingFilename));

        let data = body(&[(
            "Content-Disposition: form-data; name=\"file\"; filename=\"\"",
            b"",
        )]);
        assert_eq!(parse_file(&data, BOUNDARY), Err(MultipartError::MissingFilename));
    }

    #[test]
    fn test_no_file_part() {
        let data = body(&[("Content-Disposition: form-data; name=\"comment\"", b"x")]);
        assert_eq!(parse_file(&data, BOUNDARY), Err(MultipartError::NoFilePart));

        let data = format!("--{BOUNDARY}--\r\n").into_bytes();
        assert_eq!(parse_file(&data, BOUNDARY), Err(MultipartError::NoFilePart));
    }

    #[test]
    fn test_truncated_body() {
        let mut data = body(&[(
            "Content-Disposition: form-data; name=\"file\"; filename=\"a.txt\"",
            b"hello",
        )]);
        data.truncate(data.len() - 20);

        assert_eq!(parse(&data, BOUNDARY), Err(MultipartError::Truncated));
    }

    #[test]
    fn test_wrong_boundary() {
        let data = body(&[(
            "Content-Disposition: form-data; name=\"file\"; filename=\"a.txt\"",
            b"hello",
        )]);
        assert_eq!(
            parse(&data, "other-boundary"),
            Err(MultipartError::MissingBoundary)
        );
    }

    #[test]
    fn test_unterminated_headers() {
        let data = format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"");
        assert_eq!(
            parse(data.as_bytes(), BOUNDARY),
            Err(MultipartError::MalformedHeaders)
        );
    }

    #[test]
    fn test_preamble_is_ignored() {
        let mut data = b"preamble text\r\n".to_vec();
        data.extend(body(&[(
            "Content-Disposition: form-data; name=\"file\"; filename=\"a.txt\"",
            b"hi",
        )]));

        assert_eq!(parse_file(&data, BOUNDARY).unwrap().data, b"hi");
    }

    #[test]
    fn test_error_maps_to_bad_request() {
        let err: FileboxError = MultipartError::NoFilePart.into();
        assert!(matches!(err, FileboxError::BadRequest(_)));
    }

    #[test]
    fn test_find() {
        assert_eq!(find(b"hello world", b"world"), Some(6));
        assert_eq!(find(b"aaab", b"ab"), Some(2));
        assert_eq!(find(b"abc", b"abcd"), None);
        assert_eq!(find(b"abc", b""), None);
    }
}
