//! Filename and type inference for uploads.
//!
//! An upload's original filename comes from, in order: the request path,
//! the `X-Filename` header, then a `Content-Disposition` header.  The
//! extension follows from the filename when it has one, otherwise from the
//! declared content type.

use std::sync::OnceLock;

use axum::http::HeaderMap;
use regex::Regex;

use crate::storage::backend::{CustomMetadata, DEFAULT_CONTENT_TYPE, UNKNOWN_FILENAME};

/// Header carrying an explicit filename.
pub const X_FILENAME: &str = "x-filename";

/// Content types with a well-known extension.
const CONTENT_TYPE_EXTENSIONS: &[(&str, &str)] = &[
    ("text/plain", "txt"),
    ("text/html", "html"),
    ("text/css", "css"),
    ("text/javascript", "js"),
    ("application/json", "json"),
    ("application/pdf", "pdf"),
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("image/svg+xml", "svg"),
];

/// Everything the upload path needs to know about the incoming file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFacts {
    /// Declared content type, defaulted to `application/octet-stream`.
    pub content_type: String,
    /// Resolved original filename, if any source supplied one.
    pub filename: Option<String>,
    /// Lower-cased extension, possibly empty.
    pub extension: String,
}

impl FileFacts {
    /// Metadata to store alongside the body.  The extension is only kept
    /// when `record_extension` is set.
    pub fn metadata(&self, record_extension: bool) -> CustomMetadata {
        CustomMetadata {
            original_filename: self
                .filename
                .clone()
                .unwrap_or_else(|| UNKNOWN_FILENAME.to_string()),
            extension: record_extension.then(|| self.extension.clone()),
        }
    }
}

/// Resolve filename, extension, and content type for an upload.
///
/// `path` is the decoded request path without its leading slash.
pub fn resolve(path: &str, headers: &HeaderMap) -> FileFacts {
    let content_type = header_str(headers, "content-type")
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();

    let filename = non_empty(path)
        .map(str::to_string)
        .or_else(|| header_str(headers, X_FILENAME).and_then(non_empty).map(str::to_string))
        .or_else(|| header_str(headers, "content-disposition").and_then(parse_content_disposition));

    let extension = filename
        .as_deref()
        .map(extension_of)
        .filter(|ext| !ext.is_empty())
        .unwrap_or_else(|| extension_for_content_type(&content_type).to_string());

    FileFacts {
        content_type,
        filename,
        extension,
    }
}

/// Pull the `filename` parameter out of a `Content-Disposition` value.
///
/// Parsing is permissive: the value may be double-quoted, single-quoted,
/// or bare, and ends at a quote, `;`, or newline.  Returns `None` when no
/// parameter is present or its value is empty.
pub fn parse_content_disposition(value: &str) -> Option<String> {
    static FILENAME_RE: OnceLock<Regex> = OnceLock::new();
    let re = FILENAME_RE.get_or_init(|| {
        Regex::new(r#"(?i)filename[^;=\n]*=["']?([^"';\n]*)["']?"#)
            .expect("filename pattern is valid")
    });

    re.captures(value)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .and_then(non_empty)
        .map(str::to_string)
}

/// Lower-cased text after the last `.`, or empty when there is no `.`.
pub fn extension_of(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default()
}

/// Extension for a declared content type, or empty when unmapped.
///
/// Parameters such as `; charset=utf-8` are ignored.
pub fn extension_for_content_type(content_type: &str) -> &'static str {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    CONTENT_TYPE_EXTENSIONS
        .iter()
        .find(|(ct, _)| *ct == essence)
        .map(|(_, ext)| *ext)
        .unwrap_or("")
}

/// Header value as text.  UTF-8 is accepted, since clients send raw
/// UTF-8 filenames even though HTTP only guarantees ASCII.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| std::str::from_utf8(v.as_bytes()).ok())
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    // -- Content-Disposition parsing -----------------------------------------

    #[test]
    fn test_disposition_double_quoted() {
        assert_eq!(
            parse_content_disposition(r#"attachment; filename="a.txt""#),
            Some("a.txt".to_string())
        );
    }

    #[test]
    fn test_disposition_single_quoted_and_bare() {
        assert_eq!(
            parse_content_disposition("attachment; filename='b.png'"),
            Some("b.png".to_string())
        );
        assert_eq!(
            parse_content_disposition("inline; filename=c.pdf; size=10"),
            Some("c.pdf".to_string())
        );
    }

    #[test]
    fn test_disposition_is_case_insensitive() {
        assert_eq!(
            parse_content_disposition(r#"attachment; FileName="Up.TXT""#),
            Some("Up.TXT".to_string())
        );
    }

    #[test]
    fn test_disposition_stops_at_newline() {
        assert_eq!(
            parse_content_disposition("attachment; filename=d.txt\nextra"),
            Some("d.txt".to_string())
        );
    }

    #[test]
    fn test_disposition_without_filename_is_absent() {
        assert_eq!(parse_content_disposition("attachment"), None);
        assert_eq!(parse_content_disposition("inline; name=\"x\""), None);
        assert_eq!(parse_content_disposition(r#"attachment; filename="""#), None);
        assert_eq!(parse_content_disposition(""), None);
    }

    // -- Extensions ----------------------------------------------------------

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("report.pdf"), "pdf");
        assert_eq!(extension_of("report.PDF"), "pdf");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("report"), "");
        assert_eq!(extension_of("trailing."), "");
    }

    #[test]
    fn test_extension_for_content_type_table() {
        assert_eq!(extension_for_content_type("text/plain"), "txt");
        assert_eq!(extension_for_content_type("text/html"), "html");
        assert_eq!(extension_for_content_type("text/css"), "css");
        assert_eq!(extension_for_content_type("text/javascript"), "js");
        assert_eq!(extension_for_content_type("application/json"), "json");
        assert_eq!(extension_for_content_type("application/pdf"), "pdf");
        assert_eq!(extension_for_content_type("image/png"), "png");
        assert_eq!(extension_for_content_type("image/jpeg"), "jpg");
        assert_eq!(extension_for_content_type("image/gif"), "gif");
        assert_eq!(extension_for_content_type("image/webp"), "webp");
        assert_eq!(extension_for_content_type("image/svg+xml"), "svg");
    }

    #[test]
    fn test_extension_for_content_type_ignores_parameters() {
        assert_eq!(extension_for_content_type("text/plain; charset=utf-8"), "txt");
        assert_eq!(extension_for_content_type("Application/JSON"), "json");
    }

    #[test]
    fn test_extension_for_unmapped_content_type() {
        assert_eq!(extension_for_content_type("application/octet-stream"), "");
        assert_eq!(extension_for_content_type("video/mp4"), "");
        assert_eq!(extension_for_content_type(""), "");
    }

    // -- Resolution order ----------------------------------------------------

    #[test]
    fn test_path_beats_headers() {
        let h = headers(&[
            ("x-filename", "header.bin"),
            ("content-disposition", r#"attachment; filename="cd.txt""#),
        ]);
        let facts = resolve("path.md", &h);
        assert_eq!(facts.filename.as_deref(), Some("path.md"));
        assert_eq!(facts.extension, "md");
    }

    #[test]
    fn test_x_filename_beats_disposition() {
        let h = headers(&[
            ("x-filename", "header.bin"),
            ("content-disposition", r#"attachment; filename="cd.txt""#),
        ]);
        let facts = resolve("", &h);
        assert_eq!(facts.filename.as_deref(), Some("header.bin"));
    }

    #[test]
    fn test_empty_x_filename_falls_through() {
        let h = headers(&[
            ("x-filename", ""),
            ("content-disposition", r#"attachment; filename="a.txt""#),
        ]);
        let facts = resolve("", &h);
        assert_eq!(facts.filename.as_deref(), Some("a.txt"));
        assert_eq!(facts.extension, "txt");
    }

    #[test]
    fn test_malformed_disposition_means_no_filename() {
        let h = headers(&[
            ("content-type", "image/png"),
            ("content-disposition", "attachment"),
        ]);
        let facts = resolve("", &h);
        assert_eq!(facts.filename, None);
        assert_eq!(facts.extension, "png");
    }

    #[test]
    fn test_extension_falls_back_to_content_type() {
        let h = headers(&[("content-type", "application/pdf")]);
        let facts = resolve("", &h);
        assert_eq!(facts.filename, None);
        assert_eq!(facts.extension, "pdf");
        assert_eq!(facts.content_type, "application/pdf");
    }

    #[test]
    fn test_filename_without_dot_uses_content_type() {
        let h = headers(&[("content-type", "application/pdf")]);
        let facts = resolve("report", &h);
        assert_eq!(facts.filename.as_deref(), Some("report"));
        assert_eq!(facts.extension, "pdf");
    }

    #[test]
    fn test_filename_extension_is_lowercased() {
        let h = headers(&[("content-type", "text/plain")]);
        let facts = resolve("report.PDF", &h);
        assert_eq!(facts.extension, "pdf");
    }

    #[test]
    fn test_filename_without_dot_and_unmapped_type() {
        let facts = resolve("report", &HeaderMap::new());
        assert_eq!(facts.extension, "");
    }

    #[test]
    fn test_default_content_type() {
        let facts = resolve("", &HeaderMap::new());
        assert_eq!(facts.content_type, DEFAULT_CONTENT_TYPE);
        assert_eq!(facts.filename, None);
        assert_eq!(facts.extension, "");
    }

    // -- Metadata ------------------------------------------------------------

    #[test]
    fn test_metadata_uses_unknown_sentinel() {
        let facts = resolve("", &headers(&[("content-type", "text/plain")]));
        let meta = facts.metadata(true);
        assert_eq!(meta.original_filename, UNKNOWN_FILENAME);
        assert_eq!(meta.extension.as_deref(), Some("txt"));
    }

    #[test]
    fn test_metadata_omits_extension_when_not_recorded() {
        let facts = resolve("notes.txt", &HeaderMap::new());
        let meta = facts.metadata(false);
        assert_eq!(meta.original_filename, "notes.txt");
        assert_eq!(meta.extension, None);
    }

    #[test]
    fn test_utf8_filename_headers_are_read() {
        let mut map = HeaderMap::new();
        map.insert(
            X_FILENAME,
            HeaderValue::from_bytes("r\u{e9}sum\u{e9}.pdf".as_bytes()).unwrap(),
        );
        let facts = resolve("", &map);
        assert_eq!(facts.filename.as_deref(), Some("r\u{e9}sum\u{e9}.pdf"));
        assert_eq!(facts.extension, "pdf");

        let mut map = HeaderMap::new();
        map.insert(
            "content-disposition",
            HeaderValue::from_bytes("attachment; filename=\"\u{fc}ber.txt\"".as_bytes())
                .unwrap(),
        );
        let facts = resolve("", &map);
        assert_eq!(facts.filename.as_deref(), Some("\u{fc}ber.txt"));
    }
}
