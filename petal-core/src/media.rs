//! Media-type helpers: the fixed MIME → extension table used when building
//! content-addressed URLs, and the first-chunk content sniffer used by the
//! ingest path.

/// Return the usual file extension (with leading dot) for a MIME type.
///
/// Any `; charset=...` parameter is ignored. Unknown types map to `.bin`.
pub fn extension_for(media_type: &str) -> &'static str {
    let cleaned = media_type.split(';').next().unwrap_or("").trim();
    match cleaned {
        "application/json" => ".json",
        "application/pdf" => ".pdf",
        "application/xml" | "text/xml" => ".xml",
        "application/zip" => ".zip",
        "application/gzip" => ".gz",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => ".xlsx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => ".docx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => ".pptx",
        "application/x-tar" => ".tar",
        "application/vnd.rar" => ".rar",
        "application/x-sh" => ".sh",
        "audio/aac" => ".aac",
        "audio/mpeg" => ".mp3",
        "audio/ogg" => ".ogg",
        "audio/wav" => ".wav",
        "audio/webm" | "video/webm" => ".webm",
        "image/bmp" => ".bmp",
        "image/gif" => ".gif",
        "image/jpeg" => ".jpg",
        "image/png" => ".png",
        "image/svg+xml" => ".svg",
        "image/tiff" => ".tif",
        "image/webp" => ".webp",
        "text/css" => ".css",
        "text/csv" => ".csv",
        "text/html" => ".html",
        "text/javascript" => ".js",
        "text/plain" => ".txt",
        "video/avi" => ".avi",
        "video/mpeg" => ".mpeg",
        "video/mp4" => ".mp4",
        "video/ogg" => ".ogv",
        "video/x-flv" => ".flv",
        "video/x-ms-wmv" => ".wmv",
        _ => ".bin",
    }
}

/// Detect the media type of a blob from its leading bytes.
///
/// Magic-number detection first; bytes with no recognizable signature fall
/// back to `text/plain; charset=utf-8` when they are valid UTF-8 and
/// `application/octet-stream` otherwise.
pub fn detect_media_type(prefix: &[u8]) -> String {
    if let Some(kind) = infer::get(prefix) {
        return kind.mime_type().to_owned();
    }
    if std::str::from_utf8(prefix).is_ok() {
        "text/plain; charset=utf-8".to_owned()
    } else {
        "application/octet-stream".to_owned()
    }
}

/// Whether a detected media type satisfies the client's declared hint.
///
/// The detected type must contain the declared one as a substring, so
/// `text/plain; charset=utf-8` satisfies a declared `text/plain` and an
/// empty declaration accepts anything.
pub fn satisfies_declared(detected: &str, declared: &str) -> bool {
    detected.contains(declared)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions() {
        assert_eq!(extension_for("text/plain"), ".txt");
        assert_eq!(extension_for("text/plain; charset=utf-8"), ".txt");
        assert_eq!(extension_for("image/png"), ".png");
        assert_eq!(extension_for("video/webm"), ".webm");
    }

    #[test]
    fn unknown_extension_defaults_to_bin() {
        assert_eq!(extension_for("application/wasm"), ".bin");
        assert_eq!(extension_for(""), ".bin");
    }

    #[test]
    fn detects_png_magic() {
        let png = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0];
        assert_eq!(detect_media_type(&png), "image/png");
    }

    #[test]
    fn utf8_falls_back_to_text_plain() {
        assert_eq!(
            detect_media_type(b"hello, world!"),
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn binary_falls_back_to_octet_stream() {
        assert_eq!(
            detect_media_type(&[0x00, 0xff, 0xfe, 0x01]),
            "application/octet-stream"
        );
    }

    #[test]
    fn substring_check() {
        assert!(satisfies_declared("text/plain; charset=utf-8", "text/plain"));
        assert!(satisfies_declared("image/png", ""));
        assert!(!satisfies_declared("image/png", "text/plain"));
    }
}
