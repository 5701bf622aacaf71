//! Body capture policy
//!
//! Bodies up to `cap_bytes` (inclusive) are kept as text. Larger bodies and
//! binary content types are replaced by a placeholder; binary bodies are
//! never decoded.

use super::types::BodyRead;

/// Content-type prefixes treated as binary
const BINARY_CONTENT_TYPES: &[&str] = &["image/", "audio/", "video/", "application/octet-stream"];

#[derive(Debug, Clone, Copy)]
pub struct BodyCapture {
    cap_bytes: usize,
}

impl BodyCapture {
    pub fn new(cap_bytes: usize) -> Self {
        Self { cap_bytes }
    }

    pub fn cap_bytes(&self) -> usize {
        self.cap_bytes
    }

    /// Turn a body into the text stored in the log entry
    pub fn capture(&self, content_type: Option<&str>, body: BodyRead<'_>) -> Option<String> {
        match body {
            BodyRead::Empty => None,
            BodyRead::Failed(error) => Some(format!("[body unavailable: {}]", error)),
            BodyRead::Bytes(bytes) => {
                if let Some(ct) = content_type.filter(|ct| is_binary(ct)) {
                    return Some(format!("[binary body: {}]", ct));
                }
                if bytes.len() > self.cap_bytes {
                    return Some(format!(
                        "[body omitted: {} bytes exceeds {} byte limit]",
                        bytes.len(),
                        self.cap_bytes
                    ));
                }
                Some(String::from_utf8_lossy(bytes).into_owned())
            }
        }
    }
}

fn is_binary(content_type: &str) -> bool {
    let ct = content_type.trim().to_ascii_lowercase();
    BINARY_CONTENT_TYPES.iter().any(|prefix| ct.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_body_preserved() {
        let capture = BodyCapture::new(16);
        assert_eq!(
            capture.capture(Some("application/json"), BodyRead::Bytes(b"{\"ok\":true}")),
            Some("{\"ok\":true}".to_string())
        );
    }

    #[test]
    fn test_cap_boundary_is_inclusive() {
        let capture = BodyCapture::new(4);
        assert_eq!(capture.capture(None, BodyRead::Bytes(b"abcd")), Some("abcd".to_string()));

        let omitted = capture.capture(None, BodyRead::Bytes(b"abcde")).unwrap();
        assert!(omitted.contains("5 bytes"));
        assert!(!omitted.contains("abcde"));
    }

    #[test]
    fn test_binary_never_decoded() {
        let capture = BodyCapture::new(1024);
        let text = capture
            .capture(Some("image/png"), BodyRead::Bytes(&[0x89, 0x50, 0x4e, 0x47]))
            .unwrap();
        assert_eq!(text, "[binary body: image/png]");

        let octet = capture
            .capture(Some("Application/Octet-Stream"), BodyRead::Bytes(b"raw"))
            .unwrap();
        assert!(octet.starts_with("[binary body:"));
    }

    #[test]
    fn test_failed_read_becomes_placeholder() {
        let capture = BodyCapture::new(1024);
        let text = capture.capture(None, BodyRead::Failed("connection reset")).unwrap();
        assert!(text.contains("connection reset"));
    }

    #[test]
    fn test_empty_body_is_none() {
        let capture = BodyCapture::new(1024);
        assert_eq!(capture.capture(Some("text/plain"), BodyRead::Empty), None);
    }
}
