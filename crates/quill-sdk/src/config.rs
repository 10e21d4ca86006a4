use serde::{Deserialize, Serialize};

/// Limits and defaults applied by the document service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Longest accepted document name, in characters.
    pub max_name_len: usize,
    /// Largest accepted document, in bytes.
    pub max_document_bytes: usize,
    /// Accepted MIME types, compared case-insensitively.
    pub allowed_mime_types: Vec<String>,
    /// Signatures a document needs when the request does not say.
    pub default_required_signatures: u32,
    /// Lifetime of a signing wizard session.
    pub session_ttl_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_name_len: 255,
            max_document_bytes: 25 * 1024 * 1024,
            allowed_mime_types: vec!["application/pdf".into()],
            default_required_signatures: 1,
            session_ttl_secs: 60 * 60,
        }
    }
}

impl ServiceConfig {
    pub fn allows_mime_type(&self, mime_type: &str) -> bool {
        let mime_type = mime_type.trim();
        self.allowed_mime_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(mime_type))
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        let secs = self.session_ttl_secs.min(i64::MAX as u64 / 1000);
        chrono::Duration::seconds(secs as i64)
    }
}
