use std::net::{Ipv4Addr, SocketAddr};

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Largest accepted request body. Documents travel base64-encoded, so
    /// this must exceed the service's document limit by about a third.
    pub max_body_bytes: usize,
    /// Answer cross-origin requests from any origin.
    pub permissive_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            max_body_bytes: 80 * 1024 * 1024,
            permissive_cors: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(c.max_body_bytes, 80 * 1024 * 1024);
        assert!(!c.permissive_cors);
    }

    #[test]
    fn body_limit_covers_encoded_documents() {
        let service = quill_sdk::ServiceConfig::default();
        assert!(ServerConfig::default().max_body_bytes > service.max_document_bytes * 4 / 3 * 2);
    }
}
