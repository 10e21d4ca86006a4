use std::path::Path;

/// Ed25519 keypair that pays for and signs anchoring transactions.
///
/// Serialized the way ledger tooling stores keypairs: a JSON array of 64
/// bytes, the 32-byte secret followed by the 32-byte public key.
pub struct PayerKeypair(ed25519_dalek::SigningKey);

impl PayerKeypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let mut csprng = rand::thread_rng();
        Self(ed25519_dalek::SigningKey::generate(&mut csprng))
    }

    /// Create from a raw 32-byte secret.
    pub fn from_secret(bytes: [u8; 32]) -> Self {
        Self(ed25519_dalek::SigningKey::from_bytes(&bytes))
    }

    /// Parse the 64-byte JSON array keypair format.
    ///
    /// The embedded public key must match the one derived from the secret.
    pub fn from_keypair_json(json: &str) -> Result<Self, KeypairError> {
        let bytes: Vec<u8> =
            serde_json::from_str(json).map_err(|e| KeypairError::Malformed(e.to_string()))?;
        let arr: [u8; 64] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| KeypairError::Malformed(format!("expected 64 bytes, got {}", v.len())))?;
        let key = ed25519_dalek::SigningKey::from_keypair_bytes(&arr)
            .map_err(|_| KeypairError::PublicKeyMismatch)?;
        Ok(Self(key))
    }

    /// Load a keypair file from disk.
    pub fn load(path: &Path) -> Result<Self, KeypairError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| KeypairError::Io(format!("{}: {e}", path.display())))?;
        Self::from_keypair_json(&json)
    }

    /// Write the keypair in JSON array form.
    pub fn save(&self, path: &Path) -> Result<(), KeypairError> {
        std::fs::write(path, self.to_keypair_json())
            .map_err(|e| KeypairError::Io(format!("{}: {e}", path.display())))
    }

    /// The 64-byte JSON array form.
    pub fn to_keypair_json(&self) -> String {
        let bytes = self.0.to_keypair_bytes().to_vec();
        serde_json::to_string(&bytes).unwrap_or_default()
    }

    /// Raw public key bytes.
    pub fn public_key(&self) -> [u8; 32] {
        self.0.verifying_key().to_bytes()
    }

    /// Base58 rendering of the public key (the ledger account address).
    pub fn address(&self) -> String {
        bs58::encode(self.public_key()).into_string()
    }

    /// Sign a message and return the raw 64-byte signature.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        use ed25519_dalek::Signer;
        self.0.sign(message).to_bytes()
    }

    /// Verify a signature produced by this keypair.
    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> bool {
        use ed25519_dalek::Verifier;
        let sig = ed25519_dalek::Signature::from_bytes(signature);
        self.0.verifying_key().verify(message, &sig).is_ok()
    }
}

impl std::fmt::Debug for PayerKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PayerKeypair({}, <redacted>)", self.address())
    }
}

/// Errors from keypair handling.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KeypairError {
    #[error("malformed keypair: {0}")]
    Malformed(String),
    #[error("keypair public key does not match its secret")]
    PublicKeyMismatch,
    #[error("keypair I/O error: {0}")]
    Io(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let kp = PayerKeypair::generate();
        let sig = kp.sign(b"message");
        assert!(kp.verify(b"message", &sig));
        assert!(!kp.verify(b"other", &sig));
    }

    #[test]
    fn json_roundtrip() {
        let kp = PayerKeypair::generate();
        let json = kp.to_keypair_json();
        let parsed = PayerKeypair::from_keypair_json(&json).unwrap();
        assert_eq!(kp.public_key(), parsed.public_key());
    }

    #[test]
    fn rejects_wrong_length() {
        let err = PayerKeypair::from_keypair_json("[1,2,3]").unwrap_err();
        assert!(matches!(err, KeypairError::Malformed(_)));
    }

    #[test]
    fn rejects_mismatched_public_half() {
        let kp = PayerKeypair::generate();
        let mut bytes: Vec<u8> = serde_json::from_str(&kp.to_keypair_json()).unwrap();
        bytes[40] ^= 0xff;
        let json = serde_json::to_string(&bytes).unwrap();
        assert_eq!(
            PayerKeypair::from_keypair_json(&json).unwrap_err(),
            KeypairError::PublicKeyMismatch
        );
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payer.json");
        let kp = PayerKeypair::generate();
        kp.save(&path).unwrap();
        let loaded = PayerKeypair::load(&path).unwrap();
        assert_eq!(loaded.address(), kp.address());
    }

    #[test]
    fn address_is_base58_public_key() {
        let kp = PayerKeypair::from_secret([7; 32]);
        let decoded = bs58::decode(kp.address()).into_vec().unwrap();
        assert_eq!(decoded, kp.public_key().to_vec());
    }

    #[test]
    fn debug_redacts_secret() {
        let kp = PayerKeypair::generate();
        assert!(format!("{kp:?}").contains("redacted"));
    }
}
