//! Wire encoding of single-instruction memo transactions.
//!
//! Layout of a legacy transaction carrying one memo instruction:
//!
//! ```text
//! compact_u16(1) || signature[64]
//! message:
//!   header        [num_required_signatures=1, num_readonly_signed=0, num_readonly_unsigned=1]
//!   compact_u16(2) || payer[32] || memo_program[32]
//!   recent_blockhash[32]
//!   compact_u16(1)
//!     program_id_index=1
//!     compact_u16(1) || account_index=0
//!     compact_u16(len) || memo bytes
//! ```

use base64::Engine as _;
use quill_crypto::PayerKeypair;

use crate::error::{AnchorError, AnchorResult};

/// Address of the SPL Memo (v2) program.
pub const MEMO_PROGRAM_ID: &str = "MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr";

/// Largest memo the memo program accepts in a single instruction.
pub const MAX_MEMO_LEN: usize = 566;

/// Append `value` in the ledger's compact-u16 (7 bits per byte) encoding.
pub fn encode_compact_u16(value: u16, out: &mut Vec<u8>) {
    let mut rem = value;
    loop {
        let mut byte = (rem & 0x7f) as u8;
        rem >>= 7;
        if rem == 0 {
            out.push(byte);
            return;
        }
        byte |= 0x80;
        out.push(byte);
    }
}

/// Decode a base58 32-byte key or blockhash.
pub fn decode_base58_32(s: &str) -> AnchorResult<[u8; 32]> {
    let bytes = bs58::decode(s)
        .into_vec()
        .map_err(|e| AnchorError::InvalidResponse(format!("invalid base58 {s}: {e}")))?;
    bytes
        .try_into()
        .map_err(|v: Vec<u8>| AnchorError::InvalidResponse(format!("expected 32 bytes, got {}", v.len())))
}

/// A signed memo transaction ready for submission.
#[derive(Clone, Debug)]
pub struct MemoTransaction {
    message: Vec<u8>,
    signature: [u8; 64],
}

impl MemoTransaction {
    /// Compile and sign a memo transaction paid for by `payer`.
    pub fn build(
        payer: &PayerKeypair,
        recent_blockhash: [u8; 32],
        memo: &str,
    ) -> AnchorResult<Self> {
        if memo.len() > MAX_MEMO_LEN {
            return Err(AnchorError::Submission(format!(
                "memo of {} bytes exceeds {MAX_MEMO_LEN}",
                memo.len()
            )));
        }
        let program_id = decode_base58_32(MEMO_PROGRAM_ID)?;
        let message = compile_message(&payer.public_key(), &program_id, &recent_blockhash, memo.as_bytes());
        let signature = payer.sign(&message);
        Ok(Self { message, signature })
    }

    /// The serialized message covered by the signature.
    pub fn message_bytes(&self) -> &[u8] {
        &self.message
    }

    /// The payer's signature, which also identifies the transaction.
    pub fn signature(&self) -> &[u8; 64] {
        &self.signature
    }

    /// Base58 transaction signature as reported by the ledger.
    pub fn signature_base58(&self) -> String {
        bs58::encode(self.signature).into_string()
    }

    /// Full wire form: signatures followed by the message.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + 64 + self.message.len());
        encode_compact_u16(1, &mut out);
        out.extend_from_slice(&self.signature);
        out.extend_from_slice(&self.message);
        out
    }

    /// Base64 of the wire form, for `sendTransaction`.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.to_wire())
    }
}

fn compile_message(payer: &[u8; 32], program_id: &[u8; 32], blockhash: &[u8; 32], data: &[u8]) -> Vec<u8> {
    let mut msg = Vec::with_capacity(3 + 1 + 64 + 32 + 8 + data.len());
    msg.extend_from_slice(&[1, 0, 1]);

    encode_compact_u16(2, &mut msg);
    msg.extend_from_slice(payer);
    msg.extend_from_slice(program_id);

    msg.extend_from_slice(blockhash);

    encode_compact_u16(1, &mut msg);
    msg.push(1);
    encode_compact_u16(1, &mut msg);
    msg.push(0);
    // Memo length is bounded by MAX_MEMO_LEN, well inside u16.
    encode_compact_u16(data.len() as u16, &mut msg);
    msg.extend_from_slice(data);
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compact(value: u16) -> Vec<u8> {
        let mut out = Vec::new();
        encode_compact_u16(value, &mut out);
        out
    }

    #[test]
    fn compact_u16_vectors() {
        assert_eq!(compact(0), vec![0x00]);
        assert_eq!(compact(0x7f), vec![0x7f]);
        assert_eq!(compact(0x80), vec![0x80, 0x01]);
        assert_eq!(compact(0x3fff), vec![0xff, 0x7f]);
        assert_eq!(compact(0x4000), vec![0x80, 0x80, 0x01]);
        assert_eq!(compact(u16::MAX), vec![0xff, 0xff, 0x03]);
    }

    #[test]
    fn memo_program_id_decodes() {
        assert!(decode_base58_32(MEMO_PROGRAM_ID).is_ok());
    }

    #[test]
    fn transaction_layout() {
        let payer = PayerKeypair::from_secret([3; 32]);
        let memo = format!("FILE_HASH={}", "ab".repeat(32));
        let tx = MemoTransaction::build(&payer, [9; 32], &memo).unwrap();
        let wire = tx.to_wire();

        assert_eq!(wire[0], 1);
        assert_eq!(&wire[1..65], tx.signature());

        let msg = &wire[65..];
        assert_eq!(msg, tx.message_bytes());
        assert_eq!(&msg[..3], &[1, 0, 1]);
        assert_eq!(msg[3], 2);
        assert_eq!(&msg[4..36], &payer.public_key());
        assert_eq!(&msg[36..68], &decode_base58_32(MEMO_PROGRAM_ID).unwrap());
        assert_eq!(&msg[68..100], &[9; 32]);
        // one instruction: program index 1, one account (payer), memo data
        assert_eq!(&msg[100..104], &[1, 1, 1, 0]);
        assert_eq!(msg[104] as usize, memo.len());
        assert_eq!(&msg[105..], memo.as_bytes());
    }

    #[test]
    fn signature_covers_message() {
        let payer = PayerKeypair::generate();
        let tx = MemoTransaction::build(&payer, [1; 32], "FILE_HASH=00").unwrap();
        assert!(payer.verify(tx.message_bytes(), tx.signature()));
    }

    #[test]
    fn base64_decodes_to_wire() {
        let payer = PayerKeypair::generate();
        let tx = MemoTransaction::build(&payer, [1; 32], "memo").unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(tx.to_base64())
            .unwrap();
        assert_eq!(decoded, tx.to_wire());
    }

    #[test]
    fn oversized_memo_rejected() {
        let payer = PayerKeypair::generate();
        let memo = "x".repeat(MAX_MEMO_LEN + 1);
        assert!(matches!(
            MemoTransaction::build(&payer, [1; 32], &memo),
            Err(AnchorError::Submission(_))
        ));
    }
}
