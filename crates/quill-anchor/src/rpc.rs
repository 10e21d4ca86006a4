use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use quill_crypto::PayerKeypair;
use quill_types::Memo;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::{Commitment, LedgerConfig};
use crate::error::{AnchorError, AnchorResult};
use crate::traits::LedgerAnchor;
use crate::transaction::{decode_base58_32, MemoTransaction, MEMO_PROGRAM_ID};

/// JSON-RPC ledger client.
///
/// Reads chain state with `getBlockHeight` / `getLatestBlockhash`, submits
/// locally signed memo transactions with `sendTransaction`, optionally polls
/// `getSignatureStatuses` until the configured commitment is reached, and
/// resolves anchored memos with `getTransaction`.
pub struct RpcLedger {
    config: LedgerConfig,
    payer: Option<PayerKeypair>,
    http: reqwest::Client,
    next_id: AtomicU64,
}

#[derive(Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct LatestBlockhash {
    value: BlockhashValue,
}

#[derive(Deserialize)]
struct BlockhashValue {
    blockhash: String,
}

#[derive(Deserialize)]
struct SignatureStatuses {
    value: Vec<Option<SignatureStatus>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureStatus {
    #[serde(default)]
    err: Option<Value>,
    #[serde(default)]
    confirmation_status: Option<String>,
}

impl RpcLedger {
    /// Create a client. Without a payer the client can read and verify but
    /// every `anchor` call fails.
    pub fn new(config: LedgerConfig, payer: Option<PayerKeypair>) -> AnchorResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("quill/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AnchorError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            config,
            payer,
            http,
            next_id: AtomicU64::new(1),
        })
    }

    /// Create a client, loading the payer from `config.keypair_path` if set.
    pub fn from_config(config: LedgerConfig) -> AnchorResult<Self> {
        let payer = match &config.keypair_path {
            Some(path) => {
                Some(PayerKeypair::load(path).map_err(|e| AnchorError::Keypair(e.to_string()))?)
            }
            None => None,
        };
        Self::new(config, payer)
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Address of the payer account, if one is configured.
    pub fn payer_address(&self) -> Option<String> {
        self.payer.as_ref().map(PayerKeypair::address)
    }

    async fn call(&self, method: &str, params: Value) -> AnchorResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(method, id, endpoint = self.config.rpc_endpoint(), "ledger rpc call");

        let response = self
            .http
            .post(self.config.rpc_endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| AnchorError::Network(format!("{method}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnchorError::Network(format!("{method}: HTTP {status}")));
        }

        let envelope: RpcEnvelope = response
            .json()
            .await
            .map_err(|e| AnchorError::InvalidResponse(format!("{method}: {e}")))?;

        if let Some(err) = envelope.error {
            warn!(method, code = err.code, message = %err.message, "ledger rpc error");
            return Err(AnchorError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        Ok(envelope.result.unwrap_or(Value::Null))
    }

    async fn call_typed<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> AnchorResult<T> {
        let value = self.call(method, params).await?;
        serde_json::from_value(value)
            .map_err(|e| AnchorError::InvalidResponse(format!("{method}: {e}")))
    }

    fn commitment_param(&self) -> Value {
        json!({ "commitment": self.config.commitment.as_str() })
    }

    async fn latest_blockhash(&self) -> AnchorResult<[u8; 32]> {
        let latest: LatestBlockhash = self
            .call_typed("getLatestBlockhash", json!([self.commitment_param()]))
            .await?;
        decode_base58_32(&latest.value.blockhash)
    }

    async fn submit(&self, memo: &Memo) -> AnchorResult<String> {
        let payer = self
            .payer
            .as_ref()
            .ok_or_else(|| AnchorError::Keypair("no payer keypair configured".into()))?;

        let blockhash = self.latest_blockhash().await?;
        let tx = MemoTransaction::build(payer, blockhash, &memo.to_string())?;
        let expected = tx.signature_base58();

        let signature: String = self
            .call_typed(
                "sendTransaction",
                json!([
                    tx.to_base64(),
                    {
                        "encoding": "base64",
                        "preflightCommitment": self.config.commitment.as_str(),
                    }
                ]),
            )
            .await?;

        if signature != expected {
            warn!(%signature, %expected, "ledger returned an unexpected transaction signature");
        }

        if self.config.confirm {
            self.await_confirmation(&signature).await?;
        }
        Ok(signature)
    }

    async fn await_confirmation(&self, signature: &str) -> AnchorResult<()> {
        let deadline = Instant::now() + Duration::from_secs(self.config.confirm_timeout_secs);
        let poll = Duration::from_millis(self.config.confirm_poll_millis);

        loop {
            let statuses: SignatureStatuses = self
                .call_typed("getSignatureStatuses", json!([[signature]]))
                .await?;

            if let Some(Some(status)) = statuses.value.into_iter().next() {
                if let Some(err) = status.err.filter(|e| !e.is_null()) {
                    return Err(AnchorError::Submission(format!(
                        "transaction {signature} failed on-chain: {err}"
                    )));
                }
                let reached = status
                    .confirmation_status
                    .as_deref()
                    .and_then(Commitment::from_status)
                    .is_some_and(|c| c >= self.config.commitment);
                if reached {
                    debug!(%signature, "transaction confirmed");
                    return Ok(());
                }
            }

            if Instant::now() >= deadline {
                return Err(AnchorError::Submission(format!(
                    "transaction {signature} not confirmed within {}s",
                    self.config.confirm_timeout_secs
                )));
            }
            tokio::time::sleep(poll).await;
        }
    }
}

impl std::fmt::Debug for RpcLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcLedger")
            .field("endpoint", &self.config.rpc_endpoint())
            .field("payer", &self.payer_address())
            .finish()
    }
}

#[async_trait]
impl LedgerAnchor for RpcLedger {
    async fn freshness_marker(&self) -> AnchorResult<u64> {
        self.call_typed("getBlockHeight", json!([self.commitment_param()]))
            .await
            .map_err(AnchorError::into_network)
    }

    async fn anchor(&self, memo: &Memo) -> AnchorResult<String> {
        let signature = self
            .submit(memo)
            .await
            .map_err(AnchorError::into_submission)?;
        info!(%signature, memo = %memo, "memo anchored");
        Ok(signature)
    }

    async fn memo_for(&self, tx_signature: &str) -> AnchorResult<Option<Memo>> {
        let tx = self
            .call(
                "getTransaction",
                json!([
                    tx_signature,
                    {
                        "encoding": "jsonParsed",
                        "maxSupportedTransactionVersion": 0,
                        "commitment": self.config.commitment.as_str(),
                    }
                ]),
            )
            .await?;

        if tx.is_null() {
            return Ok(None);
        }
        if tx.pointer("/meta/err").is_some_and(|e| !e.is_null()) {
            return Err(AnchorError::FailedTransaction(tx_signature.to_string()));
        }

        let instructions = tx
            .pointer("/transaction/message/instructions")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                AnchorError::InvalidResponse(format!("{tx_signature}: no instructions"))
            })?;

        instructions
            .iter()
            .filter(|ix| ix.get("programId").and_then(Value::as_str) == Some(MEMO_PROGRAM_ID))
            .filter_map(|ix| ix.get("parsed").and_then(Value::as_str))
            .find_map(|text| Memo::parse(text).ok())
            .map(Some)
            .ok_or_else(|| AnchorError::MemoMissing(tx_signature.to_string()))
    }

    fn transaction_url(&self, tx_signature: &str) -> String {
        self.config.transaction_url(tx_signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use quill_types::Digest;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> LedgerConfig {
        LedgerConfig {
            rpc_url: Some(server.uri()),
            confirm: false,
            confirm_timeout_secs: 1,
            confirm_poll_millis: 10,
            ..Default::default()
        }
    }

    fn rpc_result(result: Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
    }

    fn rpc_error(code: i64, message: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": code, "message": message },
        }))
    }

    async fn mount(server: &MockServer, rpc_method: &str, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": rpc_method })))
            .respond_with(response)
            .mount(server)
            .await;
    }

    async fn mount_blockhash(server: &MockServer) {
        mount(
            server,
            "getLatestBlockhash",
            rpc_result(json!({
                "context": { "slot": 1 },
                "value": {
                    "blockhash": bs58::encode([4u8; 32]).into_string(),
                    "lastValidBlockHeight": 200,
                },
            })),
        )
        .await;
    }

    fn memo() -> Memo {
        Memo::new(Digest::from_bytes([0xee; 32]))
    }

    #[tokio::test]
    async fn freshness_marker_reads_block_height() {
        let server = MockServer::start().await;
        mount(&server, "getBlockHeight", rpc_result(json!(123_456))).await;

        let ledger = RpcLedger::new(config_for(&server), None).unwrap();
        assert_eq!(ledger.freshness_marker().await.unwrap(), 123_456);
    }

    #[tokio::test]
    async fn freshness_rpc_error_is_network() {
        let server = MockServer::start().await;
        mount(&server, "getBlockHeight", rpc_error(-32005, "node is behind")).await;

        let ledger = RpcLedger::new(config_for(&server), None).unwrap();
        let err = ledger.freshness_marker().await.unwrap_err();
        assert!(matches!(err, AnchorError::Network(m) if m.contains("node is behind")));
    }

    #[tokio::test]
    async fn freshness_http_failure_is_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let ledger = RpcLedger::new(config_for(&server), None).unwrap();
        assert!(matches!(
            ledger.freshness_marker().await,
            Err(AnchorError::Network(_))
        ));
    }

    #[tokio::test]
    async fn anchor_sends_signed_memo_transaction() {
        let server = MockServer::start().await;
        mount_blockhash(&server).await;
        mount(&server, "sendTransaction", rpc_result(json!("5igSig"))).await;

        let payer = PayerKeypair::from_secret([5; 32]);
        let payer_key = payer.public_key();
        let ledger = RpcLedger::new(config_for(&server), Some(payer)).unwrap();
        assert_eq!(ledger.anchor(&memo()).await.unwrap(), "5igSig");

        let requests = server.received_requests().await.unwrap();
        let send = requests
            .iter()
            .map(|r| serde_json::from_slice::<Value>(&r.body).unwrap())
            .find(|b| b["method"] == "sendTransaction")
            .unwrap();
        assert_eq!(send["params"][1]["encoding"], "base64");

        let wire = base64::engine::general_purpose::STANDARD
            .decode(send["params"][0].as_str().unwrap())
            .unwrap();
        let memo_text = memo().to_string();
        assert!(wire.ends_with(memo_text.as_bytes()));
        assert_eq!(&wire[65 + 4..65 + 36], &payer_key);
        assert_eq!(&wire[65 + 68..65 + 100], &[4u8; 32]);
    }

    #[tokio::test]
    async fn anchor_without_payer_fails() {
        let server = MockServer::start().await;
        let ledger = RpcLedger::new(config_for(&server), None).unwrap();
        let err = ledger.anchor(&memo()).await.unwrap_err();
        assert!(matches!(err, AnchorError::Submission(m) if m.contains("no payer keypair")));
    }

    #[tokio::test]
    async fn rejected_transaction_is_submission_error() {
        let server = MockServer::start().await;
        mount_blockhash(&server).await;
        mount(
            &server,
            "sendTransaction",
            rpc_error(-32002, "Attempt to debit an account but found no record of a prior credit."),
        )
        .await;

        let ledger =
            RpcLedger::new(config_for(&server), Some(PayerKeypair::generate())).unwrap();
        let err = ledger.anchor(&memo()).await.unwrap_err();
        let text = err.to_string();
        assert!(text.starts_with("Transaction failed:"));
        assert!(text.contains("no record of a prior credit"));
    }

    #[tokio::test]
    async fn anchor_waits_for_confirmation() {
        let server = MockServer::start().await;
        mount_blockhash(&server).await;
        mount(&server, "sendTransaction", rpc_result(json!("sig-1"))).await;
        mount(
            &server,
            "getSignatureStatuses",
            rpc_result(json!({
                "context": { "slot": 2 },
                "value": [{ "slot": 2, "confirmations": null, "err": null, "confirmationStatus": "finalized" }],
            })),
        )
        .await;

        let config = LedgerConfig {
            confirm: true,
            ..config_for(&server)
        };
        let ledger = RpcLedger::new(config, Some(PayerKeypair::generate())).unwrap();
        assert_eq!(ledger.anchor(&memo()).await.unwrap(), "sig-1");
    }

    #[tokio::test]
    async fn on_chain_failure_during_confirmation() {
        let server = MockServer::start().await;
        mount_blockhash(&server).await;
        mount(&server, "sendTransaction", rpc_result(json!("sig-2"))).await;
        mount(
            &server,
            "getSignatureStatuses",
            rpc_result(json!({
                "context": { "slot": 2 },
                "value": [{ "slot": 2, "err": { "InstructionError": [0, "Custom"] }, "confirmationStatus": "confirmed" }],
            })),
        )
        .await;

        let config = LedgerConfig {
            confirm: true,
            ..config_for(&server)
        };
        let ledger = RpcLedger::new(config, Some(PayerKeypair::generate())).unwrap();
        let err = ledger.anchor(&memo()).await.unwrap_err();
        assert!(matches!(err, AnchorError::Submission(m) if m.contains("failed on-chain")));
    }

    #[tokio::test]
    async fn confirmation_times_out() {
        let server = MockServer::start().await;
        mount_blockhash(&server).await;
        mount(&server, "sendTransaction", rpc_result(json!("sig-3"))).await;
        mount(
            &server,
            "getSignatureStatuses",
            rpc_result(json!({ "context": { "slot": 2 }, "value": [null] })),
        )
        .await;

        let config = LedgerConfig {
            confirm: true,
            ..config_for(&server)
        };
        let ledger = RpcLedger::new(config, Some(PayerKeypair::generate())).unwrap();
        let err = ledger.anchor(&memo()).await.unwrap_err();
        assert!(matches!(err, AnchorError::Submission(m) if m.contains("not confirmed")));
    }

    fn parsed_transaction(instructions: Value, err: Value) -> Value {
        json!({
            "slot": 10,
            "meta": { "err": err },
            "transaction": { "message": { "instructions": instructions } },
        })
    }

    #[tokio::test]
    async fn memo_for_reads_parsed_memo() {
        let server = MockServer::start().await;
        mount(
            &server,
            "getTransaction",
            rpc_result(parsed_transaction(
                json!([{
                    "program": "spl-memo",
                    "programId": MEMO_PROGRAM_ID,
                    "parsed": memo().to_string(),
                    "stackHeight": null,
                }]),
                Value::Null,
            )),
        )
        .await;

        let ledger = RpcLedger::new(config_for(&server), None).unwrap();
        assert_eq!(ledger.memo_for("sig").await.unwrap(), Some(memo()));
    }

    #[tokio::test]
    async fn memo_for_unknown_transaction() {
        let server = MockServer::start().await;
        mount(&server, "getTransaction", rpc_result(Value::Null)).await;

        let ledger = RpcLedger::new(config_for(&server), None).unwrap();
        assert_eq!(ledger.memo_for("sig").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memo_for_transaction_without_memo() {
        let server = MockServer::start().await;
        mount(
            &server,
            "getTransaction",
            rpc_result(parsed_transaction(
                json!([{ "program": "system", "programId": "11111111111111111111111111111111", "parsed": { "type": "transfer" } }]),
                Value::Null,
            )),
        )
        .await;

        let ledger = RpcLedger::new(config_for(&server), None).unwrap();
        assert_eq!(
            ledger.memo_for("sig").await.unwrap_err(),
            AnchorError::MemoMissing("sig".into())
        );
    }

    #[tokio::test]
    async fn memo_for_failed_transaction() {
        let server = MockServer::start().await;
        mount(
            &server,
            "getTransaction",
            rpc_result(parsed_transaction(json!([]), json!({ "InstructionError": [0, "Custom"] }))),
        )
        .await;

        let ledger = RpcLedger::new(config_for(&server), None).unwrap();
        assert_eq!(
            ledger.memo_for("sig").await.unwrap_err(),
            AnchorError::FailedTransaction("sig".into())
        );
    }
}
