//! Signed administrative writes: create an election, add candidates, close it.
//!
//! Each write is sent through the connected wallet and then awaited by
//! polling for its receipt on the read transport.

use super::chain_reader::ChainReader;
use super::wallet_session::{wallet_failure, WalletSession};
use crate::codec::abi::{encode_call, encode_hex, Token};
use crate::codec::contract::signatures;
use crate::codec::parse_quantity;
use crate::domain::{SyncResult, TxHandle, VoteSyncError};
use crate::ports::LedgerTransport;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Sends contract writes on behalf of the connected account.
pub struct AdminWriter {
    session: Arc<WalletSession>,
    reader: Arc<ChainReader>,
    transport: Arc<dyn LedgerTransport>,
    receipt_poll: Duration,
    receipt_timeout: Duration,
}

impl AdminWriter {
    /// Create a writer. Receipts are polled every `receipt_poll` for at most
    /// `receipt_timeout`.
    pub fn new(
        session: Arc<WalletSession>,
        reader: Arc<ChainReader>,
        transport: Arc<dyn LedgerTransport>,
        receipt_poll: Duration,
        receipt_timeout: Duration,
    ) -> Self {
        Self {
            session,
            reader,
            transport,
            receipt_poll,
            receipt_timeout,
        }
    }

    /// `createElection(title)`.
    pub async fn create_election(&self, title: &str) -> SyncResult<TxHandle> {
        self.send(encode_call(signatures::CREATE_ELECTION, &[Token::from(title)]))
            .await
    }

    /// `addCandidate(currentElectionId, name)`.
    pub async fn add_candidate(&self, name: &str) -> SyncResult<TxHandle> {
        self.session.signer()?;
        let election_id = self.reader.current_election_id().await?;
        self.send(encode_call(
            signatures::ADD_CANDIDATE,
            &[Token::from(election_id), Token::from(name)],
        ))
        .await
    }

    /// `closeCurrentElection()`.
    pub async fn close_current_election(&self) -> SyncResult<TxHandle> {
        self.send(encode_call(signatures::CLOSE_CURRENT_ELECTION, &[]))
            .await
    }

    async fn send(&self, data: Vec<u8>) -> SyncResult<TxHandle> {
        let (provider, from) = self.session.signer()?;
        self.reader.ensure_contract().await?;
        let tx = json!([{
            "from": from,
            "to": format!("{:?}", self.reader.contract()),
            "data": encode_hex(&data),
        }]);
        let hash = provider
            .request("eth_sendTransaction", tx)
            .await
            .map_err(wallet_failure)?;
        let hash = match hash {
            Value::String(hash) if !hash.is_empty() => hash,
            other => {
                return Err(VoteSyncError::MalformedResponse(format!(
                    "eth_sendTransaction returned {other}"
                )))
            }
        };
        debug!(tx_hash = %hash, "[vote-sync] transaction sent");

        self.await_receipt(&hash).await?;
        info!(tx_hash = %hash, "[vote-sync] transaction mined");
        Ok(TxHandle::new(hash))
    }

    async fn await_receipt(&self, hash: &str) -> SyncResult<()> {
        let deadline = Instant::now() + self.receipt_timeout;
        loop {
            let receipt = self
                .transport
                .request("eth_getTransactionReceipt", json!([hash]))
                .await?;
            if !receipt.is_null() {
                let status = receipt
                    .get("status")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        VoteSyncError::MalformedResponse(format!("receipt without status: {receipt}"))
                    })?;
                return match parse_quantity(status)? {
                    0 => Err(VoteSyncError::Rejected(format!("transaction {hash} reverted"))),
                    _ => Ok(()),
                };
            }
            if Instant::now() >= deadline {
                return Err(VoteSyncError::Unavailable(format!(
                    "transaction {hash} not mined within {:?}",
                    self.receipt_timeout
                )));
            }
            tokio::time::sleep(self.receipt_poll).await;
        }
    }
}
