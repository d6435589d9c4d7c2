//! Margin-FX broker adapter.
//!
//! The venue has no network API; every query goes through its automation
//! terminal, spawned as a child process per call. Credentials travel as
//! process arguments for that single invocation and the terminal answers
//! with one line of JSON on stdout (see [`terminal`] for the contract).

pub mod protocol;
pub mod terminal;

use async_trait::async_trait;
use gateway_core::*;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use protocol::{TerminalOrder, TerminalReply, TerminalTradeReply};
use terminal::{TerminalBridge, DEFAULT_CALL_TIMEOUT};

/// Configuration for the margin-FX adapter.
#[derive(Debug, Clone)]
pub struct MarginFxConfig {
    /// Entry point of the trading automation terminal (balance, orders).
    pub terminal_script: PathBuf,
    /// Entry point of the market data script.
    pub market_data_script: PathBuf,
    /// Hard bound on each terminal invocation.
    pub call_timeout: Duration,
}

impl MarginFxConfig {
    pub fn new(terminal_script: impl Into<PathBuf>, market_data_script: impl Into<PathBuf>) -> Self {
        Self {
            terminal_script: terminal_script.into(),
            market_data_script: market_data_script.into(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

/// Adapter for the margin-FX venue, bridging every operation over the
/// automation terminal.
pub struct MarginFxAdapter {
    trading: TerminalBridge,
    market_data: TerminalBridge,
}

impl MarginFxAdapter {
    pub fn new(config: MarginFxConfig) -> Self {
        Self {
            trading: TerminalBridge::new(config.terminal_script, config.call_timeout),
            market_data: TerminalBridge::new(config.market_data_script, config.call_timeout),
        }
    }

    /// Credentials for the terminal's argv. Absent credentials are
    /// forwarded as empty strings; the terminal reports the resulting
    /// login failure itself as a structured error reply.
    fn credential_args(account: &BrokerAccount) -> (String, String) {
        match &account.credentials {
            Some(creds) => (creds.password.clone(), creds.server.clone()),
            None => (String::new(), String::new()),
        }
    }
}

#[async_trait]
impl BrokerAdapter for MarginFxAdapter {
    /// Account summary as reported by the terminal. Shape:
    /// [`BalanceSnapshot::Margin`].
    async fn balance(&self, account: &BrokerAccount) -> Result<BalanceSnapshot, AdapterError> {
        let (password, server) = Self::credential_args(account);
        let reply = self
            .trading
            .run(&[&account.account_id, &password, &server])
            .await?;
        match reply {
            TerminalReply::Failure { error } => Err(AdapterError::Rejected(error)),
            TerminalReply::Payload(value) => {
                let balance: MarginBalance = serde_json::from_value(value)
                    .map_err(|e| AdapterError::Parse(format!("unexpected balance shape: {e}")))?;
                Ok(BalanceSnapshot::Margin(balance))
            }
        }
    }

    async fn execute_trade(
        &self,
        account: &BrokerAccount,
        request: &TradeRequest,
    ) -> Result<TradeResult, AdapterError> {
        let order = TerminalOrder::from(request);
        let payload = serde_json::to_string(&order)
            .map_err(|e| AdapterError::Parse(format!("order serialization failed: {e}")))?;

        let (password, server) = Self::credential_args(account);
        let reply = self
            .trading
            .run(&[&account.account_id, &password, &server, &payload])
            .await?;

        match reply {
            // The terminal refusing an order is a normal trade outcome,
            // not an infrastructure error.
            TerminalReply::Failure { error } => Ok(TradeResult::rejected(error)),
            TerminalReply::Payload(value) => {
                let reply: TerminalTradeReply = serde_json::from_value(value)
                    .map_err(|e| AdapterError::Parse(format!("unexpected trade reply: {e}")))?;
                normalize_trade_reply(reply)
            }
        }
    }

    /// Acknowledgement-only: fund movement for this venue is settled out
    /// of band by the operations desk, so the request is recorded as
    /// pending without invoking the terminal at all.
    async fn deposit(
        &self,
        _account: &BrokerAccount,
        request: &TransferRequest,
    ) -> Result<TransferResult, AdapterError> {
        Ok(TransferResult::pending(
            None,
            format!(
                "deposit of {} {} acknowledged; settlement is handled out of band",
                request.amount, request.currency
            ),
        ))
    }

    /// Acknowledgement-only, same as [`Self::deposit`].
    async fn withdraw(
        &self,
        _account: &BrokerAccount,
        request: &TransferRequest,
    ) -> Result<TransferResult, AdapterError> {
        Ok(TransferResult::pending(
            None,
            format!(
                "withdrawal of {} {} acknowledged; settlement is handled out of band",
                request.amount, request.currency
            ),
        ))
    }

    /// Whatever structured payload the market data script emits, under
    /// the same reply contract as every other terminal call.
    async fn market_data(&self, symbol: &str) -> Result<serde_json::Value, AdapterError> {
        let reply = self.market_data.run(&[symbol]).await?;
        match reply {
            TerminalReply::Failure { error } => Err(AdapterError::Rejected(error)),
            TerminalReply::Payload(value) => Ok(value),
        }
    }
}

fn normalize_trade_reply(reply: TerminalTradeReply) -> Result<TradeResult, AdapterError> {
    let order_id = reply.order_id_string();
    match reply.status.as_deref() {
        Some("success") | Some("filled") => {
            let order_id = order_id.ok_or_else(|| {
                AdapterError::Parse("trade reply reports success without an order id".to_string())
            })?;
            Ok(TradeResult::filled(order_id))
        }
        Some("pending") => Ok(TradeResult::pending(
            order_id,
            reply.message.unwrap_or_else(|| "order pending".to_string()),
        )),
        None if order_id.is_some() => Ok(TradeResult::filled(order_id.unwrap())),
        other => {
            warn!(status = ?other, "unrecognized terminal trade status");
            Err(AdapterError::Parse(format!(
                "unrecognized trade status: {other:?}"
            )))
        }
    }
}
