use async_trait::async_trait;
use gateway_core::*;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A scripted in-memory adapter for exercising the registry and the API
/// layer without a real broker behind it.
///
/// Every operation returns a canned outcome and bumps an invocation
/// counter, so tests can assert both what came back and that the adapter
/// was actually called (the gateway does no caching).
pub struct SimulatedAdapter {
    balances: BTreeMap<String, Decimal>,
    trade_result: TradeResult,
    /// When set, every operation fails with an error of this kind.
    failure: Mutex<Option<AdapterErrorKind>>,
    balance_calls: AtomicUsize,
    trade_calls: AtomicUsize,
    transfer_calls: AtomicUsize,
    market_data_calls: AtomicUsize,
}

impl Default for SimulatedAdapter {
    fn default() -> Self {
        let mut balances = BTreeMap::new();
        balances.insert("USDT".to_string(), Decimal::new(10_000, 0));
        Self {
            balances,
            trade_result: TradeResult::filled("sim-1"),
            failure: Mutex::new(None),
            balance_calls: AtomicUsize::new(0),
            trade_calls: AtomicUsize::new(0),
            transfer_calls: AtomicUsize::new(0),
            market_data_calls: AtomicUsize::new(0),
        }
    }
}

impl SimulatedAdapter {
    pub fn with_trade_result(trade_result: TradeResult) -> Self {
        Self {
            trade_result,
            ..Self::default()
        }
    }

    /// Make every subsequent operation fail with the given kind.
    pub fn fail_with(&self, kind: AdapterErrorKind) {
        *self.failure.lock().unwrap() = Some(kind);
    }

    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }

    pub fn trade_calls(&self) -> usize {
        self.trade_calls.load(Ordering::SeqCst)
    }

    pub fn transfer_calls(&self) -> usize {
        self.transfer_calls.load(Ordering::SeqCst)
    }

    pub fn market_data_calls(&self) -> usize {
        self.market_data_calls.load(Ordering::SeqCst)
    }

    fn scripted_failure(&self) -> Option<AdapterError> {
        let kind = (*self.failure.lock().unwrap())?;
        Some(match kind {
            AdapterErrorKind::SubprocessFailure => {
                AdapterError::Subprocess("simulated terminal failure".into())
            }
            AdapterErrorKind::ParseFailure => AdapterError::Parse("simulated garbage".into()),
            AdapterErrorKind::NetworkFailure => {
                AdapterError::Network("simulated connection reset".into())
            }
            AdapterErrorKind::BrokerRejected => {
                AdapterError::Rejected("simulated rejection".into())
            }
            AdapterErrorKind::Timeout => {
                AdapterError::Timeout(std::time::Duration::from_secs(30))
            }
        })
    }
}

#[async_trait]
impl BrokerAdapter for SimulatedAdapter {
    async fn balance(&self, _account: &BrokerAccount) -> Result<BalanceSnapshot, AdapterError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.scripted_failure() {
            return Err(err);
        }
        Ok(BalanceSnapshot::Assets(self.balances.clone()))
    }

    async fn execute_trade(
        &self,
        _account: &BrokerAccount,
        _request: &TradeRequest,
    ) -> Result<TradeResult, AdapterError> {
        self.trade_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.scripted_failure() {
            return Err(err);
        }
        Ok(self.trade_result.clone())
    }

    async fn deposit(
        &self,
        _account: &BrokerAccount,
        request: &TransferRequest,
    ) -> Result<TransferResult, AdapterError> {
        self.transfer_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.scripted_failure() {
            return Err(err);
        }
        Ok(TransferResult::pending(
            None,
            format!("simulated deposit of {} {}", request.amount, request.currency),
        ))
    }

    async fn withdraw(
        &self,
        _account: &BrokerAccount,
        request: &TransferRequest,
    ) -> Result<TransferResult, AdapterError> {
        self.transfer_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.scripted_failure() {
            return Err(err);
        }
        Ok(TransferResult::pending(
            request.address.clone(),
            "simulated withdrawal".to_string(),
        ))
    }

    async fn market_data(&self, symbol: &str) -> Result<serde_json::Value, AdapterError> {
        self.market_data_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.scripted_failure() {
            return Err(err);
        }
        Ok(serde_json::json!({ "symbol": symbol, "bid": 1.0, "ask": 1.0002 }))
    }
}
