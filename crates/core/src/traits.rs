use crate::error::AdapterError;
use crate::models::*;
use async_trait::async_trait;

// ---------------------------------------------------------------------------
// Broker Adapter Trait
// ---------------------------------------------------------------------------

/// The uniform operation set every broker integration must satisfy.
///
/// Each call is stateless with respect to the gateway: the account and any
/// payload arrive as arguments, the outcome leaves as a normalized success
/// value or a typed [`AdapterError`]. Implementations must never panic or
/// let an underlying library error escape this boundary.
#[async_trait]
pub trait BrokerAdapter: Send + Sync {
    /// Current balance for the account, in the adapter's documented shape
    /// (see [`BalanceSnapshot`]). Results are never cached; each call is
    /// an independent broker round-trip.
    async fn balance(&self, account: &BrokerAccount) -> Result<BalanceSnapshot, AdapterError>;

    /// Place an order and report the normalized outcome.
    async fn execute_trade(
        &self,
        account: &BrokerAccount,
        request: &TradeRequest,
    ) -> Result<TradeResult, AdapterError>;

    /// Request a deposit. What "accepted" means is broker-specific; see
    /// the implementations.
    async fn deposit(
        &self,
        account: &BrokerAccount,
        request: &TransferRequest,
    ) -> Result<TransferResult, AdapterError>;

    /// Request a withdrawal to `request.address` (validated upstream).
    async fn withdraw(
        &self,
        account: &BrokerAccount,
        request: &TransferRequest,
    ) -> Result<TransferResult, AdapterError>;

    /// Current market data for a symbol, as a structured payload in the
    /// broker's own vocabulary.
    async fn market_data(&self, symbol: &str) -> Result<serde_json::Value, AdapterError>;
}
