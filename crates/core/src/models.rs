use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// Brokers & Accounts
// ---------------------------------------------------------------------------

/// The closed set of brokers the gateway can reach.
///
/// Adding a broker means adding a variant here, which forces every
/// dispatch site (most importantly the registry) to handle it before the
/// workspace compiles again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerKind {
    /// Leveraged margin-FX venue, reachable only through its automation
    /// terminal (child process per call).
    MarginFx,
    /// Cryptocurrency exchange, reachable through the shared REST client.
    CryptoExchange,
}

impl BrokerKind {
    pub const ALL: [BrokerKind; 2] = [BrokerKind::MarginFx, BrokerKind::CryptoExchange];

    pub fn as_str(&self) -> &'static str {
        match self {
            BrokerKind::MarginFx => "margin_fx",
            BrokerKind::CryptoExchange => "crypto_exchange",
        }
    }
}

impl fmt::Display for BrokerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BrokerKind {
    type Err = UnknownBroker;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "margin_fx" => Ok(BrokerKind::MarginFx),
            "crypto_exchange" => Ok(BrokerKind::CryptoExchange),
            other => Err(UnknownBroker(other.to_string())),
        }
    }
}

/// A broker identifier that matched no registered broker. This is a caller
/// error, deliberately not part of [`crate::AdapterError`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported broker: {0}")]
pub struct UnknownBroker(pub String);

/// Per-call credentials for the margin-FX terminal.
///
/// The password lives in memory only for the duration of one request and is
/// handed to the terminal as a process argument. `Debug` redacts it.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub password: String,
    pub server: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("password", &"<redacted>")
            .field("server", &self.server)
            .finish()
    }
}

/// The account a single request operates on. Built from the request path
/// and query, never persisted, dropped when the call completes.
#[derive(Debug, Clone)]
pub struct BrokerAccount {
    pub broker: BrokerKind,
    pub account_id: String,
    /// Present for margin-FX calls; the crypto adapter is authenticated
    /// once at startup and ignores this.
    pub credentials: Option<Credentials>,
}

// ---------------------------------------------------------------------------
// Trades
// ---------------------------------------------------------------------------

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

/// The order types both brokers understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "market",
            OrderType::Limit => "limit",
        }
    }
}

/// A broker-agnostic trade request, as received from the HTTP caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRequest {
    pub symbol: String,
    pub order_type: OrderType,
    pub side: Side,
    pub quantity: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<Decimal>,
}

impl TradeRequest {
    /// Reject requests no adapter should ever see.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.symbol.is_empty() {
            return Err(ValidationError::new("symbol must not be empty"));
        }
        if self.quantity <= Decimal::ZERO {
            return Err(ValidationError::new("quantity must be strictly positive"));
        }
        if self.order_type == OrderType::Limit && self.price.is_none() {
            return Err(ValidationError::new("limit orders require a price"));
        }
        Ok(())
    }
}

/// Normalized trade outcome. Every adapter converges to this shape no
/// matter what vocabulary the underlying broker uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeResult {
    pub status: TradeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Filled,
    Pending,
    Rejected,
    Error,
}

impl TradeResult {
    pub fn filled(order_id: impl Into<String>) -> Self {
        Self {
            status: TradeStatus::Filled,
            order_id: Some(order_id.into()),
            message: None,
        }
    }

    pub fn pending(order_id: Option<String>, message: impl Into<String>) -> Self {
        Self {
            status: TradeStatus::Pending,
            order_id,
            message: Some(message.into()),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            status: TradeStatus::Rejected,
            order_id: None,
            message: Some(message.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Balances
// ---------------------------------------------------------------------------

/// Account balance as reported by a broker.
///
/// The two brokers report fundamentally different shapes and the contract
/// does not force them into one: margin-FX reports an account summary,
/// the exchange reports a per-asset map. Each adapter always produces its
/// own variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BalanceSnapshot {
    /// Margin account summary from the automation terminal. Only `balance`
    /// is guaranteed; the remaining fields appear when the terminal
    /// reports them.
    Margin(MarginBalance),
    /// Free balance per asset, exactly as the exchange reports it.
    Assets(BTreeMap<String, Decimal>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginBalance {
    pub balance: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equity: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin_free: Option<Decimal>,
}

// ---------------------------------------------------------------------------
// Transfers
// ---------------------------------------------------------------------------

/// A deposit or withdrawal request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub amount: Decimal,
    pub currency: String,
    /// Destination address; required for withdrawals only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl TransferRequest {
    fn validate_common(&self) -> Result<(), ValidationError> {
        if self.amount <= Decimal::ZERO {
            return Err(ValidationError::new("amount must be strictly positive"));
        }
        if self.currency.is_empty() {
            return Err(ValidationError::new("currency must not be empty"));
        }
        Ok(())
    }

    pub fn validate_deposit(&self) -> Result<(), ValidationError> {
        self.validate_common()
    }

    pub fn validate_withdrawal(&self) -> Result<(), ValidationError> {
        self.validate_common()?;
        match self.address.as_deref() {
            Some(addr) if !addr.is_empty() => Ok(()),
            _ => Err(ValidationError::new(
                "withdrawals require a destination address",
            )),
        }
    }
}

/// Acknowledgement of a transfer request. `Pending` means the request was
/// accepted but settlement happens elsewhere (on-chain, or an operations
/// desk for the margin-FX broker).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferResult {
    pub status: TransferStatus,
    /// Broker-side reference: a withdrawal id, or a deposit address to
    /// send funds to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    Completed,
}

impl TransferResult {
    pub fn pending(reference: Option<String>, message: impl Into<String>) -> Self {
        Self {
            status: TransferStatus::Pending,
            reference,
            message: Some(message.into()),
        }
    }
}
