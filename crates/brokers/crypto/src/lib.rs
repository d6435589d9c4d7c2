//! Crypto exchange broker adapter.
//!
//! One [`client::ExchangeClient`] is authenticated at process startup and
//! shared across all requests; concurrent calls rely on the client's
//! built-in pacing rather than any lock in the adapter.

pub mod client;

use async_trait::async_trait;
use gateway_core::*;
use std::sync::Arc;

use client::{ExchangeClient, ExchangeClientError, OrderForm, WithdrawalForm};

/// The slice of the exchange client the adapter needs. A seam so tests
/// can substitute a recording double for the real REST client.
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    async fn fetch_balances(
        &self,
    ) -> Result<std::collections::BTreeMap<String, rust_decimal::Decimal>, ExchangeClientError>;

    async fn create_order(
        &self,
        order: OrderForm,
    ) -> Result<client::OrderReceipt, ExchangeClientError>;

    async fn deposit_address(
        &self,
        currency: &str,
    ) -> Result<client::DepositAddress, ExchangeClientError>;

    async fn withdraw(
        &self,
        form: WithdrawalForm,
    ) -> Result<client::WithdrawalReceipt, ExchangeClientError>;

    async fn fetch_ticker(&self, symbol: &str)
        -> Result<serde_json::Value, ExchangeClientError>;
}

#[async_trait]
impl ExchangeApi for client::ExchangeClient {
    async fn fetch_balances(
        &self,
    ) -> Result<std::collections::BTreeMap<String, rust_decimal::Decimal>, ExchangeClientError>
    {
        ExchangeClient::fetch_balances(self).await
    }

    async fn create_order(
        &self,
        order: OrderForm,
    ) -> Result<client::OrderReceipt, ExchangeClientError> {
        ExchangeClient::create_order(self, &order).await
    }

    async fn deposit_address(
        &self,
        currency: &str,
    ) -> Result<client::DepositAddress, ExchangeClientError> {
        ExchangeClient::deposit_address(self, currency).await
    }

    async fn withdraw(
        &self,
        form: WithdrawalForm,
    ) -> Result<client::WithdrawalReceipt, ExchangeClientError> {
        ExchangeClient::withdraw(self, &form).await
    }

    async fn fetch_ticker(
        &self,
        symbol: &str,
    ) -> Result<serde_json::Value, ExchangeClientError> {
        ExchangeClient::fetch_ticker(self, symbol).await
    }
}

/// Every client failure is converted here; nothing from the exchange
/// library crosses the adapter boundary raw. Rate limits keep their
/// detail but land under `broker_rejected`, distinguishable from
/// transport failures.
impl From<ExchangeClientError> for AdapterError {
    fn from(err: ExchangeClientError) -> Self {
        match err {
            ExchangeClientError::Network(msg) => AdapterError::Network(msg),
            ExchangeClientError::RateLimited { retry_after_secs } => AdapterError::Rejected(
                format!("rate limited by the exchange, retry after {retry_after_secs}s"),
            ),
            ExchangeClientError::Api { code, message } => {
                AdapterError::Rejected(format!("{code}: {message}"))
            }
            ExchangeClientError::AuthenticationFailed => {
                AdapterError::Rejected("exchange authentication failed".to_string())
            }
            ExchangeClientError::Decode(msg) => AdapterError::Parse(msg),
        }
    }
}

/// Adapter for the crypto exchange.
pub struct CryptoAdapter {
    exchange: Arc<dyn ExchangeApi>,
}

impl CryptoAdapter {
    pub fn new(exchange: Arc<dyn ExchangeApi>) -> Self {
        Self { exchange }
    }
}

#[async_trait]
impl BrokerAdapter for CryptoAdapter {
    /// Full asset→amount mapping as reported by the exchange. Shape:
    /// [`BalanceSnapshot::Assets`].
    async fn balance(&self, _account: &BrokerAccount) -> Result<BalanceSnapshot, AdapterError> {
        let balances = self.exchange.fetch_balances().await?;
        Ok(BalanceSnapshot::Assets(balances))
    }

    async fn execute_trade(
        &self,
        _account: &BrokerAccount,
        request: &TradeRequest,
    ) -> Result<TradeResult, AdapterError> {
        let order = OrderForm {
            symbol: request.symbol.clone(),
            side: request.side.as_str().to_string(),
            order_type: request.order_type.as_str().to_string(),
            quantity: request.quantity,
            price: request.price,
        };
        let receipt = self.exchange.create_order(order).await?;

        let status = match receipt.status.as_str() {
            "filled" => TradeStatus::Filled,
            "rejected" => TradeStatus::Rejected,
            _ => TradeStatus::Pending,
        };
        Ok(TradeResult {
            status,
            order_id: Some(receipt.id),
            message: receipt.message,
        })
    }

    /// Delegates to the exchange's native deposit-address handling; the
    /// caller is told where to send the funds.
    async fn deposit(
        &self,
        _account: &BrokerAccount,
        request: &TransferRequest,
    ) -> Result<TransferResult, AdapterError> {
        let deposit = self.exchange.deposit_address(&request.currency).await?;
        Ok(TransferResult::pending(
            Some(deposit.address),
            format!(
                "send {} {} to the referenced deposit address",
                request.amount, request.currency
            ),
        ))
    }

    async fn withdraw(
        &self,
        _account: &BrokerAccount,
        request: &TransferRequest,
    ) -> Result<TransferResult, AdapterError> {
        let address = request.address.clone().ok_or_else(|| {
            AdapterError::Rejected("withdrawals require a destination address".to_string())
        })?;
        let receipt = self
            .exchange
            .withdraw(WithdrawalForm {
                currency: request.currency.clone(),
                amount: request.amount,
                address,
            })
            .await?;
        let status = match receipt.status.as_str() {
            "completed" => TransferStatus::Completed,
            _ => TransferStatus::Pending,
        };
        Ok(TransferResult {
            status,
            reference: Some(receipt.id),
            message: None,
        })
    }

    async fn market_data(&self, symbol: &str) -> Result<serde_json::Value, AdapterError> {
        Ok(self.exchange.fetch_ticker(symbol).await?)
    }
}
