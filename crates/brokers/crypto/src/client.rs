use reqwest::{Client, Method, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;

/// Errors from the exchange client.
#[derive(Debug, Error)]
pub enum ExchangeClientError {
    /// Transport failure (connect, TLS, body read).
    #[error("network error: {0}")]
    Network(String),

    /// The exchange answered with an error response.
    #[error("exchange error {code}: {message}")]
    Api { code: String, message: String },

    /// HTTP 429 from the exchange. Kept as its own variant so callers can
    /// tell a throttle apart from an order rejection.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Credentials missing or refused.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The exchange answered 2xx with a body we could not decode.
    #[error("response decode error: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ExchangeClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

/// Configuration for the exchange client, resolved once at startup.
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    /// REST endpoint, e.g. the exchange's production or sandbox base URL.
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,
    /// Minimum spacing between outbound requests (the built-in limiter).
    pub min_request_interval: Duration,
    pub request_timeout: Duration,
}

impl ExchangeConfig {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            min_request_interval: Duration::from_millis(100),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// REST client for the exchange.
///
/// Authenticated once at construction; one instance is shared across all
/// requests for the process lifetime. Request pacing is enforced inside
/// the client, so callers never add throttling of their own.
pub struct ExchangeClient {
    config: ExchangeConfig,
    client: Client,
    /// Earliest instant the next request may leave.
    next_slot: Mutex<Instant>,
}

impl ExchangeClient {
    pub fn new(config: ExchangeConfig) -> Result<Self, ExchangeClientError> {
        if config.api_key.is_empty() || config.api_secret.is_empty() {
            return Err(ExchangeClientError::AuthenticationFailed);
        }
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ExchangeClientError::Network(e.to_string()))?;
        Ok(Self {
            client,
            next_slot: Mutex::new(Instant::now()),
            config,
        })
    }

    /// Hold the caller until the next request slot opens.
    async fn pace(&self) {
        let mut next = self.next_slot.lock().await;
        let now = Instant::now();
        if *next > now {
            tokio::time::sleep_until(*next).await;
        }
        *next = Instant::now() + self.config.min_request_interval;
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&impl Serialize>,
    ) -> Result<T, ExchangeClientError> {
        self.pace().await;

        let url = format!("{}{}", self.config.base_url, path);
        let mut request = self
            .client
            .request(method, &url)
            .header("X-API-KEY", &self.config.api_key)
            .header("X-API-SECRET", &self.config.api_secret);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            let text = response.text().await?;
            return serde_json::from_str(&text)
                .map_err(|e| ExchangeClientError::Decode(e.to_string()));
        }

        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after_secs = retry_after_secs(response.headers());
                warn!(retry_after_secs, "exchange throttled the request");
                Err(ExchangeClientError::RateLimited { retry_after_secs })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(ExchangeClientError::AuthenticationFailed)
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                let (code, message) = match serde_json::from_str::<ApiErrorBody>(&body) {
                    Ok(err) => (
                        err.code.unwrap_or_else(|| status.as_u16().to_string()),
                        err.message,
                    ),
                    Err(_) => (status.as_u16().to_string(), body),
                };
                Err(ExchangeClientError::Api { code, message })
            }
        }
    }

    /// Free balance per asset, exactly as reported — nothing filtered.
    pub async fn fetch_balances(&self) -> Result<BTreeMap<String, Decimal>, ExchangeClientError> {
        let entries: Vec<BalanceEntry> = self
            .request(Method::GET, "/api/v1/balances", None::<&()>)
            .await?;
        Ok(entries.into_iter().map(|e| (e.asset, e.free)).collect())
    }

    pub async fn create_order(&self, order: &OrderForm) -> Result<OrderReceipt, ExchangeClientError> {
        self.request(Method::POST, "/api/v1/orders", Some(order))
            .await
    }

    pub async fn deposit_address(
        &self,
        currency: &str,
    ) -> Result<DepositAddress, ExchangeClientError> {
        self.request(
            Method::GET,
            &format!("/api/v1/deposit-address?currency={currency}"),
            None::<&()>,
        )
        .await
    }

    pub async fn withdraw(
        &self,
        form: &WithdrawalForm,
    ) -> Result<WithdrawalReceipt, ExchangeClientError> {
        self.request(Method::POST, "/api/v1/withdrawals", Some(form))
            .await
    }

    pub async fn fetch_ticker(
        &self,
        symbol: &str,
    ) -> Result<serde_json::Value, ExchangeClientError> {
        self.request(
            Method::GET,
            &format!("/api/v1/ticker/{symbol}"),
            None::<&()>,
        )
        .await
    }
}

fn retry_after_secs(headers: &reqwest::header::HeaderMap) -> u64 {
    headers
        .get("Retry-After")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(60)
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: Option<String>,
    message: String,
}

#[derive(Debug, Deserialize)]
struct BalanceEntry {
    asset: String,
    free: Decimal,
}

/// Exactly what the exchange expects for order creation; the adapter maps
/// a generic trade request into this 1:1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderForm {
    pub symbol: String,
    pub side: String,
    #[serde(rename = "type")]
    pub order_type: String,
    pub quantity: Decimal,
    /// Passed through even for market orders; the exchange enforces its
    /// own order-type semantics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositAddress {
    pub currency: String,
    pub address: String,
    #[serde(default)]
    pub memo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalForm {
    pub currency: String,
    pub amount: Decimal,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalReceipt {
    pub id: String,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_credentials_are_refused() {
        let config = ExchangeConfig::new("https://sandbox.exchange.test", "", "");
        assert!(matches!(
            ExchangeClient::new(config),
            Err(ExchangeClientError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_retry_after_header_parsing() {
        let mut headers = reqwest::header::HeaderMap::new();
        assert_eq!(retry_after_secs(&headers), 60);
        headers.insert("Retry-After", "7".parse().unwrap());
        assert_eq!(retry_after_secs(&headers), 7);
        headers.insert("Retry-After", "soon".parse().unwrap());
        assert_eq!(retry_after_secs(&headers), 60);
    }

    #[test]
    fn test_order_form_omits_absent_price() {
        let form = OrderForm {
            symbol: "BTC/USDT".to_string(),
            side: "buy".to_string(),
            order_type: "market".to_string(),
            quantity: Decimal::new(1, 2),
            price: None,
        };
        let json = serde_json::to_value(&form).unwrap();
        assert!(json.get("price").is_none());
        assert_eq!(json["type"], "market");
    }
}
