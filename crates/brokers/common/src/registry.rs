use gateway_core::{BrokerAdapter, BrokerKind};
use std::sync::Arc;

/// Maps each broker to its adapter instance.
///
/// The mapping is total over [`BrokerKind`]: the constructor requires one
/// adapter per variant, so a new broker cannot be added without wiring it
/// here. "Unknown broker" is therefore impossible past the API layer's
/// path parsing.
#[derive(Clone)]
pub struct BrokerRegistry {
    margin_fx: Arc<dyn BrokerAdapter>,
    crypto_exchange: Arc<dyn BrokerAdapter>,
}

impl BrokerRegistry {
    pub fn new(margin_fx: Arc<dyn BrokerAdapter>, crypto_exchange: Arc<dyn BrokerAdapter>) -> Self {
        Self {
            margin_fx,
            crypto_exchange,
        }
    }

    pub fn adapter(&self, kind: BrokerKind) -> &dyn BrokerAdapter {
        match kind {
            BrokerKind::MarginFx => self.margin_fx.as_ref(),
            BrokerKind::CryptoExchange => self.crypto_exchange.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::SimulatedAdapter;
    use gateway_core::{BrokerAccount, BrokerKind};

    #[tokio::test]
    async fn test_registry_dispatches_per_kind() {
        let margin = Arc::new(SimulatedAdapter::default());
        let crypto = Arc::new(SimulatedAdapter::default());
        let registry = BrokerRegistry::new(margin.clone(), crypto.clone());

        let account = BrokerAccount {
            broker: BrokerKind::MarginFx,
            account_id: "123".to_string(),
            credentials: None,
        };
        registry
            .adapter(BrokerKind::MarginFx)
            .balance(&account)
            .await
            .unwrap();

        assert_eq!(margin.balance_calls(), 1);
        assert_eq!(crypto.balance_calls(), 0);
    }
}
