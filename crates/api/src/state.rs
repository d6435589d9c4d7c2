use gateway_brokers_common::BrokerRegistry;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared application state accessible by all route handlers.
pub struct AppState {
    pub registry: BrokerRegistry,
    pub engine: EngineSwitch,
    /// Margin-FX credential fallbacks, read from the environment once at
    /// startup and used when a request carries no query credentials.
    pub fallback_credentials: FallbackCredentials,
}

impl AppState {
    pub fn new(registry: BrokerRegistry, fallback_credentials: FallbackCredentials) -> Self {
        Self {
            registry,
            engine: EngineSwitch::default(),
            fallback_credentials,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FallbackCredentials {
    pub password: Option<String>,
    pub server: Option<String>,
}

impl FallbackCredentials {
    pub fn from_env() -> Self {
        Self {
            password: std::env::var("MARGINFX_PASSWORD").ok(),
            server: std::env::var("MARGINFX_SERVER").ok(),
        }
    }
}

/// Process-wide advisory run/stop flag for the trading engine.
///
/// Owned by the API state and toggled only by the engine control routes;
/// concurrent writers race harmlessly (last write wins). Advisory means
/// exactly that: the broker adapters do not consult it, so a trade
/// submitted while the flag reads "stopped" still executes. That gap is
/// part of the documented surface, not something to enforce here.
#[derive(Debug, Default)]
pub struct EngineSwitch {
    running: AtomicBool,
}

impl EngineSwitch {
    /// Returns false if the engine was already running.
    pub fn start(&self) -> bool {
        !self.running.swap(true, Ordering::SeqCst)
    }

    /// Returns false if the engine was already stopped.
    pub fn stop(&self) -> bool {
        self.running.swap(false, Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_switch_transitions() {
        let engine = EngineSwitch::default();
        assert!(!engine.is_running());
        assert!(engine.start());
        assert!(!engine.start()); // already running
        assert!(engine.is_running());
        assert!(engine.stop());
        assert!(!engine.stop()); // already stopped
        assert!(!engine.is_running());
    }
}
