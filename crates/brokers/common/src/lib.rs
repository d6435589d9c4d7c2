pub mod registry;
pub mod simulated;

pub use registry::BrokerRegistry;
pub use simulated::SimulatedAdapter;
