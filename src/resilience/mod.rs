pub mod circuit_breaker;
pub mod protected_gateway;

pub use circuit_breaker::{BreakerConfig, CircuitBreaker, CircuitSnapshot, CircuitState};
pub use protected_gateway::ProtectedGateway;
