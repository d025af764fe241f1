//! Domain layer: entities, value objects, and the ports the application layer
//! depends on.

pub mod event;
pub mod money;
pub mod payment;
pub mod ports;
pub mod wallet;
