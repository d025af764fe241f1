//! Application layer: the ledgers, the refund saga, the checkout flow, and the
//! request dispatcher that ties them to the outside world.
//!
//! Everything here talks to storage and the gateway only through the ports in
//! `domain::ports`, so the same services run against memory, RocksDB, a
//! simulated gateway, or the real HTTP one.

pub mod events;
pub mod orchestrator;
pub mod payment_ledger;
pub mod payment_processor;
pub mod refund_saga;
pub mod retry;
pub mod timed_store;
pub mod wallet_ledger;
