//! ebrelayer: validator relay between Ethereum and Cosmos
//!
//! Watches BridgeBank `LogLock` logs on Ethereum and `burn`/`lock` tx events
//! on Cosmos, turns each into a prophecy claim and submits it, signed, to
//! the opposite chain. Progress is checkpointed per source chain.

pub mod api;
pub mod checkpoint;
pub mod config;
pub mod cosmos_client;
pub mod metrics;
pub mod submitter;
pub mod watchers;
