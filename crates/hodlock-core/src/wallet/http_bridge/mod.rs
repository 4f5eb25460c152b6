//! JSON-RPC client for wallet bridges.
//!
//! A wallet bridge is a small local service that forwards calls to a
//! browser-injected wallet object (`window.unisat`, `window.xverse`, ...)
//! and relays the results. This module implements [`WalletBridge`] over
//! JSON-RPC 2.0 using `reqwest`, with optional basic auth and a
//! per-request timeout long enough for an approval prompt.
//!
//! [`WalletBridge`]: super::WalletBridge

mod client;
mod connection;
mod protocol;

pub use client::HttpWalletBridge;
