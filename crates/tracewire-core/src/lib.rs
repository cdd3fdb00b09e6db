//! # Tracewire Core
//!
//! Traced, cached Ethereum JSON-RPC calls.
//!
//! This crate provides:
//!
//! - **[`transport`]**: the [`transport::RpcService`] seam and the JSON-RPC over HTTP
//!   transport every pipeline ends in.
//!
//! - **[`middleware`]**: the trace adapter (one OpenTelemetry span per call) and the
//!   allow-listed response cache.
//!
//! - **[`pipeline`]**: folds an ordered middleware list around a transport, defaulting to
//!   `[trace, cache]`.
//!
//! - **[`client`]**: typed `eth_chainId`, `eth_call` and `eth_getBalance` over a pipeline.
//!
//! - **[`telemetry`]**: OTLP tracer provider and propagator bootstrap.
//!
//! - **[`config`]**: layered configuration from defaults, TOML and environment.
//!
//! ## Request Flow
//!
//! ```text
//! RpcClient::get_balance(address, latest)
//!       │
//!       ▼
//! ┌──────────────┐
//! │  TraceLayer  │ ── opens span rpc.eth_getBalance, attrs "0", "1"
//! └──────┬───────┘
//!        │
//!        ▼
//! ┌──────────────┐
//! │  CacheLayer  │ ─── Hit ──► stored result
//! └──────┬───────┘
//!        │ Miss / not allow-listed
//!        ▼
//! ┌──────────────┐
//! │HttpTransport │ ── POST JSON-RPC 2.0, retries on 5xx
//! └──────┬───────┘
//!        │
//!        ▼
//!   result or RpcError, span closed
//! ```

pub mod client;
pub mod config;
pub mod middleware;
pub mod pipeline;
pub mod telemetry;
pub mod transport;
pub mod types;
pub mod utils;

pub use client::{RpcClient, TransactionRequest};
pub use config::AppConfig;
pub use pipeline::{Pipeline, PipelineBuilder};
pub use transport::{RpcError, RpcService};
pub use types::RpcCall;
