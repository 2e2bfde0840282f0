#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::broken_intra_doc_links)]
//! # EIP-1193 style provider for HTTP JSON-RPC endpoints
//!
//! This crate exposes a remote JSON-RPC endpoint (reached over HTTP or HTTPS)
//! through the request/response and event-notification contract popularized
//! by [EIP-1193](https://eips.ethereum.org/EIPS/eip-1193). Method calls are
//! translated into HTTP POST bodies, the response envelope is unwrapped, and
//! a lightweight connection state is tracked purely from call success and
//! failure, with `connect` / `disconnect` / `chainChanged` notifications
//! emitted on state transitions.
//!
//! # Examples
//!
//! ```no_run
//! use rpc_http_provider::{EventKind, RequestArguments, RpcHttpProvider};
//!
//! # async fn foo() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = RpcHttpProvider::try_from("https://mainnet.infura.io/v3/<key>")?;
//! provider.on(EventKind::ChainChanged, |event| println!("{event:?}"));
//!
//! // the initial connectivity check resolves the chain identity and emits
//! // a single `connect` notification
//! provider.reconnect().await?;
//!
//! let block = provider.request(RequestArguments::new("eth_blockNumber")).await?;
//! println!("Got block: {block}");
//! # Ok(())
//! # }
//! ```
//!
//! Subscriptions are not supported by this transport:
//! [`RpcHttpProvider::supports_subscriptions`] always returns `false` and
//! callers must poll.

mod transports;
pub use transports::*;

mod errors;
pub use errors::{ProviderError, TransportError};

mod events;
pub use events::{EventKind, ProviderEvent, DISCONNECTED};

mod provider;
pub use provider::RpcHttpProvider;

use async_trait::async_trait;
use auto_impl::auto_impl;
use serde_json::Value;
use std::fmt::Debug;

#[async_trait]
#[auto_impl(&, Box, Arc)]
/// Trait which must be implemented by data transports used with
/// [`RpcHttpProvider`].
///
/// A transport is bound to a single base endpoint and knows one thing: how to
/// POST a JSON body there and hand back the parsed response wrapper. It must
/// surface connection-refused failures distinctly (see
/// [`TransportError::is_connection_refused`]) so the provider can derive its
/// connectivity state.
pub trait Transport: Debug + Send + Sync {
    /// Sends the JSON `body` to the bound endpoint, applying any per-call
    /// `config` overrides, and returns the parsed response body.
    async fn post(
        &self,
        body: &Value,
        config: Option<&TransportConfig>,
    ) -> Result<Value, TransportError>;
}
