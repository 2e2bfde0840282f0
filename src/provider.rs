use crate::{
    errors::{ProviderError, TransportError},
    events::{EventKind, ListenerRegistry, ProviderEvent, DISCONNECTED},
    transports::{Http, RequestArguments},
    Transport,
};
use serde_json::Value;
use std::{
    fmt,
    str::FromStr,
    sync::{Arc, Mutex, RwLock},
};
use tracing::{debug, warn};

/// Connectivity state derived purely from call success and failure.
#[derive(Clone, Debug, Default)]
struct ConnectionState {
    connected: bool,
    last_known_chain_id: Option<String>,
}

/// An EIP-1193 style provider over a request/response transport.
///
/// The provider owns exactly one live endpoint binding at a time, a boolean
/// connectivity flag, and the last known chain identity. Any successful call
/// is evidence of connectivity; a refused connection while connected flips
/// the flag back and notifies `disconnect` listeners.
///
/// Concurrent [`request`](Self::request) calls race freely: there is no
/// queue, no serialization, and no backpressure. Two in-flight calls that
/// both observe a disconnected provider may both run the connectivity check,
/// and the last one to finish determines the stored chain identity.
///
/// # Example
///
/// ```no_run
/// use rpc_http_provider::{RequestArguments, RpcHttpProvider};
///
/// # async fn foo() -> Result<(), Box<dyn std::error::Error>> {
/// let provider = RpcHttpProvider::try_from("http://localhost:8545")?;
/// let accounts = provider.request(RequestArguments::new("eth_accounts")).await?;
/// # Ok(())
/// # }
/// ```
pub struct RpcHttpProvider<T = Http> {
    transport: RwLock<Option<Arc<T>>>,
    state: Mutex<ConnectionState>,
    events: ListenerRegistry,
}

impl<T: Transport> RpcHttpProvider<T> {
    /// Creates a provider bound to `transport`.
    ///
    /// No network I/O happens here; register listeners and call
    /// [`reconnect`](Self::reconnect) to run the initial connectivity check,
    /// or let the first successful [`request`](Self::request) reconcile the
    /// state on its own.
    pub fn new(transport: T) -> Self {
        Self {
            transport: RwLock::new(Some(Arc::new(transport))),
            state: Mutex::new(ConnectionState::default()),
            events: ListenerRegistry::default(),
        }
    }

    /// Creates a provider with no endpoint bound yet; every call fails with
    /// [`ProviderError::UninitializedClient`] until [`rebind`](Self::rebind)
    /// installs a transport
    pub fn unbound() -> Self {
        Self {
            transport: RwLock::new(None),
            state: Mutex::new(ConnectionState::default()),
            events: ListenerRegistry::default(),
        }
    }

    /// Registers a listener for one notification kind. Listeners are invoked
    /// in registration order.
    pub fn on(&self, kind: EventKind, listener: impl Fn(&ProviderEvent) + Send + Sync + 'static) {
        self.events.on(kind, listener);
    }

    /// This transport is request/response only; callers must poll
    pub fn supports_subscriptions(&self) -> bool {
        false
    }

    /// Whether the provider currently considers itself connected
    pub fn connected(&self) -> bool {
        self.state.lock().expect("connection state lock poisoned").connected
    }

    /// The chain identity recorded by the most recent connectivity check
    pub fn chain_id(&self) -> Option<String> {
        self.state
            .lock()
            .expect("connection state lock poisoned")
            .last_known_chain_id
            .clone()
    }

    fn transport(&self) -> Result<Arc<T>, ProviderError> {
        self.transport
            .read()
            .expect("transport lock poisoned")
            .clone()
            .ok_or(ProviderError::UninitializedClient)
    }

    /// Issues one JSON-RPC call and returns the unwrapped result payload.
    ///
    /// A successful call on a disconnected provider runs the connectivity
    /// check before returning, so listeners observe the `connect` transition
    /// even if nobody asked for it explicitly. A connection-refused failure
    /// on a connected provider emits `disconnect` and still surfaces the
    /// error to the caller.
    pub async fn request(&self, args: RequestArguments) -> Result<Value, ProviderError> {
        let transport = self.transport()?;
        debug!(method = %args.method(), "dispatching request");

        match dispatch(&*transport, &args).await {
            Ok(payload) => {
                if !self.connected() {
                    self.reconcile(&transport).await?;
                }
                Ok(payload)
            }
            Err(err) => {
                if err.is_connection_refused() && self.connected() {
                    self.mark_disconnected();
                }
                Err(ProviderError::Request(err))
            }
        }
    }

    /// Runs the connectivity check against the currently bound endpoint.
    ///
    /// Resolves the chain identity with a single `eth_chainId` query, emits
    /// `connect`, marks the provider connected, and emits `chainChanged` if a
    /// previously recorded identity differs. On failure the stored state is
    /// left untouched.
    pub async fn reconnect(&self) -> Result<(), ProviderError> {
        let transport = self.transport()?;
        self.reconcile(&transport).await
    }

    /// Atomically replaces the bound transport and reconnects to it.
    ///
    /// Not transactional: the previous binding is discarded even if the
    /// reconnection to the new endpoint fails, and in-flight calls keep
    /// executing against their handle to the old transport.
    pub async fn rebind(&self, transport: T) -> Result<(), ProviderError> {
        *self.transport.write().expect("transport lock poisoned") = Some(Arc::new(transport));
        self.reconnect()
            .await
            .map_err(|err| ProviderError::Rebind(Box::new(err)))
    }

    /// One non-reentrant connectivity pass. The identity query goes through
    /// [`dispatch`] directly, bypassing the reconciliation trigger in
    /// [`request`](Self::request), so a pass can never recurse into itself.
    async fn reconcile(&self, transport: &Arc<T>) -> Result<(), ProviderError> {
        let args = RequestArguments::new("eth_chainId");
        let payload = dispatch(&**transport, &args)
            .await
            .map_err(|err| ProviderError::Connect(Box::new(ProviderError::Request(err))))?;

        let chain_id = match payload {
            Value::String(id) => id,
            other => other.to_string(),
        };
        debug!(%chain_id, "connected");

        self.events.emit(&ProviderEvent::Connect { chain_id: chain_id.clone() });
        let previous = {
            let mut state = self.state.lock().expect("connection state lock poisoned");
            state.connected = true;
            state.last_known_chain_id.replace(chain_id.clone())
        };
        if previous.map_or(false, |previous| previous != chain_id) {
            self.events.emit(&ProviderEvent::ChainChanged(chain_id));
        }
        Ok(())
    }

    fn mark_disconnected(&self) {
        self.state.lock().expect("connection state lock poisoned").connected = false;
        warn!("endpoint refused the connection, marking provider disconnected");
        self.events.emit(&ProviderEvent::Disconnect { code: DISCONNECTED });
    }
}

impl RpcHttpProvider<Http> {
    /// Rebinds the provider to a new endpoint string, validating it first.
    ///
    /// Any failure, of the binding or of the subsequent reconnection, fails
    /// the whole operation with [`ProviderError::Rebind`].
    pub async fn set_endpoint(&self, endpoint: &str) -> Result<(), ProviderError> {
        let transport =
            Http::from_str(endpoint).map_err(|err| ProviderError::Rebind(Box::new(err)))?;
        self.rebind(transport).await
    }
}

impl TryFrom<&str> for RpcHttpProvider<Http> {
    type Error = ProviderError;

    fn try_from(src: &str) -> Result<Self, Self::Error> {
        Ok(Self::new(Http::from_str(src)?))
    }
}

impl TryFrom<String> for RpcHttpProvider<Http> {
    type Error = ProviderError;

    fn try_from(src: String) -> Result<Self, Self::Error> {
        Self::try_from(src.as_str())
    }
}

impl<T: Transport> fmt::Debug for RpcHttpProvider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcHttpProvider")
            .field("transport", &*self.transport.read().expect("transport lock poisoned"))
            .field("state", &*self.state.lock().expect("connection state lock poisoned"))
            .field("events", &self.events)
            .finish()
    }
}

/// Sends one POST and unwraps the response, without touching any provider
/// state.
async fn dispatch<T: Transport>(
    transport: &T,
    args: &RequestArguments,
) -> Result<Value, TransportError> {
    let body = args.to_body();
    let payload = transport.post(&body, args.transport_config()).await?;
    Ok(unwrap_payload(payload))
}

/// Unwraps the accepted response shapes: `{ "data": { "data": T } }` yields
/// the innermost value, `{ "data": T }` yields `T`, and a body with no
/// `data` field at all yields `Null` rather than an error.
fn unwrap_payload(body: Value) -> Value {
    match body {
        Value::Object(mut body) => match body.remove("data") {
            Some(Value::Object(mut inner)) if inner.contains_key("data") => {
                inner.remove("data").unwrap_or(Value::Null)
            }
            Some(inner) => inner,
            None => Value::Null,
        },
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MockResponse, MockTransport, TransportConfig};
    use serde_json::json;
    use std::time::Duration;

    /// Records every notification of every kind, in emission order
    fn recorded_events(provider: &RpcHttpProvider<MockTransport>) -> Arc<Mutex<Vec<ProviderEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        for kind in [EventKind::Connect, EventKind::Disconnect, EventKind::ChainChanged] {
            let sink = events.clone();
            provider.on(kind, move |event| sink.lock().unwrap().push(event.clone()));
        }
        events
    }

    #[tokio::test]
    async fn initial_check_emits_exactly_one_connect() {
        let mock = MockTransport::new();
        mock.push("0x1").unwrap();

        let provider = RpcHttpProvider::new(mock.clone());
        let events = recorded_events(&provider);
        assert!(!provider.connected());

        provider.reconnect().await.unwrap();

        assert!(provider.connected());
        assert_eq!(provider.chain_id().as_deref(), Some("0x1"));
        assert_eq!(
            *events.lock().unwrap(),
            vec![ProviderEvent::Connect { chain_id: "0x1".to_owned() }]
        );
        mock.assert_request("eth_chainId", json!([]));
    }

    #[tokio::test]
    async fn rebinding_emits_connect_then_chain_changed() {
        let first = MockTransport::new();
        first.push("0x1").unwrap();
        let provider = RpcHttpProvider::new(first);
        let events = recorded_events(&provider);
        provider.reconnect().await.unwrap();

        let second = MockTransport::new();
        second.push("0x5").unwrap();
        provider.rebind(second).await.unwrap();

        assert_eq!(provider.chain_id().as_deref(), Some("0x5"));
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                ProviderEvent::Connect { chain_id: "0x1".to_owned() },
                ProviderEvent::Connect { chain_id: "0x5".to_owned() },
                ProviderEvent::ChainChanged("0x5".to_owned()),
            ]
        );
    }

    #[tokio::test]
    async fn rebinding_to_the_same_chain_does_not_emit_chain_changed() {
        let first = MockTransport::new();
        first.push("0x1").unwrap();
        let provider = RpcHttpProvider::new(first);
        let events = recorded_events(&provider);
        provider.reconnect().await.unwrap();

        let second = MockTransport::new();
        second.push("0x1").unwrap();
        provider.rebind(second).await.unwrap();

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                ProviderEvent::Connect { chain_id: "0x1".to_owned() },
                ProviderEvent::Connect { chain_id: "0x1".to_owned() },
            ]
        );
    }

    #[tokio::test]
    async fn refused_connection_flips_state_and_still_errors() {
        let mock = MockTransport::new();
        mock.push("0x1").unwrap();
        let provider = RpcHttpProvider::new(mock.clone());
        let events = recorded_events(&provider);
        provider.reconnect().await.unwrap();

        mock.push_response(MockResponse::Error(TransportError::ConnectionRefused(
            "connect ECONNREFUSED 127.0.0.1:8545".into(),
        )));
        let err = provider
            .request(RequestArguments::new("eth_blockNumber"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProviderError::Request(TransportError::ConnectionRefused(_))
        ));
        assert!(!provider.connected());
        assert_eq!(
            events.lock().unwrap().last(),
            Some(&ProviderEvent::Disconnect { code: 4900 })
        );
        // the stored chain identity survives the disconnect
        assert_eq!(provider.chain_id().as_deref(), Some("0x1"));
    }

    #[tokio::test]
    async fn other_failures_leave_state_untouched() {
        let mock = MockTransport::new();
        mock.push("0x1").unwrap();
        let provider = RpcHttpProvider::new(mock.clone());
        let events = recorded_events(&provider);
        provider.reconnect().await.unwrap();

        mock.push_response(MockResponse::Error(TransportError::Custom(
            "gateway timeout".into(),
        )));
        let err = provider
            .request(RequestArguments::new("eth_blockNumber"))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Request(TransportError::Custom(_))));
        assert!(provider.connected());
        assert_eq!(events.lock().unwrap().len(), 1); // only the initial connect
    }

    #[tokio::test]
    async fn refused_connection_while_disconnected_emits_nothing() {
        let mock = MockTransport::new();
        mock.push_response(MockResponse::Error(TransportError::ConnectionRefused(
            "connect ECONNREFUSED 127.0.0.1:8545".into(),
        )));
        let provider = RpcHttpProvider::new(mock);
        let events = recorded_events(&provider);

        provider
            .request(RequestArguments::new("eth_blockNumber"))
            .await
            .unwrap_err();

        assert!(!provider.connected());
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn successful_request_reconciles_before_returning() {
        let mock = MockTransport::new();
        mock.push("ok").unwrap(); // answer for the caller's method
        mock.push("0x1").unwrap(); // answer for the connectivity check
        let provider = RpcHttpProvider::new(mock.clone());
        let events = recorded_events(&provider);

        let args = RequestArguments::new("foo").with_params(json!({"a": 1, "b": 2}));
        let result = provider.request(args).await.unwrap();

        assert_eq!(result, json!("ok"));
        assert!(provider.connected());
        assert_eq!(
            *events.lock().unwrap(),
            vec![ProviderEvent::Connect { chain_id: "0x1".to_owned() }]
        );
        // keyed params are flattened to their values on the wire
        mock.assert_request("foo", json!([1, 2]));
        mock.assert_request("eth_chainId", json!([]));
    }

    #[tokio::test]
    async fn repeated_requests_never_emit_extra_events() {
        let mock = MockTransport::new();
        mock.push("0x1").unwrap();
        let provider = RpcHttpProvider::new(mock.clone());
        let events = recorded_events(&provider);
        provider.reconnect().await.unwrap();

        for n in 0..3 {
            mock.push(format!("0x{n}")).unwrap();
            provider
                .request(RequestArguments::new("eth_blockNumber"))
                .await
                .unwrap();
        }

        assert_eq!(events.lock().unwrap().len(), 1); // only the initial connect
    }

    #[tokio::test]
    async fn unbound_provider_rejects_requests() {
        let provider = RpcHttpProvider::<MockTransport>::unbound();
        let err = provider
            .request(RequestArguments::new("eth_chainId"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UninitializedClient));

        let err = provider.reconnect().await.unwrap_err();
        assert!(matches!(err, ProviderError::UninitializedClient));
    }

    #[tokio::test]
    async fn rebind_installs_a_transport_on_an_unbound_provider() {
        let provider = RpcHttpProvider::unbound();
        let mock = MockTransport::new();
        mock.push("0x2a").unwrap();

        provider.rebind(mock.clone()).await.unwrap();

        assert!(provider.connected());
        assert_eq!(provider.chain_id().as_deref(), Some("0x2a"));
    }

    #[tokio::test]
    async fn failed_rebind_still_discards_the_old_binding() {
        let first = MockTransport::new();
        first.push("0x1").unwrap();
        let provider = RpcHttpProvider::new(first.clone());
        provider.reconnect().await.unwrap();

        let second = MockTransport::new();
        second.push_response(MockResponse::Error(TransportError::Custom(
            "gateway down".into(),
        )));
        let err = provider.rebind(second.clone()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Rebind(_)));

        // subsequent calls go to the new transport, not the old one
        second.push("0x9").unwrap();
        let out = provider
            .request(RequestArguments::new("eth_blockNumber"))
            .await
            .unwrap();
        assert_eq!(out, json!("0x9"));
        first.assert_request("eth_chainId", json!([])); // only the initial check
        assert!(first.pop_request().is_none());
        second.assert_request("eth_chainId", json!([]));
        second.assert_request("eth_blockNumber", json!([]));
    }

    #[tokio::test]
    async fn failed_reconnect_leaves_state_untouched() {
        let mock = MockTransport::new();
        mock.push("0x1").unwrap();
        let provider = RpcHttpProvider::new(mock.clone());
        provider.reconnect().await.unwrap();

        mock.push_response(MockResponse::Error(TransportError::Custom("boom".into())));
        let err = provider.reconnect().await.unwrap_err();

        assert!(matches!(err, ProviderError::Connect(_)));
        assert!(provider.connected());
        assert_eq!(provider.chain_id().as_deref(), Some("0x1"));
    }

    #[tokio::test]
    async fn per_call_transport_config_reaches_the_transport() {
        let mock = MockTransport::new();
        mock.push("0x1").unwrap();
        let provider = RpcHttpProvider::new(mock.clone());
        provider.reconnect().await.unwrap();
        mock.pop_request();

        let config = TransportConfig {
            headers: vec![("x-trace-id".into(), "abc".into())],
            timeout: Some(Duration::from_secs(5)),
        };
        mock.push("ok").unwrap();
        provider
            .request(RequestArguments::new("foo").with_transport_config(config.clone()))
            .await
            .unwrap();

        let (_, recorded) = mock.pop_request().unwrap();
        assert_eq!(recorded, Some(config));
    }

    #[tokio::test]
    async fn double_wrapped_payloads_are_fully_unwrapped() {
        let mock = MockTransport::new();
        mock.push("0x1").unwrap();
        let provider = RpcHttpProvider::new(mock.clone());
        provider.reconnect().await.unwrap();

        mock.push_response(MockResponse::Value(json!({"data": {"data": "0x10"}})));
        let out = provider
            .request(RequestArguments::new("eth_blockNumber"))
            .await
            .unwrap();
        assert_eq!(out, json!("0x10"));
    }

    #[test]
    fn supports_subscriptions_is_always_false() {
        assert!(!RpcHttpProvider::<MockTransport>::unbound().supports_subscriptions());
        assert!(!RpcHttpProvider::new(MockTransport::new()).supports_subscriptions());
    }

    #[test]
    fn payload_unwrapping_shapes() {
        assert_eq!(unwrap_payload(json!({"data": {"data": "0x1"}})), json!("0x1"));
        assert_eq!(unwrap_payload(json!({"data": "0x1"})), json!("0x1"));
        assert_eq!(unwrap_payload(json!({"data": {"result": 7}})), json!({"result": 7}));
        // tolerated: a body with no `data` field yields `Null`, not an error
        assert_eq!(unwrap_payload(json!({"result": "0x1"})), Value::Null);
        assert_eq!(unwrap_payload(json!("bare")), Value::Null);
    }

    #[tokio::test]
    async fn set_endpoint_rejects_invalid_strings() {
        let provider = RpcHttpProvider::<Http>::unbound();
        let err = provider.set_endpoint("ws://localhost:8546").await.unwrap_err();
        assert!(matches!(err, ProviderError::Rebind(_)));
    }

    #[test]
    fn try_from_validates_the_endpoint_string() {
        assert!(RpcHttpProvider::try_from("http://localhost:8545").is_ok());
        let err = RpcHttpProvider::try_from("ws://localhost:8546").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidEndpoint(_)));
    }
}
