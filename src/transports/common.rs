use base64::{engine::general_purpose, Engine};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{fmt, time::Duration};

/// The parameters of a JSON-RPC call, before positional normalization.
///
/// JSON-RPC over HTTP is dispatched in positional form, so a keyed mapping is
/// flattened to the ordered sequence of its values (in map iteration order)
/// right before transmission.
#[derive(Clone, Debug, PartialEq)]
pub enum RequestParams {
    /// Already-positional parameters, passed through unchanged
    Sequence(Vec<Value>),
    /// Keyed parameters, flattened to their values on the wire
    Mapping(Map<String, Value>),
}

impl From<Vec<Value>> for RequestParams {
    fn from(values: Vec<Value>) -> Self {
        RequestParams::Sequence(values)
    }
}

impl From<Map<String, Value>> for RequestParams {
    fn from(map: Map<String, Value>) -> Self {
        RequestParams::Mapping(map)
    }
}

impl From<Value> for RequestParams {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(values) => RequestParams::Sequence(values),
            Value::Object(map) => RequestParams::Mapping(map),
            other => RequestParams::Sequence(vec![other]),
        }
    }
}

/// Per-call overrides applied by the transport when dispatching one POST.
///
/// This is the only timeout surface in the crate; the provider itself never
/// cancels an in-flight call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Additional headers for this call
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// Overall timeout for this call
    #[serde(default)]
    pub timeout: Option<Duration>,
}

/// Provider-level options attached to a single request.
#[derive(Clone, Debug, Default)]
pub struct ProviderOptions {
    /// Per-call transport configuration, used instead of the defaults
    pub transport_config: Option<TransportConfig>,
}

/// A single JSON-RPC method call.
///
/// Method names and parameters are treated opaquely; `rpc_options` is spread
/// into the outbound body first, so `method` and `params` win on collision.
#[derive(Clone, Debug)]
pub struct RequestArguments {
    method: String,
    params: Option<RequestParams>,
    rpc_options: Option<Map<String, Value>>,
    provider_options: Option<ProviderOptions>,
}

impl RequestArguments {
    /// Creates a call for `method` with no parameters
    pub fn new(method: impl Into<String>) -> Self {
        Self { method: method.into(), params: None, rpc_options: None, provider_options: None }
    }

    /// Attaches parameters to the call
    pub fn with_params(mut self, params: impl Into<RequestParams>) -> Self {
        self.params = Some(params.into());
        self
    }

    /// Extra top-level fields merged into the outbound body
    pub fn with_rpc_options(mut self, options: Map<String, Value>) -> Self {
        self.rpc_options = Some(options);
        self
    }

    /// Per-call transport configuration overriding the transport defaults
    pub fn with_transport_config(mut self, config: TransportConfig) -> Self {
        self.provider_options =
            Some(ProviderOptions { transport_config: Some(config) });
        self
    }

    /// The JSON-RPC method name
    pub fn method(&self) -> &str {
        &self.method
    }

    pub(crate) fn transport_config(&self) -> Option<&TransportConfig> {
        self.provider_options.as_ref()?.transport_config.as_ref()
    }

    /// Positional form of the parameters: absent params become an empty
    /// sequence, a mapping becomes the sequence of its values
    pub(crate) fn normalized_params(&self) -> Vec<Value> {
        match &self.params {
            None => Vec::new(),
            Some(RequestParams::Sequence(values)) => values.clone(),
            Some(RequestParams::Mapping(map)) => map.values().cloned().collect(),
        }
    }

    /// The outbound wire body: `{ ...rpc_options, method, params }`
    pub(crate) fn to_body(&self) -> Value {
        let mut body = self.rpc_options.clone().unwrap_or_default();
        body.insert("method".to_owned(), Value::String(self.method.clone()));
        body.insert("params".to_owned(), Value::Array(self.normalized_params()));
        Value::Object(body)
    }
}

/// Basic or bearer authentication for the HTTP transport
///
/// Use to inject username and password or an auth token into requests
#[derive(Clone, Debug)]
pub enum Authorization {
    /// HTTP Basic Auth
    Basic(String),
    /// Bearer Auth
    Bearer(String),
    /// If you need to override the Authorization header value
    Raw(String),
}

impl Authorization {
    /// Make a new basic auth
    pub fn basic(username: impl AsRef<str>, password: impl AsRef<str>) -> Self {
        let username = username.as_ref();
        let password = password.as_ref();
        let auth_secret = general_purpose::STANDARD.encode(format!("{username}:{password}"));
        Self::Basic(auth_secret)
    }

    /// Make a new bearer auth
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer(token.into())
    }

    /// Override the Authorization header with your own string
    pub fn raw(token: impl Into<String>) -> Self {
        Self::Raw(token.into())
    }
}

impl fmt::Display for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authorization::Basic(auth_secret) => write!(f, "Basic {auth_secret}"),
            Authorization::Bearer(token) => write!(f, "Bearer {token}"),
            Authorization::Raw(s) => write!(f, "{s}"),
        }
    }
}
