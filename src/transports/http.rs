use super::common::{Authorization, TransportConfig};
use crate::{
    errors::{ProviderError, TransportError},
    Transport,
};
use async_trait::async_trait;
use reqwest::{header::HeaderValue, Client};
use serde_json::Value;
use std::str::FromStr;
use thiserror::Error;
use tracing::trace;
use url::Url;

/// A low-level JSON-RPC transport over HTTP.
///
/// The entire call is POSTed to the base URL; no path is appended. Binding
/// performs no network I/O.
///
/// # Example
///
/// ```no_run
/// use rpc_http_provider::{Http, RpcHttpProvider};
/// use std::str::FromStr;
///
/// # fn foo() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = Http::from_str("http://localhost:8545")?;
/// let provider = RpcHttpProvider::new(transport);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Http {
    client: Client,
    url: Url,
}

/// Whether `url` is acceptable as an endpoint string: it must start with
/// `http://` or `https://`, case-insensitively.
///
/// The check is advisory, not a security boundary; anything the URL parser
/// accepts past this prefix is taken as-is.
pub fn is_valid_endpoint(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[async_trait]
impl Transport for Http {
    async fn post(
        &self,
        body: &Value,
        config: Option<&TransportConfig>,
    ) -> Result<Value, TransportError> {
        let mut request = self.client.post(self.url.as_ref()).json(body);
        if let Some(config) = config {
            for (name, value) in &config.headers {
                request = request.header(name.as_str(), value.as_str());
            }
            if let Some(timeout) = config.timeout {
                request = request.timeout(timeout);
            }
        }

        trace!(url = %self.url, "dispatching POST");
        let res = request.send().await.map_err(TransportError::from_reqwest)?;
        let res = res.error_for_status().map_err(TransportError::from_reqwest)?;
        let body = res.bytes().await.map_err(TransportError::from_reqwest)?;

        serde_json::from_slice(&body).map_err(|err| TransportError::SerdeJson {
            err,
            text: String::from_utf8_lossy(&body).to_string(),
        })
    }
}

impl Http {
    /// Binds a new HTTP transport to an already-parsed URL.
    ///
    /// A pre-typed [`Url`] bypasses the endpoint string check; use
    /// [`Http::from_str`] to validate a string first.
    pub fn new(url: impl Into<Url>) -> Self {
        Self::new_with_client(url, Client::new())
    }

    /// The Url to which requests are made
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Binds a new HTTP transport with authentication
    ///
    /// # Example
    ///
    /// ```
    /// use rpc_http_provider::{Authorization, Http};
    /// use url::Url;
    ///
    /// let url = Url::parse("http://localhost:8545").unwrap();
    /// let transport = Http::new_with_auth(url, Authorization::basic("admin", "good_password"));
    /// ```
    pub fn new_with_auth(
        url: impl Into<Url>,
        auth: Authorization,
    ) -> Result<Self, HttpClientError> {
        let mut auth_value = HeaderValue::from_str(&auth.to_string())?;
        auth_value.set_sensitive(true);

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::AUTHORIZATION, auth_value);

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self::new_with_client(url, client))
    }

    /// Allows to customize the transport by providing your own http client
    pub fn new_with_client(url: impl Into<Url>, client: Client) -> Self {
        Self { client, url: url.into() }
    }
}

impl FromStr for Http {
    type Err = ProviderError;

    fn from_str(src: &str) -> Result<Self, Self::Err> {
        if !is_valid_endpoint(src) {
            return Err(ProviderError::InvalidEndpoint(src.to_owned()));
        }
        let url = Url::parse(src)
            .map_err(|err| ProviderError::InvalidEndpoint(format!("{src}: {err}")))?;
        Ok(Http::new(url))
    }
}

/// Error thrown when building an authenticated Http client
#[derive(Debug, Error)]
pub enum HttpClientError {
    /// Thrown if unable to build headers for client
    #[error(transparent)]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),

    /// Thrown if unable to build client
    #[error(transparent)]
    ClientBuild(#[from] reqwest::Error),
}
