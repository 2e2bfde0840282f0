pub(crate) mod common;
pub use common::{Authorization, ProviderOptions, RequestArguments, RequestParams, TransportConfig};

mod http;
pub use self::http::{is_valid_endpoint, Http, HttpClientError};

mod mock;
pub use mock::{MockResponse, MockTransport};
