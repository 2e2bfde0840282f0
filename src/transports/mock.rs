use super::common::TransportConfig;
use crate::{errors::TransportError, Transport};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

/// Helper response type for [`MockTransport`], allowing transport errors to
/// be queued alongside successful bodies.
#[derive(Debug)]
pub enum MockResponse {
    /// Successful response body
    Value(Value),

    /// Transport-level failure
    Error(TransportError),
}

/// Mock transport used in test environments.
///
/// Records every dispatched body and answers from a FIFO queue of canned
/// responses. Clones share the same queues.
#[derive(Clone, Debug, Default)]
pub struct MockTransport {
    requests: Arc<Mutex<VecDeque<(Value, Option<TransportConfig>)>>>,
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
}

#[async_trait]
impl Transport for MockTransport {
    /// Pushes the `(body, config)` to the back of the `requests` queue,
    /// pops the next response from the front of the `responses` queue
    async fn post(
        &self,
        body: &Value,
        config: Option<&TransportConfig>,
    ) -> Result<Value, TransportError> {
        self.requests.lock().unwrap().push_back((body.clone(), config.cloned()));
        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| {
                TransportError::Custom("empty responses queue, please push some responses".into())
            })?;
        match response {
            MockResponse::Value(value) => Ok(value),
            MockResponse::Error(err) => Err(err),
        }
    }
}

impl MockTransport {
    /// Instantiates a mock transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful response carrying `data` in the plain
    /// `{ "data": .. }` gateway shape
    pub fn push<T: Serialize>(&self, data: T) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(data)?;
        self.responses
            .lock()
            .unwrap()
            .push_back(MockResponse::Value(json!({ "data": value })));
        Ok(())
    }

    /// Queues a raw response body or error
    pub fn push_response(&self, response: MockResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Pops the earliest recorded request, if any
    pub fn pop_request(&self) -> Option<(Value, Option<TransportConfig>)> {
        self.requests.lock().unwrap().pop_front()
    }

    /// Checks that the earliest recorded request carried the given method and
    /// positional params
    pub fn assert_request(&self, method: &str, params: Value) {
        let (body, _) = self.pop_request().expect("no requests were recorded");
        assert_eq!(body["method"], Value::String(method.to_owned()));
        assert_eq!(body["params"], params);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_request_and_answers() {
        let mock = MockTransport::new();
        mock.push("0x1").unwrap();

        let body = json!({"method": "eth_chainId", "params": []});
        let res = mock.post(&body, None).await.unwrap();
        assert_eq!(res, json!({"data": "0x1"}));

        mock.assert_request("eth_chainId", json!([]));
    }

    #[tokio::test]
    async fn empty_responses() {
        let mock = MockTransport::new();
        // tries to get a response without pushing one
        let err = mock.post(&json!({"method": "eth_chainId"}), None).await.unwrap_err();
        assert!(matches!(err, TransportError::Custom(_)));
    }

    #[tokio::test]
    async fn queued_errors_are_returned_in_order() {
        let mock = MockTransport::new();
        mock.push("0x1").unwrap();
        mock.push_response(MockResponse::Error(TransportError::ConnectionRefused(
            "connect ECONNREFUSED 127.0.0.1:8545".into(),
        )));

        let body = json!({"method": "eth_blockNumber", "params": []});
        mock.post(&body, None).await.unwrap();
        let err = mock.post(&body, None).await.unwrap_err();
        assert!(err.is_connection_refused());
    }

    #[tokio::test]
    async fn records_per_call_config() {
        let mock = MockTransport::new();
        mock.push("0x1").unwrap();

        let config = TransportConfig {
            headers: vec![("x-test".into(), "1".into())],
            timeout: None,
        };
        mock.post(&json!({"method": "foo", "params": []}), Some(&config)).await.unwrap();

        let (_, recorded) = mock.pop_request().unwrap();
        assert_eq!(recorded, Some(config));
    }
}
