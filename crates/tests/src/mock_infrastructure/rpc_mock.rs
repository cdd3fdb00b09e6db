//! RPC Mock Builder for Ethereum JSON-RPC Testing
//!
//! Wraps mockito to provide Ethereum-specific response builders for the methods the
//! pipeline issues.

use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{json, Value};

/// Builder for creating mock Ethereum RPC responses.
///
/// Every mock is registered with an expected hit count so tests can assert how many
/// requests actually reached the endpoint.
pub struct RpcMockBuilder {
    server: ServerGuard,
    mocks: Vec<Mock>,
}

fn method_matcher(method: &str) -> Matcher {
    Matcher::Regex(format!(r#""method"\s*:\s*"{method}""#))
}

fn result_body(result: &Value) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": result
    })
    .to_string()
}

impl RpcMockBuilder {
    /// Creates a new RPC mock builder with a fresh mockito server.
    pub async fn new() -> Self {
        Self { server: Server::new_async().await, mocks: Vec::new() }
    }

    /// Returns the URL of the mock server.
    #[must_use]
    pub fn url(&self) -> String {
        self.server.url()
    }

    /// Mocks `method`, expecting exactly `hits` requests for it.
    pub fn mock_method(&mut self, method: &str, result: &Value, hits: usize) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .match_body(method_matcher(method))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(result_body(result))
            .expect(hits)
            .create();

        self.mocks.push(mock);
        self
    }

    /// Mocks an `eth_chainId` request.
    pub fn mock_chain_id(&mut self, chain_id: u64, hits: usize) -> &mut Self {
        self.mock_method("eth_chainId", &json!(format!("0x{chain_id:x}")), hits)
    }

    /// Mocks an `eth_getBalance` request for `address`.
    pub fn mock_get_balance(&mut self, address: &str, wei: u128, hits: usize) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                method_matcher("eth_getBalance"),
                Matcher::Regex(format!(r#""params"\s*:\s*\["{address}""#)),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(result_body(&json!(format!("0x{wei:x}"))))
            .expect(hits)
            .create();

        self.mocks.push(mock);
        self
    }

    /// Mocks an `eth_call` request whose calldata is `data`.
    pub fn mock_eth_call(&mut self, data: &str, returned: &str, hits: usize) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                method_matcher("eth_call"),
                Matcher::Regex(format!(r#""data"\s*:\s*"{data}""#)),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(result_body(&json!(returned)))
            .expect(hits)
            .create();

        self.mocks.push(mock);
        self
    }

    /// Mocks an RPC error response.
    pub fn mock_rpc_error(
        &mut self,
        method: &str,
        code: i32,
        message: &str,
        hits: usize,
    ) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .match_body(method_matcher(method))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "error": {
                        "code": code,
                        "message": message
                    }
                })
                .to_string(),
            )
            .expect(hits)
            .create();

        self.mocks.push(mock);
        self
    }

    /// Mocks an HTTP error status for every request.
    pub fn mock_http_status(&mut self, status: usize, body: &str, hits: usize) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .with_status(status)
            .with_body(body)
            .expect(hits)
            .create();

        self.mocks.push(mock);
        self
    }

    /// Asserts every mock was hit exactly as often as it expected.
    pub async fn assert_all(&self) {
        for mock in &self.mocks {
            mock.assert_async().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rpc_mock_builder_creation() {
        let mock = RpcMockBuilder::new().await;
        assert!(mock.url().starts_with("http://"));
    }

    #[test]
    fn test_result_body() {
        let body: Value = serde_json::from_str(&result_body(&json!("0x1"))).unwrap();
        assert_eq!(body["jsonrpc"], "2.0");
        assert_eq!(body["result"], "0x1");
    }
}
