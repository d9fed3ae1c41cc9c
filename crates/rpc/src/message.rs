//! JSON-RPC 2.0 framing

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CallError;

#[derive(Debug, Serialize)]
pub struct Request<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub params: &'a Value,
    pub id: u64,
}

impl<'a> Request<'a> {
    pub fn new(method: &'a str, params: &'a Value, id: u64) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
            id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub id: Option<Value>,
    /// `null` is a legitimate result, so a missing member reads as `Value::Null`
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Option<ErrorObject>,
}

impl Response {
    /// Parse a response body
    pub fn from_value(value: Value) -> Result<Self, CallError> {
        if !value.is_object() {
            return Err(CallError::Malformed(format!(
                "expected a JSON-RPC object, got {}",
                value
            )));
        }
        serde_json::from_value(value).map_err(|e| CallError::Malformed(e.to_string()))
    }

    /// The `error` member wins over `result`
    pub fn into_result(self) -> Result<Value, CallError> {
        match self.error {
            Some(err) => Err(CallError::RpcError {
                code: err.code,
                message: err.message,
            }),
            None => Ok(self.result),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_shape() {
        let params = json!([]);
        let request = Request::new("quai_blockNumber", &params, 7);
        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(
            encoded,
            json!({"jsonrpc": "2.0", "method": "quai_blockNumber", "params": [], "id": 7})
        );
    }

    #[test]
    fn test_error_member_becomes_rpc_error() {
        let response = Response::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32602, "message": "invalid argument"}
        }))
        .unwrap();
        assert_eq!(
            response.into_result(),
            Err(CallError::RpcError {
                code: -32602,
                message: "invalid argument".into()
            })
        );
    }

    #[test]
    fn test_null_result_is_ok() {
        let response =
            Response::from_value(json!({"jsonrpc": "2.0", "id": 1, "result": null})).unwrap();
        assert_eq!(response.into_result(), Ok(Value::Null));
    }

    #[test]
    fn test_non_object_is_malformed() {
        assert!(matches!(
            Response::from_value(json!([1, 2])),
            Err(CallError::Malformed(_))
        ));
    }
}
