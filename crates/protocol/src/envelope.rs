use serde::{Deserialize, Serialize};

use crate::constants::JSONRPC_VERSION;

/// Error object of a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Envelope for all JSON-RPC traffic with the node.
///
/// A single shape covers requests (`id` + `method`), responses (`id` +
/// `result` or `error`) and subscription notifications (`method` without
/// `id`). `params` and `result` use `RawValue` to defer deserialization
/// until the caller knows the target type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Box<serde_json::value::RawValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Box<serde_json::value::RawValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

fn jsonrpc_version() -> String {
    JSONRPC_VERSION.to_string()
}

fn to_raw<T: Serialize>(value: &T) -> Result<Box<serde_json::value::RawValue>, serde_json::Error> {
    let json = serde_json::to_string(value)?;
    serde_json::value::RawValue::from_string(json)
}

impl Message {
    /// Creates a request with positional parameters.
    pub fn request<T: Serialize>(
        id: u64,
        method: impl Into<String>,
        params: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            jsonrpc: jsonrpc_version(),
            id: Some(id),
            method: Some(method.into()),
            params: Some(to_raw(params)?),
            result: None,
            error: None,
        })
    }

    /// Creates a successful response.
    pub fn response<T: Serialize>(id: u64, result: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            jsonrpc: jsonrpc_version(),
            id: Some(id),
            method: None,
            params: None,
            result: Some(to_raw(result)?),
            error: None,
        })
    }

    /// Creates an error response.
    pub fn error(id: u64, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id: Some(id),
            method: None,
            params: None,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Returns `true` for server-initiated messages that carry no request id.
    pub fn is_notification(&self) -> bool {
        self.id.is_none() && self.method.is_some()
    }

    /// Deserializes the result into the given type.
    ///
    /// A missing or `null` result yields `Ok(None)`.
    pub fn parse_result<T: for<'de> Deserialize<'de>>(
        &self,
    ) -> Result<Option<T>, serde_json::Error> {
        match &self.result {
            Some(raw) => Ok(Some(serde_json::from_str(raw.get())?)),
            None => Ok(None),
        }
    }

    /// Deserializes the request parameters into the given type.
    pub fn parse_params<T: for<'de> Deserialize<'de>>(
        &self,
    ) -> Result<Option<T>, serde_json::Error> {
        match &self.params {
            Some(raw) => Ok(Some(serde_json::from_str(raw.get())?)),
            None => Ok(None),
        }
    }

    /// Creates a response for this request.
    pub fn reply<T: Serialize>(&self, result: &T) -> Result<Self, serde_json::Error> {
        Message::response(self.id.unwrap_or_default(), result)
    }

    /// Creates an error response for this request.
    pub fn reply_error(&self, code: i64, message: impl Into<String>) -> Self {
        Message::error(self.id.unwrap_or_default(), code, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ChainProperties;

    #[test]
    fn request_carries_method_and_params() {
        let msg = Message::request(7, "chain_getBlockHash", &serde_json::json!([0])).unwrap();
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(
            json,
            r#"{"jsonrpc":"2.0","id":7,"method":"chain_getBlockHash","params":[0]}"#
        );
    }

    #[test]
    fn response_parse_result() {
        let json = r#"{"jsonrpc":"2.0","id":3,"result":{"ss58Format":42,"tokenDecimals":12,"tokenSymbol":"UNIT"}}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.id, Some(3));
        let props: ChainProperties = msg.parse_result().unwrap().unwrap();
        assert_eq!(props.ss58_format, Some(42));
        assert_eq!(props.token_decimals, vec![12]);
        assert_eq!(props.token_symbol, vec!["UNIT".to_string()]);
    }

    #[test]
    fn null_result_is_none() {
        let json = r#"{"jsonrpc":"2.0","id":1,"result":null}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        let parsed: Option<String> = msg.parse_result().unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn error_response_parses() {
        let json = r#"{"jsonrpc":"2.0","id":9,"error":{"code":-32601,"message":"Method not found"}}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        let err = msg.error.unwrap();
        assert_eq!(err.code, -32601);
        assert_eq!(err.message, "Method not found");
        assert!(msg.result.is_none());
    }

    #[test]
    fn notification_has_no_id() {
        let json = r#"{"jsonrpc":"2.0","method":"chain_newHead","params":{"subscription":"abc","result":{}}}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert!(msg.is_notification());
        assert_eq!(msg.method.as_deref(), Some("chain_newHead"));
    }

    #[test]
    fn response_omits_request_fields() {
        let msg = Message::response(2, &"ok").unwrap();
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("method"));
        assert!(!json.contains("params"));
        assert!(!json.contains("error"));
    }

    #[test]
    fn reply_preserves_id() {
        let req = Message::request(42, "system_name", &serde_json::json!([])).unwrap();
        let reply = req.reply(&"substrate-node").unwrap();
        assert_eq!(reply.id, Some(42));
        let err = req.reply_error(-32000, "boom");
        assert_eq!(err.id, Some(42));
        assert_eq!(err.error.unwrap().message, "boom");
    }
}
