//! JSON-RPC 2.0 wire types and Solana account encoding.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use mintmeta_core::{Account, Pubkey, StoreError};

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    pub params: Vec<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl From<JsonRpcError> for StoreError {
    fn from(e: JsonRpcError) -> Self {
        StoreError::Rpc {
            code: e.code,
            message: e.message,
        }
    }
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// The result value, or the node's error.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// `{ "context": { "slot": .. }, "value": .. }` envelope used by account methods.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcContextResult<T> {
    pub context: RpcContext,
    pub value: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcContext {
    pub slot: u64,
}

/// Account data as encoded by the node.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UiAccountData {
    /// `["<payload>", "<encoding>"]`
    Encoded(String, String),
    /// Bare base58 string from the legacy `binary` encoding.
    Legacy(String),
}

/// An account as returned by `getAccountInfo` / `getMultipleAccounts`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiAccount {
    pub lamports: u64,
    pub owner: String,
    pub data: UiAccountData,
    pub executable: bool,
}

impl UiAccount {
    pub fn decode(&self) -> Result<Account, StoreError> {
        let owner: Pubkey = self
            .owner
            .parse()
            .map_err(|e| StoreError::Decode(format!("owner {}: {e}", self.owner)))?;

        let data = match &self.data {
            UiAccountData::Encoded(payload, encoding) => match encoding.as_str() {
                "base64" => BASE64
                    .decode(payload)
                    .map_err(|e| StoreError::Decode(format!("base64 data: {e}")))?,
                "base58" => decode_base58(payload)?,
                other => {
                    return Err(StoreError::Decode(format!(
                        "unsupported account encoding {other}"
                    )))
                }
            },
            UiAccountData::Legacy(payload) => decode_base58(payload)?,
        };

        Ok(Account {
            lamports: self.lamports,
            owner,
            data,
            executable: self.executable,
        })
    }
}

fn decode_base58(payload: &str) -> Result<Vec<u8>, StoreError> {
    bs58::decode(payload)
        .into_vec()
        .map_err(|e| StoreError::Decode(format!("base58 data: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_shape() {
        let req = JsonRpcRequest::new(7, "getAccountInfo", vec![json!("abc")]);
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["jsonrpc"], "2.0");
        assert_eq!(v["id"], 7);
        assert_eq!(v["params"][0], "abc");
    }

    #[test]
    fn error_response_maps_to_rpc_error() {
        let resp: JsonRpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32602, "message": "Invalid param: WrongSize" }
        }))
        .unwrap();
        let err: StoreError = resp.into_result().unwrap_err().into();
        assert!(matches!(err, StoreError::Rpc { code: -32602, .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn decodes_multiple_accounts_result() {
        let owner = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
        let result = json!({
            "context": { "slot": 250_000_000u64 },
            "value": [
                {
                    "lamports": 1_461_600,
                    "owner": owner,
                    "data": [BASE64.encode([1u8, 2, 3]), "base64"],
                    "executable": false,
                    "rentEpoch": 18_446_744_073_709_551_615u64,
                    "space": 3
                },
                null
            ]
        });
        let parsed: RpcContextResult<Vec<Option<UiAccount>>> =
            serde_json::from_value(result).unwrap();
        assert_eq!(parsed.context.slot, 250_000_000);
        assert_eq!(parsed.value.len(), 2);

        let account = parsed.value[0].as_ref().unwrap().decode().unwrap();
        assert_eq!(account.data, vec![1, 2, 3]);
        assert_eq!(account.owner.to_string(), owner);
        assert!(parsed.value[1].is_none());
    }

    #[test]
    fn decodes_base58_and_legacy_data() {
        let encoded = bs58::encode([9u8, 8]).into_string();
        let ui: UiAccount = serde_json::from_value(json!({
            "lamports": 1,
            "owner": "11111111111111111111111111111111",
            "data": encoded,
            "executable": false
        }))
        .unwrap();
        assert_eq!(ui.decode().unwrap().data, vec![9, 8]);

        let ui: UiAccount = serde_json::from_value(json!({
            "lamports": 1,
            "owner": "11111111111111111111111111111111",
            "data": [encoded, "base58"],
            "executable": true
        }))
        .unwrap();
        let account = ui.decode().unwrap();
        assert_eq!(account.data, vec![9, 8]);
        assert!(account.executable);
    }

    #[test]
    fn rejects_unknown_encoding_and_bad_owner() {
        let ui: UiAccount = serde_json::from_value(json!({
            "lamports": 1,
            "owner": "11111111111111111111111111111111",
            "data": ["", "jsonParsed"],
            "executable": false
        }))
        .unwrap();
        assert!(matches!(ui.decode(), Err(StoreError::Decode(_))));

        let ui: UiAccount = serde_json::from_value(json!({
            "lamports": 1,
            "owner": "not-a-key",
            "data": ["", "base64"],
            "executable": false
        }))
        .unwrap();
        assert!(matches!(ui.decode(), Err(StoreError::Decode(_))));
    }
}
