use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize)]
pub struct Request {
    pub jsonrpc: String,
    pub id: String,
    pub method: String,
    pub params: Vec<Value>,
}

#[derive(Deserialize, Debug)]
pub struct Response {
    pub result: Option<Value>,
    pub error: Option<Value>,
    pub id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct TransactionStatus {
    /// Whether the transaction is included in the current best chain
    pub confirmed: bool,
    /// Height of the block containing the transaction, if confirmed
    pub height: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct StorageProofStatus {
    /// Whether a valid storage proof for the contract is in the best chain
    pub confirmed: bool,
    /// Segment of the file the proof has to cover
    #[serde(rename = "segmentindex")]
    pub segment_index: u64,
}
