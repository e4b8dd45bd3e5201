use base64::prelude::*;
use reqwest::{Client as HttpClient, ClientBuilder, header::HeaderMap};
use serde::Deserialize;
use serde_json::Value;

use crate::config::Config;
use crate::types::{BlockId, FileContractId, Transaction, TransactionId};

use super::{
    ChainClient,
    error::{Error, RpcErrorResponse},
    types::{Request, Response, StorageProofStatus, TransactionStatus},
};

#[derive(Clone, Debug)]
pub struct Client {
    client: HttpClient,
    url: String,
}

const JSONRPC: &str = "2.0";

impl Client {
    pub fn new(url: String, user: String, password: String) -> Result<Self, Error> {
        let client = ClientBuilder::new()
            .default_headers({
                let mut headers = HeaderMap::new();
                let auth_str = BASE64_STANDARD.encode(format!("{}:{}", user, password));
                headers.insert("Authorization", format!("Basic {}", auth_str).parse()?);
                headers.insert("Content-Type", "application/json".parse()?);
                headers.insert("Accept", "application/json".parse()?);
                headers
            })
            .build()?;

        Ok(Client { client, url })
    }

    pub fn new_from_config(config: &Config) -> Result<Self, Error> {
        Client::new(
            config.chain_rpc_url.clone(),
            config.chain_rpc_user.clone(),
            config.chain_rpc_password.clone(),
        )
    }

    fn handle_response<T>(response: Response) -> Result<T, Error>
    where
        T: for<'de> Deserialize<'de>,
    {
        match (response.result, response.error) {
            (Some(result), None) => Ok(serde_json::from_value(result)?),
            (None, Some(error)) => {
                let detail: RpcErrorResponse = serde_json::from_value(error)?;
                Err(Error::Rpc {
                    code: detail.code,
                    message: detail.message,
                })
            }
            (None, None) => Err(Error::Unexpected(
                "No result or error in RPC response".to_string(),
            )),
            (Some(_), Some(_)) => Err(Error::Unexpected(
                "Both result and error present in RPC response".to_string(),
            )),
        }
    }

    pub async fn call<T>(&self, method: &str, params: Vec<Value>) -> Result<T, Error>
    where
        T: for<'de> Deserialize<'de>,
    {
        let request = Request {
            jsonrpc: JSONRPC.to_owned(),
            id: "0".to_string(),
            method: method.to_string(),
            params,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .json::<Response>()
            .await?;

        Self::handle_response(response)
    }

    pub async fn get_block_count(&self) -> Result<u64, Error> {
        self.call("getblockcount", vec![]).await
    }

    pub async fn get_block_id(&self, height: u64) -> Result<BlockId, Error> {
        let hex: String = self.call("getblockid", vec![height.into()]).await?;
        Ok(hex.parse()?)
    }

    pub async fn send_raw_transaction(&self, txn: &Transaction) -> Result<TransactionId, Error> {
        let hex: String = self
            .call("sendrawtransaction", vec![encode_transaction(txn)?.into()])
            .await?;
        Ok(hex.parse()?)
    }

    pub async fn get_transaction_status(
        &self,
        id: &TransactionId,
    ) -> Result<TransactionStatus, Error> {
        self.call("gettransactionstatus", vec![id.to_string().into()])
            .await
    }

    pub async fn get_storage_proof_status(
        &self,
        id: &FileContractId,
    ) -> Result<StorageProofStatus, Error> {
        self.call("getstorageproofstatus", vec![id.to_string().into()])
            .await
    }
}

/// Hex of the CBOR encoding, the form the node accepts raw transactions in.
pub fn encode_transaction(txn: &Transaction) -> Result<String, Error> {
    let mut bytes = vec![];
    ciborium::into_writer(txn, &mut bytes).map_err(|e| Error::Encode(e.to_string()))?;
    Ok(hex::encode(bytes))
}

pub fn decode_transaction(hex: &str) -> Result<Transaction, Error> {
    let bytes = hex::decode(hex)?;
    ciborium::from_reader(bytes.as_slice()).map_err(|e| Error::Encode(e.to_string()))
}

impl ChainClient for Client {
    async fn current_height(&self) -> Result<u64, Error> {
        self.get_block_count().await
    }

    async fn block_id(&self, height: u64) -> Result<BlockId, Error> {
        self.get_block_id(height).await
    }

    async fn submit_transaction(&self, txn: &Transaction) -> Result<(), Error> {
        let id = self.send_raw_transaction(txn).await?;
        if id != txn.id() {
            return Err(Error::Unexpected(format!(
                "Node reported transaction {} for submitted transaction {}",
                id,
                txn.id()
            )));
        }
        Ok(())
    }

    async fn is_confirmed(&self, id: &TransactionId) -> Result<bool, Error> {
        Ok(self.get_transaction_status(id).await?.confirmed)
    }

    async fn storage_proof_status(&self, id: &FileContractId) -> Result<StorageProofStatus, Error> {
        self.get_storage_proof_status(id).await
    }
}
