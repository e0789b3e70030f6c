//! JSON-RPC 2.0 over HTTP.

use super::{
    DeploySubmission, DeployTransaction, FunctionCall, InvokeTransaction, Provider, ProviderError,
    TxHash, TxStatus,
};
use crate::{constants, felt::Felt};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use url::Url;

/// Error codes returned by the node that carry a meaning for the clients.
pub mod codes {
    pub const CONTRACT_NOT_FOUND: i64 = 20;
    pub const ENTRYPOINT_NOT_FOUND: i64 = 21;
    pub const CLASS_NOT_FOUND: i64 = 28;
    pub const INSUFFICIENT_ACCOUNT_BALANCE: i64 = 54;
    pub const VALIDATION_FAILURE: i64 = 55;
    pub const CONTRACT_ALREADY_DEPLOYED: i64 = 56;
}

#[derive(Debug)]
pub struct RpcProvider {
    url: Url,
    client: reqwest::Client,
    next_id: AtomicU64,
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<R> {
    result: Option<R>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Serialize)]
struct TransactionHashParams<'a> {
    transaction_hash: &'a TxHash,
}

#[derive(Debug, Serialize)]
struct FindDeploymentParams<'a> {
    sender: &'a Felt,
    salt: &'a Felt,
}

/// `findDeployment` answers with an object so that "not found" is not a null `result`.
#[derive(Debug, Deserialize)]
struct FoundDeployment {
    deployment: Option<DeploySubmission>,
}

impl RpcProvider {
    pub fn new(url: &str) -> Result<Self, ProviderError> {
        let url = Url::parse(url)
            .map_err(|e| ProviderError::Transport(format!("invalid RPC url `{url}`: {e}")))?;
        Ok(Self {
            url,
            client: reqwest::Client::new(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn request<P, R>(&self, method: &str, params: P) -> Result<R, ProviderError>
    where
        P: Serialize + Send,
        R: DeserializeOwned + Send,
    {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        tracing::trace!(method, url = %self.url, "sending RPC request");
        let response = self
            .client
            .post(self.url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("{method}: {e}")))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Transport(format!("{method}: {e}")))?;
        if !status.is_success() {
            return Err(ProviderError::Transport(format!(
                "{method}: node answered HTTP {status}"
            )));
        }
        parse_response(method, &body)
    }
}

fn parse_response<R: DeserializeOwned>(method: &str, body: &[u8]) -> Result<R, ProviderError> {
    let response: RpcResponse<R> = serde_json::from_slice(body)
        .map_err(|e| ProviderError::Transport(format!("{method}: malformed response: {e}")))?;
    match (response.result, response.error) {
        (_, Some(error)) => Err(map_rpc_error(error)),
        (Some(result), None) => Ok(result),
        (None, None) => Err(ProviderError::Transport(format!(
            "{method}: response carries neither a result nor an error"
        ))),
    }
}

fn map_rpc_error(error: RpcErrorObject) -> ProviderError {
    match error.code {
        codes::CONTRACT_NOT_FOUND | codes::ENTRYPOINT_NOT_FOUND => {
            ProviderError::EntrypointNotFound
        }
        codes::CLASS_NOT_FOUND
        | codes::INSUFFICIENT_ACCOUNT_BALANCE
        | codes::VALIDATION_FAILURE
        | codes::CONTRACT_ALREADY_DEPLOYED => ProviderError::Rejected(error.message),
        code => ProviderError::Rpc {
            code,
            message: error.message,
        },
    }
}

#[async_trait]
impl Provider for RpcProvider {
    async fn chain_id(&self) -> Result<String, ProviderError> {
        self.request(constants::RPC_METHOD_CHAIN_ID, ()).await
    }

    async fn add_deploy_transaction(
        &self,
        tx: &DeployTransaction,
    ) -> Result<DeploySubmission, ProviderError> {
        self.request(constants::RPC_METHOD_ADD_DEPLOY_TRANSACTION, tx)
            .await
    }

    async fn add_invoke_transaction(
        &self,
        tx: &InvokeTransaction,
    ) -> Result<TxHash, ProviderError> {
        self.request(constants::RPC_METHOD_ADD_INVOKE_TRANSACTION, tx)
            .await
    }

    async fn transaction_status(&self, tx_hash: &TxHash) -> Result<TxStatus, ProviderError> {
        self.request(
            constants::RPC_METHOD_GET_TRANSACTION_STATUS,
            TransactionHashParams {
                transaction_hash: tx_hash,
            },
        )
        .await
    }

    async fn find_deployment(
        &self,
        sender: &Felt,
        salt: &Felt,
    ) -> Result<Option<DeploySubmission>, ProviderError> {
        let found: FoundDeployment = self
            .request(
                constants::RPC_METHOD_FIND_DEPLOYMENT,
                FindDeploymentParams { sender, salt },
            )
            .await?;
        Ok(found.deployment)
    }

    async fn call(&self, call: &FunctionCall) -> Result<Vec<Felt>, ProviderError> {
        self.request(constants::RPC_METHOD_CALL, call).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn request_shape() {
        let tx = InvokeTransaction {
            sender: Felt::from(1u64),
            contract_address: Felt::from(2u64),
            entrypoint: "Set_module_access".into(),
            calldata: vec![Felt::from(3u64)],
        };
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 7,
            method: constants::RPC_METHOD_ADD_INVOKE_TRANSACTION,
            params: &tx,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["id"], 7);
        assert_eq!(value["method"], "addInvokeTransaction");
        assert_eq!(value["params"]["entrypoint"], "Set_module_access");
        assert_eq!(
            value["params"]["calldata"][0],
            "0x0000000000000000000000000000000000000000000000000000000000000003"
        );
    }

    #[test]
    fn parses_results() {
        let body = br#"{"jsonrpc":"2.0","id":1,"result":{"transaction_hash":"0x1","contract_address":"0xbbb"}}"#;
        let submission: DeploySubmission = parse_response("addDeployTransaction", body).unwrap();
        assert_eq!(submission.transaction_hash, Felt::from(1u64));
        assert_eq!(submission.contract_address, Felt::from(0xbbbu64));

        let body = br#"{"jsonrpc":"2.0","id":2,"result":{"deployment":null}}"#;
        let found: FoundDeployment = parse_response("findDeployment", body).unwrap();
        assert_eq!(found.deployment, None);

        let body = br#"{"jsonrpc":"2.0","id":2,"result":"SN_GOERLI"}"#;
        let chain_id: String = parse_response("chainId", body).unwrap();
        assert_eq!(chain_id, "SN_GOERLI");
    }

    #[test]
    fn maps_error_codes() {
        let body = br#"{"jsonrpc":"2.0","id":1,"error":{"code":21,"message":"Requested entrypoint does not exist in the contract"}}"#;
        let err = parse_response::<TxHash>("addInvokeTransaction", body).unwrap_err();
        assert_eq!(err, ProviderError::EntrypointNotFound);

        let body = br#"{"jsonrpc":"2.0","id":1,"error":{"code":54,"message":"Account balance is smaller than the transaction's max_fee"}}"#;
        let err = parse_response::<DeploySubmission>("addDeployTransaction", body).unwrap_err();
        assert_eq!(
            err,
            ProviderError::Rejected(
                "Account balance is smaller than the transaction's max_fee".into()
            )
        );

        let body = br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"Method not found"}}"#;
        let err = parse_response::<TxStatus>("getTransactionStatus", body).unwrap_err();
        assert_eq!(
            err,
            ProviderError::Rpc {
                code: -32601,
                message: "Method not found".into()
            }
        );
    }

    #[test]
    fn malformed_responses_are_transport_errors() {
        for body in [&b"<html>502</html>"[..], &br#"{"jsonrpc":"2.0","id":1}"#[..]] {
            let err = parse_response::<TxStatus>("getTransactionStatus", body).unwrap_err();
            assert!(matches!(err, ProviderError::Transport(_)), "{err:?}");
        }
    }

    #[test]
    fn rejects_invalid_url() {
        assert!(matches!(
            RpcProvider::new("not a url"),
            Err(ProviderError::Transport(_))
        ));
        let provider = RpcProvider::new("http://127.0.0.1:5050/rpc").unwrap();
        assert_eq!(provider.url().as_str(), "http://127.0.0.1:5050/rpc");
    }
}
