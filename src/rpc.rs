//! JSON-RPC client for a Sui full node.
//!
//! Implements the read capabilities from [`ledger`](crate::ledger). Every
//! request is retried up to `retries` times before the error is returned.

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::RpcConfig;
use crate::ledger::{CoinSource, DynamicFieldSource, ObjectReader, OwnedObjectSource};
use crate::schema::{DynamicFieldInfo, DynamicFieldName, ObjectResponse};
use crate::types::{Coin, CoinType, ObjectId, Page, PageCursor, SuiAddress};

const DYNAMIC_FIELD_NOT_FOUND: &str = "dynamicFieldNotFound";

#[derive(Clone, Debug, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

impl<T> RpcResponse<T> {
    fn into_result(self, method: &str) -> anyhow::Result<T> {
        match (self.result, self.error) {
            (_, Some(error)) => Err(anyhow!(
                "{} failed with code {}: {}",
                method,
                error.code,
                error.message
            )),
            (Some(result), None) => Ok(result),
            (None, None) => Err(anyhow!("{} returned neither result nor error", method)),
        }
    }
}

/// `suix_getBalance` result.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub coin_type: CoinType,
    pub coin_object_count: u64,
    pub total_balance: String,
}

impl Balance {
    pub fn total(&self) -> anyhow::Result<u128> {
        self.total_balance
            .parse()
            .with_context(|| format!("Invalid total balance {:?}", self.total_balance))
    }
}

fn request_body(id: u64, method: &str, params: &Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
}

fn object_options() -> Value {
    json!({
        "showType": true,
        "showContent": true,
        "showOwner": false,
    })
}

// A missing field comes back as an object response carrying an error.
fn found_field(response: ObjectResponse) -> Option<ObjectResponse> {
    let missing = response.data.is_none()
        && response
            .error
            .as_ref()
            .and_then(|error| error.get("code"))
            .and_then(Value::as_str)
            == Some(DYNAMIC_FIELD_NOT_FOUND);
    if missing {
        None
    } else {
        Some(response)
    }
}

pub struct SuiRpcClient {
    client: Client,
    endpoint: String,
    retries: u64,
    page_limit: Option<usize>,
    next_id: AtomicU64,
}

impl SuiRpcClient {
    pub fn new(config: &RpcConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.append(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP Client")?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            retries: config.retries.max(1),
            page_limit: config.page_limit,
            next_id: AtomicU64::new(1),
        })
    }

    /// Calls `method`, retrying failed attempts.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> anyhow::Result<T> {
        let mut retries = self.retries;
        loop {
            match self.call_once(method, &params).await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    retries -= 1;
                    if retries == 0 {
                        return Err(err.context(format!("retries limit reached for {}", method)));
                    }
                    tracing::warn!("{} failed, {} attempts left: {:?}", method, retries, err);
                }
            }
        }
    }

    async fn call_once<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &Value,
    ) -> anyhow::Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let req = self
            .client
            .post(&self.endpoint)
            .json(&request_body(id, method, params))
            .send()
            .await
            .with_context(|| format!("Failed to send {} to {}", method, self.endpoint))?;

        match req.status() {
            StatusCode::OK => {
                let response: RpcResponse<T> = req.json().await.with_context(|| {
                    format!("Expect the endpoint to return a {} response", method)
                })?;
                response.into_result(method)
            }
            status => {
                let text = req.text().await.unwrap_or_default();
                Err(anyhow!("{} returned status {}: {}", method, status, text))
            }
        }
    }

    pub async fn get_balance(
        &self,
        owner: SuiAddress,
        coin_type: &CoinType,
    ) -> anyhow::Result<Balance> {
        self.call("suix_getBalance", json!([owner, coin_type])).await
    }
}

#[async_trait]
impl CoinSource for SuiRpcClient {
    async fn coins_page(
        &self,
        owner: SuiAddress,
        coin_type: &CoinType,
        cursor: Option<PageCursor>,
    ) -> anyhow::Result<Page<Coin>> {
        self.call(
            "suix_getCoins",
            json!([owner, coin_type, cursor, self.page_limit]),
        )
        .await
    }
}

#[async_trait]
impl OwnedObjectSource for SuiRpcClient {
    async fn owned_objects_page(
        &self,
        owner: SuiAddress,
        struct_type: &str,
        cursor: Option<PageCursor>,
    ) -> anyhow::Result<Page<ObjectResponse>> {
        let query = json!({
            "filter": {"StructType": struct_type},
            "options": object_options(),
        });
        self.call(
            "suix_getOwnedObjects",
            json!([owner, query, cursor, self.page_limit]),
        )
        .await
    }
}

#[async_trait]
impl DynamicFieldSource for SuiRpcClient {
    async fn dynamic_fields_page(
        &self,
        parent: ObjectId,
        cursor: Option<PageCursor>,
    ) -> anyhow::Result<Page<DynamicFieldInfo>> {
        self.call(
            "suix_getDynamicFields",
            json!([parent, cursor, self.page_limit]),
        )
        .await
    }
}

#[async_trait]
impl ObjectReader for SuiRpcClient {
    async fn get_object(&self, id: ObjectId) -> anyhow::Result<ObjectResponse> {
        self.call("sui_getObject", json!([id, object_options()])).await
    }

    async fn multi_get_objects(&self, ids: &[ObjectId]) -> anyhow::Result<Vec<ObjectResponse>> {
        let objects: Vec<ObjectResponse> = self
            .call("sui_multiGetObjects", json!([ids, object_options()]))
            .await?;
        if objects.len() != ids.len() {
            return Err(anyhow!(
                "asked for {} objects, got {}",
                ids.len(),
                objects.len()
            ));
        }
        Ok(objects)
    }

    async fn get_dynamic_field_object(
        &self,
        parent: ObjectId,
        name: &DynamicFieldName,
    ) -> anyhow::Result<Option<ObjectResponse>> {
        let response: ObjectResponse = self
            .call("suix_getDynamicFieldObject", json!([parent, name]))
            .await?;
        Ok(found_field(response))
    }
}

#[cfg(test)]
mod tests {
    use crate::rpc::{found_field, request_body, Balance, RpcResponse};
    use crate::schema::{DynamicFieldInfo, ObjectResponse};
    use crate::types::{Coin, Page, PageCursor};
    use serde_json::json;

    #[test]
    fn request_envelope() {
        let cursor: Option<PageCursor> = None;
        let body = request_body(7, "suix_getDynamicFields", &json!(["0x5", cursor, 50]));
        assert_eq!(
            body,
            json!({
                "jsonrpc": "2.0",
                "id": 7,
                "method": "suix_getDynamicFields",
                "params": ["0x5", null, 50],
            })
        );
    }

    #[test]
    fn result_envelope() {
        let response: RpcResponse<Page<Coin>> = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "data": [{"coinObjectId": "0x1", "balance": "10", "coinType": "0x2::sui::SUI"}],
                "nextCursor": "0x1",
                "hasNextPage": false
            }
        }))
        .unwrap();
        let page = response.into_result("suix_getCoins").unwrap();
        assert_eq!(page.data[0].balance, 10);
        assert!(!page.has_next_page);
    }

    #[test]
    fn error_envelope() {
        let response: RpcResponse<Page<DynamicFieldInfo>> = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 2,
            "error": {"code": -32602, "message": "Invalid params"}
        }))
        .unwrap();
        let err = response.into_result("suix_getDynamicFields").unwrap_err();
        assert!(err.to_string().contains("-32602"));

        let empty: RpcResponse<Page<Coin>> =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 3})).unwrap();
        assert!(empty.into_result("suix_getCoins").is_err());
    }

    #[test]
    fn missing_dynamic_field_is_none() {
        let missing: ObjectResponse = serde_json::from_value(json!({
            "error": {"code": "dynamicFieldNotFound", "parent_object_id": "0x5"}
        }))
        .unwrap();
        assert!(found_field(missing).is_none());

        let deleted: ObjectResponse = serde_json::from_value(json!({
            "error": {"code": "deleted", "object_id": "0x5"}
        }))
        .unwrap();
        assert!(found_field(deleted).is_some());
    }

    #[test]
    fn balance_total() {
        let balance: Balance = serde_json::from_value(json!({
            "coinType": "0x2::sui::SUI",
            "coinObjectCount": 3,
            "totalBalance": "340282366920938463463374607431768211455",
            "lockedBalance": {}
        }))
        .unwrap();
        assert_eq!(balance.total().unwrap(), u128::MAX);
        assert_eq!(balance.coin_object_count, 3);
    }
}
