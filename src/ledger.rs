//! Capabilities the core consumes from a ledger endpoint.
//!
//! Everything here returns `anyhow::Result`: the core treats endpoint errors as
//! opaque and wraps them in [`Error::Upstream`](crate::Error::Upstream).
//! Retry policy, if any, belongs to the implementor.

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::change_set::TransactionResponse;
use crate::error::Result;
use crate::schema::{DynamicField, DynamicFieldInfo, DynamicFieldName, MoveObject, ObjectResponse};
use crate::transaction::ProgrammableTransaction;
use crate::types::{Coin, CoinType, ObjectId, Page, PageCursor, SuiAddress};

#[async_trait]
pub trait CoinSource: Send + Sync {
    async fn coins_page(
        &self,
        owner: SuiAddress,
        coin_type: &CoinType,
        cursor: Option<PageCursor>,
    ) -> anyhow::Result<Page<Coin>>;
}

#[async_trait]
pub trait OwnedObjectSource: Send + Sync {
    async fn owned_objects_page(
        &self,
        owner: SuiAddress,
        struct_type: &str,
        cursor: Option<PageCursor>,
    ) -> anyhow::Result<Page<ObjectResponse>>;
}

#[async_trait]
pub trait DynamicFieldSource: Send + Sync {
    async fn dynamic_fields_page(
        &self,
        parent: ObjectId,
        cursor: Option<PageCursor>,
    ) -> anyhow::Result<Page<DynamicFieldInfo>>;
}

#[async_trait]
pub trait ObjectReader: Send + Sync {
    async fn get_object(&self, id: ObjectId) -> anyhow::Result<ObjectResponse>;

    async fn multi_get_objects(&self, ids: &[ObjectId]) -> anyhow::Result<Vec<ObjectResponse>>;

    /// `None` when the parent has no field under `name`.
    async fn get_dynamic_field_object(
        &self,
        parent: ObjectId,
        name: &DynamicFieldName,
    ) -> anyhow::Result<Option<ObjectResponse>>;
}

/// Signs and executes a transaction. Signing lives outside this crate.
#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    async fn execute(&self, tx: ProgrammableTransaction) -> anyhow::Result<TransactionResponse>;
}

pub async fn read_object<T, R>(reader: &R, id: ObjectId) -> Result<MoveObject<T>>
where
    T: DeserializeOwned,
    R: ObjectReader + ?Sized,
{
    reader.get_object(id).await?.decode()
}

pub async fn read_objects<T, R>(reader: &R, ids: &[ObjectId]) -> Result<Vec<MoveObject<T>>>
where
    T: DeserializeOwned,
    R: ObjectReader + ?Sized,
{
    if ids.is_empty() {
        return Ok(vec![]);
    }
    reader
        .multi_get_objects(ids)
        .await?
        .iter()
        .map(ObjectResponse::decode::<T>)
        .collect()
}

/// Point lookup of one dynamic field, e.g. a single voter in a votes table.
pub async fn read_dynamic_field<N, V, R>(
    reader: &R,
    parent: ObjectId,
    name: &DynamicFieldName,
) -> Result<Option<MoveObject<DynamicField<N, V>>>>
where
    N: DeserializeOwned,
    V: DeserializeOwned,
    R: ObjectReader + ?Sized,
{
    match reader.get_dynamic_field_object(parent, name).await? {
        None => Ok(None),
        Some(response) => response.decode().map(Some),
    }
}


#[cfg(test)]
mod tests {
    use crate::ledger::mock::{field_info, id, object, MockLedger};
    use crate::ledger::{read_dynamic_field, read_object, read_objects};
    use crate::schema::{DynamicFieldName, UID};
    use crate::types::string_u64;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Counter {
        id: UID,
        #[serde(with = "string_u64")]
        value: u64,
    }

    #[tokio::test]
    async fn reads_typed_objects() {
        let mut ledger = MockLedger::default();
        ledger.objects.insert(
            id(1),
            object(id(1), "0x1::m::Counter", json!({"id": {"id": id(1)}, "value": "5"})),
        );
        ledger.objects.insert(
            id(2),
            object(id(2), "0x1::m::Counter", json!({"id": {"id": id(2)}, "value": "7"})),
        );

        let one = read_object::<Counter, _>(&ledger, id(1)).await.unwrap();
        assert_eq!(one.fields.value, 5);

        let many = read_objects::<Counter, _>(&ledger, &[id(2), id(1)]).await.unwrap();
        assert_eq!(
            many.iter().map(|o| o.fields.value).collect::<Vec<_>>(),
            vec![7, 5]
        );
        assert!(read_objects::<Counter, _>(&ledger, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn point_lookup_of_dynamic_field() {
        let table = id(100);
        let voter = "0x00000000000000000000000000000000000000000000000000000000000000aa";
        let ledger = MockLedger::default().with_table(
            table,
            vec![(
                field_info(id(101), json!(voter)),
                object(
                    id(101),
                    "0x2::dynamic_field::Field<address, u64>",
                    json!({"id": {"id": id(101)}, "name": "0xaa", "value": "3"}),
                ),
            )],
            10,
        );

        let name = DynamicFieldName::address(voter);
        let found = read_dynamic_field::<String, String, _>(&ledger, table, &name)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.fields.value, "3");

        let missing = DynamicFieldName::address("0xbb");
        assert!(read_dynamic_field::<String, String, _>(&ledger, table, &missing)
            .await
            .unwrap()
            .is_none());
    }
}
