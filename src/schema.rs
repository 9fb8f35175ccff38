//! Typed views over ledger object content.
//!
//! Objects come back from the RPC as JSON with Move struct fields nested under
//! `content.fields`. Every shape the crate reads is described by a struct here
//! and validated when the object is fetched, so nothing downstream touches
//! untyped JSON.

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use itertools::Itertools;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{string_u64, ObjectId};

/// Response of `sui_getObject` / `sui_multiGetObjects`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ObjectResponse {
    #[serde(default)]
    pub data: Option<ObjectData>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectData {
    pub object_id: ObjectId,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub digest: Option<String>,
    #[serde(default, rename = "type")]
    pub object_type: Option<String>,
    #[serde(default)]
    pub content: Option<ParsedContent>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedContent {
    pub data_type: String,
    #[serde(default, rename = "type")]
    pub object_type: Option<String>,
    #[serde(default)]
    pub has_public_transfer: bool,
    #[serde(default)]
    pub fields: serde_json::Value,
}

/// A decoded Move object: its id, full type and typed fields.
#[derive(Clone, Debug, PartialEq)]
pub struct MoveObject<T> {
    pub object_id: ObjectId,
    pub object_type: String,
    pub fields: T,
}

impl<T> MoveObject<T> {
    pub fn struct_tag(&self) -> Result<StructTag> {
        StructTag::from_str(&self.object_type).map_err(Error::from)
    }
}

impl ObjectResponse {
    pub fn object_id(&self) -> Option<ObjectId> {
        self.data.as_ref().map(|data| data.object_id)
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<MoveObject<T>> {
        let data = match (&self.data, &self.error) {
            (Some(data), _) => data,
            (None, Some(error)) => return Err(anyhow!("object is not available: {}", error).into()),
            (None, None) => {
                return Err(anyhow!("object response has neither data nor error").into())
            }
        };
        let content = data
            .content
            .as_ref()
            .ok_or_else(|| anyhow!("object {} was fetched without content", data.object_id))?;
        if content.data_type != "moveObject" {
            return Err(anyhow!(
                "object {} is a {}, not a move object",
                data.object_id,
                content.data_type
            )
            .into());
        }
        let object_type = content
            .object_type
            .clone()
            .or_else(|| data.object_type.clone())
            .unwrap_or_default();
        let fields = serde_json::from_value(content.fields.clone()).map_err(|err| {
            Error::decode(
                format!("fields of {} ({})", data.object_id, object_type),
                err,
            )
        })?;

        Ok(MoveObject {
            object_id: data.object_id,
            object_type,
            fields,
        })
    }
}

/// A struct nested inside another object's fields: `{"type": .., "fields": ..}`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct MoveStruct<T> {
    #[serde(rename = "type")]
    pub struct_type: String,
    pub fields: T,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[allow(clippy::upper_case_acronyms)]
pub struct UID {
    pub id: ObjectId,
}

/// `0x2::table::Table` / `0x2::table_vec::TableVec` handle: entries live as
/// dynamic fields under `id`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Table {
    pub id: UID,
    #[serde(with = "string_u64")]
    pub size: u64,
}

pub type TableField = MoveStruct<Table>;

impl MoveStruct<Table> {
    pub fn table_id(&self) -> ObjectId {
        self.fields.id.id
    }
}

/// Content of a `0x2::dynamic_field::Field<N, V>` object.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct DynamicField<N, V> {
    pub id: UID,
    pub name: N,
    pub value: V,
}

/// Entry of a `suix_getDynamicFields` page.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicFieldInfo {
    pub name: DynamicFieldName,
    pub object_id: ObjectId,
    #[serde(default)]
    pub object_type: Option<String>,
    #[serde(default, rename = "type")]
    pub field_type: Option<String>,
    #[serde(default)]
    pub version: Option<serde_json::Value>,
    #[serde(default)]
    pub digest: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct DynamicFieldName {
    #[serde(rename = "type")]
    pub name_type: String,
    pub value: serde_json::Value,
}

impl DynamicFieldName {
    pub fn new(name_type: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            name_type: name_type.into(),
            value: value.into(),
        }
    }

    pub fn address(value: impl fmt::Display) -> Self {
        Self::new("address", value.to_string())
    }

    pub fn object_id(value: ObjectId) -> Self {
        Self::new("0x2::object::ID", value.to_string())
    }
}

/// Parsed `address::module::Name<T1, T2, ..>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructTag {
    pub address: ObjectId,
    pub module: String,
    pub name: String,
    pub type_params: Vec<String>,
}

impl FromStr for StructTag {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let (head, params) = match s.find('<') {
            Some(open) => {
                let inner = s[open + 1..]
                    .strip_suffix('>')
                    .ok_or_else(|| anyhow!("unbalanced type parameters in {:?}", s))?;
                (&s[..open], split_type_params(inner)?)
            }
            None => (s, vec![]),
        };

        let parts: Vec<&str> = head.split("::").collect();
        let (address, module, name) = match parts.as_slice() {
            [address, module, name] if !module.is_empty() && !name.is_empty() => {
                (ObjectId::from_str(address)?, *module, *name)
            }
            _ => return Err(anyhow!("can't parse struct tag {:?}", s)),
        };

        Ok(StructTag {
            address,
            module: module.to_string(),
            name: name.to_string(),
            type_params: params,
        })
    }
}

fn split_type_params(inner: &str) -> anyhow::Result<Vec<String>> {
    let mut params = vec![];
    let mut depth = 0usize;
    let mut start = 0;
    for (index, c) in inner.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| anyhow!("unbalanced type parameters in {:?}", inner))?
            }
            ',' if depth == 0 => {
                params.push(inner[start..index].trim().to_string());
                start = index + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(anyhow!("unbalanced type parameters in {:?}", inner));
    }
    params.push(inner[start..].trim().to_string());
    if params.iter().any(|param| param.is_empty()) {
        return Err(anyhow!("empty type parameter in {:?}", inner));
    }
    Ok(params)
}

impl fmt::Display for StructTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.address, self.module, self.name)?;
        if !self.type_params.is_empty() {
            write!(f, "<{}>", self.type_params.iter().join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::schema::{DynamicField, ObjectResponse, StructTag, TableField};
    use crate::types::{string_u64, ObjectId};
    use serde::Deserialize;
    use std::str::FromStr;

    #[test]
    fn struct_tag_with_two_params() {
        let tag = StructTag::from_str(
            "0x31777bfdc652e67e8ea37856c75ede5229d88085::movernance::TokenGovSpace<0x2::sui::SUI, 0x2::sui::SUI>",
        )
        .unwrap();
        assert_eq!(tag.module, "movernance");
        assert_eq!(tag.name, "TokenGovSpace");
        assert_eq!(tag.type_params, vec!["0x2::sui::SUI", "0x2::sui::SUI"]);
    }

    #[test]
    fn struct_tag_with_nested_params() {
        let tag = StructTag::from_str(
            "0x2::dynamic_field::Field<u64, 0x2::coin::Coin<0x2::sui::SUI>>",
        )
        .unwrap();
        assert_eq!(tag.type_params, vec!["u64", "0x2::coin::Coin<0x2::sui::SUI>"]);
        assert_eq!(
            StructTag::from_str(&tag.to_string()).unwrap(),
            tag,
            "display output parses back"
        );
    }

    #[test]
    fn struct_tag_errors() {
        assert!(StructTag::from_str("0x2::sui").is_err());
        assert!(StructTag::from_str("0x2::coin::Coin<0x2::sui::SUI").is_err());
        assert!(StructTag::from_str("0x2::coin::Coin<>").is_err());
        assert!(StructTag::from_str("0x2::table::Table<u64,>").is_err());
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Store {
        spaces: TableField,
    }

    #[test]
    fn decode_nested_table() {
        let response: ObjectResponse = serde_json::from_str(
            r#"{"data": {
                "objectId": "0x56",
                "version": "3",
                "digest": "abc",
                "content": {
                    "dataType": "moveObject",
                    "type": "0x4e::movernance::SpaceStore",
                    "hasPublicTransfer": false,
                    "fields": {
                        "id": {"id": "0x56"},
                        "spaces": {
                            "type": "0x2::table::Table<u64, 0x2::object::ID>",
                            "fields": {"id": {"id": "0x99"}, "size": "2"}
                        }
                    }
                }
            }}"#,
        )
        .unwrap();
        let store = response.decode::<Store>().unwrap();
        assert_eq!(store.object_type, "0x4e::movernance::SpaceStore");
        assert_eq!(store.fields.spaces.table_id(), ObjectId::from_str("0x99").unwrap());
        assert_eq!(store.fields.spaces.fields.size, 2);
        assert_eq!(store.struct_tag().unwrap().name, "SpaceStore");
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Amount(#[serde(with = "string_u64")] u64);

    #[test]
    fn decode_dynamic_field() {
        let response: ObjectResponse = serde_json::from_str(
            r#"{"data": {
                "objectId": "0x77",
                "content": {
                    "dataType": "moveObject",
                    "type": "0x2::dynamic_field::Field<address, u64>",
                    "fields": {"id": {"id": "0x77"}, "name": "0xabc", "value": "42"}
                }
            }}"#,
        )
        .unwrap();
        let field = response.decode::<DynamicField<ObjectId, Amount>>().unwrap();
        assert_eq!(field.fields.name, ObjectId::from_str("0xabc").unwrap());
        assert_eq!(field.fields.value, Amount(42));
    }

    #[test]
    fn decode_reports_schema_mismatch() {
        let response: ObjectResponse = serde_json::from_str(
            r#"{"data": {
                "objectId": "0x77",
                "content": {"dataType": "moveObject", "type": "0x1::m::T", "fields": {"other": 1}}
            }}"#,
        )
        .unwrap();
        let result = response.decode::<DynamicField<ObjectId, Amount>>();
        assert!(matches!(result, Err(Error::Decode { .. })));
    }

    #[test]
    fn decode_missing_object() {
        let response: ObjectResponse = serde_json::from_str(
            r#"{"error": {"code": "notExists", "object_id": "0x1"}}"#,
        )
        .unwrap();
        assert!(matches!(
            response.decode::<serde_json::Value>(),
            Err(Error::Upstream(_))
        ));
        assert!(response.object_id().is_none());
    }

    #[test]
    fn decode_package_is_rejected() {
        let response: ObjectResponse = serde_json::from_str(
            r#"{"data": {"objectId": "0x5", "content": {"dataType": "package"}}}"#,
        )
        .unwrap();
        assert!(response.decode::<serde_json::Value>().is_err());
    }
}
