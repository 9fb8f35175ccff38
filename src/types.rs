use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::schema::StructTag;

pub const ID_LENGTH: usize = 32;

/// 32-byte ledger identifier rendered as `0x` followed by 64 hex digits.
///
/// Parsing accepts short forms (`0x6`, `2`) and left-pads them with zeros,
/// so ids coming from type strings and from RPC responses compare equal.
macro_rules! hex_id {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; ID_LENGTH]);

        impl $name {
            pub const fn new(bytes: [u8; ID_LENGTH]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; ID_LENGTH] {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let digits = s.strip_prefix("0x").unwrap_or(s);
                if digits.is_empty() || digits.len() > ID_LENGTH * 2 {
                    return Err(anyhow!("can't parse {}: {:?}", stringify!($name), s));
                }
                let padded = format!("{:0>width$}", digits, width = ID_LENGTH * 2);
                let decoded = hex::decode(&padded)
                    .map_err(|err| anyhow!("can't parse {} {:?}: {}", stringify!($name), s, err))?;
                let mut bytes = [0u8; ID_LENGTH];
                bytes.copy_from_slice(&decoded);
                Ok(Self(bytes))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_str(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_id!(ObjectId);
hex_id!(SuiAddress);

/// Fully qualified coin type, e.g. `0x2::sui::SUI`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoinType(String);

impl CoinType {
    pub const NATIVE: &'static str = "0x2::sui::SUI";

    pub fn new(coin_type: impl Into<String>) -> Self {
        Self(coin_type.into())
    }

    pub fn native() -> Self {
        Self::new(Self::NATIVE)
    }

    /// True for the gas coin regardless of how its package address is spelled.
    pub fn is_native(&self) -> bool {
        match StructTag::from_str(&self.0) {
            Ok(tag) => {
                tag.address == ObjectId::new(native_package())
                    && tag.module == "sui"
                    && tag.name == "SUI"
                    && tag.type_params.is_empty()
            }
            Err(_) => false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

const fn native_package() -> [u8; ID_LENGTH] {
    let mut bytes = [0u8; ID_LENGTH];
    bytes[ID_LENGTH - 1] = 2;
    bytes
}

/// One owned coin object as returned by `suix_getCoins`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coin {
    #[serde(rename = "coinObjectId")]
    pub id: ObjectId,
    #[serde(with = "string_u64")]
    pub balance: u64,
    #[serde(default)]
    pub coin_type: Option<CoinType>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub digest: Option<String>,
}

impl Coin {
    pub fn new(id: ObjectId, balance: u64) -> Self {
        Self {
            id,
            balance,
            coin_type: None,
            version: None,
            digest: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageCursor(pub String);

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One batch of a cursor-paged collection.
///
/// `next_cursor` feeds the following request; `has_next_page == false` is the
/// only terminal signal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub next_cursor: Option<PageCursor>,
    pub has_next_page: bool,
}

impl<T> Page<T> {
    pub fn last(data: Vec<T>) -> Self {
        Self {
            data,
            next_cursor: None,
            has_next_page: false,
        }
    }

    pub fn with_next(data: Vec<T>, cursor: impl Into<String>) -> Self {
        Self {
            data,
            next_cursor: Some(PageCursor(cursor.into())),
            has_next_page: true,
        }
    }
}

/// Ledger JSON encodes `u64` values as decimal strings.
pub mod string_u64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum StringOrNumber {
            String(String),
            Number(u64),
        }

        match StringOrNumber::deserialize(deserializer)? {
            StringOrNumber::String(s) => s.parse().map_err(serde::de::Error::custom),
            StringOrNumber::Number(n) => Ok(n),
        }
    }
}
