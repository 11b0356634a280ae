//! (De)serializes integers as quantities.
//!
//! Wallets are inconsistent about how they send numbers: JSON numbers, `0x`-prefixed hex strings
//! and decimal strings are all accepted. Values are always serialized as hex strings.

use alloy::primitives::U256;
use serde::{Deserialize, Deserializer, Serializer, de::Error};
use std::{fmt::LowerHex, str::FromStr};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawQuantity {
    Number(u64),
    Text(String),
}

/// Serializes an integer as a hex quantity.
pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: LowerHex,
    S: Serializer,
{
    serializer.serialize_str(&format!("0x{value:x}"))
}

/// Deserializes a quantity from a JSON number or a hex or decimal string.
pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: TryFrom<U256>,
    D: Deserializer<'de>,
{
    let value = match RawQuantity::deserialize(deserializer)? {
        RawQuantity::Number(number) => U256::from(number),
        RawQuantity::Text(text) => U256::from_str(text.trim()).map_err(D::Error::custom)?,
    };
    T::try_from(value).map_err(|_| D::Error::custom(format!("quantity {value} out of range")))
}

#[cfg(test)]
mod tests {
    use alloy::primitives::U256;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "super")]
        value: u8,
    }

    #[test]
    fn accepts_numbers_and_strings() {
        for json in [r#"{"value":1}"#, r#"{"value":"0x1"}"#, r#"{"value":"1"}"#] {
            assert_eq!(serde_json::from_str::<Wrapper>(json).unwrap(), Wrapper { value: 1 });
        }
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(serde_json::from_str::<Wrapper>(r#"{"value":256}"#).is_err());
        assert!(serde_json::from_str::<Wrapper>(r#"{"value":"0xzz"}"#).is_err());
    }

    #[test]
    fn serializes_hex() {
        assert_eq!(serde_json::to_string(&Wrapper { value: 27 }).unwrap(), r#"{"value":"0x1b"}"#);
        assert_eq!(serde_json::to_string(&Wrapper { value: 0 }).unwrap(), r#"{"value":"0x0"}"#);
    }

    #[test]
    fn authorization_fields_round_trip() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Auth {
            #[serde(with = "super")]
            chain_id: U256,
            #[serde(with = "super")]
            nonce: u64,
        }

        let auth = Auth { chain_id: U256::from(11155111), nonce: u64::MAX };
        let json = serde_json::to_string(&auth).unwrap();
        assert_eq!(json, r#"{"chainId":"0xaa36a7","nonce":"0xffffffffffffffff"}"#);
        assert_eq!(serde_json::from_str::<Auth>(&json).unwrap(), auth);
    }
}
