//! Chain keyed maps.
//!
//! Chains are written under their display name, or their id when unnamed, in ascending id order
//! so that saved configurations diff cleanly. Either form is accepted when reading, but a chain
//! may only be configured once.

use alloy::primitives::map::HashMap;
use alloy_chains::Chain;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error};

/// Serializes a chain keyed map, ordered by chain id.
pub fn serialize<S, V>(map: &HashMap<Chain, V>, serializer: S) -> Result<S::Ok, S::Error>
where
    V: Serialize,
    S: Serializer,
{
    let mut entries = map.iter().collect::<Vec<_>>();
    entries.sort_unstable_by_key(|(chain, _)| chain.id());
    serializer.collect_map(entries.into_iter().map(|(chain, v)| (chain.to_string(), v)))
}

/// Deserializes a map keyed by chain names or ids.
pub fn deserialize<'de, V, D>(deserializer: D) -> Result<HashMap<Chain, V>, D::Error>
where
    V: Deserialize<'de>,
    D: Deserializer<'de>,
{
    let raw = HashMap::<String, V>::deserialize(deserializer)?;
    let mut map = HashMap::default();
    for (key, value) in raw {
        let chain = key
            .parse::<Chain>()
            .map_err(|err| D::Error::custom(format!("invalid chain `{key}`: {err}")))?;
        if map.insert(chain, value).is_some() {
            return Err(D::Error::custom(format!("chain {} configured twice", chain.id())));
        }
    }
    Ok(map)
}
