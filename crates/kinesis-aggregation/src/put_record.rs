// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mapping of a sealed container onto a Kinesis `PutRecords` request entry.
//!
//! Only the shape of the entry lives here; shipping it is up to the caller.

use serde::{Deserialize, Serialize};

use crate::container::AggregatedContainer;
use crate::errors::AggregationError;

/// One entry of the `Records` array of a `PutRecords` request. The JSON form
/// matches the service API, with `Data` base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutRecordsEntry {
    #[serde(with = "serde_base64")]
    pub data: Vec<u8>,
    pub explicit_hash_key: String,
    pub partition_key: String,
}

impl TryFrom<&AggregatedContainer> for PutRecordsEntry {
    type Error = AggregationError;

    fn try_from(container: &AggregatedContainer) -> Result<Self, Self::Error> {
        Ok(Self {
            partition_key: container.overarching_partition_key()?.to_string(),
            explicit_hash_key: container.overarching_explicit_hash_key()?.to_string(),
            data: container.to_bytes(),
        })
    }
}

mod serde_base64 {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let encoded = base64::engine::general_purpose::STANDARD.encode(value);
        serializer.serialize_str(&encoded)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(s.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    #[test]
    fn test_entry_from_empty_container_fails() {
        let container = AggregatedContainer::new();
        assert_eq!(
            container.to_put_record_entry(),
            Err(AggregationError::EmptyContainer("partition key"))
        );
    }

    #[test]
    fn test_entry_carries_container_keys_and_bytes() {
        let mut container = AggregatedContainer::new();
        container.try_add("pk1", Some("12345"), b"x").unwrap();

        let entry = container.to_put_record_entry().unwrap();
        assert_eq!(entry.partition_key, "pk1");
        assert_eq!(entry.explicit_hash_key, "12345");
        assert_eq!(entry.data, container.to_bytes());
    }

    #[test]
    fn test_entry_json_shape() {
        let mut container = AggregatedContainer::new();
        container.try_add("pk1", Some("1"), b"x").unwrap();
        container.try_add("pk2", Some("2"), b"y").unwrap();

        let entry = container.to_put_record_entry().unwrap();
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["PartitionKey"], "a");
        assert_eq!(json["ExplicitHashKey"], "1");
        let data = base64::engine::general_purpose::STANDARD
            .decode(json["Data"].as_str().unwrap())
            .unwrap();
        assert_eq!(data, container.to_bytes());

        let parsed: PutRecordsEntry = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, entry);
    }
}
