// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Exact protobuf size accounting for aggregated records.
//!
//! Admission into a container has to know what a user record will cost on the
//! wire before the record is committed to the protobuf message. Encoding
//! speculatively and rolling back would leave partially mutated state behind,
//! so the cost is derived from the encoding rules instead:
//!
//! - every length-delimited field costs `1 (tag) + varint(len) + len`
//! - every varint field costs `1 (tag) + varint(value)`
//!
//! All field numbers of the format are below 16, so each tag fits in a single
//! byte.

use crate::errors::AggregationError;
use crate::key_table::KeyTable;

const FIELD_TAG_BYTES: usize = 1;

/// Number of bytes needed to varint-encode `value` (7 value bits per byte).
#[must_use]
pub fn varint_size(value: u64) -> usize {
    let bits_needed = if value == 0 {
        1
    } else {
        (u64::BITS - value.leading_zeros()) as usize
    };
    bits_needed.div_ceil(7)
}

/// [`varint_size`] for signed inputs. A negative size is a caller bug.
pub fn checked_varint_size(value: i64) -> Result<usize, AggregationError> {
    u64::try_from(value)
        .map(varint_size)
        .map_err(|_| AggregationError::NegativeSize(value))
}

/// Cost of a length-delimited field carrying `len` bytes.
#[must_use]
pub fn length_delimited_field_size(len: usize) -> usize {
    FIELD_TAG_BYTES + varint_size(len as u64) + len
}

/// Cost of a varint field carrying `value`.
#[must_use]
pub fn varint_field_size(value: u64) -> usize {
    FIELD_TAG_BYTES + varint_size(value)
}

/// Number of bytes appending this user record would add to the protobuf
/// message, given the current state of both key tables. Nothing is mutated.
#[must_use]
pub fn estimate_added_bytes(
    partition_key: &str,
    explicit_hash_key: Option<&str>,
    data: &[u8],
    partition_keys: &KeyTable,
    explicit_hash_keys: &KeyTable,
) -> usize {
    let mut message_size = 0;

    if !partition_keys.contains(Some(partition_key)) {
        message_size += length_delimited_field_size(partition_key.len());
    }

    if let Some(ehk) = explicit_hash_key {
        if !explicit_hash_keys.contains(Some(ehk)) {
            message_size += length_delimited_field_size(ehk.len());
        }
    }

    let mut inner_record_size = varint_field_size(partition_keys.potential_index(partition_key));
    if let Some(ehk) = explicit_hash_key {
        inner_record_size += varint_field_size(explicit_hash_keys.potential_index(ehk));
    }
    inner_record_size += length_delimited_field_size(data.len());

    message_size + length_delimited_field_size(inner_record_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{AggregatedRecord, Record};
    use prost::Message;

    #[test]
    fn test_varint_size_boundaries() {
        assert_eq!(varint_size(0), 1);
        assert_eq!(varint_size(1), 1);
        assert_eq!(varint_size(127), 1);
        assert_eq!(varint_size(128), 2);
        assert_eq!(varint_size(16_383), 2);
        assert_eq!(varint_size(16_384), 3);
        assert_eq!(varint_size(1_048_576), 3);
        assert_eq!(varint_size(u64::MAX), 10);
    }

    #[test]
    fn test_varint_size_matches_prost() {
        for value in [0, 1, 127, 128, 300, 16_384, 2_097_152, u64::from(u32::MAX), u64::MAX] {
            assert_eq!(
                varint_size(value),
                prost::encoding::encoded_len_varint(value),
                "value {value}"
            );
        }
    }

    #[test]
    fn test_checked_varint_size_rejects_negative() {
        assert_eq!(checked_varint_size(300), Ok(2));
        assert_eq!(
            checked_varint_size(-1),
            Err(AggregationError::NegativeSize(-1))
        );
    }

    #[test]
    fn test_estimate_first_record() {
        let pk = KeyTable::new();
        let ehk = KeyTable::new();
        let estimate = estimate_added_bytes("pk1", Some("12345"), b"x", &pk, &ehk);

        let message = AggregatedRecord {
            partition_key_table: vec!["pk1".to_string()],
            explicit_hash_key_table: vec!["12345".to_string()],
            records: vec![Record {
                partition_key_index: 0,
                explicit_hash_key_index: Some(0),
                data: b"x".to_vec(),
                tags: vec![],
            }],
        };
        assert_eq!(estimate, message.encoded_len());
    }

    #[test]
    fn test_estimate_known_keys_skip_table_cost() {
        let mut pk = KeyTable::new();
        let mut ehk = KeyTable::new();
        pk.add("pk1");
        ehk.add("12345");

        // record field only: tag + len + (pk idx 2 + ehk idx 2 + data 1+1+3)
        let estimate = estimate_added_bytes("pk1", Some("12345"), b"abc", &pk, &ehk);
        assert_eq!(estimate, 1 + 1 + 9);
    }

    #[test]
    fn test_estimate_without_explicit_hash_key() {
        let pk = KeyTable::new();
        let ehk = KeyTable::new();
        let estimate = estimate_added_bytes("k", None, b"", &pk, &ehk);
        // pk table: 1 + 1 + 1, record: 1 + 1 + (2 + 2)
        assert_eq!(estimate, 3 + 6);
    }

    #[test]
    fn test_estimate_counts_utf8_bytes() {
        let pk = KeyTable::new();
        let ehk = KeyTable::new();
        let ascii = estimate_added_bytes("ab", None, b"", &pk, &ehk);
        let multibyte = estimate_added_bytes("\u{e9}\u{e9}", None, b"", &pk, &ehk);
        assert_eq!(multibyte, ascii + 2);
    }

    #[test]
    fn test_estimate_large_data_uses_multi_byte_lengths() {
        let pk = KeyTable::new();
        let ehk = KeyTable::new();
        let data = vec![0u8; 200_000];
        let estimate = estimate_added_bytes("pk", Some("1"), &data, &pk, &ehk);

        let message = AggregatedRecord {
            partition_key_table: vec!["pk".to_string()],
            explicit_hash_key_table: vec!["1".to_string()],
            records: vec![Record {
                partition_key_index: 0,
                explicit_hash_key_index: Some(0),
                data,
                tags: vec![],
            }],
        };
        assert_eq!(estimate, message.encoded_len());
    }
}
