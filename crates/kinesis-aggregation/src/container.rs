// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! A single KPL aggregated record under construction.
//!
//! The container keeps a running count of the protobuf message size that is
//! updated on every successful insertion, so [`AggregatedContainer::serialized_size_bytes`]
//! never has to encode the message. The count always equals the length of the
//! encoded message; only the fixed framing (magic prefix and digest) is added
//! on top.

use md5::{Digest, Md5};
use prost::Message;

use crate::constants::{
    AGGREGATED_PARTITION_KEY_SENTINEL, FRAMING_OVERHEAD_BYTES, KPL_AGGREGATED_RECORD_MAGIC,
    KPL_DIGEST_SIZE, MAX_BYTES_PER_RECORD, PARTITION_KEY_MAX_LENGTH, PARTITION_KEY_MIN_LENGTH,
};
use crate::errors::AggregationError;
use crate::key_table::KeyTable;
use crate::proto::{AggregatedRecord, Record};
use crate::put_record::PutRecordsEntry;
use crate::size;

/// A user record as stored in a container, with its keys resolved through
/// the key tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserRecord<'a> {
    pub partition_key: &'a str,
    pub explicit_hash_key: Option<&'a str>,
    pub data: &'a [u8],
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedContainer {
    message: AggregatedRecord,
    partition_keys: KeyTable,
    explicit_hash_keys: KeyTable,
    /// Encoded length of `message`, excluding framing.
    message_size_bytes: usize,
    max_bytes_per_record: usize,
    agg_partition_key: String,
    agg_explicit_hash_key: String,
}

impl Default for AggregatedContainer {
    fn default() -> Self {
        Self::with_max_bytes(MAX_BYTES_PER_RECORD)
    }
}

impl AggregatedContainer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Container admitting records until its serialized size would exceed
    /// `max_bytes_per_record`. Callers go through [`crate::AggregatorConfig`]
    /// so the limit is validated against the protocol ceiling.
    pub(crate) fn with_max_bytes(max_bytes_per_record: usize) -> Self {
        Self {
            message: AggregatedRecord::default(),
            partition_keys: KeyTable::new(),
            explicit_hash_keys: KeyTable::new(),
            message_size_bytes: 0,
            max_bytes_per_record,
            agg_partition_key: String::new(),
            agg_explicit_hash_key: String::new(),
        }
    }

    #[must_use]
    pub fn num_user_records(&self) -> usize {
        self.message.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.message.records.is_empty()
    }

    #[must_use]
    pub fn max_bytes_per_record(&self) -> usize {
        self.max_bytes_per_record
    }

    /// Exact length of [`Self::to_bytes`], `0` for an empty container.
    #[must_use]
    pub fn serialized_size_bytes(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        FRAMING_OVERHEAD_BYTES + self.message_size_bytes
    }

    /// Attempts to append a user record.
    ///
    /// Returns `Ok(false)` without touching the container when the record
    /// would push the serialized size past the limit. Invalid input is
    /// rejected with an error, also without touching the container.
    ///
    /// When `explicit_hash_key` is `None` one is derived from the partition
    /// key (see [`create_explicit_hash_key`]).
    pub fn try_add(
        &mut self,
        partition_key: &str,
        explicit_hash_key: Option<&str>,
        data: &[u8],
    ) -> Result<bool, AggregationError> {
        validate_data(data, self.max_bytes_per_record)?;

        let partition_key = partition_key.trim();
        validate_partition_key(partition_key)?;

        let explicit_hash_key = match explicit_hash_key {
            Some(ehk) => {
                let ehk = ehk.trim();
                validate_explicit_hash_key(ehk)?;
                ehk.to_string()
            }
            None => create_explicit_hash_key(partition_key),
        };

        let size_of_new_record = size::estimate_added_bytes(
            partition_key,
            Some(explicit_hash_key.as_str()),
            data,
            &self.partition_keys,
            &self.explicit_hash_keys,
        );

        if FRAMING_OVERHEAD_BYTES + self.message_size_bytes + size_of_new_record
            > self.max_bytes_per_record
        {
            // A record that would not fit an empty container either must not
            // cause a seal: it would be rejected again by the fresh one.
            let standalone_size = if self.is_empty() {
                size_of_new_record
            } else {
                size::estimate_added_bytes(
                    partition_key,
                    Some(explicit_hash_key.as_str()),
                    data,
                    &KeyTable::new(),
                    &KeyTable::new(),
                )
            };
            if FRAMING_OVERHEAD_BYTES + standalone_size > self.max_bytes_per_record {
                return Err(AggregationError::RecordTooLarge {
                    size: FRAMING_OVERHEAD_BYTES + standalone_size,
                    max: self.max_bytes_per_record,
                });
            }
            return Ok(false);
        }

        let pk_insertion = self.partition_keys.add(partition_key);
        if pk_insertion.is_new {
            self.message
                .partition_key_table
                .push(partition_key.to_string());
        }

        let ehk_insertion = self.explicit_hash_keys.add(&explicit_hash_key);
        if ehk_insertion.is_new {
            self.message
                .explicit_hash_key_table
                .push(explicit_hash_key.clone());
        }

        self.message.records.push(Record {
            partition_key_index: pk_insertion.index,
            explicit_hash_key_index: Some(ehk_insertion.index),
            data: data.to_vec(),
            tags: Vec::new(),
        });
        self.message_size_bytes += size_of_new_record;

        if self.message.records.len() == 1 {
            self.agg_partition_key = partition_key.to_string();
            self.agg_explicit_hash_key = explicit_hash_key;
        }

        Ok(true)
    }

    /// Serializes the container as `magic || protobuf || md5(protobuf)`.
    /// An empty container serializes to no bytes at all.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        if self.is_empty() {
            return Vec::new();
        }

        let message_body = self.message.encode_to_vec();
        debug_assert_eq!(message_body.len(), self.message_size_bytes);
        let digest = Md5::digest(&message_body);

        let mut out = Vec::with_capacity(
            KPL_AGGREGATED_RECORD_MAGIC.len() + message_body.len() + KPL_DIGEST_SIZE,
        );
        out.extend_from_slice(&KPL_AGGREGATED_RECORD_MAGIC);
        out.extend_from_slice(&message_body);
        out.extend_from_slice(&digest);
        out
    }

    /// Partition key for the container as a whole.
    ///
    /// A single-record container reports that record's key. Larger containers
    /// report a one-byte placeholder: they always carry an explicit hash key,
    /// which the service routes on instead.
    pub fn overarching_partition_key(&self) -> Result<&str, AggregationError> {
        match self.num_user_records() {
            0 => Err(AggregationError::EmptyContainer("partition key")),
            1 => Ok(&self.agg_partition_key),
            _ => Ok(AGGREGATED_PARTITION_KEY_SENTINEL),
        }
    }

    /// Explicit hash key of the first user record.
    pub fn overarching_explicit_hash_key(&self) -> Result<&str, AggregationError> {
        if self.is_empty() {
            return Err(AggregationError::EmptyContainer("explicit hash key"));
        }
        Ok(&self.agg_explicit_hash_key)
    }

    /// Entry for the service's `PutRecords` call carrying this container.
    pub fn to_put_record_entry(&self) -> Result<PutRecordsEntry, AggregationError> {
        PutRecordsEntry::try_from(self)
    }

    /// User records in insertion order.
    pub fn user_records(&self) -> impl Iterator<Item = UserRecord<'_>> + '_ {
        self.message.records.iter().map(|record| UserRecord {
            partition_key: self
                .partition_keys
                .get(record.partition_key_index)
                .unwrap_or_default(),
            explicit_hash_key: record
                .explicit_hash_key_index
                .and_then(|index| self.explicit_hash_keys.get(index)),
            data: &record.data,
        })
    }

    #[must_use]
    pub fn partition_keys(&self) -> &KeyTable {
        &self.partition_keys
    }

    #[must_use]
    pub fn explicit_hash_keys(&self) -> &KeyTable {
        &self.explicit_hash_keys
    }

    /// Drops every record, returning the container to its empty state.
    pub fn clear(&mut self) {
        *self = Self::with_max_bytes(self.max_bytes_per_record);
    }
}

/// Derives an explicit hash key from a partition key the way the service
/// does: the MD5 digest of the UTF-8 key, read as a big-endian 128-bit
/// unsigned integer and rendered in decimal.
#[must_use]
pub fn create_explicit_hash_key(partition_key: &str) -> String {
    let digest = Md5::digest(partition_key.as_bytes());
    let mut hash_key = [0u8; KPL_DIGEST_SIZE];
    hash_key.copy_from_slice(&digest);
    u128::from_be_bytes(hash_key).to_string()
}

fn validate_data(data: &[u8], max_bytes_per_record: usize) -> Result<(), AggregationError> {
    if data.len() > max_bytes_per_record {
        return Err(AggregationError::DataTooLarge {
            size: data.len(),
            max: max_bytes_per_record,
        });
    }
    Ok(())
}

fn validate_partition_key(partition_key: &str) -> Result<(), AggregationError> {
    let length = partition_key.chars().count();
    if !(PARTITION_KEY_MIN_LENGTH..=PARTITION_KEY_MAX_LENGTH).contains(&length) {
        return Err(AggregationError::InvalidPartitionKey(format!(
            "length must be at least {PARTITION_KEY_MIN_LENGTH} and at most {PARTITION_KEY_MAX_LENGTH}, got {length}"
        )));
    }
    Ok(())
}

fn validate_explicit_hash_key(explicit_hash_key: &str) -> Result<(), AggregationError> {
    if explicit_hash_key.parse::<u128>().is_ok() {
        return Ok(());
    }

    let digits = explicit_hash_key
        .strip_prefix(['-', '+'])
        .unwrap_or(explicit_hash_key);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AggregationError::InvalidExplicitHashKey(format!(
            "must be greater or equal to zero and less than or equal to (2^128 - 1), got {explicit_hash_key}"
        )));
    }
    Err(AggregationError::InvalidExplicitHashKey(format!(
        "must be an integer, got {explicit_hash_key}"
    )))
}
