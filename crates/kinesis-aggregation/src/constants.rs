// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Magic prefix identifying a KPL aggregated record.
pub const KPL_AGGREGATED_RECORD_MAGIC: [u8; 4] = [0xF3, 0x89, 0x9A, 0xC2];

/// Width of the MD5 digest appended to every aggregated record.
pub const KPL_DIGEST_SIZE: usize = 16;

/// Fixed bytes wrapped around the protobuf message: magic prefix plus digest.
pub const FRAMING_OVERHEAD_BYTES: usize = KPL_AGGREGATED_RECORD_MAGIC.len() + KPL_DIGEST_SIZE;

/// Kinesis `PutRecord` payload limit (1 MiB).
pub const MAX_BYTES_PER_RECORD: usize = 1024 * 1024;

pub const PARTITION_KEY_MIN_LENGTH: usize = 1;
pub const PARTITION_KEY_MAX_LENGTH: usize = 256;

/// Partition key reported by containers holding more than one user record.
///
/// Such containers always carry an explicit hash key, which takes precedence
/// for shard routing, so the partition key only needs to be a valid one-byte
/// placeholder.
pub const AGGREGATED_PARTITION_KEY_SENTINEL: &str = "a";
