// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Aggregation of many small user records into Kinesis aggregated records.
//!
//! Callers feed `(partition key, explicit hash key, data)` tuples into an
//! [`aggregator::Aggregator`]. Records are packed into an
//! [`container::AggregatedContainer`] until the next record would push the
//! serialized container past the 1 MiB Kinesis record ceiling, at which point
//! the container is sealed, handed to registered observers and returned to the
//! caller, ready to be shipped as a single `PutRecord`/`PutRecords` entry.
//!
//! Sealed container layout:
//!
//! ```text
//! [magic: F3 89 9A C2][protobuf AggregatedRecord][md5(protobuf bytes)]
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod aggregator;
pub mod aggregator_service;
pub mod config;
pub mod constants;
pub mod container;
pub mod errors;
pub mod executor;
pub mod key_table;
pub mod proto;
pub mod put_record;
pub mod size;

pub use aggregator::{Aggregator, RecordObserver};
pub use config::AggregatorConfig;
pub use container::AggregatedContainer;
pub use errors::AggregationError;
