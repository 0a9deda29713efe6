// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batching of a continuous stream of user records into aggregated records.
//!
//! The [`Aggregator`] owns exactly one live container at a time. When a user
//! record no longer fits, the live container is sealed: it is moved out into
//! an [`Arc`], every registered observer is notified on its own executor, a
//! fresh container takes its place and the record is added there.
//!
//! The aggregator is a single-writer value. Producers on several tasks should
//! go through [`crate::aggregator_service::AggregatorService`] instead of
//! sharing it behind a lock.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

use crate::config::AggregatorConfig;
use crate::container::AggregatedContainer;
use crate::errors::AggregationError;
use crate::executor::Executor;

/// Receives every container sealed because it was full.
pub trait RecordObserver: Send + Sync {
    fn on_sealed(&self, record: Arc<AggregatedContainer>);
}

impl<F> RecordObserver for F
where
    F: Fn(Arc<AggregatedContainer>) + Send + Sync,
{
    fn on_sealed(&self, record: Arc<AggregatedContainer>) {
        self(record);
    }
}

struct ObserverExecutorPair {
    observer: Arc<dyn RecordObserver>,
    executor: Arc<dyn Executor>,
}

pub struct Aggregator {
    current: AggregatedContainer,
    observers: Vec<ObserverExecutorPair>,
    config: AggregatorConfig,
}

impl fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aggregator")
            .field("num_user_records", &self.current.num_user_records())
            .field("size_bytes", &self.current.serialized_size_bytes())
            .field("observers", &self.observers.len())
            .field("config", &self.config)
            .finish()
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    /// Aggregator with the 1 MiB Kinesis limit and no default executor.
    #[must_use]
    pub fn new() -> Self {
        let config = AggregatorConfig::default();
        Self {
            current: AggregatedContainer::with_max_bytes(config.max_bytes_per_record),
            observers: Vec::new(),
            config,
        }
    }

    pub fn with_config(config: AggregatorConfig) -> Result<Self, AggregationError> {
        config.validate()?;
        Ok(Self {
            current: AggregatedContainer::with_max_bytes(config.max_bytes_per_record),
            observers: Vec::new(),
            config,
        })
    }

    #[must_use]
    pub fn num_user_records(&self) -> usize {
        self.current.num_user_records()
    }

    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.current.serialized_size_bytes()
    }

    #[must_use]
    pub fn num_observers(&self) -> usize {
        self.observers.len()
    }

    /// Registers `observer` to be notified on `executor` of every sealed
    /// container. Registering the same observer twice notifies it twice.
    pub fn register_observer<O>(&mut self, observer: O, executor: Arc<dyn Executor>)
    where
        O: RecordObserver + 'static,
    {
        self.observers.push(ObserverExecutorPair {
            observer: Arc::new(observer),
            executor,
        });
    }

    /// Registers `observer` on the configured default executor.
    pub fn register_default_observer<O>(&mut self, observer: O) -> Result<(), AggregationError>
    where
        O: RecordObserver + 'static,
    {
        let executor = self.config.default_executor.clone().ok_or_else(|| {
            AggregationError::InvalidConfig(
                "no default executor configured for record-complete observers".to_string(),
            )
        })?;
        self.register_observer(observer, executor);
        Ok(())
    }

    /// Removes all observers. The live container is left alone.
    pub fn clear_observers(&mut self) {
        self.observers.clear();
    }

    /// Discards the live container and everything buffered in it.
    pub fn clear_record(&mut self) {
        self.current = self.new_container();
    }

    /// Hands out the live container, replacing it with an empty one, or
    /// `None` when nothing is buffered. Observers are not notified.
    pub fn clear_and_take(&mut self) -> Option<AggregatedContainer> {
        if self.current.is_empty() {
            return None;
        }
        let fresh = self.new_container();
        let out = std::mem::replace(&mut self.current, fresh);
        debug!(
            "Flushing aggregated record with {} user records ({} bytes)",
            out.num_user_records(),
            out.serialized_size_bytes()
        );
        Some(out)
    }

    /// Adds a user record to the live container.
    ///
    /// Returns `Ok(None)` when the record was absorbed. When the live
    /// container is full it is sealed and returned, observers are notified,
    /// and the record becomes the first one of a fresh container.
    ///
    /// Validation errors leave the aggregator untouched.
    pub fn add_user_record(
        &mut self,
        partition_key: &str,
        explicit_hash_key: Option<&str>,
        data: &[u8],
    ) -> Result<Option<Arc<AggregatedContainer>>, AggregationError> {
        if self
            .current
            .try_add(partition_key, explicit_hash_key, data)?
        {
            return Ok(None);
        }

        let fresh = self.new_container();
        let sealed = Arc::new(std::mem::replace(&mut self.current, fresh));
        debug!(
            "Sealed aggregated record with {} user records ({} bytes), notifying {} observers",
            sealed.num_user_records(),
            sealed.serialized_size_bytes(),
            self.observers.len()
        );
        self.notify_observers(&sealed);

        // An empty container either admits the record or rejects it with
        // `RecordTooLarge`, which `try_add` already ruled out above.
        if !self
            .current
            .try_add(partition_key, explicit_hash_key, data)?
        {
            error!("User record rejected by an empty aggregated record");
            return Err(AggregationError::RecordTooLarge {
                size: data.len(),
                max: self.config.max_bytes_per_record,
            });
        }

        Ok(Some(sealed))
    }

    fn notify_observers(&self, sealed: &Arc<AggregatedContainer>) {
        for pair in &self.observers {
            let observer = Arc::clone(&pair.observer);
            let record = Arc::clone(sealed);
            pair.executor
                .execute(Box::new(move || observer.on_sealed(record)));
        }
    }

    fn new_container(&self) -> AggregatedContainer {
        AggregatedContainer::with_max_bytes(self.config.max_bytes_per_record)
    }
}
