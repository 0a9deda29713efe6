// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Actor wrapper giving many producers serialized access to one [`Aggregator`].
//!
//! ```text
//!    handles (Clone) ──commands──> service task ──owns──> Aggregator
//! ```
//!
//! The service task is the only writer of the aggregator, so no locking is
//! involved. Observers registered on the aggregator before it is handed to
//! the service keep firing on every seal.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::aggregator::Aggregator;
use crate::container::AggregatedContainer;
use crate::errors::AggregationError;

pub type AddUserRecordResponse = Result<Option<Arc<AggregatedContainer>>, AggregationError>;

#[derive(Debug)]
pub enum AggregatorCommand {
    AddUserRecord {
        partition_key: String,
        explicit_hash_key: Option<String>,
        data: Vec<u8>,
        response_tx: oneshot::Sender<AddUserRecordResponse>,
    },
    ClearAndTake(oneshot::Sender<Option<AggregatedContainer>>),
    Stats(oneshot::Sender<AggregatorStats>),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorStats {
    pub num_user_records: usize,
    pub size_bytes: usize,
}

#[derive(Clone, Debug)]
pub struct AggregatorHandle {
    tx: mpsc::UnboundedSender<AggregatorCommand>,
}

impl AggregatorHandle {
    /// Same contract as [`Aggregator::add_user_record`].
    pub async fn add_user_record(
        &self,
        partition_key: impl Into<String>,
        explicit_hash_key: Option<String>,
        data: Vec<u8>,
    ) -> AddUserRecordResponse {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(AggregatorCommand::AddUserRecord {
                partition_key: partition_key.into(),
                explicit_hash_key,
                data,
                response_tx,
            })
            .map_err(|e| {
                AggregationError::ServiceUnavailable(format!(
                    "Failed to send add_user_record command: {e}"
                ))
            })?;

        response_rx.await.map_err(|e| {
            AggregationError::ServiceUnavailable(format!(
                "Failed to receive add_user_record response: {e}"
            ))
        })?
    }

    /// Same contract as [`Aggregator::clear_and_take`].
    pub async fn clear_and_take(&self) -> Result<Option<AggregatedContainer>, AggregationError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(AggregatorCommand::ClearAndTake(response_tx))
            .map_err(|e| {
                AggregationError::ServiceUnavailable(format!(
                    "Failed to send clear_and_take command: {e}"
                ))
            })?;

        response_rx.await.map_err(|e| {
            AggregationError::ServiceUnavailable(format!(
                "Failed to receive clear_and_take response: {e}"
            ))
        })
    }

    pub async fn stats(&self) -> Result<AggregatorStats, AggregationError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(AggregatorCommand::Stats(response_tx))
            .map_err(|e| {
                AggregationError::ServiceUnavailable(format!("Failed to send stats command: {e}"))
            })?;

        response_rx.await.map_err(|e| {
            AggregationError::ServiceUnavailable(format!("Failed to receive stats response: {e}"))
        })
    }

    /// Stops the service. Records still buffered are dropped; call
    /// [`Self::clear_and_take`] first to keep them.
    pub fn shutdown(&self) -> Result<(), mpsc::error::SendError<AggregatorCommand>> {
        self.tx.send(AggregatorCommand::Shutdown)
    }
}

pub struct AggregatorService {
    aggregator: Aggregator,
    rx: mpsc::UnboundedReceiver<AggregatorCommand>,
}

impl AggregatorService {
    #[must_use]
    pub fn new(aggregator: Aggregator) -> (Self, AggregatorHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let service = Self { aggregator, rx };
        let handle = AggregatorHandle { tx };
        (service, handle)
    }

    pub async fn run(mut self) {
        debug!("Aggregator service started");

        while let Some(command) = self.rx.recv().await {
            match command {
                AggregatorCommand::AddUserRecord {
                    partition_key,
                    explicit_hash_key,
                    data,
                    response_tx,
                } => {
                    let result = self.aggregator.add_user_record(
                        &partition_key,
                        explicit_hash_key.as_deref(),
                        &data,
                    );
                    if response_tx.send(result).is_err() {
                        error!("Failed to send add_user_record response - receiver dropped");
                    }
                }

                AggregatorCommand::ClearAndTake(response_tx) => {
                    let container = self.aggregator.clear_and_take();
                    if let Err(Some(container)) = response_tx.send(container) {
                        error!(
                            "Failed to send clear_and_take response - receiver dropped, {} user records lost",
                            container.num_user_records()
                        );
                    }
                }

                AggregatorCommand::Stats(response_tx) => {
                    let stats = AggregatorStats {
                        num_user_records: self.aggregator.num_user_records(),
                        size_bytes: self.aggregator.size_bytes(),
                    };
                    if response_tx.send(stats).is_err() {
                        error!("Failed to send stats response - receiver dropped");
                    }
                }

                AggregatorCommand::Shutdown => {
                    debug!("Aggregator service shutting down");
                    break;
                }
            }
        }

        debug!("Aggregator service stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AggregatorConfig;

    #[tokio::test]
    async fn test_aggregator_service_basic_flow() {
        let (service, handle) = AggregatorService::new(Aggregator::new());
        let service_task = tokio::spawn(service.run());

        let sealed = handle
            .add_user_record("pk1", Some("12345".to_string()), b"x".to_vec())
            .await
            .expect("Failed to add user record");
        assert!(sealed.is_none());

        let stats = handle.stats().await.expect("Failed to get stats");
        assert_eq!(stats.num_user_records, 1);
        assert!(stats.size_bytes > 0);

        let container = handle
            .clear_and_take()
            .await
            .expect("Failed to clear")
            .expect("container should not be empty");
        assert_eq!(container.overarching_partition_key(), Ok("pk1"));

        assert!(handle.clear_and_take().await.unwrap().is_none());

        handle.shutdown().expect("Failed to shutdown");
        service_task.await.expect("Service task failed");
    }

    #[tokio::test]
    async fn test_aggregator_service_returns_sealed_records() {
        let aggregator = Aggregator::with_config(
            AggregatorConfig::default().with_max_bytes_per_record(128),
        )
        .unwrap();
        let (service, handle) = AggregatorService::new(aggregator);
        let service_task = tokio::spawn(service.run());

        let first = handle
            .add_user_record("pk", Some("1".to_string()), vec![1; 60])
            .await
            .unwrap();
        assert!(first.is_none());
        let second = handle
            .add_user_record("pk", Some("1".to_string()), vec![2; 60])
            .await
            .unwrap();
        assert_eq!(second.map(|c| c.num_user_records()), Some(1));

        handle.shutdown().expect("Failed to shutdown");
        service_task.await.expect("Service task failed");
    }

    #[tokio::test]
    async fn test_aggregator_service_propagates_validation_errors() {
        let (service, handle) = AggregatorService::new(Aggregator::new());
        let service_task = tokio::spawn(service.run());

        let result = handle.add_user_record("", None, b"x".to_vec()).await;
        assert!(matches!(
            result,
            Err(AggregationError::InvalidPartitionKey(_))
        ));

        handle.shutdown().expect("Failed to shutdown");
        service_task.await.expect("Service task failed");
    }

    #[tokio::test]
    async fn test_handle_after_shutdown() {
        let (service, handle) = AggregatorService::new(Aggregator::new());
        let service_task = tokio::spawn(service.run());
        handle.shutdown().expect("Failed to shutdown");
        service_task.await.expect("Service task failed");

        assert!(matches!(
            handle.stats().await,
            Err(AggregationError::ServiceUnavailable(_))
        ));
    }
}
