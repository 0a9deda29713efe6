// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use crate::constants::{FRAMING_OVERHEAD_BYTES, MAX_BYTES_PER_RECORD};
use crate::errors::AggregationError;
use crate::executor::Executor;

/// Configuration for an [`crate::Aggregator`]
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Serialized size, framing included, a container may not exceed.
    /// Never above the 1 MiB Kinesis record limit.
    pub max_bytes_per_record: usize,
    /// Execution context for observers registered without one
    pub default_executor: Option<Arc<dyn Executor>>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_bytes_per_record: MAX_BYTES_PER_RECORD,
            default_executor: None,
        }
    }
}

impl AggregatorConfig {
    #[must_use]
    pub fn with_default_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.default_executor = Some(executor);
        self
    }

    #[must_use]
    pub fn with_max_bytes_per_record(mut self, max_bytes_per_record: usize) -> Self {
        self.max_bytes_per_record = max_bytes_per_record;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), AggregationError> {
        if self.max_bytes_per_record > MAX_BYTES_PER_RECORD {
            return Err(AggregationError::InvalidConfig(format!(
                "max_bytes_per_record must be at most {MAX_BYTES_PER_RECORD}, got {}",
                self.max_bytes_per_record
            )));
        }

        if self.max_bytes_per_record <= FRAMING_OVERHEAD_BYTES {
            return Err(AggregationError::InvalidConfig(format!(
                "max_bytes_per_record must be greater than the {FRAMING_OVERHEAD_BYTES} byte framing overhead, got {}",
                self.max_bytes_per_record
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ThreadExecutor;

    #[test]
    fn test_default_config_is_valid() {
        let config = AggregatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_bytes_per_record, MAX_BYTES_PER_RECORD);
        assert!(config.default_executor.is_none());
    }

    #[test]
    fn test_validate_ceiling_above_protocol_limit() {
        let config = AggregatorConfig::default().with_max_bytes_per_record(MAX_BYTES_PER_RECORD + 1);
        assert!(matches!(
            config.validate(),
            Err(AggregationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_ceiling_below_framing() {
        let config = AggregatorConfig::default().with_max_bytes_per_record(FRAMING_OVERHEAD_BYTES);
        assert!(config.validate().is_err());

        let config =
            AggregatorConfig::default().with_max_bytes_per_record(FRAMING_OVERHEAD_BYTES + 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_with_default_executor() {
        let config = AggregatorConfig::default().with_default_executor(Arc::new(ThreadExecutor::new()));
        assert!(config.default_executor.is_some());
    }
}
