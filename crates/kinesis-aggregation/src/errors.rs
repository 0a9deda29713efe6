// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors raised while building aggregated records
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregationError {
    #[error("Invalid partition key: {0}")]
    InvalidPartitionKey(String),

    #[error("Invalid explicit hash key: {0}")]
    InvalidExplicitHashKey(String),

    #[error("Data must be less than or equal to {max} bytes in size, got {size} bytes")]
    DataTooLarge { size: usize, max: usize },

    #[error("User record needs {size} bytes once aggregated, more than the {max} byte limit")]
    RecordTooLarge { size: usize, max: usize },

    #[error("Cannot compute {0} for empty container")]
    EmptyContainer(&'static str),

    #[error("Size values should not be negative, got {0}")]
    NegativeSize(i64),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Aggregator service unavailable: {0}")]
    ServiceUnavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = AggregationError::DataTooLarge {
            size: 2_000_000,
            max: 1_048_576,
        };
        assert_eq!(
            error.to_string(),
            "Data must be less than or equal to 1048576 bytes in size, got 2000000 bytes"
        );

        let error = AggregationError::EmptyContainer("partition key");
        assert_eq!(
            error.to_string(),
            "Cannot compute partition key for empty container"
        );
    }

    #[test]
    fn test_error_debug() {
        let error = AggregationError::NegativeSize(-1);
        let debug_str = format!("{:?}", error);
        assert!(debug_str.contains("NegativeSize"));
    }
}
