// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Execution contexts for record-complete notifications.
//!
//! Every observer registered on an [`crate::Aggregator`] is paired with an
//! [`Executor`]. Sealing a container submits one task per observer; the
//! aggregator never waits for those tasks.

use std::fmt::Debug;
use tokio::runtime::Handle;
use tracing::error;

use crate::errors::AggregationError;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub trait Executor: Send + Sync + Debug {
    /// Schedules `task` to run independently of the caller.
    fn execute(&self, task: Task);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpawnMode {
    Async,
    Blocking,
}

/// Runs notifications on a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: Handle,
    mode: SpawnMode,
}

impl TokioExecutor {
    /// Spawns each notification as a regular task. Suited to listeners that
    /// only hand the container off (channel send, counter update).
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            mode: SpawnMode::Async,
        }
    }

    /// Runs each notification on the runtime's blocking pool, for listeners
    /// that do synchronous I/O.
    #[must_use]
    pub fn blocking(handle: Handle) -> Self {
        Self {
            handle,
            mode: SpawnMode::Blocking,
        }
    }

    /// Executor bound to the runtime the caller is running on.
    pub fn current() -> Result<Self, AggregationError> {
        Handle::try_current().map(Self::new).map_err(|e| {
            AggregationError::InvalidConfig(format!("no tokio runtime available: {e}"))
        })
    }
}

impl Executor for TokioExecutor {
    fn execute(&self, task: Task) {
        match self.mode {
            SpawnMode::Async => {
                self.handle.spawn(async move { task() });
            }
            SpawnMode::Blocking => {
                self.handle.spawn_blocking(task);
            }
        }
    }
}

/// Runs every notification on a freshly spawned OS thread.
#[derive(Debug, Clone, Default)]
pub struct ThreadExecutor {
    name: Option<String>,
}

impl ThreadExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

impl Executor for ThreadExecutor {
    fn execute(&self, task: Task) {
        let mut builder = std::thread::Builder::new();
        if let Some(name) = &self.name {
            builder = builder.name(name.clone());
        }
        if let Err(e) = builder.spawn(task) {
            error!("Failed to spawn record-complete notification thread: {e}");
        }
    }
}
