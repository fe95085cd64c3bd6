//! Types describing asynchronous remote calls

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::Result;

/// Unique identifier of one asynchronous call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(Uuid);

impl CallId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Channel on which finished asynchronous calls are reported
pub type CompletionSender = mpsc::UnboundedSender<CallCompletion>;

/// Receiving half of a [`CompletionSender`]
pub type CompletionReceiver = mpsc::UnboundedReceiver<CallCompletion>;

/// Create a completion channel for use with `call_async`
pub fn completion_channel() -> (CompletionSender, CompletionReceiver) {
    mpsc::unbounded_channel()
}

/// Handle for an asynchronous call that has been issued but not yet finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCall {
    /// Identifier shared with the eventual [`CallCompletion`]
    pub id: CallId,
    /// Remote method name
    pub method: String,
}

impl PendingCall {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            id: CallId::new(),
            method: method.into(),
        }
    }

    /// Build the completion matching this call
    pub fn complete(&self, result: Result<Value>) -> CallCompletion {
        CallCompletion {
            id: self.id,
            method: self.method.clone(),
            result,
        }
    }

    /// Report `result` on `done`
    ///
    /// A dropped receiver is not an error: the caller stopped listening.
    pub fn deliver(&self, done: &CompletionSender, result: Result<Value>) {
        if done.send(self.complete(result)).is_err() {
            tracing::debug!(call_id = %self.id, method = %self.method, "completion receiver dropped");
        }
    }
}

/// Outcome of an asynchronous call
#[derive(Debug)]
pub struct CallCompletion {
    pub id: CallId,
    pub method: String,
    pub result: Result<Value>,
}
