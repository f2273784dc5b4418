//! # Action Executor Seam
//!
//! The orchestration core never knows what a unit of work actually does; it
//! hands an action id and the workflow context to an [`ActionExecutor`] and
//! consumes success or a typed failure. Portal scripts, network calls and
//! data imports all live behind this trait.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::models::core::ids::SubStepId;

/// Raw failure shape reported by an external action.
///
/// Kinds mirror what the surrounding SDKs and HTTP clients actually produce;
/// the error classifier maps them to transient or permanent. An action may
/// attach `retry_after` when the upstream service asked for a specific delay.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct ActionError {
    pub kind: ActionErrorKind,
    pub message: String,
    pub retry_after: Option<Duration>,
}

/// Failure categories an external action can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionErrorKind {
    /// Connection reset by peer
    ConnectionReset,
    /// Timed out establishing a connection
    ConnectTimeout,
    /// Timed out waiting for a response
    ReadTimeout,
    /// Name resolution failed
    DnsFailure,
    /// Upstream responded with the given status code
    Upstream { status: u16 },
    /// The underlying SDK tagged this error as retryable
    SdkRetryable,
    /// The input was malformed
    InvalidInput,
    /// Explicit business-rule rejection
    BusinessRule,
    /// Upstream resource does not exist
    NotFound,
    /// Upstream rejected the credentials or permissions
    Forbidden,
    /// Anything the action could not categorize
    Other,
}

impl fmt::Display for ActionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionReset => write!(f, "connection reset"),
            Self::ConnectTimeout => write!(f, "connect timeout"),
            Self::ReadTimeout => write!(f, "read timeout"),
            Self::DnsFailure => write!(f, "dns failure"),
            Self::Upstream { status } => write!(f, "upstream status {status}"),
            Self::SdkRetryable => write!(f, "sdk retryable"),
            Self::InvalidInput => write!(f, "invalid input"),
            Self::BusinessRule => write!(f, "business rule rejection"),
            Self::NotFound => write!(f, "not found"),
            Self::Forbidden => write!(f, "forbidden"),
            Self::Other => write!(f, "uncategorized failure"),
        }
    }
}

impl ActionError {
    pub fn new(kind: ActionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn connection_reset(message: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::ConnectionReset, message)
    }

    pub fn connect_timeout(message: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::ConnectTimeout, message)
    }

    pub fn read_timeout(message: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::ReadTimeout, message)
    }

    pub fn dns_failure(message: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::DnsFailure, message)
    }

    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::Upstream { status }, message)
    }

    pub fn sdk_retryable(message: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::SdkRetryable, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::InvalidInput, message)
    }

    pub fn business_rule(message: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::BusinessRule, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::NotFound, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::Forbidden, message)
    }

    /// Wrap an opaque failure from an external SDK
    pub fn other(source: anyhow::Error) -> Self {
        Self::new(ActionErrorKind::Other, format!("{source:#}"))
    }

    /// Attach an upstream-requested retry delay
    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }
}

/// One unit of external work.
///
/// Implementations are responsible for their own idempotency ("check if
/// already done" before acting); the orchestration core provides at-least-once
/// execution semantics per sub-step.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Perform the action named by `action`, reading inputs from `context`.
    ///
    /// A returned payload is merged into the workflow context for later
    /// sub-steps to read.
    async fn execute(
        &self,
        action: &SubStepId,
        context: &Map<String, Value>,
    ) -> Result<Option<Value>, ActionError>;
}
