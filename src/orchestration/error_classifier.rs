//! # Error Classification
//!
//! Centralized mapping from raw action failures to transient vs. permanent.
//!
//! Every external call in the system routes its failure through [`classify`]
//! before deciding what to do next. Skipping this step conflates "the network
//! hiccuped" with "this action is genuinely not allowed" and produces
//! misleading terminal failures, so components never inspect
//! [`ActionErrorKind`] directly.

use serde::{Deserialize, Serialize};

use crate::orchestration::executor::{ActionError, ActionErrorKind};

/// Outcome of classifying a raw action failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Retryable network-class error; may succeed on retry
    Transient,
    /// Genuine action failure; retrying will not help
    Permanent,
}

impl FailureClass {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient)
    }
}

/// Classify a raw action failure.
///
/// Transient covers connection resets, connect/read timeouts, DNS failures,
/// 5xx-equivalent upstream responses (plus 429 throttling), and anything the
/// underlying SDK explicitly tagged retryable. Everything else is permanent.
pub fn classify(error: &ActionError) -> FailureClass {
    match error.kind {
        ActionErrorKind::ConnectionReset
        | ActionErrorKind::ConnectTimeout
        | ActionErrorKind::ReadTimeout
        | ActionErrorKind::DnsFailure
        | ActionErrorKind::SdkRetryable => FailureClass::Transient,
        ActionErrorKind::Upstream { status } => {
            if status >= 500 || status == 429 {
                FailureClass::Transient
            } else {
                FailureClass::Permanent
            }
        }
        ActionErrorKind::InvalidInput
        | ActionErrorKind::BusinessRule
        | ActionErrorKind::NotFound
        | ActionErrorKind::Forbidden
        | ActionErrorKind::Other => FailureClass::Permanent,
    }
}
